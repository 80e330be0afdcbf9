//! Slack adapter posting through `chat.postMessage`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Channel, ChannelError};
use crate::markup::to_slack;

/// Default Slack Web API base.
pub const SLACK_API_URL: &str = "https://slack.com/api";

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    mrkdwn: bool,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts each note to every listed Slack channel id.
#[derive(Debug, Clone)]
pub struct SlackChannel {
    client: Client,
    token: String,
    base_url: String,
}

impl SlackChannel {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self::with_base_url(client, token, SLACK_API_URL)
    }

    /// Points the adapter at a different API host.
    pub fn with_base_url(
        client: Client,
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        SlackChannel {
            client,
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Slack message text: the subject in bold, then the rewritten note.
fn message_text(content: &str, subject: &str) -> String {
    let body = to_slack(content);
    if subject.is_empty() {
        body
    } else {
        format!("*{subject}*\n{body}")
    }
}

#[async_trait]
impl Channel for SlackChannel {
    async fn send(
        &self,
        content: &str,
        subject: &str,
        addresses: &[String],
    ) -> Result<(), ChannelError> {
        let text = message_text(content, subject);
        let url = format!("{}/chat.postMessage", self.base_url);

        for channel in addresses {
            let response: PostMessageResponse = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .json(&PostMessage {
                    channel,
                    text: &text,
                    mrkdwn: true,
                })
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            if !response.ok {
                return Err(ChannelError::Slack {
                    channel: channel.clone(),
                    error: response.error.unwrap_or_else(|| "unknown_error".into()),
                });
            }
            debug!(channel = %channel, "posted to slack");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::testing::capture_server;
    use axum::http::StatusCode;

    #[test]
    fn text_has_bold_subject() {
        assert_eq!(message_text("* one", "Release"), "*Release*\n• one");
        assert_eq!(message_text("## Hi", ""), "*Hi*");
    }

    #[tokio::test]
    async fn posts_once_per_channel() {
        let (url, captured) = capture_server(StatusCode::OK, r#"{"ok":true}"#).await;
        let slack = SlackChannel::with_base_url(Client::new(), "xoxb-token", url);

        slack
            .send(
                "**bold** news",
                "Release",
                &["C02BA9QHMD0".into(), "C0PLATFORM1".into()],
            )
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].path, "/chat.postMessage");
        assert_eq!(
            captured[0].headers.get("authorization").unwrap(),
            "Bearer xoxb-token"
        );
        let body: serde_json::Value = serde_json::from_slice(&captured[1].body).unwrap();
        assert_eq!(body["channel"], "C0PLATFORM1");
        assert_eq!(body["text"], "*Release*\n*bold* news");
    }

    #[tokio::test]
    async fn not_ok_response_fails_on_first_channel() {
        let (url, captured) =
            capture_server(StatusCode::OK, r#"{"ok":false,"error":"channel_not_found"}"#).await;
        let slack = SlackChannel::with_base_url(Client::new(), "t", url);

        let err = slack
            .send("x", "s", &["C02BA9QHMD0".into(), "C0PLATFORM1".into()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChannelError::Slack { ref channel, ref error }
                if channel == "C02BA9QHMD0" && error == "channel_not_found"
        ));
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn http_error_fails() {
        let (url, _) = capture_server(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
        let slack = SlackChannel::with_base_url(Client::new(), "t", url);
        let err = slack.send("x", "s", &["C02BA9QHMD0".into()]).await.unwrap_err();
        assert!(matches!(err, ChannelError::Http(_)));
    }
}
