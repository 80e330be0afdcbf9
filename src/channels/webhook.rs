//! Signed HTTP webhook adapter.
//!
//! The note is rendered to HTML and posted as
//! `{"body": "<html>", "subject": "...", "addresses": [...]}`. When a secret
//! is configured the raw JSON bytes are signed with HMAC-SHA256 and the
//! signature travels in [`SIGNATURE_HEADER`] as `sha256=<hex>`, the same
//! scheme GitHub uses for its own deliveries.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use tracing::debug;

use super::{Channel, ChannelError};
use crate::markup::to_html;
use crate::webhooks::{compute_signature, format_signature_header};

pub const SIGNATURE_HEADER: &str = "X-Peacock-Signature-256";

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    body: String,
    subject: &'a str,
    addresses: &'a [String],
}

#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: Client,
    url: String,
    auth_token: Option<String>,
    secret: Option<String>,
}

impl WebhookChannel {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        WebhookChannel {
            client,
            url: url.into(),
            auth_token: None,
            secret: None,
        }
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Signs every request body with this secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    async fn send(
        &self,
        content: &str,
        subject: &str,
        addresses: &[String],
    ) -> Result<(), ChannelError> {
        let payload = serde_json::to_vec(&WebhookPayload {
            body: to_html(content),
            subject,
            addresses,
        })?;

        let mut request = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            let signature = compute_signature(&payload, secret.as_bytes());
            request = request.header(SIGNATURE_HEADER, format_signature_header(&signature));
        }
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.body(payload).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Status { status, body });
        }

        debug!(addresses = addresses.len(), "posted to notification webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::testing::capture_server;
    use crate::webhooks::verify_signature;

    #[tokio::test]
    async fn posts_signed_html_payload() {
        let (url, captured) = capture_server(axum::http::StatusCode::OK, "").await;
        let channel = WebhookChannel::new(Client::new(), format!("{url}/hook"))
            .with_auth_token("tok")
            .with_secret("shh");

        channel
            .send("# Title\n* item", "Release", &["a@x.io".into(), "b@x.io".into()])
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let req = &captured[0];
        assert_eq!(req.path, "/hook");
        assert_eq!(req.headers.get("authorization").unwrap(), "Bearer tok");

        let signature = req.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert!(verify_signature(&req.body, signature, b"shh"));

        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(body["subject"], "Release");
        assert_eq!(body["addresses"], serde_json::json!(["a@x.io", "b@x.io"]));
        assert_eq!(
            body["body"],
            "<header>Title</header>\n<ul>\n<li>item</li>\n</ul>\n"
        );
    }

    #[tokio::test]
    async fn unsigned_without_secret() {
        let (url, captured) = capture_server(axum::http::StatusCode::OK, "").await;
        WebhookChannel::new(Client::new(), format!("{url}/hook"))
            .send("x", "s", &["a".into()])
            .await
            .unwrap();

        let captured = captured.lock().unwrap();
        assert!(captured[0].headers.get(SIGNATURE_HEADER).is_none());
        assert!(captured[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn non_200_is_a_failure() {
        let (url, _) = capture_server(axum::http::StatusCode::ACCEPTED, "queued").await;
        let err = WebhookChannel::new(Client::new(), format!("{url}/hook"))
            .send("x", "s", &["a".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Status { status, ref body } if status == StatusCode::ACCEPTED && body == "queued"
        ));
    }
}
