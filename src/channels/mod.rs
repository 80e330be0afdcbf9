//! Outbound notification channels.
//!
//! Each contact type in the feathers directory maps to one [`Channel`]
//! adapter. Adapters are built once at startup and shared across events.
//! Fan-out is at-least-once: a failure part-way through is counted and
//! reported, never rolled back.

pub mod slack;
pub mod webhook;

pub use slack::SlackChannel;
pub use webhook::{SIGNATURE_HEADER, WebhookChannel};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::feathers::{AddressPool, ContactType};
use crate::notes::ReleaseNote;

/// Errors from a single adapter delivery.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("slack rejected message to {channel}: {error}")]
    Slack { channel: String, error: String },

    #[error("endpoint answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Errors from fanning a release out to every channel.
#[derive(Debug, Error)]
pub enum FanOutError {
    #[error("no channel is registered for contact type {0}")]
    UnregisteredContactType(ContactType),

    #[error("{failed} of {attempted} notifications failed")]
    Failed { failed: usize, attempted: usize },
}

/// A destination for release notes.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Delivers one note's markdown to every address.
    async fn send(
        &self,
        content: &str,
        subject: &str,
        addresses: &[String],
    ) -> Result<(), ChannelError>;
}

/// Sink for teams with contact type `none`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullChannel;

#[async_trait]
impl Channel for NullChannel {
    async fn send(&self, _: &str, _: &str, _: &[String]) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Adapters keyed by contact type.
#[derive(Clone)]
pub struct ChannelRegistry {
    adapters: HashMap<ContactType, Arc<dyn Channel>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// A registry with only the `none` sink.
    pub fn new() -> Self {
        let mut adapters: HashMap<ContactType, Arc<dyn Channel>> = HashMap::new();
        adapters.insert(ContactType::None, Arc::new(NullChannel));
        ChannelRegistry { adapters }
    }

    pub fn register(&mut self, contact_type: ContactType, channel: Arc<dyn Channel>) {
        self.adapters.insert(contact_type, channel);
    }

    pub fn with(mut self, contact_type: ContactType, channel: Arc<dyn Channel>) -> Self {
        self.register(contact_type, channel);
        self
    }

    pub fn is_registered(&self, contact_type: ContactType) -> bool {
        self.adapters.contains_key(&contact_type)
    }

    /// Fails on the first contact type in `notes` that has no adapter.
    pub fn check_registered(&self, notes: &[ReleaseNote]) -> Result<(), FanOutError> {
        notes
            .iter()
            .flat_map(|note| note.teams.iter().map(|t| t.contact_type))
            .find(|ct| !self.is_registered(*ct))
            .map_or(Ok(()), |ct| Err(FanOutError::UnregisteredContactType(ct)))
    }

    /// Sends every note to the addresses of its teams, pooled per contact
    /// type. Returns the number of adapter calls made.
    pub async fn send(&self, subject: &str, notes: &[ReleaseNote]) -> Result<usize, FanOutError> {
        self.check_registered(notes)?;

        let mut attempted = 0;
        let mut failed = 0;
        for (index, note) in notes.iter().enumerate() {
            let pool = AddressPool::from_teams(&note.teams);
            for (contact_type, addresses) in pool.iter() {
                if addresses.is_empty() {
                    continue;
                }
                let Some(channel) = self.adapters.get(&contact_type) else {
                    continue;
                };
                attempted += 1;
                match channel.send(&note.content, subject, addresses).await {
                    Ok(()) => debug!(
                        note = index + 1,
                        contact_type = %contact_type,
                        addresses = addresses.len(),
                        "notification sent"
                    ),
                    Err(e) => {
                        failed += 1;
                        warn!(
                            note = index + 1,
                            contact_type = %contact_type,
                            error = %e,
                            "notification failed"
                        );
                    }
                }
            }
        }

        if failed > 0 {
            return Err(FanOutError::Failed { failed, attempted });
        }
        Ok(attempted)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A recording HTTP endpoint for adapter tests.

    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    #[derive(Debug, Clone)]
    pub struct Captured {
        pub path: String,
        pub headers: HeaderMap,
        pub body: Bytes,
    }

    #[derive(Clone)]
    struct Recorder {
        captured: Arc<Mutex<Vec<Captured>>>,
        status: StatusCode,
        reply: &'static str,
    }

    /// Starts a server on an ephemeral port answering every POST with
    /// `status` and `reply`. Returns its base URL and the capture log.
    pub async fn capture_server(
        status: StatusCode,
        reply: &'static str,
    ) -> (String, Arc<Mutex<Vec<Captured>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder {
            captured: captured.clone(),
            status,
            reply,
        };
        let app = Router::new()
            .route("/{*path}", post(record))
            .with_state(recorder);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), captured)
    }

    async fn record(
        State(recorder): State<Recorder>,
        uri: axum::http::Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> (StatusCode, &'static str) {
        recorder.captured.lock().unwrap().push(Captured {
            path: uri.path().to_string(),
            headers,
            body,
        });
        (recorder.status, recorder.reply)
    }
}
