//! HTTP server.
//!
//! # Endpoints
//!
//! - `POST /webhooks` - GitHub webhook deliveries, answered once handled
//! - `GET /health` - liveness probe
//! - `GET /api/v1/releases` - recorded releases, newest first
//! - `GET /api/v1/users/{login}/releases/unviewed` - releases a user has not seen
//! - `POST /api/v1/users/{login}/releases/{id}/view` - mark a release seen

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub mod health;
pub mod releases;
pub mod webhook;

pub use health::{StatusBody, health_handler};
pub use releases::{list_releases, mark_viewed, unviewed_releases};
pub use webhook::webhook_handler;

use crate::store::ReleaseStore;
use crate::worker::Dispatcher;

/// Shared application state, handed to handlers through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    dispatcher: Arc<Dispatcher>,

    store: Arc<dyn ReleaseStore>,

    /// Key for verifying inbound GitHub signatures.
    webhook_secret: Vec<u8>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn ReleaseStore>,
        webhook_secret: impl Into<Vec<u8>>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                dispatcher,
                store,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn store(&self) -> &dyn ReleaseStore {
        self.inner.store.as_ref()
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/webhooks", post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/releases", get(list_releases))
        .route(
            "/api/v1/users/{login}/releases/unviewed",
            get(unviewed_releases),
        )
        .route("/api/v1/users/{login}/releases/{id}/view", post(mark_viewed))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
