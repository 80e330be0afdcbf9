//! Read API over recorded releases and per-user view marks.
//!
//! - `GET /api/v1/releases?environment=<env>`
//! - `GET /api/v1/users/{login}/releases/unviewed`
//! - `POST /api/v1/users/{login}/releases/{id}/view`
//!
//! Teams are rendered without their API keys.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::AppState;
use super::health::StatusBody;
use crate::feathers::{ContactType, Team};
use crate::notes::ReleaseNote;
use crate::store::{PullRequestSummary, ReleaseRecord, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    pub name: String,
    pub contact_type: ContactType,
    pub addresses: Vec<String>,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        TeamView {
            name: team.name.clone(),
            contact_type: team.contact_type,
            addresses: team.addresses.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteView {
    pub teams: Vec<TeamView>,
    pub content: String,
}

impl From<&ReleaseNote> for NoteView {
    fn from(note: &ReleaseNote) -> Self {
        NoteView {
            teams: note.teams.iter().map(TeamView::from).collect(),
            content: note.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseView {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub environment: String,
    pub release_notes: Vec<NoteView>,
    pub pull_request: PullRequestSummary,
}

impl From<ReleaseRecord> for ReleaseView {
    fn from(record: ReleaseRecord) -> Self {
        ReleaseView {
            id: record.id,
            created_at: record.release.created_at,
            environment: record.release.environment,
            release_notes: record
                .release
                .release_notes
                .iter()
                .map(NoteView::from)
                .collect(),
            pull_request: record.release.pull_request,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub environment: Option<String>,
}

/// Store failures as HTTP responses.
#[derive(Debug)]
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            other => {
                error!(error = %other, "Release store failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(StatusBody::error(self.0.to_string()))).into_response()
    }
}

fn views(records: Vec<ReleaseRecord>) -> Json<Vec<ReleaseView>> {
    Json(records.into_iter().map(ReleaseView::from).collect())
}

pub async fn list_releases(
    State(app_state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ReleaseView>>, ApiError> {
    let records = app_state
        .store()
        .list(params.environment.as_deref())
        .await?;
    Ok(views(records))
}

pub async fn unviewed_releases(
    State(app_state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<Vec<ReleaseView>>, ApiError> {
    let records = app_state.store().unviewed(&login).await?;
    Ok(views(records))
}

pub async fn mark_viewed(
    State(app_state): State<AppState>,
    Path((login, id)): Path<(String, u64)>,
) -> Result<StatusCode, ApiError> {
    app_state.store().mark_viewed(&login, id).await?;
    debug!(login = %login, release = id, "Release marked viewed");
    Ok(StatusCode::NO_CONTENT)
}
