//! Axum route handlers for the session API.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::document::ResumeDocument;
use crate::models::profile::SubjectId;
use crate::models::progress::Progress;
use crate::models::readiness::ReadinessBand;
use crate::models::roadmap::{Horizon, LearningTask, RoadmapError, TaskAddress};
use crate::session::{Session, SessionError};
use crate::state::AppState;
use crate::sync::{ProgressSync, SyncError, SyncOutcome};

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReadinessView {
    pub score: u8,
    pub band: ReadinessBand,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HorizonView {
    pub key: &'static str,
    pub label: &'static str,
    pub tasks: Vec<LearningTask>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub identity: SubjectId,
    pub target_role: String,
    pub current_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub market_trend: Option<String>,
    pub readiness: ReadinessView,
    /// Pass back with task completions so stale addresses are caught.
    pub revision: u64,
    pub horizons: Vec<HorizonView>,
    pub progress: Option<Progress>,
    pub started_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        let profile = session.profile().clone();
        let readiness = session.readiness();
        Self {
            identity: session.identity().clone(),
            target_role: profile.target_role,
            current_skills: profile.current_skills,
            missing_skills: profile.missing_skills,
            market_trend: profile.market_trend,
            readiness: ReadinessView {
                score: readiness.value(),
                band: readiness.band(),
                label: readiness.band().label(),
            },
            revision: session.revision(),
            horizons: Horizon::ALL
                .into_iter()
                .map(|horizon| HorizonView {
                    key: horizon.key(),
                    label: horizon.label(),
                    tasks: session.roadmap().tasks(horizon).to_vec(),
                })
                .collect(),
            progress: session.progress().cloned(),
            started_at: session.started_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ProgressSync> for ProgressStatus {
    fn from(sync: &ProgressSync) -> Self {
        match sync {
            ProgressSync::Applied => Self {
                status: "applied",
                message: None,
            },
            ProgressSync::Stale => Self {
                status: "stale",
                message: None,
            },
            ProgressSync::Failed(err) => Self {
                status: "failed",
                message: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub session: SessionView,
    pub progress_sync: ProgressStatus,
}

impl From<SyncOutcome> for SyncResponse {
    fn from(outcome: SyncOutcome) -> Self {
        Self {
            session: SessionView::from(outcome.session.as_ref()),
            progress_sync: ProgressStatus::from(&outcome.progress),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteTaskRequest {
    pub revision: Option<u64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

fn active_identity(state: &AppState) -> Result<SubjectId, SyncError> {
    state
        .sync
        .session()
        .map(|s| s.identity().clone())
        .ok_or(SessionError::NoActiveSession.into())
}

/// GET /api/v1/session
pub async fn handle_get_session(
    State(state): State<AppState>,
) -> Result<Json<SessionView>, AppError> {
    let session = state
        .sync
        .session()
        .ok_or(SyncError::from(SessionError::NoActiveSession))?;
    Ok(Json(SessionView::from(session.as_ref())))
}

/// POST /api/v1/session
///
/// Multipart upload with a `file` (PDF) and a `target_role` field.
pub async fn handle_start_session(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SyncResponse>), AppError> {
    let mut document = None;
    let mut target_role = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
                document = Some(ResumeDocument::new(file_name, content_type, bytes));
            }
            "target_role" => {
                target_role = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Could not read target_role: {e}"))
                })?;
            }
            _ => {}
        }
    }

    let outcome = state.sync.start_analysis(document, &target_role).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// DELETE /api/v1/session
pub async fn handle_end_session(State(state): State<AppState>) -> StatusCode {
    state.sync.end_session();
    StatusCode::NO_CONTENT
}

/// POST /api/v1/session/tasks/:horizon/:index/complete
///
/// Optional body `{"revision": n}` with the revision the address was read from.
/// An empty body means no revision; anything else must parse or the request
/// is refused.
pub async fn handle_complete_task(
    State(state): State<AppState>,
    Path((horizon, index)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<SyncResponse>, AppError> {
    let index = index
        .parse::<usize>()
        .map_err(|_| RoadmapError::MalformedIndex(index.clone()))
        .map_err(SyncError::from)?;
    let address = TaskAddress::parse(&horizon, index).map_err(SyncError::from)?;
    let revision = completion_revision(&body)?;
    let identity = active_identity(&state)?;

    let outcome = state
        .sync
        .mark_task_complete(&identity, address, revision)
        .await?;
    Ok(Json(outcome.into()))
}

fn completion_revision(body: &[u8]) -> Result<Option<u64>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<CompleteTaskRequest>(body)
        .map(|req| req.revision)
        .map_err(|e| AppError::Validation(format!("Malformed completion body: {e}")))
}

/// POST /api/v1/session/refresh
pub async fn handle_refresh(State(state): State<AppState>) -> Result<Json<SyncResponse>, AppError> {
    let identity = active_identity(&state)?;
    let outcome = state.sync.refresh_roadmap(&identity).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/session/progress
pub async fn handle_sync_progress(
    State(state): State<AppState>,
) -> Result<Json<SyncResponse>, AppError> {
    let identity = active_identity(&state)?;
    let outcome = state.sync.fetch_progress(&identity).await?;
    Ok(Json(outcome.into()))
}
