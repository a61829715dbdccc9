//! SyncController: every mutation of the session goes through here.
//!
//! Engine failures are caught at this boundary and classified into
//! `SyncError`; the session is only ever left at its last known-good snapshot.
//!
//! Progress reports are tagged with a sequence number taken before the
//! request is sent. A report is applied only if no report from a later
//! request has been applied yet, so a slow response can never roll the
//! counters back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::{AnalysisEngine, EngineCall, EngineError};
use crate::models::document::{DocumentError, ResumeDocument};
use crate::models::profile::SubjectId;
use crate::models::progress::Progress;
use crate::models::roadmap::{RoadmapError, TaskAddress};
use crate::session::{ProgressUpdate, Session, SessionError, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("a target role is required")]
    MissingTargetRole,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{call} failed: {message}")]
    NetworkFailure { call: EngineCall, message: String },

    #[error("subject {0} is not known to the analysis engine")]
    UnknownIdentity(SubjectId),

    #[error("invalid task address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    Session(SessionError),
}

impl From<RoadmapError> for SyncError {
    fn from(err: RoadmapError) -> Self {
        SyncError::InvalidAddress(err.to_string())
    }
}

impl From<SessionError> for SyncError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Roadmap(e) => e.into(),
            other => SyncError::Session(other),
        }
    }
}

fn classify(call: EngineCall, err: EngineError) -> SyncError {
    match err {
        EngineError::UnknownIdentity(identity) => SyncError::UnknownIdentity(identity),
        EngineError::InvalidAddress(message) => SyncError::InvalidAddress(message),
        other => SyncError::NetworkFailure {
            call,
            message: other.to_string(),
        },
    }
}

/// What happened to the progress re-fetch that follows a mutation.
#[derive(Debug)]
pub enum ProgressSync {
    Applied,
    /// A newer report was already in place; this one was discarded.
    Stale,
    /// The fetch failed; the previous progress is kept.
    Failed(SyncError),
}

#[derive(Debug)]
pub struct SyncOutcome {
    pub session: Arc<Session>,
    pub progress: ProgressSync,
}

/// Held while a CreateAnalysis request is in flight; released on drop, so a
/// cancelled request frees the slot too.
struct StartReservation<'a>(&'a AtomicBool);

impl<'a> StartReservation<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for StartReservation<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncController {
    engine: Arc<dyn AnalysisEngine>,
    state: SessionState,
    starting: AtomicBool,
    progress_seq: AtomicU64,
    max_document_bytes: usize,
}

impl SyncController {
    pub fn new(engine: Arc<dyn AnalysisEngine>, max_document_bytes: usize) -> Self {
        Self {
            engine,
            state: SessionState::new(),
            starting: AtomicBool::new(false),
            progress_seq: AtomicU64::new(0),
            max_document_bytes,
        }
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.state.current()
    }

    /// CreateAnalysis followed by an initial progress fetch.
    ///
    /// Validation happens before any network call. Fails with `AlreadyActive`
    /// while another session is held (end it first) and with `StartInProgress`
    /// while another upload has not yet been answered.
    pub async fn start_analysis(
        &self,
        document: Option<ResumeDocument>,
        target_role: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let document = document
            .ok_or(DocumentError::Missing)
            .map_err(ValidationError::from)?;
        document
            .validate(self.max_document_bytes)
            .map_err(ValidationError::from)?;
        let target_role = target_role.trim();
        if target_role.is_empty() {
            return Err(ValidationError::MissingTargetRole.into());
        }
        let reservation =
            StartReservation::acquire(&self.starting).ok_or(SessionError::StartInProgress)?;
        if let Some(active) = self.state.current() {
            return Err(SessionError::AlreadyActive(active.identity().clone()).into());
        }

        info!(
            "Requesting analysis of {} for role '{target_role}'",
            document.file_name
        );
        let created = self
            .engine
            .create_analysis(&document, target_role)
            .await
            .map_err(|e| classify(EngineCall::CreateAnalysis, e))
            .inspect_err(|e| warn!("Analysis request failed: {e}"))?;

        let session = self.state.start(
            created.identity,
            created.roadmap,
            created.readiness,
            created.profile,
        )?;
        drop(reservation);
        self.sync_progress(&session).await
    }

    /// Protocol A. The address must come from the roadmap currently held;
    /// pass the revision it was read at to have stale addresses rejected
    /// before anything is sent.
    pub async fn mark_task_complete(
        &self,
        identity: &SubjectId,
        address: TaskAddress,
        read_at_revision: Option<u64>,
    ) -> Result<SyncOutcome, SyncError> {
        let session = self.owned_by(identity)?;
        if let Some(revision) = read_at_revision {
            if revision != session.revision() {
                return Err(SyncError::InvalidAddress(format!(
                    "task {address} was read from roadmap revision {revision}, current revision is {}",
                    session.revision()
                )));
            }
        }
        session.roadmap().task(address)?;

        self.engine
            .mark_task_complete(identity, address)
            .await
            .map_err(|e| self.engine_failure(&session, EngineCall::MarkTaskComplete, e))?;
        info!("Task {address} completed for subject {identity}");

        if !self
            .state
            .mark_task_completed(session.handle(), session.revision(), address)?
        {
            debug!("Roadmap replaced while completing {address}; local flag not applied");
        }
        self.sync_progress(&session).await
    }

    /// Protocol B. Replaces roadmap and readiness together, then re-fetches
    /// progress. Every address read before this call is invalid afterwards.
    pub async fn refresh_roadmap(&self, identity: &SubjectId) -> Result<SyncOutcome, SyncError> {
        let session = self.owned_by(identity)?;
        let refreshed = self
            .engine
            .refresh_roadmap(identity)
            .await
            .map_err(|e| self.engine_failure(&session, EngineCall::RefreshRoadmap, e))?;

        let session = self.state.replace_roadmap_and_score(
            session.handle(),
            refreshed.roadmap,
            refreshed.readiness,
        )?;
        info!(
            "Roadmap for subject {identity} refreshed to revision {} (readiness {})",
            session.revision(),
            session.readiness().value()
        );
        self.sync_progress(&session).await
    }

    /// Protocol C. On failure the held progress is left untouched and the
    /// session survives, except when the engine no longer knows the subject.
    pub async fn fetch_progress(&self, identity: &SubjectId) -> Result<SyncOutcome, SyncError> {
        let session = self.owned_by(identity)?;
        let outcome = self.sync_progress(&session).await?;
        match outcome.progress {
            ProgressSync::Failed(err) => Err(err),
            _ => Ok(outcome),
        }
    }

    /// Tears down the local session. Returns false if there was none.
    pub fn end_session(&self) -> bool {
        self.state.clear().is_some()
    }

    fn owned_by(&self, identity: &SubjectId) -> Result<Arc<Session>, SyncError> {
        let session = self.state.current().ok_or(SessionError::NoActiveSession)?;
        if session.identity() != identity {
            return Err(SessionError::IdentityMismatch {
                expected: session.identity().clone(),
                actual: identity.clone(),
            }
            .into());
        }
        Ok(session)
    }

    fn latest(&self, session: &Session) -> Result<Arc<Session>, SyncError> {
        match self.state.current() {
            Some(current) if current.handle() == session.handle() => Ok(current),
            Some(_) => Err(SessionError::Superseded.into()),
            None => Err(SessionError::NoActiveSession.into()),
        }
    }

    /// Classifies an engine failure; an unknown identity ends the session it belongs to.
    fn engine_failure(&self, session: &Session, call: EngineCall, err: EngineError) -> SyncError {
        let err = classify(call, err);
        if let SyncError::UnknownIdentity(_) = err {
            warn!(
                "Engine no longer knows subject {}; ending session",
                session.identity()
            );
            self.state.clear_if(session.handle());
        } else {
            warn!("{err}");
        }
        err
    }

    async fn sync_progress(&self, session: &Arc<Session>) -> Result<SyncOutcome, SyncError> {
        let seq = self.progress_seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Fetching progress #{seq} for subject {} (#{} applied)",
            session.identity(),
            session.progress_seq()
        );

        let report = match self.engine.fetch_progress(session.identity()).await {
            Ok(report) => report,
            Err(e) => {
                let err = self.engine_failure(session, EngineCall::FetchProgress, e);
                if let SyncError::UnknownIdentity(_) = err {
                    return Err(err);
                }
                return Ok(SyncOutcome {
                    session: self.latest(session)?,
                    progress: ProgressSync::Failed(err),
                });
            }
        };

        let progress = match Progress::from_report(
            report.completed_tasks,
            report.total_tasks,
            report.completion_percentage,
            Utc::now(),
        ) {
            Ok(progress) => progress,
            Err(e) => {
                warn!("Ignoring progress #{seq}: {e}");
                return Ok(SyncOutcome {
                    session: self.latest(session)?,
                    progress: ProgressSync::Failed(SyncError::NetworkFailure {
                        call: EngineCall::FetchProgress,
                        message: e.to_string(),
                    }),
                });
            }
        };

        let (current, update) =
            self.state
                .replace_progress(session.handle(), seq, progress.clone())?;
        let progress = match update {
            ProgressUpdate::Applied => {
                debug!(
                    "Applied progress #{seq}: {}/{} tasks ({}%)",
                    progress.completed_count(),
                    progress.total_count(),
                    progress.completion_percentage()
                );
                ProgressSync::Applied
            }
            ProgressUpdate::Stale { .. } => ProgressSync::Stale,
        };
        Ok(SyncOutcome {
            session: current,
            progress,
        })
    }
}
