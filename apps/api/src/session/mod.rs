//! Single-slot holder of the current analysis session.
//!
//! A `Session` is an immutable snapshot. Every mutation builds a new snapshot
//! and swaps it into the slot under the write lock, so readers always see a
//! whole session and never a half-applied update. The lock is never held
//! across an `.await`.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::profile::{AnalysisProfile, SubjectId};
use crate::models::progress::Progress;
use crate::models::readiness::ReadinessScore;
use crate::models::roadmap::{Roadmap, RoadmapError, TaskAddress};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("an analysis for subject {0} is already active; end it first")]
    AlreadyActive(SubjectId),

    #[error("another analysis is already being created")]
    StartInProgress,

    #[error("no analysis session is active")]
    NoActiveSession,

    #[error("subject {actual} does not own the active session ({expected})")]
    IdentityMismatch {
        expected: SubjectId,
        actual: SubjectId,
    },

    #[error("the session was ended or replaced while the request was in flight")]
    Superseded,

    #[error(transparent)]
    Roadmap(#[from] RoadmapError),
}

#[derive(Debug, Clone)]
pub struct Session {
    handle: Uuid,
    identity: SubjectId,
    profile: AnalysisProfile,
    roadmap: Roadmap,
    readiness: ReadinessScore,
    progress: Option<Progress>,
    /// Bumped on every roadmap replacement. Task addresses are only valid
    /// against the revision they were read from.
    revision: u64,
    /// Sequence number of the progress report currently applied; 0 means none yet.
    progress_seq: u64,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Unique per started session, so late responses for a torn-down session
    /// can be told apart from responses for a new one with the same identity.
    pub fn handle(&self) -> Uuid {
        self.handle
    }

    pub fn identity(&self) -> &SubjectId {
        &self.identity
    }

    pub fn profile(&self) -> &AnalysisProfile {
        &self.profile
    }

    pub fn roadmap(&self) -> &Roadmap {
        &self.roadmap
    }

    pub fn readiness(&self) -> ReadinessScore {
        self.readiness
    }

    pub fn progress(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn progress_seq(&self) -> u64 {
        self.progress_seq
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Result of offering a progress report to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    Applied,
    /// A report from a later request was already applied; this one was dropped.
    Stale { applied_seq: u64 },
}

#[derive(Debug, Default)]
pub struct SessionState {
    slot: RwLock<Option<Arc<Session>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // The slot only ever holds a fully built snapshot, so a poisoned lock
    // still guards a consistent value.
    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<Session>>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<Session>>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.read().clone()
    }

    /// Creates a new session. Fails with `AlreadyActive` unless the previous
    /// one was cleared first.
    pub fn start(
        &self,
        identity: SubjectId,
        roadmap: Roadmap,
        readiness: ReadinessScore,
        profile: AnalysisProfile,
    ) -> Result<Arc<Session>, SessionError> {
        let mut slot = self.write();
        if let Some(existing) = slot.as_ref() {
            return Err(SessionError::AlreadyActive(existing.identity.clone()));
        }

        let session = Arc::new(Session {
            handle: Uuid::new_v4(),
            identity,
            profile,
            roadmap,
            readiness,
            progress: None,
            revision: 1,
            progress_seq: 0,
            started_at: Utc::now(),
        });
        info!(
            "Session {} started for subject {} ({} tasks, {} already completed)",
            session.handle,
            session.identity,
            session.roadmap.task_count(),
            session.roadmap.completed_count()
        );
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Atomically replaces the roadmap and readiness score and bumps the
    /// revision. Progress is left as it was.
    pub fn replace_roadmap_and_score(
        &self,
        handle: Uuid,
        roadmap: Roadmap,
        readiness: ReadinessScore,
    ) -> Result<Arc<Session>, SessionError> {
        self.update(handle, |session| {
            session.roadmap = roadmap;
            session.readiness = readiness;
            session.revision += 1;
            Ok(())
        })
    }

    /// Replaces progress wholesale, unless a report from a later request
    /// (higher `seq`) has already been applied.
    pub fn replace_progress(
        &self,
        handle: Uuid,
        seq: u64,
        progress: Progress,
    ) -> Result<(Arc<Session>, ProgressUpdate), SessionError> {
        let mut outcome = ProgressUpdate::Applied;
        let session = self.update(handle, |session| {
            if seq <= session.progress_seq {
                outcome = ProgressUpdate::Stale {
                    applied_seq: session.progress_seq,
                };
                return Ok(());
            }
            session.progress = Some(progress);
            session.progress_seq = seq;
            Ok(())
        })?;
        if let ProgressUpdate::Stale { applied_seq } = outcome {
            debug!("Discarded progress report #{seq}; #{applied_seq} already applied");
        }
        Ok((session, outcome))
    }

    /// Marks a task completed in the held roadmap as a display hint.
    ///
    /// Returns `Ok(false)` without touching anything when the roadmap has been
    /// replaced since `revision`; the newer roadmap already reflects the engine.
    pub fn mark_task_completed(
        &self,
        handle: Uuid,
        revision: u64,
        address: TaskAddress,
    ) -> Result<bool, SessionError> {
        let mut applied = false;
        self.update(handle, |session| {
            if session.revision != revision {
                return Ok(());
            }
            session.roadmap = session.roadmap.mark_task_completed(address)?;
            applied = true;
            Ok(())
        })?;
        Ok(applied)
    }

    /// Tears down the session. Nothing is deleted on the engine side.
    pub fn clear(&self) -> Option<Arc<Session>> {
        let previous = self.write().take();
        if let Some(session) = &previous {
            info!("Session {} for subject {} cleared", session.handle, session.identity);
        }
        previous
    }

    /// Clears the slot only if it still holds the session identified by `handle`.
    pub fn clear_if(&self, handle: Uuid) -> bool {
        let mut slot = self.write();
        if slot.as_ref().is_some_and(|s| s.handle == handle) {
            if let Some(session) = slot.take() {
                info!("Session {} for subject {} torn down", session.handle, session.identity);
            }
            return true;
        }
        false
    }

    fn update<F>(&self, handle: Uuid, apply: F) -> Result<Arc<Session>, SessionError>
    where
        F: FnOnce(&mut Session) -> Result<(), SessionError>,
    {
        let mut slot = self.write();
        let current = match slot.as_ref() {
            None => return Err(SessionError::NoActiveSession),
            Some(s) if s.handle != handle => return Err(SessionError::Superseded),
            Some(s) => s,
        };

        let mut next = Session::clone(current);
        apply(&mut next)?;
        let next = Arc::new(next);
        *slot = Some(next.clone());
        Ok(next)
    }
}
