//! Boundary to the remote resume-analysis engine.
//!
//! The SyncController only talks to the engine through `AnalysisEngine`, so
//! the HTTP client can be swapped for an in-memory engine in tests.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::document::ResumeDocument;
use crate::models::profile::{AnalysisProfile, SubjectId};
use crate::models::readiness::ReadinessScore;
use crate::models::roadmap::{Roadmap, TaskAddress};

#[cfg(test)]
pub mod fake;
pub mod http;
mod wire;

pub use http::HttpEngine;

/// The four calls the engine supports, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineCall {
    CreateAnalysis,
    MarkTaskComplete,
    FetchProgress,
    RefreshRoadmap,
}

impl fmt::Display for EngineCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineCall::CreateAnalysis => "create-analysis",
            EngineCall::MarkTaskComplete => "mark-task-complete",
            EngineCall::FetchProgress => "fetch-progress",
            EngineCall::RefreshRoadmap => "refresh-roadmap",
        })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("engine returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("subject {0} is not known to the engine")]
    UnknownIdentity(SubjectId),

    #[error("engine rejected the task address: {0}")]
    InvalidAddress(String),

    #[error("engine rejected the request: {0}")]
    Rejected(String),

    #[error("invalid engine URL: {0}")]
    InvalidUrl(String),

    #[error("could not decode engine response: {0}")]
    Decode(String),
}

/// Result of CreateAnalysis: a fresh identity with its initial roadmap.
#[derive(Debug, Clone)]
pub struct CreatedAnalysis {
    pub identity: SubjectId,
    pub roadmap: Roadmap,
    pub readiness: ReadinessScore,
    pub profile: AnalysisProfile,
}

#[derive(Debug, Clone)]
pub struct RefreshedRoadmap {
    pub roadmap: Roadmap,
    pub readiness: ReadinessScore,
}

/// Raw aggregate counters; normalised into `Progress` by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub completion_percentage: Option<f64>,
}

#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    async fn create_analysis(
        &self,
        document: &ResumeDocument,
        target_role: &str,
    ) -> Result<CreatedAnalysis, EngineError>;

    async fn mark_task_complete(
        &self,
        identity: &SubjectId,
        address: TaskAddress,
    ) -> Result<(), EngineError>;

    async fn fetch_progress(&self, identity: &SubjectId) -> Result<ProgressReport, EngineError>;

    async fn refresh_roadmap(&self, identity: &SubjectId) -> Result<RefreshedRoadmap, EngineError>;
}
