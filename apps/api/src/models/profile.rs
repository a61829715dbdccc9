use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque subject identifier assigned by the engine when an analysis is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The career profile derived from the resume, kept alongside the roadmap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisProfile {
    pub target_role: String,
    pub current_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub market_trend: Option<String>,
}
