//! JSON shapes exchanged with the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{CreatedAnalysis, EngineError, ProgressReport, RefreshedRoadmap};
use crate::models::profile::{AnalysisProfile, SubjectId};
use crate::models::readiness::ReadinessScore;
use crate::models::roadmap::Roadmap;

/// The engine hands out numeric ids; accept strings too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawSubjectId {
    Number(u64),
    Text(String),
}

impl From<RawSubjectId> for SubjectId {
    fn from(raw: RawSubjectId) -> Self {
        match raw {
            RawSubjectId::Number(n) => SubjectId::new(n.to_string()),
            RawSubjectId::Text(s) => SubjectId::new(s),
        }
    }
}

/// Sends numeric identities back as JSON numbers, anything else as a string.
pub(crate) fn subject_json(identity: &SubjectId) -> Value {
    identity
        .as_str()
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(identity.as_str()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoadmapPayload {
    #[serde(flatten)]
    pub roadmap: Roadmap,
    pub career_readiness_score: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SkillGapPayload {
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub current_skills: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StudentProfilePayload {
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MarketProfilePayload {
    pub trend: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateAnalysisResponse {
    pub user_id: RawSubjectId,
    pub roadmap: RoadmapPayload,
    pub readiness_score: Option<f64>,
    #[serde(default)]
    pub skill_gap: SkillGapPayload,
    #[serde(default)]
    pub student_profile: StudentProfilePayload,
    #[serde(default)]
    pub market_profile: MarketProfilePayload,
}

impl CreateAnalysisResponse {
    pub fn into_created(self, target_role: &str) -> Result<CreatedAnalysis, EngineError> {
        self.roadmap
            .roadmap
            .validate()
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        let readiness = readiness_from(self.readiness_score, &self.roadmap);
        let current_skills = if self.skill_gap.current_skills.is_empty() {
            self.student_profile.skills
        } else {
            self.skill_gap.current_skills
        };

        Ok(CreatedAnalysis {
            identity: self.user_id.into(),
            roadmap: self.roadmap.roadmap,
            readiness,
            profile: AnalysisProfile {
                target_role: target_role.to_string(),
                current_skills,
                missing_skills: self.skill_gap.missing_skills,
                market_trend: self.market_profile.trend.filter(|t| !t.trim().is_empty()),
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub roadmap: RoadmapPayload,
    pub readiness_score: Option<f64>,
}

impl RefreshResponse {
    pub fn into_refreshed(self) -> Result<RefreshedRoadmap, EngineError> {
        self.roadmap
            .roadmap
            .validate()
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        let readiness = readiness_from(self.readiness_score, &self.roadmap);
        Ok(RefreshedRoadmap {
            roadmap: self.roadmap.roadmap,
            readiness,
        })
    }
}

// Top-level score wins; older engine builds only embed it in the roadmap.
fn readiness_from(top_level: Option<f64>, roadmap: &RoadmapPayload) -> ReadinessScore {
    top_level
        .or(roadmap.career_readiness_score)
        .map(ReadinessScore::clamped)
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressResponse {
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub total_tasks: u32,
    pub completion_percentage: Option<f64>,
}

impl From<ProgressResponse> for ProgressReport {
    fn from(r: ProgressResponse) -> Self {
        ProgressReport {
            completed_tasks: r.completed_tasks,
            total_tasks: r.total_tasks,
            completion_percentage: r.completion_percentage,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateProgressRequest {
    pub user_id: Value,
    pub period: &'static str,
    pub task_index: usize,
}

/// FastAPI-style error body: `{"detail": "..."}` or `{"detail": [{"msg": "..."}]}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

pub(crate) fn error_message(body: &str) -> String {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail);
    match detail {
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.get("msg").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None if body.trim().is_empty() => "no response body".to_string(),
        None => body.trim().to_string(),
    }
}
