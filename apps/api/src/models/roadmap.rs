use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoadmapError {
    #[error("unknown horizon '{0}' (expected 30, 60 or 90)")]
    UnknownHorizon(String),

    #[error("task index '{0}' is not a non-negative integer")]
    MalformedIndex(String),

    #[error("task {index} does not exist in the {horizon}-day horizon ({len} tasks)")]
    OutOfRange {
        horizon: Horizon,
        index: usize,
        len: usize,
    },

    #[error("task {index} in the {horizon}-day horizon has no skill")]
    EmptySkill { horizon: Horizon, index: usize },
}

/// One of the three sequential time horizons of a roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "30")]
    Days30,
    #[serde(rename = "60")]
    Days60,
    #[serde(rename = "90")]
    Days90,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Days30, Horizon::Days60, Horizon::Days90];

    /// The wire key used by the engine: `"30"`, `"60"` or `"90"`.
    pub fn key(self) -> &'static str {
        match self {
            Horizon::Days30 => "30",
            Horizon::Days60 => "60",
            Horizon::Days90 => "90",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, RoadmapError> {
        match key.trim() {
            "30" => Ok(Horizon::Days30),
            "60" => Ok(Horizon::Days60),
            "90" => Ok(Horizon::Days90),
            other => Err(RoadmapError::UnknownHorizon(other.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Horizon::Days30 => "Foundation",
            Horizon::Days60 => "Intermediate",
            Horizon::Days90 => "Advanced",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Position of a task inside one roadmap snapshot.
///
/// Only meaningful against the snapshot it was read from: any roadmap
/// replacement invalidates every address taken from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskAddress {
    pub horizon: Horizon,
    pub index: usize,
}

impl TaskAddress {
    pub fn new(horizon: Horizon, index: usize) -> Self {
        Self { horizon, index }
    }

    pub fn parse(horizon_key: &str, index: usize) -> Result<Self, RoadmapError> {
        Ok(Self::new(Horizon::from_key(horizon_key)?, index))
    }
}

impl fmt::Display for TaskAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.horizon, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningTask {
    pub skill: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub resources: String,
    #[serde(default)]
    pub mini_project: String,
    #[serde(default)]
    pub completed: bool,
}

/// A three-horizon learning roadmap. Serializes as `{"30": [...], "60": [...], "90": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roadmap {
    #[serde(rename = "30", default)]
    days_30: Vec<LearningTask>,
    #[serde(rename = "60", default)]
    days_60: Vec<LearningTask>,
    #[serde(rename = "90", default)]
    days_90: Vec<LearningTask>,
}

impl Roadmap {
    pub fn new(
        days_30: Vec<LearningTask>,
        days_60: Vec<LearningTask>,
        days_90: Vec<LearningTask>,
    ) -> Result<Self, RoadmapError> {
        let roadmap = Self {
            days_30,
            days_60,
            days_90,
        };
        roadmap.validate()?;
        Ok(roadmap)
    }

    /// Checks that every task names a skill.
    pub fn validate(&self) -> Result<(), RoadmapError> {
        for horizon in Horizon::ALL {
            for (index, task) in self.tasks(horizon).iter().enumerate() {
                if task.skill.trim().is_empty() {
                    return Err(RoadmapError::EmptySkill { horizon, index });
                }
            }
        }
        Ok(())
    }

    pub fn tasks(&self, horizon: Horizon) -> &[LearningTask] {
        match horizon {
            Horizon::Days30 => &self.days_30,
            Horizon::Days60 => &self.days_60,
            Horizon::Days90 => &self.days_90,
        }
    }

    fn tasks_mut(&mut self, horizon: Horizon) -> &mut Vec<LearningTask> {
        match horizon {
            Horizon::Days30 => &mut self.days_30,
            Horizon::Days60 => &mut self.days_60,
            Horizon::Days90 => &mut self.days_90,
        }
    }

    pub fn task(&self, address: TaskAddress) -> Result<&LearningTask, RoadmapError> {
        let tasks = self.tasks(address.horizon);
        tasks.get(address.index).ok_or(RoadmapError::OutOfRange {
            horizon: address.horizon,
            index: address.index,
            len: tasks.len(),
        })
    }

    /// Returns a copy of this roadmap with the addressed task marked completed.
    /// Marking an already-completed task is a no-op.
    pub fn mark_task_completed(&self, address: TaskAddress) -> Result<Roadmap, RoadmapError> {
        self.task(address)?;
        let mut next = self.clone();
        next.tasks_mut(address.horizon)[address.index].completed = true;
        Ok(next)
    }

    pub fn task_count(&self) -> usize {
        Horizon::ALL.iter().map(|h| self.tasks(*h).len()).sum()
    }

    /// Locally visible completion flags. A display hint only; progress
    /// counters always come from the engine.
    pub fn completed_count(&self) -> usize {
        Horizon::ALL
            .iter()
            .flat_map(|h| self.tasks(*h))
            .filter(|t| t.completed)
            .count()
    }
}
