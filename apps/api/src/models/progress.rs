use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("engine reported {completed} completed tasks out of {total}")]
    CompletedExceedsTotal { completed: u32, total: u32 },
}

/// Aggregate completion statistics as reported by the engine.
///
/// Read-only: a `Progress` is only ever replaced wholesale by a newer
/// report, never derived from the locally held roadmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    completed_tasks: u32,
    total_tasks: u32,
    completion_percentage: u8,
    fetched_at: DateTime<Utc>,
}

impl Progress {
    /// Builds a snapshot from an engine report.
    ///
    /// The reported percentage is clamped into `[0, 100]` and forced to 0 when
    /// there are no tasks. When the engine omits it, it is computed as
    /// `round(100 * completed / total)`.
    pub fn from_report(
        completed_tasks: u32,
        total_tasks: u32,
        reported_percentage: Option<f64>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if completed_tasks > total_tasks {
            return Err(ProgressError::CompletedExceedsTotal {
                completed: completed_tasks,
                total: total_tasks,
            });
        }

        let completion_percentage = if total_tasks == 0 {
            0
        } else {
            let raw = reported_percentage
                .filter(|p| p.is_finite())
                .unwrap_or_else(|| 100.0 * f64::from(completed_tasks) / f64::from(total_tasks));
            raw.round().clamp(0.0, 100.0) as u8
        };

        Ok(Self {
            completed_tasks,
            total_tasks,
            completion_percentage,
            fetched_at,
        })
    }

    pub fn completion_percentage(&self) -> u8 {
        self.completion_percentage
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_tasks
    }

    pub fn total_count(&self) -> u32 {
        self.total_tasks
    }
}
