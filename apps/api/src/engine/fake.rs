//! In-memory engine with server-side semantics, for controller and router tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::engine::{
    AnalysisEngine, CreatedAnalysis, EngineCall, EngineError, ProgressReport, RefreshedRoadmap,
};
use crate::models::document::ResumeDocument;
use crate::models::profile::{AnalysisProfile, SubjectId};
use crate::models::readiness::ReadinessScore;
use crate::models::roadmap::{Horizon, LearningTask, Roadmap, TaskAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Network,
    UnknownIdentity,
    InvalidAddress,
}

struct Subject {
    roadmap: Roadmap,
    base_score: f64,
}

#[derive(Default)]
pub struct FakeEngine {
    subjects: Mutex<HashMap<SubjectId, Subject>>,
    next_id: AtomicU64,
    failures: Mutex<HashMap<EngineCall, VecDeque<FakeFailure>>>,
    calls: Mutex<Vec<EngineCall>>,
    progress_calls: AtomicUsize,
    progress_hold: Mutex<Option<(usize, Arc<Notify>)>>,
    create_hold: Mutex<Option<Arc<Notify>>>,
}

fn task(skill: &str) -> LearningTask {
    LearningTask {
        skill: skill.to_string(),
        goal: format!("Get comfortable with {skill}"),
        resources: format!("{skill} handbook"),
        mini_project: format!("Small {skill} project"),
        completed: false,
    }
}

pub fn initial_roadmap() -> Roadmap {
    Roadmap::new(
        vec![task("SQL"), task("Statistics"), task("Pandas")],
        vec![task("Machine Learning"), task("Feature Engineering")],
        vec![task("Model Deployment"), task("MLOps")],
    )
    .expect("fixture roadmap is valid")
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `call` fails with `failure` instead of reaching the subject data.
    pub fn fail_next(&self, call: EngineCall, failure: FakeFailure) {
        self.failures
            .lock()
            .unwrap()
            .entry(call)
            .or_default()
            .push_back(failure);
    }

    /// Holds the `nth` (0-based) progress response, computed when the request
    /// arrives, until the returned `Notify` fires.
    pub fn hold_progress_call(&self, nth: usize) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.progress_hold.lock().unwrap() = Some((nth, notify.clone()));
        notify
    }

    /// Holds the next CreateAnalysis call, before any subject is created,
    /// until the returned `Notify` fires.
    pub fn hold_next_create(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.create_hold.lock().unwrap() = Some(notify.clone());
        notify
    }

    /// Drops a subject, as if the engine lost its record.
    pub fn forget(&self, identity: &SubjectId) {
        self.subjects.lock().unwrap().remove(identity);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn server_roadmap(&self, identity: &SubjectId) -> Option<Roadmap> {
        self.subjects
            .lock()
            .unwrap()
            .get(identity)
            .map(|s| s.roadmap.clone())
    }

    fn begin(&self, call: EngineCall) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(call);
        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        match failure {
            None => Ok(()),
            Some(FakeFailure::Network) => Err(EngineError::Status {
                status: 503,
                message: "engine unavailable".to_string(),
            }),
            Some(FakeFailure::UnknownIdentity) => {
                Err(EngineError::UnknownIdentity(SubjectId::new("unknown")))
            }
            Some(FakeFailure::InvalidAddress) => {
                Err(EngineError::InvalidAddress("Invalid task index".to_string()))
            }
        }
    }

    fn report(&self, identity: &SubjectId) -> Result<ProgressReport, EngineError> {
        let subjects = self.subjects.lock().unwrap();
        let subject = subjects
            .get(identity)
            .ok_or_else(|| EngineError::UnknownIdentity(identity.clone()))?;
        let total = subject.roadmap.task_count() as u32;
        let completed = subject.roadmap.completed_count() as u32;
        let percentage = if total == 0 {
            0.0
        } else {
            (100.0 * f64::from(completed) / f64::from(total)).round()
        };
        Ok(ProgressReport {
            completed_tasks: completed,
            total_tasks: total,
            completion_percentage: Some(percentage),
        })
    }
}

#[async_trait]
impl AnalysisEngine for FakeEngine {
    async fn create_analysis(
        &self,
        _document: &ResumeDocument,
        target_role: &str,
    ) -> Result<CreatedAnalysis, EngineError> {
        self.begin(EngineCall::CreateAnalysis)?;
        let hold = self.create_hold.lock().unwrap().take();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if target_role.trim().is_empty() {
            return Err(EngineError::Rejected("target_role is required".to_string()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let identity = SubjectId::new(format!("u{n}"));
        let roadmap = initial_roadmap();
        let base_score = 40.0;
        self.subjects.lock().unwrap().insert(
            identity.clone(),
            Subject {
                roadmap: roadmap.clone(),
                base_score,
            },
        );

        Ok(CreatedAnalysis {
            identity,
            roadmap,
            readiness: ReadinessScore::clamped(base_score),
            profile: AnalysisProfile {
                target_role: target_role.to_string(),
                current_skills: vec!["Python".to_string(), "HTML".to_string()],
                missing_skills: vec!["SQL".to_string(), "Statistics".to_string()],
                market_trend: Some("High demand".to_string()),
            },
        })
    }

    async fn mark_task_complete(
        &self,
        identity: &SubjectId,
        address: TaskAddress,
    ) -> Result<(), EngineError> {
        self.begin(EngineCall::MarkTaskComplete)?;
        let mut subjects = self.subjects.lock().unwrap();
        let subject = subjects
            .get_mut(identity)
            .ok_or_else(|| EngineError::UnknownIdentity(identity.clone()))?;
        subject.roadmap = subject
            .roadmap
            .mark_task_completed(address)
            .map_err(|e| EngineError::InvalidAddress(e.to_string()))?;
        Ok(())
    }

    async fn fetch_progress(&self, identity: &SubjectId) -> Result<ProgressReport, EngineError> {
        self.begin(EngineCall::FetchProgress)?;
        let report = self.report(identity)?;

        let nth = self.progress_calls.fetch_add(1, Ordering::SeqCst);
        let hold = self
            .progress_hold
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(held, _)| *held == nth)
            .map(|(_, notify)| notify.clone());
        if let Some(notify) = hold {
            notify.notified().await;
        }
        Ok(report)
    }

    /// Keeps completed tasks, and trims the trailing incomplete task of every
    /// horizon in which something was completed. Score grows 5 per completed task.
    async fn refresh_roadmap(&self, identity: &SubjectId) -> Result<RefreshedRoadmap, EngineError> {
        self.begin(EngineCall::RefreshRoadmap)?;
        let mut subjects = self.subjects.lock().unwrap();
        let subject = subjects
            .get_mut(identity)
            .ok_or_else(|| EngineError::UnknownIdentity(identity.clone()))?;

        let adapt = |horizon: Horizon| {
            let mut tasks = subject.roadmap.tasks(horizon).to_vec();
            let any_done = tasks.iter().any(|t| t.completed);
            if any_done && tasks.last().is_some_and(|t| !t.completed) {
                tasks.pop();
            }
            tasks
        };
        let roadmap = Roadmap::new(
            adapt(Horizon::Days30),
            adapt(Horizon::Days60),
            adapt(Horizon::Days90),
        )
        .map_err(|e| EngineError::Decode(e.to_string()))?;

        let completed = roadmap.completed_count() as f64;
        let readiness = ReadinessScore::clamped(subject.base_score + 5.0 * completed);
        subject.roadmap = roadmap.clone();
        Ok(RefreshedRoadmap { roadmap, readiness })
    }
}
