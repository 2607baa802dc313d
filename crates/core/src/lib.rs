pub mod model;
pub mod project;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub use model::{build, PlacedUnit, SchedulingModel, SlotSet};
pub use project::project;
pub use types::{
    Assignment, Availability, Calendar, Course, CourseId, Faculty, FacultyId, Instance, Room,
    RoomId, SearchMetrics, SolveEnvelope, SolveParams, Statistics,
};

/// Input defects detected before any search work begins. Always recoverable
/// by the caller fixing the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("missing input: {0}")]
    MissingField(String),
    #[error("duplicate id: {0}")]
    DuplicateId(String),
    #[error("faculty {faculty} has malformed availability: {detail}")]
    MalformedAvailability { faculty: FacultyId, detail: String },
    #[error("course {course} resolves to a demand of zero hours per week")]
    NonPositiveDemand { course: CourseId },
}

/// Why no timetable exists for the model. An expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InfeasibleReason {
    HoursExceedAvailability { course: CourseId },
    FacultyOverload { faculty: FacultyId },
    RoomCapacityExhausted,
    SearchExhausted,
}

impl fmt::Display for InfeasibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HoursExceedAvailability { course } => {
                write!(f, "course {course} needs more hours than its faculty has available")
            }
            Self::FacultyOverload { faculty } => {
                write!(f, "faculty {faculty} is assigned more hours than max_hours permits")
            }
            Self::RoomCapacityExhausted => {
                write!(f, "total demand exceeds the room-hour capacity of the calendar")
            }
            Self::SearchExhausted => write!(f, "search space exhausted without a solution"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solved {
    pub timetable: Vec<Assignment>,
    pub statistics: Statistics,
    pub metrics: SearchMetrics,
}

/// Terminal state of one generation run. Callers must be able to tell "no
/// solution exists" from "a solution exists but was not computed in time",
/// so none of these are errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SolveOutcome {
    Solved(Solved),
    Rejected { error: ValidationError },
    Infeasible { reason: InfeasibleReason },
    TimedOut { best: Option<Solved> },
    Cancelled,
}

/// Caller-initiated abort signal, polled by the engine at every
/// unit-commitment boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The engine seam. The `anyhow::Error` path is reserved for internal
/// invariant violations; every expected outcome is a `SolveOutcome` value.
#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(&self, env: SolveEnvelope, cancel: CancelToken) -> anyhow::Result<SolveOutcome>;
}
