use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}
id_newtype!(FacultyId);
id_newtype!(CourseId);
id_newtype!(RoomId);

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CourseKind {
    #[default]
    Lecture,
    Lab,
    Seminar,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    #[default]
    Classroom,
    Lab,
    Auditorium,
}

/// Weekly availability of a faculty member. Days missing from the map count
/// as available. The encoded form is the JSON blob the persistence layer
/// stores verbatim; it is parsed exactly once, at model-build time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Availability {
    Days(BTreeMap<String, bool>),
    Encoded(String),
}

impl Default for Availability {
    fn default() -> Self {
        Availability::Days(BTreeMap::new())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Faculty {
    pub id: FacultyId,
    pub name: String,
    #[serde(default)]
    pub availability: Availability,
    pub max_hours: u32,
    #[serde(default)]
    pub expertise: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub credits: u32,
    #[serde(default, alias = "type")]
    pub kind: CourseKind,
    pub faculty_id: FacultyId,
    /// Weekly hour demand; falls back to `credits` when absent.
    #[serde(default)]
    pub hours_per_week: Option<u32>,
}

impl Course {
    pub fn demand(&self) -> u32 {
        self.hours_per_week.unwrap_or(self.credits)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    #[serde(default, alias = "type")]
    pub kind: RoomKind,
}

/// The fixed weekly grid: ordered day names by ordered slot names. Slot
/// index 0 carries the lowest soft penalty. Supplied as configuration; the
/// default mirrors the standard institutional week.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Calendar {
    pub days: Vec<String>,
    pub slots: Vec<String>,
}

impl Calendar {
    pub fn standard_week() -> Self {
        Self {
            days: ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
                .map(String::from)
                .to_vec(),
            slots: [
                "9:00-10:00",
                "10:00-11:00",
                "11:00-12:00",
                "12:00-1:00",
                "1:00-2:00",
                "2:00-3:00",
                "3:00-4:00",
                "4:00-5:00",
            ]
            .map(String::from)
            .to_vec(),
        }
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of (day, slot) cells in the grid.
    pub fn cell_count(&self) -> usize {
        self.days.len() * self.slots.len()
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Self::standard_week()
    }
}

/// Read-only snapshot of the entities one generation run operates on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    pub faculty: Vec<Faculty>,
    pub courses: Vec<Course>,
    pub rooms: Vec<Room>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SolveParams {
    /// Wall-clock budget for the search; `None` runs to exhaustion.
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    /// Cap on explored search nodes; `None` is unbounded.
    #[serde(default)]
    pub node_limit: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveEnvelope {
    pub instance: Instance,
    #[serde(default)]
    pub calendar: Calendar,
    #[serde(default)]
    pub params: SolveParams,
}

/// One scheduled hour of a course. Code/name fields are denormalized copies
/// so exporters and summary generators need no further entity lookups.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    pub course_id: CourseId,
    pub course_code: String,
    pub course_name: String,
    pub faculty_id: FacultyId,
    pub faculty_name: String,
    pub room_id: RoomId,
    pub room_name: String,
    pub day: String,
    pub slot: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Statistics {
    pub faculty_workload: BTreeMap<FacultyId, u32>,
    pub room_usage: BTreeMap<RoomId, u32>,
    pub total_classes: usize,
    pub solve_time: std::time::Duration,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SearchMetrics {
    pub nodes: u64,
    pub backtracks: u64,
    /// Improving complete assignments found during branch and bound.
    pub solutions: u64,
    pub best_cost: u64,
    pub proven_optimal: bool,
}
