//! Validation of the raw entity snapshot and construction of the immutable
//! scheduling model a single generation run operates on.
//!
//! Availability blobs are parsed here, exactly once; the search engine only
//! ever consults the precomputed per-course cell sets.

use std::collections::{BTreeMap, HashMap, HashSet};
use types::{Calendar, CourseId, Faculty, FacultyId, RoomId, SolveEnvelope};

use crate::{Availability, ValidationError};

/// Bitset over the (day, slot) cells of one calendar week.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSet {
    words: Vec<u64>,
    len: usize,
}

impl SlotSet {
    fn empty(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    fn insert(&mut self, cell: usize) {
        debug_assert!(cell < self.len);
        self.words[cell / 64] |= 1 << (cell % 64);
    }

    pub fn contains(&self, cell: usize) -> bool {
        cell < self.len && (self.words[cell / 64] >> (cell % 64)) & 1 == 1
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[derive(Clone, Debug)]
pub struct CourseVar {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    /// Index into `SchedulingModel::faculty`.
    pub faculty: usize,
    pub demand: u32,
}

#[derive(Clone, Debug)]
pub struct FacultyVar {
    pub id: FacultyId,
    pub name: String,
    pub max_hours: u32,
    /// Parsed day availability, indexed by calendar day.
    pub days: Vec<bool>,
}

#[derive(Clone, Debug)]
pub struct RoomVar {
    pub id: RoomId,
    pub name: String,
}

/// Immutable constraint model for one run. Rooms are held in ascending id
/// order, which fixes the candidate enumeration order of the search.
#[derive(Clone, Debug)]
pub struct SchedulingModel {
    pub calendar: Calendar,
    pub courses: Vec<CourseVar>,
    pub faculty: Vec<FacultyVar>,
    pub rooms: Vec<RoomVar>,
    feasible: Vec<SlotSet>,
}

impl SchedulingModel {
    /// Cells where the course's faculty is available.
    pub fn feasible_cells(&self, course: usize) -> &SlotSet {
        &self.feasible[course]
    }

    pub fn total_units(&self) -> usize {
        self.courses.iter().map(|c| c.demand as usize).sum()
    }
}

/// One committed search decision: unit of `course` placed at (day, slot)
/// in `room`. Indices refer to the owning model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedUnit {
    pub course: usize,
    pub day: usize,
    pub slot: usize,
    pub room: usize,
}

pub fn build(env: &SolveEnvelope) -> Result<SchedulingModel, ValidationError> {
    let inst = &env.instance;
    let calendar = &env.calendar;

    if calendar.days.is_empty() || calendar.slots.is_empty() {
        return Err(ValidationError::MissingField(
            "calendar must define at least one day and one slot".into(),
        ));
    }
    if inst.faculty.is_empty() {
        return Err(ValidationError::MissingField("faculty collection is empty".into()));
    }
    if inst.courses.is_empty() {
        return Err(ValidationError::MissingField("course collection is empty".into()));
    }
    if inst.rooms.is_empty() {
        return Err(ValidationError::MissingField("room collection is empty".into()));
    }

    check_unique("faculty", inst.faculty.iter().map(|f| f.id.0.as_str()))?;
    check_unique("course", inst.courses.iter().map(|c| c.id.0.as_str()))?;
    check_unique("room", inst.rooms.iter().map(|r| r.id.0.as_str()))?;

    let faculty_index: HashMap<&str, usize> = inst
        .faculty
        .iter()
        .enumerate()
        .map(|(i, f)| (f.id.0.as_str(), i))
        .collect();

    let faculty = inst
        .faculty
        .iter()
        .map(|f| {
            Ok(FacultyVar {
                id: f.id.clone(),
                name: f.name.clone(),
                max_hours: f.max_hours,
                days: parse_availability(f, &calendar.days)?,
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    let courses = inst
        .courses
        .iter()
        .map(|c| {
            let owner = *faculty_index.get(c.faculty_id.0.as_str()).ok_or_else(|| {
                ValidationError::MissingField(format!(
                    "course {} references missing faculty {}",
                    c.id, c.faculty_id
                ))
            })?;
            let demand = c.demand();
            if demand == 0 {
                return Err(ValidationError::NonPositiveDemand { course: c.id.clone() });
            }
            Ok(CourseVar {
                id: c.id.clone(),
                code: c.code.clone(),
                name: c.name.clone(),
                faculty: owner,
                demand,
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    let mut rooms: Vec<RoomVar> = inst
        .rooms
        .iter()
        .map(|r| RoomVar {
            id: r.id.clone(),
            name: r.name.clone(),
        })
        .collect();
    rooms.sort_by(|a, b| a.id.cmp(&b.id));

    let slot_count = calendar.slot_count();
    let feasible = courses
        .iter()
        .map(|c| {
            let mut cells = SlotSet::empty(calendar.cell_count());
            for (day, open) in faculty[c.faculty].days.iter().enumerate() {
                if !open {
                    continue;
                }
                for slot in 0..slot_count {
                    cells.insert(day * slot_count + slot);
                }
            }
            cells
        })
        .collect();

    Ok(SchedulingModel {
        calendar: calendar.clone(),
        courses,
        faculty,
        rooms,
        feasible,
    })
}

/// Resolves the availability field to a per-day open/closed vector. Days
/// absent from the map are open; keys that name no calendar day are ignored.
/// An encoded blob that does not parse as a day-to-bool object is a hard
/// validation failure, never silently widened to "no restriction".
fn parse_availability(f: &Faculty, days: &[String]) -> Result<Vec<bool>, ValidationError> {
    let decoded;
    let map: &BTreeMap<String, bool> = match &f.availability {
        Availability::Days(m) => m,
        Availability::Encoded(raw) => {
            decoded = serde_json::from_str::<BTreeMap<String, bool>>(raw).map_err(|e| {
                ValidationError::MalformedAvailability {
                    faculty: f.id.clone(),
                    detail: e.to_string(),
                }
            })?;
            &decoded
        }
    };
    Ok(days.iter().map(|d| map.get(d).copied().unwrap_or(true)).collect())
}

fn check_unique<'a>(
    entity: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId(format!("duplicate {entity} id: {id}")));
        }
    }
    Ok(())
}
