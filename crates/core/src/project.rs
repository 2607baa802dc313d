//! Projection of committed search units into the external timetable shape
//! plus workload/utilization statistics. Pure transformation; the solve
//! duration is whatever the caller's clock measured.

use std::collections::BTreeMap;
use std::time::Duration;
use types::{Assignment, Statistics};

use crate::model::{PlacedUnit, SchedulingModel};

pub fn project(
    model: &SchedulingModel,
    units: &[PlacedUnit],
    solve_time: Duration,
) -> (Vec<Assignment>, Statistics) {
    let mut ordered: Vec<&PlacedUnit> = units.iter().collect();
    // Stored-timetable order: day, then slot, then room. (day, slot, room)
    // is unique in any valid assignment, so the order is total.
    ordered.sort_by_key(|u| (u.day, u.slot, u.room, u.course));

    let mut faculty_workload: BTreeMap<_, u32> = BTreeMap::new();
    let mut room_usage: BTreeMap<_, u32> = BTreeMap::new();

    let timetable: Vec<Assignment> = ordered
        .iter()
        .map(|u| {
            let course = &model.courses[u.course];
            let faculty = &model.faculty[course.faculty];
            let room = &model.rooms[u.room];
            *faculty_workload.entry(faculty.id.clone()).or_default() += 1;
            *room_usage.entry(room.id.clone()).or_default() += 1;
            Assignment {
                course_id: course.id.clone(),
                course_code: course.code.clone(),
                course_name: course.name.clone(),
                faculty_id: faculty.id.clone(),
                faculty_name: faculty.name.clone(),
                room_id: room.id.clone(),
                room_name: room.name.clone(),
                day: model.calendar.days[u.day].clone(),
                slot: model.calendar.slots[u.slot].clone(),
            }
        })
        .collect();

    let statistics = Statistics {
        faculty_workload,
        room_usage,
        total_classes: timetable.len(),
        solve_time,
    };
    (timetable, statistics)
}
