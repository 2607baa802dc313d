//! Chronological backtracking with forward checking, wrapped in branch and
//! bound on the soft penalty (sum of slot indices of all committed units).
//!
//! Search state is single-owner and mutable: occupancy grids, per-faculty
//! load counters, the commitment trail, and one candidate cursor per depth.
//! Nothing here survives the run.

use std::time::Instant;

use timetable_core::{CancelToken, InfeasibleReason, PlacedUnit, SchedulingModel, SearchMetrics};

pub(crate) struct Budget {
    pub deadline: Option<Instant>,
    pub node_limit: Option<u64>,
    pub cancel: CancelToken,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stop {
    Deadline,
    Nodes,
    Cancelled,
}

impl Budget {
    /// Polled at every unit-commitment boundary, so cancellation latency is
    /// bounded by the cost of scanning one candidate list.
    fn check(&self, nodes: u64) -> Option<Stop> {
        if self.cancel.is_cancelled() {
            return Some(Stop::Cancelled);
        }
        if let Some(limit) = self.node_limit {
            if nodes >= limit {
                return Some(Stop::Nodes);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(Stop::Deadline);
            }
        }
        None
    }
}

pub(crate) struct RunOutcome {
    pub best: Option<Vec<PlacedUnit>>,
    pub metrics: SearchMetrics,
    pub stopped: Option<Stop>,
}

/// Rejections provable from per-course and per-faculty arithmetic alone,
/// reported without entering search.
pub(crate) fn precheck(model: &SchedulingModel) -> Option<InfeasibleReason> {
    for (ci, course) in model.courses.iter().enumerate() {
        if course.demand as usize > model.feasible_cells(ci).count() {
            return Some(InfeasibleReason::HoursExceedAvailability {
                course: course.id.clone(),
            });
        }
    }

    let mut demanded = vec![0u64; model.faculty.len()];
    for course in &model.courses {
        demanded[course.faculty] += course.demand as u64;
    }
    for (fi, faculty) in model.faculty.iter().enumerate() {
        if demanded[fi] > faculty.max_hours as u64 {
            return Some(InfeasibleReason::FacultyOverload {
                faculty: faculty.id.clone(),
            });
        }
    }

    if model.total_units() > model.calendar.cell_count() * model.rooms.len() {
        return Some(InfeasibleReason::RoomCapacityExhausted);
    }
    None
}

/// Most-constrained-course-first unit ordering: ascending count of feasible
/// (day, slot) cells, ties by ascending course id. Units of one course are
/// consecutive.
pub(crate) fn decision_order(model: &SchedulingModel) -> Vec<usize> {
    let mut courses: Vec<usize> = (0..model.courses.len()).collect();
    courses.sort_by(|&a, &b| {
        model
            .feasible_cells(a)
            .count()
            .cmp(&model.feasible_cells(b).count())
            .then_with(|| model.courses[a].id.cmp(&model.courses[b].id))
    });

    let mut order = Vec::with_capacity(model.total_units());
    for ci in courses {
        for _ in 0..model.courses[ci].demand {
            order.push(ci);
        }
    }
    order
}

pub(crate) fn branch_and_bound(model: &SchedulingModel, budget: &Budget) -> RunOutcome {
    let order = decision_order(model);
    let total_units = order.len();
    let slots = model.calendar.slot_count();
    let rooms = model.rooms.len();
    let cells = model.calendar.cell_count();
    // Candidates per unit, enumerated ascending (day, slot, room id).
    let per_unit = cells * rooms;

    let mut metrics = SearchMetrics::default();
    if total_units == 0 {
        metrics.proven_optimal = true;
        return RunOutcome {
            best: Some(Vec::new()),
            metrics,
            stopped: None,
        };
    }

    let mut faculty_busy = vec![false; model.faculty.len() * cells];
    let mut room_busy = vec![false; rooms * cells];
    let mut load = vec![0u32; model.faculty.len()];
    let mut trail: Vec<PlacedUnit> = Vec::with_capacity(total_units);
    let mut cost: u64 = 0;

    let mut best: Option<Vec<PlacedUnit>> = None;
    let mut best_cost = u64::MAX;

    // cursors[d] is the candidate index the unit at depth d is committed to,
    // or the point its scan resumes from after an undo.
    let mut cursors: Vec<usize> = vec![0];

    loop {
        if let Some(stop) = budget.check(metrics.nodes) {
            if best.is_some() {
                metrics.best_cost = best_cost;
            }
            return RunOutcome {
                best,
                metrics,
                stopped: Some(stop),
            };
        }

        let depth = cursors.len() - 1;
        let course = order[depth];
        let fac = model.courses[course].faculty;
        let mut cursor = cursors[depth];
        let mut committed = false;

        if load[fac] < model.faculty[fac].max_hours {
            while cursor < per_unit {
                let day = cursor / (slots * rooms);
                let rest = cursor % (slots * rooms);
                let slot = rest / rooms;
                let room = rest % rooms;
                let cell = day * slots + slot;

                // Lower bound for completing through this candidate: the
                // remaining units can at best all land on slot index 0.
                if cost + slot as u64 >= best_cost {
                    cursor += 1;
                    continue;
                }
                if !model.feasible_cells(course).contains(cell)
                    || faculty_busy[fac * cells + cell]
                    || room_busy[room * cells + cell]
                {
                    cursor += 1;
                    continue;
                }

                faculty_busy[fac * cells + cell] = true;
                room_busy[room * cells + cell] = true;
                load[fac] += 1;
                cost += slot as u64;
                trail.push(PlacedUnit { course, day, slot, room });
                metrics.nodes += 1;
                committed = true;
                break;
            }
        }

        if !committed {
            // Candidates exhausted at this depth; chronological backtrack.
            cursors.pop();
            if cursors.is_empty() {
                break;
            }
            metrics.backtracks += 1;
            undo_last(
                model, &mut trail, &mut faculty_busy, &mut room_busy, &mut load, &mut cost, slots,
                cells,
            );
            *cursors.last_mut().expect("non-empty cursor stack") += 1;
            continue;
        }

        cursors[depth] = cursor;
        if trail.len() == total_units {
            // Strictly improving by construction of the bound.
            best_cost = cost;
            best = Some(trail.clone());
            metrics.solutions += 1;
            tracing::debug!(cost, nodes = metrics.nodes, "improving assignment found");
            undo_last(
                model, &mut trail, &mut faculty_busy, &mut room_busy, &mut load, &mut cost, slots,
                cells,
            );
            cursors[depth] += 1;
        } else {
            cursors.push(0);
        }
    }

    metrics.proven_optimal = best.is_some();
    if best.is_some() {
        metrics.best_cost = best_cost;
    }
    RunOutcome {
        best,
        metrics,
        stopped: None,
    }
}

#[allow(clippy::too_many_arguments)]
fn undo_last(
    model: &SchedulingModel,
    trail: &mut Vec<PlacedUnit>,
    faculty_busy: &mut [bool],
    room_busy: &mut [bool],
    load: &mut [u32],
    cost: &mut u64,
    slots: usize,
    cells: usize,
) {
    let unit = trail.pop().expect("undo with empty trail");
    let fac = model.courses[unit.course].faculty;
    let cell = unit.day * slots + unit.slot;
    faculty_busy[fac * cells + cell] = false;
    room_busy[unit.room * cells + cell] = false;
    load[fac] -= 1;
    *cost -= unit.slot as u64;
}
