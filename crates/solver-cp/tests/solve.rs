use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use solver_cp::CpSolver;
use timetable_core::{
    build, CancelToken, InfeasibleReason, SolveOutcome, Solver, ValidationError,
};
use types::{
    Assignment, Availability, Calendar, Course, CourseId, Faculty, FacultyId, Instance, Room,
    RoomId, SolveEnvelope, SolveParams,
};

fn faculty(id: &str, closed_days: &[&str], max_hours: u32) -> Faculty {
    Faculty {
        id: FacultyId(id.into()),
        name: format!("Prof {id}"),
        availability: Availability::Days(
            closed_days.iter().map(|d| (d.to_string(), false)).collect(),
        ),
        max_hours,
        expertise: String::new(),
    }
}

fn course(id: &str, faculty_id: &str, hours: u32) -> Course {
    Course {
        id: CourseId(id.into()),
        code: id.to_uppercase(),
        name: format!("Course {id}"),
        credits: hours,
        kind: Default::default(),
        faculty_id: FacultyId(faculty_id.into()),
        hours_per_week: Some(hours),
    }
}

fn room(id: &str) -> Room {
    Room {
        id: RoomId(id.into()),
        name: format!("Room {id}"),
        capacity: 40,
        kind: Default::default(),
    }
}

fn envelope(faculty: Vec<Faculty>, courses: Vec<Course>, rooms: Vec<Room>) -> SolveEnvelope {
    SolveEnvelope {
        instance: Instance { faculty, courses, rooms },
        calendar: Calendar::standard_week(),
        params: SolveParams::default(),
    }
}

async fn solve(env: SolveEnvelope) -> SolveOutcome {
    CpSolver::new().solve(env, CancelToken::new()).await.unwrap()
}

/// Checks every hard constraint an accepted timetable must satisfy against
/// the input entities it was generated from.
fn assert_invariants(env: &SolveEnvelope, timetable: &[Assignment]) {
    let mut per_course: HashMap<&CourseId, u32> = HashMap::new();
    let mut faculty_cells = HashSet::new();
    let mut room_cells = HashSet::new();
    let mut workload: HashMap<&FacultyId, u32> = HashMap::new();

    for a in timetable {
        *per_course.entry(&a.course_id).or_default() += 1;
        assert!(
            faculty_cells.insert((&a.faculty_id, &a.day, &a.slot)),
            "faculty {} double-booked at {} {}",
            a.faculty_id,
            a.day,
            a.slot
        );
        assert!(
            room_cells.insert((&a.room_id, &a.day, &a.slot)),
            "room {} double-booked at {} {}",
            a.room_id,
            a.day,
            a.slot
        );
        *workload.entry(&a.faculty_id).or_default() += 1;
    }

    for c in &env.instance.courses {
        assert_eq!(
            per_course.get(&c.id).copied().unwrap_or(0),
            c.demand(),
            "course {} demand not met",
            c.id
        );
    }

    for f in &env.instance.faculty {
        let hours = workload.get(&f.id).copied().unwrap_or(0);
        assert!(hours <= f.max_hours, "faculty {} over max_hours", f.id);
        if let Availability::Days(map) = &f.availability {
            for a in timetable.iter().filter(|a| a.faculty_id == f.id) {
                assert!(
                    map.get(&a.day).copied().unwrap_or(true),
                    "faculty {} scheduled on unavailable day {}",
                    f.id,
                    a.day
                );
            }
        }
    }
}

/// Exhaustive reference search: minimum total slot-index cost over every
/// complete assignment, or None when no feasible assignment exists. Only
/// viable on tiny calendars; shares no code with the engine under test.
fn brute_force_min_cost(env: &SolveEnvelope) -> Option<u64> {
    let model = build(env).expect("brute force expects a valid envelope");
    let days = model.calendar.day_count();
    let slots = model.calendar.slot_count();
    let rooms = model.rooms.len();

    let mut units = Vec::new();
    for (ci, c) in model.courses.iter().enumerate() {
        for _ in 0..c.demand {
            units.push(ci);
        }
    }

    struct Rec<'a> {
        model: &'a timetable_core::SchedulingModel,
        units: &'a [usize],
        days: usize,
        slots: usize,
        rooms: usize,
    }

    fn go(
        r: &Rec<'_>,
        depth: usize,
        fac_busy: &mut HashSet<(usize, usize)>,
        room_busy: &mut HashSet<(usize, usize)>,
        load: &mut Vec<u32>,
        cost: u64,
    ) -> Option<u64> {
        let Some(&ci) = r.units.get(depth) else {
            return Some(cost);
        };
        let fac = r.model.courses[ci].faculty;
        let mut best: Option<u64> = None;
        for day in 0..r.days {
            for slot in 0..r.slots {
                let cell = day * r.slots + slot;
                if !r.model.feasible_cells(ci).contains(cell) {
                    continue;
                }
                if fac_busy.contains(&(fac, cell)) {
                    continue;
                }
                if load[fac] >= r.model.faculty[fac].max_hours {
                    continue;
                }
                for room in 0..r.rooms {
                    if room_busy.contains(&(room, cell)) {
                        continue;
                    }
                    fac_busy.insert((fac, cell));
                    room_busy.insert((room, cell));
                    load[fac] += 1;
                    if let Some(total) =
                        go(r, depth + 1, fac_busy, room_busy, load, cost + slot as u64)
                    {
                        best = Some(best.map_or(total, |b: u64| b.min(total)));
                    }
                    fac_busy.remove(&(fac, cell));
                    room_busy.remove(&(room, cell));
                    load[fac] -= 1;
                }
            }
        }
        best
    }

    let rec = Rec { model: &model, units: &units, days, slots, rooms };
    go(
        &rec,
        0,
        &mut HashSet::new(),
        &mut HashSet::new(),
        &mut vec![0; model.faculty.len()],
        0,
    )
}

#[tokio::test]
async fn scenario_one_course_lands_on_first_slot_of_earliest_days() {
    let env = envelope(
        vec![faculty("f1", &[], 20)],
        vec![course("c1", "f1", 2)],
        vec![room("r1")],
    );
    let SolveOutcome::Solved(solved) = solve(env).await else {
        panic!("expected a solved timetable");
    };
    assert_eq!(solved.timetable.len(), 2);
    assert_eq!(solved.timetable[0].day, "Monday");
    assert_eq!(solved.timetable[0].slot, "9:00-10:00");
    assert_eq!(solved.timetable[1].day, "Tuesday");
    assert_eq!(solved.timetable[1].slot, "9:00-10:00");
    assert_eq!(solved.metrics.best_cost, 0);
    assert!(solved.metrics.proven_optimal);
    assert_eq!(solved.statistics.total_classes, 2);
    assert_eq!(solved.statistics.faculty_workload[&FacultyId("f1".into())], 2);
}

#[tokio::test]
async fn scenario_unavailable_day_is_never_used() {
    let env = envelope(
        vec![faculty("f1", &["Monday"], 20)],
        vec![course("c1", "f1", 1)],
        vec![room("r1")],
    );
    let SolveOutcome::Solved(solved) = solve(env).await else {
        panic!("expected a solved timetable");
    };
    assert_eq!(solved.timetable.len(), 1);
    assert_ne!(solved.timetable[0].day, "Monday");
    assert_eq!(solved.timetable[0].day, "Tuesday");
}

#[tokio::test]
async fn scenario_shared_faculty_overload_is_infeasible() {
    let env = envelope(
        vec![faculty("f1", &[], 1)],
        vec![course("c1", "f1", 1), course("c2", "f1", 1)],
        vec![room("r1")],
    );
    match solve(env).await {
        SolveOutcome::Infeasible {
            reason: InfeasibleReason::FacultyOverload { faculty },
        } => assert_eq!(faculty, FacultyId("f1".into())),
        other => panic!("expected faculty overload, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_zero_rooms_is_rejected_before_search() {
    let env = envelope(
        vec![faculty("f1", &[], 20)],
        vec![course("c1", "f1", 1)],
        vec![],
    );
    match solve(env).await {
        SolveOutcome::Rejected { error: ValidationError::MissingField(detail) } => {
            assert!(detail.contains("room"));
        }
        other => panic!("expected validation rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_availability_blob_is_rejected() {
    let mut bad = faculty("f1", &[], 20);
    bad.availability = Availability::Encoded("definitely not json".into());
    let env = envelope(vec![bad], vec![course("c1", "f1", 1)], vec![room("r1")]);
    match solve(env).await {
        SolveOutcome::Rejected {
            error: ValidationError::MalformedAvailability { faculty, .. },
        } => assert_eq!(faculty, FacultyId("f1".into())),
        other => panic!("expected malformed availability, got {other:?}"),
    }
}

#[tokio::test]
async fn returned_timetable_satisfies_all_invariants() {
    let env = envelope(
        vec![
            faculty("f1", &["Wednesday"], 8),
            faculty("f2", &[], 6),
        ],
        vec![
            course("c1", "f1", 3),
            course("c2", "f1", 2),
            course("c3", "f2", 4),
        ],
        vec![room("r1"), room("r2")],
    );
    let SolveOutcome::Solved(solved) = solve(env.clone()).await else {
        panic!("expected a solved timetable");
    };
    assert_invariants(&env, &solved.timetable);
    assert_eq!(solved.statistics.total_classes, 9);
}

#[tokio::test]
async fn identical_input_produces_identical_timetable() {
    let env = envelope(
        vec![faculty("f1", &["Tuesday"], 10), faculty("f2", &[], 10)],
        vec![
            course("c1", "f1", 2),
            course("c2", "f2", 3),
            course("c3", "f2", 1),
        ],
        vec![room("r2"), room("r1")],
    );
    let SolveOutcome::Solved(first) = solve(env.clone()).await else {
        panic!("expected a solved timetable");
    };
    let SolveOutcome::Solved(second) = solve(env).await else {
        panic!("expected a solved timetable");
    };
    assert_eq!(first.timetable, second.timetable);
    assert_eq!(first.metrics, second.metrics);
}

#[tokio::test]
async fn optimal_cost_matches_exhaustive_reference_search() {
    // Small calendar so the reference search stays tractable.
    let env = SolveEnvelope {
        instance: Instance {
            faculty: vec![faculty("f1", &["Tue"], 6), faculty("f2", &[], 6)],
            courses: vec![
                course("c1", "f1", 2),
                course("c2", "f2", 2),
                course("c3", "f2", 1),
            ],
            rooms: vec![room("r1"), room("r2")],
        },
        calendar: Calendar {
            days: vec!["Mon".into(), "Tue".into(), "Wed".into()],
            slots: vec!["s0".into(), "s1".into(), "s2".into()],
        },
        params: SolveParams::default(),
    };
    let expected = brute_force_min_cost(&env).expect("reference search found no solution");
    let SolveOutcome::Solved(solved) = solve(env).await else {
        panic!("expected a solved timetable");
    };
    assert_eq!(solved.metrics.best_cost, expected);
    assert!(solved.metrics.proven_optimal);
}

#[tokio::test]
async fn expired_deadline_times_out_without_incumbent() {
    let mut env = envelope(
        vec![faculty("f1", &[], 20)],
        vec![course("c1", "f1", 2)],
        vec![room("r1")],
    );
    env.params.time_limit_ms = Some(0);
    match solve(env).await {
        SolveOutcome::TimedOut { best: None } => {}
        other => panic!("expected empty-handed timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn node_budget_times_out_with_best_found_so_far() {
    let mut env = envelope(
        vec![faculty("f1", &[], 20), faculty("f2", &[], 20)],
        vec![course("c1", "f1", 1), course("c2", "f2", 1)],
        vec![room("r1"), room("r2")],
    );
    // Enough nodes to reach the first complete assignment, not enough to
    // prove it optimal.
    env.params.node_limit = Some(2);
    match solve(env.clone()).await {
        SolveOutcome::TimedOut { best: Some(best) } => {
            assert_invariants(&env, &best.timetable);
            assert!(!best.metrics.proven_optimal);
        }
        other => panic!("expected timeout with incumbent, got {other:?}"),
    }
}

#[tokio::test]
async fn pre_cancelled_token_yields_cancelled() {
    let env = envelope(
        vec![faculty("f1", &[], 20)],
        vec![course("c1", "f1", 1)],
        vec![room("r1")],
    );
    let cancel = CancelToken::new();
    cancel.cancel();
    match CpSolver::new().solve(env, cancel).await.unwrap() {
        SolveOutcome::Cancelled => {}
        other => panic!("expected cancellation, got {other:?}"),
    }
}

fn tiny_envelope_strategy() -> impl Strategy<Value = SolveEnvelope> {
    let days = ["Mon", "Tue", "Wed"];
    let availability = prop::collection::vec(any::<bool>(), days.len());
    let faculty_strategy = (availability, 0u32..=5).prop_map(move |(open, max_hours)| {
        let closed: Vec<&str> = days
            .iter()
            .zip(&open)
            .filter(|(_, open)| !**open)
            .map(|(d, _)| *d)
            .collect();
        (closed, max_hours)
    });

    (
        prop::collection::vec(faculty_strategy, 1..=2),
        prop::collection::vec((0usize..2, 1u32..=2), 1..=2),
        1usize..=2,
    )
        .prop_map(move |(faculty_specs, course_specs, room_count)| {
            let faculty_set: Vec<Faculty> = faculty_specs
                .iter()
                .enumerate()
                .map(|(i, (closed, max_hours))| {
                    faculty(&format!("f{i}"), closed, *max_hours)
                })
                .collect();
            let courses: Vec<Course> = course_specs
                .iter()
                .enumerate()
                .map(|(i, (fac, hours))| {
                    let owner = fac % faculty_set.len();
                    course(&format!("c{i}"), &format!("f{owner}"), *hours)
                })
                .collect();
            let rooms: Vec<Room> = (0..room_count).map(|i| room(&format!("r{i}"))).collect();
            SolveEnvelope {
                instance: Instance { faculty: faculty_set, courses, rooms },
                calendar: Calendar {
                    days: days.iter().map(|d| d.to_string()).collect(),
                    slots: vec!["s0".into(), "s1".into()],
                },
                params: SolveParams::default(),
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn solved_outcomes_satisfy_invariants_and_are_optimal(env in tiny_envelope_strategy()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("test runtime");
        let outcome = rt.block_on(solve(env.clone()));
        match outcome {
            SolveOutcome::Solved(solved) => {
                assert_invariants(&env, &solved.timetable);
                let expected = brute_force_min_cost(&env)
                    .expect("engine solved what reference search calls infeasible");
                prop_assert_eq!(solved.metrics.best_cost, expected);
                prop_assert!(solved.metrics.proven_optimal);
            }
            SolveOutcome::Infeasible { .. } => {
                prop_assert!(brute_force_min_cost(&env).is_none());
            }
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }
}
