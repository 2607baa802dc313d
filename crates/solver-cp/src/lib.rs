//! Constraint-programming solver for weekly course timetables: chronological
//! backtracking with forward checking, driven to the minimum-penalty
//! assignment by branch and bound. Complete and deterministic: identical
//! envelopes produce identical outcomes.

mod search;

use anyhow::ensure;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use timetable_core::{
    build, project, CancelToken, InfeasibleReason, PlacedUnit, SolveEnvelope, SolveOutcome,
    Solved, Solver,
};
use tracing::info;

pub struct CpSolver;

impl CpSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Solver for CpSolver {
    async fn solve(&self, env: SolveEnvelope, cancel: CancelToken) -> anyhow::Result<SolveOutcome> {
        let started = Instant::now();
        info!(
            courses = env.instance.courses.len(),
            faculty = env.instance.faculty.len(),
            rooms = env.instance.rooms.len(),
            "generation run started"
        );

        let model = match build(&env) {
            Ok(model) => model,
            Err(error) => return Ok(SolveOutcome::Rejected { error }),
        };
        if let Some(reason) = search::precheck(&model) {
            info!(%reason, "rejected before search");
            return Ok(SolveOutcome::Infeasible { reason });
        }

        let budget = search::Budget {
            deadline: env
                .params
                .time_limit_ms
                .map(|ms| started + Duration::from_millis(ms)),
            node_limit: env.params.node_limit,
            cancel,
        };
        let search::RunOutcome { best, metrics, stopped } = search::branch_and_bound(&model, &budget);
        info!(
            nodes = metrics.nodes,
            backtracks = metrics.backtracks,
            solutions = metrics.solutions,
            "search finished"
        );

        let finish = |units: Vec<PlacedUnit>| -> anyhow::Result<Solved> {
            ensure!(
                units.len() == model.total_units(),
                "incumbent covers {} of {} units",
                units.len(),
                model.total_units()
            );
            let (timetable, statistics) = project(&model, &units, started.elapsed());
            Ok(Solved { timetable, statistics, metrics })
        };

        match stopped {
            Some(search::Stop::Cancelled) => Ok(SolveOutcome::Cancelled),
            Some(_) => Ok(SolveOutcome::TimedOut {
                best: best.map(finish).transpose()?,
            }),
            None => match best {
                Some(units) => Ok(SolveOutcome::Solved(finish(units)?)),
                None => Ok(SolveOutcome::Infeasible {
                    reason: InfeasibleReason::SearchExhausted,
                }),
            },
        }
    }
}
