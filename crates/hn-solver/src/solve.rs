//! High-level solve: translate, solve, harvest.

use crate::error::SolverResult;
use crate::harvest::harvest;
use crate::invoker::{NlpSolver, SolveOptions, SolveStatus};
use crate::translate::{DroppedConstraint, TranslateOptions, translate};
use hn_aml::Model;

/// Summary of one in-place solve.
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Constraints handed to the solver
    pub constraints: usize,
    pub dropped: Vec<DroppedConstraint>,
    pub status: SolveStatus,
    pub iterations: usize,
    pub residual_norm: f64,
}

/// Solve `model` and leave the solution in its variables.
///
/// This function:
/// 1. Translates the model into a concrete model and a fresh index map
/// 2. Hands the concrete model to `solver`
/// 3. Harvests the returned values back into the model, converged or not
pub fn solve_in_place(
    model: &mut Model,
    solver: &dyn NlpSolver,
    translate_options: &TranslateOptions,
    solve_options: &SolveOptions,
) -> SolverResult<SolveReport> {
    let translation = translate(model, translate_options)?;
    let outcome = solver.solve(&translation.concrete, solve_options)?;
    harvest(&outcome.values, &translation.index_map, model)?;

    Ok(SolveReport {
        constraints: translation.concrete.num_cons(),
        dropped: translation.dropped,
        status: outcome.status,
        iterations: outcome.iterations,
        residual_norm: outcome.residual_norm,
    })
}
