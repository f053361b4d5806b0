//! Solver contract and the built-in Newton solvers.

use crate::concrete::ConcreteModel;
use crate::error::{SolverError, SolverResult};
use crate::jacobian::{central_difference_jacobian, finite_difference_jacobian};
use crate::newton::newton_solve;
use nalgebra::DVector;
use std::fmt;
use tracing::{debug, warn};

/// Names accepted by [`solver_factory`].
pub const AVAILABLE_SOLVERS: &[&str] = &["newton", "newton-central"];

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    MaxIterations,
    /// Line search could no longer reduce the residual.
    Stagnated,
    /// Non-finite residual or no usable Newton step.
    NumericFailure,
}

impl SolveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Converged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Converged => "converged",
            SolveStatus::MaxIterations => "max_iterations",
            SolveStatus::Stagnated => "stagnated",
            SolveStatus::NumericFailure => "numeric_failure",
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Log every iteration at `info` instead of `debug`.
    pub tee: bool,
    pub max_iterations: usize,
    /// Absolute residual norm tolerance
    pub abs_tol: f64,
    /// Relative tolerance against the initial residual norm
    pub rel_tol: f64,
    /// Finite difference step (scaled by max(|x|, 1))
    pub fd_epsilon: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    pub max_line_search_iters: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            tee: false,
            max_iterations: 100,
            abs_tol: 1e-8,
            rel_tol: 1e-10,
            fd_epsilon: 1e-7,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

/// What a solver hands back: one value per concrete variable, in position
/// order, plus how the solve ended.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub values: Vec<f64>,
    pub status: SolveStatus,
    pub iterations: usize,
    pub residual_norm: f64,
}

/// A nonlinear solver reached through a call/response contract.
///
/// Implementations block until done and do not retry. A solve that does not
/// converge is still `Ok`: the caller decides what non-convergence means.
pub trait NlpSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, model: &ConcreteModel, options: &SolveOptions)
    -> SolverResult<SolveOutcome>;
}

/// How Newton builds its Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JacobianScheme {
    Forward,
    Central,
}

/// Damped Newton over the concrete residuals.
#[derive(Debug, Clone)]
pub struct NewtonSolver {
    scheme: JacobianScheme,
}

impl NewtonSolver {
    pub fn new() -> Self {
        Self {
            scheme: JacobianScheme::Forward,
        }
    }

    pub fn central() -> Self {
        Self {
            scheme: JacobianScheme::Central,
        }
    }

    pub fn scheme(&self) -> JacobianScheme {
        self.scheme
    }
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NlpSolver for NewtonSolver {
    fn name(&self) -> &str {
        match self.scheme {
            JacobianScheme::Forward => "newton",
            JacobianScheme::Central => "newton-central",
        }
    }

    fn solve(
        &self,
        model: &ConcreteModel,
        options: &SolveOptions,
    ) -> SolverResult<SolveOutcome> {
        let residual_fn = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_vec(model.residuals(x.as_slice())))
        };
        let eps = options.fd_epsilon;
        let jacobian_fn = |x: &DVector<f64>| match self.scheme {
            JacobianScheme::Forward => finite_difference_jacobian(x, residual_fn, eps),
            JacobianScheme::Central => central_difference_jacobian(x, residual_fn, eps),
        };

        debug!(
            solver = self.name(),
            vars = model.num_vars(),
            cons = model.num_cons(),
            "solving"
        );

        let x0 = DVector::from_column_slice(model.initial_values());
        let result = newton_solve(x0, residual_fn, jacobian_fn, options)?;

        if !result.status.is_success() {
            warn!(
                solver = self.name(),
                status = %result.status,
                iterations = result.iterations,
                residual = result.residual_norm,
                "solve did not converge"
            );
        }

        Ok(SolveOutcome {
            values: result.x.as_slice().to_vec(),
            status: result.status,
            iterations: result.iterations,
            residual_norm: result.residual_norm,
        })
    }
}

/// Resolve a solver by name.
pub fn solver_factory(name: &str) -> SolverResult<Box<dyn NlpSolver>> {
    match name {
        "newton" => Ok(Box::new(NewtonSolver::new())),
        "newton-central" => Ok(Box::new(NewtonSolver::central())),
        other => Err(SolverError::Unavailable {
            name: other.to_string(),
            available: AVAILABLE_SOLVERS.join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::CExpr;
    use hn_aml::BinaryOp;

    fn bin(op: BinaryOp, a: CExpr, b: CExpr) -> CExpr {
        CExpr::Binary(op, Box::new(a), Box::new(b))
    }

    #[test]
    fn factory_resolves_known_names() {
        for name in AVAILABLE_SOLVERS {
            assert_eq!(solver_factory(name).unwrap().name(), *name);
        }
    }

    #[test]
    fn factory_rejects_unknown_name() {
        let err = solver_factory("ipopt").err().unwrap();
        assert!(matches!(err, SolverError::Unavailable { ref name, .. } if name == "ipopt"));
        assert!(err.to_string().contains("newton-central"));
    }

    #[test]
    fn newton_solves_coupled_system() {
        // x0 - x1 = 1, x0 * x1 = 6  =>  x = (3, 2) from a nearby start
        let c0 = bin(
            BinaryOp::Sub,
            bin(BinaryOp::Sub, CExpr::Var(0), CExpr::Var(1)),
            CExpr::Const(1.0),
        );
        let c1 = bin(
            BinaryOp::Sub,
            bin(BinaryOp::Mul, CExpr::Var(0), CExpr::Var(1)),
            CExpr::Const(6.0),
        );
        let model = ConcreteModel::new(vec![], vec![2.5, 1.5], vec![c0, c1]);

        for solver in [NewtonSolver::new(), NewtonSolver::central()] {
            let out = solver.solve(&model, &SolveOptions::default()).unwrap();
            assert_eq!(out.status, SolveStatus::Converged);
            assert!((out.values[0] - 3.0).abs() < 1e-6);
            assert!((out.values[1] - 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn non_convergence_is_not_an_error() {
        // x^2 + 1 = 0
        let c = bin(
            BinaryOp::Add,
            bin(BinaryOp::Mul, CExpr::Var(0), CExpr::Var(0)),
            CExpr::Const(1.0),
        );
        let model = ConcreteModel::new(vec![], vec![0.5], vec![c]);
        let options = SolveOptions {
            max_iterations: 10,
            ..SolveOptions::default()
        };
        let out = NewtonSolver::new().solve(&model, &options).unwrap();
        assert!(!out.status.is_success());
        assert_eq!(out.values.len(), 1);
    }
}
