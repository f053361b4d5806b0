//! Damped Newton iteration with backtracking line search.

use crate::error::SolverResult;
use crate::invoker::{SolveOptions, SolveStatus};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

/// Newton iteration result.
pub struct NewtonResult {
    /// Last iterate (the solution when converged)
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    pub status: SolveStatus,
}

/// Solve `J dx = -r`.
///
/// Square systems go through LU. Non-square systems (more unknowns than
/// retained equations) and singular Jacobians take the least-squares,
/// minimum-norm step from an SVD instead.
fn newton_step(jac: DMatrix<f64>, r: &DVector<f64>) -> Option<DVector<f64>> {
    let rhs = -r;
    if jac.is_square()
        && let Some(dx) = jac.clone().lu().solve(&rhs)
        && dx.iter().all(|v| v.is_finite())
    {
        return Some(dx);
    }
    let dx = jac.svd(true, true).solve(&rhs, 1e-12).ok()?;
    dx.iter().all(|v| v.is_finite()).then_some(dx)
}

/// Newton solver with line search.
///
/// Never fails because the iteration did not converge: the last iterate is
/// returned with a status saying why it stopped. Errors are reserved for the
/// residual or Jacobian callbacks themselves failing.
pub fn newton_solve<F, J>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    options: &SolveOptions,
) -> SolverResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> SolverResult<DMatrix<f64>>,
{
    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut r_norm = r.norm();
    let r0_norm = r_norm;

    let finish = |x, residual_norm, iterations, status| NewtonResult {
        x,
        residual_norm,
        iterations,
        status,
    };

    if !r_norm.is_finite() {
        return Ok(finish(x, r_norm, 0, SolveStatus::NumericFailure));
    }

    for iter in 0..options.max_iterations {
        if options.tee {
            info!(iter, residual = r_norm, "newton");
        } else {
            debug!(iter, residual = r_norm, "newton");
        }

        // Check convergence
        if r_norm < options.abs_tol || r_norm < options.rel_tol * r0_norm {
            return Ok(finish(x, r_norm, iter, SolveStatus::Converged));
        }

        let jac = jacobian_fn(&x)?;
        let Some(dx) = newton_step(jac, &r) else {
            return Ok(finish(x, r_norm, iter, SolveStatus::NumericFailure));
        };

        // Backtracking line search on the residual norm
        let mut alpha = 1.0;
        let mut x_new = &x + alpha * &dx;
        let mut r_new = residual_fn(&x_new)?;
        let mut r_new_norm = r_new.norm();

        for _ in 0..options.max_line_search_iters {
            if r_new_norm.is_finite() && r_new_norm < r_norm {
                break;
            }
            alpha *= options.line_search_beta;
            x_new = &x + alpha * &dx;
            r_new = residual_fn(&x_new)?;
            r_new_norm = r_new.norm();
        }

        if !r_new_norm.is_finite() {
            return Ok(finish(x, r_norm, iter + 1, SolveStatus::NumericFailure));
        }

        x = x_new;
        r = r_new;
        r_norm = r_new_norm;

        if alpha < 1e-10 {
            return Ok(finish(x, r_norm, iter + 1, SolveStatus::Stagnated));
        }
    }

    if r_norm < options.abs_tol {
        return Ok(finish(
            x,
            r_norm,
            options.max_iterations,
            SolveStatus::Converged,
        ));
    }
    Ok(finish(
        x,
        r_norm,
        options.max_iterations,
        SolveStatus::MaxIterations,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_quadratic() {
        // Solve x^2 - 4 = 0 from x = 3
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        };
        let jacobian = |x: &DVector<f64>| -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };

        let x0 = DVector::from_element(1, 3.0);
        let result = newton_solve(x0, residual, jacobian, &SolveOptions::default()).unwrap();

        assert_eq!(result.status, SolveStatus::Converged);
        assert!((result.x[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn max_iterations_returns_last_iterate() {
        // x^2 + 1 = 0 has no real root
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] + 1.0))
        };
        let jacobian = |x: &DVector<f64>| -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };

        let options = SolveOptions {
            max_iterations: 5,
            ..SolveOptions::default()
        };
        let result = newton_solve(DVector::from_element(1, 1.0), residual, jacobian, &options)
            .unwrap();

        assert!(!result.status.is_success());
        assert!(result.x[0].is_finite());
    }

    #[test]
    fn underdetermined_system_takes_min_norm_step() {
        // x0 + x1 - 2 = 0
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] + x[1] - 2.0))
        };
        let jacobian =
            |_: &DVector<f64>| -> SolverResult<DMatrix<f64>> { Ok(DMatrix::from_element(1, 2, 1.0)) };

        let result = newton_solve(
            DVector::zeros(2),
            residual,
            jacobian,
            &SolveOptions::default(),
        )
        .unwrap();

        assert_eq!(result.status, SolveStatus::Converged);
        assert!((result.x[0] - 1.0).abs() < 1e-9);
        assert!((result.x[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_system_converges_immediately() {
        let residual = |_: &DVector<f64>| -> SolverResult<DVector<f64>> { Ok(DVector::zeros(0)) };
        let jacobian = |_: &DVector<f64>| -> SolverResult<DMatrix<f64>> { Ok(DMatrix::zeros(0, 0)) };
        let result =
            newton_solve(DVector::zeros(0), residual, jacobian, &SolveOptions::default()).unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
        assert_eq!(result.iterations, 0);
    }
}
