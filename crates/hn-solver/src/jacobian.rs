//! Finite difference Jacobian computation.

use crate::error::SolverResult;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

fn assemble(rows: usize, columns: Vec<DVector<f64>>) -> DMatrix<f64> {
    let mut jac = DMatrix::zeros(rows, columns.len());
    for (j, col) in columns.into_iter().enumerate() {
        jac.set_column(j, &col);
    }
    jac
}

/// Compute Jacobian using forward finite differences.
///
/// For each column j, perturbs x[j] by epsilon and computes (f(x+e) - f(x))/epsilon.
/// Columns are independent and evaluated in parallel.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>> + Sync,
{
    let f_x = f(x)?;
    let m = f_x.len();

    let columns = (0..x.len())
        .into_par_iter()
        .map(|j| {
            let mut x_perturbed = x.clone();
            let dx = epsilon * x[j].abs().max(1.0);
            x_perturbed[j] += dx;
            let f_perturbed = f(&x_perturbed)?;
            Ok((f_perturbed - &f_x) / dx)
        })
        .collect::<SolverResult<Vec<_>>>()?;

    Ok(assemble(m, columns))
}

/// Compute Jacobian using central finite differences (more accurate but 2x cost).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>> + Sync,
{
    let m = f(x)?.len();

    let columns = (0..x.len())
        .into_par_iter()
        .map(|j| {
            let dx = epsilon * x[j].abs().max(1.0);

            let mut x_plus = x.clone();
            x_plus[j] += dx;
            let f_plus = f(&x_plus)?;

            let mut x_minus = x.clone();
            x_minus[j] -= dx;
            let f_minus = f(&x_minus)?;

            Ok((f_plus - f_minus) / (2.0 * dx))
        })
        .collect::<SolverResult<Vec<_>>>()?;

    Ok(assemble(m, columns))
}
