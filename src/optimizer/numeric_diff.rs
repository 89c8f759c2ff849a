//! Central-difference Jacobians for problems without analytic derivatives.

use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, Owned};
use rayon::prelude::*;

/// Jacobian of `problem.residuals()` at `problem.params()`.
///
/// The step for parameter `j` is `step * max(|x_j|, 1)`. Columns are
/// evaluated in parallel, each on its own clone of the problem, so the
/// problem itself is left untouched. Returns `None` if any evaluation fails.
pub fn numeric_jacobian<P>(problem: &P, step: f64) -> Option<DMatrix<f64>>
where
    P: LeastSquaresProblem<
            f64,
            Dyn,
            Dyn,
            ParameterStorage = Owned<f64, Dyn>,
            ResidualStorage = Owned<f64, Dyn>,
        > + Clone
        + Sync,
{
    let x = problem.params();

    let columns: Option<Vec<DVector<f64>>> = (0..x.len())
        .into_par_iter()
        .map(|j| {
            let h = step * x[j].abs().max(1.0);
            let mut shifted_problem = problem.clone();
            let mut shifted = x.clone();

            shifted[j] = x[j] + h;
            shifted_problem.set_params(&shifted);
            let plus = shifted_problem.residuals()?;

            shifted[j] = x[j] - h;
            shifted_problem.set_params(&shifted);
            let minus = shifted_problem.residuals()?;

            Some((plus - minus) / (2.0 * h))
        })
        .collect();
    let columns = columns?;

    if columns.is_empty() {
        let rows = problem.residuals()?.len();
        return Some(DMatrix::zeros(rows, 0));
    }
    Some(DMatrix::from_columns(&columns))
}
