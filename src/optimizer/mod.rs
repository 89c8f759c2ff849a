//! Nonlinear least squares.
//!
//! Problems implement `levenberg_marquardt::LeastSquaresProblem`; the
//! solver here adds robust losses, numeric Jacobians and a hard time budget.

pub mod budgeted_lm;
pub mod numeric_diff;
pub mod robust;

pub use budgeted_lm::{BudgetedLevenbergMarquardt, SolverSummary, Termination};
pub use numeric_diff::numeric_jacobian;
pub use robust::{HuberLoss, RobustLoss, TrivialLoss};
