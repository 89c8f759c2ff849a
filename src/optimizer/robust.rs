//! Robust loss functions.
//!
//! A loss maps the squared residual `s = r²` to `ρ(s)` and follows the
//! ceres convention: the cost of a residual vector is `½ Σ ρ(rᵢ²)`, and
//! `ρ(s) = s` for small residuals.

use nalgebra::DVector;

pub trait RobustLoss: Send + Sync {
    /// `[ρ(s), ρ'(s), ρ''(s)]`.
    fn evaluate(&self, s: f64) -> [f64; 3];

    /// `½ Σ ρ(rᵢ²)`.
    fn cost(&self, residuals: &DVector<f64>) -> f64 {
        0.5 * residuals.iter().map(|r| self.evaluate(r * r)[0]).sum::<f64>()
    }

    /// Square root of `ρ'` at each residual, the IRLS row weight.
    fn sqrt_weights(&self, residuals: &DVector<f64>) -> DVector<f64> {
        residuals.map(|r| self.evaluate(r * r)[1].max(0.0).sqrt())
    }
}

/// Plain least squares.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialLoss;

impl RobustLoss for TrivialLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        [s, 1.0, 0.0]
    }
}

/// Quadratic below `delta`, linear above.
#[derive(Debug, Clone, Copy)]
pub struct HuberLoss {
    delta: f64,
    delta2: f64,
}

impl HuberLoss {
    pub fn new(delta: f64) -> Self {
        Self {
            delta,
            delta2: delta * delta,
        }
    }
}

impl RobustLoss for HuberLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        if s > self.delta2 {
            let r = s.sqrt();
            let rho1 = (self.delta / r).max(f64::MIN_POSITIVE);
            [2.0 * self.delta * r - self.delta2, rho1, -rho1 / (2.0 * s)]
        } else {
            [s, 1.0, 0.0]
        }
    }
}
