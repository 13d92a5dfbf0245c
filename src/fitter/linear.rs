//! Closed-form weighted linear least squares, `y = a*x + b`, grounded on
//! `original_source/source/fitter/LinearLeastSquares.cpp` (spec.md §4.5).

use crate::error::{Result, SaxsError};
use crate::fitter::FitResult;

/// Fit `y = a*x + b` by weighted least squares with weights `1/sigma^2`.
///
/// Refuses to fit (spec.md §4.5 "Failure") when any `sigma_i <= 0` or when
/// there are not strictly more observations than the two free parameters.
pub fn fit(x: &[f64], y: &[f64], sigma: &[f64]) -> Result<FitResult> {
    if x.len() != y.len() || x.len() != sigma.len() {
        return Err(SaxsError::Size(format!(
            "linear fit columns of unequal length: x={}, y={}, sigma={}",
            x.len(),
            y.len(),
            sigma.len()
        )));
    }
    let n = x.len();
    if n <= 2 {
        return Err(SaxsError::Size(format!("linear fit needs more than 2 observations, got {n}")));
    }
    if sigma.iter().any(|&s| s <= 0.0) {
        return Err(SaxsError::BadRange("linear fit requires sigma_i > 0 for every observation".into()));
    }

    let mut s = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let w = 1.0 / (sigma[i] * sigma[i]);
        s += w;
        sx += w * x[i];
        sy += w * y[i];
        sxx += w * x[i] * x[i];
        sxy += w * x[i] * y[i];
    }

    let delta = s * sxx - sx * sx;
    if delta.abs() < 1e-300 {
        return Err(SaxsError::InvalidOperation("linear fit is degenerate: x values carry no spread".into()));
    }

    let a = (s * sxy - sx * sy) / delta;
    let b = (sxx * sy - sx * sxy) / delta;
    let sigma_a = (s / delta).sqrt();
    let sigma_b = (sxx / delta).sqrt();

    let chi_sq: f64 = (0..n).map(|i| {
        let resid = y[i] - (a * x[i] + b);
        (resid * resid) / (sigma[i] * sigma[i])
    }).sum();
    let dof = (n - 2) as f64;

    Ok(FitResult {
        params: vec![a, b],
        errors: vec![sigma_a, sigma_b],
        reduced_chi_sq: chi_sq / dof,
        function_evals: 1,
        landscape: Vec::new(),
    })
}
