//! Curve fitting: a closed-form linear stage wrapped by nested
//! golden-section searches over the physical parameters `cw` and `cx`
//! (spec.md §4.5).

pub mod excluded_volume;
pub mod hydration;
pub mod linear;

/// Outcome of any fit in this module: recovered parameter values, their
/// standard errors, the reduced chi-squared at the optimum, the number of
/// objective evaluations spent, and the landscape explored along the way
/// (spec.md §4.5, "the evaluated landscape").
#[derive(Clone, Debug)]
pub struct FitResult {
    pub params: Vec<f64>,
    pub errors: Vec<f64>,
    pub reduced_chi_sq: f64,
    pub function_evals: usize,
    pub landscape: Vec<(f64, f64)>,
}
