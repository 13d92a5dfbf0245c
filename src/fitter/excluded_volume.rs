//! Fit the excluded-volume coefficient `cx` as an outer parameter on top
//! of the `cw` hydration fit: a coarse grid scan over `cx` followed by a
//! golden-section refinement around the best grid point (spec.md §4.5,
//! "a second outer parameter via 2-D scan + local refinement").

use crate::composite::CompositeDistanceHistogram;
use crate::dataset::Dataset;
use crate::distribution::Hist1D;
use crate::error::{Result, SaxsError};
use crate::fitter::{hydration, FitResult};
use crate::minimizer;

const CX_MIN: f64 = 0.0;
const CX_MAX: f64 = 2.0;
const GRID_POINTS: usize = 11;
const REFINE_HALF_WIDTH: f64 = 0.2;
const CHI_SQ_REL_TOL: f64 = 1e-4;
const MAX_ITER: usize = 100;

/// `params` is `[cx, cw, a, b]`; `errors` is `[0.0, 0.0, sigma_a, sigma_b]`
/// for the same reason as [`hydration::fit`] (no curvature estimate for
/// the outer grid/golden-section parameters).
pub fn fit<K: Hist1D>(hist: &mut CompositeDistanceHistogram<K>, dataset: &Dataset, q_min: f64, q_max: f64) -> Result<FitResult> {
    if dataset.is_empty() {
        return Err(SaxsError::Size("excluded-volume fit requires at least one observation".into()));
    }

    let mut landscape = Vec::new();
    let mut best: Option<(f64, FitResult)> = None;
    let mut total_evals = 0usize;

    for i in 0..GRID_POINTS {
        let cx = CX_MIN + (CX_MAX - CX_MIN) * i as f64 / (GRID_POINTS - 1) as f64;
        hist.cx = cx;
        match hydration::fit(hist, dataset, q_min, q_max) {
            Ok(inner) => {
                total_evals += inner.function_evals;
                landscape.push((cx, inner.reduced_chi_sq));
                if best.as_ref().is_none_or(|(best_cx_chi, _)| inner.reduced_chi_sq < *best_cx_chi) {
                    best = Some((inner.reduced_chi_sq, inner));
                }
            }
            Err(e) => {
                log::warn!("excluded-volume fit: cx={cx} rejected during grid scan: {e}");
                landscape.push((cx, f64::INFINITY));
            }
        }
    }

    let (_, grid_best) = best.ok_or_else(|| SaxsError::InvalidOperation("excluded-volume fit: every grid point failed".into()))?;
    let grid_cx = grid_best.params.get(0).copied();

    let refine_center = grid_cx.unwrap_or(0.0);
    let lo = (refine_center - REFINE_HALF_WIDTH).max(CX_MIN);
    let hi = (refine_center + REFINE_HALF_WIDTH).min(CX_MAX);

    let mut best_refined: Option<(f64, FitResult, f64)> = None;
    let refine_result = minimizer::minimize(
        |cx| {
            hist.cx = cx;
            match hydration::fit(hist, dataset, q_min, q_max) {
                Ok(inner) => {
                    total_evals += inner.function_evals;
                    let chi_sq = inner.reduced_chi_sq;
                    if best_refined.as_ref().is_none_or(|(best_chi, _, _)| chi_sq < *best_chi) {
                        best_refined = Some((chi_sq, inner, cx));
                    }
                    chi_sq
                }
                Err(e) => {
                    log::warn!("excluded-volume fit: cx={cx} rejected during refinement: {e}");
                    f64::INFINITY
                }
            }
        },
        lo,
        hi,
        CHI_SQ_REL_TOL,
        MAX_ITER,
    );
    landscape.extend(refine_result.landscape.iter().copied());

    let (_, inner, cx) = best_refined.unwrap_or((grid_best.reduced_chi_sq, grid_best, refine_center));
    hist.cx = cx;

    Ok(FitResult {
        params: vec![cx, inner.params[0], inner.params[1], inner.params[2]],
        errors: vec![0.0, 0.0, inner.errors[1], inner.errors[2]],
        reduced_chi_sq: inner.reduced_chi_sq,
        function_evals: total_evals,
        landscape,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, FormFactorType};
    use crate::body::{Body, Molecule};
    use crate::composite::CompositeDistanceHistogram;
    use crate::distribution::Distribution1D;
    use crate::histogram::HistogramManager;
    use lin_alg::f32::Vec3;

    fn cube_atoms() -> Vec<Atom> {
        let mut atoms = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    atoms.push(Atom::new(Vec3::new(x, y, z), 1.0, FormFactorType::C));
                }
            }
        }
        atoms
    }

    #[test]
    fn grid_plus_refinement_stays_in_bounds() {
        let mut molecule = Molecule::new(vec![Body::new(cube_atoms())]);
        let mut manager: HistogramManager<Distribution1D> = HistogramManager::new(crate::axis::Axis::new(0.0, 20.0, 40));
        let parts = manager.calculate_all(&mut molecule);
        let mut hist = CompositeDistanceHistogram::new_avg(FormFactorType::COUNT, parts.p_aa, parts.p_aw, parts.p_ww);

        let profile = hist.profile_window(0.0, 0.1).unwrap();
        let truth = profile.total();
        let sigma = vec![0.01; truth.len()];
        let q: Vec<f64> = (0..truth.len()).map(|i| profile.q_axis.bin_value(i)).collect();
        let dataset = Dataset::new(q, truth, sigma).unwrap();

        let result = fit(&mut hist, &dataset, 0.0, 0.1).unwrap();
        assert!(result.params[0] >= 0.0 && result.params[0] <= 2.0);
        assert!(result.params[1] >= 0.0 && result.params[1] <= 2.0);
    }
}
