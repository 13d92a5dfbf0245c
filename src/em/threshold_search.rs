//! Adaptive search over EM density thresholds (spec.md §4.6), grounded on
//! `original_source/executable/em.cpp`'s fit-by-threshold driver.

use crate::axis::Axis;
use crate::composite::CompositeDistanceHistogram;
use crate::dataset::Dataset;
use crate::distribution::Distribution1D;
use crate::em::{ImageStack, ProteinManager};
use crate::error::Result;
use crate::fitter::hydration;
use crate::histogram::HistogramManager;
use crate::minimizer;

/// How many consecutive increases the coarse scan tolerates before giving
/// up on a branch of the landscape (spec.md §4.6 step 3).
const MAX_CONSECUTIVE_INCREASES: usize = 6;
const SMOOTH_WINDOW: usize = 7;
const INTERPOLATE_FACTOR: usize = 5;
const LOCAL_MINIMA_SEPARATION_FRACTION: f64 = 0.1;
const EXPLORE_SAMPLES: usize = 41;

#[derive(Clone, Debug)]
pub struct ThresholdSearchResult {
    pub sigma_star: f64,
    pub chi_sq: f64,
    pub mass: f64,
    /// The coarse `(sigma, chi_sq)` scan, smoothed and interpolated.
    pub landscape: Vec<(f64, f64)>,
    /// The dense resample around the chosen minimum (spec.md §4.6 step 5).
    pub explored: Vec<(f64, f64)>,
}

/// Find the density threshold `sigma*` that best fits `dataset` over
/// `[q_min, q_max]` (spec.md §4.6). `distance_axis` bounds the histogram
/// manager's distance range for the bodies generated at each candidate
/// threshold; `levels` is the number of charge-density buckets to build.
pub fn search(
    image: &ImageStack,
    levels: usize,
    distance_axis: Axis,
    dataset: &Dataset,
    q_min: f64,
    q_max: f64,
) -> Result<ThresholdSearchResult> {
    let mut manager = ProteinManager::new(image, levels)?;
    let mut hist_mgr: HistogramManager<Distribution1D> = HistogramManager::new(distance_axis);
    let (sigma_min, sigma_max) = manager.sigma_range();

    let mut objective = |sigma: f64| -> f64 {
        match manager.set_threshold(sigma) {
            Ok(()) => {}
            Err(e) => {
                log::warn!("EM threshold search: sigma={sigma} out of range: {e}");
                return f64::INFINITY;
            }
        }
        let parts = hist_mgr.calculate_all(manager.molecule());
        let mut hist = CompositeDistanceHistogram::new_avg(crate::atom::FormFactorType::COUNT, parts.p_aa, parts.p_aw, parts.p_ww);
        match hydration::fit(&mut hist, dataset, q_min, q_max) {
            Ok(fit) => fit.reduced_chi_sq,
            Err(e) => {
                log::warn!("EM threshold search: sigma={sigma} rejected by hydration fit: {e}");
                f64::INFINITY
            }
        }
    };

    // Scan from sigma_max down to sigma_min (spec.md §4.6: the incremental
    // bucket update is cheapest when buckets are peeled off monotonically).
    let scan_axis = Axis::new(sigma_min, sigma_max, levels.max(2));
    let descending: Vec<f64> = (0..scan_axis.bins).rev().map(|i| scan_axis.bin_value(i)).collect();
    let mut raw_landscape = Vec::with_capacity(descending.len());
    let mut streak = 0usize;
    let mut prev: Option<f64> = None;
    for sigma in descending {
        let chi_sq = objective(sigma);
        raw_landscape.push((sigma, chi_sq));
        match prev {
            Some(p) if chi_sq > p => streak += 1,
            _ => streak = 0,
        }
        prev = Some(chi_sq);
        if streak >= MAX_CONSECUTIVE_INCREASES {
            break;
        }
    }
    raw_landscape.reverse();

    let smoothed = minimizer::smooth_and_interpolate(&raw_landscape, SMOOTH_WINDOW, INTERPOLATE_FACTOR);
    let span = sigma_max - sigma_min;
    let minima = minimizer::local_minima(&smoothed, span * LOCAL_MINIMA_SEPARATION_FRACTION);

    let global = minima
        .iter()
        .copied()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .or_else(|| smoothed.iter().copied().min_by(|a, b| a.1.partial_cmp(&b.1).unwrap()))
        .unwrap_or((sigma_min, f64::INFINITY));

    let half_width = (span * LOCAL_MINIMA_SEPARATION_FRACTION / 2.0).max(scan_axis.width());
    let explored = minimizer::explore_minimum(
        |sigma| objective(sigma.clamp(sigma_min, sigma_max)),
        global.0,
        half_width,
        EXPLORE_SAMPLES,
    );

    let (sigma_star, chi_sq) = explored.iter().copied().min_by(|a, b| a.1.partial_cmp(&b.1).unwrap()).unwrap_or(global);

    manager.set_threshold(sigma_star.clamp(sigma_min, sigma_max))?;
    let mass = manager.active_mass(image.header.voxel_volume());

    Ok(ThresholdSearchResult { sigma_star, chi_sq, mass, landscape: smoothed, explored })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::em::MapHeader;

    fn sphere_stack(radius: f32, n: usize, voxel_size: f64, density: f64) -> ImageStack {
        let half = (n / 2) as f32;
        let mut values = vec![0.0; n * n * n];
        for iz in 0..n {
            for iy in 0..n {
                for ix in 0..n {
                    let dx = ix as f32 - half;
                    let dy = iy as f32 - half;
                    let dz = iz as f32 - half;
                    let r = (dx * dx + dy * dy + dz * dz).sqrt() * voxel_size as f32;
                    values[(iz * n + iy) * n + ix] = if r <= radius { density } else { 0.0 };
                }
            }
        }
        let half_extent = half as f64 * voxel_size;
        ImageStack::new(
            MapHeader { nx: n, ny: n, nz: n, voxel_size, origin: (-half_extent, -half_extent, -half_extent) },
            values,
        )
    }

    #[test]
    fn sphere_threshold_search_recovers_plausible_sigma() {
        let stack = sphere_stack(6.0, 16, 1.0, 1.0);
        let distance_axis = Axis::new(0.0, 30.0, 60);

        // Ground-truth dataset: the fully-thresholded sphere's own profile.
        let mut truth_mgr = ProteinManager::new(&stack, 12).unwrap();
        truth_mgr.set_threshold(0.1).unwrap();
        let mut truth_hist_mgr: HistogramManager<Distribution1D> = HistogramManager::new(distance_axis);
        let parts = truth_hist_mgr.calculate_all(truth_mgr.molecule());
        let truth_hist = CompositeDistanceHistogram::new_avg(crate::atom::FormFactorType::COUNT, parts.p_aa, parts.p_aw, parts.p_ww);
        let profile = truth_hist.profile_window(0.0, 0.1).unwrap();
        let truth = profile.total();
        let sigma = vec![0.05; truth.len()];
        let q: Vec<f64> = (0..truth.len()).map(|i| profile.q_axis.bin_value(i)).collect();
        let dataset = Dataset::new(q, truth, sigma).unwrap();

        let result = search(&stack, 12, distance_axis, &dataset, 0.0, 0.1).unwrap();
        assert!(result.sigma_star >= 0.0 && result.sigma_star <= 1.0);
        assert!(result.mass >= 0.0);
    }
}
