//! Dense fixed-bin distance distributions (spec.md §3).
//!
//! `Distribution1D` is used for a single-type atom-atom partial;
//! `Distribution2D` is indexed by `(ff_type, r)` for atom-water partials;
//! `Distribution3D` is indexed by `(ff_type_a, ff_type_b, r)` for per-type
//! atom-atom partials. Each has a *weighted* counterpart that additionally
//! tracks, per bin, the weighted mean distance so the Debye transform can
//! use true mean distances instead of bin centers (spec.md §4.3, "Weighted
//! distribution convention").

use crate::axis::Axis;

/// Counts-only 1-D distribution over distance bins.
#[derive(Clone, Debug)]
pub struct Distribution1D {
    pub counts: Vec<f64>,
    pub bin_width: f64,
}

impl Distribution1D {
    pub fn new(bins: usize, bin_width: f64) -> Self {
        Self { counts: vec![0.0; bins], bin_width }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[inline]
    pub fn add(&mut self, distance: f64, weight: f64) {
        let b = (distance / self.bin_width) as usize;
        if b < self.counts.len() {
            self.counts[b] += weight;
        } else if let Some(last) = self.counts.last_mut() {
            // Defensive clamp: a pair distance that overruns the configured
            // axis is folded into the final bin rather than dropped, so the
            // total weight is always conserved.
            *last += weight;
        }
    }

    pub fn add_assign(&mut self, other: &Distribution1D) {
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
    }

    /// Representative distance of bin `i`: the bin's left edge for the
    /// unweighted variant.
    pub fn representative(&self, i: usize) -> f64 {
        i as f64 * self.bin_width
    }

    /// Trim trailing zero bins, keeping at least `min_bins` (spec.md §4.3
    /// "Axis downsizing" edge case).
    pub fn trim(&mut self, min_bins: usize) {
        let mut last_nonzero = 0;
        for (i, c) in self.counts.iter().enumerate() {
            if *c != 0.0 {
                last_nonzero = i;
            }
        }
        let new_len = (last_nonzero + 1).max(min_bins).min(self.counts.len());
        self.counts.truncate(new_len);
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// Weighted 1-D distribution: each bin also accumulates `r*w_i*w_j` so the
/// finalized representative distance is the weighted mean of its
/// contributions rather than the bin's left edge.
#[derive(Clone, Debug)]
pub struct WeightedDistribution1D {
    pub counts: Vec<f64>,
    pub weighted_distance_sum: Vec<f64>,
    pub bin_width: f64,
}

impl WeightedDistribution1D {
    pub fn new(bins: usize, bin_width: f64) -> Self {
        Self { counts: vec![0.0; bins], weighted_distance_sum: vec![0.0; bins], bin_width }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn add(&mut self, distance: f64, weight: f64) {
        let b = ((distance / self.bin_width) as usize).min(self.counts.len().saturating_sub(1));
        if self.counts.is_empty() {
            return;
        }
        self.counts[b] += weight;
        self.weighted_distance_sum[b] += distance * weight;
    }

    pub fn add_assign(&mut self, other: &WeightedDistribution1D) {
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        for (a, b) in self.weighted_distance_sum.iter_mut().zip(&other.weighted_distance_sum) {
            *a += b;
        }
    }

    /// Weighted mean distance of bin `i`; falls back to the bin's left edge
    /// when the bin has no contributions (avoids 0/0).
    pub fn representative(&self, i: usize) -> f64 {
        if self.counts[i] != 0.0 {
            self.weighted_distance_sum[i] / self.counts[i]
        } else {
            i as f64 * self.bin_width
        }
    }

    pub fn trim(&mut self, min_bins: usize) {
        let mut last_nonzero = 0;
        for (i, c) in self.counts.iter().enumerate() {
            if *c != 0.0 {
                last_nonzero = i;
            }
        }
        let new_len = (last_nonzero + 1).max(min_bins).min(self.counts.len());
        self.counts.truncate(new_len);
        self.weighted_distance_sum.truncate(new_len);
    }

    pub fn to_unweighted(&self) -> Distribution1D {
        Distribution1D { counts: self.counts.clone(), bin_width: self.bin_width }
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

pub fn axis_for(bins: usize, bin_width: f64) -> Axis {
    Axis::new(0.0, bins as f64 * bin_width, bins)
}

/// The weighted/unweighted choice is a compile-time parameter (spec.md §9,
/// "Weighted distribution as a trait"): `HistogramManager<K>` is generic
/// over this trait rather than branching on a runtime flag in the hot loop.
pub trait Hist1D: Clone + Send + Sync + 'static {
    fn new(bins: usize, bin_width: f64) -> Self;
    fn add(&mut self, distance: f64, weight: f64);
    fn add_assign(&mut self, other: &Self);
    /// The representative distance of `bin`, read back by the Debye
    /// transform instead of recomputing from the bin index (spec.md §4.3).
    fn representative(&self, bin: usize) -> f64;
    fn trim(&mut self, min_bins: usize);
    fn len(&self) -> usize;
    fn counts(&self) -> &[f64];
    fn bin_width(&self) -> f64;
}

impl Hist1D for Distribution1D {
    fn new(bins: usize, bin_width: f64) -> Self {
        Distribution1D::new(bins, bin_width)
    }
    fn add(&mut self, distance: f64, weight: f64) {
        Distribution1D::add(self, distance, weight)
    }
    fn add_assign(&mut self, other: &Self) {
        Distribution1D::add_assign(self, other)
    }
    fn representative(&self, bin: usize) -> f64 {
        Distribution1D::representative(self, bin)
    }
    fn trim(&mut self, min_bins: usize) {
        Distribution1D::trim(self, min_bins)
    }
    fn len(&self) -> usize {
        Distribution1D::len(self)
    }
    fn counts(&self) -> &[f64] {
        &self.counts
    }
    fn bin_width(&self) -> f64 {
        self.bin_width
    }
}

impl Hist1D for WeightedDistribution1D {
    fn new(bins: usize, bin_width: f64) -> Self {
        WeightedDistribution1D::new(bins, bin_width)
    }
    fn add(&mut self, distance: f64, weight: f64) {
        WeightedDistribution1D::add(self, distance, weight)
    }
    fn add_assign(&mut self, other: &Self) {
        WeightedDistribution1D::add_assign(self, other)
    }
    fn representative(&self, bin: usize) -> f64 {
        WeightedDistribution1D::representative(self, bin)
    }
    fn trim(&mut self, min_bins: usize) {
        WeightedDistribution1D::trim(self, min_bins)
    }
    fn len(&self) -> usize {
        WeightedDistribution1D::len(self)
    }
    fn counts(&self) -> &[f64] {
        &self.counts
    }
    fn bin_width(&self) -> f64 {
        self.bin_width
    }
}

/// 2-D distribution indexed by `(ff_type, r)`: one `K` (weighted or
/// unweighted) per form-factor type, used for atom-water partials.
#[derive(Clone, Debug)]
pub struct GenericDistribution2D<K: Hist1D> {
    pub ff_count: usize,
    rows: Vec<K>,
}

impl<K: Hist1D> GenericDistribution2D<K> {
    pub fn new(ff_count: usize, bins: usize, bin_width: f64) -> Self {
        Self { ff_count, rows: (0..ff_count).map(|_| K::new(bins, bin_width)).collect() }
    }

    pub fn row(&self, ff: usize) -> &K {
        &self.rows[ff]
    }

    pub fn row_mut(&mut self, ff: usize) -> &mut K {
        &mut self.rows[ff]
    }

    pub fn add_assign(&mut self, other: &Self) {
        for (a, b) in self.rows.iter_mut().zip(&other.rows) {
            a.add_assign(b);
        }
    }

    pub fn trim(&mut self, min_bins: usize) {
        for r in self.rows.iter_mut() {
            r.trim(min_bins);
        }
    }

    /// Collapse every form-factor row into a single unweighted total.
    pub fn total(&self) -> Distribution1D {
        let bins = self.rows.iter().map(Hist1D::len).max().unwrap_or(0);
        let width = self.rows.first().map(Hist1D::bin_width).unwrap_or(1.0);
        let mut total = Distribution1D::new(bins, width);
        for row in &self.rows {
            for (i, c) in row.counts().iter().enumerate() {
                total.counts[i] += c;
            }
        }
        total
    }
}

/// 3-D distribution indexed by `(ff_type_a, ff_type_b, r)`.
#[derive(Clone, Debug)]
pub struct GenericDistribution3D<K: Hist1D> {
    pub ff_count: usize,
    rows: Vec<K>,
}

impl<K: Hist1D> GenericDistribution3D<K> {
    pub fn new(ff_count: usize, bins: usize, bin_width: f64) -> Self {
        Self { ff_count, rows: (0..ff_count * ff_count).map(|_| K::new(bins, bin_width)).collect() }
    }

    #[inline]
    fn idx(&self, ff_a: usize, ff_b: usize) -> usize {
        ff_a * self.ff_count + ff_b
    }

    pub fn row(&self, ff_a: usize, ff_b: usize) -> &K {
        &self.rows[self.idx(ff_a, ff_b)]
    }

    pub fn row_mut(&mut self, ff_a: usize, ff_b: usize) -> &mut K {
        let i = self.idx(ff_a, ff_b);
        &mut self.rows[i]
    }

    pub fn add_assign(&mut self, other: &Self) {
        for (a, b) in self.rows.iter_mut().zip(&other.rows) {
            a.add_assign(b);
        }
    }

    pub fn trim(&mut self, min_bins: usize) {
        for r in self.rows.iter_mut() {
            r.trim(min_bins);
        }
    }

    pub fn total(&self) -> Distribution1D {
        let bins = self.rows.iter().map(Hist1D::len).max().unwrap_or(0);
        let width = self.rows.first().map(Hist1D::bin_width).unwrap_or(1.0);
        let mut total = Distribution1D::new(bins, width);
        for row in &self.rows {
            for (i, c) in row.counts().iter().enumerate() {
                total.counts[i] += c;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unweighted_add_places_into_floor_bin() {
        let mut d = Distribution1D::new(10, 1.0);
        d.add(2.5, 1.0);
        assert_eq!(d.counts[2], 1.0);
    }

    #[test]
    fn weighted_representative_is_mean_not_bin_edge() {
        let mut d = WeightedDistribution1D::new(10, 1.0);
        d.add(2.1, 1.0);
        d.add(2.9, 1.0);
        assert!((d.representative(2) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn trim_keeps_minimum_bin_floor() {
        let mut d = Distribution1D::new(20, 1.0);
        d.add(3.0, 1.0);
        d.trim(10);
        assert_eq!(d.len(), 10);
    }

    #[test]
    fn trim_respects_largest_nonzero_bin() {
        let mut d = Distribution1D::new(50, 1.0);
        d.add(37.4_f64.div_euclid(1.0), 1.0); // bin 37
        d.trim(10);
        assert_eq!(d.len(), 38);
    }
}
