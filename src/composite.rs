//! Composite distance histogram with form factors: applies the three free
//! scale parameters and runs the Debye transform into a per-q intensity
//! profile (spec.md §4.4).
//!
//! Raw contributions are combined as:
//!
//! ```text
//! I(q) = aa(q) − 2·cx·G(q)·ax(q) + G(q)²·xx(q) + 2·cw·aw(q) − 2·cx·G(q)·cw·wx(q) + cw²·ww(q) + background
//! ```
//!
//! where `G(q)` is the excluded-volume scaling factor (see
//! [`excluded_volume_g`]). Each of `aa/ax/xx/aw/wx/ww` is exposed
//! independently through [`ScatteringProfile`] so a caller can reconstruct
//! `I(q)` additively; the identity holds to 1e-3 relative (spec.md §8).

use crate::atom::FormFactorType;
use crate::axis::{default_q_axis, Axis};
use crate::debye::{self, ArrayDebyeTable};
use crate::distribution::{Distribution1D, GenericDistribution2D, GenericDistribution3D, Hist1D};
use crate::error::Result;
use crate::form_factor::{self, PrecalculatedFormFactorProduct};

/// Which Maclaurin-vs-default excluded-volume form is used (spec.md §9
/// Open Question: "implementations should expose both forms and make the
/// choice a configuration option").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExcludedVolumeForm {
    Default,
    PepsiMaclaurin,
}

/// `cx³ · exp(−rm²·(cx²−1)·q²/4)`, per spec.md §4.4. The Pepsi variant drops
/// the q-dependent exponential term, per the source comment referenced in
/// spec.md §9's second Open Question.
pub fn excluded_volume_g(cx: f64, q: f64, mean_radius: f64, form: ExcludedVolumeForm) -> f64 {
    match form {
        ExcludedVolumeForm::Default => cx.powi(3) * (-mean_radius * mean_radius * (cx * cx - 1.0) * q * q / 4.0).exp(),
        ExcludedVolumeForm::PepsiMaclaurin => cx.powi(3),
    }
}

/// The three canonical excluded-volume variants (spec.md §4.4).
///
/// `Avg` derives its excluded-volume partials from `P_aa`/`P_aw`'s shape
/// rather than storing them: the excluded-volume cloud is assumed to sit at
/// the same positions as the atoms it replaces, reweighted by the ratio of
/// the averaged excluded-volume charge to the mean atomic weight (spec.md
/// §9: "P_xx is derived from P_aa by re-weighting with an excluded-volume
/// charge scalar"). `Explicit`/`Grid` carry their own independently
/// accumulated partials.
pub enum Variant<K: Hist1D> {
    Avg,
    Explicit { p_ax: GenericDistribution2D<K>, p_xx: K, p_wx: K },
    Grid { p_ax: GenericDistribution2D<K>, p_xx: K, p_wx: K },
}

/// Owns `P_aa`, `P_aw`, `P_ww` (plus, for `Explicit`/`Grid`, `P_ax`, `P_wx`,
/// `P_xx`), the distance axis, and the three free scale parameters
/// (spec.md §3).
pub struct CompositeDistanceHistogram<K: Hist1D> {
    pub ff_count: usize,
    pub p_aa: GenericDistribution3D<K>,
    pub p_aw: GenericDistribution2D<K>,
    pub p_ww: K,
    pub variant: Variant<K>,
    pub cw: f64,
    pub cx: f64,
    pub background: f64,
    pub ev_form: ExcludedVolumeForm,
    pub mean_radius: f64,
    /// Averaged per-excluded-volume-point charge (`Z_exv_avg`), used only by
    /// the `Avg` variant. Preserves the invariant `Z_exv_avg · N_atoms =
    /// volume_grid · ρ_water` (spec.md §9 Open Question 1); the debug-only
    /// `volume_scaling` override mentioned there is not implemented.
    pub z_exv_avg: f64,
    pub mean_atom_weight: f64,
}

impl<K: Hist1D> CompositeDistanceHistogram<K> {
    pub fn new_avg(
        ff_count: usize,
        p_aa: GenericDistribution3D<K>,
        p_aw: GenericDistribution2D<K>,
        p_ww: K,
    ) -> Self {
        Self {
            ff_count,
            p_aa,
            p_aw,
            p_ww,
            variant: Variant::Avg,
            cw: 1.0,
            cx: 1.0,
            background: 0.0,
            ev_form: ExcludedVolumeForm::Default,
            mean_radius: 1.62, // representative mean atomic radius (Å), protein-average
            z_exv_avg: 0.0,
            mean_atom_weight: 1.0,
        }
    }

    pub fn with_explicit(mut self, p_ax: GenericDistribution2D<K>, p_xx: K, p_wx: K) -> Self {
        self.variant = Variant::Explicit { p_ax, p_xx, p_wx };
        self
    }

    pub fn with_grid(mut self, p_ax: GenericDistribution2D<K>, p_xx: K, p_wx: K) -> Self {
        self.variant = Variant::Grid { p_ax, p_xx, p_wx };
        self
    }

    fn charge_ratio(&self) -> f64 {
        if self.mean_atom_weight.abs() < 1e-12 {
            0.0
        } else {
            self.z_exv_avg / self.mean_atom_weight
        }
    }

    /// Recombine the raw-distance-domain partials into the total histogram
    /// `p_tot[i] = p_aa[i] + 2k·p_aw[i] + k²·p_ww[i]` for a candidate
    /// hydration scaling factor `k`, without touching the stored partials or
    /// `self.cw`. Grounded on
    /// `original_source/source/hist/intensity_calculator/CompositeDistanceHistogram.cpp`'s
    /// `MasterHistogram` incremental combination (spec.md §4.4 water
    /// scaling).
    pub fn apply_water_scaling_factor(&self, k: f64) -> Distribution1D {
        let aa = self.p_aa.total();
        let aw = self.p_aw.total();
        let ww = self.p_ww.counts();
        let bins = aa.len().max(aw.len()).max(ww.len());
        let mut p_tot = Distribution1D::new(bins, aa.bin_width);
        for i in 0..bins {
            let aa_i = aa.counts.get(i).copied().unwrap_or(0.0);
            let aw_i = aw.counts.get(i).copied().unwrap_or(0.0);
            let ww_i = ww.get(i).copied().unwrap_or(0.0);
            p_tot.counts[i] = aa_i + 2.0 * k * aw_i + k * k * ww_i;
        }
        p_tot
    }

    /// Evaluate the full scattering profile over `[q_min, q_max]`, a
    /// sub-range of the default q-axis. Does not recompute any partials,
    /// only windows the transform (spec.md §4.4 "q-axis windowing").
    pub fn profile_window(&self, q_min: f64, q_max: f64) -> Result<ScatteringProfile> {
        let default_q = default_q_axis();
        let window = default_q.sub_axis(q_min, q_max)?;
        let offset = default_q.get_bin(window.min);

        let ff_table = form_factor::default_product_table();
        let sinc_table = debye::default_table();
        let water_idx = FormFactorType::Water.index();
        let exv_idx = FormFactorType::ExcludedVolume.index();

        let aa_total_shape = self.p_aa.total();
        let aw_total_shape = self.p_aw.total();

        let bins = window.bins;
        let mut aa = Vec::with_capacity(bins);
        let mut aw = Vec::with_capacity(bins);
        let mut ww = Vec::with_capacity(bins);
        let mut ax = Vec::with_capacity(bins);
        let mut xx = Vec::with_capacity(bins);
        let mut wx = Vec::with_capacity(bins);

        for local_i in 0..bins {
            let q_bin = offset + local_i;
            let q = default_q.bin_value(q_bin);

            let raw_aa = transform_3d(&self.p_aa, self.ff_count, q_bin, q, ff_table, sinc_table);
            let raw_aw = transform_2d(&self.p_aw, self.ff_count, water_idx, q_bin, q, ff_table, sinc_table);
            let raw_ww = transform_cross1d(&self.p_ww, water_idx, water_idx, q_bin, q, ff_table, sinc_table);

            let (raw_ax, raw_xx, raw_wx) = match &self.variant {
                Variant::Avg => {
                    let rho = self.charge_ratio();
                    let atom_idx = FormFactorType::C.index();
                    let f_ax = ff_table.get(atom_idx, exv_idx, q_bin);
                    let f_xx = ff_table.get(exv_idx, exv_idx, q_bin);
                    let f_wx = ff_table.get(water_idx, exv_idx, q_bin);
                    let shape_aa = debye_transform(&aa_total_shape, q_bin, sinc_table);
                    let shape_aw = debye_transform(&aw_total_shape, q_bin, sinc_table);
                    (rho * f_ax * shape_aa, rho * rho * f_xx * shape_aa, rho * f_wx * shape_aw)
                }
                Variant::Explicit { p_ax, p_xx, p_wx } | Variant::Grid { p_ax, p_xx, p_wx } => (
                    transform_2d(p_ax, self.ff_count, exv_idx, q_bin, q, ff_table, sinc_table),
                    transform_cross1d(p_xx, exv_idx, exv_idx, q_bin, q, ff_table, sinc_table),
                    transform_cross1d(p_wx, water_idx, exv_idx, q_bin, q, ff_table, sinc_table),
                ),
            };

            let g = excluded_volume_g(self.cx, q, self.mean_radius, self.ev_form);

            aa.push(raw_aa);
            aw.push(2.0 * self.cw * raw_aw);
            ww.push(self.cw * self.cw * raw_ww);
            ax.push(-2.0 * g * raw_ax);
            xx.push(g * g * raw_xx);
            wx.push(-2.0 * g * self.cw * raw_wx);
        }

        Ok(ScatteringProfile { q_axis: window, aa, ax, xx, aw, wx, ww, background: self.background })
    }
}

/// Per-q transform of a same-type row (used for `P_ww`, and for the stored
/// `P_xx`/`P_wx` rows of `Explicit`/`Grid`).
fn transform_cross1d<K: Hist1D>(
    row: &K,
    ff_a: usize,
    ff_b: usize,
    q_bin: usize,
    _q: f64,
    ff_table: &PrecalculatedFormFactorProduct,
    sinc_table: &ArrayDebyeTable,
) -> f64 {
    ff_table.get(ff_a, ff_b, q_bin) * debye_transform(row, q_bin, sinc_table)
}

fn transform_3d<K: Hist1D>(
    p: &GenericDistribution3D<K>,
    ff_count: usize,
    q_bin: usize,
    _q: f64,
    ff_table: &PrecalculatedFormFactorProduct,
    sinc_table: &ArrayDebyeTable,
) -> f64 {
    let mut sum = 0.0;
    for a in 0..ff_count {
        for b in 0..ff_count {
            let row = p.row(a, b);
            if row.counts().iter().all(|&c| c == 0.0) {
                continue;
            }
            sum += ff_table.get(a, b, q_bin) * debye_transform(row, q_bin, sinc_table);
        }
    }
    sum
}

fn transform_2d<K: Hist1D>(
    p: &GenericDistribution2D<K>,
    ff_count: usize,
    other_ff: usize,
    q_bin: usize,
    _q: f64,
    ff_table: &PrecalculatedFormFactorProduct,
    sinc_table: &ArrayDebyeTable,
) -> f64 {
    let mut sum = 0.0;
    for a in 0..ff_count {
        let row = p.row(a);
        if row.counts().iter().all(|&c| c == 0.0) {
            continue;
        }
        sum += ff_table.get(a, other_ff, q_bin) * debye_transform(row, q_bin, sinc_table);
    }
    sum
}

/// `Σ_b S[q,b]·P(b)`, reading each bin's representative distance back from
/// the distribution rather than assuming it equals the bin edge (spec.md
/// §4.3 weighted-distribution convention), and mapping it to the nearest
/// table d-bin so the same table serves both weighted and unweighted `K`.
fn debye_transform<K: Hist1D>(row: &K, q_bin: usize, sinc_table: &ArrayDebyeTable) -> f64 {
    let counts = row.counts();
    let mut sum = 0.0;
    for b in 0..counts.len() {
        let c = counts[b];
        if c == 0.0 {
            continue;
        }
        let r = row.representative(b);
        let d_bin = sinc_table.d_axis.get_bin(r);
        sum += c * sinc_table.get(q_bin, d_bin);
    }
    sum
}

/// Each partial's contribution to `I(q)`, exposed independently so that
/// plots and diagnostics can reconstruct `I(q)` additively (spec.md §4.4).
#[derive(Clone, Debug)]
pub struct ScatteringProfile {
    pub q_axis: Axis,
    pub aa: Vec<f64>,
    pub ax: Vec<f64>,
    pub xx: Vec<f64>,
    pub aw: Vec<f64>,
    pub wx: Vec<f64>,
    pub ww: Vec<f64>,
    pub background: f64,
}

impl ScatteringProfile {
    /// `I(q) ≡ aa + ax + xx + aw + wx + ww + background`.
    pub fn total(&self) -> Vec<f64> {
        (0..self.q_axis.bins)
            .map(|i| self.aa[i] + self.ax[i] + self.xx[i] + self.aw[i] + self.wx[i] + self.ww[i] + self.background)
            .collect()
    }
}

/// `Z_exv_avg = volume_grid · ρ_water / N_atoms` (spec.md §9 Open Question
/// 1); the debug-only `volume_scaling` override is not implemented, so the
/// identity `Z_exv_avg · N_atoms = volume_grid · ρ_water` always holds.
pub fn z_exv_avg(volume_grid: f64, rho_water: f64, n_atoms: usize) -> f64 {
    if n_atoms == 0 {
        0.0
    } else {
        volume_grid * rho_water / n_atoms as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::{Atom, FormFactorType, Water};
    use crate::body::{Body, Molecule};
    use crate::histogram::HistogramManager;
    use lin_alg::f32::Vec3;

    fn build_avg(atoms: Vec<Atom>, waters: Vec<Water>) -> CompositeDistanceHistogram<Distribution1D> {
        let mut molecule = Molecule::with_waters(vec![Body::new(atoms)], waters);
        let mut mgr = HistogramManager::<Distribution1D>::new(Axis::new(0.0, 50.0, 500));
        let parts = mgr.calculate_all(&mut molecule);
        let mut hist = CompositeDistanceHistogram::new_avg(FormFactorType::COUNT, parts.p_aa, parts.p_aw, parts.p_ww);
        hist.cx = 0.0; // isolate aa/aw/ww for the additivity check
        hist
    }

    #[test]
    fn debye_sum_identity_holds_to_1e3_relative() {
        let atoms = vec![
            Atom::new(Vec3::new(-1.0, -1.0, -1.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(1.0, 1.0, 1.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(-1.0, 1.0, -1.0), 1.0, FormFactorType::O),
        ];
        let hist = build_avg(atoms, vec![Water::new(Vec3::new(0.0, 0.0, 0.0), 1.0)]);
        let profile = hist.profile_window(0.0, 0.3).unwrap();
        let total = profile.total();
        for (i, &i_q) in total.iter().enumerate() {
            let reconstructed =
                profile.aa[i] + profile.ax[i] + profile.xx[i] + profile.aw[i] + profile.wx[i] + profile.ww[i];
            let denom = i_q.abs().max(1e-12);
            assert!(((i_q - reconstructed) / denom).abs() < 1e-3);
        }
    }

    #[test]
    fn zero_cx_eliminates_excluded_volume_contribution() {
        let hist = build_avg(
            vec![Atom::new(Vec3::new(0.0, 0.0, 0.0), 1.0, FormFactorType::C)],
            vec![],
        );
        let profile = hist.profile_window(0.0, 0.1).unwrap();
        assert!(profile.ax.iter().all(|&v| v == 0.0));
        assert!(profile.xx.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn z_exv_avg_identity_round_trips() {
        let z = z_exv_avg(1000.0, 0.334, 500);
        assert!((z * 500.0 - 1000.0 * 0.334).abs() < 1e-9);
    }

    #[test]
    fn apply_water_scaling_factor_matches_manual_combination() {
        let atoms = vec![
            Atom::new(Vec3::new(-1.0, -1.0, -1.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(1.0, 1.0, 1.0), 1.0, FormFactorType::C),
        ];
        let hist = build_avg(atoms, vec![Water::new(Vec3::new(0.0, 0.0, 0.0), 1.0)]);
        let k = 1.15;
        let p_tot = hist.apply_water_scaling_factor(k);

        let aa = hist.p_aa.total();
        let aw = hist.p_aw.total();
        let ww = hist.p_ww.counts();
        assert_eq!(p_tot.len(), aa.len());
        for i in 0..p_tot.len() {
            let expected = aa.counts[i] + 2.0 * k * aw.counts[i] + k * k * ww[i];
            assert!((p_tot.counts[i] - expected).abs() < 1e-9);
        }

        // k == cw reproduces the same combined total the Debye transform
        // uses internally (spec.md §4.4).
        let p_tot_cw = hist.apply_water_scaling_factor(hist.cw);
        assert!(p_tot_cw.total() >= 0.0);
    }

    #[test]
    fn grid_variant_debye_sum_identity_holds_to_1e3_relative() {
        let atoms = vec![
            Atom::new(Vec3::new(-1.0, -1.0, -1.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(1.0, 1.0, 1.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(-1.0, 1.0, -1.0), 1.0, FormFactorType::O),
        ];
        let waters = vec![Water::new(Vec3::new(0.0, 0.0, 0.0), 1.0)];
        let axis = Axis::new(0.0, 50.0, 500);

        let grid_points = crate::grid::generate_excluded_volume(&atoms, 1.0, 1.5, 0.5);
        let (p_ax, p_xx, p_wx) =
            crate::grid::grid_partials::<Distribution1D>(&atoms, &waters, &grid_points, FormFactorType::COUNT, &axis);

        let mut molecule = Molecule::with_waters(vec![Body::new(atoms)], waters);
        let mut mgr = HistogramManager::<Distribution1D>::new(axis);
        let parts = mgr.calculate_all(&mut molecule);
        let hist = CompositeDistanceHistogram::new_avg(FormFactorType::COUNT, parts.p_aa, parts.p_aw, parts.p_ww)
            .with_grid(p_ax, p_xx, p_wx);

        let profile = hist.profile_window(0.0, 0.3).unwrap();
        let total = profile.total();
        for (i, &i_q) in total.iter().enumerate() {
            let reconstructed =
                profile.aa[i] + profile.ax[i] + profile.xx[i] + profile.aw[i] + profile.wx[i] + profile.ww[i];
            let denom = i_q.abs().max(1e-12);
            assert!(((i_q - reconstructed) / denom).abs() < 1e-3);
        }
    }

    #[test]
    fn explicit_variant_debye_sum_identity_holds_to_1e3_relative() {
        let atoms = vec![
            Atom::new(Vec3::new(-1.0, -1.0, -1.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(1.0, 1.0, 1.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(-1.0, 1.0, -1.0), 1.0, FormFactorType::O),
        ];
        let waters = vec![Water::new(Vec3::new(0.0, 0.0, 0.0), 1.0)];
        let axis = Axis::new(0.0, 50.0, 500);

        let exv_points = crate::grid::atoms_as_excluded_volume(&atoms, 0.5);
        let (p_ax, p_xx, p_wx) =
            crate::grid::grid_partials::<Distribution1D>(&atoms, &waters, &exv_points, FormFactorType::COUNT, &axis);

        let mut molecule = Molecule::with_waters(vec![Body::new(atoms)], waters);
        let mut mgr = HistogramManager::<Distribution1D>::new(axis);
        let parts = mgr.calculate_all(&mut molecule);
        let hist = CompositeDistanceHistogram::new_avg(FormFactorType::COUNT, parts.p_aa, parts.p_aw, parts.p_ww)
            .with_explicit(p_ax, p_xx, p_wx);

        let profile = hist.profile_window(0.0, 0.3).unwrap();
        let total = profile.total();
        for (i, &i_q) in total.iter().enumerate() {
            let reconstructed =
                profile.aa[i] + profile.ax[i] + profile.xx[i] + profile.aw[i] + profile.wx[i] + profile.ww[i];
            let denom = i_q.abs().max(1e-12);
            assert!(((i_q - reconstructed) / denom).abs() < 1e-3);
        }
    }
}
