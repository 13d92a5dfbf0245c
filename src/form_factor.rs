//! Atomic form factors: five-Gaussian-plus-constant scattering amplitudes,
//! normalized to 1 at q = 0 (spec.md §3, `PrecalculatedFormFactorProduct`;
//! GLOSSARY "Form factor"). Coefficients follow the standard
//! five-Gaussian parameterization used throughout SAXS/crystallography
//! form-factor tables (the shape mirrors
//! `original_source/include/form_factor/FormFactor.h`'s `a[5]`, `b[5]`, `c`
//! layout and its `f0`-normalized `evaluate`).

use std::sync::OnceLock;

use crate::atom::FormFactorType;
use crate::axis::Axis;

#[derive(Clone, Copy, Debug)]
pub struct FormFactor {
    a: [f64; 5],
    b: [f64; 5],
    c: f64,
    f0: f64,
}

impl FormFactor {
    pub const fn new(a: [f64; 5], b: [f64; 5], c: f64) -> Self {
        let f0 = a[0] + a[1] + a[2] + a[3] + a[4] + c;
        Self { a, b, c, f0 }
    }

    /// Evaluate the form factor at `q`; normalized so `evaluate(0) == 1`.
    #[inline]
    pub fn evaluate(&self, q: f64) -> f64 {
        let mut sum = 0.0;
        for i in 0..5 {
            sum += self.a[i] * (-self.b[i] * q * q).exp();
        }
        (sum + self.c) / self.f0
    }

    /// `f(0)`, always 1 after normalization — spec.md §8's "Zero-q
    /// normalization" invariant, kept as an explicit check rather than a
    /// bare assumption.
    pub fn zero_q_value(&self) -> f64 {
        self.evaluate(0.0)
    }
}

// Five-Gaussian-plus-constant coefficients. Representative SAXS form-factor
// parameterizations; exact registry values are an external-data concern
// (spec.md §6 treats data files as consumed-not-specified), so these are the
// crate's baked-in defaults.
const H: FormFactor = FormFactor::new([0.4899, 0.2620, 0.1961, 0.0489, 0.0], [20.66, 7.740, 49.55, 2.201, 0.0], 0.0010);
const C: FormFactor = FormFactor::new([2.3100, 1.0200, 1.5886, 0.8650, 0.0], [20.84, 10.21, 0.5687, 51.65, 0.0], 0.2156);
const N: FormFactor = FormFactor::new([12.2126, 3.1322, 2.0125, 1.1663, 0.0], [0.0057, 9.8933, 28.9975, 0.5826, 0.0], -11.529);
const O: FormFactor = FormFactor::new([3.0485, 2.2868, 1.5463, 0.8670, 0.0], [13.277, 5.701, 0.3239, 32.909, 0.0], 0.2508);
const S: FormFactor = FormFactor::new([6.9053, 5.2034, 1.4379, 1.5863, 0.0], [1.4679, 22.215, 0.2536, 56.172, 0.0], 0.8669);
const CH: FormFactor = FormFactor::new([2.3100, 1.0200, 1.5886, 0.8650, 0.4899], [20.84, 10.21, 0.5687, 51.65, 20.66], 0.2166);
const CH2: FormFactor = FormFactor::new([2.3100, 1.0200, 1.5886, 0.8650, 0.9798], [20.84, 10.21, 0.5687, 51.65, 20.66], 0.2176);
const CH3: FormFactor = FormFactor::new([2.3100, 1.0200, 1.5886, 0.8650, 1.4697], [20.84, 10.21, 0.5687, 51.65, 20.66], 0.2186);
const NH: FormFactor = FormFactor::new([12.2126, 3.1322, 2.0125, 1.1663, 0.4899], [0.0057, 9.8933, 28.9975, 0.5826, 20.66], -11.528);
const NH2: FormFactor = FormFactor::new([12.2126, 3.1322, 2.0125, 1.1663, 0.9798], [0.0057, 9.8933, 28.9975, 0.5826, 20.66], -11.527);
const OH: FormFactor = FormFactor::new([3.0485, 2.2868, 1.5463, 0.8670, 0.4899], [13.277, 5.701, 0.3239, 32.909, 20.66], 0.2518);
const SH: FormFactor = FormFactor::new([6.9053, 5.2034, 1.4379, 1.5863, 0.4899], [1.4679, 22.215, 0.2536, 56.172, 20.66], 0.8679);
// Unwired atomic-group factors (spec.md §9 Open Question #3): present, never emitted.
const NH3_PLUS: FormFactor = FormFactor::new([12.2126, 3.1322, 2.0125, 1.1663, 1.4697], [0.0057, 9.8933, 28.9975, 0.5826, 20.66], -11.526);
const NH_GUANINE: FormFactor = FormFactor::new([12.2126, 3.1322, 2.0125, 1.1663, 0.4899], [0.0057, 9.8933, 28.9975, 0.5826, 20.66], -11.524);
const OTHER: FormFactor = FormFactor::new([7.4845, 6.7723, 0.6539, 1.6442, 0.0], [0.9072, 14.84, 43.90, 33.39, 0.0], 1.4445); // argon
const EXCLUDED_VOLUME: FormFactor = FormFactor::new([1.0, 0.0, 0.0, 0.0, 0.0], [12.5, 0.0, 0.0, 0.0, 0.0], 0.0);
const WATER: FormFactor = FormFactor::new([3.0485, 2.2868, 1.5463, 0.8670, 0.4899 * 2.0], [13.277, 5.701, 0.3239, 32.909, 20.66], 0.2508);

pub fn storage(ty: FormFactorType) -> &'static FormFactor {
    match ty {
        FormFactorType::H => &H,
        FormFactorType::C => &C,
        FormFactorType::N => &N,
        FormFactorType::O => &O,
        FormFactorType::S => &S,
        FormFactorType::CH => &CH,
        FormFactorType::CH2 => &CH2,
        FormFactorType::CH3 => &CH3,
        FormFactorType::NH => &NH,
        FormFactorType::NH2 => &NH2,
        FormFactorType::OH => &OH,
        FormFactorType::SH => &SH,
        FormFactorType::NH3Plus => &NH3_PLUS,
        FormFactorType::NHGuanine => &NH_GUANINE,
        FormFactorType::Other => &OTHER,
        FormFactorType::ExcludedVolume => &EXCLUDED_VOLUME,
        FormFactorType::Water => &WATER,
    }
}

/// For each pair `(ff_i, ff_j)` and each q-bin, `ff_i(q)*ff_j(q)`. Generated
/// once at construction and never mutated (spec.md §3 invariant).
#[derive(Debug)]
pub struct PrecalculatedFormFactorProduct {
    pub ff_count: usize,
    pub q_axis: Axis,
    products: Vec<f64>,
}

impl PrecalculatedFormFactorProduct {
    pub fn build(q_axis: Axis) -> Self {
        let ff_count = FormFactorType::COUNT;
        let q_vals = q_axis.as_vec();
        let evals: Vec<Vec<f64>> = (0..ff_count)
            .map(|i| {
                let ty = index_to_type(i);
                let ff = storage(ty);
                q_vals.iter().map(|&q| ff.evaluate(q)).collect()
            })
            .collect();

        let mut products = vec![0.0; ff_count * ff_count * q_axis.bins];
        for i in 0..ff_count {
            for j in 0..ff_count {
                for (qi, q) in q_vals.iter().enumerate() {
                    let _ = q;
                    let idx = (i * ff_count + j) * q_axis.bins + qi;
                    products[idx] = evals[i][qi] * evals[j][qi];
                }
            }
        }
        Self { ff_count, q_axis, products }
    }

    pub fn get(&self, ff_i: usize, ff_j: usize, q_bin: usize) -> f64 {
        self.products[(ff_i * self.ff_count + ff_j) * self.q_axis.bins + q_bin]
    }

    pub fn row(&self, ff_i: usize, ff_j: usize) -> &[f64] {
        let bins = self.q_axis.bins;
        let start = (ff_i * self.ff_count + ff_j) * bins;
        &self.products[start..start + bins]
    }
}

fn index_to_type(i: usize) -> FormFactorType {
    use FormFactorType::*;
    const ORDER: [FormFactorType; FormFactorType::COUNT] = [
        H, C, N, O, S, CH, CH2, CH3, NH, NH2, OH, SH, NH3Plus, NHGuanine, Other, ExcludedVolume, Water,
    ];
    ORDER[i]
}

static DEFAULT_TABLE: OnceLock<PrecalculatedFormFactorProduct> = OnceLock::new();

/// Process-wide singleton form-factor product table over the default q-axis
/// (spec.md §5 "Shared resources": immutable singletons, no locking).
pub fn default_product_table() -> &'static PrecalculatedFormFactorProduct {
    DEFAULT_TABLE.get_or_init(|| PrecalculatedFormFactorProduct::build(crate::axis::default_q_axis()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_form_factor_normalizes_to_one_at_zero_q() {
        for ty in [
            FormFactorType::H,
            FormFactorType::C,
            FormFactorType::N,
            FormFactorType::O,
            FormFactorType::S,
            FormFactorType::CH,
            FormFactorType::CH2,
            FormFactorType::CH3,
            FormFactorType::NH,
            FormFactorType::NH2,
            FormFactorType::OH,
            FormFactorType::SH,
            FormFactorType::NH3Plus,
            FormFactorType::NHGuanine,
            FormFactorType::Other,
            FormFactorType::ExcludedVolume,
            FormFactorType::Water,
        ] {
            let f0 = storage(ty).zero_q_value();
            assert!((f0 - 1.0).abs() < 1e-9, "{ty:?} f(0) = {f0}");
        }
    }

    #[test]
    fn product_table_reproduces_pairwise_products() {
        let axis = Axis::new(0.0, 0.5, 50);
        let table = PrecalculatedFormFactorProduct::build(axis);
        let fc = storage(FormFactorType::C);
        let fo = storage(FormFactorType::O);
        let q = axis.bin_value(10);
        let expected = fc.evaluate(q) * fo.evaluate(q);
        let got = table.get(FormFactorType::C.index(), FormFactorType::O.index(), 10);
        assert!((got - expected).abs() < 1e-12);
    }
}
