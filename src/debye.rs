//! Precomputed `sinc(q*r)` lookup table shared by every Debye transform
//! (spec.md §3 `ArrayDebyeTable`, §4.4 "common contract").

use std::sync::OnceLock;

use crate::axis::{default_d_axis, default_q_axis, Axis};

#[inline]
fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-9 {
        1.0
    } else {
        x.sin() / x
    }
}

#[derive(Debug)]
pub struct ArrayDebyeTable {
    pub q_axis: Axis,
    pub d_axis: Axis,
    table: Vec<f64>,
}

impl ArrayDebyeTable {
    pub fn build(q_axis: Axis, d_axis: Axis) -> Self {
        let q_vals = q_axis.as_vec();
        let d_vals = d_axis.as_vec();
        let mut table = vec![0.0; q_axis.bins * d_axis.bins];
        for (qi, &q) in q_vals.iter().enumerate() {
            for (di, &d) in d_vals.iter().enumerate() {
                table[qi * d_axis.bins + di] = sinc(q * d);
            }
        }
        Self { q_axis, d_axis, table }
    }

    /// `sinc(q_bin * d_bin)` lookup.
    #[inline]
    pub fn get(&self, q_bin: usize, d_bin: usize) -> f64 {
        self.table[q_bin * self.d_axis.bins + d_bin]
    }

    /// The full row of sinc values for a given q bin, sliced to `len` bins.
    #[inline]
    pub fn row(&self, q_bin: usize, len: usize) -> &[f64] {
        let start = q_bin * self.d_axis.bins;
        &self.table[start..start + len.min(self.d_axis.bins)]
    }

    /// True when `q` and `d` match this table's default axes exactly,
    /// per spec.md §3's "runtime check at construction" invariant.
    pub fn matches_axes(&self, q: &Axis, d: &Axis) -> bool {
        *q == self.q_axis && d.bins <= self.d_axis.bins && (d.width() - self.d_axis.width()).abs() < 1e-12
    }
}

static DEFAULT_TABLE: OnceLock<ArrayDebyeTable> = OnceLock::new();

/// Process-wide singleton Debye table over the default q/d axes.
pub fn default_table() -> &'static ArrayDebyeTable {
    DEFAULT_TABLE.get_or_init(|| ArrayDebyeTable::build(default_q_axis(), default_d_axis()))
}

/// Resolve the table to use for a caller-supplied `(q, d)` axis pair: the
/// process-wide default when the axes match it, or `None` to signal the
/// caller should build (and own) a one-off table for this call (spec.md §3).
pub fn lookup_default(q_axis: &Axis, d_axis: &Axis) -> Option<&'static ArrayDebyeTable> {
    let default = default_table();
    if default.matches_axes(q_axis, d_axis) {
        Some(default)
    } else {
        log::debug!("ArrayDebyeTable: axes differ from default, a per-call table is required");
        None
    }
}
