//! Compact, cache-dense coordinate packing (spec.md §4.1).
//!
//! `CompactCoordinatesData` is the 16-byte record the inner distance loops
//! run over; `CompactCoordinates` owns a flat `Vec` of them, rebuilt from a
//! body's atoms or the global water set whenever that source changes.

use crate::atom::{Atom, Water};

/// Invariant: exactly 16 bytes, asserted below. Matches
/// `original_source/include/hist/detail/CompactCoordinates.h`'s
/// `static_assert(sizeof(Data) == 16, ...)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompactCoordinatesData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

const _: () = assert!(std::mem::size_of::<CompactCoordinatesData>() == 16);

impl CompactCoordinatesData {
    pub fn from_atom(atom: &Atom) -> Self {
        Self { x: atom.position.x, y: atom.position.y, z: atom.position.z, w: atom.weight }
    }

    pub fn from_water(water: &Water) -> Self {
        Self { x: water.position.x, y: water.position.y, z: water.position.z, w: water.weight }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CompactCoordinates {
    pub data: Vec<CompactCoordinatesData>,
}

impl CompactCoordinates {
    pub fn from_atoms(atoms: &[Atom]) -> Self {
        Self { data: atoms.iter().map(CompactCoordinatesData::from_atom).collect() }
    }

    pub fn from_waters(waters: &[Water]) -> Self {
        Self { data: waters.iter().map(CompactCoordinatesData::from_water).collect() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Recompute this body's packed array from `atoms` in place; reuses the
    /// existing allocation when the length hasn't changed, per spec.md §4.1's
    /// "must not reallocate if size unchanged" contract.
    pub fn update_from_atoms(&mut self, atoms: &[Atom]) {
        if self.data.len() == atoms.len() {
            for (slot, atom) in self.data.iter_mut().zip(atoms) {
                *slot = CompactCoordinatesData::from_atom(atom);
            }
        } else {
            self.data = atoms.iter().map(CompactCoordinatesData::from_atom).collect();
        }
    }

    pub fn update_from_waters(&mut self, waters: &[Water]) {
        if self.data.len() == waters.len() {
            for (slot, water) in self.data.iter_mut().zip(waters) {
                *slot = CompactCoordinatesData::from_water(water);
            }
        } else {
            self.data = waters.iter().map(CompactCoordinatesData::from_water).collect();
        }
    }
}

/// Scalar (distance, weight-product) evaluation of one source record against
/// one target record.
#[inline]
pub fn eval_pair(src: &CompactCoordinatesData, dst: &CompactCoordinatesData) -> (f32, f32) {
    let dx = src.x - dst.x;
    let dy = src.y - dst.y;
    let dz = src.z - dst.z;
    let d = (dx * dx + dy * dy + dz * dz).sqrt();
    (d, src.w * dst.w)
}

/// The 8-wide primitive contract of spec.md §4.1: evaluate one source record
/// against up to 8 target records, returning parallel (distance, weight)
/// arrays. Targets beyond `targets.len()` are zero-filled so callers can
/// always index the full width; the loop shape (plain array writes, no
/// branches inside the hot body) is written so the compiler can
/// auto-vectorize it, matching the "SHOULD vectorize" language without
/// reaching for explicit SIMD intrinsics.
#[inline]
pub fn eval_block8(src: &CompactCoordinatesData, targets: &[CompactCoordinatesData]) -> ([f32; 8], [f32; 8]) {
    let mut dist = [0f32; 8];
    let mut weight = [0f32; 8];
    let n = targets.len().min(8);
    for i in 0..n {
        let (d, w) = eval_pair(src, &targets[i]);
        dist[i] = d;
        weight[i] = w;
    }
    (dist, weight)
}

/// The 4-wide variant of the same primitive.
#[inline]
pub fn eval_block4(src: &CompactCoordinatesData, targets: &[CompactCoordinatesData]) -> ([f32; 4], [f32; 4]) {
    let mut dist = [0f32; 4];
    let mut weight = [0f32; 4];
    let n = targets.len().min(4);
    for i in 0..n {
        let (d, w) = eval_pair(src, &targets[i]);
        dist[i] = d;
        weight[i] = w;
    }
    (dist, weight)
}
