//! Hydration/grid placement strategies that produce explicit water
//! positions around a molecule (spec.md §4.7), grounded on
//! `original_source/source/hydrate/JanPlacement.cpp`'s axial grid scan.
//!
//! The histogram pipeline only ever consumes the resulting `Vec<Water>`;
//! it is agnostic to which strategy produced them.

use std::collections::HashSet;

use lin_alg::f32::Vec3;

use crate::atom::{Atom, Water};

/// Effective atomic + hydration radius used to offset candidate waters
/// from their neighboring atom, in Angstrom (spec.md §4.7 "r_eff").
const DEFAULT_R_EFF: f32 = 2.4;

/// Grid bin width for the occupancy lattice the axial/radial strategies
/// scan over.
const DEFAULT_GRID_WIDTH: f32 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementStrategy {
    /// Candidate waters at ±r_eff along each grid axis adjacent to a
    /// solvent-accessible atom (spec.md §4.7).
    Axial,
    /// Candidate waters placed on a sphere of radius r_eff around each atom.
    Radial { samples_per_atom: usize },
    /// No explicit hydration layer is generated.
    NoHydration,
    /// One water per atom, offset along a fixed per-residue-like direction;
    /// a deliberate simplification of the original per-residue dictionary
    /// lookup, since no residue model is in scope here.
    Pepsi,
}

/// How the candidate water set is reduced to a target count (spec.md §4.7
/// "a culling step reduces the candidate water set to a target count
/// (default: none)").
#[derive(Clone, Copy, Debug)]
pub enum Culling {
    None,
    /// Keep only the first `target` candidates (in placement order).
    Target(usize),
}

impl Default for Culling {
    fn default() -> Self {
        Culling::None
    }
}

/// Produce explicit hydration waters for `atoms` per `strategy`, then cull
/// to `culling`'s target if set.
pub fn place(atoms: &[Atom], strategy: PlacementStrategy, culling: Culling) -> Vec<Water> {
    let mut waters = match strategy {
        PlacementStrategy::NoHydration => Vec::new(),
        PlacementStrategy::Axial => axial(atoms, DEFAULT_R_EFF, DEFAULT_GRID_WIDTH),
        PlacementStrategy::Radial { samples_per_atom } => radial(atoms, DEFAULT_R_EFF, samples_per_atom),
        PlacementStrategy::Pepsi => pepsi(atoms, DEFAULT_R_EFF),
    };
    if let Culling::Target(target) = culling {
        waters.truncate(target);
    }
    waters
}

#[inline]
fn grid_key(v: Vec3, width: f32) -> (i64, i64, i64) {
    ((v.x / width).round() as i64, (v.y / width).round() as i64, (v.z / width).round() as i64)
}

/// One candidate at `±r_eff` along each of the six axis directions from
/// every occupied grid cell, skipping directions that land on another
/// occupied cell (spec.md §4.7, mirroring the original's `add_loc` scan).
fn axial(atoms: &[Atom], r_eff: f32, grid_width: f32) -> Vec<Water> {
    if atoms.is_empty() {
        return Vec::new();
    }
    let occupied: HashSet<(i64, i64, i64)> = atoms.iter().map(|a| grid_key(a.position, grid_width)).collect();
    let steps = (r_eff / grid_width).round().max(1.0) as i64;

    let mut seen = HashSet::new();
    let mut waters = Vec::new();
    for atom in atoms {
        let (gx, gy, gz) = grid_key(atom.position, grid_width);
        let directions = [(steps, 0, 0), (-steps, 0, 0), (0, steps, 0), (0, -steps, 0), (0, 0, steps), (0, 0, -steps)];
        for (dx, dy, dz) in directions {
            let candidate = (gx + dx, gy + dy, gz + dz);
            if occupied.contains(&candidate) || !seen.insert(candidate) {
                continue;
            }
            let position = Vec3::new(candidate.0 as f32 * grid_width, candidate.1 as f32 * grid_width, candidate.2 as f32 * grid_width);
            waters.push(Water::new(position, 1.0));
        }
    }
    waters
}

/// `samples_per_atom` candidates evenly distributed on a sphere of radius
/// `r_eff` around each atom, via the golden-angle spiral (no clustering at
/// the poles, unlike a naive lat/lon grid).
fn radial(atoms: &[Atom], r_eff: f32, samples_per_atom: usize) -> Vec<Water> {
    if samples_per_atom == 0 {
        return Vec::new();
    }
    const GOLDEN_ANGLE: f32 = std::f32::consts::PI * (3.0 - 2.236_068); // pi * (3 - sqrt(5))
    let mut waters = Vec::with_capacity(atoms.len() * samples_per_atom);
    for atom in atoms {
        for k in 0..samples_per_atom {
            let t = (k as f32 + 0.5) / samples_per_atom as f32;
            let z = 1.0 - 2.0 * t;
            let radius_at_z = (1.0 - z * z).max(0.0).sqrt();
            let theta = GOLDEN_ANGLE * k as f32;
            let offset = Vec3::new(radius_at_z * theta.cos(), radius_at_z * theta.sin(), z) * r_eff;
            waters.push(Water::new(atom.position + offset, 1.0));
        }
    }
    waters
}

/// One water per atom, offset along a fixed direction; stands in for the
/// original's per-residue dictionary lookup (spec.md §4.7 "Pepsi-style
/// per-residue placement") since no residue model is in scope here.
fn pepsi(atoms: &[Atom], r_eff: f32) -> Vec<Water> {
    let offset = Vec3::new(0.0, 0.0, r_eff);
    atoms.iter().map(|a| Water::new(a.position + offset, 1.0)).collect()
}
