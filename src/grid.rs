//! Excluded-volume grid generation and the `Grid` composite-histogram
//! variant's partials (spec.md §4.4 "Grid ... the excluded volume is
//! sampled as points on a voxel grid built around the molecule"), grounded
//! on `original_source/include/hydrate/Grid.h` and
//! `original_source/source/hist/distance_calculator/HistogramManagerMTFFGrid.cpp`'s
//! `generate_excluded_volume` + dedicated `p_ax`/`p_xx`/`p_wx` accumulation.
//!
//! Unlike `placement::place` (which produces explicit water positions), this
//! module voxelizes the occupied volume itself: every grid cell within the
//! atomic radius of some atom becomes one excluded-volume point, each
//! carrying the averaged excluded-volume charge rather than an atomic
//! form-factor weight.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::atom::{Atom, FormFactorType, Water};
use crate::axis::Axis;
use crate::coords::{eval_block8, CompactCoordinates};
use crate::distribution::{GenericDistribution2D, Hist1D};

/// Jobs are chunked the same way as the main histogram pipeline
/// (`histogram::JOB_SIZE`); kept as a local constant since this module has
/// no dependency on `histogram.rs`.
const JOB_SIZE: usize = 800;

/// Voxelize the volume occupied by `atoms`: every grid cell (at `width`
/// resolution) within `radius` of some atom center becomes one
/// `ExcludedVolume`-tagged point at the cell center, carrying `charge` as
/// its weight. Cells are deduplicated, so overlapping atomic spheres
/// contribute one point each rather than double-counting the overlap.
pub fn generate_excluded_volume(atoms: &[Atom], width: f32, radius: f32, charge: f32) -> Vec<Atom> {
    if atoms.is_empty() || width <= 0.0 {
        return Vec::new();
    }
    let steps = (radius / width).ceil().max(1.0) as i64;
    let radius_sq_cells = (radius / width) * (radius / width);

    let mut occupied: HashSet<(i64, i64, i64)> = HashSet::new();
    for atom in atoms {
        let gx = (atom.position.x / width).round() as i64;
        let gy = (atom.position.y / width).round() as i64;
        let gz = (atom.position.z / width).round() as i64;
        for dx in -steps..=steps {
            for dy in -steps..=steps {
                for dz in -steps..=steps {
                    if (dx * dx + dy * dy + dz * dz) as f32 > radius_sq_cells {
                        continue;
                    }
                    occupied.insert((gx + dx, gy + dy, gz + dz));
                }
            }
        }
    }

    occupied
        .into_iter()
        .map(|(gx, gy, gz)| {
            let position = lin_alg::f32::Vec3::new(gx as f32 * width, gy as f32 * width, gz as f32 * width);
            Atom::new(position, charge, FormFactorType::ExcludedVolume)
        })
        .collect()
}

/// One excluded-volume point per atom, at the atom's own position, each
/// carrying `exv_weight` as its individual Gaussian form-factor weight
/// (spec.md §4.4 "Explicit — excluded-volume atoms carry an individual
/// Gaussian form factor"). Unlike [`generate_excluded_volume`]'s voxel grid,
/// the `Explicit` variant's excluded-volume cloud sits exactly at the
/// protein's own atom positions — grounded on
/// `original_source/source/hist/intensity_calculator/CompositeDistanceHistogramFFExplicit.cpp`'s
/// `p_ax`/`p_xx` being dedicated per-atom-position containers distinct from
/// (and the same size as) `p_aa`, rather than a separately sampled grid.
pub fn atoms_as_excluded_volume(atoms: &[Atom], exv_weight: f32) -> Vec<Atom> {
    atoms.iter().map(|a| Atom::new(a.position, exv_weight, FormFactorType::ExcludedVolume)).collect()
}

/// Shared by the `Grid` and `Explicit` variants: given any excluded-volume
/// point cloud (a voxel grid or the atoms-as-points above), computes
/// atom-excluded-volume (`p_ax`, indexed by the atom's form-factor type like
/// `p_aw`), excluded-volume self-correlation (`p_xx`, full ordered-pair
/// convention like `p_ww`), and water-excluded-volume (`p_wx`,
/// single-counted like `p_aw`). Mirrors `histogram::body_water`/
/// `histogram::water_water`'s conventions exactly so `composite.rs`'s
/// combination formula applies unchanged (spec.md §4.4).
pub fn grid_partials<K: Hist1D>(
    atoms: &[Atom],
    waters: &[Water],
    grid_points: &[Atom],
    ff_count: usize,
    axis: &Axis,
) -> (GenericDistribution2D<K>, K, K) {
    let bins = axis.bins;
    let width = axis.width();
    let grid_coords = CompactCoordinates::from_atoms(grid_points);

    let p_ax = if atoms.is_empty() || grid_points.is_empty() {
        GenericDistribution2D::new(ff_count, bins, width)
    } else {
        let atom_coords = CompactCoordinates::from_atoms(atoms);
        atoms
            .par_chunks(JOB_SIZE)
            .zip(atom_coords.data.par_chunks(JOB_SIZE))
            .map(|(atom_chunk, coord_chunk)| {
                let mut local = GenericDistribution2D::<K>::new(ff_count, bins, width);
                for (atom, c) in atom_chunk.iter().zip(coord_chunk) {
                    let ff = atom.form_factor.index();
                    let mut start = 0;
                    while start < grid_coords.data.len() {
                        let end = (start + 8).min(grid_coords.data.len());
                        let block = &grid_coords.data[start..end];
                        let (dist, weight) = eval_block8(c, block);
                        for k in 0..block.len() {
                            local.row_mut(ff).add(dist[k] as f64, weight[k] as f64);
                        }
                        start = end;
                    }
                }
                local
            })
            .reduce(
                || GenericDistribution2D::new(ff_count, bins, width),
                |mut a, b| {
                    a.add_assign(&b);
                    a
                },
            )
    };

    let p_wx = if waters.is_empty() || grid_points.is_empty() {
        K::new(bins, width)
    } else {
        let water_coords = CompactCoordinates::from_waters(waters);
        water_coords
            .data
            .par_chunks(JOB_SIZE)
            .map(|chunk| {
                let mut local = K::new(bins, width);
                for c in chunk {
                    let mut start = 0;
                    while start < grid_coords.data.len() {
                        let end = (start + 8).min(grid_coords.data.len());
                        let block = &grid_coords.data[start..end];
                        let (dist, weight) = eval_block8(c, block);
                        for k in 0..block.len() {
                            local.add(dist[k] as f64, weight[k] as f64);
                        }
                        start = end;
                    }
                }
                local
            })
            .reduce(
                || K::new(bins, width),
                |mut a, b| {
                    a.add_assign(&b);
                    a
                },
            )
    };

    let mut p_xx = K::new(bins, width);
    for p in grid_points {
        p_xx.add(0.0, (p.weight as f64).powi(2));
    }
    if grid_points.len() >= 2 {
        let data = &grid_coords.data;
        let partial = (0..grid_points.len())
            .collect::<Vec<_>>()
            .par_chunks(JOB_SIZE)
            .map(|idx_chunk| {
                let mut local = K::new(bins, width);
                for &i in idx_chunk {
                    let src = &data[i];
                    let mut j = i + 1;
                    while j < data.len() {
                        let end = (j + 8).min(data.len());
                        let block = &data[j..end];
                        let (dd, ww) = eval_block8(src, block);
                        for k in 0..block.len() {
                            local.add(dd[k] as f64, 2.0 * ww[k] as f64);
                        }
                        j = end;
                    }
                }
                local
            })
            .reduce(
                || K::new(bins, width),
                |mut a, b| {
                    a.add_assign(&b);
                    a
                },
            );
        p_xx.add_assign(&partial);
    }

    (p_ax, p_xx, p_wx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lin_alg::f32::Vec3;

    #[test]
    fn empty_atoms_yield_no_grid_points() {
        assert!(generate_excluded_volume(&[], 1.0, 1.5, 1.0).is_empty());
    }

    #[test]
    fn single_atom_voxelizes_into_deduplicated_cells() {
        let atoms = vec![Atom::new(Vec3::new(0.0, 0.0, 0.0), 1.0, FormFactorType::C)];
        let points = generate_excluded_volume(&atoms, 1.0, 1.0, 2.0);
        assert!(!points.is_empty());
        let mut seen = HashSet::new();
        for p in &points {
            assert_eq!(p.form_factor, FormFactorType::ExcludedVolume);
            assert_eq!(p.weight, 2.0);
            let key = (p.position.x as i64, p.position.y as i64, p.position.z as i64);
            assert!(seen.insert(key), "grid point positions must be deduplicated");
        }
    }

    #[test]
    fn overlapping_atoms_share_grid_points() {
        let wide = generate_excluded_volume(&[Atom::new(Vec3::new(0.0, 0.0, 0.0), 1.0, FormFactorType::C)], 1.0, 2.0, 1.0);
        let overlapping = generate_excluded_volume(
            &[
                Atom::new(Vec3::new(0.0, 0.0, 0.0), 1.0, FormFactorType::C),
                Atom::new(Vec3::new(0.5, 0.0, 0.0), 1.0, FormFactorType::C),
            ],
            1.0,
            2.0,
            1.0,
        );
        // Overlap means the union is smaller than the sum of two independent spheres.
        assert!(overlapping.len() < 2 * wide.len());
    }

    #[test]
    fn atoms_as_excluded_volume_preserves_positions_and_count() {
        let atoms = vec![
            Atom::new(Vec3::new(0.0, 0.0, 0.0), 1.0, FormFactorType::C),
            Atom::new(Vec3::new(1.0, 2.0, 3.0), 1.0, FormFactorType::O),
        ];
        let points = atoms_as_excluded_volume(&atoms, 0.5);
        assert_eq!(points.len(), atoms.len());
        for (p, a) in points.iter().zip(&atoms) {
            assert_eq!(p.position, a.position);
            assert_eq!(p.form_factor, FormFactorType::ExcludedVolume);
            assert_eq!(p.weight, 0.5);
        }
    }

    #[test]
    fn grid_partials_on_empty_inputs_are_zero() {
        use crate::distribution::Distribution1D;
        let (p_ax, p_xx, p_wx) =
            grid_partials::<Distribution1D>(&[], &[], &[], FormFactorType::COUNT, &Axis::new(0.0, 20.0, 20));
        assert_eq!(p_ax.total().total(), 0.0);
        assert_eq!(p_xx.total(), 0.0);
        assert_eq!(p_wx.total(), 0.0);
    }
}
