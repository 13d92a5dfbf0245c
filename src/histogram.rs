//! Multithreaded, form-factor-aware partial distance histogram pipeline
//! (spec.md §4.3).
//!
//! Raw-count convention: same-species partials (`P_aa`, and `P_ww` once a
//! body has more than one water) store the *full ordered-pair* sum — each
//! unordered pair contributes to both `(ff_a, ff_b)` and `(ff_b, ff_a)` — so
//! that `Σ P_aa(0) = Σ w_i²` reproduces the q=0 Debye sum directly (spec.md
//! §8 scenario 1). Cross-species partials (`P_aw`) store each pair once;
//! the factor of 2 is applied explicitly downstream by `composite`'s
//! `2·cw·P_aw` term (spec.md §4.4), matching scenario 2's `(8+1)²` check.

use rayon::prelude::*;

use crate::atom::{Atom, FormFactorType, Water};
use crate::axis::Axis;
use crate::body::Molecule;
use crate::coords::{eval_block8, CompactCoordinates};
use crate::distribution::{Distribution1D, GenericDistribution2D, GenericDistribution3D, Hist1D};

/// Atoms are grouped into jobs of this size before being submitted to the
/// thread pool (spec.md §4.3, "chunked into fixed-size jobs").
const JOB_SIZE: usize = 800;

/// Minimum axis length retained after trimming (spec.md §4.3 "Axis downsizing").
const MIN_AXIS_BINS: usize = 10;

/// Full assembled result of [`HistogramManager::calculate_all`].
#[derive(Clone, Debug)]
pub struct CompositeParts<K: Hist1D> {
    pub p_aa: GenericDistribution3D<K>,
    pub p_aw: GenericDistribution2D<K>,
    pub p_ww: K,
    pub total: Distribution1D,
}

/// Computes, and incrementally updates, the partial distance distributions
/// for all body-body and body-water combinations of a [`Molecule`]
/// (spec.md §4.3). `K` selects the weighted or unweighted distribution
/// variant at compile time (spec.md §9 "Weighted distribution as a trait").
pub struct HistogramManager<K: Hist1D> {
    axis: Axis,
    ff_count: usize,
    body_coords: Vec<CompactCoordinates>,
    water_coords: CompactCoordinates,
    pair_cache: Vec<Vec<Option<GenericDistribution3D<K>>>>,
    water_cache: Vec<Option<GenericDistribution2D<K>>>,
    ww_cache: Option<K>,
}

impl<K: Hist1D> HistogramManager<K> {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            ff_count: FormFactorType::COUNT,
            body_coords: Vec::new(),
            water_coords: CompactCoordinates::default(),
            pair_cache: Vec::new(),
            water_cache: Vec::new(),
            ww_cache: None,
        }
    }

    fn ensure_capacity(&mut self, n: usize) {
        if self.body_coords.len() != n {
            self.body_coords.resize(n, CompactCoordinates::default());
        }
        if self.pair_cache.len() != n {
            self.pair_cache = (0..n).map(|_| vec![None; n]).collect();
        }
        if self.water_cache.len() != n {
            self.water_cache.resize(n, None);
        }
    }

    /// Fast path: only the unpartitioned total distribution (spec.md §4.3).
    pub fn calculate(&mut self, molecule: &mut Molecule) -> Distribution1D {
        self.calculate_all(molecule).total
    }

    /// Full composite distribution, recomputed incrementally against the
    /// molecule's `StateManager` (spec.md §4.3). First call is a full build;
    /// subsequent calls reuse cached partials for unaffected body pairs.
    pub fn calculate_all(&mut self, molecule: &mut Molecule) -> CompositeParts<K> {
        let n = molecule.bodies.len();
        self.ensure_capacity(n);

        let externally_dirty = molecule.state().externally_modified_bodies();
        let internally_dirty = molecule.state().internally_modified_bodies();
        let hydration_dirty = molecule.state().hydration_modified();

        for (i, body) in molecule.bodies.iter().enumerate() {
            if externally_dirty[i] {
                self.body_coords[i].update_from_atoms(&body.atoms);
            }
        }
        if hydration_dirty {
            self.water_coords.update_from_waters(&molecule.waters);
        }

        // Self-correlation + within-body pairwise distances: unaffected by a
        // rigid transform, so only internal (atom-set) changes invalidate it.
        for i in 0..n {
            let needs = internally_dirty[i] || self.pair_cache[i][i].is_none();
            if needs {
                self.pair_cache[i][i] =
                    Some(within_body::<K>(&molecule.bodies[i].atoms, &self.body_coords[i], self.ff_count, &self.axis));
            }
        }

        // Cross-body pairs: either body moving invalidates the pair.
        for i in 0..n {
            for j in (i + 1)..n {
                let needs = externally_dirty[i] || externally_dirty[j] || self.pair_cache[i][j].is_none();
                if needs {
                    self.pair_cache[i][j] = Some(pairwise::<K>(
                        &molecule.bodies[i].atoms,
                        &self.body_coords[i],
                        &molecule.bodies[j].atoms,
                        &self.body_coords[j],
                        self.ff_count,
                        &self.axis,
                    ));
                }
            }
        }

        // Body-water pairs: the body moving or the water set changing both invalidate it.
        for i in 0..n {
            let needs = externally_dirty[i] || hydration_dirty || self.water_cache[i].is_none();
            if needs {
                self.water_cache[i] = Some(body_water::<K>(
                    &molecule.bodies[i].atoms,
                    &self.body_coords[i],
                    &molecule.waters,
                    &self.water_coords,
                    self.ff_count,
                    &self.axis,
                ));
            }
        }

        if hydration_dirty || self.ww_cache.is_none() {
            self.ww_cache = Some(water_water::<K>(&molecule.waters, &self.water_coords, &self.axis));
        }

        molecule.state_mut().reset();

        let mut p_aa = GenericDistribution3D::<K>::new(self.ff_count, self.axis.bins, self.axis.width());
        for i in 0..n {
            for j in i..n {
                if let Some(part) = &self.pair_cache[i][j] {
                    p_aa.add_assign(part);
                }
            }
        }

        let mut p_aw = GenericDistribution2D::<K>::new(self.ff_count, self.axis.bins, self.axis.width());
        for cache in self.water_cache.iter().flatten() {
            p_aw.add_assign(cache);
        }

        let p_ww = self.ww_cache.clone().unwrap_or_else(|| K::new(self.axis.bins, self.axis.width()));

        let aw_total = p_aw.total();
        let mut total = p_aa.total();
        for (i, c) in aw_total.counts.iter().enumerate() {
            total.counts[i] += 2.0 * c;
        }
        for (i, c) in p_ww.counts().iter().enumerate() {
            total.counts[i] += c;
        }
        total.trim(MIN_AXIS_BINS);

        CompositeParts { p_aa, p_aw, p_ww, total }
    }
}

/// Within one body: the diagonal self term (`Σ w_i²` at bin 0) plus the
/// full ordered-pair distance distribution between its own atoms.
fn within_body<K: Hist1D>(
    atoms: &[Atom],
    coords: &CompactCoordinates,
    ff_count: usize,
    axis: &Axis,
) -> GenericDistribution3D<K> {
    let bins = axis.bins;
    let width = axis.width();
    let mut dist = GenericDistribution3D::<K>::new(ff_count, bins, width);
    for atom in atoms {
        let ff = atom.form_factor.index();
        dist.row_mut(ff, ff).add(0.0, (atom.weight as f64).powi(2));
    }
    if atoms.len() < 2 {
        return dist;
    }
    let data = &coords.data;
    let partial = atoms
        .par_chunks(JOB_SIZE)
        .enumerate()
        .map(|(chunk_idx, chunk)| {
            let base = chunk_idx * JOB_SIZE;
            let mut local = GenericDistribution3D::<K>::new(ff_count, bins, width);
            for (offset, src_atom) in chunk.iter().enumerate() {
                let i = base + offset;
                let ff_a = src_atom.form_factor.index();
                let src_c = &data[i];
                let mut j = i + 1;
                while j < data.len() {
                    let end = (j + 8).min(data.len());
                    let block = &data[j..end];
                    let (dd, ww) = eval_block8(src_c, block);
                    for k in 0..block.len() {
                        let ff_b = atoms[j + k].form_factor.index();
                        local.row_mut(ff_a, ff_b).add(dd[k] as f64, ww[k] as f64);
                        local.row_mut(ff_b, ff_a).add(dd[k] as f64, ww[k] as f64);
                    }
                    j = end;
                }
            }
            local
        })
        .reduce(
            || GenericDistribution3D::<K>::new(ff_count, bins, width),
            |mut a, b| {
                a.add_assign(&b);
                a
            },
        );
    dist.add_assign(&partial);
    dist
}

/// Between two distinct bodies: every atom-pair is visited once by the
/// cross product, so both `(ff_a, ff_b)` and `(ff_b, ff_a)` are credited to
/// represent the two ordered-pair contributions.
fn pairwise<K: Hist1D>(
    src_atoms: &[Atom],
    src_coords: &CompactCoordinates,
    dst_atoms: &[Atom],
    dst_coords: &CompactCoordinates,
    ff_count: usize,
    axis: &Axis,
) -> GenericDistribution3D<K> {
    let bins = axis.bins;
    let width = axis.width();
    if src_atoms.is_empty() || dst_atoms.is_empty() {
        return GenericDistribution3D::new(ff_count, bins, width);
    }
    let dst_data = &dst_coords.data;
    src_atoms
        .par_chunks(JOB_SIZE)
        .zip(src_coords.data.par_chunks(JOB_SIZE))
        .map(|(atom_chunk, coord_chunk)| {
            let mut local = GenericDistribution3D::<K>::new(ff_count, bins, width);
            for (src_atom, src_c) in atom_chunk.iter().zip(coord_chunk) {
                let ff_a = src_atom.form_factor.index();
                let mut start = 0;
                while start < dst_data.len() {
                    let end = (start + 8).min(dst_data.len());
                    let block = &dst_data[start..end];
                    let (dist, weight) = eval_block8(src_c, block);
                    for k in 0..block.len() {
                        let ff_b = dst_atoms[start + k].form_factor.index();
                        local.row_mut(ff_a, ff_b).add(dist[k] as f64, weight[k] as f64);
                        local.row_mut(ff_b, ff_a).add(dist[k] as f64, weight[k] as f64);
                    }
                    start = end;
                }
            }
            local
        })
        .reduce(
            || GenericDistribution3D::<K>::new(ff_count, bins, width),
            |mut a, b| {
                a.add_assign(&b);
                a
            },
        )
}

/// Atom-water cross term: single-counted per pair (spec.md §4.4 applies the
/// `2·cw` factor explicitly downstream).
fn body_water<K: Hist1D>(
    atoms: &[Atom],
    atom_coords: &CompactCoordinates,
    waters: &[Water],
    water_coords: &CompactCoordinates,
    ff_count: usize,
    axis: &Axis,
) -> GenericDistribution2D<K> {
    let bins = axis.bins;
    let width = axis.width();
    if atoms.is_empty() || waters.is_empty() {
        return GenericDistribution2D::new(ff_count, bins, width);
    }
    let water_data = &water_coords.data;
    atoms
        .par_chunks(JOB_SIZE)
        .zip(atom_coords.data.par_chunks(JOB_SIZE))
        .map(|(atom_chunk, coord_chunk)| {
            let mut local = GenericDistribution2D::<K>::new(ff_count, bins, width);
            for (atom, c) in atom_chunk.iter().zip(coord_chunk) {
                let ff = atom.form_factor.index();
                let mut start = 0;
                while start < water_data.len() {
                    let end = (start + 8).min(water_data.len());
                    let block = &water_data[start..end];
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
}

/// Water-water term: same ordered-pair convention as [`within_body`], but
/// waters carry no type split so a bare `K` suffices.
fn water_water<K: Hist1D>(waters: &[Water], coords: &CompactCoordinates, axis: &Axis) -> K {
    let mut total = K::new(axis.bins, axis.width());
    for w in waters {
        total.add(0.0, (w.weight as f64).powi(2));
    }
    if waters.len() < 2 {
        return total;
    }
    let data = &coords.data;
    let partial = (0..waters.len())
        .collect::<Vec<_>>()
        .par_chunks(JOB_SIZE)
        .map(|idx_chunk| {
            let mut local = K::new(axis.bins, axis.width());
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
            || K::new(axis.bins, axis.width()),
            |mut a, b| {
                a.add_assign(&b);
                a
            },
        );
    total.add_assign(&partial);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use lin_alg::f32::Vec3;

    fn cube_atoms() -> Vec<Atom> {
        let mut atoms = Vec::with_capacity(8);
        for &x in &[-1.0f32, 1.0] {
            for &y in &[-1.0f32, 1.0] {
                for &z in &[-1.0f32, 1.0] {
                    atoms.push(Atom::new(Vec3::new(x, y, z), 1.0, FormFactorType::C));
                }
            }
        }
        atoms
    }

    #[test]
    fn unit_cube_carbon_only_histogram() {
        let mut molecule = Molecule::new(vec![Body::new(cube_atoms())]);
        let mut mgr = HistogramManager::<Distribution1D>::new(Axis::new(0.0, 20.0, 40));
        let parts = mgr.calculate_all(&mut molecule);
        let c = FormFactorType::C.index();
        let row = parts.p_aa.row(c, c);
        assert_eq!(row.counts()[0], 8.0);
        assert_eq!(row.counts()[4], 24.0); // distance 2
        assert_eq!(row.counts()[5], 24.0); // distance sqrt(8)
        assert_eq!(row.counts()[6], 8.0); // distance sqrt(12)
    }

    #[test]
    fn unit_cube_with_central_water_histogram() {
        let mut molecule =
            Molecule::with_waters(vec![Body::new(cube_atoms())], vec![Water::new(Vec3::new(0.0, 0.0, 0.0), 1.0)]);
        let mut mgr = HistogramManager::<Distribution1D>::new(Axis::new(0.0, 20.0, 40));
        let parts = mgr.calculate_all(&mut molecule);
        let c = FormFactorType::C.index();
        let aw_row = parts.p_aw.row(c);
        assert_eq!(aw_row.counts()[3], 8.0); // distance sqrt(3)
        assert_eq!(parts.p_ww.counts()[0], 1.0);
    }

    #[test]
    fn zero_atom_molecule_yields_zero_histogram_without_error() {
        let mut molecule = Molecule::new(vec![Body::new(Vec::new())]);
        let mut mgr = HistogramManager::<Distribution1D>::new(Axis::new(0.0, 20.0, 40));
        let parts = mgr.calculate_all(&mut molecule);
        assert!(parts.total.counts.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn thread_count_invariance() {
        let atoms: Vec<Atom> = (0..60)
            .map(|i| {
                let t = i as f32;
                Atom::new(Vec3::new(t * 0.37, (t * 1.1).sin() * 5.0, (t * 0.53).cos() * 5.0), 1.0, FormFactorType::C)
            })
            .collect();
        let axis = Axis::new(0.0, 50.0, 200);

        let pool1 = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let pool4 = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();

        let mut m1 = Molecule::new(vec![Body::new(atoms.clone())]);
        let mut mgr1 = HistogramManager::<Distribution1D>::new(axis);
        let total1 = pool1.install(|| mgr1.calculate_all(&mut m1).total);

        let mut m2 = Molecule::new(vec![Body::new(atoms.clone())]);
        let mut mgr2 = HistogramManager::<Distribution1D>::new(axis);
        let total4 = pool4.install(|| mgr2.calculate_all(&mut m2).total);

        assert_eq!(total1.len(), total4.len());
        for (a, b) in total1.counts.iter().zip(&total4.counts) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn incremental_translate_matches_fresh_rebuild() {
        let mut atoms_a = cube_atoms();
        let axis = Axis::new(0.0, 20.0, 40);

        // Incremental: build once, translate, recompute.
        let mut molecule = Molecule::new(vec![Body::new(atoms_a.clone())]);
        let mut mgr = HistogramManager::<Distribution1D>::new(axis);
        let _ = mgr.calculate_all(&mut molecule);
        molecule.translate_body(0, Vec3::new(5.0, 0.0, 0.0));
        let incremental = mgr.calculate_all(&mut molecule).total;

        // Fresh: build directly from translated positions.
        for a in atoms_a.iter_mut() {
            a.position = a.position + Vec3::new(5.0, 0.0, 0.0);
        }
        let mut fresh_molecule = Molecule::new(vec![Body::new(atoms_a)]);
        let mut fresh_mgr = HistogramManager::<Distribution1D>::new(axis);
        let fresh = fresh_mgr.calculate_all(&mut fresh_molecule).total;

        assert_eq!(incremental.len(), fresh.len());
        for (a, b) in incremental.counts.iter().zip(&fresh.counts) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
