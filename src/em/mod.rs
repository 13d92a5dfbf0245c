//! EM-map fitting: convert a 3-D electron-density map into an atom cloud
//! and search for the density threshold that best matches a SAXS curve
//! (spec.md §4.6), grounded on `original_source/source/em/ImageStack.cpp`
//! and `original_source/source/em/manager/SmartProteinManager.cpp`.

pub mod protein_manager;
pub mod threshold_search;

pub use protein_manager::ProteinManager;
pub use threshold_search::{search, ThresholdSearchResult};

/// Header metadata for a CCP4/MRC-style density map (spec.md §6: "1024-byte
/// header followed by a 3-D density grid").
#[derive(Clone, Copy, Debug)]
pub struct MapHeader {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub voxel_size: f64,
    pub origin: (f64, f64, f64),
}

impl MapHeader {
    pub fn voxel_volume(&self) -> f64 {
        self.voxel_size * self.voxel_size * self.voxel_size
    }
}

/// A single voxel's world position and density value.
#[derive(Clone, Copy, Debug)]
pub struct Voxel {
    pub position: lin_alg::f32::Vec3,
    pub density: f64,
}

/// A flat 3-D density grid: the decoded form of an input CCP4/MRC map
/// (spec.md §3 `ImageStack`, "vector of 2-D density slices plus a header").
#[derive(Clone, Debug)]
pub struct ImageStack {
    pub header: MapHeader,
    values: Vec<f64>,
}

impl ImageStack {
    pub fn new(header: MapHeader, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), header.nx * header.ny * header.nz);
        Self { header, values }
    }

    #[inline]
    fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (iz * self.header.ny + iy) * self.header.nx + ix
    }

    pub fn density_at(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        self.values[self.index(ix, iy, iz)]
    }

    /// Minimum and maximum density present in the stack, the natural
    /// `[sigma_min, sigma_max]` bracket for the threshold search.
    pub fn density_range(&self) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &v in &self.values {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if !lo.is_finite() || !hi.is_finite() {
            (0.0, 0.0)
        } else {
            (lo, hi)
        }
    }

    /// Every voxel as a `(position, density)` pair, world-positioned from
    /// the header's origin and voxel size.
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        let (nx, ny, nz) = (self.header.nx, self.header.ny, self.header.nz);
        let vs = self.header.voxel_size as f32;
        let (ox, oy, oz) = self.header.origin;
        (0..nz).flat_map(move |iz| {
            (0..ny).flat_map(move |iy| {
                (0..nx).map(move |ix| {
                    let idx = (iz * ny + iy) * nx + ix;
                    Voxel {
                        position: lin_alg::f32::Vec3::new(
                            ox as f32 + ix as f32 * vs,
                            oy as f32 + iy as f32 * vs,
                            oz as f32 + iz as f32 * vs,
                        ),
                        density: self.values[idx],
                    }
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_stack(radius: f32, density: f64, n: usize, voxel_size: f64) -> ImageStack {
        let half = (n / 2) as f32;
        let mut values = vec![0.0; n * n * n];
        for iz in 0..n {
            for iy in 0..n {
                for ix in 0..n {
                    let dx = ix as f32 - half;
                    let dy = iy as f32 - half;
                    let dz = iz as f32 - half;
                    let r = (dx * dx + dy * dy + dz * dz).sqrt() * voxel_size as f32;
                    let idx = (iz * n + iy) * n + ix;
                    values[idx] = if r <= radius { density } else { 0.0 };
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
    fn density_range_matches_sphere_contrast() {
        let stack = sphere_stack(5.0, 1.0, 20, 1.0);
        let (lo, hi) = stack.density_range();
        assert_eq!(lo, 0.0);
        assert_eq!(hi, 1.0);
    }

    #[test]
    fn voxel_count_matches_grid_dims() {
        let stack = sphere_stack(5.0, 1.0, 8, 1.0);
        assert_eq!(stack.voxels().count(), 8 * 8 * 8);
    }
}
