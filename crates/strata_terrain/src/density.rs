//! # Density Sampling
//!
//! Terrain shape comes from a coarse 3D density grid: one noise column
//! every 4 blocks horizontally, one sample every 8 blocks vertically.
//! A world column is resolved by trilinear interpolation of the 2x2
//! noise columns around it.
//!
//! ## Material Rule
//!
//! ```text
//! density > 0       -> biome stone replacement at y
//! y < sea level     -> biome water replacement at y
//! otherwise         -> air
//! ```
//!
//! The order of these checks is what puts water in ocean basins and air
//! above dry land.

use std::sync::Arc;

use strata_core::MaterialId;

use crate::biome::{BiomeConfig, CachedBiomeLookup};
use crate::config::NOISE_CELL_HEIGHT;
use crate::noise::{lerp, lerp2, SimplexNoise, WorldSeed};

/// Horizontal blocks per noise cell.
pub const NOISE_CELL_WIDTH: i32 = 4;

/// Source of coarse density columns.
pub trait DensitySource: Send + Sync {
    /// Number of vertical noise cells. Columns hold one more sample.
    fn noise_size_y(&self) -> usize;

    /// Fills `out` (length `noise_size_y() + 1`) with the density column at
    /// noise coordinates `(noise_x, noise_z)`, bottom to top.
    fn fill_noise_column(&self, noise_x: i32, noise_z: i32, out: &mut [f64]);
}

/// Biome-shaped octave noise.
///
/// The density at height `y` is the distance below the biome's surface
/// (in noise cells) plus 3D noise scaled by the biome's volatility.
pub struct NoiseField {
    biomes: Arc<CachedBiomeLookup>,
    height_noise: SimplexNoise,
    density_noise: SimplexNoise,
    noise_size_y: usize,
}

impl NoiseField {
    const HEIGHT_SCALE: f64 = 0.004;
    const DENSITY_SCALE_XZ: f64 = 0.02;
    const DENSITY_SCALE_Y: f64 = 0.04;

    /// Creates a field for `noise_size_y` vertical cells.
    #[must_use]
    pub fn new(seed: WorldSeed, biomes: Arc<CachedBiomeLookup>, noise_size_y: usize) -> Self {
        Self {
            biomes,
            height_noise: SimplexNoise::new(seed.derive(10)),
            density_noise: SimplexNoise::new(seed.derive(11)),
            noise_size_y,
        }
    }
}

impl DensitySource for NoiseField {
    fn noise_size_y(&self) -> usize {
        self.noise_size_y
    }

    fn fill_noise_column(&self, noise_x: i32, noise_z: i32, out: &mut [f64]) {
        let x = noise_x * NOISE_CELL_WIDTH;
        let z = noise_z * NOISE_CELL_WIDTH;
        let biome = self.biomes.biome_at(x, z);
        let (fx, fz) = (f64::from(x), f64::from(z));

        let surface = biome.base_height
            + biome.height_variation
                * self
                    .height_noise
                    .octaved(fx * Self::HEIGHT_SCALE, fz * Self::HEIGHT_SCALE, 4, 0.5, 2.0);

        for (ny, slot) in out.iter_mut().enumerate().take(self.noise_size_y + 1) {
            let y = (ny as i32 * NOISE_CELL_HEIGHT) as f64;
            let shape = (surface - y) / f64::from(NOISE_CELL_HEIGHT);
            let detail = if biome.volatility > 0.0 {
                biome.volatility
                    * self.density_noise.octaved3d(
                        fx * Self::DENSITY_SCALE_XZ,
                        y * Self::DENSITY_SCALE_Y,
                        fz * Self::DENSITY_SCALE_XZ,
                        3,
                        0.5,
                        2.0,
                    )
            } else {
                0.0
            };
            *slot = shape + detail;
        }
    }
}

/// The four noise columns around one world column, with the horizontal
/// interpolation fractions.
///
/// Columns are ordered `[x0z0, x0z1, x1z0, x1z1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    columns: [Vec<f64>; 4],
    x_frac: f64,
    z_frac: f64,
}

impl DensityField {
    /// Builds a field from precomputed columns.
    ///
    /// All columns must have the same length (`noise_size_y + 1`).
    #[must_use]
    pub fn from_columns(columns: [Vec<f64>; 4], x_frac: f64, z_frac: f64) -> Self {
        Self {
            columns,
            x_frac,
            z_frac,
        }
    }

    /// Number of vertical noise cells.
    #[inline]
    #[must_use]
    pub fn noise_size_y(&self) -> usize {
        self.columns[0].len().saturating_sub(1)
    }

    /// Interpolated density at sub-step `piece_y` (0..8) of cell `noise_y`.
    #[inline]
    #[must_use]
    pub fn density(&self, noise_y: usize, piece_y: i32) -> f64 {
        let t = f64::from(piece_y) / f64::from(NOISE_CELL_HEIGHT);
        let [c00, c01, c10, c11] = &self.columns;
        let v = |c: &[f64]| lerp(t, c[noise_y], c[noise_y + 1]);
        lerp2(self.x_frac, self.z_frac, v(c00), v(c10), v(c01), v(c11))
    }
}

/// Noise columns for a whole chunk: a 5x5 grid covering the chunk's 4x4
/// cells plus the far edges.
pub struct NoiseGrid {
    origin_x: i32,
    origin_z: i32,
    columns: Vec<Vec<f64>>,
}

impl NoiseGrid {
    const SIDE: usize = 5;

    /// Samples the grid for the chunk whose origin is `(world_x, world_z)`.
    #[must_use]
    pub fn sample(source: &dyn DensitySource, world_x: i32, world_z: i32) -> Self {
        let origin_x = world_x.div_euclid(NOISE_CELL_WIDTH);
        let origin_z = world_z.div_euclid(NOISE_CELL_WIDTH);
        let len = source.noise_size_y() + 1;
        let mut columns = Vec::with_capacity(Self::SIDE * Self::SIDE);
        for dx in 0..Self::SIDE as i32 {
            for dz in 0..Self::SIDE as i32 {
                let mut column = vec![0.0; len];
                source.fill_noise_column(origin_x + dx, origin_z + dz, &mut column);
                columns.push(column);
            }
        }
        Self {
            origin_x,
            origin_z,
            columns,
        }
    }

    /// The density field of world column `(x, z)`, which must lie in the
    /// sampled chunk.
    #[must_use]
    pub fn field_at(&self, x: i32, z: i32) -> DensityField {
        let cx = (x.div_euclid(NOISE_CELL_WIDTH) - self.origin_x) as usize;
        let cz = (z.div_euclid(NOISE_CELL_WIDTH) - self.origin_z) as usize;
        let column = |dx: usize, dz: usize| self.columns[(cx + dx) * Self::SIDE + cz + dz].clone();
        DensityField::from_columns(
            [column(0, 0), column(0, 1), column(1, 0), column(1, 1)],
            fraction(x),
            fraction(z),
        )
    }
}

#[inline]
fn fraction(v: i32) -> f64 {
    f64::from(v.rem_euclid(NOISE_CELL_WIDTH)) / f64::from(NOISE_CELL_WIDTH)
}

/// Turns density fields into material columns.
pub struct DensityColumnSampler {
    source: Arc<dyn DensitySource>,
    sea_level: i32,
}

impl DensityColumnSampler {
    /// Creates a sampler over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn DensitySource>, sea_level: i32) -> Self {
        Self { source, sea_level }
    }

    /// The density source.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn DensitySource> {
        &self.source
    }

    /// Sea level used by the material rule.
    #[must_use]
    pub const fn sea_level(&self) -> i32 {
        self.sea_level
    }

    /// Column height in blocks.
    #[must_use]
    pub fn height(&self) -> usize {
        self.source.noise_size_y() * NOISE_CELL_HEIGHT as usize
    }

    /// Samples the 2x2 noise columns around world column `(x, z)`.
    ///
    /// Pure function of the source and the coordinates.
    #[must_use]
    pub fn sample_column(&self, x: i32, z: i32) -> DensityField {
        let x_start = x.div_euclid(NOISE_CELL_WIDTH);
        let z_start = z.div_euclid(NOISE_CELL_WIDTH);
        let len = self.source.noise_size_y() + 1;

        let column = |nx: i32, nz: i32| {
            let mut out = vec![0.0; len];
            self.source.fill_noise_column(nx, nz, &mut out);
            out
        };
        DensityField::from_columns(
            [
                column(x_start, z_start),
                column(x_start, z_start + 1),
                column(x_start + 1, z_start),
                column(x_start + 1, z_start + 1),
            ],
            fraction(x),
            fraction(z),
        )
    }

    /// Material for one voxel.
    #[inline]
    #[must_use]
    pub fn material_at(&self, density: f64, y: i32, biome: &BiomeConfig) -> MaterialId {
        if density > 0.0 {
            biome.stone_replacement(y)
        } else if y < self.sea_level {
            biome.water_replacement(y)
        } else {
            MaterialId::AIR
        }
    }

    /// Fills `out` (indexed by Y) with the column's materials. `bias(y)` is
    /// added to the interpolated density before the material rule.
    pub fn fill_column<F>(&self, field: &DensityField, biome: &BiomeConfig, bias: F, out: &mut [MaterialId])
    where
        F: Fn(i32) -> f64,
    {
        for noise_y in 0..field.noise_size_y() {
            for piece_y in 0..NOISE_CELL_HEIGHT {
                let y = noise_y as i32 * NOISE_CELL_HEIGHT + piece_y;
                let Some(slot) = out.get_mut(y as usize) else {
                    return;
                };
                let density = field.density(noise_y, piece_y) + bias(y);
                *slot = self.material_at(density, y, biome);
            }
        }
    }

    /// Scans the column from the top and returns `y + 1` of the first
    /// material accepted by `predicate`, or 0 if none is.
    #[must_use]
    pub fn sample_height<P>(&self, field: &DensityField, biome: &BiomeConfig, predicate: P) -> i32
    where
        P: Fn(MaterialId) -> bool,
    {
        for noise_y in (0..field.noise_size_y()).rev() {
            for piece_y in (0..NOISE_CELL_HEIGHT).rev() {
                let y = noise_y as i32 * NOISE_CELL_HEIGHT + piece_y;
                let material = self.material_at(field.density(noise_y, piece_y), y, biome);
                if predicate(material) {
                    return y + 1;
                }
            }
        }
        0
    }
}
