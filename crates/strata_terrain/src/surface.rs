//! # Surface Blocks
//!
//! Two passes put soil on bare stone:
//!
//! - [`dress_column`] runs during base fill for ordinary biomes and lays the
//!   biome's surface and ground blocks on the first stone below open air.
//! - [`SurfaceBuilder`] is the separate surface stage for template biomes.
//!   It rebuilds the top layers from a 2D surface-noise depth and the
//!   world's default block and fluid.

use strata_core::{MaterialArena, MaterialId, CHUNK_SIZE};

use crate::biome::{BiomeConfig, CachedBiomeLookup};
use crate::chunk::ChunkBuffer;
use crate::noise::{SimplexNoise, WorldSeed};

/// Ground blocks laid under the surface block of ordinary biomes.
pub const GROUND_DEPTH: usize = 3;

/// Lays `biome`'s surface and ground blocks on the column (indexed by Y).
///
/// Only stone directly under air is dressed. Stone under water gets the
/// ground block on top instead of the surface block.
pub fn dress_column(column: &mut [MaterialId], biome: &BiomeConfig, sea_level: i32) {
    let mut above_is_air = true;
    let mut y = column.len();
    while y > 0 {
        y -= 1;
        let material = column[y];
        let yi = y as i32;
        if material == MaterialId::AIR {
            above_is_air = true;
            continue;
        }
        if material != biome.stone_replacement(yi) {
            above_is_air = false;
            continue;
        }
        if above_is_air {
            column[y] = if yi >= sea_level - 1 {
                biome.surface_block
            } else {
                biome.ground_block
            };
            let mut depth = 0;
            while depth < GROUND_DEPTH && y > 0 && column[y - 1] == biome.stone_replacement(yi - 1 - depth as i32) {
                y -= 1;
                column[y] = biome.ground_block;
                depth += 1;
            }
        }
        above_is_air = false;
    }
}

/// Surface stage for template biomes.
pub struct SurfaceBuilder {
    noise: SimplexNoise,
    scale: f64,
    default_block: MaterialId,
    default_fluid: MaterialId,
    sea_level: i32,
}

impl SurfaceBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(
        seed: WorldSeed,
        scale: f64,
        default_block: MaterialId,
        default_fluid: MaterialId,
        sea_level: i32,
    ) -> Self {
        Self {
            noise: SimplexNoise::new(seed.derive(20)),
            scale,
            default_block,
            default_fluid,
            sea_level,
        }
    }

    /// Surface depth at a world column: 1 to 8 blocks.
    #[must_use]
    pub fn depth_at(&self, x: i32, z: i32) -> usize {
        let noise = self.noise.sample(f64::from(x) * self.scale, f64::from(z) * self.scale) * 15.0;
        (noise / 3.0 + 3.0).clamp(1.0, 8.0) as usize
    }

    /// Rebuilds the surface of every template-biome column in `buffer`.
    ///
    /// Only blocks equal to the default block are replaced, and open space
    /// below sea level is filled with the default fluid. Bedrock and
    /// non-default solids are left alone.
    pub fn build(&self, buffer: &mut ChunkBuffer, biomes: &CachedBiomeLookup, arena: &MaterialArena) {
        let origin_x = buffer.coord().world_x();
        let origin_z = buffer.coord().world_z();
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let x = origin_x + lx as i32;
                let z = origin_z + lz as i32;
                let biome = biomes.biome_at(x, z);
                if biome.is_template {
                    self.build_column(buffer, lx, lz, &biome, self.depth_at(x, z), arena);
                }
            }
        }
    }

    fn build_column(
        &self,
        buffer: &mut ChunkBuffer,
        lx: usize,
        lz: usize,
        biome: &BiomeConfig,
        depth: usize,
        arena: &MaterialArena,
    ) {
        // None until the first ground block of a run is found.
        let mut remaining: Option<usize> = None;
        for y in (0..buffer.height()).rev() {
            let material = buffer.get(lx, y, lz);
            let kind = arena.kind(material);
            if kind.air {
                if (y as i32) < self.sea_level {
                    buffer.set(lx, y, lz, self.default_fluid);
                }
                remaining = None;
                continue;
            }
            if material != self.default_block {
                if !kind.solid {
                    remaining = None;
                }
                continue;
            }
            match remaining {
                None => {
                    let top = if (y as i32) >= self.sea_level - 1 {
                        biome.surface_block
                    } else {
                        biome.ground_block
                    };
                    buffer.set(lx, y, lz, top);
                    remaining = Some(depth.saturating_sub(1));
                }
                Some(left) if left > 0 => {
                    buffer.set(lx, y, lz, biome.ground_block);
                    remaining = Some(left - 1);
                }
                Some(_) => {}
            }
        }
    }
}
