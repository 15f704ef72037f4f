//! # Decoration
//!
//! The last pipeline stage, in order:
//!
//! 1. Resources of the region's center biome (ores, plants)
//! 2. Externally registered decorators
//! 3. Snow and ice, unless the center and all four corner biome samples
//!    are template biomes
//!
//! Every placement is drawn from an RNG seeded by the world seed and the
//! chunk position, so decoration is reproducible.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_core::{
    with_property, ChunkCoord, MaterialArena, MaterialId, Property, PropertyValue, CHUNK_SIZE,
};

use crate::biome::{BiomeConfig, CachedBiomeLookup};
use crate::chunk::ChunkBuffer;
use crate::error::TerrainResult;
use crate::noise::WorldSeed;
use crate::structure::StructureHandle;

/// A biome resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Ore veins replacing `target`.
    Ore {
        /// Ore material.
        material: MaterialId,
        /// Only this material is replaced.
        target: MaterialId,
        /// Blocks per vein.
        vein_size: u32,
        /// Veins per chunk.
        frequency: u32,
        /// Lowest vein Y.
        min_y: i32,
        /// Highest vein Y.
        max_y: i32,
    },
    /// Single plants on top of `on`.
    Plant {
        /// Plant material.
        material: MaterialId,
        /// Block the plant must stand on.
        on: MaterialId,
        /// Attempts per chunk.
        frequency: u32,
    },
}

/// Inputs of one decoration pass.
pub struct DecorationContext<'a> {
    /// Chunk being decorated.
    pub coord: ChunkCoord,
    /// World seed.
    pub seed: WorldSeed,
    /// Biome at the center of the chunk.
    pub biome: &'a BiomeConfig,
    /// Structure record of the chunk.
    pub structures: StructureHandle,
    /// Material lookup.
    pub arena: &'a MaterialArena,
}

/// A decorator registered by the host.
pub trait ExternalDecorator: Send + Sync {
    /// Name used in errors.
    fn name(&self) -> &str;

    /// Decorates the chunk.
    ///
    /// # Errors
    ///
    /// Any error aborts decoration of the chunk.
    fn decorate(&self, ctx: &DecorationContext<'_>, rng: &mut ChaCha8Rng, buffer: &mut ChunkBuffer) -> TerrainResult<()>;
}

/// Built-in decoration.
pub struct Decorator {
    snow: MaterialId,
    ice: MaterialId,
    sea_level: i32,
}

impl Decorator {
    /// Creates a decorator.
    #[must_use]
    pub const fn new(snow: MaterialId, ice: MaterialId, sea_level: i32) -> Self {
        Self { snow, ice, sea_level }
    }

    /// True if the center and four corner samples of the chunk are all template biomes.
    #[must_use]
    pub fn all_template(biomes: &CachedBiomeLookup, coord: ChunkCoord) -> bool {
        let qx = coord.x * 4;
        let qz = coord.z * 4;
        [(2, 2), (0, 0), (4, 0), (0, 4), (4, 4)]
            .iter()
            .all(|&(dx, dz)| biomes.noise_biome(qx + dx, qz + dz).is_template)
    }

    /// Runs the decoration stage on `buffer`.
    ///
    /// # Errors
    ///
    /// Returns the first external decorator failure.
    pub fn decorate(
        &self,
        ctx: &DecorationContext<'_>,
        externals: &[Arc<dyn ExternalDecorator>],
        biomes: &CachedBiomeLookup,
        buffer: &mut ChunkBuffer,
    ) -> TerrainResult<()> {
        let base = ctx.seed.decoration_seed(ctx.coord.world_x(), ctx.coord.world_z());

        for (index, resource) in ctx.biome.resources.iter().enumerate() {
            let mut rng = ChaCha8Rng::seed_from_u64(base.wrapping_add(index as u64));
            place_resource(resource, &mut rng, buffer);
        }

        let offset = ctx.biome.resources.len() as u64;
        for (index, external) in externals.iter().enumerate() {
            let mut rng = ChaCha8Rng::seed_from_u64(base.wrapping_add(offset + index as u64));
            external.decorate(ctx, &mut rng, buffer)?;
        }

        if !Self::all_template(biomes, ctx.coord) {
            self.snow_and_ice(buffer, biomes, ctx.arena)?;
        }
        Ok(())
    }

    fn snow_and_ice(
        &self,
        buffer: &mut ChunkBuffer,
        biomes: &CachedBiomeLookup,
        arena: &MaterialArena,
    ) -> TerrainResult<()> {
        let origin_x = buffer.coord().world_x();
        let origin_z = buffer.coord().world_z();
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let biome = biomes.biome_at(origin_x + lx as i32, origin_z + lz as i32);
                if !biome.freezes {
                    continue;
                }
                let Some(top) = buffer.highest_y(lx, lz, |m| m != MaterialId::AIR) else {
                    continue;
                };
                let material = buffer.get(lx, top, lz);
                let kind = arena.kind(material);
                if kind.liquid {
                    if top as i32 == self.sea_level - 1 && material == biome.water_replacement(top as i32) {
                        buffer.set(lx, top, lz, self.ice);
                    }
                } else if kind.solid && kind.snow_settles && top + 1 < buffer.height() {
                    buffer.set(lx, top + 1, lz, self.snow);
                    if arena.get(material)?.properties.supports(Property::Snowy) {
                        let snowy = with_property(arena, material, PropertyValue::Snowy(true))?;
                        buffer.set(lx, top, lz, snowy);
                    }
                }
            }
        }
        Ok(())
    }
}

fn place_resource(resource: &Resource, rng: &mut ChaCha8Rng, buffer: &mut ChunkBuffer) {
    match *resource {
        Resource::Ore {
            material,
            target,
            vein_size,
            frequency,
            min_y,
            max_y,
        } => {
            let top = max_y.min(buffer.height() as i32 - 1);
            if top < min_y {
                return;
            }
            for _ in 0..frequency {
                let mut x = rng.gen_range(0..CHUNK_SIZE as i32);
                let mut y = rng.gen_range(min_y..=top);
                let mut z = rng.gen_range(0..CHUNK_SIZE as i32);
                for _ in 0..vein_size {
                    if x >= 0 && z >= 0 && y >= 0 && buffer.get(x as usize, y as usize, z as usize) == target {
                        buffer.set(x as usize, y as usize, z as usize, material);
                    }
                    x += rng.gen_range(-1..=1);
                    y += rng.gen_range(-1..=1);
                    z += rng.gen_range(-1..=1);
                }
            }
        }
        Resource::Plant {
            material,
            on,
            frequency,
        } => {
            for _ in 0..frequency {
                let x = rng.gen_range(0..CHUNK_SIZE);
                let z = rng.gen_range(0..CHUNK_SIZE);
                let Some(top) = buffer.highest_y(x, z, |m| m != MaterialId::AIR) else {
                    continue;
                };
                if buffer.get(x, top, z) == on && top + 1 < buffer.height() {
                    buffer.set(x, top + 1, z, material);
                }
            }
        }
    }
}
