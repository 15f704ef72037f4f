//! # STRATA Terrain
//!
//! Deterministic, speculative voxel terrain generation.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and chunk always produce the same blocks
//! 2. **Staged**: Base fill, surface, carving and decoration run in order
//! 3. **Speculative**: Neighbouring chunks are generated ahead of demand
//! 4. **Single computation**: A chunk is generated at most once per request
//!
//! ## Core Components
//!
//! - `SimplexNoise` / `NoiseField`: coarse density noise
//! - `DensityColumnSampler`: density to material columns and height queries
//! - `StructureOverlay`: density bias around rigid structure pieces
//! - `Pipeline`: the per-chunk stages
//! - `ShadowCache`: worker pool and single-use cache of generated chunks
//! - `TerrainGenerator`: pipeline plus shadow cache, the host entry point
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{BlockRegistry, ChunkCoord, MaterialArena, RegistryMaterialReader};
//! use strata_terrain::{ClimateBiomeSource, ClimateBiomes, GeneratorConfig, TerrainGenerator, WorldSeed};
//!
//! let arena = Arc::new(MaterialArena::new());
//! let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
//! let config = GeneratorConfig::production().with_seed(12345);
//! let biomes = ClimateBiomeSource::new(WorldSeed::new(config.seed), ClimateBiomes::vanilla(&reader)?);
//!
//! let generator = TerrainGenerator::new(config, Arc::new(biomes), arena, &reader)?;
//! let chunk = generator.generate(ChunkCoord::new(0, 0))?;
//!
//! // Ground exists somewhere in every column
//! assert!(chunk.highest_y(8, 8, |m| m != MaterialId::AIR).is_some());
//! generator.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod biome;
pub mod carver;
pub mod chunk;
pub mod config;
pub mod decoration;
pub mod density;
pub mod error;
pub mod generator;
pub mod noise;
pub mod pipeline;
pub mod shadow;
pub mod structure;
pub mod surface;

pub use biome::{
    BiomeConfig, BiomeProvider, CachedBiomeLookup, CarverKind, ClimateBiomeSource, ClimateBiomes,
    LayerSource, ReplaceRule, ReplaceTarget, SingleBiomeSource,
};
pub use carver::{carve_neighbourhood, CanyonCarver, CarveContext, Carver, CaveCarver, CARVER_RANGE};
pub use chunk::{CarvingMask, ChunkBuffer, ShadowChunk};
pub use config::{DimensionOverrides, GeneratorConfig, PortalDefaults, PortalSettings, NOISE_CELL_HEIGHT};
pub use decoration::{DecorationContext, Decorator, ExternalDecorator, Resource};
pub use density::{DensityColumnSampler, DensityField, DensitySource, NoiseField, NoiseGrid, NOISE_CELL_WIDTH};
pub use error::{Stage, TerrainError, TerrainResult};
pub use generator::TerrainGenerator;
pub use noise::{SimplexNoise, WorldSeed};
pub use pipeline::{HeightQuery, Pipeline};
pub use shadow::{ShadowCache, ShadowGenerator, ShadowStats, ShutdownReport};
pub use structure::{
    BoundingBox, InMemoryStructureCache, JigsawStructureData, JunctionPoint, NoStructures, Placement,
    StructureCache, StructureHandle, StructureOverlay, StructurePiece, StructurePieceSource,
    STRUCTURE_RADIUS,
};
pub use surface::{dress_column, SurfaceBuilder, GROUND_DEPTH};
