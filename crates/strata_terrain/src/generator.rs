//! # Terrain Generator
//!
//! The entry point a host world uses. Wraps the [`Pipeline`] with a
//! [`ShadowCache`] so that base fill is served from speculatively
//! generated chunks whenever one is queued or ready.
//!
//! ## Request Flow
//!
//! ```text
//!   fill_from_noise(buffer)
//!     ├─ shadow hit  -> wait for the task, copy blocks, mask and stage
//!     ├─ shadow miss -> generate on the calling thread, sharing the result
//!     │                 with any other caller asking for the same chunk
//!     └─ queue the neighbouring chunks for speculative generation
//! ```
//!
//! Either way the chunk arrives with surface and carving done, so the
//! host's later calls for those stages are skipped on that buffer.

use std::sync::Arc;

use strata_core::{ChunkCoord, MaterialArena, MaterialId, MaterialReader};

use crate::biome::BiomeProvider;
use crate::chunk::ChunkBuffer;
use crate::config::{DimensionOverrides, GeneratorConfig, PortalSettings};
use crate::error::{Stage, TerrainResult};
use crate::pipeline::{HeightQuery, Pipeline};
use crate::shadow::{ShadowCache, ShadowGenerator, ShadowStats, ShutdownReport};

/// Terrain generator for one world or dimension.
///
/// # Example
///
/// ```rust,ignore
/// let generator = TerrainGenerator::new(config, provider, arena, &reader)?;
///
/// let mut buffer = generator.new_buffer(ChunkCoord::new(0, 0));
/// generator.fill_from_noise(&mut buffer)?;
/// generator.build_surface(&mut buffer)?;
/// generator.apply_carvers(&mut buffer)?;
/// generator.apply_decoration(&mut buffer)?;
///
/// generator.shutdown();
/// ```
pub struct TerrainGenerator {
    pipeline: Arc<Pipeline>,
    shadow: ShadowCache,
}

impl TerrainGenerator {
    /// Creates a generator with the default noise field.
    ///
    /// # Errors
    ///
    /// Returns `IncompatibleSource` if the biome provider exposes no layer
    /// source, or `Config` for an invalid config.
    pub fn new(
        config: GeneratorConfig,
        provider: Arc<dyn BiomeProvider>,
        arena: Arc<MaterialArena>,
        reader: &dyn MaterialReader,
    ) -> TerrainResult<Self> {
        Ok(Self::from_pipeline(Pipeline::new(config, provider, arena, reader)?))
    }

    /// Creates a generator around a configured pipeline.
    #[must_use]
    pub fn from_pipeline(pipeline: Pipeline) -> Self {
        let workers = pipeline.config().max_worker_threads;
        let pipeline = Arc::new(pipeline);
        let shadow = ShadowCache::new(Arc::clone(&pipeline) as Arc<dyn ShadowGenerator>, workers);
        Self { pipeline, shadow }
    }

    /// The underlying pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The shadow cache.
    #[must_use]
    pub const fn shadow(&self) -> &ShadowCache {
        &self.shadow
    }

    /// The generator config.
    #[must_use]
    pub fn config(&self) -> &GeneratorConfig {
        self.pipeline.config()
    }

    /// A fresh buffer for `coord` with the generator's height.
    #[must_use]
    pub fn new_buffer(&self, coord: ChunkCoord) -> ChunkBuffer {
        self.pipeline.new_buffer(coord)
    }

    /// Base fill for the buffer's chunk, served from the shadow cache when
    /// possible. Concurrent calls for one chunk run the pipeline once.
    /// Queues the surrounding chunks for speculative generation.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the buffer does not fit the generated chunk, or
    /// the pipeline's stage error on a miss.
    pub fn fill_from_noise(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        if buffer.has_completed(Stage::BaseFill) {
            return Ok(());
        }
        let coord = buffer.coord();
        self.shadow.mark_generated(coord);

        self.shadow.get_or_compute(coord)?.copy_into(buffer)?;

        self.shadow.queue_neighbours(coord, self.config().speculative_radius);
        Ok(())
    }

    /// Surface stage. Skipped for buffers filled from the shadow cache.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::build_surface`].
    pub fn build_surface(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        self.pipeline.build_surface(buffer)
    }

    /// Carving stage. Skipped for buffers filled from the shadow cache.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::apply_carvers`].
    pub fn apply_carvers(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        self.pipeline.apply_carvers(buffer)
    }

    /// Decoration stage.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::apply_decoration`].
    pub fn apply_decoration(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        self.pipeline.apply_decoration(buffer)
    }

    /// Runs all four stages for `coord` into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn generate(&self, coord: ChunkCoord) -> TerrainResult<ChunkBuffer> {
        let mut buffer = self.new_buffer(coord);
        self.fill_from_noise(&mut buffer)?;
        self.build_surface(&mut buffer)?;
        self.apply_carvers(&mut buffer)?;
        self.apply_decoration(&mut buffer)?;
        Ok(buffer)
    }

    /// See [`Pipeline::sample_height`].
    #[must_use]
    pub fn sample_height<P>(&self, x: i32, z: i32, predicate: P) -> i32
    where
        P: Fn(MaterialId) -> bool,
    {
        self.pipeline.sample_height(x, z, predicate)
    }

    /// Highest block matching `query` in a chunk that may not be generated yet.
    #[must_use]
    pub fn highest_block_y_in_unloaded_chunk(&self, x: i32, z: i32, query: HeightQuery) -> i32 {
        self.pipeline.highest_block_y(x, z, query)
    }

    /// Base-fill material at a position in a chunk that may not be generated yet.
    #[must_use]
    pub fn material_in_unloaded_chunk(&self, x: i32, y: i32, z: i32) -> MaterialId {
        self.pipeline.material_at(x, y, z)
    }

    /// See [`Pipeline::base_column`].
    #[must_use]
    pub fn base_column(&self, x: i32, z: i32) -> Vec<MaterialId> {
        self.pipeline.base_column(x, z)
    }

    /// See [`Pipeline::base_height`].
    #[must_use]
    pub fn base_height(&self, x: i32, z: i32, opaque: bool) -> i32 {
        self.pipeline.base_height(x, z, opaque)
    }

    /// Portal settings of a dimension, falling back to the world defaults.
    #[must_use]
    pub fn portal_settings(
        &self,
        overrides: Option<&DimensionOverrides>,
        reader: &dyn MaterialReader,
    ) -> PortalSettings {
        PortalSettings::resolve(overrides, &self.config().portal, reader)
    }

    /// Shadow cache statistics.
    #[must_use]
    pub fn stats(&self) -> ShadowStats {
        self.shadow.stats()
    }

    /// Stops speculative generation. Safe to call more than once.
    pub fn shutdown(&self) -> ShutdownReport {
        self.shadow.shutdown()
    }
}
