//! # Chunk Generation Pipeline
//!
//! Runs the per-chunk stages in order:
//!
//! ```text
//! BaseFill -> Surface -> Carving -> Decoration
//! ```
//!
//! Each stage records itself on the buffer when it completes. A stage that
//! already ran is skipped; a stage whose predecessor has not run fails
//! with `OutOfOrder`. Failures inside a stage are wrapped in
//! `GenerationFailure` with the chunk, seed and stage.
//!
//! The pipeline also answers height and material queries for chunks that
//! were never generated, using the same density sampling as base fill.

use std::collections::HashMap;
use std::sync::Arc;

use strata_core::{ChunkCoord, MaterialArena, MaterialId, MaterialReader, CHUNK_SIZE};

use crate::biome::{BiomeConfig, BiomeProvider, CachedBiomeLookup, CarverKind};
use crate::carver::{carve_neighbourhood, CanyonCarver, CarveContext, Carver, CaveCarver};
use crate::chunk::{ChunkBuffer, ShadowChunk};
use crate::config::GeneratorConfig;
use crate::decoration::{DecorationContext, Decorator, ExternalDecorator};
use crate::density::{DensityColumnSampler, DensitySource, NoiseField, NoiseGrid};
use crate::error::{Stage, TerrainError, TerrainResult};
use crate::noise::WorldSeed;
use crate::structure::{InMemoryStructureCache, NoStructures, StructureCache, StructureOverlay, StructurePieceSource};
use crate::surface::{dress_column, SurfaceBuilder};

/// Carved voxels below this Y fill with lava.
const LAVA_LEVEL: i32 = 10;

/// Flags for [`Pipeline::highest_block_y`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeightQuery {
    /// Stop at solid blocks.
    pub find_solid: bool,
    /// Stop at liquids.
    pub find_liquid: bool,
    /// Look through liquids.
    pub ignore_liquid: bool,
    /// Look through snow layers.
    pub ignore_snow: bool,
}

impl HeightQuery {
    /// Highest solid block.
    pub const SOLID: Self = Self {
        find_solid: true,
        find_liquid: false,
        ignore_liquid: true,
        ignore_snow: true,
    };

    /// Highest solid or liquid block.
    pub const SOLID_OR_LIQUID: Self = Self {
        find_solid: true,
        find_liquid: true,
        ignore_liquid: false,
        ignore_snow: false,
    };
}

/// Materials the pipeline writes itself.
#[derive(Clone, Copy, Debug)]
struct Palette {
    bedrock: MaterialId,
    lava: MaterialId,
    snow: MaterialId,
}

/// Per-chunk generation stages and unloaded-chunk queries.
pub struct Pipeline {
    config: GeneratorConfig,
    seed: WorldSeed,
    arena: Arc<MaterialArena>,
    biomes: Arc<CachedBiomeLookup>,
    sampler: DensityColumnSampler,
    surface: SurfaceBuilder,
    decorator: Decorator,
    palette: Palette,
    structures: Arc<dyn StructurePieceSource>,
    structure_cache: Arc<dyn StructureCache>,
    cave: CaveCarver,
    canyon: CanyonCarver,
    external_carvers: HashMap<String, Arc<dyn Carver>>,
    external_decorators: Vec<Arc<dyn ExternalDecorator>>,
}

impl Pipeline {
    /// Creates a pipeline with the biome-shaped noise field.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an invalid config or unparsable default
    /// materials, and `IncompatibleSource` if `provider` has no layer source.
    pub fn new(
        config: GeneratorConfig,
        provider: Arc<dyn BiomeProvider>,
        arena: Arc<MaterialArena>,
        reader: &dyn MaterialReader,
    ) -> TerrainResult<Self> {
        Self::build(config, provider, arena, reader, None)
    }

    /// Creates a pipeline over a custom density source.
    ///
    /// # Errors
    ///
    /// As [`Self::new`], plus `Config` if the source's height disagrees
    /// with the config.
    pub fn with_density_source(
        config: GeneratorConfig,
        provider: Arc<dyn BiomeProvider>,
        arena: Arc<MaterialArena>,
        reader: &dyn MaterialReader,
        density: Arc<dyn DensitySource>,
    ) -> TerrainResult<Self> {
        if density.noise_size_y() != config.noise_size_y() {
            return Err(TerrainError::Config(format!(
                "density source has {} noise cells, config expects {}",
                density.noise_size_y(),
                config.noise_size_y()
            )));
        }
        Self::build(config, provider, arena, reader, Some(density))
    }

    fn build(
        config: GeneratorConfig,
        provider: Arc<dyn BiomeProvider>,
        arena: Arc<MaterialArena>,
        reader: &dyn MaterialReader,
        density: Option<Arc<dyn DensitySource>>,
    ) -> TerrainResult<Self> {
        config.validate()?;
        let layer = provider.into_layer_source().ok_or_else(|| {
            TerrainError::IncompatibleSource("biome provider has no layer source".to_string())
        })?;

        let seed = WorldSeed::new(config.seed);
        let biomes = Arc::new(CachedBiomeLookup::new(layer, config.biome_cache_capacity));
        let density: Arc<dyn DensitySource> = match density {
            Some(density) => density,
            None => Arc::new(NoiseField::new(seed, Arc::clone(&biomes), config.noise_size_y())),
        };

        let parse = |text: &str| {
            reader
                .parse(text)
                .map_err(|e| TerrainError::Config(format!("cannot read material {text:?}: {e}")))
        };
        let palette = Palette {
            bedrock: parse("minecraft:bedrock")?,
            lava: parse("minecraft:lava")?,
            snow: parse("minecraft:snow")?,
        };
        let surface = SurfaceBuilder::new(
            seed,
            config.surface_noise_scale,
            parse(&config.default_block)?,
            parse(&config.default_fluid)?,
            config.sea_level,
        );
        let decorator = Decorator::new(palette.snow, parse("minecraft:ice")?, config.sea_level);

        Ok(Self {
            sampler: DensityColumnSampler::new(density, config.sea_level),
            seed,
            arena,
            biomes,
            surface,
            decorator,
            palette,
            structures: Arc::new(NoStructures),
            structure_cache: Arc::new(InMemoryStructureCache::new()),
            cave: CaveCarver::default(),
            canyon: CanyonCarver::default(),
            external_carvers: HashMap::new(),
            external_decorators: Vec::new(),
            config,
        })
    }

    /// Sets the live structure piece source.
    #[must_use]
    pub fn with_structures(mut self, source: Arc<dyn StructurePieceSource>) -> Self {
        self.structures = source;
        self
    }

    /// Sets the structure placement cache.
    #[must_use]
    pub fn with_structure_cache(mut self, cache: Arc<dyn StructureCache>) -> Self {
        self.structure_cache = cache;
        self
    }

    /// Registers a carver that biomes can name with `CarverKind::External`.
    #[must_use]
    pub fn with_carver(mut self, name: impl Into<String>, carver: Arc<dyn Carver>) -> Self {
        self.external_carvers.insert(name.into(), carver);
        self
    }

    /// Appends a decorator run after biome resources.
    #[must_use]
    pub fn with_decorator(mut self, decorator: Arc<dyn ExternalDecorator>) -> Self {
        self.external_decorators.push(decorator);
        self
    }

    /// The generator config.
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The world seed.
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// The material arena.
    #[must_use]
    pub fn arena(&self) -> &Arc<MaterialArena> {
        &self.arena
    }

    /// The cached biome lookup.
    #[must_use]
    pub fn biomes(&self) -> &Arc<CachedBiomeLookup> {
        &self.biomes
    }

    /// Chunk height in blocks.
    #[must_use]
    pub fn height(&self) -> usize {
        self.sampler.height()
    }

    /// A fresh buffer for `coord`.
    #[must_use]
    pub fn new_buffer(&self, coord: ChunkCoord) -> ChunkBuffer {
        ChunkBuffer::new(coord, self.height())
    }

    fn run_stage<F>(&self, stage: Stage, buffer: &mut ChunkBuffer, body: F) -> TerrainResult<()>
    where
        F: FnOnce(&Self, &mut ChunkBuffer) -> TerrainResult<()>,
    {
        if buffer.has_completed(stage) {
            return Ok(());
        }
        if let Some(required) = stage.previous() {
            if !buffer.has_completed(required) {
                return Err(TerrainError::OutOfOrder {
                    coord: buffer.coord(),
                    stage,
                    required,
                });
            }
        }
        if let Err(source) = body(self, buffer) {
            let err = TerrainError::generation(buffer.coord(), self.seed.value(), stage, source);
            tracing::error!(coord = %buffer.coord(), stage = %stage, error = %err, "chunk generation failed");
            return Err(err);
        }
        buffer.mark_completed(stage);
        Ok(())
    }

    /// Base fill: density columns biased by the structure overlay, surface
    /// dressing for ordinary biomes, bedrock floor.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrder` or `GenerationFailure`.
    pub fn fill_from_noise(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        self.run_stage(Stage::BaseFill, buffer, |this, buffer| {
            let coord = buffer.coord();
            let overlay = StructureOverlay::collect(this.structures.as_ref(), coord);
            let grid = NoiseGrid::sample(this.sampler.source().as_ref(), coord.world_x(), coord.world_z());
            let mut column = vec![MaterialId::AIR; buffer.height()];

            for lz in 0..CHUNK_SIZE {
                for lx in 0..CHUNK_SIZE {
                    let x = coord.world_x() + lx as i32;
                    let z = coord.world_z() + lz as i32;
                    let biome = this.biomes.biome_at(x, z);
                    let field = grid.field_at(x, z);
                    if overlay.is_empty() {
                        this.sampler.fill_column(&field, &biome, |_| 0.0, &mut column);
                    } else {
                        this.sampler.fill_column(&field, &biome, |y| overlay.bias(x, y, z), &mut column);
                    }
                    this.finish_column(&mut column, &biome);
                    buffer.set_column(lx, lz, &column);
                }
            }
            Ok(())
        })
    }

    fn finish_column(&self, column: &mut [MaterialId], biome: &BiomeConfig) {
        if !biome.is_template {
            dress_column(column, biome, self.config.sea_level);
        }
        if self.config.bedrock_floor {
            if let Some(floor) = column.first_mut() {
                *floor = self.palette.bedrock;
            }
        }
    }

    /// Surface stage for template biomes.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrder` if base fill has not run.
    pub fn build_surface(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        self.run_stage(Stage::Surface, buffer, |this, buffer| {
            this.surface.build(buffer, &this.biomes, &this.arena);
            Ok(())
        })
    }

    /// Carving stage.
    ///
    /// Built-in carvers run only if caves are enabled and the chunk's biome
    /// lists them. Registered external carvers named by the biome always run.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrder`, or `GenerationFailure` if a biome names an
    /// unregistered carver or a carver fails.
    pub fn apply_carvers(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        self.run_stage(Stage::Carving, buffer, |this, buffer| {
            let coord = buffer.coord();
            let biome = this.biomes.noise_biome(coord.x * 4, coord.z * 4);
            let builtin = this.config.caves_enabled && biome.has_builtin_carvers();

            // Seeds follow the index in the biome's list, skipped carvers included.
            let mut carvers: Vec<(usize, &dyn Carver)> = Vec::with_capacity(biome.carvers.len());
            for (index, kind) in biome.carvers.iter().enumerate() {
                match kind {
                    CarverKind::Cave if builtin => carvers.push((index, &this.cave)),
                    CarverKind::Canyon if builtin => carvers.push((index, &this.canyon)),
                    CarverKind::Cave | CarverKind::Canyon => {}
                    CarverKind::External(name) => {
                        let carver = this.external_carvers.get(name).ok_or_else(|| {
                            TerrainError::Config(format!("biome {} names unknown carver {name}", biome.name))
                        })?;
                        carvers.push((index, carver.as_ref()));
                    }
                }
            }
            if carvers.is_empty() {
                return Ok(());
            }

            let ctx = CarveContext {
                seed: this.seed,
                arena: &this.arena,
                bedrock: this.palette.bedrock,
                lava: this.palette.lava,
                lava_level: LAVA_LEVEL,
                height: buffer.height() as i32,
            };
            carve_neighbourhood(&ctx, &carvers, buffer)
        })
    }

    /// Decoration stage. Completes without changes when decoration is
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrder`, or `GenerationFailure` wrapping the first
    /// decoration error.
    pub fn apply_decoration(&self, buffer: &mut ChunkBuffer) -> TerrainResult<()> {
        self.run_stage(Stage::Decoration, buffer, |this, buffer| {
            if !this.config.decoration_enabled {
                return Ok(());
            }
            let coord = buffer.coord();
            let biome = this.biomes.noise_biome(coord.x * 4 + 2, coord.z * 4 + 2);
            let ctx = DecorationContext {
                coord,
                seed: this.seed,
                biome: &biome,
                structures: this.structure_cache.get_or_create(coord),
                arena: &this.arena,
            };
            this.decorator.decorate(&ctx, &this.external_decorators, &this.biomes, buffer)
        })
    }

    /// Runs base fill, surface and carving into a detached chunk.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn generate_shadow(&self, coord: ChunkCoord) -> TerrainResult<ShadowChunk> {
        let mut buffer = self.new_buffer(coord);
        self.fill_from_noise(&mut buffer)?;
        self.build_surface(&mut buffer)?;
        self.apply_carvers(&mut buffer)?;
        Ok(ShadowChunk::from_buffer(buffer))
    }

    /// Runs every stage into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn generate(&self, coord: ChunkCoord) -> TerrainResult<ChunkBuffer> {
        let mut buffer = self.generate_shadow(coord)?.into_buffer();
        self.apply_decoration(&mut buffer)?;
        Ok(buffer)
    }

    /// Scans world column `(x, z)` from the top and returns `y + 1` of the
    /// first density material accepted by `predicate`, or 0.
    #[must_use]
    pub fn sample_height<P>(&self, x: i32, z: i32, predicate: P) -> i32
    where
        P: Fn(MaterialId) -> bool,
    {
        let field = self.sampler.sample_column(x, z);
        let biome = self.biomes.biome_at(x, z);
        self.sampler.sample_height(&field, &biome, predicate)
    }

    /// Base-fill materials of world column `(x, z)`, indexed by Y, without
    /// structures, carving or decoration.
    #[must_use]
    pub fn base_column(&self, x: i32, z: i32) -> Vec<MaterialId> {
        let field = self.sampler.sample_column(x, z);
        let biome = self.biomes.biome_at(x, z);
        let mut column = vec![MaterialId::AIR; self.height()];
        self.sampler.fill_column(&field, &biome, |_| 0.0, &mut column);
        self.finish_column(&mut column, &biome);
        column
    }

    /// Base-fill material at a world position. Air outside the world.
    #[must_use]
    pub fn material_at(&self, x: i32, y: i32, z: i32) -> MaterialId {
        if y < 0 || y as usize >= self.height() {
            return MaterialId::AIR;
        }
        self.base_column(x, z)[y as usize]
    }

    /// Height of the first block from the top matching `query`, or 0.
    #[must_use]
    pub fn highest_block_y(&self, x: i32, z: i32, query: HeightQuery) -> i32 {
        let arena = &self.arena;
        let snow = self.palette.snow;
        self.sample_height(x, z, |material| {
            if query.ignore_snow && material == snow {
                return false;
            }
            let kind = arena.kind(material);
            if kind.liquid {
                return query.find_liquid && !query.ignore_liquid;
            }
            query.find_solid && kind.solid
        })
    }

    /// Terrain height: first solid block when `opaque`, else first non-air block.
    #[must_use]
    pub fn base_height(&self, x: i32, z: i32, opaque: bool) -> i32 {
        let arena = &self.arena;
        self.sample_height(x, z, |material| {
            let kind = arena.kind(material);
            if opaque { kind.solid } else { !kind.air }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biome::{BiomeConfig, LayerSource, SingleBiomeSource};
    use crate::carver::CARVER_RANGE;
    use parking_lot::Mutex;
    use rand::RngCore;
    use rand_chacha::ChaCha8Rng;
    use strata_core::{BlockRegistry, RegistryMaterialReader};

    struct Ramp(f64);

    impl DensitySource for Ramp {
        fn noise_size_y(&self) -> usize {
            16
        }
        fn fill_noise_column(&self, _x: i32, _z: i32, out: &mut [f64]) {
            for (k, v) in out.iter_mut().enumerate() {
                *v = self.0 - 8.0 * k as f64;
            }
        }
    }

    struct NoLayers;

    impl BiomeProvider for NoLayers {
        fn into_layer_source(self: Arc<Self>) -> Option<Arc<dyn LayerSource>> {
            None
        }
    }

    fn pipeline(config: GeneratorConfig, surface_at: f64) -> (Pipeline, RegistryMaterialReader) {
        let arena = Arc::new(MaterialArena::new());
        let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
        let stone = reader.parse("stone").unwrap();
        let water = reader.parse("water").unwrap();
        let provider = Arc::new(SingleBiomeSource::new(BiomeConfig::new("flat", stone, water)));
        let p = Pipeline::with_density_source(config, provider, arena, &reader, Arc::new(Ramp(surface_at))).unwrap();
        (p, reader)
    }

    fn small_config() -> GeneratorConfig {
        GeneratorConfig {
            world_height_cap: 128,
            seed: 42,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_incompatible_source() {
        let arena = Arc::new(MaterialArena::new());
        let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
        let result = Pipeline::new(GeneratorConfig::default(), Arc::new(NoLayers), arena, &reader);
        assert!(matches!(result, Err(TerrainError::IncompatibleSource(_))));
    }

    #[test]
    fn test_density_height_must_match_config() {
        let arena = Arc::new(MaterialArena::new());
        let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
        let stone = reader.parse("stone").unwrap();
        let provider = Arc::new(SingleBiomeSource::new(BiomeConfig::new("flat", stone, stone)));
        let result = Pipeline::with_density_source(
            GeneratorConfig::default(),
            provider,
            arena,
            &reader,
            Arc::new(Ramp(10.0)),
        );
        assert!(matches!(result, Err(TerrainError::Config(_))));
    }

    #[test]
    fn test_stages_run_in_order_and_skip_when_done() {
        let (p, _) = pipeline(small_config(), 40.0);
        let mut buffer = p.new_buffer(ChunkCoord::new(0, 0));

        let err = p.apply_carvers(&mut buffer).unwrap_err();
        assert!(matches!(
            err,
            TerrainError::OutOfOrder {
                stage: Stage::Carving,
                required: Stage::Surface,
                ..
            }
        ));

        p.fill_from_noise(&mut buffer).unwrap();
        let filled = buffer.clone();
        p.fill_from_noise(&mut buffer).unwrap();
        assert_eq!(buffer, filled, "completed stage is skipped");

        p.build_surface(&mut buffer).unwrap();
        p.apply_carvers(&mut buffer).unwrap();
        p.apply_decoration(&mut buffer).unwrap();
        assert_eq!(buffer.completed(), Some(Stage::Decoration));
    }

    #[test]
    fn test_height_queries() {
        let (p, reader) = pipeline(small_config(), 40.0);

        assert_eq!(p.sample_height(3, 3, |m| m == reader.parse("stone").unwrap()), 40);
        assert_eq!(p.highest_block_y(3, 3, HeightQuery::SOLID), 40);
        assert_eq!(p.highest_block_y(3, 3, HeightQuery::SOLID_OR_LIQUID), 63);
        assert_eq!(p.base_height(3, 3, true), 40);
        assert_eq!(p.base_height(3, 3, false), 63);
        assert_eq!(p.sample_height(3, 3, |_| false), 0);
    }

    #[test]
    fn test_unloaded_material_matches_generated_chunk() {
        let (p, reader) = pipeline(small_config(), 40.0);
        let buffer = p.generate(ChunkCoord::new(1, -1)).unwrap();

        assert_eq!(p.material_at(16, 0, -16), reader.parse("bedrock").unwrap());
        assert_eq!(p.material_at(16, 20, -16), reader.parse("stone").unwrap());
        assert_eq!(p.material_at(16, 50, -16), reader.parse("water").unwrap());
        assert_eq!(p.material_at(16, 100, -16), MaterialId::AIR);
        assert_eq!(p.material_at(16, 500, -16), MaterialId::AIR);
        assert_eq!(p.base_column(20, -10), buffer.column(4, 6));
    }

    #[test]
    fn test_unknown_external_carver_is_generation_failure() {
        let arena = Arc::new(MaterialArena::new());
        let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
        let stone = reader.parse("stone").unwrap();
        let water = reader.parse("water").unwrap();
        let mut biome = BiomeConfig::new("odd", stone, water);
        biome.carvers.push(CarverKind::External("lava_tubes".to_string()));
        let provider = Arc::new(SingleBiomeSource::new(biome));
        let p = Pipeline::with_density_source(small_config(), provider, arena, &reader, Arc::new(Ramp(40.0))).unwrap();

        let err = p.generate(ChunkCoord::new(0, 0)).unwrap_err();
        assert!(matches!(
            err,
            TerrainError::GenerationFailure {
                stage: Stage::Carving,
                seed: 42,
                ..
            }
        ));
    }

    /// Remembers the first random value of every origin it is offered.
    #[derive(Default)]
    struct RecordingCarver {
        draws: Mutex<Vec<u64>>,
    }

    impl Carver for RecordingCarver {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_start_chunk(&self, rng: &mut ChaCha8Rng) -> bool {
            self.draws.lock().push(rng.next_u64());
            false
        }

        fn carve(
            &self,
            _ctx: &CarveContext<'_>,
            _rng: &mut ChaCha8Rng,
            _origin: ChunkCoord,
            _buffer: &mut ChunkBuffer,
        ) -> TerrainResult<()> {
            Ok(())
        }
    }

    fn external_draws(caves_enabled: bool) -> Vec<u64> {
        let arena = Arc::new(MaterialArena::new());
        let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
        let stone = reader.parse("stone").unwrap();
        let water = reader.parse("water").unwrap();
        let mut biome = BiomeConfig::new("caverns", stone, water);
        biome.carvers = vec![CarverKind::Cave, CarverKind::External("recording".to_string())];
        let provider = Arc::new(SingleBiomeSource::new(biome));
        let config = GeneratorConfig {
            caves_enabled,
            ..small_config()
        };

        let recorder = Arc::new(RecordingCarver::default());
        let p = Pipeline::with_density_source(config, provider, arena, &reader, Arc::new(Ramp(40.0)))
            .unwrap()
            .with_carver("recording", Arc::clone(&recorder) as Arc<dyn Carver>);
        p.generate_shadow(ChunkCoord::new(2, -5)).unwrap();

        let draws = recorder.draws.lock().clone();
        draws
    }

    #[test]
    fn test_external_carver_seed_ignores_caves_setting() {
        let with_caves = external_draws(true);
        let without_caves = external_draws(false);

        let side = (2 * CARVER_RANGE + 1) as usize;
        assert_eq!(with_caves.len(), side * side);
        assert_eq!(with_caves, without_caves);
    }

    /// Always fails.
    struct Broken;

    impl ExternalDecorator for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn decorate(
            &self,
            _ctx: &DecorationContext<'_>,
            _rng: &mut ChaCha8Rng,
            _buffer: &mut ChunkBuffer,
        ) -> TerrainResult<()> {
            Err(TerrainError::External {
                name: "broken".to_string(),
                reason: "no trees today".to_string(),
            })
        }
    }

    #[test]
    fn test_external_decorator_failure_is_generation_failure() {
        let (p, _) = pipeline(small_config(), 40.0);
        let p = p.with_decorator(Arc::new(Broken));
        let coord = ChunkCoord::new(-3, 4);

        let mut buffer = p.new_buffer(coord);
        p.fill_from_noise(&mut buffer).unwrap();
        p.build_surface(&mut buffer).unwrap();
        p.apply_carvers(&mut buffer).unwrap();

        let err = p.apply_decoration(&mut buffer).unwrap_err();
        match err {
            TerrainError::GenerationFailure {
                coord: failed_at,
                seed,
                stage,
                source,
            } => {
                assert_eq!(failed_at, coord);
                assert_eq!(seed, 42);
                assert_eq!(stage, Stage::Decoration);
                assert!(matches!(*source, TerrainError::External { ref name, .. } if name == "broken"));
            }
            other => panic!("expected a generation failure, got {other:?}"),
        }
        assert_eq!(buffer.completed(), Some(Stage::Carving), "failed stage is not recorded");

        assert!(matches!(
            p.generate(coord),
            Err(TerrainError::GenerationFailure {
                stage: Stage::Decoration,
                ..
            })
        ));
    }
}
