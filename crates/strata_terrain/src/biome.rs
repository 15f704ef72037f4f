//! # Biome Lookup
//!
//! Maps world coordinates to biome descriptors.
//!
//! - [`BiomeConfig`]: replacement rules, surface blocks, carvers, resources
//! - [`BiomeProvider`] / [`LayerSource`]: the collaborator contract. A
//!   provider must expose a layer source to be usable by the generator.
//! - [`CachedBiomeLookup`]: per-chunk cache over a layer source
//! - [`ClimateBiomeSource`]: temperature/humidity/elevation classifier

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use strata_core::{ChunkCoord, MaterialId, MaterialReader, CHUNK_SIZE};

use crate::decoration::Resource;
use crate::error::TerrainResult;
use crate::noise::{SimplexNoise, WorldSeed};

/// Which generated material a replacement rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplaceTarget {
    /// The biome's stone block.
    Stone,
    /// The biome's water block.
    Water,
}

/// Replace the biome's stone or water with another material in a Y band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplaceRule {
    /// What to replace.
    pub target: ReplaceTarget,
    /// Lowest affected Y (inclusive).
    pub min_y: i32,
    /// Highest affected Y (inclusive).
    pub max_y: i32,
    /// Replacement material.
    pub material: MaterialId,
}

/// Carvers a biome asks for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CarverKind {
    /// Built-in cave carver.
    Cave,
    /// Built-in canyon carver.
    Canyon,
    /// A carver registered by name through `Pipeline::with_carver`.
    External(String),
}

impl CarverKind {
    /// True for the built-in cave and canyon carvers.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        matches!(self, Self::Cave | Self::Canyon)
    }
}

/// Biome descriptor consumed by the generator.
#[derive(Clone, Debug, PartialEq)]
pub struct BiomeConfig {
    /// Biome name.
    pub name: String,
    /// Template biomes get their surface rebuilt from surface noise.
    pub is_template: bool,
    /// Average terrain surface Y.
    pub base_height: f64,
    /// Amplitude of large-scale height changes, in blocks.
    pub height_variation: f64,
    /// Amplitude of 3D density noise. Higher values give overhangs.
    pub volatility: f64,
    /// Solid fill material.
    pub stone_block: MaterialId,
    /// Fluid fill material below sea level.
    pub water_block: MaterialId,
    /// Top block of non-template columns.
    pub surface_block: MaterialId,
    /// Blocks under the surface block.
    pub ground_block: MaterialId,
    /// Stone/water replacements. The first matching rule wins.
    pub replacements: Vec<ReplaceRule>,
    /// Carvers, in run order.
    pub carvers: Vec<CarverKind>,
    /// Decoration resources, in placement order.
    pub resources: Vec<Resource>,
    /// Water surfaces freeze and snow settles.
    pub freezes: bool,
}

impl BiomeConfig {
    /// Creates a flat biome with no replacements, carvers or resources.
    #[must_use]
    pub fn new(name: impl Into<String>, stone_block: MaterialId, water_block: MaterialId) -> Self {
        Self {
            name: name.into(),
            is_template: false,
            base_height: 64.0,
            height_variation: 0.0,
            volatility: 0.0,
            stone_block,
            water_block,
            surface_block: stone_block,
            ground_block: stone_block,
            replacements: Vec::new(),
            carvers: Vec::new(),
            resources: Vec::new(),
            freezes: false,
        }
    }

    /// Material for solid space at height `y`.
    #[must_use]
    pub fn stone_replacement(&self, y: i32) -> MaterialId {
        self.replacement(ReplaceTarget::Stone, y).unwrap_or(self.stone_block)
    }

    /// Material for fluid space at height `y`.
    #[must_use]
    pub fn water_replacement(&self, y: i32) -> MaterialId {
        self.replacement(ReplaceTarget::Water, y).unwrap_or(self.water_block)
    }

    fn replacement(&self, target: ReplaceTarget, y: i32) -> Option<MaterialId> {
        self.replacements
            .iter()
            .find(|r| r.target == target && (r.min_y..=r.max_y).contains(&y))
            .map(|r| r.material)
    }

    /// True if the carver list still contains a built-in carver.
    #[must_use]
    pub fn has_builtin_carvers(&self) -> bool {
        self.carvers.iter().any(CarverKind::is_builtin)
    }
}

/// Per-column biome lookup.
pub trait LayerSource: Send + Sync {
    /// Biome at world block coordinates.
    fn biome_at(&self, x: i32, z: i32) -> Arc<BiomeConfig>;
}

/// A biome provider handed to the generator.
pub trait BiomeProvider: Send + Sync {
    /// The layer capability, if this provider has one.
    fn into_layer_source(self: Arc<Self>) -> Option<Arc<dyn LayerSource>>;
}

/// Provider that returns one biome everywhere.
#[derive(Clone, Debug)]
pub struct SingleBiomeSource {
    biome: Arc<BiomeConfig>,
}

impl SingleBiomeSource {
    /// Creates a provider for `biome`.
    #[must_use]
    pub fn new(biome: BiomeConfig) -> Self {
        Self {
            biome: Arc::new(biome),
        }
    }
}

impl LayerSource for SingleBiomeSource {
    fn biome_at(&self, _x: i32, _z: i32) -> Arc<BiomeConfig> {
        Arc::clone(&self.biome)
    }
}

impl BiomeProvider for SingleBiomeSource {
    fn into_layer_source(self: Arc<Self>) -> Option<Arc<dyn LayerSource>> {
        Some(self)
    }
}

type ChunkBiomes = Arc<[Arc<BiomeConfig>]>;

/// Chunk-keyed cache over a [`LayerSource`].
///
/// When the cache reaches capacity it is cleared wholesale. Entries are
/// pure functions of the source, so eviction never changes results.
pub struct CachedBiomeLookup {
    source: Arc<dyn LayerSource>,
    chunks: RwLock<HashMap<ChunkCoord, ChunkBiomes>>,
    capacity: usize,
}

impl CachedBiomeLookup {
    /// Creates a cache holding at most `capacity` chunks.
    #[must_use]
    pub fn new(source: Arc<dyn LayerSource>, capacity: usize) -> Self {
        Self {
            source,
            chunks: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Biome at world block coordinates.
    #[must_use]
    pub fn biome_at(&self, x: i32, z: i32) -> Arc<BiomeConfig> {
        let coord = ChunkCoord::from_block_pos(x, z);
        let local = (z - coord.world_z()) as usize * CHUNK_SIZE + (x - coord.world_x()) as usize;

        if let Some(chunk) = self.chunks.read().get(&coord) {
            return Arc::clone(&chunk[local]);
        }

        let chunk = self.load(coord);
        let biome = Arc::clone(&chunk[local]);
        let mut chunks = self.chunks.write();
        if chunks.len() >= self.capacity {
            chunks.clear();
        }
        chunks.insert(coord, chunk);
        biome
    }

    /// Biome at quarter-resolution coordinates (4 blocks per step).
    #[must_use]
    pub fn noise_biome(&self, quart_x: i32, quart_z: i32) -> Arc<BiomeConfig> {
        self.biome_at(quart_x * 4, quart_z * 4)
    }

    /// Number of cached chunks.
    #[must_use]
    pub fn cached_chunks(&self) -> usize {
        self.chunks.read().len()
    }

    fn load(&self, coord: ChunkCoord) -> ChunkBiomes {
        let mut biomes = Vec::with_capacity(CHUNK_SIZE * CHUNK_SIZE);
        for z in 0..CHUNK_SIZE as i32 {
            for x in 0..CHUNK_SIZE as i32 {
                biomes.push(self.source.biome_at(coord.world_x() + x, coord.world_z() + z));
            }
        }
        biomes.into()
    }
}

/// The biomes a [`ClimateBiomeSource`] chooses between.
#[derive(Clone, Debug)]
pub struct ClimateBiomes {
    /// Elevation well below sea level.
    pub ocean: Arc<BiomeConfig>,
    /// Coastline.
    pub beach: Arc<BiomeConfig>,
    /// Temperate, dry.
    pub plains: Arc<BiomeConfig>,
    /// Temperate, humid.
    pub forest: Arc<BiomeConfig>,
    /// Hot and dry.
    pub desert: Arc<BiomeConfig>,
    /// Cold.
    pub tundra: Arc<BiomeConfig>,
    /// High elevation.
    pub mountains: Arc<BiomeConfig>,
}

impl ClimateBiomes {
    /// Standard biome set built from vanilla blocks.
    ///
    /// # Errors
    ///
    /// Returns a material error if the reader does not know a vanilla block.
    pub fn vanilla(reader: &dyn MaterialReader) -> TerrainResult<Self> {
        let stone = reader.parse("minecraft:stone")?;
        let water = reader.parse("minecraft:water")?;
        let grass = reader.parse("minecraft:grass_block")?;
        let dirt = reader.parse("minecraft:dirt")?;
        let sand = reader.parse("minecraft:sand")?;
        let gravel = reader.parse("minecraft:gravel")?;
        let ice = reader.parse("minecraft:ice")?;

        let ores = vec![
            Resource::Ore {
                material: reader.parse("minecraft:coal_ore")?,
                target: stone,
                vein_size: 8,
                frequency: 12,
                min_y: 5,
                max_y: 127,
            },
            Resource::Ore {
                material: reader.parse("minecraft:iron_ore")?,
                target: stone,
                vein_size: 6,
                frequency: 8,
                min_y: 5,
                max_y: 63,
            },
        ];
        let tall_grass = Resource::Plant {
            material: reader.parse("minecraft:grass")?,
            on: grass,
            frequency: 10,
        };

        let land = |name: &str, base: f64, variation: f64, top: MaterialId, under: MaterialId| {
            let mut biome = BiomeConfig::new(name, stone, water);
            biome.base_height = base;
            biome.height_variation = variation;
            biome.volatility = 0.15;
            biome.surface_block = top;
            biome.ground_block = under;
            biome.carvers = vec![CarverKind::Cave, CarverKind::Canyon];
            biome.resources.clone_from(&ores);
            biome
        };

        let mut ocean = land("ocean", 45.0, 6.0, gravel, gravel);
        ocean.carvers = vec![CarverKind::Cave];

        let beach = land("beach", 63.0, 2.0, sand, sand);

        let mut plains = land("plains", 68.0, 6.0, grass, dirt);
        plains.resources.push(tall_grass.clone());

        let mut forest = land("forest", 72.0, 10.0, grass, dirt);
        forest.resources.push(tall_grass);

        let mut desert = land("desert", 70.0, 8.0, sand, sand);
        desert.is_template = true;

        let mut tundra = land("tundra", 68.0, 8.0, grass, dirt);
        tundra.freezes = true;
        tundra.replacements.push(ReplaceRule {
            target: ReplaceTarget::Water,
            min_y: 62,
            max_y: 62,
            material: ice,
        });

        let mut mountains = land("mountains", 96.0, 40.0, stone, stone);
        mountains.volatility = 0.4;

        Ok(Self {
            ocean: Arc::new(ocean),
            beach: Arc::new(beach),
            plains: Arc::new(plains),
            forest: Arc::new(forest),
            desert: Arc::new(desert),
            tundra: Arc::new(tundra),
            mountains: Arc::new(mountains),
        })
    }
}

/// Biome provider using a climate model:
/// - Temperature (from noise, latitude and elevation)
/// - Humidity (from a separate noise channel)
/// - Elevation (octaved plus ridged noise)
pub struct ClimateBiomeSource {
    biomes: ClimateBiomes,
    temperature_noise: SimplexNoise,
    humidity_noise: SimplexNoise,
    elevation_noise: SimplexNoise,
}

impl ClimateBiomeSource {
    /// Scale for temperature noise (larger = more gradual changes).
    const TEMPERATURE_SCALE: f64 = 0.002;
    /// Scale for humidity noise.
    const HUMIDITY_SCALE: f64 = 0.003;
    /// Scale for elevation noise.
    const ELEVATION_SCALE: f64 = 0.0025;

    /// Creates a classifier from a world seed.
    #[must_use]
    pub fn new(seed: WorldSeed, biomes: ClimateBiomes) -> Self {
        Self {
            biomes,
            temperature_noise: SimplexNoise::new(seed.derive(1)),
            humidity_noise: SimplexNoise::new(seed.derive(2)),
            elevation_noise: SimplexNoise::new(seed.derive(3)),
        }
    }

    /// Elevation in [-1, 1].
    #[must_use]
    pub fn elevation(&self, x: f64, z: f64) -> f64 {
        let base = self.elevation_noise.octaved(
            x * Self::ELEVATION_SCALE,
            z * Self::ELEVATION_SCALE,
            4,
            0.5,
            2.0,
        );
        let ridged = self.elevation_noise.ridged(
            x * Self::ELEVATION_SCALE * 1.5,
            z * Self::ELEVATION_SCALE * 1.5,
            3,
            0.5,
            2.0,
        );
        (base * 0.8 + ridged * 0.2).clamp(-1.0, 1.0)
    }

    /// Temperature in [-1, 1]. Colder away from z = 0 and at altitude.
    #[must_use]
    pub fn temperature(&self, x: f64, z: f64, elevation: f64) -> f64 {
        let base = self
            .temperature_noise
            .sample(x * Self::TEMPERATURE_SCALE, z * Self::TEMPERATURE_SCALE);
        let latitude_factor = (z.abs() * 0.0001).min(1.0);
        let elevation_factor = elevation.max(0.0) * 0.5;
        (base - latitude_factor * 0.5 - elevation_factor).clamp(-1.0, 1.0)
    }

    /// Humidity in roughly [-1, 1].
    #[must_use]
    pub fn humidity(&self, x: f64, z: f64) -> f64 {
        self.humidity_noise
            .octaved(x * Self::HUMIDITY_SCALE, z * Self::HUMIDITY_SCALE, 4, 0.5, 2.0)
    }

    fn classify(&self, elevation: f64, temperature: f64, humidity: f64) -> &Arc<BiomeConfig> {
        let b = &self.biomes;
        if elevation < -0.2 {
            return &b.ocean;
        }
        if elevation < -0.1 {
            return &b.beach;
        }
        if elevation > 0.6 {
            return &b.mountains;
        }
        match (temperature, humidity) {
            (t, _) if t < -0.3 => &b.tundra,
            (t, h) if t > 0.4 && h < -0.2 => &b.desert,
            (_, h) if h > 0.2 => &b.forest,
            _ => &b.plains,
        }
    }
}

impl LayerSource for ClimateBiomeSource {
    fn biome_at(&self, x: i32, z: i32) -> Arc<BiomeConfig> {
        let (fx, fz) = (f64::from(x), f64::from(z));
        let elevation = self.elevation(fx, fz);
        let temperature = self.temperature(fx, fz, elevation);
        let humidity = self.humidity(fx, fz);
        Arc::clone(self.classify(elevation, temperature, humidity))
    }
}

impl BiomeProvider for ClimateBiomeSource {
    fn into_layer_source(self: Arc<Self>) -> Option<Arc<dyn LayerSource>> {
        Some(self)
    }
}
