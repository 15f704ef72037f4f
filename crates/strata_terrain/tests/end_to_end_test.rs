//! # End-to-End Generation Tests
//!
//! Runs whole chunks through the generator and checks the blocks that come
//! out, on both the synchronous path and the shadow-cache path.

use std::sync::Arc;

use strata_core::{BlockRegistry, ChunkCoord, MaterialArena, MaterialId, MaterialReader, RegistryMaterialReader};
use strata_terrain::{
    BiomeConfig, ClimateBiomeSource, ClimateBiomes, DensitySource, GeneratorConfig, HeightQuery, Pipeline,
    SingleBiomeSource, Stage, TerrainGenerator, WorldSeed,
};

/// Every noise column holds `surface - 8k` at sample k, so the
/// interpolated density at height y is `surface - y`.
struct Flat {
    surface: f64,
    cells: usize,
}

impl DensitySource for Flat {
    fn noise_size_y(&self) -> usize {
        self.cells
    }

    fn fill_noise_column(&self, _noise_x: i32, _noise_z: i32, out: &mut [f64]) {
        for (k, v) in out.iter_mut().enumerate() {
            *v = self.surface - 8.0 * k as f64;
        }
    }
}

struct World {
    generator: TerrainGenerator,
    stone: MaterialId,
    water: MaterialId,
}

fn flat_world(surface: f64) -> World {
    let arena = Arc::new(MaterialArena::new());
    let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
    let stone = reader.parse("minecraft:stone").unwrap();
    let water = reader.parse("minecraft:water").unwrap();

    let config = GeneratorConfig {
        seed: 42,
        sea_level: 63,
        bedrock_floor: false,
        ..GeneratorConfig::default()
    };
    let density = Arc::new(Flat {
        surface,
        cells: config.noise_size_y(),
    });
    let provider = Arc::new(SingleBiomeSource::new(BiomeConfig::new("flat", stone, water)));
    let pipeline = Pipeline::with_density_source(config, provider, arena, &reader, density).unwrap();

    World {
        generator: TerrainGenerator::from_pipeline(pipeline),
        stone,
        water,
    }
}

/// Test: Solid ground up to y = 63, air from y = 64.
#[test]
fn test_stone_below_64_air_above() {
    let world = flat_world(64.0);
    let chunk = world.generator.generate(ChunkCoord::new(0, 0)).unwrap();

    assert_eq!(chunk.completed(), Some(Stage::Decoration));
    for x in 0..16 {
        for z in 0..16 {
            for y in 0..chunk.height() {
                let expected = if y < 64 { world.stone } else { MaterialId::AIR };
                assert_eq!(chunk.get(x, y, z), expected, "block ({x}, {y}, {z})");
            }
        }
    }
    world.generator.shutdown();
}

/// Test: Open space below sea level is water, above it is air.
#[test]
fn test_water_fills_below_sea_level() {
    let world = flat_world(40.0);
    let chunk = world.generator.generate(ChunkCoord::new(0, 0)).unwrap();

    for y in 0..chunk.height() {
        let expected = if y < 40 {
            world.stone
        } else if y < 63 {
            world.water
        } else {
            MaterialId::AIR
        };
        assert_eq!(chunk.get(7, y, 7), expected, "y = {y}");
    }
    world.generator.shutdown();
}

/// Test: Height query stops at the first match from the top.
#[test]
fn test_height_query_returns_y_plus_one() {
    let world = flat_world(11.0);
    let stone = world.stone;

    assert_eq!(world.generator.sample_height(100, -100, |m| m == stone), 11);
    assert_eq!(world.generator.sample_height(100, -100, |_| false), 0);
    assert_eq!(
        world.generator.highest_block_y_in_unloaded_chunk(100, -100, HeightQuery::SOLID_OR_LIQUID),
        63
    );
    assert_eq!(world.generator.base_height(100, -100, true), 11);
    assert_eq!(world.generator.material_in_unloaded_chunk(100, 10, -100), stone);
    assert_eq!(world.generator.material_in_unloaded_chunk(100, 11, -100), world.water);
    world.generator.shutdown();
}

fn climate_generator(seed: u64) -> TerrainGenerator {
    let arena = Arc::new(MaterialArena::new());
    let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
    let config = GeneratorConfig {
        max_worker_threads: 2,
        ..GeneratorConfig::default()
    }
    .with_seed(seed);
    let biomes = ClimateBiomeSource::new(WorldSeed::new(seed), ClimateBiomes::vanilla(&reader).unwrap());
    TerrainGenerator::new(config, Arc::new(biomes), arena, &reader).unwrap()
}

/// Test: A chunk served by the shadow cache is identical to one generated
/// directly on the calling thread.
#[test]
fn test_shadow_path_matches_synchronous_path() {
    let generator = climate_generator(42);

    // Touching (0, 0) queues its neighbours.
    generator.generate(ChunkCoord::new(0, 0)).unwrap();

    for coord in [ChunkCoord::new(1, 0), ChunkCoord::new(-1, 1), ChunkCoord::new(0, -1)] {
        let served = generator.generate(coord).unwrap();
        let direct = generator.pipeline().generate(coord).unwrap();
        assert_eq!(served, direct, "chunk {coord}");
    }
    assert_eq!(generator.stats().hits, 3);
    generator.shutdown();
}

/// Test: Two generators with the same seed produce the same world.
#[test]
fn test_same_seed_same_world() {
    let a = climate_generator(1234);
    let b = climate_generator(1234);
    let c = climate_generator(4321);

    let coord = ChunkCoord::new(5, -3);
    let chunk_a = a.generate(coord).unwrap();
    let chunk_b = b.generate(coord).unwrap();
    let chunk_c = c.generate(coord).unwrap();

    assert_eq!(chunk_a.raw_blocks(), chunk_b.raw_blocks());
    assert_eq!(chunk_a.mask(), chunk_b.mask());
    assert_ne!(chunk_a.raw_blocks(), chunk_c.raw_blocks());

    a.shutdown();
    b.shutdown();
    c.shutdown();
}

/// Test: Every column of a real world has ground.
#[test]
fn test_climate_world_has_ground_everywhere() {
    let generator = climate_generator(42);
    let chunk = generator.generate(ChunkCoord::new(2, 2)).unwrap();
    let arena = generator.pipeline().arena();

    for x in 0..16 {
        for z in 0..16 {
            let top = chunk.highest_y(x, z, |m| arena.kind(m).solid);
            assert!(top.is_some(), "column ({x}, {z}) has no solid block");
        }
    }
    generator.shutdown();
}
