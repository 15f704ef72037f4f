//! Benchmark for noise and density sampling.
//!
//! Run with: cargo bench --package strata_terrain --bench noise_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use strata_core::{BlockRegistry, MaterialArena, RegistryMaterialReader};
use strata_terrain::{
    CachedBiomeLookup, ClimateBiomeSource, ClimateBiomes, DensityColumnSampler, DensitySource, LayerSource,
    NoiseField, NoiseGrid, SimplexNoise, WorldSeed,
};

fn benchmark_single_sample(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42));

    c.bench_function("single_noise_sample", |b| {
        let mut x = 0.0f64;
        b.iter(|| {
            x += 0.1;
            black_box(noise.sample(black_box(x), black_box(x * 0.7)))
        });
    });
}

fn benchmark_3d_samples(c: &mut Criterion) {
    let noise = SimplexNoise::new(WorldSeed::new(42));

    let mut group = c.benchmark_group("3d_samples");
    group.throughput(Throughput::Elements(100_000));
    group.sample_size(10);

    group.bench_function("100k_3d_octaved_samples", |b| {
        b.iter(|| {
            for i in 0..100_000 {
                let x = f64::from(i % 100) * 0.1;
                let y = f64::from((i / 100) % 32) * 0.1;
                let z = f64::from(i / 3200) * 0.1;
                black_box(noise.octaved3d(x, y, z, 3, 0.5, 2.0));
            }
        });
    });

    group.finish();
}

fn climate_field() -> (Arc<NoiseField>, DensityColumnSampler) {
    let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::new(MaterialArena::new()));
    let seed = WorldSeed::new(42);
    let source: Arc<dyn LayerSource> = Arc::new(ClimateBiomeSource::new(
        seed,
        ClimateBiomes::vanilla(&reader).expect("vanilla biomes"),
    ));
    let biomes = Arc::new(CachedBiomeLookup::new(source, 4096));
    let field = Arc::new(NoiseField::new(seed, biomes, 32));
    let sampler = DensityColumnSampler::new(Arc::clone(&field) as Arc<dyn DensitySource>, 63);
    (field, sampler)
}

fn benchmark_column_sampling(c: &mut Criterion) {
    let (_, sampler) = climate_field();

    c.bench_function("density_column_sample", |b| {
        let mut x = 0i32;
        b.iter(|| {
            x = x.wrapping_add(1);
            black_box(sampler.sample_column(black_box(x), black_box(x / 2)))
        });
    });
}

fn benchmark_chunk_grid(c: &mut Criterion) {
    let (field, _) = climate_field();

    c.bench_function("noise_grid_per_chunk", |b| {
        let mut chunk = 0i32;
        b.iter(|| {
            chunk = chunk.wrapping_add(1);
            black_box(NoiseGrid::sample(field.as_ref(), chunk * 16, 0))
        });
    });
}

criterion_group!(
    benches,
    benchmark_single_sample,
    benchmark_3d_samples,
    benchmark_column_sampling,
    benchmark_chunk_grid
);
criterion_main!(benches);
