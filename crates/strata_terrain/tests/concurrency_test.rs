//! # Shadow Cache Hammer Tests
//!
//! Many threads racing on the same coordinates must never cause a second
//! computation, and every thread waiting on a chunk gets the same result.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use strata_core::{BlockRegistry, ChunkCoord, MaterialArena, MaterialReader, RegistryMaterialReader};
use strata_terrain::{
    BiomeConfig, ChunkBuffer, DensitySource, GeneratorConfig, Pipeline, ShadowCache, ShadowChunk, ShadowGenerator,
    SingleBiomeSource, Stage, TerrainGenerator, TerrainResult,
};

/// Records every coordinate it is asked to generate.
struct Recording {
    calls: AtomicUsize,
    seen: Mutex<Vec<ChunkCoord>>,
    delay: Duration,
}

impl Recording {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            delay,
        })
    }
}

impl ShadowGenerator for Recording {
    fn generate(&self, coord: ChunkCoord) -> TerrainResult<ShadowChunk> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(coord);
        thread::sleep(self.delay);
        Ok(ShadowChunk::from_buffer(ChunkBuffer::new(coord, 16)))
    }
}

/// Test: N threads enqueue and wait on one coordinate. One computation,
/// and every thread gets the same chunk.
#[test]
fn test_one_computation_every_waiter_served() {
    const THREADS: usize = 8;

    for _ in 0..10 {
        let generator = Recording::new(Duration::from_millis(20));
        let cache = Arc::new(ShadowCache::new(Arc::clone(&generator) as Arc<dyn ShadowGenerator>, 4));
        let coord = ChunkCoord::new(7, -7);
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.enqueue_speculative(&[coord]);
                    cache.get_or_compute(coord)
                })
            })
            .collect();
        let chunks: Vec<ShadowChunk> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(chunks.len(), THREADS);
        assert!(chunks.iter().all(|chunk| *chunk == chunks[0]));
        assert_eq!(cache.pending(), 0);
        cache.shutdown();
    }
}

/// Every column holds `surface - 8k`; counts the columns sampled.
struct CountingFlat {
    columns: AtomicUsize,
    cells: usize,
    delay: Duration,
}

impl DensitySource for CountingFlat {
    fn noise_size_y(&self) -> usize {
        self.cells
    }

    fn fill_noise_column(&self, _noise_x: i32, _noise_z: i32, out: &mut [f64]) {
        self.columns.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        for (k, v) in out.iter_mut().enumerate() {
            *v = 64.0 - 8.0 * k as f64;
        }
    }
}

/// Test: Threads filling a queued chunk at once run one base fill and all
/// end up with identical buffers.
#[test]
fn test_concurrent_fills_share_one_pipeline_run() {
    const THREADS: usize = 4;
    // A 5x5 noise grid per chunk.
    const COLUMNS_PER_FILL: usize = 25;

    let arena = Arc::new(MaterialArena::new());
    let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
    let stone = reader.parse("stone").unwrap();
    let water = reader.parse("water").unwrap();
    let config = GeneratorConfig {
        world_height_cap: 128,
        speculative_radius: 0,
        max_worker_threads: 1,
        ..GeneratorConfig::default()
    };
    let density = Arc::new(CountingFlat {
        columns: AtomicUsize::new(0),
        cells: config.noise_size_y(),
        delay: Duration::from_millis(2),
    });
    let provider = Arc::new(SingleBiomeSource::new(BiomeConfig::new("flat", stone, water)));
    let pipeline =
        Pipeline::with_density_source(config, provider, arena, &reader, Arc::clone(&density) as Arc<dyn DensitySource>)
            .unwrap();
    let generator = Arc::new(TerrainGenerator::from_pipeline(pipeline));

    let coord = ChunkCoord::new(3, 3);
    assert_eq!(generator.shadow().enqueue_speculative(&[coord]), 1);

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let generator = Arc::clone(&generator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut buffer = generator.new_buffer(coord);
                barrier.wait();
                generator.fill_from_noise(&mut buffer).unwrap();
                buffer
            })
        })
        .collect();
    let buffers: Vec<ChunkBuffer> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(density.columns.load(Ordering::SeqCst), COLUMNS_PER_FILL);
    assert!(buffers.iter().all(|buffer| buffer.completed() == Some(Stage::Carving)));
    assert!(buffers.iter().all(|buffer| *buffer == buffers[0]));
    assert_eq!(generator.stats().hits, THREADS as u64);
    generator.shutdown();
}

/// Test: Overlapping batches from many threads compute each coordinate once.
#[test]
fn test_overlapping_batches_compute_each_coordinate_once() {
    const THREADS: i32 = 6;

    let generator = Recording::new(Duration::from_micros(200));
    let cache = Arc::new(ShadowCache::new(Arc::clone(&generator) as Arc<dyn ShadowGenerator>, 3));
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Each thread covers a 10x10 square shifted by 2 chunks.
                barrier.wait();
                let coords: Vec<ChunkCoord> = (0..10)
                    .flat_map(|x| (0..10).map(move |z| ChunkCoord::new(x + t * 2, z)))
                    .collect();
                cache.enqueue_speculative(&coords)
            })
        })
        .collect();
    let submitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // x spans 0..20, z spans 0..10
    let unique = 20 * 10;
    assert_eq!(submitted, unique);

    let mut taken = 0;
    for x in 0..20 {
        for z in 0..10 {
            if cache.get_chunk_with_wait(ChunkCoord::new(x, z)).is_some() {
                taken += 1;
            }
        }
    }
    assert_eq!(taken, unique);
    assert_eq!(generator.calls.load(Ordering::SeqCst), unique);

    let seen: HashSet<ChunkCoord> = generator.seen.lock().iter().copied().collect();
    assert_eq!(seen.len(), unique);
    cache.shutdown();
}

/// Test: Racing readers never trigger a second computation. Readers that
/// reach a slot before it is taken share its chunk; later ones find nothing.
#[test]
fn test_racing_readers_share_each_chunk() {
    const READERS: usize = 8;

    let generator = Recording::new(Duration::from_millis(10));
    let cache = Arc::new(ShadowCache::new(Arc::clone(&generator) as Arc<dyn ShadowGenerator>, 2));
    let coords: Vec<ChunkCoord> = (0..16).map(|i| ChunkCoord::new(i, i)).collect();
    cache.enqueue_speculative(&coords);

    let barrier = Arc::new(Barrier::new(READERS));
    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let coords = coords.clone();
            thread::spawn(move || {
                barrier.wait();
                coords
                    .iter()
                    .filter_map(|&coord| cache.get_chunk_with_wait(coord).map(|chunk| (coord, chunk.coord())))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let served: Vec<(ChunkCoord, ChunkCoord)> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    assert!(served.iter().all(|(asked, got)| asked == got));

    let distinct: HashSet<ChunkCoord> = served.iter().map(|(asked, _)| *asked).collect();
    assert_eq!(distinct.len(), coords.len(), "every chunk reached at least one reader");
    assert_eq!(generator.calls.load(Ordering::SeqCst), coords.len());

    assert_eq!(cache.pending(), 0);
    assert_eq!(cache.stats().hits, served.len() as u64);
    cache.shutdown();
}
