//! # Shutdown Tests
//!
//! Shutdown must wake every waiter in bounded time and stop accepting work.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use strata_core::{BlockRegistry, ChunkCoord, MaterialArena, MaterialReader, RegistryMaterialReader};
use strata_terrain::{
    BiomeConfig, ChunkBuffer, GeneratorConfig, ShadowCache, ShadowChunk, ShadowGenerator, SingleBiomeSource,
    Stage, TerrainGenerator, TerrainResult,
};

struct Slow {
    calls: AtomicUsize,
    delay: Duration,
}

impl ShadowGenerator for Slow {
    fn generate(&self, coord: ChunkCoord) -> TerrainResult<ShadowChunk> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        Ok(ShadowChunk::from_buffer(ChunkBuffer::new(coord, 16)))
    }
}

fn slow(delay_ms: u64) -> Arc<Slow> {
    Arc::new(Slow {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(delay_ms),
    })
}

/// Test: A waiter blocked on a queued task is released by shutdown.
#[test]
fn test_blocked_waiter_is_released() {
    let generator = slow(200);
    let cache = Arc::new(ShadowCache::new(Arc::clone(&generator) as Arc<dyn ShadowGenerator>, 1));

    // One worker: the first task runs, the rest wait in the queue.
    let coords: Vec<ChunkCoord> = (0..5).map(|i| ChunkCoord::new(i, 0)).collect();
    assert_eq!(cache.enqueue_speculative(&coords), 5);

    let waiter = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            let start = Instant::now();
            let result = cache.get_chunk_with_wait(ChunkCoord::new(4, 0));
            (result.is_some(), start.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(20));

    let report = cache.shutdown();
    let (got_chunk, waited) = waiter.join().unwrap();

    assert!(!got_chunk, "queued task must not run after shutdown");
    assert!(waited < Duration::from_secs(5), "waiter released in {waited:?}");
    assert!(report.cancelled >= 1);
    assert_eq!(report.workers_joined, 1);
    assert!(generator.calls.load(Ordering::SeqCst) < 5);
}

/// Test: A waiter on a task that is running when shutdown begins gets
/// nothing, and the finished chunk is discarded.
#[test]
fn test_waiter_on_running_task_gets_nothing() {
    let generator = slow(300);
    let cache = Arc::new(ShadowCache::new(Arc::clone(&generator) as Arc<dyn ShadowGenerator>, 1));
    let coord = ChunkCoord::new(2, -3);
    assert_eq!(cache.enqueue_speculative(&[coord]), 1);

    // Let the worker pick the task up.
    let start = Instant::now();
    while generator.calls.load(Ordering::SeqCst) == 0 {
        assert!(start.elapsed() < Duration::from_secs(5), "worker never started");
        thread::sleep(Duration::from_millis(1));
    }

    let waiter = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.get_chunk_with_wait(coord).is_some())
    };
    thread::sleep(Duration::from_millis(20));

    let report = cache.shutdown();
    assert!(!waiter.join().unwrap(), "running task must not hand out a chunk after shutdown");
    assert_eq!(report.cancelled, 0);
    assert_eq!(report.discarded, 1);
    assert_eq!(cache.stats().completed, 0);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.pending(), 0);
}

/// Test: Nothing is accepted after shutdown.
#[test]
fn test_no_work_after_shutdown() {
    let generator = slow(0);
    let cache = ShadowCache::new(Arc::clone(&generator) as Arc<dyn ShadowGenerator>, 2);
    cache.shutdown();

    assert_eq!(cache.enqueue_speculative(&[ChunkCoord::new(0, 0)]), 0);
    assert_eq!(cache.queue_neighbours(ChunkCoord::new(0, 0), 2), 0);
    assert!(cache.get_chunk_with_wait(ChunkCoord::new(0, 0)).is_none());
    assert_eq!(cache.pending(), 0);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);

    // Synchronous computation still works.
    assert!(cache.compute_without_caching(ChunkCoord::new(0, 0)).is_ok());
}

/// Test: Dropping the cache stops its workers and releases the generator.
#[test]
fn test_drop_joins_workers() {
    let generator = slow(1);
    {
        let cache = ShadowCache::new(Arc::clone(&generator) as Arc<dyn ShadowGenerator>, 3);
        cache.queue_neighbours(ChunkCoord::new(0, 0), 2);
    }
    assert_eq!(Arc::strong_count(&generator), 1);
}

/// Test: The generator keeps serving chunks synchronously after shutdown.
#[test]
fn test_generator_falls_back_to_synchronous_fill() {
    let arena = Arc::new(MaterialArena::new());
    let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
    let stone = reader.parse("stone").unwrap();
    let water = reader.parse("water").unwrap();
    let provider = Arc::new(SingleBiomeSource::new(BiomeConfig::new("flat", stone, water)));
    let config = GeneratorConfig {
        world_height_cap: 128,
        ..GeneratorConfig::default()
    };
    let generator = TerrainGenerator::new(config, provider, arena, &reader).unwrap();

    generator.generate(ChunkCoord::new(0, 0)).unwrap();
    generator.shutdown();
    assert_eq!(generator.shutdown().workers_joined, 0);

    let chunk = generator.generate(ChunkCoord::new(1, 0)).unwrap();
    assert_eq!(chunk.completed(), Some(Stage::Decoration));
    assert_eq!(generator.shadow().pending(), 0);
}
