//! # Shadow Cache
//!
//! **Speculative Chunk Generation**
//!
//! Chunks next to the ones the host is loading are generated ahead of
//! demand on a small worker pool. When the host asks for one of them the
//! finished chunk is handed over instead of being generated again.
//!
//! ## Architecture
//!
//! ```text
//!   enqueue_speculative ──> [Sharded Slot Map] ──> [FIFO Queue] ──> Worker 1..N
//!                                  │                                   │
//!   get_chunk_with_wait <── slot condvar <──────── Ready / Failed ─────┘
//!   get_or_compute      <──┘ (computes on the caller when no slot exists)
//! ```
//!
//! ## Slot Lifecycle
//!
//! ```text
//!   (absent) ──enqueue──> InProgress ──finish──> Ready ──first taker──> (absent)
//!                              │
//!                              └──fail/cancel──> (absent)
//! ```
//!
//! Insertion and queue push happen under one shard lock, so a coordinate is
//! computed at most once while it has a slot. Every caller holding the slot
//! when it becomes ready gets the same chunk. The first of them removes the
//! slot, so callers that arrive later find nothing.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use strata_core::ChunkCoord;

use crate::chunk::ShadowChunk;
use crate::error::TerrainResult;
use crate::pipeline::Pipeline;

/// Number of lock shards. Must be a power of two.
const SHARDS: usize = 16;

/// Produces detached chunks for the cache.
pub trait ShadowGenerator: Send + Sync {
    /// Generates the chunk at `coord`.
    ///
    /// # Errors
    ///
    /// Returns any pipeline failure.
    fn generate(&self, coord: ChunkCoord) -> TerrainResult<ShadowChunk>;
}

impl ShadowGenerator for Pipeline {
    fn generate(&self, coord: ChunkCoord) -> TerrainResult<ShadowChunk> {
        self.generate_shadow(coord)
    }
}

enum SlotState {
    InProgress,
    Ready(Arc<ShadowChunk>),
    Failed,
    Cancelled,
}

/// Per-coordinate state with its own wakeup.
struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::InProgress),
            ready: Condvar::new(),
        }
    }

    fn finish(&self, outcome: SlotState) {
        let mut state = self.state.lock();
        if matches!(*state, SlotState::InProgress) {
            *state = outcome;
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Blocks until the slot leaves `InProgress`. All waiters share the
    /// finished chunk.
    fn wait(&self) -> Option<Arc<ShadowChunk>> {
        let mut state = self.state.lock();
        while matches!(*state, SlotState::InProgress) {
            self.ready.wait(&mut state);
        }
        match &*state {
            SlotState::Ready(chunk) => Some(Arc::clone(chunk)),
            _ => None,
        }
    }

    /// Cancels a pending or unconsumed slot. Returns true if a finished
    /// chunk was dropped.
    fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        let dropped = matches!(*state, SlotState::Ready(_));
        if matches!(*state, SlotState::InProgress | SlotState::Ready(_)) {
            *state = SlotState::Cancelled;
        }
        drop(state);
        self.ready.notify_all();
        dropped
    }
}

fn into_owned(chunk: Arc<ShadowChunk>) -> ShadowChunk {
    Arc::try_unwrap(chunk).unwrap_or_else(|shared| (*shared).clone())
}

#[derive(Default)]
struct Shard {
    entries: HashMap<ChunkCoord, Arc<Slot>>,
    /// Chunks the host generated itself. Grows with the chunks the host
    /// loads and is cleared on shutdown.
    generated: HashSet<ChunkCoord>,
}

impl Shard {
    fn remove_if_same(&mut self, coord: ChunkCoord, slot: &Arc<Slot>) {
        if self.entries.get(&coord).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            self.entries.remove(&coord);
        }
    }
}

struct Task {
    coord: ChunkCoord,
    slot: Arc<Slot>,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    discarded: AtomicU64,
}

/// Snapshot of cache statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowStats {
    /// Tasks handed to the worker pool.
    pub submitted: u64,
    /// Lookups that returned a chunk.
    pub hits: u64,
    /// Lookups that found no slot.
    pub misses: u64,
    /// Tasks that produced a chunk.
    pub completed: u64,
    /// Tasks that failed or panicked.
    pub failed: u64,
    /// Queued tasks dropped because of shutdown.
    pub cancelled: u64,
    /// Finished chunks dropped because of shutdown.
    pub discarded: u64,
}

/// What a call to [`ShadowCache::shutdown`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Worker threads joined.
    pub workers_joined: usize,
    /// Queued tasks that never ran.
    pub cancelled: u64,
    /// Finished chunks dropped without being consumed, including tasks
    /// that were running when shutdown began.
    pub discarded: u64,
}

/// State shared with the workers.
struct Shared {
    shards: Box<[Mutex<Shard>]>,
    generator: Arc<dyn ShadowGenerator>,
    shutdown: AtomicBool,
    counters: Counters,
}

impl Shared {
    fn shard(&self, coord: ChunkCoord) -> &Mutex<Shard> {
        let key = (u64::from(coord.x as u32) << 32) | u64::from(coord.z as u32);
        let hash = key.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        &self.shards[(hash >> 60) as usize & (SHARDS - 1)]
    }

    fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn worker_loop(&self, receiver: &Receiver<Task>) {
        for task in receiver {
            if self.is_shut_down() {
                self.release(task.coord, &task.slot, SlotState::Cancelled);
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| self.generator.generate(task.coord)));
            match result {
                // Finished after shutdown began: waiters get nothing.
                Ok(Ok(_)) if self.is_shut_down() => {
                    self.release(task.coord, &task.slot, SlotState::Cancelled);
                    self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Ok(chunk)) => {
                    task.slot.finish(SlotState::Ready(Arc::new(chunk)));
                    self.counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => {
                    tracing::warn!(coord = %task.coord, error = %err, "speculative generation failed");
                    self.release(task.coord, &task.slot, SlotState::Failed);
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    tracing::warn!(coord = %task.coord, "speculative generation panicked");
                    self.release(task.coord, &task.slot, SlotState::Failed);
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Drops the slot from its shard and wakes its waiters with `outcome`.
    fn release(&self, coord: ChunkCoord, slot: &Arc<Slot>, outcome: SlotState) {
        self.shard(coord).lock().remove_if_same(coord, slot);
        slot.finish(outcome);
    }

    /// Called by a caller that found the slot ready. The first one removes it.
    fn take(&self, coord: ChunkCoord, slot: &Arc<Slot>, chunk: Arc<ShadowChunk>) -> ShadowChunk {
        self.shard(coord).lock().remove_if_same(coord, slot);
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(coord = %coord, "shadow cache hit");
        into_owned(chunk)
    }
}

struct Pool {
    sender: Sender<Task>,
    handles: Vec<JoinHandle<()>>,
}

enum PoolState {
    Idle,
    Running(Pool),
    Stopped,
}

/// Sharded cache of speculatively generated chunks.
///
/// The worker pool starts on the first enqueue and stops on
/// [`Self::shutdown`] or drop.
pub struct ShadowCache {
    shared: Arc<Shared>,
    pool: Mutex<PoolState>,
    workers: usize,
}

impl ShadowCache {
    /// Creates a cache that runs `generator` on up to `workers` threads.
    #[must_use]
    pub fn new(generator: Arc<dyn ShadowGenerator>, workers: usize) -> Self {
        let shards = (0..SHARDS).map(|_| Mutex::new(Shard::default())).collect();
        Self {
            shared: Arc::new(Shared {
                shards,
                generator,
                shutdown: AtomicBool::new(false),
                counters: Counters::default(),
            }),
            pool: Mutex::new(PoolState::Idle),
            workers: workers.max(1),
        }
    }

    /// Returns a sender into the running pool, starting it if needed.
    fn sender(&self) -> Option<Sender<Task>> {
        let mut pool = self.pool.lock();
        match &*pool {
            PoolState::Running(running) => return Some(running.sender.clone()),
            PoolState::Stopped => return None,
            PoolState::Idle => {}
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let mut handles = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let shared = Arc::clone(&self.shared);
            let receiver = receiver.clone();
            let spawned = thread::Builder::new()
                .name(format!("strata-shadow-{index}"))
                .spawn(move || shared.worker_loop(&receiver));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::error!(error = %err, "failed to spawn shadow worker");
                    break;
                }
            }
        }
        if handles.is_empty() {
            return None;
        }

        tracing::info!(workers = handles.len(), "shadow worker pool started");
        let out = sender.clone();
        *pool = PoolState::Running(Pool { sender, handles });
        Some(out)
    }

    /// Queues every coordinate that has no slot and was not generated by
    /// the host. Never blocks on generation and never queues a coordinate
    /// twice. Returns the number of tasks submitted.
    pub fn enqueue_speculative(&self, coords: &[ChunkCoord]) -> usize {
        if coords.is_empty() || self.shared.is_shut_down() {
            return 0;
        }
        let Some(sender) = self.sender() else {
            return 0;
        };

        let mut submitted = 0;
        for &coord in coords {
            let mut shard = self.shared.shard(coord).lock();
            if shard.generated.contains(&coord) || shard.entries.contains_key(&coord) {
                continue;
            }
            let slot = Arc::new(Slot::new());
            let task = Task {
                coord,
                slot: Arc::clone(&slot),
            };
            if sender.send(task).is_err() {
                break;
            }
            shard.entries.insert(coord, slot);
            submitted += 1;
        }

        if submitted > 0 {
            self.shared.counters.submitted.fetch_add(submitted as u64, Ordering::Relaxed);
            tracing::debug!(submitted, requested = coords.len(), "queued speculative chunks");
        }
        submitted
    }

    /// Queues the square of `radius` chunks around `center`, excluding
    /// `center`, in ascending coordinate order.
    pub fn queue_neighbours(&self, center: ChunkCoord, radius: i32) -> usize {
        self.enqueue_speculative(&center.neighbours(radius))
    }

    /// Takes the chunk for `coord`, waiting if it is still being generated.
    ///
    /// Callers waiting on the same coordinate all get a copy of the same
    /// chunk. Returns `None` if the coordinate was never queued, its task
    /// failed or was cancelled, the chunk was already taken, or the cache
    /// is shut down.
    #[must_use]
    pub fn get_chunk_with_wait(&self, coord: ChunkCoord) -> Option<ShadowChunk> {
        if self.shared.is_shut_down() {
            return None;
        }
        let slot = self.shared.shard(coord).lock().entries.get(&coord).cloned();
        let Some(slot) = slot else {
            self.shared.counters.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(coord = %coord, "shadow cache miss");
            return None;
        };

        let chunk = slot.wait()?;
        if self.shared.is_shut_down() {
            return None;
        }
        Some(self.shared.take(coord, &slot, chunk))
    }

    /// Returns the chunk for `coord`, generating it on the calling thread
    /// when no task has it.
    ///
    /// Concurrent callers for one coordinate share a single computation:
    /// the first registers a slot and generates, the rest wait on it. After
    /// shutdown every call generates without caching.
    ///
    /// # Errors
    ///
    /// Returns the generator's failure to the caller that ran it. Callers
    /// waiting on a failed computation try again.
    pub fn get_or_compute(&self, coord: ChunkCoord) -> TerrainResult<ShadowChunk> {
        loop {
            if self.shared.is_shut_down() {
                return self.compute_without_caching(coord);
            }

            let (slot, owner) = {
                let mut shard = self.shared.shard(coord).lock();
                match shard.entries.get(&coord) {
                    Some(slot) => (Arc::clone(slot), false),
                    None => {
                        let slot = Arc::new(Slot::new());
                        shard.entries.insert(coord, Arc::clone(&slot));
                        (slot, true)
                    }
                }
            };

            if owner {
                return self.compute_for_waiters(coord, &slot);
            }
            if let Some(chunk) = slot.wait() {
                return Ok(self.shared.take(coord, &slot, chunk));
            }
        }
    }

    /// Generates `coord` on the calling thread and publishes it to `slot`.
    fn compute_for_waiters(&self, coord: ChunkCoord, slot: &Arc<Slot>) -> TerrainResult<ShadowChunk> {
        self.shared.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(coord = %coord, "shadow cache miss, generating on caller");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.shared.generator.generate(coord)));
        match result {
            Ok(Ok(chunk)) => {
                let chunk = Arc::new(chunk);
                self.shared.release(coord, slot, SlotState::Ready(Arc::clone(&chunk)));
                Ok(into_owned(chunk))
            }
            Ok(Err(err)) => {
                self.shared.release(coord, slot, SlotState::Failed);
                Err(err)
            }
            Err(payload) => {
                self.shared.release(coord, slot, SlotState::Failed);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Generates `coord` on the calling thread without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns any pipeline failure.
    pub fn compute_without_caching(&self, coord: ChunkCoord) -> TerrainResult<ShadowChunk> {
        self.shared.generator.generate(coord)
    }

    /// Records that the host generated `coord` itself. It will not be
    /// queued again.
    pub fn mark_generated(&self, coord: ChunkCoord) {
        self.shared.shard(coord).lock().generated.insert(coord);
    }

    /// True if [`Self::mark_generated`] was called for `coord` and the
    /// cache has not been shut down since.
    #[must_use]
    pub fn is_generated(&self, coord: ChunkCoord) -> bool {
        self.shared.shard(coord).lock().generated.contains(&coord)
    }

    /// True if `coord` has a queued, running or unconsumed task.
    #[must_use]
    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.shared.shard(coord).lock().entries.contains_key(&coord)
    }

    /// Number of coordinates with a queued, running or unconsumed task.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.shards.iter().map(|shard| shard.lock().entries.len()).sum()
    }

    /// True once [`Self::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shut_down()
    }

    /// Statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> ShadowStats {
        let c = &self.shared.counters;
        ShadowStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            discarded: c.discarded.load(Ordering::Relaxed),
        }
    }

    /// Stops the pool. Queued tasks are cancelled, running tasks are
    /// joined and their chunks discarded, and every waiter is woken with
    /// nothing. Later enqueues and lookups do nothing. Calling it again
    /// returns an empty report.
    pub fn shutdown(&self) -> ShutdownReport {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }
        let counters = &self.shared.counters;
        let cancelled_before = counters.cancelled.load(Ordering::Relaxed);
        let discarded_before = counters.discarded.load(Ordering::Relaxed);

        let pool = mem::replace(&mut *self.pool.lock(), PoolState::Stopped);
        let mut workers_joined = 0;
        if let PoolState::Running(Pool { sender, handles }) = pool {
            drop(sender);
            for handle in handles {
                if handle.join().is_ok() {
                    workers_joined += 1;
                }
            }
        }

        for shard in self.shared.shards.iter() {
            let entries = {
                let mut shard = shard.lock();
                shard.generated.clear();
                mem::take(&mut shard.entries)
            };
            for slot in entries.into_values() {
                if slot.cancel() {
                    counters.discarded.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let report = ShutdownReport {
            workers_joined,
            cancelled: counters.cancelled.load(Ordering::Relaxed) - cancelled_before,
            discarded: counters.discarded.load(Ordering::Relaxed) - discarded_before,
        };
        tracing::info!(
            workers = report.workers_joined,
            cancelled = report.cancelled,
            discarded = report.discarded,
            "shadow worker pool stopped"
        );
        report
    }
}

impl Drop for ShadowCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
