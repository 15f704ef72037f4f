//! # Chunk Buffers
//!
//! - [`ChunkBuffer`]: the host-owned block grid the pipeline writes into
//! - [`CarvingMask`]: one bit per voxel, set when a carver removed it
//! - [`ShadowChunk`]: a generated chunk held by the shadow cache until
//!   the host asks for it
//!
//! Blocks are stored flat, indexed as `[y][z][x]`.

use strata_core::{ChunkCoord, MaterialId, CHUNK_SIZE};

use crate::error::{Stage, TerrainError, TerrainResult};

#[inline]
const fn index(x: usize, y: usize, z: usize) -> usize {
    (y * CHUNK_SIZE + z) * CHUNK_SIZE + x
}

/// One bit per voxel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarvingMask {
    bits: Box<[u64]>,
    height: usize,
}

impl CarvingMask {
    /// Creates an empty mask for a chunk `height` blocks tall.
    #[must_use]
    pub fn new(height: usize) -> Self {
        let voxels = CHUNK_SIZE * CHUNK_SIZE * height;
        Self {
            bits: vec![0; voxels.div_ceil(64)].into_boxed_slice(),
            height,
        }
    }

    /// Marks a voxel. Returns true if it was not marked before.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize) -> bool {
        if x >= CHUNK_SIZE || z >= CHUNK_SIZE || y >= self.height {
            return false;
        }
        let i = index(x, y, z);
        let (word, bit) = (i / 64, 1u64 << (i % 64));
        let fresh = self.bits[word] & bit == 0;
        self.bits[word] |= bit;
        fresh
    }

    /// True if the voxel is marked.
    #[inline]
    #[must_use]
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        if x >= CHUNK_SIZE || z >= CHUNK_SIZE || y >= self.height {
            return false;
        }
        let i = index(x, y, z);
        self.bits[i / 64] & (1u64 << (i % 64)) != 0
    }

    /// Number of marked voxels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Marks every voxel marked in `other`.
    pub fn union(&mut self, other: &Self) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= *b;
        }
    }
}

/// Host chunk buffer. Exclusively owned by the caller of a pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkBuffer {
    coord: ChunkCoord,
    height: usize,
    blocks: Box<[MaterialId]>,
    mask: CarvingMask,
    completed: Option<Stage>,
}

impl ChunkBuffer {
    /// Creates an all-air buffer.
    #[must_use]
    pub fn new(coord: ChunkCoord, height: usize) -> Self {
        Self {
            coord,
            height,
            blocks: vec![MaterialId::AIR; CHUNK_SIZE * CHUNK_SIZE * height].into_boxed_slice(),
            mask: CarvingMask::new(height),
            completed: None,
        }
    }

    /// Chunk position.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Height in blocks.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Last pipeline stage that completed on this buffer.
    #[inline]
    #[must_use]
    pub const fn completed(&self) -> Option<Stage> {
        self.completed
    }

    /// True if `stage` has already run.
    #[inline]
    #[must_use]
    pub fn has_completed(&self, stage: Stage) -> bool {
        self.completed.is_some_and(|done| done >= stage)
    }

    pub(crate) fn mark_completed(&mut self, stage: Stage) {
        self.completed = Some(stage);
    }

    /// Block at local coordinates. Out of range reads as air.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize, z: usize) -> MaterialId {
        if x < CHUNK_SIZE && z < CHUNK_SIZE && y < self.height {
            self.blocks[index(x, y, z)]
        } else {
            MaterialId::AIR
        }
    }

    /// Sets a block at local coordinates. Out of range writes are dropped.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, material: MaterialId) {
        if x < CHUNK_SIZE && z < CHUNK_SIZE && y < self.height {
            self.blocks[index(x, y, z)] = material;
        }
    }

    /// Writes a column bottom-up from `column` (indexed by Y).
    pub fn set_column(&mut self, x: usize, z: usize, column: &[MaterialId]) {
        for (y, &material) in column.iter().enumerate().take(self.height) {
            self.set(x, y, z, material);
        }
    }

    /// Copies a column out, indexed by Y.
    #[must_use]
    pub fn column(&self, x: usize, z: usize) -> Vec<MaterialId> {
        (0..self.height).map(|y| self.get(x, y, z)).collect()
    }

    /// Highest Y whose block satisfies `predicate`, if any.
    #[must_use]
    pub fn highest_y<P: Fn(MaterialId) -> bool>(&self, x: usize, z: usize, predicate: P) -> Option<usize> {
        (0..self.height).rev().find(|&y| predicate(self.get(x, y, z)))
    }

    /// Carving mask.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> &CarvingMask {
        &self.mask
    }

    /// Carving mask, mutable.
    #[inline]
    pub fn mask_mut(&mut self) -> &mut CarvingMask {
        &mut self.mask
    }

    /// Blocks in `[y][z][x]` order.
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[MaterialId] {
        &self.blocks
    }

    /// Raw block handles in `[y][z][x]` order, for hosts that store `u16` palettes.
    #[inline]
    #[must_use]
    pub fn raw_blocks(&self) -> &[u16] {
        bytemuck::cast_slice(&self.blocks)
    }
}

/// A chunk generated ahead of demand. Removed from the cache by its first
/// taker; callers already waiting on it share the same chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowChunk {
    buffer: ChunkBuffer,
}

impl ShadowChunk {
    /// Wraps a generated buffer.
    #[must_use]
    pub fn from_buffer(buffer: ChunkBuffer) -> Self {
        Self { buffer }
    }

    /// Chunk position.
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.buffer.coord
    }

    /// The generated blocks and mask.
    #[must_use]
    pub const fn buffer(&self) -> &ChunkBuffer {
        &self.buffer
    }

    /// Fills the host buffer with the cached blocks, carving mask and stage.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the host buffer has another position or height.
    pub fn copy_into(&self, target: &mut ChunkBuffer) -> TerrainResult<()> {
        if target.coord != self.buffer.coord || target.height != self.buffer.height {
            return Err(TerrainError::Config(format!(
                "shadow chunk {} (height {}) does not fit buffer {} (height {})",
                self.buffer.coord, self.buffer.height, target.coord, target.height
            )));
        }
        target.blocks.copy_from_slice(&self.buffer.blocks);
        target.mask.clone_from(&self.buffer.mask);
        target.completed = self.buffer.completed;
        Ok(())
    }

    /// Unwraps the buffer.
    #[must_use]
    pub fn into_buffer(self) -> ChunkBuffer {
        self.buffer
    }
}
