//! # Chunk Coordinates
//!
//! The world is cut into 16x16 columns. A `ChunkCoord` names one column
//! region and is the key for every cache in the generator.

use std::fmt;

/// Chunk width/depth in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Chunk coordinate (identifies a chunk in the world grid).
///
/// Ordered by `x`, then `z`, so sorted collections of coordinates iterate
/// in the same order on every run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts world block coordinates to chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE as i32),
            z: block_z.div_euclid(CHUNK_SIZE as i32),
        }
    }

    /// Returns the world X coordinate of the chunk's origin (corner).
    #[inline]
    #[must_use]
    pub const fn world_x(self) -> i32 {
        self.x * CHUNK_SIZE as i32
    }

    /// Returns the world Z coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn world_z(self) -> i32 {
        self.z * CHUNK_SIZE as i32
    }

    /// Returns the chunk offset by `(dx, dz)` chunks.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// Chebyshev distance to another chunk, in chunks.
    #[inline]
    #[must_use]
    pub const fn distance(self, other: Self) -> i32 {
        let dx = (self.x - other.x).abs();
        let dz = (self.z - other.z).abs();
        if dx > dz { dx } else { dz }
    }

    /// All chunks in the square of the given radius around this one,
    /// excluding this chunk, in ascending order.
    #[must_use]
    pub fn neighbours(self, radius: i32) -> Vec<Self> {
        let radius = radius.max(0);
        let side = (2 * radius + 1) as usize;
        let mut out = Vec::with_capacity(side * side - 1);
        for x in self.x - radius..=self.x + radius {
            for z in self.z - radius..=self.z + radius {
                if x != self.x || z != self.z {
                    out.push(Self::new(x, z));
                }
            }
        }
        out
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_coord_from_block() {
        assert_eq!(ChunkCoord::from_block_pos(0, 0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(15, 15), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_block_pos(16, 16), ChunkCoord::new(1, 1));
        assert_eq!(ChunkCoord::from_block_pos(-1, -1), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-16, -16), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_block_pos(-17, -17), ChunkCoord::new(-2, -2));
    }

    #[test]
    fn test_ordering_is_x_then_z() {
        let mut coords = vec![
            ChunkCoord::new(1, 0),
            ChunkCoord::new(0, 5),
            ChunkCoord::new(0, -1),
            ChunkCoord::new(-3, 9),
        ];
        coords.sort();
        assert_eq!(
            coords,
            vec![
                ChunkCoord::new(-3, 9),
                ChunkCoord::new(0, -1),
                ChunkCoord::new(0, 5),
                ChunkCoord::new(1, 0),
            ]
        );
    }

    #[test]
    fn test_neighbours_exclude_center() {
        let center = ChunkCoord::new(4, -2);
        let around = center.neighbours(1);

        assert_eq!(around.len(), 8);
        assert!(!around.contains(&center));
        assert!(around.iter().all(|c| c.distance(center) == 1));
        assert!(around.windows(2).all(|w| w[0] < w[1]), "neighbours must be sorted");
        assert!(center.neighbours(0).is_empty());
    }
}
