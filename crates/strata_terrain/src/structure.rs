//! # Structure Overlay
//!
//! Jigsaw structures (villages, outposts) flatten the terrain under their
//! pieces. For each chunk the overlay collects:
//!
//! - bounding boxes of rigid pieces, which bias every column they reach
//! - junction points, which bias the terrain around a single point
//!
//! The overlay is rebuilt from the live piece source on every call and
//! never cached with a chunk.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use strata_core::{ChunkCoord, CHUNK_SIZE};

/// Pieces within this many blocks of a chunk influence it.
pub const STRUCTURE_RADIUS: i32 = 12;

/// Axis-aligned block box, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    /// Minimum X.
    pub min_x: i32,
    /// Minimum Y.
    pub min_y: i32,
    /// Minimum Z.
    pub min_z: i32,
    /// Maximum X.
    pub max_x: i32,
    /// Maximum Y.
    pub max_y: i32,
    /// Maximum Z.
    pub max_z: i32,
}

impl BoundingBox {
    /// Creates a box from two corners in any order.
    #[must_use]
    pub fn new(a: (i32, i32, i32), b: (i32, i32, i32)) -> Self {
        Self {
            min_x: a.0.min(b.0),
            min_y: a.1.min(b.1),
            min_z: a.2.min(b.2),
            max_x: a.0.max(b.0),
            max_y: a.1.max(b.1),
            max_z: a.2.max(b.2),
        }
    }

    /// True if the box's horizontal extent comes within `radius` blocks of the chunk.
    #[must_use]
    pub fn is_close_to_chunk(&self, coord: ChunkCoord, radius: i32) -> bool {
        let last = CHUNK_SIZE as i32 - 1;
        self.max_x >= coord.world_x() - radius
            && self.min_x <= coord.world_x() + last + radius
            && self.max_z >= coord.world_z() - radius
            && self.min_z <= coord.world_z() + last + radius
    }
}

/// How a piece sits on the terrain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Keeps its shape; terrain is adjusted around it.
    Rigid,
    /// Follows the terrain; never biases density.
    TerrainMatching,
}

/// Junction between two jigsaw pieces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JunctionPoint {
    /// Source X.
    pub x: i32,
    /// Source ground Y.
    pub y: i32,
    /// Source Z.
    pub z: i32,
}

/// A structure piece as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructurePiece {
    /// Piece bounds.
    pub bbox: BoundingBox,
    /// Placement mode. Only meaningful for jigsaw pieces.
    pub placement: Placement,
    /// Offset from the box floor to the ground the piece sits on.
    pub ground_level_delta: i32,
    /// Junctions this piece connects through.
    pub junctions: Vec<JunctionPoint>,
    /// True for pool-element (jigsaw) pieces. Other pieces count as rigid.
    pub is_jigsaw: bool,
}

impl StructurePiece {
    /// True if the piece keeps its shape.
    #[must_use]
    pub fn is_rigid(&self) -> bool {
        !self.is_jigsaw || self.placement == Placement::Rigid
    }
}

/// Supplies the structure pieces near a chunk.
pub trait StructurePieceSource: Send + Sync {
    /// Pieces whose boxes lie within `radius` blocks of `coord`.
    fn pieces_near(&self, coord: ChunkCoord, radius: i32) -> Vec<StructurePiece>;
}

/// Source for worlds without structures.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStructures;

impl StructurePieceSource for NoStructures {
    fn pieces_near(&self, _coord: ChunkCoord, _radius: i32) -> Vec<StructurePiece> {
        Vec::new()
    }
}

/// One overlay entry: a rigid box or a junction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JigsawStructureData {
    /// Bounds of the piece the entry came from.
    pub bbox: BoundingBox,
    /// True for rigid pieces.
    pub rigid: bool,
    /// Offset from the box floor to the ground.
    pub ground_level_delta: i32,
    /// Junction point, for junction entries.
    pub junction: Option<JunctionPoint>,
}

/// Structure influence on one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructureOverlay {
    /// Rigid piece boxes, in source order.
    pub rigid_pieces: Vec<JigsawStructureData>,
    /// Junction points, in source order.
    pub junctions: Vec<JigsawStructureData>,
}

impl StructureOverlay {
    const BOX_WEIGHT: f64 = 0.8;
    const JUNCTION_WEIGHT: f64 = 0.4;

    /// Collects the overlay for `coord` from the live piece source.
    #[must_use]
    pub fn collect(source: &dyn StructurePieceSource, coord: ChunkCoord) -> Self {
        Self::from_pieces(coord, &source.pieces_near(coord, STRUCTURE_RADIUS))
    }

    /// Builds the overlay from an explicit piece list.
    #[must_use]
    pub fn from_pieces(coord: ChunkCoord, pieces: &[StructurePiece]) -> Self {
        let start_x = coord.world_x();
        let start_z = coord.world_z();
        let end = CHUNK_SIZE as i32 - 1;
        let r = STRUCTURE_RADIUS;

        let mut overlay = Self::default();
        for piece in pieces.iter().filter(|p| p.bbox.is_close_to_chunk(coord, r)) {
            if piece.is_rigid() {
                overlay.rigid_pieces.push(JigsawStructureData {
                    bbox: piece.bbox,
                    rigid: true,
                    ground_level_delta: piece.ground_level_delta,
                    junction: None,
                });
            }
            for junction in &piece.junctions {
                if junction.x > start_x - r
                    && junction.z > start_z - r
                    && junction.x < start_x + end + r
                    && junction.z < start_z + end + r
                {
                    overlay.junctions.push(JigsawStructureData {
                        bbox: piece.bbox,
                        rigid: piece.is_rigid(),
                        ground_level_delta: piece.ground_level_delta,
                        junction: Some(*junction),
                    });
                }
            }
        }
        overlay
    }

    /// True if nothing influences the chunk.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rigid_pieces.is_empty() && self.junctions.is_empty()
    }

    /// Density bias at a voxel. Positive below a piece's ground, negative
    /// inside and above it, fading to zero at the structure radius.
    #[must_use]
    pub fn bias(&self, x: i32, y: i32, z: i32) -> f64 {
        let mut total = 0.0;
        for piece in &self.rigid_pieces {
            let b = &piece.bbox;
            let floor = b.min_y + piece.ground_level_delta;
            let dx = axis_gap(x, b.min_x, b.max_x);
            let dz = axis_gap(z, b.min_z, b.max_z);
            let dy = axis_gap(y, floor, b.max_y);
            total += Self::BOX_WEIGHT * falloff(dx, dy, dz) * side(y, floor);
        }
        for entry in &self.junctions {
            if let Some(j) = entry.junction {
                total += Self::JUNCTION_WEIGHT * falloff(x - j.x, y - j.y, z - j.z) * side(y, j.y);
            }
        }
        total
    }
}

#[inline]
fn axis_gap(v: i32, min: i32, max: i32) -> i32 {
    if v < min {
        min - v
    } else if v > max {
        v - max
    } else {
        0
    }
}

#[inline]
fn falloff(dx: i32, dy: i32, dz: i32) -> f64 {
    let dist = f64::from(dx * dx + dy * dy + dz * dz).sqrt();
    (1.0 - dist / f64::from(STRUCTURE_RADIUS)).max(0.0)
}

#[inline]
fn side(y: i32, ground: i32) -> f64 {
    if y < ground { 1.0 } else { -1.0 }
}

/// Opaque handle to a structure-placement record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructureHandle(pub u64);

/// Structure placement history, owned by the host.
pub trait StructureCache: Send + Sync {
    /// Handle for the chunk's structure record, creating it if needed.
    fn get_or_create(&self, coord: ChunkCoord) -> StructureHandle;
}

/// Process-local [`StructureCache`].
#[derive(Debug, Default)]
pub struct InMemoryStructureCache {
    handles: Mutex<HashMap<ChunkCoord, StructureHandle>>,
    next: AtomicU64,
}

impl InMemoryStructureCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructureCache for InMemoryStructureCache {
    fn get_or_create(&self, coord: ChunkCoord) -> StructureHandle {
        *self
            .handles
            .lock()
            .entry(coord)
            .or_insert_with(|| StructureHandle(self.next.fetch_add(1, Ordering::Relaxed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(bbox: BoundingBox, placement: Placement, jigsaw: bool) -> StructurePiece {
        StructurePiece {
            bbox,
            placement,
            ground_level_delta: 1,
            junctions: Vec::new(),
            is_jigsaw: jigsaw,
        }
    }

    #[test]
    fn test_only_rigid_pieces_contribute_boxes() {
        let coord = ChunkCoord::new(0, 0);
        let bbox = BoundingBox::new((2, 60, 2), (8, 70, 8));
        let pieces = vec![
            piece(bbox, Placement::Rigid, true),
            piece(bbox, Placement::TerrainMatching, true),
            piece(bbox, Placement::TerrainMatching, false),
        ];
        let overlay = StructureOverlay::from_pieces(coord, &pieces);
        assert_eq!(overlay.rigid_pieces.len(), 2);
        assert!(overlay.junctions.is_empty());
    }

    #[test]
    fn test_far_pieces_are_ignored() {
        let coord = ChunkCoord::new(0, 0);
        let near = BoundingBox::new((-12, 60, 0), (-12, 64, 0));
        let far = BoundingBox::new((-13, 60, 0), (-13, 64, 0));
        let overlay = StructureOverlay::from_pieces(
            coord,
            &[piece(near, Placement::Rigid, true), piece(far, Placement::Rigid, true)],
        );
        assert_eq!(overlay.rigid_pieces.len(), 1);
        assert_eq!(overlay.rigid_pieces[0].bbox, near);
    }

    #[test]
    fn test_junction_bounds_are_exclusive() {
        let coord = ChunkCoord::new(0, 0);
        let mut p = piece(BoundingBox::new((0, 60, 0), (4, 64, 4)), Placement::TerrainMatching, true);
        p.junctions = vec![
            JunctionPoint { x: -11, y: 64, z: 0 },
            JunctionPoint { x: -12, y: 64, z: 0 },
            JunctionPoint { x: 26, y: 64, z: 26 },
            JunctionPoint { x: 27, y: 64, z: 0 },
        ];
        let overlay = StructureOverlay::from_pieces(coord, &[p]);

        let xs: Vec<i32> = overlay.junctions.iter().filter_map(|j| j.junction).map(|j| j.x).collect();
        assert_eq!(xs, vec![-11, 26]);
        assert!(overlay.rigid_pieces.is_empty());
    }

    #[test]
    fn test_bias_sign_and_falloff() {
        let coord = ChunkCoord::new(0, 0);
        let bbox = BoundingBox::new((4, 63, 4), (10, 70, 10));
        let overlay = StructureOverlay::from_pieces(coord, &[piece(bbox, Placement::Rigid, true)]);

        // floor is 64
        assert!(overlay.bias(6, 60, 6) > 0.0);
        assert!(overlay.bias(6, 66, 6) < 0.0);
        assert_eq!(overlay.bias(6, 66 + 40, 6), 0.0);
        assert!(overlay.bias(6, 63, 6) > overlay.bias(6, 55, 6));
        assert!(StructureOverlay::default().bias(0, 0, 0) == 0.0);
    }

    #[test]
    fn test_structure_cache_handles_are_stable() {
        let cache = InMemoryStructureCache::new();
        let a = cache.get_or_create(ChunkCoord::new(1, 1));
        let b = cache.get_or_create(ChunkCoord::new(2, 1));
        assert_ne!(a, b);
        assert_eq!(cache.get_or_create(ChunkCoord::new(1, 1)), a);
    }
}
