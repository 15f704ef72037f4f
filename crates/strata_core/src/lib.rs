//! # STRATA Core
//!
//! Value types shared by every part of the terrain generator:
//! - Chunk coordinates with a total order for deterministic iteration
//! - An arena of interned materials addressed by `MaterialId` handles
//! - A text reader that turns configured block names into materials
//!
//! ## Material Identity
//!
//! Every distinct material record is stored exactly once. Two handles are
//! equal if and only if the records they point at are equal, so block
//! comparisons in the hot path are integer comparisons.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{BlockRegistry, MaterialArena, MaterialReader, RegistryMaterialReader};
//!
//! let arena = Arc::new(MaterialArena::new());
//! let reader = RegistryMaterialReader::new(BlockRegistry::vanilla(), Arc::clone(&arena));
//!
//! let log = reader.parse("minecraft:oak_log[axis=x]")?;
//! let rotated = strata_core::rotate(&arena, log, 1)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod coord;
pub mod error;
pub mod material;

pub use coord::{ChunkCoord, CHUNK_SIZE};
pub use error::{MaterialError, MaterialResult};
pub use material::{
    legal_or_persistent_leaves, rotate, with_property, Axis, BlockRegistry, Connections,
    Direction, Material, MaterialArena, MaterialId, MaterialKind, MaterialReader, Property,
    PropertySet, PropertyValue, RegistryMaterialReader,
};
