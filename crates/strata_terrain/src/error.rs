//! # Terrain Error Types
//!
//! All errors that can occur while generating terrain.

use std::fmt;

use strata_core::{ChunkCoord, MaterialError};
use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Density sampling into the chunk buffer.
    BaseFill,
    /// Template-biome surface replacement.
    Surface,
    /// Caves and canyons.
    Carving,
    /// Resources, external decorators and snow.
    Decoration,
}

impl Stage {
    /// All stages in order.
    pub const ALL: [Self; 4] = [Self::BaseFill, Self::Surface, Self::Carving, Self::Decoration];

    /// The stage that must have completed before this one may run.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::BaseFill => None,
            Self::Surface => Some(Self::BaseFill),
            Self::Carving => Some(Self::Surface),
            Self::Decoration => Some(Self::Carving),
        }
    }

    /// Lower-case stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BaseFill => "base_fill",
            Self::Surface => "surface",
            Self::Carving => "carving",
            Self::Decoration => "decoration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur in the terrain system.
#[derive(Error, Debug)]
pub enum TerrainError {
    /// Malformed generator, biome or material configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A collaborator lacks a capability the generator requires.
    #[error("incompatible source: {0}")]
    IncompatibleSource(String),

    /// A pipeline stage failed for one chunk.
    #[error("generation failed at {stage} for chunk {coord} (CenterX: {}, CenterZ: {}, Seed: {seed}): {source}", .coord.world_x() + 8, .coord.world_z() + 8)]
    GenerationFailure {
        /// Chunk being generated.
        coord: ChunkCoord,
        /// World seed.
        seed: u64,
        /// Stage that failed.
        stage: Stage,
        /// Underlying failure.
        #[source]
        source: Box<TerrainError>,
    },

    /// A stage was requested before its predecessor completed.
    #[error("stage {stage} for chunk {coord} requires {required} to have completed")]
    OutOfOrder {
        /// Chunk being generated.
        coord: ChunkCoord,
        /// Stage that was requested.
        stage: Stage,
        /// Stage that has not yet run.
        required: Stage,
    },

    /// An externally registered decorator or carver failed.
    #[error("{name} failed: {reason}")]
    External {
        /// Registered name of the collaborator.
        name: String,
        /// Failure description.
        reason: String,
    },

    /// Material lookup or transformation failed.
    #[error(transparent)]
    Material(#[from] MaterialError),

    /// Reading a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid TOML for the expected shape.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The shadow cache has been shut down.
    #[error("shadow cache is shut down")]
    ShutDown,
}

impl TerrainError {
    /// Wraps an error with the chunk, seed and stage it occurred in.
    #[must_use]
    pub fn generation(coord: ChunkCoord, seed: u64, stage: Stage, source: Self) -> Self {
        Self::GenerationFailure {
            coord,
            seed,
            stage,
            source: Box::new(source),
        }
    }
}

/// Result type for terrain operations.
pub type TerrainResult<T> = Result<T, TerrainError>;
