//! # Material Error Types
//!
//! All errors that can occur while reading or transforming materials.

use thiserror::Error;

/// Errors that can occur in the material system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaterialError {
    /// The block name is not known to the registry.
    #[error("unknown block: {0}")]
    UnknownBlock(String),

    /// The block does not carry the requested property.
    #[error("block {block} has no property {property}")]
    UnknownProperty {
        /// Registry name of the block.
        block: String,
        /// Name of the property that was requested.
        property: String,
    },

    /// The property exists but the value is out of range or unparsable.
    #[error("invalid value {value:?} for property {property}")]
    InvalidPropertyValue {
        /// Name of the property.
        property: String,
        /// Raw value that was rejected.
        value: String,
    },

    /// The material text could not be parsed at all.
    #[error("malformed material text: {0:?}")]
    Malformed(String),

    /// The arena has run out of handles.
    #[error("material arena is full ({0} materials)")]
    ArenaFull(usize),

    /// A handle did not point at an interned material.
    #[error("material handle {0} is not interned")]
    InvalidHandle(u16),
}

/// Result type for material operations.
pub type MaterialResult<T> = Result<T, MaterialError>;
