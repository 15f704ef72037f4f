//! Interning arena for materials.
//!
//! Handles are dense `u16` indices. Interning the same record twice returns
//! the same handle, so handle equality is material equality.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

use super::{Material, MaterialKind};
use crate::error::{MaterialError, MaterialResult};

/// Handle to an interned material.
///
/// `MaterialId::AIR` is always valid for any arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct MaterialId(pub u16);

impl MaterialId {
    /// Air. Interned first by every arena.
    pub const AIR: Self = Self(0);

    /// Raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

struct ArenaInner {
    records: Vec<Material>,
    kinds: Vec<MaterialKind>,
    index: HashMap<Material, MaterialId>,
}

/// Thread-safe material interner.
///
/// Reads (`kind`, `get`) take a shared lock; only the first sighting of a
/// new record takes the write lock.
pub struct MaterialArena {
    inner: RwLock<ArenaInner>,
}

impl MaterialArena {
    /// Maximum number of distinct materials.
    pub const CAPACITY: usize = u16::MAX as usize + 1;

    /// Creates an arena holding only air.
    #[must_use]
    pub fn new() -> Self {
        let air = Material::air();
        let mut index = HashMap::new();
        index.insert(air.clone(), MaterialId::AIR);
        Self {
            inner: RwLock::new(ArenaInner {
                kinds: vec![air.kind],
                records: vec![air],
                index,
            }),
        }
    }

    /// Interns a material, returning its handle.
    ///
    /// # Errors
    ///
    /// Returns `ArenaFull` once every handle is in use.
    pub fn intern(&self, material: Material) -> MaterialResult<MaterialId> {
        if let Some(&id) = self.inner.read().index.get(&material) {
            return Ok(id);
        }

        let mut inner = self.inner.write();
        // Another thread may have interned it between the two locks.
        if let Some(&id) = inner.index.get(&material) {
            return Ok(id);
        }
        let next = inner.records.len();
        let raw = u16::try_from(next).map_err(|_| MaterialError::ArenaFull(next))?;
        let id = MaterialId(raw);
        inner.kinds.push(material.kind);
        inner.records.push(material.clone());
        inner.index.insert(material, id);
        Ok(id)
    }

    /// Returns a copy of the interned record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHandle` if the handle was not issued by this arena.
    pub fn get(&self, id: MaterialId) -> MaterialResult<Material> {
        self.inner
            .read()
            .records
            .get(id.index())
            .cloned()
            .ok_or(MaterialError::InvalidHandle(id.0))
    }

    /// Kind flags of a material. Unknown handles read as air.
    #[inline]
    #[must_use]
    pub fn kind(&self, id: MaterialId) -> MaterialKind {
        self.inner
            .read()
            .kinds
            .get(id.index())
            .copied()
            .unwrap_or(MaterialKind::AIR)
    }

    /// Display name of a material, or `None` for unknown handles.
    #[must_use]
    pub fn name(&self, id: MaterialId) -> Option<String> {
        self.inner.read().records.get(id.index()).map(Material::name)
    }

    /// Number of interned materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Always false: air is interned on construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

impl Default for MaterialArena {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MaterialArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterialArena").field("len", &self.len()).finish()
    }
}
