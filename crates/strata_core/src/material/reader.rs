//! Material text parsing.
//!
//! Configuration files name blocks as `namespace:block[key=value,...]`.
//! The namespace defaults to `minecraft`. Property keys must be supported
//! by the block's template in the [`BlockRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    Axis, Connections, Direction, Material, MaterialArena, MaterialId, MaterialKind, Property,
    PropertySet, PropertyValue,
};
use crate::error::{MaterialError, MaterialResult};

/// Turns material text into interned handles.
pub trait MaterialReader: Send + Sync {
    /// Parses one material.
    ///
    /// # Errors
    ///
    /// Returns a `MaterialError` for empty, malformed or unknown text.
    fn parse(&self, text: &str) -> MaterialResult<MaterialId>;
}

/// Known blocks and their default state.
#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    templates: HashMap<String, Material>,
}

impl BlockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a block template, replacing any previous entry.
    pub fn register(&mut self, material: Material) {
        self.templates.insert(material.block.clone(), material);
    }

    /// Looks up a template by full registry name.
    #[must_use]
    pub fn template(&self, block: &str) -> Option<&Material> {
        self.templates.get(block)
    }

    /// Number of registered blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The blocks used by the built-in biomes and carvers.
    #[must_use]
    pub fn vanilla() -> Self {
        let mut registry = Self::new();
        let props = PropertySet::default;
        let mut add = |name: &str, kind: MaterialKind, properties: PropertySet| {
            registry.register(Material::new(format!("minecraft:{name}"), kind).with_properties(properties));
        };

        add("air", MaterialKind::AIR, props());
        add("cave_air", MaterialKind::AIR, props());
        for name in [
            "stone", "dirt", "bedrock", "snow_block", "obsidian", "quartz_block", "coal_ore",
            "iron_ore", "honey_block", "soul_sand",
        ] {
            add(name, MaterialKind::SOLID, props());
        }
        add(
            "grass_block",
            MaterialKind::SOLID,
            PropertySet {
                snowy: Some(false),
                ..props()
            },
        );
        add("sand", MaterialKind::FALLING, props());
        add("gravel", MaterialKind::FALLING, props());
        add("water", MaterialKind::LIQUID, props());
        add("lava", MaterialKind::LIQUID, props());
        add("ice", MaterialKind::SLIPPERY, props());
        add("packed_ice", MaterialKind::SLIPPERY, props());
        add("barrier", MaterialKind::SLIPPERY, props());
        add(
            "snow",
            MaterialKind::PLANT,
            PropertySet {
                layers: Some(1),
                ..props()
            },
        );
        add(
            "oak_log",
            MaterialKind::SOLID,
            PropertySet {
                axis: Some(Axis::Y),
                ..props()
            },
        );
        add(
            "oak_leaves",
            MaterialKind::SOLID,
            PropertySet {
                distance: Some(7),
                persistent: Some(false),
                ..props()
            },
        );
        for name in ["oak_fence", "glass_pane"] {
            add(
                name,
                MaterialKind::SOLID,
                PropertySet {
                    connections: Some(Connections::default()),
                    ..props()
                },
            );
        }
        add(
            "furnace",
            MaterialKind::SOLID,
            PropertySet {
                facing: Some(Direction::North),
                ..props()
            },
        );
        add(
            "sea_pickle",
            MaterialKind::PLANT,
            PropertySet {
                pickles: Some(1),
                ..props()
            },
        );
        add(
            "sugar_cane",
            MaterialKind::PLANT,
            PropertySet {
                age: Some(0),
                ..props()
            },
        );
        add("grass", MaterialKind::PLANT, props());
        registry
    }
}

/// [`MaterialReader`] backed by a [`BlockRegistry`].
#[derive(Debug)]
pub struct RegistryMaterialReader {
    registry: BlockRegistry,
    arena: Arc<MaterialArena>,
}

impl RegistryMaterialReader {
    /// Creates a reader interning into `arena`.
    #[must_use]
    pub fn new(registry: BlockRegistry, arena: Arc<MaterialArena>) -> Self {
        Self { registry, arena }
    }

    /// The arena parsed materials are interned in.
    #[must_use]
    pub fn arena(&self) -> &Arc<MaterialArena> {
        &self.arena
    }

    fn apply(
        block: &str,
        properties: &mut PropertySet,
        key: &str,
        value: &str,
    ) -> MaterialResult<()> {
        let unknown = || MaterialError::UnknownProperty {
            block: block.to_string(),
            property: key.to_string(),
        };

        if let Some(side) = ["north", "east", "south", "west"].iter().find(|s| **s == key) {
            let connections = properties.connections.as_mut().ok_or_else(unknown)?;
            let flag = value.parse::<bool>().map_err(|_| MaterialError::InvalidPropertyValue {
                property: key.to_string(),
                value: value.to_string(),
            })?;
            match *side {
                "north" => connections.north = flag,
                "east" => connections.east = flag,
                "south" => connections.south = flag,
                _ => connections.west = flag,
            }
            return Ok(());
        }

        let property = Property::from_name(key).ok_or_else(unknown)?;
        let parsed = PropertyValue::parse(property, value)?;
        if properties.set(parsed) {
            Ok(())
        } else {
            Err(unknown())
        }
    }
}

impl MaterialReader for RegistryMaterialReader {
    fn parse(&self, text: &str) -> MaterialResult<MaterialId> {
        let text = text.trim().to_ascii_lowercase();
        if text.is_empty() {
            return Err(MaterialError::Malformed(text));
        }

        let (head, props) = match text.find('[') {
            Some(open) => {
                let inner = text[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| MaterialError::Malformed(text.clone()))?;
                (&text[..open], Some(inner))
            }
            None => (text.as_str(), None),
        };

        let head = head.trim();
        if head.is_empty() || head.contains(char::is_whitespace) {
            return Err(MaterialError::Malformed(text.clone()));
        }
        let block = if head.contains(':') {
            head.to_string()
        } else {
            format!("minecraft:{head}")
        };

        let mut material = self
            .registry
            .template(&block)
            .cloned()
            .ok_or_else(|| MaterialError::UnknownBlock(block.clone()))?;

        if let Some(props) = props {
            for pair in props.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| MaterialError::Malformed(text.clone()))?;
                Self::apply(&block, &mut material.properties, key.trim(), value.trim())?;
            }
        }

        self.arena.intern(material)
    }
}
