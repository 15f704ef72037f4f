//! # Materials
//!
//! A material is a plain record: the registry name of a block, a small set
//! of kind flags, and the block's properties. Properties are
//! capability-tagged: a property is supported by a block exactly when its
//! slot in the [`PropertySet`] is `Some`.
//!
//! Transformations (`rotate`, `with_property`, leaf persistence) are free
//! functions that build a new record and intern it in the
//! [`MaterialArena`]. No material is ever mutated in place.

mod arena;
mod reader;

pub use arena::{MaterialArena, MaterialId};
pub use reader::{BlockRegistry, MaterialReader, RegistryMaterialReader};

use std::fmt::Write as _;

use crate::error::{MaterialError, MaterialResult};

/// Behavioural flags of a material.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MaterialKind {
    /// Blocks movement and counts as ground for height queries.
    pub solid: bool,
    /// Water, lava and similar.
    pub liquid: bool,
    /// Air of any flavour.
    pub air: bool,
    /// Falls when unsupported (sand, gravel).
    pub falls: bool,
    /// Snow may settle on top of it.
    pub snow_settles: bool,
}

impl MaterialKind {
    /// Empty space.
    pub const AIR: Self = Self {
        solid: false,
        liquid: false,
        air: true,
        falls: false,
        snow_settles: false,
    };

    /// Ordinary solid block that accepts snow.
    pub const SOLID: Self = Self {
        solid: true,
        liquid: false,
        air: false,
        falls: false,
        snow_settles: true,
    };

    /// Solid block affected by gravity.
    pub const FALLING: Self = Self {
        solid: true,
        liquid: false,
        air: false,
        falls: true,
        snow_settles: true,
    };

    /// Solid block that snow slides off (ice, barriers).
    pub const SLIPPERY: Self = Self {
        solid: true,
        liquid: false,
        air: false,
        falls: false,
        snow_settles: false,
    };

    /// Fluid.
    pub const LIQUID: Self = Self {
        solid: false,
        liquid: true,
        air: false,
        falls: false,
        snow_settles: false,
    };

    /// Non-solid decoration (plants, snow layers).
    pub const PLANT: Self = Self {
        solid: false,
        liquid: false,
        air: false,
        falls: false,
        snow_settles: false,
    };
}

/// Horizontal and vertical facing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// -Z
    North,
    /// +X
    East,
    /// +Z
    South,
    /// -X
    West,
    /// +Y
    Up,
    /// -Y
    Down,
}

impl Direction {
    /// Rotates a quarter turn counter-clockwise. Vertical facings are unchanged.
    #[must_use]
    pub const fn rotate_ccw(self) -> Self {
        match self {
            Self::North => Self::West,
            Self::West => Self::South,
            Self::South => Self::East,
            Self::East => Self::North,
            Self::Up => Self::Up,
            Self::Down => Self::Down,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "north" => Some(Self::North),
            "east" => Some(Self::East),
            "south" => Some(Self::South),
            "west" => Some(Self::West),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Pillar axis (logs, basalt, hay).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// East-west.
    X,
    /// Vertical.
    Y,
    /// North-south.
    Z,
}

impl Axis {
    const fn name(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "x" => Some(Self::X),
            "y" => Some(Self::Y),
            "z" => Some(Self::Z),
            _ => None,
        }
    }
}

/// Side connections of fences and panes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Connections {
    /// Connected on the north side.
    pub north: bool,
    /// Connected on the east side.
    pub east: bool,
    /// Connected on the south side.
    pub south: bool,
    /// Connected on the west side.
    pub west: bool,
}

/// Property names understood by the material system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    /// Facing direction.
    Facing,
    /// Pillar axis.
    Axis,
    /// Growth age, 0-25.
    Age,
    /// Sea pickle count, 1-4.
    Pickles,
    /// Snow-covered top.
    Snowy,
    /// Leaf distance from a log, 1-7.
    Distance,
    /// Leaves that never decay.
    Persistent,
    /// Snow layer count, 1-8.
    Layers,
}

impl Property {
    /// Text name used in material strings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Facing => "facing",
            Self::Axis => "axis",
            Self::Age => "age",
            Self::Pickles => "pickles",
            Self::Snowy => "snowy",
            Self::Distance => "distance",
            Self::Persistent => "persistent",
            Self::Layers => "layers",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "facing" => Some(Self::Facing),
            "axis" => Some(Self::Axis),
            "age" => Some(Self::Age),
            "pickles" => Some(Self::Pickles),
            "snowy" => Some(Self::Snowy),
            "distance" => Some(Self::Distance),
            "persistent" => Some(Self::Persistent),
            "layers" => Some(Self::Layers),
            _ => None,
        }
    }
}

/// A typed property value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyValue {
    /// Facing direction.
    Facing(Direction),
    /// Pillar axis.
    Axis(Axis),
    /// Growth age.
    Age(u8),
    /// Sea pickle count.
    Pickles(u8),
    /// Snow-covered top.
    Snowy(bool),
    /// Leaf distance.
    Distance(u8),
    /// Leaf persistence.
    Persistent(bool),
    /// Snow layers.
    Layers(u8),
}

impl PropertyValue {
    /// The property this value belongs to.
    #[must_use]
    pub const fn property(self) -> Property {
        match self {
            Self::Facing(_) => Property::Facing,
            Self::Axis(_) => Property::Axis,
            Self::Age(_) => Property::Age,
            Self::Pickles(_) => Property::Pickles,
            Self::Snowy(_) => Property::Snowy,
            Self::Distance(_) => Property::Distance,
            Self::Persistent(_) => Property::Persistent,
            Self::Layers(_) => Property::Layers,
        }
    }

    /// Checks numeric ranges.
    fn validate(self) -> MaterialResult<Self> {
        let in_range = match self {
            Self::Age(v) => v <= 25,
            Self::Pickles(v) => (1..=4).contains(&v),
            Self::Distance(v) => (1..=7).contains(&v),
            Self::Layers(v) => (1..=8).contains(&v),
            Self::Facing(_) | Self::Axis(_) | Self::Snowy(_) | Self::Persistent(_) => true,
        };
        if in_range {
            Ok(self)
        } else {
            Err(MaterialError::InvalidPropertyValue {
                property: self.property().name().to_string(),
                value: self.text(),
            })
        }
    }

    /// Parses the text form of a value for `property`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPropertyValue` if the text is not a valid value.
    pub fn parse(property: Property, text: &str) -> MaterialResult<Self> {
        let invalid = || MaterialError::InvalidPropertyValue {
            property: property.name().to_string(),
            value: text.to_string(),
        };
        let number = || text.parse::<u8>().map_err(|_| invalid());
        let flag = || text.parse::<bool>().map_err(|_| invalid());

        let value = match property {
            Property::Facing => Self::Facing(Direction::parse(text).ok_or_else(invalid)?),
            Property::Axis => Self::Axis(Axis::parse(text).ok_or_else(invalid)?),
            Property::Age => Self::Age(number()?),
            Property::Pickles => Self::Pickles(number()?),
            Property::Snowy => Self::Snowy(flag()?),
            Property::Distance => Self::Distance(number()?),
            Property::Persistent => Self::Persistent(flag()?),
            Property::Layers => Self::Layers(number()?),
        };
        value.validate()
    }

    fn text(self) -> String {
        match self {
            Self::Facing(d) => d.name().to_string(),
            Self::Axis(a) => a.name().to_string(),
            Self::Age(v) | Self::Pickles(v) | Self::Distance(v) | Self::Layers(v) => v.to_string(),
            Self::Snowy(b) | Self::Persistent(b) => b.to_string(),
        }
    }
}

/// Properties carried by a block. `None` means the block does not support
/// that property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PropertySet {
    /// Facing direction.
    pub facing: Option<Direction>,
    /// Pillar axis.
    pub axis: Option<Axis>,
    /// Side connections.
    pub connections: Option<Connections>,
    /// Growth age.
    pub age: Option<u8>,
    /// Sea pickle count.
    pub pickles: Option<u8>,
    /// Snow-covered top.
    pub snowy: Option<bool>,
    /// Leaf distance.
    pub distance: Option<u8>,
    /// Leaf persistence.
    pub persistent: Option<bool>,
    /// Snow layers.
    pub layers: Option<u8>,
}

impl PropertySet {
    /// Returns true if the block supports `property`.
    #[must_use]
    pub const fn supports(&self, property: Property) -> bool {
        match property {
            Property::Facing => self.facing.is_some(),
            Property::Axis => self.axis.is_some(),
            Property::Age => self.age.is_some(),
            Property::Pickles => self.pickles.is_some(),
            Property::Snowy => self.snowy.is_some(),
            Property::Distance => self.distance.is_some(),
            Property::Persistent => self.persistent.is_some(),
            Property::Layers => self.layers.is_some(),
        }
    }

    /// Returns the current value of `property`, if supported.
    #[must_use]
    pub fn get(&self, property: Property) -> Option<PropertyValue> {
        match property {
            Property::Facing => self.facing.map(PropertyValue::Facing),
            Property::Axis => self.axis.map(PropertyValue::Axis),
            Property::Age => self.age.map(PropertyValue::Age),
            Property::Pickles => self.pickles.map(PropertyValue::Pickles),
            Property::Snowy => self.snowy.map(PropertyValue::Snowy),
            Property::Distance => self.distance.map(PropertyValue::Distance),
            Property::Persistent => self.persistent.map(PropertyValue::Persistent),
            Property::Layers => self.layers.map(PropertyValue::Layers),
        }
    }

    /// Overwrites a supported property. Returns false if unsupported.
    fn set(&mut self, value: PropertyValue) -> bool {
        if !self.supports(value.property()) {
            return false;
        }
        match value {
            PropertyValue::Facing(v) => self.facing = Some(v),
            PropertyValue::Axis(v) => self.axis = Some(v),
            PropertyValue::Age(v) => self.age = Some(v),
            PropertyValue::Pickles(v) => self.pickles = Some(v),
            PropertyValue::Snowy(v) => self.snowy = Some(v),
            PropertyValue::Distance(v) => self.distance = Some(v),
            PropertyValue::Persistent(v) => self.persistent = Some(v),
            PropertyValue::Layers(v) => self.layers = Some(v),
        }
        true
    }

    /// One counter-clockwise quarter turn.
    fn rotate_ccw(&mut self) {
        if let Some(facing) = self.facing {
            self.facing = Some(facing.rotate_ccw());
        }
        if let Some(axis) = self.axis {
            self.axis = Some(match axis {
                Axis::X => Axis::Z,
                Axis::Z => Axis::X,
                Axis::Y => Axis::Y,
            });
        }
        if let Some(old) = self.connections {
            self.connections = Some(Connections {
                north: old.east,
                east: old.south,
                south: old.west,
                west: old.north,
            });
        }
    }
}

/// A block material record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Material {
    /// Namespaced registry name, e.g. `minecraft:stone`.
    pub block: String,
    /// Behaviour flags.
    pub kind: MaterialKind,
    /// Block properties.
    pub properties: PropertySet,
}

impl Material {
    /// Creates a material without properties.
    #[must_use]
    pub fn new(block: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            block: block.into(),
            kind,
            properties: PropertySet::default(),
        }
    }

    /// Replaces the property set.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }

    /// The air material. Always interned first.
    #[must_use]
    pub fn air() -> Self {
        Self::new("minecraft:air", MaterialKind::AIR)
    }

    /// Full display name, including properties, e.g. `minecraft:oak_log[axis=x]`.
    #[must_use]
    pub fn name(&self) -> String {
        let mut parts = Vec::new();
        let p = &self.properties;
        for property in [
            Property::Facing,
            Property::Axis,
            Property::Age,
            Property::Pickles,
            Property::Snowy,
            Property::Distance,
            Property::Persistent,
            Property::Layers,
        ] {
            if let Some(value) = p.get(property) {
                parts.push(format!("{}={}", property.name(), value.text()));
            }
        }
        if let Some(c) = p.connections {
            parts.push(format!("east={}", c.east));
            parts.push(format!("north={}", c.north));
            parts.push(format!("south={}", c.south));
            parts.push(format!("west={}", c.west));
        }

        let mut name = self.block.clone();
        if !parts.is_empty() {
            let _ = write!(name, "[{}]", parts.join(","));
        }
        name
    }
}

/// Rotates a material `times` quarter turns counter-clockwise.
///
/// # Errors
///
/// Returns an error if `id` is not interned or the arena is full.
pub fn rotate(arena: &MaterialArena, id: MaterialId, times: i32) -> MaterialResult<MaterialId> {
    let turns = times.rem_euclid(4);
    if turns == 0 {
        return Ok(id);
    }
    let mut material = arena.get(id)?;
    for _ in 0..turns {
        material.properties.rotate_ccw();
    }
    arena.intern(material)
}

/// Returns the material with one property replaced.
///
/// # Errors
///
/// Returns `UnknownProperty` if the block does not support the property and
/// `InvalidPropertyValue` if the value is out of range.
pub fn with_property(
    arena: &MaterialArena,
    id: MaterialId,
    value: PropertyValue,
) -> MaterialResult<MaterialId> {
    let value = value.validate()?;
    let mut material = arena.get(id)?;
    if !material.properties.set(value) {
        return Err(MaterialError::UnknownProperty {
            block: material.block,
            property: value.property().name().to_string(),
        });
    }
    arena.intern(material)
}

/// Leaves further than 6 blocks from a log become persistent, others are
/// marked decayable. Non-leaf materials are returned unchanged.
///
/// # Errors
///
/// Returns an error if `id` is not interned or the arena is full.
pub fn legal_or_persistent_leaves(
    arena: &MaterialArena,
    id: MaterialId,
) -> MaterialResult<MaterialId> {
    let material = arena.get(id)?;
    let Some(distance) = material.properties.distance else {
        return Ok(id);
    };
    if material.properties.persistent.is_none() {
        return Ok(id);
    }
    with_property(arena, id, PropertyValue::Persistent(distance > 6))
}
