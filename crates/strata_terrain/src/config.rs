//! # Generator Configuration
//!
//! World-level settings, loaded from TOML. Missing keys take their
//! defaults, so a file only needs to name what it changes:
//!
//! ```toml
//! seed = 42
//! sea_level = 63
//! caves_enabled = false
//!
//! [portal]
//! blocks = "minecraft:obsidian, minecraft:quartz_block"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_core::{MaterialId, MaterialReader};

use crate::error::{TerrainError, TerrainResult};

/// Vertical blocks per noise cell.
pub const NOISE_CELL_HEIGHT: i32 = 8;

/// Generator settings for one world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// World seed.
    pub seed: u64,
    /// Water fills non-solid space below this Y.
    pub sea_level: i32,
    /// Exclusive upper bound of generated Y. Must be a multiple of 8.
    pub world_height_cap: i32,
    /// Run the built-in cave and canyon carvers.
    pub caves_enabled: bool,
    /// Run the decoration stage.
    pub decoration_enabled: bool,
    /// Write bedrock at y = 0 during base fill.
    pub bedrock_floor: bool,
    /// Worker threads in the shadow pool.
    pub max_worker_threads: usize,
    /// Chunks around each requested chunk to generate speculatively.
    pub speculative_radius: i32,
    /// Chunks of biome data kept by the biome cache.
    pub biome_cache_capacity: usize,
    /// Horizontal frequency of the template surface noise.
    pub surface_noise_scale: f64,
    /// Default solid block for template biomes.
    pub default_block: String,
    /// Default fluid for template biomes.
    pub default_fluid: String,
    /// World-wide portal defaults.
    pub portal: PortalDefaults,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            sea_level: 63,
            world_height_cap: 256,
            caves_enabled: true,
            decoration_enabled: true,
            bedrock_floor: true,
            max_worker_threads: 2,
            speculative_radius: 1,
            biome_cache_capacity: 1024,
            surface_noise_scale: 0.0625,
            default_block: "minecraft:stone".to_string(),
            default_fluid: "minecraft:water".to_string(),
            portal: PortalDefaults::default(),
        }
    }
}

impl GeneratorConfig {
    /// Production config: more workers and a wider speculative ring.
    #[must_use]
    pub fn production() -> Self {
        Self {
            max_worker_threads: 4,
            speculative_radius: 2,
            biome_cache_capacity: 4096,
            ..Self::default()
        }
    }

    /// Returns a copy with a different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Toml` for syntax or type errors and `Config` if validation fails.
    pub fn from_toml_str(text: &str) -> TerrainResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Number of vertical noise cells.
    #[inline]
    #[must_use]
    pub const fn noise_size_y(&self) -> usize {
        (self.world_height_cap / NOISE_CELL_HEIGHT) as usize
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first offending field.
    pub fn validate(&self) -> TerrainResult<()> {
        if self.world_height_cap < 16 || self.world_height_cap % NOISE_CELL_HEIGHT != 0 {
            return Err(TerrainError::Config(format!(
                "world_height_cap must be a multiple of {NOISE_CELL_HEIGHT} and at least 16, got {}",
                self.world_height_cap
            )));
        }
        if self.sea_level < 0 || self.sea_level >= self.world_height_cap {
            return Err(TerrainError::Config(format!(
                "sea_level {} is outside 0..{}",
                self.sea_level, self.world_height_cap
            )));
        }
        if !(1..=64).contains(&self.max_worker_threads) {
            return Err(TerrainError::Config(format!(
                "max_worker_threads must be 1..=64, got {}",
                self.max_worker_threads
            )));
        }
        if !(0..=8).contains(&self.speculative_radius) {
            return Err(TerrainError::Config(format!(
                "speculative_radius must be 0..=8, got {}",
                self.speculative_radius
            )));
        }
        if self.biome_cache_capacity == 0 {
            return Err(TerrainError::Config("biome_cache_capacity must be positive".to_string()));
        }
        if !self.surface_noise_scale.is_finite() || self.surface_noise_scale <= 0.0 {
            return Err(TerrainError::Config(format!(
                "surface_noise_scale must be positive, got {}",
                self.surface_noise_scale
            )));
        }
        Ok(())
    }
}

/// World-wide portal settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalDefaults {
    /// Comma-separated portal frame materials.
    pub blocks: String,
    /// Portal colour name.
    pub color: String,
    /// Mob that spawns from portals.
    pub mob: String,
    /// Item that lights the portal.
    pub ignition_source: String,
}

impl Default for PortalDefaults {
    fn default() -> Self {
        Self {
            blocks: "minecraft:quartz_block".to_string(),
            color: "beige".to_string(),
            mob: "minecraft:zombified_piglin".to_string(),
            ignition_source: "minecraft:flint_and_steel".to_string(),
        }
    }
}

/// Per-dimension overrides. Any field left out falls back to the world default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionOverrides {
    /// Comma-separated portal frame materials.
    pub portal_blocks: Option<String>,
    /// Portal colour name.
    pub portal_color: Option<String>,
    /// Mob that spawns from portals.
    pub portal_mob: Option<String>,
    /// Item that lights the portal.
    pub portal_ignition_source: Option<String>,
}

/// Resolved portal settings of one dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortalSettings {
    /// Portal frame materials.
    pub blocks: Vec<MaterialId>,
    /// Portal colour name.
    pub color: String,
    /// Mob that spawns from portals.
    pub mob: String,
    /// Item that lights the portal.
    pub ignition_source: String,
}

impl PortalSettings {
    /// Resolves dimension overrides against the world defaults.
    ///
    /// Block entries that fail to parse are skipped. An override list that
    /// is blank or yields no materials falls back to the default list.
    #[must_use]
    pub fn resolve(
        overrides: Option<&DimensionOverrides>,
        defaults: &PortalDefaults,
        reader: &dyn MaterialReader,
    ) -> Self {
        let mut blocks = overrides
            .and_then(|o| o.portal_blocks.as_deref())
            .filter(|list| !list.trim().is_empty())
            .map(|list| parse_material_list(list, reader))
            .unwrap_or_default();
        if blocks.is_empty() {
            blocks = parse_material_list(&defaults.blocks, reader);
        }

        let pick = |value: Option<&String>, fallback: &String| value.unwrap_or(fallback).clone();
        Self {
            blocks,
            color: pick(overrides.and_then(|o| o.portal_color.as_ref()), &defaults.color),
            mob: pick(overrides.and_then(|o| o.portal_mob.as_ref()), &defaults.mob),
            ignition_source: pick(
                overrides.and_then(|o| o.portal_ignition_source.as_ref()),
                &defaults.ignition_source,
            ),
        }
    }
}

fn parse_material_list(list: &str, reader: &dyn MaterialReader) -> Vec<MaterialId> {
    list.split(',')
        .filter_map(|entry| match reader.parse(entry) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!(entry = entry.trim(), error = %e, "skipping portal block");
                None
            }
        })
        .collect()
}
