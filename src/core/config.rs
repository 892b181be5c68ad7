//! Allocator configuration
//!
//! Settings can be built in code, through [`AllocatorBuilder`], or loaded
//! from TOML:
//!
//! ```toml
//! max_blocks = 4096
//! track_handles = true
//! strict_release = false
//! ```

use crate::allocator::BlockRangeAllocator;
use crate::error::{AllocError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_track_handles() -> bool {
    true
}

fn default_strict_release() -> bool {
    cfg!(debug_assertions)
}

/// Settings for a [`BlockRangeAllocator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Size of the block space
    pub max_blocks: u32,

    /// Keep an ordered registry of live handles
    ///
    /// Turning this off drops the registry; stale and foreign handles are
    /// still rejected through the handle slots.
    #[serde(default = "default_track_handles")]
    pub track_handles: bool,

    /// Panic instead of returning an error when an unknown handle is released
    ///
    /// Defaults to on in debug builds and off in release builds.
    #[serde(default = "default_strict_release")]
    pub strict_release: bool,
}

impl AllocatorConfig {
    /// Default settings for a space of `max_blocks` blocks
    pub fn new(max_blocks: u32) -> Self {
        AllocatorConfig {
            max_blocks,
            track_handles: default_track_handles(),
            strict_release: default_strict_release(),
        }
    }

    /// Check the settings can build an allocator
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `max_blocks` is 0.
    pub fn validate(&self) -> Result<()> {
        if self.max_blocks == 0 {
            return Err(AllocError::InvalidArgument(
                "max_blocks must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Parse and validate settings from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AllocatorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading allocator config from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| AllocError::Config(e.to_string()))
    }
}

/// Builder for customizing allocator creation
///
/// # Examples
///
/// ```
/// use blockrange::AllocatorBuilder;
///
/// let mut alloc = AllocatorBuilder::new()
///     .max_blocks(1024)
///     .strict_release(false)
///     .build()
///     .unwrap();
///
/// let handle = alloc.acquire(16).unwrap();
/// assert_eq!(handle.start(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AllocatorBuilder {
    max_blocks: Option<u32>,
    track_handles: Option<bool>,
    strict_release: Option<bool>,
}

impl AllocatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size of the block space (required)
    pub fn max_blocks(mut self, max_blocks: u32) -> Self {
        self.max_blocks = Some(max_blocks);
        self
    }

    /// Enable or disable the live-handle registry (default: enabled)
    pub fn track_handles(mut self, enabled: bool) -> Self {
        self.track_handles = Some(enabled);
        self
    }

    /// Panic on release of an unknown handle (default: debug builds only)
    pub fn strict_release(mut self, enabled: bool) -> Self {
        self.strict_release = Some(enabled);
        self
    }

    /// Resolve the settings without building
    pub fn config(&self) -> Result<AllocatorConfig> {
        let max_blocks = self
            .max_blocks
            .ok_or(AllocError::InvalidArgument("max_blocks must be set"))?;

        let config = AllocatorConfig {
            max_blocks,
            track_handles: self.track_handles.unwrap_or_else(default_track_handles),
            strict_release: self.strict_release.unwrap_or_else(default_strict_release),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn build(self) -> Result<BlockRangeAllocator> {
        BlockRangeAllocator::with_config(&self.config()?)
    }
}

impl From<AllocatorConfig> for AllocatorBuilder {
    fn from(config: AllocatorConfig) -> Self {
        AllocatorBuilder {
            max_blocks: Some(config.max_blocks),
            track_handles: Some(config.track_handles),
            strict_release: Some(config.strict_release),
        }
    }
}
