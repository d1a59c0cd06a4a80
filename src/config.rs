//! Engine settings.
//!
//! Read from an optional `leapjoin.{toml,json,yaml,..}` in the working
//! directory and then from `LEAPJOIN_*` environment variables, later sources
//! overriding earlier ones.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{LeapjoinError, Result};
use crate::pattern::{BoundFirst, Identity, Reorder};

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReorderStrategy {
    None,
    BoundFirst,
}
impl ReorderStrategy {
    pub fn transformation(&self) -> Box<dyn Reorder> {
        match self {
            ReorderStrategy::None => Box::new(Identity),
            ReorderStrategy::BoundFirst => Box::new(BoundFirst),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rows buffered per optional child for each parent row.
    pub cache_capacity: usize,
    pub reorder: ReorderStrategy,
    /// Directive for the log subscriber, e.g. `info` or `leapjoin::join=trace`.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            reorder: ReorderStrategy::BoundFirst,
            log_filter: String::from("info"),
        }
    }
}

impl Settings {
    /// Settings from `leapjoin.*` (if present) overridden by the environment.
    pub fn load() -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("leapjoin").required(false))
            .add_source(Environment::with_prefix("LEAPJOIN").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    /// Settings from TOML text, unspecified keys taking their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Result<Self> {
        self.cache_capacity = cache_capacity;
        self.validated()
    }

    pub fn with_reorder(mut self, reorder: ReorderStrategy) -> Self {
        self.reorder = reorder;
        self
    }

    fn validated(self) -> Result<Self> {
        if self.cache_capacity == 0 {
            return Err(LeapjoinError::Config(String::from(
                "cache_capacity must be at least 1",
            )));
        }
        Ok(self)
    }
}
