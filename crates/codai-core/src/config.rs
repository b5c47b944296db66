//! Codai core configuration
//!
//! Loaded from a TOML or JSON file (picked by extension), then overridden by
//! `CODAI_*` environment variables. A `.env` file in the working directory is
//! honoured through `dotenvy`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CodaiError, Result, ResultExt};
use crate::flags::{FeatureFlag, RolloutHash};

/// Default name this process evaluates feature-flag scopes against
pub const DEFAULT_SERVICE_NAME: &str = "codai";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodaiConfig {
    /// Service name used when a flag check carries no caller service
    pub service_name: String,

    /// Entity store settings
    pub store: StoreSettings,

    /// Feature flag settings
    pub flags: FlagSettings,
}

impl Default for CodaiConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            store: StoreSettings::default(),
            flags: FlagSettings::default(),
        }
    }
}

/// Entity store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Page size used when a query names none
    pub default_limit: usize,

    /// Largest page size returned; larger requests are clamped to it
    pub max_limit: usize,

    /// Seed stores with fixture data at construction
    pub seed_fixtures: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            seed_fixtures: true,
        }
    }
}

/// Feature flag settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagSettings {
    /// Hash used for rollout bucketing
    pub hash: RolloutHash,

    /// Register the built-in flag set before `definitions`
    pub include_defaults: bool,

    /// Extra flag definitions file (JSON or TOML)
    pub definitions_path: Option<String>,

    /// Inline flag definitions; these override defaults with the same name
    pub definitions: Vec<FeatureFlag>,
}

impl Default for FlagSettings {
    fn default() -> Self {
        Self {
            hash: RolloutHash::default(),
            include_defaults: true,
            definitions_path: None,
            definitions: Vec::new(),
        }
    }
}

impl CodaiConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service name
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Disable or enable fixture seeding
    pub fn with_fixtures(mut self, seed: bool) -> Self {
        self.store.seed_fixtures = seed;
        self
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            other => {
                return Err(CodaiError::Config(format!(
                    "unsupported config extension: {}",
                    other.unwrap_or("<none>")
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file, format picked by extension
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| CodaiError::Config(e.to_string()))?,
            _ => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the effective configuration: `.env`, optional file, environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_file.display());
        }

        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CODAI_*` overrides from a variable lookup
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(service) = lookup("CODAI_SERVICE") {
            self.service_name = service;
        }
        if let Some(limit) = lookup("CODAI_DEFAULT_LIMIT") {
            self.store.default_limit = parse_var("CODAI_DEFAULT_LIMIT", &limit)?;
        }
        if let Some(limit) = lookup("CODAI_MAX_LIMIT") {
            self.store.max_limit = parse_var("CODAI_MAX_LIMIT", &limit)?;
        }
        if let Some(seed) = lookup("CODAI_SEED_FIXTURES") {
            self.store.seed_fixtures = parse_var("CODAI_SEED_FIXTURES", &seed)?;
        }
        if let Some(hash) = lookup("CODAI_ROLLOUT_HASH") {
            self.flags.hash = parse_var("CODAI_ROLLOUT_HASH", &hash)?;
        }
        Ok(self)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(CodaiError::Config("service_name must not be empty".into()));
        }
        if self.store.default_limit == 0 {
            return Err(CodaiError::Config("store.default_limit must be at least 1".into()));
        }
        if self.store.default_limit > self.store.max_limit {
            return Err(CodaiError::Config(format!(
                "store.default_limit ({}) exceeds store.max_limit ({})",
                self.store.default_limit, self.store.max_limit
            )));
        }
        Ok(())
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| CodaiError::Config(format!("{key}={raw}: {e}")))
}
