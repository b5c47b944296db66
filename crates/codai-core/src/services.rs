//! Explicitly constructed service container
//!
//! Every consumer receives the stores it needs from a [`Services`] value
//! built once at startup. Independent containers share nothing, so tests and
//! multiple tenants in one process stay isolated.

use std::sync::Arc;

use crate::config::CodaiConfig;
use crate::error::{Result, ResultExt};
use crate::flags::FlagRegistry;
use crate::mcp::McpRegistry;
use crate::memory::MemoryService;
use crate::wallet::PositionBook;

/// Handles to every Codai store and the flag registry
#[derive(Debug, Clone)]
pub struct Services {
    pub memory: Arc<MemoryService>,
    pub mcp: Arc<McpRegistry>,
    pub positions: Arc<PositionBook>,
    pub flags: Arc<FlagRegistry>,
}

impl Services {
    /// Build every service, seeding fixtures when the config asks for it
    pub fn from_config(config: &CodaiConfig) -> Result<Self> {
        config.validate()?;
        let settings = &config.store;

        let (memory, mcp, positions) = if settings.seed_fixtures {
            (
                MemoryService::with_fixtures(settings).context("seeding memories")?,
                McpRegistry::with_fixtures(settings).context("seeding MCP connections")?,
                PositionBook::with_fixtures(settings).context("seeding positions")?,
            )
        } else {
            (
                MemoryService::new(settings),
                McpRegistry::new(settings),
                PositionBook::new(settings),
            )
        };
        let flags = FlagRegistry::from_config(config).context("loading feature flags")?;

        tracing::info!(
            service = %config.service_name,
            memories = memory.len(),
            connections = mcp.len(),
            positions = positions.len(),
            flags = flags.len(),
            "Codai services ready"
        );

        Ok(Self {
            memory: Arc::new(memory),
            mcp: Arc::new(mcp),
            positions: Arc::new(positions),
            flags: Arc::new(flags),
        })
    }

    /// Empty stores, built-in flags only
    pub fn empty() -> Result<Self> {
        Self::from_config(&CodaiConfig::default().with_fixtures(false))
    }
}
