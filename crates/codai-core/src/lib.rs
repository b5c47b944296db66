//! Codai Core - in-memory stores and feature flags for Codai services
//!
//! Codai's web apps share a small set of process-local services. This crate
//! provides them as plain Rust values that are constructed explicitly and
//! handed to whoever needs them.
//!
//! # Architecture
//!
//! 1. **Entity Store** (`store`): generic keyed store with CRUD, ranked queries and
//!    statistics recomputed from the live set on every write
//! 2. **Domain stores**: agent memories (`memory`), MCP server connections (`mcp`),
//!    wallet DeFi positions (`wallet`)
//! 3. **Feature Flags** (`flags`): flag registry and deterministic rollout bucketing
//! 4. **Services** (`services`): container wiring everything from a `CodaiConfig`
//!
//! # Quick Start
//!
//! ```
//! use codai_core::{CodaiConfig, Services};
//! use codai_core::flags::FlagContext;
//! use codai_core::memory::{MemoryEntry, MemoryQuery, MemoryType};
//!
//! let services = Services::from_config(&CodaiConfig::default().with_fixtures(false)).unwrap();
//!
//! let id = services
//!     .memory
//!     .create(MemoryEntry::new("A", "hello world", MemoryType::Project).with_tag("x"))
//!     .unwrap();
//!
//! let found = services.memory.search(&MemoryQuery::new().text("hello")).unwrap();
//! assert_eq!(found.items[0].id, id);
//!
//! let ctx = FlagContext::for_user("user-42");
//! let first = services.flags.is_enabled("beta_features", &ctx);
//! assert_eq!(first, services.flags.is_enabled("beta_features", &ctx));
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod config;
pub mod error;
pub mod flags;
pub mod mcp;
pub mod memory;
pub mod services;
pub mod store;
pub mod types;
pub mod wallet;

// Re-export commonly used types for convenience
pub use config::{CodaiConfig, FlagSettings, StoreSettings};
pub use error::{CodaiError, Result, ResultExt, ValidationError};
pub use flags::{
    evaluate_flag, EvaluationReason, FeatureFlag, FlagContext, FlagEvaluation, FlagRegistry,
    RolloutHash,
};
pub use mcp::{ConnectionStatus, McpConnection, McpRegistry, McpTransport};
pub use memory::{MemoryEntry, MemoryPatch, MemoryQuery, MemoryService, MemoryType};
pub use services::Services;
pub use store::{Entity, EntityStore, Query, QueryResult, Record, StoreStats};
pub use types::{EntityId, Timestamp};
pub use wallet::{Portfolio, Position, PositionBook, PositionKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
