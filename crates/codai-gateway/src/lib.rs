//! Codai Gateway - HTTP access to Codai services
//!
//! Wraps the stores and flag registry from `codai-core` in an axum server.
//!
//! # Endpoints
//!
//! - `GET /health`, `GET /status`
//! - `POST /rpc`: one typed [`ApiRequest`], selected by its `"op"` field
//! - `/api/memories` REST routes (create, search, stats, get, patch, delete)
//! - `GET /api/flags`, `GET /api/flags/:name/evaluate?user_id=&service=`
//!
//! Missing entities answer 404, validation failures 400, anything else 500,
//! always with a JSON `{ "error", "message" }` body.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;

pub use api::{dispatch, ApiRequest, ApiResponse};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayState};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8787;

/// Default host
pub const DEFAULT_HOST: &str = "127.0.0.1";
