//! MCP server connection registry
//!
//! Tracks Model Context Protocol servers agents have connected to. Only the
//! bookkeeping lives here; the protocol transport itself is external.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StoreSettings;
use crate::error::ValidationError;
use crate::store::{Entity, EntityStore, Query, QueryResult, Record, StoreStats};
use crate::types::EntityId;

/// How the server is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransport {
    Stdio,
    Http,
    WebSocket,
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// A registered MCP server connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConnection {
    pub server_name: String,

    /// Server URL; may be empty for stdio servers
    #[serde(default)]
    pub endpoint: String,

    pub transport: McpTransport,

    pub status: ConnectionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Tools the server advertises
    #[serde(default)]
    pub tools: Vec<String>,

    /// Health score (0.0-1.0)
    #[serde(default)]
    pub health: f64,
}

impl McpConnection {
    pub fn new(server_name: impl Into<String>, transport: McpTransport) -> Self {
        Self {
            server_name: server_name.into(),
            endpoint: String::new(),
            transport,
            status: ConnectionStatus::Connected,
            agent_id: None,
            tools: Vec::new(),
            health: 1.0,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn with_health(mut self, health: f64) -> Self {
        self.health = health;
        self
    }
}

/// Partial update of a connection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpPatch {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub status: Option<ConnectionStatus>,

    #[serde(default)]
    pub tools: Option<Vec<String>>,

    #[serde(default)]
    pub health: Option<f64>,
}

impl Entity for McpConnection {
    type Kind = ConnectionStatus;
    type Patch = McpPatch;

    fn owner(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    fn kind(&self) -> ConnectionStatus {
        self.status
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.server_name.as_str(), self.endpoint.as_str()];
        fields.extend(self.tools.iter().map(String::as_str));
        fields
    }

    fn score(&self) -> f64 {
        self.health
    }

    fn size(&self) -> f64 {
        self.tools.len() as f64
    }

    fn apply(&mut self, patch: McpPatch) {
        if let Some(endpoint) = patch.endpoint {
            self.endpoint = endpoint;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(tools) = patch.tools {
            self.tools = tools;
        }
        if let Some(health) = patch.health {
            self.health = health;
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require_text("serverName", &self.server_name)?;
        ValidationError::require_range("health", self.health, 0.0, 1.0)?;

        match self.transport {
            McpTransport::Stdio if self.endpoint.is_empty() => Ok(()),
            _ => {
                ValidationError::require_text("endpoint", &self.endpoint)?;
                let url = url::Url::parse(&self.endpoint).map_err(|e| {
                    ValidationError::InvalidValue {
                        field: "endpoint",
                        reason: e.to_string(),
                    }
                })?;
                let expected: &[&str] = match self.transport {
                    McpTransport::Http => &["http", "https"],
                    McpTransport::WebSocket => &["ws", "wss"],
                    McpTransport::Stdio => &["file"],
                };
                if expected.contains(&url.scheme()) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidValue {
                        field: "endpoint",
                        reason: format!(
                            "scheme {} does not match {:?} transport",
                            url.scheme(),
                            self.transport
                        ),
                    })
                }
            }
        }
    }
}

/// A stored connection
pub type McpRecord = Record<McpConnection>;

/// Registry of MCP server connections
#[derive(Debug)]
pub struct McpRegistry {
    store: EntityStore<McpConnection>,
}

impl McpRegistry {
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            store: EntityStore::new("mcp_connections", settings),
        }
    }

    pub fn with_fixtures(settings: &StoreSettings) -> Result<Self, ValidationError> {
        let registry = Self::new(settings);
        registry.store.seed(fixtures())?;
        Ok(registry)
    }

    /// Register a new connection
    pub fn connect(&self, connection: McpConnection) -> Result<EntityId, ValidationError> {
        let name = connection.server_name.clone();
        let id = self.store.create(connection)?;
        tracing::info!("MCP server registered: {} ({})", name, id);
        Ok(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<McpRecord> {
        self.store.get(id)
    }

    pub fn query(
        &self,
        query: &Query<ConnectionStatus>,
    ) -> Result<QueryResult<McpConnection>, ValidationError> {
        self.store.query(query)
    }

    pub fn update(
        &self,
        id: &EntityId,
        patch: McpPatch,
    ) -> Result<Option<McpRecord>, ValidationError> {
        self.store.update(id, patch)
    }

    /// Change only the connection status; `Ok(false)` when the id is unknown
    pub fn set_status(
        &self,
        id: &EntityId,
        status: ConnectionStatus,
    ) -> Result<bool, ValidationError> {
        let patch = McpPatch {
            status: Some(status),
            ..Default::default()
        };
        Ok(self.store.update(id, patch)?.is_some())
    }

    /// Mark a connection disconnected, keeping it registered
    pub fn disconnect(&self, id: &EntityId) -> Result<bool, ValidationError> {
        let changed = self.set_status(id, ConnectionStatus::Disconnected)?;
        if changed {
            tracing::info!("MCP server disconnected: {}", id);
        }
        Ok(changed)
    }

    /// Forget a connection entirely
    pub fn remove(&self, id: &EntityId) -> bool {
        let removed = self.store.delete(id);
        if removed {
            tracing::info!("MCP server removed: {}", id);
        }
        removed
    }

    /// Connected servers advertising a tool
    pub fn servers_with_tool(&self, tool: &str) -> Vec<McpRecord> {
        self.store.select(|r| {
            r.data.status == ConnectionStatus::Connected && r.data.tools.iter().any(|t| t == tool)
        })
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Seed connections for a fresh registry
pub fn fixtures() -> Vec<McpConnection> {
    vec![
        McpConnection::new("filesystem", McpTransport::Stdio)
            .with_agent("assistant")
            .with_tool("read_file")
            .with_tool("write_file")
            .with_tool("list_directory"),
        McpConnection::new("github", McpTransport::Http)
            .with_endpoint("https://mcp.codai.dev/github")
            .with_agent("architect")
            .with_tool("search_issues")
            .with_tool("create_pull_request")
            .with_health(0.9),
        McpConnection::new("analytics-stream", McpTransport::WebSocket)
            .with_endpoint("wss://mcp.codai.dev/analytics")
            .with_tool("subscribe_metrics")
            .with_health(0.4),
    ]
}
