//! Typed request/response protocol for the `/rpc` endpoint
//!
//! Every store and flag operation is one [`ApiRequest`] variant, selected by
//! its `"op"` field. Payloads are fully deserialized (and therefore shape
//! checked) before [`dispatch`] touches a store; semantic validation then
//! happens inside the stores themselves.

use codai_core::flags::{FeatureFlag, FlagContext, FlagEvaluation};
use codai_core::mcp::{ConnectionStatus, McpConnection, McpPatch, McpRecord};
use codai_core::memory::{MemoryEntry, MemoryPatch, MemoryQuery, MemoryRecord};
use codai_core::wallet::{Portfolio, Position, PositionKind, PositionPatch, PositionRecord};
use codai_core::{EntityId, Query, QueryResult, Services, StoreStats};
use serde::{Deserialize, Serialize};

use crate::{GatewayError, Result};

/// One operation against the Codai services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ApiRequest {
    // Memories
    CreateMemory {
        entry: MemoryEntry,
    },
    GetMemory {
        id: EntityId,
    },
    SearchMemories {
        #[serde(default)]
        query: MemoryQuery,
    },
    UpdateMemory {
        id: EntityId,
        patch: MemoryPatch,
    },
    DeleteMemory {
        id: EntityId,
    },
    MemoryStats,

    // MCP connections
    ConnectMcp {
        connection: McpConnection,
    },
    GetMcp {
        id: EntityId,
    },
    QueryMcp {
        #[serde(default)]
        query: Query<ConnectionStatus>,
    },
    UpdateMcp {
        id: EntityId,
        patch: McpPatch,
    },
    DisconnectMcp {
        id: EntityId,
    },
    RemoveMcp {
        id: EntityId,
    },
    McpStats,

    // Wallet positions
    OpenPosition {
        position: Position,
    },
    GetPosition {
        id: EntityId,
    },
    QueryPositions {
        #[serde(default)]
        query: Query<PositionKind>,
    },
    UpdatePosition {
        id: EntityId,
        patch: PositionPatch,
    },
    ClosePosition {
        id: EntityId,
    },
    PositionStats,
    Portfolio {
        wallet: String,
    },

    // Feature flags
    ListFlags,
    EvaluateFlag {
        name: String,
        #[serde(default)]
        context: FlagContext,
    },
    EnabledFlags {
        #[serde(default)]
        context: FlagContext,
    },
    SetFlagEnabled {
        name: String,
        enabled: bool,
    },
    SetFlagRollout {
        name: String,
        #[serde(default)]
        percentage: Option<u8>,
    },
}

impl ApiRequest {
    /// Operation name as it appears on the wire
    pub fn op(&self) -> &'static str {
        match self {
            ApiRequest::CreateMemory { .. } => "create_memory",
            ApiRequest::GetMemory { .. } => "get_memory",
            ApiRequest::SearchMemories { .. } => "search_memories",
            ApiRequest::UpdateMemory { .. } => "update_memory",
            ApiRequest::DeleteMemory { .. } => "delete_memory",
            ApiRequest::MemoryStats => "memory_stats",
            ApiRequest::ConnectMcp { .. } => "connect_mcp",
            ApiRequest::GetMcp { .. } => "get_mcp",
            ApiRequest::QueryMcp { .. } => "query_mcp",
            ApiRequest::UpdateMcp { .. } => "update_mcp",
            ApiRequest::DisconnectMcp { .. } => "disconnect_mcp",
            ApiRequest::RemoveMcp { .. } => "remove_mcp",
            ApiRequest::McpStats => "mcp_stats",
            ApiRequest::OpenPosition { .. } => "open_position",
            ApiRequest::GetPosition { .. } => "get_position",
            ApiRequest::QueryPositions { .. } => "query_positions",
            ApiRequest::UpdatePosition { .. } => "update_position",
            ApiRequest::ClosePosition { .. } => "close_position",
            ApiRequest::PositionStats => "position_stats",
            ApiRequest::Portfolio { .. } => "portfolio",
            ApiRequest::ListFlags => "list_flags",
            ApiRequest::EvaluateFlag { .. } => "evaluate_flag",
            ApiRequest::EnabledFlags { .. } => "enabled_flags",
            ApiRequest::SetFlagEnabled { .. } => "set_flag_enabled",
            ApiRequest::SetFlagRollout { .. } => "set_flag_rollout",
        }
    }
}

/// Result of a dispatched [`ApiRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ApiResponse {
    Created { id: EntityId },
    Removed { id: EntityId },
    Memory(MemoryRecord),
    Memories(QueryResult<MemoryEntry>),
    Mcp(McpRecord),
    McpConnections(QueryResult<McpConnection>),
    Position(PositionRecord),
    Positions(QueryResult<Position>),
    Stats(StoreStats),
    Portfolio(Portfolio),
    Flags(Vec<FeatureFlag>),
    Evaluation(FlagEvaluation),
    EnabledFlags(Vec<String>),
    FlagUpdated { name: String },
}

fn found<T>(value: Option<T>, kind: &'static str, id: &EntityId) -> Result<T> {
    value.ok_or_else(|| GatewayError::not_found(kind, id.as_str()))
}

fn removed(done: bool, kind: &'static str, id: EntityId) -> Result<ApiResponse> {
    if done {
        Ok(ApiResponse::Removed { id })
    } else {
        Err(GatewayError::not_found(kind, id.as_str()))
    }
}

/// Execute one request against the services
pub fn dispatch(services: &Services, request: ApiRequest) -> Result<ApiResponse> {
    tracing::debug!(op = request.op(), "dispatching request");

    let response = match request {
        ApiRequest::CreateMemory { entry } => ApiResponse::Created {
            id: services.memory.create(entry)?,
        },
        ApiRequest::GetMemory { id } => {
            ApiResponse::Memory(found(services.memory.get(&id), "memory", &id)?)
        }
        ApiRequest::SearchMemories { query } => {
            ApiResponse::Memories(services.memory.search(&query)?)
        }
        ApiRequest::UpdateMemory { id, patch } => {
            let updated = services.memory.update(&id, patch)?;
            ApiResponse::Memory(found(updated, "memory", &id)?)
        }
        ApiRequest::DeleteMemory { id } => {
            let done = services.memory.delete(&id);
            removed(done, "memory", id)?
        }
        ApiRequest::MemoryStats => ApiResponse::Stats(services.memory.stats()),

        ApiRequest::ConnectMcp { connection } => ApiResponse::Created {
            id: services.mcp.connect(connection)?,
        },
        ApiRequest::GetMcp { id } => {
            ApiResponse::Mcp(found(services.mcp.get(&id), "MCP connection", &id)?)
        }
        ApiRequest::QueryMcp { query } => ApiResponse::McpConnections(services.mcp.query(&query)?),
        ApiRequest::UpdateMcp { id, patch } => {
            let updated = services.mcp.update(&id, patch)?;
            ApiResponse::Mcp(found(updated, "MCP connection", &id)?)
        }
        ApiRequest::DisconnectMcp { id } => {
            if !services.mcp.disconnect(&id)? {
                return Err(GatewayError::not_found("MCP connection", id.as_str()));
            }
            ApiResponse::Mcp(found(services.mcp.get(&id), "MCP connection", &id)?)
        }
        ApiRequest::RemoveMcp { id } => {
            let done = services.mcp.remove(&id);
            removed(done, "MCP connection", id)?
        }
        ApiRequest::McpStats => ApiResponse::Stats(services.mcp.stats()),

        ApiRequest::OpenPosition { position } => ApiResponse::Created {
            id: services.positions.open(position)?,
        },
        ApiRequest::GetPosition { id } => {
            ApiResponse::Position(found(services.positions.get(&id), "position", &id)?)
        }
        ApiRequest::QueryPositions { query } => {
            ApiResponse::Positions(services.positions.query(&query)?)
        }
        ApiRequest::UpdatePosition { id, patch } => {
            let updated = services.positions.update(&id, patch)?;
            ApiResponse::Position(found(updated, "position", &id)?)
        }
        ApiRequest::ClosePosition { id } => {
            let done = services.positions.close(&id);
            removed(done, "position", id)?
        }
        ApiRequest::PositionStats => ApiResponse::Stats(services.positions.stats()),
        ApiRequest::Portfolio { wallet } => {
            ApiResponse::Portfolio(services.positions.portfolio(&wallet))
        }

        ApiRequest::ListFlags => ApiResponse::Flags(services.flags.list()),
        ApiRequest::EvaluateFlag { name, context } => {
            ApiResponse::Evaluation(services.flags.evaluate(&name, &context))
        }
        ApiRequest::EnabledFlags { context } => {
            ApiResponse::EnabledFlags(services.flags.enabled_flags(&context))
        }
        ApiRequest::SetFlagEnabled { name, enabled } => {
            if !services.flags.set_enabled(&name, enabled) {
                return Err(GatewayError::not_found("flag", name));
            }
            ApiResponse::FlagUpdated { name }
        }
        ApiRequest::SetFlagRollout { name, percentage } => {
            if !services.flags.set_rollout(&name, percentage)? {
                return Err(GatewayError::not_found("flag", name));
            }
            ApiResponse::FlagUpdated { name }
        }
    };

    Ok(response)
}
