//! # Memory Service
//!
//! Agent memory entries (notes, project facts, conversation snippets) kept in
//! an [`EntityStore`]. Entries are scored by `relevance` and searched across
//! title, content and tags.
//!
//! Memory types form one closed set: `personal`, `project`, `global`,
//! `conversation`. Agent ownership is expressed through `agentId`, never
//! through the type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::StoreSettings;
use crate::error::ValidationError;
use crate::store::{Entity, EntityStore, Query, QueryResult, Record, StoreStats};
use crate::types::EntityId;

/// Memory classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Personal,
    Project,
    Global,
    Conversation,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryType::Personal => write!(f, "personal"),
            MemoryType::Project => write!(f, "project"),
            MemoryType::Global => write!(f, "global"),
            MemoryType::Conversation => write!(f, "conversation"),
        }
    }
}

impl FromStr for MemoryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "personal" => Ok(MemoryType::Personal),
            "project" => Ok(MemoryType::Project),
            "global" => Ok(MemoryType::Global),
            "conversation" => Ok(MemoryType::Conversation),
            other => Err(ValidationError::InvalidValue {
                field: "type",
                reason: format!("unknown memory type: {other}"),
            }),
        }
    }
}

fn default_relevance() -> f64 {
    0.5
}

/// A memory entry as supplied by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub title: String,

    pub content: String,

    #[serde(rename = "type")]
    pub memory_type: MemoryType,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Owning agent; not checked against any agent registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Relevance score (0.0-1.0)
    #[serde(default = "default_relevance")]
    pub relevance: f64,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl MemoryEntry {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        memory_type: MemoryType,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            memory_type,
            tags: Vec::new(),
            agent_id: None,
            relevance: default_relevance(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Partial update of a memory entry; absent fields stay unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPatch {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, rename = "type")]
    pub memory_type: Option<MemoryType>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,

    #[serde(default)]
    pub agent_id: Option<String>,

    #[serde(default)]
    pub relevance: Option<f64>,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl Entity for MemoryEntry {
    type Kind = MemoryType;
    type Patch = MemoryPatch;

    fn owner(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    fn kind(&self) -> MemoryType {
        self.memory_type
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.content.as_str()];
        fields.extend(self.tags.iter().map(String::as_str));
        fields
    }

    fn score(&self) -> f64 {
        self.relevance
    }

    fn size(&self) -> f64 {
        self.content.len() as f64
    }

    fn apply(&mut self, patch: MemoryPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(memory_type) = patch.memory_type {
            self.memory_type = memory_type;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(agent_id) = patch.agent_id {
            self.agent_id = Some(agent_id);
        }
        if let Some(relevance) = patch.relevance {
            self.relevance = relevance;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata = metadata;
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require_text("title", &self.title)?;
        ValidationError::require_text("content", &self.content)?;
        ValidationError::require_range("relevance", self.relevance, 0.0, 1.0)?;
        for tag in &self.tags {
            ValidationError::require_text("tags", tag)?;
        }
        Ok(())
    }
}

/// Filter accepted by [`MemoryService::search`]
pub type MemoryQuery = Query<MemoryType>;

/// A stored memory entry
pub type MemoryRecord = Record<MemoryEntry>;

/// Memory entries store
#[derive(Debug)]
pub struct MemoryService {
    store: EntityStore<MemoryEntry>,
}

impl MemoryService {
    /// An empty service
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            store: EntityStore::new("memories", settings),
        }
    }

    /// A service seeded with [`fixtures`]
    pub fn with_fixtures(settings: &StoreSettings) -> Result<Self, ValidationError> {
        let service = Self::new(settings);
        service.store.seed(fixtures())?;
        Ok(service)
    }

    pub fn create(&self, entry: MemoryEntry) -> Result<EntityId, ValidationError> {
        let id = self.store.create(entry)?;
        tracing::info!("Memory stored: {}", id);
        Ok(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<MemoryRecord> {
        self.store.get(id)
    }

    pub fn search(&self, query: &MemoryQuery) -> Result<QueryResult<MemoryEntry>, ValidationError> {
        self.store.query(query)
    }

    pub fn update(
        &self,
        id: &EntityId,
        patch: MemoryPatch,
    ) -> Result<Option<MemoryRecord>, ValidationError> {
        self.store.update(id, patch)
    }

    pub fn delete(&self, id: &EntityId) -> bool {
        let deleted = self.store.delete(id);
        if deleted {
            tracing::info!("Memory deleted: {}", id);
        }
        deleted
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Every entry owned by an agent, in insertion order
    pub fn by_agent(&self, agent_id: &str) -> Vec<MemoryRecord> {
        self.store
            .select(|r| r.data.agent_id.as_deref() == Some(agent_id))
    }

    /// Most recently updated entries first
    pub fn recent(&self, limit: usize) -> Vec<MemoryRecord> {
        let mut records = self.store.list();
        records.sort_by(|a, b| b.updated.cmp(&a.updated));
        records.truncate(limit);
        records
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Seed entries for a fresh service
pub fn fixtures() -> Vec<MemoryEntry> {
    vec![
        MemoryEntry::new(
            "User prefers dark mode",
            "The user switched every dashboard to the dark theme and asked to keep it as default.",
            MemoryType::Personal,
        )
        .with_tag("preferences")
        .with_tag("ui")
        .with_agent("assistant")
        .with_relevance(0.8),
        MemoryEntry::new(
            "Project stack",
            "Codai apps run on Next.js with tRPC routers and Prisma for data access.",
            MemoryType::Project,
        )
        .with_tag("architecture")
        .with_agent("architect")
        .with_relevance(0.9),
        MemoryEntry::new(
            "Deployment window",
            "Production deploys happen on Tuesdays and Thursdays after the QA sign-off.",
            MemoryType::Global,
        )
        .with_tag("process")
        .with_relevance(0.6),
        MemoryEntry::new(
            "Portfolio question",
            "User asked how staking rewards are computed for their ETH position.",
            MemoryType::Conversation,
        )
        .with_tag("defi")
        .with_tag("wallet")
        .with_agent("assistant")
        .with_relevance(0.7),
    ]
}
