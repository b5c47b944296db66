//! # Keyed Entity Store
//!
//! Process-local collection of domain records keyed by generated ids.
//!
//! ```text
//!   create ──► validate ──► stamp id/created/updated ──┐
//!   update ──► merge patch ──► validate ──► refresh ───┤
//!   delete ──► remove ─────────────────────────────────┤
//!                                                      ▼
//!                                         recompute StoreStats (O(n))
//! ```
//!
//! Records keep insertion order, which is also the tie-break for equal
//! scores in [`EntityStore::query`]. Statistics are rebuilt from the live
//! set after every write instead of being maintained incrementally.
//!
//! ## Example
//!
//! ```rust
//! use codai_core::memory::{MemoryEntry, MemoryType};
//! use codai_core::store::{EntityStore, Query};
//! use codai_core::config::StoreSettings;
//!
//! let store = EntityStore::new("memories", &StoreSettings::default());
//! let id = store
//!     .create(MemoryEntry::new("A", "hello world", MemoryType::Project).with_tag("x"))
//!     .unwrap();
//!
//! let found = store.query(&Query::new().text("hello")).unwrap();
//! assert_eq!(found.total_found, 1);
//! assert_eq!(found.items[0].id, id);
//! ```

pub mod query;
pub mod stats;

pub use query::{Query, QueryResult};
pub use stats::StoreStats;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::config::StoreSettings;
use crate::error::ValidationError;
use crate::types::{now, EntityId, Timestamp};

/// Domain payload managed by an [`EntityStore`]
pub trait Entity: Clone + Send + Sync + 'static {
    /// Closed classification used by kind filters and per-kind counts
    type Kind: Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync;

    /// Partial update merged by [`EntityStore::update`]
    type Patch;

    /// Weak owner reference (agent, wallet, ...), never checked for integrity
    fn owner(&self) -> Option<&str>;

    fn kind(&self) -> Self::Kind;

    /// Fields searched by free-text queries
    fn search_fields(&self) -> Vec<&str>;

    /// Relevance-like score; queries sort on it descending
    fn score(&self) -> f64;

    /// Per-record size metric summed into [`StoreStats::total_size`]
    fn size(&self) -> f64;

    fn apply(&mut self, patch: Self::Patch);

    fn validate(&self) -> Result<(), ValidationError>;
}

/// A stored entity plus the fields the store owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<E> {
    /// Assigned once at creation, never mutated
    pub id: EntityId,

    #[serde(serialize_with = "crate::types::serialize_iso8601")]
    pub created: Timestamp,

    /// Refreshed on every mutation
    #[serde(serialize_with = "crate::types::serialize_iso8601")]
    pub updated: Timestamp,

    #[serde(flatten)]
    pub data: E,
}

struct StoreInner<E> {
    /// Insertion sequence -> record
    records: BTreeMap<u64, Record<E>>,
    index: HashMap<EntityId, u64>,
    next_seq: u64,
    stats: StoreStats,
}

impl<E: Entity> StoreInner<E> {
    fn insert(&mut self, data: E, at: Timestamp) -> EntityId {
        let id = EntityId::generate();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(id.clone(), seq);
        self.records.insert(
            seq,
            Record {
                id: id.clone(),
                created: at,
                updated: at,
                data,
            },
        );
        id
    }

    fn recompute_stats(&mut self) {
        self.stats = StoreStats::compute(self.records.values());
    }
}

/// In-memory keyed store with CRUD, filtered queries and derived statistics
pub struct EntityStore<E: Entity> {
    name: &'static str,
    default_limit: usize,
    max_limit: usize,
    inner: RwLock<StoreInner<E>>,
}

impl<E: Entity> EntityStore<E> {
    pub fn new(name: &'static str, settings: &StoreSettings) -> Self {
        Self {
            name,
            default_limit: settings.default_limit,
            max_limit: settings.max_limit,
            inner: RwLock::new(StoreInner {
                records: BTreeMap::new(),
                index: HashMap::new(),
                next_seq: 0,
                stats: StoreStats::default(),
            }),
        }
    }

    /// Store name used in log output
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Insert a new record and return its generated id
    pub fn create(&self, data: E) -> Result<EntityId, ValidationError> {
        data.validate()?;

        let mut inner = self.inner.write();
        let id = inner.insert(data, now());
        inner.recompute_stats();

        tracing::debug!(store = self.name, %id, "record created");
        Ok(id)
    }

    /// Bulk insert, validating everything before touching the store
    pub fn seed<I>(&self, items: I) -> Result<Vec<EntityId>, ValidationError>
    where
        I: IntoIterator<Item = E>,
    {
        let items: Vec<E> = items.into_iter().collect();
        for item in &items {
            item.validate()?;
        }

        let mut inner = self.inner.write();
        let at = now();
        let ids: Vec<EntityId> = items.into_iter().map(|d| inner.insert(d, at)).collect();
        inner.recompute_stats();

        tracing::info!(store = self.name, count = ids.len(), "store seeded");
        Ok(ids)
    }

    pub fn get(&self, id: &EntityId) -> Option<Record<E>> {
        let inner = self.inner.read();
        let seq = inner.index.get(id)?;
        inner.records.get(seq).cloned()
    }

    /// Filter, rank by score (descending, stable on insertion order) and page.
    ///
    /// Limits above the store maximum are clamped to it; a zero limit is
    /// rejected.
    pub fn query(&self, query: &Query<E::Kind>) -> Result<QueryResult<E>, ValidationError> {
        let limit = query.limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(ValidationError::OutOfRange {
                field: "limit",
                value: 0.0,
                min: 1.0,
                max: self.max_limit as f64,
            });
        }
        let limit = limit.min(self.max_limit);
        let needle = query.needle();

        let inner = self.inner.read();
        let mut matches: Vec<&Record<E>> = inner
            .records
            .values()
            .filter(|r| query.matches(r, needle.as_deref()))
            .collect();
        matches.sort_by(|a, b| b.data.score().total_cmp(&a.data.score()));

        let total_found = matches.len();
        let items: Vec<Record<E>> = matches.into_iter().take(limit).cloned().collect();

        tracing::debug!(
            store = self.name,
            total_found,
            returned = items.len(),
            "query executed"
        );
        Ok(QueryResult { items, total_found })
    }

    /// Merge a patch into an existing record.
    ///
    /// `Ok(None)` when the id is unknown. A patch that would leave the
    /// record invalid is rejected and nothing changes.
    pub fn update(
        &self,
        id: &EntityId,
        patch: E::Patch,
    ) -> Result<Option<Record<E>>, ValidationError> {
        let mut inner = self.inner.write();
        let Some(seq) = inner.index.get(id).copied() else {
            return Ok(None);
        };

        let updated = {
            let Some(record) = inner.records.get_mut(&seq) else {
                return Ok(None);
            };
            let mut data = record.data.clone();
            data.apply(patch);
            data.validate()?;
            record.data = data;
            record.updated = now();
            record.clone()
        };
        inner.recompute_stats();

        tracing::debug!(store = self.name, %id, "record updated");
        Ok(Some(updated))
    }

    /// Remove a record; `false` when the id was not present
    pub fn delete(&self, id: &EntityId) -> bool {
        let mut inner = self.inner.write();
        let Some(seq) = inner.index.remove(id) else {
            return false;
        };
        inner.records.remove(&seq);
        inner.recompute_stats();

        tracing::debug!(store = self.name, %id, "record deleted");
        true
    }

    /// Snapshot of the statistics computed at the last write
    pub fn stats(&self) -> StoreStats {
        self.inner.read().stats.clone()
    }

    /// All records in insertion order
    pub fn list(&self) -> Vec<Record<E>> {
        self.inner.read().records.values().cloned().collect()
    }

    /// Records matching an arbitrary predicate, in insertion order, unpaged
    pub fn select<F>(&self, predicate: F) -> Vec<Record<E>>
    where
        F: Fn(&Record<E>) -> bool,
    {
        self.inner
            .read()
            .records
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.index.clear();
        inner.recompute_stats();
        tracing::info!(store = self.name, "store cleared");
    }
}

impl<E: Entity> fmt::Debug for EntityStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}
