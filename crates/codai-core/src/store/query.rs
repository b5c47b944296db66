//! Query filters and result pages

use serde::{Deserialize, Serialize};

use super::{Entity, Record};

/// Conjunction of optional predicates over a store.
///
/// An absent predicate matches everything. Free-text matching is a
/// case-insensitive substring test across the entity's search fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query<K> {
    pub owner: Option<String>,

    pub kind: Option<K>,

    #[serde(rename = "query")]
    pub text: Option<String>,

    /// Page size; the store default applies when absent
    pub limit: Option<usize>,
}

impl<K> Default for Query<K> {
    fn default() -> Self {
        Self {
            owner: None,
            kind: None,
            text: None,
            limit: None,
        }
    }
}

impl<K> Query<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn kind(mut self, kind: K) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Lowercased search text; blank text means no text filter
    pub(crate) fn needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    pub(crate) fn matches<E>(&self, record: &Record<E>, needle: Option<&str>) -> bool
    where
        E: Entity<Kind = K>,
        K: PartialEq,
    {
        if let Some(owner) = &self.owner {
            if record.data.owner() != Some(owner.as_str()) {
                return false;
            }
        }

        if let Some(kind) = &self.kind {
            if record.data.kind() != *kind {
                return false;
            }
        }

        match needle {
            Some(needle) => record
                .data
                .search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(needle)),
            None => true,
        }
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<E> {
    pub items: Vec<Record<E>>,

    /// Matches before truncation to the page size
    pub total_found: usize,
}

impl<E> QueryResult<E> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
