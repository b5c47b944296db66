//! Statistics derived from the live record set

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Entity, Record};
use crate::types::Timestamp;

/// Read-only snapshot rebuilt after every store mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,

    /// Sum of every record's size metric
    pub total_size: f64,

    pub distinct_owners: usize,

    /// Mean score; 0.0 for an empty store
    pub average_score: f64,

    pub by_kind: BTreeMap<String, usize>,

    pub last_updated: Option<Timestamp>,
}

impl StoreStats {
    pub fn compute<'a, E, I>(records: I) -> Self
    where
        E: Entity,
        I: IntoIterator<Item = &'a Record<E>>,
    {
        let records: Vec<&Record<E>> = records.into_iter().collect();
        let total = records.len();
        if total == 0 {
            return Self::default();
        }

        let total_size = records.iter().map(|r| r.data.size()).sum();
        let distinct_owners = records
            .iter()
            .filter_map(|r| r.data.owner())
            .unique()
            .count();
        let score_sum: f64 = records.iter().map(|r| r.data.score()).sum();
        let by_kind = records
            .iter()
            .map(|r| r.data.kind().to_string())
            .counts()
            .into_iter()
            .collect();
        let last_updated = records.iter().map(|r| r.updated).max();

        Self {
            total,
            total_size,
            distinct_owners,
            average_score: score_sum / total as f64,
            by_kind,
            last_updated,
        }
    }
}
