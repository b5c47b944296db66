//! Wallet DeFi positions
//!
//! Mock position book backing the wallet app: lending, borrowing, liquidity
//! and staking positions keyed by generated ids and owned by a wallet
//! address. Positions rank by APY.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StoreSettings;
use crate::error::ValidationError;
use crate::store::{Entity, EntityStore, Query, QueryResult, Record, StoreStats};
use crate::types::EntityId;

/// Largest APY accepted, in percent
const MAX_APY: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    Lending,
    Borrowing,
    Liquidity,
    Staking,
}

impl fmt::Display for PositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionKind::Lending => write!(f, "lending"),
            PositionKind::Borrowing => write!(f, "borrowing"),
            PositionKind::Liquidity => write!(f, "liquidity"),
            PositionKind::Staking => write!(f, "staking"),
        }
    }
}

/// A DeFi position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Owning wallet address
    pub wallet: String,

    pub protocol: String,

    pub asset: String,

    pub kind: PositionKind,

    /// Token amount
    pub amount: f64,

    pub value_usd: f64,

    /// Annual percentage yield, in percent
    pub apy: f64,
}

impl Position {
    pub fn new(
        wallet: impl Into<String>,
        protocol: impl Into<String>,
        asset: impl Into<String>,
        kind: PositionKind,
    ) -> Self {
        Self {
            wallet: wallet.into(),
            protocol: protocol.into(),
            asset: asset.into(),
            kind,
            amount: 0.0,
            value_usd: 0.0,
            apy: 0.0,
        }
    }

    pub fn with_amount(mut self, amount: f64, value_usd: f64) -> Self {
        self.amount = amount;
        self.value_usd = value_usd;
        self
    }

    pub fn with_apy(mut self, apy: f64) -> Self {
        self.apy = apy;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionPatch {
    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default)]
    pub value_usd: Option<f64>,

    #[serde(default)]
    pub apy: Option<f64>,
}

impl Entity for Position {
    type Kind = PositionKind;
    type Patch = PositionPatch;

    fn owner(&self) -> Option<&str> {
        Some(&self.wallet)
    }

    fn kind(&self) -> PositionKind {
        self.kind
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.protocol, &self.asset]
    }

    fn score(&self) -> f64 {
        self.apy
    }

    fn size(&self) -> f64 {
        self.value_usd
    }

    fn apply(&mut self, patch: PositionPatch) {
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(value_usd) = patch.value_usd {
            self.value_usd = value_usd;
        }
        if let Some(apy) = patch.apy {
            self.apy = apy;
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        ValidationError::require_text("wallet", &self.wallet)?;
        ValidationError::require_text("protocol", &self.protocol)?;
        ValidationError::require_text("asset", &self.asset)?;
        ValidationError::require_range("amount", self.amount, 0.0, f64::MAX)?;
        ValidationError::require_range("valueUsd", self.value_usd, 0.0, f64::MAX)?;
        ValidationError::require_range("apy", self.apy, -100.0, MAX_APY)
    }
}

pub type PositionRecord = Record<Position>;

/// Aggregate view of one wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub wallet: String,
    pub positions: usize,
    pub total_value_usd: f64,

    /// APY weighted by USD value; 0.0 for an empty or zero-value wallet
    pub weighted_apy: f64,
}

/// Position store
#[derive(Debug)]
pub struct PositionBook {
    store: EntityStore<Position>,
}

impl PositionBook {
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            store: EntityStore::new("positions", settings),
        }
    }

    pub fn with_fixtures(settings: &StoreSettings) -> Result<Self, ValidationError> {
        let book = Self::new(settings);
        book.store.seed(fixtures())?;
        Ok(book)
    }

    pub fn open(&self, position: Position) -> Result<EntityId, ValidationError> {
        let id = self.store.create(position)?;
        tracing::info!("Position opened: {}", id);
        Ok(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<PositionRecord> {
        self.store.get(id)
    }

    pub fn query(
        &self,
        query: &Query<PositionKind>,
    ) -> Result<QueryResult<Position>, ValidationError> {
        self.store.query(query)
    }

    pub fn update(
        &self,
        id: &EntityId,
        patch: PositionPatch,
    ) -> Result<Option<PositionRecord>, ValidationError> {
        self.store.update(id, patch)
    }

    pub fn close(&self, id: &EntityId) -> bool {
        let closed = self.store.delete(id);
        if closed {
            tracing::info!("Position closed: {}", id);
        }
        closed
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn portfolio(&self, wallet: &str) -> Portfolio {
        let positions = self.store.select(|r| r.data.wallet == wallet);
        let total_value_usd: f64 = positions.iter().map(|r| r.data.value_usd).sum();
        let weighted_apy = if total_value_usd > 0.0 {
            positions
                .iter()
                .map(|r| r.data.apy * r.data.value_usd)
                .sum::<f64>()
                / total_value_usd
        } else {
            0.0
        };

        Portfolio {
            wallet: wallet.to_string(),
            positions: positions.len(),
            total_value_usd,
            weighted_apy,
        }
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Demo wallet used by fixtures
pub const DEMO_WALLET: &str = "0x7a16fF8270133F063aAb6C9977183D9e72835428";

pub fn fixtures() -> Vec<Position> {
    vec![
        Position::new(DEMO_WALLET, "Aave", "USDC", PositionKind::Lending)
            .with_amount(5_000.0, 5_000.0)
            .with_apy(4.2),
        Position::new(DEMO_WALLET, "Lido", "ETH", PositionKind::Staking)
            .with_amount(2.5, 8_750.0)
            .with_apy(3.8),
        Position::new(DEMO_WALLET, "Uniswap", "ETH/USDC", PositionKind::Liquidity)
            .with_amount(1.0, 3_200.0)
            .with_apy(12.5),
        Position::new(DEMO_WALLET, "Compound", "DAI", PositionKind::Borrowing)
            .with_amount(1_500.0, 1_500.0)
            .with_apy(-5.1),
    ]
}
