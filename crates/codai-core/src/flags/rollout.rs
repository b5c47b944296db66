//! Deterministic user bucketing for percentage rollouts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of rollout buckets; a bucket is compared against the percentage
pub const BUCKET_COUNT: u32 = 100;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// String hash used to place a user in a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutHash {
    /// 32-bit FNV-1a over UTF-8 bytes
    #[default]
    Fnv1a,

    /// `h = h * 31 + unit` over UTF-16 code units, wrapped to i32, absolute
    /// value. Reproduces bucket assignments made by the web dashboards.
    Polynomial,
}

impl RolloutHash {
    /// Hash the concatenation `user_id + flag_name`
    pub fn hash(self, user_id: &str, flag_name: &str) -> u32 {
        match self {
            RolloutHash::Fnv1a => fnv1a(&[user_id, flag_name]),
            RolloutHash::Polynomial => polynomial(&[user_id, flag_name]),
        }
    }

    /// Bucket in `[0, 100)` for a user/flag pair
    pub fn bucket(self, user_id: &str, flag_name: &str) -> u8 {
        (self.hash(user_id, flag_name) % BUCKET_COUNT) as u8
    }
}

fn fnv1a(parts: &[&str]) -> u32 {
    parts
        .iter()
        .flat_map(|p| p.bytes())
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
        })
}

fn polynomial(parts: &[&str]) -> u32 {
    parts
        .iter()
        .flat_map(|p| p.encode_utf16())
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

impl fmt::Display for RolloutHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RolloutHash::Fnv1a => write!(f, "fnv1a"),
            RolloutHash::Polynomial => write!(f, "polynomial"),
        }
    }
}

impl FromStr for RolloutHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fnv1a" | "fnv-1a" | "fnv" => Ok(RolloutHash::Fnv1a),
            "polynomial" | "poly" | "legacy" => Ok(RolloutHash::Polynomial),
            other => Err(format!("unknown rollout hash: {other}")),
        }
    }
}
