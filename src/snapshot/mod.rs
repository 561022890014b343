//! Dashboard snapshot produced by one evaluation cycle
//!
//! The JSON field names (`dataA` … `dataH`) are the published contract that
//! downstream alerting reads. Deserialization is lenient: any block may be
//! `null`, nested fields may be missing, and numbers may arrive as strings.

mod normalize;
#[cfg(test)]
mod tests;

pub use normalize::SnapshotView;

use crate::derivatives::DerivativesBlock;
use crate::indicators::{RocPair, TimeframeIndicators};
use crate::stress::StressIndex;
use crate::utils::{lenient_f64, lenient_map, null_as_default};
use crate::volume::VolumeBlock;
use crate::vpvr::VpvrBlock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Global crypto market figures (`dataG`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroBlock {
    /// Total market cap in trillions of USD
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_mcap_t: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mcap24h_pct: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub btc_dominance: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub eth_dominance: f64,
}

/// Fear & Greed reading (`dataH`), e.g. `"72 · Greed"`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentBlock {
    #[serde(default, deserialize_with = "null_as_default")]
    pub fear_greed: String,
}

/// Everything one cycle knows about the instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    #[serde(rename = "dataA", default, deserialize_with = "lenient_map")]
    pub indicators: BTreeMap<String, TimeframeIndicators>,
    #[serde(rename = "dataB", default)]
    pub derivatives: Option<DerivativesBlock>,
    #[serde(rename = "dataC", default, deserialize_with = "lenient_map")]
    pub momentum: BTreeMap<String, RocPair>,
    #[serde(rename = "dataD", default, deserialize_with = "null_as_default")]
    pub volume: VolumeBlock,
    #[serde(rename = "dataE", default)]
    pub stress: Option<StressIndex>,
    #[serde(rename = "dataF", default)]
    pub vpvr: Option<VpvrBlock>,
    #[serde(rename = "dataG", default)]
    pub market: Option<MacroBlock>,
    #[serde(rename = "dataH", default)]
    pub sentiment: Option<SentimentBlock>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<String>,
    /// Epoch milliseconds the cycle's time windows end at
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
}

impl DashboardSnapshot {
    /// Default-filled view consumed by stress synthesis and scoring
    pub fn view(&self) -> SnapshotView {
        SnapshotView::from_snapshot(self)
    }

    pub fn record_error(&mut self, block: &str, message: impl std::fmt::Display) {
        self.errors.push(format!("{}: {}", block, message));
    }

    /// Number of distinct blocks with a recorded error.
    ///
    /// Per-timeframe entries (`A[1h]`, `C[4h]`) are blocks of their own, while
    /// sub-block entries (`D.cvd[15m]`, `B.liquidations`) count toward their parent.
    pub fn failed_blocks(&self) -> usize {
        self.errors
            .iter()
            .map(|e| {
                let block = e.split_once(':').map_or(e.as_str(), |(block, _)| block);
                block.split_once('.').map_or(block, |(parent, _)| parent)
            })
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Stress index as published, or 0 when the block is missing
    pub fn stress_index(&self) -> f64 {
        self.stress.as_ref().map(|s| s.stress_index).unwrap_or(0.0)
    }
}
