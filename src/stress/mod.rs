//! Synthetic market stress index (`dataE`)
//!
//! Combines four independently capped components:
//! - **bias**: funding z-score magnitude, capped at 3
//! - **leverage**: positive 24h open-interest growth, one point per 5%
//! - **volume**: 15m relative volume flag (very high 2, high 1)
//! - **liquidation**: 24h long/short liquidation imbalance per $1M, capped at 2

use crate::snapshot::SnapshotView;
use crate::utils::{lenient_f64, null_as_default, round_dp};
use crate::volume::RelativeVolumeFlag;
use serde::{Deserialize, Serialize};

pub const BIAS_CAP: f64 = 3.0;
pub const LEVERAGE_STEP_PCT: f64 = 5.0;
pub const LIQUIDATION_CAP: f64 = 2.0;
pub const LIQUIDATION_UNIT_USD: f64 = 1_000_000.0;
pub const HIGH_RISK_LEVEL: f64 = 5.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressComponents {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bias_score: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lev_score: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub vol_score: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub liq_score: f64,
}

impl StressComponents {
    pub fn total(&self) -> f64 {
        self.bias_score + self.lev_score + self.vol_score + self.liq_score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressIndex {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub stress_index: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub high_risk: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub components: StressComponents,
    #[serde(default = "synthetic_source", deserialize_with = "source_or_synthetic")]
    pub source: String,
}

fn synthetic_source() -> String {
    "synthetic".to_string()
}

fn source_or_synthetic<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(synthetic_source))
}

pub fn bias_score(funding_z: f64) -> f64 {
    funding_z.abs().min(BIAS_CAP)
}

pub fn leverage_score(oi_delta_pct: f64) -> f64 {
    (oi_delta_pct / LEVERAGE_STEP_PCT).max(0.0)
}

pub fn volume_score(flag: RelativeVolumeFlag) -> f64 {
    match flag {
        RelativeVolumeFlag::VeryHigh => 2.0,
        RelativeVolumeFlag::High => 1.0,
        _ => 0.0,
    }
}

pub fn liquidation_score(long_24h: f64, short_24h: f64) -> f64 {
    ((long_24h - short_24h).abs() / LIQUIDATION_UNIT_USD).min(LIQUIDATION_CAP)
}

/// Stateless synthesizer over the normalized snapshot view
pub struct StressSynthesizer;

impl StressSynthesizer {
    pub fn components(view: &SnapshotView) -> StressComponents {
        StressComponents {
            bias_score: bias_score(view.funding_z),
            lev_score: leverage_score(view.oi_delta24h),
            vol_score: volume_score(view.relative_15m),
            liq_score: liquidation_score(view.long_liq_24h, view.short_liq_24h),
        }
    }

    pub fn synthesize(view: &SnapshotView) -> StressIndex {
        let components = Self::components(view);
        let total = components.total();
        let total = if total.is_finite() { total } else { 0.0 };

        StressIndex {
            stress_index: round_dp(total, 2),
            high_risk: total >= HIGH_RISK_LEVEL,
            components,
            source: synthetic_source(),
        }
    }
}
