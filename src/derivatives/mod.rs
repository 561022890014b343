//! Funding, open interest and liquidation analysis (`dataB`)


use crate::types::{FundingSample, OpenInterestSnapshot};
use crate::utils::{lenient_f64, null_as_default, round_dp};
use serde::{Deserialize, Serialize};

/// Funding samples used for the z-score (14 days at 8h cadence)
pub const FUNDING_WINDOW: usize = 42;

/// Dispersion below this is float noise from a flat funding history
const MIN_DISPERSION: f64 = 1e-12;

/// Standardized distance of the latest funding rate from its recent mean.
///
/// Uses the last `window` samples and the population standard deviation.
/// Returns 0 when there is no dispersion to measure.
pub fn funding_z_score(samples: &[FundingSample], window: usize) -> f64 {
    let start = samples.len().saturating_sub(window);
    let rates: Vec<f64> = samples[start..].iter().map(|s| s.funding_rate).collect();
    let last = match rates.last() {
        Some(r) => *r,
        None => return 0.0,
    };

    let n = rates.len() as f64;
    let mean = rates.iter().sum::<f64>() / n;
    let variance = rates.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let sd = variance.sqrt();

    if sd < MIN_DISPERSION || !sd.is_finite() {
        return 0.0;
    }
    round_dp((last - mean) / sd, 2)
}

/// Open interest change over the covered history, in percent
pub fn open_interest_delta(snapshot: &OpenInterestSnapshot) -> f64 {
    match snapshot.past_hourly.first() {
        Some(&oldest) if oldest != 0.0 => {
            round_dp((snapshot.current - oldest) / oldest * 100.0, 1)
        }
        _ => 0.0,
    }
}

/// Liquidated notional by side over 1h/4h/24h
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationSnapshot {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub long1h: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub short1h: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub long4h: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub short4h: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub long24h: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub short24h: f64,
}

impl LiquidationSnapshot {
    /// |long24h − short24h|
    pub fn imbalance_24h(&self) -> f64 {
        (self.long24h - self.short24h).abs()
    }
}

/// Derivatives block (`dataB`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivativesBlock {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub funding_z: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub oi_delta24h: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub liquidations: LiquidationSnapshot,
}

impl DerivativesBlock {
    pub fn new(
        funding: &[FundingSample],
        open_interest: &OpenInterestSnapshot,
        liquidations: LiquidationSnapshot,
        funding_window: usize,
    ) -> Self {
        Self {
            funding_z: funding_z_score(funding, funding_window),
            oi_delta24h: open_interest_delta(open_interest),
            liquidations,
        }
    }
}
