//! Single place where missing snapshot fields get their defaults

use super::DashboardSnapshot;
use crate::indicators::RSI_NEUTRAL;
use crate::volume::RelativeVolumeFlag;

/// Flat, fully defaulted projection of a snapshot.
///
/// Numerics default to 0 except RSI, which defaults to the neutral 50 so an
/// empty snapshot triggers no oversold rule. Flags default to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotView {
    pub rsi_1h: f64,
    pub macd_hist_1h: f64,
    pub ema50_1h: f64,
    pub funding_z: f64,
    pub oi_delta24h: f64,
    pub long_liq_24h: f64,
    pub short_liq_24h: f64,
    pub cvd_1h: f64,
    pub relative_15m: RelativeVolumeFlag,
    pub bull_vol_15m: f64,
    pub bear_vol_15m: f64,
    pub poc_4h: f64,
    pub stress_index: f64,
}

impl Default for SnapshotView {
    fn default() -> Self {
        Self {
            rsi_1h: RSI_NEUTRAL,
            macd_hist_1h: 0.0,
            ema50_1h: 0.0,
            funding_z: 0.0,
            oi_delta24h: 0.0,
            long_liq_24h: 0.0,
            short_liq_24h: 0.0,
            cvd_1h: 0.0,
            relative_15m: RelativeVolumeFlag::Unknown,
            bull_vol_15m: 0.0,
            bear_vol_15m: 0.0,
            poc_4h: 0.0,
            stress_index: 0.0,
        }
    }
}

impl SnapshotView {
    pub fn from_snapshot(snapshot: &DashboardSnapshot) -> Self {
        let defaults = Self::default();
        let hourly = snapshot.indicators.get("1h");
        let derivatives = snapshot.derivatives.unwrap_or_default();
        let window_15m = snapshot.volume.window("15m");

        let view = Self {
            rsi_1h: hourly.map(|i| i.rsi14).unwrap_or(defaults.rsi_1h),
            macd_hist_1h: hourly.map(|i| i.macd_hist).unwrap_or(defaults.macd_hist_1h),
            ema50_1h: hourly.map(|i| i.ema50).unwrap_or(defaults.ema50_1h),
            funding_z: derivatives.funding_z,
            oi_delta24h: derivatives.oi_delta24h,
            long_liq_24h: derivatives.liquidations.long24h,
            short_liq_24h: derivatives.liquidations.short24h,
            cvd_1h: snapshot.volume.cvd("1h"),
            relative_15m: snapshot.volume.relative("15m"),
            bull_vol_15m: window_15m.bull_vol,
            bear_vol_15m: window_15m.bear_vol,
            poc_4h: snapshot.vpvr.as_ref().map(|v| v.poc("4h")).unwrap_or(0.0),
            stress_index: snapshot.stress_index(),
        };
        view.finite()
    }

    /// Replace any non-finite field with its default
    fn finite(self) -> Self {
        let d = Self::default();
        let pick = |value: f64, fallback: f64| if value.is_finite() { value } else { fallback };
        Self {
            rsi_1h: pick(self.rsi_1h, d.rsi_1h),
            macd_hist_1h: pick(self.macd_hist_1h, d.macd_hist_1h),
            ema50_1h: pick(self.ema50_1h, d.ema50_1h),
            funding_z: pick(self.funding_z, d.funding_z),
            oi_delta24h: pick(self.oi_delta24h, d.oi_delta24h),
            long_liq_24h: pick(self.long_liq_24h, d.long_liq_24h),
            short_liq_24h: pick(self.short_liq_24h, d.short_liq_24h),
            cvd_1h: pick(self.cvd_1h, d.cvd_1h),
            relative_15m: self.relative_15m,
            bull_vol_15m: pick(self.bull_vol_15m, d.bull_vol_15m),
            bear_vol_15m: pick(self.bear_vol_15m, d.bear_vol_15m),
            poc_4h: pick(self.poc_4h, d.poc_4h),
            stress_index: pick(self.stress_index, d.stress_index),
        }
    }
}
