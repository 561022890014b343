//! Volume split, cumulative volume delta and relative volume classification


use crate::types::{Candle, Trade};
use crate::utils::{lenient_f64, lenient_f64_map, lenient_map, null_as_default, round_dp};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Lookback windows for `dataD`, as (label, minutes)
pub const VOLUME_WINDOWS: [(&str, i64); 4] = [("15m", 15), ("1h", 60), ("4h", 240), ("24h", 1440)];

/// Windows classified against the 24h baseline, as (label, share of 24h)
pub const RELATIVE_WINDOWS: [(&str, f64); 3] = [("15m", 96.0), ("1h", 24.0), ("4h", 6.0)];

/// Bullish/bearish volume inside one lookback window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeWindow {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bull_vol: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bear_vol: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_vol: f64,
}

impl VolumeWindow {
    /// Split the volume of candles opened at or after `cutoff_ms`
    pub fn from_candles(candles: &[Candle], cutoff_ms: i64) -> Self {
        let (bull, bear) = candles
            .iter()
            .filter(|c| c.open_time >= cutoff_ms)
            .fold((0.0, 0.0), |(bull, bear), c| {
                if c.is_bullish() {
                    (bull + c.volume, bear)
                } else {
                    (bull, bear + c.volume)
                }
            });

        Self {
            bull_vol: round_dp(bull, 2),
            bear_vol: round_dp(bear, 2),
            total_vol: round_dp(bull + bear, 2),
        }
    }
}

/// Net aggressor volume: sells subtract, buys add
pub fn cumulative_volume_delta(trades: &[Trade]) -> f64 {
    trades.iter().map(Trade::signed_quantity).sum()
}

/// Window volume relative to its share of the 24h total
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum RelativeVolumeFlag {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "very high")]
    VeryHigh,
    /// No volume block was produced
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl<'de> Deserialize<'de> for RelativeVolumeFlag {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(str::trim) {
            Some("low") => RelativeVolumeFlag::Low,
            Some("normal") => RelativeVolumeFlag::Normal,
            Some("high") => RelativeVolumeFlag::High,
            Some("very high") => RelativeVolumeFlag::VeryHigh,
            _ => RelativeVolumeFlag::Unknown,
        })
    }
}

impl RelativeVolumeFlag {
    pub fn classify(ratio: f64) -> Self {
        if ratio > 2.0 {
            RelativeVolumeFlag::VeryHigh
        } else if ratio > 1.2 {
            RelativeVolumeFlag::High
        } else if ratio < 0.5 {
            RelativeVolumeFlag::Low
        } else {
            RelativeVolumeFlag::Normal
        }
    }

    /// High or very high
    pub fn is_elevated(&self) -> bool {
        matches!(self, RelativeVolumeFlag::High | RelativeVolumeFlag::VeryHigh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelativeVolumeFlag::Low => "low",
            RelativeVolumeFlag::Normal => "normal",
            RelativeVolumeFlag::High => "high",
            RelativeVolumeFlag::VeryHigh => "very high",
            RelativeVolumeFlag::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RelativeVolumeFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `total_vol` against `total_24h / share`
pub fn relative_volume(total_vol: f64, total_24h: f64, share: f64) -> RelativeVolumeFlag {
    let baseline = if share > 0.0 { total_24h / share } else { 0.0 };
    RelativeVolumeFlag::classify(total_vol / baseline.max(1.0))
}

/// Volume block (`dataD`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeBlock {
    #[serde(default, deserialize_with = "lenient_f64_map")]
    pub cvd: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relative: BTreeMap<String, RelativeVolumeFlag>,
    /// Per-window volume, keyed by label next to `cvd` and `relative`
    #[serde(flatten, deserialize_with = "lenient_map")]
    pub windows: BTreeMap<String, VolumeWindow>,
}

impl VolumeBlock {
    /// Build every window from one minute-candle set ending at `now_ms`
    pub fn from_candles(candles: &[Candle], now_ms: i64) -> Self {
        let mut block = VolumeBlock::default();
        for (label, minutes) in VOLUME_WINDOWS {
            let cutoff = now_ms - minutes * 60_000;
            block
                .windows
                .insert(label.to_string(), VolumeWindow::from_candles(candles, cutoff));
        }
        block.classify_relative();
        block
    }

    /// Fill `relative` from the current windows
    pub fn classify_relative(&mut self) {
        let total_24h = self.window("24h").total_vol;
        self.relative = RELATIVE_WINDOWS
            .iter()
            .map(|(label, share)| {
                let flag = relative_volume(self.window(label).total_vol, total_24h, *share);
                (label.to_string(), flag)
            })
            .collect();
    }

    pub fn set_cvd(&mut self, label: &str, value: f64) {
        self.cvd.insert(label.to_string(), round_dp(value, 2));
    }

    pub fn window(&self, label: &str) -> VolumeWindow {
        self.windows.get(label).copied().unwrap_or_default()
    }

    pub fn cvd(&self, label: &str) -> f64 {
        self.cvd.get(label).copied().unwrap_or(0.0)
    }

    pub fn relative(&self, label: &str) -> RelativeVolumeFlag {
        self.relative.get(label).copied().unwrap_or_default()
    }
}

/// Split `[start, end]` into consecutive spans no longer than `span_ms`
pub fn time_chunks(start_ms: i64, end_ms: i64, span_ms: i64) -> Vec<(i64, i64)> {
    if end_ms <= start_ms {
        return Vec::new();
    }
    if span_ms <= 0 {
        return vec![(start_ms, end_ms)];
    }

    let mut chunks = Vec::new();
    let mut from = start_ms;
    while from < end_ms {
        let to = (from + span_ms).min(end_ms);
        chunks.push((from, to));
        from = to;
    }
    chunks
}
