//! Technical indicators over close/high/low series
//!
//! Every function is total: insufficient history yields 0 instead of an error,
//! so a short candle response degrades a block rather than failing it.


use crate::types::{Candle, CandleSeries};
use crate::utils::{lenient_f64, round_dp};
use serde::{Deserialize, Serialize};

pub const EMA_FAST: usize = 50;
pub const EMA_SLOW: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Neutral RSI used when no 1h indicator set is available
pub const RSI_NEUTRAL: f64 = 50.0;

/// Mean of the last `period` values
pub fn sma(series: &[f64], period: usize) -> f64 {
    if period == 0 || series.len() < period {
        return 0.0;
    }
    series[series.len() - period..].iter().sum::<f64>() / period as f64
}

/// Exponential moving average seeded with the SMA of the first `period` values
pub fn ema(series: &[f64], period: usize) -> f64 {
    ema_series(series, period).last().copied().unwrap_or(0.0)
}

/// EMA evaluated on every prefix of `series`.
///
/// Entry `i` equals `ema(&series[..=i], period)`: 0 until the seed window is full.
pub fn ema_series(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut value = series[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = value;

    for i in period..series.len() {
        value = series[i] * k + value * (1.0 - k);
        out[i] = value;
    }
    out
}

/// Wilder RSI; 100 when there were no losses at all
pub fn rsi(series: &[f64], period: usize) -> f64 {
    if period == 0 || series.len() < period + 1 {
        return 0.0;
    }

    let mut up = 0.0;
    let mut down = 0.0;
    for i in 1..=period {
        let delta = series[i] - series[i - 1];
        if delta >= 0.0 {
            up += delta;
        } else {
            down -= delta;
        }
    }

    let p = period as f64;
    let mut avg_gain = up / p;
    let mut avg_loss = down / p;
    for i in (period + 1)..series.len() {
        let delta = series[i] - series[i - 1];
        avg_gain = (avg_gain * (p - 1.0) + delta.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-delta).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Average true range: SMA of the last `period` true ranges
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    let len = highs.len().min(lows.len()).min(closes.len());
    if period == 0 || len < period + 1 {
        return 0.0;
    }

    let true_ranges: Vec<f64> = (1..len)
        .map(|i| {
            let prev_close = closes[i - 1];
            (highs[i] - lows[i])
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        })
        .collect();

    sma(&true_ranges, period)
}

/// MACD(12, 26) line minus its 9-period signal EMA, at the last bar
pub fn macd_histogram(closes: &[f64]) -> f64 {
    if closes.is_empty() {
        return 0.0;
    }

    let fast = ema_series(closes, MACD_FAST);
    let slow = ema_series(closes, MACD_SLOW);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

    let last = line.last().copied().unwrap_or(0.0);
    last - ema(&line, MACD_SIGNAL)
}

/// Percent change between the last value and the one `n` bars earlier
pub fn roc(series: &[f64], n: usize) -> f64 {
    if series.len() < n + 1 {
        return 0.0;
    }
    let current = series[series.len() - 1];
    let prior = series[series.len() - 1 - n];
    if prior == 0.0 {
        return 0.0;
    }
    (current - prior) / prior * 100.0
}

/// Indicator set for one timeframe (`dataA[tf]`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeframeIndicators {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ema50: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub ema200: f64,
    #[serde(default = "neutral_rsi", deserialize_with = "lenient_f64")]
    pub rsi14: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub atr_pct: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub macd_hist: f64,
}

fn neutral_rsi() -> f64 {
    RSI_NEUTRAL
}

impl Default for TimeframeIndicators {
    fn default() -> Self {
        Self {
            ema50: 0.0,
            ema200: 0.0,
            rsi14: RSI_NEUTRAL,
            atr_pct: 0.0,
            macd_hist: 0.0,
        }
    }
}

impl TimeframeIndicators {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let closes = candles.closes();
        let highs = candles.highs();
        let lows = candles.lows();

        let last = match closes.last() {
            Some(c) if *c != 0.0 => *c,
            _ => 1.0,
        };
        let atr_value = atr(&highs, &lows, &closes, ATR_PERIOD);

        Self {
            ema50: round_dp(ema(&closes, EMA_FAST), 2),
            ema200: round_dp(ema(&closes, EMA_SLOW), 2),
            rsi14: round_dp(rsi(&closes, RSI_PERIOD), 1),
            atr_pct: round_dp(atr_value / last * 100.0, 2),
            macd_hist: round_dp(macd_histogram(&closes), 2),
        }
    }
}

/// Rate-of-change pair for one timeframe (`dataC[tf]`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RocPair {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub roc10: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub roc20: f64,
}

impl RocPair {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let closes = candles.closes();
        Self {
            roc10: round_dp(roc(&closes, 10), 2),
            roc20: round_dp(roc(&closes, 20), 2),
        }
    }
}
