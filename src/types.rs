//! Core market data types shared by every block

use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle interval as understood by the exchange REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Interval {
    /// Timeframes that get a full indicator set and ROC pair
    pub const DASHBOARD: [Interval; 4] = [Interval::M15, Interval::H1, Interval::H4, Interval::D1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, epoch milliseconds
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Column views over a candle sequence
pub trait CandleSeries {
    fn closes(&self) -> Vec<f64>;
    fn highs(&self) -> Vec<f64>;
    fn lows(&self) -> Vec<f64>;
}

impl CandleSeries for [Candle] {
    fn closes(&self) -> Vec<f64> {
        self.iter().map(|c| c.close).collect()
    }

    fn highs(&self) -> Vec<f64> {
        self.iter().map(|c| c.high).collect()
    }

    fn lows(&self) -> Vec<f64> {
        self.iter().map(|c| c.low).collect()
    }
}

/// Aggregated trade print
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    /// Aggregate trade id, increasing with time
    pub id: i64,
    pub time: i64,
    pub price: f64,
    pub quantity: f64,
    /// Buyer was the maker, i.e. the aggressor sold
    pub buyer_is_maker: bool,
}

impl Trade {
    /// Quantity signed by aggressor side
    pub fn signed_quantity(&self) -> f64 {
        if self.buyer_is_maker {
            -self.quantity
        } else {
            self.quantity
        }
    }
}

/// Funding rate print (8h cadence)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingSample {
    pub time: i64,
    pub funding_rate: f64,
}

/// Current open interest plus the hourly history behind it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenInterestSnapshot {
    pub current: f64,
    /// Oldest first
    pub past_hourly: Vec<f64>,
}
