//! Volume profile (visible range) and point of control

use crate::types::Candle;
use crate::utils::{lenient_f64, lenient_f64_map, lenient_map};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price bucket width in quote currency
pub const BUCKET_SIZE: f64 = 100.0;

/// Volume by price bucket plus the bucket with the most volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpvrProfile {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub poc: f64,
    #[serde(default, deserialize_with = "lenient_f64_map")]
    pub buckets: BTreeMap<i64, f64>,
}

impl VpvrProfile {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut buckets: BTreeMap<i64, f64> = BTreeMap::new();
        for candle in candles {
            *buckets.entry(bucket_of(candle.typical_price())).or_insert(0.0) += candle.volume;
        }

        Self {
            poc: point_of_control(&buckets).map(|p| p as f64).unwrap_or(0.0),
            buckets,
        }
    }
}

/// Nearest multiple of `BUCKET_SIZE`
pub fn bucket_of(price: f64) -> i64 {
    if !price.is_finite() {
        return 0;
    }
    ((price / BUCKET_SIZE).round() * BUCKET_SIZE) as i64
}

/// Bucket holding the most volume; ties go to the lowest price
pub fn point_of_control(buckets: &BTreeMap<i64, f64>) -> Option<i64> {
    let mut best: Option<(i64, f64)> = None;
    for (&price, &volume) in buckets {
        match best {
            Some((_, top)) if volume <= top => {}
            _ => best = Some((price, volume)),
        }
    }
    best.map(|(price, _)| price)
}

/// Profiles per lookback (`dataF`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpvrBlock {
    #[serde(default, deserialize_with = "lenient_map")]
    pub vpvr: BTreeMap<String, VpvrProfile>,
}

impl VpvrBlock {
    pub fn poc(&self, label: &str) -> f64 {
        self.vpvr.get(label).map(|p| p.poc).unwrap_or(0.0)
    }
}
