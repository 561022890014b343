//! Small numeric and serde helpers shared across blocks

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Round to `dp` decimal places the way a decimal printer would.
///
/// Non-finite input collapses to 0 so no NaN ever reaches a snapshot.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0)
}

/// Parse a number that upstream APIs may send as a JSON string
pub fn parse_num(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Deserialize a number, numeric string or null into `f64` (null/garbage → 0)
pub fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(parse_num(&value).unwrap_or(0.0))
}

/// Deserialize a key → number map whose values may be strings or null
pub fn lenient_f64_map<'de, D, K>(
    deserializer: D,
) -> std::result::Result<BTreeMap<K, f64>, D::Error>
where
    D: Deserializer<'de>,
    K: Ord + Deserialize<'de>,
{
    let raw = Option::<BTreeMap<K, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(label, value)| (label, parse_num(&value).unwrap_or(0.0)))
        .collect())
}

/// Deserialize a label → struct map, dropping labels whose value is `null`
pub fn lenient_map<'de, D, T>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let raw = Option::<BTreeMap<String, Option<T>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(label, value)| value.map(|v| (label, v)))
        .collect())
}

/// Treat an explicit JSON `null` like a missing field
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
