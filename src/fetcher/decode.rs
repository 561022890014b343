//! Decoders from raw upstream JSON into typed records
//!
//! Every shape mismatch becomes [`BotError::Parse`].

use crate::derivatives::LiquidationSnapshot;
use crate::error::{BotError, Result};
use crate::snapshot::{MacroBlock, SentimentBlock};
use crate::types::{Candle, FundingSample, Trade};
use crate::utils::{parse_num, round_dp};
use serde_json::Value;

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| BotError::Parse(format!("{}: expected an array", what)))
}

fn number(value: &Value, what: &str) -> Result<f64> {
    parse_num(value).ok_or_else(|| BotError::Parse(format!("{}: expected a number, got {}", what, value)))
}

fn field<'a>(value: &'a Value, key: &str, what: &str) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| BotError::Parse(format!("{}: missing `{}`", what, key)))
}

/// Kline rows `[openTime, open, high, low, close, volume, ...]`
pub fn candles(value: &Value) -> Result<Vec<Candle>> {
    as_array(value, "klines")?
        .iter()
        .map(|row| {
            let cols = as_array(row, "kline row")?;
            if cols.len() < 6 {
                return Err(BotError::Parse(format!(
                    "kline row: expected at least 6 columns, got {}",
                    cols.len()
                )));
            }
            Ok(Candle {
                open_time: number(&cols[0], "kline openTime")? as i64,
                open: number(&cols[1], "kline open")?,
                high: number(&cols[2], "kline high")?,
                low: number(&cols[3], "kline low")?,
                close: number(&cols[4], "kline close")?,
                volume: number(&cols[5], "kline volume")?,
            })
        })
        .collect()
}

/// `[{fundingTime, fundingRate}, ...]`, oldest first
pub fn funding_samples(value: &Value) -> Result<Vec<FundingSample>> {
    as_array(value, "fundingRate")?
        .iter()
        .map(|row| {
            Ok(FundingSample {
                time: row.get("fundingTime").and_then(parse_num).unwrap_or(0.0) as i64,
                funding_rate: number(field(row, "fundingRate", "fundingRate")?, "fundingRate")?,
            })
        })
        .collect()
}

/// `{openInterest}`
pub fn open_interest(value: &Value) -> Result<f64> {
    number(field(value, "openInterest", "openInterest")?, "openInterest")
}

/// `[{sumOpenInterest}, ...]`, oldest first; an empty history is an error
pub fn open_interest_history(value: &Value) -> Result<Vec<f64>> {
    let rows = as_array(value, "openInterestHist")?;
    if rows.is_empty() {
        return Err(BotError::Parse("openInterestHist: empty".to_string()));
    }
    rows.iter()
        .map(|row| number(field(row, "sumOpenInterest", "openInterestHist")?, "sumOpenInterest"))
        .collect()
}

/// `[{a, p, q, m, T}, ...]`, ascending trade id
pub fn agg_trades(value: &Value) -> Result<Vec<Trade>> {
    as_array(value, "aggTrades")?
        .iter()
        .map(|row| {
            Ok(Trade {
                id: number(field(row, "a", "aggTrade")?, "aggTrade a")? as i64,
                time: row.get("T").and_then(parse_num).unwrap_or(0.0) as i64,
                price: row.get("p").and_then(parse_num).unwrap_or(0.0),
                quantity: number(field(row, "q", "aggTrade")?, "aggTrade q")?,
                buyer_is_maker: field(row, "m", "aggTrade")?.as_bool().unwrap_or(false),
            })
        })
        .collect()
}

/// Row for `symbol` in `{data: [{symbol, long1h, ...}]}`; absent row → zeros
pub fn liquidations(value: &Value, symbol: &str) -> Result<LiquidationSnapshot> {
    let rows = match value.get("data") {
        None | Some(Value::Null) => return Ok(LiquidationSnapshot::default()),
        Some(data) => as_array(data, "liquidations.data")?,
    };
    match rows
        .iter()
        .find(|row| row.get("symbol").and_then(Value::as_str) == Some(symbol))
    {
        Some(row) => Ok(serde_json::from_value(row.clone())
            .map_err(|e| BotError::Parse(format!("liquidations row: {}", e)))?),
        None => Ok(LiquidationSnapshot::default()),
    }
}

/// CoinGecko `/global` payload
pub fn macro_block(value: &Value) -> Result<MacroBlock> {
    let data = field(value, "data", "global")?;
    let usd = field(field(data, "total_market_cap", "global")?, "usd", "global.total_market_cap")?;
    let change = field(data, "market_cap_change_percentage_24h_usd", "global")?;
    let shares = field(data, "market_cap_percentage", "global")?;

    Ok(MacroBlock {
        total_mcap_t: round_dp(number(usd, "total_market_cap.usd")? / 1e12, 2),
        mcap24h_pct: round_dp(number(change, "market_cap_change_percentage_24h_usd")?, 2),
        btc_dominance: round_dp(number(field(shares, "btc", "market_cap_percentage")?, "btc")?, 2),
        eth_dominance: round_dp(number(field(shares, "eth", "market_cap_percentage")?, "eth")?, 2),
    })
}

/// alternative.me `fng` payload → `"<value> · <classification>"`
pub fn sentiment(value: &Value) -> Result<SentimentBlock> {
    let entry = value
        .get("data")
        .and_then(|d| d.get(0))
        .ok_or_else(|| BotError::Parse("FNG missing".to_string()))?;

    let reading = match field(entry, "value", "fng")? {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let class = field(entry, "value_classification", "fng")?
        .as_str()
        .unwrap_or_default();

    Ok(SentimentBlock {
        fear_greed: format!("{} · {}", reading, class),
    })
}
