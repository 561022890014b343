//! Configuration management

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    pub telegram: Option<TelegramConfig>,
}

/// Instrument and lookback sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Futures symbol on the exchange
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Row key in the liquidation feed
    #[serde(default = "default_liquidation_symbol")]
    pub liquidation_symbol: String,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,
    #[serde(default = "default_roc_limit")]
    pub roc_limit: u32,
    #[serde(default = "default_funding_window")]
    pub funding_window: usize,
    #[serde(default = "default_volume_kline_limit")]
    pub volume_kline_limit: u32,
    /// Page size for aggregate trade requests
    #[serde(default = "default_trade_limit")]
    pub trade_limit: u32,
    /// Longest span the exchange serves in one aggTrades request
    #[serde(default = "default_trade_chunk_mins")]
    pub trade_chunk_mins: i64,
    /// Most aggTrades pages followed inside one chunk before giving up
    #[serde(default = "default_max_trade_pages")]
    pub max_trade_pages: u32,
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_liquidation_symbol() -> String {
    "BTC".to_string()
}

fn default_candle_limit() -> u32 {
    250
}

fn default_roc_limit() -> u32 {
    21
}

fn default_funding_window() -> usize {
    crate::derivatives::FUNDING_WINDOW
}

fn default_volume_kline_limit() -> u32 {
    1500
}

fn default_trade_limit() -> u32 {
    1000
}

fn default_trade_chunk_mins() -> i64 {
    60
}

fn default_max_trade_pages() -> u32 {
    50
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            liquidation_symbol: default_liquidation_symbol(),
            candle_limit: default_candle_limit(),
            roc_limit: default_roc_limit(),
            funding_window: default_funding_window(),
            volume_kline_limit: default_volume_kline_limit(),
            trade_limit: default_trade_limit(),
            trade_chunk_mins: default_trade_chunk_mins(),
            max_trade_pages: default_max_trade_pages(),
        }
    }
}

/// How a blocked futures host is worked around
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPolicyKind {
    /// Walk the ordered mirror list
    #[default]
    Mirrors,
    /// Send every request through `relay_url`
    Proxy,
}

/// HTTP behaviour and upstream endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay before each attempt on one host; its length is the attempt count
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_futures_hosts")]
    pub futures_hosts: Vec<String>,
    #[serde(default)]
    pub host_policy: HostPolicyKind,
    pub relay_url: Option<String>,
    #[serde(default = "default_liquidation_url")]
    pub liquidation_url: String,
    #[serde(default = "default_global_market_url")]
    pub global_market_url: String,
    #[serde(default = "default_fear_greed_url")]
    pub fear_greed_url: String,
    /// Published snapshot used when the local cycle mostly failed
    pub fallback_snapshot_url: Option<String>,
    #[serde(default = "default_fallback_error_threshold")]
    pub fallback_error_threshold: usize,
}

fn default_timeout_secs() -> u64 {
    12
}

fn default_backoff_ms() -> Vec<u64> {
    vec![0, 2_000, 5_000, 10_000]
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_futures_hosts() -> Vec<String> {
    vec![
        "https://fapi.binance.me".to_string(),
        "https://fapi.binance.com".to_string(),
        "https://fapi2.binance.com".to_string(),
    ]
}

fn default_liquidation_url() -> String {
    "https://raw.githubusercontent.com/Cydeee/Testliquidation/main/data/totalLiquidations.json"
        .to_string()
}

fn default_global_market_url() -> String {
    "https://api.coingecko.com/api/v3/global".to_string()
}

fn default_fear_greed_url() -> String {
    "https://api.alternative.me/fng/?limit=1".to_string()
}

fn default_fallback_error_threshold() -> usize {
    6
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            backoff_ms: default_backoff_ms(),
            user_agent: default_user_agent(),
            futures_hosts: default_futures_hosts(),
            host_policy: HostPolicyKind::default(),
            relay_url: None,
            liquidation_url: default_liquidation_url(),
            global_market_url: default_global_market_url(),
            fear_greed_url: default_fear_greed_url(),
            fallback_snapshot_url: None,
            fallback_error_threshold: default_fallback_error_threshold(),
        }
    }
}

/// Alert threshold and stress gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Stress above this suppresses every signal
    #[serde(default = "default_hard_gate")]
    pub hard_gate: f64,
}

fn default_threshold() -> u32 {
    6
}

fn default_hard_gate() -> f64 {
    7.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            hard_gate: default_hard_gate(),
        }
    }
}

/// Telegram delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_parse_mode() -> String {
    "Markdown".to_string()
}

impl TelegramConfig {
    /// Credentials from `BOT_TOKEN` / `CHAT_ID`, when both are set
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("BOT_TOKEN").ok().filter(|s| !s.is_empty())?;
        let chat_id = std::env::var("CHAT_ID").ok().filter(|s| !s.is_empty())?;
        Some(Self {
            bot_token,
            chat_id,
            api_base: default_api_base(),
            parse_mode: default_parse_mode(),
        })
    }
}

impl Config {
    /// Load from an optional TOML file, then `BTCSIGNAL__*` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let expanded = shellexpand::tilde(path).to_string();
        let exists = Path::new(&expanded).exists();
        if !exists {
            tracing::info!("Config file {} not found, using defaults", expanded);
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&expanded).required(exists))
            .add_source(
                config::Environment::with_prefix("BTCSIGNAL")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("fetcher.futures_hosts")
                    .with_list_parse_key("fetcher.backoff_ms"),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.telegram.is_none() {
            config.telegram = TelegramConfig::from_env();
        }
        Ok(config)
    }
}
