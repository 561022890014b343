//! Resilient JSON fetcher for exchange and third-party endpoints
//!
//! Futures endpoints are resolved through a [`HostPolicy`]; third-party URLs are
//! requested as-is. Each candidate URL gets the configured backoff schedule for
//! transient faults, geo-blocks rotate to the next candidate at once, and parse
//! failures are returned immediately.

pub mod decode;
#[cfg(test)]
mod tests;

use crate::config::{FetcherConfig, HostPolicyKind, MarketConfig};
use crate::error::{BotError, Result};
use crate::types::Interval;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Fallback upstream used behind a relay
pub const DEFAULT_PROXY_UPSTREAM: &str = "https://fapi.binance.com";

/// Everything the pipeline ever asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Klines {
        interval: Interval,
        limit: u32,
        /// Optional `[start, end]` in epoch ms
        window: Option<(i64, i64)>,
    },
    FundingRates {
        limit: u32,
    },
    OpenInterest,
    OpenInterestHistory {
        period: Interval,
        limit: u32,
    },
    /// Trades in `[start, end]`; with `from_id` the page continues from that
    /// trade id instead and the window only bounds what the caller keeps
    AggTrades {
        start: i64,
        end: i64,
        from_id: Option<i64>,
        limit: u32,
    },
    Liquidations,
    GlobalMarket,
    FearGreed,
    /// A published dashboard snapshot
    Snapshot(String),
}

impl Resource {
    pub fn klines(interval: Interval, limit: u32) -> Self {
        Resource::Klines {
            interval,
            limit,
            window: None,
        }
    }

    /// Path and query on a futures host, or `None` for third-party resources
    pub fn futures_path(&self, symbol: &str) -> Option<String> {
        match self {
            Resource::Klines {
                interval,
                limit,
                window,
            } => {
                let mut path = format!(
                    "/fapi/v1/klines?symbol={}&interval={}&limit={}",
                    symbol, interval, limit
                );
                if let Some((start, end)) = window {
                    path.push_str(&format!("&startTime={}&endTime={}", start, end));
                }
                Some(path)
            }
            Resource::FundingRates { limit } => Some(format!(
                "/fapi/v1/fundingRate?symbol={}&limit={}",
                symbol, limit
            )),
            Resource::OpenInterest => Some(format!("/fapi/v1/openInterest?symbol={}", symbol)),
            Resource::OpenInterestHistory { period, limit } => Some(format!(
                "/futures/data/openInterestHist?symbol={}&period={}&limit={}",
                symbol, period, limit
            )),
            Resource::AggTrades {
                start,
                end,
                from_id: None,
                limit,
            } => Some(format!(
                "/fapi/v1/aggTrades?symbol={}&startTime={}&endTime={}&limit={}",
                symbol, start, end, limit
            )),
            Resource::AggTrades {
                from_id: Some(id),
                limit,
                ..
            } => Some(format!(
                "/fapi/v1/aggTrades?symbol={}&fromId={}&limit={}",
                symbol, id, limit
            )),
            Resource::Liquidations
            | Resource::GlobalMarket
            | Resource::FearGreed
            | Resource::Snapshot(_) => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Klines { interval, limit, .. } => write!(f, "klines {} x{}", interval, limit),
            Resource::FundingRates { limit } => write!(f, "funding rates x{}", limit),
            Resource::OpenInterest => f.write_str("open interest"),
            Resource::OpenInterestHistory { period, limit } => {
                write!(f, "open interest history {} x{}", period, limit)
            }
            Resource::AggTrades {
                start,
                end,
                from_id: None,
                ..
            } => write!(f, "aggTrades {}..{}", start, end),
            Resource::AggTrades {
                start,
                end,
                from_id: Some(id),
                ..
            } => write!(f, "aggTrades {}..{} from #{}", start, end, id),
            Resource::Liquidations => f.write_str("liquidations"),
            Resource::GlobalMarket => f.write_str("global market"),
            Resource::FearGreed => f.write_str("fear & greed"),
            Resource::Snapshot(url) => write!(f, "snapshot {}", url),
        }
    }
}

/// Source of JSON documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value>;
}

/// Turns a futures API path into the ordered URLs worth trying
pub trait HostPolicy: Send + Sync {
    fn candidates(&self, path: &str) -> Vec<String>;
}

/// Ordered list of mirror hosts
#[derive(Debug, Clone)]
pub struct MirrorHosts {
    hosts: Vec<String>,
}

impl MirrorHosts {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.trim_end_matches('/').to_string())
                .collect(),
        }
    }
}

impl HostPolicy for MirrorHosts {
    fn candidates(&self, path: &str) -> Vec<String> {
        self.hosts.iter().map(|h| format!("{}{}", h, path)).collect()
    }
}

/// Single relay that forwards `?url=<target>` upstream
#[derive(Debug, Clone)]
pub struct ProxyRelay {
    relay_url: String,
    upstream: String,
}

impl ProxyRelay {
    pub fn new(relay_url: &str, upstream: &str) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            upstream: upstream.trim_end_matches('/').to_string(),
        }
    }
}

impl HostPolicy for ProxyRelay {
    fn candidates(&self, path: &str) -> Vec<String> {
        let target = format!("{}{}", self.upstream, path);
        match Url::parse_with_params(&self.relay_url, &[("url", target.as_str())]) {
            Ok(url) => vec![url.to_string()],
            Err(e) => {
                warn!("Invalid relay URL {}: {}", self.relay_url, e);
                Vec::new()
            }
        }
    }
}

/// Third-party endpoints outside the futures API
#[derive(Debug, Clone)]
struct Endpoints {
    liquidations: String,
    global_market: String,
    fear_greed: String,
}

/// reqwest-backed [`Fetcher`]
pub struct HttpFetcher {
    http: Client,
    symbol: String,
    policy: Box<dyn HostPolicy>,
    backoff: Vec<Duration>,
    endpoints: Endpoints,
}

impl HttpFetcher {
    pub fn new(fetcher: &FetcherConfig, market: &MarketConfig) -> Result<Self> {
        let policy: Box<dyn HostPolicy> = match fetcher.host_policy {
            HostPolicyKind::Mirrors => Box::new(MirrorHosts::new(fetcher.futures_hosts.clone())),
            HostPolicyKind::Proxy => {
                let relay = fetcher.relay_url.as_deref().ok_or_else(|| {
                    config::ConfigError::Message(
                        "fetcher.relay_url is required when host_policy = \"proxy\"".to_string(),
                    )
                })?;
                let upstream = fetcher
                    .futures_hosts
                    .first()
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_PROXY_UPSTREAM);
                Box::new(ProxyRelay::new(relay, upstream))
            }
        };
        Self::with_policy(fetcher, market, policy)
    }

    pub fn with_policy(
        fetcher: &FetcherConfig,
        market: &MarketConfig,
        policy: Box<dyn HostPolicy>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(fetcher.timeout_secs))
            .user_agent(fetcher.user_agent.clone())
            .build()?;

        let mut backoff: Vec<Duration> = fetcher
            .backoff_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect();
        if backoff.is_empty() {
            backoff.push(Duration::ZERO);
        }

        Ok(Self {
            http,
            symbol: market.symbol.clone(),
            policy,
            backoff,
            endpoints: Endpoints {
                liquidations: fetcher.liquidation_url.clone(),
                global_market: fetcher.global_market_url.clone(),
                fear_greed: fetcher.fear_greed_url.clone(),
            },
        })
    }

    fn candidates(&self, resource: &Resource) -> Vec<String> {
        if let Some(path) = resource.futures_path(&self.symbol) {
            return self.policy.candidates(&path);
        }
        let url = match resource {
            Resource::Liquidations => self.endpoints.liquidations.clone(),
            Resource::GlobalMarket => self.endpoints.global_market.clone(),
            Resource::FearGreed => self.endpoints.fear_greed.clone(),
            Resource::Snapshot(url) => url.clone(),
            _ => return Vec::new(),
        };
        vec![url]
    }

    /// Run the backoff schedule against one URL
    async fn fetch_from(&self, url: &str) -> Result<serde_json::Value> {
        let mut last_error = None;
        for (attempt, delay) in self.backoff.iter().enumerate() {
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            match self.get_json(url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(attempt = attempt + 1, "Transient failure: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| BotError::NoHosts(url.to_string())))
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        debug!("GET {}", url);
        let transient = |e: reqwest::Error| BotError::Transient {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let resp = self.http.get(url).send().await.map_err(transient)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BotError::from_status(status.as_u16(), url));
        }

        let body = resp.text().await.map_err(transient)?;
        serde_json::from_str(&body)
            .map_err(|e| BotError::Parse(format!("non-JSON body from {}: {}", url, e)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, resource: &Resource) -> Result<serde_json::Value> {
        let candidates = self.candidates(resource);
        let mut last_error = None;

        for url in &candidates {
            match self.fetch_from(url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() || e.is_geo_blocked() => {
                    warn!("{} failed on {}, rotating host: {}", resource, url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| BotError::NoHosts(resource.to_string())))
    }
}
