//! One evaluation cycle: fetch every block concurrently, then synthesize and score
//!
//! ```text
//!   A[tf] ─┐
//!   B ─────┤
//!   C[tf] ─┤
//!   D ─────┼──▶ snapshot ──▶ E (stress) ──▶ fallback? ──▶ score ──▶ alert
//!   F ─────┤
//!   G ─────┤
//!   H ─────┘
//! ```
//!
//! Each block owns its slot in the snapshot. A failing block records
//! `"<block>: <message>"` in `errors` and leaves its slot empty; nothing
//! escapes the cycle.


use crate::config::{Config, MarketConfig};
use crate::derivatives::{DerivativesBlock, LiquidationSnapshot};
use crate::error::{BotError, Result};
use crate::fetcher::{decode, Fetcher, Resource};
use crate::indicators::{RocPair, TimeframeIndicators};
use crate::scoring::{Alert, AlertGate, ScoringEngine, Verdict};
use crate::snapshot::{DashboardSnapshot, MacroBlock, SentimentBlock};
use crate::stress::StressSynthesizer;
use crate::types::{Candle, Interval, OpenInterestSnapshot};
use crate::volume::{cumulative_volume_delta, time_chunks, VolumeBlock, VOLUME_WINDOWS};
use crate::vpvr::{VpvrBlock, VpvrProfile};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

const MINUTE_MS: i64 = 60_000;

/// VPVR lookbacks: label, interval, bar count
pub const VPVR_LOOKBACKS: [(&str, Interval, u32); 3] = [
    ("4h", Interval::H4, 96),
    ("1d", Interval::D1, 30),
    ("1w", Interval::W1, 12),
];

/// Hourly open-interest history used for the 24h delta
const OI_HISTORY_HOURS: u32 = 24;

/// Failures collected while building the derivatives block
struct DerivativesOutcome {
    block: Result<DerivativesBlock>,
    liquidation_error: Option<BotError>,
}

struct VolumeOutcome {
    block: Result<VolumeBlock>,
    cvd_errors: Vec<(&'static str, BotError)>,
}

/// Snapshot plus what scoring made of it
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub snapshot: DashboardSnapshot,
    pub verdict: Verdict,
    pub alert: Option<Alert>,
}

/// Score a finished snapshot and decide whether it alerts
pub fn assess(snapshot: DashboardSnapshot, engine: &ScoringEngine, gate: &AlertGate) -> CycleOutcome {
    let view = snapshot.view();
    let verdict = engine.evaluate(&view);
    let alert = gate.check_verdict(&verdict);

    match (&verdict, &alert) {
        (Verdict::Scored(score), Some(alert)) => info!(
            long = score.long,
            short = score.short,
            "🚀 {} conviction (score {})",
            alert.direction,
            alert.score
        ),
        (Verdict::Scored(score), None) => info!(
            long = score.long,
            short = score.short,
            "No signal (threshold {})",
            gate.threshold()
        ),
        (Verdict::Gated { stress_index }, _) => info!("No signal, stress {:.2} gated", stress_index),
    }

    CycleOutcome {
        snapshot,
        verdict,
        alert,
    }
}

/// Builds dashboard snapshots from a [`Fetcher`]
pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    market: MarketConfig,
    fallback_url: Option<String>,
    fallback_threshold: usize,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &Config) -> Self {
        Self {
            fetcher,
            market: config.market.clone(),
            fallback_url: config.fetcher.fallback_snapshot_url.clone(),
            fallback_threshold: config.fetcher.fallback_error_threshold,
        }
    }

    pub async fn run_cycle(&self) -> DashboardSnapshot {
        self.run_cycle_at(chrono::Utc::now().timestamp_millis()).await
    }

    /// Run a cycle whose time windows end at `now_ms`
    pub async fn run_cycle_at(&self, now_ms: i64) -> DashboardSnapshot {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", %cycle_id, symbol = %self.market.symbol);

        async move {
            info!("Starting evaluation cycle");
            let snapshot = self.build_snapshot(now_ms).await;
            let snapshot = self.apply_fallback(snapshot).await;
            info!(
                errors = snapshot.errors.len(),
                stress = snapshot.stress_index(),
                "Cycle complete"
            );
            snapshot
        }
        .instrument(span)
        .await
    }

    /// Fetch a published snapshot, e.g. for rescoring
    pub async fn load_snapshot(&self, url: &str) -> Result<DashboardSnapshot> {
        let value = self.fetcher.fetch(&Resource::Snapshot(url.to_string())).await?;
        serde_json::from_value(value).map_err(|e| BotError::Parse(format!("snapshot: {}", e)))
    }

    async fn build_snapshot(&self, now_ms: i64) -> DashboardSnapshot {
        let (indicators, derivatives, momentum, volume, vpvr, market, sentiment) = tokio::join!(
            self.indicator_block(),
            self.derivatives_block(),
            self.momentum_block(),
            self.volume_block(now_ms),
            self.vpvr_block(),
            self.macro_block(),
            self.sentiment_block(),
        );

        let mut snapshot = DashboardSnapshot::default();

        for (tf, result) in indicators {
            match result {
                Ok(set) => {
                    snapshot.indicators.insert(tf.to_string(), set);
                }
                Err(e) => record(&mut snapshot, &format!("A[{}]", tf), e),
            }
        }

        match derivatives.block {
            Ok(block) => snapshot.derivatives = Some(block),
            Err(e) => record(&mut snapshot, "B", e),
        }
        if let Some(e) = derivatives.liquidation_error {
            record(&mut snapshot, "B.liquidations", e);
        }

        for (tf, result) in momentum {
            match result {
                Ok(pair) => {
                    snapshot.momentum.insert(tf.to_string(), pair);
                }
                Err(e) => record(&mut snapshot, &format!("C[{}]", tf), e),
            }
        }

        match volume.block {
            Ok(block) => snapshot.volume = block,
            Err(e) => record(&mut snapshot, "D", e),
        }
        for (label, e) in volume.cvd_errors {
            record(&mut snapshot, &format!("D.cvd[{}]", label), e);
        }

        match vpvr {
            Ok(block) => snapshot.vpvr = Some(block),
            Err(e) => record(&mut snapshot, "F", e),
        }
        match market {
            Ok(block) => snapshot.market = Some(block),
            Err(e) => record(&mut snapshot, "G", e),
        }
        match sentiment {
            Ok(block) => snapshot.sentiment = Some(block),
            Err(e) => record(&mut snapshot, "H", e),
        }

        // E only reads the view, so missing upstream blocks contribute 0
        snapshot.stress = Some(StressSynthesizer::synthesize(&snapshot.view()));
        snapshot.timestamp = now_ms;
        snapshot
    }

    async fn apply_fallback(&self, local: DashboardSnapshot) -> DashboardSnapshot {
        let failed = local.failed_blocks();
        if failed < self.fallback_threshold {
            return local;
        }
        let Some(url) = self.fallback_url.as_deref() else {
            return local;
        };

        warn!(
            "{} failed blocks, falling back to published snapshot at {}",
            failed, url
        );
        match self.load_snapshot(url).await {
            Ok(remote) => remote,
            Err(e) => {
                let mut local = local;
                record(&mut local, "fallback", e);
                local
            }
        }
    }

    async fn fetch_with<T>(&self, resource: Resource, decode: fn(&Value) -> Result<T>) -> Result<T> {
        let value = self.fetcher.fetch(&resource).await?;
        decode(&value)
    }

    async fn klines(&self, interval: Interval, limit: u32) -> Result<Vec<Candle>> {
        self.fetch_with(Resource::klines(interval, limit), decode::candles)
            .await
    }

    /// A: indicator set per dashboard timeframe
    async fn indicator_block(&self) -> Vec<(Interval, Result<TimeframeIndicators>)> {
        join_all(Interval::DASHBOARD.iter().map(|tf| async move {
            let set = self
                .klines(*tf, self.market.candle_limit)
                .await
                .map(|candles| TimeframeIndicators::from_candles(&candles));
            (*tf, set)
        }))
        .await
    }

    /// C: ROC pair per dashboard timeframe
    async fn momentum_block(&self) -> Vec<(Interval, Result<RocPair>)> {
        join_all(Interval::DASHBOARD.iter().map(|tf| async move {
            let pair = self
                .klines(*tf, self.market.roc_limit)
                .await
                .map(|candles| RocPair::from_candles(&candles));
            (*tf, pair)
        }))
        .await
    }

    /// B: funding z-score, OI delta and liquidations
    async fn derivatives_block(&self) -> DerivativesOutcome {
        let funding = self.fetch_with(
            Resource::FundingRates { limit: 1000 },
            decode::funding_samples,
        );
        let current = self.fetch_with(Resource::OpenInterest, decode::open_interest);
        let history = self.fetch_with(
            Resource::OpenInterestHistory {
                period: Interval::H1,
                limit: OI_HISTORY_HOURS,
            },
            decode::open_interest_history,
        );
        let liquidations = async {
            let value = self.fetcher.fetch(&Resource::Liquidations).await?;
            decode::liquidations(&value, &self.market.liquidation_symbol)
        };

        let (core, liquidations) = tokio::join!(
            async { tokio::try_join!(funding, current, history) },
            liquidations
        );

        let (liquidations, liquidation_error) = match liquidations {
            Ok(snapshot) => (snapshot, None),
            Err(e) => (LiquidationSnapshot::default(), Some(e)),
        };

        let block = core.map(|(funding, current, past_hourly)| {
            DerivativesBlock::new(
                &funding,
                &OpenInterestSnapshot {
                    current,
                    past_hourly,
                },
                liquidations,
                self.market.funding_window,
            )
        });

        // A liquidation failure only matters when the block itself survives
        let liquidation_error = if block.is_ok() { liquidation_error } else { None };
        DerivativesOutcome {
            block,
            liquidation_error,
        }
    }

    /// D: volume windows, relative flags and CVD
    async fn volume_block(&self, now_ms: i64) -> VolumeOutcome {
        let day_start = now_ms - 1440 * MINUTE_MS;
        let candles = self.fetch_with(
            Resource::Klines {
                interval: Interval::M1,
                limit: self.market.volume_kline_limit,
                window: Some((day_start, now_ms)),
            },
            decode::candles,
        );
        let cvds = join_all(VOLUME_WINDOWS.iter().map(|(label, minutes)| async move {
            (*label, self.window_cvd(now_ms - minutes * MINUTE_MS, now_ms).await)
        }));

        let (candles, cvds) = tokio::join!(candles, cvds);

        let mut block = match candles {
            Ok(candles) => VolumeBlock::from_candles(&candles, now_ms),
            Err(e) => {
                return VolumeOutcome {
                    block: Err(e),
                    cvd_errors: Vec::new(),
                }
            }
        };

        let mut cvd_errors = Vec::new();
        for (label, result) in cvds {
            match result {
                Ok(cvd) => block.set_cvd(label, cvd),
                Err(e) => {
                    block.set_cvd(label, 0.0);
                    cvd_errors.push((label, e));
                }
            }
        }

        VolumeOutcome {
            block: Ok(block),
            cvd_errors,
        }
    }

    /// Sum CVD over `[start, end]` in spans the exchange will serve
    async fn window_cvd(&self, start: i64, end: i64) -> Result<f64> {
        let span = self.market.trade_chunk_mins * MINUTE_MS;
        let chunks = time_chunks(start, end, span);

        let results = join_all(chunks.into_iter().map(|(from, to)| {
            // Both bounds are inclusive upstream; keep adjacent chunks disjoint
            let to = if to < end { to - 1 } else { to };
            self.chunk_cvd(from, to)
        }))
        .await;

        results.into_iter().sum()
    }

    /// CVD of every trade in `[start, end]`, following trade ids while pages come back full
    async fn chunk_cvd(&self, start: i64, end: i64) -> Result<f64> {
        let limit = self.market.trade_limit;
        let mut from_id = None;
        let mut total = 0.0;

        for _ in 0..self.market.max_trade_pages {
            let trades = self
                .fetch_with(
                    Resource::AggTrades {
                        start,
                        end,
                        from_id,
                        limit,
                    },
                    decode::agg_trades,
                )
                .await?;

            // Pages after the first are id-addressed and may run past the chunk
            let kept = trades
                .iter()
                .position(|t| t.time > end)
                .unwrap_or(trades.len());
            total += cumulative_volume_delta(&trades[..kept]);

            match trades.last() {
                Some(last) if limit > 0 && kept == trades.len() && trades.len() >= limit as usize => {
                    from_id = Some(last.id + 1);
                }
                _ => return Ok(total),
            }
        }

        Err(BotError::Incomplete(format!(
            "aggTrades {}..{} still full after {} pages",
            start, end, self.market.max_trade_pages
        )))
    }

    /// F: volume profile per lookback; any failed lookback fails the block
    async fn vpvr_block(&self) -> Result<VpvrBlock> {
        let profiles = join_all(VPVR_LOOKBACKS.iter().map(|(label, interval, bars)| async move {
            let profile = self
                .klines(*interval, *bars)
                .await
                .map(|candles| VpvrProfile::from_candles(&candles));
            (label.to_string(), profile)
        }))
        .await;

        let mut vpvr = BTreeMap::new();
        for (label, profile) in profiles {
            vpvr.insert(label, profile?);
        }
        Ok(VpvrBlock { vpvr })
    }

    /// G
    async fn macro_block(&self) -> Result<MacroBlock> {
        self.fetch_with(Resource::GlobalMarket, decode::macro_block)
            .await
    }

    /// H
    async fn sentiment_block(&self) -> Result<SentimentBlock> {
        self.fetch_with(Resource::FearGreed, decode::sentiment)
            .await
    }
}

fn record(snapshot: &mut DashboardSnapshot, block: &str, error: BotError) {
    warn!("Block {} failed: {}", block, error);
    snapshot.record_error(block, error);
}
