//! Rule-based long/short conviction scoring
//!
//! Each rule adds points to `long`, `short`, or both; rules never exclude each
//! other. The totals are a pure function of the normalized snapshot view.


use crate::config::ScoringConfig;
use crate::snapshot::SnapshotView;
use serde::{Deserialize, Serialize};

pub const RSI_OVERSOLD: f64 = 35.0;
pub const RSI_OVERBOUGHT: f64 = 65.0;
pub const FUNDING_Z_EXTREME: f64 = 1.0;
pub const LIQUIDATION_RATIO: f64 = 2.0;
pub const CVD_THRESHOLD: f64 = 1000.0;
pub const STRESS_BAND: (f64, f64) = (3.0, 5.0);

/// Independent long and short point totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub long: u32,
    pub short: u32,
}

/// Outcome of one scoring pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Stress too high to trust any rule
    Gated { stress_index: f64 },
    Scored(ScoreResult),
}

impl Verdict {
    pub fn score(&self) -> Option<ScoreResult> {
        match self {
            Verdict::Scored(score) => Some(*score),
            Verdict::Gated { .. } => None,
        }
    }
}

/// Which rule fired, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Rsi,
    Macd,
    Funding,
    Liquidations,
    CvdVolume,
    VolumeSplit,
    EmaVsPoc,
    StressBand,
}

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    hard_gate: f64,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl ScoringEngine {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            hard_gate: config.hard_gate,
        }
    }

    /// Apply the hard stress gate, then score
    pub fn evaluate(&self, view: &SnapshotView) -> Verdict {
        if view.stress_index > self.hard_gate {
            tracing::warn!(
                "⛔ Stress index {:.2} above gate {:.2}, scoring suppressed",
                view.stress_index,
                self.hard_gate
            );
            return Verdict::Gated {
                stress_index: view.stress_index,
            };
        }
        Verdict::Scored(self.score(view))
    }

    /// Raw totals without the gate
    pub fn score(&self, view: &SnapshotView) -> ScoreResult {
        let mut result = ScoreResult::default();
        for (rule, long, short) in Self::contributions(view) {
            if long + short > 0 {
                tracing::debug!(?rule, long, short, "rule fired");
            }
            result.long += long;
            result.short += short;
        }
        result
    }

    /// Points each rule awards, in rule order
    pub fn contributions(view: &SnapshotView) -> [(Rule, u32, u32); 8] {
        let v = view;
        let elevated = v.relative_15m.is_elevated();
        let in_band = v.stress_index >= STRESS_BAND.0 && v.stress_index <= STRESS_BAND.1;

        [
            (
                Rule::Rsi,
                pts(v.rsi_1h < RSI_OVERSOLD, 1),
                pts(v.rsi_1h > RSI_OVERBOUGHT, 1),
            ),
            (
                Rule::Macd,
                pts(v.macd_hist_1h > 0.0, 1),
                pts(v.macd_hist_1h < 0.0, 1),
            ),
            (
                Rule::Funding,
                pts(v.funding_z < -FUNDING_Z_EXTREME, 1),
                pts(v.funding_z > FUNDING_Z_EXTREME, 1),
            ),
            // Crowded shorts getting liquidated unwind upward, and vice versa
            (
                Rule::Liquidations,
                pts(v.short_liq_24h > LIQUIDATION_RATIO * v.long_liq_24h, 1),
                pts(v.long_liq_24h > LIQUIDATION_RATIO * v.short_liq_24h, 1),
            ),
            (
                Rule::CvdVolume,
                pts(v.cvd_1h > CVD_THRESHOLD && elevated, 2),
                pts(v.cvd_1h < -CVD_THRESHOLD && elevated, 2),
            ),
            (
                Rule::VolumeSplit,
                pts(v.bull_vol_15m > v.bear_vol_15m, 1),
                pts(v.bear_vol_15m > v.bull_vol_15m, 1),
            ),
            (
                Rule::EmaVsPoc,
                pts(v.ema50_1h > v.poc_4h, 1),
                pts(v.ema50_1h < v.poc_4h, 1),
            ),
            (Rule::StressBand, pts(in_band, 1), pts(in_band, 1)),
        ]
    }
}

fn pts(condition: bool, points: u32) -> u32 {
    if condition {
        points
    } else {
        0
    }
}

/// Trade direction named by an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => f.write_str("LONG"),
            Direction::Short => f.write_str("SHORT"),
        }
    }
}

/// High-conviction signal ready for delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub direction: Direction,
    pub score: u32,
}

impl Alert {
    /// Markdown message body
    pub fn message(&self) -> String {
        format!("🚀 *High‑Conviction {}* (score {})", self.direction, self.score)
    }
}

/// Threshold gate between scoring and notification
#[derive(Debug, Clone)]
pub struct AlertGate {
    threshold: u32,
}

impl AlertGate {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Long wins when both sides reach the threshold
    pub fn check(&self, score: &ScoreResult) -> Option<Alert> {
        if score.long >= self.threshold {
            Some(Alert {
                direction: Direction::Long,
                score: score.long,
            })
        } else if score.short >= self.threshold {
            Some(Alert {
                direction: Direction::Short,
                score: score.short,
            })
        } else {
            None
        }
    }

    /// Gated verdicts never alert
    pub fn check_verdict(&self, verdict: &Verdict) -> Option<Alert> {
        verdict.score().and_then(|score| self.check(&score))
    }
}

impl From<&ScoringConfig> for AlertGate {
    fn from(config: &ScoringConfig) -> Self {
        Self::new(config.threshold)
    }
}
