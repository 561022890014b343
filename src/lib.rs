//! BTC Market Stress & Conviction Signal Engine
//!
//! Aggregates futures market data into a dashboard snapshot, synthesizes a
//! stress index and scores long/short conviction.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher (mirrors | relay) → Pipeline (A…H blocks) → Snapshot → Stress (E)
//!                                                                  ↓
//!                                   Notifier ← AlertGate ← ScoringEngine
//! ```

pub mod config;
pub mod derivatives;
pub mod error;
pub mod fetcher;
pub mod indicators;
pub mod notify;
pub mod pipeline;
pub mod scoring;
pub mod snapshot;
pub mod stress;
pub mod types;
pub mod utils;
pub mod volume;
pub mod vpvr;
