//! Tests for snapshot (de)serialization and normalization

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::volume::RelativeVolumeFlag;
    use serde_json::json;

    fn published_snapshot() -> serde_json::Value {
        json!({
            "dataA": {
                "1h": { "ema50": 70000.0, "ema200": 68000.0, "rsi14": 30.0, "atrPct": 0.8, "macdHist": 5.0 }
            },
            "dataB": {
                "fundingZ": "-2.00",
                "oiDelta24h": "3.4",
                "liquidations": { "long1h": 0, "short1h": 0, "long4h": 0, "short4h": 0, "long24h": 1, "short24h": 10 }
            },
            "dataC": { "1h": { "roc10": 0.5, "roc20": 1.1 } },
            "dataD": {
                "15m": { "bullVol": 120.0, "bearVol": 80.0, "totalVol": 200.0 },
                "cvd": { "15m": 150.0, "1h": 2000.0 },
                "relative": { "15m": "high", "1h": "normal" }
            },
            "dataE": { "stressIndex": 4.0, "highRisk": false, "components": {}, "source": "synthetic" },
            "dataF": { "vpvr": { "4h": { "poc": 69000, "buckets": { "69000": 12.5 } } } },
            "dataG": { "totalMcapT": 2.41, "mcap24hPct": -1.2, "btcDominance": 54.1, "ethDominance": 17.3 },
            "dataH": { "fearGreed": "72 · Greed" },
            "errors": [],
            "timestamp": 1706500000000i64
        })
    }

    #[test]
    fn test_view_from_published_snapshot() {
        let snapshot: DashboardSnapshot = serde_json::from_value(published_snapshot()).unwrap();
        let view = snapshot.view();

        assert_eq!(view.rsi_1h, 30.0);
        assert_eq!(view.macd_hist_1h, 5.0);
        assert_eq!(view.ema50_1h, 70000.0);
        assert_eq!(view.funding_z, -2.0);
        assert_eq!(view.oi_delta24h, 3.4);
        assert_eq!(view.long_liq_24h, 1.0);
        assert_eq!(view.short_liq_24h, 10.0);
        assert_eq!(view.cvd_1h, 2000.0);
        assert_eq!(view.relative_15m, RelativeVolumeFlag::High);
        assert_eq!(view.bull_vol_15m, 120.0);
        assert_eq!(view.bear_vol_15m, 80.0);
        assert_eq!(view.poc_4h, 69000.0);
        assert_eq!(view.stress_index, 4.0);
    }

    #[test]
    fn test_null_blocks_fall_back_to_defaults() {
        let snapshot: DashboardSnapshot = serde_json::from_value(json!({
            "dataA": null, "dataB": null, "dataC": null, "dataD": null,
            "dataE": null, "dataF": null, "dataG": null, "dataH": null,
            "errors": null
        }))
        .unwrap();

        assert!(snapshot.indicators.is_empty());
        assert!(snapshot.derivatives.is_none());
        assert_eq!(snapshot.view(), SnapshotView::default());
    }

    #[test]
    fn test_empty_object_is_valid_snapshot() {
        let snapshot: DashboardSnapshot = serde_json::from_str("{}").unwrap();
        let view = snapshot.view();
        assert_eq!(view.rsi_1h, 50.0);
        assert_eq!(view.relative_15m, RelativeVolumeFlag::Unknown);
        assert_eq!(view.stress_index, 0.0);
    }

    #[test]
    fn test_null_windows_inside_blocks_still_score() {
        let snapshot: DashboardSnapshot = serde_json::from_value(json!({
            "dataA": { "1h": null, "4h": { "rsi14": 40.0 } },
            "dataC": { "1h": null },
            "dataD": { "15m": null, "cvd": { "1h": null }, "relative": { "15m": null } },
            "dataE": { "stressIndex": null, "highRisk": null, "components": null, "source": null },
            "dataF": { "vpvr": { "4h": null } },
            "dataH": { "fearGreed": null },
            "errors": [],
            "timestamp": null
        }))
        .unwrap();

        assert_eq!(snapshot.indicators.len(), 1);
        assert!(snapshot.momentum.is_empty());
        assert!(snapshot.volume.windows.is_empty());
        assert_eq!(snapshot.volume.cvd("1h"), 0.0);
        assert_eq!(snapshot.stress.as_ref().unwrap().source, "synthetic");
        assert!(snapshot.vpvr.as_ref().unwrap().vpvr.is_empty());

        let view = snapshot.view();
        assert_eq!(view, SnapshotView::default());
        let engine = crate::scoring::ScoringEngine::new(&crate::config::ScoringConfig::default());
        let score = engine.score(&view);
        assert_eq!((score.long, score.short), (0, 0));
    }

    #[test]
    fn test_failed_derivatives_block_shape() {
        // Shape written when the funding fetch failed upstream
        let snapshot: DashboardSnapshot = serde_json::from_value(json!({
            "dataB": { "fundingZ": null, "oiDelta24h": null, "liquidations": null }
        }))
        .unwrap();
        let view = snapshot.view();
        assert_eq!(view.funding_z, 0.0);
        assert_eq!(view.long_liq_24h, 0.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut snapshot = DashboardSnapshot::default();
        snapshot.record_error("A[1h]", "HTTP 451 at https://fapi.binance.com");
        let value = serde_json::to_value(&snapshot).unwrap();

        for key in ["dataA", "dataB", "dataC", "dataD", "dataE", "dataF", "dataG", "dataH", "errors", "timestamp"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
        assert!(value["dataB"].is_null());
        assert_eq!(value["errors"][0], "A[1h]: HTTP 451 at https://fapi.binance.com");
    }

    #[test]
    fn test_failed_blocks_groups_sub_block_errors() {
        let mut snapshot = DashboardSnapshot::default();
        assert_eq!(snapshot.failed_blocks(), 0);

        for label in ["15m", "1h", "4h", "24h"] {
            snapshot.record_error(&format!("D.cvd[{}]", label), "Transient failure at x: timeout");
        }
        snapshot.record_error("B", "HTTP 451 (geo-blocked) at x");
        snapshot.record_error("B.liquidations", "Parse error: non-JSON body");
        snapshot.record_error("A[1h]", "HTTP 451 (geo-blocked) at x");
        snapshot.record_error("A[4h]", "HTTP 451 (geo-blocked) at x");

        assert_eq!(snapshot.errors.len(), 8);
        // D, B, A[1h], A[4h]
        assert_eq!(snapshot.failed_blocks(), 4);
    }

    #[test]
    fn test_round_trip_preserves_blocks() {
        let snapshot: DashboardSnapshot = serde_json::from_value(published_snapshot()).unwrap();
        let text = serde_json::to_string(&snapshot).unwrap();
        let back: DashboardSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.sentiment.unwrap().fear_greed, "72 · Greed");
    }
}
