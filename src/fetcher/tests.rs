//! Fetcher tests against a local HTTP server

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::{FetcherConfig, MarketConfig};
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Upstream that answers `failures` times with `status`, then with `body`
    #[derive(Clone)]
    struct Flaky {
        hits: Arc<AtomicUsize>,
        failures: usize,
        status: StatusCode,
        body: &'static str,
    }

    impl Flaky {
        fn new(failures: usize, status: StatusCode, body: &'static str) -> Self {
            Self {
                hits: Arc::new(AtomicUsize::new(0)),
                failures,
                status,
                body,
            }
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    async fn flaky_handler(State(flaky): State<Flaky>) -> (StatusCode, &'static str) {
        let n = flaky.hits.fetch_add(1, Ordering::SeqCst);
        if n < flaky.failures {
            (flaky.status, "unavailable")
        } else {
            (StatusCode::OK, flaky.body)
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn open_interest_host(flaky: Flaky) -> String {
        serve(
            Router::new()
                .route("/fapi/v1/openInterest", get(flaky_handler))
                .with_state(flaky),
        )
        .await
    }

    fn fetcher_config(hosts: Vec<String>) -> FetcherConfig {
        FetcherConfig {
            timeout_secs: 5,
            backoff_ms: vec![0, 0, 0],
            futures_hosts: hosts,
            ..FetcherConfig::default()
        }
    }

    fn http_fetcher(config: &FetcherConfig) -> HttpFetcher {
        HttpFetcher::new(config, &MarketConfig::default()).unwrap()
    }

    const OI_BODY: &str = r#"{"symbol":"BTCUSDT","openInterest":"81234.5"}"#;

    #[tokio::test]
    async fn test_transient_retries_same_host() {
        let flaky = Flaky::new(2, StatusCode::SERVICE_UNAVAILABLE, OI_BODY);
        let host = open_interest_host(flaky.clone()).await;

        let fetcher = http_fetcher(&fetcher_config(vec![host]));
        let value = fetcher.fetch(&Resource::OpenInterest).await.unwrap();

        assert_eq!(flaky.hits(), 3);
        assert_eq!(decode::open_interest(&value).unwrap(), 81234.5);
    }

    #[tokio::test]
    async fn test_exhausted_retries_rotate_host() {
        let down = Flaky::new(usize::MAX, StatusCode::BAD_GATEWAY, OI_BODY);
        let up = Flaky::new(0, StatusCode::OK, OI_BODY);
        let hosts = vec![
            open_interest_host(down.clone()).await,
            open_interest_host(up.clone()).await,
        ];

        let fetcher = http_fetcher(&fetcher_config(hosts));
        assert!(fetcher.fetch(&Resource::OpenInterest).await.is_ok());
        assert_eq!(down.hits(), 3);
        assert_eq!(up.hits(), 1);
    }

    #[tokio::test]
    async fn test_geo_block_rotates_without_retry() {
        let blocked = Flaky::new(usize::MAX, StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS, OI_BODY);
        let mirror = Flaky::new(0, StatusCode::OK, OI_BODY);
        let hosts = vec![
            open_interest_host(blocked.clone()).await,
            open_interest_host(mirror.clone()).await,
        ];

        let fetcher = http_fetcher(&fetcher_config(hosts));
        assert!(fetcher.fetch(&Resource::OpenInterest).await.is_ok());
        assert_eq!(blocked.hits(), 1);
        assert_eq!(mirror.hits(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_retried() {
        let html = Flaky::new(0, StatusCode::OK, "<html>blocked</html>");
        let spare = Flaky::new(0, StatusCode::OK, OI_BODY);
        let hosts = vec![
            open_interest_host(html.clone()).await,
            open_interest_host(spare.clone()).await,
        ];

        let fetcher = http_fetcher(&fetcher_config(hosts));
        let err = fetcher.fetch(&Resource::OpenInterest).await.unwrap_err();

        assert!(matches!(err, BotError::Parse(_)));
        assert_eq!(html.hits(), 1);
        assert_eq!(spare.hits(), 0);
    }

    #[tokio::test]
    async fn test_other_status_fails_fast() {
        let missing = Flaky::new(usize::MAX, StatusCode::NOT_FOUND, OI_BODY);
        let spare = Flaky::new(0, StatusCode::OK, OI_BODY);
        let hosts = vec![
            open_interest_host(missing.clone()).await,
            open_interest_host(spare.clone()).await,
        ];

        let fetcher = http_fetcher(&fetcher_config(hosts));
        let err = fetcher.fetch(&Resource::OpenInterest).await.unwrap_err();

        assert!(matches!(err, BotError::Status { status: 404, .. }));
        assert_eq!(missing.hits(), 1);
        assert_eq!(spare.hits(), 0);
    }

    #[tokio::test]
    async fn test_all_hosts_blocked_reports_last_error() {
        let a = Flaky::new(usize::MAX, StatusCode::FORBIDDEN, OI_BODY);
        let b = Flaky::new(usize::MAX, StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS, OI_BODY);
        let hosts = vec![open_interest_host(a.clone()).await, open_interest_host(b.clone()).await];

        let fetcher = http_fetcher(&fetcher_config(hosts));
        let err = fetcher.fetch(&Resource::OpenInterest).await.unwrap_err();

        assert!(matches!(err, BotError::GeoBlocked { status: 451, .. }));
        assert_eq!(a.hits() + b.hits(), 2);
    }

    #[tokio::test]
    async fn test_no_hosts() {
        let fetcher = http_fetcher(&fetcher_config(Vec::new()));
        let err = fetcher.fetch(&Resource::OpenInterest).await.unwrap_err();
        assert!(matches!(err, BotError::NoHosts(_)));
    }

    #[tokio::test]
    async fn test_third_party_url_is_fetched_directly() {
        let feed = Flaky::new(0, StatusCode::OK, r#"{"data":[{"symbol":"BTC","long24h":5}]}"#);
        let base = serve(
            Router::new()
                .route("/liq.json", get(flaky_handler))
                .with_state(feed.clone()),
        )
        .await;

        let config = FetcherConfig {
            liquidation_url: format!("{}/liq.json", base),
            ..fetcher_config(vec!["http://127.0.0.1:1".to_string()])
        };
        let value = http_fetcher(&config).fetch(&Resource::Liquidations).await.unwrap();

        assert_eq!(feed.hits(), 1);
        assert_eq!(decode::liquidations(&value, "BTC").unwrap().long24h, 5.0);
    }

    #[tokio::test]
    async fn test_proxy_relay_wraps_target() {
        async fn relay(Query(params): Query<HashMap<String, String>>) -> axum::Json<serde_json::Value> {
            axum::Json(json!({ "openInterest": "1", "target": params.get("url") }))
        }
        let relay_base = serve(Router::new().route("/relay", get(relay))).await;

        let config = FetcherConfig {
            host_policy: HostPolicyKind::Proxy,
            relay_url: Some(format!("{}/relay", relay_base)),
            ..fetcher_config(vec!["https://fapi.binance.com".to_string()])
        };
        let value = http_fetcher(&config).fetch(&Resource::OpenInterest).await.unwrap();

        assert_eq!(
            value["target"],
            "https://fapi.binance.com/fapi/v1/openInterest?symbol=BTCUSDT"
        );
    }

    #[test]
    fn test_proxy_policy_requires_relay_url() {
        let config = FetcherConfig {
            host_policy: HostPolicyKind::Proxy,
            relay_url: None,
            ..FetcherConfig::default()
        };
        assert!(matches!(
            HttpFetcher::new(&config, &MarketConfig::default()),
            Err(BotError::Config(_))
        ));
    }

    #[test]
    fn test_mirror_candidates_keep_order() {
        let policy = MirrorHosts::new(vec![
            "https://fapi.binance.me/".to_string(),
            "https://fapi.binance.com".to_string(),
        ]);
        assert_eq!(
            policy.candidates("/fapi/v1/openInterest?symbol=BTCUSDT"),
            vec![
                "https://fapi.binance.me/fapi/v1/openInterest?symbol=BTCUSDT",
                "https://fapi.binance.com/fapi/v1/openInterest?symbol=BTCUSDT",
            ]
        );
    }

    #[test]
    fn test_resource_paths() {
        let klines = Resource::Klines {
            interval: Interval::M1,
            limit: 1500,
            window: Some((1_000, 2_000)),
        };
        assert_eq!(
            klines.futures_path("BTCUSDT").unwrap(),
            "/fapi/v1/klines?symbol=BTCUSDT&interval=1m&limit=1500&startTime=1000&endTime=2000"
        );
        assert_eq!(
            Resource::OpenInterestHistory { period: Interval::H1, limit: 24 }
                .futures_path("BTCUSDT")
                .unwrap(),
            "/futures/data/openInterestHist?symbol=BTCUSDT&period=1h&limit=24"
        );
        let first_page = Resource::AggTrades {
            start: 1_000,
            end: 2_000,
            from_id: None,
            limit: 1000,
        };
        assert_eq!(
            first_page.futures_path("BTCUSDT").unwrap(),
            "/fapi/v1/aggTrades?symbol=BTCUSDT&startTime=1000&endTime=2000&limit=1000"
        );
        let next_page = Resource::AggTrades {
            start: 1_000,
            end: 2_000,
            from_id: Some(42),
            limit: 1000,
        };
        assert_eq!(
            next_page.futures_path("BTCUSDT").unwrap(),
            "/fapi/v1/aggTrades?symbol=BTCUSDT&fromId=42&limit=1000"
        );
        assert_eq!(next_page.to_string(), "aggTrades 1000..2000 from #42");
        assert!(Resource::FearGreed.futures_path("BTCUSDT").is_none());
        assert!(Resource::Snapshot("https://x".into()).futures_path("BTCUSDT").is_none());
    }

    #[test]
    fn test_decode_candles() {
        let value = json!([
            [1700000000000i64, "100.0", "110.0", "95.0", "105.0", "12.5", 1700000059999i64, "0", 10, "0", "0", "0"],
            [1700000060000i64, "105.0", "106.0", "101.0", "102.0", "3"]
        ]);
        let candles = decode::candles(&value).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, 1700000000000);
        assert_eq!(candles[0].high, 110.0);
        assert_eq!(candles[1].volume, 3.0);
        assert!(!candles[1].is_bullish());
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(matches!(decode::candles(&json!({"code": -1121})), Err(BotError::Parse(_))));
        assert!(matches!(decode::candles(&json!([[1, "2", "3"]])), Err(BotError::Parse(_))));
        assert!(matches!(decode::open_interest(&json!({})), Err(BotError::Parse(_))));
        assert!(matches!(decode::sentiment(&json!({"data": []})), Err(BotError::Parse(_))));
    }

    #[test]
    fn test_decode_funding_and_oi_history() {
        let funding = decode::funding_samples(&json!([
            {"symbol": "BTCUSDT", "fundingTime": 1, "fundingRate": "0.0001"},
            {"symbol": "BTCUSDT", "fundingTime": 2, "fundingRate": "-0.0002"}
        ]))
        .unwrap();
        assert_eq!(funding[1].funding_rate, -0.0002);

        let history = decode::open_interest_history(&json!([
            {"sumOpenInterest": "100.0"},
            {"sumOpenInterest": "110.0"}
        ]))
        .unwrap();
        assert_eq!(history, vec![100.0, 110.0]);

        let err = decode::open_interest_history(&json!([])).unwrap_err();
        assert_eq!(err.to_string(), "Parse error: openInterestHist: empty");
    }

    #[test]
    fn test_decode_agg_trades() {
        let trades = decode::agg_trades(&json!([
            {"a": 1, "p": "70000.1", "q": "0.5", "T": 10, "m": true},
            {"a": 2, "p": "70000.2", "q": "2.0", "T": 11, "m": false}
        ]))
        .unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[1].id, 2);
        assert_eq!(trades[0].signed_quantity(), -0.5);
        assert_eq!(crate::volume::cumulative_volume_delta(&trades), 1.5);
    }

    #[test]
    fn test_decode_liquidations_missing_row() {
        let value = json!({"data": [{"symbol": "ETH", "long24h": 9}]});
        let snapshot = decode::liquidations(&value, "BTC").unwrap();
        assert_eq!(snapshot, crate::derivatives::LiquidationSnapshot::default());

        let partial = json!({"data": [{"symbol": "BTC", "short24h": "2500000", "long1h": null}]});
        let snapshot = decode::liquidations(&partial, "BTC").unwrap();
        assert_eq!(snapshot.short24h, 2_500_000.0);
        assert_eq!(snapshot.long1h, 0.0);
    }

    #[test]
    fn test_decode_macro_and_sentiment() {
        let global = json!({"data": {
            "total_market_cap": {"usd": 2_413_000_000_000.0f64},
            "market_cap_change_percentage_24h_usd": -1.23456,
            "market_cap_percentage": {"btc": 54.126, "eth": 17.334}
        }});
        let block = decode::macro_block(&global).unwrap();
        assert_eq!(block.total_mcap_t, 2.41);
        assert_eq!(block.mcap24h_pct, -1.23);
        assert_eq!(block.btc_dominance, 54.13);
        assert_eq!(block.eth_dominance, 17.33);

        let fng = json!({"data": [{"value": "72", "value_classification": "Greed"}]});
        assert_eq!(decode::sentiment(&fng).unwrap().fear_greed, "72 · Greed");
    }
}
