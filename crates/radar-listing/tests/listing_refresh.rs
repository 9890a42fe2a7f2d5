use chrono::{Duration, Utc};
use radar_core::traits::ListedTokenFilter;
use radar_core::types::ChainAddress;
use radar_listing::{ListingIndex, ListingOptions};
use serde_json::json;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USDT_ETH: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
const USDT_BSC: &str = "0x55d398326f99059ff775485246999027b3197955";

async fn mock_sources(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbols": [
                { "symbol": "USDTBRL", "status": "TRADING", "baseAsset": "USDT" },
                { "symbol": "LUNABUSD", "status": "BREAK", "baseAsset": "LUNA" },
                { "symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC" }
            ]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/list"))
        .and(query_param("include_platform", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "tether", "symbol": "usdt", "name": "Tether",
              "platforms": { "ethereum": "0xDAC17F958D2EE523A2206206994597C13D831EC7",
                             "binance-smart-chain": USDT_BSC } },
            { "id": "terra-luna", "symbol": "luna", "name": "Terra",
              "platforms": { "ethereum": "0xd2877702675e6ceb975b4a1dff9fb7baf4c91ea9" } },
            { "id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "platforms": {} }
        ])))
        .mount(server)
        .await;
}

fn options(server: &MockServer, cache: &Path) -> ListingOptions {
    ListingOptions {
        cache_path: cache.to_path_buf(),
        exchange_info_url: format!("{}/api/v3/exchangeInfo", server.uri()),
        coin_list_url: format!("{}/api/v3/coins/list", server.uri()),
        ..Default::default()
    }
}

#[tokio::test]
async fn refresh_maps_trading_contracts_and_writes_cache() {
    let server = MockServer::start().await;
    mock_sources(&server).await;
    let dir = tempdir().unwrap();
    let cache = dir.path().join("listings.json");

    let index = ListingIndex::open(options(&server, &cache)).await;

    let usdt = index.is_listed(&ChainAddress::new(USDT_ETH)).await.unwrap();
    assert_eq!(usdt.symbol, "USDT");
    assert_eq!(usdt.name.as_deref(), Some("Tether"));
    assert!(index.is_listed(&ChainAddress::new(USDT_BSC)).await.is_some());
    // par fora de negociação não entra no índice
    assert!(index.lookup("0xd2877702675e6ceb975b4a1dff9fb7baf4c91ea9").is_none());
    assert!(index.is_symbol_listed("btc"));
    assert!(!index.is_symbol_listed("LUNA"));

    let stats = index.stats();
    assert_eq!(stats.total_tokens, 2);
    assert_eq!(stats.eth_contracts, 1);
    assert_eq!(stats.bsc_contracts, 1);
    assert!(!index.is_stale());

    let saved: serde_json::Value = serde_json::from_slice(&std::fs::read(&cache).unwrap()).unwrap();
    assert_eq!(saved["contract_map"][USDT_ETH], "USDT");
}

#[tokio::test]
async fn fresh_cache_is_used_without_network() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("listings.json");
    std::fs::write(
        &cache,
        serde_json::to_vec(&json!({
            "tokens": { "PEPE": { "symbol": "PEPE", "name": "Pepe" } },
            "contract_map": { "0x6982508145454ce325ddbe47a25d4ec3d2311933": "PEPE" },
            "last_update": Utc::now().to_rfc3339()
        }))
        .unwrap(),
    )
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

    let index = ListingIndex::open(options(&server, &cache)).await;
    let hit = index
        .is_listed(&ChainAddress::new("0x6982508145454CE325DDBE47A25D4EC3D2311933"))
        .await
        .unwrap();
    assert_eq!(hit.symbol, "PEPE");
}

#[tokio::test]
async fn expired_cache_survives_failed_refresh() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("listings.json");
    std::fs::write(
        &cache,
        serde_json::to_vec(&json!({
            "tokens": { "USDT": { "symbol": "USDT" } },
            "contract_map": { USDT_ETH: "USDT" },
            "last_update": (Utc::now() - Duration::hours(48)).to_rfc3339()
        }))
        .unwrap(),
    )
    .unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

    let index = ListingIndex::open(options(&server, &cache)).await;
    assert!(index.is_stale());
    assert!(index.is_listed(&ChainAddress::new(USDT_ETH)).await.is_some());
    assert!(index.refresh().await.is_err());
}

#[tokio::test]
async fn coin_list_failure_keeps_symbols_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbols": [{ "symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/list"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let index = ListingIndex::new(options(&server, &dir.path().join("c.json")));
    assert_eq!(index.refresh().await.unwrap(), 0);
    assert!(index.is_symbol_listed("BTC"));
    assert_eq!(index.stats().eth_contracts, 0);
}

#[tokio::test]
async fn lookups_are_repeatable() {
    let server = MockServer::start().await;
    mock_sources(&server).await;
    let dir = tempdir().unwrap();
    let index = ListingIndex::new(options(&server, &dir.path().join("c.json")));
    index.refresh().await.unwrap();

    let contract = ChainAddress::new(USDT_ETH);
    let first = index.is_listed(&contract).await;
    let second = index.is_listed(&contract).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn slow_sources_time_out_instead_of_blocking_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "symbols": [] }))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let cache = dir.path().join("listings.json");
    let opts = ListingOptions {
        request_timeout: std::time::Duration::from_millis(100),
        ..options(&server, &cache)
    };

    let started = std::time::Instant::now();
    let index = ListingIndex::open(opts).await;
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
    assert_eq!(index.stats().total_tokens, 0);
    assert!(!cache.exists());

    assert!(index.refresh().await.is_err());
}
