mod common;

use common::*;
use radar_core::types::{Chain, TransferRecord};
use radar_detector::{
    ChainWatcher, Checkpoint, JsonSnapshotStore, ProcessOutcome, SnapshotStore, SummaryReport, WatcherOptions,
};
use radar_core::error::Result;
use radar_detector::WatcherSnapshot;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn options(store: Arc<JsonSnapshotStore>) -> WatcherOptions {
    WatcherOptions { store: Some(store), ..Default::default() }
}

#[tokio::test]
async fn snapshot_restores_buffers_stats_and_checkpoint() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonSnapshotStore::open(dir.path()).unwrap());
    let token = contract(0xd1);
    let source = Arc::new(ScriptedLogSource::new(200, StaticMetadata::with(&[(&token, "PER")])));

    let mut watcher = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source.clone(), options(store.clone()));
    watcher.tick(&mut |_: &TransferRecord, _: &ProcessOutcome| {}).await.unwrap();
    for (i, s) in [1u8, 2, 1].iter().enumerate() {
        watcher
            .process_transfer(transfer(&token, &sender(*s), units(10 + i as u64), BASE_TS + i as u64 * 900))
            .await;
    }
    store.save(&watcher.snapshot()).unwrap();

    let raw = std::fs::read_to_string(store.path_for(Chain::Ethereum)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let senders = &json["buffers"][token.as_str()]["senders"];
    assert_eq!(senders.as_array().unwrap().len(), 2);

    let mut restored = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source, options(store.clone()));
    assert!(restored.restore_from_store().unwrap());

    assert_eq!(restored.last_processed_height(), Some(200));
    assert_eq!(restored.stats(), watcher.stats());
    let buffer = restored.pipeline().buffer(&token).unwrap();
    assert_eq!(buffer.transfer_count(), 3);
    assert_eq!(buffer.sender_count(), 2);
    assert!(buffer.is_new());
    assert!(buffer.analysis().is_some());
    assert!(restored.pipeline().known_tokens().contains_key(&token));
}

#[tokio::test]
async fn auto_saves_every_ten_transfers() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonSnapshotStore::open(dir.path()).unwrap());
    let token = contract(0xd2);
    let source = Arc::new(ScriptedLogSource::new(1, StaticMetadata::with(&[(&token, "AUT")])));
    let mut watcher = ChainWatcher::log_model(Chain::Bsc, vec![wallet()], source, options(store.clone()));

    for i in 0..9u64 {
        watcher.process_transfer(transfer(&token, &sender(1), units(i + 1), BASE_TS + i)).await;
    }
    assert!(store.load(Chain::Bsc).unwrap().is_none());

    watcher.process_transfer(transfer(&token, &sender(2), units(99), BASE_TS + 99)).await;
    let saved = store.load(Chain::Bsc).unwrap().unwrap();
    assert_eq!(saved.stats.total_transfers, 10);
    assert_eq!(saved.buffers[&token].transfer_count(), 10);
}

/// Store que anota a thread de cada gravação
struct ThreadTrackingStore {
    inner: JsonSnapshotStore,
    saves: Mutex<Vec<ThreadId>>,
}

impl SnapshotStore for ThreadTrackingStore {
    fn load(&self, chain: Chain) -> Result<Option<WatcherSnapshot>> {
        self.inner.load(chain)
    }

    fn save(&self, snapshot: &WatcherSnapshot) -> Result<()> {
        self.saves.lock().unwrap().push(std::thread::current().id());
        self.inner.save(snapshot)
    }
}

#[tokio::test]
async fn saves_run_off_the_runtime_thread() {
    let dir = tempdir().unwrap();
    let store = Arc::new(ThreadTrackingStore {
        inner: JsonSnapshotStore::open(dir.path()).unwrap(),
        saves: Mutex::new(Vec::new()),
    });
    let token = contract(0xd3);
    let source = Arc::new(ScriptedLogSource::new(1, StaticMetadata::with(&[(&token, "BLK")])));
    let opts = WatcherOptions { store: Some(store.clone()), ..Default::default() };
    let mut watcher = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source, opts);

    for i in 0..10u64 {
        watcher.process_transfer(transfer(&token, &sender(1), units(i + 1), BASE_TS + i)).await;
    }
    let cancel = CancellationToken::new();
    cancel.cancel();
    let stats = watcher.listen(Duration::from_millis(10), cancel).await;

    let runtime_thread = std::thread::current().id();
    let saves = store.saves.lock().unwrap().clone();
    assert_eq!(saves.len(), 2);
    assert!(saves.iter().all(|id| *id != runtime_thread));
    let saved = store.load(Chain::Ethereum).unwrap().unwrap();
    assert_eq!(saved.stats, stats);
}

#[tokio::test]
async fn signature_checkpoint_survives_restart() {
    let dir = tempdir().unwrap();
    let store = Arc::new(JsonSnapshotStore::open(dir.path()).unwrap());
    let wallet = radar_core::types::ChainAddress::new("5tzFkiKscXHK5ZXCGbXZxdw7gTjjD1mBwuoFbhUvuAi9");
    let src = Arc::new(ScriptedSignatureSource::new(StaticMetadata::default()));
    src.push(
        &wallet,
        radar_core::types::RawTransaction {
            signature: "only-sig".into(),
            slot: 1,
            block_time: None,
            pre_token_balances: vec![],
            post_token_balances: vec![],
        },
    );

    let mut watcher = ChainWatcher::signature_scan(Chain::Solana, vec![wallet.clone()], src.clone(), options(store.clone()));
    watcher.tick(&mut |_: &TransferRecord, _: &ProcessOutcome| {}).await.unwrap();
    let snapshot = watcher.snapshot();
    assert!(matches!(snapshot.checkpoint, Checkpoint::Signatures { .. }));
    store.save(&snapshot).unwrap();

    let mut restarted = ChainWatcher::signature_scan(Chain::Solana, vec![wallet.clone()], src.clone(), options(store));
    restarted.restore_from_store().unwrap();
    assert_eq!(restarted.last_seen_signature(&wallet), Some("only-sig"));
    restarted.tick(&mut |_: &TransferRecord, _: &ProcessOutcome| {}).await.unwrap();
    assert_eq!(src.fetched.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn report_from_snapshots_orders_by_confidence() {
    let token_hi = contract(0xe1);
    let token_lo = contract(0xe2);
    let token_wait = contract(0xe3);
    let source = Arc::new(ScriptedLogSource::new(
        1,
        StaticMetadata::with(&[(&token_hi, "HI"), (&token_lo, "LO"), (&token_wait, "WAIT")]),
    ));
    let mut watcher = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source, WatcherOptions::default());

    for (i, (s, amount)) in [(1u8, 1000u64), (2, 500), (3, 2000)].iter().enumerate() {
        watcher
            .process_transfer(transfer(&token_hi, &sender(*s), units(*amount), BASE_TS + i as u64 * 3600))
            .await;
    }
    watcher.process_transfer(transfer(&token_lo, &sender(1), units(5), BASE_TS)).await;
    watcher.process_transfer(transfer(&token_lo, &sender(1), units(5), BASE_TS + 1)).await;
    watcher.process_transfer(transfer(&token_wait, &sender(4), units(1), BASE_TS)).await;

    let snapshot = watcher.snapshot();
    let report = SummaryReport::from_snapshots([&snapshot]);
    let chain = &report.chains[0];
    let symbols: Vec<&str> = chain.candidates.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["HI", "LO", "WAIT"]);
    assert!(chain.candidates[2].confidence.is_none());

    let text = report.render();
    assert!(text.contains("Ethereum"));
    assert!(text.contains("HI: 100.00% de confiança"));
    assert!(text.contains("WAIT: aguardando mais dados"));
    assert_eq!(report.totals().total_transfers, 6);
}
