mod common;

use common::*;
use radar_core::types::{Chain, ChainAddress, ChainFamily, RawLog};
use radar_core::utils::transfer_event_topic;
use radar_detector::{ChainWatcher, ProcessOutcome, WatcherOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn noop() -> impl FnMut(&radar_core::types::TransferRecord, &ProcessOutcome) + Send {
    |_, _| {}
}

#[tokio::test]
async fn first_tick_starts_at_head_without_backfill() {
    let token = contract(0xc1);
    let source = Arc::new(ScriptedLogSource::new(100, StaticMetadata::with(&[(&token, "LOG")])));
    source.push_transfer(&token, &sender(1), &wallet(), units(10), 95);

    let mut watcher = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source.clone(), WatcherOptions::default());
    assert_eq!(watcher.family(), ChainFamily::LogModel);

    let processed = watcher.tick(&mut noop()).await.unwrap();
    assert_eq!(processed, 0);
    assert_eq!(watcher.last_processed_height(), Some(100));
    assert!(source.queried_ranges.lock().unwrap().is_empty());
    assert_eq!(watcher.stats().total_transfers, 0);
}

#[tokio::test]
async fn processes_new_range_and_moves_checkpoint() {
    let token = contract(0xc2);
    let mut source = ScriptedLogSource::new(100, StaticMetadata::with(&[(&token, "LOG")]));
    source.timestamps.insert(101, BASE_TS);
    let source = Arc::new(source);

    let mut watcher = ChainWatcher::log_model(Chain::Bsc, vec![wallet()], source.clone(), WatcherOptions::default());
    watcher.tick(&mut noop()).await.unwrap();

    source.push_transfer(&token, &sender(1), &wallet(), units(10), 101);
    source.push_transfer(&token, &sender(2), &wallet(), units(20), 103);
    source.push_transfer(&token, &sender(3), &sender(9), units(30), 103);
    source.set_head(103);

    let mut seen = Vec::new();
    let processed = watcher
        .tick(&mut |t: &radar_core::types::TransferRecord, _: &ProcessOutcome| seen.push(t.clone()))
        .await
        .unwrap();

    assert_eq!(processed, 2);
    assert_eq!(watcher.last_processed_height(), Some(103));
    assert_eq!(
        source.queried_ranges.lock().unwrap().as_slice(),
        &[(wallet(), 101, 103)]
    );
    assert_eq!(seen[0].timestamp, Some(BASE_TS));
    // sem timestamp conhecido para o bloco 103: relógio local
    assert!(seen[1].timestamp.unwrap() > BASE_TS);
    assert_eq!(watcher.stats().total_transfers, 2);
    assert_eq!(watcher.pipeline().buffer(&token).unwrap().transfer_count(), 2);

    // sem blocos novos, nada é consultado
    watcher.tick(&mut noop()).await.unwrap();
    assert_eq!(source.queried_ranges.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failing_wallet_does_not_abort_tick() {
    let token = contract(0xc3);
    let bad = ChainAddress::from(ethereum_types::Address::repeat_byte(0x0f));
    let mut source = ScriptedLogSource::new(10, StaticMetadata::with(&[(&token, "LOG")]));
    source.failing_wallets.insert(bad.clone());
    let source = Arc::new(source);

    let mut watcher = ChainWatcher::log_model(
        Chain::Ethereum,
        vec![bad.clone(), wallet()],
        source.clone(),
        WatcherOptions::default(),
    );
    watcher.tick(&mut noop()).await.unwrap();

    source.push_transfer(&token, &sender(1), &wallet(), units(1), 11);
    source.set_head(12);
    let processed = watcher.tick(&mut noop()).await.unwrap();

    assert_eq!(processed, 1);
    assert_eq!(watcher.last_processed_height(), Some(12));
    assert_eq!(source.queried_ranges.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_log_is_dropped_alone() {
    let token = contract(0xc4);
    let source = Arc::new(ScriptedLogSource::new(50, StaticMetadata::with(&[(&token, "LOG")])));
    let mut watcher = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source.clone(), WatcherOptions::default());
    watcher.tick(&mut noop()).await.unwrap();

    source.push_transfer(&token, &sender(1), &wallet(), units(3), 51);
    let mut broken = source.logs.lock().unwrap()[0].clone();
    broken.data.truncate(8);
    source.push_raw(RawLog { block_number: Some(51), ..broken });
    source.set_head(51);

    let processed = watcher.tick(&mut noop()).await.unwrap();
    assert_eq!(processed, 1);
    assert_eq!(watcher.stats().total_transfers, 1);
}

#[tokio::test]
async fn explicit_start_height_backfills_from_there() {
    let token = contract(0xc5);
    let source = Arc::new(ScriptedLogSource::new(30, StaticMetadata::with(&[(&token, "LOG")])));
    source.push_transfer(&token, &sender(1), &wallet(), units(3), 25);

    let options = WatcherOptions { start_height: Some(20), ..Default::default() };
    let mut watcher = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source.clone(), options);
    let processed = watcher.tick(&mut noop()).await.unwrap();

    assert_eq!(processed, 1);
    assert_eq!(source.queried_ranges.lock().unwrap()[0], (wallet(), 20, 30));
}

#[tokio::test]
async fn listen_stops_on_cancellation() {
    let token = contract(0xc6);
    let source = Arc::new(ScriptedLogSource::new(1, StaticMetadata::with(&[(&token, "LOG")])));
    let mut watcher = ChainWatcher::log_model(Chain::Ethereum, vec![wallet()], source.clone(), WatcherOptions::default());

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    let feeder = source.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        feeder.push_transfer(&token, &sender(1), &wallet(), units(1), 2);
        feeder.set_head(2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        stopper.cancel();
    });

    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        watcher.listen(Duration::from_millis(10), cancel),
    )
    .await
    .expect("listen deve terminar após o cancelamento");

    assert_eq!(stats.total_transfers, 1);
    assert_eq!(watcher.last_processed_height(), Some(2));
}

#[test]
fn transfer_topic_used_by_scripted_logs() {
    let source = ScriptedLogSource::new(0, StaticMetadata::default());
    source.push_transfer(&contract(1), &sender(2), &wallet(), units(1), 1);
    assert_eq!(source.logs.lock().unwrap()[0].topics[0], transfer_event_topic());
}
