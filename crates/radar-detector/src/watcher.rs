use crate::analyzer::ConfidenceAnalyzer;
use crate::config::{AlertPolicy, HeuristicConfig};
use crate::decode::{decode_transfer_log, extract_balance_deltas};
use crate::escalator::AlertEscalator;
use crate::persistence::{Checkpoint, SnapshotStore, WatcherSnapshot};
use crate::pipeline::{ProcessOutcome, TransferPipeline, WatcherStats};
use chrono::Utc;
use lru::LruCache;
use radar_core::error::{Error, Result};
use radar_core::traits::{
    AlertNotifier, ListedTokenFilter, LogSource, SignatureSource, TokenMetadataSource,
};
use radar_core::types::{Chain, ChainAddress, ChainFamily, TransferRecord};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Assinaturas consultadas por carteira a cada ciclo
pub const DEFAULT_SIGNATURE_LIMIT: usize = 10;
/// Transferências processadas entre salvamentos automáticos
pub const SAVE_EVERY: u64 = 10;
const TIMESTAMP_CACHE_SIZE: usize = 4096;

/// Dependências compartilhadas entre watchers
#[derive(Clone, Default)]
pub struct WatcherOptions {
    pub heuristics: HeuristicConfig,
    pub policy: AlertPolicy,
    pub filter: Option<Arc<dyn ListedTokenFilter>>,
    pub notifier: Option<Arc<dyn AlertNotifier>>,
    pub store: Option<Arc<dyn SnapshotStore>>,
    /// Altura inicial para chains de logs; `None` começa no bloco atual
    pub start_height: Option<u64>,
    pub signature_limit: Option<usize>,
}

enum ChainSource {
    LogModel {
        source: Arc<dyn LogSource>,
        last_processed_height: Option<u64>,
        timestamps: LruCache<u64, u64>,
    },
    SignatureScan {
        source: Arc<dyn SignatureSource>,
        limit: usize,
        last_seen: HashMap<ChainAddress, String>,
    },
}

/// Observa as carteiras monitoradas de uma chain e alimenta o pipeline.
pub struct ChainWatcher {
    pipeline: TransferPipeline,
    source: ChainSource,
    store: Option<Arc<dyn SnapshotStore>>,
    wallets: Vec<ChainAddress>,
    unsaved: u64,
}

fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

impl ChainWatcher {
    /// Watcher para chains de logs de eventos (EVM)
    pub fn log_model<S>(
        chain: Chain,
        wallets: impl IntoIterator<Item = ChainAddress>,
        source: Arc<S>,
        options: WatcherOptions,
    ) -> Self
    where
        S: LogSource + TokenMetadataSource + 'static,
    {
        let cache_size = NonZeroUsize::new(TIMESTAMP_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        let log_source: Arc<dyn LogSource> = source.clone();
        let metadata: Arc<dyn TokenMetadataSource> = source;
        let chain_source = ChainSource::LogModel {
            source: log_source,
            last_processed_height: options.start_height.map(|h| h.saturating_sub(1)),
            timestamps: LruCache::new(cache_size),
        };
        Self::build(chain, wallets, chain_source, metadata, options)
    }

    /// Watcher para chains varridas por assinaturas (Solana)
    pub fn signature_scan<S>(
        chain: Chain,
        wallets: impl IntoIterator<Item = ChainAddress>,
        source: Arc<S>,
        options: WatcherOptions,
    ) -> Self
    where
        S: SignatureSource + TokenMetadataSource + 'static,
    {
        let sig_source: Arc<dyn SignatureSource> = source.clone();
        let metadata: Arc<dyn TokenMetadataSource> = source;
        let chain_source = ChainSource::SignatureScan {
            source: sig_source,
            limit: options.signature_limit.unwrap_or(DEFAULT_SIGNATURE_LIMIT),
            last_seen: HashMap::new(),
        };
        Self::build(chain, wallets, chain_source, metadata, options)
    }

    fn build(
        chain: Chain,
        wallets: impl IntoIterator<Item = ChainAddress>,
        source: ChainSource,
        metadata: Arc<dyn TokenMetadataSource>,
        options: WatcherOptions,
    ) -> Self {
        let mut wallets: Vec<ChainAddress> = wallets.into_iter().collect();
        wallets.sort();
        wallets.dedup();

        let escalator = AlertEscalator::new(options.policy, options.notifier);
        let pipeline = TransferPipeline::new(
            chain,
            wallets.clone(),
            ConfidenceAnalyzer::new(options.heuristics),
            escalator,
            options.filter,
            metadata,
        );
        Self { pipeline, source, store: options.store, wallets, unsaved: 0 }
    }

    pub fn chain(&self) -> Chain {
        self.pipeline.chain()
    }

    pub fn family(&self) -> ChainFamily {
        match self.source {
            ChainSource::LogModel { .. } => ChainFamily::LogModel,
            ChainSource::SignatureScan { .. } => ChainFamily::SignatureScan,
        }
    }

    pub fn pipeline(&self) -> &TransferPipeline {
        &self.pipeline
    }

    pub fn stats(&self) -> WatcherStats {
        self.pipeline.stats()
    }

    pub fn last_processed_height(&self) -> Option<u64> {
        match &self.source {
            ChainSource::LogModel { last_processed_height, .. } => *last_processed_height,
            ChainSource::SignatureScan { .. } => None,
        }
    }

    pub fn last_seen_signature(&self, wallet: &ChainAddress) -> Option<&str> {
        match &self.source {
            ChainSource::SignatureScan { last_seen, .. } => last_seen.get(wallet).map(String::as_str),
            ChainSource::LogModel { .. } => None,
        }
    }

    /// Submete uma transferência já normalizada ao pipeline
    pub async fn process_transfer(&mut self, transfer: TransferRecord) -> ProcessOutcome {
        let monitored = self.pipeline.is_monitored(&transfer.to);
        let outcome = self.pipeline.process(transfer).await;
        if monitored {
            self.unsaved += 1;
            if self.unsaved >= SAVE_EVERY {
                self.persist().await;
            }
        }
        outcome
    }

    /// Executa um ciclo de varredura; retorna quantas transferências foram processadas.
    pub async fn tick<F>(&mut self, callback: &mut F) -> Result<usize>
    where
        F: FnMut(&TransferRecord, &ProcessOutcome) + Send,
    {
        match self.family() {
            ChainFamily::LogModel => self.tick_logs(callback).await,
            ChainFamily::SignatureScan => self.tick_signatures(callback).await,
        }
    }

    async fn tick_logs<F>(&mut self, callback: &mut F) -> Result<usize>
    where
        F: FnMut(&TransferRecord, &ProcessOutcome) + Send,
    {
        let (source, last) = match &self.source {
            ChainSource::LogModel { source, last_processed_height, .. } => {
                (source.clone(), *last_processed_height)
            }
            ChainSource::SignatureScan { .. } => return Ok(0),
        };
        let chain = self.chain();

        let head = source.head_height().await?;
        let last = match last {
            Some(last) => last,
            None => {
                info!(chain = %chain, block = head, "Iniciando a partir do bloco atual");
                self.set_height(head);
                return Ok(0);
            }
        };
        if head <= last {
            return Ok(0);
        }

        let (from, to) = (last + 1, head);
        debug!(chain = %chain, from, to, "Verificando blocos");

        let mut processed = 0;
        for wallet in self.wallets.clone() {
            let logs = match source.transfer_logs(&wallet, from, to).await {
                Ok(logs) => logs,
                Err(e) => {
                    warn!(chain = %chain, wallet = %wallet, error = %e, "Falha ao consultar logs da carteira");
                    continue;
                }
            };
            for log in logs {
                let mut transfer = match decode_transfer_log(&log) {
                    Ok(t) => t,
                    Err(e) => {
                        debug!(chain = %chain, error = %e, "Log descartado");
                        continue;
                    }
                };
                transfer.timestamp = Some(self.block_timestamp(&source, transfer.block_height).await);
                let outcome = self.process_transfer(transfer.clone()).await;
                callback(&transfer, &outcome);
                processed += 1;
            }
        }

        self.set_height(head);
        Ok(processed)
    }

    async fn block_timestamp(&mut self, source: &Arc<dyn LogSource>, height: u64) -> u64 {
        if let ChainSource::LogModel { timestamps, .. } = &mut self.source {
            if let Some(ts) = timestamps.get(&height) {
                return *ts;
            }
        }
        match source.block_timestamp(height).await {
            Ok(ts) => {
                if let ChainSource::LogModel { timestamps, .. } = &mut self.source {
                    timestamps.put(height, ts);
                }
                ts
            }
            Err(e) => {
                debug!(chain = %self.chain(), block = height, error = %e, "Timestamp do bloco indisponível, usando relógio local");
                now_secs()
            }
        }
    }

    fn set_height(&mut self, height: u64) {
        if let ChainSource::LogModel { last_processed_height, .. } = &mut self.source {
            *last_processed_height = Some(height);
        }
    }

    async fn tick_signatures<F>(&mut self, callback: &mut F) -> Result<usize>
    where
        F: FnMut(&TransferRecord, &ProcessOutcome) + Send,
    {
        let (source, limit) = match &self.source {
            ChainSource::SignatureScan { source, limit, .. } => (source.clone(), *limit),
            ChainSource::LogModel { .. } => return Ok(0),
        };
        let chain = self.chain();

        let mut processed = 0;
        for wallet in self.wallets.clone() {
            let signatures = match source.recent_signatures(&wallet, limit).await {
                Ok(sigs) => sigs,
                Err(e) => {
                    warn!(chain = %chain, wallet = %wallet, error = %e, "Falha ao consultar assinaturas da carteira");
                    continue;
                }
            };
            let newest = match signatures.first() {
                Some(s) => s.signature.clone(),
                None => continue,
            };

            let last_seen = self.last_seen_signature(&wallet).map(str::to_string);
            let mut fresh: Vec<_> = signatures
                .into_iter()
                .take_while(|s| Some(&s.signature) != last_seen.as_ref())
                .collect();
            fresh.reverse();

            for sig in fresh {
                let tx = match source.transaction(&sig.signature).await {
                    Ok(Some(tx)) => tx,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(chain = %chain, signature = %sig.signature, error = %e, "Falha ao obter transação");
                        continue;
                    }
                };
                for mut transfer in extract_balance_deltas(&tx, &wallet) {
                    if transfer.timestamp.is_none() {
                        transfer.timestamp = Some(now_secs());
                    }
                    let outcome = self.process_transfer(transfer.clone()).await;
                    callback(&transfer, &outcome);
                    processed += 1;
                }
            }

            if let ChainSource::SignatureScan { last_seen, .. } = &mut self.source {
                last_seen.insert(wallet, newest);
            }
        }
        Ok(processed)
    }

    /// Laço de varredura até o cancelamento; o ciclo em andamento sempre termina.
    pub async fn listen(&mut self, poll_interval: Duration, cancel: CancellationToken) -> WatcherStats {
        self.listen_with(poll_interval, |_, _| {}, cancel).await
    }

    pub async fn listen_with<F>(
        &mut self,
        poll_interval: Duration,
        mut callback: F,
        cancel: CancellationToken,
    ) -> WatcherStats
    where
        F: FnMut(&TransferRecord, &ProcessOutcome) + Send,
    {
        let chain = self.chain();
        info!(
            chain = %chain,
            wallets = self.wallets.len(),
            interval_secs = poll_interval.as_secs_f64(),
            "Watcher iniciado"
        );

        while !cancel.is_cancelled() {
            if let Err(e) = self.tick(&mut callback).await {
                warn!(chain = %chain, error = %e, "Ciclo de varredura falhou");
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        self.persist().await;
        let stats = self.stats();
        info!(chain = %chain, ?stats, "Watcher encerrado");
        stats
    }

    pub fn snapshot(&self) -> WatcherSnapshot {
        let checkpoint = match &self.source {
            ChainSource::LogModel { last_processed_height, .. } => Checkpoint::Height {
                last_processed_height: *last_processed_height,
            },
            ChainSource::SignatureScan { last_seen, .. } => Checkpoint::Signatures {
                last_seen: last_seen.clone(),
            },
        };
        WatcherSnapshot {
            chain: self.chain(),
            known_tokens: self.pipeline.known_tokens().clone(),
            buffers: self.pipeline.buffers().clone(),
            stats: self.stats(),
            checkpoint,
            saved_at: Utc::now(),
        }
    }

    pub fn restore(&mut self, snapshot: WatcherSnapshot) {
        match (&mut self.source, snapshot.checkpoint) {
            (
                ChainSource::LogModel { last_processed_height, .. },
                Checkpoint::Height { last_processed_height: saved },
            ) => *last_processed_height = saved.or(*last_processed_height),
            (ChainSource::SignatureScan { last_seen, .. }, Checkpoint::Signatures { last_seen: saved }) => {
                *last_seen = saved
            }
            _ => warn!(chain = %snapshot.chain, "Checkpoint incompatível com a família da chain, ignorado"),
        }
        info!(
            chain = %snapshot.chain,
            tokens = snapshot.buffers.len(),
            saved_at = %snapshot.saved_at,
            "Estado restaurado"
        );
        self.pipeline.restore(snapshot.known_tokens, snapshot.buffers, snapshot.stats);
    }

    /// Carrega o snapshot do store configurado, se houver
    pub fn restore_from_store(&mut self) -> Result<bool> {
        let store = match &self.store {
            Some(store) => store.clone(),
            None => return Ok(false),
        };
        match store.load(self.chain())? {
            Some(snapshot) => {
                self.restore(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Grava o snapshot fora do runtime assíncrono
    async fn persist(&mut self) {
        let store = match &self.store {
            Some(store) => store.clone(),
            None => return,
        };
        let snapshot = self.snapshot();
        let saved = tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .map_err(|e| Error::StorageError(format!("tarefa de gravação abortada: {}", e)))
            .and_then(|r| r);
        match saved {
            Ok(()) => self.unsaved = 0,
            Err(e) => error!(chain = %self.chain(), error = %e, "Falha ao salvar estado"),
        }
    }
}
