use crate::buffer::ContractBuffer;
use crate::persistence::WatcherSnapshot;
use crate::pipeline::WatcherStats;
use crate::watcher::ChainWatcher;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use radar_core::types::{Chain, ChainAddress, RiskLevel, TokenDescriptor};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Candidatos exibidos por chain no relatório
pub const REPORT_TOP_N: usize = 5;

/// Linha do relatório para um contrato não listado
#[derive(Debug, Clone)]
pub struct CandidateSummary {
    pub contract: ChainAddress,
    pub symbol: String,
    pub name: String,
    pub transfer_count: usize,
    pub sender_count: usize,
    pub confidence: Option<f64>,
    pub risk_level: Option<RiskLevel>,
    pub first_seen: Option<DateTime<Utc>>,
    pub alert_sent: bool,
}

/// Resumo de uma chain
#[derive(Debug, Clone)]
pub struct ChainSummary {
    pub chain: Chain,
    pub stats: WatcherStats,
    /// Contratos `is_new`, por confiança decrescente
    pub candidates: Vec<CandidateSummary>,
}

impl ChainSummary {
    pub fn build(
        chain: Chain,
        stats: WatcherStats,
        buffers: &HashMap<ChainAddress, ContractBuffer>,
        known_tokens: &HashMap<ChainAddress, TokenDescriptor>,
    ) -> Self {
        let mut candidates: Vec<CandidateSummary> = buffers
            .values()
            .filter(|b| b.is_new())
            .map(|b| {
                let token = known_tokens.get(b.contract());
                CandidateSummary {
                    contract: b.contract().clone(),
                    symbol: token.map(|t| t.symbol.clone()).unwrap_or_else(|| "UNKNOWN".to_string()),
                    name: token.map(|t| t.name.clone()).unwrap_or_default(),
                    transfer_count: b.transfer_count(),
                    sender_count: b.sender_count(),
                    confidence: b.analysis().map(|a| a.confidence),
                    risk_level: b.analysis().map(|a| a.risk_level),
                    first_seen: b.first_seen(),
                    alert_sent: b.alert_sent(),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            let ca = a.confidence.unwrap_or(-1.0);
            let cb = b.confidence.unwrap_or(-1.0);
            cb.total_cmp(&ca).then_with(|| a.contract.cmp(&b.contract))
        });

        Self { chain, stats, candidates }
    }
}

/// Relatório consolidado de todas as chains
#[derive(Debug, Clone, Default)]
pub struct SummaryReport {
    pub chains: Vec<ChainSummary>,
}

impl SummaryReport {
    pub fn from_watchers<'a>(watchers: impl IntoIterator<Item = &'a ChainWatcher>) -> Self {
        let mut chains: Vec<ChainSummary> = watchers
            .into_iter()
            .map(|w| {
                ChainSummary::build(
                    w.chain(),
                    w.stats(),
                    w.pipeline().buffers(),
                    w.pipeline().known_tokens(),
                )
            })
            .collect();
        chains.sort_by_key(|c| c.chain);
        Self { chains }
    }

    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a WatcherSnapshot>) -> Self {
        let mut chains: Vec<ChainSummary> = snapshots
            .into_iter()
            .map(|s| ChainSummary::build(s.chain, s.stats, &s.buffers, &s.known_tokens))
            .collect();
        chains.sort_by_key(|c| c.chain);
        Self { chains }
    }

    pub fn totals(&self) -> WatcherStats {
        let mut total = WatcherStats::default();
        for c in &self.chains {
            total.merge(&c.stats);
        }
        total
    }

    /// Texto do relatório para terminal
    pub fn render(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "📊 Resumo multichain de novos tokens");
        let _ = writeln!(out, "{}", rule);

        for summary in &self.chains {
            let s = &summary.stats;
            let _ = writeln!(out);
            let _ = writeln!(out, "🔗 {}:", summary.chain);
            let _ = writeln!(out, "   Transferências recebidas: {}", s.total_transfers);
            let _ = writeln!(out, "   Tokens filtrados (listados): {}", s.filtered_tokens);
            let _ = writeln!(out, "   Novos tokens: {} ⭐", s.new_tokens);
            let _ = writeln!(out, "   Alertas emitidos: {} 🔥", s.high_confidence_tokens);

            if !summary.candidates.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "   Tokens não listados:");
                for c in summary.candidates.iter().take(REPORT_TOP_N) {
                    match c.confidence {
                        Some(conf) => {
                            let _ = writeln!(
                                out,
                                "      • {}: {:.2}% de confiança ({} transf., {} remetentes)",
                                c.symbol,
                                conf * 100.0,
                                c.transfer_count,
                                c.sender_count
                            );
                        }
                        None => {
                            let _ = writeln!(out, "      • {}: aguardando mais dados...", c.symbol);
                        }
                    }
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{}", rule);
        out
    }
}

struct ChainTask {
    watcher: ChainWatcher,
    poll_interval: Duration,
}

/// Executa um watcher por chain, cada um em sua própria task.
pub struct Orchestrator {
    tasks: Vec<ChainTask>,
    cancel: CancellationToken,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self { tasks: Vec::new(), cancel: CancellationToken::new() }
    }

    pub fn add_watcher(&mut self, watcher: ChainWatcher, poll_interval: Duration) {
        self.tasks.push(ChainTask { watcher, poll_interval });
    }

    pub fn chains(&self) -> Vec<Chain> {
        self.tasks.iter().map(|t| t.watcher.chain()).collect()
    }

    /// Token para encerrar todas as tasks
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Roda até o cancelamento e devolve o relatório final
    pub async fn run(self) -> SummaryReport {
        let handles: Vec<_> = self
            .tasks
            .into_iter()
            .map(|task| {
                let cancel = self.cancel.child_token();
                let chain = task.watcher.chain();
                info!(chain = %chain, interval_secs = task.poll_interval.as_secs(), "Task de chain iniciada");
                tokio::spawn(async move {
                    let mut watcher = task.watcher;
                    watcher.listen(task.poll_interval, cancel).await;
                    watcher
                })
            })
            .collect();

        let mut finished = Vec::new();
        for result in join_all(handles).await {
            match result {
                Ok(watcher) => finished.push(watcher),
                Err(e) => error!(error = %e, "Task de chain terminou com falha"),
            }
        }
        SummaryReport::from_watchers(finished.iter())
    }
}
