use crate::analyzer::ConfidenceAnalyzer;
use crate::buffer::ContractBuffer;
use crate::escalator::{AlertEscalator, EscalationOutcome};
use chrono::Utc;
use radar_core::traits::{ListedTokenFilter, TokenMetadataSource};
use radar_core::types::{Chain, ChainAddress, TokenDescriptor, TransferRecord};
use radar_core::utils::{normalize_amount, shorten};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Contadores agregados de um watcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherStats {
    /// Transferências recebidas por carteiras monitoradas
    pub total_transfers: u64,
    /// Contratos descartados por já estarem listados
    pub filtered_tokens: u64,
    /// Contratos detectados como não listados
    pub new_tokens: u64,
    /// Alertas emitidos
    pub high_confidence_tokens: u64,
}

impl WatcherStats {
    pub fn merge(&mut self, other: &WatcherStats) {
        self.total_transfers += other.total_transfers;
        self.filtered_tokens += other.filtered_tokens;
        self.new_tokens += other.new_tokens;
        self.high_confidence_tokens += other.high_confidence_tokens;
    }
}

/// O que aconteceu com uma transferência submetida ao pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// Destino não é carteira monitorada
    Ignored,
    /// Metadados do token indisponíveis
    Dropped,
    /// Token já listado, sem pontuação
    Listed { symbol: String },
    /// Registrada, ainda sem transferências suficientes para análise
    Buffered { transfer_count: usize },
    /// Registrada e analisada
    Analyzed { confidence: f64, escalation: EscalationOutcome },
}

/// Pipeline filtro → buffer → análise → alerta de uma chain.
///
/// Estado exclusivo de um único watcher; não há sincronização interna.
pub struct TransferPipeline {
    chain: Chain,
    monitored: HashSet<ChainAddress>,
    analyzer: ConfidenceAnalyzer,
    escalator: AlertEscalator,
    filter: Option<Arc<dyn ListedTokenFilter>>,
    metadata: Arc<dyn TokenMetadataSource>,
    known_tokens: HashMap<ChainAddress, TokenDescriptor>,
    buffers: HashMap<ChainAddress, ContractBuffer>,
    stats: WatcherStats,
}

impl TransferPipeline {
    pub fn new(
        chain: Chain,
        monitored: impl IntoIterator<Item = ChainAddress>,
        analyzer: ConfidenceAnalyzer,
        escalator: AlertEscalator,
        filter: Option<Arc<dyn ListedTokenFilter>>,
        metadata: Arc<dyn TokenMetadataSource>,
    ) -> Self {
        Self {
            chain,
            monitored: monitored.into_iter().collect(),
            analyzer,
            escalator,
            filter,
            metadata,
            known_tokens: HashMap::new(),
            buffers: HashMap::new(),
            stats: WatcherStats::default(),
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn is_monitored(&self, address: &ChainAddress) -> bool {
        self.monitored.contains(address)
    }

    pub fn monitored_wallets(&self) -> impl Iterator<Item = &ChainAddress> {
        self.monitored.iter()
    }

    pub fn stats(&self) -> WatcherStats {
        self.stats
    }

    pub fn buffer(&self, contract: &ChainAddress) -> Option<&ContractBuffer> {
        self.buffers.get(contract)
    }

    pub fn buffers(&self) -> &HashMap<ChainAddress, ContractBuffer> {
        &self.buffers
    }

    pub fn known_tokens(&self) -> &HashMap<ChainAddress, TokenDescriptor> {
        &self.known_tokens
    }

    /// Substitui o estado por um snapshot restaurado
    pub fn restore(
        &mut self,
        known_tokens: HashMap<ChainAddress, TokenDescriptor>,
        buffers: HashMap<ChainAddress, ContractBuffer>,
        stats: WatcherStats,
    ) {
        self.known_tokens = known_tokens;
        self.buffers = buffers;
        self.stats = stats;
    }

    async fn descriptor(&mut self, contract: &ChainAddress) -> Option<TokenDescriptor> {
        if let Some(token) = self.known_tokens.get(contract) {
            return Some(token.clone());
        }
        match self.metadata.token_descriptor(contract).await {
            Ok(token) => {
                self.known_tokens.insert(contract.clone(), token.clone());
                Some(token)
            }
            Err(e) => {
                warn!(chain = %self.chain, contract = %contract, error = %e, "Não foi possível obter metadados do token");
                None
            }
        }
    }

    pub async fn process(&mut self, transfer: TransferRecord) -> ProcessOutcome {
        if !self.is_monitored(&transfer.to) {
            return ProcessOutcome::Ignored;
        }
        self.stats.total_transfers += 1;

        let contract = transfer.contract.clone();
        let token = match self.descriptor(&contract).await {
            Some(token) => token,
            None => return ProcessOutcome::Dropped,
        };

        if let Some(filter) = &self.filter {
            if let Some(listed) = filter.is_listed(&contract).await {
                let created = !self.buffers.contains_key(&contract);
                let buffer = self
                    .buffers
                    .entry(contract.clone())
                    .or_insert_with(|| ContractBuffer::new(self.chain, contract.clone()));
                buffer.mark_listed(listed.symbol.clone());
                if created {
                    self.stats.filtered_tokens += 1;
                    info!(
                        chain = %self.chain,
                        symbol = %token.symbol,
                        listed_as = %listed.symbol,
                        "Token já listado, ignorado"
                    );
                }
                return ProcessOutcome::Listed { symbol: listed.symbol };
            }
        }

        let chain = self.chain;
        let created = !self.buffers.contains_key(&contract);
        let buffer = self
            .buffers
            .entry(contract.clone())
            .or_insert_with(|| ContractBuffer::new(chain, contract.clone()));
        if created {
            buffer.mark_new(Utc::now());
            self.stats.new_tokens += 1;
            info!(
                chain = %chain,
                contract = %contract,
                symbol = %token.symbol,
                name = %token.name,
                "Novo token não listado detectado"
            );
        }

        debug!(
            chain = %chain,
            symbol = %token.symbol,
            amount = normalize_amount(&transfer.amount, token.decimals),
            from = %shorten(transfer.from.as_str(), 10, 8),
            tx = %shorten(&transfer.tx_id, 10, 8),
            "Depósito recebido"
        );
        buffer.record(transfer);

        if buffer.transfer_count() < 2 {
            debug!(
                chain = %chain,
                contract = %contract,
                transfers = buffer.transfer_count(),
                senders = buffer.sender_count(),
                "Aguardando mais transferências para análise"
            );
            return ProcessOutcome::Buffered { transfer_count: buffer.transfer_count() };
        }

        let analysis = self.analyzer.analyze(buffer.transfers(), buffer.senders(), &token);
        let confidence = analysis.confidence;
        info!(
            chain = %chain,
            contract = %contract,
            confidence,
            risk = %analysis.risk_level,
            warnings = analysis.warnings.len(),
            "Análise de confiança atualizada"
        );
        buffer.set_analysis(analysis);

        let escalation = self
            .escalator
            .escalate(buffer, &token, self.filter.as_deref(), &mut self.stats)
            .await;

        ProcessOutcome::Analyzed { confidence, escalation }
    }
}
