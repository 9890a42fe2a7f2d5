use chrono::{DateTime, Utc};
use ethereum_types::U256;
use radar_core::types::{AnalysisResult, Chain, ChainAddress, TransferRecord};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

/// Acumulador por contrato das transferências observadas.
///
/// `transfers` só cresce e mantém a ordem de chegada, que é a ordem usada na
/// análise. `alert_sent` só transita de `false` para `true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractBuffer {
    chain: Chain,
    contract: ChainAddress,
    transfers: Vec<TransferRecord>,
    #[serde(serialize_with = "serialize_sorted")]
    senders: HashSet<ChainAddress>,
    first_seen: Option<DateTime<Utc>>,
    is_new: bool,
    alert_sent: bool,
    analysis: Option<AnalysisResult>,
    listed_symbol: Option<String>,
}

fn serialize_sorted<S>(set: &HashSet<ChainAddress>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut sorted: Vec<&ChainAddress> = set.iter().collect();
    sorted.sort();
    sorted.serialize(serializer)
}

impl ContractBuffer {
    pub fn new(chain: Chain, contract: ChainAddress) -> Self {
        Self {
            chain,
            contract,
            transfers: Vec::new(),
            senders: HashSet::new(),
            first_seen: None,
            is_new: true,
            alert_sent: false,
            analysis: None,
            listed_symbol: None,
        }
    }

    pub fn chain(&self) -> Chain {
        self.chain
    }

    pub fn contract(&self) -> &ChainAddress {
        &self.contract
    }

    pub fn transfers(&self) -> &[TransferRecord] {
        &self.transfers
    }

    pub fn senders(&self) -> &HashSet<ChainAddress> {
        &self.senders
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.len()
    }

    pub fn sender_count(&self) -> usize {
        self.senders.len()
    }

    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.first_seen
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn alert_sent(&self) -> bool {
        self.alert_sent
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    pub fn listed_symbol(&self) -> Option<&str> {
        self.listed_symbol.as_deref()
    }

    /// Soma das quantidades brutas, saturando em `U256::MAX`
    pub fn total_amount(&self) -> U256 {
        self.transfers
            .iter()
            .fold(U256::zero(), |acc, t| acc.saturating_add(t.amount))
    }

    /// Primeira detecção como token não listado
    pub fn mark_new(&mut self, at: DateTime<Utc>) {
        self.first_seen = Some(at);
        self.is_new = true;
    }

    /// Token encontrado na exchange
    pub fn mark_listed(&mut self, symbol: impl Into<String>) {
        self.is_new = false;
        self.listed_symbol = Some(symbol.into());
    }

    pub fn mark_alert_sent(&mut self) {
        self.alert_sent = true;
    }

    pub fn record(&mut self, transfer: TransferRecord) {
        self.senders.insert(transfer.from.clone());
        self.transfers.push(transfer);
    }

    pub fn set_analysis(&mut self, analysis: AnalysisResult) {
        self.analysis = Some(analysis);
    }
}
