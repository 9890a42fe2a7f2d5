#![allow(dead_code)]

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use radar_core::error::{Error, Result};
use radar_core::traits::{
    AlertNotifier, ListedTokenFilter, LogSource, SignatureSource, TokenMetadataSource,
};
use radar_core::types::{
    ChainAddress, ListedToken, RawLog, RawTransaction, SignatureInfo, TokenAlert, TokenDescriptor,
    TransferRecord,
};
use radar_core::utils::{address_to_topic, transfer_event_topic};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_TS: u64 = 1_700_000_000;

pub fn wallet() -> ChainAddress {
    ChainAddress::from(Address::repeat_byte(0xb0))
}

pub fn contract(byte: u8) -> ChainAddress {
    ChainAddress::from(Address::repeat_byte(byte))
}

pub fn sender(byte: u8) -> ChainAddress {
    ChainAddress::from(Address::repeat_byte(byte))
}

pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn descriptor(contract: &ChainAddress, symbol: &str) -> TokenDescriptor {
    TokenDescriptor {
        contract: contract.clone(),
        name: format!("{} Token", symbol),
        symbol: symbol.to_string(),
        decimals: 18,
        total_supply: None,
    }
}

pub fn transfer(contract: &ChainAddress, from: &ChainAddress, amount: U256, ts: u64) -> TransferRecord {
    TransferRecord {
        block_height: ts / 12,
        tx_id: format!("0x{:x}", ts),
        contract: contract.clone(),
        from: from.clone(),
        to: wallet(),
        amount,
        timestamp: Some(ts),
    }
}

/// Metadados fixos; contratos desconhecidos falham
#[derive(Default)]
pub struct StaticMetadata {
    pub tokens: HashMap<ChainAddress, TokenDescriptor>,
    pub calls: AtomicUsize,
}

impl StaticMetadata {
    pub fn with(tokens: &[(&ChainAddress, &str)]) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|(c, s)| ((*c).clone(), descriptor(c, s)))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenMetadataSource for StaticMetadata {
    async fn token_descriptor(&self, contract: &ChainAddress) -> Result<TokenDescriptor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .get(contract)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("token {}", contract)))
    }
}

/// Filtro de listagem controlado pelo teste
#[derive(Clone, Default)]
pub struct MockListingFilter {
    pub listed: Arc<Mutex<HashMap<ChainAddress, ListedToken>>>,
    pub queries: Arc<AtomicUsize>,
}

impl MockListingFilter {
    pub fn list(&self, contract: &ChainAddress, symbol: &str) {
        self.listed.lock().unwrap().insert(
            contract.clone(),
            ListedToken { symbol: symbol.to_string(), name: None },
        );
    }
}

#[async_trait]
impl ListedTokenFilter for MockListingFilter {
    async fn is_listed(&self, contract: &ChainAddress) -> Option<ListedToken> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.listed.lock().unwrap().get(contract).cloned()
    }
}

/// Registra alertas recebidos e devolve um resultado fixo
#[derive(Clone)]
pub struct RecordingNotifier {
    pub alerts: Arc<Mutex<Vec<TokenAlert>>>,
    pub succeed: bool,
}

impl RecordingNotifier {
    pub fn new(succeed: bool) -> Self {
        Self { alerts: Arc::new(Mutex::new(Vec::new())), succeed }
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertNotifier for RecordingNotifier {
    async fn send_alert(&self, alert: &TokenAlert) -> bool {
        self.alerts.lock().unwrap().push(alert.clone());
        self.succeed
    }
}

/// Chain de logs roteirizada
pub struct ScriptedLogSource {
    pub head: Mutex<u64>,
    pub logs: Mutex<Vec<RawLog>>,
    pub timestamps: HashMap<u64, u64>,
    pub failing_wallets: HashSet<ChainAddress>,
    pub metadata: StaticMetadata,
    pub queried_ranges: Mutex<Vec<(ChainAddress, u64, u64)>>,
}

impl ScriptedLogSource {
    pub fn new(head: u64, metadata: StaticMetadata) -> Self {
        Self {
            head: Mutex::new(head),
            logs: Mutex::new(Vec::new()),
            timestamps: HashMap::new(),
            failing_wallets: HashSet::new(),
            metadata,
            queried_ranges: Mutex::new(Vec::new()),
        }
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn push_transfer(&self, contract: &ChainAddress, from: &ChainAddress, to: &ChainAddress, amount: U256, block: u64) {
        let mut data = vec![0u8; 32];
        amount.to_big_endian(&mut data);
        let from = from.to_evm().unwrap_or_default();
        let to = to.to_evm().unwrap_or_default();
        self.logs.lock().unwrap().push(RawLog {
            address: contract.clone(),
            topics: vec![transfer_event_topic(), address_to_topic(&from), address_to_topic(&to)],
            data,
            block_number: Some(block),
            transaction_hash: Some(H256::from_low_u64_be(block)),
        });
    }

    pub fn push_raw(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }
}

#[async_trait]
impl LogSource for ScriptedLogSource {
    async fn head_height(&self) -> Result<u64> {
        Ok(*self.head.lock().unwrap())
    }

    async fn transfer_logs(&self, wallet: &ChainAddress, from: u64, to: u64) -> Result<Vec<RawLog>> {
        self.queried_ranges.lock().unwrap().push((wallet.clone(), from, to));
        if self.failing_wallets.contains(wallet) {
            return Err(Error::RpcError("conexão recusada".into()));
        }
        let topic = address_to_topic(&wallet.to_evm().unwrap_or_default());
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.topics.get(2) == Some(&topic))
            .filter(|l| l.block_number.map(|b| b >= from && b <= to).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, height: u64) -> Result<u64> {
        self.timestamps
            .get(&height)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("bloco {}", height)))
    }
}

#[async_trait]
impl TokenMetadataSource for ScriptedLogSource {
    async fn token_descriptor(&self, contract: &ChainAddress) -> Result<TokenDescriptor> {
        self.metadata.token_descriptor(contract).await
    }
}

/// Chain de assinaturas roteirizada
pub struct ScriptedSignatureSource {
    pub signatures: Mutex<HashMap<ChainAddress, Vec<SignatureInfo>>>,
    pub transactions: Mutex<HashMap<String, RawTransaction>>,
    pub fetched: Mutex<Vec<String>>,
    pub metadata: StaticMetadata,
}

impl ScriptedSignatureSource {
    pub fn new(metadata: StaticMetadata) -> Self {
        Self {
            signatures: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            fetched: Mutex::new(Vec::new()),
            metadata,
        }
    }

    /// Adiciona uma transação como a mais recente da carteira
    pub fn push(&self, wallet: &ChainAddress, tx: RawTransaction) {
        let info = SignatureInfo { signature: tx.signature.clone(), slot: tx.slot, block_time: tx.block_time };
        self.signatures
            .lock()
            .unwrap()
            .entry(wallet.clone())
            .or_default()
            .insert(0, info);
        self.transactions.lock().unwrap().insert(tx.signature.clone(), tx);
    }
}

#[async_trait]
impl SignatureSource for ScriptedSignatureSource {
    async fn recent_signatures(&self, wallet: &ChainAddress, limit: usize) -> Result<Vec<SignatureInfo>> {
        Ok(self
            .signatures
            .lock()
            .unwrap()
            .get(wallet)
            .map(|s| s.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<RawTransaction>> {
        self.fetched.lock().unwrap().push(signature.to_string());
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }
}

#[async_trait]
impl TokenMetadataSource for ScriptedSignatureSource {
    async fn token_descriptor(&self, contract: &ChainAddress) -> Result<TokenDescriptor> {
        self.metadata.token_descriptor(contract).await
    }
}
