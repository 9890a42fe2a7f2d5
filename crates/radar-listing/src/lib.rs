/*!
 * Radar Listing
 *
 * Índice dos tokens negociados na exchange, com mapa reverso
 * contrato -> símbolo montado a partir da lista de moedas do CoinGecko
 */

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use radar_core::traits::ListedTokenFilter;
use radar_core::types::{ChainAddress, ListedToken};
use radar_core::{error::Result, Error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const EXCHANGE_INFO_URL: &str = "https://api.binance.com/api/v3/exchangeInfo";
const COIN_LIST_URL: &str = "https://api.coingecko.com/api/v3/coins/list";

/// Plataformas do CoinGecko cujos contratos entram no índice
const ETHEREUM_PLATFORM: &str = "ethereum";
const BSC_PLATFORM: &str = "binance-smart-chain";

/// Opções do índice
#[derive(Debug, Clone)]
pub struct ListingOptions {
    pub cache_path: PathBuf,
    pub ttl: Duration,
    pub exchange_info_url: String,
    pub coin_list_url: String,
    /// Tempo máximo de cada requisição às fontes
    pub request_timeout: std::time::Duration,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("listed_tokens_cache.json"),
            ttl: Duration::hours(24),
            exchange_info_url: EXCHANGE_INFO_URL.to_string(),
            coin_list_url: COIN_LIST_URL.to_string(),
            request_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// Token negociado na exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bsc_contract: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ListingCache {
    tokens: BTreeMap<String, ListingEntry>,
    contract_map: BTreeMap<String, String>,
    last_update: Option<DateTime<Utc>>,
}

/// Estatísticas do índice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingStats {
    pub total_tokens: usize,
    pub eth_contracts: usize,
    pub bsc_contracts: usize,
    pub last_update: Option<DateTime<Utc>>,
    pub cache_file: PathBuf,
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    status: String,
    base_asset: String,
}

#[derive(Deserialize)]
struct CoinListEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    platforms: HashMap<String, Option<String>>,
}

/// Normaliza um contrato EVM; `None` se não tiver o formato `0x` + 40 hex
fn normalize_evm_contract(raw: Option<&Option<String>>) -> Option<String> {
    let value = raw?.as_deref()?.trim().to_ascii_lowercase();
    let valid = value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit());
    valid.then_some(value)
}

/// Índice de tokens listados, seguro para consultas concorrentes
pub struct ListingIndex {
    client: Client,
    options: ListingOptions,
    state: RwLock<ListingCache>,
}

impl ListingIndex {
    /// Índice vazio, sem tocar no disco nem na rede
    pub fn new(options: ListingOptions) -> Self {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .unwrap_or_default();
        Self { client, options, state: RwLock::new(ListingCache::default()) }
    }

    /// Carrega o cache e atualiza pela rede quando ausente ou expirado.
    ///
    /// Falhas na atualização mantêm o conteúdo do cache, mesmo expirado.
    pub async fn open(options: ListingOptions) -> Self {
        let index = Self::new(options);
        match index.load_cache() {
            Ok(true) if !index.is_stale() => return index,
            Ok(true) => info!("Cache de listagens expirado, atualizando"),
            Ok(false) => info!(path = %index.options.cache_path.display(), "Cache de listagens ausente"),
            Err(e) => warn!(error = %e, "Cache de listagens ilegível"),
        }
        if let Err(e) = index.refresh().await {
            warn!(error = %e, "Falha ao atualizar listagens; usando dados em cache");
        }
        index
    }

    /// Lê o arquivo de cache; `false` se ele não existir
    pub fn load_cache(&self) -> Result<bool> {
        let path = &self.options.cache_path;
        if !path.exists() {
            return Ok(false);
        }
        let raw = fs::read(path)?;
        let cache: ListingCache = serde_json::from_slice(&raw)
            .map_err(|e| Error::StorageError(format!("cache inválido em {}: {}", path.display(), e)))?;
        info!(tokens = cache.tokens.len(), contracts = cache.contract_map.len(), "Cache de listagens carregado");
        *self.state.write() = cache;
        Ok(true)
    }

    pub fn save_cache(&self) -> Result<()> {
        save_json(&self.options.cache_path, &*self.state.read())
    }

    pub fn is_stale(&self) -> bool {
        match self.state.read().last_update {
            Some(at) => Utc::now() - at > self.options.ttl,
            None => true,
        }
    }

    /// Recarrega os pares negociados e os contratos e salva o cache.
    ///
    /// Sem a lista de moedas o índice fica só com os símbolos.
    pub async fn refresh(&self) -> Result<usize> {
        let symbols = self.fetch_trading_symbols().await?;
        let mut cache = ListingCache {
            tokens: symbols
                .iter()
                .map(|s| (s.clone(), ListingEntry { symbol: s.clone(), ..Default::default() }))
                .collect(),
            contract_map: BTreeMap::new(),
            last_update: Some(Utc::now()),
        };

        match self.fetch_coin_list().await {
            Ok(coins) => map_contracts(&mut cache, coins),
            Err(e) => warn!(error = %e, "Lista de moedas indisponível; índice sem contratos"),
        }

        let contracts = cache.contract_map.len();
        info!(tokens = cache.tokens.len(), contracts, "Listagens atualizadas");
        *self.state.write() = cache;
        self.save_cache()?;
        Ok(contracts)
    }

    async fn fetch_trading_symbols(&self) -> Result<HashSet<String>> {
        let info: ExchangeInfo = self
            .client
            .get(&self.options.exchange_info_url)
            .send()
            .await
            .map_err(|e| Error::RpcError(format!("Erro ao consultar exchangeInfo: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::DecodeError(format!("Erro ao decodificar exchangeInfo: {}", e)))?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| s.base_asset.to_uppercase())
            .collect())
    }

    async fn fetch_coin_list(&self) -> Result<Vec<CoinListEntry>> {
        self.client
            .get(&self.options.coin_list_url)
            .query(&[("include_platform", "true")])
            .send()
            .await
            .map_err(|e| Error::RpcError(format!("Erro ao consultar lista de moedas: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::DecodeError(format!("Erro ao decodificar lista de moedas: {}", e)))
    }

    /// Consulta por contrato, sem diferenciar maiúsculas
    pub fn lookup(&self, contract: &str) -> Option<ListingEntry> {
        let key = contract.trim().to_ascii_lowercase();
        let state = self.state.read();
        let symbol = state.contract_map.get(&key)?;
        Some(
            state
                .tokens
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| ListingEntry { symbol: symbol.clone(), ..Default::default() }),
        )
    }

    pub fn is_symbol_listed(&self, symbol: &str) -> bool {
        self.state.read().tokens.contains_key(&symbol.to_uppercase())
    }

    pub fn stats(&self) -> ListingStats {
        let state = self.state.read();
        ListingStats {
            total_tokens: state.tokens.len(),
            eth_contracts: state.tokens.values().filter(|t| t.eth_contract.is_some()).count(),
            bsc_contracts: state.tokens.values().filter(|t| t.bsc_contract.is_some()).count(),
            last_update: state.last_update,
            cache_file: self.options.cache_path.clone(),
        }
    }
}

fn map_contracts(cache: &mut ListingCache, coins: Vec<CoinListEntry>) {
    for coin in coins {
        let symbol = coin.symbol.to_uppercase();
        let entry = match cache.tokens.get_mut(&symbol) {
            Some(entry) => entry,
            None => continue,
        };
        if let Some(eth) = normalize_evm_contract(coin.platforms.get(ETHEREUM_PLATFORM)) {
            cache.contract_map.insert(eth.clone(), symbol.clone());
            entry.eth_contract = Some(eth);
        }
        if let Some(bsc) = normalize_evm_contract(coin.platforms.get(BSC_PLATFORM)) {
            cache.contract_map.insert(bsc.clone(), symbol.clone());
            entry.bsc_contract = Some(bsc);
        }
        if !coin.name.is_empty() {
            entry.name = Some(coin.name);
        }
        if !coin.id.is_empty() {
            entry.coingecko_id = Some(coin.id);
        }
    }
}

fn save_json(path: &Path, cache: &ListingCache) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(cache).map_err(|e| Error::EncodeError(e.to_string()))?;
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl ListedTokenFilter for ListingIndex {
    async fn is_listed(&self, contract: &ChainAddress) -> Option<ListedToken> {
        self.lookup(contract.as_str())
            .map(|entry| ListedToken { symbol: entry.symbol, name: entry.name })
    }
}
