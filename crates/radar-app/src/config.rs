use anyhow::{bail, Context, Result};
use radar_core::types::{Chain, ChainAddress};
use radar_detector::{AlertPolicy, HeuristicConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ETH_WALLETS: &[&str] = &[
    "0x28C6c06298d514Db089934071355E5743bf21d60",
    "0x21a31Ee1afC51d94C2eFcCAa2092aD1028285549",
    "0xDFd5293D8e347dFe59E90eFd55b2956a1343963d",
    "0x56Eddb7aa87536c09CCc2793473599fD21A8b17F",
    "0x9696f59E4d72E237BE84fFD425DCaD154Bf96976",
    "0x4E9ce36E442e55EcD9025B9a6E0D88485d628A67",
    "0xbe0eB53F46cd790Cd13851d5EFf43D12404d33E8",
    "0xF977814e90dA44bFA03b6295A0616a897441aceC",
];

const BSC_WALLETS: &[&str] = &[
    "0x8894E0a0c962CB723c1976a4421c95949bE2D4E3",
    "0x28C6c06298d514Db089934071355E5743bf21d60",
    "0xdccf3b77da55107280bd850ea519df3705d1a75a",
    "0x0eD7e52944161450477ee417DE9Cd3a859b14fD0",
];

const SOL_WALLETS: &[&str] = &[
    "FWWqD7mGFWzGbUB14TXLxESJ5GSKboMvCHvmh6xEjHfQ",
    "5tzFkiKscXHK5ZXCGbXZxdw7gTjjD1mBwuoFbhUvuAi9",
];

/// Configuração de uma chain observada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub chain: Chain,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub rpc_url: String,
    pub poll_interval_secs: u64,
    pub wallets: Vec<String>,
    /// Altura inicial para chains EVM; ausente começa no bloco atual
    #[serde(default)]
    pub start_height: Option<u64>,
}

fn enabled_by_default() -> bool {
    true
}

impl ChainSettings {
    pub fn defaults_for(chain: Chain) -> Self {
        let (rpc_url, poll_interval_secs, wallets) = match chain {
            Chain::Ethereum => ("https://ethereum.publicnode.com", 12, ETH_WALLETS),
            Chain::Bsc => ("https://bsc-dataseed.binance.org/", 3, BSC_WALLETS),
            Chain::Solana => ("https://api.mainnet-beta.solana.com", 2, SOL_WALLETS),
        };
        Self {
            chain,
            enabled: true,
            rpc_url: rpc_url.to_string(),
            poll_interval_secs,
            wallets: wallets.iter().map(|w| w.to_string()).collect(),
            start_height: None,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn wallet_addresses(&self) -> Vec<ChainAddress> {
        self.wallets.iter().map(ChainAddress::new).collect()
    }
}

/// Índice de tokens listados
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    pub enabled: bool,
    pub cache_path: PathBuf,
    pub ttl_hours: u64,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self { enabled: true, cache_path: PathBuf::from("listed_tokens_cache.json"), ttl_hours: 24 }
    }
}

/// Configuração completa do binário
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub chains: Vec<ChainSettings>,
    pub listing: ListingSettings,
    pub webhook_url: Option<String>,
    /// Diretório dos snapshots; ausente desativa a persistência
    pub state_dir: Option<PathBuf>,
    pub heuristics: HeuristicConfig,
    pub policy: AlertPolicy,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            chains: [Chain::Ethereum, Chain::Bsc, Chain::Solana]
                .into_iter()
                .map(ChainSettings::defaults_for)
                .collect(),
            listing: ListingSettings::default(),
            webhook_url: None,
            state_dir: Some(PathBuf::from("state")),
            heuristics: HeuristicConfig::default(),
            policy: AlertPolicy::default(),
        }
    }
}

impl RadarConfig {
    /// Lê o arquivo JSON (ou usa os padrões) e aplica as variáveis de ambiente
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("falha ao ler {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("configuração inválida em {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for settings in &mut self.chains {
            let key = match settings.chain {
                Chain::Ethereum => "ETH_RPC_URL",
                Chain::Bsc => "BSC_RPC_URL",
                Chain::Solana => "SOL_RPC_URL",
            };
            if let Some(url) = lookup(key).filter(|v| !v.trim().is_empty()) {
                settings.rpc_url = url;
            }
        }
        if let Some(url) = lookup("WEBHOOK_URL").filter(|v| !v.trim().is_empty()) {
            self.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for settings in self.chains.iter().filter(|c| c.enabled) {
            if settings.wallets.is_empty() {
                bail!("{} habilitada sem carteiras monitoradas", settings.chain);
            }
            if settings.rpc_url.trim().is_empty() {
                bail!("{} habilitada sem URL RPC", settings.chain);
            }
        }
        Ok(())
    }

    /// Chains habilitadas, restritas a `only` quando informado
    pub fn active_chains(&self, only: &[Chain]) -> Vec<&ChainSettings> {
        self.chains
            .iter()
            .filter(|c| c.enabled)
            .filter(|c| only.is_empty() || only.contains(&c.chain))
            .collect()
    }
}
