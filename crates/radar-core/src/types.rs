/*!
 * Radar Types
 *
 * Modelo de dados compartilhado: endereços, transferências, descritores de token
 * e resultados de análise
 */

use chrono::{DateTime, Utc};
use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Endereço independente de chain.
///
/// Endereços hexadecimais (`0x...`) são normalizados para minúsculas; os demais
/// formatos (base58 da Solana) são mantidos como recebidos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ChainAddress(String);

impl ChainAddress {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        if raw.starts_with("0x") || raw.starts_with("0X") {
            Self(raw.to_ascii_lowercase())
        } else {
            Self(raw.to_string())
        }
    }

    /// Remetente desconhecido (transferências sem conta debitada identificável)
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_hex(&self) -> bool {
        self.0.starts_with("0x")
    }

    /// Converte para `Address` quando o endereço é EVM
    pub fn to_evm(&self) -> Option<Address> {
        if !self.is_hex() {
            return None;
        }
        Address::from_str(&self.0[2..]).ok()
    }
}

impl fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChainAddress {
    fn from(value: String) -> Self {
        ChainAddress::new(value)
    }
}

impl From<&str> for ChainAddress {
    fn from(value: &str) -> Self {
        ChainAddress::new(value)
    }
}

impl From<ChainAddress> for String {
    fn from(value: ChainAddress) -> Self {
        value.0
    }
}

impl From<Address> for ChainAddress {
    fn from(value: Address) -> Self {
        ChainAddress(format!("0x{:x}", value))
    }
}

/// Família de chain, define como as transferências são observadas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// Chains de contas com logs de eventos (EVM)
    LogModel,
    /// Chains varridas por assinaturas e diferença de saldos (Solana)
    SignatureScan,
}

/// Chains suportadas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Bsc,
    Solana,
}

impl Chain {
    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Ethereum | Chain::Bsc => ChainFamily::LogModel,
            Chain::Solana => ChainFamily::SignatureScan,
        }
    }

    /// Nome usado em logs e relatórios
    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Bsc => "BSC",
            Chain::Solana => "Solana",
        }
    }

    /// URL do token no explorador de blocos da chain
    pub fn explorer_token_url(&self, contract: &ChainAddress) -> String {
        match self {
            Chain::Ethereum => format!("https://etherscan.io/token/{}", contract),
            Chain::Bsc => format!("https://bscscan.com/token/{}", contract),
            Chain::Solana => format!("https://solscan.io/token/{}", contract),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eth" | "ethereum" => Ok(Chain::Ethereum),
            "bsc" | "bnb" => Ok(Chain::Bsc),
            "sol" | "solana" => Ok(Chain::Solana),
            other => Err(format!("Chain desconhecida: {}", other)),
        }
    }
}

/// Transferência de token normalizada, imutável após construída
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub block_height: u64,
    pub tx_id: String,
    pub contract: ChainAddress,
    pub from: ChainAddress,
    pub to: ChainAddress,
    /// Quantidade na menor unidade do token
    pub amount: U256,
    /// Segundos unix; `None` enquanto não resolvido
    pub timestamp: Option<u64>,
}

/// Metadados de um token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub contract: ChainAddress,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: Option<U256>,
}

/// Resultado positivo da consulta de listagem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedToken {
    /// Símbolo do ativo na exchange
    pub symbol: String,
    pub name: Option<String>,
}

/// Nível de alerta emitido
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    High,
    Medium,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::High => "HIGH",
            AlertLevel::Medium => "MEDIUM",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nível de risco derivado da confiança e dos avisos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Rótulo legível
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢 Risco baixo",
            RiskLevel::Medium => "🟡 Risco médio",
            RiskLevel::High => "🔴 Risco alto",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimensões de pontuação do analisador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDimension {
    BasicStats,
    TimePattern,
    AmountDistribution,
    SybilDetection,
}

/// Resultado da análise de confiança de um contrato
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub patterns: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendation: String,
    pub scores: BTreeMap<ScoreDimension, f64>,
}

/// Log bruto de evento retornado por uma chain EVM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Contrato emissor
    pub address: ChainAddress,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<H256>,
}

/// Assinatura de transação listada para um endereço
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
}

/// Saldo de token de uma conta antes ou depois de uma transação
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account_index: u32,
    pub mint: String,
    pub owner: Option<String>,
    pub amount: U256,
    pub decimals: u8,
}

/// Transação confirmada com os saldos de token relevantes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

/// Alerta enviado ao canal de notificação
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAlert {
    pub level: AlertLevel,
    pub chain: Chain,
    pub contract: ChainAddress,
    pub token: TokenDescriptor,
    pub transfer_count: usize,
    pub unique_senders: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub analysis: AnalysisResult,
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_addresses_are_lowercased() {
        let addr = ChainAddress::new("0x28C6c06298d514Db089934071355E5743bf21d60");
        assert_eq!(addr.as_str(), "0x28c6c06298d514db089934071355e5743bf21d60");
        assert!(addr.to_evm().is_some());
    }

    #[test]
    fn base58_addresses_are_kept() {
        let raw = "FWWqD7mGFWzGbUB14TXLxESJ5GSKboMvCHvmh6xEjHfQ";
        let addr = ChainAddress::new(raw);
        assert_eq!(addr.as_str(), raw);
        assert!(addr.to_evm().is_none());
    }

    #[test]
    fn address_roundtrips_through_serde_normalized() {
        let json = "\"0xABCDEF0000000000000000000000000000000001\"";
        let addr: ChainAddress = serde_json::from_str(json).unwrap();
        assert_eq!(addr.as_str(), "0xabcdef0000000000000000000000000000000001");
        assert_eq!(serde_json::to_string(&addr).unwrap(), json.to_lowercase());
    }

    #[test]
    fn chain_parsing_and_family() {
        assert_eq!("eth".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert_eq!("SOL".parse::<Chain>().unwrap(), Chain::Solana);
        assert!("tron".parse::<Chain>().is_err());
        assert_eq!(Chain::Bsc.family(), ChainFamily::LogModel);
        assert_eq!(Chain::Solana.family(), ChainFamily::SignatureScan);
    }
}
