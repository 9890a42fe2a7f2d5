use crate::{with_retry, RpcConfig};
use async_trait::async_trait;
use ethereum_types::U256;
use radar_core::traits::{SignatureSource, TokenMetadataSource};
use radar_core::types::{ChainAddress, RawTransaction, SignatureInfo, TokenBalance, TokenDescriptor};
use radar_core::{error::Result, Error};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Vec<Value>,
    id: u32,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureEntry {
    signature: String,
    slot: u64,
    block_time: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTokenAmount {
    amount: String,
    decimals: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTokenBalance {
    account_index: u32,
    mint: String,
    owner: Option<String>,
    ui_token_amount: UiTokenAmount,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
    #[serde(default)]
    pre_token_balances: Vec<UiTokenBalance>,
    #[serde(default)]
    post_token_balances: Vec<UiTokenBalance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmedTransaction {
    slot: u64,
    block_time: Option<i64>,
    meta: Option<TransactionMeta>,
}

#[derive(Deserialize)]
struct TokenSupplyValue {
    decimals: u8,
    amount: String,
}

#[derive(Deserialize)]
struct ContextValue<T> {
    value: T,
}

fn convert_balances(balances: Vec<UiTokenBalance>) -> Result<Vec<TokenBalance>> {
    balances
        .into_iter()
        .map(|b| {
            let amount = U256::from_dec_str(&b.ui_token_amount.amount)
                .map_err(|e| Error::DecodeError(format!("saldo inválido {}: {:?}", b.ui_token_amount.amount, e)))?;
            Ok(TokenBalance {
                account_index: b.account_index,
                mint: b.mint,
                owner: b.owner,
                amount,
                decimals: b.ui_token_amount.decimals,
            })
        })
        .collect()
}

fn prefix(value: &str, n: usize) -> String {
    value.chars().take(n).collect()
}

/// Cliente JSON-RPC para Solana
pub struct SolanaRpcClient {
    client: Client,
    config: RpcConfig,
}

impl SolanaRpcClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ConfigError(format!("Falha ao criar cliente HTTP: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Cria o cliente e verifica a conexão com `getHealth`
    pub async fn connect(config: RpcConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let health: String = client.request("getHealth", vec![]).await?;
        info!(endpoint = %client.config.endpoint, health = %health, "RPC Solana conectado");
        Ok(client)
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        with_retry(&self.config, method, || self.request_once(method, params.clone())).await?
            .ok_or_else(|| Error::NotFound(format!("{} sem resultado", method)))
    }

    async fn request_optional<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<Option<T>> {
        with_retry(&self.config, method, || self.request_once(method, params.clone())).await
    }

    async fn request_once<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<Option<T>> {
        let req = RpcRequest { jsonrpc: "2.0", method, params, id: 1 };
        let resp = self
            .client
            .post(&self.config.endpoint)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::RpcError(format!("Erro ao chamar {}: {}", method, e)))?;
        if !resp.status().is_success() {
            return Err(Error::RpcError(format!("{} retornou HTTP {}", method, resp.status())));
        }
        let body: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| Error::DecodeError(format!("Resposta inválida de {}: {}", method, e)))?;
        if let Some(err) = body.error {
            return Err(Error::RpcError(format!("{} falhou ({}): {}", method, err.code, err.message)));
        }
        Ok(body.result)
    }
}

#[async_trait]
impl SignatureSource for SolanaRpcClient {
    async fn recent_signatures(&self, wallet: &ChainAddress, limit: usize) -> Result<Vec<SignatureInfo>> {
        let entries: Vec<SignatureEntry> = self
            .request("getSignaturesForAddress", vec![json!(wallet.as_str()), json!({ "limit": limit })])
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| SignatureInfo { signature: e.signature, slot: e.slot, block_time: e.block_time })
            .collect())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<RawTransaction>> {
        let tx: Option<ConfirmedTransaction> = self
            .request_optional(
                "getTransaction",
                vec![
                    json!(signature),
                    json!({ "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }),
                ],
            )
            .await?;
        let tx = match tx {
            Some(tx) => tx,
            None => return Ok(None),
        };
        let meta = match tx.meta {
            Some(meta) => meta,
            None => return Ok(None),
        };
        Ok(Some(RawTransaction {
            signature: signature.to_string(),
            slot: tx.slot,
            block_time: tx.block_time,
            pre_token_balances: convert_balances(meta.pre_token_balances)?,
            post_token_balances: convert_balances(meta.post_token_balances)?,
        }))
    }
}

#[async_trait]
impl TokenMetadataSource for SolanaRpcClient {
    /// Sem metadados on-chain padronizados, nome e símbolo derivam do mint
    async fn token_descriptor(&self, contract: &ChainAddress) -> Result<TokenDescriptor> {
        let supply: ContextValue<TokenSupplyValue> = self
            .request("getTokenSupply", vec![json!(contract.as_str())])
            .await?;
        let mint = contract.as_str();
        Ok(TokenDescriptor {
            contract: contract.clone(),
            name: format!("Token-{}", prefix(mint, 8)),
            symbol: format!("TK-{}", prefix(mint, 4)),
            decimals: supply.value.decimals,
            total_supply: U256::from_dec_str(&supply.value.amount).ok(),
        })
    }
}
