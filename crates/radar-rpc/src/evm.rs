use crate::{with_retry, RpcConfig};
use async_trait::async_trait;
use ethers::abi::{self, ParamType, Token};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Filter, TransactionRequest, U256};
use radar_core::traits::{LogSource, TokenMetadataSource};
use radar_core::types::{ChainAddress, RawLog, TokenDescriptor};
use radar_core::utils::{address_to_topic, keccak256, transfer_event_topic};
use radar_core::{error::Result, Error};
use tracing::{debug, info};

/// Seletor de 4 bytes de uma função
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Decodifica o retorno de `name()`/`symbol()`: string ABI ou `bytes32` legado
pub fn decode_string_return(data: &[u8]) -> Option<String> {
    if let Ok(tokens) = abi::decode(&[ParamType::String], data) {
        if let Some(Token::String(s)) = tokens.into_iter().next() {
            if !s.is_empty() {
                return Some(s);
            }
        }
    }
    if data.len() >= 32 {
        let raw: Vec<u8> = data[..32].iter().copied().take_while(|b| *b != 0).collect();
        let text = String::from_utf8_lossy(&raw).trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

/// Cliente para chains EVM (Ethereum, BSC) sobre HTTP
pub struct EvmRpcClient {
    provider: Provider<Http>,
    config: RpcConfig,
}

impl EvmRpcClient {
    pub fn new(config: RpcConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.endpoint.as_str())
            .map_err(|e| Error::ConfigError(format!("URL RPC inválida {}: {}", config.endpoint, e)))?;
        Ok(Self { provider, config })
    }

    /// Cria o cliente e verifica a conexão consultando o bloco atual
    pub async fn connect(config: RpcConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let head = client.head_height().await?;
        info!(endpoint = %client.config.endpoint, block = head, "RPC EVM conectado");
        Ok(client)
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    async fn call_view(&self, contract: Address, signature: &str) -> Result<Vec<u8>> {
        let data = Bytes::from(function_selector(signature).to_vec());
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        let out = with_retry(&self.config, signature, || async {
            self.provider
                .call(&tx, None)
                .await
                .map_err(|e| Error::RpcError(format!("Falha em eth_call {}: {}", signature, e)))
        })
        .await?;
        Ok(out.to_vec())
    }

    async fn call_string(&self, contract: Address, signature: &str) -> Result<String> {
        let out = self.call_view(contract, signature).await?;
        decode_string_return(&out)
            .ok_or_else(|| Error::DecodeError(format!("retorno inválido de {}", signature)))
    }

    async fn call_uint(&self, contract: Address, signature: &str) -> Result<U256> {
        let out = self.call_view(contract, signature).await?;
        if out.len() < 32 {
            return Err(Error::DecodeError(format!("retorno curto de {}", signature)));
        }
        Ok(U256::from_big_endian(&out[..32]))
    }
}

fn evm_address(address: &ChainAddress) -> Result<Address> {
    address
        .to_evm()
        .ok_or_else(|| Error::ValidationError(format!("endereço EVM inválido: {}", address)))
}

#[async_trait]
impl LogSource for EvmRpcClient {
    async fn head_height(&self) -> Result<u64> {
        let head = with_retry(&self.config, "eth_blockNumber", || async {
            self.provider
                .get_block_number()
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter número do bloco: {}", e)))
        })
        .await?;
        Ok(head.as_u64())
    }

    async fn transfer_logs(&self, wallet: &ChainAddress, from: u64, to: u64) -> Result<Vec<RawLog>> {
        let wallet = evm_address(wallet)?;
        let filter = Filter::new()
            .from_block(from)
            .to_block(to)
            .topic0(transfer_event_topic())
            .topic2(address_to_topic(&wallet));

        let logs = with_retry(&self.config, "eth_getLogs", || async {
            self.provider
                .get_logs(&filter)
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter logs: {}", e)))
        })
        .await?;
        debug!(wallet = ?wallet, from, to, count = logs.len(), "Logs Transfer obtidos");

        Ok(logs
            .into_iter()
            .map(|log| RawLog {
                address: ChainAddress::from(log.address),
                topics: log.topics,
                data: log.data.to_vec(),
                block_number: log.block_number.map(|b| b.as_u64()),
                transaction_hash: log.transaction_hash,
            })
            .collect())
    }

    async fn block_timestamp(&self, height: u64) -> Result<u64> {
        let block = with_retry(&self.config, "eth_getBlockByNumber", || async {
            self.provider
                .get_block(height)
                .await
                .map_err(|e| Error::RpcError(format!("Falha ao obter bloco: {}", e)))
        })
        .await?;
        block
            .map(|b| b.timestamp.as_u64())
            .ok_or_else(|| Error::NotFound(format!("bloco {}", height)))
    }
}

#[async_trait]
impl TokenMetadataSource for EvmRpcClient {
    async fn token_descriptor(&self, contract: &ChainAddress) -> Result<TokenDescriptor> {
        let address = evm_address(contract)?;
        let name = self.call_string(address, "name()").await?;
        let symbol = self.call_string(address, "symbol()").await?;
        let decimals = self.call_uint(address, "decimals()").await?;
        if decimals > U256::from(u8::MAX) {
            return Err(Error::DecodeError(format!("decimals fora do intervalo: {}", decimals)));
        }
        let total_supply = self.call_uint(address, "totalSupply()").await.ok();

        Ok(TokenDescriptor {
            contract: contract.clone(),
            name,
            symbol,
            decimals: decimals.low_u32() as u8,
            total_supply,
        })
    }
}
