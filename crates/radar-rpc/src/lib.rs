/*!
 * Radar RPC
 *
 * Clientes RPC das chains observadas: EVM via ethers e Solana via JSON-RPC
 */

mod evm;
mod solana;

pub use evm::*;
pub use solana::*;

use radar_core::{error::Result, Error};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Configuração do cliente RPC
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RpcConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Default::default() }
    }
}

/// Repete `op` em falhas de transporte até `max_retries` vezes
pub(crate) async fn with_retry<T, F, Fut>(config: &RpcConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let err = match tokio::time::timeout(config.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e @ Error::RpcError(_))) => e,
            Ok(Err(e)) => return Err(e),
            Err(_) => Error::TimeoutError(format!("{} excedeu {:?}", what, config.timeout)),
        };
        if attempt >= config.max_retries {
            return Err(err);
        }
        attempt += 1;
        debug!(what, attempt, error = %err, "Tentando novamente chamada RPC");
        tokio::time::sleep(config.retry_delay).await;
    }
}
