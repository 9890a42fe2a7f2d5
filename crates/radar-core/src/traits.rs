/*!
 * Radar Traits
 *
 * Fronteiras com os colaboradores externos: fontes de dados das chains,
 * filtro de tokens listados e canal de notificação
 */

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{
    ChainAddress, ListedToken, RawLog, RawTransaction, SignatureInfo, TokenAlert, TokenDescriptor,
};

/// Consulta se um contrato já está listado na exchange.
///
/// Deve ser idempotente: consultas repetidas sem atualização do índice
/// retornam o mesmo resultado.
#[async_trait]
pub trait ListedTokenFilter: Send + Sync {
    async fn is_listed(&self, contract: &ChainAddress) -> Option<ListedToken>;
}

/// Canal de entrega de alertas
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Envia o alerta; `false` indica falha de entrega, nunca pânico
    async fn send_alert(&self, alert: &TokenAlert) -> bool;
}

/// Fonte de metadados de tokens
#[async_trait]
pub trait TokenMetadataSource: Send + Sync {
    async fn token_descriptor(&self, contract: &ChainAddress) -> Result<TokenDescriptor>;
}

/// Fonte de dados para chains baseadas em logs de eventos
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Altura do bloco mais recente
    async fn head_height(&self) -> Result<u64>;

    /// Logs `Transfer` cujo destinatário é `wallet`, no intervalo fechado `[from, to]`
    async fn transfer_logs(&self, wallet: &ChainAddress, from: u64, to: u64) -> Result<Vec<RawLog>>;

    /// Timestamp unix do bloco
    async fn block_timestamp(&self, height: u64) -> Result<u64>;
}

/// Fonte de dados para chains varridas por assinaturas
#[async_trait]
pub trait SignatureSource: Send + Sync {
    /// Assinaturas mais recentes envolvendo `wallet`, da mais nova para a mais antiga
    async fn recent_signatures(&self, wallet: &ChainAddress, limit: usize) -> Result<Vec<SignatureInfo>>;

    /// Transação confirmada; `None` se ainda não disponível
    async fn transaction(&self, signature: &str) -> Result<Option<RawTransaction>>;
}
