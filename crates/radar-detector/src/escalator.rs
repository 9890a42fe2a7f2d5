use crate::buffer::ContractBuffer;
use crate::config::AlertPolicy;
use crate::pipeline::WatcherStats;
use chrono::Utc;
use radar_core::traits::{AlertNotifier, ListedTokenFilter};
use radar_core::types::{AlertLevel, AnalysisResult, TokenAlert, TokenDescriptor};
use std::sync::Arc;
use tracing::{info, warn};

/// Resultado de uma avaliação de alerta
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationOutcome {
    /// O contrato já gerou alerta antes
    AlreadySent,
    /// Nenhum limiar atingido
    BelowThreshold,
    /// HIGH bloqueado pela reverificação: o token já está listado
    Suppressed { symbol: String },
    /// Alerta emitido; `delivered` indica o retorno do canal de notificação
    Dispatched { level: AlertLevel, delivered: bool },
}

/// Aplica a política de alertas sobre um buffer recém-analisado.
pub struct AlertEscalator {
    policy: AlertPolicy,
    notifier: Option<Arc<dyn AlertNotifier>>,
}

impl AlertEscalator {
    pub fn new(policy: AlertPolicy, notifier: Option<Arc<dyn AlertNotifier>>) -> Self {
        Self { policy, notifier }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Nível de alerta que a análise atinge, sem efeitos colaterais
    pub fn level_for(&self, buffer: &ContractBuffer, analysis: &AnalysisResult) -> Option<AlertLevel> {
        let high = &self.policy.high;
        let medium = &self.policy.medium;
        let transfers = buffer.transfer_count();

        if analysis.confidence >= high.min_confidence
            && transfers >= high.min_transfers
            && buffer.sender_count() >= high.min_senders
        {
            Some(AlertLevel::High)
        } else if analysis.confidence >= medium.min_confidence && transfers >= medium.min_transfers {
            Some(AlertLevel::Medium)
        } else {
            None
        }
    }

    pub async fn escalate(
        &self,
        buffer: &mut ContractBuffer,
        token: &TokenDescriptor,
        filter: Option<&dyn ListedTokenFilter>,
        stats: &mut WatcherStats,
    ) -> EscalationOutcome {
        if buffer.alert_sent() {
            return EscalationOutcome::AlreadySent;
        }
        let analysis = match buffer.analysis() {
            Some(a) => a.clone(),
            None => return EscalationOutcome::BelowThreshold,
        };
        let level = match self.level_for(buffer, &analysis) {
            Some(level) => level,
            None => return EscalationOutcome::BelowThreshold,
        };

        // Reverificação apenas para HIGH
        if level == AlertLevel::High {
            if let Some(filter) = filter {
                if let Some(listed) = filter.is_listed(buffer.contract()).await {
                    warn!(
                        chain = %buffer.chain(),
                        contract = %buffer.contract(),
                        symbol = %listed.symbol,
                        "Alerta HIGH bloqueado na reverificação: token já listado"
                    );
                    buffer.mark_listed(listed.symbol.clone());
                    return EscalationOutcome::Suppressed { symbol: listed.symbol };
                }
            }
        }

        stats.high_confidence_tokens += 1;
        buffer.mark_alert_sent();

        let alert = TokenAlert {
            level,
            chain: buffer.chain(),
            contract: buffer.contract().clone(),
            token: token.clone(),
            transfer_count: buffer.transfer_count(),
            unique_senders: buffer.sender_count(),
            first_seen: buffer.first_seen(),
            analysis,
            detected_at: Utc::now(),
        };

        info!(
            chain = %alert.chain,
            level = %alert.level,
            contract = %alert.contract,
            symbol = %token.symbol,
            transfers = alert.transfer_count,
            senders = alert.unique_senders,
            confidence = alert.analysis.confidence,
            "Alerta de token não listado"
        );

        let delivered = match &self.notifier {
            Some(notifier) => {
                let ok = notifier.send_alert(&alert).await;
                if !ok {
                    warn!(contract = %alert.contract, "Falha ao entregar alerta ao canal de notificação");
                }
                ok
            }
            None => false,
        };

        EscalationOutcome::Dispatched { level, delivered }
    }
}
