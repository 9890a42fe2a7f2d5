/*!
 * Radar Notify
 *
 * Cartões interativos de alerta enviados para um webhook de bot de chat
 */

use async_trait::async_trait;
use radar_core::traits::AlertNotifier;
use radar_core::types::{AlertLevel, TokenAlert};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Tipo de erro retornado pelo notificador.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("erro ao enviar alerta: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook recusou a mensagem: {0}")]
    Rejected(String),
}

/// Resposta do webhook; bots diferentes usam `code` ou `StatusCode`.
#[derive(Debug, Default, Deserialize)]
struct WebhookResponse {
    code: Option<i64>,
    msg: Option<String>,
    #[serde(rename = "StatusCode")]
    status_code: Option<i64>,
    #[serde(rename = "StatusMessage")]
    status_message: Option<String>,
}

impl WebhookResponse {
    fn accepted(&self) -> bool {
        self.code == Some(0) || self.status_code == Some(0)
    }

    fn reason(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.status_message.clone())
            .unwrap_or_else(|| "erro desconhecido".to_string())
    }
}

/// Política de reenvio
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Espera após o webhook recusar a mensagem
    pub rejected_delay: Duration,
    /// Espera após uma falha de rede
    pub network_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            rejected_delay: Duration::from_secs(1),
            network_delay: Duration::from_secs(2),
        }
    }
}

/// Barra de 10 posições proporcional à confiança
pub fn confidence_bar(confidence: f64) -> String {
    let filled = ((confidence.clamp(0.0, 1.0) * 10.0) as usize).min(10);
    format!("{}{}", "█".repeat(filled), "▒".repeat(10 - filled))
}

fn field(short: bool, content: String) -> Value {
    json!({ "is_short": short, "text": { "tag": "lark_md", "content": content } })
}

fn bullet_list(items: &[String]) -> String {
    items.iter().take(3).map(|i| format!("• {}", i)).collect::<Vec<_>>().join("\n")
}

/// Monta o cartão interativo de um alerta
pub fn build_alert_card(alert: &TokenAlert) -> Value {
    let (template, icon) = match alert.level {
        AlertLevel::High => ("red", "🚨🚨🚨"),
        AlertLevel::Medium => ("orange", "⚡"),
    };
    let analysis = &alert.analysis;
    let symbol = if alert.token.symbol.is_empty() { "UNKNOWN" } else { alert.token.symbol.as_str() };
    let name = if alert.token.name.is_empty() { "Token desconhecido" } else { alert.token.name.as_str() };

    let mut elements = vec![
        json!({
            "tag": "div",
            "fields": [
                field(true, format!("**Símbolo**\n{}", symbol)),
                field(true, format!("**Nome**\n{}", name)),
                field(false, format!("**Contrato**\n`{}`", alert.contract)),
            ]
        }),
        json!({ "tag": "hr" }),
        json!({
            "tag": "div",
            "fields": [
                field(true, format!("**Transferências**\n{}", alert.transfer_count)),
                field(true, format!("**Remetentes únicos**\n{}", alert.unique_senders)),
                field(
                    true,
                    format!("**Confiança**\n{:.1}% {}", analysis.confidence * 100.0, confidence_bar(analysis.confidence)),
                ),
                field(true, format!("**Risco**\n{}", analysis.risk_level.label())),
            ]
        }),
        json!({ "tag": "hr" }),
        json!({
            "tag": "div",
            "text": { "tag": "lark_md", "content": format!("**📊 Análise**\n{}", analysis.recommendation) }
        }),
    ];

    if !analysis.patterns.is_empty() {
        elements.push(json!({
            "tag": "div",
            "text": { "tag": "lark_md", "content": format!("**✅ Padrões**\n{}", bullet_list(&analysis.patterns)) }
        }));
    }
    if !analysis.warnings.is_empty() {
        elements.push(json!({
            "tag": "div",
            "text": { "tag": "lark_md", "content": format!("**⚠️ Avisos**\n{}", bullet_list(&analysis.warnings)) }
        }));
    }

    elements.push(json!({ "tag": "hr" }));
    elements.push(json!({
        "tag": "action",
        "actions": [{
            "tag": "button",
            "text": { "tag": "plain_text", "content": "Ver contrato no explorer" },
            "type": "default",
            "url": alert.chain.explorer_token_url(&alert.contract),
        }]
    }));
    elements.push(json!({
        "tag": "note",
        "elements": [{
            "tag": "plain_text",
            "content": format!("Detectado em: {}", alert.detected_at.format("%Y-%m-%d %H:%M:%S UTC")),
        }]
    }));

    json!({
        "config": { "wide_screen_mode": true },
        "header": {
            "template": template,
            "title": {
                "tag": "plain_text",
                "content": format!("{} [{}] Alerta {} de novo token", icon, alert.chain, alert.level.as_str()),
            }
        },
        "elements": elements,
    })
}

/// Cliente de webhook para alertas de novos tokens.
pub struct WebhookNotifier {
    endpoint: String,
    client: Client,
    retry: RetryPolicy,
}

impl WebhookNotifier {
    /// Cria uma nova instância apontando para a URL do webhook.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Uma única tentativa de envio.
    async fn post(&self, payload: &Value) -> Result<(), NotifyError> {
        let body: WebhookResponse = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await?
            .json()
            .await
            .unwrap_or_default();
        if body.accepted() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(body.reason()))
        }
    }

    /// Envia com reenvio; `true` quando o webhook confirma o recebimento.
    pub async fn send(&self, payload: &Value) -> bool {
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            let delay = match self.post(payload).await {
                Ok(()) => return true,
                Err(e @ NotifyError::Rejected(_)) => {
                    warn!(attempt, attempts, error = %e, "Webhook recusou o alerta");
                    self.retry.rejected_delay
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Falha de rede ao enviar alerta");
                    self.retry.network_delay
                }
            };
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        false
    }

    /// Envia um cartão de teste para validar o webhook na inicialização.
    pub async fn send_test_message(&self) -> bool {
        let payload = json!({
            "msg_type": "interactive",
            "card": {
                "header": {
                    "template": "blue",
                    "title": { "tag": "plain_text", "content": "🧪 Teste de notificação" }
                },
                "elements": [
                    {
                        "tag": "div",
                        "text": { "tag": "lark_md", "content": "**listing-radar**\nWebhook configurado com sucesso ✅" }
                    },
                    {
                        "tag": "note",
                        "elements": [{
                            "tag": "plain_text",
                            "content": format!("Enviado em: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
                        }]
                    }
                ]
            }
        });
        self.send(&payload).await
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn send_alert(&self, alert: &TokenAlert) -> bool {
        let payload = json!({ "msg_type": "interactive", "card": build_alert_card(alert) });
        let delivered = self.send(&payload).await;
        if delivered {
            info!(chain = %alert.chain, contract = %alert.contract, level = alert.level.as_str(), "Alerta entregue");
        }
        delivered
    }
}
