use serde::{Deserialize, Serialize};

/// Pesos das dimensões no cálculo da confiança
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub basic_stats: f64,
    pub time_pattern: f64,
    pub amount_distribution: f64,
    pub sybil_detection: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            basic_stats: 0.30,
            time_pattern: 0.20,
            amount_distribution: 0.20,
            sybil_detection: 0.30,
        }
    }
}

/// Limiares das heurísticas do analisador
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Mínimo de remetentes distintos para não contar como indício sybil
    pub min_unique_senders: usize,
    /// Fração máxima de transferências vindas de um único remetente
    pub max_sender_concentration: f64,
    /// Intervalo (segundos) abaixo do qual duas transferências são "próximas"
    pub same_timestamp_tolerance: u64,
    /// Fração de intervalos próximos acima da qual se suspeita de lote
    pub close_interval_ratio: f64,
    /// Fração mínima de valores distintos
    pub min_amount_diversity: f64,
    /// Coeficiente de variação mínimo dos valores
    pub min_variation_coefficient: f64,
    pub weights: ScoreWeights,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            min_unique_senders: 2,
            max_sender_concentration: 0.7,
            same_timestamp_tolerance: 60,
            close_interval_ratio: 0.5,
            min_amount_diversity: 0.3,
            min_variation_coefficient: 0.1,
            weights: ScoreWeights::default(),
        }
    }
}

/// Condições do alerta HIGH
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighAlertThreshold {
    pub min_confidence: f64,
    pub min_transfers: usize,
    pub min_senders: usize,
}

/// Condições do alerta MEDIUM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediumAlertThreshold {
    pub min_confidence: f64,
    pub min_transfers: usize,
}

/// Política de escalonamento de alertas
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPolicy {
    pub high: HighAlertThreshold,
    pub medium: MediumAlertThreshold,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            high: HighAlertThreshold { min_confidence: 0.8, min_transfers: 3, min_senders: 2 },
            medium: MediumAlertThreshold { min_confidence: 0.6, min_transfers: 5 },
        }
    }
}
