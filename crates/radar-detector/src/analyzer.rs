use crate::config::HeuristicConfig;
use radar_core::types::{
    AnalysisResult, ChainAddress, RiskLevel, ScoreDimension, TokenDescriptor, TransferRecord,
};
use radar_core::utils::{format_thousands, normalize_amount};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Marcadores que tornam um aviso crítico para o nível de risco
const CRITICAL_MARKERS: [&str; 2] = ["⚠️", "sybil"];

#[derive(Default)]
struct Findings {
    patterns: Vec<String>,
    warnings: Vec<String>,
}

/// Analisador de confiança multidimensional.
///
/// Função pura sobre as transferências acumuladas de um contrato: não faz I/O
/// e o mesmo conjunto de entradas sempre produz o mesmo resultado.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceAnalyzer {
    config: HeuristicConfig,
}

impl ConfidenceAnalyzer {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    pub fn analyze(
        &self,
        transfers: &[TransferRecord],
        senders: &HashSet<ChainAddress>,
        token: &TokenDescriptor,
    ) -> AnalysisResult {
        let mut findings = Findings::default();
        let mut scores = BTreeMap::new();

        scores.insert(ScoreDimension::BasicStats, self.basic_stats(transfers, senders, &mut findings));
        scores.insert(ScoreDimension::TimePattern, self.time_pattern(transfers, &mut findings));
        scores.insert(
            ScoreDimension::AmountDistribution,
            self.amount_distribution(transfers, token, &mut findings),
        );
        scores.insert(ScoreDimension::SybilDetection, self.sybil_detection(transfers, senders, &mut findings));

        let confidence = self.overall_confidence(&scores);
        let risk_level = risk_level(confidence, &findings.warnings);
        let recommendation = recommendation(confidence, risk_level).to_string();

        AnalysisResult {
            confidence,
            risk_level,
            patterns: findings.patterns,
            warnings: findings.warnings,
            recommendation,
            scores,
        }
    }

    fn basic_stats(
        &self,
        transfers: &[TransferRecord],
        senders: &HashSet<ChainAddress>,
        findings: &mut Findings,
    ) -> f64 {
        let mut score = 1.0;
        let count = transfers.len();

        if count < 2 {
            findings.warnings.push("Poucas transferências (< 2)".to_string());
            score -= 0.3;
        } else if count < 3 {
            findings.warnings.push("Transferências ainda escassas (< 3)".to_string());
            score -= 0.1;
        } else {
            findings.patterns.push(format!("{} transferências encontradas", count));
        }

        let min_senders = self.config.min_unique_senders;
        if senders.len() < min_senders {
            findings
                .warnings
                .push(format!("Poucos remetentes independentes (< {})", min_senders));
            score -= 0.3;
        } else {
            findings.patterns.push(format!("{} remetentes independentes", senders.len()));
        }

        if count > 0 {
            let mut per_sender: HashMap<&ChainAddress, usize> = HashMap::new();
            for t in transfers {
                *per_sender.entry(&t.from).or_default() += 1;
            }
            let top = per_sender.values().copied().max().unwrap_or(0);
            let concentration = top as f64 / count as f64;
            if concentration > self.config.max_sender_concentration {
                findings.warnings.push(format!(
                    "Remetentes concentrados ({:.1}% de um único endereço)",
                    concentration * 100.0
                ));
                score -= 0.2;
            }
        }

        clamp_unit(score)
    }

    fn time_pattern(&self, transfers: &[TransferRecord], findings: &mut Findings) -> f64 {
        let mut score = 1.0;
        if transfers.len() < 2 {
            return score;
        }

        let timestamps = sorted_timestamps(transfers);
        if timestamps.len() < 2 {
            return score;
        }

        let close = self.close_intervals(&timestamps);
        if close as f64 > (timestamps.len() - 1) as f64 * self.config.close_interval_ratio {
            findings.warnings.push(format!(
                "{} transferências com intervalo muito curto (< {}s)",
                close, self.config.same_timestamp_tolerance
            ));
            score -= 0.3;
            findings.patterns.push("Suspeita de operação em lote".to_string());
        }

        let span = (timestamps[timestamps.len() - 1] - timestamps[0]) as f64;
        let hours = span / 3600.0;
        if hours < 1.0 {
            findings
                .patterns
                .push(format!("Todas as transferências em {:.0} minutos", span / 60.0));
        } else if hours < 24.0 {
            findings.patterns.push(format!("Todas as transferências em {:.1} horas", hours));
        } else {
            findings
                .patterns
                .push(format!("Transferências ao longo de {:.1} dias", hours / 24.0));
            score += 0.1;
        }

        clamp_unit(score)
    }

    fn amount_distribution(
        &self,
        transfers: &[TransferRecord],
        token: &TokenDescriptor,
        findings: &mut Findings,
    ) -> f64 {
        let mut score = 1.0;
        let n = transfers.len();
        if n < 2 {
            return score;
        }

        let amounts: Vec<f64> = transfers
            .iter()
            .map(|t| normalize_amount(&t.amount, token.decimals))
            .collect();

        let distinct = amounts.iter().map(|a| a.to_bits()).collect::<HashSet<_>>().len();
        if (distinct as f64) < n as f64 * self.config.min_amount_diversity {
            findings
                .warnings
                .push(format!("Valores muito parecidos (apenas {} valores distintos)", distinct));
            score -= 0.3;
            findings.patterns.push("Suspeita de teste em lote".to_string());
        }

        let total: f64 = amounts.iter().sum();
        let mean = total / n as f64;
        let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let cv = if mean > 0.0 { variance.sqrt() / mean } else { 0.0 };
        if cv < self.config.min_variation_coefficient {
            findings.warnings.push("Variação de valores extremamente baixa".to_string());
            score -= 0.2;
        }

        let symbol = if token.symbol.is_empty() { "tokens" } else { token.symbol.as_str() };
        findings
            .patterns
            .push(format!("Total: {} {}", format_thousands(total, 0), symbol));
        findings
            .patterns
            .push(format!("Média: {} {}", format_thousands(mean, 0), symbol));

        clamp_unit(score)
    }

    fn sybil_detection(
        &self,
        transfers: &[TransferRecord],
        senders: &HashSet<ChainAddress>,
        findings: &mut Findings,
    ) -> f64 {
        let mut score = 1.0;
        let mut indicators = 0;

        if senders.len() < self.config.min_unique_senders {
            indicators += 1;
        }

        if transfers.len() >= 2 {
            let timestamps = sorted_timestamps(transfers);
            if timestamps.len() >= 2 {
                let close = self.close_intervals(&timestamps);
                if close as f64 > (timestamps.len() - 1) as f64 * self.config.close_interval_ratio {
                    indicators += 1;
                }
            }
        }

        let distinct_raw = transfers.iter().map(|t| t.amount).collect::<HashSet<_>>().len();
        if (distinct_raw as f64) < transfers.len() as f64 * self.config.min_amount_diversity {
            indicators += 1;
        }

        if indicators >= 2 {
            findings.warnings.push(format!(
                "⚠️ Risco de ataque sybil: {} indicadores suspeitos",
                indicators
            ));
            score -= 0.4;
        } else if indicators == 1 {
            findings.warnings.push("Leve indício de ataque sybil".to_string());
            score -= 0.2;
        }

        clamp_unit(score)
    }

    fn close_intervals(&self, sorted: &[u64]) -> usize {
        sorted
            .windows(2)
            .filter(|w| w[1] - w[0] < self.config.same_timestamp_tolerance)
            .count()
    }

    fn overall_confidence(&self, scores: &BTreeMap<ScoreDimension, f64>) -> f64 {
        let w = &self.config.weights;
        let mut weighted = 0.0;
        let mut total = 0.0;
        for (dimension, score) in scores {
            let weight = match dimension {
                ScoreDimension::BasicStats => w.basic_stats,
                ScoreDimension::TimePattern => w.time_pattern,
                ScoreDimension::AmountDistribution => w.amount_distribution,
                ScoreDimension::SybilDetection => w.sybil_detection,
            };
            weighted += score * weight;
            total += weight;
        }
        if total > 0.0 {
            clamp_unit(weighted / total)
        } else {
            0.5
        }
    }
}

/// Nível de risco a partir da confiança e dos avisos emitidos
pub fn risk_level(confidence: f64, warnings: &[String]) -> RiskLevel {
    let critical = warnings.iter().any(|w| {
        let lower = w.to_lowercase();
        CRITICAL_MARKERS.iter().any(|m| lower.contains(m))
    });

    if confidence >= 0.7 && !critical {
        RiskLevel::Low
    } else if confidence >= 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Texto de recomendação para a combinação confiança/risco
pub fn recommendation(confidence: f64, risk: RiskLevel) -> &'static str {
    if confidence >= 0.8 && risk == RiskLevel::Low {
        "🟢 Forte recomendação: sinal de alta confiança validado em várias dimensões, acompanhar de perto"
    } else if confidence >= 0.6 && matches!(risk, RiskLevel::Low | RiskLevel::Medium) {
        "🟡 Recomendação cautelosa: confiança moderada, continuar observando e aguardar mais sinais"
    } else if confidence >= 0.4 {
        "🟠 Apenas observar: confiança baixa com pontos suspeitos, observar com cautela"
    } else {
        "🔴 Não recomendado: confiança muito baixa ou risco de ataque sybil, não agir"
    }
}

fn sorted_timestamps(transfers: &[TransferRecord]) -> Vec<u64> {
    let mut ts: Vec<u64> = transfers
        .iter()
        .filter_map(|t| t.timestamp)
        .filter(|t| *t != 0)
        .collect();
    ts.sort_unstable();
    ts
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
