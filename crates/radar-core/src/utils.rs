/*!
 * Radar Utils
 *
 * Conversões numéricas, formatação e helpers de tópicos EVM
 */

use ethereum_types::{Address, H256, U256};
use tiny_keccak::{Hasher, Keccak};

/// Assinatura do evento ERC-20 `Transfer`
pub const TRANSFER_EVENT_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Calcula o hash Keccak-256 de dados
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut result = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut result);
    result
}

/// topic0 do evento `Transfer`
pub fn transfer_event_topic() -> H256 {
    H256(keccak256(TRANSFER_EVENT_SIGNATURE.as_bytes()))
}

/// Endereço alinhado à direita em 32 bytes, como aparece em tópicos indexados
pub fn address_to_topic(address: &Address) -> H256 {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_bytes());
    H256(out)
}

/// Extrai o endereço dos últimos 20 bytes de um tópico
pub fn topic_to_address(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

/// Converte U256 para f64 sem truncar para 128 bits
pub fn u256_to_f64(value: &U256) -> f64 {
    value
        .0
        .iter()
        .enumerate()
        .map(|(i, limb)| (*limb as f64) * 2f64.powi(64 * i as i32))
        .sum()
}

/// Quantidade em unidades inteiras do token
pub fn normalize_amount(amount: &U256, decimals: u8) -> f64 {
    u256_to_f64(amount) / 10f64.powi(decimals as i32)
}

/// Formata com separador de milhar e `precision` casas decimais
pub fn format_thousands(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*}", precision, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Abrevia identificadores longos: `0x28c6...1d60`
pub fn shorten(value: &str, prefix: usize, suffix: usize) -> String {
    if value.is_empty() {
        return "N/A".to_string();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= prefix + suffix {
        return value.to_string();
    }
    let head: String = chars[..prefix].iter().collect();
    let tail: String = chars[chars.len() - suffix..].iter().collect();
    format!("{}...{}", head, tail)
}
