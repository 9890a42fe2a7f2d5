//! Normalização de eventos brutos das chains em `TransferRecord`.

use ethereum_types::U256;
use radar_core::error::{Error, Result};
use radar_core::types::{ChainAddress, RawLog, RawTransaction, TokenBalance, TransferRecord};
use radar_core::utils::{topic_to_address, transfer_event_topic};

/// Decodifica um log ERC-20 `Transfer`. O timestamp fica em aberto.
pub fn decode_transfer_log(log: &RawLog) -> Result<TransferRecord> {
    if log.topics.len() < 3 {
        return Err(Error::DecodeError(format!(
            "log Transfer com {} tópicos, esperado 3",
            log.topics.len()
        )));
    }
    if log.topics[0] != transfer_event_topic() {
        return Err(Error::DecodeError("tópico não corresponde ao evento Transfer".into()));
    }
    if log.data.len() < 32 {
        return Err(Error::DecodeError(format!(
            "dados do log com {} bytes, esperado >= 32",
            log.data.len()
        )));
    }
    let block_height = log
        .block_number
        .ok_or_else(|| Error::DecodeError("log sem número de bloco".into()))?;

    Ok(TransferRecord {
        block_height,
        tx_id: log
            .transaction_hash
            .map(|h| format!("0x{:x}", h))
            .unwrap_or_default(),
        contract: log.address.clone(),
        from: topic_to_address(&log.topics[1]).into(),
        to: topic_to_address(&log.topics[2]).into(),
        amount: U256::from_big_endian(&log.data[..32]),
        timestamp: None,
    })
}

/// Créditos de token recebidos por `wallet` numa transação.
///
/// Compara saldos pós/pré por índice de conta; cada delta positivo numa conta
/// de `wallet` vira uma transferência com o mint como contrato. O remetente é
/// o dono de uma conta debitada do mesmo mint, quando existir.
pub fn extract_balance_deltas(tx: &RawTransaction, wallet: &ChainAddress) -> Vec<TransferRecord> {
    let pre_amount = |index: u32| -> U256 {
        tx.pre_token_balances
            .iter()
            .find(|b| b.account_index == index)
            .map(|b| b.amount)
            .unwrap_or_default()
    };
    let post_amount = |index: u32| -> U256 {
        tx.post_token_balances
            .iter()
            .find(|b| b.account_index == index)
            .map(|b| b.amount)
            .unwrap_or_default()
    };
    let owned_by_wallet =
        |b: &TokenBalance| b.owner.as_deref().map(ChainAddress::new).as_ref() == Some(wallet);

    let mut out = Vec::new();
    for post in tx.post_token_balances.iter().filter(|b| owned_by_wallet(b)) {
        let before = pre_amount(post.account_index);
        if post.amount <= before {
            continue;
        }

        let sender = tx
            .pre_token_balances
            .iter()
            .filter(|b| b.mint == post.mint && !owned_by_wallet(b))
            .find(|b| post_amount(b.account_index) < b.amount)
            .and_then(|b| b.owner.as_deref())
            .map(ChainAddress::new)
            .unwrap_or_else(ChainAddress::unknown);

        out.push(TransferRecord {
            block_height: tx.slot,
            tx_id: tx.signature.clone(),
            contract: ChainAddress::new(&post.mint),
            from: sender,
            to: wallet.clone(),
            amount: post.amount - before,
            timestamp: tx.block_time.filter(|t| *t > 0).map(|t| t as u64),
        });
    }
    out
}
