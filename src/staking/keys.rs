// Keys - Schéma de clés du module de staking
//
// Entiers en big-endian pour que l'ordre lexicographique suive l'ordre
// numérique. L'index de puissance stocke (u128::MAX - tokens): une itération
// croissante donne les tokens décroissants, puis l'adresse croissante.

use crate::types::{AccountId, Balance, BlockHeight, ConsAddress, Timestamp};
use serde::{Deserialize, Serialize};

use super::validator::Validator;

pub const LAST_TOTAL_POWER_KEY: &[u8] = &[0x11];
pub const LAST_VALIDATOR_POWER_PREFIX: u8 = 0x12;

pub const VALIDATOR_PREFIX: u8 = 0x21;
pub const VALIDATOR_BY_CONS_ADDR_PREFIX: u8 = 0x22;
pub const VALIDATORS_BY_POWER_PREFIX: u8 = 0x23;

pub const DELEGATION_PREFIX: u8 = 0x31;
pub const UNBONDING_DELEGATION_PREFIX: u8 = 0x32;
pub const UNBONDING_DELEGATION_BY_VAL_PREFIX: u8 = 0x33;
pub const REDELEGATION_PREFIX: u8 = 0x34;
pub const REDELEGATION_BY_SRC_PREFIX: u8 = 0x35;
pub const REDELEGATION_BY_DST_PREFIX: u8 = 0x36;

pub const UNBONDING_QUEUE_PREFIX: u8 = 0x41;
pub const REDELEGATION_QUEUE_PREFIX: u8 = 0x42;
pub const VALIDATOR_QUEUE_PREFIX: u8 = 0x43;

pub const PARAMS_KEY: &[u8] = &[0x51];

const ADDR_LEN: usize = 32;

/// Paire (délégateur, validateur) stockée dans la file d'unbonding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DvPair {
    pub delegator: AccountId,
    pub validator: AccountId,
}

/// Triplet (délégateur, source, destination) stocké dans la file de redélégation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DvvTriplet {
    pub delegator: AccountId,
    pub validator_src: AccountId,
    pub validator_dst: AccountId,
}

fn key(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut k = Vec::with_capacity(len);
    k.push(prefix);
    for part in parts {
        k.extend_from_slice(part);
    }
    k
}

pub fn last_validator_power_key(operator: &AccountId) -> Vec<u8> {
    key(LAST_VALIDATOR_POWER_PREFIX, &[operator.as_bytes()])
}

pub fn validator_key(operator: &AccountId) -> Vec<u8> {
    key(VALIDATOR_PREFIX, &[operator.as_bytes()])
}

pub fn validator_by_cons_addr_key(cons: &ConsAddress) -> Vec<u8> {
    key(VALIDATOR_BY_CONS_ADDR_PREFIX, &[cons.as_bytes()])
}

pub fn validator_by_power_index_key(validator: &Validator) -> Vec<u8> {
    power_index_key(validator.tokens, &validator.operator)
}

pub fn power_index_key(tokens: Balance, operator: &AccountId) -> Vec<u8> {
    let inverted = (u128::MAX - tokens).to_be_bytes();
    key(VALIDATORS_BY_POWER_PREFIX, &[&inverted, operator.as_bytes()])
}

pub fn delegation_key(delegator: &AccountId, validator: &AccountId) -> Vec<u8> {
    key(DELEGATION_PREFIX, &[delegator.as_bytes(), validator.as_bytes()])
}

pub fn delegations_prefix(delegator: &AccountId) -> Vec<u8> {
    key(DELEGATION_PREFIX, &[delegator.as_bytes()])
}

pub fn ubd_key(delegator: &AccountId, validator: &AccountId) -> Vec<u8> {
    key(UNBONDING_DELEGATION_PREFIX, &[delegator.as_bytes(), validator.as_bytes()])
}

pub fn ubds_prefix(delegator: &AccountId) -> Vec<u8> {
    key(UNBONDING_DELEGATION_PREFIX, &[delegator.as_bytes()])
}

pub fn ubd_by_val_index_key(validator: &AccountId, delegator: &AccountId) -> Vec<u8> {
    key(UNBONDING_DELEGATION_BY_VAL_PREFIX, &[validator.as_bytes(), delegator.as_bytes()])
}

pub fn ubds_by_val_prefix(validator: &AccountId) -> Vec<u8> {
    key(UNBONDING_DELEGATION_BY_VAL_PREFIX, &[validator.as_bytes()])
}

pub fn red_key(delegator: &AccountId, src: &AccountId, dst: &AccountId) -> Vec<u8> {
    key(REDELEGATION_PREFIX, &[delegator.as_bytes(), src.as_bytes(), dst.as_bytes()])
}

pub fn reds_prefix(delegator: &AccountId) -> Vec<u8> {
    key(REDELEGATION_PREFIX, &[delegator.as_bytes()])
}

pub fn red_by_src_index_key(src: &AccountId, delegator: &AccountId, dst: &AccountId) -> Vec<u8> {
    key(REDELEGATION_BY_SRC_PREFIX, &[src.as_bytes(), delegator.as_bytes(), dst.as_bytes()])
}

pub fn reds_by_src_prefix(src: &AccountId) -> Vec<u8> {
    key(REDELEGATION_BY_SRC_PREFIX, &[src.as_bytes()])
}

pub fn reds_by_src_and_del_prefix(src: &AccountId, delegator: &AccountId) -> Vec<u8> {
    key(REDELEGATION_BY_SRC_PREFIX, &[src.as_bytes(), delegator.as_bytes()])
}

pub fn red_by_dst_index_key(dst: &AccountId, delegator: &AccountId, src: &AccountId) -> Vec<u8> {
    key(REDELEGATION_BY_DST_PREFIX, &[dst.as_bytes(), delegator.as_bytes(), src.as_bytes()])
}

pub fn reds_by_dst_and_del_prefix(dst: &AccountId, delegator: &AccountId) -> Vec<u8> {
    key(REDELEGATION_BY_DST_PREFIX, &[dst.as_bytes(), delegator.as_bytes()])
}

pub fn ubd_queue_key(time: Timestamp) -> Vec<u8> {
    key(UNBONDING_QUEUE_PREFIX, &[&time.to_be_bytes()])
}

pub fn red_queue_key(time: Timestamp) -> Vec<u8> {
    key(REDELEGATION_QUEUE_PREFIX, &[&time.to_be_bytes()])
}

pub fn validator_queue_key(time: Timestamp, height: BlockHeight) -> Vec<u8> {
    key(VALIDATOR_QUEUE_PREFIX, &[&time.to_be_bytes(), &height.to_be_bytes()])
}

/// Adresse de 32 bytes à la position `offset` (après le préfixe)
pub fn address_at(key: &[u8], offset: usize) -> AccountId {
    let start = 1 + offset * ADDR_LEN;
    let mut bytes = [0u8; ADDR_LEN];
    match key.get(start..start + ADDR_LEN) {
        Some(slice) => bytes.copy_from_slice(slice),
        None => panic!("malformed staking key of length {}", key.len()),
    }
    AccountId::from_bytes(bytes)
}

/// Opérateur en fin de clé d'index de puissance
pub fn operator_from_power_index_key(key: &[u8]) -> AccountId {
    let start = 1 + 16;
    let mut bytes = [0u8; ADDR_LEN];
    match key.get(start..start + ADDR_LEN) {
        Some(slice) => bytes.copy_from_slice(slice),
        None => panic!("malformed power index key of length {}", key.len()),
    }
    AccountId::from_bytes(bytes)
}

/// (temps, hauteur) d'une clé de la file des validateurs
pub fn parse_validator_queue_key(key: &[u8]) -> (Timestamp, BlockHeight) {
    let time = key.get(1..9).and_then(|b| b.try_into().ok()).map(u64::from_be_bytes);
    let height = key.get(9..17).and_then(|b| b.try_into().ok()).map(u64::from_be_bytes);
    match (time, height) {
        (Some(time), Some(height)) => (time, height),
        _ => panic!("malformed validator queue key of length {}", key.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> AccountId {
        AccountId::from_bytes([b; 32])
    }

    #[test]
    fn test_power_index_orders_descending_tokens_then_address() {
        let mut keys = vec![
            power_index_key(10, &addr(1)),
            power_index_key(30, &addr(2)),
            power_index_key(30, &addr(1)),
            power_index_key(0, &addr(0)),
        ];
        keys.sort();

        let order: Vec<AccountId> = keys.iter().map(|k| operator_from_power_index_key(k)).collect();
        assert_eq!(order, vec![addr(1), addr(2), addr(1), addr(0)]);
        assert_eq!(keys[0], power_index_key(30, &addr(1)));
    }

    #[test]
    fn test_queue_keys_sort_by_time() {
        assert!(ubd_queue_key(9) < ubd_queue_key(10));
        assert!(ubd_queue_key(255) < ubd_queue_key(256));
        assert!(validator_queue_key(10, 99) < validator_queue_key(11, 0));
        assert_eq!(parse_validator_queue_key(&validator_queue_key(42, 7)), (42, 7));
    }

    #[test]
    fn test_address_extraction() {
        let k = red_key(&addr(1), &addr(2), &addr(3));
        assert_eq!(address_at(&k, 0), addr(1));
        assert_eq!(address_at(&k, 1), addr(2));
        assert_eq!(address_at(&k, 2), addr(3));
        assert!(k.starts_with(&reds_prefix(&addr(1))));
    }
}
