// Delegation - Délégations, unbondings et redélégations
use crate::types::{AccountId, Balance, BlockHeight, Dec, Timestamp};
use serde::{Deserialize, Serialize};

/// Parts d'un délégateur sur un validateur
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    pub delegator: AccountId,
    pub validator: AccountId,
    pub shares: Dec,
}

impl Delegation {
    pub fn new(delegator: AccountId, validator: AccountId, shares: Dec) -> Self {
        Self {
            delegator,
            validator,
            shares,
        }
    }

    /// Délégation de l'opérateur sur son propre validateur
    pub fn is_self_delegation(&self) -> bool {
        self.delegator == self.validator
    }
}

/// Entrée d'unbonding en cours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegationEntry {
    /// Hauteur de création, utilisée pour le slash
    pub creation_height: BlockHeight,
    pub completion_time: Timestamp,
    /// Tokens à la création
    pub initial_balance: Balance,
    /// Tokens à rendre à maturité
    pub balance: Balance,
}

impl UnbondingDelegationEntry {
    pub fn is_mature(&self, now: Timestamp) -> bool {
        self.completion_time <= now
    }
}

/// Unbondings d'une paire (délégateur, validateur)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingDelegation {
    pub delegator: AccountId,
    pub validator: AccountId,
    pub entries: Vec<UnbondingDelegationEntry>,
}

impl UnbondingDelegation {
    pub fn new(delegator: AccountId, validator: AccountId) -> Self {
        Self {
            delegator,
            validator,
            entries: Vec::new(),
        }
    }

    /// Ajoute une entrée; fusionne avec une entrée du même bloc et de même maturité
    pub fn add_entry(&mut self, creation_height: BlockHeight, completion_time: Timestamp, balance: Balance) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.completion_time == completion_time && e.creation_height == creation_height)
        {
            entry.initial_balance += balance;
            entry.balance += balance;
            return;
        }

        self.entries.push(UnbondingDelegationEntry {
            creation_height,
            completion_time,
            initial_balance: balance,
            balance,
        });
    }

    /// Retire et renvoie les entrées arrivées à maturité
    pub fn remove_mature(&mut self, now: Timestamp) -> Vec<UnbondingDelegationEntry> {
        let (mature, pending): (Vec<_>, Vec<_>) = self.entries.drain(..).partition(|e| e.is_mature(now));
        self.entries = pending;
        mature
    }
}

/// Entrée de redélégation en cours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedelegationEntry {
    pub creation_height: BlockHeight,
    pub completion_time: Timestamp,
    /// Tokens déplacés à la création
    pub initial_balance: Balance,
    /// Parts créées sur le validateur destination
    pub shares_dst: Dec,
}

impl RedelegationEntry {
    pub fn is_mature(&self, now: Timestamp) -> bool {
        self.completion_time <= now
    }
}

/// Redélégations d'un triplet (délégateur, source, destination)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redelegation {
    pub delegator: AccountId,
    pub validator_src: AccountId,
    pub validator_dst: AccountId,
    pub entries: Vec<RedelegationEntry>,
}

impl Redelegation {
    pub fn new(delegator: AccountId, validator_src: AccountId, validator_dst: AccountId) -> Self {
        Self {
            delegator,
            validator_src,
            validator_dst,
            entries: Vec::new(),
        }
    }

    pub fn add_entry(
        &mut self,
        creation_height: BlockHeight,
        completion_time: Timestamp,
        balance: Balance,
        shares_dst: Dec,
    ) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.completion_time == completion_time && e.creation_height == creation_height)
        {
            entry.initial_balance += balance;
            entry.shares_dst = entry.shares_dst.add(shares_dst);
            return;
        }

        self.entries.push(RedelegationEntry {
            creation_height,
            completion_time,
            initial_balance: balance,
            shares_dst,
        });
    }

    pub fn remove_mature(&mut self, now: Timestamp) -> Vec<RedelegationEntry> {
        let (mature, pending): (Vec<_>, Vec<_>) = self.entries.drain(..).partition(|e| e.is_mature(now));
        self.entries = pending;
        mature
    }

    pub fn has_immature_entry(&self, now: Timestamp) -> bool {
        self.entries.iter().any(|e| !e.is_mature(now))
    }
}
