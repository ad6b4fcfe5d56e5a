// Params - Paramètres ajustables du module de staking
use crate::types::{Coin, Duration, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};

/// 3 semaines
pub const DEFAULT_UNBONDING_TIME: Duration = 21 * SECONDS_PER_DAY;

pub const DEFAULT_MAX_VALIDATORS: u16 = 100;

/// Entrées max par paire d'unbonding ou triplet de redélégation
pub const DEFAULT_MAX_ENTRIES: u16 = 7;

pub const DEFAULT_BOND_DENOM: &str = "poc";

/// Période de gel de l'auto-délégation: 1 an
pub const DEFAULT_FROZEN_TIME: Duration = 365 * SECONDS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Durée d'unbonding en secondes
    pub unbonding_time: Duration,
    pub max_validators: u16,
    pub max_entries: u16,
    pub bond_denom: String,
    /// Durée après création pendant laquelle l'auto-délégation ne peut baisser
    pub frozen_time: Duration,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            unbonding_time: DEFAULT_UNBONDING_TIME,
            max_validators: DEFAULT_MAX_VALIDATORS,
            max_entries: DEFAULT_MAX_ENTRIES,
            bond_denom: DEFAULT_BOND_DENOM.to_string(),
            frozen_time: DEFAULT_FROZEN_TIME,
        }
    }
}

/// Paramètres invalides
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("staking parameter BondDenom can't be an empty string")]
    EmptyBondDenom,

    #[error("invalid bond denomination: {0}")]
    InvalidBondDenom(String),

    #[error("staking parameter MaxValidators must be a positive integer")]
    ZeroMaxValidators,

    #[error("staking parameter MaxEntries must be a positive integer")]
    ZeroMaxEntries,
}

impl Params {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.bond_denom.is_empty() {
            return Err(ParamsError::EmptyBondDenom);
        }
        if !Coin::is_valid_denom(&self.bond_denom) {
            return Err(ParamsError::InvalidBondDenom(self.bond_denom.clone()));
        }
        if self.max_validators == 0 {
            return Err(ParamsError::ZeroMaxValidators);
        }
        if self.max_entries == 0 {
            return Err(ParamsError::ZeroMaxEntries);
        }
        Ok(())
    }
}
