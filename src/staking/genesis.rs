// Genesis - Import/export de l'état du staking
use crate::bank::Pool;
use crate::context::Context;
use crate::types::{AccountId, Balance, Coin, ConsPubKey, Dec, Power};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::delegation::{Delegation, Redelegation, UnbondingDelegation};
use super::error::StakingError;
use super::keeper::Keeper;
use super::params::{Params, ParamsError};
use super::validator::{BondStatus, Validator, ValidatorUpdate};

/// Puissance transmise au consensus lors du dernier EndBlock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastValidatorPower {
    pub address: AccountId,
    pub power: Power,
}

/// État complet du module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
    #[serde(default)]
    pub last_total_power: Power,
    #[serde(default)]
    pub last_validator_powers: Vec<LastValidatorPower>,
    #[serde(default)]
    pub validators: Vec<Validator>,
    #[serde(default)]
    pub delegations: Vec<Delegation>,
    #[serde(default)]
    pub unbonding_delegations: Vec<UnbondingDelegation>,
    #[serde(default)]
    pub redelegations: Vec<Redelegation>,
    /// Export d'une chaîne existante: l'ensemble actif est repris tel quel
    #[serde(default)]
    pub exported: bool,
}

impl Default for GenesisState {
    fn default() -> Self {
        Self {
            params: Params::default(),
            last_total_power: 0,
            last_validator_powers: Vec::new(),
            validators: Vec::new(),
            delegations: Vec::new(),
            unbonding_delegations: Vec::new(),
            redelegations: Vec::new(),
            exported: false,
        }
    }
}

/// Erreurs de genesis
#[derive(Debug, thiserror::Error)]
pub enum GenesisError {
    #[error("Paramètres invalides: {0}")]
    Params(#[from] ParamsError),

    #[error("duplicate validator in genesis state: {0}")]
    DuplicateValidator(AccountId),

    #[error("duplicate consensus pubkey in genesis state: {0}")]
    DuplicatePubKey(ConsPubKey),

    #[error("invalid consensus pubkey for validator {0}")]
    InvalidPubKey(AccountId),

    #[error("validator {0} is bonded and jailed in genesis state")]
    JailedAndBonded(AccountId),

    #[error("validator {0} has zero delegator shares but is not unbonding")]
    ZeroShares(AccountId),

    #[error("genesis record references unknown validator {0}")]
    UnknownValidator(AccountId),

    #[error("delegation from {delegator} to {validator} has zero shares")]
    ZeroDelegation { delegator: AccountId, validator: AccountId },

    #[error("duplicate delegation from {delegator} to {validator} in genesis state")]
    DuplicateDelegation { delegator: AccountId, validator: AccountId },

    #[error("delegator shares of validator {0} overflow")]
    SharesOverflow(AccountId),

    #[error("validator {validator} has {expected} shares but delegations sum to {got}")]
    SharesMismatch { validator: AccountId, expected: Dec, got: Dec },

    #[error("{pool} pool holds {balance} but genesis requires {expected}")]
    PoolMismatch { pool: Pool, balance: Balance, expected: Balance },

    #[error("Erreur staking: {0}")]
    Staking(#[from] StakingError),

    #[error("JSON invalide: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenesisState {
    pub fn from_json(content: &str) -> Result<Self, GenesisError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String, GenesisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Vérifications sans état d'un genesis
pub fn validate_genesis(state: &GenesisState) -> Result<(), GenesisError> {
    state.params.validate()?;

    let mut operators = BTreeSet::new();
    let mut pubkeys = BTreeSet::new();
    for validator in &state.validators {
        if !operators.insert(validator.operator) {
            return Err(GenesisError::DuplicateValidator(validator.operator));
        }
        if !validator.cons_pubkey.is_valid() {
            return Err(GenesisError::InvalidPubKey(validator.operator));
        }
        if !pubkeys.insert(validator.cons_pubkey) {
            return Err(GenesisError::DuplicatePubKey(validator.cons_pubkey));
        }
        if validator.jailed && validator.is_bonded() {
            return Err(GenesisError::JailedAndBonded(validator.operator));
        }
        if validator.delegator_shares.is_zero() && !validator.is_unbonding() {
            return Err(GenesisError::ZeroShares(validator.operator));
        }
    }

    let mut pairs = BTreeSet::new();
    let mut sums: BTreeMap<AccountId, Dec> = BTreeMap::new();
    for delegation in &state.delegations {
        if !operators.contains(&delegation.validator) {
            return Err(GenesisError::UnknownValidator(delegation.validator));
        }
        if delegation.shares.is_zero() {
            return Err(GenesisError::ZeroDelegation {
                delegator: delegation.delegator,
                validator: delegation.validator,
            });
        }
        if !pairs.insert((delegation.delegator, delegation.validator)) {
            return Err(GenesisError::DuplicateDelegation {
                delegator: delegation.delegator,
                validator: delegation.validator,
            });
        }
        let sum = sums.entry(delegation.validator).or_default();
        *sum = sum
            .checked_add(delegation.shares)
            .ok_or(GenesisError::SharesOverflow(delegation.validator))?;
    }
    for validator in &state.validators {
        let got = sums.get(&validator.operator).copied().unwrap_or_default();
        if got != validator.delegator_shares {
            return Err(GenesisError::SharesMismatch {
                validator: validator.operator,
                expected: validator.delegator_shares,
                got,
            });
        }
    }

    for ubd in &state.unbonding_delegations {
        if !operators.contains(&ubd.validator) {
            return Err(GenesisError::UnknownValidator(ubd.validator));
        }
    }
    for red in &state.redelegations {
        for op in [&red.validator_src, &red.validator_dst] {
            if !operators.contains(op) {
                return Err(GenesisError::UnknownValidator(*op));
            }
        }
    }
    for last in &state.last_validator_powers {
        if !operators.contains(&last.address) {
            return Err(GenesisError::UnknownValidator(last.address));
        }
    }

    Ok(())
}

impl Keeper {
    /// Charge un genesis validé et renvoie l'ensemble initial de validateurs
    pub fn init_genesis(&self, ctx: &mut Context, state: &GenesisState) -> Result<Vec<ValidatorUpdate>, GenesisError> {
        validate_genesis(state)?;

        self.set_params(ctx, &state.params)?;
        self.set_last_total_power(ctx, state.last_total_power)?;

        let mut bonded: Balance = 0;
        let mut not_bonded: Balance = 0;

        for validator in &state.validators {
            self.set_validator(ctx, validator)?;
            self.set_validator_by_cons_addr(ctx, validator)?;
            self.set_validator_by_power_index(ctx, validator)?;

            match validator.status {
                BondStatus::Bonded => bonded += validator.tokens,
                BondStatus::Unbonding => {
                    self.insert_validator_queue(ctx, validator)?;
                    not_bonded += validator.tokens;
                }
                BondStatus::Unbonded => not_bonded += validator.tokens,
            }
        }

        for delegation in &state.delegations {
            self.set_delegation(ctx, delegation)?;
        }

        for ubd in &state.unbonding_delegations {
            self.set_unbonding_delegation(ctx, ubd)?;
            for entry in &ubd.entries {
                self.insert_ubd_queue(ctx, ubd, entry.completion_time)?;
                not_bonded += entry.balance;
            }
        }

        for red in &state.redelegations {
            self.set_redelegation(ctx, red)?;
            for entry in &red.entries {
                self.insert_redelegation_queue(ctx, red, entry.completion_time)?;
            }
        }

        self.init_pool(ctx, Pool::Bonded, bonded)?;
        self.init_pool(ctx, Pool::NotBonded, not_bonded)?;

        let updates = if state.exported {
            let mut updates = Vec::with_capacity(state.last_validator_powers.len());
            for last in &state.last_validator_powers {
                let validator = self
                    .get_validator(ctx, &last.address)?
                    .ok_or(GenesisError::UnknownValidator(last.address))?;
                self.set_last_validator_power(ctx, &last.address, validator.cons_pubkey, last.power)?;
                updates.push(ValidatorUpdate {
                    pub_key: validator.cons_pubkey,
                    power: last.power,
                });
            }
            updates
        } else {
            self.apply_and_return_validator_set_updates(ctx)?
        };

        info!(
            "staking genesis loaded: {} validators, {} delegations, {} initial updates",
            state.validators.len(),
            state.delegations.len(),
            updates.len()
        );
        Ok(updates)
    }

    /// Pool vide: on le crédite; sinon son solde doit correspondre
    fn init_pool(&self, ctx: &mut Context, pool: Pool, expected: Balance) -> Result<(), GenesisError> {
        let balance = self.pool_tokens(ctx, pool)?;
        if balance == 0 && expected > 0 {
            let coin = Coin::new(self.bond_denom(ctx)?, expected);
            self.supply()
                .mint_coins(ctx.store_mut(), pool, &coin)
                .map_err(StakingError::from)?;
            return Ok(());
        }
        if balance != expected {
            warn!("{} pool balance {} differs from genesis total {}", pool, balance, expected);
            return Err(GenesisError::PoolMismatch { pool, balance, expected });
        }
        Ok(())
    }

    pub fn export_genesis(&self, ctx: &Context) -> Result<GenesisState, GenesisError> {
        let last_validator_powers = self
            .get_last_validator_powers(ctx)?
            .into_iter()
            .map(|(address, record)| LastValidatorPower {
                address,
                power: record.power,
            })
            .collect();

        Ok(GenesisState {
            params: self.get_params(ctx)?,
            last_total_power: self.get_last_total_power(ctx)?,
            last_validator_powers,
            validators: self.get_all_validators(ctx)?,
            delegations: self.get_all_delegations(ctx)?,
            unbonding_delegations: self.get_all_unbonding_delegations(ctx)?,
            redelegations: self.get_all_redelegations(ctx)?,
            exported: true,
        })
    }
}
