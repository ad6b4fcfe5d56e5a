// Invariants - Contrôles de cohérence de l'état (après chaque bloc en replay)
use crate::bank::Pool;
use crate::context::Context;
use crate::types::{AccountId, Balance, Dec};
use std::collections::BTreeMap;
use std::fmt;

use super::Keeper;
use crate::staking::error::StakingError;
use crate::staking::keys;
use crate::staking::validator::BondStatus;

/// Invariant violé
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub name: &'static str,
    pub detail: String,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.detail)
    }
}

impl Keeper {
    /// Tous les invariants; un vecteur vide signifie un état cohérent
    pub fn check_invariants(&self, ctx: &Context) -> Result<Vec<InvariantViolation>, StakingError> {
        let mut broken = Vec::new();
        broken.extend(self.module_accounts_invariant(ctx)?);
        broken.extend(self.delegator_shares_invariant(ctx)?);
        broken.extend(self.positive_delegation_invariant(ctx)?);
        broken.extend(self.power_index_invariant(ctx)?);
        Ok(broken)
    }

    /// Pools = tokens des validateurs (+ soldes d'unbonding pour le pool non-bonded)
    pub fn module_accounts_invariant(&self, ctx: &Context) -> Result<Option<InvariantViolation>, StakingError> {
        let mut bonded: Balance = 0;
        let mut not_bonded: Balance = 0;

        for validator in self.get_all_validators(ctx)? {
            match validator.status {
                BondStatus::Bonded => bonded += validator.tokens,
                BondStatus::Unbonding | BondStatus::Unbonded => not_bonded += validator.tokens,
            }
        }
        for ubd in self.get_all_unbonding_delegations(ctx)? {
            not_bonded += ubd.entries.iter().map(|e| e.balance).sum::<Balance>();
        }

        let bonded_pool = self.pool_tokens(ctx, Pool::Bonded)?;
        let not_bonded_pool = self.pool_tokens(ctx, Pool::NotBonded)?;

        if bonded != bonded_pool || not_bonded != not_bonded_pool {
            return Ok(Some(InvariantViolation {
                name: "module-accounts",
                detail: format!(
                    "bonded pool {} vs sum {}, not-bonded pool {} vs sum {}",
                    bonded_pool, bonded, not_bonded_pool, not_bonded
                ),
            }));
        }
        Ok(None)
    }

    /// Somme des parts des délégations = parts du validateur
    pub fn delegator_shares_invariant(&self, ctx: &Context) -> Result<Vec<InvariantViolation>, StakingError> {
        let mut sums: BTreeMap<AccountId, Dec> = BTreeMap::new();
        for delegation in self.get_all_delegations(ctx)? {
            let sum = sums.entry(delegation.validator).or_default();
            *sum = sum.add(delegation.shares);
        }

        let mut broken = Vec::new();
        for validator in self.get_all_validators(ctx)? {
            let sum = sums.remove(&validator.operator).unwrap_or_default();
            if sum != validator.delegator_shares {
                broken.push(InvariantViolation {
                    name: "delegator-shares",
                    detail: format!(
                        "validator {} has {} shares but delegations sum to {}",
                        validator.operator, validator.delegator_shares, sum
                    ),
                });
            }
        }
        for (operator, sum) in sums {
            broken.push(InvariantViolation {
                name: "delegator-shares",
                detail: format!("{} shares delegated to unknown validator {}", sum, operator),
            });
        }
        Ok(broken)
    }

    /// Aucune délégation stockée à zéro part
    pub fn positive_delegation_invariant(&self, ctx: &Context) -> Result<Vec<InvariantViolation>, StakingError> {
        Ok(self
            .get_all_delegations(ctx)?
            .into_iter()
            .filter(|d| d.shares.is_zero())
            .map(|d| InvariantViolation {
                name: "positive-delegation",
                detail: format!("delegation ({}, {}) has zero shares", d.delegator, d.validator),
            })
            .collect())
    }

    /// Chaque validateur libre est indexé à ses tokens courants, et seulement eux
    pub fn power_index_invariant(&self, ctx: &Context) -> Result<Vec<InvariantViolation>, StakingError> {
        let mut expected: Vec<Vec<u8>> = self
            .get_all_validators(ctx)?
            .iter()
            .filter(|v| !v.jailed)
            .map(keys::validator_by_power_index_key)
            .collect();
        expected.sort();

        let actual: Vec<Vec<u8>> = ctx
            .store()
            .prefix_scan(&[keys::VALIDATORS_BY_POWER_PREFIX])?
            .into_iter()
            .map(|(k, _)| k)
            .collect();

        if expected != actual {
            return Ok(vec![InvariantViolation {
                name: "power-index",
                detail: format!("{} index entries, {} unjailed validators", actual.len(), expected.len()),
            }]);
        }
        Ok(Vec::new())
    }
}
