// Queries - Lectures en lecture seule sur l'état du staking
use crate::bank::Pool;
use crate::context::Context;
use crate::types::{AccountId, Balance};
use serde::{Deserialize, Serialize};

use super::Keeper;
use crate::staking::codec::CodecError;
use crate::staking::delegation::{Delegation, Redelegation, UnbondingDelegation};
use crate::staking::error::StakingError;
use crate::staking::params::Params;
use crate::staking::validator::{BondStatus, Validator};

/// Requêtes servies par le module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum QueryRequest {
    Validator {
        address: AccountId,
    },
    Validators {
        #[serde(default)]
        status: Option<BondStatus>,
    },
    Delegation {
        delegator: AccountId,
        validator: AccountId,
    },
    DelegatorDelegations {
        delegator: AccountId,
    },
    ValidatorDelegations {
        validator: AccountId,
    },
    UnbondingDelegation {
        delegator: AccountId,
        validator: AccountId,
    },
    DelegatorUnbondingDelegations {
        delegator: AccountId,
    },
    Redelegations {
        delegator: AccountId,
        #[serde(default)]
        src: Option<AccountId>,
        #[serde(default)]
        dst: Option<AccountId>,
    },
    Pool,
    Params,
}

/// Délégation accompagnée de sa valeur en tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationResponse {
    pub delegation: Delegation,
    pub balance: Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolResponse {
    pub bonded_tokens: Balance,
    pub not_bonded_tokens: Balance,
}

impl Keeper {
    pub fn query_validator(&self, ctx: &Context, address: &AccountId) -> Result<Validator, StakingError> {
        self.get_validator(ctx, address)?
            .ok_or(StakingError::ValidatorNotFound(*address))
    }

    pub fn query_validators(&self, ctx: &Context, status: Option<BondStatus>) -> Result<Vec<Validator>, StakingError> {
        match status {
            Some(status) => self.get_validators_by_status(ctx, status),
            None => self.get_all_validators(ctx),
        }
    }

    fn delegation_response(&self, ctx: &Context, delegation: Delegation) -> Result<DelegationResponse, StakingError> {
        let validator = self
            .get_validator(ctx, &delegation.validator)?
            .ok_or(StakingError::ValidatorNotFound(delegation.validator))?;
        let balance = validator.tokens_from_shares(delegation.shares).truncate_int();
        Ok(DelegationResponse { delegation, balance })
    }

    pub fn query_delegation(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        validator: &AccountId,
    ) -> Result<DelegationResponse, StakingError> {
        let delegation = self
            .get_delegation(ctx, delegator, validator)?
            .ok_or(StakingError::DelegationNotFound {
                delegator: *delegator,
                validator: *validator,
            })?;
        self.delegation_response(ctx, delegation)
    }

    pub fn query_delegator_delegations(
        &self,
        ctx: &Context,
        delegator: &AccountId,
    ) -> Result<Vec<DelegationResponse>, StakingError> {
        self.get_delegator_delegations(ctx, delegator)?
            .into_iter()
            .map(|d| self.delegation_response(ctx, d))
            .collect()
    }

    pub fn query_validator_delegations(
        &self,
        ctx: &Context,
        validator: &AccountId,
    ) -> Result<Vec<DelegationResponse>, StakingError> {
        self.get_validator_delegations(ctx, validator)?
            .into_iter()
            .map(|d| self.delegation_response(ctx, d))
            .collect()
    }

    pub fn query_unbonding_delegation(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        validator: &AccountId,
    ) -> Result<UnbondingDelegation, StakingError> {
        self.get_unbonding_delegation(ctx, delegator, validator)?
            .ok_or(StakingError::UnbondingDelegationNotFound)
    }

    /// Redélégations d'un délégateur, filtrées par source et/ou destination
    pub fn query_redelegations(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        src: Option<&AccountId>,
        dst: Option<&AccountId>,
    ) -> Result<Vec<Redelegation>, StakingError> {
        if let (Some(src), Some(dst)) = (src, dst) {
            let red = self
                .get_redelegation(ctx, delegator, src, dst)?
                .ok_or(StakingError::RedelegationNotFound)?;
            return Ok(vec![red]);
        }

        Ok(self
            .get_delegator_redelegations(ctx, delegator)?
            .into_iter()
            .filter(|r| src.map_or(true, |s| &r.validator_src == s))
            .filter(|r| dst.map_or(true, |d| &r.validator_dst == d))
            .collect())
    }

    pub fn query_pool(&self, ctx: &Context) -> Result<PoolResponse, StakingError> {
        Ok(PoolResponse {
            bonded_tokens: self.pool_tokens(ctx, Pool::Bonded)?,
            not_bonded_tokens: self.pool_tokens(ctx, Pool::NotBonded)?,
        })
    }

    pub fn query_params(&self, ctx: &Context) -> Result<Params, StakingError> {
        self.get_params(ctx)
    }

    /// Point d'entrée générique: réponse JSON
    pub fn query(&self, ctx: &Context, request: &QueryRequest) -> Result<serde_json::Value, StakingError> {
        match request {
            QueryRequest::Validator { address } => to_json(&self.query_validator(ctx, address)?),
            QueryRequest::Validators { status } => to_json(&self.query_validators(ctx, *status)?),
            QueryRequest::Delegation { delegator, validator } => {
                to_json(&self.query_delegation(ctx, delegator, validator)?)
            }
            QueryRequest::DelegatorDelegations { delegator } => {
                to_json(&self.query_delegator_delegations(ctx, delegator)?)
            }
            QueryRequest::ValidatorDelegations { validator } => {
                to_json(&self.query_validator_delegations(ctx, validator)?)
            }
            QueryRequest::UnbondingDelegation { delegator, validator } => {
                to_json(&self.query_unbonding_delegation(ctx, delegator, validator)?)
            }
            QueryRequest::DelegatorUnbondingDelegations { delegator } => {
                to_json(&self.get_delegator_unbonding_delegations(ctx, delegator)?)
            }
            QueryRequest::Redelegations { delegator, src, dst } => {
                to_json(&self.query_redelegations(ctx, delegator, src.as_ref(), dst.as_ref())?)
            }
            QueryRequest::Pool => to_json(&self.query_pool(ctx)?),
            QueryRequest::Params => to_json(&self.query_params(ctx)?),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, StakingError> {
    Ok(serde_json::to_value(value).map_err(CodecError::from)?)
}
