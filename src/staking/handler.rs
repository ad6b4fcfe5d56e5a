// Router - Dispatch des messages de staking vers le keeper
//
// Chaque message s'exécute sur une surcouche du store du bloc; les écritures
// ne sont appliquées que si le handler réussit.

use crate::context::Context;
use crate::storage::CacheStore;
use crate::types::{AccountId, Coin};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{StakingError, CODESPACE};
use super::events::*;
use super::keeper::Keeper;
use super::msgs::{
    Msg, MsgBeginRedelegate, MsgCreateValidator, MsgDelegate, MsgEditValidator, MsgUndelegate, ROUTER_KEY,
};
use super::validator::BondStatus;

/// Résultat d'un message accepté
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResult {
    /// Données encodées (temps de complétion pour unbond/redelegate)
    pub data: Vec<u8>,
    pub log: String,
    pub events: Vec<Event>,
}

/// Message rejeté
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerError {
    pub codespace: String,
    pub code: u32,
    pub log: String,
}

impl From<StakingError> for HandlerError {
    fn from(err: StakingError) -> Self {
        Self {
            codespace: CODESPACE.to_string(),
            code: err.code(),
            log: err.to_string(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.codespace, self.code, self.log)
    }
}

impl std::error::Error for HandlerError {}

pub struct Router {
    keeper: Arc<Keeper>,
}

impl Router {
    pub fn new(keeper: Arc<Keeper>) -> Self {
        Self { keeper }
    }

    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    pub fn route(&self) -> &'static str {
        ROUTER_KEY
    }

    /// Exécute un message signé par `signers`, de façon atomique
    pub fn deliver(&self, ctx: &mut Context, signers: &[AccountId], msg: &Msg) -> Result<HandlerResult, HandlerError> {
        msg.validate_basic()?;
        for required in msg.signers() {
            if !signers.contains(&required) {
                return Err(StakingError::Unauthorized(required).into());
            }
        }

        let header = ctx.header().clone();
        let (result, ops) = {
            let mut cache = CacheStore::new(ctx.store());
            let result = {
                let mut cache_ctx = Context::new(&mut cache, header);
                self.handle(&mut cache_ctx, msg)
            };
            (result, cache.into_ops())
        };

        match result {
            Ok(res) => {
                ctx.commit(ops).map_err(StakingError::from)?;
                info!("{} delivered at height {}", msg.type_tag(), ctx.block_height());
                Ok(res)
            }
            Err(e) => {
                debug!("{} rejected: {}", msg.type_tag(), e);
                Err(e.into())
            }
        }
    }

    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<HandlerResult, StakingError> {
        match msg {
            Msg::CreateValidator(m) => self.handle_create_validator(ctx, m),
            Msg::EditValidator(m) => self.handle_edit_validator(ctx, m),
            Msg::Delegate(m) => self.handle_delegate(ctx, m),
            Msg::Undelegate(m) => self.handle_undelegate(ctx, m),
            Msg::BeginRedelegate(m) => self.handle_begin_redelegate(ctx, m),
        }
    }

    fn check_denom(&self, ctx: &Context, coin: &Coin) -> Result<(), StakingError> {
        let expected = self.keeper.bond_denom(ctx)?;
        if coin.denom != expected {
            return Err(StakingError::BadDenom {
                expected,
                got: coin.denom.clone(),
            });
        }
        Ok(())
    }

    fn handle_create_validator(&self, ctx: &mut Context, m: &MsgCreateValidator) -> Result<HandlerResult, StakingError> {
        let k = &self.keeper;
        if k.get_validator(ctx, &m.validator_address)?.is_some() {
            return Err(StakingError::ValidatorOwnerExists(m.validator_address));
        }
        self.check_denom(ctx, &m.value)?;

        let validator = k.create_validator(
            ctx,
            m.validator_address,
            m.pubkey,
            m.description.clone(),
            m.commission,
            m.min_self_delegation,
        )?;
        k.delegate(ctx, &m.delegator_address, m.value.amount, BondStatus::Unbonded, validator, true)?;

        Ok(HandlerResult {
            data: Vec::new(),
            log: format!("validator {} created", m.validator_address),
            events: vec![
                Event::new(EVENT_TYPE_CREATE_VALIDATOR)
                    .attr(ATTR_VALIDATOR, m.validator_address)
                    .attr(ATTR_AMOUNT, &m.value),
                message_event(m.delegator_address, "create_validator"),
            ],
        })
    }

    fn handle_edit_validator(&self, ctx: &mut Context, m: &MsgEditValidator) -> Result<HandlerResult, StakingError> {
        let k = &self.keeper;
        let mut validator = k
            .get_validator(ctx, &m.validator_address)?
            .ok_or(StakingError::ValidatorNotFound(m.validator_address))?;

        validator.description = validator.description.update(&m.description)?;

        if let Some(rate) = m.commission_rate {
            validator.commission = k.update_validator_commission(ctx, &validator, rate)?;
        }

        if let Some(min) = m.min_self_delegation {
            if min <= validator.min_self_delegation {
                return Err(StakingError::MinSelfDelegationDecreased);
            }
            if min > validator.tokens {
                return Err(StakingError::SelfDelegationBelowMinimum { min });
            }
            validator.min_self_delegation = min;
        }

        k.set_validator(ctx, &validator)?;

        let mut event = Event::new(EVENT_TYPE_EDIT_VALIDATOR).attr(ATTR_VALIDATOR, m.validator_address);
        if let Some(rate) = m.commission_rate {
            event = event.attr(ATTR_COMMISSION_RATE, rate);
        }
        if let Some(min) = m.min_self_delegation {
            event = event.attr(ATTR_MIN_SELF_DELEGATION, min);
        }

        Ok(HandlerResult {
            data: Vec::new(),
            log: format!("validator {} edited", m.validator_address),
            events: vec![event, message_event(m.validator_address, "edit_validator")],
        })
    }

    fn handle_delegate(&self, ctx: &mut Context, m: &MsgDelegate) -> Result<HandlerResult, StakingError> {
        let k = &self.keeper;
        let validator = k
            .get_validator(ctx, &m.validator_address)?
            .ok_or(StakingError::ValidatorNotFound(m.validator_address))?;
        self.check_denom(ctx, &m.amount)?;

        k.delegate(ctx, &m.delegator_address, m.amount.amount, BondStatus::Unbonded, validator, true)?;

        Ok(HandlerResult {
            data: Vec::new(),
            log: String::new(),
            events: vec![
                Event::new(EVENT_TYPE_DELEGATE)
                    .attr(ATTR_VALIDATOR, m.validator_address)
                    .attr(ATTR_AMOUNT, &m.amount),
                message_event(m.delegator_address, "delegate"),
            ],
        })
    }

    fn handle_undelegate(&self, ctx: &mut Context, m: &MsgUndelegate) -> Result<HandlerResult, StakingError> {
        let k = &self.keeper;
        self.check_denom(ctx, &m.amount)?;

        let shares = k.validate_unbond_amount(ctx, &m.delegator_address, &m.validator_address, m.amount.amount)?;
        let completion_time = k.undelegate(ctx, &m.delegator_address, &m.validator_address, shares)?;

        Ok(HandlerResult {
            data: k.codec().encode_value(&completion_time)?,
            log: String::new(),
            events: vec![
                Event::new(EVENT_TYPE_UNBOND)
                    .attr(ATTR_VALIDATOR, m.validator_address)
                    .attr(ATTR_AMOUNT, &m.amount)
                    .attr(ATTR_COMPLETION_TIME, completion_time),
                message_event(m.delegator_address, "begin_unbonding"),
            ],
        })
    }

    fn handle_begin_redelegate(&self, ctx: &mut Context, m: &MsgBeginRedelegate) -> Result<HandlerResult, StakingError> {
        let k = &self.keeper;
        self.check_denom(ctx, &m.amount)?;

        let shares =
            k.validate_unbond_amount(ctx, &m.delegator_address, &m.validator_src_address, m.amount.amount)?;
        let completion_time = k.begin_redelegation(
            ctx,
            &m.delegator_address,
            &m.validator_src_address,
            &m.validator_dst_address,
            shares,
        )?;

        Ok(HandlerResult {
            data: k.codec().encode_value(&completion_time)?,
            log: String::new(),
            events: vec![
                Event::new(EVENT_TYPE_REDELEGATE)
                    .attr(ATTR_SRC_VALIDATOR, m.validator_src_address)
                    .attr(ATTR_DST_VALIDATOR, m.validator_dst_address)
                    .attr(ATTR_AMOUNT, &m.amount)
                    .attr(ATTR_COMPLETION_TIME, completion_time),
                message_event(m.delegator_address, "begin_redelegate"),
            ],
        })
    }
}

fn message_event(sender: AccountId, action: &str) -> Event {
    Event::new(EVENT_TYPE_MESSAGE)
        .attr(ATTR_MODULE, ROUTER_KEY)
        .attr(ATTR_ACTION, action)
        .attr(ATTR_SENDER, sender)
}
