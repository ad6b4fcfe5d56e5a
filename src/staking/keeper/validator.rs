// Validator Registry - Validateurs, index secondaires et file de validateurs
use crate::context::Context;
use crate::types::{AccountId, Balance, BlockHeight, ConsAddress, ConsPubKey, Dec, Power, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Keeper;
use crate::staking::error::StakingError;
use crate::staking::keys::{self, LAST_TOTAL_POWER_KEY};
use crate::staking::validator::{BondStatus, Commission, CommissionRates, Description, Validator};

/// Dernière puissance transmise au consensus pour un validateur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPowerRecord {
    pub power: Power,
    pub pub_key: ConsPubKey,
}

impl Keeper {
    pub fn get_validator(&self, ctx: &Context, operator: &AccountId) -> Result<Option<Validator>, StakingError> {
        self.read(ctx.store(), &keys::validator_key(operator))
    }

    /// Validateur dont l'existence est un invariant
    pub(crate) fn must_get_validator(&self, ctx: &Context, operator: &AccountId) -> Result<Validator, StakingError> {
        match self.get_validator(ctx, operator)? {
            Some(v) => Ok(v),
            None => panic!("validator record not found for address: {}", operator),
        }
    }

    pub fn get_validator_by_cons_addr(
        &self,
        ctx: &Context,
        cons: &ConsAddress,
    ) -> Result<Option<Validator>, StakingError> {
        let operator: Option<AccountId> = self.read(ctx.store(), &keys::validator_by_cons_addr_key(cons))?;
        match operator {
            Some(op) => self.get_validator(ctx, &op),
            None => Ok(None),
        }
    }

    pub fn set_validator(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StakingError> {
        self.write(ctx.store_mut(), &keys::validator_key(&validator.operator), validator)
    }

    pub fn set_validator_by_cons_addr(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StakingError> {
        let key = keys::validator_by_cons_addr_key(&validator.cons_address());
        self.write(ctx.store_mut(), &key, &validator.operator)
    }

    /// Indexe par puissance; un validateur emprisonné n'est jamais indexé
    pub fn set_validator_by_power_index(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StakingError> {
        if validator.jailed {
            return Ok(());
        }
        let key = keys::validator_by_power_index_key(validator);
        self.write(ctx.store_mut(), &key, &validator.operator)
    }

    pub fn delete_validator_by_power_index(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StakingError> {
        ctx.store_mut().delete(&keys::validator_by_power_index_key(validator))?;
        Ok(())
    }

    pub fn set_new_validator_by_power_index(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StakingError> {
        let key = keys::validator_by_power_index_key(validator);
        self.write(ctx.store_mut(), &key, &validator.operator)
    }

    /// Enregistre un nouveau validateur (Unbonded, sans tokens)
    pub fn create_validator(
        &self,
        ctx: &mut Context,
        operator: AccountId,
        pubkey: ConsPubKey,
        description: Description,
        commission: CommissionRates,
        min_self_delegation: Balance,
    ) -> Result<Validator, StakingError> {
        if self.get_validator(ctx, &operator)?.is_some() {
            return Err(StakingError::ValidatorOwnerExists(operator));
        }
        if !pubkey.is_valid() {
            return Err(StakingError::InvalidPubKey);
        }
        if self.get_validator_by_cons_addr(ctx, &pubkey.address())?.is_some() {
            return Err(StakingError::ValidatorPubKeyExists);
        }
        description.ensure_length()?;
        commission.validate()?;

        let block_time = ctx.block_time();
        let mut validator = Validator::new(operator, pubkey, description, block_time);
        validator.commission = Commission::new(commission, block_time);
        validator.min_self_delegation = min_self_delegation;

        self.set_validator(ctx, &validator)?;
        self.set_validator_by_cons_addr(ctx, &validator)?;
        self.set_new_validator_by_power_index(ctx, &validator)?;

        info!("Validator created: {} (cons {})", operator, validator.cons_address());
        Ok(validator)
    }

    /// Supprime un validateur Unbonded sans tokens et tous ses index
    pub fn remove_validator(&self, ctx: &mut Context, operator: &AccountId) -> Result<(), StakingError> {
        let validator = match self.get_validator(ctx, operator)? {
            Some(v) => v,
            None => return Ok(()),
        };

        if !validator.is_unbonded() {
            panic!("cannot call remove_validator on bonded or unbonding validator {}", operator);
        }
        if validator.tokens > 0 {
            panic!("attempting to remove validator {} which still holds {} tokens", operator, validator.tokens);
        }

        let store = ctx.store_mut();
        store.delete(&keys::validator_key(operator))?;
        store.delete(&keys::validator_by_cons_addr_key(&validator.cons_address()))?;
        store.delete(&keys::validator_by_power_index_key(&validator))?;

        info!("Validator removed: {}", operator);
        Ok(())
    }

    pub fn get_all_validators(&self, ctx: &Context) -> Result<Vec<Validator>, StakingError> {
        self.scan(ctx.store(), &[keys::VALIDATOR_PREFIX])
    }

    pub fn get_validators_by_status(&self, ctx: &Context, status: BondStatus) -> Result<Vec<Validator>, StakingError> {
        Ok(self
            .get_all_validators(ctx)?
            .into_iter()
            .filter(|v| v.status == status)
            .collect())
    }

    /// Jusqu'à `limit` validateurs, tokens décroissants puis adresse croissante
    pub fn get_validators_by_power(&self, ctx: &Context, limit: usize) -> Result<Vec<Validator>, StakingError> {
        let operators: Vec<AccountId> = self.scan(ctx.store(), &[keys::VALIDATORS_BY_POWER_PREFIX])?;
        operators
            .into_iter()
            .take(limit)
            .map(|op| self.must_get_validator(ctx, &op))
            .collect()
    }

    /// Somme des tokens des validateurs Bonded
    pub fn total_bonded_tokens(&self, ctx: &Context) -> Result<Balance, StakingError> {
        Ok(self
            .get_validators_by_status(ctx, BondStatus::Bonded)?
            .iter()
            .map(|v| v.tokens)
            .sum())
    }

    // ----- tokens et parts -----

    /// Ajoute des tokens délégués en maintenant l'index de puissance
    pub(crate) fn add_validator_tokens_and_shares(
        &self,
        ctx: &mut Context,
        mut validator: Validator,
        tokens: Balance,
    ) -> Result<(Validator, Dec), StakingError> {
        self.delete_validator_by_power_index(ctx, &validator)?;
        let added = validator.add_tokens_from_del(tokens);
        self.set_validator(ctx, &validator)?;
        self.set_validator_by_power_index(ctx, &validator)?;
        Ok((validator, added))
    }

    /// Brûle des parts et renvoie les tokens libérés
    pub(crate) fn remove_validator_tokens_and_shares(
        &self,
        ctx: &mut Context,
        mut validator: Validator,
        shares: Dec,
    ) -> Result<(Validator, Balance), StakingError> {
        self.delete_validator_by_power_index(ctx, &validator)?;
        let removed = validator.remove_del_shares(shares);
        self.set_validator(ctx, &validator)?;
        self.set_validator_by_power_index(ctx, &validator)?;
        Ok((validator, removed))
    }

    /// Retire des tokens sans toucher aux parts (slash)
    pub(crate) fn remove_validator_tokens(
        &self,
        ctx: &mut Context,
        mut validator: Validator,
        tokens: Balance,
    ) -> Result<Validator, StakingError> {
        self.delete_validator_by_power_index(ctx, &validator)?;
        validator.remove_tokens(tokens);
        self.set_validator(ctx, &validator)?;
        self.set_validator_by_power_index(ctx, &validator)?;
        Ok(validator)
    }

    pub(crate) fn update_validator_commission(
        &self,
        ctx: &Context,
        validator: &Validator,
        new_rate: Dec,
    ) -> Result<Commission, StakingError> {
        let block_time = ctx.block_time();
        validator.commission.validate_new_rate(new_rate, block_time)?;

        let mut commission = validator.commission;
        commission.rates.rate = new_rate;
        commission.update_time = block_time;
        Ok(commission)
    }

    // ----- dernière puissance transmise -----

    pub fn get_last_validator_power(&self, ctx: &Context, operator: &AccountId) -> Result<Power, StakingError> {
        Ok(self.get_last_power_record(ctx, operator)?.map_or(0, |r| r.power))
    }

    pub(crate) fn get_last_power_record(
        &self,
        ctx: &Context,
        operator: &AccountId,
    ) -> Result<Option<LastPowerRecord>, StakingError> {
        self.read(ctx.store(), &keys::last_validator_power_key(operator))
    }

    pub fn set_last_validator_power(
        &self,
        ctx: &mut Context,
        operator: &AccountId,
        pub_key: ConsPubKey,
        power: Power,
    ) -> Result<(), StakingError> {
        let record = LastPowerRecord { power, pub_key };
        self.write(ctx.store_mut(), &keys::last_validator_power_key(operator), &record)
    }

    pub fn delete_last_validator_power(&self, ctx: &mut Context, operator: &AccountId) -> Result<(), StakingError> {
        ctx.store_mut().delete(&keys::last_validator_power_key(operator))?;
        Ok(())
    }

    /// (opérateur, puissance) du dernier ensemble transmis, ordre d'adresse
    pub fn get_last_validator_powers(&self, ctx: &Context) -> Result<Vec<(AccountId, LastPowerRecord)>, StakingError> {
        ctx.store()
            .prefix_scan(&[keys::LAST_VALIDATOR_POWER_PREFIX])?
            .into_iter()
            .map(|(key, bytes)| {
                let record: LastPowerRecord = self.codec().decode_value(&bytes)?;
                Ok((keys::address_at(&key, 0), record))
            })
            .collect()
    }

    /// Validateurs du dernier ensemble transmis
    pub fn get_last_validators(&self, ctx: &Context) -> Result<Vec<Validator>, StakingError> {
        let max = self.max_validators(ctx)? as usize;
        let mut validators = Vec::new();
        for (operator, _) in self.get_last_validator_powers(ctx)? {
            if validators.len() >= max {
                panic!("more than max validators found in last validator set");
            }
            if let Some(v) = self.get_validator(ctx, &operator)? {
                validators.push(v);
            }
        }
        Ok(validators)
    }

    pub fn get_last_total_power(&self, ctx: &Context) -> Result<Power, StakingError> {
        Ok(self.read(ctx.store(), LAST_TOTAL_POWER_KEY)?.unwrap_or(0))
    }

    pub fn set_last_total_power(&self, ctx: &mut Context, power: Power) -> Result<(), StakingError> {
        self.write(ctx.store_mut(), LAST_TOTAL_POWER_KEY, &power)
    }

    // ----- file des validateurs en unbonding -----

    pub fn get_validator_queue_timeslice(
        &self,
        ctx: &Context,
        time: Timestamp,
        height: BlockHeight,
    ) -> Result<Vec<AccountId>, StakingError> {
        Ok(self
            .read(ctx.store(), &keys::validator_queue_key(time, height))?
            .unwrap_or_default())
    }

    fn set_validator_queue_timeslice(
        &self,
        ctx: &mut Context,
        time: Timestamp,
        height: BlockHeight,
        operators: &[AccountId],
    ) -> Result<(), StakingError> {
        let key = keys::validator_queue_key(time, height);
        if operators.is_empty() {
            ctx.store_mut().delete(&key)?;
            return Ok(());
        }
        self.write(ctx.store_mut(), &key, &operators)
    }

    pub fn insert_validator_queue(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StakingError> {
        let (time, height) = (validator.unbonding_completion_time, validator.unbonding_height);
        let mut slice = self.get_validator_queue_timeslice(ctx, time, height)?;
        if !slice.contains(&validator.operator) {
            slice.push(validator.operator);
        }
        debug!("validator {} queued until {} (height {})", validator.operator, time, height);
        self.set_validator_queue_timeslice(ctx, time, height, &slice)
    }

    pub fn delete_validator_queue(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StakingError> {
        let (time, height) = (validator.unbonding_completion_time, validator.unbonding_height);
        let mut slice = self.get_validator_queue_timeslice(ctx, time, height)?;
        slice.retain(|op| op != &validator.operator);
        self.set_validator_queue_timeslice(ctx, time, height, &slice)
    }

    /// Toutes les entrées de la file: ((temps, hauteur), opérateurs)
    pub fn get_validator_queue(
        &self,
        ctx: &Context,
    ) -> Result<Vec<((Timestamp, BlockHeight), Vec<AccountId>)>, StakingError> {
        ctx.store()
            .prefix_scan(&[keys::VALIDATOR_QUEUE_PREFIX])?
            .into_iter()
            .map(|(key, bytes)| {
                let operators: Vec<AccountId> = self.codec().decode_value(&bytes)?;
                Ok((keys::parse_validator_queue_key(&key), operators))
            })
            .collect()
    }
}
