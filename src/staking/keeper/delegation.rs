// Delegation Ledger - Délégations, unbondings, redélégations et leurs files
use crate::bank::Pool;
use crate::context::Context;
use crate::storage::prefix_end;
use crate::types::{AccountId, Balance, BlockHeight, Coin, Dec, Timestamp};
use tracing::{debug, info};

use super::Keeper;
use crate::staking::delegation::{Delegation, Redelegation, UnbondingDelegation};
use crate::staking::error::StakingError;
use crate::staking::keys::{self, DvPair, DvvTriplet};
use crate::staking::validator::{BondStatus, Validator};

impl Keeper {
    // ----- délégations -----

    pub fn get_delegation(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        validator: &AccountId,
    ) -> Result<Option<Delegation>, StakingError> {
        self.read(ctx.store(), &keys::delegation_key(delegator, validator))
    }

    pub fn set_delegation(&self, ctx: &mut Context, delegation: &Delegation) -> Result<(), StakingError> {
        let key = keys::delegation_key(&delegation.delegator, &delegation.validator);
        self.write(ctx.store_mut(), &key, delegation)
    }

    pub fn remove_delegation(&self, ctx: &mut Context, delegation: &Delegation) -> Result<(), StakingError> {
        ctx.store_mut()
            .delete(&keys::delegation_key(&delegation.delegator, &delegation.validator))?;
        Ok(())
    }

    pub fn get_all_delegations(&self, ctx: &Context) -> Result<Vec<Delegation>, StakingError> {
        self.scan(ctx.store(), &[keys::DELEGATION_PREFIX])
    }

    pub fn get_delegator_delegations(&self, ctx: &Context, delegator: &AccountId) -> Result<Vec<Delegation>, StakingError> {
        self.scan(ctx.store(), &keys::delegations_prefix(delegator))
    }

    pub fn get_validator_delegations(&self, ctx: &Context, validator: &AccountId) -> Result<Vec<Delegation>, StakingError> {
        Ok(self
            .get_all_delegations(ctx)?
            .into_iter()
            .filter(|d| &d.validator == validator)
            .collect())
    }

    // ----- unbondings -----

    pub fn get_unbonding_delegation(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        validator: &AccountId,
    ) -> Result<Option<UnbondingDelegation>, StakingError> {
        self.read(ctx.store(), &keys::ubd_key(delegator, validator))
    }

    pub fn set_unbonding_delegation(&self, ctx: &mut Context, ubd: &UnbondingDelegation) -> Result<(), StakingError> {
        self.write(ctx.store_mut(), &keys::ubd_key(&ubd.delegator, &ubd.validator), ubd)?;
        ctx.store_mut()
            .set(&keys::ubd_by_val_index_key(&ubd.validator, &ubd.delegator), &[])?;
        Ok(())
    }

    pub fn remove_unbonding_delegation(&self, ctx: &mut Context, ubd: &UnbondingDelegation) -> Result<(), StakingError> {
        let store = ctx.store_mut();
        store.delete(&keys::ubd_key(&ubd.delegator, &ubd.validator))?;
        store.delete(&keys::ubd_by_val_index_key(&ubd.validator, &ubd.delegator))?;
        Ok(())
    }

    pub fn get_all_unbonding_delegations(&self, ctx: &Context) -> Result<Vec<UnbondingDelegation>, StakingError> {
        self.scan(ctx.store(), &[keys::UNBONDING_DELEGATION_PREFIX])
    }

    pub fn get_delegator_unbonding_delegations(
        &self,
        ctx: &Context,
        delegator: &AccountId,
    ) -> Result<Vec<UnbondingDelegation>, StakingError> {
        self.scan(ctx.store(), &keys::ubds_prefix(delegator))
    }

    /// Unbondings en cours depuis un validateur (via l'index par validateur)
    pub fn get_unbonding_delegations_from_validator(
        &self,
        ctx: &Context,
        validator: &AccountId,
    ) -> Result<Vec<UnbondingDelegation>, StakingError> {
        let mut ubds = Vec::new();
        for (key, _) in ctx.store().prefix_scan(&keys::ubds_by_val_prefix(validator))? {
            let delegator = keys::address_at(&key, 1);
            match self.get_unbonding_delegation(ctx, &delegator, validator)? {
                Some(ubd) => ubds.push(ubd),
                None => panic!("dangling unbonding index for ({}, {})", delegator, validator),
            }
        }
        Ok(ubds)
    }

    pub fn has_max_unbonding_entries(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        validator: &AccountId,
    ) -> Result<bool, StakingError> {
        let max = self.max_entries(ctx)? as usize;
        Ok(self
            .get_unbonding_delegation(ctx, delegator, validator)?
            .map_or(false, |ubd| ubd.entries.len() >= max))
    }

    pub(crate) fn set_unbonding_delegation_entry(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        validator: &AccountId,
        creation_height: BlockHeight,
        completion_time: Timestamp,
        balance: Balance,
    ) -> Result<UnbondingDelegation, StakingError> {
        let mut ubd = self
            .get_unbonding_delegation(ctx, delegator, validator)?
            .unwrap_or_else(|| UnbondingDelegation::new(*delegator, *validator));
        ubd.add_entry(creation_height, completion_time, balance);
        self.set_unbonding_delegation(ctx, &ubd)?;
        Ok(ubd)
    }

    // ----- redélégations -----

    pub fn get_redelegation(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        src: &AccountId,
        dst: &AccountId,
    ) -> Result<Option<Redelegation>, StakingError> {
        self.read(ctx.store(), &keys::red_key(delegator, src, dst))
    }

    pub fn set_redelegation(&self, ctx: &mut Context, red: &Redelegation) -> Result<(), StakingError> {
        let (del, src, dst) = (&red.delegator, &red.validator_src, &red.validator_dst);
        self.write(ctx.store_mut(), &keys::red_key(del, src, dst), red)?;
        let store = ctx.store_mut();
        store.set(&keys::red_by_src_index_key(src, del, dst), &[])?;
        store.set(&keys::red_by_dst_index_key(dst, del, src), &[])?;
        Ok(())
    }

    pub fn remove_redelegation(&self, ctx: &mut Context, red: &Redelegation) -> Result<(), StakingError> {
        let (del, src, dst) = (&red.delegator, &red.validator_src, &red.validator_dst);
        let store = ctx.store_mut();
        store.delete(&keys::red_key(del, src, dst))?;
        store.delete(&keys::red_by_src_index_key(src, del, dst))?;
        store.delete(&keys::red_by_dst_index_key(dst, del, src))?;
        Ok(())
    }

    pub fn get_all_redelegations(&self, ctx: &Context) -> Result<Vec<Redelegation>, StakingError> {
        self.scan(ctx.store(), &[keys::REDELEGATION_PREFIX])
    }

    pub fn get_delegator_redelegations(&self, ctx: &Context, delegator: &AccountId) -> Result<Vec<Redelegation>, StakingError> {
        self.scan(ctx.store(), &keys::reds_prefix(delegator))
    }

    /// Redélégations sortant d'un validateur (via l'index par source)
    pub fn get_redelegations_from_src_validator(
        &self,
        ctx: &Context,
        src: &AccountId,
    ) -> Result<Vec<Redelegation>, StakingError> {
        let mut reds = Vec::new();
        for (key, _) in ctx.store().prefix_scan(&keys::reds_by_src_prefix(src))? {
            let (delegator, dst) = (keys::address_at(&key, 1), keys::address_at(&key, 2));
            match self.get_redelegation(ctx, &delegator, src, &dst)? {
                Some(red) => reds.push(red),
                None => panic!("dangling redelegation index for ({}, {}, {})", delegator, src, dst),
            }
        }
        Ok(reds)
    }

    /// Une redélégation immature arrive-t-elle sur `dst` pour ce délégateur ?
    pub fn has_receiving_redelegation(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        dst: &AccountId,
    ) -> Result<bool, StakingError> {
        let now = ctx.block_time();
        for (key, _) in ctx.store().prefix_scan(&keys::reds_by_dst_and_del_prefix(dst, delegator))? {
            let src = keys::address_at(&key, 2);
            if let Some(red) = self.get_redelegation(ctx, delegator, &src, dst)? {
                if red.has_immature_entry(now) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Redélégation immature depuis `src` vers une autre destination que `dst`
    fn has_outgoing_redelegation_elsewhere(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        src: &AccountId,
        dst: &AccountId,
    ) -> Result<bool, StakingError> {
        let now = ctx.block_time();
        for (key, _) in ctx.store().prefix_scan(&keys::reds_by_src_and_del_prefix(src, delegator))? {
            let other = keys::address_at(&key, 2);
            if &other == dst {
                continue;
            }
            if let Some(red) = self.get_redelegation(ctx, delegator, src, &other)? {
                if red.has_immature_entry(now) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub fn has_max_redelegation_entries(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        src: &AccountId,
        dst: &AccountId,
    ) -> Result<bool, StakingError> {
        let max = self.max_entries(ctx)? as usize;
        Ok(self
            .get_redelegation(ctx, delegator, src, dst)?
            .map_or(false, |red| red.entries.len() >= max))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn set_redelegation_entry(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        src: &AccountId,
        dst: &AccountId,
        creation_height: BlockHeight,
        completion_time: Timestamp,
        balance: Balance,
        shares_dst: Dec,
    ) -> Result<Redelegation, StakingError> {
        let mut red = self
            .get_redelegation(ctx, delegator, src, dst)?
            .unwrap_or_else(|| Redelegation::new(*delegator, *src, *dst));
        red.add_entry(creation_height, completion_time, balance, shares_dst);
        self.set_redelegation(ctx, &red)?;
        Ok(red)
    }

    // ----- files de maturité -----

    pub fn get_ubd_queue_timeslice(&self, ctx: &Context, time: Timestamp) -> Result<Vec<DvPair>, StakingError> {
        Ok(self.read(ctx.store(), &keys::ubd_queue_key(time))?.unwrap_or_default())
    }

    pub fn insert_ubd_queue(
        &self,
        ctx: &mut Context,
        ubd: &UnbondingDelegation,
        completion_time: Timestamp,
    ) -> Result<(), StakingError> {
        let pair = DvPair {
            delegator: ubd.delegator,
            validator: ubd.validator,
        };
        let mut slice = self.get_ubd_queue_timeslice(ctx, completion_time)?;
        if !slice.contains(&pair) {
            slice.push(pair);
            self.write(ctx.store_mut(), &keys::ubd_queue_key(completion_time), &slice)?;
        }
        Ok(())
    }

    /// Retire de la file toutes les paires arrivées à maturité à `now`
    pub fn dequeue_all_mature_ubd_queue(&self, ctx: &mut Context, now: Timestamp) -> Result<Vec<DvPair>, StakingError> {
        let slices: Vec<(Vec<u8>, Vec<DvPair>)> =
            self.dequeue_until(ctx, keys::UNBONDING_QUEUE_PREFIX, &keys::ubd_queue_key(now))?;
        Ok(slices.into_iter().flat_map(|(_, pairs)| pairs).collect())
    }

    pub fn get_red_queue_timeslice(&self, ctx: &Context, time: Timestamp) -> Result<Vec<DvvTriplet>, StakingError> {
        Ok(self.read(ctx.store(), &keys::red_queue_key(time))?.unwrap_or_default())
    }

    pub fn insert_redelegation_queue(
        &self,
        ctx: &mut Context,
        red: &Redelegation,
        completion_time: Timestamp,
    ) -> Result<(), StakingError> {
        let triplet = DvvTriplet {
            delegator: red.delegator,
            validator_src: red.validator_src,
            validator_dst: red.validator_dst,
        };
        let mut slice = self.get_red_queue_timeslice(ctx, completion_time)?;
        if !slice.contains(&triplet) {
            slice.push(triplet);
            self.write(ctx.store_mut(), &keys::red_queue_key(completion_time), &slice)?;
        }
        Ok(())
    }

    pub fn dequeue_all_mature_redelegation_queue(
        &self,
        ctx: &mut Context,
        now: Timestamp,
    ) -> Result<Vec<DvvTriplet>, StakingError> {
        let slices: Vec<(Vec<u8>, Vec<DvvTriplet>)> =
            self.dequeue_until(ctx, keys::REDELEGATION_QUEUE_PREFIX, &keys::red_queue_key(now))?;
        Ok(slices.into_iter().flat_map(|(_, triplets)| triplets).collect())
    }

    /// Lit puis supprime les entrées de file de clé <= `last` (inclus)
    fn dequeue_until<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &mut Context,
        prefix: u8,
        last: &[u8],
    ) -> Result<Vec<(Vec<u8>, T)>, StakingError> {
        let end = prefix_end(last);
        let raw = ctx.store().range(&[prefix], end.as_deref())?;
        let mut slices = Vec::with_capacity(raw.len());
        for (key, bytes) in raw {
            let value: T = self.codec().decode_value(&bytes)?;
            ctx.store_mut().delete(&key)?;
            slices.push((key, value));
        }
        Ok(slices)
    }

    // ----- opérations -----

    /// Refuse un retrait de l'opérateur sur son validateur pendant la période de gel
    pub(crate) fn check_frozen(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        validator: &Validator,
    ) -> Result<(), StakingError> {
        if delegator != &validator.operator {
            return Ok(());
        }
        let frozen_time = self.frozen_time(ctx)?;
        if validator.is_frozen(ctx.block_time(), frozen_time) {
            return Err(StakingError::FrozenPeriod {
                validator: validator.operator,
                until: validator.frozen_until(frozen_time),
            });
        }
        Ok(())
    }

    /// Statut courant, Unbonded si le validateur a été supprimé
    fn status_of(&self, ctx: &Context, operator: &AccountId) -> Result<BondStatus, StakingError> {
        Ok(self
            .get_validator(ctx, operator)?
            .map_or(BondStatus::Unbonded, |v| v.status))
    }

    /// Délègue `amount` tokens et renvoie les parts émises.
    ///
    /// Avec `subtract_account`, les tokens viennent du compte du délégateur;
    /// sinon ils sont déjà dans le pool correspondant à `token_src`.
    pub fn delegate(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        amount: Balance,
        token_src: BondStatus,
        validator: Validator,
        subtract_account: bool,
    ) -> Result<Dec, StakingError> {
        if validator.invalid_ex_rate() {
            return Err(StakingError::InvalidExchangeRate);
        }

        let mut delegation = self
            .get_delegation(ctx, delegator, &validator.operator)?
            .unwrap_or_else(|| Delegation::new(*delegator, validator.operator, Dec::zero()));

        if subtract_account {
            let pool = if validator.is_bonded() { Pool::Bonded } else { Pool::NotBonded };
            let coin = Coin::new(self.bond_denom(ctx)?, amount);
            self.supply()
                .delegate_coins_from_account_to_pool(ctx.store_mut(), delegator, pool, &coin)?;
        } else {
            match (token_src == BondStatus::Bonded, validator.is_bonded()) {
                (true, false) => self.bonded_tokens_to_not_bonded(ctx, amount)?,
                (false, true) => self.not_bonded_tokens_to_bonded(ctx, amount)?,
                _ => {}
            }
        }

        let (validator, new_shares) = self.add_validator_tokens_and_shares(ctx, validator, amount)?;
        delegation.shares = delegation.shares.add(new_shares);
        self.set_delegation(ctx, &delegation)?;

        debug!(
            "delegated {} to {} from {} ({} shares)",
            amount, validator.operator, delegator, new_shares
        );
        Ok(new_shares)
    }

    /// Brûle des parts d'une délégation et renvoie les tokens libérés
    pub(crate) fn unbond(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        operator: &AccountId,
        shares: Dec,
    ) -> Result<Balance, StakingError> {
        let mut delegation =
            self.get_delegation(ctx, delegator, operator)?
                .ok_or(StakingError::DelegationNotFound {
                    delegator: *delegator,
                    validator: *operator,
                })?;

        if delegation.shares < shares {
            return Err(StakingError::InsufficientShares {
                requested: shares,
                available: delegation.shares,
            });
        }

        let mut validator = self
            .get_validator(ctx, operator)?
            .ok_or(StakingError::ValidatorNotFound(*operator))?;

        delegation.shares = delegation.shares.sub(shares);

        // l'opérateur passe sous son minimum: emprisonné
        if delegation.is_self_delegation()
            && !validator.jailed
            && validator.tokens_from_shares(delegation.shares).truncate_int() < validator.min_self_delegation
        {
            info!("self-delegation of {} below minimum, jailing", operator);
            validator = self.jail_validator(ctx, validator)?;
        }

        if delegation.shares.is_zero() {
            self.remove_delegation(ctx, &delegation)?;
        } else {
            self.set_delegation(ctx, &delegation)?;
        }

        let (validator, amount) = self.remove_validator_tokens_and_shares(ctx, validator, shares)?;
        if validator.delegator_shares.is_zero() && validator.is_unbonded() {
            self.remove_validator(ctx, &validator.operator)?;
        }

        Ok(amount)
    }

    /// Convertit un montant en parts (tronquées) pour un retrait
    pub fn validate_unbond_amount(
        &self,
        ctx: &Context,
        delegator: &AccountId,
        operator: &AccountId,
        amount: Balance,
    ) -> Result<Dec, StakingError> {
        let validator = self
            .get_validator(ctx, operator)?
            .ok_or(StakingError::ValidatorNotFound(*operator))?;
        let delegation =
            self.get_delegation(ctx, delegator, operator)?
                .ok_or(StakingError::DelegationNotFound {
                    delegator: *delegator,
                    validator: *operator,
                })?;

        // montant dont les parts dépassent 128 bits
        let shares = validator.shares_from_tokens(amount).map_err(|_| StakingError::InsufficientShares {
            requested: Dec::saturating_from_int(amount),
            available: delegation.shares,
        })?;
        if shares > delegation.shares {
            return Err(StakingError::InsufficientShares {
                requested: shares,
                available: delegation.shares,
            });
        }

        Ok(shares)
    }

    /// Démarre un unbonding et renvoie son temps de complétion
    pub fn undelegate(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        operator: &AccountId,
        shares: Dec,
    ) -> Result<Timestamp, StakingError> {
        let validator = self
            .get_validator(ctx, operator)?
            .ok_or(StakingError::ValidatorNotFound(*operator))?;
        self.check_frozen(ctx, delegator, &validator)?;

        if self.has_max_unbonding_entries(ctx, delegator, operator)? {
            return Err(StakingError::MaxUnbondingEntries);
        }

        let amount = self.unbond(ctx, delegator, operator, shares)?;

        // tokens encore dans le pool bonded tant que le validateur l'est
        if self.status_of(ctx, operator)? == BondStatus::Bonded {
            self.bonded_tokens_to_not_bonded(ctx, amount)?;
        }

        let completion_time = ctx.block_time() + self.unbonding_time(ctx)?;
        let height = ctx.block_height();
        let ubd = self.set_unbonding_delegation_entry(ctx, delegator, operator, height, completion_time, amount)?;
        self.insert_ubd_queue(ctx, &ubd, completion_time)?;

        info!(
            "Undelegation: {} tokens from {} by {}, completes at {}",
            amount, operator, delegator, completion_time
        );
        Ok(completion_time)
    }

    /// Verse les entrées mûres d'un unbonding et renvoie le montant payé
    pub fn complete_unbonding(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        operator: &AccountId,
    ) -> Result<Balance, StakingError> {
        let mut ubd = self
            .get_unbonding_delegation(ctx, delegator, operator)?
            .ok_or(StakingError::UnbondingDelegationNotFound)?;

        let denom = self.bond_denom(ctx)?;
        let mut paid: Balance = 0;
        for entry in ubd.remove_mature(ctx.block_time()) {
            if entry.balance == 0 {
                continue;
            }
            let coin = Coin::new(denom.clone(), entry.balance);
            self.supply()
                .undelegate_coins_from_pool_to_account(ctx.store_mut(), Pool::NotBonded, delegator, &coin)?;
            paid += entry.balance;
        }

        if ubd.entries.is_empty() {
            self.remove_unbonding_delegation(ctx, &ubd)?;
        } else {
            self.set_unbonding_delegation(ctx, &ubd)?;
        }

        Ok(paid)
    }

    /// Déplace des parts d'un validateur vers un autre, renvoie la complétion
    pub fn begin_redelegation(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        src: &AccountId,
        dst: &AccountId,
        shares: Dec,
    ) -> Result<Timestamp, StakingError> {
        if src == dst {
            return Err(StakingError::SelfRedelegation);
        }

        let dst_validator = self.get_validator(ctx, dst)?.ok_or(StakingError::BadRedelegationDst)?;
        let src_validator = self
            .get_validator(ctx, src)?
            .ok_or(StakingError::ValidatorNotFound(*src))?;

        // pas de redélégation en chaîne tant que la précédente n'est pas mûre
        if self.has_receiving_redelegation(ctx, delegator, src)?
            || self.has_outgoing_redelegation_elsewhere(ctx, delegator, src, dst)?
        {
            return Err(StakingError::TransitiveRedelegation);
        }

        self.check_frozen(ctx, delegator, &src_validator)?;

        if self.has_max_redelegation_entries(ctx, delegator, src, dst)? {
            return Err(StakingError::MaxRedelegationEntries);
        }

        let returned = self.unbond(ctx, delegator, src, shares)?;
        if returned == 0 {
            return Err(StakingError::VerySmallRedelegation);
        }

        let token_src = self.status_of(ctx, src)?;
        let shares_dst = self.delegate(ctx, delegator, returned, token_src, dst_validator, false)?;

        let completion_time = ctx.block_time() + self.unbonding_time(ctx)?;
        let height = ctx.block_height();
        let red = self.set_redelegation_entry(ctx, delegator, src, dst, height, completion_time, returned, shares_dst)?;
        self.insert_redelegation_queue(ctx, &red, completion_time)?;

        info!(
            "Redelegation: {} tokens {} -> {} by {}, completes at {}",
            returned, src, dst, delegator, completion_time
        );
        Ok(completion_time)
    }

    /// Retire les entrées mûres d'une redélégation
    pub fn complete_redelegation(
        &self,
        ctx: &mut Context,
        delegator: &AccountId,
        src: &AccountId,
        dst: &AccountId,
    ) -> Result<(), StakingError> {
        let mut red = self
            .get_redelegation(ctx, delegator, src, dst)?
            .ok_or(StakingError::RedelegationNotFound)?;

        red.remove_mature(ctx.block_time());
        if red.entries.is_empty() {
            self.remove_redelegation(ctx, &red)?;
        } else {
            self.set_redelegation(ctx, &red)?;
        }
        Ok(())
    }
}
