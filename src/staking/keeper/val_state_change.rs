// Bonding State Machine - Transitions de statut et calcul de l'ensemble actif
use crate::context::Context;
use crate::types::{AccountId, ConsAddress, Power};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::validator::LastPowerRecord;
use super::Keeper;
use crate::staking::error::StakingError;
use crate::staking::keys;
use crate::staking::validator::{BondStatus, Validator, ValidatorUpdate};

impl Keeper {
    /// Recalcule l'ensemble Bonded depuis l'index de puissance et renvoie
    /// les mises à jour pour le consensus (puissance 0 pour les sortants).
    pub fn apply_and_return_validator_set_updates(
        &self,
        ctx: &mut Context,
    ) -> Result<Vec<ValidatorUpdate>, StakingError> {
        let max_validators = self.max_validators(ctx)? as usize;
        let mut last: BTreeMap<AccountId, LastPowerRecord> =
            self.get_last_validator_powers(ctx)?.into_iter().collect();

        let by_power: Vec<AccountId> = self.scan(ctx.store(), &[keys::VALIDATORS_BY_POWER_PREFIX])?;

        let mut updates = Vec::new();
        let mut total_power: Power = 0;
        let mut count = 0usize;

        for operator in by_power {
            if count >= max_validators {
                break;
            }

            let validator = self.must_get_validator(ctx, &operator)?;
            if validator.jailed {
                panic!("should never retrieve a jailed validator from the power store");
            }
            // index trié: plus rien au-delà
            if validator.potential_consensus_power() == 0 {
                break;
            }

            let validator = match validator.status {
                BondStatus::Unbonded | BondStatus::Unbonding => self.bond_validator(ctx, validator)?,
                BondStatus::Bonded => validator,
            };

            let new_power = validator.consensus_power();
            let changed = last.remove(&operator).map_or(true, |r| r.power != new_power);
            if changed {
                updates.push(validator.to_update());
                self.set_last_validator_power(ctx, &operator, validator.cons_pubkey, new_power)?;
            }

            count += 1;
            total_power += new_power;
        }

        // sortants, par ordre d'adresse
        for (operator, record) in last {
            if let Some(validator) = self.get_validator(ctx, &operator)? {
                if validator.is_bonded() {
                    self.begin_unbonding_validator(ctx, validator)?;
                }
            }
            self.delete_last_validator_power(ctx, &operator)?;
            updates.push(ValidatorUpdate {
                pub_key: record.pub_key,
                power: 0,
            });
        }

        if !updates.is_empty() {
            self.set_last_total_power(ctx, total_power)?;
            debug!("validator set: {} updates, total power {}", updates.len(), total_power);
        }

        Ok(updates)
    }

    /// Unbonded/Unbonding -> Bonded
    fn bond_validator(&self, ctx: &mut Context, mut validator: Validator) -> Result<Validator, StakingError> {
        self.delete_validator_by_power_index(ctx, &validator)?;
        if validator.is_unbonding() {
            self.delete_validator_queue(ctx, &validator)?;
        }

        let from = validator.status;
        validator.status = BondStatus::Bonded;
        self.not_bonded_tokens_to_bonded(ctx, validator.tokens)?;

        self.set_validator(ctx, &validator)?;
        self.set_validator_by_power_index(ctx, &validator)?;

        info!("Validator {} bonded ({} -> Bonded), tokens {}", validator.operator, from, validator.tokens);
        Ok(validator)
    }

    /// Bonded -> Unbonding, avec entrée dans la file des validateurs
    pub(crate) fn begin_unbonding_validator(
        &self,
        ctx: &mut Context,
        mut validator: Validator,
    ) -> Result<Validator, StakingError> {
        if !validator.is_bonded() {
            panic!("should not already be unbonded or unbonding, validator: {}", validator);
        }

        validator.status = BondStatus::Unbonding;
        self.bonded_tokens_to_not_bonded(ctx, validator.tokens)?;

        validator.unbonding_completion_time = ctx.block_time() + self.unbonding_time(ctx)?;
        validator.unbonding_height = ctx.block_height();

        self.set_validator(ctx, &validator)?;
        self.set_validator_by_power_index(ctx, &validator)?;
        self.insert_validator_queue(ctx, &validator)?;

        info!(
            "Validator {} unbonding until {}",
            validator.operator, validator.unbonding_completion_time
        );
        Ok(validator)
    }

    /// Unbonding -> Unbonded
    fn complete_unbonding_validator(&self, ctx: &mut Context, mut validator: Validator) -> Result<Validator, StakingError> {
        if !validator.is_unbonding() {
            panic!("unexpected validator in unbonding queue; status was not unbonding: {}", validator);
        }
        validator.status = BondStatus::Unbonded;
        self.set_validator(ctx, &validator)?;
        info!("Validator {} unbonded", validator.operator);
        Ok(validator)
    }

    /// Termine l'unbonding des validateurs arrivés à maturité (temps et hauteur)
    pub fn unbond_all_mature_validator_queue(&self, ctx: &mut Context) -> Result<Vec<AccountId>, StakingError> {
        let (now, height) = (ctx.block_time(), ctx.block_height());
        let mut matured = Vec::new();

        for ((time, queued_height), operators) in self.get_validator_queue(ctx)? {
            if time > now {
                break;
            }
            if queued_height > height {
                continue;
            }

            for operator in operators {
                let validator = match self.get_validator(ctx, &operator)? {
                    Some(v) => v,
                    None => panic!("validator {} in the unbonding queue was not found", operator),
                };
                let validator = self.complete_unbonding_validator(ctx, validator)?;
                if validator.delegator_shares.is_zero() {
                    self.remove_validator(ctx, &operator)?;
                }
                matured.push(operator);
            }

            ctx.store_mut().delete(&keys::validator_queue_key(time, queued_height))?;
        }

        Ok(matured)
    }

    // ----- prison -----

    pub(crate) fn jail_validator(&self, ctx: &mut Context, mut validator: Validator) -> Result<Validator, StakingError> {
        if validator.jailed {
            panic!("cannot jail already jailed validator, validator: {}", validator);
        }

        self.delete_validator_by_power_index(ctx, &validator)?;
        validator.jailed = true;
        self.set_validator(ctx, &validator)?;

        if validator.is_bonded() {
            validator = self.begin_unbonding_validator(ctx, validator)?;
        }
        Ok(validator)
    }

    fn unjail_validator(&self, ctx: &mut Context, mut validator: Validator) -> Result<Validator, StakingError> {
        if !validator.jailed {
            return Err(StakingError::NotJailed(validator.operator));
        }

        let self_tokens = self
            .get_delegation(ctx, &validator.operator, &validator.operator)?
            .map_or(0, |d| validator.tokens_from_shares(d.shares).truncate_int());
        if self_tokens < validator.min_self_delegation {
            return Err(StakingError::SelfDelegationBelowMinimum {
                min: validator.min_self_delegation,
            });
        }

        validator.jailed = false;
        self.set_validator(ctx, &validator)?;
        self.set_validator_by_power_index(ctx, &validator)?;
        Ok(validator)
    }

    /// Emprisonne le validateur d'une adresse de consensus
    pub fn jail(&self, ctx: &mut Context, cons: &ConsAddress) -> Result<Validator, StakingError> {
        let validator = self
            .get_validator_by_cons_addr(ctx, cons)?
            .ok_or(StakingError::ValidatorConsAddrNotFound(*cons))?;
        if validator.jailed {
            return Err(StakingError::ValidatorJailed(validator.operator));
        }

        let validator = self.jail_validator(ctx, validator)?;
        warn!("Validator jailed: {} (cons {})", validator.operator, cons);
        Ok(validator)
    }

    pub fn unjail(&self, ctx: &mut Context, cons: &ConsAddress) -> Result<Validator, StakingError> {
        let validator = self
            .get_validator_by_cons_addr(ctx, cons)?
            .ok_or(StakingError::ValidatorConsAddrNotFound(*cons))?;

        let validator = self.unjail_validator(ctx, validator)?;
        info!("Validator unjailed: {} (cons {})", validator.operator, cons);
        Ok(validator)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::bank::Pool;
    use crate::staking::params::Params;
    use crate::staking::validator::{CommissionRates, Description};
    use crate::types::{tokens_from_consensus_power, Balance, Dec};

    fn params(max_validators: u16) -> Params {
        Params {
            max_validators,
            frozen_time: 0,
            unbonding_time: 100,
            ..Params::default()
        }
    }

    fn add_validator(k: &Keeper, ctx: &mut Context, b: u8, power: Power) -> Validator {
        let v = k
            .create_validator(ctx, addr(b), pubkey(b), Description::new("v", "", "", ""), CommissionRates::default(), 1)
            .unwrap();
        k.delegate(ctx, &addr(b), tokens_from_consensus_power(power), BondStatus::Unbonded, v, true)
            .unwrap();
        k.get_validator(ctx, &addr(b)).unwrap().unwrap()
    }

    fn funded(max_validators: u16, n: u8) -> crate::storage::MemStore {
        let accounts: Vec<(AccountId, Balance)> =
            (1..=n).map(|b| (addr(b), tokens_from_consensus_power(1_000))).collect();
        funded_store(&params(max_validators), &accounts)
    }

    #[test]
    fn test_top_validators_bonded() {
        let mut store = funded(2, 3);
        let k = keeper();
        let mut ctx = Context::new(&mut store, header(1, 1_000));

        add_validator(&k, &mut ctx, 1, 10);
        add_validator(&k, &mut ctx, 2, 30);
        add_validator(&k, &mut ctx, 3, 20);

        let updates = k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        assert_eq!(
            updates,
            vec![
                ValidatorUpdate { pub_key: pubkey(2), power: 30 },
                ValidatorUpdate { pub_key: pubkey(3), power: 20 },
            ]
        );
        assert!(k.get_validator(&ctx, &addr(2)).unwrap().unwrap().is_bonded());
        assert!(k.get_validator(&ctx, &addr(1)).unwrap().unwrap().is_unbonded());
        assert_eq!(k.get_last_total_power(&ctx).unwrap(), 50);
        assert_eq!(k.pool_tokens(&ctx, Pool::Bonded).unwrap(), tokens_from_consensus_power(50));
        assert_eq!(k.pool_tokens(&ctx, Pool::NotBonded).unwrap(), tokens_from_consensus_power(10));

        // rien n'a changé: pas de mise à jour
        assert!(k.apply_and_return_validator_set_updates(&mut ctx).unwrap().is_empty());
    }

    #[test]
    fn test_displaced_validator_starts_unbonding() {
        let mut store = funded(1, 2);
        let k = keeper();
        {
            let mut ctx = Context::new(&mut store, header(1, 1_000));
            add_validator(&k, &mut ctx, 1, 10);
            k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        }

        let mut ctx = Context::new(&mut store, header(2, 1_010));
        add_validator(&k, &mut ctx, 2, 20);
        let updates = k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        assert_eq!(
            updates,
            vec![
                ValidatorUpdate { pub_key: pubkey(2), power: 20 },
                ValidatorUpdate { pub_key: pubkey(1), power: 0 },
            ]
        );

        let v1 = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
        assert!(v1.is_unbonding());
        assert_eq!(v1.unbonding_completion_time, 1_110);
        assert_eq!(v1.unbonding_height, 2);
        assert_eq!(k.get_validator_queue_timeslice(&ctx, 1_110, 2).unwrap(), vec![addr(1)]);
        assert_eq!(k.get_last_validator_power(&ctx, &addr(1)).unwrap(), 0);
    }

    #[test]
    fn test_rebonding_clears_validator_queue() {
        let mut store = funded(1, 2);
        let k = keeper();
        {
            let mut ctx = Context::new(&mut store, header(1, 1_000));
            add_validator(&k, &mut ctx, 1, 10);
            add_validator(&k, &mut ctx, 2, 5);
            k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        }

        let mut ctx = Context::new(&mut store, header(2, 1_010));
        let v1 = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
        k.jail_validator(&mut ctx, v1).unwrap();
        let updates = k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        assert_eq!(updates.len(), 2);
        assert!(k.get_validator(&ctx, &addr(2)).unwrap().unwrap().is_bonded());

        // validateur 2 passe derrière 1 une fois libéré
        k.unjail(&mut ctx, &pubkey(1).address()).unwrap();
        k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        let v1 = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
        assert!(v1.is_bonded());
        assert!(k.get_validator_queue_timeslice(&ctx, 1_110, 2).unwrap().is_empty());
        assert!(k.get_validator(&ctx, &addr(2)).unwrap().unwrap().is_unbonding());
    }

    #[test]
    fn test_mature_validator_queue_requires_time_and_height() {
        let mut store = funded(1, 2);
        let k = keeper();
        {
            let mut ctx = Context::new(&mut store, header(1, 1_000));
            add_validator(&k, &mut ctx, 1, 10);
            k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
            let v1 = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
            k.jail_validator(&mut ctx, v1).unwrap();
        }

        // temps non atteint
        let mut ctx = Context::new(&mut store, header(2, 1_099));
        assert!(k.unbond_all_mature_validator_queue(&mut ctx).unwrap().is_empty());

        let mut ctx = Context::new(&mut store, header(3, 1_100));
        assert_eq!(k.unbond_all_mature_validator_queue(&mut ctx).unwrap(), vec![addr(1)]);
        assert!(k.get_validator(&ctx, &addr(1)).unwrap().unwrap().is_unbonded());
        assert!(k.get_validator_queue(&ctx).unwrap().is_empty());

        // balayage idempotent
        assert!(k.unbond_all_mature_validator_queue(&mut ctx).unwrap().is_empty());
    }

    #[test]
    fn test_jail_moves_bonded_tokens_immediately() {
        let mut store = funded(5, 1);
        let k = keeper();
        let mut ctx = Context::new(&mut store, header(1, 1_000));
        add_validator(&k, &mut ctx, 1, 10);
        k.apply_and_return_validator_set_updates(&mut ctx).unwrap();

        let v = k.jail(&mut ctx, &pubkey(1).address()).unwrap();
        assert!(v.jailed);
        assert!(v.is_unbonding());
        assert_eq!(k.pool_tokens(&ctx, Pool::Bonded).unwrap(), 0);
        assert!(k.get_validators_by_power(&ctx, 10).unwrap().is_empty());

        assert!(matches!(
            k.jail(&mut ctx, &pubkey(1).address()),
            Err(StakingError::ValidatorJailed(_))
        ));

        let updates = k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        assert_eq!(updates, vec![ValidatorUpdate { pub_key: pubkey(1), power: 0 }]);
        assert_eq!(k.get_last_total_power(&ctx).unwrap(), 0);
    }

    #[test]
    fn test_unjail_rules() {
        let mut store = funded(5, 1);
        let k = keeper();
        let mut ctx = Context::new(&mut store, header(1, 1_000));
        add_validator(&k, &mut ctx, 1, 10);

        assert!(matches!(
            k.unjail(&mut ctx, &pubkey(1).address()),
            Err(StakingError::NotJailed(_))
        ));
        assert!(matches!(
            k.unjail(&mut ctx, &pubkey(9).address()),
            Err(StakingError::ValidatorConsAddrNotFound(_))
        ));

        // minimum relevé au-dessus de l'auto-délégation
        let mut v = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
        v.min_self_delegation = tokens_from_consensus_power(11);
        k.set_validator(&mut ctx, &v).unwrap();
        k.jail(&mut ctx, &pubkey(1).address()).unwrap();
        assert!(matches!(
            k.unjail(&mut ctx, &pubkey(1).address()),
            Err(StakingError::SelfDelegationBelowMinimum { .. })
        ));

        let mut v = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
        v.min_self_delegation = tokens_from_consensus_power(10);
        k.set_validator(&mut ctx, &v).unwrap();
        let v = k.unjail(&mut ctx, &pubkey(1).address()).unwrap();
        assert!(!v.jailed);
        assert_eq!(k.get_validators_by_power(&ctx, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_self_undelegation_below_minimum_jails() {
        let mut store = funded(5, 1);
        let k = keeper();
        let mut ctx = Context::new(&mut store, header(1, 1_000));
        let mut v = add_validator(&k, &mut ctx, 1, 10);
        v.min_self_delegation = tokens_from_consensus_power(5);
        k.set_validator(&mut ctx, &v).unwrap();
        k.apply_and_return_validator_set_updates(&mut ctx).unwrap();

        k.undelegate(&mut ctx, &addr(1), &addr(1), Dec::from_int(tokens_from_consensus_power(6)))
            .unwrap();

        let v = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
        assert!(v.jailed);
        assert!(v.is_unbonding());
        assert_eq!(v.tokens, tokens_from_consensus_power(4));
        // tout le stake est passé dans le pool non-bonded, sans double transfert
        assert_eq!(k.pool_tokens(&ctx, Pool::Bonded).unwrap(), 0);
        assert_eq!(k.pool_tokens(&ctx, Pool::NotBonded).unwrap(), tokens_from_consensus_power(10));
    }
}
