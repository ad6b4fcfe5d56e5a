// Slashing - Pénalités proportionnelles, propagées aux unbondings et redélégations
//
// Seules les entrées créées à ou avant la hauteur de l'infraction, et pas encore
// mûres, contribuent: le stake parti après l'infraction n'est pas touché.

use crate::bank::Pool;
use crate::context::Context;
use crate::types::{tokens_from_consensus_power, Balance, BlockHeight, ConsAddress, Dec, Power};
use tracing::{debug, info, warn};

use super::Keeper;
use crate::staking::delegation::{Redelegation, UnbondingDelegation};
use crate::staking::error::StakingError;
use crate::staking::validator::BondStatus;

impl Keeper {
    /// Slash le validateur de `cons` pour une infraction à `infraction_height`,
    /// `power` étant sa puissance à ce moment. Renvoie le total brûlé.
    pub fn slash(
        &self,
        ctx: &mut Context,
        cons: &ConsAddress,
        infraction_height: BlockHeight,
        power: Power,
        slash_factor: Dec,
    ) -> Result<Balance, StakingError> {
        let slash_amount = Dec::from_int(tokens_from_consensus_power(power))
            .mul(slash_factor)
            .truncate_int();

        let validator = match self.get_validator_by_cons_addr(ctx, cons)? {
            Some(v) => v,
            None => {
                // peut arriver si le validateur a terminé son unbonding et a été supprimé
                warn!("Ignored attempt to slash a nonexistent validator with address {}", cons);
                return Ok(0);
            }
        };

        if validator.is_unbonded() {
            panic!("should not be slashing unbonded validator: {}", validator);
        }

        let current_height = ctx.block_height();
        if infraction_height > current_height {
            panic!(
                "impossible attempt to slash future infraction at height {} but we are at height {}",
                infraction_height, current_height
            );
        }

        let operator = validator.operator;
        let mut remaining = slash_amount;
        let mut burned: Balance = 0;

        if infraction_height < current_height {
            for ubd in self.get_unbonding_delegations_from_validator(ctx, &operator)? {
                let (due, burnt) = self.slash_unbonding_delegation(ctx, ubd, infraction_height, slash_factor)?;
                remaining = remaining.saturating_sub(due);
                burned += burnt;
            }
            for red in self.get_redelegations_from_src_validator(ctx, &operator)? {
                let (due, burnt) = self.slash_redelegation(ctx, red, infraction_height, slash_factor)?;
                remaining = remaining.saturating_sub(due);
                burned += burnt;
            }
        }

        let validator = self.must_get_validator(ctx, &operator)?;
        let tokens_to_burn = remaining.min(validator.tokens);
        let pool = if validator.is_bonded() { Pool::Bonded } else { Pool::NotBonded };

        let validator = self.remove_validator_tokens(ctx, validator, tokens_to_burn)?;
        self.burn_tokens(ctx, pool, tokens_to_burn)?;
        burned += tokens_to_burn;

        info!(
            "Validator {} slashed by factor {} at height {}: burned {} (validator tokens now {})",
            operator, slash_factor, infraction_height, burned, validator.tokens
        );
        Ok(burned)
    }

    /// Renvoie (montant dû, montant réellement brûlé)
    fn slash_unbonding_delegation(
        &self,
        ctx: &mut Context,
        mut ubd: UnbondingDelegation,
        infraction_height: BlockHeight,
        slash_factor: Dec,
    ) -> Result<(Balance, Balance), StakingError> {
        let now = ctx.block_time();
        let mut due: Balance = 0;
        let mut burned: Balance = 0;

        for entry in ubd.entries.iter_mut() {
            if entry.creation_height > infraction_height || entry.is_mature(now) {
                continue;
            }

            let slash_amount = Dec::from_int(entry.initial_balance).mul(slash_factor).truncate_int();
            due += slash_amount;

            let burnt = slash_amount.min(entry.balance);
            entry.balance -= burnt;
            burned += burnt;
        }

        if burned > 0 {
            self.set_unbonding_delegation(ctx, &ubd)?;
            self.burn_tokens(ctx, Pool::NotBonded, burned)?;
            debug!("slashed unbonding ({}, {}): burned {}", ubd.delegator, ubd.validator, burned);
        }
        Ok((due, burned))
    }

    /// Renvoie (montant dû, montant réellement brûlé)
    fn slash_redelegation(
        &self,
        ctx: &mut Context,
        mut red: Redelegation,
        infraction_height: BlockHeight,
        slash_factor: Dec,
    ) -> Result<(Balance, Balance), StakingError> {
        let now = ctx.block_time();
        let (delegator, dst) = (red.delegator, red.validator_dst);
        let mut due: Balance = 0;
        let mut burned: Balance = 0;
        let mut touched = false;

        for entry in red.entries.iter_mut() {
            if entry.creation_height > infraction_height || entry.is_mature(now) {
                continue;
            }

            due += Dec::from_int(entry.initial_balance).mul(slash_factor).truncate_int();

            // délégation supprimée: plus rien à reprendre à la destination
            let delegation = match self.get_delegation(ctx, &delegator, &dst)? {
                Some(d) => d,
                None => continue,
            };

            let mut shares_to_unbond = slash_factor.mul(entry.shares_dst);
            if shares_to_unbond.is_zero() {
                continue;
            }
            if shares_to_unbond > delegation.shares {
                shares_to_unbond = delegation.shares;
            }

            let tokens = self.unbond(ctx, &delegator, &dst, shares_to_unbond)?;
            entry.shares_dst = entry.shares_dst.checked_sub(shares_to_unbond).unwrap_or_default();
            touched = true;

            let dst_status = self.get_validator(ctx, &dst)?.map_or(BondStatus::Unbonded, |v| v.status);
            let pool = if dst_status == BondStatus::Bonded { Pool::Bonded } else { Pool::NotBonded };
            self.burn_tokens(ctx, pool, tokens)?;
            burned += tokens;
        }

        if touched {
            self.set_redelegation(ctx, &red)?;
            debug!(
                "slashed redelegation ({}, {} -> {}): burned {}",
                delegator, red.validator_src, dst, burned
            );
        }
        Ok((due, burned))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::staking::params::Params;
    use crate::staking::validator::{CommissionRates, Description};
    use crate::types::AccountId;

    fn setup(store: &mut crate::storage::MemStore, k: &Keeper) {
        let mut ctx = Context::new(store, header(1, 1_000));
        for b in [1u8, 2] {
            let v = k
                .create_validator(&mut ctx, addr(b), pubkey(b), Description::new("v", "", "", ""), CommissionRates::default(), 1)
                .unwrap();
            k.delegate(&mut ctx, &addr(b), tokens_from_consensus_power(10), BondStatus::Unbonded, v, true)
                .unwrap();
        }
        let v1 = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
        k.delegate(&mut ctx, &addr(9), tokens_from_consensus_power(4), BondStatus::Unbonded, v1, true)
            .unwrap();
        k.apply_and_return_validator_set_updates(&mut ctx).unwrap();
    }

    fn store() -> crate::storage::MemStore {
        let p = Params {
            frozen_time: 0,
            ..Params::default()
        };
        let accounts: Vec<(AccountId, Balance)> = [1u8, 2, 9]
            .iter()
            .map(|b| (addr(*b), tokens_from_consensus_power(10)))
            .collect();
        funded_store(&p, &accounts)
    }

    fn half() -> Dec {
        Dec::new_with_prec(5, 1)
    }

    #[test]
    fn test_slash_unbonding_created_before_infraction() {
        let mut store = store();
        let k = keeper();
        setup(&mut store, &k);
        {
            let mut ctx = Context::new(&mut store, header(2, 1_010));
            k.undelegate(&mut ctx, &addr(9), &addr(1), Dec::from_int(tokens_from_consensus_power(2)))
                .unwrap();
        }

        let mut ctx = Context::new(&mut store, header(5, 1_050));
        let burned = k.slash(&mut ctx, &pubkey(1).address(), 3, 14, half()).unwrap();

        // 7 dus: 1 pris sur l'unbonding, 6 sur le validateur
        assert_eq!(burned, tokens_from_consensus_power(7));
        let ubd = k.get_unbonding_delegation(&ctx, &addr(9), &addr(1)).unwrap().unwrap();
        assert_eq!(ubd.entries[0].balance, tokens_from_consensus_power(1));
        assert_eq!(ubd.entries[0].initial_balance, tokens_from_consensus_power(2));
        assert_eq!(
            k.get_validator(&ctx, &addr(1)).unwrap().unwrap().tokens,
            tokens_from_consensus_power(6)
        );
        assert_eq!(k.pool_tokens(&ctx, Pool::NotBonded).unwrap(), tokens_from_consensus_power(1));
    }

    #[test]
    fn test_slash_skips_entries_after_infraction() {
        let mut store = store();
        let k = keeper();
        setup(&mut store, &k);
        {
            let mut ctx = Context::new(&mut store, header(2, 1_010));
            k.undelegate(&mut ctx, &addr(9), &addr(1), Dec::from_int(tokens_from_consensus_power(2)))
                .unwrap();
        }

        let mut ctx = Context::new(&mut store, header(5, 1_050));
        k.slash(&mut ctx, &pubkey(1).address(), 1, 14, half()).unwrap();

        let ubd = k.get_unbonding_delegation(&ctx, &addr(9), &addr(1)).unwrap().unwrap();
        assert_eq!(ubd.entries[0].balance, tokens_from_consensus_power(2));
        assert_eq!(
            k.get_validator(&ctx, &addr(1)).unwrap().unwrap().tokens,
            tokens_from_consensus_power(5)
        );
    }

    #[test]
    fn test_slash_redelegation_unbonds_at_destination() {
        let mut store = store();
        let k = keeper();
        setup(&mut store, &k);
        {
            let mut ctx = Context::new(&mut store, header(2, 1_010));
            k.begin_redelegation(&mut ctx, &addr(9), &addr(1), &addr(2), Dec::from_int(tokens_from_consensus_power(4)))
                .unwrap();
        }

        let mut ctx = Context::new(&mut store, header(5, 1_050));
        k.slash(&mut ctx, &pubkey(1).address(), 3, 14, half()).unwrap();

        let red = k.get_redelegation(&ctx, &addr(9), &addr(1), &addr(2)).unwrap().unwrap();
        assert_eq!(red.entries[0].shares_dst, Dec::from_int(tokens_from_consensus_power(2)));
        assert_eq!(
            k.get_delegation(&ctx, &addr(9), &addr(2)).unwrap().unwrap().shares,
            Dec::from_int(tokens_from_consensus_power(2))
        );
        assert_eq!(
            k.get_validator(&ctx, &addr(2)).unwrap().unwrap().tokens,
            tokens_from_consensus_power(12)
        );
        // 7 dus, 2 repris via la redélégation
        assert_eq!(
            k.get_validator(&ctx, &addr(1)).unwrap().unwrap().tokens,
            tokens_from_consensus_power(5)
        );
    }

    #[test]
    fn test_slash_current_height_only_touches_validator() {
        let mut store = store();
        let k = keeper();
        setup(&mut store, &k);
        {
            let mut ctx = Context::new(&mut store, header(2, 1_010));
            k.undelegate(&mut ctx, &addr(9), &addr(1), Dec::from_int(tokens_from_consensus_power(2)))
                .unwrap();
        }

        let mut ctx = Context::new(&mut store, header(3, 1_020));
        k.slash(&mut ctx, &pubkey(1).address(), 3, 12, half()).unwrap();
        let ubd = k.get_unbonding_delegation(&ctx, &addr(9), &addr(1)).unwrap().unwrap();
        assert_eq!(ubd.entries[0].balance, tokens_from_consensus_power(2));
        assert_eq!(
            k.get_validator(&ctx, &addr(1)).unwrap().unwrap().tokens,
            tokens_from_consensus_power(6)
        );
    }

    #[test]
    fn test_slash_unknown_validator_is_ignored() {
        let mut store = store();
        let k = keeper();
        let mut ctx = Context::new(&mut store, header(5, 1_050));
        assert_eq!(k.slash(&mut ctx, &pubkey(7).address(), 3, 10, half()).unwrap(), 0);
    }

    #[test]
    #[should_panic(expected = "future infraction")]
    fn test_slash_future_infraction_panics() {
        let mut store = store();
        let k = keeper();
        setup(&mut store, &k);
        let mut ctx = Context::new(&mut store, header(2, 1_010));
        let _ = k.slash(&mut ctx, &pubkey(1).address(), 3, 10, half());
    }
}
