// EndBlocker - Balayage des files puis recalcul de l'ensemble de validateurs
use crate::context::Context;
use tracing::{debug, info};

use super::error::StakingError;
use super::events::{
    Event, ATTR_DELEGATOR, ATTR_DST_VALIDATOR, ATTR_SRC_VALIDATOR, ATTR_VALIDATOR, EVENT_TYPE_COMPLETE_REDELEGATION,
    EVENT_TYPE_COMPLETE_UNBONDING,
};
use super::keeper::Keeper;
use super::validator::ValidatorUpdate;

/// Sortie d'un EndBlock
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndBlockResult {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}

/// Exécuté une fois par bloc, après les transactions
pub fn end_blocker(ctx: &mut Context, keeper: &Keeper) -> Result<EndBlockResult, StakingError> {
    let now = ctx.block_time();
    let mut events = Vec::new();

    let matured = keeper.unbond_all_mature_validator_queue(ctx)?;
    if !matured.is_empty() {
        debug!("{} validators finished unbonding", matured.len());
    }

    for pair in keeper.dequeue_all_mature_ubd_queue(ctx, now)? {
        match keeper.complete_unbonding(ctx, &pair.delegator, &pair.validator) {
            Ok(_) => events.push(
                Event::new(EVENT_TYPE_COMPLETE_UNBONDING)
                    .attr(ATTR_VALIDATOR, pair.validator)
                    .attr(ATTR_DELEGATOR, pair.delegator),
            ),
            // déjà entièrement versé
            Err(StakingError::UnbondingDelegationNotFound) => continue,
            Err(e) => return Err(e),
        }
    }

    for triplet in keeper.dequeue_all_mature_redelegation_queue(ctx, now)? {
        match keeper.complete_redelegation(ctx, &triplet.delegator, &triplet.validator_src, &triplet.validator_dst) {
            Ok(()) => events.push(
                Event::new(EVENT_TYPE_COMPLETE_REDELEGATION)
                    .attr(ATTR_DELEGATOR, triplet.delegator)
                    .attr(ATTR_SRC_VALIDATOR, triplet.validator_src)
                    .attr(ATTR_DST_VALIDATOR, triplet.validator_dst),
            ),
            Err(StakingError::RedelegationNotFound) => continue,
            Err(e) => return Err(e),
        }
    }

    let validator_updates = keeper.apply_and_return_validator_set_updates(ctx)?;
    if !validator_updates.is_empty() {
        info!(
            "EndBlock {}: {} validator updates",
            ctx.block_height(),
            validator_updates.len()
        );
    }

    Ok(EndBlockResult {
        validator_updates,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking::keeper::test_utils::*;
    use crate::staking::params::Params;
    use crate::staking::validator::{BondStatus, CommissionRates, Description};
    use crate::types::{tokens_from_consensus_power, Dec};

    #[test]
    fn test_end_blocker_sweeps_then_updates() {
        let p = Params {
            unbonding_time: 50,
            frozen_time: 0,
            ..Params::default()
        };
        let mut store = funded_store(&p, &[(addr(1), tokens_from_consensus_power(10)), (addr(9), 500)]);
        let k = keeper();
        {
            let mut ctx = Context::new(&mut store, header(1, 1_000));
            let v = k
                .create_validator(&mut ctx, addr(1), pubkey(1), Description::new("v", "", "", ""), CommissionRates::default(), 1)
                .unwrap();
            k.delegate(&mut ctx, &addr(1), tokens_from_consensus_power(10), BondStatus::Unbonded, v, true)
                .unwrap();
            let v = k.get_validator(&ctx, &addr(1)).unwrap().unwrap();
            k.delegate(&mut ctx, &addr(9), 500, BondStatus::Unbonded, v, true).unwrap();

            let result = end_blocker(&mut ctx, &k).unwrap();
            assert_eq!(result.validator_updates.len(), 1);
            assert_eq!(result.validator_updates[0].power, 10);

            k.undelegate(&mut ctx, &addr(9), &addr(1), Dec::from_int(500)).unwrap();
        }

        {
            let mut ctx = Context::new(&mut store, header(2, 1_049));
            let result = end_blocker(&mut ctx, &k).unwrap();
            assert!(result.events.is_empty());
        }

        let mut ctx = Context::new(&mut store, header(3, 1_050));
        let result = end_blocker(&mut ctx, &k).unwrap();
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].kind, EVENT_TYPE_COMPLETE_UNBONDING);
        assert!(result.validator_updates.is_empty());
        assert_eq!(k.supply().balance(ctx.store(), &addr(9), "poc").unwrap(), 500);

        // second passage: rien à faire
        let again = end_blocker(&mut ctx, &k).unwrap();
        assert_eq!(again, EndBlockResult::default());
    }
}
