// Scenarios - Cycle de vie de bout en bout: messages, slash, EndBlock

#[cfg(test)]
mod scenario_tests {
    use crate::staking::{BondStatus, StakingError, ValidatorUpdate};
    use crate::staking::params::Params;
    use crate::tests::harness::*;
    use crate::types::{Dec, SECONDS_PER_DAY};

    // ===== SCENARIO A: CREATE VALIDATOR -> BONDED =====

    #[test]
    fn test_created_validator_bonds_at_end_block() {
        let a = addr(1);
        let mut chain = TestChain::new(short_params(), &[(a, 1_000_000)]);

        chain.create_validator(a, 1, 1_000_000).unwrap();
        assert_eq!(chain.validator(a).status, BondStatus::Unbonded);
        assert_eq!(chain.balance(a), 0);

        let result = chain.commit_block(5);
        assert_eq!(result.validator_updates, vec![ValidatorUpdate { pub_key: pubkey(1), power: 1 }]);

        let v = chain.validator(a);
        assert_eq!(v.status, BondStatus::Bonded);
        assert_eq!(v.tokens, 1_000_000);

        let by_power = chain.read(|k, ctx| k.get_validators_by_power(ctx, 100)).unwrap();
        assert_eq!(by_power.len(), 1);
        assert_eq!(by_power[0].operator, a);
        chain.assert_invariants();
    }

    // ===== SCENARIO B: SLASH 50% AT CURRENT HEIGHT =====

    #[test]
    fn test_slash_half_at_current_height() {
        let (a, b) = (addr(1), addr(2));
        let mut chain = TestChain::new(short_params(), &[(a, 1_000_000), (b, 10_000_000)]);
        chain.create_validator(a, 1, 1_000_000).unwrap();
        chain.create_validator(b, 2, 10_000_000).unwrap();
        chain.commit_block(5);

        let half = Dec::new_with_prec(5, 1);
        let height = chain.height;
        assert_eq!(chain.slash(a, height, 1, half), 500_000);
        assert_eq!(chain.slash(b, height, 10, half), 5_000_000);

        let va = chain.validator(a);
        assert_eq!(va.tokens, 500_000);
        assert_eq!(va.status, BondStatus::Bonded);
        assert_eq!(chain.validator(b).tokens, 5_000_000);
        chain.assert_invariants();

        // 500_000 tokens ne donnent plus de puissance: A quitte l'ensemble
        let result = chain.commit_block(5);
        assert!(result.validator_updates.contains(&ValidatorUpdate { pub_key: pubkey(1), power: 0 }));
        assert!(result.validator_updates.contains(&ValidatorUpdate { pub_key: pubkey(2), power: 5 }));
        assert_eq!(chain.validator(a).status, BondStatus::Unbonding);
        assert_eq!(chain.validator(b).status, BondStatus::Bonded);
        chain.assert_invariants();
    }

    // ===== SCENARIO C: UNDELEGATE THEN MATURE =====

    #[test]
    fn test_undelegation_pays_out_after_unbonding_time() {
        let (a, d) = (addr(1), addr(9));
        let mut chain = TestChain::new(short_params(), &[(a, 1_000_000), (d, 100)]);
        chain.create_validator(a, 1, 1_000_000).unwrap();
        chain.delegate(d, a, 100).unwrap();
        chain.commit_block(5);

        let start = chain.time;
        chain.undelegate(d, a, 10).unwrap();
        assert_eq!(chain.balance(d), 0);

        chain.commit_block(50);
        chain.commit_block(40);
        let ubd = chain.unbonding(d, a).unwrap();
        assert_eq!(ubd.entries.len(), 1);
        assert_eq!(ubd.entries[0].balance, 10);
        assert_eq!(ubd.entries[0].completion_time, start + 100);

        chain.commit_block(10);
        assert_eq!(chain.time, start + 100);
        chain.end_block();

        assert!(chain.unbonding(d, a).is_none());
        assert_eq!(chain.balance(d), 10);
        assert_eq!(chain.delegation(d, a).unwrap().shares, Dec::from_int(90));
        chain.assert_invariants();
    }

    // ===== SCENARIO D: TRANSITIVE REDELEGATION =====

    #[test]
    fn test_second_redelegation_waits_for_first() {
        let (a, b, c, d) = (addr(1), addr(2), addr(3), addr(9));
        let mut chain = TestChain::new(
            short_params(),
            &[(a, 1_000_000), (b, 1_000_000), (c, 1_000_000), (d, 100)],
        );
        for (seed, op) in [(1, a), (2, b), (3, c)] {
            chain.create_validator(op, seed, 1_000_000).unwrap();
        }
        chain.delegate(d, a, 100).unwrap();
        chain.commit_block(5);

        chain.redelegate(d, a, b, 10).unwrap();
        let err = chain.redelegate(d, a, c, 10).unwrap_err();
        assert_eq!(err.code, code(StakingError::TransitiveRedelegation));
        assert!(chain.redelegation(d, a, c).is_none());

        chain.commit_block(100);
        chain.end_block();
        assert!(chain.redelegation(d, a, b).is_none());

        chain.redelegate(d, a, c, 10).unwrap();
        assert_eq!(chain.delegation(d, a).unwrap().shares, Dec::from_int(80));
        assert_eq!(chain.delegation(d, c).unwrap().shares, Dec::from_int(10));
        chain.assert_invariants();
    }

    // ===== SCENARIO E: FROZEN SELF-DELEGATION =====

    #[test]
    fn test_self_undelegation_frozen_for_a_year() {
        let a = addr(1);
        let frozen_time = 365 * SECONDS_PER_DAY;
        let params = Params {
            frozen_time,
            ..short_params()
        };
        let mut chain = TestChain::new(params, &[(a, 2_000_000)]);
        chain.create_validator(a, 1, 2_000_000).unwrap();
        let created = chain.validator(a).creation_time;
        chain.commit_block(1);
        assert_eq!(chain.time, created + 1);

        let err = chain.undelegate(a, a, 10).unwrap_err();
        assert_eq!(
            err.code,
            code(StakingError::FrozenPeriod {
                validator: a,
                until: created + frozen_time
            })
        );
        assert!(chain.unbonding(a, a).is_none());

        chain.commit_block(frozen_time - 1);
        assert_eq!(chain.time, created + frozen_time);
        chain.undelegate(a, a, 10).unwrap();
        assert_eq!(chain.unbonding(a, a).unwrap().entries[0].balance, 10);
        chain.assert_invariants();
    }
}
