// Lifecycle - Règles de délégation, files d'attente, slash et genèse

#[cfg(test)]
mod lifecycle_tests {
    use crate::context::{BlockHeader, Context};
    use crate::genesis::GenesisDoc;
    use crate::staking::msgs::MsgCreateValidator;
    use crate::staking::params::Params;
    use crate::staking::validator::{CommissionRates, Description};
    use crate::staking::{BondStatus, Keeper, ModuleCodec, StakingError, ValidatorUpdate};
    use crate::storage::MemStore;
    use crate::tests::harness::*;
    use crate::types::{AccountId, Dec};
    use std::sync::Arc;

    // ===== HELPER FUNCTIONS =====

    /// A (10 de puissance) et B (5) liés, D a délégué 1000 à A
    fn bonded_pair() -> (TestChain, AccountId, AccountId, AccountId) {
        let (a, b, d) = (addr(1), addr(2), addr(9));
        let mut chain = TestChain::new(short_params(), &[(a, 10_000_000), (b, 5_000_000), (d, 1_000)]);
        chain.create_validator(a, 1, 10_000_000).unwrap();
        chain.create_validator(b, 2, 5_000_000).unwrap();
        chain.delegate(d, a, 1_000).unwrap();
        chain.commit_block(5);
        (chain, a, b, d)
    }

    fn exported_doc(chain: &mut TestChain) -> GenesisDoc {
        let bank = chain.bank.clone();
        let time = chain.time;
        chain
            .read(|k, ctx| GenesisDoc::export(ctx, time, &bank, k))
            .unwrap()
    }

    // ===== TEST 1: FROZEN PERIOD ONLY BINDS THE OPERATOR =====

    #[test]
    fn test_frozen_period_scope() {
        let (a, b, d) = (addr(1), addr(2), addr(9));
        let params = Params {
            frozen_time: 1_000,
            ..short_params()
        };
        let mut chain = TestChain::new(params, &[(a, 2_000), (b, 1_000), (d, 500)]);
        chain.create_validator(a, 1, 1_000).unwrap();
        chain.create_validator(b, 2, 1_000).unwrap();
        chain.delegate(d, a, 500).unwrap();
        chain.commit_block(10);

        // l'opérateur peut augmenter son auto-délégation
        chain.delegate(a, a, 1_000).unwrap();

        let frozen = chain.redelegate(a, a, b, 10).unwrap_err();
        assert_eq!(frozen.code, code(StakingError::FrozenPeriod { validator: a, until: 0 }));
        assert!(chain.undelegate(a, a, 10).is_err());

        // un tiers n'est jamais gelé
        chain.undelegate(d, a, 100).unwrap();
        chain.redelegate(d, a, b, 100).unwrap();
        chain.assert_invariants();
    }

    // ===== TEST 2: CHAINED REDELEGATION =====

    #[test]
    fn test_chained_redelegation_rejected_until_mature() {
        let (mut chain, a, b, d) = bonded_pair();
        let c = addr(3);
        chain.bank.mint_to_account(&mut chain.store, &c, &coin(1_000_000)).unwrap();
        chain.create_validator(c, 3, 1_000_000).unwrap();

        chain.redelegate(d, a, b, 100).unwrap();

        // B a reçu une redélégation immature: elle ne peut repartir
        let err = chain.redelegate(d, b, c, 50).unwrap_err();
        assert_eq!(err.code, code(StakingError::TransitiveRedelegation));

        // même couple source/destination: nouvelle entrée
        chain.commit_block(10);
        chain.redelegate(d, a, b, 100).unwrap();
        assert_eq!(chain.redelegation(d, a, b).unwrap().entries.len(), 2);

        chain.commit_block(200);
        chain.redelegate(d, b, c, 50).unwrap();
        assert_eq!(chain.delegation(d, c).unwrap().shares, Dec::from_int(50));
        chain.assert_invariants();
    }

    // ===== TEST 3: UNBONDING ENTRIES =====

    #[test]
    fn test_unbonding_entries_merge_and_cap() {
        let params = Params {
            max_entries: 3,
            ..short_params()
        };
        let (a, d) = (addr(1), addr(9));
        let mut chain = TestChain::new(params, &[(a, 1_000_000), (d, 1_000)]);
        chain.create_validator(a, 1, 1_000_000).unwrap();
        chain.delegate(d, a, 1_000).unwrap();
        chain.commit_block(5);

        chain.undelegate(d, a, 10).unwrap();
        chain.undelegate(d, a, 15).unwrap();
        let ubd = chain.unbonding(d, a).unwrap();
        assert_eq!(ubd.entries.len(), 1);
        assert_eq!(ubd.entries[0].balance, 25);
        assert_eq!(ubd.entries[0].initial_balance, 25);

        chain.commit_block(1);
        chain.undelegate(d, a, 10).unwrap();
        chain.commit_block(1);
        chain.undelegate(d, a, 10).unwrap();
        assert_eq!(chain.unbonding(d, a).unwrap().entries.len(), 3);

        chain.commit_block(1);
        let err = chain.undelegate(d, a, 10).unwrap_err();
        assert_eq!(err.code, code(StakingError::MaxUnbondingEntries));
    }

    // ===== TEST 4: FULL WITHDRAWAL BOUNDARY =====

    #[test]
    fn test_exact_full_withdrawal_removes_delegation() {
        let (mut chain, a, _, d) = bonded_pair();

        let err = chain.undelegate(d, a, 1_001).unwrap_err();
        assert_eq!(err.code, code(StakingError::InsufficientShares {
            requested: Dec::zero(),
            available: Dec::zero(),
        }));
        assert!(chain.delegation(d, a).is_some());

        chain.undelegate(d, a, 1_000).unwrap();
        assert!(chain.delegation(d, a).is_none());
        assert_eq!(chain.validator(a).tokens, 10_000_000);
        chain.assert_invariants();
    }

    // ===== TEST 5: SLASHING IS GATED BY CREATION HEIGHT =====

    #[test]
    fn test_slash_only_touches_entries_created_before_infraction() {
        let (mut chain, a, _, d) = bonded_pair();
        let infraction = chain.height;
        chain.undelegate(d, a, 100).unwrap();
        chain.commit_block(5);
        chain.undelegate(d, a, 100).unwrap();
        chain.commit_block(5);

        let burned = chain.slash(a, infraction, 10, Dec::new_with_prec(1, 1));
        assert_eq!(burned, 1_000_000);

        let ubd = chain.unbonding(d, a).unwrap();
        assert_eq!(ubd.entries.len(), 2);
        assert_eq!(ubd.entries[0].balance, 90);
        assert_eq!(ubd.entries[0].initial_balance, 100);
        assert_eq!(ubd.entries[1].balance, 100);

        // 10 tokens pris aux unbondings, le reste au validateur
        assert_eq!(chain.validator(a).tokens, 10_000_800 - 999_990);
        chain.assert_invariants();
    }

    #[test]
    fn test_slash_reduces_redelegated_shares_at_destination() {
        let (mut chain, a, b, d) = bonded_pair();
        let infraction = chain.height;
        chain.redelegate(d, a, b, 400).unwrap();
        chain.commit_block(5);

        chain.slash(a, infraction, 10, Dec::new_with_prec(5, 1));

        // 50% des 400 tokens redélégués sont retirés de B
        assert_eq!(chain.delegation(d, b).unwrap().shares, Dec::from_int(200));
        assert_eq!(chain.validator(b).tokens, 5_000_200);
        chain.assert_invariants();
    }

    // ===== TEST 6: JAIL / UNJAIL =====

    #[test]
    fn test_jail_and_unjail_cycle() {
        let (mut chain, a, _, _) = bonded_pair();
        let cons = chain.validator(a).cons_address();

        let err = chain.with_keeper(|k, ctx| k.unjail(ctx, &cons)).unwrap_err();
        assert!(matches!(err, StakingError::NotJailed(op) if op == a));

        chain.with_keeper(|k, ctx| k.jail(ctx, &cons)).unwrap();
        let v = chain.validator(a);
        assert!(v.jailed);
        assert_eq!(v.status, BondStatus::Unbonding);
        assert!(matches!(
            chain.with_keeper(|k, ctx| k.jail(ctx, &cons)),
            Err(StakingError::ValidatorJailed(op)) if op == a
        ));

        let result = chain.commit_block(5);
        assert_eq!(result.validator_updates, vec![ValidatorUpdate { pub_key: pubkey(1), power: 0 }]);
        chain.assert_invariants();

        chain.with_keeper(|k, ctx| k.unjail(ctx, &cons)).unwrap();
        let result = chain.commit_block(5);
        assert_eq!(result.validator_updates, vec![ValidatorUpdate { pub_key: pubkey(1), power: 10 }]);
        assert_eq!(chain.validator(a).status, BondStatus::Bonded);
        chain.assert_invariants();
    }

    #[test]
    fn test_jailed_validator_unbonds_after_unbonding_time() {
        let (mut chain, a, _, _) = bonded_pair();
        let cons = chain.validator(a).cons_address();
        chain.with_keeper(|k, ctx| k.jail(ctx, &cons)).unwrap();
        chain.commit_block(99);
        chain.end_block();
        assert_eq!(chain.validator(a).status, BondStatus::Unbonding);

        chain.commit_block(1);
        chain.end_block();
        assert_eq!(chain.validator(a).status, BondStatus::Unbonded);
        chain.assert_invariants();
    }

    // ===== TEST 7: DUPLICATES AND BAD CREATION =====

    #[test]
    fn test_duplicate_operator_and_pubkey() {
        let (mut chain, a, _, _) = bonded_pair();
        let e = addr(5);
        chain.bank.mint_to_account(&mut chain.store, &e, &coin(1_000)).unwrap();

        let err = chain.create_validator(a, 7, 1).unwrap_err();
        assert_eq!(err.code, code(StakingError::ValidatorOwnerExists(a)));

        let err = chain.create_validator(e, 1, 1_000).unwrap_err();
        assert_eq!(err.code, code(StakingError::ValidatorPubKeyExists));
        assert_eq!(chain.balance(e), 1_000);
    }

    #[test]
    fn test_zero_self_delegation_rejected() {
        let a = addr(1);
        let mut chain = TestChain::new(short_params(), &[(a, 1_000)]);
        let err = chain
            .deliver(
                a,
                MsgCreateValidator {
                    description: Description::new("zero", "", "", ""),
                    commission: CommissionRates::default(),
                    min_self_delegation: 1,
                    delegator_address: a,
                    validator_address: a,
                    pubkey: pubkey(1),
                    value: coin(0),
                },
            )
            .unwrap_err();
        assert_eq!(err.code, code(StakingError::BadDelegationAmount));
        assert!(chain.try_validator(a).is_none());
    }

    // ===== TEST 8: SWEEP IDEMPOTENCE =====

    #[test]
    fn test_end_block_twice_at_same_time_is_noop() {
        let (mut chain, a, b, d) = bonded_pair();
        chain.undelegate(d, a, 100).unwrap();
        chain.redelegate(d, a, b, 100).unwrap();
        chain.commit_block(100);

        let first = chain.end_block();
        assert!(!first.events.is_empty());
        let state = chain.export();
        let balance = chain.balance(d);

        let second = chain.end_block();
        assert!(second.events.is_empty());
        assert!(second.validator_updates.is_empty());
        assert_eq!(chain.export(), state);
        assert_eq!(chain.balance(d), balance);
    }

    // ===== TEST 9: GENESIS ROUND TRIP AFTER ACTIVITY =====

    #[test]
    fn test_genesis_roundtrip_is_byte_identical() {
        let (mut chain, a, b, d) = bonded_pair();
        chain.undelegate(d, a, 100).unwrap();
        chain.redelegate(d, a, b, 200).unwrap();
        let cons = chain.validator(b).cons_address();
        chain.with_keeper(|k, ctx| k.jail(ctx, &cons)).unwrap();
        chain.commit_block(5);

        let doc = exported_doc(&mut chain);
        let json = doc.to_json().unwrap();

        let reloaded: GenesisDoc = serde_json::from_str(&json).unwrap();
        let keeper = Keeper::new(Arc::new(ModuleCodec::new()), Arc::new(chain.bank.clone()));
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(CHAIN, 0, reloaded.genesis_time));
        let updates = reloaded.apply(&mut ctx, &chain.bank, &keeper).unwrap();
        assert_eq!(updates, vec![ValidatorUpdate { pub_key: pubkey(1), power: 10 }]);

        let again = GenesisDoc::export(&ctx, reloaded.genesis_time, &chain.bank, &keeper).unwrap();
        assert_eq!(again.to_json().unwrap(), json);
        assert!(keeper.check_invariants(&ctx).unwrap().is_empty());
    }

    // ===== TEST 10: SAME TIMESTAMP, DIFFERENT HEIGHTS =====

    #[test]
    fn test_entries_split_by_creation_height_at_equal_time() {
        let (mut chain, a, b, d) = bonded_pair();

        chain.undelegate(d, a, 10).unwrap();
        chain.undelegate(d, a, 20).unwrap();
        chain.redelegate(d, a, b, 10).unwrap();
        chain.redelegate(d, a, b, 20).unwrap();
        let first = chain.height;

        // bloc suivant au même horodatage: même completion_time
        chain.commit_block(0);
        chain.undelegate(d, a, 5).unwrap();
        chain.redelegate(d, a, b, 5).unwrap();

        let ubd = chain.unbonding(d, a).unwrap();
        assert_eq!(ubd.entries.len(), 2);
        assert_eq!(ubd.entries[0].completion_time, ubd.entries[1].completion_time);
        assert_eq!((ubd.entries[0].creation_height, ubd.entries[0].balance), (first, 30));
        assert_eq!((ubd.entries[1].creation_height, ubd.entries[1].balance), (first + 1, 5));

        let red = chain.redelegation(d, a, b).unwrap();
        assert_eq!(red.entries.len(), 2);
        assert_eq!(red.entries[0].completion_time, red.entries[1].completion_time);
        assert_eq!((red.entries[0].creation_height, red.entries[0].initial_balance), (first, 30));
        assert_eq!((red.entries[1].creation_height, red.entries[1].initial_balance), (first + 1, 5));

        // un slash à la première hauteur ne touche que la première entrée
        chain.slash(a, first, 10, Dec::new_with_prec(1, 1));
        let ubd = chain.unbonding(d, a).unwrap();
        assert_eq!(ubd.entries[0].balance, 27);
        assert_eq!(ubd.entries[1].balance, 5);
        chain.assert_invariants();
    }

    // ===== TEST 11: LARGE AMOUNTS =====

    #[test]
    fn test_large_amounts_do_not_overflow_share_math() {
        let (a, b, d) = (addr(1), addr(2), addr(9));
        let big_validator = 100_000_000_000;
        let big_delegation = 10_000_000_000;
        let mut chain = TestChain::new(
            short_params(),
            &[(a, big_validator), (b, 1_000_000), (d, big_delegation)],
        );
        chain.create_validator(a, 1, big_validator).unwrap();
        chain.create_validator(b, 2, 1_000_000).unwrap();
        chain.commit_block(5);
        assert_eq!(chain.validator(a).consensus_power(), 100_000);

        chain.delegate(d, a, big_delegation).unwrap();
        assert_eq!(chain.delegation(d, a).unwrap().shares, Dec::from_int(big_delegation));

        let insufficient = code(StakingError::InsufficientShares {
            requested: Dec::zero(),
            available: Dec::zero(),
        });
        for amount in [1_000_000_000_000_000, u128::MAX] {
            let err = chain.undelegate(d, a, amount).unwrap_err();
            assert_eq!(err.code, insufficient);
            let err = chain.redelegate(d, a, b, amount).unwrap_err();
            assert_eq!(err.code, insufficient);
        }
        assert_eq!(chain.delegation(d, a).unwrap().shares, Dec::from_int(big_delegation));
        assert!(chain.unbonding(d, a).is_none());

        chain.undelegate(d, a, big_delegation).unwrap();
        assert!(chain.delegation(d, a).is_none());
        assert_eq!(chain.unbonding(d, a).unwrap().entries[0].balance, big_delegation);
        chain.assert_invariants();
    }
}
