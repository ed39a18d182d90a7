//! In-place upgrade of a locked strategy: withdrawAll refused under the old
//! logic, storage intact after the swap, capital out under the new logic.

use custody_integration_tests::{config_with, deployment, reference_deployment, OUTSIDER};
use custody_model::{BlockReason, CustodyError, LogicVersion};
use custody_operator::{UpgradeError, UpgradeOrchestrator, UpgradeStep};
use proptest::prelude::*;

#[test]
fn test_locked_v1_upgrade_round_trip() {
    let mut d = reference_deployment();
    d.lock_pool().unwrap();
    let before = d.old_strategy.snapshot(&d.ledger).unwrap();
    let owner = d.proxy_admin.owner(&d.ledger).unwrap();

    let report = UpgradeOrchestrator::new(d.proxy_admin, owner, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.logic_v2)
        .unwrap();

    assert_eq!(report.from_logic, LogicVersion::StakingV1);
    assert_eq!(report.to_logic, LogicVersion::StakingV2);
    assert_eq!(report.blocked_before, Some(BlockReason::Locked));
    assert_eq!(report.withdrawn, 40);
    assert_eq!(report.vault_idle_before, 60);
    assert_eq!(report.vault_idle_after, 100);
    assert_eq!(
        report.steps.iter().map(|r| r.step).collect::<Vec<_>>(),
        vec![
            UpgradeStep::Snapshot,
            UpgradeStep::LockupDryRun,
            UpgradeStep::Upgrade,
            UpgradeStep::VerifyStorage,
            UpgradeStep::WithdrawAll,
        ]
    );

    let after = d.old_strategy.snapshot(&d.ledger).unwrap();
    assert_eq!(d.old_strategy.implementation(&d.ledger).unwrap(), d.logic_v2);
    assert_eq!(after.governance, before.governance);
    assert_eq!(after.controller, before.controller);
    assert_eq!(after.want, before.want);
    assert_eq!(after.staking_contract, before.staking_contract);
    assert_eq!(after.withdrawal_fee, before.withdrawal_fee);
    assert_eq!(after.balance_of, 0);
    assert_eq!(d.vault.balance(&d.ledger).unwrap(), 100);
}

#[test]
fn test_pending_rewards_block_until_harvested() {
    let mut config = custody_operator::OperatorConfig::default_mainnet();
    config.scenario.pending_rewards = 7;
    let mut d = deployment(&config);
    let owner = d.proxy_admin.owner(&d.ledger).unwrap();
    let orchestrator = UpgradeOrchestrator::new(d.proxy_admin, owner, d.governance);
    let want = d.vault.token(&d.ledger).unwrap();

    // the controller refuses directly as well
    let direct = d.ledger.simulate(|l| {
        d.controller.withdraw_all(l, d.governance, want, d.old_strategy.address())
    });
    assert!(matches!(
        direct,
        Err(CustodyError::WithdrawAllBlocked {
            reason: BlockReason::PendingRewards { total: 7 },
            ..
        })
    ));

    let before = d.ledger.clone();
    let err = orchestrator
        .run(&mut d.ledger, d.old_strategy, d.logic_v2)
        .unwrap_err();
    assert!(matches!(err, UpgradeError::PendingRewardsNonZero { ref rewards, .. } if rewards == &[7u128]));
    assert!(d.ledger == before);

    d.old_strategy.harvest(&mut d.ledger, d.governance).unwrap();
    let report = orchestrator.run(&mut d.ledger, d.old_strategy, d.logic_v2).unwrap();
    assert_eq!(report.withdrawn, 40);
}

#[test]
fn test_outsider_cannot_swap_logic() {
    let mut d = reference_deployment();
    d.lock_pool().unwrap();
    let err = UpgradeOrchestrator::new(d.proxy_admin, OUTSIDER, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.logic_v2)
        .unwrap_err();

    assert!(matches!(
        err,
        UpgradeError::Step {
            step: UpgradeStep::Upgrade,
            source: CustodyError::PermissionDenied { .. },
        }
    ));
    assert_eq!(d.old_strategy.implementation(&d.ledger).unwrap(), d.logic_v1);
    assert_eq!(d.old_strategy.balance_of(&d.ledger).unwrap(), 40);
}

#[test]
fn test_upgrade_requires_staked_capital() {
    let mut d = deployment(&config_with(80, 20, 0));
    let owner = d.proxy_admin.owner(&d.ledger).unwrap();
    let err = UpgradeOrchestrator::new(d.proxy_admin, owner, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.logic_v2)
        .unwrap_err();
    assert!(matches!(err, UpgradeError::NothingDeployed { .. }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Under either lock state the upgraded strategy hands everything back
    #[test]
    fn prop_upgrade_settles_full_balance(
        deposit in 1u64..=1_000_000_000_000,
        profit in 0u64..=1_000_000_000_000,
        deployed_bps in 1u32..=10_000,
        locked in any::<bool>(),
    ) {
        let mut d = deployment(&config_with(deposit, profit, deployed_bps));
        prop_assume!(d.old_strategy.balance_of_pool(&d.ledger).unwrap() > 0);
        if locked {
            d.lock_pool().unwrap();
        }
        let held = d.old_strategy.balance_of(&d.ledger).unwrap();
        let idle = d.vault.idle(&d.ledger).unwrap();
        let storage = d.old_strategy.storage(&d.ledger).unwrap().clone();
        let owner = d.proxy_admin.owner(&d.ledger).unwrap();

        let report = UpgradeOrchestrator::new(d.proxy_admin, owner, d.governance)
            .run(&mut d.ledger, d.old_strategy, d.logic_v2)
            .unwrap();

        prop_assert_eq!(report.withdrawn, held);
        prop_assert_eq!(report.blocked_before.is_some(), locked);
        prop_assert_eq!(d.vault.idle(&d.ledger).unwrap(), idle + held);
        prop_assert_eq!(d.old_strategy.storage(&d.ledger).unwrap(), &storage);
    }
}
