//! Strategy migration end to end: cutover, drain and redeploy against the
//! reference deployment, plus value preservation across magnitudes.

use custody_integration_tests::{config_with, deployment, reference_deployment};
use custody_model::{vault_snapshot, Activation, CustodyError};
use custody_operator::{MigrationError, MigrationOrchestrator, MigrationPlan, MigrationStep};
use proptest::prelude::*;

const CUTOVER_ONLY: MigrationPlan = MigrationPlan {
    drain_retired: false,
    redeploy: false,
};

#[test]
fn test_reference_migration_cutover() {
    let mut d = reference_deployment();
    let want = d.vault.token(&d.ledger).unwrap();
    assert_eq!(d.vault.balance(&d.ledger).unwrap(), 100);
    assert_eq!(d.old_strategy.balance_of(&d.ledger).unwrap(), 40);
    assert_eq!(d.vault.idle(&d.ledger).unwrap(), 60);
    assert_eq!(d.vault.get_price_per_full_share(&d.ledger).unwrap().to_string(), "1.25");

    let orchestrator = MigrationOrchestrator::new(d.vault, d.governance);
    let report = orchestrator
        .run(&mut d.ledger, d.old_strategy, d.new_strategy, &CUTOVER_ONLY)
        .unwrap();

    assert_eq!(report.steps.len(), 5);
    assert_eq!(d.vault.balance(&d.ledger).unwrap(), 100);
    assert_eq!(d.new_strategy.balance_of(&d.ledger).unwrap(), 0);
    assert_eq!(d.vault.get_price_per_full_share(&d.ledger).unwrap().to_string(), "1.25");
    assert_eq!(
        d.controller.strategies(&d.ledger, want).unwrap(),
        Some(d.new_strategy.address())
    );
    assert_eq!(
        d.controller.activation(&d.ledger, want, d.old_strategy.address()).unwrap(),
        Some(Activation::Retired)
    );
    // retired capital is still counted until drained
    assert_eq!(d.old_strategy.balance_of(&d.ledger).unwrap(), 40);
}

#[test]
fn test_reference_migration_drain_and_earn() {
    let mut d = reference_deployment();
    let want = d.vault.token(&d.ledger).unwrap();
    let orchestrator = MigrationOrchestrator::new(d.vault, d.governance);
    let report = orchestrator
        .run(&mut d.ledger, d.old_strategy, d.new_strategy, &MigrationPlan::default())
        .unwrap();

    assert_eq!(report.drained, 40);
    assert_eq!(report.earned, 100);
    assert_eq!(
        report.steps.last().map(|r| r.step),
        Some(MigrationStep::Earn)
    );

    let idle = d.vault.idle(&d.ledger).unwrap();
    let placed = d.new_strategy.balance_of(&d.ledger).unwrap();
    assert_eq!(idle + placed, 100);
    assert_eq!(d.old_strategy.balance_of(&d.ledger).unwrap(), 0);
    assert_eq!(
        d.controller.activation(&d.ledger, want, d.old_strategy.address()).unwrap(),
        Some(Activation::Approved)
    );
    assert_eq!(d.vault.get_price_per_full_share(&d.ledger).unwrap().to_string(), "1.25");
}

#[test]
fn test_depositor_redeems_full_value_after_migration() {
    let config = custody_operator::OperatorConfig::default_mainnet();
    let depositor = config.deployment.depositor;
    let mut d = deployment(&config);
    let want = d.vault.token(&d.ledger).unwrap();

    MigrationOrchestrator::new(d.vault, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.new_strategy, &MigrationPlan::default())
        .unwrap();

    let shares = d.vault.shares_of(&d.ledger, depositor).unwrap();
    assert_eq!(shares, 80);
    let paid = d.vault.withdraw(&mut d.ledger, depositor, shares).unwrap();
    assert_eq!(paid, 100);
    assert_eq!(d.ledger.tokens.balance_of(want, depositor), 100);
    assert_eq!(d.vault.total_supply(&d.ledger).unwrap(), 0);
}

#[test]
fn test_failed_step_reports_where_it_stopped() {
    let mut d = reference_deployment();
    d.lock_pool().unwrap();

    let err = MigrationOrchestrator::new(d.vault, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.new_strategy, &MigrationPlan::default())
        .unwrap_err();
    assert_eq!(err.step(), MigrationStep::DrainRetired);
    match err {
        MigrationError::Step { source, .. } => assert!(source.is_withdraw_block()),
        other => panic!("unexpected error: {other}"),
    }
    // the cutover itself stood
    assert_eq!(d.vault.balance(&d.ledger).unwrap(), 100);
    assert_eq!(d.old_strategy.balance_of(&d.ledger).unwrap(), 40);
}

#[test]
fn test_non_governance_cannot_migrate() {
    let mut d = reference_deployment();
    let before = d.ledger.clone();
    let err = MigrationOrchestrator::new(d.vault, custody_integration_tests::OUTSIDER)
        .run(&mut d.ledger, d.old_strategy, d.new_strategy, &MigrationPlan::default())
        .unwrap_err();

    assert_eq!(err.step(), MigrationStep::SetController);
    assert!(matches!(
        err,
        MigrationError::Step {
            source: CustodyError::PermissionDenied { .. },
            ..
        }
    ));
    assert!(d.ledger == before);
}

#[test]
fn test_report_serializes() {
    let mut d = reference_deployment();
    let report = MigrationOrchestrator::new(d.vault, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.new_strategy, &MigrationPlan::default())
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["drained"], 40);
    assert_eq!(json["steps"].as_array().map(Vec::len), Some(7));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_migration_preserves_balance_and_price(
        deposit in 1u64..=u64::MAX / 2,
        profit in 0u64..=u64::MAX / 2,
        deployed_bps in 0u32..=10_000,
        drain in any::<bool>(),
    ) {
        let mut d = deployment(&config_with(deposit, profit, deployed_bps));
        let before = vault_snapshot(&d.ledger, d.vault).unwrap();
        let plan = MigrationPlan { drain_retired: drain, redeploy: true };

        let report = MigrationOrchestrator::new(d.vault, d.governance)
            .run(&mut d.ledger, d.old_strategy, d.new_strategy, &plan)
            .unwrap();
        let after = vault_snapshot(&d.ledger, d.vault).unwrap();

        prop_assert_eq!(report.pre_balance, before.balance);
        prop_assert_eq!(after.balance, before.balance);
        prop_assert_eq!(after.ppfs, before.ppfs);
        prop_assert_eq!(after.total_supply, before.total_supply);
    }
}
