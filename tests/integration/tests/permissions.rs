//! Role gating across strategy, controller, vault and proxy admin.

use custody_integration_tests::{reference_deployment, OUTSIDER};
use custody_model::{Activation, Address, CustodyError, Role};
use custody_operator::OperatorConfig;
use proptest::prelude::*;

fn denied<T>(result: Result<T, CustodyError>) -> bool {
    matches!(result, Err(CustodyError::PermissionDenied { .. }))
}

#[test]
fn test_strategist_is_not_governance() {
    let config = OperatorConfig::default_mainnet();
    let mut d = reference_deployment();
    let want = config.want;
    let before = d.ledger.clone();

    for caller in [config.strategist, config.keeper, config.guardian] {
        assert_ne!(caller, d.governance);
        assert!(denied(d.controller.approve_strategy(&mut d.ledger, caller, want, d.new_strategy.address())));
        assert!(denied(d.controller.set_vault(&mut d.ledger, caller, want, caller)));
        assert!(denied(d.new_strategy.set_controller(&mut d.ledger, caller, d.controller.address())));
        assert!(denied(d.old_strategy.set_withdrawal_fee(&mut d.ledger, caller, 0)));
        assert!(denied(d.vault.set_min(&mut d.ledger, caller, 0)));
    }
    assert!(d.ledger == before);
}

#[test]
fn test_keeper_may_harvest_but_strategist_may_not() {
    let config = OperatorConfig::default_mainnet();
    let mut d = reference_deployment();

    assert!(denied(d.old_strategy.harvest(&mut d.ledger, config.strategist)));
    assert!(d.old_strategy.harvest(&mut d.ledger, config.keeper).is_ok());
}

#[test]
fn test_activation_requires_approval() {
    let mut d = reference_deployment();
    let want = d.vault.token(&d.ledger).unwrap();
    let target = d.new_strategy.address();
    d.new_strategy
        .set_controller(&mut d.ledger, d.governance, d.controller.address())
        .unwrap();

    let before = d.ledger.clone();
    assert_eq!(
        d.controller.set_strategy(&mut d.ledger, d.governance, want, target),
        Err(CustodyError::NotApproved { asset: want, strategy: target })
    );
    assert!(d.ledger == before);

    d.controller.approve_strategy(&mut d.ledger, d.governance, want, target).unwrap();
    d.controller.set_strategy(&mut d.ledger, d.governance, want, target).unwrap();
    assert_eq!(d.controller.strategies(&d.ledger, want).unwrap(), Some(target));
    assert_eq!(
        d.controller.activation(&d.ledger, want, target).unwrap(),
        Some(Activation::Active)
    );
}

#[test]
fn test_double_approval_is_idempotent() {
    let mut d = reference_deployment();
    let want = d.vault.token(&d.ledger).unwrap();
    let target = d.new_strategy.address();

    d.controller.approve_strategy(&mut d.ledger, d.governance, want, target).unwrap();
    let once = d.ledger.clone();
    d.controller.approve_strategy(&mut d.ledger, d.governance, want, target).unwrap();
    assert!(d.ledger == once);
    assert!(d.controller.approved_strategies(&d.ledger, want, target).unwrap());
}

#[test]
fn test_active_strategy_cannot_be_revoked() {
    let mut d = reference_deployment();
    let want = d.vault.token(&d.ledger).unwrap();
    let active = d.old_strategy.address();
    assert!(matches!(
        d.controller.revoke_strategy(&mut d.ledger, d.governance, want, active),
        Err(CustodyError::StrategyActive { .. })
    ));
}

#[test]
fn test_outsider_holds_no_role() {
    let d = reference_deployment();
    let storage = d.old_strategy.storage(&d.ledger).unwrap();
    for role in [Role::Governance, Role::Strategist, Role::Keeper, Role::Guardian, Role::Controller, Role::Vault] {
        assert!(!custody_model::PermissionGuard::holds(storage, OUTSIDER, role), "{role}");
    }
}

#[test]
fn test_only_vault_pulls_from_controller() {
    let mut d = reference_deployment();
    let want = d.vault.token(&d.ledger).unwrap();
    let err = d.controller.withdraw(&mut d.ledger, d.governance, want, 10);
    assert!(matches!(
        err,
        Err(CustodyError::PermissionDenied { ref required, .. }) if required == &[Role::Vault]
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_only_governance_passes_governance_checks(raw in any::<u64>()) {
        let mut d = reference_deployment();
        let caller = Address::from_low_u64(raw);
        prop_assume!(caller != d.governance);
        let want = d.vault.token(&d.ledger).unwrap();
        let before = d.ledger.clone();

        prop_assert!(denied(d.controller.approve_strategy(&mut d.ledger, caller, want, d.new_strategy.address())));
        prop_assert!(denied(d.controller.set_strategy(&mut d.ledger, caller, want, d.old_strategy.address())));
        prop_assert!(denied(d.controller.set_rewards(&mut d.ledger, caller, caller)));
        prop_assert!(denied(d.old_strategy.set_controller(&mut d.ledger, caller, caller)));
        prop_assert!(denied(d.old_strategy.set_performance_fee_governance(&mut d.ledger, caller, 0)));
        prop_assert!(denied(d.vault.set_controller(&mut d.ledger, caller, caller)));
        prop_assert!(denied(d.proxy_admin.upgrade(&mut d.ledger, caller, d.old_strategy.address(), d.logic_v2)));
        prop_assert!(d.ledger == before);
    }

    #[test]
    fn prop_set_strategy_follows_approval(raw in 1u64..) {
        let mut d = reference_deployment();
        let want = d.vault.token(&d.ledger).unwrap();
        let target = Address::from_low_u64(raw);
        let storage = d.old_strategy.storage(&d.ledger).unwrap().clone();
        prop_assume!(d.old_strategy.address() != target && d.new_strategy.address() != target);
        d.ledger
            .deploy_strategy(target, d.proxy_admin.address(), d.logic_v2, storage)
            .unwrap();
        let before = d.ledger.clone();

        prop_assert_eq!(
            d.controller.set_strategy(&mut d.ledger, d.governance, want, target),
            Err(CustodyError::NotApproved { asset: want, strategy: target })
        );
        prop_assert!(d.ledger == before);

        d.controller.approve_strategy(&mut d.ledger, d.governance, want, target).unwrap();
        prop_assert!(d.controller.set_strategy(&mut d.ledger, d.governance, want, target).is_ok());
        prop_assert_eq!(d.controller.strategies(&d.ledger, want).unwrap(), Some(target));
        prop_assert_eq!(d.vault.balance(&d.ledger).unwrap(), 100);
    }
}
