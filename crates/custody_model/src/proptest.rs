//! Property-based tests for the custody model.
//!
//! Uses proptest to check permission exactness and value preservation for
//! arbitrary magnitudes.

use proptest::prelude::*;

use crate::controller::ControllerState;
use crate::error::CustodyError;
use crate::guard::PermissionGuard;
use crate::helpers::{balance_accounted, conservation_ok, vault_snapshot};
use crate::ledger::Ledger;
use crate::logic::LogicVersion;
use crate::math::{mul_div, Ppfs, MAX_BPS};
use crate::strategy::StrategyStorage;
use crate::types::{Address, Role};
use crate::vault::{Vault, VaultState};
use crate::yield_source::StakingPool;

const GOV: Address = Address::from_low_u64(1);
const USER: Address = Address::from_low_u64(2);
const CONTROLLER: Address = Address::from_low_u64(4);
const VAULT: Address = Address::from_low_u64(5);
const WANT: Address = Address::from_low_u64(0x10);
const REWARD: Address = Address::from_low_u64(0x11);
const POOL: Address = Address::from_low_u64(0x20);
const ADMIN: Address = Address::from_low_u64(0x30);
const V1: Address = Address::from_low_u64(0x31);
const STRAT: Address = Address::from_low_u64(0x40);

// ============================================================================
// Arbitrary Implementations
// ============================================================================

fn arb_address() -> impl Strategy<Value = Address> {
    prop::array::uniform20(any::<u8>()).prop_map(Address)
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Governance),
        Just(Role::Strategist),
        Just(Role::Keeper),
        Just(Role::Guardian),
        Just(Role::Controller),
    ]
}

/// Token amounts small enough that `amount * 1e18` never overflows
fn arb_amount() -> impl Strategy<Value = u128> {
    1u128..=1_000_000_000_000_000_000
}

/// Vault holding `deposit` from one user plus `profit`, with the active
/// strategy bound to a single-reward pool
fn funded(deposit: u128, profit: u128) -> (Ledger, Vault) {
    let mut l = Ledger::new();
    l.add_pool(StakingPool::new(POOL, WANT, &[REWARD]));
    l.register_logic(V1, LogicVersion::StakingV1);
    l.deploy_proxy_admin(ADMIN, GOV);
    let mut c = ControllerState::new(GOV, GOV, GOV);
    c.vaults.insert(WANT, VAULT);
    l.deploy_controller(CONTROLLER, c);
    let vault = l.deploy_vault(VAULT, VaultState::new(WANT, GOV, CONTROLLER));
    let storage = StrategyStorage {
        governance: GOV,
        keeper: GOV,
        controller: CONTROLLER,
        want: WANT,
        reward: REWARD,
        staking_contract: POOL,
        ..StrategyStorage::default()
    };
    l.deploy_strategy(STRAT, ADMIN, V1, storage).unwrap();
    let controller = crate::controller::Controller(CONTROLLER);
    controller.approve_strategy(&mut l, GOV, WANT, STRAT).unwrap();
    controller.set_strategy(&mut l, GOV, WANT, STRAT).unwrap();

    l.tokens.mint(WANT, USER, deposit);
    vault.deposit(&mut l, USER, deposit).unwrap();
    l.tokens.mint(WANT, VAULT, profit);
    (l, vault)
}

// ============================================================================
// Property Tests: PermissionGuard
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Exactly the bound holder passes; everyone else is denied
    #[test]
    fn prop_require_exact_matches_only_holder(holder in arb_address(), caller in arb_address(), role in arb_role()) {
        let result = PermissionGuard::require_exact(caller, holder, role);
        prop_assert_eq!(result.is_ok(), !holder.is_zero() && caller == holder);
    }

    /// Holding one role never grants another
    #[test]
    fn prop_no_role_hierarchy(caller in arb_address()) {
        prop_assume!(!caller.is_zero());
        let storage = StrategyStorage { strategist: caller, keeper: caller, ..StrategyStorage::default() };
        prop_assert!(PermissionGuard::require(&storage, caller, Role::Governance).is_err());
        prop_assert!(PermissionGuard::require(&storage, caller, Role::Keeper).is_ok());
    }
}

// ============================================================================
// Property Tests: Arithmetic
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// mul_div agrees with exact arithmetic whenever the product fits
    #[test]
    fn prop_mul_div_exact(a in any::<u64>(), b in any::<u64>(), c in 1u64..) {
        let (a, b, c) = (u128::from(a), u128::from(b), u128::from(c));
        prop_assert_eq!(mul_div(a, b, c), a * b / c);
    }

    /// Price is one exactly when balance equals supply
    #[test]
    fn prop_ppfs_parity(supply in arb_amount()) {
        prop_assert_eq!(Ppfs::from_ratio(supply, supply), Ppfs::ONE);
    }
}

// ============================================================================
// Property Tests: Vault accounting
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A later depositor never dilutes earlier holders
    #[test]
    fn prop_deposit_never_lowers_price(first in arb_amount(), profit in arb_amount(), second in arb_amount()) {
        let (mut l, vault) = funded(first, profit);
        let before = vault.get_price_per_full_share(&l).unwrap();
        l.tokens.mint(WANT, USER, second);
        vault.deposit(&mut l, USER, second).unwrap();
        prop_assert!(vault.get_price_per_full_share(&l).unwrap() >= before);
    }

    /// earn moves capital without changing balance or price
    #[test]
    fn prop_earn_preserves_value(deposit in arb_amount(), profit in 0u128..1_000_000, min in 0u32..=MAX_BPS) {
        let (mut l, vault) = funded(deposit, profit);
        vault.set_min(&mut l, GOV, min).unwrap();
        let ledger_before = l.clone();
        let before = vault_snapshot(&l, vault).unwrap();

        vault.earn(&mut l, USER).unwrap();

        let after = vault_snapshot(&l, vault).unwrap();
        prop_assert_eq!(before.balance, after.balance);
        prop_assert_eq!(before.ppfs, after.ppfs);
        prop_assert!(balance_accounted(&after));
        prop_assert!(conservation_ok(&ledger_before, &l, WANT));
    }

    /// withdrawAll is refused exactly when rewards are claimable, and on
    /// success credits the vault with the strategy's whole balance
    #[test]
    fn prop_withdraw_all_gate(deposit in arb_amount(), reward in 0u128..1_000) {
        let (mut l, vault) = funded(deposit, 0);
        vault.earn(&mut l, USER).unwrap();
        l.pool_mut(POOL).unwrap().accrue(STRAT, 0, reward);
        let strategy = crate::strategy::Strategy(STRAT);
        let held = strategy.balance_of(&l).unwrap();
        let idle = vault.idle(&l).unwrap();
        let before = l.clone();

        let result = crate::controller::Controller(CONTROLLER).withdraw_all(&mut l, GOV, WANT, STRAT);
        if reward > 0 {
            let blocked = matches!(result, Err(CustodyError::WithdrawAllBlocked { .. }));
            prop_assert!(blocked);
            prop_assert_eq!(&l, &before);
        } else {
            prop_assert_eq!(result.unwrap(), held);
            prop_assert_eq!(strategy.balance_of(&l).unwrap(), 0);
            prop_assert_eq!(vault.idle(&l).unwrap(), idle + held);
        }
    }
}
