//! Explicit property proofs for documentation and clarity
//!
//! Concrete-world versions of properties the symbolic proofs in `safety`
//! already cover, kept small so they double as readable examples.

use custody_model::{math::mul_div, Activation, LogicVersion, Ppfs};

use crate::generators::*;

fn scenario() -> Scenario {
    Scenario {
        deposit: 80,
        profit: 20,
        deployed_bps: 4_000,
        rewards: 0,
        locked: false,
        s1_logic: LogicVersion::StakingV1,
    }
}

// === Property 1: Double approval ===

/// Approving an approved pair changes nothing
#[kani::proof]
fn double_approval_is_noop() {
    let Some(mut w) = build_world(scenario()) else { return };
    let before = w.ledger.clone();
    let result = w.controller.approve_strategy(&mut w.ledger, GOV, WANT, S2);
    assert!(result.is_ok());
    assert!(w.ledger == before, "second approval must not mutate");
}

// === Property 2: Retirement lifecycle ===

/// A replaced strategy is retired, and drops back to approved once drained
#[kani::proof]
fn retired_strategy_drains_to_approved() {
    let Some(mut w) = build_world(scenario()) else { return };
    assert!(w.controller.set_strategy(&mut w.ledger, GOV, WANT, S2).is_ok());
    assert!(w.controller.activation(&w.ledger, WANT, S1) == Ok(Some(Activation::Retired)));
    assert!(w.vault.balance(&w.ledger) == Ok(100));

    assert!(w.controller.withdraw_all(&mut w.ledger, GOV, WANT, S1) == Ok(40));
    assert!(w.controller.activation(&w.ledger, WANT, S1) == Ok(Some(Activation::Approved)));
    assert!(w.vault.idle(&w.ledger) == Ok(100));
}

// === Property 3: Price arithmetic ===

/// Zero supply prices at exactly one
#[kani::proof]
fn ppfs_one_at_zero_supply() {
    let balance: u128 = kani::any();
    assert!(Ppfs::from_ratio(balance, 0) == Ppfs::ONE);
}

/// mul_div never exceeds its first operand when scaling down
#[kani::proof]
fn mul_div_scales_down() {
    let a: u64 = kani::any();
    let b: u64 = kani::any();
    let c: u64 = kani::any();
    kani::assume(c > 0 && b <= c);
    assert!(mul_div(u128::from(a), u128::from(b), u128::from(c)) <= u128::from(a));
}
