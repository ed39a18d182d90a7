//! Kani safety proofs for the custody invariants

use kani::{any, assume};
use custody_model::{
    conservation_ok, storage_preserved, vault_snapshot, Activation, CustodyError,
    PermissionGuard, Role,
};
use crate::{adversary::*, generators::*, sanitizer::*};

/// Exactly the holder of a role passes its check; no hierarchy, no zero holder
#[kani::proof]
fn guard_exactness() {
    let storage = any_storage();
    let caller = any_actor();
    let role = any_role();

    let holder = match role {
        Role::Governance => storage.governance,
        Role::Strategist => storage.strategist,
        Role::Keeper => storage.keeper,
        Role::Guardian => storage.guardian,
        _ => storage.controller,
    };
    let ok = PermissionGuard::require(&storage, caller, role).is_ok();
    kani::assert(ok == (!holder.is_zero() && caller == holder), "guard passes only the exact holder");
}

/// require_any is the disjunction of exact checks
#[kani::proof]
fn guard_any_is_disjunction() {
    let storage = any_storage();
    let caller = any_actor();
    let a = any_role();
    let b = any_role();

    let either = PermissionGuard::require_any(&storage, caller, &[a, b]).is_ok();
    let each = PermissionGuard::holds(&storage, caller, a) || PermissionGuard::holds(&storage, caller, b);
    kani::assert(either == each, "require_any must equal the disjunction");
}

/// setStrategy on an unapproved pair fails and changes nothing
#[kani::proof]
fn set_strategy_requires_approval() {
    let mut w = any_world();
    let _ = w.controller.revoke_strategy(&mut w.ledger, GOV, WANT, S2);
    let before = w.ledger.clone();

    let result = w.controller.set_strategy(&mut w.ledger, GOV, WANT, S2);
    kani::assert(
        result == Err(CustodyError::NotApproved { asset: WANT, strategy: S2 }),
        "unapproved pair must be refused",
    );
    kani::assert(w.ledger == before, "refused setStrategy must not mutate");
}

/// The active strategy is always tracked as Active, whatever callers do
#[kani::proof]
#[kani::unwind(6)]
fn active_binding_stays_consistent() {
    let mut w = any_world();
    let mut steps: u8 = any();
    steps = (steps % MAX_STEPS) + 1;

    for _ in 0..steps {
        w = adversary_step(w, any_actor());
        let active = w.controller.strategies(&w.ledger, WANT).ok().flatten();
        if let Some(s) = active {
            let status = w.controller.activation(&w.ledger, WANT, s).ok().flatten();
            kani::assert(status == Some(Activation::Active), "active binding must be Active");
        }
    }
}

/// No operation sequence creates or destroys want
#[kani::proof]
#[kani::unwind(6)]
fn want_is_conserved() {
    let mut w = any_world();
    let start = w.ledger.clone();
    let mut steps: u8 = any();
    steps = (steps % MAX_STEPS) + 1;

    for _ in 0..steps {
        w = adversary_step(w, any_actor());
        kani::assert(conservation_ok(&start, &w.ledger, WANT), "want supply must be constant");
    }
}

/// withdrawAll is refused iff rewards are claimable or V1 logic meets a
/// lockup with capital staked; on success the vault gets everything
#[kani::proof]
fn withdraw_all_gate() {
    let sc = any_scenario().sanitize();
    let w = build_world(sc);
    assume(w.is_some());
    let Some(mut w) = w else { return };

    let held = w.s1.balance_of(&w.ledger).unwrap_or(0);
    let staked = w.s1.balance_of_pool(&w.ledger).unwrap_or(0);
    let idle = w.vault.idle(&w.ledger).unwrap_or(0);

    let result = w.controller.withdraw_all(&mut w.ledger, GOV, WANT, S1);
    let expect_block = sc.rewards > 0
        || (sc.locked && staked > 0 && sc.s1_logic == custody_model::LogicVersion::StakingV1);

    kani::assert(result.is_err() == expect_block, "withdrawAll gate");
    if let Ok(amount) = result {
        kani::assert(amount == held, "withdrawAll returns the whole balance");
        kani::assert(w.s1.balance_of(&w.ledger) == Ok(0), "strategy is empty afterwards");
        kani::assert(w.vault.idle(&w.ledger) == Ok(idle + held), "vault credited exactly");
    }
}

/// Swapping logic never touches persisted strategy storage
#[kani::proof]
fn upgrade_preserves_storage() {
    let mut w = any_world();
    let before = w.s1.snapshot(&w.ledger);
    let target = if any() { LOGIC_V1 } else { LOGIC_V2 };

    let upgraded = w.admin.upgrade(&mut w.ledger, GOV, S1, target);
    kani::assert(upgraded.is_ok(), "owner upgrade to registered logic succeeds");

    let after = w.s1.snapshot(&w.ledger);
    match (before, after) {
        (Ok(b), Ok(a)) => kani::assert(storage_preserved(&b, &a), "storage must survive upgrade"),
        _ => kani::assert(false, "snapshots must be readable"),
    }
}

/// Cutover keeps managed balance and price exactly where they were
#[kani::proof]
fn cutover_preserves_value() {
    let mut w = any_world();
    let before = vault_snapshot(&w.ledger, w.vault);

    let result = w.controller.set_strategy(&mut w.ledger, GOV, WANT, S2);
    kani::assert(result.is_ok(), "approved strategy activates");

    let after = vault_snapshot(&w.ledger, w.vault);
    match (before, after) {
        (Ok(b), Ok(a)) => {
            kani::assert(b.balance == a.balance, "balance preserved");
            kani::assert(b.ppfs == a.ppfs, "ppfs preserved");
        }
        _ => kani::assert(false, "snapshots must be readable"),
    }
}
