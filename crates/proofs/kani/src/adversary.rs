//! Adversarial step generator

#[cfg(kani)]
use kani::any;
#[cfg(kani)]
use custody_model::Address;

#[cfg(kani)]
use crate::generators::{World, S1, S2, USER, WANT};

#[cfg(kani)]
#[derive(Clone, Copy, Debug)]
pub enum Step {
    Approve,
    Revoke,
    SetStrategy,
    Earn,
    Deposit,
    WithdrawAll,
    Harvest,
    Withdraw,
}

#[cfg(kani)]
impl kani::Arbitrary for Step {
    fn any() -> Self {
        let choice: u8 = any();
        match choice % 8 {
            0 => Step::Approve,
            1 => Step::Revoke,
            2 => Step::SetStrategy,
            3 => Step::Earn,
            4 => Step::Deposit,
            5 => Step::WithdrawAll,
            6 => Step::Harvest,
            _ => Step::Withdraw,
        }
    }
}

#[cfg(kani)]
fn any_strategy() -> Address {
    if any() {
        S1
    } else {
        S2
    }
}

/// Apply one arbitrary operation as `caller`. Refused operations leave the
/// ledger untouched, so their errors are dropped.
#[cfg(kani)]
pub fn adversary_step(mut w: World, caller: Address) -> World {
    let l = &mut w.ledger;
    let _ = match any::<Step>() {
        Step::Approve => w.controller.approve_strategy(l, caller, WANT, any_strategy()).map(|_| 0),
        Step::Revoke => w.controller.revoke_strategy(l, caller, WANT, any_strategy()).map(|_| 0),
        Step::SetStrategy => w.controller.set_strategy(l, caller, WANT, any_strategy()).map(|_| 0),
        Step::Earn => w.vault.earn(l, caller),
        Step::Deposit => {
            let x = u128::from(any::<u8>() % 8);
            w.vault.deposit(l, USER, x)
        }
        Step::WithdrawAll => w.controller.withdraw_all(l, caller, WANT, any_strategy()),
        Step::Harvest => w.s1.harvest(l, caller).map(|_| 0),
        Step::Withdraw => {
            let shares = u128::from(any::<u8>() % 8);
            w.vault.withdraw(l, USER, shares)
        }
    };
    w
}
