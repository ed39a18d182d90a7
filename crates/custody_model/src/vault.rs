//! Vault: share accounting over one asset

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::controller::Controller;
use crate::error::CustodyError;
use crate::guard::{PermissionGuard, RoleHolder};
use crate::ledger::Ledger;
use crate::math::{add_u128, bps_of, mul_div, sub_u128, Ppfs, MAX_BPS};
use crate::types::{Address, Asset, Role};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    pub token: Asset,
    pub governance: Address,
    pub controller: Address,
    /// Share of idle balance `earn` may push out, in bps
    pub min: u32,
    pub total_supply: u128,
    pub shares: BTreeMap<Address, u128>,
}

impl VaultState {
    pub fn new(token: Asset, governance: Address, controller: Address) -> Self {
        Self {
            token,
            governance,
            controller,
            min: MAX_BPS,
            ..Self::default()
        }
    }
}

impl RoleHolder for VaultState {
    fn role_address(&self, role: Role) -> Option<Address> {
        match role {
            Role::Governance => Some(self.governance),
            Role::Controller => Some(self.controller),
            _ => None,
        }
    }
}

/// Handle to a vault in the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vault(pub Address);

impl Vault {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn state<'a>(&self, ledger: &'a Ledger) -> Result<&'a VaultState, CustodyError> {
        ledger.vault_state(self.0)
    }

    pub fn token(&self, ledger: &Ledger) -> Result<Asset, CustodyError> {
        Ok(self.state(ledger)?.token)
    }

    pub fn controller(&self, ledger: &Ledger) -> Result<Controller, CustodyError> {
        Ok(Controller(self.state(ledger)?.controller))
    }

    pub fn total_supply(&self, ledger: &Ledger) -> Result<u128, CustodyError> {
        Ok(self.state(ledger)?.total_supply)
    }

    pub fn shares_of(&self, ledger: &Ledger, holder: Address) -> Result<u128, CustodyError> {
        Ok(self.state(ledger)?.shares.get(&holder).copied().unwrap_or(0))
    }

    /// Want sitting in the vault itself
    pub fn idle(&self, ledger: &Ledger) -> Result<u128, CustodyError> {
        let token = self.token(ledger)?;
        Ok(ledger.tokens.balance_of(token, self.0))
    }

    /// Idle want plus everything the controller can reach for the asset
    pub fn balance(&self, ledger: &Ledger) -> Result<u128, CustodyError> {
        let state = self.state(ledger)?;
        let deployed = Controller(state.controller).balance_of(ledger, state.token)?;
        Ok(add_u128(self.idle(ledger)?, deployed))
    }

    /// Amount `earn` would push to the controller
    pub fn available(&self, ledger: &Ledger) -> Result<u128, CustodyError> {
        Ok(bps_of(self.idle(ledger)?, self.state(ledger)?.min))
    }

    pub fn get_price_per_full_share(&self, ledger: &Ledger) -> Result<Ppfs, CustodyError> {
        Ok(Ppfs::from_ratio(self.balance(ledger)?, self.total_supply(ledger)?))
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Send the available idle balance through the controller into the
    /// active strategy
    pub fn earn(&self, ledger: &mut Ledger, caller: Address) -> Result<u128, CustodyError> {
        let me = self.0;
        let vault = *self;
        ledger.transact(|l| {
            let amount = vault.available(l)?;
            if amount == 0 {
                return Ok(0);
            }
            let state = vault.state(l)?;
            let (token, controller) = (state.token, Controller(state.controller));
            l.tokens.transfer(token, me, controller.address(), amount)?;
            controller.earn(l, me, token)?;
            log::info!("vault {}: earn {} requested by {}", me, amount, caller);
            Ok(amount)
        })
    }

    /// Deposit want for shares at the current price
    pub fn deposit(&self, ledger: &mut Ledger, caller: Address, amount: u128) -> Result<u128, CustodyError> {
        let me = self.0;
        let vault = *self;
        ledger.transact(|l| {
            if amount == 0 {
                return Err(CustodyError::ZeroAmount);
            }
            let pool = vault.balance(l)?;
            let token = vault.token(l)?;
            l.tokens.transfer(token, caller, me, amount)?;

            let state = l.vault_state_mut(me)?;
            let shares = if state.total_supply == 0 || pool == 0 {
                amount
            } else {
                mul_div(amount, state.total_supply, pool)
            };
            state.total_supply = add_u128(state.total_supply, shares);
            let held = state.shares.entry(caller).or_insert(0);
            *held = add_u128(*held, shares);

            log::debug!("vault {}: {} deposited {} for {} shares", me, caller, amount, shares);
            Ok(shares)
        })
    }

    /// Burn shares for their pro-rata claim on the vault balance.
    ///
    /// When idle want does not cover the claim the shortfall is pulled
    /// through the controller; the caller receives what actually arrived.
    pub fn withdraw(&self, ledger: &mut Ledger, caller: Address, shares: u128) -> Result<u128, CustodyError> {
        let me = self.0;
        let vault = *self;
        ledger.transact(|l| {
            if shares == 0 {
                return Err(CustodyError::ZeroAmount);
            }
            let held = vault.shares_of(l, caller)?;
            if held < shares {
                return Err(CustodyError::InsufficientBalance {
                    asset: me,
                    holder: caller,
                    needed: shares,
                    available: held,
                });
            }
            let owed = mul_div(vault.balance(l)?, shares, vault.total_supply(l)?);

            let state = l.vault_state_mut(me)?;
            state.total_supply = sub_u128(state.total_supply, shares);
            state.shares.insert(caller, sub_u128(held, shares));
            let (token, controller) = (state.token, Controller(state.controller));

            let idle = vault.idle(l)?;
            let mut payout = owed;
            if idle < owed {
                controller.withdraw(l, me, token, sub_u128(owed, idle))?;
                let after = vault.idle(l)?;
                if after < owed {
                    payout = after;
                }
            }
            l.tokens.transfer(token, me, caller, payout)?;

            log::debug!("vault {}: {} burned {} shares for {}", me, caller, shares, payout);
            Ok(payout)
        })
    }

    pub fn set_controller(&self, ledger: &mut Ledger, caller: Address, controller: Address) -> Result<(), CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let state = l.vault_state_mut(me)?;
            PermissionGuard::require(&*state, caller, Role::Governance)?;
            state.controller = controller;
            Ok(())
        })
    }

    pub fn set_min(&self, ledger: &mut Ledger, caller: Address, min: u32) -> Result<(), CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let state = l.vault_state_mut(me)?;
            PermissionGuard::require(&*state, caller, Role::Governance)?;
            if min > MAX_BPS {
                return Err(CustodyError::FeeOutOfRange { field: "min", value: min });
            }
            state.min = min;
            Ok(())
        })
    }
}
