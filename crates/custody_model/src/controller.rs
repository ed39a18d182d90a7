//! Controller: routes each asset to exactly one active strategy
//!
//! Activation is two-phase. Governance first approves an (asset, strategy)
//! pair, then activates it. Each pair moves through
//!
//! ```text
//! (absent) --approve--> Approved --set_strategy--> Active
//!                          ^                          |
//!                          |                  replaced by another
//!                      drained                        v
//!                          +------------------- Retired
//! ```
//!
//! A retired strategy may still hold capital deployed before the cutover.
//! Its balance keeps counting toward the asset's managed balance until it
//! is drained with [`Controller::withdraw_all`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CustodyError;
use crate::guard::{PermissionGuard, RoleHolder};
use crate::ledger::Ledger;
use crate::math::add_u128;
use crate::strategy::Strategy;
use crate::types::{Address, Asset, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Approved,
    Active,
    Retired,
}

impl Activation {
    /// Whether a strategy in this status can hold the asset's capital
    pub fn holds_capital(&self) -> bool {
        matches!(self, Activation::Active | Activation::Retired)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerState {
    pub governance: Address,
    pub strategist: Address,
    /// Receives withdrawal and governance performance fees
    pub rewards: Address,
    pub vaults: BTreeMap<Asset, Address>,
    pub strategies: BTreeMap<Asset, Address>,
    pub activations: BTreeMap<(Asset, Address), Activation>,
}

impl ControllerState {
    pub fn new(governance: Address, strategist: Address, rewards: Address) -> Self {
        Self {
            governance,
            strategist,
            rewards,
            ..Self::default()
        }
    }

    fn bound_to(&self, asset: Asset) -> impl Iterator<Item = Address> + '_ {
        self.activations
            .iter()
            .filter(move |((a, _), status)| *a == asset && status.holds_capital())
            .map(|((_, s), _)| *s)
    }
}

impl RoleHolder for ControllerState {
    fn role_address(&self, role: Role) -> Option<Address> {
        match role {
            Role::Governance => Some(self.governance),
            Role::Strategist => Some(self.strategist),
            _ => None,
        }
    }
}

/// Handle to a controller in the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Controller(pub Address);

impl Controller {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn state<'a>(&self, ledger: &'a Ledger) -> Result<&'a ControllerState, CustodyError> {
        ledger.controller_state(self.0)
    }

    pub fn strategies(&self, ledger: &Ledger, asset: Asset) -> Result<Option<Address>, CustodyError> {
        Ok(self.state(ledger)?.strategies.get(&asset).copied())
    }

    pub fn vaults(&self, ledger: &Ledger, asset: Asset) -> Result<Option<Address>, CustodyError> {
        Ok(self.state(ledger)?.vaults.get(&asset).copied())
    }

    pub fn rewards(&self, ledger: &Ledger) -> Result<Address, CustodyError> {
        Ok(self.state(ledger)?.rewards)
    }

    pub fn activation(
        &self,
        ledger: &Ledger,
        asset: Asset,
        strategy: Address,
    ) -> Result<Option<Activation>, CustodyError> {
        Ok(self.state(ledger)?.activations.get(&(asset, strategy)).copied())
    }

    /// Every tracked status implies a prior approval
    pub fn approved_strategies(&self, ledger: &Ledger, asset: Asset, strategy: Address) -> Result<bool, CustodyError> {
        Ok(self.activation(ledger, asset, strategy)?.is_some())
    }

    /// Capital the controller can reach for `asset`: the active strategy plus
    /// every retired strategy still holding a residual
    pub fn balance_of(&self, ledger: &Ledger, asset: Asset) -> Result<u128, CustodyError> {
        let state = self.state(ledger)?;
        state.bound_to(asset).try_fold(0u128, |acc, s| {
            Ok(add_u128(acc, Strategy(s).balance_of(ledger)?))
        })
    }

    // ========================================================================
    // Governance
    // ========================================================================

    /// Mark `strategy` eligible for `asset`. Approving an already approved
    /// pair changes nothing.
    ///
    /// `strategy` must be a deployed strategy proxy whose want is `asset`.
    pub fn approve_strategy(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        asset: Asset,
        strategy: Address,
    ) -> Result<(), CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            PermissionGuard::require(l.controller_state(me)?, caller, Role::Governance)?;
            let want = Strategy(strategy).want(l)?;
            if want != asset {
                return Err(CustodyError::WantMismatch { strategy, asset, want });
            }
            l.controller_state_mut(me)?
                .activations
                .entry((asset, strategy))
                .or_insert(Activation::Approved);
            log::info!("controller {}: approved {} for {}", me, strategy, asset);
            Ok(())
        })
    }

    /// Withdraw an approval. The active strategy and retired strategies
    /// still holding capital cannot be revoked.
    pub fn revoke_strategy(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        asset: Asset,
        strategy: Address,
    ) -> Result<(), CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            PermissionGuard::require(l.controller_state(me)?, caller, Role::Governance)?;
            match l.controller_state(me)?.activations.get(&(asset, strategy)) {
                Some(Activation::Active) => {
                    return Err(CustodyError::StrategyActive { asset, strategy });
                }
                Some(Activation::Retired) => {
                    let balance = Strategy(strategy).balance_of(l)?;
                    if balance > 0 {
                        return Err(CustodyError::ResidualCapital { strategy, balance });
                    }
                }
                _ => {}
            }
            l.controller_state_mut(me)?.activations.remove(&(asset, strategy));
            log::info!("controller {}: revoked {} for {}", me, strategy, asset);
            Ok(())
        })
    }

    /// Activate an approved strategy for `asset`.
    ///
    /// The previous strategy is not drained; it is retired and its balance
    /// stays reachable through [`Controller::balance_of`].
    pub fn set_strategy(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        asset: Asset,
        strategy: Address,
    ) -> Result<(), CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let state = l.controller_state_mut(me)?;
            PermissionGuard::require(&*state, caller, Role::Governance)?;
            if !state.activations.contains_key(&(asset, strategy)) {
                return Err(CustodyError::NotApproved { asset, strategy });
            }

            let previous = state.strategies.insert(asset, strategy);
            if let Some(old) = previous.filter(|old| *old != strategy) {
                state.activations.insert((asset, old), Activation::Retired);
            }
            state.activations.insert((asset, strategy), Activation::Active);

            log::info!(
                "controller {}: strategy for {} set to {} (was {:?})",
                me,
                asset,
                strategy,
                previous
            );
            Ok(())
        })
    }

    pub fn set_vault(&self, ledger: &mut Ledger, caller: Address, asset: Asset, vault: Address) -> Result<(), CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let state = l.controller_state_mut(me)?;
            PermissionGuard::require(&*state, caller, Role::Governance)?;
            state.vaults.insert(asset, vault);
            Ok(())
        })
    }

    pub fn set_rewards(&self, ledger: &mut Ledger, caller: Address, rewards: Address) -> Result<(), CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let state = l.controller_state_mut(me)?;
            PermissionGuard::require(&*state, caller, Role::Governance)?;
            state.rewards = rewards;
            Ok(())
        })
    }

    // ========================================================================
    // Capital routing
    // ========================================================================

    /// Push the controller's idle balance of `asset` into the active
    /// strategy and stake it. No-op when there is nothing idle.
    pub fn earn(&self, ledger: &mut Ledger, _caller: Address, asset: Asset) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let idle = l.tokens.balance_of(asset, me);
            if idle == 0 {
                return Ok(0);
            }
            let strategy = l
                .controller_state(me)?
                .strategies
                .get(&asset)
                .copied()
                .ok_or(CustodyError::NoActiveStrategy { asset })?;

            l.tokens.transfer(asset, me, strategy, idle)?;
            Strategy(strategy).deposit(l, me)?;
            log::debug!("controller {}: earned {} of {} into {}", me, idle, asset, strategy);
            Ok(idle)
        })
    }

    /// Pull `amount` back from the active strategy to the vault. Only the
    /// vault bound to `asset` may ask.
    pub fn withdraw(&self, ledger: &mut Ledger, caller: Address, asset: Asset, amount: u128) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let state = l.controller_state(me)?;
            let vault = state.vaults.get(&asset).copied().unwrap_or_default();
            PermissionGuard::require_exact(caller, vault, Role::Vault)?;
            let strategy = state
                .strategies
                .get(&asset)
                .copied()
                .ok_or(CustodyError::NoActiveStrategy { asset })?;
            Strategy(strategy).withdraw(l, me, amount)
        })
    }

    /// Drain an active or retired strategy of `asset` back to the vault.
    /// A retired strategy left empty drops back to merely approved.
    pub fn withdraw_all(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        asset: Asset,
        strategy: Address,
    ) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let state = l.controller_state(me)?;
            PermissionGuard::require_any(state, caller, &[Role::Governance, Role::Strategist])?;
            let status = state.activations.get(&(asset, strategy)).copied();
            if !status.is_some_and(|s| s.holds_capital()) {
                return Err(CustodyError::NotBound { asset, strategy });
            }

            let amount = Strategy(strategy).withdraw_all(l, me)?;

            if status == Some(Activation::Retired) && Strategy(strategy).balance_of(l)? == 0 {
                l.controller_state_mut(me)?
                    .activations
                    .insert((asset, strategy), Activation::Approved);
            }
            Ok(amount)
        })
    }

    /// Recover a stray non-protected token from a strategy
    pub fn in_case_strategy_token_gets_stuck(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        strategy: Address,
        token: Address,
    ) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            PermissionGuard::require_any(l.controller_state(me)?, caller, &[Role::Governance, Role::Strategist])?;
            Strategy(strategy).withdraw_other(l, me, token)
        })
    }
}
