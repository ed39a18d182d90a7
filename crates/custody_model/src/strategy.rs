//! Strategy: owns deployed capital and reports it back
//!
//! Storage lives in the strategy's proxy ([`crate::proxy::StrategyProxyState`]);
//! behavior that differs between logic versions is dispatched through
//! [`LogicVersion`]. Configuration is governance-only, capital leaves only
//! toward the vault bound to the strategy's controller.

use serde::{Deserialize, Serialize};

use crate::controller::ControllerState;
use crate::error::CustodyError;
use crate::guard::{PermissionGuard, RoleHolder};
use crate::ledger::Ledger;
use crate::logic::LogicVersion;
use crate::math::{add_u128, bps_of, min_u128, mul_div, sub_u128, MAX_BPS};
use crate::types::{AccountKind, Address, Asset, Role};
use crate::yield_source::{RewardAmounts, YieldSource};

/// Everything a strategy keeps in storage
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyStorage {
    pub governance: Address,
    pub strategist: Address,
    pub keeper: Address,
    pub guardian: Address,
    pub controller: Address,
    pub want: Asset,
    pub lp_component: Address,
    pub reward: Address,
    pub staking_contract: Address,
    pub performance_fee_governance: u32,
    pub performance_fee_strategist: u32,
    pub withdrawal_fee: u32,
    pub withdrawal_max_deviation_threshold: u32,
    pub autocompound_on_withdraw_all: bool,
}

impl RoleHolder for StrategyStorage {
    fn role_address(&self, role: Role) -> Option<Address> {
        match role {
            Role::Governance => Some(self.governance),
            Role::Strategist => Some(self.strategist),
            Role::Keeper => Some(self.keeper),
            Role::Guardian => Some(self.guardian),
            Role::Controller => Some(self.controller),
            Role::Vault | Role::ProxyAdminOwner => None,
        }
    }
}

/// One attribute that differs between two readings
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: &'static str,
    pub before: String,
    pub after: String,
}

macro_rules! diff_fields {
    ($a:expr, $b:expr, $out:expr; $($field:ident),+ $(,)?) => {
        $(
            if $a.$field != $b.$field {
                $out.push(FieldDiff {
                    field: stringify!($field),
                    before: $a.$field.to_string(),
                    after: $b.$field.to_string(),
                });
            }
        )+
    };
}

impl StrategyStorage {
    /// Tokens a strategy refuses to sweep
    pub fn protected_tokens(&self) -> [Address; 3] {
        [self.want, self.lp_component, self.reward]
    }

    /// Configuration parameters that a replacement strategy is expected to
    /// carry over unchanged
    pub fn parameter_drift(&self, other: &StrategyStorage) -> Vec<FieldDiff> {
        let mut out = Vec::new();
        diff_fields!(self, other, out;
            reward,
            lp_component,
            staking_contract,
            performance_fee_governance,
            performance_fee_strategist,
            withdrawal_fee,
            withdrawal_max_deviation_threshold,
            autocompound_on_withdraw_all,
        );
        out
    }
}

/// The persisted layout of a strategy as read through its address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySnapshot {
    pub governance: Address,
    pub strategist: Address,
    pub keeper: Address,
    pub guardian: Address,
    pub want: Asset,
    pub performance_fee_governance: u32,
    pub performance_fee_strategist: u32,
    pub withdrawal_fee: u32,
    pub controller: Address,
    pub withdrawal_max_deviation_threshold: u32,
    pub lp_component: Address,
    pub reward: Address,
    pub staking_contract: Address,
    pub autocompound_on_withdraw_all: bool,
    pub balance_of: u128,
    pub balance_of_pool: u128,
}

impl StrategySnapshot {
    /// Field-level differences from `self` to `after`, in layout order
    pub fn diff(&self, after: &StrategySnapshot) -> Vec<FieldDiff> {
        let mut out = Vec::new();
        diff_fields!(self, after, out;
            governance,
            strategist,
            keeper,
            guardian,
            want,
            performance_fee_governance,
            performance_fee_strategist,
            withdrawal_fee,
            controller,
            withdrawal_max_deviation_threshold,
            lp_component,
            reward,
            staking_contract,
            autocompound_on_withdraw_all,
            balance_of,
            balance_of_pool,
        );
        out
    }
}

fn check_bps(field: &'static str, value: u32) -> Result<(), CustodyError> {
    if value > MAX_BPS {
        return Err(CustodyError::FeeOutOfRange { field, value });
    }
    Ok(())
}

/// Handle to a strategy proxy in the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Strategy(pub Address);

impl Strategy {
    pub fn address(&self) -> Address {
        self.0
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn storage<'a>(&self, ledger: &'a Ledger) -> Result<&'a StrategyStorage, CustodyError> {
        Ok(&ledger.proxy(self.0)?.storage)
    }

    pub fn want(&self, ledger: &Ledger) -> Result<Asset, CustodyError> {
        Ok(self.storage(ledger)?.want)
    }

    pub fn controller(&self, ledger: &Ledger) -> Result<Address, CustodyError> {
        Ok(self.storage(ledger)?.controller)
    }

    pub fn governance(&self, ledger: &Ledger) -> Result<Address, CustodyError> {
        Ok(self.storage(ledger)?.governance)
    }

    pub fn staking_contract(&self, ledger: &Ledger) -> Result<Address, CustodyError> {
        Ok(self.storage(ledger)?.staking_contract)
    }

    pub fn performance_fee_governance(&self, ledger: &Ledger) -> Result<u32, CustodyError> {
        Ok(self.storage(ledger)?.performance_fee_governance)
    }

    pub fn performance_fee_strategist(&self, ledger: &Ledger) -> Result<u32, CustodyError> {
        Ok(self.storage(ledger)?.performance_fee_strategist)
    }

    pub fn withdrawal_fee(&self, ledger: &Ledger) -> Result<u32, CustodyError> {
        Ok(self.storage(ledger)?.withdrawal_fee)
    }

    pub fn withdrawal_max_deviation_threshold(&self, ledger: &Ledger) -> Result<u32, CustodyError> {
        Ok(self.storage(ledger)?.withdrawal_max_deviation_threshold)
    }

    /// Logic contract the proxy currently points at
    pub fn implementation(&self, ledger: &Ledger) -> Result<Address, CustodyError> {
        Ok(ledger.proxy(self.0)?.implementation)
    }

    pub fn logic(&self, ledger: &Ledger) -> Result<LogicVersion, CustodyError> {
        ledger.logic_version(self.implementation(ledger)?)
    }

    /// Want held by the strategy itself, not yet staked
    pub fn balance_of_want(&self, ledger: &Ledger) -> Result<u128, CustodyError> {
        let want = self.want(ledger)?;
        Ok(ledger.tokens.balance_of(want, self.0))
    }

    /// Want staked at the currently bound staking contract. A binding that
    /// points at no known yield source reads as zero.
    pub fn balance_of_pool(&self, ledger: &Ledger) -> Result<u128, CustodyError> {
        let staking = self.staking_contract(ledger)?;
        Ok(ledger
            .pools
            .get(&staking)
            .map_or(0, |pool| pool.staked(self.0)))
    }

    pub fn balance_of(&self, ledger: &Ledger) -> Result<u128, CustodyError> {
        Ok(add_u128(self.balance_of_want(ledger)?, self.balance_of_pool(ledger)?))
    }

    pub fn claimable_rewards(&self, ledger: &Ledger) -> Result<RewardAmounts, CustodyError> {
        let staking = self.staking_contract(ledger)?;
        Ok(ledger
            .pools
            .get(&staking)
            .map(|pool| pool.claimable_rewards(self.0))
            .unwrap_or_default())
    }

    /// Whether the bound yield source currently enforces a lockup
    pub fn source_lockup(&self, ledger: &Ledger) -> Result<bool, CustodyError> {
        let staking = self.staking_contract(ledger)?;
        Ok(ledger
            .pools
            .get(&staking)
            .is_some_and(|pool| pool.lockup_enforced()))
    }

    pub fn snapshot(&self, ledger: &Ledger) -> Result<StrategySnapshot, CustodyError> {
        let s = self.storage(ledger)?;
        Ok(StrategySnapshot {
            governance: s.governance,
            strategist: s.strategist,
            keeper: s.keeper,
            guardian: s.guardian,
            want: s.want,
            performance_fee_governance: s.performance_fee_governance,
            performance_fee_strategist: s.performance_fee_strategist,
            withdrawal_fee: s.withdrawal_fee,
            controller: s.controller,
            withdrawal_max_deviation_threshold: s.withdrawal_max_deviation_threshold,
            lp_component: s.lp_component,
            reward: s.reward,
            staking_contract: s.staking_contract,
            autocompound_on_withdraw_all: s.autocompound_on_withdraw_all,
            balance_of: self.balance_of(ledger)?,
            balance_of_pool: self.balance_of_pool(ledger)?,
        })
    }

    // ========================================================================
    // Governance configuration
    // ========================================================================

    fn configure<F>(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        what: &'static str,
        apply: F,
    ) -> Result<(), CustodyError>
    where
        F: FnOnce(&mut StrategyStorage) -> Result<(), CustodyError>,
    {
        let me = self.0;
        ledger.transact(|l| {
            let storage = &mut l.proxy_mut(me)?.storage;
            PermissionGuard::require(&*storage, caller, Role::Governance)?;
            apply(storage)?;
            log::debug!("strategy {}: {} updated", me, what);
            Ok(())
        })
    }

    /// Rebind the yield source. Compatibility of the new address is not
    /// checked here.
    pub fn set_staking_contract(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        staking_contract: Address,
    ) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "staking contract", |s| {
            s.staking_contract = staking_contract;
            Ok(())
        })
    }

    pub fn set_controller(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        controller: Address,
    ) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "controller", |s| {
            s.controller = controller;
            Ok(())
        })
    }

    pub fn set_strategist(&self, ledger: &mut Ledger, caller: Address, strategist: Address) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "strategist", |s| {
            s.strategist = strategist;
            Ok(())
        })
    }

    pub fn set_keeper(&self, ledger: &mut Ledger, caller: Address, keeper: Address) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "keeper", |s| {
            s.keeper = keeper;
            Ok(())
        })
    }

    pub fn set_guardian(&self, ledger: &mut Ledger, caller: Address, guardian: Address) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "guardian", |s| {
            s.guardian = guardian;
            Ok(())
        })
    }

    pub fn set_performance_fee_governance(&self, ledger: &mut Ledger, caller: Address, bps: u32) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "performance fee (governance)", |s| {
            check_bps("performance_fee_governance", bps)?;
            s.performance_fee_governance = bps;
            Ok(())
        })
    }

    pub fn set_performance_fee_strategist(&self, ledger: &mut Ledger, caller: Address, bps: u32) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "performance fee (strategist)", |s| {
            check_bps("performance_fee_strategist", bps)?;
            s.performance_fee_strategist = bps;
            Ok(())
        })
    }

    pub fn set_withdrawal_fee(&self, ledger: &mut Ledger, caller: Address, bps: u32) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "withdrawal fee", |s| {
            check_bps("withdrawal_fee", bps)?;
            s.withdrawal_fee = bps;
            Ok(())
        })
    }

    pub fn set_withdrawal_max_deviation_threshold(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        bps: u32,
    ) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "withdrawal max deviation threshold", |s| {
            check_bps("withdrawal_max_deviation_threshold", bps)?;
            s.withdrawal_max_deviation_threshold = bps;
            Ok(())
        })
    }

    pub fn set_autocompound_on_withdraw_all(&self, ledger: &mut Ledger, caller: Address, enabled: bool) -> Result<(), CustodyError> {
        self.configure(ledger, caller, "autocompound on withdrawAll", |s| {
            s.autocompound_on_withdraw_all = enabled;
            Ok(())
        })
    }

    // ========================================================================
    // Capital movement
    // ========================================================================

    /// Stake all idle want into the bound staking contract
    pub fn deposit(&self, ledger: &mut Ledger, caller: Address) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let storage = l.proxy(me)?.storage.clone();
            PermissionGuard::require_any(
                &storage,
                caller,
                &[Role::Keeper, Role::Governance, Role::Controller],
            )?;

            let idle = l.tokens.balance_of(storage.want, me);
            if idle == 0 {
                return Ok(0);
            }
            let Ledger { tokens, pools, .. } = l;
            let pool = pools
                .get_mut(&storage.staking_contract)
                .ok_or_else(|| CustodyError::unknown(AccountKind::StakingPool, storage.staking_contract))?;
            pool.stake(tokens, me, idle)?;

            log::debug!("strategy {}: staked {} into {}", me, idle, storage.staking_contract);
            Ok(idle)
        })
    }

    /// Return `amount` of want to the vault, net of the withdrawal fee.
    ///
    /// Frees capital from the pool when idle want does not cover the request.
    /// A shortfall is tolerated only within the max deviation threshold.
    pub fn withdraw(&self, ledger: &mut Ledger, caller: Address, amount: u128) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let storage = l.proxy(me)?.storage.clone();
            PermissionGuard::require(&storage, caller, Role::Controller)?;
            if amount == 0 {
                return Err(CustodyError::ZeroAmount);
            }
            let (vault, rewards) = settlement_accounts(l, &storage)?;

            let idle = l.tokens.balance_of(storage.want, me);
            if idle < amount {
                let Ledger { tokens, pools, .. } = &mut *l;
                if let Some(pool) = pools.get_mut(&storage.staking_contract) {
                    let take = min_u128(sub_u128(amount, idle), pool.staked(me));
                    if take > 0 {
                        pool.withdraw(tokens, me, take)?;
                    }
                }
            }

            let received = min_u128(amount, l.tokens.balance_of(storage.want, me));
            if received < amount {
                let tolerance = MAX_BPS.saturating_sub(storage.withdrawal_max_deviation_threshold);
                let floor = mul_div(amount, u128::from(tolerance), u128::from(MAX_BPS));
                if received < floor {
                    return Err(CustodyError::MaxDeviationExceeded {
                        requested: amount,
                        received,
                    });
                }
            }

            let fee = bps_of(received, storage.withdrawal_fee);
            let net = sub_u128(received, fee);
            l.tokens.transfer(storage.want, me, rewards, fee)?;
            l.tokens.transfer(storage.want, me, vault, net)?;

            log::debug!("strategy {}: withdrew {} to vault {} (fee {})", me, net, vault, fee);
            Ok(net)
        })
    }

    /// Exit the yield source entirely and send every unit of want to the
    /// vault. Refused while rewards are claimable, and under logic that
    /// cannot exit a locked source.
    pub fn withdraw_all(&self, ledger: &mut Ledger, caller: Address) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let storage = l.proxy(me)?.storage.clone();
            PermissionGuard::require(&storage, caller, Role::Controller)?;
            let logic = l.logic_version(l.proxy(me)?.implementation)?;
            let (vault, _) = settlement_accounts(l, &storage)?;

            let Ledger { tokens, pools, .. } = &mut *l;
            if let Some(pool) = pools.get_mut(&storage.staking_contract) {
                logic.exit_source(pool, tokens, me)?;
            }

            let amount = l.tokens.balance_of(storage.want, me);
            l.tokens.transfer(storage.want, me, vault, amount)?;

            log::info!("strategy {}: withdrawAll returned {} to vault {} ({})", me, amount, vault, logic);
            Ok(amount)
        })
    }

    /// Sweep a non-protected token to the controller
    pub fn withdraw_other(&self, ledger: &mut Ledger, caller: Address, token: Address) -> Result<u128, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let storage = l.proxy(me)?.storage.clone();
            PermissionGuard::require(&storage, caller, Role::Controller)?;
            if storage.protected_tokens().contains(&token) {
                return Err(CustodyError::ProtectedToken { strategy: me, token });
            }
            let amount = l.tokens.balance_of(token, me);
            l.tokens.transfer(token, me, storage.controller, amount)?;
            Ok(amount)
        })
    }

    /// Claim rewards from the yield source and pay performance fees.
    ///
    /// Governance's cut goes to the controller's rewards address, the
    /// strategist's cut to the strategist; the rest stays with the strategy.
    pub fn harvest(&self, ledger: &mut Ledger, caller: Address) -> Result<RewardAmounts, CustodyError> {
        let me = self.0;
        ledger.transact(|l| {
            let storage = l.proxy(me)?.storage.clone();
            PermissionGuard::require_any(&storage, caller, &[Role::Keeper, Role::Governance])?;
            let rewards = l.controller_state(storage.controller)?.rewards;

            let Ledger { tokens, pools, .. } = &mut *l;
            let pool = pools
                .get_mut(&storage.staking_contract)
                .ok_or_else(|| CustodyError::unknown(AccountKind::StakingPool, storage.staking_contract))?;
            let reward_tokens: Vec<Address> = pool.reward_tokens().to_vec();
            let claimed = pool.claim(tokens, me)?;

            for (token, amount) in reward_tokens.iter().zip(claimed.iter()) {
                let gov_fee = bps_of(*amount, storage.performance_fee_governance);
                let strat_fee = bps_of(*amount, storage.performance_fee_strategist);
                tokens.transfer(*token, me, rewards, gov_fee)?;
                tokens.transfer(*token, me, storage.strategist, strat_fee)?;
            }

            log::info!("strategy {}: harvested {:?}", me, claimed.as_slice());
            Ok(claimed)
        })
    }
}

/// Vault that receives returned capital and the controller's fee sink
fn settlement_accounts(ledger: &Ledger, storage: &StrategyStorage) -> Result<(Address, Address), CustodyError> {
    let controller: &ControllerState = ledger.controller_state(storage.controller)?;
    let vault = controller
        .vaults
        .get(&storage.want)
        .copied()
        .ok_or(CustodyError::NoVault { asset: storage.want })?;
    Ok((vault, controller.rewards))
}
