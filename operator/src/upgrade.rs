//! In-place strategy upgrade: swap the logic behind a strategy proxy and
//! prove that storage survived and capital can leave through the new logic.

use core::fmt;

use custody_model::{
    pending_rewards, Address, BlockReason, Controller, CustodyError, FieldDiff, Ledger,
    LogicVersion, ProxyAdmin, Strategy, StrategySnapshot,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStep {
    Snapshot,
    LockupDryRun,
    Upgrade,
    VerifyStorage,
    WithdrawAll,
}

impl fmt::Display for UpgradeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpgradeStep::Snapshot => "snapshot",
            UpgradeStep::LockupDryRun => "lockup_dry_run",
            UpgradeStep::Upgrade => "upgrade",
            UpgradeStep::VerifyStorage => "verify_storage",
            UpgradeStep::WithdrawAll => "withdraw_all",
        };
        f.write_str(name)
    }
}

/// Balances that did not settle as expected after the final withdrawAll
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub check: String,
    pub expected: u128,
    pub actual: u128,
    pub before: StrategySnapshot,
    pub after: StrategySnapshot,
}

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("strategy {strategy} has nothing staked; an upgrade would prove nothing")]
    NothingDeployed { strategy: Address },

    #[error("strategy {strategy} has unclaimed rewards {rewards:?}; harvest first")]
    PendingRewardsNonZero { strategy: Address, rewards: Vec<u128> },

    #[error("yield source reports a lockup but withdrawAll on {strategy} succeeded under the old logic")]
    LockupNotEnforced { strategy: Address },

    #[error("upgrade step {step} failed")]
    Step {
        step: UpgradeStep,
        #[source]
        source: CustodyError,
    },

    #[error("storage of {proxy} changed across the upgrade: {}", fmt_diff(.diff))]
    UpgradeStorageMismatch { proxy: Address, diff: Vec<FieldDiff> },

    #[error("{} after withdrawAll: expected {}, got {}", .0.check, .0.expected, .0.actual)]
    InvariantViolation(Box<SettlementReport>),
}

fn fmt_diff(diff: &[FieldDiff]) -> String {
    diff.iter()
        .map(|d| format!("{} {} -> {}", d.field, d.before, d.after))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every persisted attribute of `proxy` must read the same after the swap
pub fn verify_storage(proxy: Address, before: &StrategySnapshot, after: &StrategySnapshot) -> Result<(), UpgradeError> {
    let diff = before.diff(after);
    if diff.is_empty() {
        return Ok(());
    }
    log::error!("upgrade: storage of {} changed: {}", proxy, fmt_diff(&diff));
    Err(UpgradeError::UpgradeStorageMismatch { proxy, diff })
}

fn at(step: UpgradeStep) -> impl FnOnce(CustodyError) -> UpgradeError {
    move |source| {
        log::error!("upgrade: {} failed: {}", step, source);
        UpgradeError::Step { step, source }
    }
}

/// Per-step trace of the strategy and vault balances
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpgradeRecord {
    pub step: UpgradeStep,
    pub implementation: Address,
    pub strategy_balance: u128,
    pub vault_idle: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub proxy: Address,
    pub proxy_admin: Address,
    pub from_logic: LogicVersion,
    pub to_logic: LogicVersion,
    /// Storage as read before the upgrade, and verified equal after it
    pub storage: StrategySnapshot,
    /// Why withdrawAll was refused under the old logic, when a lockup applied
    pub blocked_before: Option<BlockReason>,
    pub withdrawn: u128,
    pub vault_idle_before: u128,
    pub vault_idle_after: u128,
    pub steps: Vec<UpgradeRecord>,
}

/// Runs an upgrade as the proxy-admin owner, with the controller's
/// governance driving withdrawAll
#[derive(Clone, Copy, Debug)]
pub struct UpgradeOrchestrator {
    pub proxy_admin: ProxyAdmin,
    pub admin_owner: Address,
    pub governance: Address,
}

impl UpgradeOrchestrator {
    pub fn new(proxy_admin: ProxyAdmin, admin_owner: Address, governance: Address) -> Self {
        Self {
            proxy_admin,
            admin_owner,
            governance,
        }
    }

    pub fn run(
        &self,
        ledger: &mut Ledger,
        strategy: Strategy,
        new_logic: Address,
    ) -> Result<UpgradeReport, UpgradeError> {
        let proxy = strategy.address();

        // ==== Snapshot ====
        let before = strategy.snapshot(ledger).map_err(at(UpgradeStep::Snapshot))?;
        if before.balance_of_pool == 0 {
            return Err(UpgradeError::NothingDeployed { strategy: proxy });
        }
        if pending_rewards(ledger, strategy).map_err(at(UpgradeStep::Snapshot))? > 0 {
            let rewards = strategy
                .claimable_rewards(ledger)
                .map_err(at(UpgradeStep::Snapshot))?;
            return Err(UpgradeError::PendingRewardsNonZero {
                strategy: proxy,
                rewards: rewards.to_vec(),
            });
        }

        let controller = Controller(before.controller);
        let vault = controller
            .vaults(ledger, before.want)
            .map_err(at(UpgradeStep::Snapshot))?
            .ok_or(CustodyError::NoVault { asset: before.want })
            .map_err(at(UpgradeStep::Snapshot))?;
        let idle_before = ledger.tokens.balance_of(before.want, vault);
        let from_logic = strategy.logic(ledger).map_err(at(UpgradeStep::Snapshot))?;

        log::info!(
            "upgrade: {} ({}) balanceOf {} balanceOfPool {}, vault idle {}",
            proxy,
            from_logic,
            before.balance_of,
            before.balance_of_pool,
            idle_before
        );
        let mut steps = vec![self.record(ledger, UpgradeStep::Snapshot, strategy, vault)?];

        // ==== Lockup dry run ====
        let mut blocked_before = None;
        if strategy.source_lockup(ledger).map_err(at(UpgradeStep::LockupDryRun))? {
            let gov = self.governance;
            let dry = ledger.simulate(|l| controller.withdraw_all(l, gov, before.want, proxy));
            match dry {
                Err(CustodyError::WithdrawAllBlocked { reason, .. }) => {
                    log::info!("upgrade: withdrawAll under {} blocked as expected: {}", from_logic, reason);
                    blocked_before = Some(reason);
                }
                Err(e) => return Err(at(UpgradeStep::LockupDryRun)(e)),
                Ok(_) => {
                    log::error!("upgrade: lockup reported but withdrawAll went through");
                    return Err(UpgradeError::LockupNotEnforced { strategy: proxy });
                }
            }
            steps.push(self.record(ledger, UpgradeStep::LockupDryRun, strategy, vault)?);
        }

        // ==== Upgrade ====
        let to_logic = self
            .proxy_admin
            .upgrade(ledger, self.admin_owner, proxy, new_logic)
            .map_err(at(UpgradeStep::Upgrade))?;
        steps.push(self.record(ledger, UpgradeStep::Upgrade, strategy, vault)?);

        // ==== Verify storage ====
        let after = strategy.snapshot(ledger).map_err(at(UpgradeStep::VerifyStorage))?;
        verify_storage(proxy, &before, &after)?;
        steps.push(self.record(ledger, UpgradeStep::VerifyStorage, strategy, vault)?);

        // ==== withdrawAll under the new logic ====
        let withdrawn = controller
            .withdraw_all(ledger, self.governance, before.want, proxy)
            .map_err(at(UpgradeStep::WithdrawAll))?;
        let settled = strategy.snapshot(ledger).map_err(at(UpgradeStep::WithdrawAll))?;
        let idle_after = ledger.tokens.balance_of(before.want, vault);
        let expected_idle = idle_before.saturating_add(before.balance_of);
        for (check, expected, actual) in [
            ("strategy balanceOf", 0, settled.balance_of),
            ("vault idle", expected_idle, idle_after),
        ] {
            if expected != actual {
                log::error!("upgrade: {} expected {}, got {}", check, expected, actual);
                return Err(UpgradeError::InvariantViolation(Box::new(SettlementReport {
                    check: check.to_string(),
                    expected,
                    actual,
                    before,
                    after: settled,
                })));
            }
        }
        steps.push(self.record(ledger, UpgradeStep::WithdrawAll, strategy, vault)?);
        log::info!("upgrade: {} now runs {}, withdrew {}", proxy, to_logic, withdrawn);

        Ok(UpgradeReport {
            proxy,
            proxy_admin: self.proxy_admin.address(),
            from_logic,
            to_logic,
            storage: before,
            blocked_before,
            withdrawn,
            vault_idle_before: idle_before,
            vault_idle_after: idle_after,
            steps,
        })
    }

    fn record(
        &self,
        ledger: &Ledger,
        step: UpgradeStep,
        strategy: Strategy,
        vault: Address,
    ) -> Result<UpgradeRecord, UpgradeError> {
        let want = strategy.want(ledger).map_err(at(step))?;
        Ok(UpgradeRecord {
            step,
            implementation: strategy.implementation(ledger).map_err(at(step))?,
            strategy_balance: strategy.balance_of(ledger).map_err(at(step))?,
            vault_idle: ledger.tokens.balance_of(want, vault),
        })
    }
}
