//! Strategy migration: move an asset from its active strategy to a new one
//! without changing what the vault's shareholders own.
//!
//! Steps run in order and each postcondition is checked before the next step
//! starts. A failing step aborts the run; steps already committed stay
//! committed.

use core::fmt;

use custody_model::{
    vault_snapshot, Address, Asset, CustodyError, FieldDiff, Ledger, Ppfs, Strategy,
    Vault, VaultSnapshot,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Drain the retired strategy back to the vault after the cutover
    pub drain_retired: bool,
    /// Push the vault's idle balance into the new strategy at the end
    pub redeploy: bool,
}

impl Default for MigrationPlan {
    fn default() -> Self {
        Self {
            drain_retired: true,
            redeploy: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStep {
    Precondition,
    SetController,
    Approve,
    Activate,
    VerifyCutover,
    DrainRetired,
    Earn,
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStep::Precondition => "precondition",
            MigrationStep::SetController => "set_controller",
            MigrationStep::Approve => "approve_strategy",
            MigrationStep::Activate => "set_strategy",
            MigrationStep::VerifyCutover => "verify_cutover",
            MigrationStep::DrainRetired => "drain_retired",
            MigrationStep::Earn => "earn",
        };
        f.write_str(name)
    }
}

/// A postcondition that did not hold, with the vault as it was before and
/// after the offending step
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InvariantReport {
    pub step: MigrationStep,
    pub check: String,
    pub expected: u128,
    pub actual: u128,
    pub before: VaultSnapshot,
    pub after: VaultSnapshot,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("want mismatch: old strategy {old}, new strategy {new}, vault {vault}")]
    AssetMismatch { old: Asset, new: Asset, vault: Asset },

    #[error("old strategy is bound to controller {strategy}, vault to {vault}")]
    ControllerMismatch { strategy: Address, vault: Address },

    #[error("strategy {strategy} is not the active strategy for {asset} (active: {active:?})")]
    NotActive {
        asset: Asset,
        strategy: Address,
        active: Option<Address>,
    },

    #[error("vault {vault} manages nothing to migrate")]
    NothingToMigrate { vault: Address },

    #[error("target strategy {strategy} already holds {balance}")]
    DirtyTargetStrategy { strategy: Address, balance: u128 },

    #[error("migration step {step} failed")]
    Step {
        step: MigrationStep,
        #[source]
        source: CustodyError,
    },

    #[error("invariant violated after {}: {} (expected {}, got {})", .0.step, .0.check, .0.expected, .0.actual)]
    InvariantViolation(Box<InvariantReport>),
}

impl MigrationError {
    /// The step a run stopped at
    pub fn step(&self) -> MigrationStep {
        match self {
            MigrationError::Step { step, .. } => *step,
            MigrationError::InvariantViolation(report) => report.step,
            _ => MigrationStep::Precondition,
        }
    }
}

/// Vault state recorded once a step completed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub step: MigrationStep,
    pub vault: VaultSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub asset: Asset,
    pub vault: Address,
    pub controller: Address,
    pub old_strategy: Address,
    pub new_strategy: Address,
    pub pre_balance: u128,
    pub pre_ppfs: Ppfs,
    /// Configuration that differs between the old and new strategy
    pub parameter_drift: Vec<FieldDiff>,
    pub drained: u128,
    pub earned: u128,
    pub steps: Vec<MigrationRecord>,
}

/// Runs a migration on behalf of the governance account
#[derive(Clone, Copy, Debug)]
pub struct MigrationOrchestrator {
    pub vault: Vault,
    pub governance: Address,
}

fn at(step: MigrationStep) -> impl FnOnce(CustodyError) -> MigrationError {
    move |source| {
        log::error!("migration: {} failed: {}", step, source);
        MigrationError::Step { step, source }
    }
}

/// Capital held by tracked strategies other than `old` at the start of the
/// run. A drain leaves it where it is.
fn held_elsewhere(initial: &VaultSnapshot, old: Address) -> u128 {
    initial
        .strategies
        .iter()
        .filter(|s| s.strategy != old)
        .fold(0u128, |acc, s| acc.saturating_add(s.balance_of))
}

struct Checker<'a> {
    ledger: &'a Ledger,
    vault: Vault,
    step: MigrationStep,
    before: &'a VaultSnapshot,
}

impl Checker<'_> {
    fn snapshot(&self) -> Result<VaultSnapshot, MigrationError> {
        vault_snapshot(self.ledger, self.vault).map_err(at(self.step))
    }

    fn expect_eq(&self, check: &str, expected: u128, actual: u128) -> Result<(), MigrationError> {
        if expected == actual {
            return Ok(());
        }
        let after = self.snapshot()?;
        log::error!("migration: {} violated after {}: expected {}, got {}", check, self.step, expected, actual);
        Err(MigrationError::InvariantViolation(Box::new(InvariantReport {
            step: self.step,
            check: check.to_string(),
            expected,
            actual,
            before: self.before.clone(),
            after,
        })))
    }
}

impl MigrationOrchestrator {
    pub fn new(vault: Vault, governance: Address) -> Self {
        Self { vault, governance }
    }

    pub fn run(
        &self,
        ledger: &mut Ledger,
        old: Strategy,
        new: Strategy,
        plan: &MigrationPlan,
    ) -> Result<MigrationReport, MigrationError> {
        let gov = self.governance;
        let vault = self.vault;

        // ==== Preconditions ====
        let asset = vault.token(ledger).map_err(at(MigrationStep::Precondition))?;
        let old_want = old.want(ledger).map_err(at(MigrationStep::Precondition))?;
        let new_want = new.want(ledger).map_err(at(MigrationStep::Precondition))?;
        if old_want != asset || new_want != asset {
            return Err(MigrationError::AssetMismatch {
                old: old_want,
                new: new_want,
                vault: asset,
            });
        }

        let controller = vault.controller(ledger).map_err(at(MigrationStep::Precondition))?;
        let bound = old.controller(ledger).map_err(at(MigrationStep::Precondition))?;
        if bound != controller.address() {
            return Err(MigrationError::ControllerMismatch {
                strategy: bound,
                vault: controller.address(),
            });
        }

        let initial = vault_snapshot(ledger, vault).map_err(at(MigrationStep::Precondition))?;
        if initial.active_strategy != Some(old.address()) {
            return Err(MigrationError::NotActive {
                asset,
                strategy: old.address(),
                active: initial.active_strategy,
            });
        }
        if initial.balance == 0 {
            return Err(MigrationError::NothingToMigrate { vault: vault.address() });
        }
        let dirty = new.balance_of(ledger).map_err(at(MigrationStep::Precondition))?;
        if dirty != 0 {
            return Err(MigrationError::DirtyTargetStrategy {
                strategy: new.address(),
                balance: dirty,
            });
        }

        let drift = old
            .storage(ledger)
            .and_then(|o| Ok(o.parameter_drift(new.storage(ledger)?)))
            .map_err(at(MigrationStep::Precondition))?;
        for d in &drift {
            log::warn!("migration: {} differs: old {} new {}", d.field, d.before, d.after);
        }

        log::info!(
            "migration: {} -> {} for {}, vault balance {} ppfs {}",
            old.address(),
            new.address(),
            asset,
            initial.balance,
            initial.ppfs
        );
        let mut steps = vec![MigrationRecord {
            step: MigrationStep::Precondition,
            vault: initial.clone(),
        }];

        // ==== Cutover ====
        new.set_controller(ledger, gov, controller.address())
            .map_err(at(MigrationStep::SetController))?;
        steps.push(self.record(ledger, MigrationStep::SetController)?);

        controller
            .approve_strategy(ledger, gov, asset, new.address())
            .map_err(at(MigrationStep::Approve))?;
        let approved = controller
            .approved_strategies(ledger, asset, new.address())
            .map_err(at(MigrationStep::Approve))?;
        self.checker(ledger, MigrationStep::Approve, &initial)
            .expect_eq("approved_strategies", 1, u128::from(approved))?;
        steps.push(self.record(ledger, MigrationStep::Approve)?);

        controller
            .set_strategy(ledger, gov, asset, new.address())
            .map_err(at(MigrationStep::Activate))?;
        let active = controller.strategies(ledger, asset).map_err(at(MigrationStep::Activate))?;
        self.checker(ledger, MigrationStep::Activate, &initial).expect_eq(
            "strategies(asset) is the new strategy",
            1,
            u128::from(active == Some(new.address())),
        )?;
        steps.push(self.record(ledger, MigrationStep::Activate)?);

        // ==== Verify ====
        self.verify_value(ledger, MigrationStep::VerifyCutover, &initial)?;
        let check = self.checker(ledger, MigrationStep::VerifyCutover, &initial);
        let held = new.balance_of(ledger).map_err(at(MigrationStep::VerifyCutover))?;
        check.expect_eq("new strategy balance", 0, held)?;
        steps.push(self.record(ledger, MigrationStep::VerifyCutover)?);

        // ==== Drain ====
        let mut drained = 0;
        if plan.drain_retired {
            drained = controller
                .withdraw_all(ledger, gov, asset, old.address())
                .map_err(at(MigrationStep::DrainRetired))?;
            self.verify_value(ledger, MigrationStep::DrainRetired, &initial)?;
            let check = self.checker(ledger, MigrationStep::DrainRetired, &initial);
            let residual = old.balance_of(ledger).map_err(at(MigrationStep::DrainRetired))?;
            check.expect_eq("old strategy balance", 0, residual)?;
            let idle = vault.idle(ledger).map_err(at(MigrationStep::DrainRetired))?;
            let elsewhere = held_elsewhere(&initial, old.address());
            check.expect_eq("vault idle", initial.balance.saturating_sub(elsewhere), idle)?;
            steps.push(self.record(ledger, MigrationStep::DrainRetired)?);
            log::info!("migration: drained {} from {}", drained, old.address());
        }

        // ==== Earn ====
        let mut earned = 0;
        if plan.redeploy {
            earned = vault.earn(ledger, gov).map_err(at(MigrationStep::Earn))?;
            self.verify_value(ledger, MigrationStep::Earn, &initial)?;
            let check = self.checker(ledger, MigrationStep::Earn, &initial);
            let now = check.snapshot()?;
            let deployed = now
                .strategies
                .iter()
                .fold(0u128, |acc, s| acc.saturating_add(s.balance_of));
            check.expect_eq(
                "idle + tracked strategies",
                initial.balance,
                now.idle.saturating_add(deployed),
            )?;
            steps.push(self.record(ledger, MigrationStep::Earn)?);
            log::info!("migration: earned {} into {}", earned, new.address());
        }

        Ok(MigrationReport {
            asset,
            vault: vault.address(),
            controller: controller.address(),
            old_strategy: old.address(),
            new_strategy: new.address(),
            pre_balance: initial.balance,
            pre_ppfs: initial.ppfs,
            parameter_drift: drift,
            drained,
            earned,
            steps,
        })
    }

    fn checker<'a>(&self, ledger: &'a Ledger, step: MigrationStep, before: &'a VaultSnapshot) -> Checker<'a> {
        Checker {
            ledger,
            vault: self.vault,
            step,
            before,
        }
    }

    fn record(&self, ledger: &Ledger, step: MigrationStep) -> Result<MigrationRecord, MigrationError> {
        log::info!("migration: {} complete", step);
        Ok(MigrationRecord {
            step,
            vault: vault_snapshot(ledger, self.vault).map_err(at(step))?,
        })
    }

    /// Vault balance and share price as they were before the migration
    fn verify_value(&self, ledger: &Ledger, step: MigrationStep, initial: &VaultSnapshot) -> Result<(), MigrationError> {
        let check = self.checker(ledger, step, initial);
        let now = check.snapshot()?;
        check.expect_eq("vault balance", initial.balance, now.balance)?;
        check.expect_eq("price per full share", initial.ppfs.raw(), now.ppfs.raw())
    }
}
