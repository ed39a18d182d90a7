//! Snapshots and invariant checks over a ledger

use serde::Serialize;

use crate::error::CustodyError;
use crate::ledger::Ledger;
use crate::math::{add_u128, Ppfs};
use crate::strategy::{Strategy, StrategySnapshot};
use crate::types::{Address, Asset};
use crate::vault::Vault;

/// Balance of one strategy tracked for the vault's asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StrategyBalance {
    pub strategy: Address,
    pub balance_of: u128,
    pub balance_of_pool: u128,
}

/// Everything the orchestrators compare across a step
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VaultSnapshot {
    pub vault: Address,
    pub asset: Asset,
    pub balance: u128,
    pub idle: u128,
    pub ppfs: Ppfs,
    pub total_supply: u128,
    pub active_strategy: Option<Address>,
    pub strategies: Vec<StrategyBalance>,
}

impl VaultSnapshot {
    pub fn strategy_balance(&self, strategy: Address) -> u128 {
        self.strategies
            .iter()
            .find(|s| s.strategy == strategy)
            .map_or(0, |s| s.balance_of)
    }
}

/// Read the vault and every strategy its controller tracks for the asset
pub fn vault_snapshot(ledger: &Ledger, vault: Vault) -> Result<VaultSnapshot, CustodyError> {
    let asset = vault.token(ledger)?;
    let controller = vault.controller(ledger)?;
    let state = controller.state(ledger)?;

    let mut strategies = Vec::new();
    for ((a, s), status) in &state.activations {
        if *a != asset || !status.holds_capital() {
            continue;
        }
        let strategy = Strategy(*s);
        strategies.push(StrategyBalance {
            strategy: *s,
            balance_of: strategy.balance_of(ledger)?,
            balance_of_pool: strategy.balance_of_pool(ledger)?,
        });
    }

    Ok(VaultSnapshot {
        vault: vault.address(),
        asset,
        balance: vault.balance(ledger)?,
        idle: vault.idle(ledger)?,
        ppfs: vault.get_price_per_full_share(ledger)?,
        total_supply: vault.total_supply(ledger)?,
        active_strategy: state.strategies.get(&asset).copied(),
        strategies,
    })
}

/// Managed balance and share price identical between two readings
pub fn value_preserved(before: &VaultSnapshot, after: &VaultSnapshot) -> bool {
    before.balance == after.balance && before.ppfs == after.ppfs
}

/// Idle want plus every tracked strategy balance equals the vault balance
pub fn balance_accounted(s: &VaultSnapshot) -> bool {
    let deployed = s
        .strategies
        .iter()
        .fold(0u128, |acc, b| add_u128(acc, b.balance_of));
    add_u128(s.idle, deployed) == s.balance
}

/// No unit of `asset` was created or destroyed between two ledgers
pub fn conservation_ok(before: &Ledger, after: &Ledger, asset: Asset) -> bool {
    before.tokens.total_of(asset) == after.tokens.total_of(asset)
}

/// Every persisted strategy attribute equal between two readings
pub fn storage_preserved(before: &StrategySnapshot, after: &StrategySnapshot) -> bool {
    before.diff(after).is_empty()
}

/// Sum of the strategy's claimable rewards across all reward tokens
pub fn pending_rewards(ledger: &Ledger, strategy: Strategy) -> Result<u128, CustodyError> {
    Ok(strategy
        .claimable_rewards(ledger)?
        .iter()
        .fold(0u128, |acc, r| add_u128(acc, *r)))
}
