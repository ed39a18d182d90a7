//! Ledger fixtures the orchestrators run against
//!
//! A deployment mirrors the live WBTC/WETH setup: one vault over `want`, a
//! controller routing it, an old strategy holding the deployed share of the
//! vault's capital and a freshly deployed, empty replacement strategy.

use anyhow::{bail, Context, Result};
use custody_model::{
    Address, Controller, ControllerState, Ledger, LogicVersion, ProxyAdmin, StakingPool, Strategy,
    StrategyStorage, Vault, VaultState, MAX_BPS,
};

use crate::config::OperatorConfig;

/// A fully wired ledger and the handles into it
#[derive(Debug, Clone)]
pub struct Deployment {
    pub ledger: Ledger,
    pub vault: Vault,
    pub controller: Controller,
    pub proxy_admin: ProxyAdmin,
    pub old_strategy: Strategy,
    pub new_strategy: Strategy,
    pub staking_contract: Address,
    pub governance: Address,
    pub logic_v1: Address,
    pub logic_v2: Address,
}

impl Deployment {
    pub fn lock_pool(&mut self) -> Result<()> {
        self.ledger
            .pool_mut(self.staking_contract)
            .context("staking contract missing from fixture")?
            .locked = true;
        Ok(())
    }

    /// Credit unclaimed rewards to the old strategy, funding the pool so a
    /// later harvest can pay them
    pub fn accrue_rewards(&mut self, reward: Address, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ledger.tokens.mint(reward, self.staking_contract, amount);
        self.ledger
            .pool_mut(self.staking_contract)
            .context("staking contract missing from fixture")?
            .accrue(self.old_strategy.address(), 0, amount);
        Ok(())
    }
}

fn strategy_storage(config: &OperatorConfig, controller: Address) -> StrategyStorage {
    StrategyStorage {
        governance: config.governance,
        strategist: config.strategist,
        keeper: config.keeper,
        guardian: config.guardian,
        controller,
        want: config.want,
        lp_component: config.lp_component,
        reward: config.reward,
        // the LP staking contract doubles as the yield source
        staking_contract: config.lp_component,
        performance_fee_governance: config.fees.performance_fee_governance,
        performance_fee_strategist: config.fees.performance_fee_strategist,
        withdrawal_fee: config.fees.withdrawal_fee,
        withdrawal_max_deviation_threshold: config.fees.withdrawal_max_deviation_threshold,
        autocompound_on_withdraw_all: false,
    }
}

/// Build the deployment described by `config`.
///
/// The depositor funds the vault, profit lifts the share price, and
/// `deployed_bps` of the idle balance is pushed into the old strategy. The
/// new strategy is deployed with no controller bound.
pub fn build(config: &OperatorConfig) -> Result<Deployment> {
    let d = &config.deployment;
    let s = &config.scenario;
    let gov = config.governance;
    let mut ledger = Ledger::new();

    ledger.add_pool(StakingPool::new(config.lp_component, config.want, &[config.reward]));
    ledger.register_logic(d.logic_v1, LogicVersion::StakingV1);
    ledger.register_logic(d.logic_v2, LogicVersion::StakingV2);
    let proxy_admin = ledger.deploy_proxy_admin(d.proxy_admin, gov);

    let mut controller_state = ControllerState::new(gov, config.strategist, config.rewards);
    controller_state.vaults.insert(config.want, d.vault);
    let controller = ledger.deploy_controller(d.controller, controller_state);
    let vault = ledger.deploy_vault(d.vault, VaultState::new(config.want, gov, d.controller));

    let old_strategy = ledger
        .deploy_strategy(d.old_strategy, d.proxy_admin, d.logic_v1, strategy_storage(config, d.controller))
        .context("Failed to deploy old strategy")?;
    let new_strategy = ledger
        .deploy_strategy(d.new_strategy, d.proxy_admin, d.logic_v2, strategy_storage(config, Address::ZERO))
        .context("Failed to deploy new strategy")?;

    for strategy in [old_strategy, new_strategy] {
        for token in strategy.storage(&ledger)?.protected_tokens() {
            if !config.protected_tokens.contains(&token) {
                bail!("strategy {} protects {} outside the configured list", strategy.address(), token);
            }
        }
    }

    controller.approve_strategy(&mut ledger, gov, config.want, old_strategy.address())?;
    controller.set_strategy(&mut ledger, gov, config.want, old_strategy.address())?;

    let deposit = u128::from(s.deposit);
    if deposit > 0 {
        ledger.tokens.mint(config.want, d.depositor, deposit);
        vault
            .deposit(&mut ledger, d.depositor, deposit)
            .context("Failed to seed vault deposit")?;
    }
    ledger.tokens.mint(config.want, d.vault, u128::from(s.profit));

    vault.set_min(&mut ledger, gov, s.deployed_bps)?;
    vault.earn(&mut ledger, gov).context("Failed to deploy capital to old strategy")?;
    vault.set_min(&mut ledger, gov, MAX_BPS)?;

    log::info!(
        "fixture: vault {} balance {}, old strategy {} holds {}",
        vault.address(),
        vault.balance(&ledger)?,
        old_strategy.address(),
        old_strategy.balance_of(&ledger)?
    );

    let mut deployment = Deployment {
        ledger,
        vault,
        controller,
        proxy_admin,
        old_strategy,
        new_strategy,
        staking_contract: config.lp_component,
        governance: gov,
        logic_v1: d.logic_v1,
        logic_v2: d.logic_v2,
    };
    deployment.accrue_rewards(config.reward, u128::from(s.pending_rewards))?;
    Ok(deployment)
}
