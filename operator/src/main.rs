//! Custody operator CLI
//!
//! Builds the configured deployment, runs a migration or an upgrade against
//! it and prints the report as JSON.

use anyhow::{bail, Context, Result};
use custody_operator::config::{OperatorConfig, DEFAULT_CONFIG_PATH};
use custody_operator::{fixture, MigrationOrchestrator, MigrationPlan, UpgradeOrchestrator};
use serde::Serialize;

const USAGE: &str = "usage: custody-operator <migrate [--no-drain] [--no-earn] | upgrade | init-config [path]>";

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    match command.as_str() {
        "init-config" => {
            let path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH);
            OperatorConfig::write_default(path)
        }
        "migrate" => {
            let plan = MigrationPlan {
                drain_retired: !args.iter().any(|a| a == "--no-drain"),
                redeploy: !args.iter().any(|a| a == "--no-earn"),
            };
            migrate(&load_config(), &plan)
        }
        "upgrade" => upgrade(&load_config()),
        other => bail!("unknown command {:?}\n{}", other, USAGE),
    }
}

fn load_config() -> OperatorConfig {
    OperatorConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({:#}), using default mainnet config", e);
        OperatorConfig::default_mainnet()
    })
}

fn migrate(config: &OperatorConfig, plan: &MigrationPlan) -> Result<()> {
    let mut d = fixture::build(config).context("Failed to build deployment")?;
    log::info!("Migrating vault {} from {} to {}", d.vault.address(), d.old_strategy.address(), d.new_strategy.address());

    let report = MigrationOrchestrator::new(d.vault, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.new_strategy, plan)
        .context("Migration aborted")?;
    print_report(&report)
}

fn upgrade(config: &OperatorConfig) -> Result<()> {
    let mut d = fixture::build(config).context("Failed to build deployment")?;
    if config.scenario.lock_pool_for_upgrade {
        d.lock_pool()?;
    }
    log::info!("Upgrading strategy {} to logic {}", d.old_strategy.address(), d.logic_v2);

    let owner = d.proxy_admin.owner(&d.ledger)?;
    let report = UpgradeOrchestrator::new(d.proxy_admin, owner, d.governance)
        .run(&mut d.ledger, d.old_strategy, d.logic_v2)
        .context("Upgrade aborted")?;
    print_report(&report)
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
