//! Custody integration tests
//!
//! End-to-end runs of the migration and upgrade orchestrators over fixture
//! deployments. Shared setup lives here; the scenarios are under `tests/`.

use custody_model::Address;
use custody_operator::config::{OperatorConfig, ScenarioConfig};
use custody_operator::fixture::{self, Deployment};

pub const OUTSIDER: Address = Address::from_low_u64(0xbad);

/// Default mainnet config with the demo state resized
pub fn config_with(deposit: u64, profit: u64, deployed_bps: u32) -> OperatorConfig {
    let mut config = OperatorConfig::default_mainnet();
    config.scenario = ScenarioConfig {
        deposit,
        profit,
        deployed_bps,
        ..config.scenario
    };
    config
}

/// Vault 100, old strategy 40, idle 60, PPFS 1.25
pub fn reference_deployment() -> Deployment {
    deployment(&OperatorConfig::default_mainnet())
}

pub fn deployment(config: &OperatorConfig) -> Deployment {
    match fixture::build(config) {
        Ok(d) => d,
        Err(e) => panic!("fixture failed to build: {:#}", e),
    }
}
