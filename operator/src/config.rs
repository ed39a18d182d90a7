//! Operator configuration

use anyhow::{bail, Context, Result};
use custody_model::{Address, MAX_BPS};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CUSTODY_OPERATOR_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "operator-config.toml";

pub const DEV_MULTISIG: Address = Address::from_hex_const("0x468A0FF843BC5D185D7B07e4619119259b03619f");
pub const STRATEGIST: Address = Address::from_low_u64(0x5757);
pub const KEEPER: Address = Address::from_low_u64(0x4ee9);
pub const GUARDIAN: Address = Address::from_low_u64(0x6a4d);
pub const TREASURY: Address = Address::from_low_u64(0x7e45);
/// WBTC/WETH LP
pub const WANT: Address = Address::from_hex_const("0x9A17D97Fb5f76F44604270448Ac77D55Ac40C15c");
/// WBTC/WETH staking contract
pub const LP_COMPONENT: Address = Address::from_hex_const("0x79ba8b76F61Db3e7D994f7E384ba8f7870A043b7");
pub const REWARD_TOKEN: Address = Address::from_hex_const("0xdE903E2712288A1dA82942DDdF2c20529565aC30");
pub const REGISTRY: Address = Address::from_hex_const("0xFda7eB6f8b7a9e9fCFd348042ae675d1d652454f");

pub const DEFAULT_GOV_PERFORMANCE_FEE: u32 = 1_000;
pub const DEFAULT_PERFORMANCE_FEE: u32 = 1_000;
pub const DEFAULT_WITHDRAWAL_FEE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Governance of the vault, controller and strategies
    pub governance: Address,

    /// Strategist of the deployed strategies
    pub strategist: Address,

    /// May harvest and deposit, nothing else
    pub keeper: Address,

    pub guardian: Address,

    /// Controller fee sink
    pub rewards: Address,

    /// Asset managed by the vault
    pub want: Address,

    pub lp_component: Address,

    pub reward: Address,

    pub registry: Address,

    /// Tokens a strategy must never sweep
    pub protected_tokens: Vec<Address>,

    pub fees: FeeConfig,

    pub deployment: DeploymentConfig,

    pub scenario: ScenarioConfig,
}

/// Strategy fees, in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub performance_fee_governance: u32,
    pub performance_fee_strategist: u32,
    pub withdrawal_fee: u32,
    pub withdrawal_max_deviation_threshold: u32,
}

/// Where each component of the fixture ledger lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub vault: Address,
    pub controller: Address,
    pub old_strategy: Address,
    pub new_strategy: Address,
    pub proxy_admin: Address,
    pub logic_v1: Address,
    pub logic_v2: Address,
    pub depositor: Address,
}

/// Sizing of the demo state the operator runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Want deposited by the depositor
    pub deposit: u64,

    /// Want credited to the vault as profit after the deposit
    pub profit: u64,

    /// Share of the idle balance pushed into the old strategy, in bps
    pub deployed_bps: u32,

    /// Reward accrued to the old strategy and left unclaimed
    pub pending_rewards: u64,

    /// Whether the staking contract is locked before an upgrade
    pub lock_pool_for_upgrade: bool,
}

impl OperatorConfig {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let config_str = std::fs::read_to_string(expanded.as_ref())
            .context(format!("Failed to read config file: {}", path))?;

        let config: OperatorConfig =
            toml::from_str(&config_str).context("Failed to parse config TOML")?;
        config.validate()?;

        Ok(config)
    }

    /// The mainnet WBTC/WETH deployment, with the scenario used by the
    /// migration and upgrade runs
    pub fn default_mainnet() -> Self {
        Self {
            governance: DEV_MULTISIG,
            strategist: STRATEGIST,
            keeper: KEEPER,
            guardian: GUARDIAN,
            rewards: TREASURY,
            want: WANT,
            lp_component: LP_COMPONENT,
            reward: REWARD_TOKEN,
            registry: REGISTRY,
            protected_tokens: vec![WANT, LP_COMPONENT, REWARD_TOKEN],
            fees: FeeConfig {
                performance_fee_governance: DEFAULT_GOV_PERFORMANCE_FEE,
                performance_fee_strategist: DEFAULT_PERFORMANCE_FEE,
                withdrawal_fee: DEFAULT_WITHDRAWAL_FEE,
                withdrawal_max_deviation_threshold: 50,
            },
            deployment: DeploymentConfig {
                vault: Address::from_hex_const("0xaf9aB64F568149361ab670372b16661f4380e80B"),
                controller: Address::from_low_u64(0xc0de),
                old_strategy: Address::from_hex_const("0x43942cEae98CC7485B48a37fBB1aa5035e1c8B46"),
                new_strategy: Address::from_low_u64(0x5eed),
                proxy_admin: Address::from_low_u64(0xad31),
                logic_v1: Address::from_low_u64(0x1001),
                logic_v2: Address::from_low_u64(0x1002),
                depositor: Address::from_low_u64(0xd3f),
            },
            scenario: ScenarioConfig {
                deposit: 80,
                profit: 20,
                deployed_bps: 4_000,
                pending_rewards: 0,
                lock_pool_for_upgrade: true,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fees = &self.fees;
        for (name, bps) in [
            ("performance_fee_governance", fees.performance_fee_governance),
            ("performance_fee_strategist", fees.performance_fee_strategist),
            ("withdrawal_fee", fees.withdrawal_fee),
            ("withdrawal_max_deviation_threshold", fees.withdrawal_max_deviation_threshold),
            ("deployed_bps", self.scenario.deployed_bps),
        ] {
            if bps > MAX_BPS {
                bail!("{} of {} bps exceeds {}", name, bps, MAX_BPS);
            }
        }
        for token in [self.want, self.lp_component, self.reward] {
            if !self.protected_tokens.contains(&token) {
                bail!("protected_tokens is missing {}", token);
            }
        }
        for (name, holder) in [
            ("governance", self.governance),
            ("strategist", self.strategist),
            ("keeper", self.keeper),
            ("guardian", self.guardian),
        ] {
            if holder.is_zero() {
                bail!("{} must be set", name);
            }
        }
        Ok(())
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_mainnet();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self::default_mainnet()
    }
}
