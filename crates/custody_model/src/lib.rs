//! Custody ledger model: vaults, controllers and proxied strategies
//! No ambient state, no unwrap/panic, every mutating call atomic

pub mod types;
pub mod math;
pub mod error;
pub mod guard;
pub mod token;
pub mod yield_source;
pub mod logic;
pub mod ledger;
pub mod proxy;
pub mod strategy;
pub mod controller;
pub mod vault;
pub mod helpers;

#[cfg(test)]
mod proptest;

// Re-export commonly used types
pub use controller::{Activation, Controller, ControllerState};
pub use error::{AddressParseError, BlockReason, CustodyError};
pub use guard::{PermissionGuard, RoleHolder};
pub use helpers::*;
pub use ledger::Ledger;
pub use logic::LogicVersion;
pub use math::{Ppfs, MAX_BPS, PPFS_SCALE};
pub use proxy::{ProxyAdmin, StrategyProxyState};
pub use strategy::{FieldDiff, Strategy, StrategySnapshot, StrategyStorage};
pub use token::TokenLedger;
pub use types::{AccountKind, Address, Asset, Role};
pub use vault::{Vault, VaultState};
pub use yield_source::{RewardAmounts, StakingPool, YieldSource, MAX_REWARD_TOKENS};
