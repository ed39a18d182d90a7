//! Custody operator
//!
//! Drives strategy migrations and in-place strategy upgrades against a
//! custody ledger, checking every postcondition the shareholders rely on.

pub mod config;
pub mod fixture;
pub mod migration;
pub mod upgrade;

pub use config::OperatorConfig;
pub use fixture::Deployment;
pub use migration::{MigrationError, MigrationOrchestrator, MigrationPlan, MigrationReport, MigrationStep};
pub use upgrade::{verify_storage, UpgradeError, UpgradeOrchestrator, UpgradeReport, UpgradeStep};
