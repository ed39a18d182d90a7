//! Error taxonomy of the custody ledger

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AccountKind, Address, Asset, Role};

/// Why a full withdrawal from a strategy was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// The yield source still holds unharvested rewards for the strategy
    PendingRewards { total: u128 },
    /// The yield source refuses ordinary withdrawals during its lockup
    Locked,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::PendingRewards { total } => {
                write!(f, "{} in claimable rewards, harvest first", total)
            }
            BlockReason::Locked => f.write_str("yield source is locked"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("permission denied: {caller} does not hold {}", fmt_roles(.required))]
    PermissionDenied { caller: Address, required: Vec<Role> },

    #[error("strategy {strategy} is not approved for asset {asset}")]
    NotApproved { asset: Asset, strategy: Address },

    #[error("strategy {strategy} is not bound to asset {asset} in the controller")]
    NotBound { asset: Asset, strategy: Address },

    #[error("withdrawAll blocked on strategy {strategy}: {reason}")]
    WithdrawAllBlocked { strategy: Address, reason: BlockReason },

    #[error("staking pool {pool} is locked")]
    SourceLocked { pool: Address },

    #[error("unknown {kind} {address}")]
    UnknownAccount { kind: AccountKind, address: Address },

    #[error("{holder} holds {available} of {asset}, needs {needed}")]
    InsufficientBalance {
        asset: Asset,
        holder: Address,
        needed: u128,
        available: u128,
    },

    #[error("{field} of {value} bps exceeds 10000")]
    FeeOutOfRange { field: &'static str, value: u32 },

    #[error("withdraw received {received} of {requested}, beyond the max deviation threshold")]
    MaxDeviationExceeded { requested: u128, received: u128 },

    #[error("no vault bound to asset {asset}")]
    NoVault { asset: Asset },

    #[error("no active strategy for asset {asset}")]
    NoActiveStrategy { asset: Asset },

    #[error("strategy {strategy} is active for asset {asset}")]
    StrategyActive { asset: Asset, strategy: Address },

    #[error("retired strategy {strategy} still holds {balance}")]
    ResidualCapital { strategy: Address, balance: u128 },

    #[error("token {token} is protected by strategy {strategy}")]
    ProtectedToken { strategy: Address, token: Address },

    #[error("proxy {proxy} is administered by {actual}, not {expected}")]
    ProxyAdminMismatch {
        proxy: Address,
        expected: Address,
        actual: Address,
    },

    #[error("amount must be nonzero")]
    ZeroAmount,

    #[error("strategy {strategy} manages {want}, not {asset}")]
    WantMismatch { strategy: Address, asset: Asset, want: Asset },
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum AddressParseError {
    #[error("expected 40 hex digits, got {0}")]
    Length(usize),
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

fn fmt_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(" or ")
}

impl CustodyError {
    pub(crate) fn unknown(kind: AccountKind, address: Address) -> Self {
        CustodyError::UnknownAccount { kind, address }
    }

    /// True for the errors whose documented remedy is "harvest, then retry"
    pub fn is_withdraw_block(&self) -> bool {
        matches!(self, CustodyError::WithdrawAllBlocked { .. })
    }
}
