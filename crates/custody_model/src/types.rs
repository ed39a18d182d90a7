//! Identifiers and roles shared by every custody component

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AddressParseError;

pub const ADDRESS_LEN: usize = 20;

/// 20-byte account identifier, rendered as `0x`-prefixed lowercase hex
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; ADDRESS_LEN]);

/// An asset is identified by the address of its token
pub type Asset = Address;

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Deterministic address from a small integer (fixtures, proofs)
    pub const fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        let be = n.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[ADDRESS_LEN - 8 + i] = be[i];
            i += 1;
        }
        Address(bytes)
    }

    /// Parse a hex literal at compile time. Only meant for constants:
    /// malformed input fails const evaluation.
    pub const fn from_hex_const(s: &str) -> Self {
        let raw = s.as_bytes();
        let offset = if raw.len() >= 2 && raw[0] == b'0' && (raw[1] == b'x' || raw[1] == b'X') {
            2
        } else {
            0
        };
        assert!(raw.len() - offset == ADDRESS_LEN * 2, "address literal must be 40 hex digits");

        let mut bytes = [0u8; ADDRESS_LEN];
        let mut i = 0;
        while i < ADDRESS_LEN {
            let hi = const_nibble(raw[offset + 2 * i]);
            let lo = const_nibble(raw[offset + 2 * i + 1]);
            bytes[i] = (hi << 4) | lo;
            i += 1;
        }
        Address(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(AddressParseError::Length(digits.len()));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes)?;
        Ok(Address(bytes))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn is_zero(&self) -> bool {
        *self == Address::ZERO
    }
}

const fn const_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => panic!("invalid hex digit in address literal"),
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Privileged roles checked by the permission guard.
///
/// There is no hierarchy between roles: holding `Strategist` says nothing
/// about `Governance`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Governance,
    Strategist,
    Keeper,
    Guardian,
    Controller,
    /// The vault bound to an asset in a controller
    Vault,
    /// Owner of a proxy admin, authorized separately from strategy governance
    ProxyAdminOwner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Governance => "governance",
            Role::Strategist => "strategist",
            Role::Keeper => "keeper",
            Role::Guardian => "guardian",
            Role::Controller => "controller",
            Role::Vault => "vault",
            Role::ProxyAdminOwner => "proxy admin owner",
        };
        f.write_str(name)
    }
}

/// Kind of account stored in the ledger, used in lookup errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Vault,
    Controller,
    Strategy,
    StakingPool,
    ProxyAdmin,
    Logic,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountKind::Vault => "vault",
            AccountKind::Controller => "controller",
            AccountKind::Strategy => "strategy",
            AccountKind::StakingPool => "staking pool",
            AccountKind::ProxyAdmin => "proxy admin",
            AccountKind::Logic => "logic contract",
        };
        f.write_str(name)
    }
}
