//! Role-based authorization shared by every privileged operation

use crate::error::CustodyError;
use crate::types::{Address, Role};

/// A component that stores the addresses holding its roles
pub trait RoleHolder {
    /// Address currently holding `role`, if this component defines it
    fn role_address(&self, role: Role) -> Option<Address>;
}

/// Capability check over a host's stored role addresses.
///
/// Stateless: every check reads the host at call time. A role matches only
/// its exact holder, and an unset (zero) holder matches nobody.
pub struct PermissionGuard;

impl PermissionGuard {
    /// Does `caller` hold `role` on `host`
    pub fn holds<H: RoleHolder + ?Sized>(host: &H, caller: Address, role: Role) -> bool {
        match host.role_address(role) {
            Some(holder) => !holder.is_zero() && holder == caller,
            None => false,
        }
    }

    pub fn require<H: RoleHolder + ?Sized>(
        host: &H,
        caller: Address,
        role: Role,
    ) -> Result<(), CustodyError> {
        if Self::holds(host, caller, role) {
            return Ok(());
        }
        log::debug!("guard: {} rejected for {}", caller, role);
        Err(CustodyError::PermissionDenied {
            caller,
            required: vec![role],
        })
    }

    /// Succeeds if `caller` holds at least one of `roles`
    pub fn require_any<H: RoleHolder + ?Sized>(
        host: &H,
        caller: Address,
        roles: &[Role],
    ) -> Result<(), CustodyError> {
        if roles.iter().any(|&role| Self::holds(host, caller, role)) {
            return Ok(());
        }
        log::debug!("guard: {} rejected for {:?}", caller, roles);
        Err(CustodyError::PermissionDenied {
            caller,
            required: roles.to_vec(),
        })
    }

    /// Check against a holder resolved outside the host's role table,
    /// e.g. the vault bound to one asset in a controller
    pub fn require_exact(caller: Address, holder: Address, role: Role) -> Result<(), CustodyError> {
        if !holder.is_zero() && caller == holder {
            return Ok(());
        }
        log::debug!("guard: {} is not the bound {}", caller, role);
        Err(CustodyError::PermissionDenied {
            caller,
            required: vec![role],
        })
    }
}
