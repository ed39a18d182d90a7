//! Strategy proxies and the proxy admin that swaps their logic
//!
//! A proxy is two separate things: an address with its storage, which never
//! changes identity, and a pointer to the logic contract currently executing
//! against that storage. [`ProxyAdmin::upgrade`] only ever moves the pointer.

use serde::{Deserialize, Serialize};

use crate::error::CustodyError;
use crate::guard::{PermissionGuard, RoleHolder};
use crate::ledger::Ledger;
use crate::logic::LogicVersion;
use crate::strategy::StrategyStorage;
use crate::types::{Address, Role};

/// Storage and identity of a strategy, plus its logic pointer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyProxyState {
    pub admin: Address,
    pub implementation: Address,
    pub storage: StrategyStorage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAdminState {
    pub owner: Address,
}

impl RoleHolder for ProxyAdminState {
    fn role_address(&self, role: Role) -> Option<Address> {
        match role {
            Role::ProxyAdminOwner => Some(self.owner),
            _ => None,
        }
    }
}

/// Handle to a proxy admin in the ledger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyAdmin(pub Address);

impl ProxyAdmin {
    pub fn address(&self) -> Address {
        self.0
    }

    pub fn owner(&self, ledger: &Ledger) -> Result<Address, CustodyError> {
        Ok(ledger.proxy_admin_state(self.0)?.owner)
    }

    pub fn get_proxy_implementation(&self, ledger: &Ledger, proxy: Address) -> Result<Address, CustodyError> {
        Ok(ledger.proxy(proxy)?.implementation)
    }

    pub fn get_proxy_admin(&self, ledger: &Ledger, proxy: Address) -> Result<Address, CustodyError> {
        Ok(ledger.proxy(proxy)?.admin)
    }

    /// Point `proxy` at `new_logic`. Storage is left exactly as it was.
    pub fn upgrade(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        proxy: Address,
        new_logic: Address,
    ) -> Result<LogicVersion, CustodyError> {
        let admin = self.0;
        ledger.transact(|l| {
            PermissionGuard::require(l.proxy_admin_state(admin)?, caller, Role::ProxyAdminOwner)?;
            let version = l.logic_version(new_logic)?;

            let state = l.proxy_mut(proxy)?;
            if state.admin != admin {
                return Err(CustodyError::ProxyAdminMismatch {
                    proxy,
                    expected: admin,
                    actual: state.admin,
                });
            }
            let previous = state.implementation;
            state.implementation = new_logic;

            log::info!(
                "proxy admin {}: upgraded {} from {} to {} ({})",
                admin,
                proxy,
                previous,
                new_logic,
                version
            );
            Ok(version)
        })
    }

    pub fn transfer_ownership(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), CustodyError> {
        let admin = self.0;
        ledger.transact(|l| {
            PermissionGuard::require(l.proxy_admin_state(admin)?, caller, Role::ProxyAdminOwner)?;
            if let Some(state) = l.proxy_admins.get_mut(&admin) {
                state.owner = new_owner;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Address = Address::from_low_u64(1);
    const ADMIN: Address = Address::from_low_u64(2);
    const PROXY: Address = Address::from_low_u64(3);
    const V1: Address = Address::from_low_u64(4);
    const V2: Address = Address::from_low_u64(5);

    fn ledger() -> Ledger {
        let mut l = Ledger::new();
        l.register_logic(V1, LogicVersion::StakingV1);
        l.register_logic(V2, LogicVersion::StakingV2);
        l.deploy_proxy_admin(ADMIN, OWNER);
        l.deploy_strategy(PROXY, ADMIN, V1, StrategyStorage::default())
            .unwrap();
        l
    }

    #[test]
    fn test_upgrade_moves_pointer_only() {
        let mut l = ledger();
        let storage_before = l.proxy(PROXY).unwrap().storage.clone();

        let v = ProxyAdmin(ADMIN).upgrade(&mut l, OWNER, PROXY, V2).unwrap();
        assert_eq!(v, LogicVersion::StakingV2);
        assert_eq!(ProxyAdmin(ADMIN).get_proxy_implementation(&l, PROXY).unwrap(), V2);
        assert_eq!(l.proxy(PROXY).unwrap().storage, storage_before);
    }

    #[test]
    fn test_upgrade_requires_owner() {
        let mut l = ledger();
        let err = ProxyAdmin(ADMIN).upgrade(&mut l, PROXY, PROXY, V2).unwrap_err();
        assert!(matches!(err, CustodyError::PermissionDenied { .. }));
        assert_eq!(ProxyAdmin(ADMIN).get_proxy_implementation(&l, PROXY).unwrap(), V1);
    }

    #[test]
    fn test_upgrade_rejects_unregistered_logic() {
        let mut l = ledger();
        let bogus = Address::from_low_u64(77);
        assert!(ProxyAdmin(ADMIN).upgrade(&mut l, OWNER, PROXY, bogus).is_err());
    }

    #[test]
    fn test_foreign_admin_cannot_upgrade() {
        let mut l = ledger();
        let other = l.deploy_proxy_admin(Address::from_low_u64(9), OWNER);
        let err = other.upgrade(&mut l, OWNER, PROXY, V2).unwrap_err();
        assert_eq!(
            err,
            CustodyError::ProxyAdminMismatch {
                proxy: PROXY,
                expected: other.address(),
                actual: ADMIN
            }
        );
    }

    #[test]
    fn test_transfer_ownership() {
        let mut l = ledger();
        let next = Address::from_low_u64(42);
        ProxyAdmin(ADMIN).transfer_ownership(&mut l, OWNER, next).unwrap();
        assert_eq!(ProxyAdmin(ADMIN).owner(&l).unwrap(), next);
        assert!(ProxyAdmin(ADMIN).upgrade(&mut l, OWNER, PROXY, V2).is_err());
        assert!(ProxyAdmin(ADMIN).upgrade(&mut l, next, PROXY, V2).is_ok());
    }
}
