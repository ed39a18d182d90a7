//! The single state container every component reads and mutates
//!
//! There is no ambient state: vaults, controllers, strategy proxies, logic
//! contracts, proxy admins, yield sources and token balances all live in one
//! [`Ledger`] value, and components are addressed through small `Copy`
//! handles that take the ledger by reference.
//!
//! Every mutating operation runs inside [`Ledger::transact`], so a call
//! either commits all of its effects or none of them.

use std::collections::BTreeMap;

use crate::controller::{Controller, ControllerState};
use crate::error::CustodyError;
use crate::logic::LogicVersion;
use crate::proxy::{ProxyAdmin, ProxyAdminState, StrategyProxyState};
use crate::strategy::{Strategy, StrategyStorage};
use crate::token::TokenLedger;
use crate::types::{AccountKind, Address};
use crate::vault::{Vault, VaultState};
use crate::yield_source::StakingPool;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ledger {
    pub tokens: TokenLedger,
    pub(crate) pools: BTreeMap<Address, StakingPool>,
    pub(crate) logic: BTreeMap<Address, LogicVersion>,
    pub(crate) proxy_admins: BTreeMap<Address, ProxyAdminState>,
    pub(crate) proxies: BTreeMap<Address, StrategyProxyState>,
    pub(crate) controllers: BTreeMap<Address, ControllerState>,
    pub(crate) vaults: BTreeMap<Address, VaultState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` atomically: on error the ledger is restored to its state
    /// before the call.
    pub fn transact<T, F>(&mut self, op: F) -> Result<T, CustodyError>
    where
        F: FnOnce(&mut Ledger) -> Result<T, CustodyError>,
    {
        let checkpoint = self.clone();
        let result = op(self);
        if let Err(e) = &result {
            log::debug!("ledger: call reverted: {}", e);
            *self = checkpoint;
        }
        result
    }

    /// Run `op` against a scratch copy; nothing it does is ever committed
    pub fn simulate<T, F>(&self, op: F) -> Result<T, CustodyError>
    where
        F: FnOnce(&mut Ledger) -> Result<T, CustodyError>,
    {
        let mut scratch = self.clone();
        op(&mut scratch)
    }

    // ========================================================================
    // Deployment
    // ========================================================================

    pub fn add_pool(&mut self, pool: StakingPool) {
        self.pools.insert(pool.address, pool);
    }

    pub fn register_logic(&mut self, address: Address, version: LogicVersion) {
        self.logic.insert(address, version);
    }

    pub fn deploy_proxy_admin(&mut self, address: Address, owner: Address) -> ProxyAdmin {
        self.proxy_admins.insert(address, ProxyAdminState { owner });
        ProxyAdmin(address)
    }

    /// Deploy a strategy proxy with `storage`, administered by `admin` and
    /// initially running `implementation`
    pub fn deploy_strategy(
        &mut self,
        address: Address,
        admin: Address,
        implementation: Address,
        storage: StrategyStorage,
    ) -> Result<Strategy, CustodyError> {
        self.proxy_admin_state(admin)?;
        self.logic_version(implementation)?;
        self.proxies.insert(
            address,
            StrategyProxyState {
                admin,
                implementation,
                storage,
            },
        );
        Ok(Strategy(address))
    }

    pub fn deploy_controller(&mut self, address: Address, state: ControllerState) -> Controller {
        self.controllers.insert(address, state);
        Controller(address)
    }

    pub fn deploy_vault(&mut self, address: Address, state: VaultState) -> Vault {
        self.vaults.insert(address, state);
        Vault(address)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn pool(&self, address: Address) -> Result<&StakingPool, CustodyError> {
        self.pools
            .get(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::StakingPool, address))
    }

    /// Direct access to a yield source, for driving the external
    /// collaborator (reward accrual, lockup) from fixtures and tests
    pub fn pool_mut(&mut self, address: Address) -> Result<&mut StakingPool, CustodyError> {
        self.pools
            .get_mut(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::StakingPool, address))
    }

    pub fn logic_version(&self, address: Address) -> Result<LogicVersion, CustodyError> {
        self.logic
            .get(&address)
            .copied()
            .ok_or_else(|| CustodyError::unknown(AccountKind::Logic, address))
    }

    pub(crate) fn proxy_admin_state(&self, address: Address) -> Result<&ProxyAdminState, CustodyError> {
        self.proxy_admins
            .get(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::ProxyAdmin, address))
    }

    pub(crate) fn proxy(&self, address: Address) -> Result<&StrategyProxyState, CustodyError> {
        self.proxies
            .get(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::Strategy, address))
    }

    pub(crate) fn proxy_mut(&mut self, address: Address) -> Result<&mut StrategyProxyState, CustodyError> {
        self.proxies
            .get_mut(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::Strategy, address))
    }

    pub(crate) fn controller_state(&self, address: Address) -> Result<&ControllerState, CustodyError> {
        self.controllers
            .get(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::Controller, address))
    }

    pub(crate) fn controller_state_mut(
        &mut self,
        address: Address,
    ) -> Result<&mut ControllerState, CustodyError> {
        self.controllers
            .get_mut(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::Controller, address))
    }

    pub(crate) fn vault_state(&self, address: Address) -> Result<&VaultState, CustodyError> {
        self.vaults
            .get(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::Vault, address))
    }

    pub(crate) fn vault_state_mut(&mut self, address: Address) -> Result<&mut VaultState, CustodyError> {
        self.vaults
            .get_mut(&address)
            .ok_or_else(|| CustodyError::unknown(AccountKind::Vault, address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transact_restores_on_error() {
        let asset = Address::from_low_u64(1);
        let holder = Address::from_low_u64(2);
        let mut ledger = Ledger::new();
        ledger.tokens.mint(asset, holder, 10);
        let before = ledger.clone();

        let result: Result<(), CustodyError> = ledger.transact(|l| {
            l.tokens.mint(asset, holder, 5);
            Err(CustodyError::ZeroAmount)
        });

        assert!(result.is_err());
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_transact_commits_on_success() {
        let asset = Address::from_low_u64(1);
        let holder = Address::from_low_u64(2);
        let mut ledger = Ledger::new();

        ledger
            .transact(|l| {
                l.tokens.mint(asset, holder, 5);
                Ok(())
            })
            .unwrap();
        assert_eq!(ledger.tokens.balance_of(asset, holder), 5);
    }

    #[test]
    fn test_simulate_never_commits() {
        let asset = Address::from_low_u64(1);
        let holder = Address::from_low_u64(2);
        let ledger = Ledger::new();

        let seen = ledger
            .simulate(|l| {
                l.tokens.mint(asset, holder, 5);
                Ok(l.tokens.balance_of(asset, holder))
            })
            .unwrap();
        assert_eq!(seen, 5);
        assert_eq!(ledger.tokens.balance_of(asset, holder), 0);
    }

    #[test]
    fn test_deploy_strategy_requires_admin_and_logic() {
        let mut ledger = Ledger::new();
        let err = ledger
            .deploy_strategy(
                Address::from_low_u64(1),
                Address::from_low_u64(2),
                Address::from_low_u64(3),
                StrategyStorage::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CustodyError::UnknownAccount { kind: AccountKind::ProxyAdmin, .. }
        ));
    }
}
