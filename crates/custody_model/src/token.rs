//! Fungible balance table standing in for the external asset-transfer primitive

use std::collections::BTreeMap;

use crate::error::CustodyError;
use crate::math::{add_u128, sub_u128};
use crate::types::{Address, Asset};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenLedger {
    balances: BTreeMap<(Asset, Address), u128>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, asset: Asset, holder: Address) -> u128 {
        self.balances.get(&(asset, holder)).copied().unwrap_or(0)
    }

    /// Sum of every holder's balance of `asset`
    pub fn total_of(&self, asset: Asset) -> u128 {
        self.balances
            .iter()
            .filter(|((a, _), _)| *a == asset)
            .fold(0u128, |acc, (_, v)| add_u128(acc, *v))
    }

    /// Create new units out of thin air (fixtures and reward funding)
    pub fn mint(&mut self, asset: Asset, to: Address, amount: u128) {
        let entry = self.balances.entry((asset, to)).or_insert(0);
        *entry = add_u128(*entry, amount);
    }

    pub fn transfer(
        &mut self,
        asset: Asset,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), CustodyError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(CustodyError::InsufficientBalance {
                asset,
                holder: from,
                needed: amount,
                available,
            });
        }
        self.balances.insert((asset, from), sub_u128(available, amount));
        self.mint(asset, to, amount);
        Ok(())
    }
}
