//! External yield-source interface and an in-memory staking-rewards pool
//!
//! Strategies only ever talk to a yield source through [`YieldSource`]. The
//! [`StakingPool`] implementation models a staking-rewards distribution: it
//! holds staked tokens, accrues claimable rewards per staker in up to
//! [`MAX_REWARD_TOKENS`] reward tokens, and may enforce a lockup during which
//! the ordinary withdraw path is refused while the exit path stays open.

use std::collections::BTreeMap;

use arrayvec::ArrayVec;

use crate::error::CustodyError;
use crate::math::{add_u128, sub_u128};
use crate::token::TokenLedger;
use crate::types::{Address, Asset};

pub const MAX_REWARD_TOKENS: usize = 4;

/// Per-reward-token amounts, in the order of the pool's reward tokens
pub type RewardAmounts = ArrayVec<u128, MAX_REWARD_TOKENS>;

pub trait YieldSource {
    fn address(&self) -> Address;

    /// Token accepted for staking
    fn staking_token(&self) -> Asset;

    fn reward_tokens(&self) -> &[Address];

    fn staked(&self, owner: Address) -> u128;

    fn claimable_rewards(&self, owner: Address) -> RewardAmounts;

    fn lockup_enforced(&self) -> bool;

    fn stake(&mut self, tokens: &mut TokenLedger, owner: Address, amount: u128)
        -> Result<(), CustodyError>;

    /// Ordinary withdraw path, refused during a lockup
    fn withdraw(&mut self, tokens: &mut TokenLedger, owner: Address, amount: u128)
        -> Result<(), CustodyError>;

    /// Return the owner's entire stake, honored during a lockup
    fn exit(&mut self, tokens: &mut TokenLedger, owner: Address) -> Result<u128, CustodyError>;

    /// Pay out everything claimable to the owner
    fn claim(&mut self, tokens: &mut TokenLedger, owner: Address)
        -> Result<RewardAmounts, CustodyError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StakingPool {
    pub address: Address,
    pub staking_token: Asset,
    pub reward_tokens: ArrayVec<Address, MAX_REWARD_TOKENS>,
    pub locked: bool,
    stakes: BTreeMap<Address, u128>,
    claimable: BTreeMap<Address, RewardAmounts>,
}

impl StakingPool {
    pub fn new(address: Address, staking_token: Asset, reward_tokens: &[Address]) -> Self {
        let reward_tokens = reward_tokens
            .iter()
            .copied()
            .take(MAX_REWARD_TOKENS)
            .collect();
        Self {
            address,
            staking_token,
            reward_tokens,
            locked: false,
            stakes: BTreeMap::new(),
            claimable: BTreeMap::new(),
        }
    }

    /// Credit `amount` of reward token `index` to `owner`.
    ///
    /// The pool pays claims from its own token balance, so the caller must
    /// fund it with the reward token separately.
    pub fn accrue(&mut self, owner: Address, index: usize, amount: u128) {
        if index >= self.reward_tokens.len() {
            return;
        }
        let n = self.reward_tokens.len();
        let entry = self
            .claimable
            .entry(owner)
            .or_insert_with(|| core::iter::repeat(0).take(n).collect());
        if let Some(slot) = entry.get_mut(index) {
            *slot = add_u128(*slot, amount);
        }
    }

    fn zero_rewards(&self) -> RewardAmounts {
        core::iter::repeat(0).take(self.reward_tokens.len()).collect()
    }

    fn pay_out(
        &mut self,
        tokens: &mut TokenLedger,
        owner: Address,
        amount: u128,
    ) -> Result<(), CustodyError> {
        let staked = self.staked(owner);
        if staked < amount {
            return Err(CustodyError::InsufficientBalance {
                asset: self.staking_token,
                holder: owner,
                needed: amount,
                available: staked,
            });
        }
        tokens.transfer(self.staking_token, self.address, owner, amount)?;
        let remaining = sub_u128(staked, amount);
        if remaining == 0 {
            self.stakes.remove(&owner);
        } else {
            self.stakes.insert(owner, remaining);
        }
        Ok(())
    }
}

impl YieldSource for StakingPool {
    fn address(&self) -> Address {
        self.address
    }

    fn staking_token(&self) -> Asset {
        self.staking_token
    }

    fn reward_tokens(&self) -> &[Address] {
        &self.reward_tokens
    }

    fn staked(&self, owner: Address) -> u128 {
        self.stakes.get(&owner).copied().unwrap_or(0)
    }

    fn claimable_rewards(&self, owner: Address) -> RewardAmounts {
        self.claimable
            .get(&owner)
            .cloned()
            .unwrap_or_else(|| self.zero_rewards())
    }

    fn lockup_enforced(&self) -> bool {
        self.locked
    }

    fn stake(
        &mut self,
        tokens: &mut TokenLedger,
        owner: Address,
        amount: u128,
    ) -> Result<(), CustodyError> {
        if amount == 0 {
            return Err(CustodyError::ZeroAmount);
        }
        tokens.transfer(self.staking_token, owner, self.address, amount)?;
        let entry = self.stakes.entry(owner).or_insert(0);
        *entry = add_u128(*entry, amount);
        Ok(())
    }

    fn withdraw(
        &mut self,
        tokens: &mut TokenLedger,
        owner: Address,
        amount: u128,
    ) -> Result<(), CustodyError> {
        if self.locked {
            return Err(CustodyError::SourceLocked { pool: self.address });
        }
        self.pay_out(tokens, owner, amount)
    }

    fn exit(&mut self, tokens: &mut TokenLedger, owner: Address) -> Result<u128, CustodyError> {
        let staked = self.staked(owner);
        self.pay_out(tokens, owner, staked)?;
        Ok(staked)
    }

    fn claim(
        &mut self,
        tokens: &mut TokenLedger,
        owner: Address,
    ) -> Result<RewardAmounts, CustodyError> {
        let owed = self.claimable_rewards(owner);
        for (token, amount) in self.reward_tokens.iter().zip(owed.iter()) {
            tokens.transfer(*token, self.address, owner, *amount)?;
        }
        self.claimable.remove(&owner);
        Ok(owed)
    }
}
