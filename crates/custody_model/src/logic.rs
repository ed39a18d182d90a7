//! Executable strategy logic that can sit behind a proxy
//!
//! Logic contracts carry no state of their own. Everything they act on lives
//! in the proxy's storage and in the ledger, which is what lets a proxy swap
//! its logic without touching storage.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BlockReason, CustodyError};
use crate::token::TokenLedger;
use crate::types::Address;
use crate::yield_source::YieldSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicVersion {
    /// Exits the pool through its ordinary withdraw path
    StakingV1,
    /// Exits the pool through its exit path, which survives a lockup
    StakingV2,
}

impl LogicVersion {
    pub fn name(&self) -> &'static str {
        match self {
            LogicVersion::StakingV1 => "staking-v1",
            LogicVersion::StakingV2 => "staking-v2",
        }
    }

    /// Pull the strategy's whole stake out of `source` back to the strategy.
    ///
    /// Refuses while any reward is claimable, whatever the version.
    pub(crate) fn exit_source(
        &self,
        source: &mut dyn YieldSource,
        tokens: &mut TokenLedger,
        strategy: Address,
    ) -> Result<u128, CustodyError> {
        let total: u128 = source
            .claimable_rewards(strategy)
            .iter()
            .fold(0u128, |acc, v| acc.saturating_add(*v));
        if total > 0 {
            return Err(CustodyError::WithdrawAllBlocked {
                strategy,
                reason: BlockReason::PendingRewards { total },
            });
        }

        let staked = source.staked(strategy);
        if staked == 0 {
            return Ok(0);
        }

        match self {
            LogicVersion::StakingV1 => match source.withdraw(tokens, strategy, staked) {
                Ok(()) => Ok(staked),
                Err(CustodyError::SourceLocked { .. }) => Err(CustodyError::WithdrawAllBlocked {
                    strategy,
                    reason: BlockReason::Locked,
                }),
                Err(e) => Err(e),
            },
            LogicVersion::StakingV2 => source.exit(tokens, strategy),
        }
    }
}

impl fmt::Display for LogicVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
