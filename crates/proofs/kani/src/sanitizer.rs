//! State space sanitizer - bounds values for Kani exploration

use custody_model::{StrategyStorage, MAX_BPS};

use crate::generators::{Scenario, MAX_VAL};

pub const MAX_STEPS: u8 = 4;

/// Cap on unclaimed rewards; any nonzero amount already blocks withdrawAll
const MAX_REWARDS: u128 = 3;

pub trait Sanitize {
    fn sanitize(self) -> Self;
}

fn clamp_bps(bps: u32) -> u32 {
    if bps > MAX_BPS {
        bps % (MAX_BPS + 1)
    } else {
        bps
    }
}

impl Sanitize for StrategyStorage {
    fn sanitize(mut self) -> StrategyStorage {
        self.performance_fee_governance = clamp_bps(self.performance_fee_governance);
        self.performance_fee_strategist = clamp_bps(self.performance_fee_strategist);
        self.withdrawal_fee = clamp_bps(self.withdrawal_fee);
        self.withdrawal_max_deviation_threshold = clamp_bps(self.withdrawal_max_deviation_threshold);
        self
    }
}

impl Sanitize for Scenario {
    fn sanitize(mut self) -> Scenario {
        self.deposit %= MAX_VAL;
        self.profit %= MAX_VAL;
        self.rewards = self.rewards.min(MAX_REWARDS);
        // saturate rather than wrap so "deploy everything" stays reachable
        self.deployed_bps = self.deployed_bps.min(MAX_BPS);
        self
    }
}
