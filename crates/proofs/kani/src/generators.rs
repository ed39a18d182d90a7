//! Generators for arbitrary custody worlds (for Kani)

#[cfg(kani)]
use kani::any;
#[cfg(kani)]
use custody_model::Role;
use custody_model::{
    Address, Controller, ControllerState, Ledger, LogicVersion, ProxyAdmin, StakingPool, Strategy,
    StrategyStorage, Vault, VaultState, MAX_BPS,
};

use crate::sanitizer::Sanitize;

// Small bounds keep the BTreeMap-heavy ledger tractable
pub const MAX_VAL: u128 = 100;
pub const N_ACTORS: u64 = 4;

pub const GOV: Address = Address::from_low_u64(1);
pub const STRATEGIST: Address = Address::from_low_u64(2);
pub const KEEPER: Address = Address::from_low_u64(3);
pub const USER: Address = Address::from_low_u64(9);
pub const REWARDS: Address = Address::from_low_u64(10);
pub const CONTROLLER: Address = Address::from_low_u64(11);
pub const VAULT: Address = Address::from_low_u64(12);
pub const ADMIN: Address = Address::from_low_u64(13);
pub const LOGIC_V1: Address = Address::from_low_u64(14);
pub const LOGIC_V2: Address = Address::from_low_u64(15);
pub const POOL: Address = Address::from_low_u64(16);
pub const WANT: Address = Address::from_low_u64(20);
pub const REWARD: Address = Address::from_low_u64(21);
pub const S1: Address = Address::from_low_u64(30);
pub const S2: Address = Address::from_low_u64(31);

/// Sizing of a generated world
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scenario {
    pub deposit: u128,
    pub profit: u128,
    pub deployed_bps: u32,
    pub rewards: u128,
    pub locked: bool,
    pub s1_logic: LogicVersion,
}

/// Ledger with one vault, one controller and two strategies for `WANT`.
/// `S1` is active and holds the deployed capital; `S2` is approved only.
#[derive(Clone, Debug)]
pub struct World {
    pub ledger: Ledger,
    pub vault: Vault,
    pub controller: Controller,
    pub admin: ProxyAdmin,
    pub s1: Strategy,
    pub s2: Strategy,
}

pub fn storage_for(controller: Address) -> StrategyStorage {
    StrategyStorage {
        governance: GOV,
        strategist: STRATEGIST,
        keeper: KEEPER,
        guardian: GOV,
        controller,
        want: WANT,
        lp_component: POOL,
        reward: REWARD,
        staking_contract: POOL,
        ..StrategyStorage::default()
    }
}

/// Build the world for `scenario`; `None` when setup itself is refused
pub fn build_world(scenario: Scenario) -> Option<World> {
    let sc = scenario.sanitize();
    let mut ledger = Ledger::new();
    ledger.add_pool(StakingPool::new(POOL, WANT, &[REWARD]));
    ledger.register_logic(LOGIC_V1, LogicVersion::StakingV1);
    ledger.register_logic(LOGIC_V2, LogicVersion::StakingV2);
    let admin = ledger.deploy_proxy_admin(ADMIN, GOV);

    let mut c = ControllerState::new(GOV, STRATEGIST, REWARDS);
    c.vaults.insert(WANT, VAULT);
    let controller = ledger.deploy_controller(CONTROLLER, c);
    let vault = ledger.deploy_vault(VAULT, VaultState::new(WANT, GOV, CONTROLLER));

    let s1_logic = match sc.s1_logic {
        LogicVersion::StakingV1 => LOGIC_V1,
        LogicVersion::StakingV2 => LOGIC_V2,
    };
    let s1 = ledger.deploy_strategy(S1, ADMIN, s1_logic, storage_for(CONTROLLER)).ok()?;
    let s2 = ledger.deploy_strategy(S2, ADMIN, LOGIC_V2, storage_for(CONTROLLER)).ok()?;

    controller.approve_strategy(&mut ledger, GOV, WANT, S1).ok()?;
    controller.set_strategy(&mut ledger, GOV, WANT, S1).ok()?;
    controller.approve_strategy(&mut ledger, GOV, WANT, S2).ok()?;

    if sc.deposit > 0 {
        ledger.tokens.mint(WANT, USER, sc.deposit);
        vault.deposit(&mut ledger, USER, sc.deposit).ok()?;
    }
    ledger.tokens.mint(WANT, VAULT, sc.profit);
    vault.set_min(&mut ledger, GOV, sc.deployed_bps).ok()?;
    vault.earn(&mut ledger, USER).ok()?;
    vault.set_min(&mut ledger, GOV, MAX_BPS).ok()?;

    let pool = ledger.pool_mut(POOL).ok()?;
    pool.locked = sc.locked;
    if sc.rewards > 0 {
        pool.accrue(S1, 0, sc.rewards);
        ledger.tokens.mint(REWARD, POOL, sc.rewards);
    }

    Some(World {
        ledger,
        vault,
        controller,
        admin,
        s1,
        s2,
    })
}

#[cfg(kani)]
pub fn any_actor() -> Address {
    // zero included on purpose: it must never pass a check
    Address::from_low_u64(any::<u64>() % N_ACTORS)
}

#[cfg(kani)]
pub fn any_role() -> Role {
    match any::<u8>() % 5 {
        0 => Role::Governance,
        1 => Role::Strategist,
        2 => Role::Keeper,
        3 => Role::Guardian,
        _ => Role::Controller,
    }
}

#[cfg(kani)]
pub fn any_storage() -> StrategyStorage {
    StrategyStorage {
        governance: any_actor(),
        strategist: any_actor(),
        keeper: any_actor(),
        guardian: any_actor(),
        controller: any_actor(),
        performance_fee_governance: any(),
        performance_fee_strategist: any(),
        withdrawal_fee: any(),
        withdrawal_max_deviation_threshold: any(),
        autocompound_on_withdraw_all: any(),
        ..storage_for(CONTROLLER)
    }
    .sanitize()
}

#[cfg(kani)]
pub fn any_scenario() -> Scenario {
    let deposit_raw: u8 = any();
    let profit_raw: u8 = any();
    let bps_raw: u16 = any();
    let rewards_raw: u8 = any();
    Scenario {
        deposit: u128::from(deposit_raw) % MAX_VAL,
        profit: u128::from(profit_raw) % MAX_VAL,
        deployed_bps: u32::from(bps_raw),
        rewards: u128::from(rewards_raw) % 4,
        locked: any(),
        s1_logic: if any() { LogicVersion::StakingV1 } else { LogicVersion::StakingV2 },
    }
}

#[cfg(kani)]
pub fn any_world() -> World {
    let world = build_world(any_scenario());
    kani::assume(world.is_some());
    match world {
        Some(w) => w,
        None => unreachable!(),
    }
}
