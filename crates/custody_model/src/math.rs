//! Safe arithmetic helpers - no unwrap, no panics, no as casts

use core::fmt;

use serde::{Deserialize, Serialize};

/// Basis-point denominator for fees and thresholds
pub const MAX_BPS: u32 = 10_000;

/// Fixed-point scale of the price per full share
pub const PPFS_SCALE: u128 = 1_000_000_000_000_000_000;

/// Add u128 with saturation at MAX
pub fn add_u128(a: u128, b: u128) -> u128 {
    a.saturating_add(b)
}

/// Subtract u128 with saturation at 0
pub fn sub_u128(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}

/// Minimum of two u128
pub fn min_u128(a: u128, b: u128) -> u128 {
    if a < b { a } else { b }
}

/// `a * b / c`, rounding down.
///
/// Falls back to a split computation when `a * b` overflows and saturates
/// if the quotient itself does not fit. Division by zero yields 0.
pub fn mul_div(a: u128, b: u128, c: u128) -> u128 {
    if c == 0 {
        return 0;
    }
    match a.checked_mul(b) {
        Some(product) => product / c,
        None => {
            // a * b / c == (a / c) * b + (a % c) * b / c
            let whole = (a / c).saturating_mul(b);
            // remainder term only overflows for divisors near u128::MAX; drop it then
            let rem = (a % c).checked_mul(b).map_or(0, |p| p / c);
            whole.saturating_add(rem)
        }
    }
}

/// Portion of `amount` expressed by `bps` basis points
pub fn bps_of(amount: u128, bps: u32) -> u128 {
    mul_div(amount, u128::from(bps), u128::from(MAX_BPS))
}

/// Price per full share, scaled by [`PPFS_SCALE`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ppfs(pub u128);

impl Ppfs {
    pub const ONE: Ppfs = Ppfs(PPFS_SCALE);

    /// `balance / supply`, defined as one when nothing has been issued
    pub fn from_ratio(balance: u128, supply: u128) -> Ppfs {
        if supply == 0 {
            return Ppfs::ONE;
        }
        Ppfs(mul_div(balance, PPFS_SCALE, supply))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for Ppfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PPFS_SCALE;
        let frac = self.0 % PPFS_SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:018}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}
