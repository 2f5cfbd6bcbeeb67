//! Integer share arithmetic
//!
//! Every division rounds down. Products are formed in 256-bit (withdrawals,
//! square root) or 512-bit (deposits) integers so that no intermediate can
//! wrap; a final value that does not fit an [`Amount`] is reported as
//! [`Error::ArithmeticOverflow`].
//!
//! # Deposit rule
//!
//! The first deposit mints `floor(sqrt(a * b))`. Later deposits price asset B
//! at the post-deposit ratio `nA / nB` and mint `shares` such that
//! `shares / (supply + shares)` equals the deposit's share of the post-deposit
//! value. Clearing the fractions gives
//!
//! ```text
//! shares = floor(S * (a * nB + b * nA) / (rA * nB + rB * nA))
//! ```
//!
//! where `rA, rB` are the reserves before and `nA, nB` after the deposit.

use crate::{
    error::{Error, Result},
    types::{Amount, PoolState},
};
use primitive_types::{U256, U512};

/// Outcome of pricing a deposit against a pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositQuote {
    /// Shares the depositor receives (may be zero after flooring)
    pub shares: Amount,
    /// Pool state once the deposit is committed
    pub state_after: PoolState,
}

/// Outcome of pricing a withdrawal against a pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalQuote {
    /// Asset A paid out
    pub amount_a: Amount,
    /// Asset B paid out
    pub amount_b: Amount,
    /// Pool state once the withdrawal is committed
    pub state_after: PoolState,
}

/// Floor of the square root (Newton's method)
pub fn isqrt(value: U256) -> U256 {
    if value.is_zero() {
        return value;
    }
    let mut x = value;
    let mut y = (x >> 1) + (x & U256::one());
    while y < x {
        x = y;
        y = (x + value / x) >> 1;
    }
    x
}

/// `floor(a * b / denominator)` without intermediate overflow
pub fn mul_div_floor(a: Amount, b: Amount, denominator: Amount) -> Result<Amount> {
    if denominator == 0 {
        return Err(Error::ArithmeticOverflow("division by zero"));
    }
    let product = U256::from(a) * U256::from(b);
    let quotient = product / U256::from(denominator);
    u128::try_from(quotient).map_err(|_| Error::ArithmeticOverflow("mul_div result exceeds u128"))
}

/// Shares minted by the first deposit into an empty pool
pub fn initial_shares(amount_a: Amount, amount_b: Amount) -> Result<Amount> {
    let product = U256::from(amount_a) * U256::from(amount_b);
    u128::try_from(isqrt(product))
        .map_err(|_| Error::ArithmeticOverflow("initial share amount exceeds u128"))
}

/// Price a deposit of `(amount_a, amount_b)` against `state`
pub fn quote_deposit(state: PoolState, amount_a: Amount, amount_b: Amount) -> Result<DepositQuote> {
    if amount_a == 0 || amount_b == 0 {
        return Err(Error::InvalidAmount(
            "both deposit amounts must be positive".to_string(),
        ));
    }

    let new_a = state
        .reserve_a
        .checked_add(amount_a)
        .ok_or(Error::ArithmeticOverflow("reserve A overflow"))?;
    let new_b = state
        .reserve_b
        .checked_add(amount_b)
        .ok_or(Error::ArithmeticOverflow("reserve B overflow"))?;

    let shares = if state.total_supply == 0 {
        initial_shares(amount_a, amount_b)?
    } else {
        proportional_shares(state, amount_a, amount_b, new_a, new_b)?
    };

    let total_supply = state
        .total_supply
        .checked_add(shares)
        .ok_or(Error::ArithmeticOverflow("share supply overflow"))?;

    Ok(DepositQuote {
        shares,
        state_after: PoolState {
            reserve_a: new_a,
            reserve_b: new_b,
            total_supply,
        },
    })
}

fn proportional_shares(
    state: PoolState,
    amount_a: Amount,
    amount_b: Amount,
    new_a: Amount,
    new_b: Amount,
) -> Result<Amount> {
    let wide = |value: Amount| U512::from(value);

    // Deposit value and pre-existing value, both in A units scaled by nB.
    let deposit_value = wide(amount_a) * wide(new_b) + wide(amount_b) * wide(new_a);
    let existing_value = wide(state.reserve_a) * wide(new_b) + wide(state.reserve_b) * wide(new_a);
    if existing_value.is_zero() {
        return Err(Error::InvariantViolation(format!(
            "outstanding supply {} backed by empty reserves",
            state.total_supply
        )));
    }

    let shares = wide(state.total_supply) * deposit_value / existing_value;
    u128::try_from(shares).map_err(|_| Error::ArithmeticOverflow("minted shares exceed u128"))
}

/// Price a redemption of `shares` against `state`
pub fn quote_withdrawal(state: PoolState, shares: Amount) -> Result<WithdrawalQuote> {
    if shares == 0 {
        return Err(Error::InvalidAmount(
            "share amount must be positive".to_string(),
        ));
    }
    if shares > state.total_supply {
        return Err(Error::InsufficientBalance {
            holder: "share supply".to_string(),
            available: state.total_supply,
            required: shares,
        });
    }

    let amount_a = mul_div_floor(state.reserve_a, shares, state.total_supply)?;
    let amount_b = mul_div_floor(state.reserve_b, shares, state.total_supply)?;

    Ok(WithdrawalQuote {
        amount_a,
        amount_b,
        state_after: PoolState {
            reserve_a: state.reserve_a - amount_a,
            reserve_b: state.reserve_b - amount_b,
            total_supply: state.total_supply - shares,
        },
    })
}
