//! Core types for the pool
//!
//! All types are designed for:
//! - Deterministic serialization (bincode, ordered maps)
//! - Exact arithmetic (`u128` amounts, no floating point)

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Token quantity in the asset's smallest unit
pub type Amount = u128;

/// Identity of a holder, pool or ledger
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a child identity, e.g. the share ledger of a pool
    pub fn child(&self, suffix: &str) -> Self {
        Self(format!("{}/{}", self.0, suffix))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Descriptive metadata of a fungible token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Human readable name
    pub name: String,
    /// Ticker symbol
    pub symbol: String,
    /// Display decimals
    pub decimals: u8,
}

/// Pool lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    /// No shares outstanding, no reserves
    Empty,
    /// At least one share outstanding
    Active,
}

/// Point-in-time view of the pool accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Pool holdings of asset A
    pub reserve_a: Amount,
    /// Pool holdings of asset B
    pub reserve_b: Amount,
    /// Outstanding liquidity shares
    pub total_supply: Amount,
}

impl PoolState {
    /// Lifecycle state implied by the outstanding supply
    pub fn status(&self) -> PoolStatus {
        if self.total_supply == 0 {
            PoolStatus::Empty
        } else {
            PoolStatus::Active
        }
    }

    /// Units of A per unit of B at the current reserves.
    ///
    /// Informational only; share accounting never goes through this value.
    pub fn spot_price(&self) -> Option<Decimal> {
        let a = to_decimal(self.reserve_a)?;
        let b = to_decimal(self.reserve_b)?;
        a.checked_div(b)
    }
}

fn to_decimal(value: Amount) -> Option<Decimal> {
    let value = i128::try_from(value).ok()?;
    Decimal::try_from_i128_with_scale(value, 0).ok()
}

/// Share ledger event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventType {
    /// New shares issued by the controller
    Mint = 1,
    /// Shares destroyed by the controller
    Burn = 2,
    /// Balance moved between holders
    Transfer = 3,
    /// Allowance set
    Approval = 4,
}

/// Entry of a ledger journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Type of event
    pub event_type: EventType,

    /// Debited holder (owner for approvals, none for mints)
    pub from: Option<AccountId>,

    /// Credited holder (spender for approvals, none for burns)
    pub to: Option<AccountId>,

    /// Amount moved, issued, destroyed or approved
    pub amount: Amount,

    /// Event timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,
}

impl LedgerEvent {
    /// Create an event stamped with the current time
    pub fn new(
        event_type: EventType,
        from: Option<AccountId>,
        to: Option<AccountId>,
        amount: Amount,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type,
            from,
            to,
            amount,
            timestamp_nanos: now_nanos(),
        }
    }
}

/// Liquidity event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LiquidityEventType {
    /// Deposit committed
    Added = 1,
    /// Withdrawal committed
    Removed = 2,
}

/// Committed deposit or withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Deposit or withdrawal
    pub event_type: LiquidityEventType,

    /// Depositor or withdrawer
    pub provider: AccountId,

    /// Asset A moved
    pub amount_a: Amount,

    /// Asset B moved
    pub amount_b: Amount,

    /// Shares minted or burned
    pub shares: Amount,

    /// Pool state after the operation
    pub state_after: PoolState,

    /// Event timestamp (nanoseconds since Unix epoch)
    pub timestamp_nanos: i64,
}

/// Proof of a completed transfer, used to revert it inside the same atomic unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Journal entry written by the ledger
    pub event_id: Uuid,

    /// Ledger that executed the transfer
    pub asset: AccountId,

    /// Spender whose allowance was consumed, for transfer-on-behalf
    pub spender: Option<AccountId>,

    /// Debited holder
    pub from: AccountId,

    /// Credited holder
    pub to: AccountId,

    /// Amount moved
    pub amount: Amount,
}

/// Current time in nanoseconds since the Unix epoch
pub(crate) fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0)
}
