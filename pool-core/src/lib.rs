//! Reserve Pool Core
//!
//! Two-asset liquidity pool that issues fungible shares against its
//! reserves.
//!
//! # Architecture
//!
//! - **Asset ledgers**: External balances are moved through the [`AssetLedger`] trait
//! - **Share ledger**: Pool-controlled token recording each provider's claim
//! - **Atomic operations**: Every deposit or withdrawal commits fully or not at all
//! - **Single writer**: An optional actor serializes access from async callers
//!
//! # Invariants
//!
//! - Share supply equals the sum of share balances
//! - Reserves equal the pool's balances on both asset ledgers
//! - Supply is zero exactly when both reserves are zero
//! - No sequence of deposits and withdrawals pays out more than was put in

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod asset;
pub mod atomic;
pub mod config;
pub mod error;
pub mod math;
pub mod metrics;
pub mod pool;
pub mod share_ledger;
pub mod storage;
pub mod telemetry;
pub mod types;

// Re-exports
pub use actor::{spawn_pool_actor, PoolHandle};
pub use asset::{AssetLedger, TokenLedger};
pub use config::Config;
pub use error::{Error, Result};
pub use math::{DepositQuote, WithdrawalQuote};
pub use pool::{PoolSnapshot, ReservePool};
pub use share_ledger::ShareLedger;
pub use storage::SnapshotStore;
pub use types::{
    AccountId, Amount, EventType, LedgerEvent, LiquidityEvent, LiquidityEventType, PoolState,
    PoolStatus, TokenMetadata, TransferReceipt,
};
