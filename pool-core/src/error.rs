//! Error types for the reserve pool

use thiserror::Error;

/// Result type for pool and ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pool and share-ledger errors
///
/// Every variant is fatal to the call that produced it: all mutations made
/// earlier in the same call are rolled back before the error is returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Mint or burn attempted by someone other than the controller
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Zero or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Burn or transfer exceeding the holder's balance
    #[error("Insufficient balance: {holder} holds {available}, needs {required}")]
    InsufficientBalance {
        /// Holder whose balance was checked
        holder: String,
        /// Balance available
        available: u128,
        /// Amount requested
        required: u128,
    },

    /// Transfer-on-behalf exceeding the prior authorization
    #[error("Insufficient allowance: {spender} may move {available} of {owner}'s balance, needs {required}")]
    InsufficientAllowance {
        /// Balance owner
        owner: String,
        /// Authorized spender
        spender: String,
        /// Remaining allowance
        available: u128,
        /// Amount requested
        required: u128,
    },

    /// Intermediate or final value outside the representable range
    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(&'static str),

    /// External asset push or pull rejected by the collaborator
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Mutating call made while another one is in progress on the same pool
    #[error("Reentrant call rejected: {0}")]
    ReentrantCall(&'static str),

    /// Asset configuration rejected (identical assets, mismatched snapshot)
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    /// Invariant violation (supply != sum of balances, reserve drift, failed revert)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short stable label, used for metric labels and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized(_) => "unauthorized",
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::InsufficientAllowance { .. } => "insufficient_allowance",
            Error::ArithmeticOverflow(_) => "arithmetic_overflow",
            Error::TransferFailed(_) => "transfer_failed",
            Error::ReentrantCall(_) => "reentrant_call",
            Error::InvalidAsset(_) => "invalid_asset",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Metrics(_) => "metrics",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}
