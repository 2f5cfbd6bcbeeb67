//! Atomic units of work for the pool
//!
//! - [`ReentrancyGuard`] admits one mutating operation at a time; a nested
//!   call made from inside an external transfer fails with
//!   [`Error::ReentrantCall`].
//! - [`AtomicUnit`] records every external transfer of an operation and, on
//!   failure, reverts them in reverse order.

use crate::{
    asset::AssetLedger,
    error::{Error, Result},
    types::{AccountId, Amount, TransferReceipt},
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag held for the duration of a mutating pool operation
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

impl ReentrancyGuard {
    /// Create an unlocked guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded section; released when the returned token drops
    pub fn enter(&self, operation: &'static str) -> Result<Entered<'_>> {
        self.entered
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| Error::ReentrantCall(operation))?;
        Ok(Entered { guard: self })
    }

    /// Whether an operation is in progress
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

/// Token proving the guard is held
#[derive(Debug)]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}

/// External transfers performed by one pool operation
pub struct AtomicUnit {
    pool: AccountId,
    transfers: Vec<(Arc<dyn AssetLedger>, TransferReceipt)>,
}

impl std::fmt::Debug for AtomicUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicUnit")
            .field("pool", &self.pool)
            .field(
                "transfers",
                &self.transfers.iter().map(|(_, r)| r).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AtomicUnit {
    /// Start a unit on behalf of `pool`
    pub fn new(pool: AccountId) -> Self {
        Self {
            pool,
            transfers: Vec::new(),
        }
    }

    /// Pull `amount` from `owner` into the pool, using the pool's allowance
    pub fn pull(
        &mut self,
        asset: &Arc<dyn AssetLedger>,
        owner: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        let receipt = asset.transfer_from(&self.pool, owner, &self.pool, amount)?;
        self.transfers.push((Arc::clone(asset), receipt));
        Ok(())
    }

    /// Push `amount` from the pool to `to`; zero amounts are skipped
    pub fn push(&mut self, asset: &Arc<dyn AssetLedger>, to: &AccountId, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let receipt = asset.transfer(&self.pool, to, amount)?;
        self.transfers.push((Arc::clone(asset), receipt));
        Ok(())
    }

    /// Keep every transfer
    pub fn commit(self) {
        tracing::debug!(pool = %self.pool, transfers = self.transfers.len(), "Atomic unit committed");
    }

    /// Revert every transfer, newest first.
    ///
    /// All reverts are attempted even if one fails; the first failure is
    /// returned as an invariant violation since reserves and external
    /// balances may now disagree.
    pub fn rollback(self) -> Result<()> {
        let mut failure = None;
        for (asset, receipt) in self.transfers.into_iter().rev() {
            if let Err(e) = asset.revert(&receipt) {
                tracing::error!(
                    pool = %self.pool,
                    asset = %receipt.asset,
                    event_id = %receipt.event_id,
                    amount = receipt.amount,
                    "Failed to revert transfer: {}",
                    e
                );
                failure.get_or_insert_with(|| {
                    Error::InvariantViolation(format!(
                        "could not revert transfer {} on {}: {}",
                        receipt.event_id, receipt.asset, e
                    ))
                });
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Roll back and return the error that caused the abort, unless the
    /// rollback itself failed
    pub fn abort(self, cause: Error) -> Error {
        tracing::warn!(pool = %self.pool, transfers = self.transfers.len(), "Aborting atomic unit: {}", cause);
        match self.rollback() {
            Ok(()) => cause,
            Err(rollback_error) => rollback_error,
        }
    }
}
