//! Two-asset reserve pool
//!
//! The pool holds reserves of two external assets and issues liquidity
//! shares against them through its own [`ShareLedger`].
//!
//! # Atomicity
//!
//! Every mutating operation runs inside the pool's [`ReentrancyGuard`] and an
//! [`AtomicUnit`]. Any error (validation, arithmetic, a rejected transfer)
//! reverts the external transfers already made and undoes internal
//! bookkeeping, so a failed call leaves no trace.
//!
//! Locks on the internal state are never held across a call into an asset
//! ledger. A collaborator that calls back into the pool can read a
//! consistent state, but any mutating call fails with
//! [`Error::ReentrantCall`].
//!
//! # Example
//!
//! ```
//! use pool_core::{AccountId, AssetLedger, Config, ReservePool, TokenLedger, TokenMetadata};
//! use std::sync::Arc;
//!
//! # fn main() -> pool_core::Result<()> {
//! let admin = AccountId::new("admin");
//! let alice = AccountId::new("alice");
//! let meta = |s: &str| TokenMetadata { name: s.into(), symbol: s.into(), decimals: 18 };
//! let token_a = Arc::new(TokenLedger::new("token-a".into(), admin.clone(), meta("TA")));
//! let token_b = Arc::new(TokenLedger::new("token-b".into(), admin.clone(), meta("TB")));
//!
//! let pool = ReservePool::new("pool".into(), token_a.clone(), token_b.clone(), &Config::default())?;
//!
//! token_a.mint(&admin, &alice, 10)?;
//! token_b.mint(&admin, &alice, 40)?;
//! token_a.approve(&alice, pool.id(), 10)?;
//! token_b.approve(&alice, pool.id(), 40)?;
//!
//! assert_eq!(pool.add_liquidity(&alice, 10, 40)?, 20);
//! assert_eq!(pool.remove_liquidity(&alice, 20)?, (10, 40));
//! # Ok(())
//! # }
//! ```

use crate::{
    asset::AssetLedger,
    atomic::{AtomicUnit, ReentrancyGuard},
    error::{Error, Result},
    math::{self, DepositQuote, WithdrawalQuote},
    metrics::Metrics,
    share_ledger::{ShareLedger, ShareLedgerSnapshot},
    types::{
        now_nanos, AccountId, Amount, LedgerEvent, LiquidityEvent, LiquidityEventType, PoolState,
        PoolStatus,
    },
    Config,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Reserves {
    a: Amount,
    b: Amount,
}

/// Serializable image of a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Pool identity
    pub pool_id: AccountId,
    /// Ledger of asset A
    pub asset_a: AccountId,
    /// Ledger of asset B
    pub asset_b: AccountId,
    /// Reserve of asset A
    pub reserve_a: Amount,
    /// Reserve of asset B
    pub reserve_b: Amount,
    /// Share ledger state
    pub shares: ShareLedgerSnapshot,
    /// Committed liquidity events
    pub events: Vec<LiquidityEvent>,
}

/// Two-asset reserve pool
pub struct ReservePool {
    id: AccountId,
    asset_a: Arc<dyn AssetLedger>,
    asset_b: Arc<dyn AssetLedger>,
    shares: Arc<ShareLedger>,
    reserves: Mutex<Reserves>,
    journal: Mutex<Vec<LiquidityEvent>>,
    guard: ReentrancyGuard,
    metrics: Metrics,
}

impl std::fmt::Debug for ReservePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservePool")
            .field("id", &self.id)
            .field("asset_a", self.asset_a.asset_id())
            .field("asset_b", self.asset_b.asset_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ReservePool {
    /// Create an empty pool over two distinct assets
    pub fn new(
        id: AccountId,
        asset_a: Arc<dyn AssetLedger>,
        asset_b: Arc<dyn AssetLedger>,
        config: &Config,
    ) -> Result<Self> {
        Self::check_assets(&id, asset_a.as_ref(), asset_b.as_ref())?;

        let shares = ShareLedger::new(id.child("lp"), id.clone(), config.share_token.metadata());
        let pool = Self::assemble(id, asset_a, asset_b, shares, Reserves::default(), Vec::new())?;

        tracing::info!(
            pool = %pool.id,
            asset_a = %pool.asset_a.asset_id(),
            asset_b = %pool.asset_b.asset_id(),
            lp_token = %pool.shares.asset_id(),
            "Pool created"
        );
        Ok(pool)
    }

    /// Rebuild a pool from a snapshot.
    ///
    /// The asset ledgers must be the ones the snapshot was taken against and
    /// the share ledger must be controlled by the pool.
    pub fn restore(
        snapshot: PoolSnapshot,
        asset_a: Arc<dyn AssetLedger>,
        asset_b: Arc<dyn AssetLedger>,
    ) -> Result<Self> {
        Self::check_assets(&snapshot.pool_id, asset_a.as_ref(), asset_b.as_ref())?;
        if asset_a.asset_id() != &snapshot.asset_a || asset_b.asset_id() != &snapshot.asset_b {
            return Err(Error::InvalidAsset(format!(
                "snapshot taken against ({}, {}), got ({}, {})",
                snapshot.asset_a,
                snapshot.asset_b,
                asset_a.asset_id(),
                asset_b.asset_id()
            )));
        }
        if snapshot.shares.controller != snapshot.pool_id {
            return Err(Error::InvariantViolation(format!(
                "share ledger controlled by {}, not by pool {}",
                snapshot.shares.controller, snapshot.pool_id
            )));
        }

        let shares = ShareLedger::restore(snapshot.shares)?;
        let reserves = Reserves {
            a: snapshot.reserve_a,
            b: snapshot.reserve_b,
        };
        let supply = shares.total_supply();
        let consistent = if supply == 0 {
            reserves.a == 0 && reserves.b == 0
        } else {
            reserves.a > 0 && reserves.b > 0
        };
        if !consistent {
            return Err(Error::InvariantViolation(format!(
                "reserves ({}, {}) inconsistent with supply {}",
                reserves.a, reserves.b, supply
            )));
        }

        let pool = Self::assemble(
            snapshot.pool_id,
            asset_a,
            asset_b,
            shares,
            reserves,
            snapshot.events,
        )?;
        tracing::info!(pool = %pool.id, state = ?pool.state(), "Pool restored");
        Ok(pool)
    }

    fn check_assets(id: &AccountId, asset_a: &dyn AssetLedger, asset_b: &dyn AssetLedger) -> Result<()> {
        if asset_a.asset_id() == asset_b.asset_id() {
            return Err(Error::InvalidAsset(format!(
                "pool {} needs two distinct assets, got {} twice",
                id,
                asset_a.asset_id()
            )));
        }
        Ok(())
    }

    fn assemble(
        id: AccountId,
        asset_a: Arc<dyn AssetLedger>,
        asset_b: Arc<dyn AssetLedger>,
        shares: ShareLedger,
        reserves: Reserves,
        journal: Vec<LiquidityEvent>,
    ) -> Result<Self> {
        let pool = Self {
            id,
            asset_a,
            asset_b,
            shares: Arc::new(shares),
            reserves: Mutex::new(reserves),
            journal: Mutex::new(journal),
            guard: ReentrancyGuard::new(),
            metrics: Metrics::new()?,
        };
        pool.metrics.update_state(&pool.state());
        Ok(pool)
    }

    /// Pool identity; holds the reserves and controls the share ledger
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Ledger of asset A
    pub fn asset_a(&self) -> &Arc<dyn AssetLedger> {
        &self.asset_a
    }

    /// Ledger of asset B
    pub fn asset_b(&self) -> &Arc<dyn AssetLedger> {
        &self.asset_b
    }

    /// The liquidity share ledger
    pub fn lp_token(&self) -> Arc<ShareLedger> {
        Arc::clone(&self.shares)
    }

    /// Current `(reserve_a, reserve_b)`
    pub fn reserves(&self) -> (Amount, Amount) {
        let reserves = self.reserves.lock();
        (reserves.a, reserves.b)
    }

    /// Reserves and outstanding supply, read atomically
    pub fn state(&self) -> PoolState {
        let reserves = self.reserves.lock();
        PoolState {
            reserve_a: reserves.a,
            reserve_b: reserves.b,
            total_supply: self.shares.total_supply(),
        }
    }

    /// Lifecycle state
    pub fn status(&self) -> PoolStatus {
        self.state().status()
    }

    /// Committed deposits and withdrawals, oldest first
    pub fn events(&self) -> Vec<LiquidityEvent> {
        self.journal.lock().clone()
    }

    /// Pool metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Preview a deposit without side effects
    pub fn quote_add_liquidity(&self, amount_a: Amount, amount_b: Amount) -> Result<DepositQuote> {
        math::quote_deposit(self.state(), amount_a, amount_b)
    }

    /// Preview a withdrawal without side effects
    pub fn quote_remove_liquidity(&self, share_amount: Amount) -> Result<WithdrawalQuote> {
        math::quote_withdrawal(self.state(), share_amount)
    }

    /// Verify that the reserves match the pool's balances on both ledgers
    pub fn check_reserves(&self) -> Result<()> {
        let (reserve_a, reserve_b) = self.reserves();
        for (asset, reserve) in [(&self.asset_a, reserve_a), (&self.asset_b, reserve_b)] {
            let held = asset.balance_of(&self.id);
            if held != reserve {
                return Err(Error::InvariantViolation(format!(
                    "pool {} records reserve {} of {} but holds {}",
                    self.id,
                    reserve,
                    asset.asset_id(),
                    held
                )));
            }
        }
        Ok(())
    }

    /// Deposit `amount_a` of A and `amount_b` of B from `caller`.
    ///
    /// The caller must have approved the pool for both amounts. Returns the
    /// shares minted, which may be zero for a deposit too small to register.
    pub fn add_liquidity(
        &self,
        caller: &AccountId,
        amount_a: Amount,
        amount_b: Amount,
    ) -> Result<Amount> {
        self.observe("add_liquidity", caller, self.try_add_liquidity(caller, amount_a, amount_b))
    }

    /// Redeem `share_amount` shares held by `caller` for a proportional
    /// slice of both reserves. Returns `(amount_a, amount_b)` paid out.
    pub fn remove_liquidity(
        &self,
        caller: &AccountId,
        share_amount: Amount,
    ) -> Result<(Amount, Amount)> {
        self.observe("remove_liquidity", caller, self.try_remove_liquidity(caller, share_amount))
    }

    fn try_add_liquidity(
        &self,
        caller: &AccountId,
        amount_a: Amount,
        amount_b: Amount,
    ) -> Result<Amount> {
        let _entered = self.guard.enter("add_liquidity")?;
        self.reject_self(caller, "deposit")?;

        let quote = self.quote_add_liquidity(amount_a, amount_b)?;
        tracing::debug!(pool = %self.id, provider = %caller, amount_a, amount_b, shares = quote.shares, "Deposit quoted");

        let mut unit = AtomicUnit::new(self.id.clone());
        let pulled = unit
            .pull(&self.asset_a, caller, amount_a)
            .and_then(|()| unit.pull(&self.asset_b, caller, amount_b));
        if let Err(err) = pulled {
            return Err(unit.abort(err));
        }

        {
            let mut reserves = self.reserves.lock();
            if quote.shares > 0 {
                if let Err(err) = self.shares.mint(&self.id, caller, quote.shares) {
                    drop(reserves);
                    return Err(unit.abort(err));
                }
            }
            *reserves = Reserves {
                a: quote.state_after.reserve_a,
                b: quote.state_after.reserve_b,
            };
        }
        unit.commit();

        if quote.shares == 0 {
            tracing::warn!(pool = %self.id, provider = %caller, amount_a, amount_b, "Deposit too small to mint shares");
        }
        self.record(LiquidityEventType::Added, caller, amount_a, amount_b, quote.shares, quote.state_after);
        self.metrics.record_deposit(quote.shares, &quote.state_after);
        tracing::info!(
            pool = %self.id,
            provider = %caller,
            amount_a,
            amount_b,
            shares = quote.shares,
            reserve_a = quote.state_after.reserve_a,
            reserve_b = quote.state_after.reserve_b,
            total_supply = quote.state_after.total_supply,
            "Liquidity added"
        );
        Ok(quote.shares)
    }

    fn try_remove_liquidity(
        &self,
        caller: &AccountId,
        share_amount: Amount,
    ) -> Result<(Amount, Amount)> {
        let _entered = self.guard.enter("remove_liquidity")?;
        self.reject_self(caller, "withdraw")?;

        if share_amount == 0 {
            return Err(Error::InvalidAmount(
                "share amount must be positive".to_string(),
            ));
        }
        let held = self.shares.balance_of(caller);
        if held < share_amount {
            return Err(Error::InsufficientBalance {
                holder: caller.to_string(),
                available: held,
                required: share_amount,
            });
        }

        // Effects first: burn and debit reserves before any external call.
        let (quote, burn) = {
            let mut reserves = self.reserves.lock();
            let supply_before = self.shares.total_supply();
            let quote = math::quote_withdrawal(
                PoolState {
                    reserve_a: reserves.a,
                    reserve_b: reserves.b,
                    total_supply: supply_before,
                },
                share_amount,
            )?;
            let burn = self.shares.burn_recorded(&self.id, caller, share_amount)?;
            *reserves = Reserves {
                a: quote.state_after.reserve_a,
                b: quote.state_after.reserve_b,
            };
            (quote, burn)
        };
        tracing::debug!(pool = %self.id, provider = %caller, share_amount, amount_a = quote.amount_a, amount_b = quote.amount_b, "Withdrawal quoted");

        let mut unit = AtomicUnit::new(self.id.clone());
        let pushed = unit
            .push(&self.asset_a, caller, quote.amount_a)
            .and_then(|()| unit.push(&self.asset_b, caller, quote.amount_b));
        if let Err(err) = pushed {
            let err = unit.abort(err);
            self.undo_withdrawal(&quote, &burn)?;
            return Err(err);
        }
        unit.commit();

        self.record(
            LiquidityEventType::Removed,
            caller,
            quote.amount_a,
            quote.amount_b,
            share_amount,
            quote.state_after,
        );
        self.metrics.record_withdrawal(share_amount, &quote.state_after);
        tracing::info!(
            pool = %self.id,
            provider = %caller,
            share_amount,
            amount_a = quote.amount_a,
            amount_b = quote.amount_b,
            reserve_a = quote.state_after.reserve_a,
            reserve_b = quote.state_after.reserve_b,
            total_supply = quote.state_after.total_supply,
            "Liquidity removed"
        );
        Ok((quote.amount_a, quote.amount_b))
    }

    /// Credit back the reserves and the burned shares of a failed withdrawal
    fn undo_withdrawal(&self, quote: &WithdrawalQuote, burn: &LedgerEvent) -> Result<()> {
        let mut reserves = self.reserves.lock();
        let a = reserves
            .a
            .checked_add(quote.amount_a)
            .ok_or(Error::ArithmeticOverflow("reserve A overflow"))?;
        let b = reserves
            .b
            .checked_add(quote.amount_b)
            .ok_or(Error::ArithmeticOverflow("reserve B overflow"))?;
        self.shares.revert_burn(burn)?;
        *reserves = Reserves { a, b };
        Ok(())
    }

    fn record(
        &self,
        event_type: LiquidityEventType,
        provider: &AccountId,
        amount_a: Amount,
        amount_b: Amount,
        shares: Amount,
        state_after: PoolState,
    ) {
        self.journal.lock().push(LiquidityEvent {
            event_id: Uuid::now_v7(),
            event_type,
            provider: provider.clone(),
            amount_a,
            amount_b,
            shares,
            state_after,
            timestamp_nanos: now_nanos(),
        });
    }

    // Transfers between the pool and itself move nothing on the asset ledgers.
    fn reject_self(&self, caller: &AccountId, action: &str) -> Result<()> {
        if caller == &self.id {
            return Err(Error::Unauthorized(format!(
                "pool {} may not {} on its own behalf",
                self.id, action
            )));
        }
        Ok(())
    }

    fn observe<T>(&self, operation: &'static str, caller: &AccountId, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.metrics.record_rejected(err.kind());
            tracing::warn!(
                pool = %self.id,
                caller = %caller,
                operation,
                kind = err.kind(),
                "Operation rejected: {}",
                err
            );
        }
        result
    }

    /// Capture reserves, shares and journal in one consistent image
    pub fn snapshot(&self) -> PoolSnapshot {
        let reserves = self.reserves.lock();
        PoolSnapshot {
            pool_id: self.id.clone(),
            asset_a: self.asset_a.asset_id().clone(),
            asset_b: self.asset_b.asset_id().clone(),
            reserve_a: reserves.a,
            reserve_b: reserves.b,
            shares: self.shares.snapshot(),
            events: self.journal.lock().clone(),
        }
    }
}
