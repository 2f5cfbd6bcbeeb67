//! Liquidity share ledger
//!
//! A fungible ledger whose supply only the controller (the owning pool) can
//! change. Holders move their own balances through the [`AssetLedger`]
//! surface like any other token.

use crate::{
    asset::{AssetLedger, Book},
    error::{Error, Result},
    types::{AccountId, Amount, LedgerEvent, TokenMetadata, TransferReceipt},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Liquidity share token with a single mint/burn controller
#[derive(Debug)]
pub struct ShareLedger {
    id: AccountId,
    controller: AccountId,
    metadata: TokenMetadata,
    book: RwLock<Book>,
}

/// Serializable image of a share ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLedgerSnapshot {
    /// Ledger identity
    pub id: AccountId,
    /// Mint/burn controller
    pub controller: AccountId,
    /// Token metadata
    pub metadata: TokenMetadata,
    pub(crate) book: Book,
}

impl ShareLedger {
    /// Create an empty share ledger controlled by `controller`
    pub fn new(id: AccountId, controller: AccountId, metadata: TokenMetadata) -> Self {
        Self {
            id,
            controller,
            metadata,
            book: RwLock::new(Book::default()),
        }
    }

    /// Ledger identity
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Sole account allowed to mint and burn
    pub fn controller(&self) -> &AccountId {
        &self.controller
    }

    /// Token metadata
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Number of holders with a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.book.read().holders()
    }

    /// Journal of all committed events
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.book.read().events().to_vec()
    }

    /// Issue `amount` new shares to `to`
    pub fn mint(&self, caller: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        self.authorize(caller, "mint")?;
        if amount == 0 {
            return Err(Error::InvalidAmount("mint amount must be positive".to_string()));
        }

        let event = self.book.write().mint(to, amount)?;
        tracing::info!(
            ledger = %self.id,
            event_id = %event.event_id,
            to = %to,
            amount,
            "Shares minted"
        );
        Ok(())
    }

    /// Destroy `amount` shares held by `from`
    pub fn burn(&self, caller: &AccountId, from: &AccountId, amount: Amount) -> Result<()> {
        self.burn_recorded(caller, from, amount).map(|_| ())
    }

    /// Burn and hand back the journal entry, so the caller can revert it
    pub(crate) fn burn_recorded(
        &self,
        caller: &AccountId,
        from: &AccountId,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        self.authorize(caller, "burn")?;
        if amount == 0 {
            return Err(Error::InvalidAmount("burn amount must be positive".to_string()));
        }

        let event = self.book.write().burn(from, amount)?;
        tracing::info!(
            ledger = %self.id,
            event_id = %event.event_id,
            from = %from,
            amount,
            "Shares burned"
        );
        Ok(event)
    }

    /// Re-credit a burn returned by [`ShareLedger::burn_recorded`]
    pub(crate) fn revert_burn(&self, burn: &LedgerEvent) -> Result<()> {
        tracing::warn!(
            ledger = %self.id,
            event_id = %burn.event_id,
            amount = burn.amount,
            "Reverting burn"
        );
        self.book.write().revert_burn(burn)
    }

    /// Verify that the supply equals the sum of balances
    pub fn check_supply_invariant(&self) -> Result<()> {
        self.book.read().check_supply_invariant()
    }

    /// Serializable image of the current state
    pub fn snapshot(&self) -> ShareLedgerSnapshot {
        ShareLedgerSnapshot {
            id: self.id.clone(),
            controller: self.controller.clone(),
            metadata: self.metadata.clone(),
            book: self.book.read().clone(),
        }
    }

    /// Rebuild a ledger from a snapshot, validating the supply invariant
    pub fn restore(snapshot: ShareLedgerSnapshot) -> Result<Self> {
        snapshot.book.check_supply_invariant()?;
        Ok(Self {
            id: snapshot.id,
            controller: snapshot.controller,
            metadata: snapshot.metadata,
            book: RwLock::new(snapshot.book),
        })
    }

    fn authorize(&self, caller: &AccountId, action: &str) -> Result<()> {
        if caller != &self.controller {
            tracing::warn!(ledger = %self.id, caller = %caller, action, "Rejected controller-only call");
            return Err(Error::Unauthorized(format!(
                "{} is not the controller of {} and may not {}",
                caller, self.id, action
            )));
        }
        Ok(())
    }
}

impl AssetLedger for ShareLedger {
    fn asset_id(&self) -> &AccountId {
        &self.id
    }

    fn total_supply(&self) -> Amount {
        self.book.read().total_supply()
    }

    fn balance_of(&self, holder: &AccountId) -> Amount {
        self.book.read().balance_of(holder)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.book.read().allowance(owner, spender)
    }

    fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Amount) -> Result<()> {
        self.book.write().approve(owner, spender, amount);
        Ok(())
    }

    fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        self.book.write().transfer(&self.id, from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        self.book
            .write()
            .transfer_from(&self.id, spender, owner, to, amount)
    }

    fn revert(&self, receipt: &TransferReceipt) -> Result<()> {
        if receipt.asset != self.id {
            return Err(Error::InvalidAsset(format!(
                "receipt for {} presented to {}",
                receipt.asset, self.id
            )));
        }
        self.book.write().revert(receipt)
    }
}
