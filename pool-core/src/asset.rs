//! Fungible asset ledgers
//!
//! [`AssetLedger`] is the contract the pool requires from the external
//! ledgers holding asset A and asset B: balance queries, allowances,
//! all-or-nothing transfers and transfer-on-behalf. `revert` undoes a
//! transfer issued earlier in the same atomic unit, which is how the pool
//! rolls back a half-finished deposit or withdrawal across two independent
//! ledgers.
//!
//! [`TokenLedger`] is an in-memory implementation with an owner-only mint,
//! used to seed balances.

use crate::{
    error::{Error, Result},
    types::{AccountId, Amount, EventType, LedgerEvent, TokenMetadata, TransferReceipt},
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contract required from an external fungible-asset ledger
pub trait AssetLedger: Send + Sync {
    /// Identity of this ledger
    fn asset_id(&self) -> &AccountId;

    /// Sum of all balances
    fn total_supply(&self) -> Amount;

    /// Balance of `holder` (zero when absent)
    fn balance_of(&self, holder: &AccountId) -> Amount;

    /// Remaining amount `spender` may move out of `owner`'s balance
    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount;

    /// Set the allowance of `spender` over `owner`'s balance
    fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Amount) -> Result<()>;

    /// Move `amount` from `from` (the caller) to `to`
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount)
        -> Result<TransferReceipt>;

    /// Move `amount` from `owner` to `to`, consuming `spender`'s allowance
    fn transfer_from(
        &self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt>;

    /// Undo a transfer previously returned by this ledger
    fn revert(&self, receipt: &TransferReceipt) -> Result<()>;
}

/// Balances, allowances and journal shared by the in-memory ledgers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Book {
    balances: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
    total_supply: Amount,
    journal: Vec<LedgerEvent>,
}

impl Book {
    pub(crate) fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub(crate) fn balance_of(&self, holder: &AccountId) -> Amount {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub(crate) fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn events(&self) -> &[LedgerEvent] {
        &self.journal
    }

    pub(crate) fn holders(&self) -> usize {
        self.balances.len()
    }

    /// Zero balances are removed so that absent and zero are the same state
    fn set_balance(&mut self, holder: &AccountId, amount: Amount) {
        if amount == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(holder.clone(), amount);
        }
    }

    fn set_allowance(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        if amount == 0 {
            if let Some(spenders) = self.allowances.get_mut(owner) {
                spenders.remove(spender);
                if spenders.is_empty() {
                    self.allowances.remove(owner);
                }
            }
        } else {
            self.allowances
                .entry(owner.clone())
                .or_default()
                .insert(spender.clone(), amount);
        }
    }

    fn record(&mut self, event: LedgerEvent) -> uuid::Uuid {
        let event_id = event.event_id;
        self.journal.push(event);
        event_id
    }

    pub(crate) fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.set_allowance(owner, spender, amount);
        self.record(LedgerEvent::new(
            EventType::Approval,
            Some(owner.clone()),
            Some(spender.clone()),
            amount,
        ));
    }

    pub(crate) fn mint(&mut self, to: &AccountId, amount: Amount) -> Result<LedgerEvent> {
        let total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("total supply overflow"))?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("balance overflow"))?;

        self.total_supply = total_supply;
        self.set_balance(to, balance);

        let event = LedgerEvent::new(EventType::Mint, None, Some(to.clone()), amount);
        self.record(event.clone());
        Ok(event)
    }

    pub(crate) fn burn(&mut self, from: &AccountId, amount: Amount) -> Result<LedgerEvent> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(Error::InsufficientBalance {
                holder: from.to_string(),
                available,
                required: amount,
            });
        }

        self.total_supply -= amount;
        self.set_balance(from, available - amount);

        let event = LedgerEvent::new(EventType::Burn, Some(from.clone()), None, amount);
        self.record(event.clone());
        Ok(event)
    }

    pub(crate) fn transfer(
        &mut self,
        asset: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        self.move_balance(from, to, amount)?;
        let event_id = self.record(LedgerEvent::new(
            EventType::Transfer,
            Some(from.clone()),
            Some(to.clone()),
            amount,
        ));

        Ok(TransferReceipt {
            event_id,
            asset: asset.clone(),
            spender: None,
            from: from.clone(),
            to: to.clone(),
            amount,
        })
    }

    pub(crate) fn transfer_from(
        &mut self,
        asset: &AccountId,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        let allowed = self.allowance(owner, spender);
        if allowed < amount {
            return Err(Error::InsufficientAllowance {
                owner: owner.to_string(),
                spender: spender.to_string(),
                available: allowed,
                required: amount,
            });
        }

        let mut receipt = self.transfer(asset, owner, to, amount)?;
        self.set_allowance(owner, spender, allowed - amount);
        receipt.spender = Some(spender.clone());
        Ok(receipt)
    }

    pub(crate) fn revert(&mut self, receipt: &TransferReceipt) -> Result<()> {
        let position = self
            .journal
            .iter()
            .rposition(|event| {
                event.event_id == receipt.event_id && event.event_type == EventType::Transfer
            })
            .ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "no transfer {} to revert on {}",
                    receipt.event_id, receipt.asset
                ))
            })?;

        self.move_balance(&receipt.to, &receipt.from, receipt.amount)?;
        if let Some(spender) = &receipt.spender {
            let allowed = self
                .allowance(&receipt.from, spender)
                .checked_add(receipt.amount)
                .ok_or(Error::ArithmeticOverflow("allowance overflow"))?;
            self.set_allowance(&receipt.from, spender, allowed);
        }
        self.journal.remove(position);
        Ok(())
    }

    fn move_balance(&mut self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(Error::InsufficientBalance {
                holder: from.to_string(),
                available: from_balance,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(Error::ArithmeticOverflow("balance overflow"))?;
        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    /// Undo a burn recorded earlier in the same atomic unit
    pub(crate) fn revert_burn(&mut self, burn: &LedgerEvent) -> Result<()> {
        let holder = match (&burn.event_type, &burn.from) {
            (EventType::Burn, Some(holder)) => holder,
            _ => {
                return Err(Error::InvariantViolation(format!(
                    "event {} is not a burn",
                    burn.event_id
                )))
            }
        };
        let position = self
            .journal
            .iter()
            .rposition(|event| event.event_id == burn.event_id)
            .ok_or_else(|| {
                Error::InvariantViolation(format!("no burn {} to revert", burn.event_id))
            })?;

        let total_supply = self
            .total_supply
            .checked_add(burn.amount)
            .ok_or(Error::ArithmeticOverflow("total supply overflow"))?;
        let balance = self
            .balance_of(holder)
            .checked_add(burn.amount)
            .ok_or(Error::ArithmeticOverflow("balance overflow"))?;

        self.total_supply = total_supply;
        self.set_balance(holder, balance);
        self.journal.remove(position);
        Ok(())
    }

    pub(crate) fn check_supply_invariant(&self) -> Result<()> {
        let mut sum: Amount = 0;
        for balance in self.balances.values() {
            sum = sum
                .checked_add(*balance)
                .ok_or(Error::ArithmeticOverflow("balance sum overflow"))?;
        }
        if sum != self.total_supply {
            return Err(Error::InvariantViolation(format!(
                "total supply {} != sum of balances {}",
                self.total_supply, sum
            )));
        }
        Ok(())
    }
}

/// In-memory fungible token with an owner-only mint
#[derive(Debug)]
pub struct TokenLedger {
    id: AccountId,
    owner: AccountId,
    metadata: TokenMetadata,
    book: RwLock<Book>,
}

impl TokenLedger {
    /// Create an empty token; `owner` is the only identity allowed to mint
    pub fn new(id: AccountId, owner: AccountId, metadata: TokenMetadata) -> Self {
        Self {
            id,
            owner,
            metadata,
            book: RwLock::new(Book::default()),
        }
    }

    /// Token metadata
    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    /// Issue new units to `to`
    pub fn mint(&self, caller: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        if caller != &self.owner {
            return Err(Error::Unauthorized(format!(
                "{} may not mint {}",
                caller, self.id
            )));
        }
        if amount == 0 {
            return Err(Error::InvalidAmount("mint amount must be positive".to_string()));
        }
        self.book.write().mint(to, amount)?;
        Ok(())
    }

    /// Journal of all committed events
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.book.read().events().to_vec()
    }

    /// Verify that the supply equals the sum of balances
    pub fn check_supply_invariant(&self) -> Result<()> {
        self.book.read().check_supply_invariant()
    }
}

impl AssetLedger for TokenLedger {
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
