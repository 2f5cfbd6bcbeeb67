//! End-to-end pool scenarios
//!
//! Covers the provider walkthroughs plus collaborators that misbehave:
//! ledgers that reject a transfer halfway through an operation, and a
//! ledger that calls back into the pool while it is being used.

use pool_core::{
    AccountId, Amount, AssetLedger, Config, Error, LiquidityEventType, PoolStatus, ReservePool,
    Result, TokenLedger, TokenMetadata, TransferReceipt,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

fn metadata(symbol: &str) -> TokenMetadata {
    TokenMetadata {
        name: format!("{} Token", symbol),
        symbol: symbol.to_string(),
        decimals: 18,
    }
}

fn admin() -> AccountId {
    AccountId::new("admin")
}

/// Asset ledger whose transfers can be switched to fail
struct FaultyAsset {
    inner: TokenLedger,
    fail_pulls: AtomicBool,
    fail_pushes: AtomicBool,
}

impl FaultyAsset {
    fn new(id: &str) -> Self {
        Self {
            inner: TokenLedger::new(AccountId::new(id), admin(), metadata(id)),
            fail_pulls: AtomicBool::new(false),
            fail_pushes: AtomicBool::new(false),
        }
    }
}

impl AssetLedger for FaultyAsset {
    fn asset_id(&self) -> &AccountId {
        self.inner.asset_id()
    }

    fn total_supply(&self) -> Amount {
        self.inner.total_supply()
    }

    fn balance_of(&self, holder: &AccountId) -> Amount {
        self.inner.balance_of(holder)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.inner.allowance(owner, spender)
    }

    fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Amount) -> Result<()> {
        self.inner.approve(owner, spender, amount)
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<TransferReceipt> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(Error::TransferFailed(format!("{} is frozen", self.asset_id())));
        }
        self.inner.transfer(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        if self.fail_pulls.load(Ordering::SeqCst) {
            return Err(Error::TransferFailed(format!("{} is frozen", self.asset_id())));
        }
        self.inner.transfer_from(spender, owner, to, amount)
    }

    fn revert(&self, receipt: &TransferReceipt) -> Result<()> {
        self.inner.revert(receipt)
    }
}

/// Asset ledger that calls back into the pool on every transfer
struct ReentrantAsset {
    inner: TokenLedger,
    pool: OnceLock<Weak<ReservePool>>,
    attacker: AccountId,
    armed: AtomicBool,
    outcomes: Mutex<Vec<&'static str>>,
}

impl ReentrantAsset {
    fn new(id: &str, attacker: AccountId) -> Self {
        Self {
            inner: TokenLedger::new(AccountId::new(id), admin(), metadata(id)),
            pool: OnceLock::new(),
            attacker,
            armed: AtomicBool::new(false),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    fn attack(&self) {
        if !self.armed.load(Ordering::SeqCst) {
            return;
        }
        let Some(pool) = self.pool.get().and_then(Weak::upgrade) else {
            return;
        };

        // Reads stay available and consistent mid-call.
        let state = pool.state();
        assert!(pool.lp_token().check_supply_invariant().is_ok());
        assert_eq!(state.total_supply, pool.lp_token().total_supply());

        let add = pool.add_liquidity(&self.attacker, 1, 1).map(|_| ());
        let remove = pool.remove_liquidity(&self.attacker, 1).map(|_| ());
        let mut outcomes = self.outcomes.lock().unwrap();
        for outcome in [add, remove] {
            outcomes.push(match outcome {
                Ok(()) => "ok",
                Err(e) => e.kind(),
            });
        }
    }
}

impl AssetLedger for ReentrantAsset {
    fn asset_id(&self) -> &AccountId {
        self.inner.asset_id()
    }

    fn total_supply(&self) -> Amount {
        self.inner.total_supply()
    }

    fn balance_of(&self, holder: &AccountId) -> Amount {
        self.inner.balance_of(holder)
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.inner.allowance(owner, spender)
    }

    fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Amount) -> Result<()> {
        self.inner.approve(owner, spender, amount)
    }

    fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<TransferReceipt> {
        self.attack();
        self.inner.transfer(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<TransferReceipt> {
        self.attack();
        self.inner.transfer_from(spender, owner, to, amount)
    }

    fn revert(&self, receipt: &TransferReceipt) -> Result<()> {
        self.inner.revert(receipt)
    }
}

struct Market {
    token_a: Arc<TokenLedger>,
    token_b: Arc<TokenLedger>,
    pool: ReservePool,
}

impl Market {
    fn new() -> Self {
        let token_a = Arc::new(TokenLedger::new("token-a".into(), admin(), metadata("TA")));
        let token_b = Arc::new(TokenLedger::new("token-b".into(), admin(), metadata("TB")));
        let pool = ReservePool::new(
            "pool".into(),
            token_a.clone(),
            token_b.clone(),
            &Config::default(),
        )
        .unwrap();
        Self {
            token_a,
            token_b,
            pool,
        }
    }

    fn provider(&self, name: &str, amount_a: Amount, amount_b: Amount) -> AccountId {
        let holder = AccountId::new(name);
        self.token_a.mint(&admin(), &holder, amount_a).unwrap();
        self.token_b.mint(&admin(), &holder, amount_b).unwrap();
        self.token_a.approve(&holder, self.pool.id(), amount_a).unwrap();
        self.token_b.approve(&holder, self.pool.id(), amount_b).unwrap();
        holder
    }

    fn assert_consistent(&self) {
        self.pool.check_reserves().unwrap();
        self.pool.lp_token().check_supply_invariant().unwrap();
        self.token_a.check_supply_invariant().unwrap();
        self.token_b.check_supply_invariant().unwrap();
    }
}

#[test]
fn test_two_providers_walkthrough() {
    let market = Market::new();
    let alice = market.provider("alice", 10, 40);
    let bob = market.provider("bob", 5, 10);
    let lp = market.pool.lp_token();

    assert_eq!(market.pool.add_liquidity(&alice, 10, 40).unwrap(), 20);
    assert_eq!(market.pool.reserves(), (10, 40));
    market.assert_consistent();

    assert_eq!(market.pool.add_liquidity(&bob, 5, 10).unwrap(), 7);
    assert_eq!(market.pool.reserves(), (15, 50));
    assert_eq!(lp.total_supply(), 27);
    assert_eq!(lp.balance_of(&bob), 7);
    market.assert_consistent();

    // Bob's rounding loss stays in the pool for the remaining holder.
    assert_eq!(market.pool.remove_liquidity(&bob, 7).unwrap(), (3, 12));
    assert_eq!(market.pool.remove_liquidity(&alice, 20).unwrap(), (12, 38));
    assert_eq!(market.pool.status(), PoolStatus::Empty);
    assert_eq!(market.pool.reserves(), (0, 0));
    market.assert_consistent();

    let kinds: Vec<_> = market.pool.events().iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            LiquidityEventType::Added,
            LiquidityEventType::Added,
            LiquidityEventType::Removed,
            LiquidityEventType::Removed,
        ]
    );
}

#[test]
fn test_sole_provider_withdraws_everything() {
    let market = Market::new();
    let carol = market.provider("carol", 1_000_000, 2_500);

    let shares = market.pool.add_liquidity(&carol, 1_000_000, 2_500).unwrap();
    assert_eq!(shares, 50_000);

    assert_eq!(
        market.pool.remove_liquidity(&carol, shares).unwrap(),
        (1_000_000, 2_500)
    );
    assert_eq!(market.pool.status(), PoolStatus::Empty);
    assert_eq!(market.token_a.balance_of(&carol), 1_000_000);
    assert_eq!(market.token_b.balance_of(&carol), 2_500);
    assert_eq!(market.pool.lp_token().holder_count(), 0);
    market.assert_consistent();

    // An emptied pool starts over from the geometric mean.
    let dave = market.provider("dave", 9, 4);
    assert_eq!(market.pool.add_liquidity(&dave, 9, 4).unwrap(), 6);
}

#[test]
fn test_tiny_deposit_mints_nothing_but_is_kept() {
    let market = Market::new();
    let whale = market.provider("whale", 200, 101);
    let minnow = market.provider("minnow", 1, 1);

    assert_eq!(market.pool.add_liquidity(&whale, 100, 100).unwrap(), 100);
    // A lopsided deposit lifts a share above one unit of each asset.
    assert_eq!(market.pool.add_liquidity(&whale, 100, 1).unwrap(), 34);
    let before = market.pool.state();
    assert_eq!((before.reserve_a, before.reserve_b, before.total_supply), (200, 101, 134));

    // 134 * (1 * 102 + 1 * 201) / (200 * 102 + 101 * 201) rounds to zero.
    let minted = market.pool.add_liquidity(&minnow, 1, 1).unwrap();
    assert_eq!(minted, 0);
    assert_eq!(market.pool.reserves(), (201, 102));
    assert_eq!(market.pool.state().total_supply, 134);
    assert_eq!(market.pool.lp_token().balance_of(&minnow), 0);
    market.assert_consistent();
}

#[test]
fn test_outsiders_cannot_mint_or_burn_shares() {
    let market = Market::new();
    let alice = market.provider("alice", 10, 40);
    market.pool.add_liquidity(&alice, 10, 40).unwrap();
    let lp = market.pool.lp_token();
    let before = market.pool.state();

    assert!(matches!(lp.mint(&alice, &alice, 1_000), Err(Error::Unauthorized(_))));
    assert!(matches!(lp.burn(&alice, &alice, 20), Err(Error::Unauthorized(_))));
    assert!(matches!(
        lp.mint(market.pool.asset_a().asset_id(), &alice, 1),
        Err(Error::Unauthorized(_))
    ));

    assert_eq!(market.pool.state(), before);
    assert_eq!(lp.balance_of(&alice), 20);
    market.assert_consistent();
}

#[test]
fn test_shares_are_transferable() {
    let market = Market::new();
    let alice = market.provider("alice", 10, 40);
    let erin = AccountId::new("erin");
    market.pool.add_liquidity(&alice, 10, 40).unwrap();

    let lp = market.pool.lp_token();
    lp.transfer(&alice, &erin, 10).unwrap();
    assert_eq!(market.pool.remove_liquidity(&erin, 10).unwrap(), (5, 20));
    assert!(matches!(
        market.pool.remove_liquidity(&erin, 1),
        Err(Error::InsufficientBalance { .. })
    ));
    market.assert_consistent();
}

#[test]
fn test_failed_pull_leaves_no_partial_state() {
    let token_a = Arc::new(TokenLedger::new("token-a".into(), admin(), metadata("TA")));
    let token_b = Arc::new(FaultyAsset::new("token-b"));
    let pool = ReservePool::new(
        "pool".into(),
        token_a.clone(),
        token_b.clone(),
        &Config::default(),
    )
    .unwrap();

    let alice = AccountId::new("alice");
    token_a.mint(&admin(), &alice, 100).unwrap();
    token_b.inner.mint(&admin(), &alice, 100).unwrap();
    token_a.approve(&alice, pool.id(), 100).unwrap();
    token_b.approve(&alice, pool.id(), 100).unwrap();
    let journal_len = token_a.events().len();

    token_b.fail_pulls.store(true, Ordering::SeqCst);
    let err = pool.add_liquidity(&alice, 10, 40).unwrap_err();
    assert!(matches!(err, Error::TransferFailed(_)));

    assert_eq!(token_a.balance_of(&alice), 100);
    assert_eq!(token_a.balance_of(pool.id()), 0);
    assert_eq!(token_a.allowance(&alice, pool.id()), 100);
    assert_eq!(token_a.events().len(), journal_len);
    assert_eq!(pool.status(), PoolStatus::Empty);
    assert!(pool.events().is_empty());
    assert_eq!(
        pool.metrics()
            .rejected_total
            .with_label_values(&["transfer_failed"])
            .get(),
        1
    );
    pool.check_reserves().unwrap();

    token_b.fail_pulls.store(false, Ordering::SeqCst);
    assert_eq!(pool.add_liquidity(&alice, 10, 40).unwrap(), 20);
}

#[test]
fn test_failed_push_restores_shares_and_reserves() {
    let token_a = Arc::new(TokenLedger::new("token-a".into(), admin(), metadata("TA")));
    let token_b = Arc::new(FaultyAsset::new("token-b"));
    let pool = ReservePool::new(
        "pool".into(),
        token_a.clone(),
        token_b.clone(),
        &Config::default(),
    )
    .unwrap();

    let alice = AccountId::new("alice");
    token_a.mint(&admin(), &alice, 10).unwrap();
    token_b.inner.mint(&admin(), &alice, 40).unwrap();
    token_a.approve(&alice, pool.id(), 10).unwrap();
    token_b.approve(&alice, pool.id(), 40).unwrap();
    pool.add_liquidity(&alice, 10, 40).unwrap();

    let lp = pool.lp_token();
    let state = pool.state();
    let share_journal = lp.events().len();

    token_b.fail_pushes.store(true, Ordering::SeqCst);
    let err = pool.remove_liquidity(&alice, 10).unwrap_err();
    assert!(matches!(err, Error::TransferFailed(_)));

    assert_eq!(pool.state(), state);
    assert_eq!(lp.balance_of(&alice), 20);
    assert_eq!(lp.events().len(), share_journal);
    assert_eq!(token_a.balance_of(&alice), 0);
    assert_eq!(pool.events().len(), 1);
    lp.check_supply_invariant().unwrap();
    pool.check_reserves().unwrap();

    token_b.fail_pushes.store(false, Ordering::SeqCst);
    assert_eq!(pool.remove_liquidity(&alice, 20).unwrap(), (10, 40));
    assert_eq!(pool.status(), PoolStatus::Empty);
}

#[test]
fn test_reentrant_collaborator_is_rejected() {
    let mallory = AccountId::new("mallory");
    let token_a = Arc::new(TokenLedger::new("token-a".into(), admin(), metadata("TA")));
    let token_b = Arc::new(ReentrantAsset::new("token-b", mallory.clone()));
    let pool = Arc::new(
        ReservePool::new(
            "pool".into(),
            token_a.clone(),
            token_b.clone(),
            &Config::default(),
        )
        .unwrap(),
    );
    assert!(token_b.pool.set(Arc::downgrade(&pool)).is_ok());

    let alice = AccountId::new("alice");
    for holder in [&alice, &mallory] {
        token_a.mint(&admin(), holder, 100).unwrap();
        token_b.inner.mint(&admin(), holder, 100).unwrap();
        token_a.approve(holder, pool.id(), 100).unwrap();
        token_b.approve(holder, pool.id(), 100).unwrap();
    }
    token_b.armed.store(true, Ordering::SeqCst);

    assert_eq!(pool.add_liquidity(&alice, 10, 40).unwrap(), 20);
    assert_eq!(pool.remove_liquidity(&alice, 20).unwrap(), (10, 40));

    let outcomes = token_b.outcomes.lock().unwrap().clone();
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|kind| *kind == "reentrant_call"));

    assert_eq!(pool.status(), PoolStatus::Empty);
    assert_eq!(token_a.balance_of(&mallory), 100);
    assert_eq!(token_b.balance_of(&mallory), 100);
    assert_eq!(token_b.balance_of(&alice), 100);
    pool.check_reserves().unwrap();
}

#[test]
fn test_pool_requires_distinct_assets() {
    let token = Arc::new(TokenLedger::new("token".into(), admin(), metadata("TK")));
    let err = ReservePool::new("pool".into(), token.clone(), token, &Config::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAsset(_)));
}
