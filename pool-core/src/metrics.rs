//! Metrics collection for observability
//!
//! Each pool owns a private Prometheus registry so several pools can live in
//! one process.
//!
//! # Metrics
//!
//! - `pool_deposits_total` - Committed deposits
//! - `pool_withdrawals_total` - Committed withdrawals
//! - `pool_rejected_total{kind}` - Rejected operations by error kind
//! - `pool_shares_minted_total` - Shares issued
//! - `pool_shares_burned_total` - Shares destroyed
//! - `pool_reserve_a` / `pool_reserve_b` - Current reserves
//! - `pool_total_supply` - Outstanding shares

use crate::types::{Amount, PoolState};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed deposits
    pub deposits_total: IntCounter,

    /// Committed withdrawals
    pub withdrawals_total: IntCounter,

    /// Rejected operations, labelled by error kind
    pub rejected_total: IntCounterVec,

    /// Shares issued
    pub shares_minted: IntCounter,

    /// Shares destroyed
    pub shares_burned: IntCounter,

    /// Reserve of asset A
    pub reserve_a: IntGauge,

    /// Reserve of asset B
    pub reserve_b: IntGauge,

    /// Outstanding shares
    pub total_supply: IntGauge,

    registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("deposits_total", &self.deposits_total.get())
            .field("withdrawals_total", &self.withdrawals_total.get())
            .field("total_supply", &self.total_supply.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let deposits_total = IntCounter::new("pool_deposits_total", "Committed deposits")?;
        registry.register(Box::new(deposits_total.clone()))?;

        let withdrawals_total =
            IntCounter::new("pool_withdrawals_total", "Committed withdrawals")?;
        registry.register(Box::new(withdrawals_total.clone()))?;

        let rejected_total = IntCounterVec::new(
            Opts::new("pool_rejected_total", "Rejected operations by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejected_total.clone()))?;

        let shares_minted = IntCounter::new("pool_shares_minted_total", "Shares issued")?;
        registry.register(Box::new(shares_minted.clone()))?;

        let shares_burned = IntCounter::new("pool_shares_burned_total", "Shares destroyed")?;
        registry.register(Box::new(shares_burned.clone()))?;

        let reserve_a = IntGauge::new("pool_reserve_a", "Reserve of asset A")?;
        registry.register(Box::new(reserve_a.clone()))?;

        let reserve_b = IntGauge::new("pool_reserve_b", "Reserve of asset B")?;
        registry.register(Box::new(reserve_b.clone()))?;

        let total_supply = IntGauge::new("pool_total_supply", "Outstanding shares")?;
        registry.register(Box::new(total_supply.clone()))?;

        Ok(Self {
            deposits_total,
            withdrawals_total,
            rejected_total,
            shares_minted,
            shares_burned,
            reserve_a,
            reserve_b,
            total_supply,
            registry,
        })
    }

    /// Record a committed deposit
    pub fn record_deposit(&self, shares: Amount, state: &PoolState) {
        self.deposits_total.inc();
        self.shares_minted.inc_by(saturate_u64(shares));
        self.update_state(state);
    }

    /// Record a committed withdrawal
    pub fn record_withdrawal(&self, shares: Amount, state: &PoolState) {
        self.withdrawals_total.inc();
        self.shares_burned.inc_by(saturate_u64(shares));
        self.update_state(state);
    }

    /// Record a rejected operation
    pub fn record_rejected(&self, kind: &str) {
        self.rejected_total.with_label_values(&[kind]).inc();
    }

    /// Update reserve and supply gauges
    pub fn update_state(&self, state: &PoolState) {
        self.reserve_a.set(saturate_i64(state.reserve_a));
        self.reserve_b.set(saturate_i64(state.reserve_b));
        self.total_supply.set(saturate_i64(state.total_supply));
    }

    /// Encode every metric in the Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

// Gauges are i64; values beyond that range are clamped.
fn saturate_i64(value: Amount) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn saturate_u64(value: Amount) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
