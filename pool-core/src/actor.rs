//! Actor front end for a pool
//!
//! A single task owns the pool and serves requests from its mailbox, so
//! callers on many tasks get serialized access with backpressure.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                PoolHandle (Clone)                     │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               PoolActor (Single Task)                 │
//! │      add_liquidity / remove_liquidity / state         │
//! │                       │                               │
//! │                       ▼                               │
//! │       SnapshotStore::save() on request/shutdown       │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    pool::ReservePool,
    storage::SnapshotStore,
    types::{AccountId, Amount, PoolState},
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the pool actor
#[derive(Debug)]
pub enum PoolMessage {
    /// Deposit both assets
    AddLiquidity {
        /// Depositor
        caller: AccountId,
        /// Asset A pulled from the depositor
        amount_a: Amount,
        /// Asset B pulled from the depositor
        amount_b: Amount,
        /// Shares minted
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Redeem shares
    RemoveLiquidity {
        /// Share holder
        caller: AccountId,
        /// Shares to burn
        share_amount: Amount,
        /// Amounts of A and B paid out
        response: oneshot::Sender<Result<(Amount, Amount)>>,
    },

    /// Read reserves and supply
    GetState {
        /// Current pool state
        response: oneshot::Sender<PoolState>,
    },

    /// Render pool metrics in the Prometheus text format
    RenderMetrics {
        /// Encoded metrics
        response: oneshot::Sender<Result<String>>,
    },

    /// Persist a snapshot to the configured store
    Snapshot {
        /// Outcome of the write
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes pool messages
#[derive(Debug)]
pub struct PoolActor {
    pool: Arc<ReservePool>,
    store: Option<SnapshotStore>,
    mailbox: mpsc::Receiver<PoolMessage>,
}

impl PoolActor {
    /// Create new actor
    pub fn new(
        pool: Arc<ReservePool>,
        store: Option<SnapshotStore>,
        mailbox: mpsc::Receiver<PoolMessage>,
    ) -> Self {
        Self {
            pool,
            store,
            mailbox,
        }
    }

    /// Run until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        tracing::info!(pool = %self.pool.id(), "Pool actor started");

        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                PoolMessage::Shutdown => break,
                msg => self.handle_message(msg),
            }
        }

        if let Err(e) = self.save_snapshot() {
            tracing::error!(pool = %self.pool.id(), "Failed to save snapshot on shutdown: {}", e);
        }
        tracing::info!(pool = %self.pool.id(), "Pool actor stopped");
    }

    fn handle_message(&mut self, msg: PoolMessage) {
        match msg {
            PoolMessage::AddLiquidity {
                caller,
                amount_a,
                amount_b,
                response,
            } => {
                let result = self.pool.add_liquidity(&caller, amount_a, amount_b);
                let _ = response.send(result);
            }

            PoolMessage::RemoveLiquidity {
                caller,
                share_amount,
                response,
            } => {
                let result = self.pool.remove_liquidity(&caller, share_amount);
                let _ = response.send(result);
            }

            PoolMessage::GetState { response } => {
                let _ = response.send(self.pool.state());
            }

            PoolMessage::RenderMetrics { response } => {
                let _ = response.send(self.pool.metrics().render().map_err(Error::from));
            }

            PoolMessage::Snapshot { response } => {
                let _ = response.send(self.save_snapshot());
            }

            PoolMessage::Shutdown => {
                // Handled in run loop
            }
        }
    }

    fn save_snapshot(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.save(&self.pool.snapshot()),
            None => Ok(()),
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct PoolHandle {
    sender: mpsc::Sender<PoolMessage>,
}

impl PoolHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<PoolMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> PoolMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Deposit both assets on behalf of `caller`
    pub async fn add_liquidity(
        &self,
        caller: AccountId,
        amount_a: Amount,
        amount_b: Amount,
    ) -> Result<Amount> {
        self.request(|response| PoolMessage::AddLiquidity {
            caller,
            amount_a,
            amount_b,
            response,
        })
        .await?
    }

    /// Redeem shares on behalf of `caller`
    pub async fn remove_liquidity(
        &self,
        caller: AccountId,
        share_amount: Amount,
    ) -> Result<(Amount, Amount)> {
        self.request(|response| PoolMessage::RemoveLiquidity {
            caller,
            share_amount,
            response,
        })
        .await?
    }

    /// Current reserves and supply
    pub async fn state(&self) -> Result<PoolState> {
        self.request(|response| PoolMessage::GetState { response })
            .await
    }

    /// Pool metrics in the Prometheus text format, for a scrape endpoint
    pub async fn metrics_text(&self) -> Result<String> {
        self.request(|response| PoolMessage::RenderMetrics { response })
            .await?
    }

    /// Persist a snapshot now
    pub async fn snapshot(&self) -> Result<()> {
        self.request(|response| PoolMessage::Snapshot { response })
            .await?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(PoolMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the pool actor
pub fn spawn_pool_actor(
    pool: Arc<ReservePool>,
    store: Option<SnapshotStore>,
    mailbox_capacity: usize,
) -> PoolHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
    let actor = PoolActor::new(pool, store, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    PoolHandle::new(tx)
}
