//! Change notification feeds.
//!
//! A feed hands out one receiver per watched collection. Dropping or closing
//! the receiver ends the subscription; producers stop once the receiver is
//! gone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{AppError, AppResult};
use crate::supabase::store::{Collection, RemoteStore};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeNotification {
    pub collection: Collection,
    pub observed_at: DateTime<Utc>,
}

impl ChangeNotification {
    #[must_use]
    pub fn now(collection: Collection) -> Self {
        Self {
            collection,
            observed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Start watching `collection`.
    ///
    /// # Errors
    ///
    /// Fails when the feed cannot establish the subscription. Callers decide
    /// whether and when to try again.
    async fn subscribe(&self, collection: Collection) -> AppResult<mpsc::Receiver<ChangeNotification>>;
}

/// Feed that detects changes by comparing collection markers on an interval.
pub struct PollingChangeFeed {
    store: Arc<dyn RemoteStore>,
    every: Duration,
}

impl PollingChangeFeed {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>, every: Duration) -> Self {
        Self { store, every }
    }
}

#[async_trait]
impl ChangeFeed for PollingChangeFeed {
    async fn subscribe(&self, collection: Collection) -> AppResult<mpsc::Receiver<ChangeNotification>> {
        let mut last = self.store.change_marker(collection).await?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let store = Arc::clone(&self.store);
        let every = self.every;

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                match store.change_marker(collection).await {
                    Ok(marker) if marker != last => {
                        last = marker;
                        // a full queue already holds a pending refresh
                        if let Err(mpsc::error::TrySendError::Closed(_)) =
                            tx.try_send(ChangeNotification::now(collection))
                        {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(
                            channel = collection.channel_name(),
                            error = %e,
                            "Change marker poll failed"
                        );
                    }
                }
            }

            tracing::debug!(channel = collection.channel_name(), "Change feed stopped");
        });

        Ok(rx)
    }
}

/// In-process feed driven by explicit [`ManualChangeFeed::publish`] calls.
#[derive(Clone)]
pub struct ManualChangeFeed {
    sender: broadcast::Sender<ChangeNotification>,
}

impl Default for ManualChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Announce a change; returns how many subscriptions were listening.
    pub fn publish(&self, collection: Collection) -> usize {
        self.sender
            .send(ChangeNotification::now(collection))
            .unwrap_or(0)
    }

    #[must_use]
    pub fn listeners(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl ChangeFeed for ManualChangeFeed {
    async fn subscribe(&self, collection: Collection) -> AppResult<mpsc::Receiver<ChangeNotification>> {
        let mut source = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    () = tx.closed() => break,
                    received = source.recv() => received,
                };
                match notification {
                    Ok(n) if n.collection == collection => {
                        if tx.send(n).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}

/// Feed that refuses every subscription. Useful when change tracking is
/// unavailable; the polling refresh still keeps the dashboard current.
pub struct DisabledChangeFeed;

#[async_trait]
impl ChangeFeed for DisabledChangeFeed {
    async fn subscribe(&self, collection: Collection) -> AppResult<mpsc::Receiver<ChangeNotification>> {
        Err(AppError::FetchFailed(format!(
            "change feed disabled for {}",
            collection.channel_name()
        )))
    }
}
