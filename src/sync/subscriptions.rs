//! Change subscriptions for the watched collections.
//!
//! Each channel moves through
//! `Unsubscribed -> Subscribing -> Subscribed -> Unsubscribing -> Unsubscribed`.
//! A failed subscribe goes straight back to `Unsubscribed` and is not retried
//! here, and so does a channel the feed closes. Notifications are never acted on in the transport task; they are
//! forwarded as [`RefreshTask`] messages to the synchronizer's queue.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::supabase::{ChangeFeed, Collection};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    #[default]
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

/// Work item for the synchronizer's dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshTask {
    Sensors,
    Alerts,
    TemperatureLogs,
}

impl From<Collection> for RefreshTask {
    fn from(collection: Collection) -> Self {
        match collection {
            Collection::Sensors => Self::Sensors,
            Collection::Alerts => Self::Alerts,
            Collection::TemperatureLogs => Self::TemperatureLogs,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChannelStatus {
    pub collection: Collection,
    pub channel: String,
    pub state: ChannelState,
}

struct Subscription {
    collection: Collection,
    state: ChannelState,
    stop: Option<CancellationToken>,
    forwarder: Option<JoinHandle<()>>,
}

impl Subscription {
    fn new(collection: Collection) -> Self {
        Self {
            collection,
            state: ChannelState::Unsubscribed,
            stop: None,
            forwarder: None,
        }
    }

    fn transition(&mut self, next: ChannelState) {
        tracing::debug!(
            channel = self.collection.channel_name(),
            from = ?self.state,
            to = ?next,
            "Channel state change"
        );
        self.state = next;
    }

    async fn subscribe(
        &mut self,
        feed: &dyn ChangeFeed,
        queue: &mpsc::UnboundedSender<RefreshTask>,
        alive: &CancellationToken,
    ) {
        self.reap();
        if self.state != ChannelState::Unsubscribed {
            return;
        }
        self.transition(ChannelState::Subscribing);

        let mut receiver = match feed.subscribe(self.collection).await {
            Ok(receiver) => receiver,
            Err(e) => {
                tracing::warn!(
                    channel = self.collection.channel_name(),
                    error = %e,
                    "Subscribe failed"
                );
                self.transition(ChannelState::Unsubscribed);
                return;
            }
        };

        // teardown may have started while the subscribe call was in flight
        if alive.is_cancelled() {
            receiver.close();
            self.transition(ChannelState::Unsubscribed);
            return;
        }

        let stop = alive.child_token();
        let task_stop = stop.clone();
        let queue = queue.clone();
        let collection = self.collection;

        let forwarder = tokio::spawn(async move {
            loop {
                let notification = tokio::select! {
                    () = task_stop.cancelled() => break,
                    received = receiver.recv() => received,
                };
                let Some(notification) = notification else {
                    tracing::debug!(channel = collection.channel_name(), "Change feed closed");
                    break;
                };
                if task_stop.is_cancelled() {
                    break;
                }
                tracing::debug!(
                    channel = collection.channel_name(),
                    observed_at = %notification.observed_at,
                    "Change received"
                );
                if queue.send(RefreshTask::from(notification.collection)).is_err() {
                    break;
                }
            }
            receiver.close();
        });

        self.stop = Some(stop);
        self.forwarder = Some(forwarder);
        self.transition(ChannelState::Subscribed);
    }

    /// A forwarder stops on its own when the feed closes the channel. Mark
    /// such a channel `Unsubscribed` so the next subscribe reopens it.
    fn reap(&mut self) {
        let exited = self.state == ChannelState::Subscribed
            && self.forwarder.as_ref().is_some_and(JoinHandle::is_finished);
        if !exited {
            return;
        }
        tracing::warn!(channel = self.collection.channel_name(), "Change channel closed by feed");
        self.stop = None;
        self.forwarder = None;
        self.transition(ChannelState::Unsubscribed);
    }

    async fn unsubscribe(&mut self) {
        if self.state != ChannelState::Subscribed {
            return;
        }
        self.transition(ChannelState::Unsubscribing);

        if let Some(stop) = self.stop.take() {
            stop.cancel();
        }
        if let Some(forwarder) = self.forwarder.take()
            && let Err(e) = forwarder.await
        {
            tracing::warn!(
                channel = self.collection.channel_name(),
                error = %e,
                "Forwarder ended abnormally"
            );
        }

        self.transition(ChannelState::Unsubscribed);
    }
}

/// The three channels the dashboard keeps open.
pub struct Subscriptions {
    channels: Vec<Subscription>,
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscriptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Collection::ALL.into_iter().map(Subscription::new).collect(),
        }
    }

    /// Subscribe every channel that is not already open. Failures leave the
    /// channel `Unsubscribed`; call again to retry.
    pub async fn subscribe_all(
        &mut self,
        feed: &dyn ChangeFeed,
        queue: &mpsc::UnboundedSender<RefreshTask>,
        alive: &CancellationToken,
    ) {
        for channel in &mut self.channels {
            channel.subscribe(feed, queue, alive).await;
        }
    }

    /// Close every open channel and wait for its forwarder to stop. No
    /// notification is forwarded once this returns.
    pub async fn unsubscribe_all(&mut self) {
        for channel in &mut self.channels {
            channel.unsubscribe().await;
        }
    }

    #[must_use]
    pub fn state(&mut self, collection: Collection) -> ChannelState {
        self.reap_closed();
        self.channels
            .iter()
            .find(|c| c.collection == collection)
            .map_or(ChannelState::Unsubscribed, |c| c.state)
    }

    #[must_use]
    pub fn statuses(&mut self) -> Vec<ChannelStatus> {
        self.reap_closed();
        self.channels
            .iter()
            .map(|c| ChannelStatus {
                collection: c.collection,
                channel: c.collection.channel_name().to_string(),
                state: c.state,
            })
            .collect()
    }

    fn reap_closed(&mut self) {
        for channel in &mut self.channels {
            channel.reap();
        }
    }
}
