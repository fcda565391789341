//! Subscription Store
//!
//! Durable record of subscriptions keyed by opaque id, plus an append-only
//! log of delivered content.
//!
//! Every state change goes through [`SubscriptionStore::change_state`], a
//! single conditional write that re-checks the persisted state against the
//! allowed source states. Reads are unsynchronized snapshots.

use async_trait::async_trait;
use tracing::info;
use ws_common::{ContentUpdate, Subscription, SubscriptionState, Transition};

pub mod error;
pub mod sqlite;

pub use error::StoreError;
pub use sqlite::SqliteSubscriptionStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Create tables and indexes if they do not exist
    async fn init_schema(&self) -> Result<()>;

    /// Persist a new subscription in the initial state with a fresh id
    async fn create(&self, hub_url: &str, topic_url: &str) -> Result<Subscription>;

    async fn read(&self, id: &str) -> Result<Subscription>;

    /// All subscriptions for the pair; there may be several
    async fn find_by_hub_and_topic(&self, hub_url: &str, topic_url: &str)
        -> Result<Vec<Subscription>>;

    /// Move `subscription` to `new_state` iff the persisted state is in `allowed`.
    ///
    /// On success the snapshot is updated in place. On
    /// [`StoreError::StateConflict`] it is left untouched and the caller
    /// should re-read before deciding what to do.
    async fn change_state(
        &self,
        subscription: &mut Subscription,
        new_state: SubscriptionState,
        allowed: &[SubscriptionState],
        lease_seconds: Option<u64>,
    ) -> Result<()>;

    /// Unconditional append; state checks belong to the caller
    async fn append_update(
        &self,
        subscription: &Subscription,
        content_type: &str,
        content: &[u8],
    ) -> Result<ContentUpdate>;

    /// Updates for a subscription in arrival order
    async fn list_updates(&self, subscription_id: &str) -> Result<Vec<ContentUpdate>>;

    async fn apply(
        &self,
        subscription: &mut Subscription,
        transition: Transition,
        lease_seconds: Option<u64>,
    ) -> Result<()> {
        self.change_state(subscription, transition.target(), transition.sources(), lease_seconds)
            .await
    }

    async fn confirm_subscription(
        &self,
        subscription: &mut Subscription,
        lease_seconds: Option<u64>,
    ) -> Result<()> {
        self.apply(subscription, Transition::Confirm, lease_seconds).await
    }

    /// `reason` is logged and otherwise discarded.
    async fn deny_subscription(
        &self,
        subscription: &mut Subscription,
        reason: Option<&str>,
    ) -> Result<()> {
        self.apply(subscription, Transition::Deny, None).await?;
        info!(
            subscription_id = %subscription.id,
            reason = reason.unwrap_or(""),
            "Subscription denied by hub"
        );
        Ok(())
    }

    async fn begin_unsubscribe(&self, subscription: &mut Subscription) -> Result<()> {
        self.apply(subscription, Transition::BeginUnsubscribe, None).await
    }

    async fn confirm_unsubscription(&self, subscription: &mut Subscription) -> Result<()> {
        self.apply(subscription, Transition::ConfirmUnsubscribe, None).await
    }
}
