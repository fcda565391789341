//! Subscription lifecycle rules
//!
//! Each transition declares the set of states it may start from. The store
//! applies a transition with a single conditional write that re-checks that
//! set against the persisted state, so a stale snapshot or a concurrent
//! transition surfaces as a conflict instead of a lost update.

use chrono::{DateTime, Duration, Utc};

use crate::SubscriptionState;
use crate::SubscriptionState::*;

/// State a new subscription is created in.
pub const INITIAL_STATE: SubscriptionState = Subscribing;

/// Transitions driven by operators and hub callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Hub verified a subscribe intent. Re-entry from `Subscribed` renews the lease.
    Confirm,
    /// Hub denied the subscription. Idempotent.
    Deny,
    /// Operator intends to unsubscribe; set before calling the hub.
    BeginUnsubscribe,
    /// Hub verified an unsubscribe intent.
    ConfirmUnsubscribe,
}

impl Transition {
    pub fn target(&self) -> SubscriptionState {
        match self {
            Transition::Confirm => Subscribed,
            Transition::Deny => Denied,
            Transition::BeginUnsubscribe => Unsubscribing,
            Transition::ConfirmUnsubscribe => Unsubscribed,
        }
    }

    pub fn sources(&self) -> &'static [SubscriptionState] {
        match self {
            Transition::Confirm => &[Subscribing, Subscribed],
            Transition::Deny => &[Subscribing, Subscribed, Denied],
            Transition::BeginUnsubscribe => &[Subscribed, Unsubscribing, Unsubscribed],
            Transition::ConfirmUnsubscribe => &[Unsubscribing, Unsubscribed],
        }
    }

    pub fn allows_from(&self, state: SubscriptionState) -> bool {
        self.sources().contains(&state)
    }
}

/// Expiry written alongside a transition into `new_state`.
///
/// Only a subscribed state with a lease has an expiry; every other write clears it.
/// A lease that runs past the last representable instant saturates to it.
pub fn expiry_for(
    new_state: SubscriptionState,
    lease_seconds: Option<u64>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (new_state, lease_seconds) {
        (Subscribed, Some(lease)) => {
            let lease = i64::try_from(lease).unwrap_or(i64::MAX);
            let expiry = Duration::try_seconds(lease)
                .and_then(|d| now.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            Some(expiry)
        }
        _ => None,
    }
}
