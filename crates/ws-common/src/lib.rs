use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod challenge;
pub mod lifecycle;
pub mod logging;
pub mod token;

pub use challenge::ChallengeVerifier;
pub use lifecycle::Transition;

// ============================================================================
// Subscription State
// ============================================================================

/// State of a subscription as persisted by the store.
///
/// Possible lifecycles:
///
/// ```text
/// SUBSCRIBING -> SUBSCRIBED -> UNSUBSCRIBING -> UNSUBSCRIBED
/// SUBSCRIBING -> DENIED
/// SUBSCRIBING -> SUBSCRIBED -> DENIED
/// ```
///
/// `Denied` and `Unsubscribed` are terminal: subscribing again needs a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// Client intends to subscribe; the hub has not confirmed yet.
    Subscribing,
    /// Hub has confirmed the subscription.
    Subscribed,
    /// Hub has denied the subscription.
    Denied,
    /// Client intends to unsubscribe; the hub has not confirmed yet.
    Unsubscribing,
    /// Hub has confirmed the unsubscription.
    Unsubscribed,
}

impl SubscriptionState {
    pub const ALL: [SubscriptionState; 5] = [
        SubscriptionState::Subscribing,
        SubscriptionState::Subscribed,
        SubscriptionState::Denied,
        SubscriptionState::Unsubscribing,
        SubscriptionState::Unsubscribed,
    ];

    /// Persisted string form
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Subscribing => "subscribing",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Denied => "denied",
            SubscriptionState::Unsubscribing => "unsubscribing",
            SubscriptionState::Unsubscribed => "unsubscribed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionState::Denied | SubscriptionState::Unsubscribed)
    }

    /// Whether the hub may still deliver content for a subscription in this state
    pub fn accepts_content(&self) -> bool {
        matches!(self, SubscriptionState::Subscribing | SubscriptionState::Subscribed)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown subscription state: {0}")]
pub struct UnknownStateError(pub String);

impl FromStr for SubscriptionState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubscriptionState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownStateError(s.to_string()))
    }
}

// ============================================================================
// Core Records
// ============================================================================

/// A subscription to one topic at one hub.
///
/// `id`, `hub_url` and `topic_url` never change after creation. The other
/// fields are a snapshot of the persisted row and may be stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub hub_url: String,
    pub topic_url: String,
    /// Reserved for authenticated content distribution; never set.
    pub secret: Option<String>,
    pub state: SubscriptionState,
    pub last_modified: DateTime<Utc>,
    /// Set only while subscribed with a finite lease. Advisory, not enforced.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A piece of content delivered by the hub for a subscription.
///
/// Hub and topic URLs are copied from the subscription at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUpdate {
    pub subscription_id: String,
    pub hub_url: String,
    pub topic_url: String,
    pub timestamp: DateTime<Utc>,
    pub content_type: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub content: Vec<u8>,
}

impl ContentUpdate {
    pub fn content_length(&self) -> usize {
        self.content.len()
    }
}
