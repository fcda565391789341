//! Hub callback query parameters

use std::collections::HashMap;

use crate::error::CallbackError;

pub const PARAM_MODE: &str = "hub.mode";
pub const PARAM_TOPIC: &str = "hub.topic";
pub const PARAM_CHALLENGE: &str = "hub.challenge";
pub const PARAM_LEASE_SECONDS: &str = "hub.lease_seconds";
pub const PARAM_REASON: &str = "hub.reason";

/// A verification or denial request from the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubRequest {
    Subscribe {
        topic: String,
        challenge: String,
        lease_seconds: u64,
    },
    Unsubscribe {
        topic: String,
        challenge: String,
    },
    Denied {
        topic: String,
        reason: Option<String>,
    },
}

/// Empty values count as missing
fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

/// Label for the `hub.mode` value, for metrics and logs
pub fn mode_label(params: &HashMap<String, String>) -> &'static str {
    match param(params, PARAM_MODE) {
        Some("subscribe") => "subscribe",
        Some("unsubscribe") => "unsubscribe",
        Some("denied") => "denied",
        Some(_) => "other",
        None => "none",
    }
}

/// Decimal lease in seconds. Integers past `u64::MAX` saturate.
fn parse_lease(value: &str) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(lease) => Some(lease),
        Err(_) if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
            Some(u64::MAX)
        }
        Err(_) => None,
    }
}

impl HubRequest {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, CallbackError> {
        let mode = param(params, PARAM_MODE);
        let topic = param(params, PARAM_TOPIC);
        let challenge = param(params, PARAM_CHALLENGE);
        let lease = param(params, PARAM_LEASE_SECONDS);

        match (mode, topic, challenge, lease) {
            (Some("subscribe"), Some(topic), Some(challenge), Some(lease)) => {
                let lease_seconds = parse_lease(lease).ok_or_else(|| {
                    CallbackError::Validation(format!(
                        "{} must be a non-negative integer: {:?}",
                        PARAM_LEASE_SECONDS, lease
                    ))
                })?;
                Ok(HubRequest::Subscribe {
                    topic: topic.to_string(),
                    challenge: challenge.to_string(),
                    lease_seconds,
                })
            }
            (Some("unsubscribe"), Some(topic), Some(challenge), _) => Ok(HubRequest::Unsubscribe {
                topic: topic.to_string(),
                challenge: challenge.to_string(),
            }),
            (Some("denied"), Some(topic), _, _) => Ok(HubRequest::Denied {
                topic: topic.to_string(),
                reason: param(params, PARAM_REASON).map(str::to_string),
            }),
            _ => Err(CallbackError::Validation(
                "unsupported combination of hub parameters".to_string(),
            )),
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            HubRequest::Subscribe { topic, .. }
            | HubRequest::Unsubscribe { topic, .. }
            | HubRequest::Denied { topic, .. } => topic,
        }
    }
}
