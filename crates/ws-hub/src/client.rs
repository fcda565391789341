//! Hub Client
//!
//! Sends subscribe and unsubscribe intents to a hub as form-encoded POSTs.
//! A `202 Accepted` means the hub queued the intent; confirmation arrives
//! later on the callback endpoint. Nothing is retried.

use metrics::counter;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, info, warn};

use ws_common::Subscription;
use ws_config::HubConfig;
use ws_store::SubscriptionStore;

use crate::error::{HubError, Result};

const MODE_SUBSCRIBE: &str = "subscribe";
const MODE_UNSUBSCRIBE: &str = "unsubscribe";

/// Build the shared HTTP client with the configured timeouts
pub(crate) fn build_http_client(config: &HubConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(config.user_agent.as_str())
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| HubError::Transport(format!("failed to build HTTP client: {}", e)))
}

/// Callback URL the hub calls back on for `subscription_id`.
///
/// One trailing `/` on the base is dropped so the id is always a single
/// path segment.
pub fn callback_url(callback_base_url: &str, subscription_id: &str) -> String {
    let base = callback_base_url.strip_suffix('/').unwrap_or(callback_base_url);
    format!("{}/{}", base, urlencoding::encode(subscription_id))
}

/// Whole seconds of a lease given as a possibly fractional number
pub fn lease_from_secs(lease_seconds: f64) -> Result<u64> {
    if !lease_seconds.is_finite() || lease_seconds < 0.0 {
        return Err(HubError::Validation(format!(
            "lease_seconds must be a non-negative number, got {}",
            lease_seconds
        )));
    }
    // `as` saturates for values beyond u64::MAX
    Ok(lease_seconds.trunc() as u64)
}

fn require_http_url(name: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(HubError::Validation(format!("{} must be an http(s) URL: {:?}", name, value)))
    }
}

pub struct HubClient {
    store: Arc<dyn SubscriptionStore>,
    client: Client,
}

impl HubClient {
    pub fn new(store: Arc<dyn SubscriptionStore>, config: &HubConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        info!(
            timeout_ms = config.timeout_ms,
            connect_timeout_ms = config.connect_timeout_ms,
            "HubClient initialized"
        );
        Ok(Self { store, client })
    }

    /// Ask the hub to subscribe. The local state is not touched: on failure
    /// the subscription stays SUBSCRIBING and the call can be repeated.
    pub async fn subscribe(
        &self,
        subscription: &Subscription,
        callback_base_url: &str,
        lease_seconds: Option<f64>,
    ) -> Result<()> {
        require_http_url("callback base URL", callback_base_url)?;
        let lease = lease_seconds.map(lease_from_secs).transpose()?;

        let mut form = vec![
            ("hub.mode", MODE_SUBSCRIBE.to_string()),
            ("hub.callback", callback_url(callback_base_url, &subscription.id)),
            ("hub.topic", subscription.topic_url.clone()),
        ];
        if let Some(lease) = lease {
            form.push(("hub.lease_seconds", lease.to_string()));
        }

        self.send_intent(subscription, MODE_SUBSCRIBE, &form).await
    }

    /// Create a SUBSCRIBING record and ask the hub to subscribe it.
    ///
    /// The URLs and lease are checked before anything is written, so bad
    /// input leaves no record behind. A hub failure after the record exists
    /// is returned as is; the record stays SUBSCRIBING.
    pub async fn create_and_subscribe(
        &self,
        hub_url: &str,
        topic_url: &str,
        callback_base_url: &str,
        lease_seconds: Option<f64>,
    ) -> Result<Subscription> {
        require_http_url("hub URL", hub_url)?;
        require_http_url("callback base URL", callback_base_url)?;
        lease_seconds.map(lease_from_secs).transpose()?;

        let subscription = self.store.create(hub_url, topic_url).await?;
        if let Err(e) = self.subscribe(&subscription, callback_base_url, lease_seconds).await {
            warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Hub did not accept the subscription; it stays subscribing"
            );
            return Err(e);
        }
        Ok(subscription)
    }

    /// Move the subscription to UNSUBSCRIBING, then ask the hub to
    /// unsubscribe. The local state is not reverted if the hub refuses.
    pub async fn unsubscribe(
        &self,
        subscription: &mut Subscription,
        callback_base_url: &str,
    ) -> Result<()> {
        require_http_url("callback base URL", callback_base_url)?;

        self.store.begin_unsubscribe(subscription).await?;

        let form = vec![
            ("hub.mode", MODE_UNSUBSCRIBE.to_string()),
            ("hub.callback", callback_url(callback_base_url, &subscription.id)),
            ("hub.topic", subscription.topic_url.clone()),
        ];

        self.send_intent(subscription, MODE_UNSUBSCRIBE, &form).await
    }

    /// Read the subscription, then [`HubClient::unsubscribe`] it
    pub async fn unsubscribe_by_id(
        &self,
        subscription_id: &str,
        callback_base_url: &str,
    ) -> Result<Subscription> {
        let mut subscription = self.store.read(subscription_id).await?;
        self.unsubscribe(&mut subscription, callback_base_url).await?;
        Ok(subscription)
    }

    async fn send_intent(
        &self,
        subscription: &Subscription,
        mode: &'static str,
        form: &[(&str, String)],
    ) -> Result<()> {
        require_http_url("hub URL", &subscription.hub_url)?;

        debug!(
            subscription_id = %subscription.id,
            hub = %subscription.hub_url,
            mode,
            "Sending intent to hub"
        );

        let response = match self.client.post(&subscription.hub_url).form(form).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = HubError::from(e);
                let outcome = if matches!(err, HubError::Timeout(_)) { "timeout" } else { "transport" };
                warn!(
                    subscription_id = %subscription.id,
                    hub = %subscription.hub_url,
                    mode,
                    error = %err,
                    "Hub request failed"
                );
                counter!("websub_hub_requests_total", "mode" => mode, "outcome" => outcome)
                    .increment(1);
                return Err(err);
            }
        };

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            info!(
                subscription_id = %subscription.id,
                hub = %subscription.hub_url,
                mode,
                "Hub accepted intent"
            );
            counter!("websub_hub_requests_total", "mode" => mode, "outcome" => "accepted")
                .increment(1);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            subscription_id = %subscription.id,
            hub = %subscription.hub_url,
            mode,
            status = status.as_u16(),
            body = %body,
            "Hub rejected intent"
        );
        counter!("websub_hub_requests_total", "mode" => mode, "outcome" => "rejected")
            .increment(1);
        Err(HubError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url() {
        assert_eq!(
            callback_url("https://sub.example/subscriptions", "abc"),
            "https://sub.example/subscriptions/abc"
        );
        assert_eq!(
            callback_url("https://sub.example/subscriptions/", "abc"),
            "https://sub.example/subscriptions/abc"
        );
    }

    #[test]
    fn test_callback_url_encodes_id() {
        assert_eq!(
            callback_url("https://sub.example/subscriptions", "a b/c"),
            "https://sub.example/subscriptions/a%20b%2Fc"
        );
    }

    #[test]
    fn test_lease_truncates() {
        assert_eq!(lease_from_secs(600.0).unwrap(), 600);
        assert_eq!(lease_from_secs(600.9).unwrap(), 600);
        assert_eq!(lease_from_secs(0.4).unwrap(), 0);
    }

    #[test]
    fn test_lease_rejects_negative_and_nan() {
        assert!(matches!(lease_from_secs(-1.0), Err(HubError::Validation(_))));
        assert!(matches!(lease_from_secs(f64::NAN), Err(HubError::Validation(_))));
        assert!(matches!(lease_from_secs(f64::INFINITY), Err(HubError::Validation(_))));
    }
}
