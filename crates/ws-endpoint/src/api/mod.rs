//! Callback endpoint HTTP API
//!
//! - `GET  /subscriptions?validate=<c>`: endpoint authenticity probe
//! - `GET  /subscriptions/:id`: hub verification and denial callbacks
//! - `POST /subscriptions/:id`: content delivery
//! - `GET  /health`
//!
//! Everything else is 404, including other methods on known paths. HEAD is
//! routed explicitly since `get` would otherwise answer it and run the
//! callback's transitions.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use ws_common::{ChallengeVerifier, Subscription};
use ws_store::{StoreError, SubscriptionStore};

use crate::callback_metrics;
use crate::error::CallbackError;

pub mod model;

use model::{mode_label, HubRequest};

/// State shared across handlers
#[derive(Clone)]
pub struct CallbackState {
    pub store: Arc<dyn SubscriptionStore>,
    pub verifier: ChallengeVerifier,
    /// Largest accepted Content-Length for a delivery
    pub max_content_bytes: usize,
}

impl CallbackState {
    pub fn new(store: Arc<dyn SubscriptionStore>, max_content_bytes: usize) -> Self {
        Self {
            store,
            verifier: ChallengeVerifier::new(),
            max_content_bytes,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub fn create_router(state: CallbackState) -> Router {
    Router::new()
        .route(
            "/subscriptions",
            get(validate_handler).head(not_found).fallback(not_found),
        )
        .route(
            "/subscriptions/:id",
            get(hub_callback_handler)
                .head(not_found)
                .post(content_delivery_handler)
                .fallback(not_found),
        )
        .route(
            "/health",
            get(health_handler).head(not_found).fallback(not_found),
        )
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Reply with the verifier's response to `validate`
async fn validate_handler(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, CallbackError> {
    match params.get("validate").filter(|c| !c.is_empty()) {
        Some(challenge) => {
            debug!("Answering endpoint validation probe");
            Ok(state.verifier.response(challenge))
        }
        None => {
            warn!("Validation probe without challenge");
            Err(CallbackError::Validation("missing validate parameter".to_string()))
        }
    }
}

async fn hub_callback_handler(
    State(state): State<CallbackState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, CallbackError> {
    let mode = mode_label(&params);

    match handle_hub_callback(&state, &id, &params).await {
        Ok(response) => {
            callback_metrics::record_callback(mode, "ok");
            Ok(response)
        }
        Err(e) => {
            warn!(
                method = "GET",
                subscription_id = %id,
                mode,
                error = %e,
                "Hub callback rejected"
            );
            callback_metrics::record_callback(mode, e.kind());
            Err(e)
        }
    }
}

/// Topic must match the one the subscription was created for
fn check_topic(subscription: &Subscription, request: &HubRequest) -> Result<(), CallbackError> {
    if request.topic() == subscription.topic_url {
        Ok(())
    } else {
        Err(CallbackError::Validation(format!(
            "topic {:?} does not match subscription topic",
            request.topic()
        )))
    }
}

async fn handle_hub_callback(
    state: &CallbackState,
    id: &str,
    params: &HashMap<String, String>,
) -> Result<Response, CallbackError> {
    let mut subscription = state.store.read(id).await?;
    let request = HubRequest::from_query(params)?;

    // The conditional write re-checks the source states, so a stale
    // snapshot or a racing callback ends up as a 400.
    match request {
        HubRequest::Subscribe {
            ref challenge,
            lease_seconds,
            ..
        } => {
            check_topic(&subscription, &request)?;
            state
                .store
                .confirm_subscription(&mut subscription, Some(lease_seconds))
                .await?;
            info!(
                subscription_id = %subscription.id,
                lease_seconds,
                "Subscription confirmed"
            );
            Ok((StatusCode::OK, challenge.clone()).into_response())
        }
        HubRequest::Unsubscribe { ref challenge, .. } => {
            check_topic(&subscription, &request)?;
            state.store.confirm_unsubscription(&mut subscription).await?;
            info!(subscription_id = %subscription.id, "Unsubscription confirmed");
            Ok((StatusCode::OK, challenge.clone()).into_response())
        }
        HubRequest::Denied { ref reason, .. } => {
            state
                .store
                .deny_subscription(&mut subscription, reason.as_deref())
                .await?;
            Ok(StatusCode::OK.into_response())
        }
    }
}

async fn content_delivery_handler(
    State(state): State<CallbackState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, CallbackError> {
    match handle_content_delivery(&state, &id, &headers, body).await {
        Ok(status) => Ok(status),
        Err(e) => {
            warn!(
                method = "POST",
                subscription_id = %id,
                error = %e,
                "Content delivery rejected"
            );
            callback_metrics::record_delivery_rejected(e.kind());
            Err(e)
        }
    }
}

fn required_header<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Result<&'a str, CallbackError> {
    headers
        .get(&name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CallbackError::Validation(format!("missing or invalid {} header", name)))
}

async fn handle_content_delivery(
    state: &CallbackState,
    id: &str,
    headers: &HeaderMap,
    body: Body,
) -> Result<StatusCode, CallbackError> {
    let subscription = match state.store.read(id).await {
        Ok(subscription) => subscription,
        Err(StoreError::NotFound(_)) => {
            return Err(CallbackError::Gone(format!("no subscription {}", id)))
        }
        Err(e) => return Err(e.into()),
    };

    if !subscription.state.accepts_content() {
        return Err(CallbackError::Gone(format!(
            "subscription {} is {}",
            subscription.id, subscription.state
        )));
    }

    let content_type = required_header(headers, header::CONTENT_TYPE)?.to_string();
    let content_length: usize = required_header(headers, header::CONTENT_LENGTH)?
        .parse()
        .map_err(|_| CallbackError::Validation("Content-Length is not a number".to_string()))?;

    if content_length > state.max_content_bytes {
        return Err(CallbackError::PayloadTooLarge {
            declared: content_length,
            limit: state.max_content_bytes,
        });
    }

    // A body longer than declared fails the limit, a shorter one the length check
    let content = axum::body::to_bytes(body, content_length)
        .await
        .map_err(|e| CallbackError::Transport(format!("failed to read body: {}", e)))?;
    if content.len() != content_length {
        return Err(CallbackError::Transport(format!(
            "short read: expected {} bytes, got {}",
            content_length,
            content.len()
        )));
    }

    state
        .store
        .append_update(&subscription, &content_type, &content)
        .await?;

    info!(
        subscription_id = %subscription.id,
        content_type = %content_type,
        content_length,
        "Content update received"
    );
    debug!(subscription_id = %subscription.id, body = %String::from_utf8_lossy(&content), "Content body");
    callback_metrics::record_content_update(content_length);

    Ok(StatusCode::ACCEPTED)
}
