//! HubClient and CallbackProbe against mock hubs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use ws_common::{ChallengeVerifier, SubscriptionState};
use ws_config::HubConfig;
use ws_hub::{CallbackProbe, HubClient, HubError};
use ws_store::{SqliteSubscriptionStore, StoreError, SubscriptionStore};

const TOPIC: &str = "https://feed.example/a";
const CALLBACK_BASE: &str = "https://sub.example/subscriptions";

async fn create_test_store() -> Arc<SqliteSubscriptionStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteSubscriptionStore::new(pool);
    store.init_schema().await.unwrap();
    Arc::new(store)
}

fn fast_config() -> HubConfig {
    HubConfig {
        timeout_ms: 300,
        connect_timeout_ms: 300,
        ..HubConfig::default()
    }
}

fn form_fields(request: &Request) -> HashMap<String, String> {
    let body = String::from_utf8(request.body.clone()).unwrap();
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (
                urlencoding::decode(k).unwrap().into_owned(),
                urlencoding::decode(v).unwrap().into_owned(),
            )
        })
        .collect()
}

async fn only_request(server: &MockServer) -> Request {
    let mut requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    requests.remove(0)
}

#[tokio::test]
async fn test_subscribe_posts_form_and_accepts_202() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hub"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let sub = store.create(&format!("{}/hub", hub.uri()), TOPIC).await.unwrap();

    client.subscribe(&sub, CALLBACK_BASE, Some(600.7)).await.unwrap();

    let fields = form_fields(&only_request(&hub).await);
    assert_eq!(fields["hub.mode"], "subscribe");
    assert_eq!(fields["hub.topic"], TOPIC);
    assert_eq!(fields["hub.callback"], format!("{}/{}", CALLBACK_BASE, sub.id));
    assert_eq!(fields["hub.lease_seconds"], "600");

    // Acceptance is not confirmation
    assert_eq!(store.read(&sub.id).await.unwrap().state, SubscriptionState::Subscribing);
}

#[tokio::test]
async fn test_subscribe_without_lease_omits_field() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let sub = store.create(&hub.uri(), TOPIC).await.unwrap();

    client.subscribe(&sub, CALLBACK_BASE, None).await.unwrap();

    let fields = form_fields(&only_request(&hub).await);
    assert!(!fields.contains_key("hub.lease_seconds"));
}

#[tokio::test]
async fn test_subscribe_non_202_is_unexpected_status() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok but not accepted"))
        .expect(1)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let sub = store.create(&hub.uri(), TOPIC).await.unwrap();

    let err = client.subscribe(&sub, CALLBACK_BASE, Some(60.0)).await.unwrap_err();
    match err {
        HubError::UnexpectedStatus { status, body } => {
            assert_eq!(status, 200);
            assert_eq!(body, "ok but not accepted");
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
    assert_eq!(store.read(&sub.id).await.unwrap().state, SubscriptionState::Subscribing);
}

#[tokio::test]
async fn test_subscribe_timeout_is_distinct() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202).set_delay(Duration::from_secs(2)))
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let sub = store.create(&hub.uri(), TOPIC).await.unwrap();

    let err = client.subscribe(&sub, CALLBACK_BASE, None).await.unwrap_err();
    assert!(matches!(err, HubError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn test_subscribe_rejects_bad_lease_without_request() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let sub = store.create(&hub.uri(), TOPIC).await.unwrap();

    let err = client.subscribe(&sub, CALLBACK_BASE, Some(-5.0)).await.unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));

    let err = client.subscribe(&sub, "not a url", None).await.unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));
}

#[tokio::test]
async fn test_create_and_subscribe_rejects_bad_input_without_record() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();

    let err = client
        .create_and_subscribe(&hub.uri(), TOPIC, CALLBACK_BASE, Some(-5.0))
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));

    let err = client
        .create_and_subscribe(&hub.uri(), TOPIC, "not a url", None)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));

    let err = client
        .create_and_subscribe("ftp://hub.example", TOPIC, CALLBACK_BASE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Validation(_)));

    assert!(store.find_by_hub_and_topic(&hub.uri(), TOPIC).await.unwrap().is_empty());
    assert!(store
        .find_by_hub_and_topic("ftp://hub.example", TOPIC)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_create_and_subscribe_stores_then_sends() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();

    let sub = client
        .create_and_subscribe(&hub.uri(), TOPIC, CALLBACK_BASE, Some(60.0))
        .await
        .unwrap();
    assert_eq!(sub.state, SubscriptionState::Subscribing);

    let fields = form_fields(&only_request(&hub).await);
    assert_eq!(fields["hub.callback"], format!("{}/{}", CALLBACK_BASE, sub.id));
    assert_eq!(fields["hub.lease_seconds"], "60");
    assert_eq!(store.find_by_hub_and_topic(&hub.uri(), TOPIC).await.unwrap(), vec![sub]);
}

#[tokio::test]
async fn test_create_and_subscribe_keeps_record_when_hub_refuses() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();

    let err = client
        .create_and_subscribe(&hub.uri(), TOPIC, CALLBACK_BASE, None)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::UnexpectedStatus { status: 400, .. }));

    let found = store.find_by_hub_and_topic(&hub.uri(), TOPIC).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].state, SubscriptionState::Subscribing);
}

#[tokio::test]
async fn test_unsubscribe_marks_unsubscribing_before_request() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let mut sub = store.create(&hub.uri(), TOPIC).await.unwrap();
    store.confirm_subscription(&mut sub, Some(600)).await.unwrap();

    client.unsubscribe(&mut sub, CALLBACK_BASE).await.unwrap();
    assert_eq!(sub.state, SubscriptionState::Unsubscribing);

    let fields = form_fields(&only_request(&hub).await);
    assert_eq!(fields["hub.mode"], "unsubscribe");
    assert_eq!(fields["hub.topic"], TOPIC);
    assert!(!fields.contains_key("hub.lease_seconds"));
}

#[tokio::test]
async fn test_unsubscribe_failure_keeps_unsubscribing() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let mut sub = store.create(&hub.uri(), TOPIC).await.unwrap();
    store.confirm_subscription(&mut sub, None).await.unwrap();

    let err = client.unsubscribe_by_id(&sub.id, CALLBACK_BASE).await.unwrap_err();
    assert!(matches!(err, HubError::UnexpectedStatus { status: 500, .. }));
    assert_eq!(store.read(&sub.id).await.unwrap().state, SubscriptionState::Unsubscribing);
}

#[tokio::test]
async fn test_unsubscribe_from_subscribing_conflicts_without_request() {
    let hub = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&hub)
        .await;

    let store = create_test_store().await;
    let client = HubClient::new(store.clone(), &fast_config()).unwrap();
    let mut sub = store.create(&hub.uri(), TOPIC).await.unwrap();

    let err = client.unsubscribe(&mut sub, CALLBACK_BASE).await.unwrap_err();
    assert!(matches!(err, HubError::Store(StoreError::StateConflict { .. })));
}

#[tokio::test]
async fn test_unsubscribe_unknown_id_is_not_found() {
    let store = create_test_store().await;
    let client = HubClient::new(store, &fast_config()).unwrap();

    let err = client.unsubscribe_by_id("missing", CALLBACK_BASE).await.unwrap_err();
    assert!(matches!(err, HubError::Store(StoreError::NotFound(_))));
}

struct AnswerChallenge;

impl Respond for AnswerChallenge {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let challenge = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "validate")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_string(ChallengeVerifier::new().response(&challenge))
    }
}

#[tokio::test]
async fn test_probe_accepts_correct_response() {
    let endpoint = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(AnswerChallenge)
        .expect(1)
        .mount(&endpoint)
        .await;

    let probe = CallbackProbe::new(&fast_config()).unwrap();
    probe.verify(&format!("{}/subscriptions", endpoint.uri())).await.unwrap();
}

#[tokio::test]
async fn test_probe_rejects_echo() {
    let endpoint = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("echo"))
        .mount(&endpoint)
        .await;

    let probe = CallbackProbe::new(&fast_config()).unwrap();
    let err = probe.verify(&endpoint.uri()).await.unwrap_err();
    assert!(matches!(err, HubError::ChallengeMismatch));
}

#[tokio::test]
async fn test_probe_non_200_and_timeout() {
    let endpoint = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&endpoint)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&endpoint)
        .await;

    let probe = CallbackProbe::new(&fast_config()).unwrap();

    let err = probe.verify(&format!("{}/missing", endpoint.uri())).await.unwrap_err();
    assert!(matches!(err, HubError::UnexpectedStatus { status: 404, .. }));

    let err = probe.verify(&format!("{}/slow", endpoint.uri())).await.unwrap_err();
    assert!(matches!(err, HubError::Timeout(_)), "got {err:?}");
}
