//! End-to-end API tests against mocked providers.
//!
//! The full router runs with a real SQLite file, an in-memory mail
//! transport, and wiremock standing in for Stripe and PayPal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use sqlx::SqlitePool;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use esther_mail::{spawn_dispatcher, Email, Mailer, MemoryTransport};
use esther_payments::{PayPalOrders, StripeCheckout};
use esther_server::config::Config;
use esther_server::db::{self, SqliteRecordStore};
use esther_server::dedup::MemoryDedupSet;
use esther_server::intents::{FileBackedIntentStore, IntentStore};
use esther_server::models::IntentPayload;
use esther_server::notify::EmailNotifier;
use esther_server::reconcile::ReconciliationEngine;
use esther_server::routes;
use esther_server::state::AppState;

const WEBHOOK_SECRET: &str = "whsec_test";

struct TestApp {
    router: Router,
    state: AppState,
    pool: SqlitePool,
    sent: Arc<Mutex<Vec<Email>>>,
    stripe: MockServer,
    paypal: MockServer,
    _dir: tempfile::TempDir,
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let database_url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
    let pool = db::init_pool(&database_url).await.unwrap();
    let records = Arc::new(SqliteRecordStore::new(pool.clone()));

    let stripe_server = MockServer::start().await;
    let paypal_server = MockServer::start().await;

    let stripe = Arc::new(
        StripeCheckout::new("sk_test_abc")
            .with_webhook_secret(WEBHOOK_SECRET)
            .with_base_url(stripe_server.uri()),
    );
    let paypal = Arc::new(
        PayPalOrders::new("client", "secret").with_base_url(paypal_server.uri()),
    );

    let transport = MemoryTransport::new();
    let sent = transport.sent();
    let mailer = Mailer::new(transport).default_from("noreply@example.com");
    let notifier = Arc::new(EmailNotifier::new(spawn_dispatcher(mailer), None));

    let intents = Arc::new(FileBackedIntentStore::ephemeral(300));
    let engine = Arc::new(ReconciliationEngine::new(
        records.clone(),
        intents.clone(),
        Arc::new(MemoryDedupSet::new()),
        notifier.clone(),
    ));

    let config = Arc::new(Config {
        api_port: 0,
        client_url: "http://localhost:5173".into(),
        database_url,
        stripe_secret_key: "sk_test_abc".into(),
        stripe_webhook_secret: WEBHOOK_SECRET.into(),
        paypal_client_id: "client".into(),
        paypal_client_secret: "secret".into(),
        paypal_sandbox: true,
        smtp_host: "smtp.example.com".into(),
        smtp_port: 587,
        smtp_username: String::new(),
        smtp_password: String::new(),
        email_from: "noreply@example.com".into(),
        admin_email: None,
        registration_amount_cents: 12000,
        pending_intents_file: None,
        intent_cooldown_secs: 300,
        intent_ttl_secs: 86400,
    });

    let state = AppState {
        config,
        stripe,
        paypal,
        intents,
        engine,
        records,
        notifier,
    };

    TestApp {
        router: routes::router(state.clone()),
        state,
        pool,
        sent,
        stripe: stripe_server,
        paypal: paypal_server,
        _dir: dir,
    }
}

fn registration_json() -> serde_json::Value {
    serde_json::json!({
        "firstname": "Jane",
        "lastname": "Doe",
        "email": "jane@example.com",
        "phonenumber": "555-0100",
        "nameofchurch": "Grace Chapel"
    })
}

fn sign_webhook(payload: &[u8]) -> String {
    let timestamp = "1700000000";
    let signed = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(signed.as_bytes());
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn completed_webhook_body(session_id: &str, intent_id: &str) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "livemode": false,
        "data": {
            "object": {
                "id": session_id,
                "url": null,
                "payment_status": "paid",
                "payment_intent": "pi_123",
                "metadata": { "intent_id": intent_id }
            }
        }
    })
    .to_string()
    .into_bytes()
}

async fn post_json(router: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_webhook(router: &Router, body: Vec<u8>, signature: &str) -> StatusCode {
    router
        .clone()
        .oneshot(
            Request::post("/api/webhooks/stripe")
                .header("stripe-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn wait_for_emails(sent: &Arc<Mutex<Vec<Email>>>, expected: usize) {
    for _ in 0..100 {
        if sent.lock().unwrap().len() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn offline_registration_is_written_eagerly() {
    let app = spawn_app().await;

    let (status, body) = post_json(&app.router, "/api/registrations", registration_json()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(count(&app.pool, "registrations").await, 1);

    let status: String =
        sqlx::query_scalar("SELECT payment_status FROM registrations WHERE email = 'jane@example.com'")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(status, "pending");

    wait_for_emails(&app.sent, 1).await;
    assert_eq!(app.sent.lock().unwrap().len(), 1);

    // Same email again is rejected.
    let (status, _) = post_json(&app.router, "/api/registrations", registration_json()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count(&app.pool, "registrations").await, 1);
}

#[tokio::test]
async fn invalid_registration_is_rejected_with_field_detail() {
    let app = spawn_app().await;

    let (status, body) = post_json(
        &app.router,
        "/api/registrations",
        serde_json::json!({ "firstname": "", "lastname": "Doe", "email": "jane@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("firstname"));
    assert_eq!(count(&app.pool, "registrations").await, 0);
}

#[tokio::test]
async fn checkout_session_creation_returns_redirect_url() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.com/pay/cs_test_1",
            "payment_status": "unpaid",
            "payment_intent": null,
            "metadata": {}
        })))
        .mount(&app.stripe)
        .await;

    let (status, body) = post_json(
        &app.router,
        "/api/registrations/checkout-sessions",
        registration_json(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], "cs_test_1");
    assert!(body["url"].as_str().unwrap().contains("checkout.stripe.com"));

    // Nothing durable yet.
    assert_eq!(count(&app.pool, "registrations").await, 0);

    // A second submission for the same email hits the cooldown.
    let (status, body) = post_json(
        &app.router,
        "/api/registrations/checkout-sessions",
        registration_json(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("already being processed"));
}

#[tokio::test]
async fn failed_session_creation_lifts_the_cooldown() {
    let app = spawn_app().await;
    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": { "message": "Stripe is down" }
        })))
        .mount(&app.stripe)
        .await;

    let (status, _) = post_json(
        &app.router,
        "/api/registrations/checkout-sessions",
        registration_json(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The retry is not blocked by a stale intent.
    let (status, _) = post_json(
        &app.router,
        "/api/registrations/checkout-sessions",
        registration_json(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unsigned_webhook_is_rejected_without_side_effects() {
    let app = spawn_app().await;
    let body = completed_webhook_body("cs_test_1", "whatever");

    let status = post_webhook(&app.router, body.clone(), "t=1,v1=deadbeef").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing header entirely.
    let status = app
        .router
        .clone()
        .oneshot(
            Request::post("/api/webhooks/stripe")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(count(&app.pool, "registrations").await, 0);
}

#[tokio::test]
async fn signed_webhook_settles_a_registration_exactly_once() {
    let app = spawn_app().await;

    let intent_id = app
        .state
        .intents
        .create(IntentPayload::Registration(
            serde_json::from_value(registration_json()).unwrap(),
        ))
        .await
        .unwrap();

    let body = completed_webhook_body("cs_test_1", &intent_id);
    let signature = sign_webhook(&body);

    let status = post_webhook(&app.router, body.clone(), &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&app.pool, "registrations").await, 1);

    let (method_col, status_col, provider_ref): (String, String, String) = sqlx::query_as(
        "SELECT payment_method, payment_status, provider_ref FROM registrations",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(method_col, "card");
    assert_eq!(status_col, "completed");
    assert_eq!(provider_ref, "cs_test_1");

    // Stripe redelivers; still one row, one confirmation email.
    let status = post_webhook(&app.router, body, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&app.pool, "registrations").await, 1);

    wait_for_emails(&app.sent, 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(app.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn webhook_then_client_verify_settles_once() {
    let app = spawn_app().await;

    let intent_id = app
        .state
        .intents
        .create(IntentPayload::Registration(
            serde_json::from_value(registration_json()).unwrap(),
        ))
        .await
        .unwrap();

    let body = completed_webhook_body("cs_test_1", &intent_id);
    let signature = sign_webhook(&body);
    assert_eq!(post_webhook(&app.router, body, &signature).await, StatusCode::OK);

    Mock::given(method("GET"))
        .and(path("/checkout/sessions/cs_test_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_test_1",
            "url": null,
            "payment_status": "paid",
            "payment_intent": "pi_123",
            "metadata": { "intent_id": intent_id }
        })))
        .mount(&app.stripe)
        .await;

    let (status, body) = get(&app.router, "/api/checkout-sessions/cs_test_1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paid"], true);
    assert_eq!(body["paymentStatus"], "paid");
    assert_eq!(body["outcome"], "already_processed");

    // The success page may fire the verify call twice; both succeed.
    let (status, body) = get(&app.router, "/api/checkout-sessions/cs_test_1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(count(&app.pool, "registrations").await, 1);

    wait_for_emails(&app.sent, 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(app.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn redelivery_after_restart_with_existing_row_is_acknowledged() {
    let app = spawn_app().await;

    // A previous run wrote the row but crashed before removing the intent;
    // after restart the dedup set is empty and the intent was restored from
    // its snapshot.
    sqlx::query(
        "INSERT INTO registrations \
         (firstname, lastname, email, payment_method, payment_status, provider_ref) \
         VALUES ('Jane', 'Doe', 'jane@example.com', 'card', 'completed', 'cs_test_1')",
    )
    .execute(&app.pool)
    .await
    .unwrap();
    let intent_id = app
        .state
        .intents
        .create(IntentPayload::Registration(
            serde_json::from_value(registration_json()).unwrap(),
        ))
        .await
        .unwrap();

    let body = completed_webhook_body("cs_test_1", &intent_id);
    let signature = sign_webhook(&body);

    // Both redeliveries are acknowledged so Stripe stops retrying.
    let status = post_webhook(&app.router, body.clone(), &signature).await;
    assert_eq!(status, StatusCode::OK);
    let status = post_webhook(&app.router, body, &signature).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(count(&app.pool, "registrations").await, 1);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(app.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn orphaned_webhook_is_acknowledged() {
    let app = spawn_app().await;

    let body = completed_webhook_body("cs_ghost", "never-created");
    let signature = sign_webhook(&body);

    let status = post_webhook(&app.router, body, &signature).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&app.pool, "registrations").await, 0);
    assert!(app.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unpaid_session_verify_reports_unpaid() {
    let app = spawn_app().await;

    Mock::given(method("GET"))
        .and(path("/checkout/sessions/cs_open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cs_open",
            "url": "https://checkout.stripe.com/pay/cs_open",
            "payment_status": "unpaid",
            "payment_intent": null,
            "metadata": {}
        })))
        .mount(&app.stripe)
        .await;

    let (status, body) = get(&app.router, "/api/checkout-sessions/cs_open").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paid"], false);
    assert_eq!(body["paymentStatus"], "unpaid");
    assert_eq!(count(&app.pool, "registrations").await, 0);
}

#[tokio::test]
async fn offline_donation_is_written_as_pending() {
    let app = spawn_app().await;

    let donation = serde_json::json!({
        "firstName": "Jane",
        "lastName": "Doe",
        "email": "jane@example.com",
        "phone": "555-0100",
        "amountCents": 10000
    });
    let (status, body) = post_json(&app.router, "/api/donations", donation).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status_col, method_col): (String, String) =
        sqlx::query_as("SELECT payment_status, payment_method FROM donations")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(status_col, "pending");
    assert_eq!(method_col, "bank-transfer");
}

#[tokio::test]
async fn paypal_donation_flow_captures_and_settles() {
    let app = spawn_app().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A21AAtoken",
            "expires_in": 3600
        })))
        .mount(&app.paypal)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "ORDER123",
            "status": "CREATED",
            "purchase_units": [],
            "links": [
                { "href": "https://www.sandbox.paypal.com/checkoutnow?token=ORDER123", "rel": "approve" }
            ]
        })))
        .mount(&app.paypal)
        .await;

    let donation = serde_json::json!({
        "firstName": "Jane",
        "lastName": "Doe",
        "email": "jane@example.com",
        "phone": "555-0100",
        "amountCents": 5000
    });
    let (status, body) = post_json(&app.router, "/api/donations/paypal-orders", donation).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orderId"], "ORDER123");
    assert!(body["approvalUrl"].as_str().unwrap().contains("checkoutnow"));

    // The payer approved; fetch shows APPROVED with our intent id echoed back.
    let intent_id = {
        let requests = app.paypal.received_requests().await.unwrap();
        let create = requests
            .iter()
            .find(|r| r.url.path() == "/v2/checkout/orders")
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
        body["purchase_units"][0]["custom_id"].as_str().unwrap().to_string()
    };

    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/ORDER123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "ORDER123",
            "status": "APPROVED",
            "purchase_units": [{ "custom_id": intent_id }]
        })))
        .mount(&app.paypal)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER123/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "ORDER123",
            "status": "COMPLETED",
            "purchase_units": [{ "custom_id": intent_id }]
        })))
        .mount(&app.paypal)
        .await;

    let (status, body) = get(&app.router, "/api/paypal-orders/ORDER123/verify").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paid"], true);
    assert_eq!(body["outcome"], "completed");
    assert_eq!(count(&app.pool, "donations").await, 1);

    let (amount, provider_ref): (i64, String) =
        sqlx::query_as("SELECT amount_cents, provider_ref FROM donations")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(amount, 5000);
    assert_eq!(provider_ref, "ORDER123");

    // Verify again: capture is already done, settlement is a no-op.
    let (status, body) = get(&app.router, "/api/paypal-orders/ORDER123/verify").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_processed");
    assert_eq!(count(&app.pool, "donations").await, 1);
}

#[tokio::test]
async fn unapproved_paypal_order_is_not_settled() {
    let app = spawn_app().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "A21AAtoken",
            "expires_in": 3600
        })))
        .mount(&app.paypal)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/checkout/orders/ORDER456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "ORDER456",
            "status": "CREATED",
            "purchase_units": [{ "custom_id": "intent-x" }]
        })))
        .mount(&app.paypal)
        .await;

    let (status, body) = get(&app.router, "/api/paypal-orders/ORDER456/verify").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paid"], false);
    assert_eq!(count(&app.pool, "donations").await, 0);
}
