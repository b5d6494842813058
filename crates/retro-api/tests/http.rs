use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use retro_api::{AppState, AppStateInner, BillingConfig};
use retro_core::ManualClock;
use retro_db::Database;
use retro_gateway::Dispatcher;
use retro_types::events::GatewayEvent;
use retro_types::models::{FREE_SUBSCRIPTION, Phase, RetroItem, Retrospective, Role, User};

const SECRET: &str = "integration-test-secret";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TestApp {
    state: AppState,
    clock: Arc<ManualClock>,
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

fn test_app_with_billing(billing: BillingConfig) -> TestApp {
    build_app(start_time(), billing)
}

fn build_app(start: DateTime<Utc>, billing: BillingConfig) -> TestApp {
    let clock = Arc::new(ManualClock::new(start));
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.into(),
        dispatcher: Dispatcher::new(),
        clock: clock.clone(),
        billing,
    });
    TestApp { state, clock }
}

fn test_app() -> TestApp {
    test_app_with_billing(BillingConfig::default())
}

impl TestApp {
    fn router(&self) -> axum::Router {
        retro_api::router(self.state.clone())
    }

    /// Insert a user straight into the store and mint a token for it.
    fn user(&self, email: &str) -> (Uuid, String) {
        let user = User {
            id: Uuid::new_v4(),
            email: email.into(),
            name: Some(email.split('@').next().unwrap_or(email).into()),
            image: None,
            role: Role::User,
            subscription_type: FREE_SUBSCRIPTION.into(),
            subscription_expires: None,
            stripe_subscription_status: None,
            created_at: start_time(),
        };
        self.state.db.create_user(&user, None).unwrap();
        let token = retro_api::auth::create_token(SECRET, user.id, email).unwrap();
        (user.id, token)
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router().oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create_retro(&self, token: &str, name: &str) -> Retrospective {
        let (status, body) = self
            .send("POST", "/retros", Some(token), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        serde_json::from_value(body).unwrap()
    }

    async fn add_item(&self, token: &str, retro_id: Uuid, content: &str, kind: &str) -> RetroItem {
        let (status, body) = self
            .send(
                "POST",
                &format!("/retros/{}/items", retro_id),
                Some(token),
                Some(json!({ "content": content, "item_type": kind })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        serde_json::from_value(body).unwrap()
    }

    async fn advance(&self, token: &str, retro_id: Uuid) -> Retrospective {
        let (status, body) = self
            .send("POST", &format!("/retros/{}/phase/advance", retro_id), Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        serde_json::from_value(body).unwrap()
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = test_app();

    let (status, body) = app.send("GET", "/retros", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.send("GET", "/retros", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_login() {
    let app = test_app();

    let (status, body) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "Dana@Example.com", "name": "Dana", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = app.send("GET", "/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "dana@example.com");
    assert_eq!(me["subscription_type"], "FREE");

    let (status, _) = app
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "dana@example.com", "password": "another one" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "dana@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user_id"], me["id"]);

    let (status, _) = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "dana@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn subscription_status_reports_tier() {
    let app = test_app();
    let (_, token) = app.user("erin@example.com");

    let (status, body) = app.send("GET", "/users/me/subscription", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "free");
    assert_eq!(body["status"], Value::Null);
}

#[tokio::test]
async fn deleted_account_cannot_use_its_token() {
    let app = test_app();
    let (id, token) = app.user("gone@example.com");

    let (status, _) = app.send("DELETE", &format!("/users/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.send("GET", "/users/me/subscription", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Could not find user");
}

#[tokio::test]
async fn users_cannot_edit_each_other() {
    let app = test_app();
    let (_, alice) = app.user("alice@example.com");
    let (bob_id, _) = app.user("bob@example.com");

    let (status, _) = app
        .send(
            "PUT",
            &format!("/users/{}", bob_id),
            Some(&alice),
            Some(json!({ "name": "Mallory", "email": "bob@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Retrospectives and phases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_retrospective_starts_writing_with_stopped_timer() {
    let app = test_app();
    let (owner, token) = app.user("alice@example.com");

    let retro = app.create_retro(&token, "Sprint 12").await;
    assert_eq!(retro.phase, Phase::Writing);
    assert_eq!(retro.owner_id, owner);
    assert_eq!(retro.timer_expiration, start_time());
    assert_eq!(retro.date, start_time().date_naive());

    let (status, body) = app.send("GET", "/retros", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, timer) = app
        .send("GET", &format!("/retros/{}/timer", retro.id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timer["running"], false);
    assert_eq!(timer["display"], "00:00");
}

#[tokio::test]
async fn created_records_match_what_is_read_back() {
    let precise = start_time() + Duration::nanoseconds(123_456_789);
    let app = build_app(precise, BillingConfig::default());
    let (_, token) = app.user("alice@example.com");

    let created = app.create_retro(&token, "Sprint 12").await;
    assert_eq!(created.timer_expiration, start_time() + Duration::milliseconds(123));

    let (_, body) = app
        .send("GET", &format!("/retros/{}", created.id), Some(&token), None)
        .await;
    let loaded: Retrospective = serde_json::from_value(body).unwrap();
    assert_eq!(loaded, created);

    let item = app.add_item(&token, created.id, "pairing", "WENT_WELL").await;
    let (_, items) = app
        .send("GET", &format!("/retros/{}/items", created.id), Some(&token), None)
        .await;
    let listed: Vec<RetroItem> = serde_json::from_value(items).unwrap();
    assert_eq!(listed, vec![item]);
}

#[tokio::test]
async fn blank_name_is_rejected() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");

    let (status, body) = app
        .send("POST", "/retros", Some(&token), Some(json!({ "name": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");
}

#[tokio::test]
async fn phase_advances_to_discussing_and_stays() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;

    assert_eq!(app.advance(&token, retro.id).await.phase, Phase::Voting);
    assert_eq!(app.advance(&token, retro.id).await.phase, Phase::Discussing);

    let again = app.advance(&token, retro.id).await;
    assert_eq!(again.phase, Phase::Discussing);
    assert_eq!(again.name, retro.name);
    assert_eq!(again.timer_expiration, retro.timer_expiration);
}

#[tokio::test]
async fn grouping_cannot_be_set_directly() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;

    let (status, _) = app
        .send(
            "PUT",
            &format!("/retros/{}", retro.id),
            Some(&token),
            Some(json!({
                "name": "Sprint 12",
                "date": retro.date,
                "phase": "GROUPING",
                "timer_expiration": retro.timer_expiration,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_owner_deletes_retrospective() {
    let app = test_app();
    let (_, alice) = app.user("alice@example.com");
    let (_, bob) = app.user("bob@example.com");
    let retro = app.create_retro(&alice, "Sprint 12").await;

    let uri = format!("/retros/{}", retro.id);
    let (status, _) = app.send("DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn joining_shares_the_retrospective() {
    let app = test_app();
    let (_, alice) = app.user("alice@example.com");
    let (bob_id, bob) = app.user("bob@example.com");
    let retro = app.create_retro(&alice, "Sprint 12").await;

    let (status, _) = app
        .send("POST", &format!("/retros/{}/join", retro.id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, mine) = app.send("GET", "/retros", Some(&bob), None).await;
    assert_eq!(mine[0]["id"], json!(retro.id));

    let (_, others) = app.send("GET", "/users", Some(&alice), None).await;
    let others = others.as_array().unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0]["id"], json!(bob_id));
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timer_start_is_a_no_op_while_running() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;
    let uri = format!("/retros/{}/timer/start", retro.id);

    let (status, body) = app
        .send("POST", &uri, Some(&token), Some(json!({ "minutes": 5 })))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["changed"], true);
    assert_eq!(body["timer"]["display"], "05:00");
    let first: Retrospective = serde_json::from_value(body["retrospective"].clone()).unwrap();
    assert_eq!(first.timer_expiration, start_time() + Duration::minutes(5));

    app.clock.advance(Duration::seconds(75));
    let (_, body) = app
        .send("POST", &uri, Some(&token), Some(json!({ "minutes": 10 })))
        .await;
    assert_eq!(body["changed"], false);
    assert_eq!(body["timer"]["display"], "03:45");
    let second: Retrospective = serde_json::from_value(body["retrospective"].clone()).unwrap();
    assert_eq!(second.timer_expiration, first.timer_expiration);
}

#[tokio::test]
async fn timer_restarts_after_expiry() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;
    let uri = format!("/retros/{}/timer/start", retro.id);

    app.send("POST", &uri, Some(&token), Some(json!({ "minutes": 1 }))).await;
    app.clock.advance(Duration::minutes(2));

    let (_, body) = app
        .send("POST", &uri, Some(&token), Some(json!({ "minutes": 3 })))
        .await;
    assert_eq!(body["changed"], true);
    let retro: Retrospective = serde_json::from_value(body["retrospective"].clone()).unwrap();
    assert_eq!(retro.timer_expiration, app.clock_now() + Duration::minutes(3));
}

#[tokio::test]
async fn timer_reset_stops_countdown() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;

    app.send(
        "POST",
        &format!("/retros/{}/timer/start", retro.id),
        Some(&token),
        Some(json!({ "minutes": 5 })),
    )
    .await;
    app.clock.advance(Duration::seconds(30));

    let (status, body) = app
        .send("POST", &format!("/retros/{}/timer/reset", retro.id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["running"], false);
    assert_eq!(body["timer"]["remaining_seconds"], 0);

    let retro: Retrospective = serde_json::from_value(body["retrospective"].clone()).unwrap();
    assert_eq!(retro.timer_expiration, app.clock_now());
}

#[tokio::test]
async fn timer_minutes_are_capped() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;

    let (status, _) = app
        .send(
            "POST",
            &format!("/retros/{}/timer/start", retro.id),
            Some(&token),
            Some(json!({ "minutes": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_timer_starts_agree_on_one_deadline() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;
    let uri = format!("/retros/{}/timer/start", retro.id);

    let (a, b) = tokio::join!(
        app.send("POST", &uri, Some(&token), Some(json!({ "minutes": 5 }))),
        app.send("POST", &uri, Some(&token), Some(json!({ "minutes": 10 }))),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    let changed = [&a.1, &b.1]
        .iter()
        .filter(|body| body["changed"] == true)
        .count();
    assert_eq!(changed, 1);

    let ra: Retrospective = serde_json::from_value(a.1["retrospective"].clone()).unwrap();
    let rb: Retrospective = serde_json::from_value(b.1["retrospective"].clone()).unwrap();
    assert_eq!(ra.timer_expiration, rb.timer_expiration);

    let (_, stored) = app
        .send("GET", &format!("/retros/{}", retro.id), Some(&token), None)
        .await;
    let stored: Retrospective = serde_json::from_value(stored).unwrap();
    assert_eq!(stored.timer_expiration, ra.timer_expiration);
}

impl TestApp {
    fn clock_now(&self) -> DateTime<Utc> {
        use retro_core::Clock;
        self.clock.now()
    }
}

// ---------------------------------------------------------------------------
// Items and votes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn items_only_change_while_writing() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;
    let item = app.add_item(&token, retro.id, "deploys were smooth", "WENT_WELL").await;

    app.advance(&token, retro.id).await;

    let (status, _) = app
        .send(
            "POST",
            &format!("/retros/{}/items", retro.id),
            Some(&token),
            Some(json!({ "content": "late idea", "item_type": "TO_IMPROVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send("DELETE", &format!("/items/{}", item.id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn item_deletion_is_limited_to_author_and_owner() {
    let app = test_app();
    let (_, alice) = app.user("alice@example.com");
    let (_, bob) = app.user("bob@example.com");
    let (_, carol) = app.user("carol@example.com");
    let retro = app.create_retro(&alice, "Sprint 12").await;
    let first = app.add_item(&bob, retro.id, "flaky CI", "TO_IMPROVE").await;
    let second = app.add_item(&bob, retro.id, "slow reviews", "TO_IMPROVE").await;

    let (status, _) = app
        .send("DELETE", &format!("/items/{}", first.id), Some(&carol), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("DELETE", &format!("/items/{}", first.id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send("DELETE", &format!("/items/{}", second.id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, items) = app
        .send("GET", &format!("/retros/{}/items", retro.id), Some(&alice), None)
        .await;
    assert_eq!(items, json!([]));
}

#[tokio::test]
async fn only_the_author_edits_an_item() {
    let app = test_app();
    let (_, alice) = app.user("alice@example.com");
    let (_, bob) = app.user("bob@example.com");
    let retro = app.create_retro(&alice, "Sprint 12").await;
    let item = app.add_item(&alice, retro.id, "flaky CI", "TO_IMPROVE").await;

    let uri = format!("/items/{}", item.id);
    let edit = json!({ "content": "flaky CI on main", "item_type": "TO_IMPROVE" });

    let (status, _) = app.send("PUT", &uri, Some(&bob), Some(edit.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("PUT", &uri, Some(&alice), Some(edit)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "flaky CI on main");
}

#[tokio::test]
async fn votes_require_voting_phase() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;
    let item = app.add_item(&token, retro.id, "pairing", "WENT_WELL").await;

    let (status, _) = app
        .send("POST", &format!("/items/{}/vote", item.id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn second_vote_by_same_user_is_rejected() {
    let app = test_app();
    let (alice_id, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;
    let item = app.add_item(&token, retro.id, "pairing", "WENT_WELL").await;
    app.advance(&token, retro.id).await;

    let uri = format!("/items/{}/vote", item.id);
    let (status, body) = app.send("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["votes"], 1);
    assert_eq!(body["voters"], json!([alice_id]));

    let (status, _) = app.send("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, items) = app
        .send("GET", &format!("/retros/{}/items", retro.id), Some(&token), None)
        .await;
    assert_eq!(items[0]["votes"], 1);
}

#[tokio::test]
async fn vote_reaches_gateway_subscribers() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");
    let retro = app.create_retro(&token, "Sprint 12").await;
    let item = app.add_item(&token, retro.id, "pairing", "WENT_WELL").await;
    app.advance(&token, retro.id).await;

    let mut rx = app.state.dispatcher.subscribe(retro.id).await;
    app.send("POST", &format!("/items/{}/vote", item.id), Some(&token), None)
        .await;

    match rx.try_recv().unwrap() {
        GatewayEvent::ItemUpdated { item: updated } => {
            assert_eq!(updated.id, item.id);
            assert_eq!(updated.votes, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Full session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_retrospective_session() {
    let app = test_app();
    let (_, alice) = app.user("alice@example.com");
    let (bob_id, bob) = app.user("bob@example.com");

    let retro = app.create_retro(&alice, "Sprint 12").await;
    app.send("POST", &format!("/retros/{}/join", retro.id), Some(&bob), None)
        .await;

    let first = app.add_item(&alice, retro.id, "standups ran long", "TO_IMPROVE").await;
    app.clock.advance(Duration::seconds(1));
    let second = app.add_item(&bob, retro.id, "shipped search", "WENT_WELL").await;

    let voting = app.advance(&alice, retro.id).await;
    assert_eq!(voting.phase, Phase::Voting);

    for token in [&alice, &bob] {
        let (status, _) = app
            .send("POST", &format!("/items/{}/vote", second.id), Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = app
        .send("POST", &format!("/items/{}/vote", first.id), Some(&bob), None)
        .await;
    assert_eq!(body["voters"], json!([bob_id]));

    let discussing = app.advance(&alice, retro.id).await;
    assert_eq!(discussing.phase, Phase::Discussing);

    let (status, view) = app
        .send("GET", &format!("/retros/{}/discussion", retro.id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["index"], 0);
    assert_eq!(view["current"]["id"], json!(second.id));
    assert_eq!(view["current"]["votes"], 2);
    assert_eq!(view["has_previous"], false);
    assert_eq!(view["has_next"], true);

    let (_, view) = app
        .send(
            "GET",
            &format!("/retros/{}/discussion?position=7", retro.id),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(view["index"], 1);
    assert_eq!(view["current"]["id"], json!(first.id));
    assert_eq!(view["has_next"], false);
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn billing_without_configuration_is_unavailable() {
    let app = test_app();
    let (_, token) = app.user("alice@example.com");

    let (status, _) = app
        .send("POST", "/billing/checkout", Some(&token), Some(json!({ "tier": "PRO" })))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn billing_checkout_url_carries_user_and_tier() {
    let app = test_app_with_billing(BillingConfig {
        checkout_url: Some("https://billing.example.com/checkout".into()),
        portal_url: Some("https://billing.example.com/portal?src=app".into()),
    });
    let (user_id, token) = app.user("alice@example.com");

    let (status, body) = app
        .send("POST", "/billing/checkout", Some(&token), Some(json!({ "tier": "PRO" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("https://billing.example.com/checkout?"));
    assert!(url.contains(&user_id.to_string()));
    assert!(url.contains("PRO"));

    let (status, body) = app.send("POST", "/billing/portal", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["url"].as_str().unwrap().starts_with("https://billing.example.com/portal?src=app&"));
}
