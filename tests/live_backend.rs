use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use otpgate::auth::{AuthBackend, LiveBackend};
use otpgate::otp::{OtpController, VerifyOutcome};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const API_KEY: &str = "anon-test-key";
const ACCESS_TOKEN: &str = "access-token-1";
const GOOD_CODE: &str = "123456";

#[derive(Clone, Debug)]
struct Seen {
    path: &'static str,
    apikey: Option<String>,
    authorization: Option<String>,
    body: Value,
}

#[derive(Default)]
struct Provider {
    seen: Mutex<Vec<Seen>>,
}

impl Provider {
    fn record(&self, path: &'static str, headers: &HeaderMap, body: Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(ToString::to_string)
        };
        self.seen.lock().unwrap().push(Seen {
            path,
            apikey: header("apikey"),
            authorization: header("authorization"),
            body,
        });
    }

    fn seen(&self, path: &str) -> Vec<Seen> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|seen| seen.path == path)
            .cloned()
            .collect()
    }
}

fn session() -> Value {
    json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "bearer",
        "user": {
            "id": "5c1f",
            "email": "ann@example.com",
            "user_metadata": {"full_name": "Ann Smith"}
        }
    })
}

async fn signup(
    State(provider): State<Arc<Provider>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    provider.record("signup", &headers, body.clone());
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"code": 422, "msg": "User already registered"})),
        );
    }
    (StatusCode::OK, Json(json!({"id": "5c1f", "email": body["email"]})))
}

async fn token(
    State(provider): State<Arc<Provider>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    provider.record("token", &headers, body.clone());
    if query.get("grant_type").map(String::as_str) != Some("password") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "unsupported_grant_type"})));
    }
    if body["password"] != "pw123456" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
        );
    }
    (StatusCode::OK, Json(session()))
}

async fn verify(
    State(provider): State<Arc<Provider>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    provider.record("verify", &headers, body.clone());
    if body["token"] == GOOD_CODE && body["type"] == "signup" {
        (StatusCode::OK, Json(session()))
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"code": 403, "error_code": "otp_expired", "msg": "Token has expired or is invalid"})),
        )
    }
}

async fn resend(
    State(provider): State<Arc<Provider>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    provider.record("resend", &headers, body);
    (StatusCode::OK, Json(json!({})))
}

async fn logout(
    State(provider): State<Arc<Provider>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    provider.record("logout", &headers, body);
    StatusCode::NO_CONTENT
}

/// Serve a fake provider under `/supabase` and return its base URL.
async fn spawn_provider() -> (String, Arc<Provider>) {
    let provider = Arc::new(Provider::default());
    let app = Router::new()
        .route("/supabase/auth/v1/signup", post(signup))
        .route("/supabase/auth/v1/token", post(token))
        .route("/supabase/auth/v1/verify", post(verify))
        .route("/supabase/auth/v1/resend", post(resend))
        .route("/supabase/auth/v1/logout", post(logout))
        .with_state(provider.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/supabase"), provider)
}

fn live(url: &str) -> LiveBackend {
    LiveBackend::new(url, SecretString::from(API_KEY.to_string())).unwrap()
}

#[tokio::test]
async fn sign_up_sends_profile_metadata() {
    let (url, provider) = spawn_provider().await;
    let backend = live(&url);

    let result = backend.sign_up("Ann", "ann@example.com", "pw123456").await;
    assert!(result.success);
    assert!(result.needs_verification);
    assert_eq!(result.message, "Check your email for the code.");
    assert_eq!(result.demo_code, None);

    let seen = provider.seen("signup");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].apikey.as_deref(), Some(API_KEY));
    assert_eq!(
        seen[0].authorization.as_deref(),
        Some(format!("Bearer {API_KEY}").as_str())
    );
    assert_eq!(seen[0].body["data"]["name"], "Ann");
    assert_eq!(seen[0].body["data"]["full_name"], "Ann");
}

#[tokio::test]
async fn sign_up_failure_carries_provider_message() {
    let (url, _provider) = spawn_provider().await;
    let backend = live(&url);

    let result = backend.sign_up("Ann", "taken@example.com", "pw123456").await;
    assert!(!result.success);
    assert_eq!(result.message, "User already registered");
}

#[tokio::test]
async fn controller_verifies_against_provider() {
    let (url, provider) = spawn_provider().await;
    let backend = Arc::new(live(&url));
    let controller = OtpController::new(backend.clone(), "ann@example.com");

    let outcome = controller.on_paste("654321").await.unwrap();
    assert_eq!(
        outcome,
        Some(VerifyOutcome::Rejected(
            "Token has expired or is invalid".to_string()
        ))
    );
    assert!(!backend.is_signed_in());

    let outcome = controller.on_paste(GOOD_CODE).await.unwrap();
    assert_eq!(outcome, Some(VerifyOutcome::Verified("Verified!".to_string())));
    assert!(backend.is_signed_in());
    assert_eq!(
        backend.current_profile().map(|profile| profile.name),
        Some("Ann Smith".to_string())
    );

    let seen = provider.seen("verify");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].body["email"], "ann@example.com");
    assert_eq!(seen[1].body["type"], "signup");
}

#[tokio::test]
async fn sign_in_then_sign_out_uses_session_token() {
    let (url, provider) = spawn_provider().await;
    let backend = live(&url);

    let denied = backend.sign_in("ann@example.com", "nope").await;
    assert!(!denied.success);
    assert_eq!(denied.message, "Invalid login credentials");

    let result = backend.sign_in("ann@example.com", "pw123456").await;
    assert!(result.success);
    assert_eq!(result.message, "Welcome back!");

    backend.sign_out().await;
    assert!(!backend.is_signed_in());

    let seen = provider.seen("logout");
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].authorization.as_deref(),
        Some(format!("Bearer {ACCESS_TOKEN}").as_str())
    );
}

#[tokio::test]
async fn sign_out_without_session_makes_no_call() {
    let (url, provider) = spawn_provider().await;
    let backend = live(&url);

    backend.sign_out().await;
    assert!(provider.seen("logout").is_empty());
}

#[tokio::test]
async fn resend_posts_signup_type() {
    let (url, provider) = spawn_provider().await;
    let backend = live(&url);

    let result = backend.resend_code("ann@example.com").await;
    assert!(result.success);
    assert_eq!(result.message, "Resent!");

    let seen = provider.seen("resend");
    assert_eq!(seen[0].body, json!({"type": "signup", "email": "ann@example.com"}));
}
