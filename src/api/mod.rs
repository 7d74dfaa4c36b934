#![allow(clippy::needless_for_each)]

use crate::auth::{AuthBackend, AuthResult, Backend, ResendResult, SignUpResult};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::sign_up,
        handlers::auth::verify,
        handlers::auth::resend,
        handlers::auth::login,
        handlers::auth::logout,
    ),
    components(
        schemas(
            handlers::health::Health,
            handlers::auth::SignUpRequest,
            handlers::auth::VerifyRequest,
            handlers::auth::ResendRequest,
            handlers::auth::LoginRequest,
            AuthResult,
            ResendResult,
            SignUpResult,
        )
    ),
    tags(
        (name = "auth", description = "Signup, email verification and login"),
        (name = "health", description = "Service status"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi())
}

/// All routes, with request-id, tracing and CORS layers, sharing `backend`.
pub fn router(backend: Arc<Backend>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/v1/auth/signup", post(handlers::sign_up))
        .route("/v1/auth/verify", post(handlers::verify))
        .route("/v1/auth/resend", post(handlers::resend))
        .route("/v1/auth/login", post(handlers::login))
        .route("/v1/auth/logout", post(handlers::logout))
        .route("/openapi.json", get(openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(backend.clone())),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(Extension(backend))
}

/// Bind `[::]:port` and serve until Ctrl-C.
///
/// # Errors
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(port: u16, backend: Arc<Backend>) -> Result<()> {
    let mode = backend.mode();
    let app = router(backend);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}, backend: {}", port, mode.as_str());

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    info_span!(
        "http.request",
        method = %request.method(),
        path = request.uri().path(),
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DemoBackend;
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn demo() -> Arc<Backend> {
        Arc::new(Backend::Demo(DemoBackend::default()))
    }

    async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn signup_body() -> Value {
        json!({
            "name": "Ann",
            "email": "ann@example.com",
            "password": "pw123456",
            "accept_terms": true
        })
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let app = router(demo());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(json["backend"], "demo");
    }

    #[tokio::test]
    async fn health_options_has_no_body() {
        let app = router(demo());
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn request_id_is_generated_and_propagated() {
        let app = router(demo());
        let request = Request::builder()
            .uri("/openapi.json")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let request_id = response.headers().get("x-request-id").unwrap();
        assert!(Ulid::from_string(request_id.to_str().unwrap()).is_ok());

        let app = router(demo());
        let request = Request::builder()
            .uri("/openapi.json")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
    }

    #[tokio::test]
    async fn openapi_lists_auth_routes() {
        let doc = serde_json::to_value(openapi()).unwrap();
        for path in [
            "/health",
            "/v1/auth/signup",
            "/v1/auth/verify",
            "/v1/auth/resend",
            "/v1/auth/login",
            "/v1/auth/logout",
        ] {
            assert!(doc["paths"].get(path).is_some(), "missing {path}");
        }
    }

    #[tokio::test]
    async fn signup_returns_demo_code() {
        let backend = demo();
        let (status, json) = post_json(router(backend.clone()), "/v1/auth/signup", &signup_body()).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["needs_verification"], true);

        let pending = backend.demo_store().unwrap().pending().unwrap();
        assert_eq!(json["demo_code"], pending.verification_code());
    }

    #[tokio::test]
    async fn signup_rejects_invalid_forms() {
        let mut body = signup_body();
        body["accept_terms"] = json!(false);
        let (status, json) = post_json(router(demo()), "/v1/auth/signup", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Please agree to the Terms of Service");

        let mut body = signup_body();
        body["email"] = json!("not-an-email");
        let (status, json) = post_json(router(demo()), "/v1/auth/signup", &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], handlers::auth::INVALID_EMAIL_MESSAGE);
    }

    #[tokio::test]
    async fn missing_payload_is_bad_request() {
        let app = router(demo());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/v1/auth/login")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn verify_rejects_malformed_code_without_backend_call() {
        let backend = demo();
        post_json(router(backend.clone()), "/v1/auth/signup", &signup_body()).await;

        let (status, json) = post_json(
            router(backend.clone()),
            "/v1/auth/verify",
            &json!({"email": "ann@example.com", "code": "12ab"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Please enter all 6 digits.");
        assert!(backend.demo_store().unwrap().pending().is_some());
    }

    #[tokio::test]
    async fn verify_then_login_then_logout() {
        let backend = demo();
        post_json(router(backend.clone()), "/v1/auth/signup", &signup_body()).await;
        let code = backend
            .demo_store()
            .unwrap()
            .pending()
            .unwrap()
            .verification_code()
            .to_string();

        let (status, _) = post_json(
            router(backend.clone()),
            "/v1/auth/verify",
            &json!({"email": "ann@example.com", "code": code}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = post_json(
            router(backend.clone()),
            "/v1/auth/login",
            &json!({"email": "ANN@example.com", "password": "wrong-password"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);

        let (status, json) = post_json(
            router(backend.clone()),
            "/v1/auth/login",
            &json!({"email": "ANN@example.com", "password": "pw123456"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Welcome back, Ann!");
        assert!(backend.demo_store().unwrap().current_user().is_some());

        let (status, _) = post_json(router(backend.clone()), "/v1/auth/logout", &json!({})).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(backend.demo_store().unwrap().current_user().is_none());
    }

    #[tokio::test]
    async fn resend_returns_new_demo_code_that_verifies() {
        let backend = demo();
        let (_, signup) = post_json(router(backend.clone()), "/v1/auth/signup", &signup_body()).await;
        let first = signup["demo_code"].as_str().unwrap().to_string();

        let (status, resent) = post_json(
            router(backend.clone()),
            "/v1/auth/resend",
            &json!({"email": "ann@example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resent["success"], true);
        let code = resent["demo_code"].as_str().unwrap().to_string();
        assert_eq!(
            code,
            backend.demo_store().unwrap().pending().unwrap().verification_code()
        );

        if code != first {
            let (status, _) = post_json(
                router(backend.clone()),
                "/v1/auth/verify",
                &json!({"email": "ann@example.com", "code": first}),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (status, json) = post_json(
            router(backend.clone()),
            "/v1/auth/verify",
            &json!({"email": "ann@example.com", "code": code}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert!(backend.demo_store().unwrap().is_registered("ann@example.com"));
    }

    #[tokio::test]
    async fn resend_without_pending_registration_fails() {
        let (status, json) = post_json(
            router(demo()),
            "/v1/auth/resend",
            &json!({"email": "nobody@example.com"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "No pending registration found.");
        assert!(json.get("demo_code").is_none());
    }
}
