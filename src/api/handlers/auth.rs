//! JSON endpoints over the [`AuthBackend`] capabilities.
//!
//! Capability outcomes are returned as-is; the HTTP status only mirrors the
//! `success` flag.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::auth::{AuthBackend, AuthResult, Backend, ResendResult, SignUpResult};
use crate::forms::{valid_email, validate_signup};
use crate::otp::{EntryError, CODE_LENGTH};

pub const MISSING_PAYLOAD_MESSAGE: &str = "Missing payload";
pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";

#[derive(ToSchema, Deserialize)]
pub struct SignUpRequest {
    name: String,
    email: String,
    password: String,
    /// Must be `true`: the Terms of Service were accepted.
    #[serde(default)]
    accept_terms: bool,
}

#[derive(ToSchema, Deserialize)]
pub struct VerifyRequest {
    email: String,
    code: String,
}

#[derive(ToSchema, Deserialize)]
pub struct ResendRequest {
    email: String,
}

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

fn respond(result: AuthResult, failure: StatusCode) -> (StatusCode, Json<AuthResult>) {
    let status = if result.success {
        StatusCode::OK
    } else {
        failure
    };
    (status, Json(result))
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<AuthResult>) {
    (StatusCode::BAD_REQUEST, Json(AuthResult::failed(message)))
}

#[utoipa::path(
    post,
    path= "/v1/auth/signup",
    request_body = SignUpRequest,
    responses (
        (status = 201, description = "Registration started", body = SignUpResult),
        (status = 400, description = "Invalid form or rejected by the identity provider", body = SignUpResult),
    ),
    tag = "auth",
)]
#[instrument(skip(backend, payload))]
pub async fn sign_up(
    backend: Extension<Arc<Backend>>,
    payload: Option<Json<SignUpRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(SignUpResult::failed(MISSING_PAYLOAD_MESSAGE)),
        );
    };

    if let Err(e) = validate_signup(
        &request.name,
        &request.email,
        &request.password,
        request.accept_terms,
    ) {
        debug!("signup form rejected: {e}");
        return (StatusCode::BAD_REQUEST, Json(SignUpResult::failed(e.to_string())));
    }

    if !valid_email(&request.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(SignUpResult::failed(INVALID_EMAIL_MESSAGE)),
        );
    }

    let result = backend
        .sign_up(&request.name, &request.email, &request.password)
        .await;

    if result.success {
        (StatusCode::CREATED, Json(result))
    } else {
        (StatusCode::BAD_REQUEST, Json(result))
    }
}

#[utoipa::path(
    post,
    path= "/v1/auth/verify",
    request_body = VerifyRequest,
    responses (
        (status = 200, description = "Email verified", body = AuthResult),
        (status = 400, description = "Malformed or rejected code", body = AuthResult),
    ),
    tag = "auth",
)]
#[instrument(skip(backend, payload))]
pub async fn verify(
    backend: Extension<Arc<Backend>>,
    payload: Option<Json<VerifyRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return bad_request(MISSING_PAYLOAD_MESSAGE);
    };

    let code = request.code.trim();
    if code.len() != CODE_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
        return bad_request(EntryError::IncompleteCode.to_string());
    }

    respond(
        backend.verify_code(&request.email, code).await,
        StatusCode::BAD_REQUEST,
    )
}

#[utoipa::path(
    post,
    path= "/v1/auth/resend",
    request_body = ResendRequest,
    responses (
        (status = 200, description = "A new code was sent", body = ResendResult),
        (status = 400, description = "Resend rejected", body = ResendResult),
    ),
    tag = "auth",
)]
#[instrument(skip(backend, payload))]
pub async fn resend(
    backend: Extension<Arc<Backend>>,
    payload: Option<Json<ResendRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ResendResult::new(
                AuthResult::failed(MISSING_PAYLOAD_MESSAGE),
                None,
            )),
        );
    };

    let result = backend.resend_code(&request.email).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    // demo mode never sends email, so the regenerated code goes back to the client
    let demo_code = backend
        .demo_store()
        .and_then(|store| store.pending())
        .map(|pending| pending.verification_code().to_string());

    (status, Json(ResendResult::new(result, demo_code)))
}

#[utoipa::path(
    post,
    path= "/v1/auth/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Signed in", body = AuthResult),
        (status = 400, description = "Missing payload", body = AuthResult),
        (status = 401, description = "Unknown account or wrong password", body = AuthResult),
    ),
    tag = "auth",
)]
#[instrument(skip(backend, payload))]
pub async fn login(
    backend: Extension<Arc<Backend>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return bad_request(MISSING_PAYLOAD_MESSAGE);
    };

    respond(
        backend.sign_in(&request.email, &request.password).await,
        StatusCode::UNAUTHORIZED,
    )
}

#[utoipa::path(
    post,
    path= "/v1/auth/logout",
    responses (
        (status = 204, description = "Signed out"),
    ),
    tag = "auth",
)]
pub async fn logout(backend: Extension<Arc<Backend>>) -> impl IntoResponse {
    backend.sign_out().await;
    StatusCode::NO_CONTENT
}
