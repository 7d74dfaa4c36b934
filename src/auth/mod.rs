//! Capability interface to the identity provider and its two implementations.
//!
//! Every capability resolves to a result value carrying `success` and a
//! user-facing `message`; provider and transport failures are never raised as
//! errors past this boundary.

pub mod demo;
pub mod live;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::cli::globals::GlobalArgs;

pub use demo::{DemoBackend, DemoError, DemoStore, DemoUser, PendingRegistration};
pub use live::{LiveBackend, UserProfile};

#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub success: bool,
    pub message: String,
}

impl AuthResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpResult {
    pub success: bool,
    pub message: String,
    pub needs_verification: bool,
    /// Verification code, only ever set by the demo backend so it can be shown
    /// on screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_code: Option<String>,
}

impl SignUpResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            needs_verification: false,
            demo_code: None,
        }
    }
}

/// Outcome of a resend; the demo backend also hands back the new code.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_code: Option<String>,
}

impl ResendResult {
    #[must_use]
    pub fn new(result: AuthResult, demo_code: Option<String>) -> Self {
        Self {
            success: result.success,
            message: result.message,
            demo_code: demo_code.filter(|_| result.success),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendMode {
    Live,
    Demo,
}

impl BackendMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Demo => "demo",
        }
    }
}

/// Signup, sign-in and email verification capabilities of an identity provider.
pub trait AuthBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> impl Future<Output = SignUpResult> + Send;

    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = AuthResult> + Send;

    fn sign_out(&self) -> impl Future<Output = ()> + Send;

    fn verify_code(&self, email: &str, code: &str) -> impl Future<Output = AuthResult> + Send;

    fn resend_code(&self, email: &str) -> impl Future<Output = AuthResult> + Send;
}

/// The backend chosen at startup.
#[derive(Debug)]
pub enum Backend {
    Live(LiveBackend),
    Demo(DemoBackend),
}

impl Backend {
    /// Live backend when the provider is configured, demo backend otherwise.
    ///
    /// # Errors
    /// Returns an error if the provider is configured but its URL cannot be
    /// parsed or the HTTP client cannot be built.
    pub fn select(globals: &GlobalArgs) -> Result<Self> {
        if globals.is_configured() {
            let live = LiveBackend::new(&globals.provider_url, globals.provider_key.clone())
                .context("Failed to configure the identity provider")?;
            info!(provider = %live.base_url(), "Using live identity provider");
            Ok(Self::Live(live))
        } else {
            warn!("Identity provider not configured, falling back to the in-memory demo backend");
            Ok(Self::Demo(DemoBackend::default()))
        }
    }

    /// The demo store, when running on the demo backend.
    #[must_use]
    pub fn demo_store(&self) -> Option<&DemoStore> {
        match self {
            Self::Live(_) => None,
            Self::Demo(demo) => Some(demo.store()),
        }
    }
}

impl AuthBackend for Backend {
    fn mode(&self) -> BackendMode {
        match self {
            Self::Live(live) => live.mode(),
            Self::Demo(demo) => demo.mode(),
        }
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> SignUpResult {
        match self {
            Self::Live(live) => live.sign_up(name, email, password).await,
            Self::Demo(demo) => demo.sign_up(name, email, password).await,
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult {
        match self {
            Self::Live(live) => live.sign_in(email, password).await,
            Self::Demo(demo) => demo.sign_in(email, password).await,
        }
    }

    async fn sign_out(&self) {
        match self {
            Self::Live(live) => live.sign_out().await,
            Self::Demo(demo) => demo.sign_out().await,
        }
    }

    async fn verify_code(&self, email: &str, code: &str) -> AuthResult {
        match self {
            Self::Live(live) => live.verify_code(email, code).await,
            Self::Demo(demo) => demo.verify_code(email, code).await,
        }
    }

    async fn resend_code(&self, email: &str) -> AuthResult {
        match self {
            Self::Live(live) => live.resend_code(email).await,
            Self::Demo(demo) => demo.resend_code(email).await,
        }
    }
}
