//! HTTP adapter for the hosted identity provider (GoTrue-style `/auth/v1` API).

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, instrument};
use url::Url;

use super::{AuthBackend, AuthResult, BackendMode, SignUpResult};
use crate::APP_USER_AGENT;

pub const SIGNUP_MESSAGE: &str = "Check your email for the code.";
pub const SIGNIN_MESSAGE: &str = "Welcome back!";
pub const VERIFIED_MESSAGE: &str = "Verified!";
pub const RESENT_MESSAGE: &str = "Resent!";

const DEFAULT_USER_NAME: &str = "User";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl UserProfile {
    /// Build a profile from the provider's `user` object. The display name
    /// comes from `user_metadata.name`, then `user_metadata.full_name`.
    #[must_use]
    pub fn from_provider_user(user: &Value) -> Option<Self> {
        let id = user.get("id")?.as_str()?.to_string();
        let metadata = &user["user_metadata"];
        let name = non_empty_str(&metadata["name"])
            .or_else(|| non_empty_str(&metadata["full_name"]))
            .unwrap_or(DEFAULT_USER_NAME)
            .to_string();

        Some(Self {
            id,
            name,
            email: user["email"].as_str().unwrap_or_default().to_string(),
            avatar: non_empty_str(&metadata["avatar_url"]).map(ToString::to_string),
        })
    }
}

#[derive(Debug)]
struct LiveSession {
    access_token: SecretString,
    profile: Option<UserProfile>,
}

#[derive(Debug)]
pub struct LiveBackend {
    client: Client,
    base_url: Url,
    api_key: SecretString,
    session: Mutex<Option<LiveSession>>,
}

impl LiveBackend {
    /// # Errors
    /// Returns an error if `provider_url` is not an absolute URL or the HTTP
    /// client cannot be built.
    pub fn new(provider_url: &str, api_key: SecretString) -> Result<Self> {
        let mut base_url = Url::parse(provider_url)
            .with_context(|| format!("Invalid provider URL: {provider_url}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Provider URL cannot be a base: {provider_url}"));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
            session: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Profile of the signed-in user, if any.
    #[must_use]
    pub fn current_profile(&self) -> Option<UserProfile> {
        self.session()
            .as_ref()
            .and_then(|session| session.profile.clone())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session().is_some()
    }

    fn session(&self) -> MutexGuard<'_, Option<LiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid provider endpoint: {path}"))
    }

    /// Keep the session returned by sign-in or verification, if any.
    fn store_session(&self, body: &Value) -> bool {
        let Some(token) = non_empty_str(&body["access_token"]) else {
            return false;
        };
        *self.session() = Some(LiveSession {
            access_token: SecretString::from(token.to_string()),
            profile: UserProfile::from_provider_user(&body["user"]),
        });
        true
    }

    /// POST a JSON body and decode the response. A provider rejection becomes
    /// an error whose message is the provider's text.
    async fn post(
        &self,
        path: &str,
        bearer: Option<&SecretString>,
        body: &Value,
    ) -> Result<Value> {
        let url = self.endpoint(path)?;
        let bearer = bearer.unwrap_or(&self.api_key);

        let response = self
            .client
            .post(url)
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(bearer.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let json: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        if status.is_success() {
            Ok(json)
        } else {
            let message = error_message(status, &json);
            debug!("identity provider {path} failed: {status} {message}");
            Err(anyhow!(message))
        }
    }

    /// Log a failed call and turn it into a user-facing message.
    fn failure_message(path: &str, err: &anyhow::Error) -> String {
        error!("Error calling identity provider {path}: {err:#}");
        err.to_string()
    }
}

impl AuthBackend for LiveBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> SignUpResult {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "name": name, "full_name": name },
        });

        match self.post("auth/v1/signup", None, &body).await {
            Ok(_) => SignUpResult {
                success: true,
                message: SIGNUP_MESSAGE.to_string(),
                needs_verification: true,
                demo_code: None,
            },
            Err(err) => SignUpResult::failed(Self::failure_message("signup", &err)),
        }
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult {
        let body = json!({ "email": email, "password": password });

        match self
            .post("auth/v1/token?grant_type=password", None, &body)
            .await
        {
            Ok(response) if self.store_session(&response) => AuthResult::ok(SIGNIN_MESSAGE),
            Ok(_) => AuthResult::failed("Identity provider returned no session"),
            Err(err) => AuthResult::failed(Self::failure_message("token", &err)),
        }
    }

    async fn sign_out(&self) {
        let Some(session) = self.session().take() else {
            return;
        };

        if let Err(err) = self
            .post("auth/v1/logout", Some(&session.access_token), &json!({}))
            .await
        {
            error!("Failed to sign out from identity provider: {err:#}");
        }
    }

    #[instrument(skip(self, code))]
    async fn verify_code(&self, email: &str, code: &str) -> AuthResult {
        let body = json!({ "type": "signup", "email": email, "token": code });

        match self.post("auth/v1/verify", None, &body).await {
            Ok(response) => {
                self.store_session(&response);
                AuthResult::ok(VERIFIED_MESSAGE)
            }
            Err(err) => AuthResult::failed(Self::failure_message("verify", &err)),
        }
    }

    #[instrument(skip(self))]
    async fn resend_code(&self, email: &str) -> AuthResult {
        let body = json!({ "type": "signup", "email": email });

        match self.post("auth/v1/resend", None, &body).await {
            Ok(_) => AuthResult::ok(RESENT_MESSAGE),
            Err(err) => AuthResult::failed(Self::failure_message("resend", &err)),
        }
    }
}

/// Pick the provider's error text out of a failure body.
fn error_message(status: StatusCode, body: &Value) -> String {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| non_empty_str(&body[*key]))
        .map_or_else(
            || format!("Request failed ({})", status.as_u16()),
            ToString::to_string,
        )
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}
