//! In-memory stand-in for the identity provider.
//!
//! Confirmed users, the single pending registration and the current session
//! all sit behind one mutex, so promoting a pending registration is atomic
//! with the duplicate-email check.
//!
//! Passwords are kept in plaintext and compared verbatim. This backend exists
//! for demonstrations only and must never see real credentials.

use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::{AuthBackend, AuthResult, BackendMode, SignUpResult};
use crate::otp::entry::INVALID_CODE_MESSAGE;

pub const CODE_SENT_MESSAGE: &str = "Verification code sent!";
pub const ACCOUNT_CREATED_MESSAGE: &str = "Account created successfully!";
pub const CODE_REGENERATED_MESSAGE: &str = "A new verification code has been generated.";

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DemoError {
    #[error("An account with this email already exists.")]
    DuplicateEmail,
    #[error("No pending registration found.")]
    NoPendingRegistration,
    #[error("No account found with this email. Please sign up first.")]
    NoSuchAccount,
    #[error("Incorrect password. Please try again.")]
    InvalidCredentials,
    #[error("Invalid verification code. Please try again.")]
    InvalidCode,
}

#[derive(Clone, Debug)]
pub struct DemoUser {
    pub name: String,
    pub email: String,
    password: SecretString,
}

impl DemoUser {
    fn matches_email(&self, email: &str) -> bool {
        same_email(&self.email, email)
    }
}

#[derive(Clone, Debug)]
pub struct PendingRegistration {
    pub name: String,
    pub email: String,
    password: SecretString,
    verification_code: String,
}

impl PendingRegistration {
    #[must_use]
    pub fn verification_code(&self) -> &str {
        &self.verification_code
    }
}

#[derive(Debug, Default)]
struct DemoState {
    users: Vec<DemoUser>,
    pending: Option<PendingRegistration>,
    current: Option<DemoUser>,
}

impl DemoState {
    fn is_registered(&self, email: &str) -> bool {
        self.users.iter().any(|user| user.matches_email(email))
    }

    fn promote_pending(&mut self) -> Result<DemoUser, DemoError> {
        let pending = self
            .pending
            .take()
            .ok_or(DemoError::NoPendingRegistration)?;

        if self.is_registered(&pending.email) {
            return Err(DemoError::DuplicateEmail);
        }

        let user = DemoUser {
            name: pending.name,
            email: pending.email,
            password: pending.password,
        };
        self.users.push(user.clone());
        Ok(user)
    }
}

/// Process-wide registry of demo accounts.
#[derive(Debug, Default)]
pub struct DemoStore {
    state: Mutex<DemoState>,
}

impl DemoStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DemoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold a new registration and return its verification code.
    ///
    /// Any previous pending registration is replaced.
    ///
    /// # Errors
    /// [`DemoError::DuplicateEmail`] if a confirmed user already has this email.
    #[instrument(skip(self, password))]
    pub fn start_registration(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, DemoError> {
        let mut state = self.state();
        if state.is_registered(email) {
            return Err(DemoError::DuplicateEmail);
        }

        let code = generate_code();
        state.pending = Some(PendingRegistration {
            name: name.to_string(),
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
            verification_code: code.clone(),
        });
        debug!("pending registration stored");

        Ok(code)
    }

    /// Promote the pending registration to a confirmed user without checking
    /// any code.
    ///
    /// # Errors
    /// [`DemoError::NoPendingRegistration`] if nothing is pending.
    pub fn complete_registration(&self) -> Result<DemoUser, DemoError> {
        let user = self.state().promote_pending()?;
        info!(email = %user.email, "demo registration completed");
        Ok(user)
    }

    /// Check `code` against the pending registration for `email` and promote
    /// it on a match.
    ///
    /// # Errors
    /// [`DemoError::NoPendingRegistration`] if nothing is pending for `email`,
    /// [`DemoError::InvalidCode`] if the code does not match.
    #[instrument(skip(self, code))]
    pub fn confirm_registration(&self, email: &str, code: &str) -> Result<DemoUser, DemoError> {
        let mut state = self.state();
        let pending = state
            .pending
            .as_ref()
            .filter(|pending| same_email(&pending.email, email))
            .ok_or(DemoError::NoPendingRegistration)?;

        if pending.verification_code != code {
            return Err(DemoError::InvalidCode);
        }

        let user = state.promote_pending()?;
        info!(email = %user.email, "demo registration verified");
        Ok(user)
    }

    /// Replace the pending registration's code. Returns the new code, or
    /// `None` if nothing is pending.
    pub fn regenerate_code(&self) -> Option<String> {
        let mut state = self.state();
        let pending = state.pending.as_mut()?;
        pending.verification_code = generate_code();
        Some(pending.verification_code.clone())
    }

    pub fn clear_pending(&self) {
        self.state().pending = None;
    }

    /// # Errors
    /// [`DemoError::NoSuchAccount`] for an unknown email,
    /// [`DemoError::InvalidCredentials`] for a wrong password.
    #[instrument(skip(self, password))]
    pub fn login_user(&self, email: &str, password: &str) -> Result<String, DemoError> {
        let mut state = self.state();
        let user = state
            .users
            .iter()
            .find(|user| user.matches_email(email))
            .cloned()
            .ok_or(DemoError::NoSuchAccount)?;

        if user.password.expose_secret() != password {
            return Err(DemoError::InvalidCredentials);
        }

        let welcome = format!("Welcome back, {}!", user.name);
        state.current = Some(user);
        Ok(welcome)
    }

    /// End the session and drop any registration that was never confirmed.
    pub fn logout_user(&self) {
        let mut state = self.state();
        state.current = None;
        state.pending = None;
    }

    #[must_use]
    pub fn current_user(&self) -> Option<DemoUser> {
        self.state().current.clone()
    }

    #[must_use]
    pub fn pending(&self) -> Option<PendingRegistration> {
        self.state().pending.clone()
    }

    #[must_use]
    pub fn is_registered(&self, email: &str) -> bool {
        self.state().is_registered(email)
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.state().users.len()
    }
}

/// [`AuthBackend`] over a shared [`DemoStore`].
#[derive(Clone, Debug, Default)]
pub struct DemoBackend {
    store: Arc<DemoStore>,
}

impl DemoBackend {
    #[must_use]
    pub fn new(store: Arc<DemoStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &DemoStore {
        &self.store
    }
}

impl AuthBackend for DemoBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Demo
    }

    async fn sign_up(&self, name: &str, email: &str, password: &str) -> SignUpResult {
        match self.store.start_registration(name, email, password) {
            Ok(code) => SignUpResult {
                success: true,
                message: CODE_SENT_MESSAGE.to_string(),
                needs_verification: true,
                demo_code: Some(code),
            },
            Err(err) => SignUpResult::failed(err.to_string()),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult {
        match self.store.login_user(email, password) {
            Ok(welcome) => AuthResult::ok(welcome),
            Err(err) => AuthResult::failed(err.to_string()),
        }
    }

    async fn sign_out(&self) {
        self.store.logout_user();
    }

    async fn verify_code(&self, email: &str, code: &str) -> AuthResult {
        match self.store.confirm_registration(email, code) {
            Ok(_) => AuthResult::ok(ACCOUNT_CREATED_MESSAGE),
            Err(DemoError::InvalidCode) => AuthResult::failed(INVALID_CODE_MESSAGE),
            Err(err) => AuthResult::failed(err.to_string()),
        }
    }

    async fn resend_code(&self, email: &str) -> AuthResult {
        let pending_for_email = self
            .store
            .pending()
            .is_some_and(|pending| same_email(&pending.email, email));
        if !pending_for_email {
            return AuthResult::failed(DemoError::NoPendingRegistration.to_string());
        }

        match self.store.regenerate_code() {
            Some(_) => AuthResult::ok(CODE_REGENERATED_MESSAGE),
            None => AuthResult::failed(DemoError::NoPendingRegistration.to_string()),
        }
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user() -> DemoStore {
        let store = DemoStore::new();
        store
            .start_registration("Ann", "a@x.com", "pw123456")
            .unwrap();
        store.complete_registration().unwrap();
        store
    }

    #[test]
    fn generated_codes_are_six_digits_in_range() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
    }

    #[test]
    fn start_registration_holds_single_pending_slot() {
        let store = DemoStore::new();
        let first = store.start_registration("Ann", "a@x.com", "pw1").unwrap();
        let pending = store.pending().unwrap();
        assert_eq!(pending.verification_code(), first);

        store.start_registration("Bob", "b@x.com", "pw2").unwrap();
        let pending = store.pending().unwrap();
        assert_eq!(pending.email, "b@x.com");
        assert_eq!(pending.name, "Bob");
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn start_registration_rejects_confirmed_email_case_insensitively() {
        let store = store_with_user();
        assert_eq!(
            store.start_registration("Ann2", "A@X.COM", "pw2"),
            Err(DemoError::DuplicateEmail)
        );
        assert!(store.pending().is_none());
    }

    #[test]
    fn complete_registration_requires_pending() {
        let store = DemoStore::new();
        assert_eq!(
            store.complete_registration().unwrap_err(),
            DemoError::NoPendingRegistration
        );
    }

    #[test]
    fn complete_registration_promotes_and_clears_pending() {
        let store = DemoStore::new();
        store.start_registration("Ann", "a@x.com", "pw").unwrap();
        let user = store.complete_registration().unwrap();
        assert_eq!(user.name, "Ann");
        assert!(store.pending().is_none());
        assert!(store.is_registered("A@x.com"));
    }

    #[test]
    fn confirm_registration_checks_code_and_email() {
        let store = DemoStore::new();
        let code = store.start_registration("Ann", "a@x.com", "pw").unwrap();
        let wrong = if code == "100000" { "100001" } else { "100000" };

        assert_eq!(
            store.confirm_registration("a@x.com", wrong).unwrap_err(),
            DemoError::InvalidCode
        );
        assert_eq!(
            store.confirm_registration("other@x.com", &code).unwrap_err(),
            DemoError::NoPendingRegistration
        );
        assert!(store.pending().is_some());

        store.confirm_registration("A@X.com", &code).unwrap();
        assert!(store.is_registered("a@x.com"));
        assert!(store.pending().is_none());
    }

    #[test]
    fn regenerate_code_replaces_pending_code() {
        let store = DemoStore::new();
        assert_eq!(store.regenerate_code(), None);

        store.start_registration("Ann", "a@x.com", "pw").unwrap();
        let fresh = store.regenerate_code().unwrap();
        assert_eq!(store.pending().unwrap().verification_code(), fresh);
    }

    #[test]
    fn clear_pending_discards_registration() {
        let store = DemoStore::new();
        store.start_registration("Ann", "a@x.com", "pw").unwrap();
        store.clear_pending();
        assert!(store.pending().is_none());
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn login_user_matches_email_case_insensitively() {
        let store = store_with_user();
        assert_eq!(
            store.login_user("A@X.com", "pw123456").unwrap(),
            "Welcome back, Ann!"
        );
        assert_eq!(store.current_user().unwrap().email, "a@x.com");
    }

    #[test]
    fn login_user_distinguishes_failures() {
        let store = store_with_user();
        assert_eq!(
            store.login_user("a@x.com", "wrong"),
            Err(DemoError::InvalidCredentials)
        );
        assert_eq!(
            store.login_user("nobody@x.com", "x"),
            Err(DemoError::NoSuchAccount)
        );
        assert!(store.current_user().is_none());
    }

    #[test]
    fn login_password_compare_is_exact() {
        let store = store_with_user();
        assert_eq!(
            store.login_user("a@x.com", "PW123456"),
            Err(DemoError::InvalidCredentials)
        );
    }

    #[test]
    fn logout_clears_session() {
        let store = store_with_user();
        store.login_user("a@x.com", "pw123456").unwrap();
        store.logout_user();
        assert!(store.current_user().is_none());
    }

    #[test]
    fn logout_discards_unconfirmed_registration() {
        let store = DemoStore::new();
        store.start_registration("Ann", "a@x.com", "pw123456").unwrap();
        store.logout_user();

        assert!(store.pending().is_none());
        assert!(matches!(
            store.complete_registration(),
            Err(DemoError::NoPendingRegistration)
        ));
        assert!(!store.is_registered("a@x.com"));
    }

    #[test]
    fn debug_output_never_shows_passwords() {
        let store = store_with_user();
        store.start_registration("Bob", "b@x.com", "hunter22").unwrap();
        let rendered = format!("{store:?}");
        assert!(!rendered.contains("pw123456"));
        assert!(!rendered.contains("hunter22"));
    }

    #[tokio::test]
    async fn backend_signup_exposes_demo_code() {
        let backend = DemoBackend::default();
        let result = backend.sign_up("Ann", "a@x.com", "pw123456").await;
        assert!(result.success);
        assert!(result.needs_verification);
        assert_eq!(result.message, CODE_SENT_MESSAGE);
        let pending = backend.store().pending().unwrap();
        assert_eq!(result.demo_code.as_deref(), Some(pending.verification_code()));
    }

    #[tokio::test]
    async fn backend_signup_reports_duplicate() {
        let backend = DemoBackend::default();
        backend.sign_up("Ann", "a@x.com", "pw123456").await;
        backend.store().complete_registration().unwrap();

        let result = backend.sign_up("Ann2", "A@x.com", "pw2").await;
        assert!(!result.success);
        assert_eq!(result.message, "An account with this email already exists.");
        assert_eq!(result.demo_code, None);
    }

    #[tokio::test]
    async fn backend_verify_and_sign_in() {
        let backend = DemoBackend::default();
        let code = backend
            .sign_up("Ann", "a@x.com", "pw123456")
            .await
            .demo_code
            .unwrap();

        let bad = backend.verify_code("a@x.com", "abcdef").await;
        assert_eq!(bad, AuthResult::failed(INVALID_CODE_MESSAGE));

        let good = backend.verify_code("a@x.com", &code).await;
        assert_eq!(good, AuthResult::ok(ACCOUNT_CREATED_MESSAGE));

        let signed_in = backend.sign_in("a@x.com", "pw123456").await;
        assert_eq!(signed_in, AuthResult::ok("Welcome back, Ann!"));

        backend.sign_out().await;
        assert!(backend.store().current_user().is_none());
    }

    #[tokio::test]
    async fn backend_resend_requires_pending_for_email() {
        let backend = DemoBackend::default();
        let none = backend.resend_code("a@x.com").await;
        assert_eq!(none, AuthResult::failed("No pending registration found."));

        backend.sign_up("Ann", "a@x.com", "pw123456").await;
        let other = backend.resend_code("b@x.com").await;
        assert!(!other.success);

        let resent = backend.resend_code("A@x.com").await;
        assert_eq!(resent, AuthResult::ok(CODE_REGENERATED_MESSAGE));
    }
}
