//! Async driver for [`OtpEntry`].
//!
//! The entry sits behind a mutex shared with the cooldown ticker. The lock is
//! never held across a backend call: a verification is started under the lock
//! (moving the entry to `Verifying`), awaited without it, and applied under it
//! again. Calls that arrive in between see `Verifying` and are rejected.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

use super::entry::{EntryError, InputOutcome, OtpEntry};
use super::mask::mask_email;
use crate::auth::AuthBackend;

/// How long a successful verification stays on screen before moving on.
pub const SUCCESS_DISPLAY_DELAY: Duration = Duration::from_secs(1);

const TICK: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified(String),
    Rejected(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResendOutcome {
    /// Cooldown still running or a resend is already outstanding; nothing was sent.
    NotAllowed,
    Sent(String),
    Failed(String),
}

/// One verification screen for `email`. Dropping it stops the cooldown ticker.
pub struct OtpController<B: AuthBackend> {
    backend: Arc<B>,
    email: String,
    entry: Arc<Mutex<OtpEntry>>,
    cooldown_restarted: Arc<Notify>,
    ticker: JoinHandle<()>,
}

impl<B: AuthBackend> OtpController<B> {
    /// Must be called within a Tokio runtime.
    pub fn new(backend: Arc<B>, email: impl Into<String>) -> Self {
        Self::with_entry(backend, email, OtpEntry::new())
    }

    pub fn with_entry(backend: Arc<B>, email: impl Into<String>, entry: OtpEntry) -> Self {
        let entry = Arc::new(Mutex::new(entry));
        let cooldown_restarted = Arc::new(Notify::new());
        let ticker = tokio::spawn(run_cooldown(entry.clone(), cooldown_restarted.clone()));

        Self {
            backend,
            email: email.into(),
            entry,
            cooldown_restarted,
            ticker,
        }
    }
}

impl<B: AuthBackend> OtpController<B> {
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn masked_email(&self) -> String {
        mask_email(&self.email)
    }

    /// Copy of the current entry state, for rendering.
    pub async fn snapshot(&self) -> OtpEntry {
        self.entry.lock().await.clone()
    }

    /// # Errors
    /// See [`OtpEntry::on_digit_input`].
    pub async fn on_digit_input(
        &self,
        index: usize,
        raw: &str,
    ) -> Result<Option<VerifyOutcome>, EntryError> {
        let outcome = self.entry.lock().await.on_digit_input(index, raw)?;
        self.follow(outcome).await
    }

    /// # Errors
    /// See [`OtpEntry::on_paste`].
    pub async fn on_paste(&self, clipboard_text: &str) -> Result<Option<VerifyOutcome>, EntryError> {
        let outcome = self.entry.lock().await.on_paste(clipboard_text)?;
        self.follow(outcome).await
    }

    /// # Errors
    /// See [`OtpEntry::on_backspace`].
    pub async fn on_backspace(&self, index: usize) -> Result<(), EntryError> {
        self.entry.lock().await.on_backspace(index)
    }

    /// # Errors
    /// See [`OtpEntry::on_arrow_left`].
    pub async fn on_arrow_left(&self, index: usize) -> Result<(), EntryError> {
        self.entry.lock().await.on_arrow_left(index)
    }

    /// # Errors
    /// See [`OtpEntry::on_arrow_right`].
    pub async fn on_arrow_right(&self, index: usize) -> Result<(), EntryError> {
        self.entry.lock().await.on_arrow_right(index)
    }

    /// Explicit submission of the current slots.
    ///
    /// # Errors
    /// See [`OtpEntry::submit`].
    pub async fn submit(&self) -> Result<VerifyOutcome, EntryError> {
        let code = self.entry.lock().await.submit()?;
        Ok(self.verify(code).await)
    }

    /// Request a new code. Does nothing while the cooldown runs.
    #[instrument(skip(self), fields(email = %self.masked_email()))]
    pub async fn resend(&self) -> ResendOutcome {
        if !self.entry.lock().await.begin_resend() {
            debug!("resend not allowed yet");
            return ResendOutcome::NotAllowed;
        }

        let result = self.backend.resend_code(&self.email).await;

        self.entry.lock().await.finish_resend(&result);
        if result.success {
            self.cooldown_restarted.notify_one();
            info!("verification code resent");
            ResendOutcome::Sent(result.message)
        } else {
            ResendOutcome::Failed(result.message)
        }
    }

    async fn follow(&self, outcome: InputOutcome) -> Result<Option<VerifyOutcome>, EntryError> {
        match outcome {
            InputOutcome::Updated => Ok(None),
            InputOutcome::Submit(code) => Ok(Some(self.verify(code).await)),
        }
    }

    #[instrument(skip(self, code), fields(email = %self.masked_email()))]
    async fn verify(&self, code: String) -> VerifyOutcome {
        let result = self.backend.verify_code(&self.email, &code).await;

        let mut entry = self.entry.lock().await;
        entry.finish_verification(&result);

        if result.success {
            info!("email verified");
            VerifyOutcome::Verified(result.message)
        } else {
            debug!("verification rejected");
            VerifyOutcome::Rejected(
                entry
                    .error_message()
                    .map_or(result.message.clone(), ToString::to_string),
            )
        }
    }
}

impl<B: AuthBackend> Drop for OtpController<B> {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// Decrement the cooldown once per second until it reaches zero, then wait for
/// a restart.
async fn run_cooldown(entry: Arc<Mutex<OtpEntry>>, restarted: Arc<Notify>) {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut running = entry.lock().await.resend_cooldown_seconds() > 0;

    loop {
        tokio::select! {
            _ = ticker.tick(), if running => {
                running = entry.lock().await.tick() > 0;
            }
            () = restarted.notified() => {
                ticker.reset();
                running = entry.lock().await.resend_cooldown_seconds() > 0;
            }
        }
    }
}
