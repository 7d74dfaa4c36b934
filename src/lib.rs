//! # Otpgate (Email Verification over One-Time Passcodes)
//!
//! `otpgate` drives the signup, email verification and login lifecycle of an
//! account that lives in a hosted identity provider, or in an in-memory demo
//! backend when no provider is configured.
//!
//! ## OTP Entry
//!
//! Verification codes are six decimal digits entered into six single-digit
//! slots. [`otp::OtpEntry`] is the pure state machine
//! (`Editing -> Verifying -> {Success, Error}`) and [`otp::OtpController`]
//! runs it against an [`auth::AuthBackend`]:
//!
//! - **Auto-submit:** filling the last slot (by typing or pasting) starts a
//!   verification without an explicit submit.
//! - **Single in-flight verification:** while a verification is outstanding
//!   every input and submit is rejected, not queued.
//! - **Resend cooldown:** resending is only possible once the one-second
//!   ticker has drained the cooldown (60 seconds by default) to zero.
//!
//! ## Backends
//!
//! [`auth::Backend::select`] picks the live provider adapter when both the
//! provider URL and key are present, and the demo backend otherwise. The demo
//! backend stores credentials in memory and in plaintext; it must never be
//! used for real accounts.

pub mod api;
pub mod auth;
pub mod cli;
pub mod forms;
pub mod otp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
