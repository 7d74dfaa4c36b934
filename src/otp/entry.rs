//! Six-slot OTP entry state machine.
//!
//! All input handling is synchronous and side-effect free: when an input
//! completes the code, the entry moves itself to [`Phase::Verifying`] and hands
//! the assembled code back to the caller, who performs the verification call
//! and reports the result through [`OtpEntry::finish_verification`].

use thiserror::Error;

use crate::auth::AuthResult;

pub const CODE_LENGTH: usize = 6;
const LAST_SLOT: usize = CODE_LENGTH - 1;

pub const DEFAULT_RESEND_COOLDOWN_SECONDS: u32 = 60;

pub const INCOMPLETE_CODE_MESSAGE: &str = "Please enter all 6 digits.";
pub const INVALID_CODE_MESSAGE: &str = "Invalid verification code. Please try again.";
pub const VERIFIED_MESSAGE: &str = "Email verified successfully!";
pub const RESENT_MESSAGE: &str = "Verification email resent! Check your inbox.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Editing,
    Verifying,
    Error,
    Success,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("input is not a single decimal digit")]
    NotADigit,
    #[error("slot {0} is out of range")]
    IndexOutOfRange(usize),
    #[error("Please enter all 6 digits.")]
    IncompleteCode,
    #[error("a verification is already in progress")]
    VerificationInFlight,
    #[error("the code has already been verified")]
    AlreadyVerified,
}

/// Result of an accepted input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputOutcome {
    Updated,
    /// Every slot is filled and the entry moved to `Verifying`; the caller must
    /// verify this code and report back.
    Submit(String),
}

#[derive(Clone, Debug)]
pub struct OtpEntry {
    digits: [Option<char>; CODE_LENGTH],
    focus_index: usize,
    phase: Phase,
    error_message: Option<String>,
    success_message: Option<String>,
    resend_cooldown_seconds: u32,
    cooldown_reset_value: u32,
    is_resending: bool,
}

impl Default for OtpEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cooldown(DEFAULT_RESEND_COOLDOWN_SECONDS)
    }

    /// Entry whose resend cooldown starts at, and resets to, `seconds`.
    #[must_use]
    pub fn with_cooldown(seconds: u32) -> Self {
        Self {
            digits: [None; CODE_LENGTH],
            focus_index: 0,
            phase: Phase::Editing,
            error_message: None,
            success_message: None,
            resend_cooldown_seconds: seconds,
            cooldown_reset_value: seconds,
            is_resending: false,
        }
    }

    #[must_use]
    pub fn digits(&self) -> &[Option<char>; CODE_LENGTH] {
        &self.digits
    }

    /// The slots joined left to right, skipping empty ones.
    #[must_use]
    pub fn code(&self) -> String {
        self.digits.iter().flatten().collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.digits.iter().all(Option::is_some)
    }

    #[must_use]
    pub fn focus_index(&self) -> usize {
        self.focus_index
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_verifying(&self) -> bool {
        self.phase == Phase::Verifying
    }

    #[must_use]
    pub fn is_resending(&self) -> bool {
        self.is_resending
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    #[must_use]
    pub fn success_message(&self) -> Option<&str> {
        self.success_message.as_deref()
    }

    #[must_use]
    pub fn resend_cooldown_seconds(&self) -> u32 {
        self.resend_cooldown_seconds
    }

    /// Type (or clear, with an empty `raw`) the slot at `index`.
    ///
    /// # Errors
    /// Rejects input while verifying or after success, for an out-of-range
    /// slot, and for anything but a single ASCII digit. Rejected input leaves
    /// the entry untouched.
    pub fn on_digit_input(&mut self, index: usize, raw: &str) -> Result<InputOutcome, EntryError> {
        self.ensure_editable()?;
        let slot = check_index(index)?;

        let digit = match parse_digit(raw) {
            Some(digit) => digit,
            None if raw.is_empty() => None,
            None => return Err(EntryError::NotADigit),
        };

        self.clear_messages();
        self.digits[slot] = digit;
        self.focus_index = slot;

        if digit.is_some() && slot < LAST_SLOT {
            self.focus_index = slot + 1;
        }

        if digit.is_some() && slot == LAST_SLOT && self.is_complete() {
            return Ok(InputOutcome::Submit(self.begin_verification()));
        }

        Ok(InputOutcome::Updated)
    }

    /// Backspace pressed in the slot at `index`.
    ///
    /// A filled slot is cleared in place. An empty slot pulls focus back to
    /// the previous slot and clears it.
    ///
    /// # Errors
    /// Rejects input while verifying, after success, or for an out-of-range slot.
    pub fn on_backspace(&mut self, index: usize) -> Result<(), EntryError> {
        self.ensure_editable()?;
        let slot = check_index(index)?;

        if self.digits[slot].is_some() {
            self.clear_messages();
            self.digits[slot] = None;
            self.focus_index = slot;
        } else if slot > 0 {
            self.focus_index = slot - 1;
            self.digits[slot - 1] = None;
        }

        Ok(())
    }

    /// # Errors
    /// Rejects input while verifying, after success, or for an out-of-range slot.
    pub fn on_arrow_left(&mut self, index: usize) -> Result<(), EntryError> {
        self.ensure_editable()?;
        let slot = check_index(index)?;
        self.focus_index = slot.saturating_sub(1);
        Ok(())
    }

    /// # Errors
    /// Rejects input while verifying, after success, or for an out-of-range slot.
    pub fn on_arrow_right(&mut self, index: usize) -> Result<(), EntryError> {
        self.ensure_editable()?;
        let slot = check_index(index)?;
        self.focus_index = (slot + 1).min(LAST_SLOT);
        Ok(())
    }

    /// Paste clipboard text into the slots starting at slot 0.
    ///
    /// Non-digits are stripped and at most six digits are used. Slots past the
    /// pasted digits keep their contents. A paste without any digit is ignored.
    ///
    /// # Errors
    /// Rejects input while verifying or after success.
    pub fn on_paste(&mut self, clipboard_text: &str) -> Result<InputOutcome, EntryError> {
        self.ensure_editable()?;

        let pasted: Vec<char> = clipboard_text
            .chars()
            .filter(char::is_ascii_digit)
            .take(CODE_LENGTH)
            .collect();
        if pasted.is_empty() {
            return Ok(InputOutcome::Updated);
        }

        for (slot, digit) in pasted.into_iter().enumerate() {
            self.digits[slot] = Some(digit);
        }

        match self.digits.iter().position(Option::is_none) {
            Some(empty) => {
                self.focus_index = empty;
                Ok(InputOutcome::Updated)
            }
            None => {
                self.focus_index = LAST_SLOT;
                Ok(InputOutcome::Submit(self.begin_verification()))
            }
        }
    }

    /// Explicit form submission.
    ///
    /// # Errors
    /// Returns [`EntryError::IncompleteCode`] (and shows its message) when any
    /// slot is empty; rejects submission while verifying or after success.
    pub fn submit(&mut self) -> Result<String, EntryError> {
        self.ensure_editable()?;

        if !self.is_complete() {
            self.error_message = Some(INCOMPLETE_CODE_MESSAGE.to_string());
            self.phase = Phase::Error;
            return Err(EntryError::IncompleteCode);
        }

        Ok(self.begin_verification())
    }

    /// Apply the outcome of the verification started by the last `Submit`.
    pub fn finish_verification(&mut self, result: &AuthResult) {
        if self.phase != Phase::Verifying {
            return;
        }

        if result.success {
            self.phase = Phase::Success;
            self.success_message = Some(VERIFIED_MESSAGE.to_string());
            return;
        }

        let message = if result.message.trim().is_empty() {
            INVALID_CODE_MESSAGE.to_string()
        } else {
            result.message.clone()
        };
        self.error_message = Some(message);
        self.phase = Phase::Error;
        self.reset_digits();
    }

    /// Whether a resend may be started now.
    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.resend_cooldown_seconds == 0
            && !self.is_resending
            && !matches!(self.phase, Phase::Verifying | Phase::Success)
    }

    /// Mark a resend as started. Returns `false`, changing nothing, if a resend
    /// is not allowed right now.
    pub fn begin_resend(&mut self) -> bool {
        if !self.can_resend() {
            return false;
        }
        self.is_resending = true;
        self.error_message = None;
        if self.phase == Phase::Error {
            self.phase = Phase::Editing;
        }
        true
    }

    /// Apply the outcome of a resend. Only a successful resend restarts the
    /// cooldown.
    pub fn finish_resend(&mut self, result: &AuthResult) {
        if !self.is_resending {
            return;
        }
        self.is_resending = false;

        if result.success {
            self.reset_digits();
            self.phase = Phase::Editing;
            self.success_message = Some(RESENT_MESSAGE.to_string());
            self.resend_cooldown_seconds = self.cooldown_reset_value;
        } else {
            self.error_message = Some(result.message.clone());
            self.phase = Phase::Error;
        }
    }

    /// One second elapsed; returns the remaining cooldown.
    pub fn tick(&mut self) -> u32 {
        self.resend_cooldown_seconds = self.resend_cooldown_seconds.saturating_sub(1);
        self.resend_cooldown_seconds
    }

    fn ensure_editable(&self) -> Result<(), EntryError> {
        match self.phase {
            Phase::Verifying => Err(EntryError::VerificationInFlight),
            Phase::Success => Err(EntryError::AlreadyVerified),
            Phase::Editing | Phase::Error => Ok(()),
        }
    }

    // AllSlotsFilled -> Verifying
    fn begin_verification(&mut self) -> String {
        self.phase = Phase::Verifying;
        self.error_message = None;
        self.code()
    }

    fn clear_messages(&mut self) {
        self.error_message = None;
        self.success_message = None;
        if self.phase == Phase::Error {
            self.phase = Phase::Editing;
        }
    }

    fn reset_digits(&mut self) {
        self.digits = [None; CODE_LENGTH];
        self.focus_index = 0;
    }
}

fn check_index(index: usize) -> Result<usize, EntryError> {
    if index < CODE_LENGTH {
        Ok(index)
    } else {
        Err(EntryError::IndexOutOfRange(index))
    }
}

fn parse_digit(raw: &str) -> Option<Option<char>> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => Some(Some(c)),
        _ => None,
    }
}
