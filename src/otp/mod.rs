//! OTP entry for email verification: the slot state machine, its async
//! controller and the masked-email display helper.

pub mod controller;
pub mod entry;
pub mod mask;

pub use controller::{OtpController, ResendOutcome, VerifyOutcome, SUCCESS_DISPLAY_DELAY};
pub use entry::{EntryError, InputOutcome, OtpEntry, Phase, CODE_LENGTH};
pub use mask::mask_email;
