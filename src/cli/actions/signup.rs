//! Terminal signup flow: register, verify the emailed code one line at a time,
//! then sign in with the new account and sign out again.

use crate::{
    auth::{AuthBackend, Backend, BackendMode},
    cli::globals::GlobalArgs,
    forms::{validate_signup, PasswordStrength},
    otp::{
        EntryError, OtpController, OtpEntry, ResendOutcome, VerifyOutcome, CODE_LENGTH,
        SUCCESS_DISPLAY_DELAY,
    },
};
use anyhow::{anyhow, bail, Result};
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const HELP: &str = "Type one digit per line or paste the whole code. \
Use `<` to delete, `left`/`right` to move, `submit` to verify and `resend` for a new code.";

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub accept_terms: bool,
    pub skip_verification: bool,
    pub resend_cooldown_seconds: u32,
}

/// Execute the signup action against stdin/stdout.
/// # Errors
/// Returns an error if the form is invalid, signup or sign-in fails, or stdin
/// closes before the email is verified.
pub async fn execute(args: Args) -> Result<()> {
    let backend = Arc::new(Backend::select(&args.globals)?);
    let input = BufReader::new(tokio::io::stdin());
    let mut output = std::io::stdout();

    run(backend, &args, input, &mut output).await
}

/// One line of terminal input mapped onto an OTP entry operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Keystroke {
    Digit(String),
    Backspace,
    Left,
    Right,
    Submit,
    Resend,
    Paste(String),
}

impl Keystroke {
    /// `None` for blank lines.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "" => None,
            "<" | "backspace" => Some(Self::Backspace),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "submit" => Some(Self::Submit),
            "resend" => Some(Self::Resend),
            _ if line.chars().count() == 1 => Some(Self::Digit(line.to_string())),
            _ => Some(Self::Paste(line.to_string())),
        }
    }
}

/// `[1][2][_][ ][ ][ ]` with `_` on the focused empty slot, plus the resend hint.
#[must_use]
pub fn render(entry: &OtpEntry) -> String {
    let mut line = String::with_capacity(CODE_LENGTH * 3 + 32);
    for (index, digit) in entry.digits().iter().enumerate() {
        let shown = match digit {
            Some(c) => *c,
            None if index == entry.focus_index() => '_',
            None => ' ',
        };
        line.push('[');
        line.push(shown);
        line.push(']');
    }

    if entry.resend_cooldown_seconds() > 0 {
        line.push_str(&format!("  resend in {}s", entry.resend_cooldown_seconds()));
    } else {
        line.push_str("  resend available");
    }
    line
}

/// Run the whole flow, reading commands from `input` and writing prompts to `output`.
///
/// # Errors
/// See [`execute`].
pub async fn run<R, W>(backend: Arc<Backend>, args: &Args, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let password = args.password.expose_secret();

    if let Err(e) = validate_signup(&args.name, &args.email, password, args.accept_terms) {
        writeln!(output, "{e}")?;
        return Err(e.into());
    }
    debug!(strength = %PasswordStrength::of(password), "password strength");

    if args.skip_verification && backend.mode() != BackendMode::Demo {
        bail!("--skip-verification is only available with the demo backend");
    }

    let result = backend.sign_up(&args.name, &args.email, password).await;
    writeln!(output, "{}", result.message)?;
    if !result.success {
        return Err(anyhow!(result.message));
    }
    if let Some(code) = &result.demo_code {
        writeln!(output, "Demo mode: your verification code is {code}")?;
    }

    if args.skip_verification {
        skip_verification(&backend, output)?;
    } else if result.needs_verification {
        let entry = OtpEntry::with_cooldown(args.resend_cooldown_seconds);
        let controller = OtpController::with_entry(backend.clone(), args.email.clone(), entry);
        verify(&controller, &backend, input, output).await?;
    }

    let signed_in = backend.sign_in(&args.email, password).await;
    writeln!(output, "{}", signed_in.message)?;
    if !signed_in.success {
        return Err(anyhow!(signed_in.message));
    }
    info!("signed in after verification");

    backend.sign_out().await;
    writeln!(output, "Signed out.")?;

    Ok(())
}

fn skip_verification<W: Write>(backend: &Backend, output: &mut W) -> Result<()> {
    let store = backend
        .demo_store()
        .ok_or_else(|| anyhow!("--skip-verification is only available with the demo backend"))?;
    let user = store.complete_registration()?;
    writeln!(output, "Registration confirmed for {} without a code.", user.email)?;
    Ok(())
}

async fn verify<R, W>(
    controller: &OtpController<Backend>,
    backend: &Backend,
    input: R,
    output: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(
        output,
        "Enter the 6-digit code sent to {}",
        controller.masked_email()
    )?;
    writeln!(output, "{HELP}")?;
    writeln!(output, "{}", render(&controller.snapshot().await))?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(keystroke) = Keystroke::parse(&line) else {
            continue;
        };

        let focus = controller.snapshot().await.focus_index();
        let verified = match keystroke {
            Keystroke::Digit(raw) => report(controller.on_digit_input(focus, &raw).await, output)?,
            Keystroke::Paste(text) => report(controller.on_paste(&text).await, output)?,
            Keystroke::Submit => report(controller.submit().await.map(Some), output)?,
            Keystroke::Backspace => {
                report(controller.on_backspace(focus).await.map(|()| None), output)?
            }
            Keystroke::Left => {
                report(controller.on_arrow_left(focus).await.map(|()| None), output)?
            }
            Keystroke::Right => {
                report(controller.on_arrow_right(focus).await.map(|()| None), output)?
            }
            Keystroke::Resend => {
                resend(controller, backend, output).await?;
                false
            }
        };

        let entry = controller.snapshot().await;
        if verified {
            if let Some(message) = entry.success_message() {
                writeln!(output, "{message}")?;
            }
            tokio::time::sleep(SUCCESS_DISPLAY_DELAY).await;
            return Ok(());
        }
        writeln!(output, "{}", render(&entry))?;
    }

    bail!("Input closed before the email was verified")
}

/// Print the outcome of an entry operation; `true` once the code is verified.
fn report<W: Write>(
    outcome: std::result::Result<Option<VerifyOutcome>, EntryError>,
    output: &mut W,
) -> Result<bool> {
    match outcome {
        Ok(Some(VerifyOutcome::Verified(_))) => Ok(true),
        Ok(Some(VerifyOutcome::Rejected(message))) => {
            writeln!(output, "{message}")?;
            Ok(false)
        }
        Ok(None) => Ok(false),
        Err(e @ EntryError::IncompleteCode) => {
            writeln!(output, "{e}")?;
            Ok(false)
        }
        Err(e) => {
            // non-digit keystrokes are dropped without a message
            debug!("input ignored: {e}");
            Ok(false)
        }
    }
}

async fn resend<W: Write>(
    controller: &OtpController<Backend>,
    backend: &Backend,
    output: &mut W,
) -> Result<()> {
    match controller.resend().await {
        ResendOutcome::NotAllowed => {
            let seconds = controller.snapshot().await.resend_cooldown_seconds();
            writeln!(output, "You can request a new code in {seconds}s.")?;
        }
        ResendOutcome::Sent(_) => {
            if let Some(message) = controller.snapshot().await.success_message() {
                writeln!(output, "{message}")?;
            }
            if let Some(pending) = backend.demo_store().and_then(|store| store.pending()) {
                writeln!(
                    output,
                    "Demo mode: your new verification code is {}",
                    pending.verification_code()
                )?;
            }
        }
        ResendOutcome::Failed(message) => writeln!(output, "{message}")?,
    }
    Ok(())
}
