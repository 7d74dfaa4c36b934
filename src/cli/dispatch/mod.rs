//! Map validated CLI matches to an [`Action`].

use crate::cli::actions::{serve, signup, Action};
use crate::cli::commands::{provider, serve as serve_args, signup as signup_args};
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if the subcommand is unknown or required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("serve", sub)) => Ok(Action::Serve(serve::Args {
            port: sub
                .get_one::<u16>(serve_args::ARG_PORT)
                .copied()
                .unwrap_or(8080),
            globals: provider::globals(sub),
        })),
        Some(("signup", sub)) => {
            let required = |id: &str| -> Result<String> {
                sub.get_one::<String>(id)
                    .cloned()
                    .with_context(|| format!("missing required argument: --{id}"))
            };

            Ok(Action::Signup(signup::Args {
                globals: provider::globals(sub),
                name: required(signup_args::ARG_NAME)?,
                email: required(signup_args::ARG_EMAIL)?,
                password: SecretString::from(required(signup_args::ARG_PASSWORD)?),
                accept_terms: sub.get_flag(signup_args::ARG_ACCEPT_TERMS),
                skip_verification: sub.get_flag(signup_args::ARG_SKIP_VERIFICATION),
                resend_cooldown_seconds: sub
                    .get_one::<u32>(signup_args::ARG_RESEND_COOLDOWN_SECONDS)
                    .copied()
                    .unwrap_or(crate::otp::entry::DEFAULT_RESEND_COOLDOWN_SECONDS),
            }))
        }
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}
