use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::cli::globals::GlobalArgs;

pub const ARG_PROVIDER_URL: &str = "provider-url";
pub const ARG_PROVIDER_KEY: &str = "provider-key";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PROVIDER_URL)
                .long(ARG_PROVIDER_URL)
                .help("Hosted identity provider URL, example: https://<project>.supabase.co")
                .long_help(
                    "Hosted identity provider URL. When it or the key is missing, or the URL is not a supabase endpoint, the in-memory demo backend is used instead.",
                )
                .env("OTPGATE_PROVIDER_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_PROVIDER_KEY)
                .long(ARG_PROVIDER_KEY)
                .help("Identity provider public (anon) API key")
                .env("OTPGATE_PROVIDER_KEY")
                .hide_env_values(true)
                .global(true),
        )
}

/// Provider settings from the matches; absent values become empty strings.
#[must_use]
pub fn globals(matches: &ArgMatches) -> GlobalArgs {
    let provider_url = matches
        .get_one::<String>(ARG_PROVIDER_URL)
        .cloned()
        .unwrap_or_default();
    let provider_key = matches
        .get_one::<String>(ARG_PROVIDER_KEY)
        .cloned()
        .map(SecretString::from)
        .unwrap_or_default();

    GlobalArgs::new(provider_url, provider_key)
}
