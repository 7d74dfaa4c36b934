use clap::{Arg, ArgAction, Command};

pub const ARG_NAME: &str = "name";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_ACCEPT_TERMS: &str = "accept-terms";
pub const ARG_SKIP_VERIFICATION: &str = "skip-verification";
pub const ARG_RESEND_COOLDOWN_SECONDS: &str = "resend-cooldown-seconds";

#[must_use]
pub fn command() -> Command {
    Command::new("signup")
        .about("Create an account, verify its email in the terminal and sign in")
        .arg(
            Arg::new(ARG_NAME)
                .long(ARG_NAME)
                .help("Full name")
                .required(true),
        )
        .arg(
            Arg::new(ARG_EMAIL)
                .long(ARG_EMAIL)
                .help("Email address the verification code is sent to")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Account password, at least 8 characters")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCEPT_TERMS)
                .long(ARG_ACCEPT_TERMS)
                .help("Agree to the Terms of Service")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SKIP_VERIFICATION)
                .long(ARG_SKIP_VERIFICATION)
                .help("Confirm the registration without a code (demo backend only)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_RESEND_COOLDOWN_SECONDS)
                .long(ARG_RESEND_COOLDOWN_SECONDS)
                .help("Seconds to wait before a new code may be requested")
                .env("OTPGATE_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u32)),
        )
}
