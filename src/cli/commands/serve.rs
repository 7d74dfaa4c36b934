use clap::{Arg, Command};

pub const ARG_PORT: &str = "port";

#[must_use]
pub fn command() -> Command {
    Command::new("serve")
        .about("Expose signup, verification and login over HTTP")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("OTPGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
}
