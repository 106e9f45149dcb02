use clap::error::ErrorKind as ClapErrorKind;
use clap::{Arg, ArgAction, Command};
use std::ffi::OsString;

use crate::config::Config;
use crate::utils::error::ModbusError;

pub const BIN_NAME: &str = "modbus-dido";

pub fn build_cli() -> Command {
    Command::new(BIN_NAME)
        .version(crate::VERSION)
        .about("Mirrors a Modbus/TCP discrete input onto a coil, writing only on change")
        .arg(
            Arg::new("address")
                .value_name("host[:port]")
                .help("Device address, port defaults to 502")
                .required(true),
        )
        .arg(
            Arg::new("input_ref")
                .value_name("input_ref")
                .help("Discrete input to observe (0-65535)")
                .required(true),
        )
        .arg(
            Arg::new("output_ref")
                .value_name("output_ref")
                .help("Coil to drive (0-65535)")
                .required(true),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .env("DIDO_DEBUG")
                .action(ArgAction::SetTrue)
                .help("Enable verbose trace output"),
        )
}

pub fn usage() -> String {
    build_cli().render_usage().to_string()
}

/// Turns the raw argument list (program name first) into a `Config`.
///
/// `--help` and `--version` print their text and exit the process with 0.
pub fn parse_config<I, T>(args: I) -> Result<Config, ModbusError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match build_cli().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(err) if matches!(err.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let message = err.to_string();
            let first_line = message.lines().next().unwrap_or("invalid arguments");
            return Err(ModbusError::ConfigError(
                first_line.trim_start_matches("error: ").to_string(),
            ));
        }
    };

    Config::from_matches(&matches)
}
