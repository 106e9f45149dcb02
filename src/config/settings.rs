use clap::ArgMatches;

use super::endpoint::Endpoint;
use crate::modbus::client::ClientOptions;
use crate::modbus::protocol::{DEFAULT_PORT, DEFAULT_UNIT_ID};
use crate::utils::error::ModbusError;

/// Everything the binding needs, resolved once at startup and passed down
/// explicitly to the components that use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // Connection settings
    pub endpoint: Endpoint,
    pub unit_id: u8,

    // Binding
    pub input_ref: u16,
    pub output_ref: u16,

    // Gates the verbose trace lines; protocol behavior is unaffected
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Endpoint {
                host: "localhost".to_string(),
                port: DEFAULT_PORT,
            },
            unit_id: DEFAULT_UNIT_ID,
            input_ref: 0,
            output_ref: 0,
            debug: false,
        }
    }
}

impl Config {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ModbusError> {
        let mut config = Self::default();

        let address = required(matches, "address")?;
        config.endpoint = Endpoint::parse(address)?;
        config.input_ref = parse_reference("input_ref", required(matches, "input_ref")?)?;
        config.output_ref = parse_reference("output_ref", required(matches, "output_ref")?)?;
        config.debug = matches.get_flag("debug");

        Ok(config)
    }

    /// Transactions of the binding never reconnect behind its back: a lost
    /// connection must end the binding, not be silently replaced.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            reconnect_on_failure: false,
            ..ClientOptions::default()
        }
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, ModbusError> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| ModbusError::ConfigError(format!("Missing argument <{}>", name)))
}

pub fn parse_reference(name: &str, value: &str) -> Result<u16, ModbusError> {
    value.trim().parse::<u16>().map_err(|e| {
        ModbusError::ConfigError(format!(
            "Invalid {} '{}': {} (expected 0..=65535)",
            name, value, e
        ))
    })
}
