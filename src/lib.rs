//! Modbus/TCP digital input to digital output binding
//!
//! Watches one discrete input on a field device and mirrors it onto one coil
//! over a single long-lived connection, writing only when the value changes.

pub mod cli;
pub mod config;
pub mod modbus;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, Endpoint};
pub use modbus::{ClientOptions, ModbusClientTrait, ModbusRequest, ModbusResponse, ModbusTcpClient};
pub use services::{run_binding, DigitalBinding, LoopExit, PollOutcome};
pub use utils::error::{ErrorKind, ModbusError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
