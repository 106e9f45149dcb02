pub mod client;
pub mod protocol;

pub use client::{ClientOptions, ModbusClientTrait, ModbusTcpClient};
pub use protocol::{ModbusRequest, ModbusResponse, DEFAULT_PORT, DEFAULT_UNIT_ID};
