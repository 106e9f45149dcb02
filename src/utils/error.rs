use thiserror::Error;

/// Coarse grouping used by the binding to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Transaction,
    Cleanup,
    State,
}

#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Modbus exception on function {function:#04x}: {code}")]
    Exception { function: u8, code: String },

    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Failed to close connection: {0}")]
    CleanupError(String),

    #[error("Binding already terminated")]
    BindingTerminated,
}

impl ModbusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModbusError::ConfigError(_) => ErrorKind::Config,
            ModbusError::ConnectionError(_) => ErrorKind::Connection,
            ModbusError::CommunicationError(_)
            | ModbusError::Exception { .. }
            | ModbusError::InvalidResponse(_)
            | ModbusError::Timeout => ErrorKind::Transaction,
            ModbusError::CleanupError(_) => ErrorKind::Cleanup,
            ModbusError::BindingTerminated => ErrorKind::State,
        }
    }

    /// True for failures of the transport itself, as opposed to a device that
    /// answered with an exception or a malformed frame.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            ModbusError::CommunicationError(_) | ModbusError::Timeout
        )
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for ModbusError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ModbusError::Timeout
    }
}

impl From<tokio_modbus::Error> for ModbusError {
    fn from(err: tokio_modbus::Error) -> Self {
        match err {
            tokio_modbus::Error::Transport(io) => io.into(),
            other => ModbusError::InvalidResponse(other.to_string()),
        }
    }
}
