use std::fmt;

use crate::utils::error::ModbusError;

/// Well-known Modbus/TCP port used when the host token carries none.
pub const DEFAULT_PORT: u16 = 502;

/// The binding always addresses the device behind the connection as unit 0.
pub const DEFAULT_UNIT_ID: u8 = 0;

pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// One request, built fresh for every transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusRequest {
    ReadDiscreteInputs {
        unit_id: u8,
        reference: u16,
        quantity: u16,
    },
    WriteSingleCoil {
        unit_id: u8,
        reference: u16,
        value: bool,
    },
}

impl ModbusRequest {
    pub fn read_discrete_input(unit_id: u8, reference: u16) -> Self {
        ModbusRequest::ReadDiscreteInputs {
            unit_id,
            reference,
            quantity: 1,
        }
    }

    pub fn write_coil(unit_id: u8, reference: u16, value: bool) -> Self {
        ModbusRequest::WriteSingleCoil {
            unit_id,
            reference,
            value,
        }
    }

    pub fn function_code(&self) -> u8 {
        match self {
            ModbusRequest::ReadDiscreteInputs { .. } => FC_READ_DISCRETE_INPUTS,
            ModbusRequest::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
        }
    }

    pub fn unit_id(&self) -> u8 {
        match self {
            ModbusRequest::ReadDiscreteInputs { unit_id, .. }
            | ModbusRequest::WriteSingleCoil { unit_id, .. } => *unit_id,
        }
    }
}

impl fmt::Display for ModbusRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModbusRequest::ReadDiscreteInputs { unit_id, reference, quantity } => write!(
                f,
                "read {} discrete input(s) at {} (unit {})",
                quantity, reference, unit_id
            ),
            ModbusRequest::WriteSingleCoil { unit_id, reference, value } => write!(
                f,
                "write coil {} = {} (unit {})",
                reference, value, unit_id
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusResponse {
    DiscreteInputs(Vec<bool>),
    CoilWritten { reference: u16, value: bool },
}

impl ModbusResponse {
    /// Status bit `index` of a discrete-input response.
    pub fn discrete_status(&self, index: usize) -> Result<bool, ModbusError> {
        match self {
            ModbusResponse::DiscreteInputs(bits) => bits.get(index).copied().ok_or_else(|| {
                ModbusError::InvalidResponse(format!(
                    "expected at least {} status bit(s), got {}",
                    index + 1,
                    bits.len()
                ))
            }),
            other => Err(ModbusError::InvalidResponse(format!(
                "expected discrete input status, got {:?}",
                other
            ))),
        }
    }
}
