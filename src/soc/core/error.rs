use std::{error::Error, fmt};

use crate::soc::core::alu::AluError;
use crate::soc::core::decode::{Mode, Operation};

pub type DecodeResult<T> = Result<T, DecodeError>;
pub type CoreResult<T> = Result<T, CoreError>;

/// Failures while classifying already-fetched instruction bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnknownOperation { opcode: u8 },
    InvalidView { descriptor: u8 },
    UnsupportedMode { operation: Operation, mode: Mode },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownOperation { opcode } => {
                write!(f, "unknown opcode 0x{opcode:02X}")
            }
            DecodeError::InvalidView { descriptor } => write!(
                f,
                "operand descriptor 0x{descriptor:02X} names view 15 which does not exist"
            ),
            DecodeError::UnsupportedMode { operation, mode } => {
                write!(f, "{operation} does not accept {mode} operands")
            }
        }
    }
}

impl Error for DecodeError {}

/// Fatal conditions raised by one execution step. Any of these ends the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    Decode { address: u64, source: DecodeError },
    Alu { address: u64, source: AluError },
    UnknownDevice { address: u64, id: u16 },
}

impl CoreError {
    /// Address of the instruction that faulted.
    pub fn address(&self) -> u64 {
        match self {
            CoreError::Decode { address, .. }
            | CoreError::Alu { address, .. }
            | CoreError::UnknownDevice { address, .. } => *address,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Decode { address, source } => {
                write!(f, "decode error at 0x{address:08X}: {source}")
            }
            CoreError::Alu { address, source } => {
                write!(f, "arithmetic fault at 0x{address:08X}: {source}")
            }
            CoreError::UnknownDevice { address, id } => {
                write!(f, "no device registered with id 0x{id:04X} (at 0x{address:08X})")
            }
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CoreError::Decode { source, .. } => Some(source),
            CoreError::Alu { source, .. } => Some(source),
            CoreError::UnknownDevice { .. } => None,
        }
    }
}
