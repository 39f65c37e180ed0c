use std::{error::Error, fmt};

pub type DeviceResult<T> = Result<T, DeviceError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    DuplicateId { id: u16, existing: String },
    NotRegistered { id: u16 },
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::DuplicateId { id, existing } => {
                write!(f, "device id 0x{id:04X} is already taken by '{existing}'")
            }
            DeviceError::NotRegistered { id } => {
                write!(f, "no device registered with id 0x{id:04X}")
            }
        }
    }
}

impl Error for DeviceError {}
