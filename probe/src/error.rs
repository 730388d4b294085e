use memprobe_interface::{
    InterfaceError,
    ProcessId,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("process \"{name}\" not found")]
    ProcessNotFound { name: String },

    #[error("insufficient privileges to open process \"{name}\" ({process_id})")]
    AttachPermission { name: String, process_id: ProcessId },

    /// `bytes_copied` counts the leading bytes transferred before the fault.
    /// For a failed write these bytes have already been modified within the target.
    #[error("invalid address 0x{address:X} ({length} bytes, {bytes_copied} transferred)")]
    InvalidAddress {
        address: u64,
        length: usize,
        bytes_copied: usize,
    },

    #[error("memory at 0x{address:X} ({length} bytes) is not writable")]
    WritePermission { address: u64, length: usize },

    #[error("unexpected error: {message}")]
    Unexpected { message: String },
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// Classify a failure while resolving and opening the target process.
    pub fn from_attach(error: InterfaceError, name: &str, process_id: Option<ProcessId>) -> Self {
        match error {
            InterfaceError::ProcessUnknown { .. } | InterfaceError::ProcessDoesNotExist { .. } => {
                ProbeError::ProcessNotFound {
                    name: name.to_string(),
                }
            }
            InterfaceError::ProcessAccessDenied { process_id } => ProbeError::AttachPermission {
                name: name.to_string(),
                process_id,
            },
            error => ProbeError::Unexpected {
                message: match process_id {
                    Some(process_id) => format!("{} (process {})", error, process_id),
                    None => error.to_string(),
                },
            },
        }
    }

    /// Classify a failed read of `length` bytes at `address`.
    pub fn from_read(error: InterfaceError, address: u64, length: usize) -> Self {
        match error {
            InterfaceError::InvalidAddress { bytes_copied, .. } => ProbeError::InvalidAddress {
                address,
                length,
                bytes_copied,
            },
            InterfaceError::MemoryProtected { .. } => ProbeError::InvalidAddress {
                address,
                length,
                bytes_copied: 0,
            },
            error => ProbeError::Unexpected {
                message: error.to_string(),
            },
        }
    }

    /// Classify a failed write of `length` bytes at `address`.
    pub fn from_write(error: InterfaceError, address: u64, length: usize) -> Self {
        match error {
            InterfaceError::InvalidAddress { bytes_copied, .. } => ProbeError::InvalidAddress {
                address,
                length,
                bytes_copied,
            },
            InterfaceError::MemoryProtected { .. } | InterfaceError::ProcessAccessDenied { .. } => {
                ProbeError::WritePermission { address, length }
            }
            error => ProbeError::Unexpected {
                message: error.to_string(),
            },
        }
    }
}
