use thiserror::Error;

use crate::ProcessId;

#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("no process named \"{name}\" is running")]
    ProcessUnknown { name: String },

    #[error("the target process {process_id} does no longer exist")]
    ProcessDoesNotExist { process_id: ProcessId },

    #[error("access to process {process_id} has been denied")]
    ProcessAccessDenied { process_id: ProcessId },

    #[error("failed to access memory at 0x{address:X} ({length} bytes, copied: {bytes_copied})")]
    InvalidAddress {
        address: u64,
        length: usize,
        bytes_copied: usize,
    },

    #[error("memory at 0x{address:X} ({length} bytes) is protected")]
    MemoryProtected { address: u64, length: usize },

    #[error("process memory access is not supported on this platform")]
    UnsupportedPlatform,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(windows)]
    #[error("system call failed: {0}")]
    System(#[from] windows::core::Error),

    #[cfg(target_os = "linux")]
    #[error("system call failed: {0}")]
    System(#[from] nix::errno::Errno),
}

pub type IResult<T> = std::result::Result<T, InterfaceError>;

impl InterfaceError {
    pub fn detailed_message(&self) -> Option<String> {
        Some(match self {
            InterfaceError::ProcessUnknown { name } => [
                format!("Could not find a process named \"{}\".", name),
                "Please start the target process prior to executing this application!".to_string(),
            ]
            .join("\n"),
            InterfaceError::ProcessAccessDenied { process_id } => [
                format!("Failed to open process {}.", process_id),
                "The current user lacks the privileges to access the process memory.".to_string(),
                "Protected processes can not be opened, even with elevated privileges.".to_string(),
            ]
            .join("\n"),
            InterfaceError::UnsupportedPlatform => [
                "No memory access backend is available for this platform.",
                "Supported platforms are Windows and Linux.",
            ]
            .join("\n"),
            _ => return None,
        })
    }
}
