//! Access to the memory of other processes running on the local system.
//!
//! Use [create_default] to obtain the [MemoryInterface] of the current platform,
//! resolve the target process by name and open a [ProcessHandle] to read and write
//! its memory. The handle is released once dropped.

mod interface;
pub use interface::*;

mod error;
pub use error::*;

#[cfg(windows)]
mod handle;
#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub use win32::WindowsMemoryInterface;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxMemoryInterface;
