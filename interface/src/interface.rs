use std::mem;

use crate::IResult;

pub type ProcessId = u32;

/// Access to the memory of a single opened process.
///
/// Dropping the handle releases the underlying OS resource.
pub trait ProcessHandle {
    fn process_id(&self) -> ProcessId;

    /// Read exactly `buffer.len()` bytes starting at `address`.
    /// Partial reads are reported as [crate::InterfaceError::InvalidAddress].
    #[must_use]
    fn read_slice(&self, address: u64, buffer: &mut [u8]) -> IResult<()>;

    /// Write all of `buffer` to `address`.
    #[must_use]
    fn write_slice(&self, address: u64, buffer: &[u8]) -> IResult<()>;

    #[must_use]
    fn total_read_calls(&self) -> usize;
}

impl dyn ProcessHandle + '_ {
    #[must_use]
    pub fn read_vec(&self, address: u64, length: usize) -> IResult<Vec<u8>> {
        let mut buffer = vec![0u8; length];
        self.read_slice(address, &mut buffer)?;
        Ok(buffer)
    }

    #[must_use]
    pub fn read<T: Copy>(&self, address: u64) -> IResult<T> {
        let mut result = unsafe { mem::zeroed::<T>() };
        let result_buff = unsafe {
            std::slice::from_raw_parts_mut(&mut result as *mut T as *mut u8, mem::size_of::<T>())
        };

        self.read_slice(address, result_buff)?;
        Ok(result)
    }

    #[must_use]
    pub fn write<T: Copy>(&self, address: u64, value: &T) -> IResult<()> {
        let buffer = unsafe {
            std::slice::from_raw_parts(value as *const T as *const u8, mem::size_of::<T>())
        };

        self.write_slice(address, buffer)
    }
}

/// Facility to locate and open processes on the local system.
pub trait MemoryInterface {
    /// Resolve a process by its executable name.
    #[must_use]
    fn find_process(&self, name: &str) -> IResult<ProcessId>;

    /// Open a process for reading and writing its memory.
    #[must_use]
    fn open_process(&self, process_id: ProcessId) -> IResult<Box<dyn ProcessHandle>>;
}

impl dyn MemoryInterface + '_ {
    pub fn open_process_by_name(&self, name: &str) -> IResult<Box<dyn ProcessHandle>> {
        let process_id = self.find_process(name)?;
        log::debug!("Resolved process {} to id {}", name, process_id);
        self.open_process(process_id)
    }
}

/// Create the memory interface for the current platform.
#[cfg(windows)]
pub fn create_default() -> IResult<Box<dyn MemoryInterface>> {
    Ok(Box::new(crate::win32::WindowsMemoryInterface::new()))
}

/// Create the memory interface for the current platform.
#[cfg(target_os = "linux")]
pub fn create_default() -> IResult<Box<dyn MemoryInterface>> {
    Ok(Box::new(crate::linux::LinuxMemoryInterface::new()))
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn create_default() -> IResult<Box<dyn MemoryInterface>> {
    Err(crate::InterfaceError::UnsupportedPlatform)
}
