use core::{
    ffi::c_void,
    mem,
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
};

use windows::{
    core::Error,
    Win32::{
        Foundation::{
            ERROR_ACCESS_DENIED,
            ERROR_INVALID_PARAMETER,
            ERROR_NOACCESS,
            ERROR_PARTIAL_COPY,
        },
        System::{
            Diagnostics::{
                Debug::{
                    ReadProcessMemory,
                    WriteProcessMemory,
                },
                ToolHelp::{
                    CreateToolhelp32Snapshot,
                    Process32FirstW,
                    Process32NextW,
                    PROCESSENTRY32W,
                    TH32CS_SNAPPROCESS,
                },
            },
            Threading::{
                OpenProcess,
                PROCESS_ACCESS_RIGHTS,
                PROCESS_QUERY_INFORMATION,
                PROCESS_VM_OPERATION,
                PROCESS_VM_READ,
                PROCESS_VM_WRITE,
            },
        },
    },
};

use crate::{
    handle::OwnedHandle,
    IResult,
    InterfaceError,
    MemoryInterface,
    ProcessHandle,
    ProcessId,
};

const PROCESS_PROBE_ACCESS: PROCESS_ACCESS_RIGHTS = PROCESS_ACCESS_RIGHTS(
    PROCESS_VM_READ.0 | PROCESS_VM_WRITE.0 | PROCESS_VM_OPERATION.0 | PROCESS_QUERY_INFORMATION.0,
);

fn open_process_by_id(id: u32, access: PROCESS_ACCESS_RIGHTS) -> Result<OwnedHandle, Error> {
    let handle = unsafe { OpenProcess(access, false, id)? };
    OwnedHandle::from_raw_handle(handle, "process")
        .ok_or_else(|| Error::from(ERROR_INVALID_PARAMETER.to_hresult()))
}

fn list_system_processes() -> IResult<Vec<(ProcessId, String)>> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)? };
    let snapshot = OwnedHandle::from_raw_handle(snapshot, "snapshot")
        .ok_or_else(|| InterfaceError::System(Error::from_win32()))?;

    let mut result = Vec::with_capacity(256);
    let mut entry = PROCESSENTRY32W {
        dwSize: mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    let mut success = unsafe { Process32FirstW(snapshot.raw_handle(), &mut entry) }.as_bool();
    while success {
        let name_length = entry
            .szExeFile
            .iter()
            .position(|v| *v == 0)
            .unwrap_or(entry.szExeFile.len());

        result.push((
            entry.th32ProcessID,
            String::from_utf16_lossy(&entry.szExeFile[..name_length]),
        ));

        success = unsafe { Process32NextW(snapshot.raw_handle(), &mut entry) }.as_bool();
    }

    Ok(result)
}

/// Process memory access through the Win32 debug API.
pub struct WindowsMemoryInterface;

impl WindowsMemoryInterface {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryInterface for WindowsMemoryInterface {
    fn find_process(&self, name: &str) -> IResult<ProcessId> {
        list_system_processes()?
            .into_iter()
            .find(|(_, image_name)| image_name.eq_ignore_ascii_case(name))
            .map(|(process_id, _)| process_id)
            .ok_or_else(|| InterfaceError::ProcessUnknown {
                name: name.to_string(),
            })
    }

    fn open_process(&self, process_id: ProcessId) -> IResult<Box<dyn ProcessHandle>> {
        let handle = match open_process_by_id(process_id, PROCESS_PROBE_ACCESS) {
            Ok(handle) => handle,
            Err(err) if err.code() == ERROR_ACCESS_DENIED.to_hresult() => {
                return Err(InterfaceError::ProcessAccessDenied { process_id });
            }
            Err(err) if err.code() == ERROR_INVALID_PARAMETER.to_hresult() => {
                return Err(InterfaceError::ProcessDoesNotExist { process_id });
            }
            Err(err) => return Err(err.into()),
        };

        log::debug!(
            "Opened process {} (handle {:X})",
            process_id,
            handle.raw_handle().0
        );
        Ok(Box::new(WindowsProcessHandle {
            process_id,
            handle,
            read_calls: AtomicUsize::new(0),
        }))
    }
}

struct WindowsProcessHandle {
    process_id: ProcessId,
    handle: OwnedHandle,
    read_calls: AtomicUsize,
}

impl WindowsProcessHandle {
    fn translate_error(&self, address: u64, length: usize, bytes_copied: usize) -> InterfaceError {
        let error = Error::from_win32();
        let code = error.code();
        if code == ERROR_PARTIAL_COPY.to_hresult() || code == ERROR_NOACCESS.to_hresult() {
            InterfaceError::InvalidAddress {
                address,
                length,
                bytes_copied,
            }
        } else if code == ERROR_ACCESS_DENIED.to_hresult() {
            InterfaceError::MemoryProtected { address, length }
        } else {
            error.into()
        }
    }

    fn is_readable(&self, address: u64, length: usize) -> bool {
        let mut scratch = vec![0u8; length];
        let mut bytes_read = 0usize;
        let success = unsafe {
            ReadProcessMemory(
                self.handle.raw_handle(),
                address as *const c_void,
                scratch.as_mut_ptr() as *mut c_void,
                length,
                Some(&mut bytes_read),
            )
        }
        .as_bool();

        success && bytes_read == length
    }
}

impl ProcessHandle for WindowsProcessHandle {
    fn process_id(&self) -> ProcessId {
        self.process_id
    }

    fn read_slice(&self, address: u64, buffer: &mut [u8]) -> IResult<()> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);

        let mut bytes_read = 0usize;
        let success = unsafe {
            ReadProcessMemory(
                self.handle.raw_handle(),
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len(),
                Some(&mut bytes_read),
            )
        }
        .as_bool();

        if success && bytes_read == buffer.len() {
            return Ok(());
        }

        /* capture the last error before anything else can overwrite it */
        let error = if success {
            InterfaceError::InvalidAddress {
                address,
                length: buffer.len(),
                bytes_copied: bytes_read,
            }
        } else {
            self.translate_error(address, buffer.len(), bytes_read)
        };

        log::trace!(
            "Mem read failed for {:X} (len {:X}, copied: {:X}): {}",
            address,
            buffer.len(),
            bytes_read,
            error
        );
        Err(error)
    }

    fn write_slice(&self, address: u64, buffer: &[u8]) -> IResult<()> {
        let mut bytes_written = 0usize;
        let success = unsafe {
            WriteProcessMemory(
                self.handle.raw_handle(),
                address as *const c_void,
                buffer.as_ptr() as *const c_void,
                buffer.len(),
                Some(&mut bytes_written),
            )
        }
        .as_bool();

        if success && bytes_written == buffer.len() {
            return Ok(());
        }

        let error = if success {
            InterfaceError::InvalidAddress {
                address,
                length: buffer.len(),
                bytes_copied: bytes_written,
            }
        } else {
            self.translate_error(address, buffer.len(), bytes_written)
        };

        /* ERROR_NOACCESS does not tell unmapped and read only pages apart */
        let error = match error {
            InterfaceError::InvalidAddress { .. } if self.is_readable(address, buffer.len()) => {
                InterfaceError::MemoryProtected {
                    address,
                    length: buffer.len(),
                }
            }
            error => error,
        };

        log::trace!(
            "Mem write failed for {:X} (len {:X}, copied: {:X}): {}",
            address,
            buffer.len(),
            bytes_written,
            error
        );
        Err(error)
    }

    fn total_read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed)
    }
}
