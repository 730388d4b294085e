use std::{
    fs,
    io::{
        IoSlice,
        IoSliceMut,
    },
    path::Path,
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
};

use nix::{
    errno::Errno,
    sys::{
        signal::kill,
        uio::{
            process_vm_readv,
            process_vm_writev,
            RemoteIoVec,
        },
    },
    unistd::Pid,
};

use crate::{
    IResult,
    InterfaceError,
    MemoryInterface,
    ProcessHandle,
    ProcessId,
};

fn file_name_of(path: &str) -> Option<&str> {
    Path::new(path).file_name()?.to_str()
}

/// Check the names a process is known under: the (possibly truncated) comm value,
/// the first command line argument and the executable the process has been started from.
fn process_has_name(process_dir: &Path, name: &str) -> bool {
    if let Ok(comm) = fs::read_to_string(process_dir.join("comm")) {
        if comm.trim_end_matches('\n') == name {
            return true;
        }
    }

    if let Ok(cmdline) = fs::read(process_dir.join("cmdline")) {
        let argv0 = cmdline.split(|v| *v == 0).next().unwrap_or_default();
        if let Ok(argv0) = std::str::from_utf8(argv0) {
            if file_name_of(argv0) == Some(name) {
                return true;
            }
        }
    }

    /* requires ptrace access to the target, failure is expected for foreign processes */
    if let Ok(exe) = fs::read_link(process_dir.join("exe")) {
        if exe.file_name().and_then(|v| v.to_str()) == Some(name) {
            return true;
        }
    }

    false
}

fn list_system_process_ids() -> IResult<Vec<ProcessId>> {
    let mut result = fs::read_dir("/proc")?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str()?.parse::<ProcessId>().ok())
        .collect::<Vec<_>>();

    result.sort_unstable();
    Ok(result)
}

fn classify_access_error(error: Errno, address: u64, length: usize) -> InterfaceError {
    match error {
        Errno::EFAULT | Errno::EINVAL => InterfaceError::InvalidAddress {
            address,
            length,
            bytes_copied: 0,
        },
        Errno::EPERM | Errno::EACCES => InterfaceError::MemoryProtected { address, length },
        error => error.into(),
    }
}

/// Process memory access through `process_vm_readv` and `process_vm_writev`.
pub struct LinuxMemoryInterface;

impl LinuxMemoryInterface {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryInterface for LinuxMemoryInterface {
    fn find_process(&self, name: &str) -> IResult<ProcessId> {
        for process_id in list_system_process_ids()? {
            let process_dir = Path::new("/proc").join(process_id.to_string());
            if process_has_name(&process_dir, name) {
                return Ok(process_id);
            }
        }

        Err(InterfaceError::ProcessUnknown {
            name: name.to_string(),
        })
    }

    fn open_process(&self, process_id: ProcessId) -> IResult<Box<dyn ProcessHandle>> {
        let pid = Pid::from_raw(process_id as i32);
        match kill(pid, None) {
            Ok(_) => {}
            Err(Errno::ESRCH) => return Err(InterfaceError::ProcessDoesNotExist { process_id }),
            Err(Errno::EPERM) => return Err(InterfaceError::ProcessAccessDenied { process_id }),
            Err(err) => return Err(err.into()),
        }

        log::debug!("Opened process {}", process_id);
        Ok(Box::new(LinuxProcessHandle {
            pid,
            read_calls: AtomicUsize::new(0),
        }))
    }
}

struct LinuxProcessHandle {
    pid: Pid,
    read_calls: AtomicUsize,
}

impl ProcessHandle for LinuxProcessHandle {
    fn process_id(&self) -> ProcessId {
        self.pid.as_raw() as ProcessId
    }

    fn read_slice(&self, address: u64, buffer: &mut [u8]) -> IResult<()> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);

        let length = buffer.len();
        let remote = [RemoteIoVec {
            base: address as usize,
            len: length,
        }];

        match process_vm_readv(self.pid, &mut [IoSliceMut::new(buffer)], &remote) {
            Ok(bytes_read) if bytes_read == length => Ok(()),
            Ok(bytes_read) => {
                log::trace!(
                    "Mem read failed for {:X} (len {:X}, copied: {:X})",
                    address,
                    length,
                    bytes_read
                );
                Err(InterfaceError::InvalidAddress {
                    address,
                    length,
                    bytes_copied: bytes_read,
                })
            }
            Err(Errno::ESRCH) => Err(InterfaceError::ProcessDoesNotExist {
                process_id: self.process_id(),
            }),
            Err(err) => Err(classify_access_error(err, address, length)),
        }
    }

    fn write_slice(&self, address: u64, buffer: &[u8]) -> IResult<()> {
        let length = buffer.len();
        let remote = [RemoteIoVec {
            base: address as usize,
            len: length,
        }];

        let bytes_written = match process_vm_writev(self.pid, &[IoSlice::new(buffer)], &remote) {
            Ok(bytes_written) if bytes_written == length => return Ok(()),
            Ok(bytes_written) => bytes_written,
            Err(Errno::ESRCH) => {
                return Err(InterfaceError::ProcessDoesNotExist {
                    process_id: self.process_id(),
                })
            }
            Err(Errno::EFAULT) => 0,
            Err(err) => return Err(classify_access_error(err, address, length)),
        };

        log::trace!(
            "Mem write failed for {:X} (len {:X}, copied: {:X})",
            address,
            length,
            bytes_written
        );

        /* EFAULT does not tell unmapped and read only pages apart */
        let mut scratch = vec![0u8; length];
        if matches!(
            process_vm_readv(self.pid, &mut [IoSliceMut::new(&mut scratch)], &remote),
            Ok(bytes_read) if bytes_read == length
        ) {
            return Err(InterfaceError::MemoryProtected { address, length });
        }

        Err(InterfaceError::InvalidAddress {
            address,
            length,
            bytes_copied: bytes_written,
        })
    }

    fn total_read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed)
    }
}
