use memprobe_interface::{
    MemoryInterface,
    ProcessHandle,
    ProcessId,
};

use crate::{
    ProbeConfig,
    ProbeError,
    ProbeReport,
    ProbeResult,
};

/// Reads, overwrites and re-reads a span of memory within a target process.
///
/// Every step is attempted exactly once. A failed read before the write does
/// not prevent the write, a failed write skips the verification read.
/// The process handle is released before [ProcessMemoryProbe::run] returns.
pub struct ProcessMemoryProbe<'a> {
    interface: &'a dyn MemoryInterface,
}

impl<'a> ProcessMemoryProbe<'a> {
    pub fn new(interface: &'a dyn MemoryInterface) -> Self {
        Self { interface }
    }

    pub fn run(&self, config: &ProbeConfig) -> ProbeResult<ProbeReport> {
        let process_id = self
            .interface
            .find_process(&config.process_name)
            .map_err(|err| ProbeError::from_attach(err, &config.process_name, None))?;

        let handle = self
            .interface
            .open_process(process_id)
            .map_err(|err| ProbeError::from_attach(err, &config.process_name, Some(process_id)))?;

        log::debug!(
            "Attached to {} ({})",
            config.process_name,
            handle.process_id()
        );

        let report = Self::execute(&*handle, process_id, config);
        log::debug!(
            "Probe finished after {} read calls",
            handle.total_read_calls()
        );

        drop(handle);
        log::debug!("Released process {}", process_id);
        Ok(report)
    }

    fn execute(
        handle: &dyn ProcessHandle,
        process_id: ProcessId,
        config: &ProbeConfig,
    ) -> ProbeReport {
        let address = config.address;
        let length = config.span_length();

        let before = handle
            .read_vec(address, length)
            .map_err(|err| ProbeError::from_read(err, address, length));
        match &before {
            Ok(bytes) => log::trace!("Memory before write: {:X?}", bytes),
            Err(err) => log::debug!("Initial read failed: {}", err),
        }

        let write = handle
            .write_slice(address, &config.payload)
            .map_err(|err| ProbeError::from_write(err, address, length));

        let after = match &write {
            Ok(_) => {
                let after = handle
                    .read_vec(address, length)
                    .map_err(|err| ProbeError::from_read(err, address, length));
                if let Ok(bytes) = &after {
                    log::trace!("Memory after write: {:X?}", bytes);
                }

                Some(after)
            }
            Err(err) => {
                log::debug!("Write failed, skipping verification: {}", err);
                None
            }
        };

        ProbeReport {
            process_name: config.process_name.clone(),
            process_id,
            address,
            payload: config.payload.clone(),
            before,
            write,
            after,
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        cell::RefCell,
        collections::VecDeque,
        rc::Rc,
    };

    use memprobe_interface::{
        IResult,
        InterfaceError,
        MemoryInterface,
        ProcessHandle,
        ProcessId,
    };
    use rand::Rng;

    use super::ProcessMemoryProbe;
    use crate::{
        ProbeConfig,
        ProbeError,
    };

    const ADDRESS: u64 = 0x00400000;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Find(String),
        Open(ProcessId),
        Read { address: u64, length: usize },
        Write { address: u64, data: Vec<u8> },
        Release,
    }

    enum MockOpen {
        Success,
        Denied,
    }

    enum MockRead {
        Data(Vec<u8>),
        Fault,
    }

    enum MockWrite {
        Success,
        Protected,
        Fault,
    }

    struct MockState {
        calls: Vec<Call>,
        reads: VecDeque<MockRead>,
    }

    struct MockInterface {
        process: Option<ProcessId>,
        open: MockOpen,
        write: Rc<MockWrite>,
        state: Rc<RefCell<MockState>>,
    }

    impl MockInterface {
        fn new(process: Option<ProcessId>, reads: Vec<MockRead>, write: MockWrite) -> Self {
            Self {
                process,
                open: MockOpen::Success,
                write: Rc::new(write),
                state: Rc::new(RefCell::new(MockState {
                    calls: Vec::new(),
                    reads: reads.into(),
                })),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.state.borrow().calls.clone()
        }
    }

    impl MemoryInterface for MockInterface {
        fn find_process(&self, name: &str) -> IResult<ProcessId> {
            self.state
                .borrow_mut()
                .calls
                .push(Call::Find(name.to_string()));

            self.process.ok_or_else(|| InterfaceError::ProcessUnknown {
                name: name.to_string(),
            })
        }

        fn open_process(&self, process_id: ProcessId) -> IResult<Box<dyn ProcessHandle>> {
            self.state.borrow_mut().calls.push(Call::Open(process_id));
            match self.open {
                MockOpen::Success => Ok(Box::new(MockHandle {
                    process_id,
                    write: self.write.clone(),
                    state: self.state.clone(),
                })),
                MockOpen::Denied => Err(InterfaceError::ProcessAccessDenied { process_id }),
            }
        }
    }

    struct MockHandle {
        process_id: ProcessId,
        write: Rc<MockWrite>,
        state: Rc<RefCell<MockState>>,
    }

    impl ProcessHandle for MockHandle {
        fn process_id(&self) -> ProcessId {
            self.process_id
        }

        fn read_slice(&self, address: u64, buffer: &mut [u8]) -> IResult<()> {
            let mut state = self.state.borrow_mut();
            state.calls.push(Call::Read {
                address,
                length: buffer.len(),
            });

            match state.reads.pop_front() {
                Some(MockRead::Data(data)) => {
                    let length = data.len().min(buffer.len());
                    buffer[..length].copy_from_slice(&data[..length]);
                    if length < buffer.len() {
                        /* region ends within the requested span */
                        return Err(InterfaceError::InvalidAddress {
                            address,
                            length: buffer.len(),
                            bytes_copied: length,
                        });
                    }

                    Ok(())
                }
                Some(MockRead::Fault) => Err(InterfaceError::InvalidAddress {
                    address,
                    length: buffer.len(),
                    bytes_copied: 0,
                }),
                None => Ok(()),
            }
        }

        fn write_slice(&self, address: u64, buffer: &[u8]) -> IResult<()> {
            self.state.borrow_mut().calls.push(Call::Write {
                address,
                data: buffer.to_vec(),
            });

            match *self.write {
                MockWrite::Success => Ok(()),
                MockWrite::Protected => Err(InterfaceError::MemoryProtected {
                    address,
                    length: buffer.len(),
                }),
                MockWrite::Fault => Err(InterfaceError::InvalidAddress {
                    address,
                    length: buffer.len(),
                    bytes_copied: 0,
                }),
            }
        }

        fn total_read_calls(&self) -> usize {
            self.state
                .borrow()
                .calls
                .iter()
                .filter(|call| matches!(call, Call::Read { .. }))
                .count()
        }
    }

    impl Drop for MockHandle {
        fn drop(&mut self) {
            self.state.borrow_mut().calls.push(Call::Release);
        }
    }

    fn app_config(payload: &[u8]) -> ProbeConfig {
        ProbeConfig::new("app.exe", ADDRESS, payload.to_vec()).unwrap()
    }

    fn assert_released_once(calls: &[Call]) {
        let releases = calls.iter().filter(|call| **call == Call::Release).count();
        assert_eq!(releases, 1, "handle released exactly once: {:?}", calls);
        assert_eq!(calls.last(), Some(&Call::Release), "no access after release");
    }

    #[test]
    fn test_end_to_end() {
        let interface = MockInterface::new(
            Some(42),
            vec![
                MockRead::Data(b"OLDDATA".to_vec()),
                MockRead::Data(b"MODDED!".to_vec()),
            ],
            MockWrite::Success,
        );

        let report = ProcessMemoryProbe::new(&interface)
            .run(&app_config(b"MODDED!"))
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.process_id, 42);
        assert_eq!(report.before.as_deref(), Ok(&b"OLDDATA"[..]));
        assert_eq!(report.after_bytes(), Some(&b"MODDED!"[..]));
        assert_eq!(report.payload_confirmed(), Some(true));

        assert_eq!(
            interface.calls(),
            vec![
                Call::Find("app.exe".to_string()),
                Call::Open(42),
                Call::Read {
                    address: ADDRESS,
                    length: 7
                },
                Call::Write {
                    address: ADDRESS,
                    data: b"MODDED!".to_vec()
                },
                Call::Read {
                    address: ADDRESS,
                    length: 7
                },
                Call::Release,
            ]
        );
    }

    #[test]
    fn test_process_not_found() {
        let interface = MockInterface::new(None, vec![], MockWrite::Success);

        let result = ProcessMemoryProbe::new(&interface).run(&app_config(b"MODDED!"));
        assert_eq!(
            result.err(),
            Some(ProbeError::ProcessNotFound {
                name: "app.exe".to_string()
            })
        );
        assert_eq!(interface.calls(), vec![Call::Find("app.exe".to_string())]);
    }

    #[test]
    fn test_attach_denied() {
        let mut interface = MockInterface::new(Some(4), vec![], MockWrite::Success);
        interface.open = MockOpen::Denied;

        let result = ProcessMemoryProbe::new(&interface).run(&app_config(b"MODDED!"));
        assert_eq!(
            result.err(),
            Some(ProbeError::AttachPermission {
                name: "app.exe".to_string(),
                process_id: 4
            })
        );
        assert_eq!(
            interface.calls(),
            vec![Call::Find("app.exe".to_string()), Call::Open(4)]
        );
    }

    #[test]
    fn test_read_failure_is_not_fatal() {
        let interface = MockInterface::new(
            Some(42),
            vec![MockRead::Fault, MockRead::Data(b"MODDED!".to_vec())],
            MockWrite::Success,
        );

        let report = ProcessMemoryProbe::new(&interface)
            .run(&app_config(b"MODDED!"))
            .unwrap();

        assert_eq!(
            report.before,
            Err(ProbeError::InvalidAddress {
                address: ADDRESS,
                length: 7,
                bytes_copied: 0,
            })
        );
        assert!(report.write.is_ok());
        assert_eq!(report.after_bytes(), Some(&b"MODDED!"[..]));
        assert_eq!(report.errors().len(), 1);

        let calls = interface.calls();
        assert!(calls.contains(&Call::Write {
            address: ADDRESS,
            data: b"MODDED!".to_vec()
        }));
        assert_released_once(&calls);
    }

    #[test]
    fn test_read_smaller_region_than_requested() {
        let interface = MockInterface::new(
            Some(42),
            vec![
                MockRead::Data(b"OLD".to_vec()),
                MockRead::Data(b"MODDED!".to_vec()),
            ],
            MockWrite::Success,
        );

        let report = ProcessMemoryProbe::new(&interface)
            .run(&app_config(b"MODDED!"))
            .unwrap();

        assert_eq!(
            report.before,
            Err(ProbeError::InvalidAddress {
                address: ADDRESS,
                length: 7,
                bytes_copied: 3,
            })
        );
        assert!(report.write.is_ok());
        assert_eq!(report.payload_confirmed(), Some(true));
        assert_released_once(&interface.calls());
    }

    #[test]
    fn test_write_success_verifies_once() {
        let interface = MockInterface::new(Some(42), vec![], MockWrite::Success);
        ProcessMemoryProbe::new(&interface)
            .run(&app_config(b"MODDED!"))
            .unwrap();

        let calls = interface.calls();
        let write_index = calls
            .iter()
            .position(|call| matches!(call, Call::Write { .. }))
            .unwrap();

        let reads_after_write = calls[write_index..]
            .iter()
            .filter(|call| matches!(call, Call::Read { .. }))
            .collect::<Vec<_>>();
        assert_eq!(
            reads_after_write,
            vec![&Call::Read {
                address: ADDRESS,
                length: 7
            }]
        );
    }

    #[test]
    fn test_write_failure_skips_verification() {
        for (write, expected) in [
            (
                MockWrite::Protected,
                ProbeError::WritePermission {
                    address: ADDRESS,
                    length: 7,
                },
            ),
            (
                MockWrite::Fault,
                ProbeError::InvalidAddress {
                    address: ADDRESS,
                    length: 7,
                    bytes_copied: 0,
                },
            ),
        ] {
            let interface =
                MockInterface::new(Some(42), vec![MockRead::Data(b"OLDDATA".to_vec())], write);

            let report = ProcessMemoryProbe::new(&interface)
                .run(&app_config(b"MODDED!"))
                .unwrap();

            assert_eq!(report.write, Err(expected));
            assert!(report.after.is_none());
            assert!(!report.is_clean());

            let calls = interface.calls();
            assert_eq!(
                calls
                    .iter()
                    .filter(|call| matches!(call, Call::Read { .. }))
                    .count(),
                1
            );
            assert_released_once(&calls);
        }
    }

    #[test]
    fn test_verification_mismatch_is_not_an_error() {
        let interface = MockInterface::new(
            Some(42),
            vec![
                MockRead::Data(b"OLDDATA".to_vec()),
                MockRead::Data(b"OLDDATA".to_vec()),
            ],
            MockWrite::Success,
        );

        let report = ProcessMemoryProbe::new(&interface)
            .run(&app_config(b"MODDED!"))
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.payload_confirmed(), Some(false));
    }

    #[test]
    fn test_span_length_matches_payload() {
        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            let length = rng.gen_range(1..=256usize);
            let payload = (0..length).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();

            let interface = MockInterface::new(Some(42), vec![], MockWrite::Success);
            ProcessMemoryProbe::new(&interface)
                .run(&app_config(&payload))
                .unwrap();

            let calls = interface.calls();
            for call in calls.iter() {
                match call {
                    Call::Read { length: read_length, .. } => assert_eq!(*read_length, length),
                    Call::Write { data, .. } => assert_eq!(data, &payload),
                    _ => {}
                }
            }
            assert_released_once(&calls);
        }
    }
}
