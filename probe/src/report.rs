use memprobe_interface::ProcessId;

use crate::{
    ProbeError,
    ProbeResult,
};

/// Outcome of a probe run which got attached to its target.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub process_name: String,
    pub process_id: ProcessId,

    pub address: u64,
    pub payload: Vec<u8>,

    /// Memory content before the write
    pub before: ProbeResult<Vec<u8>>,
    pub write: ProbeResult<()>,

    /// Memory content after the write.
    /// Absent if the write failed.
    pub after: Option<ProbeResult<Vec<u8>>>,
}

impl ProbeReport {
    pub fn errors(&self) -> Vec<&ProbeError> {
        let mut errors = Vec::with_capacity(3);
        if let Err(err) = &self.before {
            errors.push(err);
        }
        if let Err(err) = &self.write {
            errors.push(err);
        }
        if let Some(Err(err)) = &self.after {
            errors.push(err);
        }
        errors
    }

    pub fn is_clean(&self) -> bool {
        self.errors().is_empty()
    }

    pub fn after_bytes(&self) -> Option<&[u8]> {
        match &self.after {
            Some(Ok(bytes)) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    /// Whether the verification read returned the payload.
    /// This is informational only and never turns the run into a failure.
    pub fn payload_confirmed(&self) -> Option<bool> {
        self.after_bytes().map(|bytes| bytes == self.payload.as_slice())
    }

    /// Human readable status lines describing the run.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(6);
        lines.push(format!(
            "Found process '{}' with PID: {}",
            self.process_name, self.process_id
        ));

        match &self.before {
            Ok(bytes) => lines.push(format!(
                "Read {} bytes from 0x{:X}: {}",
                bytes.len(),
                self.address,
                describe_bytes(bytes)
            )),
            Err(err) => lines.push(format!(
                "Failed to read memory from 0x{:X}: {}. This address may not be valid.",
                self.address, err
            )),
        }

        lines.push(format!(
            "Attempting to write {} to 0x{:X}...",
            describe_bytes(&self.payload),
            self.address
        ));
        match &self.write {
            Ok(_) => lines.push(format!(
                "Successfully wrote {} bytes to 0x{:X}",
                self.payload.len(),
                self.address
            )),
            Err(err) => {
                lines.push(format!(
                    "Failed to write to 0x{:X}: {}. Missing permissions or invalid address.",
                    self.address, err
                ));

                if let ProbeError::InvalidAddress { bytes_copied, .. } = err {
                    if *bytes_copied > 0 {
                        lines.push(format!(
                            "Warning: the first {} bytes at 0x{:X} have been modified before the write failed",
                            bytes_copied, self.address
                        ));
                    }
                }
            }
        }

        match &self.after {
            Some(Ok(bytes)) => lines.push(format!(
                "Verified value after write: {} ({})",
                describe_bytes(bytes),
                if bytes == &self.payload {
                    "matches payload"
                } else {
                    "differs from payload"
                }
            )),
            Some(Err(err)) => lines.push(format!("Failed to verify write: {}", err)),
            None => {}
        }

        lines
    }
}

/// Render bytes as text, dropping everything which is not valid UTF-8 as well as NUL characters.
pub fn render_text(bytes: &[u8]) -> String {
    bytes
        .utf8_chunks()
        .map(|chunk| chunk.valid())
        .collect::<String>()
        .replace('\0', "")
}

pub fn render_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|v| format!("{:02X}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_bytes(bytes: &[u8]) -> String {
    format!("\"{}\" [{}]", render_text(bytes), render_hex(bytes))
}
