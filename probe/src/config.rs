use std::{
    fmt,
    str::FromStr,
};

use anyhow::Context;

pub const DEFAULT_PROCESS_NAME: &str = "notepad.exe";
pub const DEFAULT_ADDRESS: u64 = 0x00400000;
pub const DEFAULT_PAYLOAD: &[u8] = b"MODDED!";

/// Parameters of a single probe run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeConfig {
    pub process_name: String,
    pub address: u64,
    pub payload: Vec<u8>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            address: DEFAULT_ADDRESS,
            payload: DEFAULT_PAYLOAD.to_vec(),
        }
    }
}

impl ProbeConfig {
    pub fn new(
        process_name: impl Into<String>,
        address: u64,
        payload: Vec<u8>,
    ) -> anyhow::Result<Self> {
        let process_name = process_name.into();
        if process_name.trim().is_empty() {
            anyhow::bail!("the process name must not be empty");
        }

        if payload.is_empty() {
            anyhow::bail!("the payload must contain at least one byte");
        }

        Ok(Self {
            process_name,
            address,
            payload,
        })
    }

    /// Number of bytes every read and write of the probe covers.
    pub fn span_length(&self) -> usize {
        self.payload.len()
    }
}

/// Parse an address given either as hex (`0x` prefix) or decimal number.
pub fn parse_address(value: &str) -> anyhow::Result<u64> {
    let value = value.trim().replace('_', "");
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex address 0x{}", hex))
    } else {
        value
            .parse::<u64>()
            .with_context(|| format!("invalid address {}", value))
    }
}

/// Absolute address as given on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetAddress(pub u64);

impl Default for TargetAddress {
    fn default() -> Self {
        Self(DEFAULT_ADDRESS)
    }
}

impl FromStr for TargetAddress {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_address(value).map(Self)
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Parse a byte sequence like `4D 4F 44` or `4d4f44`.
pub fn parse_hex_bytes(value: &str) -> anyhow::Result<Vec<u8>> {
    let digits = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<Vec<_>>();

    if digits.len() % 2 != 0 {
        anyhow::bail!("hex payload has an odd number of digits");
    }

    digits
        .chunks(2)
        .map(|pair| {
            let pair = pair.iter().collect::<String>();
            u8::from_str_radix(&pair, 16).with_context(|| format!("invalid hex byte {}", pair))
        })
        .collect()
}
