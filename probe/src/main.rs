use anyhow::Context;
use clap::Parser;
use memprobe::{
    parse_hex_bytes,
    ProbeConfig,
    ProbeError,
    ProcessMemoryProbe,
    TargetAddress,
    DEFAULT_PAYLOAD,
    DEFAULT_PROCESS_NAME,
};

fn show_critical_error(message: &str) {
    for line in message.lines() {
        log::error!("{}", line);
    }
}

fn main() {
    let args = match AppArgs::try_parse() {
        Ok(args) => args,
        Err(error) => {
            println!("{:#}", error);
            std::process::exit(1);
        }
    };

    env_logger::builder()
        .filter_level(if args.verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    match real_main(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(error) => {
            show_critical_error(&format!("{:#}", error));
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "memprobe", version)]
struct AppArgs {
    /// Executable name of the target process
    #[clap(short, long, default_value = DEFAULT_PROCESS_NAME)]
    process: String,

    /// Absolute address within the target process (hex with 0x prefix or decimal)
    #[clap(short, long, default_value_t = TargetAddress::default())]
    address: TargetAddress,

    /// Text to write to the target address
    #[clap(long, conflicts_with = "payload_hex")]
    payload: Option<String>,

    /// Bytes to write to the target address, given as hex (e.g. "4D 4F 44")
    #[clap(long)]
    payload_hex: Option<String>,

    /// Append a NUL terminator to the payload
    #[clap(long)]
    nul_terminate: bool,

    /// Enable verbose logging ($env:RUST_LOG="trace")
    #[clap(short, long)]
    verbose: bool,
}

impl AppArgs {
    fn probe_config(&self) -> anyhow::Result<ProbeConfig> {
        let mut payload = match (&self.payload, &self.payload_hex) {
            (_, Some(hex)) => parse_hex_bytes(hex).context("invalid hex payload")?,
            (Some(text), None) => text.as_bytes().to_vec(),
            (None, None) => DEFAULT_PAYLOAD.to_vec(),
        };
        if self.nul_terminate {
            payload.push(0x00);
        }

        ProbeConfig::new(&self.process, self.address.0, payload)
    }
}

fn real_main(args: &AppArgs) -> anyhow::Result<bool> {
    log::info!("memprobe v{}", env!("CARGO_PKG_VERSION"));

    let config = args.probe_config()?;
    log::debug!(
        "Probing {} at 0x{:X} with {} bytes",
        config.process_name,
        config.address,
        config.span_length()
    );

    let interface = match memprobe_interface::create_default() {
        Ok(interface) => interface,
        Err(err) => {
            if let Some(detailed_message) = err.detailed_message() {
                show_critical_error(&detailed_message);
                return Ok(false);
            }

            return Err(err.into());
        }
    };

    let report = match ProcessMemoryProbe::new(&*interface).run(&config) {
        Ok(report) => report,
        Err(err) => {
            let message = match &err {
                ProbeError::ProcessNotFound { name } => format!(
                    "Process '{}' not found. Please ensure '{}' is running.",
                    name, name
                ),
                ProbeError::AttachPermission { .. } => {
                    format!("{}. Try running with elevated privileges.", err)
                }
                err => format!("An unexpected error occurred: {}", err),
            };

            println!("{}", message);
            return Ok(false);
        }
    };

    for line in report.status_lines() {
        println!("{}", line);
    }

    if !report.is_clean() {
        log::warn!(
            "Probe completed with {} failed step(s)",
            report.errors().len()
        );
    }

    Ok(true)
}
