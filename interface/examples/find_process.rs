use clap::Parser;

#[derive(Debug, Parser)]
struct Args {
    /// Executable name of the process
    name: String,
}

pub fn main() -> anyhow::Result<()> {
    env_logger::builder().parse_default_env().init();
    let args = Args::parse();

    let interface = memprobe_interface::create_default()?;
    match interface.open_process_by_name(&args.name) {
        Ok(handle) => println!(
            "Process {} has id {} and has been opened with read/write access",
            args.name,
            handle.process_id()
        ),
        Err(err) => println!("Process {} can not be opened: {:#}", args.name, err),
    }

    Ok(())
}
