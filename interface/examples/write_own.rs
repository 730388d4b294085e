pub fn main() -> anyhow::Result<()> {
    env_logger::builder().parse_default_env().init();

    let interface = memprobe_interface::create_default()?;
    let handle = interface.open_process(std::process::id())?;

    let mut target_value = 0x01u64;
    handle.write::<u64>(&mut target_value as *mut _ as u64, &0x42)?;

    println!("Target value: {:X}", std::hint::black_box(&mut target_value));
    Ok(())
}
