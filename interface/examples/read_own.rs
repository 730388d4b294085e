fn read_heap_buffer(interface: &dyn memprobe_interface::MemoryInterface) -> anyhow::Result<()> {
    let mut buffer = Vec::with_capacity(10_000);
    buffer.resize(10_000, 0u8);

    for (index, entry) in buffer.iter_mut().enumerate() {
        *entry = index as u8;
    }

    let handle = interface.open_process(std::process::id())?;
    let read_buffer = handle.read_vec(buffer.as_ptr() as u64, buffer.len())?;

    if buffer == read_buffer {
        println!("Read heap buffer successfull");
    } else {
        println!("Full heap buffer read failed!");
    }

    Ok(())
}

pub fn main() -> anyhow::Result<()> {
    env_logger::builder().parse_default_env().init();
    let interface = memprobe_interface::create_default()?;

    let target_value = 0x42u64;
    let handle = interface.open_process(std::process::id())?;
    let read_value = handle.read::<u64>(&target_value as *const _ as u64);

    println!("Read result: {:X?}", read_value);
    read_heap_buffer(&*interface)?;
    Ok(())
}
