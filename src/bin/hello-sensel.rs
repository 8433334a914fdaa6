use clap::Parser;

use sensel_rs::{cli::ProgramArgs, device_list, error::SenselError, Device};

/// Print the identity and geometry of the first Sensel device.
#[derive(Parser)]
#[command(name = "hello-sensel")]
struct Cli {
    #[command(flatten)]
    args: ProgramArgs,
}

fn main() -> Result<(), SenselError> {
    env_logger::init();
    let cli = Cli::parse();
    let resources = cli.args.acquire_resources()?;
    let lib = &*resources.backend;

    let devices = device_list(lib)?;
    let Some(first) = devices.first() else {
        println!("No device found");
        return Ok(());
    };

    let device = Device::open_by_id(lib, first.idx)?;
    let fw_info = device.firmware_info()?;
    let sensor_info = device.sensor_info()?;

    println!("\nSensel Device: {}", first.serial_num);
    println!(
        "Firmware Version: {}.{}.{}",
        fw_info.fw_version_major, fw_info.fw_version_minor, fw_info.fw_version_build
    );
    println!("{}", sensor_info);

    device.close()?;
    Ok(())
}
