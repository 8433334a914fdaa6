use clap::Parser;

use sensel_rs::{
    cli::ProgramArgs,
    device_list,
    error::SenselError,
    session::{scan_frames, update_leds, wait_for_enter, ExitSignal},
    types::FrameContent,
    Device,
};

/// Print the contacts of every attached Sensel device.
#[derive(Parser)]
#[command(name = "sensel-multi")]
struct Cli {
    #[command(flatten)]
    args: ProgramArgs,
}

fn main() -> Result<(), SenselError> {
    env_logger::init();
    let cli = Cli::parse();
    let resources = cli.args.acquire_resources()?;
    let config = resources.config;
    let lib = &*resources.backend;

    let ids = device_list(lib)?;
    if ids.is_empty() {
        println!("No device found");
        return Ok(());
    }

    let devices = ids
        .iter()
        .map(|id| Device::open_by_id(lib, id.idx))
        .collect::<Result<Vec<_>, _>>()?;
    for device in &devices {
        config.apply(device)?;
        device.set_frame_content(FrameContent::CONTACTS)?;
    }
    let mut frames = devices
        .iter()
        .map(|device| device.allocate_frame_data())
        .collect::<Result<Vec<_>, _>>()?;
    for device in &devices {
        device.start_scanning()?;
    }

    let exit = ExitSignal::new();
    println!("Press Enter to exit example");
    wait_for_enter(exit.clone());

    while !exit.is_raised() {
        for (i, (device, frame)) in devices.iter().zip(frames.iter_mut()).enumerate() {
            scan_frames(device, frame, |frame| {
                if frame.n_contacts() > 0 {
                    println!("\nMorph {} Num Contacts: {}", i, frame.n_contacts());
                    for contact in frame.contacts() {
                        println!("{}", contact);
                    }
                    update_leds(device, frame, config.led_brightness);
                }
                Ok(())
            })?;
        }
    }

    for device in &devices {
        device.stop_scanning()?;
    }
    for frame in frames {
        frame.free()?;
    }
    for device in devices {
        device.close()?;
    }
    Ok(())
}
