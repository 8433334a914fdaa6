use clap::Parser;

use sensel_rs::{
    cli::ProgramArgs,
    error::SenselError,
    session::{open_first, scan_frames, update_leds, wait_for_enter, ExitSignal},
    types::FrameContent,
};

/// Print the contacts seen by the first Sensel device and light an LED for each one.
#[derive(Parser)]
#[command(name = "sensel-contacts")]
struct Cli {
    #[command(flatten)]
    args: ProgramArgs,
    /// Stop after this many reads instead of waiting for Enter.
    #[arg(long, value_name = "N")]
    loops: Option<u32>,
}

fn main() -> Result<(), SenselError> {
    env_logger::init();
    let cli = Cli::parse();
    let resources = cli.args.acquire_resources()?;
    let config = resources.config;
    let lib = &*resources.backend;

    let Some(device) = open_first(lib)? else {
        println!("No device found");
        return Ok(());
    };

    config.apply(&device)?;
    device.set_frame_content(FrameContent::CONTACTS)?;
    let mut frame = device.allocate_frame_data()?;
    device.start_scanning()?;

    let exit = ExitSignal::new();
    if cli.loops.is_none() {
        println!("Press Enter to exit example");
        wait_for_enter(exit.clone());
    }

    let mut reads = 0;
    while !exit.is_raised() && cli.loops.map_or(true, |loops| reads < loops) {
        scan_frames(&device, &mut frame, |frame| {
            if frame.n_contacts() > 0 {
                println!("\nNum Contacts: {}", frame.n_contacts());
                for contact in frame.contacts() {
                    println!("{}", contact);
                }
                update_leds(&device, frame, config.led_brightness);
            }
            Ok(())
        })?;
        reads += 1;
    }

    device.stop_scanning()?;
    frame.free()?;
    device.close()?;
    Ok(())
}
