use clap::Parser;

use sensel_rs::{
    cli::ProgramArgs,
    error::SenselError,
    session::{open_first, scan_frames, wait_for_enter, ExitSignal},
    types::FrameContent,
};

/// Print the total force applied to the first Sensel device.
#[derive(Parser)]
#[command(name = "sensel-forces")]
struct Cli {
    #[command(flatten)]
    args: ProgramArgs,
}

fn main() -> Result<(), SenselError> {
    env_logger::init();
    let cli = Cli::parse();
    let resources = cli.args.acquire_resources()?;
    let lib = &*resources.backend;

    let Some(device) = open_first(lib)? else {
        println!("No device found");
        return Ok(());
    };

    resources.config.apply(&device)?;
    device.set_frame_content(FrameContent::PRESSURE)?;
    let mut frame = device.allocate_frame_data()?;
    device.start_scanning()?;

    let exit = ExitSignal::new();
    println!("Press Enter to exit example");
    wait_for_enter(exit.clone());

    while !exit.is_raised() {
        scan_frames(&device, &mut frame, |frame| {
            println!("Total Force: {}", frame.total_force());
            Ok(())
        })?;
    }

    device.stop_scanning()?;
    frame.free()?;
    device.close()?;
    Ok(())
}
