use clap::Parser;

use sensel_rs::{
    cli::ProgramArgs,
    error::SenselError,
    session::{open_first, scan_frames},
    types::FrameContent,
};

/// Number of force cells printed per frame.
const PRINTED_FORCES: usize = 10;

/// Scan the first Sensel device for a fixed number of reads and print contacts and forces.
#[derive(Parser)]
#[command(name = "sensel-test")]
struct Cli {
    #[command(flatten)]
    args: ProgramArgs,
    /// Number of reads, overrides `scan_loops` of the config file.
    #[arg(long, value_name = "N")]
    loops: Option<u32>,
}

fn main() -> Result<(), SenselError> {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("Program arguments:\n{}", cli.args);
    let resources = cli.args.acquire_resources()?;
    let lib = &*resources.backend;
    let loops = cli.loops.unwrap_or(resources.config.scan_loops);

    let Some(device) = open_first(lib)? else {
        println!("No device found");
        return Ok(());
    };

    resources.config.apply(&device)?;
    device.set_frame_content(FrameContent::CONTACTS | FrameContent::PRESSURE)?;
    let mut frame = device.allocate_frame_data()?;
    device.start_scanning()?;

    let mut total_frames = 0;
    for _ in 0..loops {
        total_frames += scan_frames(&device, &mut frame, |frame| {
            println!("Num Contacts: {}", frame.n_contacts());
            for contact in frame.contacts() {
                println!("{}", contact);
            }
            if let Some(forces) = frame.force_array() {
                let shown = &forces[..forces.len().min(PRINTED_FORCES)];
                println!("Forces: {:?}", shown);
            }
            Ok(())
        })?;
    }
    log::info!("Read {} frames in {} loops.", total_frames, loops);

    device.stop_scanning()?;
    frame.free()?;
    device.close()?;
    Ok(())
}
