use clap::Parser;

use sensel_rs::{
    cli::ProgramArgs,
    error::SenselError,
    register::Register,
    session::open_first,
};

/// Print the content of the registers of the first Sensel device.
#[derive(Parser)]
#[command(name = "sensel-regdump")]
struct Cli {
    #[command(flatten)]
    args: ProgramArgs,
    /// Only dump this register, e.g. SENSOR_NUM_COLS.
    #[arg(long, value_name = "NAME")]
    register: Option<String>,
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> Result<(), SenselError> {
    env_logger::init();
    let cli = Cli::parse();

    let registers = match &cli.register {
        Some(name) => match Register::by_name(name) {
            Some(reg) => vec![reg],
            None => {
                eprintln!("Unknown register: {}", name);
                std::process::exit(1);
            }
        },
        // Reading the frame register would consume scan data.
        None => Register::ALL
            .into_iter()
            .filter(|reg| *reg != Register::SCAN_READ_FRAME)
            .collect(),
    };

    let resources = cli.args.acquire_resources()?;
    let lib = &*resources.backend;
    let Some(device) = open_first(lib)? else {
        println!("No device found");
        return Ok(());
    };

    for reg in registers {
        match device.read_register(reg) {
            Ok(bytes) => println!("{}: {}", reg, hex(&bytes)),
            Err(e) => println!("{}: {}", reg, e),
        }
    }

    device.close()?;
    Ok(())
}
