use clap::Parser;
use std::{fs::OpenOptions, io::Write, path::PathBuf};

use sensel_rs::{config::Config, error::SenselError};

/// Generate a default config
#[derive(Parser)]
#[command(name = "gen-config")]
struct Cli {
    /// Where to write the config.
    #[arg(long, value_name = "FILE", default_value = "./config.toml")]
    output: PathBuf,
}

fn main() -> Result<(), SenselError> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::default();
    let s = config.to_toml_string()?;
    println!("{}", s);

    let mut f = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.output)?;
    f.write_all(s.as_bytes())?;
    log::info!("Wrote default config to {}.", cli.output.display());
    Ok(())
}
