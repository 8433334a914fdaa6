use anyhow::Context;
use clap::Args;
use const_format::formatcp;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::{
    backend::Backend,
    config::Config,
    error::SenselError,
    library::SenselLib,
    sim::{SimulatedDevice, SimulatedSensel},
};

pub const CONFIG_NAME: &str = "config.toml";
pub const XDG_PREFIX: &str = "sensel_rs";
pub const DEFAULT_CONFIG_PATH: &str = formatcp!("/etc/{}/{}", XDG_PREFIX, CONFIG_NAME);

/// Options shared by all programs.
#[derive(Debug, Clone, Default, Args)]
pub struct ProgramArgs {
    /// Path to the Sensel shared library, overrides the config file.
    #[arg(long = "lib", value_name = "FILE")]
    library: Option<PathBuf>,
    /// Path to the config file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Use a simulated device instead of the Sensel library.
    #[arg(long)]
    simulate: bool,
}

pub struct ProgramResources {
    /// The library all devices are opened through.
    pub backend: Box<dyn Backend>,
    pub config: Config,
}

impl fmt::Display for ProgramArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.library, self.simulate) {
            (_, true) => writeln!(f, "Library: (simulated)")?,
            (Some(library), false) => writeln!(f, "Library: {}", library.display())?,
            (None, false) => writeln!(f, "Library: (from config)")?,
        }
        match self.config() {
            Some(config) => write!(f, "Config file: {}", config.display()),
            None => write!(f, "Config file: (lookup)"),
        }
    }
}

impl ProgramArgs {
    pub fn new(library: Option<PathBuf>, config: Option<PathBuf>, simulate: bool) -> Self {
        Self {
            library,
            config,
            simulate,
        }
    }

    pub fn library(&self) -> Option<&Path> {
        self.library.as_deref()
    }

    pub fn config(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    pub fn simulate(&self) -> bool {
        self.simulate
    }

    /// Finds the config file: the `--config` argument, else the XDG config directories, else
    /// [`DEFAULT_CONFIG_PATH`]. `None` means the default config should be used.
    pub fn find_config(&self) -> Option<PathBuf> {
        if let Some(config) = self.config() {
            return Some(config.to_path_buf());
        }

        let config = match xdg::BaseDirectories::with_prefix(XDG_PREFIX) {
            // First try to find an existing file in XDG_CONFIG_HOME and then XDG_CONFIG_DIRS.
            Ok(xdg_dirs) => xdg_dirs.find_config_file(CONFIG_NAME),
            Err(e) => {
                log::warn!("Failed to access XDG directories: {:?}.", e);
                None
            }
        };
        config.or_else(|| {
            let config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if config_path.exists() {
                Some(config_path)
            } else {
                log::warn!("Using default configuration since no config.toml was found");
                None
            }
        })
    }

    /// Reads the config file if there is one.
    pub fn load_config(&self) -> Result<Config, SenselError> {
        let Some(config_path) = self.find_config() else {
            log::info!("No config file found, using default configuration");
            return Ok(Config::default());
        };

        let config = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to open config file {}", config_path.display()))?;
        log::info!("Opened config file {}.", config_path.display());

        let config = Config::from_toml_str(&config)?;
        log::info!("Using config:\n{}", config);
        Ok(config)
    }

    /// Loads the config and the library.
    pub fn acquire_resources(&self) -> Result<ProgramResources, SenselError> {
        log::trace!("Entering ProgramArgs::acquire_resources.");
        log::info!("Trying to acquire program resources.");

        let config = self.load_config()?;

        let backend: Box<dyn Backend> = if self.simulate {
            log::info!("Using simulated device.");
            Box::new(SimulatedSensel::new(vec![SimulatedDevice::touch_demo()]))
        } else {
            let lib = match self.library().or(config.library_path.as_deref()) {
                Some(path) => SenselLib::load(path),
                None => SenselLib::load_default(),
            }
            .inspect_err(|_| {
                log::error!("Is the Sensel library installed? Pass --lib or --simulate otherwise.");
            })?;
            Box::new(lib)
        };

        log::trace!("Leaving ProgramArgs::acquire_resources.");
        Ok(ProgramResources { backend, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempdir::TempDir;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ProgramArgs,
    }

    #[test]
    fn test_parse_args() {
        let cli = TestCli::parse_from(["prog", "--lib", "/opt/libsensel.so", "--simulate"]);
        assert_eq!(cli.args.library(), Some(Path::new("/opt/libsensel.so")));
        assert!(cli.args.simulate());
        assert_eq!(cli.args.config(), None);
    }

    #[test]
    fn test_explicit_config_wins() {
        let args = ProgramArgs::new(None, Some(PathBuf::from("/tmp/sensel.toml")), false);
        assert_eq!(args.find_config(), Some(PathBuf::from("/tmp/sensel.toml")));
    }

    #[test]
    fn test_missing_library_fails() {
        let tmp_dir = TempDir::new("sensel").unwrap();
        let config_path = tmp_dir.path().join(CONFIG_NAME);
        fs::write(&config_path, "").unwrap();
        let library_path = tmp_dir.path().join("libsensel.so");

        let args = ProgramArgs::new(Some(library_path.clone()), Some(config_path), false);
        match args.acquire_resources() {
            Err(SenselError::LoadLibrary { path, .. }) => assert_eq!(path, library_path),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("loaded a library that does not exist"),
        }
    }
}
