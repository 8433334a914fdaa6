use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

use crate::{
    backend::Backend,
    device::Device,
    error::SenselError,
    types::{ContactMask, ScanDetail},
};

/// Settings read from the config file. Missing keys take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the Sensel shared library. The vendor's install location if unset.
    pub library_path: Option<PathBuf>,
    /// Resolution the sensor is scanned at.
    pub scan_detail: ScanDetail,
    /// Optional contact data (ellipse, deltas, bounding box, peak) to request.
    pub contacts_mask: ContactMask,
    /// Upper bound of the scan rate in Hz. The device default if unset.
    pub max_frame_rate: Option<u16>,
    /// Number of reads done by programs that scan for a fixed time.
    pub scan_loops: u32,
    /// LED brightness used to highlight a new contact.
    pub led_brightness: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_path: None,
            scan_detail: ScanDetail::High,
            contacts_mask: ContactMask::NONE,
            max_frame_rate: None,
            scan_loops: 500,
            led_brightness: 100,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, SenselError> {
        Ok(toml::from_str(s)?)
    }

    /// Serialize config in TOML format.
    pub fn to_toml_string(&self) -> Result<String, SenselError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Pushes the scan settings to an opened device.
    pub fn apply<B: Backend + ?Sized>(&self, device: &Device<'_, B>) -> Result<(), SenselError> {
        log::trace!("Entering Config::apply.");
        device.set_scan_detail(self.scan_detail)?;
        device.set_contacts_mask(self.contacts_mask)?;
        if let Some(rate) = self.max_frame_rate {
            device.set_max_frame_rate(rate)?;
        }
        log::trace!("Leaving Config::apply.");
        Ok(())
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.library_path {
            Some(path) => writeln!(f, "Library: {}.", path.display())?,
            None => writeln!(f, "Library: (default location).")?,
        }
        write!(
            f,
            "Scan detail: {:?}.\n\
            Contacts mask: 0x{:02X}.\n",
            self.scan_detail,
            self.contacts_mask.bits(),
        )?;
        match self.max_frame_rate {
            Some(rate) => writeln!(f, "Max frame rate: {}Hz.", rate)?,
            None => writeln!(f, "Max frame rate: (device default).")?,
        }
        write!(
            f,
            "Scan loops: {}.\n\
            LED brightness: {}.",
            self.scan_loops, self.led_brightness,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml_str(
            r#"
            scan_detail = "low"
            contacts_mask = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.scan_detail, ScanDetail::Low);
        assert_eq!(config.contacts_mask, ContactMask::ALL);
        assert_eq!(config.scan_loops, 500);
        assert_eq!(config.library_path, None);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config {
            library_path: Some(PathBuf::from("/opt/sensel/libsensel.so")),
            max_frame_rate: Some(60),
            ..Config::default()
        };
        let s = config.to_toml_string().unwrap();
        assert!(s.contains("scan_detail = \"high\""));
        assert_eq!(Config::from_toml_str(&s).unwrap(), config);
    }

    #[test]
    fn test_bad_value() {
        let err = Config::from_toml_str("scan_detail = \"ultra\"").unwrap_err();
        assert!(matches!(err, SenselError::ParseConfig(_)));
    }
}
