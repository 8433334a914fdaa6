//! Our application errors.

use std::{io, path::PathBuf};
use thiserror::Error;

use crate::ffi::{SenselStatus, SENSEL_OK};

/// General error type.
#[derive(Error, Debug)]
pub enum SenselError {
    /// A native call returned a non-zero status. The vendor code is passed through untouched.
    #[error("{call} failed with status {status}")]
    Status {
        call: &'static str,
        status: SenselStatus,
    },
    #[error("{call} reported success but returned a null pointer")]
    NullHandle { call: &'static str },
    #[error("Frame buffer was allocated for a different device")]
    ForeignFrame,
    #[error("Register 0x{reg:02X} cannot be accessed with {size} bytes")]
    RegisterSize { reg: u8, size: usize },
    #[error("Unable to load Sensel library {}: {source}", path.display())]
    LoadLibrary {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("Sensel library does not export {symbol}: {source}")]
    MissingSymbol {
        symbol: &'static str,
        source: libloading::Error,
    },
    #[error("{0}")]
    IO(#[from] io::Error),
    #[error("Failed to parse config file:\n{0}")]
    ParseConfig(#[from] toml::de::Error),
    #[error("Failed to serialize config file:\n{0}")]
    SerializeConfig(#[from] toml::ser::Error),
    #[error("{0}")]
    Generic(#[from] anyhow::Error),
}

impl SenselError {
    /// The native status code, if this error came from a native call.
    pub fn status(&self) -> Option<SenselStatus> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Turns the status of the native call `call` into a result.
pub fn check(call: &'static str, status: SenselStatus) -> Result<(), SenselError> {
    if status == SENSEL_OK {
        Ok(())
    } else {
        log::debug!("{} returned status {}", call, status);
        Err(SenselError::Status { call, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::SENSEL_ERROR;

    #[test]
    fn test_check_preserves_status() {
        assert!(check("senselReadSensor", SENSEL_OK).is_ok());

        let err = check("senselReadSensor", SENSEL_ERROR).unwrap_err();
        assert_eq!(err.status(), Some(-1));
        assert_eq!(err.to_string(), "senselReadSensor failed with status -1");

        let err = check("senselGetFrame", 42).unwrap_err();
        assert_eq!(err.status(), Some(42));
    }
}
