#![warn(clippy::pedantic)]
#![allow(
    clippy::must_use_candidate,
    clippy::uninlined_format_args,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod ffi;
pub mod library;
pub mod register;
pub mod session;
pub mod sim;
pub mod types;

pub use backend::Backend;
pub use device::{device_list, Device, Frame};
pub use error::SenselError;
pub use library::SenselLib;
