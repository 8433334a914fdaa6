//! Helpers shared by the example programs.

use std::{
    io::{self, BufRead},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crate::{
    backend::Backend,
    device::{device_list, Device, Frame},
    error::SenselError,
    types::ContactState,
};

/// Flag telling an acquisition loop to stop.
#[derive(Debug, Clone, Default)]
pub struct ExitSignal(Arc<AtomicBool>);

impl ExitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Raises `signal` once a line is read from stdin (or stdin is closed).
///
/// The reader thread is detached.
pub fn wait_for_enter(signal: ExitSignal) {
    thread::spawn(move || {
        let mut line = String::new();
        if let Err(e) = io::stdin().lock().read_line(&mut line) {
            log::warn!("Failed to read from stdin: {}", e);
        }
        log::debug!("Exit requested.");
        signal.raise();
    });
}

/// Reads the sensor once and hands every available frame to `f`, returning how many there were.
pub fn scan_frames<B, F>(
    device: &Device<'_, B>,
    frame: &mut Frame<'_, B>,
    mut f: F,
) -> Result<u32, SenselError>
where
    B: Backend + ?Sized,
    F: FnMut(&Frame<'_, B>) -> Result<(), SenselError>,
{
    device.read_sensor()?;
    let num_frames = device.num_available_frames()?;
    for _ in 0..num_frames {
        device.get_frame(frame)?;
        f(frame)?;
    }
    Ok(num_frames)
}

/// Lights the LED of every starting contact and turns it off when the contact ends.
///
/// Contact ids without a matching LED are only logged.
pub fn update_leds<B: Backend + ?Sized>(
    device: &Device<'_, B>,
    frame: &Frame<'_, B>,
    brightness: u16,
) {
    for contact in frame.contacts() {
        let level = match contact.contact_state() {
            ContactState::Start => brightness,
            ContactState::End => 0,
            _ => continue,
        };
        if let Err(e) = device.set_led_brightness(contact.id, level) {
            log::debug!("No LED for contact {}: {}", contact.id, e);
        }
    }
}

/// Opens the first enumerated device, `None` if there is no device.
pub fn open_first<B: Backend + ?Sized>(lib: &B) -> Result<Option<Device<'_, B>>, SenselError> {
    let devices = device_list(lib)?;
    let Some(first) = devices.first() else {
        return Ok(None);
    };
    log::info!("Opening device {}.", first);
    Device::open_by_id(lib, first.idx).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_signal_is_shared() {
        let signal = ExitSignal::new();
        let other = signal.clone();
        assert!(!other.is_raised());
        thread::spawn(move || signal.raise()).join().unwrap();
        assert!(other.is_raised());
    }
}
