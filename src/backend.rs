//! The raw entry points of the Sensel library as a trait.
//!
//! [`crate::library::SenselLib`] forwards every method to the native library, while
//! [`crate::sim::SimulatedSensel`] implements them in Rust. Each method maps to exactly one
//! native function and returns its raw status.

use std::ffi::{c_int, c_uint};

use crate::ffi::{
    SenselDeviceList, SenselFirmwareInfo, SenselFrameData, SenselSensorInfo, SenselStatus,
    SENSEL_HANDLE,
};

/// One method per native entry point.
///
/// # Safety
///
/// Every method taking a `handle` requires a handle obtained from one of the `open*` methods
/// of the same backend that was not closed yet. Methods taking a frame pointer require a
/// pointer returned by [`Backend::allocate_frame_data`] for that handle that was not freed yet.
#[allow(clippy::missing_safety_doc)]
pub trait Backend {
    unsafe fn open(&self, handle: &mut SENSEL_HANDLE) -> SenselStatus;
    unsafe fn get_device_list(&self, list: &mut SenselDeviceList) -> SenselStatus;
    unsafe fn open_device_by_id(&self, handle: &mut SENSEL_HANDLE, idx: u8) -> SenselStatus;
    /// `serial_num` is NUL-terminated.
    unsafe fn open_device_by_serial_num(
        &self,
        handle: &mut SENSEL_HANDLE,
        serial_num: &mut [u8],
    ) -> SenselStatus;
    /// `com_port` is NUL-terminated.
    unsafe fn open_device_by_com_port(
        &self,
        handle: &mut SENSEL_HANDLE,
        com_port: &mut [u8],
    ) -> SenselStatus;
    unsafe fn close(&self, handle: SENSEL_HANDLE) -> SenselStatus;
    unsafe fn soft_reset(&self, handle: SENSEL_HANDLE) -> SenselStatus;

    unsafe fn get_sensor_info(
        &self,
        handle: SENSEL_HANDLE,
        info: &mut SenselSensorInfo,
    ) -> SenselStatus;
    unsafe fn get_firmware_info(
        &self,
        handle: SENSEL_HANDLE,
        info: &mut SenselFirmwareInfo,
    ) -> SenselStatus;

    unsafe fn allocate_frame_data(
        &self,
        handle: SENSEL_HANDLE,
        data: &mut *mut SenselFrameData,
    ) -> SenselStatus;
    unsafe fn free_frame_data(
        &self,
        handle: SENSEL_HANDLE,
        data: *mut SenselFrameData,
    ) -> SenselStatus;

    unsafe fn set_scan_detail(&self, handle: SENSEL_HANDLE, detail: c_int) -> SenselStatus;
    unsafe fn get_scan_detail(&self, handle: SENSEL_HANDLE, detail: &mut c_int) -> SenselStatus;
    unsafe fn get_supported_frame_content(
        &self,
        handle: SENSEL_HANDLE,
        content: &mut u8,
    ) -> SenselStatus;
    unsafe fn set_frame_content(&self, handle: SENSEL_HANDLE, content: u8) -> SenselStatus;
    unsafe fn get_frame_content(&self, handle: SENSEL_HANDLE, content: &mut u8) -> SenselStatus;
    unsafe fn set_contacts_mask(&self, handle: SENSEL_HANDLE, mask: u8) -> SenselStatus;
    unsafe fn get_contacts_mask(&self, handle: SENSEL_HANDLE, mask: &mut u8) -> SenselStatus;

    unsafe fn start_scanning(&self, handle: SENSEL_HANDLE) -> SenselStatus;
    unsafe fn stop_scanning(&self, handle: SENSEL_HANDLE) -> SenselStatus;
    unsafe fn read_sensor(&self, handle: SENSEL_HANDLE) -> SenselStatus;
    unsafe fn get_num_available_frames(
        &self,
        handle: SENSEL_HANDLE,
        num_frames: &mut c_uint,
    ) -> SenselStatus;
    unsafe fn get_frame(&self, handle: SENSEL_HANDLE, data: *mut SenselFrameData) -> SenselStatus;

    unsafe fn get_num_available_leds(&self, handle: SENSEL_HANDLE, num: &mut u8)
        -> SenselStatus;
    unsafe fn get_max_led_brightness(&self, handle: SENSEL_HANDLE, max: &mut u16)
        -> SenselStatus;
    unsafe fn set_led_brightness(
        &self,
        handle: SENSEL_HANDLE,
        led_id: u8,
        brightness: u16,
    ) -> SenselStatus;
    unsafe fn get_led_brightness(
        &self,
        handle: SENSEL_HANDLE,
        led_id: u8,
        brightness: &mut u16,
    ) -> SenselStatus;
    unsafe fn get_power_button_pressed(
        &self,
        handle: SENSEL_HANDLE,
        pressed: &mut u8,
    ) -> SenselStatus;

    unsafe fn set_contacts_enable_blob_merge(&self, handle: SENSEL_HANDLE, val: u8)
        -> SenselStatus;
    unsafe fn get_contacts_enable_blob_merge(
        &self,
        handle: SENSEL_HANDLE,
        val: &mut u8,
    ) -> SenselStatus;
    unsafe fn set_contacts_min_force(&self, handle: SENSEL_HANDLE, val: u16) -> SenselStatus;
    unsafe fn get_contacts_min_force(&self, handle: SENSEL_HANDLE, val: &mut u16)
        -> SenselStatus;
    unsafe fn set_baseline_enabled(&self, handle: SENSEL_HANDLE, val: u8) -> SenselStatus;
    unsafe fn get_baseline_enabled(&self, handle: SENSEL_HANDLE, val: &mut u8) -> SenselStatus;
    unsafe fn set_dynamic_baseline_enabled(&self, handle: SENSEL_HANDLE, val: u8)
        -> SenselStatus;
    unsafe fn get_dynamic_baseline_enabled(
        &self,
        handle: SENSEL_HANDLE,
        val: &mut u8,
    ) -> SenselStatus;
    unsafe fn set_buffer_control(&self, handle: SENSEL_HANDLE, num: u8) -> SenselStatus;
    unsafe fn get_buffer_control(&self, handle: SENSEL_HANDLE, num: &mut u8) -> SenselStatus;
    unsafe fn set_scan_mode(&self, handle: SENSEL_HANDLE, mode: c_int) -> SenselStatus;
    unsafe fn get_scan_mode(&self, handle: SENSEL_HANDLE, mode: &mut c_int) -> SenselStatus;
    unsafe fn set_max_frame_rate(&self, handle: SENSEL_HANDLE, val: u16) -> SenselStatus;
    unsafe fn get_max_frame_rate(&self, handle: SENSEL_HANDLE, val: &mut u16) -> SenselStatus;

    /// Reads `buf.len()` bytes (at most 255) starting at register `reg`.
    unsafe fn read_reg(&self, handle: SENSEL_HANDLE, reg: u8, buf: &mut [u8]) -> SenselStatus;
    /// Writes `buf.len()` bytes (at most 255) starting at register `reg`.
    unsafe fn write_reg(&self, handle: SENSEL_HANDLE, reg: u8, buf: &mut [u8]) -> SenselStatus;
    /// Reads up to `buf.len()` bytes from a variable-sized register.
    unsafe fn read_reg_vs(
        &self,
        handle: SENSEL_HANDLE,
        reg: u8,
        buf: &mut [u8],
        read_size: &mut c_uint,
    ) -> SenselStatus;
    /// Writes up to `buf.len()` bytes to a variable-sized register.
    unsafe fn write_reg_vs(
        &self,
        handle: SENSEL_HANDLE,
        reg: u8,
        buf: &mut [u8],
        write_size: &mut c_uint,
    ) -> SenselStatus;
}
