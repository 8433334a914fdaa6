//! Loading of the native LibSensel shared library.

use const_format::formatcp;
use libloading::Library;
use std::{
    ffi::{c_int, c_uint},
    path::{Path, PathBuf},
};

use crate::{
    backend::Backend,
    error::SenselError,
    ffi::{self, *},
};

#[cfg(all(windows, target_pointer_width = "64"))]
const SENSEL_LIB_DIR: &str = "C:\\Program Files\\Sensel\\SenselLib\\x64";
#[cfg(all(windows, not(target_pointer_width = "64")))]
const SENSEL_LIB_DIR: &str = "C:\\Program Files\\Sensel\\SenselLib\\x86";

/// Where the vendor installer puts the library on this platform.
#[cfg(windows)]
pub const DEFAULT_LIBRARY_PATH: &str = formatcp!("{}\\LibSensel.dll", SENSEL_LIB_DIR);
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_PATH: &str = formatcp!("{}/libSensel.dylib", "/usr/local/lib");
#[cfg(not(any(windows, target_os = "macos")))]
pub const DEFAULT_LIBRARY_PATH: &str = formatcp!("{}/libsensel.so", "/usr/lib");

/// On Windows the pressure decompression lives in a separate DLL next to the main one.
#[cfg(windows)]
const DECOMPRESS_LIBRARY_NAME: &str = "LibSenselDecompress.dll";

/// Resolves a symbol of the given function pointer type.
macro_rules! symbol {
    ($lib:expr, $name:literal, $ty:ty) => {{
        // SAFETY: the type matches the prototype in the vendor header.
        let symbol = unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }.map_err(
            |source| SenselError::MissingSymbol {
                symbol: $name,
                source,
            },
        )?;
        *symbol
    }};
}

/// Function pointers of every entry point we use.
struct Api {
    open: ffi::senselOpen,
    get_device_list: ffi::senselGetDeviceList,
    open_device_by_id: ffi::senselOpenDeviceByID,
    open_device_by_serial_num: ffi::senselOpenDeviceBySerialNum,
    open_device_by_com_port: ffi::senselOpenDeviceByComPort,
    close: senselHandleFn,
    soft_reset: senselHandleFn,
    get_sensor_info: ffi::senselGetSensorInfo,
    get_firmware_info: ffi::senselGetFirmwareInfo,
    allocate_frame_data: ffi::senselAllocateFrameData,
    free_frame_data: senselFrameFn,
    set_scan_detail: senselSetInt,
    get_scan_detail: senselGetInt,
    get_supported_frame_content: senselGetU8,
    set_frame_content: senselSetU8,
    get_frame_content: senselGetU8,
    set_contacts_mask: senselSetU8,
    get_contacts_mask: senselGetU8,
    start_scanning: senselHandleFn,
    stop_scanning: senselHandleFn,
    read_sensor: senselHandleFn,
    get_num_available_frames: senselGetUInt,
    get_frame: senselFrameFn,
    get_num_available_leds: senselGetU8,
    get_max_led_brightness: senselGetU16,
    set_led_brightness: ffi::senselSetLEDBrightness,
    get_led_brightness: ffi::senselGetLEDBrightness,
    get_power_button_pressed: senselGetU8,
    set_contacts_enable_blob_merge: senselSetU8,
    get_contacts_enable_blob_merge: senselGetU8,
    set_contacts_min_force: senselSetU16,
    get_contacts_min_force: senselGetU16,
    set_baseline_enabled: senselSetU8,
    get_baseline_enabled: senselGetU8,
    set_dynamic_baseline_enabled: senselSetU8,
    get_dynamic_baseline_enabled: senselGetU8,
    set_buffer_control: senselSetU8,
    get_buffer_control: senselGetU8,
    set_scan_mode: senselSetInt,
    get_scan_mode: senselGetInt,
    set_max_frame_rate: senselSetU16,
    get_max_frame_rate: senselGetU16,
    read_reg: senselReadWriteReg,
    write_reg: senselReadWriteReg,
    read_reg_vs: senselReadWriteRegVS,
    write_reg_vs: senselReadWriteRegVS,
}

impl Api {
    fn resolve(lib: &Library) -> Result<Self, SenselError> {
        Ok(Self {
            open: symbol!(lib, "senselOpen", ffi::senselOpen),
            get_device_list: symbol!(lib, "senselGetDeviceList", ffi::senselGetDeviceList),
            open_device_by_id: symbol!(lib, "senselOpenDeviceByID", ffi::senselOpenDeviceByID),
            open_device_by_serial_num: symbol!(
                lib,
                "senselOpenDeviceBySerialNum",
                ffi::senselOpenDeviceBySerialNum
            ),
            open_device_by_com_port: symbol!(
                lib,
                "senselOpenDeviceByComPort",
                ffi::senselOpenDeviceByComPort
            ),
            close: symbol!(lib, "senselClose", senselHandleFn),
            soft_reset: symbol!(lib, "senselSoftReset", senselHandleFn),
            get_sensor_info: symbol!(lib, "senselGetSensorInfo", ffi::senselGetSensorInfo),
            get_firmware_info: symbol!(lib, "senselGetFirmwareInfo", ffi::senselGetFirmwareInfo),
            allocate_frame_data: symbol!(
                lib,
                "senselAllocateFrameData",
                ffi::senselAllocateFrameData
            ),
            free_frame_data: symbol!(lib, "senselFreeFrameData", senselFrameFn),
            set_scan_detail: symbol!(lib, "senselSetScanDetail", senselSetInt),
            get_scan_detail: symbol!(lib, "senselGetScanDetail", senselGetInt),
            get_supported_frame_content: symbol!(lib, "senselGetSupportedFrameContent", senselGetU8),
            set_frame_content: symbol!(lib, "senselSetFrameContent", senselSetU8),
            get_frame_content: symbol!(lib, "senselGetFrameContent", senselGetU8),
            set_contacts_mask: symbol!(lib, "senselSetContactsMask", senselSetU8),
            get_contacts_mask: symbol!(lib, "senselGetContactsMask", senselGetU8),
            start_scanning: symbol!(lib, "senselStartScanning", senselHandleFn),
            stop_scanning: symbol!(lib, "senselStopScanning", senselHandleFn),
            read_sensor: symbol!(lib, "senselReadSensor", senselHandleFn),
            get_num_available_frames: symbol!(lib, "senselGetNumAvailableFrames", senselGetUInt),
            get_frame: symbol!(lib, "senselGetFrame", senselFrameFn),
            get_num_available_leds: symbol!(lib, "senselGetNumAvailableLEDs", senselGetU8),
            get_max_led_brightness: symbol!(lib, "senselGetMaxLEDBrightness", senselGetU16),
            set_led_brightness: symbol!(lib, "senselSetLEDBrightness", ffi::senselSetLEDBrightness),
            get_led_brightness: symbol!(lib, "senselGetLEDBrightness", ffi::senselGetLEDBrightness),
            get_power_button_pressed: symbol!(lib, "senselGetPowerButtonPressed", senselGetU8),
            set_contacts_enable_blob_merge: symbol!(
                lib,
                "senselSetContactsEnableBlobMerge",
                senselSetU8
            ),
            get_contacts_enable_blob_merge: symbol!(
                lib,
                "senselGetContactsEnableBlobMerge",
                senselGetU8
            ),
            set_contacts_min_force: symbol!(lib, "senselSetContactsMinForce", senselSetU16),
            get_contacts_min_force: symbol!(lib, "senselGetContactsMinForce", senselGetU16),
            set_baseline_enabled: symbol!(lib, "senselSetBaselineEnabled", senselSetU8),
            get_baseline_enabled: symbol!(lib, "senselGetBaselineEnabled", senselGetU8),
            set_dynamic_baseline_enabled: symbol!(
                lib,
                "senselSetDynamicBaselineEnabled",
                senselSetU8
            ),
            get_dynamic_baseline_enabled: symbol!(
                lib,
                "senselGetDynamicBaselineEnabled",
                senselGetU8
            ),
            set_buffer_control: symbol!(lib, "senselSetBufferControl", senselSetU8),
            get_buffer_control: symbol!(lib, "senselGetBufferControl", senselGetU8),
            set_scan_mode: symbol!(lib, "senselSetScanMode", senselSetInt),
            get_scan_mode: symbol!(lib, "senselGetScanMode", senselGetInt),
            set_max_frame_rate: symbol!(lib, "senselSetMaxFrameRate", senselSetU16),
            get_max_frame_rate: symbol!(lib, "senselGetMaxFrameRate", senselGetU16),
            read_reg: symbol!(lib, "senselReadReg", senselReadWriteReg),
            write_reg: symbol!(lib, "senselWriteReg", senselReadWriteReg),
            read_reg_vs: symbol!(lib, "senselReadRegVS", senselReadWriteRegVS),
            write_reg_vs: symbol!(lib, "senselWriteRegVS", senselReadWriteRegVS),
        })
    }
}

/// The loaded native library.
///
/// The function pointers in `api` stay valid as long as `_lib` is loaded, which is exactly
/// the lifetime of this value.
pub struct SenselLib {
    api: Api,
    path: PathBuf,
    _lib: Library,
    #[cfg(windows)]
    _decompress: Option<Library>,
}

impl SenselLib {
    /// Loads the library from the vendor's default install location.
    pub fn load_default() -> Result<Self, SenselError> {
        log::warn!("Using default library path: {}.", DEFAULT_LIBRARY_PATH);
        Self::load(DEFAULT_LIBRARY_PATH)
    }

    /// Loads the library at `path` and resolves all entry points.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SenselError> {
        log::trace!("Entering SenselLib::load.");
        let path = path.as_ref().to_path_buf();

        #[cfg(windows)]
        let decompress = Self::load_decompress(&path);

        // SAFETY: loading runs the library's initialisers. LibSensel has none with preconditions.
        let lib = unsafe { Library::new(&path) }.map_err(|source| SenselError::LoadLibrary {
            path: path.clone(),
            source,
        })?;
        log::info!("Loaded Sensel library {}.", path.display());

        let api = Api::resolve(&lib)?;

        log::trace!("Leaving SenselLib::load.");
        Ok(Self {
            api,
            path,
            _lib: lib,
            #[cfg(windows)]
            _decompress: decompress,
        })
    }

    #[cfg(windows)]
    fn load_decompress(path: &Path) -> Option<Library> {
        let decompress_path = path.with_file_name(DECOMPRESS_LIBRARY_NAME);
        if !decompress_path.exists() {
            log::warn!(
                "No {} next to the Sensel library, pressure data may be unavailable.",
                DECOMPRESS_LIBRARY_NAME
            );
            return None;
        }
        // SAFETY: see `load`.
        match unsafe { Library::new(&decompress_path) } {
            Ok(lib) => {
                log::info!("Loaded {}.", decompress_path.display());
                Some(lib)
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", decompress_path.display(), e);
                None
            }
        }
    }

    /// Path the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for SenselLib {
    unsafe fn open(&self, handle: &mut SENSEL_HANDLE) -> SenselStatus {
        (self.api.open)(handle)
    }

    unsafe fn get_device_list(&self, list: &mut SenselDeviceList) -> SenselStatus {
        (self.api.get_device_list)(list)
    }

    unsafe fn open_device_by_id(&self, handle: &mut SENSEL_HANDLE, idx: u8) -> SenselStatus {
        (self.api.open_device_by_id)(handle, idx)
    }

    unsafe fn open_device_by_serial_num(
        &self,
        handle: &mut SENSEL_HANDLE,
        serial_num: &mut [u8],
    ) -> SenselStatus {
        (self.api.open_device_by_serial_num)(handle, serial_num.as_mut_ptr())
    }

    unsafe fn open_device_by_com_port(
        &self,
        handle: &mut SENSEL_HANDLE,
        com_port: &mut [u8],
    ) -> SenselStatus {
        (self.api.open_device_by_com_port)(handle, com_port.as_mut_ptr())
    }

    unsafe fn close(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        (self.api.close)(handle)
    }

    unsafe fn soft_reset(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        (self.api.soft_reset)(handle)
    }

    unsafe fn get_sensor_info(
        &self,
        handle: SENSEL_HANDLE,
        info: &mut SenselSensorInfo,
    ) -> SenselStatus {
        (self.api.get_sensor_info)(handle, info)
    }

    unsafe fn get_firmware_info(
        &self,
        handle: SENSEL_HANDLE,
        info: &mut SenselFirmwareInfo,
    ) -> SenselStatus {
        (self.api.get_firmware_info)(handle, info)
    }

    unsafe fn allocate_frame_data(
        &self,
        handle: SENSEL_HANDLE,
        data: &mut *mut SenselFrameData,
    ) -> SenselStatus {
        (self.api.allocate_frame_data)(handle, data)
    }

    unsafe fn free_frame_data(
        &self,
        handle: SENSEL_HANDLE,
        data: *mut SenselFrameData,
    ) -> SenselStatus {
        (self.api.free_frame_data)(handle, data)
    }

    unsafe fn set_scan_detail(&self, handle: SENSEL_HANDLE, detail: c_int) -> SenselStatus {
        (self.api.set_scan_detail)(handle, detail)
    }

    unsafe fn get_scan_detail(&self, handle: SENSEL_HANDLE, detail: &mut c_int) -> SenselStatus {
        (self.api.get_scan_detail)(handle, detail)
    }

    unsafe fn get_supported_frame_content(
        &self,
        handle: SENSEL_HANDLE,
        content: &mut u8,
    ) -> SenselStatus {
        (self.api.get_supported_frame_content)(handle, content)
    }

    unsafe fn set_frame_content(&self, handle: SENSEL_HANDLE, content: u8) -> SenselStatus {
        (self.api.set_frame_content)(handle, content)
    }

    unsafe fn get_frame_content(&self, handle: SENSEL_HANDLE, content: &mut u8) -> SenselStatus {
        (self.api.get_frame_content)(handle, content)
    }

    unsafe fn set_contacts_mask(&self, handle: SENSEL_HANDLE, mask: u8) -> SenselStatus {
        (self.api.set_contacts_mask)(handle, mask)
    }

    unsafe fn get_contacts_mask(&self, handle: SENSEL_HANDLE, mask: &mut u8) -> SenselStatus {
        (self.api.get_contacts_mask)(handle, mask)
    }

    unsafe fn start_scanning(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        (self.api.start_scanning)(handle)
    }

    unsafe fn stop_scanning(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        (self.api.stop_scanning)(handle)
    }

    unsafe fn read_sensor(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        (self.api.read_sensor)(handle)
    }

    unsafe fn get_num_available_frames(
        &self,
        handle: SENSEL_HANDLE,
        num_frames: &mut c_uint,
    ) -> SenselStatus {
        (self.api.get_num_available_frames)(handle, num_frames)
    }

    unsafe fn get_frame(&self, handle: SENSEL_HANDLE, data: *mut SenselFrameData) -> SenselStatus {
        (self.api.get_frame)(handle, data)
    }

    unsafe fn get_num_available_leds(&self, handle: SENSEL_HANDLE, num: &mut u8) -> SenselStatus {
        (self.api.get_num_available_leds)(handle, num)
    }

    unsafe fn get_max_led_brightness(&self, handle: SENSEL_HANDLE, max: &mut u16) -> SenselStatus {
        (self.api.get_max_led_brightness)(handle, max)
    }

    unsafe fn set_led_brightness(
        &self,
        handle: SENSEL_HANDLE,
        led_id: u8,
        brightness: u16,
    ) -> SenselStatus {
        (self.api.set_led_brightness)(handle, led_id, brightness)
    }

    unsafe fn get_led_brightness(
        &self,
        handle: SENSEL_HANDLE,
        led_id: u8,
        brightness: &mut u16,
    ) -> SenselStatus {
        (self.api.get_led_brightness)(handle, led_id, brightness)
    }

    unsafe fn get_power_button_pressed(
        &self,
        handle: SENSEL_HANDLE,
        pressed: &mut u8,
    ) -> SenselStatus {
        (self.api.get_power_button_pressed)(handle, pressed)
    }

    unsafe fn set_contacts_enable_blob_merge(&self, handle: SENSEL_HANDLE, val: u8) -> SenselStatus {
        (self.api.set_contacts_enable_blob_merge)(handle, val)
    }

    unsafe fn get_contacts_enable_blob_merge(
        &self,
        handle: SENSEL_HANDLE,
        val: &mut u8,
    ) -> SenselStatus {
        (self.api.get_contacts_enable_blob_merge)(handle, val)
    }

    unsafe fn set_contacts_min_force(&self, handle: SENSEL_HANDLE, val: u16) -> SenselStatus {
        (self.api.set_contacts_min_force)(handle, val)
    }

    unsafe fn get_contacts_min_force(&self, handle: SENSEL_HANDLE, val: &mut u16) -> SenselStatus {
        (self.api.get_contacts_min_force)(handle, val)
    }

    unsafe fn set_baseline_enabled(&self, handle: SENSEL_HANDLE, val: u8) -> SenselStatus {
        (self.api.set_baseline_enabled)(handle, val)
    }

    unsafe fn get_baseline_enabled(&self, handle: SENSEL_HANDLE, val: &mut u8) -> SenselStatus {
        (self.api.get_baseline_enabled)(handle, val)
    }

    unsafe fn set_dynamic_baseline_enabled(&self, handle: SENSEL_HANDLE, val: u8) -> SenselStatus {
        (self.api.set_dynamic_baseline_enabled)(handle, val)
    }

    unsafe fn get_dynamic_baseline_enabled(
        &self,
        handle: SENSEL_HANDLE,
        val: &mut u8,
    ) -> SenselStatus {
        (self.api.get_dynamic_baseline_enabled)(handle, val)
    }

    unsafe fn set_buffer_control(&self, handle: SENSEL_HANDLE, num: u8) -> SenselStatus {
        (self.api.set_buffer_control)(handle, num)
    }

    unsafe fn get_buffer_control(&self, handle: SENSEL_HANDLE, num: &mut u8) -> SenselStatus {
        (self.api.get_buffer_control)(handle, num)
    }

    unsafe fn set_scan_mode(&self, handle: SENSEL_HANDLE, mode: c_int) -> SenselStatus {
        (self.api.set_scan_mode)(handle, mode)
    }

    unsafe fn get_scan_mode(&self, handle: SENSEL_HANDLE, mode: &mut c_int) -> SenselStatus {
        (self.api.get_scan_mode)(handle, mode)
    }

    unsafe fn set_max_frame_rate(&self, handle: SENSEL_HANDLE, val: u16) -> SenselStatus {
        (self.api.set_max_frame_rate)(handle, val)
    }

    unsafe fn get_max_frame_rate(&self, handle: SENSEL_HANDLE, val: &mut u16) -> SenselStatus {
        (self.api.get_max_frame_rate)(handle, val)
    }

    unsafe fn read_reg(&self, handle: SENSEL_HANDLE, reg: u8, buf: &mut [u8]) -> SenselStatus {
        match u8::try_from(buf.len()) {
            Ok(size) => (self.api.read_reg)(handle, reg, size, buf.as_mut_ptr()),
            Err(_) => SENSEL_ERROR,
        }
    }

    unsafe fn write_reg(&self, handle: SENSEL_HANDLE, reg: u8, buf: &mut [u8]) -> SenselStatus {
        match u8::try_from(buf.len()) {
            Ok(size) => (self.api.write_reg)(handle, reg, size, buf.as_mut_ptr()),
            Err(_) => SENSEL_ERROR,
        }
    }

    unsafe fn read_reg_vs(
        &self,
        handle: SENSEL_HANDLE,
        reg: u8,
        buf: &mut [u8],
        read_size: &mut c_uint,
    ) -> SenselStatus {
        match c_uint::try_from(buf.len()) {
            Ok(size) => (self.api.read_reg_vs)(handle, reg, size, buf.as_mut_ptr(), read_size),
            Err(_) => SENSEL_ERROR,
        }
    }

    unsafe fn write_reg_vs(
        &self,
        handle: SENSEL_HANDLE,
        reg: u8,
        buf: &mut [u8],
        write_size: &mut c_uint,
    ) -> SenselStatus {
        match c_uint::try_from(buf.len()) {
            Ok(size) => (self.api.write_reg_vs)(handle, reg, size, buf.as_mut_ptr(), write_size),
            Err(_) => SENSEL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_reported() {
        let path = Path::new("/nonexistent/dir/libsensel-missing.so");
        match SenselLib::load(path) {
            Err(SenselError::LoadLibrary { path: p, .. }) => assert_eq!(p, path),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("loading a nonexistent library succeeded"),
        }
    }
}
