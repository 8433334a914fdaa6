//! Raw declarations of the LibSensel C ABI.
//!
//! The records in here must match the memory layout of the native library byte for byte.
//! They are only ever filled in by the library (or the simulator) and read through the
//! safe wrappers in [`crate::types`] and [`crate::device`].
#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_int, c_uint, c_void};

/// Maximum number of devices reported by one enumeration.
pub const SENSEL_MAX_DEVICES: usize = 16;
/// Length of the serial number and com port buffers of a [`SenselDeviceID`].
pub const SENSEL_DEVICE_STRING_LEN: usize = 64;

pub const FRAME_CONTENT_PRESSURE_MASK: u8 = 0x01;
pub const FRAME_CONTENT_LABELS_MASK: u8 = 0x02;
pub const FRAME_CONTENT_CONTACTS_MASK: u8 = 0x04;
pub const FRAME_CONTENT_ACCEL_MASK: u8 = 0x08;

pub const CONTACT_MASK_ELLIPSE: u8 = 0x01;
pub const CONTACT_MASK_DELTAS: u8 = 0x02;
pub const CONTACT_MASK_BOUNDING_BOX: u8 = 0x04;
pub const CONTACT_MASK_PEAK: u8 = 0x08;

pub const CONTACT_INVALID: c_uint = 0;
pub const CONTACT_START: c_uint = 1;
pub const CONTACT_MOVE: c_uint = 2;
pub const CONTACT_END: c_uint = 3;

pub const SCAN_DETAIL_HIGH: c_int = 0;
pub const SCAN_DETAIL_MEDIUM: c_int = 1;
pub const SCAN_DETAIL_LOW: c_int = 2;
pub const SCAN_DETAIL_UNKNOWN: c_int = 3;

pub const SCAN_MODE_DISABLE: c_int = 0;
pub const SCAN_MODE_SYNC: c_int = 1;
pub const SCAN_MODE_ASYNC: c_int = 2;

/// Status code returned by every entry point.
pub type SenselStatus = c_int;
pub const SENSEL_OK: SenselStatus = 0;
pub const SENSEL_ERROR: SenselStatus = -1;

/// Opaque handle to an opened device.
pub type SENSEL_HANDLE = *mut c_void;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SenselSensorInfo {
    pub max_contacts: u8,
    pub num_rows: u16,
    pub num_cols: u16,
    /// Width in millimeters.
    pub width: f32,
    /// Height in millimeters.
    pub height: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenselFirmwareInfo {
    pub fw_protocol_version: u8,
    pub fw_version_major: u8,
    pub fw_version_minor: u8,
    pub fw_version_build: u16,
    pub fw_version_release: u8,
    pub device_id: u16,
    pub device_revision: u8,
}

/// One detected contact. Which of the optional blocks are valid is given by `content_bit_mask`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SenselContact {
    pub content_bit_mask: u8,
    pub id: u8,
    pub state: c_uint,
    pub x_pos: f32,
    pub y_pos: f32,
    pub total_force: f32,
    pub area: f32,

    // CONTACT_MASK_ELLIPSE
    pub orientation: f32,
    pub major_axis: f32,
    pub minor_axis: f32,

    // CONTACT_MASK_DELTAS
    pub delta_x: f32,
    pub delta_y: f32,
    pub delta_force: f32,
    pub delta_area: f32,

    // CONTACT_MASK_BOUNDING_BOX
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,

    // CONTACT_MASK_PEAK
    pub peak_x: f32,
    pub peak_y: f32,
    pub peak_force: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenselAccelData {
    pub x: c_int,
    pub y: c_int,
    pub z: c_int,
}

/// Container for one frame. The arrays are owned by whoever allocated the frame.
#[repr(C)]
#[derive(Debug)]
pub struct SenselFrameData {
    pub content_bit_mask: u8,
    pub lost_frame_count: c_int,
    pub n_contacts: u8,
    pub contacts: *mut SenselContact,
    pub force_array: *mut f32,
    pub labels_array: *mut u8,
    pub accel_data: *mut SenselAccelData,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenselDeviceID {
    pub idx: u8,
    pub serial_num: [u8; SENSEL_DEVICE_STRING_LEN],
    pub com_port: [u8; SENSEL_DEVICE_STRING_LEN],
}

impl Default for SenselDeviceID {
    fn default() -> Self {
        Self {
            idx: 0,
            serial_num: [0; SENSEL_DEVICE_STRING_LEN],
            com_port: [0; SENSEL_DEVICE_STRING_LEN],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenselDeviceList {
    pub num_devices: u8,
    pub devices: [SenselDeviceID; SENSEL_MAX_DEVICES],
}

// Signatures of the exported functions. WINAPI is stdcall on 32-bit Windows, which is what
// "system" resolves to; everywhere else it is the C calling convention.
pub type senselOpen = unsafe extern "system" fn(*mut SENSEL_HANDLE) -> SenselStatus;
pub type senselGetDeviceList = unsafe extern "system" fn(*mut SenselDeviceList) -> SenselStatus;
pub type senselOpenDeviceByID = unsafe extern "system" fn(*mut SENSEL_HANDLE, u8) -> SenselStatus;
pub type senselOpenDeviceBySerialNum =
    unsafe extern "system" fn(*mut SENSEL_HANDLE, *mut u8) -> SenselStatus;
pub type senselOpenDeviceByComPort =
    unsafe extern "system" fn(*mut SENSEL_HANDLE, *mut u8) -> SenselStatus;
pub type senselHandleFn = unsafe extern "system" fn(SENSEL_HANDLE) -> SenselStatus;
pub type senselGetSensorInfo =
    unsafe extern "system" fn(SENSEL_HANDLE, *mut SenselSensorInfo) -> SenselStatus;
pub type senselGetFirmwareInfo =
    unsafe extern "system" fn(SENSEL_HANDLE, *mut SenselFirmwareInfo) -> SenselStatus;
pub type senselAllocateFrameData =
    unsafe extern "system" fn(SENSEL_HANDLE, *mut *mut SenselFrameData) -> SenselStatus;
pub type senselFrameFn = unsafe extern "system" fn(SENSEL_HANDLE, *mut SenselFrameData) -> SenselStatus;
pub type senselSetInt = unsafe extern "system" fn(SENSEL_HANDLE, c_int) -> SenselStatus;
pub type senselGetInt = unsafe extern "system" fn(SENSEL_HANDLE, *mut c_int) -> SenselStatus;
pub type senselSetU8 = unsafe extern "system" fn(SENSEL_HANDLE, u8) -> SenselStatus;
pub type senselGetU8 = unsafe extern "system" fn(SENSEL_HANDLE, *mut u8) -> SenselStatus;
pub type senselSetU16 = unsafe extern "system" fn(SENSEL_HANDLE, u16) -> SenselStatus;
pub type senselGetU16 = unsafe extern "system" fn(SENSEL_HANDLE, *mut u16) -> SenselStatus;
pub type senselGetUInt = unsafe extern "system" fn(SENSEL_HANDLE, *mut c_uint) -> SenselStatus;
pub type senselSetLEDBrightness = unsafe extern "system" fn(SENSEL_HANDLE, u8, u16) -> SenselStatus;
pub type senselGetLEDBrightness =
    unsafe extern "system" fn(SENSEL_HANDLE, u8, *mut u16) -> SenselStatus;
pub type senselReadWriteReg = unsafe extern "system" fn(SENSEL_HANDLE, u8, u8, *mut u8) -> SenselStatus;
pub type senselReadWriteRegVS =
    unsafe extern "system" fn(SENSEL_HANDLE, u8, c_uint, *mut u8, *mut c_uint) -> SenselStatus;

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};
    use std::ptr;

    /// Reinterpret a byte blob as a record, like the native library hands it to us.
    fn from_blob<T: Copy>(blob: &[u8]) -> T {
        assert_eq!(blob.len(), size_of::<T>());
        unsafe { ptr::read_unaligned(blob.as_ptr().cast::<T>()) }
    }

    #[test]
    fn test_sensor_info_layout() {
        assert_eq!(size_of::<SenselSensorInfo>(), 16);
        assert_eq!(offset_of!(SenselSensorInfo, max_contacts), 0);
        assert_eq!(offset_of!(SenselSensorInfo, num_rows), 2);
        assert_eq!(offset_of!(SenselSensorInfo, num_cols), 4);
        assert_eq!(offset_of!(SenselSensorInfo, width), 8);
        assert_eq!(offset_of!(SenselSensorInfo, height), 12);
    }

    #[test]
    fn test_sensor_info_blob() {
        // Morph: 16 contacts, 105 rows, 185 cols, 240mm x 139mm. Padding bytes are garbage.
        let mut blob = vec![0x10, 0xAA, 0x69, 0x00, 0xB9, 0x00, 0xBB, 0xBB];
        blob.extend_from_slice(&240.0_f32.to_le_bytes());
        blob.extend_from_slice(&139.0_f32.to_le_bytes());

        if cfg!(target_endian = "little") {
            let info: SenselSensorInfo = from_blob(&blob);
            assert_eq!(
                info,
                SenselSensorInfo {
                    max_contacts: 16,
                    num_rows: 105,
                    num_cols: 185,
                    width: 240.0,
                    height: 139.0,
                }
            );
        }
    }

    #[test]
    fn test_contact_layout() {
        assert_eq!(size_of::<SenselContact>(), 80);
        assert_eq!(offset_of!(SenselContact, content_bit_mask), 0);
        assert_eq!(offset_of!(SenselContact, id), 1);
        assert_eq!(offset_of!(SenselContact, state), 4);
        assert_eq!(offset_of!(SenselContact, x_pos), 8);
        assert_eq!(offset_of!(SenselContact, area), 20);
        assert_eq!(offset_of!(SenselContact, orientation), 24);
        assert_eq!(offset_of!(SenselContact, delta_x), 36);
        assert_eq!(offset_of!(SenselContact, min_x), 52);
        assert_eq!(offset_of!(SenselContact, peak_x), 68);
        assert_eq!(offset_of!(SenselContact, peak_force), 76);
    }

    #[test]
    fn test_contact_blob() {
        let mut blob = vec![0x0F, 0x03, 0x00, 0x00];
        blob.extend_from_slice(&CONTACT_MOVE.to_le_bytes());
        for i in 0..18 {
            blob.extend_from_slice(&(i as f32 * 0.5).to_le_bytes());
        }

        if cfg!(target_endian = "little") {
            let contact: SenselContact = from_blob(&blob);
            assert_eq!(contact.content_bit_mask, 0x0F);
            assert_eq!(contact.id, 3);
            assert_eq!(contact.state, CONTACT_MOVE);
            assert_eq!(contact.x_pos, 0.0);
            assert_eq!(contact.total_force, 1.0);
            assert_eq!(contact.orientation, 2.0);
            assert_eq!(contact.max_y, 7.0);
            assert_eq!(contact.peak_force, 8.5);
        }
    }

    #[test]
    fn test_accel_layout() {
        assert_eq!(size_of::<SenselAccelData>(), 12);
        assert_eq!(offset_of!(SenselAccelData, y), 4);
        assert_eq!(offset_of!(SenselAccelData, z), 8);
    }

    #[test]
    fn test_firmware_info_layout() {
        assert_eq!(size_of::<SenselFirmwareInfo>(), 12);
        assert_eq!(offset_of!(SenselFirmwareInfo, fw_version_minor), 2);
        assert_eq!(offset_of!(SenselFirmwareInfo, fw_version_build), 4);
        assert_eq!(offset_of!(SenselFirmwareInfo, fw_version_release), 6);
        assert_eq!(offset_of!(SenselFirmwareInfo, device_id), 8);
        assert_eq!(offset_of!(SenselFirmwareInfo, device_revision), 10);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_frame_data_layout_64() {
        assert_eq!(size_of::<SenselFrameData>(), 48);
        assert_eq!(offset_of!(SenselFrameData, lost_frame_count), 4);
        assert_eq!(offset_of!(SenselFrameData, n_contacts), 8);
        assert_eq!(offset_of!(SenselFrameData, contacts), 16);
        assert_eq!(offset_of!(SenselFrameData, force_array), 24);
        assert_eq!(offset_of!(SenselFrameData, labels_array), 32);
        assert_eq!(offset_of!(SenselFrameData, accel_data), 40);
    }

    #[test]
    #[cfg(target_pointer_width = "32")]
    fn test_frame_data_layout_32() {
        assert_eq!(size_of::<SenselFrameData>(), 28);
        assert_eq!(offset_of!(SenselFrameData, contacts), 12);
        assert_eq!(offset_of!(SenselFrameData, accel_data), 24);
    }

    #[test]
    fn test_device_list_layout() {
        assert_eq!(size_of::<SenselDeviceID>(), 129);
        assert_eq!(align_of::<SenselDeviceID>(), 1);
        assert_eq!(offset_of!(SenselDeviceID, serial_num), 1);
        assert_eq!(offset_of!(SenselDeviceID, com_port), 65);
        assert_eq!(size_of::<SenselDeviceList>(), 1 + 16 * 129);
        assert_eq!(offset_of!(SenselDeviceList, devices), 1);
    }

    #[test]
    fn test_device_list_blob() {
        let mut blob = vec![0u8; size_of::<SenselDeviceList>()];
        blob[0] = 1;
        blob[1] = 7;
        blob[2..10].copy_from_slice(b"SM01A123");
        blob[66..78].copy_from_slice(b"/dev/ttyACM0");

        let list: SenselDeviceList = from_blob(&blob);
        assert_eq!(list.num_devices, 1);
        assert_eq!(list.devices[0].idx, 7);
        assert_eq!(&list.devices[0].serial_num[..8], b"SM01A123");
        assert_eq!(list.devices[0].serial_num[8], 0);
        assert_eq!(&list.devices[0].com_port[..12], b"/dev/ttyACM0");
        assert_eq!(list.devices[1], SenselDeviceID::default());
    }
}
