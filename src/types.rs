//! Safe views of the records exchanged with the Sensel library.

use serde::{Deserialize, Serialize};
use std::{
    ffi::{c_int, c_uint},
    fmt,
    ops::BitOr,
};

use crate::ffi::{self, SenselDeviceID, SenselDeviceList, SenselFirmwareInfo, SenselSensorInfo};

/// A contact as reported in a frame.
pub type Contact = ffi::SenselContact;
/// One accelerometer sample.
pub type AccelData = ffi::SenselAccelData;

/// Mask selecting which arrays get populated in each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameContent(u8);

impl FrameContent {
    pub const NONE: Self = Self(0);
    pub const PRESSURE: Self = Self(ffi::FRAME_CONTENT_PRESSURE_MASK);
    pub const LABELS: Self = Self(ffi::FRAME_CONTENT_LABELS_MASK);
    pub const CONTACTS: Self = Self(ffi::FRAME_CONTENT_CONTACTS_MASK);
    pub const ACCEL: Self = Self(ffi::FRAME_CONTENT_ACCEL_MASK);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for FrameContent {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for FrameContent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (Self::PRESSURE, "pressure"),
            (Self::LABELS, "labels"),
            (Self::CONTACTS, "contacts"),
            (Self::ACCEL, "accel"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect::<Vec<_>>();

        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

/// Mask selecting which optional blocks of a [`Contact`] get populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactMask(u8);

impl ContactMask {
    pub const NONE: Self = Self(0);
    pub const ELLIPSE: Self = Self(ffi::CONTACT_MASK_ELLIPSE);
    pub const DELTAS: Self = Self(ffi::CONTACT_MASK_DELTAS);
    pub const BOUNDING_BOX: Self = Self(ffi::CONTACT_MASK_BOUNDING_BOX);
    pub const PEAK: Self = Self(ffi::CONTACT_MASK_PEAK);
    pub const ALL: Self = Self(0x0F);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ContactMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Lifecycle state of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactState {
    Invalid,
    Start,
    Move,
    End,
}

impl From<c_uint> for ContactState {
    /// Unknown states are treated as invalid contacts.
    fn from(state: c_uint) -> Self {
        match state {
            ffi::CONTACT_START => Self::Start,
            ffi::CONTACT_MOVE => Self::Move,
            ffi::CONTACT_END => Self::End,
            _ => Self::Invalid,
        }
    }
}

impl From<ContactState> for c_uint {
    fn from(state: ContactState) -> Self {
        match state {
            ContactState::Invalid => ffi::CONTACT_INVALID,
            ContactState::Start => ffi::CONTACT_START,
            ContactState::Move => ffi::CONTACT_MOVE,
            ContactState::End => ffi::CONTACT_END,
        }
    }
}

impl fmt::Display for ContactState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "CONTACT_INVALID",
            Self::Start => "CONTACT_START",
            Self::Move => "CONTACT_MOVE",
            Self::End => "CONTACT_END",
        })
    }
}

impl Contact {
    pub fn contact_state(&self) -> ContactState {
        ContactState::from(self.state)
    }

    /// Which optional blocks of this contact hold valid data.
    pub fn content(&self) -> ContactMask {
        ContactMask::from_bits(self.content_bit_mask)
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Contact ID: {} State: {}", self.id, self.contact_state())
    }
}

/// Resolution the sensor is scanned at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanDetail {
    #[default]
    High,
    Medium,
    Low,
    Unknown,
}

impl From<c_int> for ScanDetail {
    fn from(detail: c_int) -> Self {
        match detail {
            ffi::SCAN_DETAIL_HIGH => Self::High,
            ffi::SCAN_DETAIL_MEDIUM => Self::Medium,
            ffi::SCAN_DETAIL_LOW => Self::Low,
            _ => Self::Unknown,
        }
    }
}

impl From<ScanDetail> for c_int {
    fn from(detail: ScanDetail) -> Self {
        match detail {
            ScanDetail::High => ffi::SCAN_DETAIL_HIGH,
            ScanDetail::Medium => ffi::SCAN_DETAIL_MEDIUM,
            ScanDetail::Low => ffi::SCAN_DETAIL_LOW,
            ScanDetail::Unknown => ffi::SCAN_DETAIL_UNKNOWN,
        }
    }
}

/// How the device reports scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Disable,
    Sync,
    Async,
}

impl TryFrom<c_int> for ScanMode {
    type Error = c_int;

    fn try_from(mode: c_int) -> Result<Self, Self::Error> {
        match mode {
            ffi::SCAN_MODE_DISABLE => Ok(Self::Disable),
            ffi::SCAN_MODE_SYNC => Ok(Self::Sync),
            ffi::SCAN_MODE_ASYNC => Ok(Self::Async),
            other => Err(other),
        }
    }
}

impl From<ScanMode> for c_int {
    fn from(mode: ScanMode) -> Self {
        match mode {
            ScanMode::Disable => ffi::SCAN_MODE_DISABLE,
            ScanMode::Sync => ffi::SCAN_MODE_SYNC,
            ScanMode::Async => ffi::SCAN_MODE_ASYNC,
        }
    }
}

/// Identity of an enumerated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    pub idx: u8,
    pub serial_num: String,
    pub com_port: String,
}

/// Decodes a NUL-terminated byte buffer.
fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

impl From<&SenselDeviceID> for DeviceId {
    fn from(id: &SenselDeviceID) -> Self {
        Self {
            idx: id.idx,
            serial_num: c_string(&id.serial_num),
            com_port: c_string(&id.com_port),
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {} ({})", self.idx, self.serial_num, self.com_port)
    }
}

/// Decodes the populated part of a device list.
pub fn decode_device_list(list: &SenselDeviceList) -> Vec<DeviceId> {
    let count = usize::from(list.num_devices).min(ffi::SENSEL_MAX_DEVICES);
    list.devices[..count].iter().map(DeviceId::from).collect()
}

/// Geometry of the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorInfo {
    pub max_contacts: u8,
    pub num_rows: u16,
    pub num_cols: u16,
    /// Width in millimeters.
    pub width: f32,
    /// Height in millimeters.
    pub height: f32,
}

impl SensorInfo {
    /// Number of sensor elements, i.e. the length of the force and label arrays.
    pub fn num_cells(&self) -> usize {
        usize::from(self.num_rows) * usize::from(self.num_cols)
    }
}

impl From<SenselSensorInfo> for SensorInfo {
    fn from(info: SenselSensorInfo) -> Self {
        Self {
            max_contacts: info.max_contacts,
            num_rows: info.num_rows,
            num_cols: info.num_cols,
            width: info.width,
            height: info.height,
        }
    }
}

impl From<SensorInfo> for SenselSensorInfo {
    fn from(info: SensorInfo) -> Self {
        Self {
            max_contacts: info.max_contacts,
            num_rows: info.num_rows,
            num_cols: info.num_cols,
            width: info.width,
            height: info.height,
        }
    }
}

impl fmt::Display for SensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Width: {}mm\n\
            Height: {}mm\n\
            Cols: {}\n\
            Rows: {}",
            self.width, self.height, self.num_cols, self.num_rows
        )
    }
}

/// Firmware and hardware revision of a device.
pub type FirmwareInfo = SenselFirmwareInfo;

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Firmware {}.{}.{} (release {}, protocol {}), device 0x{:04X} rev {}",
            self.fw_version_major,
            self.fw_version_minor,
            self.fw_version_build,
            self.fw_version_release,
            self.fw_protocol_version,
            self.device_id,
            self.device_revision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_decoding() {
        let mut raw = SenselDeviceID::default();
        raw.idx = 2;
        raw.serial_num[..8].copy_from_slice(b"SM01B987");
        raw.com_port[..4].copy_from_slice(b"COM3");
        // Bytes after the terminator are ignored.
        raw.com_port[5] = b'X';

        assert_eq!(
            DeviceId::from(&raw),
            DeviceId {
                idx: 2,
                serial_num: String::from("SM01B987"),
                com_port: String::from("COM3"),
            }
        );
    }

    #[test]
    fn test_device_id_without_terminator() {
        let mut raw = SenselDeviceID::default();
        raw.serial_num = [b'A'; 64];
        assert_eq!(DeviceId::from(&raw).serial_num.len(), 64);
    }

    #[test]
    fn test_device_list_count_is_clamped() {
        let mut list = SenselDeviceList::default();
        list.num_devices = 200;
        assert_eq!(decode_device_list(&list).len(), ffi::SENSEL_MAX_DEVICES);

        list.num_devices = 0;
        assert!(decode_device_list(&list).is_empty());
    }

    #[test]
    fn test_contact_state() {
        assert_eq!(ContactState::from(1_u32), ContactState::Start);
        assert_eq!(ContactState::from(3_u32), ContactState::End);
        assert_eq!(ContactState::from(17_u32), ContactState::Invalid);
        assert_eq!(c_uint::from(ContactState::Move), 2);
        assert_eq!(ContactState::Start.to_string(), "CONTACT_START");

        let contact = Contact {
            id: 4,
            state: ffi::CONTACT_MOVE,
            ..Default::default()
        };
        assert_eq!(contact.to_string(), "Contact ID: 4 State: CONTACT_MOVE");
    }

    #[test]
    fn test_frame_content() {
        let content = FrameContent::CONTACTS | FrameContent::PRESSURE;
        assert_eq!(content.bits(), 0x05);
        assert!(content.contains(FrameContent::CONTACTS));
        assert!(!content.contains(FrameContent::ACCEL));
        assert_eq!(content.to_string(), "pressure|contacts");
        assert_eq!(FrameContent::NONE.to_string(), "none");
    }

    #[test]
    fn test_scan_enums() {
        assert_eq!(ScanDetail::from(1_i32), ScanDetail::Medium);
        assert_eq!(ScanDetail::from(9_i32), ScanDetail::Unknown);
        assert_eq!(c_int::from(ScanDetail::Low), 2);
        assert_eq!(ScanMode::try_from(2_i32), Ok(ScanMode::Async));
        assert_eq!(ScanMode::try_from(5_i32), Err(5));
    }

    #[test]
    fn test_num_cells() {
        let info = SensorInfo {
            max_contacts: 16,
            num_rows: 105,
            num_cols: 185,
            width: 240.0,
            height: 139.0,
        };
        assert_eq!(info.num_cells(), 19425);
    }
}
