//! The register map of Sensel devices.
//!
//! Registers live in a flat byte-addressed space. Most have a fixed width, a few
//! (serial number, LED array, frame readout) are variable-sized and must be accessed
//! with the `*_vs` register calls.

use std::fmt;

/// Register map protocol version these offsets belong to.
pub const REG_MAP_PROTOCOL_VERSION: u8 = 1;
pub const REG_MAP_MAJOR_VERSION: u8 = 0;
pub const REG_MAP_MINOR_VERSION: u8 = 7;
pub const REG_MAP_BUILD_VERSION: u16 = 60;

/// Size in bytes of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWidth {
    Fixed(u8),
    Variable,
}

/// A named register at a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    name: &'static str,
    addr: u8,
    width: RegisterWidth,
}

impl Register {
    const fn fixed(name: &'static str, addr: u8, size: u8) -> Self {
        Self {
            name,
            addr,
            width: RegisterWidth::Fixed(size),
        }
    }

    const fn variable(name: &'static str, addr: u8) -> Self {
        Self {
            name,
            addr,
            width: RegisterWidth::Variable,
        }
    }

    pub const MAGIC: Register = Register::fixed("MAGIC", 0x00, 6);
    pub const FW_VERSION_PROTOCOL: Register = Register::fixed("FW_VERSION_PROTOCOL", 0x06, 1);
    pub const FW_VERSION_MAJOR: Register = Register::fixed("FW_VERSION_MAJOR", 0x07, 1);
    pub const FW_VERSION_MINOR: Register = Register::fixed("FW_VERSION_MINOR", 0x08, 1);
    pub const FW_VERSION_BUILD: Register = Register::fixed("FW_VERSION_BUILD", 0x09, 2);
    pub const FW_VERSION_RELEASE: Register = Register::fixed("FW_VERSION_RELEASE", 0x0B, 1);
    pub const DEVICE_ID: Register = Register::fixed("DEVICE_ID", 0x0C, 2);
    pub const DEVICE_REVISION: Register = Register::fixed("DEVICE_REVISION", 0x0E, 1);
    pub const DEVICE_SERIAL_NUMBER: Register = Register::variable("DEVICE_SERIAL_NUMBER", 0x0F);
    pub const SENSOR_NUM_COLS: Register = Register::fixed("SENSOR_NUM_COLS", 0x10, 2);
    pub const SENSOR_NUM_ROWS: Register = Register::fixed("SENSOR_NUM_ROWS", 0x12, 2);
    pub const SENSOR_ACTIVE_AREA_WIDTH_UM: Register =
        Register::fixed("SENSOR_ACTIVE_AREA_WIDTH_UM", 0x14, 4);
    pub const SENSOR_ACTIVE_AREA_HEIGHT_UM: Register =
        Register::fixed("SENSOR_ACTIVE_AREA_HEIGHT_UM", 0x18, 4);
    pub const SCAN_FRAME_RATE: Register = Register::fixed("SCAN_FRAME_RATE", 0x20, 2);
    pub const SCAN_BUFFER_CONTROL: Register = Register::fixed("SCAN_BUFFER_CONTROL", 0x22, 1);
    pub const SCAN_DETAIL_CONTROL: Register = Register::fixed("SCAN_DETAIL_CONTROL", 0x23, 1);
    pub const FRAME_CONTENT_CONTROL: Register = Register::fixed("FRAME_CONTENT_CONTROL", 0x24, 1);
    pub const SCAN_ENABLED: Register = Register::fixed("SCAN_ENABLED", 0x25, 1);
    pub const SCAN_READ_FRAME: Register = Register::variable("SCAN_READ_FRAME", 0x26);
    pub const FRAME_CONTENT_SUPPORTED: Register =
        Register::fixed("FRAME_CONTENT_SUPPORTED", 0x28, 1);
    pub const CONTACTS_MAX_COUNT: Register = Register::fixed("CONTACTS_MAX_COUNT", 0x40, 1);
    pub const CONTACTS_ENABLE_BLOB_MERGE: Register =
        Register::fixed("CONTACTS_ENABLE_BLOB_MERGE", 0x41, 1);
    pub const CONTACTS_MIN_FORCE: Register = Register::fixed("CONTACTS_MIN_FORCE", 0x47, 2);
    pub const CONTACTS_MASK: Register = Register::fixed("CONTACTS_MASK", 0x4B, 1);
    pub const BASELINE_ENABLED: Register = Register::fixed("BASELINE_ENABLED", 0x50, 1);
    pub const BASELINE_INCREASE_RATE: Register =
        Register::fixed("BASELINE_INCREASE_RATE", 0x51, 2);
    pub const BASELINE_DECREASE_RATE: Register =
        Register::fixed("BASELINE_DECREASE_RATE", 0x53, 2);
    pub const BASELINE_DYNAMIC_ENABLED: Register =
        Register::fixed("BASELINE_DYNAMIC_ENABLED", 0x57, 1);
    pub const ACCEL_X: Register = Register::fixed("ACCEL_X", 0x60, 2);
    pub const ACCEL_Y: Register = Register::fixed("ACCEL_Y", 0x62, 2);
    pub const ACCEL_Z: Register = Register::fixed("ACCEL_Z", 0x64, 2);
    pub const BATTERY_STATUS: Register = Register::fixed("BATTERY_STATUS", 0x70, 1);
    pub const BATTERY_PERCENTAGE: Register = Register::fixed("BATTERY_PERCENTAGE", 0x71, 1);
    pub const POWER_BUTTON_PRESSED: Register = Register::fixed("POWER_BUTTON_PRESSED", 0x72, 1);
    pub const LED_BRIGHTNESS: Register = Register::variable("LED_BRIGHTNESS", 0x80);
    pub const LED_BRIGHTNESS_SIZE: Register = Register::fixed("LED_BRIGHTNESS_SIZE", 0x81, 1);
    pub const LED_BRIGHTNESS_MAX: Register = Register::fixed("LED_BRIGHTNESS_MAX", 0x82, 2);
    pub const LED_COUNT: Register = Register::fixed("LED_COUNT", 0x84, 1);
    pub const UNIT_SHIFT_DIMS: Register = Register::fixed("UNIT_SHIFT_DIMS", 0xA0, 1);
    pub const UNIT_SHIFT_FORCE: Register = Register::fixed("UNIT_SHIFT_FORCE", 0xA1, 1);
    pub const UNIT_SHIFT_AREA: Register = Register::fixed("UNIT_SHIFT_AREA", 0xA2, 1);
    pub const UNIT_SHIFT_ANGLE: Register = Register::fixed("UNIT_SHIFT_ANGLE", 0xA3, 1);
    pub const UNIT_SHIFT_TIME: Register = Register::fixed("UNIT_SHIFT_TIME", 0xA4, 1);
    pub const DEVICE_OPEN: Register = Register::fixed("DEVICE_OPEN", 0xD0, 1);
    pub const SOFT_RESET: Register = Register::fixed("SOFT_RESET", 0xE0, 1);
    pub const ERROR_CODE: Register = Register::fixed("ERROR_CODE", 0xEC, 1);

    /// Every register, ordered by address.
    pub const ALL: [Register; 46] = [
        Self::MAGIC,
        Self::FW_VERSION_PROTOCOL,
        Self::FW_VERSION_MAJOR,
        Self::FW_VERSION_MINOR,
        Self::FW_VERSION_BUILD,
        Self::FW_VERSION_RELEASE,
        Self::DEVICE_ID,
        Self::DEVICE_REVISION,
        Self::DEVICE_SERIAL_NUMBER,
        Self::SENSOR_NUM_COLS,
        Self::SENSOR_NUM_ROWS,
        Self::SENSOR_ACTIVE_AREA_WIDTH_UM,
        Self::SENSOR_ACTIVE_AREA_HEIGHT_UM,
        Self::SCAN_FRAME_RATE,
        Self::SCAN_BUFFER_CONTROL,
        Self::SCAN_DETAIL_CONTROL,
        Self::FRAME_CONTENT_CONTROL,
        Self::SCAN_ENABLED,
        Self::SCAN_READ_FRAME,
        Self::FRAME_CONTENT_SUPPORTED,
        Self::CONTACTS_MAX_COUNT,
        Self::CONTACTS_ENABLE_BLOB_MERGE,
        Self::CONTACTS_MIN_FORCE,
        Self::CONTACTS_MASK,
        Self::BASELINE_ENABLED,
        Self::BASELINE_INCREASE_RATE,
        Self::BASELINE_DECREASE_RATE,
        Self::BASELINE_DYNAMIC_ENABLED,
        Self::ACCEL_X,
        Self::ACCEL_Y,
        Self::ACCEL_Z,
        Self::BATTERY_STATUS,
        Self::BATTERY_PERCENTAGE,
        Self::POWER_BUTTON_PRESSED,
        Self::LED_BRIGHTNESS,
        Self::LED_BRIGHTNESS_SIZE,
        Self::LED_BRIGHTNESS_MAX,
        Self::LED_COUNT,
        Self::UNIT_SHIFT_DIMS,
        Self::UNIT_SHIFT_FORCE,
        Self::UNIT_SHIFT_AREA,
        Self::UNIT_SHIFT_ANGLE,
        Self::UNIT_SHIFT_TIME,
        Self::DEVICE_OPEN,
        Self::SOFT_RESET,
        Self::ERROR_CODE,
    ];

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    pub fn width(&self) -> RegisterWidth {
        self.width
    }

    /// Number of bytes of a fixed-width register, `None` for variable-sized ones.
    pub fn size(&self) -> Option<u8> {
        match self.width {
            RegisterWidth::Fixed(size) => Some(size),
            RegisterWidth::Variable => None,
        }
    }

    /// Finds a register by its name. Case-insensitive, the `SENSEL_REG_` prefix is optional.
    pub fn by_name(name: &str) -> Option<Register> {
        let upper = name.to_ascii_uppercase();
        let name = upper.strip_prefix("SENSEL_REG_").unwrap_or(&upper);
        Self::ALL.iter().copied().find(|reg| reg.name == name)
    }

    /// Finds the register starting at `addr`.
    pub fn at(addr: u8) -> Option<Register> {
        Self::ALL.iter().copied().find(|reg| reg.addr == addr)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.width {
            RegisterWidth::Fixed(size) => write!(f, "{} (0x{:02X}, {}B)", self.name, self.addr, size),
            RegisterWidth::Variable => write!(f, "{} (0x{:02X}, VS)", self.name, self.addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_offsets() {
        assert_eq!(Register::SENSOR_NUM_COLS.addr(), 0x10);
        assert_eq!(Register::SENSOR_NUM_ROWS.addr(), 0x12);
        assert_eq!(Register::LED_BRIGHTNESS.addr(), 0x80);
        assert_eq!(Register::SCAN_ENABLED.addr(), 0x25);
        assert_eq!(Register::CONTACTS_MASK.addr(), 0x4B);
        assert_eq!(Register::ERROR_CODE.addr(), 0xEC);
        assert_eq!(Register::MAGIC.addr(), 0x00);
    }

    #[test]
    fn test_table_sorted_without_overlap() {
        for pair in Register::ALL.windows(2) {
            let (reg, next) = (pair[0], pair[1]);
            assert!(reg.addr() < next.addr(), "{} not before {}", reg, next);
            if let Some(size) = reg.size() {
                assert!(
                    u16::from(reg.addr()) + u16::from(size) <= u16::from(next.addr()),
                    "{} overlaps {}",
                    reg,
                    next
                );
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Register::by_name("led_count"), Some(Register::LED_COUNT));
        assert_eq!(
            Register::by_name("SENSEL_REG_SCAN_FRAME_RATE"),
            Some(Register::SCAN_FRAME_RATE)
        );
        assert_eq!(Register::by_name("NOT_A_REGISTER"), None);
        assert_eq!(Register::at(0x47), Some(Register::CONTACTS_MIN_FORCE));
        assert_eq!(Register::at(0x48), None);
    }

    #[test]
    fn test_widths() {
        assert_eq!(Register::SENSOR_ACTIVE_AREA_WIDTH_UM.size(), Some(4));
        assert_eq!(Register::LED_BRIGHTNESS.width(), RegisterWidth::Variable);
        assert_eq!(Register::DEVICE_SERIAL_NUMBER.size(), None);
    }
}
