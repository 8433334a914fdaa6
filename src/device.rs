//! Safe wrappers around an opened device and its frame buffer.
//!
//! A [`Device`] owns a native handle and closes it when dropped. A [`Frame`] owns the frame
//! buffer allocated for one device and borrows that device, so it is always freed before the
//! device can be closed.

use std::{
    ffi::{c_int, c_uint},
    fmt,
    mem,
    ptr::{self, NonNull},
    slice,
};

use crate::{
    backend::Backend,
    error::{check, SenselError},
    ffi::{
        SenselDeviceList, SenselFirmwareInfo, SenselFrameData, SenselSensorInfo,
        SENSEL_DEVICE_STRING_LEN, SENSEL_HANDLE,
    },
    register::{Register, RegisterWidth},
    types::{
        decode_device_list, AccelData, Contact, ContactMask, DeviceId, FirmwareInfo,
        FrameContent, ScanDetail, ScanMode, SensorInfo,
    },
};

/// Buffer size used when reading a variable-sized register without a known length.
const VS_READ_LEN: usize = 1024;

/// Enumerates the attached devices.
pub fn device_list<B: Backend + ?Sized>(lib: &B) -> Result<Vec<DeviceId>, SenselError> {
    let mut list = SenselDeviceList::default();
    check("senselGetDeviceList", unsafe { lib.get_device_list(&mut list) })?;
    let devices = decode_device_list(&list);
    log::debug!("Found {} device(s).", devices.len());
    Ok(devices)
}

/// Copies `s` into a NUL-terminated buffer of the length the library expects.
fn device_string(s: &str) -> [u8; SENSEL_DEVICE_STRING_LEN] {
    let mut buf = [0; SENSEL_DEVICE_STRING_LEN];
    let len = s.len().min(SENSEL_DEVICE_STRING_LEN - 1);
    buf[..len].copy_from_slice(&s.as_bytes()[..len]);
    buf
}

/// An opened device.
pub struct Device<'lib, B: Backend + ?Sized> {
    lib: &'lib B,
    handle: SENSEL_HANDLE,
}

impl<B: Backend + ?Sized> fmt::Debug for Device<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl<'lib, B: Backend + ?Sized> Device<'lib, B> {
    fn from_handle(
        lib: &'lib B,
        call: &'static str,
        status: c_int,
        handle: SENSEL_HANDLE,
    ) -> Result<Self, SenselError> {
        check(call, status)?;
        if handle.is_null() {
            return Err(SenselError::NullHandle { call });
        }
        log::info!("Opened device with {}.", call);
        Ok(Self { lib, handle })
    }

    /// Opens the first available device.
    pub fn open(lib: &'lib B) -> Result<Self, SenselError> {
        let mut handle = ptr::null_mut();
        let status = unsafe { lib.open(&mut handle) };
        Self::from_handle(lib, "senselOpen", status, handle)
    }

    /// Opens the device with the index reported by [`device_list`].
    pub fn open_by_id(lib: &'lib B, idx: u8) -> Result<Self, SenselError> {
        let mut handle = ptr::null_mut();
        let status = unsafe { lib.open_device_by_id(&mut handle, idx) };
        Self::from_handle(lib, "senselOpenDeviceByID", status, handle)
    }

    pub fn open_by_serial_num(lib: &'lib B, serial_num: &str) -> Result<Self, SenselError> {
        let mut handle = ptr::null_mut();
        let mut buf = device_string(serial_num);
        let status = unsafe { lib.open_device_by_serial_num(&mut handle, &mut buf) };
        Self::from_handle(lib, "senselOpenDeviceBySerialNum", status, handle)
    }

    pub fn open_by_com_port(lib: &'lib B, com_port: &str) -> Result<Self, SenselError> {
        let mut handle = ptr::null_mut();
        let mut buf = device_string(com_port);
        let status = unsafe { lib.open_device_by_com_port(&mut handle, &mut buf) };
        Self::from_handle(lib, "senselOpenDeviceByComPort", status, handle)
    }

    /// Closes the device, reporting the status of the close call.
    pub fn close(self) -> Result<(), SenselError> {
        let (lib, handle) = (self.lib, self.handle);
        mem::forget(self);
        log::info!("Closing device.");
        check("senselClose", unsafe { lib.close(handle) })
    }

    pub fn soft_reset(&self) -> Result<(), SenselError> {
        check("senselSoftReset", unsafe { self.lib.soft_reset(self.handle) })
    }

    pub fn sensor_info(&self) -> Result<SensorInfo, SenselError> {
        let mut info = SenselSensorInfo::default();
        check("senselGetSensorInfo", unsafe {
            self.lib.get_sensor_info(self.handle, &mut info)
        })?;
        Ok(SensorInfo::from(info))
    }

    pub fn firmware_info(&self) -> Result<FirmwareInfo, SenselError> {
        let mut info = SenselFirmwareInfo::default();
        check("senselGetFirmwareInfo", unsafe {
            self.lib.get_firmware_info(self.handle, &mut info)
        })?;
        Ok(info)
    }

    pub fn set_scan_detail(&self, detail: ScanDetail) -> Result<(), SenselError> {
        check("senselSetScanDetail", unsafe {
            self.lib.set_scan_detail(self.handle, c_int::from(detail))
        })
    }

    pub fn scan_detail(&self) -> Result<ScanDetail, SenselError> {
        let mut detail = 0;
        check("senselGetScanDetail", unsafe {
            self.lib.get_scan_detail(self.handle, &mut detail)
        })?;
        Ok(ScanDetail::from(detail))
    }

    pub fn supported_frame_content(&self) -> Result<FrameContent, SenselError> {
        let mut content = 0;
        check("senselGetSupportedFrameContent", unsafe {
            self.lib.get_supported_frame_content(self.handle, &mut content)
        })?;
        Ok(FrameContent::from_bits(content))
    }

    pub fn set_frame_content(&self, content: FrameContent) -> Result<(), SenselError> {
        check("senselSetFrameContent", unsafe {
            self.lib.set_frame_content(self.handle, content.bits())
        })
    }

    pub fn frame_content(&self) -> Result<FrameContent, SenselError> {
        let mut content = 0;
        check("senselGetFrameContent", unsafe {
            self.lib.get_frame_content(self.handle, &mut content)
        })?;
        Ok(FrameContent::from_bits(content))
    }

    pub fn set_contacts_mask(&self, mask: ContactMask) -> Result<(), SenselError> {
        check("senselSetContactsMask", unsafe {
            self.lib.set_contacts_mask(self.handle, mask.bits())
        })
    }

    pub fn contacts_mask(&self) -> Result<ContactMask, SenselError> {
        let mut mask = 0;
        check("senselGetContactsMask", unsafe {
            self.lib.get_contacts_mask(self.handle, &mut mask)
        })?;
        Ok(ContactMask::from_bits(mask))
    }

    /// Allocates the frame buffer for this device.
    ///
    /// The library sizes the buffer from the current sensor geometry.
    pub fn allocate_frame_data(&self) -> Result<Frame<'_, B>, SenselError> {
        log::trace!("Entering Device::allocate_frame_data.");
        let info = self.sensor_info()?;

        let mut data = ptr::null_mut();
        check("senselAllocateFrameData", unsafe {
            self.lib.allocate_frame_data(self.handle, &mut data)
        })?;
        let data = NonNull::new(data).ok_or(SenselError::NullHandle {
            call: "senselAllocateFrameData",
        })?;
        log::info!(
            "Allocated frame buffer for {} contacts and {} cells.",
            info.max_contacts,
            info.num_cells()
        );

        log::trace!("Leaving Device::allocate_frame_data.");
        Ok(Frame {
            lib: self.lib,
            handle: self.handle,
            data,
            info,
        })
    }

    pub fn start_scanning(&self) -> Result<(), SenselError> {
        check("senselStartScanning", unsafe {
            self.lib.start_scanning(self.handle)
        })
    }

    pub fn stop_scanning(&self) -> Result<(), SenselError> {
        check("senselStopScanning", unsafe {
            self.lib.stop_scanning(self.handle)
        })
    }

    /// Reads all pending data from the device into the library's frame queue.
    pub fn read_sensor(&self) -> Result<(), SenselError> {
        check("senselReadSensor", unsafe { self.lib.read_sensor(self.handle) })
    }

    /// Number of frames queued by the last [`Device::read_sensor`].
    pub fn num_available_frames(&self) -> Result<u32, SenselError> {
        let mut num_frames: c_uint = 0;
        check("senselGetNumAvailableFrames", unsafe {
            self.lib.get_num_available_frames(self.handle, &mut num_frames)
        })?;
        Ok(num_frames)
    }

    /// Pops the oldest queued frame into `frame`, overwriting its previous content.
    pub fn get_frame(&self, frame: &mut Frame<'_, B>) -> Result<(), SenselError> {
        if frame.handle != self.handle || !ptr::addr_eq(frame.lib, self.lib) {
            return Err(SenselError::ForeignFrame);
        }
        check("senselGetFrame", unsafe {
            self.lib.get_frame(self.handle, frame.data.as_ptr())
        })
    }

    pub fn num_available_leds(&self) -> Result<u8, SenselError> {
        let mut num = 0;
        check("senselGetNumAvailableLEDs", unsafe {
            self.lib.get_num_available_leds(self.handle, &mut num)
        })?;
        Ok(num)
    }

    pub fn max_led_brightness(&self) -> Result<u16, SenselError> {
        let mut max = 0;
        check("senselGetMaxLEDBrightness", unsafe {
            self.lib.get_max_led_brightness(self.handle, &mut max)
        })?;
        Ok(max)
    }

    pub fn set_led_brightness(&self, led_id: u8, brightness: u16) -> Result<(), SenselError> {
        check("senselSetLEDBrightness", unsafe {
            self.lib.set_led_brightness(self.handle, led_id, brightness)
        })
    }

    pub fn led_brightness(&self, led_id: u8) -> Result<u16, SenselError> {
        let mut brightness = 0;
        check("senselGetLEDBrightness", unsafe {
            self.lib
                .get_led_brightness(self.handle, led_id, &mut brightness)
        })?;
        Ok(brightness)
    }

    pub fn power_button_pressed(&self) -> Result<bool, SenselError> {
        let mut pressed = 0;
        check("senselGetPowerButtonPressed", unsafe {
            self.lib.get_power_button_pressed(self.handle, &mut pressed)
        })?;
        Ok(pressed != 0)
    }

    pub fn set_contacts_enable_blob_merge(&self, enable: bool) -> Result<(), SenselError> {
        check("senselSetContactsEnableBlobMerge", unsafe {
            self.lib
                .set_contacts_enable_blob_merge(self.handle, u8::from(enable))
        })
    }

    pub fn contacts_enable_blob_merge(&self) -> Result<bool, SenselError> {
        let mut val = 0;
        check("senselGetContactsEnableBlobMerge", unsafe {
            self.lib
                .get_contacts_enable_blob_merge(self.handle, &mut val)
        })?;
        Ok(val != 0)
    }

    pub fn set_contacts_min_force(&self, min_force: u16) -> Result<(), SenselError> {
        check("senselSetContactsMinForce", unsafe {
            self.lib.set_contacts_min_force(self.handle, min_force)
        })
    }

    pub fn contacts_min_force(&self) -> Result<u16, SenselError> {
        let mut val = 0;
        check("senselGetContactsMinForce", unsafe {
            self.lib.get_contacts_min_force(self.handle, &mut val)
        })?;
        Ok(val)
    }

    pub fn set_baseline_enabled(&self, enable: bool) -> Result<(), SenselError> {
        check("senselSetBaselineEnabled", unsafe {
            self.lib.set_baseline_enabled(self.handle, u8::from(enable))
        })
    }

    pub fn baseline_enabled(&self) -> Result<bool, SenselError> {
        let mut val = 0;
        check("senselGetBaselineEnabled", unsafe {
            self.lib.get_baseline_enabled(self.handle, &mut val)
        })?;
        Ok(val != 0)
    }

    pub fn set_dynamic_baseline_enabled(&self, enable: bool) -> Result<(), SenselError> {
        check("senselSetDynamicBaselineEnabled", unsafe {
            self.lib
                .set_dynamic_baseline_enabled(self.handle, u8::from(enable))
        })
    }

    pub fn dynamic_baseline_enabled(&self) -> Result<bool, SenselError> {
        let mut val = 0;
        check("senselGetDynamicBaselineEnabled", unsafe {
            self.lib.get_dynamic_baseline_enabled(self.handle, &mut val)
        })?;
        Ok(val != 0)
    }

    /// Sets how many frames the device buffers between reads.
    pub fn set_buffer_control(&self, num: u8) -> Result<(), SenselError> {
        check("senselSetBufferControl", unsafe {
            self.lib.set_buffer_control(self.handle, num)
        })
    }

    pub fn buffer_control(&self) -> Result<u8, SenselError> {
        let mut num = 0;
        check("senselGetBufferControl", unsafe {
            self.lib.get_buffer_control(self.handle, &mut num)
        })?;
        Ok(num)
    }

    pub fn set_scan_mode(&self, mode: ScanMode) -> Result<(), SenselError> {
        check("senselSetScanMode", unsafe {
            self.lib.set_scan_mode(self.handle, c_int::from(mode))
        })
    }

    /// Unknown modes reported by the library are passed through as the error value.
    pub fn scan_mode(&self) -> Result<Result<ScanMode, c_int>, SenselError> {
        let mut mode = 0;
        check("senselGetScanMode", unsafe {
            self.lib.get_scan_mode(self.handle, &mut mode)
        })?;
        Ok(ScanMode::try_from(mode))
    }

    pub fn set_max_frame_rate(&self, rate: u16) -> Result<(), SenselError> {
        check("senselSetMaxFrameRate", unsafe {
            self.lib.set_max_frame_rate(self.handle, rate)
        })
    }

    pub fn max_frame_rate(&self) -> Result<u16, SenselError> {
        let mut rate = 0;
        check("senselGetMaxFrameRate", unsafe {
            self.lib.get_max_frame_rate(self.handle, &mut rate)
        })?;
        Ok(rate)
    }

    /// Reads `buf.len()` bytes starting at register address `reg`.
    pub fn read_reg(&self, reg: u8, buf: &mut [u8]) -> Result<(), SenselError> {
        if buf.len() > usize::from(u8::MAX) {
            return Err(SenselError::RegisterSize {
                reg,
                size: buf.len(),
            });
        }
        check("senselReadReg", unsafe {
            self.lib.read_reg(self.handle, reg, buf)
        })
    }

    /// Writes `data` starting at register address `reg`.
    pub fn write_reg(&self, reg: u8, data: &[u8]) -> Result<(), SenselError> {
        if data.len() > usize::from(u8::MAX) {
            return Err(SenselError::RegisterSize {
                reg,
                size: data.len(),
            });
        }
        let mut buf = data.to_vec();
        check("senselWriteReg", unsafe {
            self.lib.write_reg(self.handle, reg, &mut buf)
        })
    }

    /// Reads a variable-sized register into `buf`, returning the number of bytes read.
    pub fn read_reg_vs(&self, reg: u8, buf: &mut [u8]) -> Result<usize, SenselError> {
        if c_uint::try_from(buf.len()).is_err() {
            return Err(SenselError::RegisterSize {
                reg,
                size: buf.len(),
            });
        }
        let mut read_size: c_uint = 0;
        check("senselReadRegVS", unsafe {
            self.lib.read_reg_vs(self.handle, reg, buf, &mut read_size)
        })?;
        // Clamped to the buffer length.
        Ok(usize::try_from(read_size).map_or(buf.len(), |n| n.min(buf.len())))
    }

    /// Writes `data` to a variable-sized register, returning the number of bytes written.
    pub fn write_reg_vs(&self, reg: u8, data: &[u8]) -> Result<usize, SenselError> {
        if c_uint::try_from(data.len()).is_err() {
            return Err(SenselError::RegisterSize {
                reg,
                size: data.len(),
            });
        }
        let mut buf = data.to_vec();
        let mut write_size: c_uint = 0;
        check("senselWriteRegVS", unsafe {
            self.lib
                .write_reg_vs(self.handle, reg, &mut buf, &mut write_size)
        })?;
        Ok(usize::try_from(write_size).map_or(data.len(), |n| n.min(data.len())))
    }

    /// Reads the whole content of a named register.
    pub fn read_register(&self, reg: Register) -> Result<Vec<u8>, SenselError> {
        match reg.width() {
            RegisterWidth::Fixed(size) => {
                let mut buf = vec![0; usize::from(size)];
                self.read_reg(reg.addr(), &mut buf)?;
                Ok(buf)
            }
            RegisterWidth::Variable => {
                let mut buf = vec![0; VS_READ_LEN];
                let len = self.read_reg_vs(reg.addr(), &mut buf)?;
                buf.truncate(len);
                Ok(buf)
            }
        }
    }
}

impl<B: Backend + ?Sized> Drop for Device<'_, B> {
    fn drop(&mut self) {
        log::info!("Closing device.");
        if let Err(e) = check("senselClose", unsafe { self.lib.close(self.handle) }) {
            log::error!("Failed to close device: {}", e);
        }
    }
}

/// The frame buffer of a device.
///
/// Every [`Device::get_frame`] overwrites the buffer in place, so anything borrowed from a
/// frame must be released before the next frame is read.
pub struct Frame<'d, B: Backend + ?Sized> {
    lib: &'d B,
    handle: SENSEL_HANDLE,
    data: NonNull<SenselFrameData>,
    /// Geometry at allocation time, which determines the array lengths.
    info: SensorInfo,
}

impl<B: Backend + ?Sized> fmt::Debug for Frame<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("content", &self.content())
            .field("lost_frame_count", &self.lost_frame_count())
            .field("n_contacts", &self.n_contacts())
            .finish_non_exhaustive()
    }
}

impl<B: Backend + ?Sized> Frame<'_, B> {
    fn raw(&self) -> &SenselFrameData {
        // SAFETY: the buffer stays allocated until `free` or drop, both of which consume us.
        unsafe { self.data.as_ref() }
    }

    /// Geometry the buffer was sized for.
    pub fn sensor_info(&self) -> &SensorInfo {
        &self.info
    }

    /// Which of the arrays hold data of the current frame.
    pub fn content(&self) -> FrameContent {
        FrameContent::from_bits(self.raw().content_bit_mask)
    }

    /// The library only writes the arrays named in the content mask; the others hold stale
    /// or uninitialized memory.
    fn has(&self, content: FrameContent) -> bool {
        self.content().contains(content)
    }

    pub fn lost_frame_count(&self) -> i32 {
        self.raw().lost_frame_count
    }

    pub fn n_contacts(&self) -> u8 {
        self.raw().n_contacts
    }

    /// Contacts of the current frame, never more than the sensor's `max_contacts`.
    ///
    /// Empty unless the frame content includes [`FrameContent::CONTACTS`].
    pub fn contacts(&self) -> &[Contact] {
        let raw = self.raw();
        if raw.contacts.is_null() || !self.has(FrameContent::CONTACTS) {
            return &[];
        }
        let len = raw.n_contacts.min(self.info.max_contacts);
        // SAFETY: the contacts array holds `max_contacts` entries.
        unsafe { slice::from_raw_parts(raw.contacts, usize::from(len)) }
    }

    /// Force of every sensor cell, row-major. `None` unless the frame carries pressure.
    pub fn force_array(&self) -> Option<&[f32]> {
        let raw = self.raw();
        if raw.force_array.is_null() || !self.has(FrameContent::PRESSURE) {
            return None;
        }
        // SAFETY: the force array holds one entry per cell.
        Some(unsafe { slice::from_raw_parts(raw.force_array, self.info.num_cells()) })
    }

    /// Contact label of every sensor cell, row-major. `None` unless the frame carries labels.
    pub fn labels_array(&self) -> Option<&[u8]> {
        let raw = self.raw();
        if raw.labels_array.is_null() || !self.has(FrameContent::LABELS) {
            return None;
        }
        // SAFETY: the labels array holds one entry per cell.
        Some(unsafe { slice::from_raw_parts(raw.labels_array, self.info.num_cells()) })
    }

    pub fn accel(&self) -> Option<&AccelData> {
        if !self.has(FrameContent::ACCEL) {
            return None;
        }
        // SAFETY: the pointer is either null or points at one sample.
        unsafe { self.raw().accel_data.as_ref() }
    }

    /// Sum of all cells of the force array, `0.0` if there is none.
    pub fn total_force(&self) -> f32 {
        self.force_array()
            .map_or(0.0, |forces| forces.iter().sum())
    }

    /// Frees the buffer, reporting the status of the free call.
    pub fn free(self) -> Result<(), SenselError> {
        let (lib, handle, data) = (self.lib, self.handle, self.data);
        mem::forget(self);
        check("senselFreeFrameData", unsafe {
            lib.free_frame_data(handle, data.as_ptr())
        })
    }
}

impl<B: Backend + ?Sized> Drop for Frame<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = check("senselFreeFrameData", unsafe {
            self.lib.free_frame_data(self.handle, self.data.as_ptr())
        }) {
            log::error!("Failed to free frame buffer: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_string_is_terminated() {
        let buf = device_string("SM01A123");
        assert_eq!(&buf[..8], b"SM01A123");
        assert!(buf[8..].iter().all(|&b| b == 0));

        let long = "X".repeat(100);
        let buf = device_string(&long);
        assert_eq!(buf[SENSEL_DEVICE_STRING_LEN - 1], 0);
        assert_eq!(buf[SENSEL_DEVICE_STRING_LEN - 2], b'X');
    }
}
