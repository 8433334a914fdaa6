//! A simulated Sensel library.
//!
//! [`SimulatedSensel`] implements [`Backend`] in plain Rust. Each [`SimulatedDevice`] has its
//! own register file and replays a script of frames, so programs and tests run without
//! hardware or the native library.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    ffi::{c_int, c_uint, c_void, CStr},
    ptr, slice, thread,
    time::Duration,
};

use crate::{
    backend::Backend,
    ffi::*,
    register::Register,
    types::{AccelData, Contact, FirmwareInfo, SensorInfo},
};

/// Label of a cell not belonging to any contact.
pub const NO_LABEL: u8 = u8::MAX;

const REG_FILE_LEN: usize = 256;
const MAGIC: &[u8; 6] = b"S3NS31";

/// Geometry of a Sensel Morph.
pub const MORPH_SENSOR_INFO: SensorInfo = SensorInfo {
    max_contacts: 16,
    num_rows: 105,
    num_cols: 185,
    width: 240.0,
    height: 139.0,
};

const DEFAULT_FIRMWARE: FirmwareInfo = FirmwareInfo {
    fw_protocol_version: 1,
    fw_version_major: 0,
    fw_version_minor: 19,
    fw_version_build: 251,
    fw_version_release: 0,
    device_id: 1,
    device_revision: 0,
};

/// One scripted frame. Arrays shorter than the sensor are padded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatedFrame {
    pub contacts: Vec<Contact>,
    pub forces: Vec<f32>,
    pub labels: Vec<u8>,
    pub accel: AccelData,
}

impl SimulatedFrame {
    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn with_forces(mut self, forces: Vec<f32>) -> Self {
        self.forces = forces;
        self
    }

    pub fn with_accel(mut self, accel: AccelData) -> Self {
        self.accel = accel;
        self
    }

    /// Adds a cone-shaped pressure blob of `force` grams centered at (`x`, `y`) millimeters
    /// and labels its cells with `label`.
    pub fn with_blob(mut self, info: &SensorInfo, x: f32, y: f32, force: f32, label: u8) -> Self {
        let num_cells = info.num_cells();
        self.forces.resize(num_cells, 0.0);
        self.labels.resize(num_cells, NO_LABEL);

        let col_pitch = info.width / f32::from(info.num_cols);
        let row_pitch = info.height / f32::from(info.num_rows);
        let radius = 3.0 * col_pitch.max(row_pitch);

        let mut weights = Vec::new();
        for row in 0..info.num_rows {
            for col in 0..info.num_cols {
                let cx = (f32::from(col) + 0.5) * col_pitch;
                let cy = (f32::from(row) + 0.5) * row_pitch;
                let w = 1.0 - (cx - x).hypot(cy - y) / radius;
                if w > 0.0 {
                    let idx = usize::from(row) * usize::from(info.num_cols) + usize::from(col);
                    weights.push((idx, w));
                }
            }
        }

        let total: f32 = weights.iter().map(|(_, w)| w).sum();
        for (idx, w) in weights {
            self.forces[idx] += force * w / total;
            self.labels[idx] = label;
        }
        self
    }
}

/// Description of a simulated device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    serial_num: String,
    com_port: String,
    info: SensorInfo,
    firmware: FirmwareInfo,
    num_leds: u8,
    max_led_brightness: u16,
    frames: Vec<SimulatedFrame>,
    repeat: bool,
    frame_period: Option<Duration>,
}

impl SimulatedDevice {
    /// A Morph without any scripted frames.
    pub fn new(serial_num: &str) -> Self {
        Self {
            serial_num: serial_num.to_string(),
            com_port: String::new(),
            info: MORPH_SENSOR_INFO,
            firmware: DEFAULT_FIRMWARE,
            num_leds: 24,
            max_led_brightness: 100,
            frames: Vec::new(),
            repeat: false,
            frame_period: None,
        }
    }

    pub fn com_port(mut self, com_port: &str) -> Self {
        self.com_port = com_port.to_string();
        self
    }

    pub fn sensor_info(mut self, info: SensorInfo) -> Self {
        self.info = info;
        self
    }

    pub fn leds(mut self, num_leds: u8, max_brightness: u16) -> Self {
        self.num_leds = num_leds;
        self.max_led_brightness = max_brightness;
        self
    }

    pub fn frames(mut self, frames: Vec<SimulatedFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Restart the script once it ran out.
    pub fn repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Block every [`Backend::read_sensor`] for `period`, like a device scanning at a fixed rate.
    pub fn frame_period(mut self, period: Duration) -> Self {
        self.frame_period = Some(period);
        self
    }

    /// A single finger touching down, sliding to the right and lifting off, in a loop.
    pub fn touch_demo() -> Self {
        const STEPS: u16 = 30;
        let info = MORPH_SENSOR_INFO;

        let mut frames = vec![SimulatedFrame::default(); 2];
        for step in 0..=STEPS + 1 {
            let state = match step {
                0 => CONTACT_START,
                s if s > STEPS => CONTACT_END,
                _ => CONTACT_MOVE,
            };
            let x = 60.0 + 4.0 * f32::from(step);
            let y = 70.0;
            let force = 400.0 + 20.0 * f32::from(step);
            let contact = Contact {
                id: 0,
                state,
                x_pos: x,
                y_pos: y,
                total_force: force,
                area: 50.0,
                delta_x: if step == 0 { 0.0 } else { 4.0 },
                ..Default::default()
            };
            frames.push(
                SimulatedFrame::default()
                    .with_contact(contact)
                    .with_blob(&info, x, y, force, 0),
            );
        }
        frames.extend(vec![SimulatedFrame::default(); 6]);

        Self::new("SM01SIM0001")
            .com_port("sim://0")
            .sensor_info(info)
            .frames(frames)
            .repeat(true)
            .frame_period(Duration::from_millis(8))
    }

    pub fn serial_num(&self) -> &str {
        &self.serial_num
    }

    fn led_reg_size(&self) -> u8 {
        if self.max_led_brightness > u16::from(u8::MAX) {
            2
        } else {
            1
        }
    }
}

/// Run-time state of one device.
struct DeviceState {
    regs: [u8; REG_FILE_LEN],
    leds: Vec<u16>,
    open: bool,
    scanning: bool,
    scan_mode: c_int,
    next_frame: usize,
    available: VecDeque<SimulatedFrame>,
}

impl DeviceState {
    /// Power-on state of `device`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn new(device: &SimulatedDevice) -> Self {
        let mut state = Self {
            regs: [0; REG_FILE_LEN],
            leds: vec![0; usize::from(device.num_leds)],
            open: false,
            scanning: false,
            scan_mode: SCAN_MODE_SYNC,
            next_frame: 0,
            available: VecDeque::new(),
        };

        let magic = usize::from(Register::MAGIC.addr());
        state.regs[magic..magic + MAGIC.len()].copy_from_slice(MAGIC);

        let fw = &device.firmware;
        state.set_u8(Register::FW_VERSION_PROTOCOL, fw.fw_protocol_version);
        state.set_u8(Register::FW_VERSION_MAJOR, fw.fw_version_major);
        state.set_u8(Register::FW_VERSION_MINOR, fw.fw_version_minor);
        state.set_u16(Register::FW_VERSION_BUILD, fw.fw_version_build);
        state.set_u8(Register::FW_VERSION_RELEASE, fw.fw_version_release);
        state.set_u16(Register::DEVICE_ID, fw.device_id);
        state.set_u8(Register::DEVICE_REVISION, fw.device_revision);

        let info = &device.info;
        state.set_u16(Register::SENSOR_NUM_COLS, info.num_cols);
        state.set_u16(Register::SENSOR_NUM_ROWS, info.num_rows);
        state.set_u32(
            Register::SENSOR_ACTIVE_AREA_WIDTH_UM,
            (info.width * 1000.0).round() as u32,
        );
        state.set_u32(
            Register::SENSOR_ACTIVE_AREA_HEIGHT_UM,
            (info.height * 1000.0).round() as u32,
        );

        state.set_u16(Register::SCAN_FRAME_RATE, 125);
        state.set_u8(Register::FRAME_CONTENT_SUPPORTED, 0x0F);
        state.set_u8(Register::CONTACTS_MAX_COUNT, info.max_contacts);
        state.set_u8(Register::CONTACTS_ENABLE_BLOB_MERGE, 1);
        state.set_u8(Register::BASELINE_ENABLED, 1);
        state.set_u8(Register::BASELINE_DYNAMIC_ENABLED, 1);
        state.set_u8(Register::BATTERY_PERCENTAGE, 100);
        state.set_u8(Register::LED_BRIGHTNESS_SIZE, device.led_reg_size());
        state.set_u16(Register::LED_BRIGHTNESS_MAX, device.max_led_brightness);
        state.set_u8(Register::LED_COUNT, device.num_leds);
        state
    }

    fn offset(reg: Register) -> usize {
        usize::from(reg.addr())
    }

    fn read_u8(&self, reg: Register) -> u8 {
        self.regs[Self::offset(reg)]
    }

    fn set_u8(&mut self, reg: Register, val: u8) {
        self.regs[Self::offset(reg)] = val;
    }

    fn read_u16(&self, reg: Register) -> u16 {
        let at = Self::offset(reg);
        u16::from_le_bytes([self.regs[at], self.regs[at + 1]])
    }

    fn set_u16(&mut self, reg: Register, val: u16) {
        let at = Self::offset(reg);
        self.regs[at..at + 2].copy_from_slice(&val.to_le_bytes());
    }

    fn set_u32(&mut self, reg: Register, val: u32) {
        let at = Self::offset(reg);
        self.regs[at..at + 4].copy_from_slice(&val.to_le_bytes());
    }

    /// Restores the power-on state while staying open.
    fn reset(&mut self, device: &SimulatedDevice) {
        log::debug!("Soft reset of simulated device {}.", device.serial_num);
        let open = self.open;
        *self = Self::new(device);
        self.open = open;
        self.set_u8(Register::DEVICE_OPEN, u8::from(open));
    }
}

/// Bookkeeping of one allocated frame buffer.
struct Allocation {
    owner: usize,
    max_contacts: usize,
    num_cells: usize,
}

fn alloc_slice<T: Clone>(len: usize, value: T) -> *mut T {
    Box::into_raw(vec![value; len].into_boxed_slice()).cast::<T>()
}

/// # Safety
///
/// `data` must come from [`alloc_slice`] with the same `len`.
unsafe fn free_slice<T>(data: *mut T, len: usize) {
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)));
}

fn handle_of(idx: usize) -> SENSEL_HANDLE {
    (idx + 1) as *mut c_void
}

/// The simulated library.
pub struct SimulatedSensel {
    devices: Vec<SimulatedDevice>,
    state: RefCell<Vec<DeviceState>>,
    allocations: RefCell<HashMap<usize, Allocation>>,
}

impl SimulatedSensel {
    pub fn new(devices: Vec<SimulatedDevice>) -> Self {
        let state = devices.iter().map(DeviceState::new).collect();
        Self {
            devices,
            state: RefCell::new(state),
            allocations: RefCell::new(HashMap::new()),
        }
    }

    pub fn devices(&self) -> &[SimulatedDevice] {
        &self.devices
    }

    /// Number of frame buffers that were allocated and not freed yet.
    pub fn live_frame_buffers(&self) -> usize {
        self.allocations.borrow().len()
    }

    fn index_of(&self, handle: SENSEL_HANDLE) -> Option<usize> {
        let idx = (handle as usize).checked_sub(1)?;
        (idx < self.devices.len()).then_some(idx)
    }

    /// Runs `f` on the state of the open device behind `handle`.
    fn with_open<F>(&self, handle: SENSEL_HANDLE, f: F) -> SenselStatus
    where
        F: FnOnce(&SimulatedDevice, &mut DeviceState) -> SenselStatus,
    {
        let Some(idx) = self.index_of(handle) else {
            return SENSEL_ERROR;
        };
        let mut state = self.state.borrow_mut();
        let state = &mut state[idx];
        if !state.open {
            return SENSEL_ERROR;
        }
        f(&self.devices[idx], state)
    }

    fn get_reg_u8(&self, handle: SENSEL_HANDLE, reg: Register, out: &mut u8) -> SenselStatus {
        self.with_open(handle, |_, state| {
            *out = state.read_u8(reg);
            SENSEL_OK
        })
    }

    fn set_reg_u8(&self, handle: SENSEL_HANDLE, reg: Register, val: u8) -> SenselStatus {
        self.with_open(handle, |_, state| {
            state.set_u8(reg, val);
            SENSEL_OK
        })
    }

    fn get_reg_u16(&self, handle: SENSEL_HANDLE, reg: Register, out: &mut u16) -> SenselStatus {
        self.with_open(handle, |_, state| {
            *out = state.read_u16(reg);
            SENSEL_OK
        })
    }

    fn set_reg_u16(&self, handle: SENSEL_HANDLE, reg: Register, val: u16) -> SenselStatus {
        self.with_open(handle, |_, state| {
            state.set_u16(reg, val);
            SENSEL_OK
        })
    }

    fn open_idx(&self, idx: usize, handle: &mut SENSEL_HANDLE) -> SenselStatus {
        let mut states = self.state.borrow_mut();
        let Some(state) = states.get_mut(idx) else {
            return SENSEL_ERROR;
        };
        if state.open {
            log::warn!("Simulated device {} is already open.", idx);
            return SENSEL_ERROR;
        }
        state.open = true;
        state.set_u8(Register::DEVICE_OPEN, 1);
        *handle = handle_of(idx);
        SENSEL_OK
    }

    fn open_matching<F>(&self, handle: &mut SENSEL_HANDLE, pred: F) -> SenselStatus
    where
        F: Fn(&SimulatedDevice) -> bool,
    {
        match self.devices.iter().position(pred) {
            Some(idx) => self.open_idx(idx, handle),
            None => SENSEL_ERROR,
        }
    }
}

impl Drop for SimulatedSensel {
    fn drop(&mut self) {
        let allocations = std::mem::take(self.allocations.get_mut());
        if !allocations.is_empty() {
            log::warn!("{} frame buffer(s) were never freed.", allocations.len());
        }
        for (addr, alloc) in allocations {
            // SAFETY: every tracked address is a live buffer from `allocate_frame_data`.
            unsafe { free_frame(addr as *mut SenselFrameData, &alloc) };
        }
    }
}

/// Reads the NUL-terminated string the caller passed in.
fn c_str_arg(buf: &[u8]) -> Option<&str> {
    CStr::from_bytes_until_nul(buf).ok()?.to_str().ok()
}

/// # Safety
///
/// `data` must be a buffer described by `alloc` that is not freed yet.
unsafe fn free_frame(data: *mut SenselFrameData, alloc: &Allocation) {
    let frame = Box::from_raw(data);
    free_slice(frame.contacts, alloc.max_contacts);
    free_slice(frame.force_array, alloc.num_cells);
    free_slice(frame.labels_array, alloc.num_cells);
    drop(Box::from_raw(frame.accel_data));
}

/// # Safety
///
/// `data` must be a buffer described by `alloc` that is not freed yet.
unsafe fn write_frame(
    data: *mut SenselFrameData,
    alloc: &Allocation,
    frame: &SimulatedFrame,
    content: u8,
    contacts_mask: u8,
) {
    let data = &mut *data;
    data.content_bit_mask = content;
    data.lost_frame_count = 0;
    data.n_contacts = 0;

    if content & FRAME_CONTENT_CONTACTS_MASK != 0 {
        let contacts = slice::from_raw_parts_mut(data.contacts, alloc.max_contacts);
        let mut n = 0;
        for (dst, src) in contacts.iter_mut().zip(&frame.contacts) {
            *dst = *src;
            dst.content_bit_mask = contacts_mask;
            n += 1;
        }
        data.n_contacts = n;
    }
    if content & FRAME_CONTENT_PRESSURE_MASK != 0 {
        let forces = slice::from_raw_parts_mut(data.force_array, alloc.num_cells);
        forces.fill(0.0);
        for (dst, src) in forces.iter_mut().zip(&frame.forces) {
            *dst = *src;
        }
    }
    if content & FRAME_CONTENT_LABELS_MASK != 0 {
        let labels = slice::from_raw_parts_mut(data.labels_array, alloc.num_cells);
        labels.fill(NO_LABEL);
        for (dst, src) in labels.iter_mut().zip(&frame.labels) {
            *dst = *src;
        }
    }
    if content & FRAME_CONTENT_ACCEL_MASK != 0 {
        *data.accel_data = frame.accel;
    }
}

impl Backend for SimulatedSensel {
    unsafe fn open(&self, handle: &mut SENSEL_HANDLE) -> SenselStatus {
        let free = self.state.borrow().iter().position(|state| !state.open);
        match free {
            Some(idx) => self.open_idx(idx, handle),
            None => SENSEL_ERROR,
        }
    }

    unsafe fn get_device_list(&self, list: &mut SenselDeviceList) -> SenselStatus {
        *list = SenselDeviceList::default();
        for (idx, (device, id)) in self.devices.iter().zip(list.devices.iter_mut()).enumerate() {
            let Ok(idx) = u8::try_from(idx) else {
                break;
            };
            id.idx = idx;
            let serial = device.serial_num.as_bytes();
            let len = serial.len().min(SENSEL_DEVICE_STRING_LEN - 1);
            id.serial_num[..len].copy_from_slice(&serial[..len]);
            let port = device.com_port.as_bytes();
            let len = port.len().min(SENSEL_DEVICE_STRING_LEN - 1);
            id.com_port[..len].copy_from_slice(&port[..len]);
            list.num_devices += 1;
        }
        SENSEL_OK
    }

    unsafe fn open_device_by_id(&self, handle: &mut SENSEL_HANDLE, idx: u8) -> SenselStatus {
        self.open_idx(usize::from(idx), handle)
    }

    unsafe fn open_device_by_serial_num(
        &self,
        handle: &mut SENSEL_HANDLE,
        serial_num: &mut [u8],
    ) -> SenselStatus {
        let Some(serial_num) = c_str_arg(serial_num) else {
            return SENSEL_ERROR;
        };
        self.open_matching(handle, |device| device.serial_num == serial_num)
    }

    unsafe fn open_device_by_com_port(
        &self,
        handle: &mut SENSEL_HANDLE,
        com_port: &mut [u8],
    ) -> SenselStatus {
        let Some(com_port) = c_str_arg(com_port) else {
            return SENSEL_ERROR;
        };
        self.open_matching(handle, |device| device.com_port == com_port)
    }

    unsafe fn close(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        self.with_open(handle, |device, state| {
            state.open = false;
            state.reset(device);
            SENSEL_OK
        })
    }

    unsafe fn soft_reset(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        self.with_open(handle, |device, state| {
            state.reset(device);
            SENSEL_OK
        })
    }

    unsafe fn get_sensor_info(
        &self,
        handle: SENSEL_HANDLE,
        info: &mut SenselSensorInfo,
    ) -> SenselStatus {
        self.with_open(handle, |device, _| {
            *info = device.info.into();
            SENSEL_OK
        })
    }

    unsafe fn get_firmware_info(
        &self,
        handle: SENSEL_HANDLE,
        info: &mut SenselFirmwareInfo,
    ) -> SenselStatus {
        self.with_open(handle, |_, state| {
            *info = SenselFirmwareInfo {
                fw_protocol_version: state.read_u8(Register::FW_VERSION_PROTOCOL),
                fw_version_major: state.read_u8(Register::FW_VERSION_MAJOR),
                fw_version_minor: state.read_u8(Register::FW_VERSION_MINOR),
                fw_version_build: state.read_u16(Register::FW_VERSION_BUILD),
                fw_version_release: state.read_u8(Register::FW_VERSION_RELEASE),
                device_id: state.read_u16(Register::DEVICE_ID),
                device_revision: state.read_u8(Register::DEVICE_REVISION),
            };
            SENSEL_OK
        })
    }

    unsafe fn allocate_frame_data(
        &self,
        handle: SENSEL_HANDLE,
        data: &mut *mut SenselFrameData,
    ) -> SenselStatus {
        let Some(owner) = self.index_of(handle) else {
            return SENSEL_ERROR;
        };
        self.with_open(handle, |device, _| {
            let alloc = Allocation {
                owner,
                max_contacts: usize::from(device.info.max_contacts),
                num_cells: device.info.num_cells(),
            };
            let frame = Box::into_raw(Box::new(SenselFrameData {
                content_bit_mask: 0,
                lost_frame_count: 0,
                n_contacts: 0,
                contacts: alloc_slice(alloc.max_contacts, Contact::default()),
                force_array: alloc_slice(alloc.num_cells, 0.0),
                labels_array: alloc_slice(alloc.num_cells, NO_LABEL),
                accel_data: Box::into_raw(Box::<AccelData>::default()),
            }));
            self.allocations.borrow_mut().insert(frame as usize, alloc);
            *data = frame;
            SENSEL_OK
        })
    }

    unsafe fn free_frame_data(
        &self,
        handle: SENSEL_HANDLE,
        data: *mut SenselFrameData,
    ) -> SenselStatus {
        let Some(owner) = self.index_of(handle) else {
            return SENSEL_ERROR;
        };
        let mut allocations = self.allocations.borrow_mut();
        match allocations.get(&(data as usize)) {
            Some(alloc) if alloc.owner == owner => {}
            _ => {
                log::warn!("Attempt to free unknown frame buffer {:p}.", data);
                return SENSEL_ERROR;
            }
        }
        if let Some(alloc) = allocations.remove(&(data as usize)) {
            free_frame(data, &alloc);
        }
        SENSEL_OK
    }

    unsafe fn set_scan_detail(&self, handle: SENSEL_HANDLE, detail: c_int) -> SenselStatus {
        match u8::try_from(detail) {
            Ok(val) if detail <= SCAN_DETAIL_LOW => {
                self.set_reg_u8(handle, Register::SCAN_DETAIL_CONTROL, val)
            }
            _ => SENSEL_ERROR,
        }
    }

    unsafe fn get_scan_detail(&self, handle: SENSEL_HANDLE, detail: &mut c_int) -> SenselStatus {
        let mut val = 0;
        let status = self.get_reg_u8(handle, Register::SCAN_DETAIL_CONTROL, &mut val);
        *detail = c_int::from(val);
        status
    }

    unsafe fn get_supported_frame_content(
        &self,
        handle: SENSEL_HANDLE,
        content: &mut u8,
    ) -> SenselStatus {
        self.get_reg_u8(handle, Register::FRAME_CONTENT_SUPPORTED, content)
    }

    unsafe fn set_frame_content(&self, handle: SENSEL_HANDLE, content: u8) -> SenselStatus {
        self.with_open(handle, |_, state| {
            let supported = state.read_u8(Register::FRAME_CONTENT_SUPPORTED);
            state.set_u8(Register::FRAME_CONTENT_CONTROL, content & supported);
            SENSEL_OK
        })
    }

    unsafe fn get_frame_content(&self, handle: SENSEL_HANDLE, content: &mut u8) -> SenselStatus {
        self.get_reg_u8(handle, Register::FRAME_CONTENT_CONTROL, content)
    }

    unsafe fn set_contacts_mask(&self, handle: SENSEL_HANDLE, mask: u8) -> SenselStatus {
        self.set_reg_u8(handle, Register::CONTACTS_MASK, mask)
    }

    unsafe fn get_contacts_mask(&self, handle: SENSEL_HANDLE, mask: &mut u8) -> SenselStatus {
        self.get_reg_u8(handle, Register::CONTACTS_MASK, mask)
    }

    unsafe fn start_scanning(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        self.with_open(handle, |_, state| {
            if state.scanning {
                return SENSEL_OK;
            }
            let Ok(mode) = u8::try_from(state.scan_mode) else {
                return SENSEL_ERROR;
            };
            state.available.clear();
            state.scanning = true;
            state.set_u8(Register::SCAN_ENABLED, mode);
            SENSEL_OK
        })
    }

    unsafe fn stop_scanning(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        self.with_open(handle, |_, state| {
            state.scanning = false;
            state.set_u8(Register::SCAN_ENABLED, 0);
            SENSEL_OK
        })
    }

    /// Queues the next scripted frames, as many as the buffer control allows but at least one.
    /// Fails if the device is not scanning.
    unsafe fn read_sensor(&self, handle: SENSEL_HANDLE) -> SenselStatus {
        let mut period = None;
        let status = self.with_open(handle, |device, state| {
            if !state.scanning {
                return SENSEL_ERROR;
            }
            let batch = state.read_u8(Register::SCAN_BUFFER_CONTROL).max(1);
            for _ in 0..batch {
                if state.next_frame >= device.frames.len() {
                    if device.repeat && !device.frames.is_empty() {
                        state.next_frame = 0;
                    } else {
                        break;
                    }
                }
                state
                    .available
                    .push_back(device.frames[state.next_frame].clone());
                state.next_frame += 1;
            }
            period = device.frame_period;
            SENSEL_OK
        });
        if let Some(period) = period {
            thread::sleep(period);
        }
        status
    }

    unsafe fn get_num_available_frames(
        &self,
        handle: SENSEL_HANDLE,
        num_frames: &mut c_uint,
    ) -> SenselStatus {
        self.with_open(handle, |_, state| match c_uint::try_from(state.available.len()) {
            Ok(n) => {
                *num_frames = n;
                SENSEL_OK
            }
            Err(_) => SENSEL_ERROR,
        })
    }

    unsafe fn get_frame(&self, handle: SENSEL_HANDLE, data: *mut SenselFrameData) -> SenselStatus {
        let Some(owner) = self.index_of(handle) else {
            return SENSEL_ERROR;
        };
        let allocations = self.allocations.borrow();
        let Some(alloc) = allocations.get(&(data as usize)).filter(|a| a.owner == owner) else {
            return SENSEL_ERROR;
        };
        self.with_open(handle, |_, state| {
            let Some(frame) = state.available.pop_front() else {
                return SENSEL_ERROR;
            };
            let content = state.read_u8(Register::FRAME_CONTENT_CONTROL);
            let contacts_mask = state.read_u8(Register::CONTACTS_MASK);
            // SAFETY: `data` is tracked in `allocations`, so it is live and sized by `alloc`.
            unsafe { write_frame(data, alloc, &frame, content, contacts_mask) };
            SENSEL_OK
        })
    }

    unsafe fn get_num_available_leds(&self, handle: SENSEL_HANDLE, num: &mut u8) -> SenselStatus {
        self.get_reg_u8(handle, Register::LED_COUNT, num)
    }

    unsafe fn get_max_led_brightness(&self, handle: SENSEL_HANDLE, max: &mut u16) -> SenselStatus {
        self.get_reg_u16(handle, Register::LED_BRIGHTNESS_MAX, max)
    }

    unsafe fn set_led_brightness(
        &self,
        handle: SENSEL_HANDLE,
        led_id: u8,
        brightness: u16,
    ) -> SenselStatus {
        self.with_open(handle, |_, state| {
            if brightness > state.read_u16(Register::LED_BRIGHTNESS_MAX) {
                return SENSEL_ERROR;
            }
            match state.leds.get_mut(usize::from(led_id)) {
                Some(led) => {
                    *led = brightness;
                    SENSEL_OK
                }
                None => SENSEL_ERROR,
            }
        })
    }

    unsafe fn get_led_brightness(
        &self,
        handle: SENSEL_HANDLE,
        led_id: u8,
        brightness: &mut u16,
    ) -> SenselStatus {
        self.with_open(handle, |_, state| match state.leds.get(usize::from(led_id)) {
            Some(led) => {
                *brightness = *led;
                SENSEL_OK
            }
            None => SENSEL_ERROR,
        })
    }

    unsafe fn get_power_button_pressed(
        &self,
        handle: SENSEL_HANDLE,
        pressed: &mut u8,
    ) -> SenselStatus {
        self.get_reg_u8(handle, Register::POWER_BUTTON_PRESSED, pressed)
    }

    unsafe fn set_contacts_enable_blob_merge(&self, handle: SENSEL_HANDLE, val: u8) -> SenselStatus {
        self.set_reg_u8(handle, Register::CONTACTS_ENABLE_BLOB_MERGE, val)
    }

    unsafe fn get_contacts_enable_blob_merge(
        &self,
        handle: SENSEL_HANDLE,
        val: &mut u8,
    ) -> SenselStatus {
        self.get_reg_u8(handle, Register::CONTACTS_ENABLE_BLOB_MERGE, val)
    }

    unsafe fn set_contacts_min_force(&self, handle: SENSEL_HANDLE, val: u16) -> SenselStatus {
        self.set_reg_u16(handle, Register::CONTACTS_MIN_FORCE, val)
    }

    unsafe fn get_contacts_min_force(&self, handle: SENSEL_HANDLE, val: &mut u16) -> SenselStatus {
        self.get_reg_u16(handle, Register::CONTACTS_MIN_FORCE, val)
    }

    unsafe fn set_baseline_enabled(&self, handle: SENSEL_HANDLE, val: u8) -> SenselStatus {
        self.set_reg_u8(handle, Register::BASELINE_ENABLED, val)
    }

    unsafe fn get_baseline_enabled(&self, handle: SENSEL_HANDLE, val: &mut u8) -> SenselStatus {
        self.get_reg_u8(handle, Register::BASELINE_ENABLED, val)
    }

    unsafe fn set_dynamic_baseline_enabled(&self, handle: SENSEL_HANDLE, val: u8) -> SenselStatus {
        self.set_reg_u8(handle, Register::BASELINE_DYNAMIC_ENABLED, val)
    }

    unsafe fn get_dynamic_baseline_enabled(
        &self,
        handle: SENSEL_HANDLE,
        val: &mut u8,
    ) -> SenselStatus {
        self.get_reg_u8(handle, Register::BASELINE_DYNAMIC_ENABLED, val)
    }

    unsafe fn set_buffer_control(&self, handle: SENSEL_HANDLE, num: u8) -> SenselStatus {
        self.set_reg_u8(handle, Register::SCAN_BUFFER_CONTROL, num)
    }

    unsafe fn get_buffer_control(&self, handle: SENSEL_HANDLE, num: &mut u8) -> SenselStatus {
        self.get_reg_u8(handle, Register::SCAN_BUFFER_CONTROL, num)
    }

    unsafe fn set_scan_mode(&self, handle: SENSEL_HANDLE, mode: c_int) -> SenselStatus {
        if mode != SCAN_MODE_SYNC && mode != SCAN_MODE_ASYNC {
            return SENSEL_ERROR;
        }
        self.with_open(handle, |_, state| {
            if state.scanning {
                let Ok(val) = u8::try_from(mode) else {
                    return SENSEL_ERROR;
                };
                state.set_u8(Register::SCAN_ENABLED, val);
            }
            state.scan_mode = mode;
            SENSEL_OK
        })
    }

    unsafe fn get_scan_mode(&self, handle: SENSEL_HANDLE, mode: &mut c_int) -> SenselStatus {
        self.with_open(handle, |_, state| {
            *mode = state.scan_mode;
            SENSEL_OK
        })
    }

    unsafe fn set_max_frame_rate(&self, handle: SENSEL_HANDLE, val: u16) -> SenselStatus {
        self.set_reg_u16(handle, Register::SCAN_FRAME_RATE, val)
    }

    unsafe fn get_max_frame_rate(&self, handle: SENSEL_HANDLE, val: &mut u16) -> SenselStatus {
        self.get_reg_u16(handle, Register::SCAN_FRAME_RATE, val)
    }

    unsafe fn read_reg(&self, handle: SENSEL_HANDLE, reg: u8, buf: &mut [u8]) -> SenselStatus {
        let start = usize::from(reg);
        let end = start + buf.len();
        if buf.len() > usize::from(u8::MAX) || end > REG_FILE_LEN {
            return SENSEL_ERROR;
        }
        self.with_open(handle, |_, state| {
            buf.copy_from_slice(&state.regs[start..end]);
            SENSEL_OK
        })
    }

    /// Identity and geometry registers are read-only. Writing a non-zero value to the soft
    /// reset register resets the device.
    unsafe fn write_reg(&self, handle: SENSEL_HANDLE, reg: u8, buf: &mut [u8]) -> SenselStatus {
        let start = usize::from(reg);
        let end = start + buf.len();
        if buf.len() > usize::from(u8::MAX)
            || end > REG_FILE_LEN
            || reg < Register::SCAN_FRAME_RATE.addr()
        {
            return SENSEL_ERROR;
        }
        self.with_open(handle, |device, state| {
            state.regs[start..end].copy_from_slice(buf);
            let soft_reset = usize::from(Register::SOFT_RESET.addr());
            if (start..end).contains(&soft_reset) && state.regs[soft_reset] != 0 {
                state.reset(device);
            }
            SENSEL_OK
        })
    }

    unsafe fn read_reg_vs(
        &self,
        handle: SENSEL_HANDLE,
        reg: u8,
        buf: &mut [u8],
        read_size: &mut c_uint,
    ) -> SenselStatus {
        self.with_open(handle, |device, state| {
            let bytes = if reg == Register::DEVICE_SERIAL_NUMBER.addr() {
                device.serial_num.as_bytes().to_vec()
            } else if reg == Register::LED_BRIGHTNESS.addr() {
                let wide = device.led_reg_size() == 2;
                state
                    .leds
                    .iter()
                    .flat_map(|led| {
                        let [lo, hi] = led.to_le_bytes();
                        if wide {
                            vec![lo, hi]
                        } else {
                            vec![lo]
                        }
                    })
                    .collect()
            } else if reg == Register::SCAN_READ_FRAME.addr() {
                Vec::new()
            } else {
                return SENSEL_ERROR;
            };

            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            match c_uint::try_from(n) {
                Ok(n) => {
                    *read_size = n;
                    SENSEL_OK
                }
                Err(_) => SENSEL_ERROR,
            }
        })
    }

    /// Only the LED brightness array is writable.
    unsafe fn write_reg_vs(
        &self,
        handle: SENSEL_HANDLE,
        reg: u8,
        buf: &mut [u8],
        write_size: &mut c_uint,
    ) -> SenselStatus {
        if reg != Register::LED_BRIGHTNESS.addr() {
            return SENSEL_ERROR;
        }
        self.with_open(handle, |device, state| {
            let size = usize::from(device.led_reg_size());
            let max = state.read_u16(Register::LED_BRIGHTNESS_MAX);
            let mut written = 0;
            for (led, chunk) in state.leds.iter_mut().zip(buf.chunks_exact(size)) {
                let brightness = match chunk {
                    [lo, hi] => u16::from_le_bytes([*lo, *hi]),
                    [lo] => u16::from(*lo),
                    _ => return SENSEL_ERROR,
                };
                *led = brightness.min(max);
                written += size;
            }
            match c_uint::try_from(written) {
                Ok(n) => {
                    *write_size = n;
                    SENSEL_OK
                }
                Err(_) => SENSEL_ERROR,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> SimulatedSensel {
        SimulatedSensel::new(vec![
            SimulatedDevice::new("SM01A001").com_port("/dev/ttyACM0"),
            SimulatedDevice::new("SM01A002").com_port("/dev/ttyACM1"),
        ])
    }

    fn open(sim: &SimulatedSensel, idx: u8) -> SENSEL_HANDLE {
        let mut handle = ptr::null_mut();
        assert_eq!(unsafe { sim.open_device_by_id(&mut handle, idx) }, SENSEL_OK);
        handle
    }

    #[test]
    fn test_handles_map_to_devices() {
        let sim = sim();
        assert_eq!(sim.index_of(handle_of(1)), Some(1));
        assert_eq!(sim.index_of(ptr::null_mut()), None);
        assert_eq!(sim.index_of(handle_of(2)), None);
    }

    #[test]
    fn test_open_twice_fails() {
        let sim = sim();
        let handle = open(&sim, 0);
        let mut other = ptr::null_mut();
        assert_eq!(unsafe { sim.open_device_by_id(&mut other, 0) }, SENSEL_ERROR);
        // senselOpen picks the next free device.
        assert_eq!(unsafe { sim.open(&mut other) }, SENSEL_OK);
        assert_eq!(sim.index_of(other), Some(1));
        assert_eq!(unsafe { sim.open(&mut other) }, SENSEL_ERROR);

        assert_eq!(unsafe { sim.close(handle) }, SENSEL_OK);
        assert_eq!(unsafe { sim.close(handle) }, SENSEL_ERROR);
    }

    #[test]
    fn test_open_by_serial_and_port() {
        let sim = sim();
        let mut handle = ptr::null_mut();
        let mut serial = *b"SM01A002\0";
        assert_eq!(
            unsafe { sim.open_device_by_serial_num(&mut handle, &mut serial) },
            SENSEL_OK
        );
        assert_eq!(sim.index_of(handle), Some(1));

        let mut port = *b"/dev/ttyACM0\0";
        assert_eq!(
            unsafe { sim.open_device_by_com_port(&mut handle, &mut port) },
            SENSEL_OK
        );
        assert_eq!(sim.index_of(handle), Some(0));

        let mut unterminated = *b"SM01A001";
        assert_eq!(
            unsafe { sim.open_device_by_serial_num(&mut handle, &mut unterminated) },
            SENSEL_ERROR
        );
    }

    #[test]
    fn test_frame_buffer_bookkeeping() {
        let sim = sim();
        let handle = open(&sim, 0);
        let mut data = ptr::null_mut();
        assert_eq!(unsafe { sim.allocate_frame_data(handle, &mut data) }, SENSEL_OK);
        assert!(!data.is_null());
        assert_eq!(sim.live_frame_buffers(), 1);

        // Wrong owner.
        let other = open(&sim, 1);
        assert_eq!(unsafe { sim.free_frame_data(other, data) }, SENSEL_ERROR);

        assert_eq!(unsafe { sim.free_frame_data(handle, data) }, SENSEL_OK);
        assert_eq!(sim.live_frame_buffers(), 0);
        assert_eq!(unsafe { sim.free_frame_data(handle, data) }, SENSEL_ERROR);
    }

    #[test]
    fn test_read_requires_scanning() {
        let sim = SimulatedSensel::new(vec![SimulatedDevice::new("SM01A001")
            .frames(vec![SimulatedFrame::default(); 3])]);
        let handle = open(&sim, 0);
        assert_eq!(unsafe { sim.read_sensor(handle) }, SENSEL_ERROR);

        let mut num = 0;
        assert_eq!(unsafe { sim.start_scanning(handle) }, SENSEL_OK);
        assert_eq!(unsafe { sim.read_sensor(handle) }, SENSEL_OK);
        assert_eq!(unsafe { sim.get_num_available_frames(handle, &mut num) }, SENSEL_OK);
        assert_eq!(num, 1);

        assert_eq!(unsafe { sim.set_buffer_control(handle, 5) }, SENSEL_OK);
        assert_eq!(unsafe { sim.read_sensor(handle) }, SENSEL_OK);
        assert_eq!(unsafe { sim.get_num_available_frames(handle, &mut num) }, SENSEL_OK);
        // Only two scripted frames were left.
        assert_eq!(num, 3);
    }

    #[test]
    fn test_close_resets_registers() {
        let sim = sim();
        let handle = open(&sim, 0);
        let mut val = 0;
        assert_eq!(unsafe { sim.set_contacts_min_force(handle, 42) }, SENSEL_OK);
        assert_eq!(unsafe { sim.get_contacts_min_force(handle, &mut val) }, SENSEL_OK);
        assert_eq!(val, 42);
        assert_eq!(unsafe { sim.close(handle) }, SENSEL_OK);

        let handle = open(&sim, 0);
        assert_eq!(unsafe { sim.get_contacts_min_force(handle, &mut val) }, SENSEL_OK);
        assert_eq!(val, 0);
    }

    #[test]
    fn test_soft_reset_register() {
        let sim = sim();
        let handle = open(&sim, 0);
        let mut mask = 0;
        assert_eq!(unsafe { sim.set_contacts_mask(handle, 0x0F) }, SENSEL_OK);
        let mut one = [1];
        assert_eq!(
            unsafe { sim.write_reg(handle, Register::SOFT_RESET.addr(), &mut one) },
            SENSEL_OK
        );
        assert_eq!(unsafe { sim.get_contacts_mask(handle, &mut mask) }, SENSEL_OK);
        assert_eq!(mask, 0);

        let mut byte = [0];
        assert_eq!(
            unsafe { sim.read_reg(handle, Register::DEVICE_OPEN.addr(), &mut byte) },
            SENSEL_OK
        );
        assert_eq!(byte, [1]);
    }

    #[test]
    fn test_identity_registers_are_read_only() {
        let sim = sim();
        let handle = open(&sim, 0);
        let mut cols = [0, 1];
        assert_eq!(
            unsafe { sim.write_reg(handle, Register::SENSOR_NUM_COLS.addr(), &mut cols) },
            SENSEL_ERROR
        );
        assert_eq!(
            unsafe { sim.read_reg(handle, Register::MAGIC.addr(), &mut [0; 6]) },
            SENSEL_OK
        );
    }

    #[test]
    fn test_scan_mode() {
        let sim = sim();
        let handle = open(&sim, 0);
        let mut mode = 0;
        assert_eq!(unsafe { sim.get_scan_mode(handle, &mut mode) }, SENSEL_OK);
        assert_eq!(mode, SCAN_MODE_SYNC);
        assert_eq!(unsafe { sim.set_scan_mode(handle, SCAN_MODE_DISABLE) }, SENSEL_ERROR);
        assert_eq!(unsafe { sim.set_scan_mode(handle, SCAN_MODE_ASYNC) }, SENSEL_OK);
        assert_eq!(unsafe { sim.start_scanning(handle) }, SENSEL_OK);

        let mut enabled = [0];
        assert_eq!(
            unsafe { sim.read_reg(handle, Register::SCAN_ENABLED.addr(), &mut enabled) },
            SENSEL_OK
        );
        assert_eq!(c_int::from(enabled[0]), SCAN_MODE_ASYNC);
    }

    #[test]
    fn test_led_array_register() {
        let sim = sim();
        let handle = open(&sim, 0);
        assert_eq!(unsafe { sim.set_led_brightness(handle, 3, 80) }, SENSEL_OK);
        assert_eq!(unsafe { sim.set_led_brightness(handle, 3, 101) }, SENSEL_ERROR);
        assert_eq!(unsafe { sim.set_led_brightness(handle, 24, 1) }, SENSEL_ERROR);

        let mut buf = [0; 64];
        let mut n = 0;
        assert_eq!(
            unsafe { sim.read_reg_vs(handle, Register::LED_BRIGHTNESS.addr(), &mut buf, &mut n) },
            SENSEL_OK
        );
        assert_eq!(n, 24);
        assert_eq!(buf[3], 80);

        let mut levels = [7; 2];
        assert_eq!(
            unsafe {
                sim.write_reg_vs(handle, Register::LED_BRIGHTNESS.addr(), &mut levels, &mut n)
            },
            SENSEL_OK
        );
        assert_eq!(n, 2);
        let mut brightness = 0;
        assert_eq!(
            unsafe { sim.get_led_brightness(handle, 1, &mut brightness) },
            SENSEL_OK
        );
        assert_eq!(brightness, 7);
    }

    #[test]
    fn test_blob_force_sum() {
        let frame = SimulatedFrame::default().with_blob(&MORPH_SENSOR_INFO, 100.0, 50.0, 500.0, 2);
        let sum: f32 = frame.forces.iter().sum();
        assert!((sum - 500.0).abs() < 0.5, "sum was {}", sum);
        assert!(frame.labels.iter().filter(|&&l| l == 2).count() > 1);
        assert!(frame.labels.iter().any(|&l| l == NO_LABEL));
    }

    #[test]
    fn test_touch_demo_sequence() {
        let demo = SimulatedDevice::touch_demo();
        let states: Vec<_> = demo
            .frames
            .iter()
            .flat_map(|frame| frame.contacts.iter().map(|c| c.state))
            .collect();
        assert_eq!(states.first(), Some(&CONTACT_START));
        assert_eq!(states.last(), Some(&CONTACT_END));
        assert!(states[1..states.len() - 1]
            .iter()
            .all(|&state| state == CONTACT_MOVE));
        assert!(demo.repeat);
    }
}
