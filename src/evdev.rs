use crate::error::{AddMessage, Error};
use crate::gestures::Resolution;
use crate::recognizer::{RecognizerConfig, TouchSource};
use crate::tracker::RawSample;
use crate::utils::{Slots, MAX_SLOTS};
use evdev_rs::enums::{EventCode, EV_ABS, EV_SYN};
use evdev_rs::{Device, DeviceWrapper, GrabMode, InputEvent, ReadFlag, ReadStatus, TimeVal};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const INPUT_DIR: &str = "/dev/input";
const MAX_EVENT_AGE: Duration = Duration::from_secs(1);

const REQUIRED_AXES: [EV_ABS; 4] = [
    EV_ABS::ABS_MT_SLOT,
    EV_ABS::ABS_MT_TRACKING_ID,
    EV_ABS::ABS_MT_POSITION_X,
    EV_ABS::ABS_MT_POSITION_Y,
];

const REPORTED_AXES: [EV_ABS; 12] = [
    EV_ABS::ABS_X,
    EV_ABS::ABS_Y,
    EV_ABS::ABS_PRESSURE,
    EV_ABS::ABS_MT_SLOT,
    EV_ABS::ABS_MT_TOUCH_MAJOR,
    EV_ABS::ABS_MT_TOUCH_MINOR,
    EV_ABS::ABS_MT_ORIENTATION,
    EV_ABS::ABS_MT_POSITION_X,
    EV_ABS::ABS_MT_POSITION_Y,
    EV_ABS::ABS_MT_TOOL_TYPE,
    EV_ABS::ABS_MT_TRACKING_ID,
    EV_ABS::ABS_MT_PRESSURE,
];

fn is_syn_report_event(event: &InputEvent) -> bool {
    event.event_code == EventCode::EV_SYN(EV_SYN::SYN_REPORT)
}

/// Maps a kernel (wall clock) event timestamp onto the monotonic clock.
/// Timestamps from the future or older than `MAX_EVENT_AGE` map to `now`.
fn acquired_at(time: &TimeVal, now: Instant) -> Instant {
    let since_epoch = Duration::new(
        time.tv_sec.max(0) as u64,
        (time.tv_usec.clamp(0, 999_999) * 1000) as u32,
    );
    let stamp = match UNIX_EPOCH.checked_add(since_epoch) {
        Some(stamp) => stamp,
        None => return now,
    };
    match SystemTime::now().duration_since(stamp) {
        Ok(age) if age <= MAX_EVENT_AGE => now.checked_sub(age).unwrap_or(now),
        _ => now,
    }
}

fn slot_index(value: i32) -> Option<usize> {
    usize::try_from(value).ok().filter(|slot| *slot < MAX_SLOTS)
}

/// Folds multitouch protocol B events into per-slot samples and yields the
/// whole slot table on every `SYN_REPORT`.
#[derive(Debug, Clone)]
pub struct SlotDecoder {
    slots: Slots<RawSample>,
    changed: Slots<bool>,
    active_slot: Option<usize>,
}

impl SlotDecoder {
    pub fn new(current_slot: i32, now: Instant) -> SlotDecoder {
        SlotDecoder {
            slots: [RawSample::inactive(now); MAX_SLOTS],
            changed: [false; MAX_SLOTS],
            active_slot: slot_index(current_slot),
        }
    }

    pub fn process_event(&mut self, event: &InputEvent, now: Instant) -> Option<Vec<RawSample>> {
        if is_syn_report_event(event) {
            return Some(self.commit(acquired_at(&event.time, now)));
        }
        let axis = match event.event_code {
            EventCode::EV_ABS(axis) => axis,
            _ => return None,
        };
        if axis == EV_ABS::ABS_MT_SLOT {
            self.active_slot = slot_index(event.value);
            return None;
        }
        let slot = self.active_slot?;
        let sample = &mut self.slots[slot];
        match axis {
            EV_ABS::ABS_MT_TRACKING_ID => match event.value {
                -1 => sample.active = false,
                tracking_id => {
                    sample.tracking_id = tracking_id;
                    sample.active = true;
                }
            },
            EV_ABS::ABS_MT_POSITION_X => sample.position.x = event.value,
            EV_ABS::ABS_MT_POSITION_Y => sample.position.y = event.value,
            EV_ABS::ABS_MT_TOUCH_MAJOR => sample.touch_major = event.value,
            EV_ABS::ABS_MT_TOUCH_MINOR => sample.touch_minor = event.value,
            _ => return None,
        }
        self.changed[slot] = true;
        None
    }

    /// Stamps every slot changed since the last commit with `now`.
    pub fn commit(&mut self, now: Instant) -> Vec<RawSample> {
        for (sample, changed) in self.slots.iter_mut().zip(self.changed.iter_mut()) {
            if *changed {
                sample.last_action = now;
                *changed = false;
            }
        }
        self.slots.to_vec()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisInfo {
    pub axis: String,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub path: PathBuf,
    pub name: String,
    pub uniq: String,
    pub vendor: u16,
    pub product: u16,
    pub bus: u16,
    pub slots: usize,
    pub axes: Vec<AxisInfo>,
}

impl Capabilities {
    fn of(device: &Device, path: &Path) -> Capabilities {
        let axes = REPORTED_AXES
            .iter()
            .filter_map(|axis| {
                device
                    .abs_info(&EventCode::EV_ABS(*axis))
                    .map(|info| AxisInfo {
                        axis: format!("{:?}", axis),
                        minimum: info.minimum,
                        maximum: info.maximum,
                        fuzz: info.fuzz,
                        flat: info.flat,
                        resolution: info.resolution,
                    })
            })
            .collect();
        let slots = device
            .abs_info(&EventCode::EV_ABS(EV_ABS::ABS_MT_SLOT))
            .map_or(0, |info| (info.maximum + 1).max(0) as usize);
        Capabilities {
            path: path.to_path_buf(),
            name: device.name().unwrap_or("").to_string(),
            uniq: device.uniq().unwrap_or("").to_string(),
            vendor: device.vendor_id(),
            product: device.product_id(),
            bus: device.bustype(),
            slots,
            axes,
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "device: {}", self.path.display())?;
        writeln!(f, "  name: {}", self.name)?;
        writeln!(f, "  uniq: {}", self.uniq)?;
        writeln!(
            f,
            "  vendor: {:04x}, product: {:04x}, bus: {:04x}",
            self.vendor, self.product, self.bus
        )?;
        write!(f, "  slots: {}", self.slots)?;
        for info in &self.axes {
            write!(
                f,
                "\n  {}: min {}, max {}, fuzz {}, flat {}, resolution {}",
                info.axis, info.minimum, info.maximum, info.fuzz, info.flat, info.resolution
            )?;
        }
        Ok(())
    }
}

fn open_device(path: &Path) -> Result<(Device, File), Error> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
        .add_message(format!("can't open {}", path.display()))?;
    let readiness = file
        .try_clone()
        .add_message(format!("can't duplicate {}", path.display()))?;
    let device = Device::new_from_file(file)
        .add_message(format!("evdev: can't initialize {}", path.display()))?;
    Ok((device, readiness))
}

fn is_touchscreen(device: &Device) -> bool {
    REQUIRED_AXES
        .iter()
        .all(|axis| device.abs_info(&EventCode::EV_ABS(*axis)).is_some())
}

fn event_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Returns the lowest numbered `/dev/input/event*` node with multitouch
/// slots, tracking ids and both position axes.
pub fn discover() -> Result<PathBuf, Error> {
    let mut candidates: Vec<(u32, PathBuf)> = fs::read_dir(INPUT_DIR)
        .add_message(format!("can't list {}", INPUT_DIR))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            event_number(&path).map(|number| (number, path))
        })
        .collect();
    candidates.sort();
    for (_, path) in candidates {
        match open_device(&path) {
            Ok((device, _)) if is_touchscreen(&device) => return Ok(path),
            Ok(_) => {}
            Err(error) => debug!(%error, "skipping input device"),
        }
    }
    Err(Error::NoTouchscreen)
}

/// A multitouch device read through libevdev.
pub struct EvdevSource {
    device: Device,
    readiness: File,
    capabilities: Capabilities,
    resolution: Resolution,
    decoder: SlotDecoder,
    grabbed: bool,
}

impl fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<EvdevSource {}>", self.capabilities.path.display())
    }
}

impl EvdevSource {
    pub fn open(config: &RecognizerConfig) -> Result<EvdevSource, Error> {
        let path = match &config.device {
            Some(path) => path.clone(),
            None => discover()?,
        };
        let (mut device, readiness) = open_device(&path)?;
        if !is_touchscreen(&device) {
            return Err(Error::NoTouchscreen);
        }
        if config.grab {
            device
                .grab(GrabMode::Grab)
                .add_message(format!("can't grab {}", path.display()))?;
        }
        let capabilities = Capabilities::of(&device, &path);
        info!(
            path = %path.display(),
            name = %capabilities.name,
            grabbed = config.grab,
            "opened touchscreen"
        );
        let max = |axis| {
            device
                .abs_info(&EventCode::EV_ABS(axis))
                .map_or(0, |info| info.maximum)
        };
        let resolution = Resolution {
            x: max(EV_ABS::ABS_MT_POSITION_X),
            y: max(EV_ABS::ABS_MT_POSITION_Y),
        };
        let current_slot = device
            .abs_info(&EventCode::EV_ABS(EV_ABS::ABS_MT_SLOT))
            .map_or(0, |info| info.value);
        Ok(EvdevSource {
            device,
            readiness,
            capabilities,
            resolution,
            decoder: SlotDecoder::new(current_slot, Instant::now()),
            grabbed: config.grab,
        })
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Replays the device's current state after the kernel dropped events.
    fn resync(&mut self, now: Instant) -> Result<Vec<RawSample>, Error> {
        loop {
            match self.device.next_event(ReadFlag::SYNC) {
                Ok((ReadStatus::Sync, event)) => {
                    self.decoder.process_event(&event, now);
                }
                Ok((ReadStatus::Success, _)) => break,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) => return Err(Error::io("evdev: resync failed", error)),
            }
        }
        Ok(self.decoder.commit(now))
    }
}

impl TouchSource for EvdevSource {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn readiness(&self) -> Option<BorrowedFd<'_>> {
        Some(self.readiness.as_fd())
    }

    fn has_pending(&self) -> bool {
        self.device.has_event_pending()
    }

    fn read_frame(&mut self, now: Instant) -> Result<Option<Vec<RawSample>>, Error> {
        loop {
            match self.device.next_event(ReadFlag::NORMAL) {
                Ok((ReadStatus::Success, event)) => {
                    if let Some(frame) = self.decoder.process_event(&event, now) {
                        return Ok(Some(frame));
                    }
                }
                Ok((ReadStatus::Sync, _)) => {
                    warn!("SYN_DROPPED: resynchronizing with the device state");
                    return self.resync(now).map(Some);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(error) if error.raw_os_error() == Some(Errno::ENODEV as i32) => {
                    return Err(Error::io(
                        format!("{} disappeared", self.capabilities.path.display()),
                        error,
                    ));
                }
                Err(error) => {
                    warn!(%error, "reading touch events");
                    return Ok(None);
                }
            }
        }
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        if self.grabbed {
            self.device
                .grab(GrabMode::Ungrab)
                .add_message(format!("can't release {}", self.capabilities.path.display()))?;
            self.grabbed = false;
        }
        Ok(())
    }
}
