//! HID report backend.
//!
//! Reads raw input reports through `hidapi` and decodes them with a [`ReportLayout`]: a
//! small, declarative description of where each axis, the hat and the button bitfield sit
//! in the report. Layouts are usually loaded from TOML:
//!
//! ```toml
//! report_id = 1
//! report_len = 16
//!
//! x = { offset = 0, format = "u16_le" }
//! y = { offset = 2, format = "u16_le" }
//! z = { offset = 4, format = "u8" }
//! hat = { offset = 6, min = 0 }
//! buttons = { offset = 7, count = 24 }
//! ```
//!
//! Offsets are relative to the report payload (after the report id byte, if any). Every
//! axis is widened to `0..=65535` so the default listener range applies unchanged.

use crate::device::{DeviceInfo, HardwareBackend, SampleShape};
use crate::error::{BackendError, ConfigError};
use crate::pov::slot_to_hundredths;
use crate::sample::{ButtonSet, RawDeviceSample, MAX_BUTTONS};
use hidapi::{DeviceInfo as HidDeviceInfo, HidApi, HidDevice};
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use tracing::{debug, trace};

/// Upper bound on reports drained per poll, so a chatty device cannot stall the loop.
const MAX_REPORTS_PER_POLL: usize = 32;

/// Encoding of one axis field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldFormat {
    U8,
    I8,
    U16Le,
    I16Le,
}

impl FieldFormat {
    #[inline]
    fn width(self) -> usize {
        match self {
            FieldFormat::U8 | FieldFormat::I8 => 1,
            FieldFormat::U16Le | FieldFormat::I16Le => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisField {
    pub offset: usize,
    pub format: FieldFormat,
}

impl AxisField {
    /// Decode and widen to `0..=65535`.
    fn read(&self, payload: &[u8]) -> Option<i32> {
        let b = payload.get(self.offset..self.offset + self.format.width())?;
        Some(match self.format {
            FieldFormat::U8 => b[0] as i32 * 257,
            FieldFormat::I8 => (b[0] as i8 as i32 + 128) * 257,
            FieldFormat::U16Le => u16::from_le_bytes([b[0], b[1]]) as i32,
            FieldFormat::I16Le => i16::from_le_bytes([b[0], b[1]]) as i32 + 32_768,
        })
    }
}

/// 4-bit hat switch. Values `min..min+8` are North, North-East, ... clockwise; anything
/// else is centered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HatField {
    pub offset: usize,
    #[serde(default)]
    pub high_nibble: bool,
    #[serde(default)]
    pub min: u8,
}

impl HatField {
    fn read(&self, payload: &[u8]) -> Option<u32> {
        let byte = *payload.get(self.offset)?;
        let nibble = if self.high_nibble { byte >> 4 } else { byte & 0x0F };
        let slot = nibble as i16 - self.min as i16;
        Some(slot_to_hundredths(slot))
    }
}

/// Button bitfield, LSB first, starting at `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonField {
    pub offset: usize,
    pub count: u8,
}

impl ButtonField {
    fn read(&self, payload: &[u8]) -> Option<ButtonSet> {
        // Layouts built in code skip `validate`; never read past the bitmap width.
        let count = (self.count as usize).min(MAX_BUTTONS);
        let bytes = payload.get(self.offset..self.offset + count.div_ceil(8))?;
        let mut bits = 0u128;
        for (i, byte) in bytes.iter().enumerate() {
            bits |= (*byte as u128) << (i * 8);
        }
        Some(ButtonSet::from_bits(bits).masked(count))
    }
}

fn default_report_len() -> usize {
    64
}

/// Where the joystick fields sit in an input report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLayout {
    /// Expected first byte of each report. `None` for devices without report ids.
    #[serde(default)]
    pub report_id: Option<u8>,
    #[serde(default = "default_report_len")]
    pub report_len: usize,
    pub x: AxisField,
    pub y: AxisField,
    #[serde(default)]
    pub z: Option<AxisField>,
    #[serde(default)]
    pub rz: Option<AxisField>,
    #[serde(default)]
    pub slider: Option<AxisField>,
    #[serde(default)]
    pub hat: Option<HatField>,
    #[serde(default)]
    pub buttons: Option<ButtonField>,
}

impl ReportLayout {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let layout: ReportLayout = toml::from_str(text)?;
        if let Some(buttons) = layout.buttons {
            if buttons.count as usize > MAX_BUTTONS {
                return Err(ConfigError::Invalid(format!(
                    "button count {} exceeds {MAX_BUTTONS}",
                    buttons.count
                )));
            }
        }
        if layout.report_len == 0 {
            return Err(ConfigError::Invalid("report_len must be > 0".into()));
        }
        Ok(layout)
    }

    pub fn shape(&self) -> SampleShape {
        SampleShape {
            rz: self.rz.is_some(),
            slider: self.slider.is_some(),
            buttons: self.buttons.map_or(0, |b| b.count),
        }
    }

    /// Decode one report. `None` if it is for another report id or too short.
    pub fn decode(&self, report: &[u8]) -> Option<RawDeviceSample> {
        let payload = match self.report_id {
            Some(id) => match report.split_first() {
                Some((&first, rest)) if first == id => rest,
                _ => return None,
            },
            None => report,
        };

        let optional = |field: Option<AxisField>| -> Option<i32> {
            match field {
                Some(f) => f.read(payload),
                None => Some(0),
            }
        };

        let mut sample = RawDeviceSample::default().with_axes(
            self.x.read(payload)?,
            self.y.read(payload)?,
            optional(self.z)?,
        );
        sample.rz = optional(self.rz)?;
        sample.slider = optional(self.slider)?;
        if let Some(hat) = self.hat {
            sample.pov = hat.read(payload)?;
        }
        if let Some(buttons) = self.buttons {
            sample.buttons = buttons.read(payload)?;
        }
        Some(sample)
    }
}

/// Which HID device to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSelector {
    /// First device with this vendor/product id.
    VidPid { vendor_id: u16, product_id: u16 },
    /// Exact OS path, as reported by `hidapi`.
    Path(CString),
}

impl DeviceSelector {
    fn matches(&self, info: &HidDeviceInfo) -> bool {
        match self {
            DeviceSelector::VidPid {
                vendor_id,
                product_id,
            } => info.vendor_id() == *vendor_id && info.product_id() == *product_id,
            DeviceSelector::Path(path) => info.path() == path.as_c_str(),
        }
    }
}

/// Polls one HID joystick.
pub struct HidBackend {
    api: Option<HidApi>,
    selector: DeviceSelector,
    layout: ReportLayout,
    buf: Vec<u8>,
    /// Returned when no new report arrived since the last poll.
    last: RawDeviceSample,
    info: DeviceInfo,
}

impl HidBackend {
    pub fn new(selector: DeviceSelector, layout: ReportLayout) -> Self {
        let info = match &selector {
            DeviceSelector::VidPid {
                vendor_id,
                product_id,
            } => DeviceInfo {
                name: "HID joystick".into(),
                vendor_id: Some(*vendor_id),
                product_id: Some(*product_id),
                path: None,
            },
            DeviceSelector::Path(path) => DeviceInfo {
                name: "HID joystick".into(),
                path: Some(path.to_string_lossy().into_owned()),
                ..DeviceInfo::default()
            },
        };
        Self {
            api: None,
            selector,
            buf: vec![0u8; layout.report_len],
            layout,
            last: RawDeviceSample::default(),
            info,
        }
    }

    fn refresh_api(&mut self) -> Result<&HidApi, BackendError> {
        match self.api.as_mut() {
            Some(api) => api.refresh_devices()?,
            None => self.api = Some(HidApi::new()?),
        }
        self.api.as_ref().ok_or(BackendError::NotFound)
    }
}

impl HardwareBackend for HidBackend {
    type Handle = HidDevice;

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn shape(&self) -> SampleShape {
        self.layout.shape()
    }

    fn acquire(&mut self) -> Result<HidDevice, BackendError> {
        let selector = self.selector.clone();
        let api = self.refresh_api()?;

        let Some(found) = api.device_list().find(|d| selector.matches(d)) else {
            return Err(BackendError::NotFound);
        };
        let info = DeviceInfo {
            name: found.product_string().unwrap_or("HID joystick").to_string(),
            vendor_id: Some(found.vendor_id()),
            product_id: Some(found.product_id()),
            path: Some(found.path().to_string_lossy().into_owned()),
        };
        let device = found
            .open_device(api)
            .map_err(|e| BackendError::Acquisition(e.to_string()))?;
        device.set_blocking_mode(false)?;

        debug!(device = %info, "HID device opened");
        self.info = info;
        self.last = RawDeviceSample::default();
        Ok(device)
    }

    fn poll(&mut self, device: &mut HidDevice) -> Result<RawDeviceSample, BackendError> {
        for _ in 0..MAX_REPORTS_PER_POLL {
            match device.read(&mut self.buf) {
                Ok(0) => break,
                Ok(n) => match self.layout.decode(&self.buf[..n]) {
                    Some(sample) => self.last = sample,
                    None => trace!(len = n, "ignoring foreign or short report"),
                },
                Err(e) => return Err(BackendError::DeviceLost(e.to_string())),
            }
        }
        Ok(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pov::POV_CENTERED_SIGNED;
    use crate::sample::POV_CENTERED;

    const LAYOUT: &str = r#"
        report_id = 1
        report_len = 12
        x = { offset = 0, format = "u16_le" }
        y = { offset = 2, format = "i16_le" }
        z = { offset = 4, format = "u8" }
        rz = { offset = 5, format = "i8" }
        hat = { offset = 6, high_nibble = true }
        buttons = { offset = 7, count = 12 }
    "#;

    fn layout() -> ReportLayout {
        ReportLayout::from_toml_str(LAYOUT).unwrap()
    }

    #[test]
    fn decodes_and_widens_fields() {
        let report = [
            1, // report id
            0xFF, 0xFF, // x = 65535
            0x00, 0x80, // y = -32768 -> 0
            0x80, // z = 128 * 257
            0x7F, // rz = 127 -> 65535
            0x20, // hat high nibble 2 -> East
            0b0000_0101, 0b1111_1000, // buttons 1, 3, 12 (upper bits masked)
        ];
        let s = layout().decode(&report).unwrap();
        assert_eq!((s.x, s.y, s.z, s.rz), (65_535, 0, 128 * 257, 65_535));
        assert_eq!(s.pov, 9000);
        assert_eq!(s.buttons.iter().collect::<Vec<_>>(), vec![0, 2, 11]);
        assert_eq!(s.slider, 0);
    }

    #[test]
    fn out_of_range_hat_is_centered() {
        let mut report = [0u8; 10];
        report[0] = 1;
        report[7] = 0xF0;
        let s = layout().decode(&report).unwrap();
        assert_eq!(s.pov, POV_CENTERED);
        assert_ne!(s.pov, POV_CENTERED_SIGNED);
    }

    #[test]
    fn foreign_or_short_reports_are_ignored() {
        let l = layout();
        assert!(l.decode(&[2, 0, 0, 0, 0, 0, 0, 0, 0, 0]).is_none());
        assert!(l.decode(&[1, 0, 0]).is_none());
        assert!(l.decode(&[]).is_none());
    }

    #[test]
    fn shape_follows_layout() {
        let shape = layout().shape();
        assert!(shape.rz);
        assert!(!shape.slider);
        assert_eq!(shape.button_count(), 12);
    }

    #[test]
    fn rejects_too_many_buttons() {
        let text = r#"
            x = { offset = 0, format = "u8" }
            y = { offset = 1, format = "u8" }
            buttons = { offset = 2, count = 200 }
        "#;
        assert!(matches!(
            ReportLayout::from_toml_str(text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn oversized_button_field_reads_at_most_the_bitmap() {
        let field = ButtonField {
            offset: 1,
            count: 200,
        };
        let mut payload = [0xFF; 17];
        payload[0] = 0;
        let set = field.read(&payload).unwrap();
        assert_eq!(set.iter().count(), MAX_BUTTONS);

        let few = ButtonField {
            offset: 0,
            count: 3,
        };
        assert_eq!(few.read(&[0xFF]).unwrap().iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
