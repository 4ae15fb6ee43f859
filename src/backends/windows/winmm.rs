#![cfg(target_os = "windows")]

//! WinMM joystick backend.
//!
//! Wraps `joyGetDevCapsW` / `joyGetPosEx`. The API has no open/close step: "acquire"
//! just checks that the joystick id currently answers.

use crate::device::{DeviceInfo, HardwareBackend, SampleShape};
use crate::error::BackendError;
use crate::sample::{ButtonSet, RawDeviceSample};
use std::mem;
use tracing::debug;
use windows_sys::Win32::Media::Multimedia::{joyGetDevCapsW, joyGetPosEx, JOYCAPSW, JOYINFOEX};

const JOYERR_NOERROR: u32 = 0;
const JOYERR_UNPLUGGED: u32 = 167;
const JOY_RETURNALL: u32 = 0xFF;

/// Access token for one WinMM joystick id.
#[derive(Debug)]
pub struct WinMmHandle {
    id: u32,
}

/// Polls a WinMM joystick (`JOYSTICKID1` is `0`).
pub struct WinMmBackend {
    id: u32,
    info: DeviceInfo,
}

impl WinMmBackend {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            info: DeviceInfo::named(format!("WinMM joystick {id}")),
        }
    }

    /// The first joystick (`JOYSTICKID1`).
    pub fn first() -> Self {
        Self::new(0)
    }

    fn read(id: u32) -> Result<JOYINFOEX, u32> {
        // SAFETY: JOYINFOEX is plain data; dwSize/dwFlags are set before the call.
        let mut info: JOYINFOEX = unsafe { mem::zeroed() };
        info.dwSize = mem::size_of::<JOYINFOEX>() as u32;
        info.dwFlags = JOY_RETURNALL;
        // SAFETY: `info` is a valid, correctly sized out-pointer for the duration of the call.
        let rc = unsafe { joyGetPosEx(id, &mut info) };
        if rc == JOYERR_NOERROR {
            Ok(info)
        } else {
            Err(rc)
        }
    }

    fn capabilities(id: u32) -> Option<DeviceInfo> {
        // SAFETY: JOYCAPSW is plain data.
        let mut caps: JOYCAPSW = unsafe { mem::zeroed() };
        // SAFETY: `caps` is a valid out-pointer of the size we pass.
        let rc = unsafe {
            joyGetDevCapsW(id as usize, &mut caps, mem::size_of::<JOYCAPSW>() as u32)
        };
        if rc != JOYERR_NOERROR {
            return None;
        }
        let len = caps
            .szPname
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(caps.szPname.len());
        Some(DeviceInfo {
            name: String::from_utf16_lossy(&caps.szPname[..len]),
            vendor_id: Some(caps.wMid),
            product_id: Some(caps.wPid),
            path: Some(format!("winmm:{id}")),
        })
    }
}

impl HardwareBackend for WinMmBackend {
    type Handle = WinMmHandle;

    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn shape(&self) -> SampleShape {
        SampleShape::THREE_AXIS
    }

    fn acquire(&mut self) -> Result<WinMmHandle, BackendError> {
        match Self::read(self.id) {
            Ok(_) => {
                if let Some(info) = Self::capabilities(self.id) {
                    self.info = info;
                }
                debug!(id = self.id, device = %self.info, "WinMM joystick answered");
                Ok(WinMmHandle { id: self.id })
            }
            Err(_) => Err(BackendError::NotFound),
        }
    }

    fn poll(&mut self, handle: &mut WinMmHandle) -> Result<RawDeviceSample, BackendError> {
        match Self::read(handle.id) {
            Ok(info) => Ok(RawDeviceSample {
                x: info.dwXpos as i32,
                y: info.dwYpos as i32,
                z: info.dwZpos as i32,
                rz: info.dwRpos as i32,
                slider: info.dwUpos as i32,
                pov: info.dwPOV,
                buttons: ButtonSet::from_bits(info.dwButtons as u128),
            }),
            Err(JOYERR_UNPLUGGED) => Err(BackendError::DeviceLost("joystick unplugged".into())),
            Err(rc) => Err(BackendError::Transient(format!("joyGetPosEx returned {rc}"))),
        }
    }
}
