//! A scriptable in-memory device.
//!
//! [`VirtualBackend`] is driven through a cloneable [`VirtualController`]: queue samples,
//! poll failures and device losses, or make the device unavailable so `acquire` fails.
//! When the queue is empty the last delivered sample is repeated, like a stick nobody is
//! touching.

use crate::device::{DeviceInfo, HardwareBackend, SampleShape};
use crate::error::BackendError;
use crate::lock;
use crate::sample::RawDeviceSample;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

enum Step {
    Sample(RawDeviceSample),
    Transient,
    Lost,
}

struct Script {
    available: bool,
    queue: VecDeque<Step>,
    current: RawDeviceSample,
    polls: u64,
    acquisitions: u64,
    /// Bumped on every device loss; handles from older generations are stale.
    generation: u64,
}

/// Access token of a [`VirtualBackend`].
#[derive(Debug)]
pub struct VirtualHandle {
    generation: u64,
}

/// Test/demo device whose input comes from a [`VirtualController`].
pub struct VirtualBackend {
    name: String,
    shape: SampleShape,
    script: Arc<Mutex<Script>>,
}

impl VirtualBackend {
    /// A full-shape (X/Y/Z/RZ/slider, 128 buttons) device and its controller.
    pub fn new(name: &str) -> (Self, VirtualController) {
        Self::with_shape(name, SampleShape::FULL)
    }

    pub fn with_shape(name: &str, shape: SampleShape) -> (Self, VirtualController) {
        let script = Arc::new(Mutex::new(Script {
            available: true,
            queue: VecDeque::new(),
            current: RawDeviceSample::default(),
            polls: 0,
            acquisitions: 0,
            generation: 0,
        }));
        let backend = Self {
            name: name.to_string(),
            shape,
            script: Arc::clone(&script),
        };
        (backend, VirtualController { script })
    }
}

impl HardwareBackend for VirtualBackend {
    type Handle = VirtualHandle;

    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self.name.clone(),
            path: Some(format!("virtual:{}", self.name)),
            ..DeviceInfo::default()
        }
    }

    fn shape(&self) -> SampleShape {
        self.shape
    }

    fn acquire(&mut self) -> Result<VirtualHandle, BackendError> {
        let mut script = lock(&self.script);
        script.acquisitions += 1;
        if !script.available {
            return Err(BackendError::NotFound);
        }
        Ok(VirtualHandle {
            generation: script.generation,
        })
    }

    fn poll(&mut self, handle: &mut VirtualHandle) -> Result<RawDeviceSample, BackendError> {
        let mut script = lock(&self.script);
        script.polls += 1;
        if handle.generation != script.generation {
            return Err(BackendError::DeviceLost("stale virtual handle".into()));
        }
        match script.queue.pop_front() {
            Some(Step::Sample(sample)) => {
                script.current = sample;
                Ok(sample)
            }
            Some(Step::Transient) => Err(BackendError::Transient("scripted failure".into())),
            Some(Step::Lost) => {
                script.generation += 1;
                Err(BackendError::DeviceLost("scripted device loss".into()))
            }
            None => Ok(script.current),
        }
    }
}

/// Feeds a [`VirtualBackend`]. Cheap to clone; safe to use from any thread.
#[derive(Clone)]
pub struct VirtualController {
    script: Arc<Mutex<Script>>,
}

impl VirtualController {
    pub fn push_sample(&self, sample: RawDeviceSample) {
        lock(&self.script).queue.push_back(Step::Sample(sample));
    }

    pub fn push_samples(&self, samples: impl IntoIterator<Item = RawDeviceSample>) {
        let mut script = lock(&self.script);
        script.queue.extend(samples.into_iter().map(Step::Sample));
    }

    /// Next poll fails once.
    pub fn push_transient_failure(&self) {
        lock(&self.script).queue.push_back(Step::Transient);
    }

    /// Next poll reports the device as lost; the handle becomes stale.
    pub fn push_device_lost(&self) {
        lock(&self.script).queue.push_back(Step::Lost);
    }

    /// While unavailable, `acquire` fails with [`BackendError::NotFound`].
    pub fn set_available(&self, available: bool) {
        lock(&self.script).available = available;
    }

    /// Replace the repeated sample without queueing.
    pub fn set_current(&self, sample: RawDeviceSample) {
        lock(&self.script).current = sample;
    }

    pub fn poll_count(&self) -> u64 {
        lock(&self.script).polls
    }

    pub fn acquire_count(&self) -> u64 {
        lock(&self.script).acquisitions
    }

    /// Queued steps not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.script).queue.len()
    }
}
