//! The joystick listener: lifecycle, polling loop and dispatch.
//!
//! [`JoystickListener`] owns one device (through a [`HardwareBackend`]) and one background
//! polling thread. Each cycle it:
//!
//! 1. polls the backend,
//! 2. diffs buttons against the previous sample and axes against the last reported one,
//! 3. dispatches button transitions, then held buttons, then (if anything moved) one axis
//!    event, stopping early if the listener was stopped meanwhile,
//! 4. stores the sample as the new "previous",
//! 5. sleeps `poll_interval_ms`.
//!
//! Handlers run synchronously on the polling thread. A slow handler delays the next poll.
//!
//! # Lifecycle
//! ```text
//! Uninitialized --init()--> Initialized --start()--> Running --stop()--> Stopped
//!                                ^                                          |
//!                                +------------------ start() ---------------+
//! ```
//! `start()` and `stop()` are idempotent. `stop()` may be called before `start()`, twice,
//! or from inside a handler (it never joins the thread it is running on). A thread that
//! stopped itself is joined by the next `start()`, `stop()` or drop, so two polling
//! threads never dispatch at once.
//!
//! # Failures on the polling thread
//! - Transient poll failure: the cycle is skipped.
//! - Device lost: the loop re-acquires until it succeeds or the listener is stopped.
//!
//! Neither is reported to the caller; both are logged via `tracing`.
//!
//! # Example
//! ```no_run
//! use joylisten::backends::virtual_input::VirtualBackend;
//! use joylisten::JoystickListener;
//!
//! let (backend, _feed) = VirtualBackend::new("demo");
//! let listener = JoystickListener::new(backend);
//! listener.init().expect("joystick init failed");
//! listener.add_button_handler(|e| println!("button {} pressed={}", e.button_id, e.pressed));
//! listener.calibrate();
//! listener.start().expect("start polling");
//! // ...
//! listener.stop();
//! ```

use crate::calibration::{Baseline, SampleHistory};
use crate::config::ListenerConfig;
use crate::device::{DeviceInfo, DeviceSlot, HardwareBackend, SampleShape};
use crate::diff::{self, SampleDiff};
use crate::error::ListenerError;
use crate::event::{AxisEvent, ButtonEvent, HeldEvent};
use crate::eventbus::{DispatchSet, HandlerId, HandlerRegistry};
use crate::lock;
use crate::logger::{EventSink, LifecycleNote, LogRecord, Mirror, SilentMode};
use crate::normalize::ThrottleSource;
use crate::pov::{canonical_pov, PovDirection};
use crate::sample::RawDeviceSample;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Where a listener is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

struct Worker {
    /// Per-run flag; a restarted listener gets a fresh one.
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct Lifecycle {
    state: ListenerState,
    worker: Option<Worker>,
    /// Thread of a run that stopped itself and has not been joined yet.
    retired: Option<JoinHandle<()>>,
}

fn warn_if_invalid(config: &ListenerConfig) {
    if let Err(e) = config.validate() {
        warn!(error = %e, "listener config is invalid; clamping where possible");
    }
}

const RETIRE_POLL: Duration = Duration::from_millis(1);

/// Join a polling thread, or hand the handle back if the caller is that thread.
fn join_poller(handle: JoinHandle<()>) -> Result<(), JoinHandle<()>> {
    if handle.thread().id() == thread::current().id() {
        return Err(handle);
    }
    if handle.join().is_err() {
        warn!("polling thread panicked");
    }
    Ok(())
}

/// State reachable from the control thread, the polling thread and [`StopHandle`]s.
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    settings: RwLock<ListenerConfig>,
    sink: RwLock<Option<Arc<dyn EventSink>>>,
}

impl Shared {
    fn settings(&self) -> ListenerConfig {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_settings(&self, f: impl FnOnce(&mut ListenerConfig)) {
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut settings);
    }

    fn mirror(&self, silent: SilentMode) -> Mirror {
        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Mirror::new(sink, silent)
    }

    fn note(&self, note: LifecycleNote) {
        let silent = self.settings().silent;
        self.mirror(silent).emit(LogRecord::Lifecycle(note));
    }

    fn state(&self) -> ListenerState {
        lock(&self.lifecycle).state
    }

    /// Wait until the thread of a run that stopped itself has exited, then join it.
    ///
    /// Fails with [`ListenerError::Stopping`] when called from that thread.
    fn reap_retired(&self) -> Result<(), ListenerError> {
        loop {
            let mut lifecycle = lock(&self.lifecycle);
            match lifecycle.retired.take() {
                None => return Ok(()),
                Some(handle) if handle.thread().id() == thread::current().id() => {
                    lifecycle.retired = Some(handle);
                    return Err(ListenerError::Stopping);
                }
                Some(handle) if handle.is_finished() => {
                    drop(lifecycle);
                    if handle.join().is_err() {
                        warn!("polling thread panicked");
                    }
                    return Ok(());
                }
                Some(handle) => lifecycle.retired = Some(handle),
            }
            // The lock stays free while the old loop finishes its cycle.
            drop(lifecycle);
            thread::sleep(RETIRE_POLL);
        }
    }

    fn stop(&self) {
        if self.reap_retired().is_err() {
            debug!("stop requested again from a stopping polling thread");
        }

        // Join without holding the lock: a handler may call stop() concurrently.
        let worker = lock(&self.lifecycle).worker.take();
        let Some(worker) = worker else {
            return;
        };
        worker.running.store(false, Ordering::Release);
        let own = join_poller(worker.handle).err();
        if own.is_some() {
            debug!("stop requested from the polling thread; joining later");
        }

        {
            let mut lifecycle = lock(&self.lifecycle);
            if own.is_some() {
                lifecycle.retired = own;
            }
            if lifecycle.worker.is_none() && lifecycle.state == ListenerState::Running {
                lifecycle.state = ListenerState::Stopped;
            }
        }
        info!("joystick listener stopped");
        self.note(LifecycleNote::Stopped);
    }
}

/// Cloneable handle that can stop a listener from anywhere, including its own handlers.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Same as [`JoystickListener::stop`].
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn is_running(&self) -> bool {
        self.shared.state() == ListenerState::Running
    }
}

/// Polls one device on a background thread and dispatches events to handlers.
pub struct JoystickListener<B: HardwareBackend> {
    device: Arc<Mutex<DeviceSlot<B>>>,
    history: Arc<SampleHistory>,
    handlers: Arc<Mutex<HandlerRegistry>>,
    shared: Arc<Shared>,
}

impl<B: HardwareBackend> JoystickListener<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ListenerConfig::default())
    }

    /// Build a listener with explicit settings.
    ///
    /// Settings that fail [`ListenerConfig::validate`] are kept but logged; zero intervals
    /// are treated as 1 ms.
    pub fn with_config(backend: B, config: ListenerConfig) -> Self {
        warn_if_invalid(&config);
        Self {
            device: Arc::new(Mutex::new(DeviceSlot::new(backend))),
            history: Arc::new(SampleHistory::new()),
            handlers: Arc::new(Mutex::new(HandlerRegistry::new())),
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    state: ListenerState::Uninitialized,
                    worker: None,
                    retired: None,
                }),
                settings: RwLock::new(config),
                sink: RwLock::new(None),
            }),
        }
    }

    // ---- lifecycle ----

    /// Acquire the device.
    ///
    /// On failure the listener stays (or becomes) `Uninitialized`; call `init()` again to
    /// retry. Rejected while the polling thread is running.
    pub fn init(&self) -> Result<(), ListenerError> {
        let mut lifecycle = lock(&self.shared.lifecycle);
        if lifecycle.state == ListenerState::Running {
            return Err(ListenerError::AlreadyRunning);
        }

        let result = lock(&self.device).acquire();
        match result {
            Ok(()) => {
                lifecycle.state = ListenerState::Initialized;
                drop(lifecycle);
                info!(device = %self.device_info(), "joystick initialized");
                self.shared.note(LifecycleNote::Initialized);
                Ok(())
            }
            Err(e) => {
                lifecycle.state = ListenerState::Uninitialized;
                drop(lifecycle);
                warn!(device = %self.device_info(), error = %e, "joystick initialization failed");
                self.shared.note(LifecycleNote::InitFailed);
                Err(ListenerError::Acquisition(e))
            }
        }
    }

    /// Spawn the polling thread. No-op if already running.
    ///
    /// Waits for the thread of a run that stopped itself to exit first. Called from that
    /// very thread (a handler restarting its own listener) it returns
    /// [`ListenerError::Stopping`].
    pub fn start(&self) -> Result<(), ListenerError> {
        let mut lifecycle = loop {
            let lifecycle = lock(&self.shared.lifecycle);
            if !Self::needs_spawn(lifecycle.state)? {
                return Ok(());
            }
            if lifecycle.retired.is_none() {
                break lifecycle;
            }
            drop(lifecycle);
            self.shared.reap_retired()?;
        };

        let running = Arc::new(AtomicBool::new(true));
        let poller = PollLoop {
            device: Arc::clone(&self.device),
            history: Arc::clone(&self.history),
            handlers: Arc::clone(&self.handlers),
            shared: Arc::clone(&self.shared),
            running: Arc::clone(&running),
            shape: lock(&self.device).shape(),
        };
        let handle = thread::Builder::new()
            .name("joylisten-poll".into())
            .spawn(move || poller.run())
            .map_err(ListenerError::Spawn)?;

        lifecycle.worker = Some(Worker { running, handle });
        lifecycle.state = ListenerState::Running;
        drop(lifecycle);

        info!("joystick listener started");
        self.shared.note(LifecycleNote::Started);
        Ok(())
    }

    fn needs_spawn(state: ListenerState) -> Result<bool, ListenerError> {
        match state {
            ListenerState::Uninitialized => Err(ListenerError::NotInitialized),
            ListenerState::Running => Ok(false),
            ListenerState::Initialized | ListenerState::Stopped => Ok(true),
        }
    }

    /// Stop the polling thread and wait for it to exit.
    ///
    /// Idempotent. Safe before `start()`. When called from the polling thread itself
    /// (inside a handler) it only signals the loop and returns; that thread is joined by
    /// the next `start()`, `stop()` or drop made from another thread.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    pub fn is_initialized(&self) -> bool {
        self.state() != ListenerState::Uninitialized
    }

    pub fn device_info(&self) -> DeviceInfo {
        lock(&self.device).info()
    }

    pub fn shape(&self) -> SampleShape {
        lock(&self.device).shape()
    }

    // ---- calibration ----

    /// Poll once and use the result as the "previous" sample, without emitting events.
    ///
    /// Returns `false` (and changes nothing) if the listener is not initialized or the
    /// poll fails. Axis values are not offset by the baseline.
    pub fn calibrate(&self) -> bool {
        if !self.is_initialized() {
            return false;
        }
        let polled = lock(&self.device).poll();
        match polled {
            Ok(sample) => {
                self.history.calibrate(sample);
                debug!(?sample, "joystick center calibrated");
                self.shared.note(LifecycleNote::Calibrated);
                true
            }
            Err(e) => {
                debug!(error = %e, "calibration poll failed");
                false
            }
        }
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.history.baseline()
    }

    /// Forget the previous sample and baseline.
    pub fn reset(&self) {
        self.history.reset();
        debug!("joystick state reset");
        self.shared.note(LifecycleNote::Reset);
    }

    // ---- handlers ----

    pub fn add_axis_handler(
        &self,
        handler: impl Fn(&AxisEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        lock(&self.handlers).add_axis(handler)
    }

    pub fn add_button_handler(
        &self,
        handler: impl Fn(&ButtonEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        lock(&self.handlers).add_button(handler)
    }

    pub fn add_button_held_handler(
        &self,
        handler: impl Fn(&HeldEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        lock(&self.handlers).add_button_held(handler)
    }

    /// Deregister a handler. Takes effect from the next poll cycle.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        lock(&self.handlers).remove(id)
    }

    // ---- configuration ----

    pub fn config(&self) -> ListenerConfig {
        self.shared.settings()
    }

    /// Replace the whole configuration. Applies from the next poll cycle.
    pub fn set_config(&self, config: ListenerConfig) {
        warn_if_invalid(&config);
        self.shared.update_settings(|s| *s = config);
    }

    /// Switch between raw and normalized axis values from the next poll cycle.
    pub fn set_normalize(&self, normalize: bool) {
        self.shared.update_settings(|s| s.normalize = normalize);
    }

    pub fn set_throttle_reversed(&self, reversed: bool) {
        self.shared.update_settings(|s| s.throttle_reversed = reversed);
    }

    pub fn set_throttle_source(&self, source: ThrottleSource) {
        self.shared.update_settings(|s| s.throttle_source = source);
    }

    pub fn set_axis_threshold(&self, threshold: u32) {
        self.shared.update_settings(|s| s.axis_threshold = threshold);
    }

    pub fn set_silent_mode(&self, silent: SilentMode) {
        self.shared.update_settings(|s| s.silent = silent);
    }

    pub fn set_sink(&self, sink: impl EventSink + 'static) {
        self.set_shared_sink(Arc::new(sink));
    }

    pub fn set_shared_sink(&self, sink: Arc<dyn EventSink>) {
        *self
            .shared
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn clear_sink(&self) {
        *self
            .shared
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<B: HardwareBackend> Drop for JoystickListener<B> {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

/// Everything the polling thread needs. Moved into the thread on `start()`.
struct PollLoop<B: HardwareBackend> {
    device: Arc<Mutex<DeviceSlot<B>>>,
    history: Arc<SampleHistory>,
    handlers: Arc<Mutex<HandlerRegistry>>,
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    shape: SampleShape,
}

impl<B: HardwareBackend> PollLoop<B> {
    #[inline]
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn run(self) {
        debug!("polling loop entered");
        while self.is_running() {
            self.cycle();
            if !self.is_running() {
                break;
            }
            thread::sleep(self.shared.settings().poll_interval());
        }
        debug!("polling loop exited");
    }

    fn cycle(&self) {
        let polled = lock(&self.device).poll();
        // Settings are read after the poll so a setter call that precedes new input
        // applies to that input.
        let config = self.shared.settings();
        let current = match polled {
            Ok(sample) => sample,
            Err(e) if e.is_device_lost() => {
                warn!(error = %e, "joystick input lost");
                self.shared.note(LifecycleNote::DeviceLost);
                self.reacquire(&config);
                return;
            }
            Err(e) => {
                debug!(error = %e, "poll failed, skipping cycle");
                return;
            }
        };

        let handlers = lock(&self.handlers).snapshot();
        let changes = diff::diff(
            &self.history.previous(),
            &self.history.reported(),
            &current,
            self.shape,
            config.axis_threshold,
            handlers.scans(),
        );
        self.dispatch(&changes, &current, &config, &handlers);
        self.history.advance(current);
    }

    /// Deliver one cycle's events. Returns early once the listener has been stopped.
    fn dispatch(
        &self,
        changes: &SampleDiff,
        current: &RawDeviceSample,
        config: &ListenerConfig,
        handlers: &DispatchSet,
    ) {
        let mirror = self.shared.mirror(config.silent);

        for event in &changes.transitions {
            if !self.is_running() {
                return;
            }
            trace!(button = event.button_id, pressed = event.pressed, "button");
            handlers.emit_button(event);
            mirror.emit(LogRecord::Button(*event));
        }

        for event in &changes.held {
            if !self.is_running() {
                return;
            }
            handlers.emit_held(event);
            mirror.emit(LogRecord::Held(*event));
        }

        if changes.axes_changed && self.is_running() {
            let event = AxisEvent {
                axes: config
                    .normalizer()
                    .apply(current, self.shape, config.normalize),
                pov: canonical_pov(current.pov),
                direction: PovDirection::from_raw(current.pov),
            };
            self.history.mark_reported(*current);
            trace!(?event, "axis");
            handlers.emit_axis(&event);
            mirror.emit(LogRecord::Axis(event));
        }
    }

    /// Retry acquisition until it succeeds or the listener is stopped.
    fn reacquire(&self, config: &ListenerConfig) {
        lock(&self.device).release();
        let mut attempts: u64 = 0;
        while self.is_running() {
            attempts += 1;
            let result = lock(&self.device).acquire();
            match result {
                Ok(()) => {
                    info!(attempts, "joystick reacquired");
                    self.shared.note(LifecycleNote::Reacquired);
                    return;
                }
                Err(e) => trace!(attempts, error = %e, "reacquisition attempt failed"),
            }
            thread::sleep(config.reacquire_interval());
        }
        debug!(attempts, "reacquisition abandoned: listener stopped");
    }
}
