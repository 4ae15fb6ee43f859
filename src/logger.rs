//! Optional event mirroring.
//!
//! A listener may be given an [`EventSink`]; every dispatched event (and lifecycle notes
//! such as "thread started") is then also written there, subject to [`SilentMode`].
//! Mirroring never affects handler delivery: a missing or failing sink is ignored.
//!
//! Three sinks are provided:
//! - [`TracingSink`]: forwards records as `tracing` events on target `joylisten::events`.
//! - [`LineSink`]: plain text lines to any `Write` (stdout, a file, a `Vec<u8>`).
//! - [`JsonSink`]: one JSON object per line.

use crate::event::{AxisEvent, AxisValues, ButtonEvent, HeldEvent};
use crate::lock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Lifecycle milestones worth mirroring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleNote {
    Initialized,
    InitFailed,
    Started,
    Stopped,
    Calibrated,
    Reset,
    DeviceLost,
    Reacquired,
}

impl fmt::Display for LifecycleNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleNote::Initialized => "Joystick initialized.",
            LifecycleNote::InitFailed => "Joystick not found.",
            LifecycleNote::Started => "Listening thread started.",
            LifecycleNote::Stopped => "Listening thread stopped.",
            LifecycleNote::Calibrated => "Joystick center calibrated.",
            LifecycleNote::Reset => "Joystick reset.",
            LifecycleNote::DeviceLost => "Joystick input lost, reacquiring.",
            LifecycleNote::Reacquired => "Joystick reacquired.",
        })
    }
}

/// One mirrored line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum LogRecord {
    Button(ButtonEvent),
    Held(HeldEvent),
    Axis(AxisEvent),
    Lifecycle(LifecycleNote),
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Button(e) => write!(
                f,
                "[Button] {} {}",
                e.button_id,
                if e.pressed { "pressed" } else { "released" }
            ),
            LogRecord::Held(e) => write!(f, "[Button Held] {} is being held down", e.button_id),
            LogRecord::Axis(e) => {
                f.write_str("[Axis] ")?;
                match e.axes {
                    AxisValues::Raw { x, y, z, rz } => {
                        write!(f, "  X : {x:>6}  Y : {y:>6}  Z : {z:>6}")?;
                        if let Some(rz) = rz {
                            write!(f, "  RZ : {rz:>6}")?;
                        }
                    }
                    AxisValues::Normalized { x, y, z, rz } => {
                        write!(f, "  X : {x:>6.3}  Y : {y:>6.3}  Z : {z:>6.3}")?;
                        if let Some(rz) = rz {
                            write!(f, "  RZ : {rz:>6.3}")?;
                        }
                    }
                }
                write!(f, "  Pov : {:>6}  PovDir : {:>6}", e.pov, e.direction)
            }
            LogRecord::Lifecycle(note) => write!(f, "[Listener] {note}"),
        }
    }
}

/// Per-category mirroring switches. `true` silences the category.
///
/// Held-button lines are only written when both `button` and `button_held` are off.
/// Lifecycle notes follow `button`, except calibration which follows `axis`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilentMode {
    pub axis: bool,
    pub button: bool,
    pub button_held: bool,
}

impl SilentMode {
    pub const SILENT: SilentMode = SilentMode {
        axis: true,
        button: true,
        button_held: true,
    };

    pub const VERBOSE: SilentMode = SilentMode {
        axis: false,
        button: false,
        button_held: false,
    };

    pub fn allows(&self, record: &LogRecord) -> bool {
        match record {
            LogRecord::Axis(_) | LogRecord::Lifecycle(LifecycleNote::Calibrated) => !self.axis,
            LogRecord::Button(_) | LogRecord::Lifecycle(_) => !self.button,
            LogRecord::Held(_) => !self.button && !self.button_held,
        }
    }
}

impl Default for SilentMode {
    fn default() -> Self {
        SilentMode::SILENT
    }
}

/// Write-only destination for mirrored records.
pub trait EventSink: Send + Sync {
    fn record(&self, record: &LogRecord);
}

/// Sink + filter, resolved once per poll cycle.
#[derive(Clone, Default)]
pub(crate) struct Mirror {
    sink: Option<Arc<dyn EventSink>>,
    silent: SilentMode,
}

impl Mirror {
    pub(crate) fn new(sink: Option<Arc<dyn EventSink>>, silent: SilentMode) -> Self {
        Self { sink, silent }
    }

    #[inline]
    pub(crate) fn emit(&self, record: LogRecord) {
        if let Some(sink) = &self.sink {
            if self.silent.allows(&record) {
                sink.record(&record);
            }
        }
    }
}

/// Forwards records to `tracing` at INFO.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, record: &LogRecord) {
        tracing::info!(target: "joylisten::events", "{record}");
    }
}

/// Text lines in the classic console format.
pub struct LineSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl LineSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> EventSink for LineSink<W> {
    fn record(&self, record: &LogRecord) {
        let mut out = lock(&self.out);
        if let Err(e) = writeln!(out, "{record}") {
            tracing::debug!(error = %e, "event sink write failed");
        }
    }
}

/// One JSON object per line, e.g. `{"kind":"button","event":{"button_id":5,"pressed":true}}`.
pub struct JsonSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for JsonSink<W> {
    fn record(&self, record: &LogRecord) {
        let mut out = lock(&self.out);
        let written = serde_json::to_writer(&mut *out, record)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"));
        if let Err(e) = written {
            tracing::debug!(error = %e, "event sink write failed");
        }
    }
}
