//! Handler registration and dispatch.
//!
//! Handlers are registered per event kind and identified by a [`HandlerId`]. Several
//! handlers may share a kind; registering one never replaces another. A kind with no
//! handlers is "absent", and the polling loop skips the matching scan entirely.
//!
//! The polling thread takes a [`DispatchSet`] snapshot of the registry at the start of
//! each cycle and releases the registry lock before invoking anything, so a handler may
//! register, remove, or stop the listener without deadlocking.

use crate::diff::ScanRequest;
use crate::event::{AxisEvent, ButtonEvent, HeldEvent};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type AxisHandler = Arc<dyn Fn(&AxisEvent) + Send + Sync>;
pub type ButtonHandler = Arc<dyn Fn(&ButtonEvent) + Send + Sync>;
pub type ButtonHeldHandler = Arc<dyn Fn(&HeldEvent) + Send + Sync>;

/// Token returned on registration; pass it to `remove_handler` to deregister.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

enum HandlerEntry {
    Axis(AxisHandler),
    Button(ButtonHandler),
    ButtonHeld(ButtonHeldHandler),
}

/// All registered handlers. Ids grow monotonically, so iteration is registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    next_id: u64,
    handlers: BTreeMap<HandlerId, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, entry: HandlerEntry) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, entry);
        id
    }

    pub fn add_axis(&mut self, handler: impl Fn(&AxisEvent) + Send + Sync + 'static) -> HandlerId {
        self.insert(HandlerEntry::Axis(Arc::new(handler)))
    }

    pub fn add_button(
        &mut self,
        handler: impl Fn(&ButtonEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.insert(HandlerEntry::Button(Arc::new(handler)))
    }

    pub fn add_button_held(
        &mut self,
        handler: impl Fn(&HeldEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        self.insert(HandlerEntry::ButtonHeld(Arc::new(handler)))
    }

    /// Unregister a handler. Returns `false` if the id was unknown (already removed).
    pub fn remove(&mut self, id: HandlerId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    /// Clone the current handlers out of the registry.
    pub fn snapshot(&self) -> DispatchSet {
        let mut set = DispatchSet::default();
        for entry in self.handlers.values() {
            match entry {
                HandlerEntry::Axis(h) => set.axis.push(Arc::clone(h)),
                HandlerEntry::Button(h) => set.button.push(Arc::clone(h)),
                HandlerEntry::ButtonHeld(h) => set.held.push(Arc::clone(h)),
            }
        }
        set
    }
}

/// Handlers active for one poll cycle.
#[derive(Default)]
pub struct DispatchSet {
    axis: Vec<AxisHandler>,
    button: Vec<ButtonHandler>,
    held: Vec<ButtonHeldHandler>,
}

impl DispatchSet {
    /// Scans worth running this cycle: only those with at least one handler.
    pub fn scans(&self) -> ScanRequest {
        ScanRequest {
            buttons: !self.button.is_empty(),
            held: !self.held.is_empty(),
            axes: !self.axis.is_empty(),
        }
    }

    pub fn emit_button(&self, event: &ButtonEvent) {
        for handler in &self.button {
            handler(event);
        }
    }

    pub fn emit_held(&self, event: &HeldEvent) {
        for handler in &self.held {
            handler(event);
        }
    }

    pub fn emit_axis(&self, event: &AxisEvent) {
        for handler in &self.axis {
            handler(event);
        }
    }
}
