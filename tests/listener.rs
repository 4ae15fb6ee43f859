use joylisten::backends::virtual_input::{VirtualBackend, VirtualController};
use joylisten::logger::LifecycleNote;
use joylisten::{
    AxisEvent, AxisValues, BackendError, ButtonEvent, EventSink, JoystickListener, ListenerConfig,
    ListenerError, ListenerState, LogRecord, PovDirection, RawDeviceSample, SilentMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> ListenerConfig {
    ListenerConfig {
        poll_interval_ms: 2,
        reacquire_interval_ms: 2,
        ..ListenerConfig::default()
    }
}

fn listener(name: &str) -> (JoystickListener<VirtualBackend>, VirtualController) {
    let (backend, stick) = VirtualBackend::new(name);
    (JoystickListener::with_config(backend, fast_config()), stick)
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Wait until every queued step is consumed and the cycle that consumed the last one
/// has finished dispatching.
fn drain(stick: &VirtualController) {
    wait_until("queue drained", || stick.pending() == 0);
    let polled = stick.poll_count();
    wait_until("next cycle", || stick.poll_count() > polled);
}

fn collect<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |item| sink.lock().unwrap().push(item))
}

#[derive(Default)]
struct Recorder(Mutex<Vec<LogRecord>>);

impl EventSink for Recorder {
    fn record(&self, record: &LogRecord) {
        self.0.lock().unwrap().push(*record);
    }
}

impl Recorder {
    fn lifecycle(&self) -> Vec<LifecycleNote> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                LogRecord::Lifecycle(n) => Some(*n),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn calibrated_listener_reports_only_real_changes() {
    let (l, stick) = listener("e2e");
    let (axes, on_axis) = collect::<AxisEvent>();
    let (buttons, on_button) = collect::<ButtonEvent>();
    l.add_axis_handler(move |e| on_axis(*e));
    l.add_button_handler(move |e| on_button(*e));

    let rest = RawDeviceSample::default().with_axes(32_768, 32_768, 0);
    stick.set_current(rest);
    l.init().unwrap();
    assert!(l.calibrate());
    assert_eq!(l.baseline().map(|b| b.sample), Some(rest));

    l.start().unwrap();
    drain(&stick);
    assert!(axes.lock().unwrap().is_empty());
    assert!(buttons.lock().unwrap().is_empty());

    let moved = rest.with_axes(40_000, 32_768, 0);
    stick.push_sample(moved);
    drain(&stick);
    {
        let axes = axes.lock().unwrap();
        assert_eq!(axes.len(), 1);
        assert_eq!(
            axes[0].axes,
            AxisValues::Raw {
                x: 40_000,
                y: 32_768,
                z: 65_535,
                rz: Some(0),
            }
        );
        assert_eq!(axes[0].direction, PovDirection::Center);
    }
    assert!(buttons.lock().unwrap().is_empty());

    stick.push_sample(moved.with_button(4, true));
    drain(&stick);
    l.stop();

    assert_eq!(axes.lock().unwrap().len(), 1);
    assert_eq!(
        *buttons.lock().unwrap(),
        vec![ButtonEvent {
            button_id: 5,
            pressed: true,
        }]
    );
}

#[test]
fn transient_failure_skips_only_its_cycle() {
    let (l, stick) = listener("transient");
    let (axes, on_axis) = collect::<AxisEvent>();
    let (buttons, on_button) = collect::<ButtonEvent>();
    l.add_axis_handler(move |e| on_axis(*e));
    l.add_button_handler(move |e| on_button(*e));

    let rest = RawDeviceSample::default().with_axes(32_768, 32_768, 0);
    stick.set_current(rest);
    l.init().unwrap();
    assert!(l.calibrate());
    let polls_before = stick.poll_count();

    stick.push_sample(rest.with_button(0, true));
    stick.push_transient_failure();
    stick.push_sample(rest);
    l.start().unwrap();
    drain(&stick);
    l.stop();

    // A failed cycle that touched "previous" would drop the release or repeat the press.
    assert_eq!(
        *buttons.lock().unwrap(),
        vec![
            ButtonEvent {
                button_id: 1,
                pressed: true,
            },
            ButtonEvent {
                button_id: 1,
                pressed: false,
            },
        ]
    );
    assert!(axes.lock().unwrap().is_empty());
    assert!(stick.poll_count() >= polls_before + 3);
}

#[test]
fn slow_drift_is_reported_once_it_exceeds_the_threshold() {
    let (l, stick) = listener("drift");
    l.set_axis_threshold(100);
    let (xs, on_axis) = collect::<f64>();
    l.add_axis_handler(move |e| on_axis(e.axes.x()));

    let rest = RawDeviceSample::default().with_axes(0, 32_768, 0);
    stick.set_current(rest);
    l.init().unwrap();
    assert!(l.calibrate());
    stick.push_samples((1..=60).map(|step| rest.with_axes(step * 50, 32_768, 0)));
    l.start().unwrap();
    drain(&stick);
    l.stop();

    let xs = xs.lock().unwrap();
    assert!(!xs.is_empty(), "50-unit steps under a 100-unit threshold were never reported");
    assert_eq!(xs[0], 150.0);
    assert!(xs.windows(2).all(|w| w[1] - w[0] > 100.0));
    assert_eq!(xs.last().copied(), Some(3_000.0));
}

#[test]
fn lifecycle_calls_are_idempotent() {
    let (l, _stick) = listener("lifecycle");
    assert_eq!(l.state(), ListenerState::Uninitialized);
    l.stop();
    assert_eq!(l.state(), ListenerState::Uninitialized);
    assert!(matches!(l.start(), Err(ListenerError::NotInitialized)));
    assert!(!l.calibrate());

    l.init().unwrap();
    assert!(l.is_initialized());
    l.start().unwrap();
    l.start().unwrap();
    assert!(l.is_running());
    assert!(matches!(l.init(), Err(ListenerError::AlreadyRunning)));

    l.stop();
    l.stop();
    assert_eq!(l.state(), ListenerState::Stopped);
    assert!(l.is_initialized());

    l.start().unwrap();
    assert!(l.is_running());
    l.stop();
    assert!(!l.is_running());
}

#[test]
fn failed_init_can_be_retried() {
    let (l, stick) = listener("absent");
    stick.set_available(false);
    match l.init() {
        Err(ListenerError::Acquisition(BackendError::NotFound)) => {}
        other => panic!("unexpected init result: {other:?}"),
    }
    assert_eq!(l.state(), ListenerState::Uninitialized);
    assert!(matches!(l.start(), Err(ListenerError::NotInitialized)));

    stick.set_available(true);
    l.init().unwrap();
    assert_eq!(l.state(), ListenerState::Initialized);
}

#[test]
fn handler_can_stop_its_own_listener() {
    let (l, stick) = listener("self-stop");
    let stopper = l.stop_handle();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    l.add_button_handler(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            stopper.stop();
        }
    });

    l.init().unwrap();
    l.start().unwrap();
    stick.push_sample(RawDeviceSample::default().with_button(0, true));

    wait_until("self stop", || !l.is_running());
    assert_eq!(l.state(), ListenerState::Stopped);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    l.stop();
    l.start().unwrap();
    assert!(l.is_running());
    l.stop();
}

#[test]
fn restart_waits_for_a_self_stopped_thread() {
    let (l, stick) = listener("restart");
    let stopper = l.stop_handle();
    let presses = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    {
        let (presses, active, peak) = (presses.clone(), active.clone(), peak.clone());
        l.add_button_handler(move |e| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            if e.pressed && presses.fetch_add(1, Ordering::SeqCst) == 0 {
                stopper.stop();
                thread::sleep(Duration::from_millis(150));
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }

    l.init().unwrap();
    stick.set_current(RawDeviceSample::default().with_button(1, true));
    l.start().unwrap();
    wait_until("self stop", || !l.is_running());

    l.start().unwrap();
    let polled = stick.poll_count();
    wait_until("restarted polling", || stick.poll_count() >= polled + 3);
    l.stop();

    assert_eq!(presses.load(Ordering::SeqCst), 1);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_cannot_restart_its_own_stopping_thread() {
    let (l, stick) = listener("restart-inside");
    let l = Arc::new(l);
    let weak = Arc::downgrade(&l);
    let (results, on_result) = collect::<bool>();
    l.add_button_handler(move |_| {
        if let Some(l) = weak.upgrade() {
            l.stop();
            on_result(matches!(l.start(), Err(ListenerError::Stopping)));
        }
    });

    l.init().unwrap();
    stick.set_current(RawDeviceSample::default().with_button(0, true));
    l.start().unwrap();
    wait_until("handler ran", || !results.lock().unwrap().is_empty());
    wait_until("self stop", || !l.is_running());
    assert_eq!(*results.lock().unwrap(), vec![true]);

    l.start().unwrap();
    assert!(l.is_running());
    l.stop();
}

#[test]
fn dropping_a_self_stopped_listener_joins_its_thread() {
    let (l, stick) = listener("drop-self-stopped");
    let stopper = l.stop_handle();
    let finished = Arc::new(AtomicUsize::new(0));
    let done = Arc::clone(&finished);
    l.add_button_handler(move |_| {
        stopper.stop();
        thread::sleep(Duration::from_millis(100));
        done.fetch_add(1, Ordering::SeqCst);
    });

    l.init().unwrap();
    stick.set_current(RawDeviceSample::default().with_button(0, true));
    l.start().unwrap();
    wait_until("self stop", || !l.is_running());
    drop(l);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn held_buttons_fire_every_cycle() {
    let (l, stick) = listener("held");
    let (held, on_held) = collect::<u8>();
    l.add_button_held_handler(move |e| on_held(e.button_id));
    l.init().unwrap();
    stick.set_current(RawDeviceSample::default().with_button(2, true).with_button(9, true));
    l.start().unwrap();
    wait_until("three cycles", || held.lock().unwrap().len() >= 6);
    l.stop();

    let held = held.lock().unwrap();
    assert_eq!(&held[..4], &[3, 10, 3, 10]);
}

#[test]
fn removed_handler_is_not_called() {
    let (l, stick) = listener("remove");
    let (first, on_first) = collect::<u8>();
    let (second, on_second) = collect::<u8>();
    let id = l.add_button_handler(move |e: &ButtonEvent| on_first(e.button_id));
    l.add_button_handler(move |e: &ButtonEvent| on_second(e.button_id));
    assert!(l.remove_handler(id));
    assert!(!l.remove_handler(id));

    l.init().unwrap();
    l.start().unwrap();
    stick.push_sample(RawDeviceSample::default().with_button(0, true));
    wait_until("dispatch", || !second.lock().unwrap().is_empty());
    l.stop();
    assert!(first.lock().unwrap().is_empty());
}

#[test]
fn normalize_toggle_applies_to_next_event() {
    let (l, stick) = listener("normalize");
    let (axes, on_axis) = collect::<AxisValues>();
    l.add_axis_handler(move |e| on_axis(e.axes));
    l.init().unwrap();
    l.start().unwrap();

    stick.push_sample(RawDeviceSample::default().with_axes(0, 65_535, 65_535));
    wait_until("raw event", || axes.lock().unwrap().len() == 1);
    l.set_normalize(true);
    stick.push_sample(RawDeviceSample::default().with_axes(65_535, 0, 65_535));
    wait_until("normalized event", || axes.lock().unwrap().len() == 2);
    l.stop();

    let axes = axes.lock().unwrap();
    assert!(!axes[0].is_normalized());
    assert_eq!(axes[0].z(), 0.0);
    assert!(axes[1].is_normalized());
    assert_eq!((axes[1].x(), axes[1].y(), axes[1].z()), (1.0, -1.0, 0.0));
}

#[test]
fn pov_changes_map_to_directions() {
    let (l, stick) = listener("pov");
    let (events, on_axis) = collect::<(u32, PovDirection)>();
    l.add_axis_handler(move |e| on_axis((e.pov, e.direction)));
    l.init().unwrap();
    stick.push_samples([
        RawDeviceSample::default().with_pov(35_999),
        RawDeviceSample::default().with_pov(u32::MAX),
        RawDeviceSample::default().with_pov(0xFFFF),
    ]);
    l.start().unwrap();
    wait_until("queue drained", || stick.pending() == 0 && stick.poll_count() >= 4);
    l.stop();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (35_999, PovDirection::NorthWest),
            (0xFFFF, PovDirection::Center),
        ]
    );
}

#[test]
fn device_loss_is_reacquired() {
    let (l, stick) = listener("flaky");
    let recorder = Arc::new(Recorder::default());
    l.set_shared_sink(recorder.clone());
    l.set_silent_mode(SilentMode::VERBOSE);
    let (buttons, on_button) = collect::<ButtonEvent>();
    l.add_button_handler(move |e| on_button(*e));

    l.init().unwrap();
    stick.push_transient_failure();
    stick.push_device_lost();
    stick.push_sample(RawDeviceSample::default().with_button(1, true));
    l.start().unwrap();
    wait_until("event after reacquire", || !buttons.lock().unwrap().is_empty());
    l.stop();

    assert!(stick.acquire_count() >= 2);
    assert_eq!(buttons.lock().unwrap()[0].button_id, 2);
    let notes = recorder.lifecycle();
    let lost = notes.iter().position(|n| *n == LifecycleNote::DeviceLost);
    let back = notes.iter().position(|n| *n == LifecycleNote::Reacquired);
    assert!(matches!((lost, back), (Some(a), Some(b)) if a < b));
}

#[test]
fn stop_interrupts_reacquisition() {
    let (l, stick) = listener("gone");
    l.init().unwrap();
    stick.set_available(false);
    stick.push_device_lost();
    l.start().unwrap();
    wait_until("retries", || stick.acquire_count() >= 4);

    let started = Instant::now();
    l.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(l.state(), ListenerState::Stopped);

    let attempts = stick.acquire_count();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(stick.acquire_count(), attempts);
}

#[test]
fn sink_respects_silent_mode() {
    let (l, stick) = listener("sink");
    let recorder = Arc::new(Recorder::default());
    l.set_shared_sink(recorder.clone());
    l.add_button_handler(|_| {});
    l.init().unwrap();
    l.start().unwrap();

    stick.push_sample(RawDeviceSample::default().with_button(0, true));
    wait_until("first dispatch", || stick.pending() == 0 && stick.poll_count() >= 2);
    assert!(recorder.0.lock().unwrap().is_empty());

    l.set_silent_mode(SilentMode {
        button: false,
        ..SilentMode::SILENT
    });
    stick.push_sample(RawDeviceSample::default());
    wait_until("release mirrored", || {
        recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .any(|r| matches!(r, LogRecord::Button(e) if !e.pressed))
    });
    l.stop();
    assert!(recorder.lifecycle().contains(&LifecycleNote::Stopped));
    let text: Vec<String> = recorder.0.lock().unwrap().iter().map(|r| r.to_string()).collect();
    assert!(text.contains(&"[Button] 1 released".to_string()));
}

#[test]
fn dropping_a_running_listener_stops_polling() {
    let (l, stick) = listener("drop");
    l.init().unwrap();
    l.start().unwrap();
    wait_until("polling", || stick.poll_count() >= 2);
    drop(l);

    let polls = stick.poll_count();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(stick.poll_count(), polls);
}
