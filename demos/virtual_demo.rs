//! Drives a listener with a scripted virtual stick and prints what it sees.
//!
//! Run with `RUST_LOG=joylisten=debug cargo run --example virtual_demo` for lifecycle logs.

use joylisten::backends::virtual_input::VirtualBackend;
use joylisten::{JoystickListener, LineSink, ListenerConfig, RawDeviceSample, SilentMode};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let (backend, stick) = VirtualBackend::new("Demo Virtual Stick");
    let config = ListenerConfig {
        normalize: true,
        silent: SilentMode {
            button_held: true,
            ..SilentMode::VERBOSE
        },
        ..ListenerConfig::default()
    };
    let listener = JoystickListener::with_config(backend, config);
    listener.set_sink(LineSink::stdout());

    listener.init().expect("virtual device is always available");

    listener.add_button_handler(|e| {
        println!("(handler) button {} {}", e.button_id, if e.pressed { "down" } else { "up" });
    });
    listener.add_axis_handler(|e| {
        println!(
            "(handler) x={:+.2} y={:+.2} throttle={:.2} hat={}",
            e.axes.x(),
            e.axes.y(),
            e.axes.z(),
            e.direction
        );
    });

    let rest = RawDeviceSample::default().with_axes(32_768, 32_768, 65_535);
    stick.set_current(rest);
    listener.calibrate();

    stick.push_samples([
        rest.with_axes(65_535, 32_768, 32_768),
        rest.with_button(0, true),
        rest.with_button(0, true).with_pov(9000),
        rest,
    ]);

    listener.start().expect("start polling");
    thread::sleep(Duration::from_millis(200));
    listener.stop();
}
