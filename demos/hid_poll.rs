//! Polls a HID joystick selected by vendor/product id, decoded with a TOML report layout.
//!
//! ```text
//! cargo run --example hid_poll -- 044f b10a layout.toml
//! ```

use joylisten::backends::hid::{DeviceSelector, HidBackend, ReportLayout};
use joylisten::{JoystickListener, ListenerConfig, SilentMode, TracingSink};
use std::time::Duration;
use std::{env, fs, thread};
use tracing_subscriber::EnvFilter;

fn parse_hex(arg: Option<String>, what: &str) -> u16 {
    let text = arg.unwrap_or_else(|| panic!("missing {what}"));
    u16::from_str_radix(text.trim_start_matches("0x"), 16)
        .unwrap_or_else(|e| panic!("bad {what} {text:?}: {e}"))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = env::args().skip(1);
    let vendor_id = parse_hex(args.next(), "vendor id");
    let product_id = parse_hex(args.next(), "product id");
    let layout_path = args.next().expect("missing layout path");
    let layout = ReportLayout::from_toml_str(&fs::read_to_string(layout_path).expect("read layout"))
        .expect("parse layout");

    let backend = HidBackend::new(
        DeviceSelector::VidPid {
            vendor_id,
            product_id,
        },
        layout,
    );
    let config = ListenerConfig {
        silent: SilentMode {
            button_held: true,
            ..SilentMode::VERBOSE
        },
        ..ListenerConfig::default()
    };
    let listener = JoystickListener::with_config(backend, config);
    listener.set_sink(TracingSink);

    if let Err(e) = listener.init() {
        eprintln!("{e}");
        return;
    }
    listener.calibrate();
    listener.start().expect("start polling");

    println!("Polling {} for 30s...", listener.device_info());
    thread::sleep(Duration::from_secs(30));
    listener.stop();
}
