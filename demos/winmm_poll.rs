//! Polls the first WinMM joystick and prints every event in the classic console format.

#[cfg(target_os = "windows")]
fn main() {
    use joylisten::backends::windows::WinMmBackend;
    use joylisten::{JoystickListener, LineSink, SilentMode};
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let listener = JoystickListener::new(WinMmBackend::first());
    listener.set_silent_mode(SilentMode::VERBOSE);
    listener.set_sink(LineSink::stdout());

    if listener.init().is_err() {
        return;
    }
    listener.calibrate();
    listener.start().expect("start polling");
    std::thread::sleep(Duration::from_secs(30));
    listener.stop();
}

#[cfg(not(target_os = "windows"))]
fn main() {
    eprintln!("winmm_poll only runs on Windows");
}
