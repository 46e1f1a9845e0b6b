mod cli;

use anyhow::{Context, Result};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use touch_gestures::{EvdevSource, GestureRecognizer, RecognizerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME: Duration = Duration::from_micros(16_667);

static QUIT: AtomicBool = AtomicBool::new(false);

extern "C" fn request_quit(_: nix::libc::c_int) {
    QUIT.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(request_quit),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // the handler only stores to an atomic
        unsafe { sigaction(signal, &action) }
            .with_context(|| format!("can't install a handler for {}", signal))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = cli::parse()?;
    if args.capabilities {
        let source = EvdevSource::open(&RecognizerConfig {
            device: args.device,
            grab: false,
        })?;
        println!("{}", source.capabilities());
        return Ok(());
    }
    install_signal_handlers()?;
    let mut recognizer = GestureRecognizer::init(&RecognizerConfig {
        device: args.device.clone(),
        grab: args.grab,
    })
    .context("can't initialize the gesture recognizer")?;
    recognizer.window_size(args.width, args.height);
    recognizer.start()?;
    info!(width = args.width, height = args.height, "recognizing gestures");
    while !QUIT.load(Ordering::SeqCst) {
        for gesture in recognizer.fetch_gestures() {
            if args.only.map_or(true, |kind| gesture.kind() == kind) {
                println!("{:?}", gesture);
            }
        }
        thread::sleep(FRAME);
    }
    recognizer.shutdown()?;
    info!("bye");
    Ok(())
}
