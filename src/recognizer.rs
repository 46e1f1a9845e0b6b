use crate::error::{AddMessage, Error};
use crate::evdev::EvdevSource;
use crate::gestures::{Gesture, Resolution};
use crate::one_finger::{GestureSink, OneFingerMachine};
use crate::tracker::{FingerTracker, RawSample};
use crate::utils::wake::{Waker, Wakeup};
use std::os::fd::BorrowedFd;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Without readiness for this long the producer waits without a timeout.
pub const IDLE_TIMEOUT: Duration = Duration::from_millis(300);
/// Bounded wait that keeps timer driven transitions firing.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Where raw touch frames come from.
pub trait TouchSource {
    fn resolution(&self) -> Resolution;

    /// A descriptor that polls readable when a frame may be available.
    fn readiness(&self) -> Option<BorrowedFd<'_>> {
        None
    }

    /// Data is buffered in user space, so the readiness descriptor may stay
    /// quiet although a frame can be read.
    fn has_pending(&self) -> bool {
        false
    }

    /// `Ok(None)` means no complete frame was available. Errors are fatal.
    fn read_frame(&mut self, now: Instant) -> Result<Option<Vec<RawSample>>, Error>;

    fn shutdown(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerConfig {
    /// `None` picks the first touchscreen under `/dev/input`.
    pub device: Option<PathBuf>,
    pub grab: bool,
}

impl Default for RecognizerConfig {
    fn default() -> RecognizerConfig {
        RecognizerConfig {
            device: None,
            grab: true,
        }
    }
}

/// The queue shared between the producer thread and the consumer.
#[derive(Debug, Clone, Default)]
pub struct GestureQueue {
    gestures: Arc<Mutex<Vec<Gesture>>>,
}

impl GestureQueue {
    pub fn new() -> GestureQueue {
        GestureQueue::default()
    }

    fn lock(&self) -> MutexGuard<Vec<Gesture>> {
        self.gestures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes everything queued so far, leaving the queue empty.
    pub fn drain(&self) -> Vec<Gesture> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GestureSink for GestureQueue {
    fn push(&mut self, gesture: Gesture) {
        self.lock().push(gesture);
    }
}

/// One recognition cycle: tracker first, then the single finger machine.
pub struct Pipeline<K: GestureSink> {
    tracker: FingerTracker,
    machine: OneFingerMachine<K>,
}

impl<K: GestureSink> Pipeline<K> {
    pub fn new(sink: K, native: Resolution) -> Pipeline<K> {
        Pipeline {
            tracker: FingerTracker::new(),
            machine: OneFingerMachine::new(sink, native),
        }
    }

    pub fn set_expected_resolution(&mut self, expected: Resolution) {
        self.machine.set_expected_resolution(expected);
    }

    pub fn machine(&self) -> &OneFingerMachine<K> {
        &self.machine
    }

    pub fn step(&mut self, frame: Option<&[RawSample]>, now: Instant) {
        let events = self.tracker.process(frame, now);
        match events.as_slice() {
            [] => self.machine.tick(now),
            [event] => self.machine.process(*event, now),
            _ => self.machine.reset(),
        }
    }
}

struct Shared {
    running: AtomicBool,
    waker: Waker,
    window_x: AtomicI32,
    window_y: AtomicI32,
}

impl Shared {
    fn window(&self, native: Resolution) -> Resolution {
        match (
            self.window_x.load(Ordering::SeqCst),
            self.window_y.load(Ordering::SeqCst),
        ) {
            (0, 0) => native,
            (x, y) => Resolution { x, y },
        }
    }
}

fn produce<S: TouchSource>(mut source: S, queue: GestureQueue, shared: Arc<Shared>) -> S {
    let native = source.resolution();
    let mut pipeline = Pipeline::new(queue, native);
    let mut window = native;
    let mut last_action = Instant::now();
    while shared.running.load(Ordering::SeqCst) {
        let expected = shared.window(native);
        if expected != window {
            pipeline.set_expected_resolution(expected);
            window = expected;
        }
        if !source.has_pending() {
            let timeout = if source.readiness().is_some() && last_action.elapsed() > IDLE_TIMEOUT {
                None
            } else {
                Some(POLL_INTERVAL)
            };
            match shared.waker.wait(source.readiness(), timeout) {
                Ok(Wakeup::Woken) => continue,
                Ok(Wakeup::Ready) => last_action = Instant::now(),
                Ok(Wakeup::TimedOut) => {}
                Err(error) => {
                    warn!(%error, "waiting for touch input");
                    thread::sleep(POLL_INTERVAL);
                }
            }
        }
        let now = Instant::now();
        match source.read_frame(now) {
            Ok(frame) => pipeline.step(frame.as_deref(), now),
            Err(error) => {
                error!(%error, "touch source failed, stopping recognition");
                break;
            }
        }
    }
    source
}

/// Joins the producer even when it could not be woken; a producer in a
/// bounded wait still sees `running == false` on its next cycle.
fn join_producer<S>(producer: JoinHandle<S>, woken: Result<(), Error>) -> Option<S> {
    if let Err(error) = woken {
        warn!(%error, "can't wake the recognizer thread, joining anyway");
    }
    match producer.join() {
        Ok(source) => Some(source),
        Err(error) => {
            error!("recognizer thread panicked: {:?}", error);
            None
        }
    }
}

/// Runs recognition on a background thread and queues every gesture for
/// `fetch_gestures`.
pub struct GestureRecognizer<S: TouchSource + Send + 'static> {
    source: Option<S>,
    resolution: Resolution,
    queue: GestureQueue,
    shared: Arc<Shared>,
    producer: Option<JoinHandle<S>>,
    shut_down: bool,
}

impl GestureRecognizer<EvdevSource> {
    /// Opens the touchscreen selected by `config`.
    pub fn init(config: &RecognizerConfig) -> Result<GestureRecognizer<EvdevSource>, Error> {
        let source = EvdevSource::open(config)?;
        info!("{}", source.capabilities());
        GestureRecognizer::new(source)
    }
}

impl<S: TouchSource + Send + 'static> GestureRecognizer<S> {
    pub fn new(source: S) -> Result<GestureRecognizer<S>, Error> {
        let shared = Shared {
            running: AtomicBool::new(false),
            waker: Waker::new()?,
            window_x: AtomicI32::new(0),
            window_y: AtomicI32::new(0),
        };
        Ok(GestureRecognizer {
            resolution: source.resolution(),
            source: Some(source),
            queue: GestureQueue::new(),
            shared: Arc::new(shared),
            producer: None,
            shut_down: false,
        })
    }

    /// The native resolution of the touch source.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Sets the coordinate space gestures are reported in. Takes effect on
    /// the next cycle when already running.
    pub fn window_size(&self, x: i32, y: i32) {
        self.shared.window_x.store(x, Ordering::SeqCst);
        self.shared.window_y.store(y, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.producer.is_some()
    }

    pub fn start(&mut self) -> Result<(), Error> {
        if self.producer.is_some() {
            return Err(Error::AlreadyStarted);
        }
        let source = match (self.shut_down, self.source.take()) {
            (false, Some(source)) => source,
            (_, source) => {
                self.source = source;
                return Err(Error::AlreadyShutDown);
            }
        };
        self.shared.running.store(true, Ordering::SeqCst);
        let queue = self.queue.clone();
        let shared = self.shared.clone();
        let producer = thread::Builder::new()
            .name("gesture-recognizer".to_string())
            .spawn(move || produce(source, queue, shared))
            .add_message("can't spawn the recognizer thread")?;
        self.producer = Some(producer);
        debug!("gesture recognizer started");
        Ok(())
    }

    /// Stops the producer and releases the touch source. Later calls do
    /// nothing.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(producer) = self.producer.take() {
            let woken = self.shared.waker.wake();
            if let Some(source) = join_producer(producer, woken) {
                self.source = Some(source);
            }
        }
        if let Some(source) = self.source.as_mut() {
            source.shutdown()?;
        }
        debug!("gesture recognizer shut down");
        Ok(())
    }

    /// Returns the gestures recognized since the last call. Never blocks
    /// longer than the producer's append.
    pub fn fetch_gestures(&self) -> Vec<Gesture> {
        self.queue.drain()
    }
}

impl<S: TouchSource + Send + 'static> Drop for GestureRecognizer<S> {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(%error, "shutting down the gesture recognizer");
        }
    }
}
