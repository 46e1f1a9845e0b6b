use crate::classifier::{normalize_angle, polar_angle, Classifier, Motion};
use crate::gestures::{Gesture, Resolution, Scaler};
use crate::tracker::{TouchEvent, TouchEventType};
use crate::utils::timer::Timer;
use crate::utils::Position;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

pub const TAP_TIMEOUT: Duration = Duration::from_millis(300);
pub const DOUBLE_TAP_TIMEOUT: Duration = Duration::from_millis(200);
pub const DRAG_OR_HOLD_TIMEOUT: Duration = Duration::from_millis(200);
pub const HOLD_TIMEOUT: Duration = Duration::from_millis(800);
pub const SWIPE_DISTANCE: f32 = 10.0;
pub const DRAG_DISTANCE: f32 = 20.0;
const SWIPE_STEP: f32 = 5.0;
const DOUBLE_TAP_STEP: f32 = 2.0;
pub const HISTORY_SIZE: usize = 35;

/// Where recognized gestures go.
pub trait GestureSink {
    fn push(&mut self, gesture: Gesture);
}

impl GestureSink for Vec<Gesture> {
    fn push(&mut self, gesture: Gesture) {
        Vec::push(self, gesture);
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    Idle,
    Stroke,
    DragOrHold,
    DragOngoing,
    DoubleTapPossible,
    DoubleTapSwipeOngoing,
    DoubleTapCircularOngoing,
    SwipeOngoing,
    Hold,
}

/// Recognizes single-finger gestures from one touch event per cycle, or
/// from timers alone when a cycle produced no event.
pub struct OneFingerMachine<S: GestureSink> {
    sink: S,
    scaler: Scaler,
    state: State,
    start_event: Option<TouchEvent>,
    last_event: Option<TouchEvent>,
    history: VecDeque<TouchEvent>,
    classifier: Classifier,
    tap_timer: Timer,
    double_tap_timer: Timer,
    drag_or_hold_timer: Timer,
    hold_timer: Timer,
}

impl<S: GestureSink> OneFingerMachine<S> {
    pub fn new(sink: S, native: Resolution) -> OneFingerMachine<S> {
        OneFingerMachine {
            sink,
            scaler: Scaler::new(native),
            state: State::Idle,
            start_event: None,
            last_event: None,
            history: VecDeque::with_capacity(HISTORY_SIZE),
            classifier: Classifier::new(),
            tap_timer: Timer::new(),
            double_tap_timer: Timer::new(),
            drag_or_hold_timer: Timer::new(),
            hold_timer: Timer::new(),
        }
    }

    pub fn set_expected_resolution(&mut self, expected: Resolution) {
        self.scaler.set_expected(expected);
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn process(&mut self, event: TouchEvent, now: Instant) {
        match self.state {
            State::Idle => self.idle(&event, now),
            State::Stroke => self.stroke(&event, now),
            State::DragOrHold => self.drag_or_hold(&event),
            State::DragOngoing => {
                if event.kind == TouchEventType::Move {
                    let (x, y, dx, dy) = self.step_from_last(&event);
                    self.sink.push(Gesture::DragMove { x, y, dx, dy });
                }
            }
            State::DoubleTapPossible => self.double_tap_possible(&event),
            State::DoubleTapSwipeOngoing => {
                if event.kind == TouchEventType::Move
                    && self.distance_from_last(&event) >= DOUBLE_TAP_STEP
                {
                    let (x, y, dx, dy) = self.step_from_last(&event);
                    self.sink.push(Gesture::DoubleTapSwipeMove { x, y, dx, dy });
                }
            }
            State::DoubleTapCircularOngoing => {
                if event.kind == TouchEventType::Move
                    && self.distance_from_last(&event) > DOUBLE_TAP_STEP
                {
                    self.circular_move(&event, now);
                }
            }
            State::SwipeOngoing => {
                if event.kind == TouchEventType::Move
                    && self.distance_from_last(&event) > SWIPE_STEP
                {
                    let (x, y, dx, dy) = self.step_from_last(&event);
                    self.sink.push(Gesture::SwipeMove { x, y, dx, dy });
                } else if event.kind == TouchEventType::End {
                    let Position { x, y } = self.scaler.position(event.position);
                    self.sink.push(Gesture::SwipeEnd { x, y });
                    self.reset();
                }
            }
            State::Hold => self.reset(),
        }
        self.last_event = Some(event);
        if self.history.len() >= HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    /// Evaluates timers for a cycle without a new touch event.
    pub fn tick(&mut self, now: Instant) {
        let last_kind = self.last_event.map(|event| event.kind);
        let Position { x, y } = self.scaler.position(self.last_position());
        match self.state {
            State::Idle => self.reset(),
            State::Stroke => {
                if last_kind == Some(TouchEventType::Begin) {
                    if self.hold_timer.expired(now) {
                        self.set_state(State::Hold);
                    }
                } else if last_kind == Some(TouchEventType::End) && self.tap_timer.expired(now) {
                    self.sink.push(Gesture::Tap { x, y });
                    self.reset();
                }
            }
            State::DragOrHold => self.reset(),
            State::DragOngoing => {
                if last_kind == Some(TouchEventType::End) {
                    self.sink.push(Gesture::DragEnd { x, y });
                    self.reset();
                }
            }
            State::DoubleTapPossible => {
                if last_kind == Some(TouchEventType::End) && self.double_tap_timer.expired(now) {
                    self.sink.push(Gesture::DoubleTap { x, y });
                    self.reset();
                }
            }
            State::DoubleTapSwipeOngoing => {
                if last_kind == Some(TouchEventType::End) {
                    self.sink.push(Gesture::DoubleTapSwipeEnd { x, y });
                    self.reset();
                }
            }
            State::DoubleTapCircularOngoing => {
                if last_kind == Some(TouchEventType::End) {
                    self.sink.push(Gesture::DoubleTapCircularEnd { x, y });
                    self.reset();
                }
            }
            State::SwipeOngoing => {
                if last_kind == Some(TouchEventType::End) {
                    self.sink.push(Gesture::SwipeEnd { x, y });
                    self.reset();
                }
            }
            State::Hold => {
                self.sink.push(Gesture::Hold { x, y });
                self.reset();
            }
        }
    }

    /// Returns to `Idle`, emitting `TouchUp` when leaving any other state.
    pub fn reset(&mut self) {
        self.classifier.reset();
        self.tap_timer.stop();
        self.double_tap_timer.stop();
        self.drag_or_hold_timer.stop();
        self.hold_timer.stop();
        if self.state != State::Idle {
            let Position { x, y } = self.scaler.position(self.last_position());
            self.sink.push(Gesture::TouchUp { x, y });
        }
        self.set_state(State::Idle);
    }

    fn idle(&mut self, event: &TouchEvent, now: Instant) {
        if event.kind != TouchEventType::Begin {
            return;
        }
        self.start_event = Some(*event);
        self.tap_timer.start(TAP_TIMEOUT, now);
        self.drag_or_hold_timer.start(DRAG_OR_HOLD_TIMEOUT, now);
        self.hold_timer.start(HOLD_TIMEOUT, now);
        self.set_state(State::Stroke);
        let Position { x, y } = self.scaler.position(event.position);
        self.sink.push(Gesture::TouchDown { x, y });
    }

    fn stroke(&mut self, event: &TouchEvent, now: Instant) {
        let same_finger = Some(event.id) == self.start_id();
        if event.kind != TouchEventType::End && same_finger {
            self.tap_timer.stop();
            if self.last_event.map(|last| last.kind) != Some(TouchEventType::Move) {
                if self.drag_or_hold_timer.expired(now) {
                    self.set_state(State::DragOrHold);
                }
            } else if event.position.distance(self.start_position()) >= SWIPE_DISTANCE {
                let Position { x, y } = self.scaler.position(self.start_position());
                self.sink.push(Gesture::SwipeStart { x, y });
                self.set_state(State::SwipeOngoing);
            }
        } else if event.kind == TouchEventType::Begin && !same_finger {
            self.double_tap_timer.start(DOUBLE_TAP_TIMEOUT, now);
            self.set_state(State::DoubleTapPossible);
        }
    }

    fn drag_or_hold(&mut self, event: &TouchEvent) {
        if Some(event.id) != self.start_id() {
            self.reset();
            return;
        }
        if event.kind == TouchEventType::Move {
            self.drag_or_hold_timer.stop();
            self.hold_timer.stop();
            if event.position.distance(self.start_position()) >= DRAG_DISTANCE {
                let Position { x, y } = self.scaler.position(self.start_position());
                self.sink.push(Gesture::DragStart { x, y });
                self.set_state(State::DragOngoing);
            }
        }
    }

    fn double_tap_possible(&mut self, event: &TouchEvent) {
        let last_id = self.last_event.map(|last| last.id);
        if event.kind == TouchEventType::Move && Some(event.id) == last_id {
            let Position { x, y } = self.scaler.position(self.start_position());
            match self.classifier.observe(&self.history) {
                Some(Motion::Circular) => {
                    self.sink.push(Gesture::DoubleTapCircularStart { x, y });
                    self.set_state(State::DoubleTapCircularOngoing);
                }
                Some(Motion::Linear) => {
                    self.sink.push(Gesture::DoubleTapSwipeStart { x, y });
                    self.set_state(State::DoubleTapSwipeOngoing);
                }
                Some(Motion::Undetected) | None => {}
            }
        } else if event.kind == TouchEventType::Begin && Some(event.id) != last_id {
            debug!(id = event.id, "ignoring another contact during a double tap");
        }
    }

    fn circular_move(&mut self, event: &TouchEvent, now: Instant) {
        let center = self.start_position();
        let previous = polar_angle(self.last_position(), center);
        let angle = polar_angle(event.position, center);
        let delta_angle = normalize_angle(angle - previous);
        let radius = event.position.distance(center);
        let dt = now.saturating_duration_since(event.time).as_secs_f32();
        let speed = if dt > 0.0 { delta_angle / dt } else { 0.0 };
        let Position { x, y } = self.scaler.position(event.position);
        self.sink.push(Gesture::DoubleTapCircularMove {
            x,
            y,
            angle,
            delta_angle,
            radius,
            speed,
        });
    }

    fn step_from_last(&self, event: &TouchEvent) -> (i32, i32, i32, i32) {
        let current = self.scaler.position(event.position);
        let last = self.scaler.position(self.last_position());
        (current.x, current.y, current.x - last.x, current.y - last.y)
    }

    fn distance_from_last(&self, event: &TouchEvent) -> f32 {
        event.position.distance(self.last_position())
    }

    fn start_id(&self) -> Option<u32> {
        self.start_event.map(|event| event.id)
    }

    fn start_position(&self) -> Position {
        self.start_event
            .map(|event| event.position)
            .unwrap_or_default()
    }

    fn last_position(&self) -> Position {
        self.last_event
            .map(|event| event.position)
            .unwrap_or_default()
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "one finger state");
            self.state = state;
        }
    }
}
