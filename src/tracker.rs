use crate::utils::Position;
use std::time::{Duration, Instant};
use tracing::trace;

pub const PROBATION_WINDOW: Duration = Duration::from_millis(50);
pub const ACTIVE_TO_LOST: Duration = Duration::from_millis(50);
pub const LOST_TIMEOUT: Duration = Duration::from_millis(50);
pub const ACTIVATION_COUNT: u32 = 4;
pub const REBIND_RADIUS: i32 = 30;
pub const MOVE_MIN: i64 = 2;
pub const MOVE_MAX: i64 = 30;

/// The state of one hardware slot as of the latest frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub tracking_id: i32,
    pub active: bool,
    pub position: Position,
    pub touch_major: i32,
    pub touch_minor: i32,
    pub last_action: Instant,
}

impl RawSample {
    pub fn inactive(now: Instant) -> RawSample {
        RawSample {
            tracking_id: -1,
            active: false,
            position: Position::default(),
            touch_major: 0,
            touch_minor: 0,
            last_action: now,
        }
    }

    pub fn touching(tracking_id: i32, position: Position, now: Instant) -> RawSample {
        RawSample {
            tracking_id,
            active: true,
            position,
            touch_major: 0,
            touch_minor: 0,
            last_action: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEventType {
    Begin,
    Move,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub id: u32,
    pub kind: TouchEventType,
    pub position: Position,
    pub time: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerState {
    Probation,
    Active,
    Lost,
}

#[derive(Debug, Clone)]
struct LogicalFinger {
    logical_id: u32,
    last_tracked_id: i32,
    state: FingerState,
    position: Position,
    last_emitted: Position,
    active_count: u32,
    last_action: Instant,
    sampled: Instant,
    updated_this_frame: bool,
    mark_to_delete: bool,
}

impl LogicalFinger {
    /// Events are stamped with the acquisition time of the finger's latest
    /// sample, not with the time the tracker got to see it.
    fn event(&self, kind: TouchEventType) -> TouchEvent {
        TouchEvent {
            id: self.logical_id,
            kind,
            position: self.position,
            time: self.sampled,
        }
    }
}

/// Turns per-frame slot samples into Begin/Move/End events for stable
/// logical finger ids, debouncing new contacts and bridging short signal
/// losses.
#[derive(Debug, Default)]
pub struct FingerTracker {
    fingers: Vec<LogicalFinger>,
    next_id: u32,
}

impl FingerTracker {
    pub fn new() -> FingerTracker {
        FingerTracker::default()
    }

    pub fn len(&self) -> usize {
        self.fingers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingers.is_empty()
    }

    pub fn states(&self) -> Vec<(u32, FingerState)> {
        self.fingers
            .iter()
            .map(|finger| (finger.logical_id, finger.state))
            .collect()
    }

    /// `frame` is `None` when no new frame arrived this cycle; lifecycle
    /// timeouts are still evaluated.
    pub fn process(&mut self, frame: Option<&[RawSample]>, now: Instant) -> Vec<TouchEvent> {
        if let Some(frame) = frame {
            for finger in self.fingers.iter_mut() {
                finger.updated_this_frame = false;
            }
            for sample in frame.iter().filter(|sample| sample.active) {
                self.match_sample(sample, now);
            }
        }

        let mut events = vec![];
        for finger in self.fingers.iter_mut() {
            let elapsed = now.saturating_duration_since(finger.last_action);
            match finger.state {
                FingerState::Probation => {
                    let timed_out = elapsed > PROBATION_WINDOW;
                    if !timed_out && finger.active_count > ACTIVATION_COUNT {
                        finger.state = FingerState::Active;
                        finger.last_emitted = finger.position;
                        finger.updated_this_frame = false;
                        finger.last_action = now;
                        events.push(finger.event(TouchEventType::Begin));
                    } else if timed_out {
                        trace!(id = finger.logical_id, "finger failed probation");
                        finger.mark_to_delete = true;
                    }
                }
                FingerState::Lost => {
                    if finger.updated_this_frame {
                        trace!(id = finger.logical_id, "lost finger recovered");
                        finger.state = FingerState::Active;
                        finger.updated_this_frame = false;
                        finger.last_action = now;
                    } else if elapsed >= LOST_TIMEOUT {
                        events.push(finger.event(TouchEventType::End));
                        finger.mark_to_delete = true;
                    }
                }
                FingerState::Active => {
                    if finger.updated_this_frame {
                        if let Some(event) = probably_move(finger) {
                            events.push(event);
                        }
                        finger.updated_this_frame = false;
                        finger.last_action = now;
                    } else if elapsed >= ACTIVE_TO_LOST {
                        trace!(id = finger.logical_id, "finger lost");
                        finger.state = FingerState::Lost;
                        finger.last_action = now;
                    }
                }
            }
        }

        self.fingers.retain(|finger| !finger.mark_to_delete);
        events
    }

    fn match_sample(&mut self, sample: &RawSample, now: Instant) {
        let exact = self
            .fingers
            .iter()
            .position(|finger| finger.last_tracked_id == sample.tracking_id);
        let matched = exact.or_else(|| {
            self.fingers.iter().position(|finger| {
                finger.state == FingerState::Lost
                    && !finger.updated_this_frame
                    && (finger.position.x - sample.position.x).abs() <= REBIND_RADIUS
                    && (finger.position.y - sample.position.y).abs() <= REBIND_RADIUS
                    && now.saturating_duration_since(finger.last_action) < LOST_TIMEOUT
            })
        });
        match matched {
            Some(index) => {
                let finger = &mut self.fingers[index];
                if exact.is_none() {
                    trace!(
                        id = finger.logical_id,
                        from = finger.last_tracked_id,
                        to = sample.tracking_id,
                        "rebinding lost finger"
                    );
                }
                finger.position = sample.position;
                finger.last_action = sample.last_action;
                finger.sampled = sample.last_action;
                if finger.state == FingerState::Probation {
                    finger.active_count += 1;
                }
                finger.last_tracked_id = sample.tracking_id;
                finger.updated_this_frame = true;
            }
            None => {
                let logical_id = self.next_id;
                self.next_id = self.next_id.wrapping_add(1);
                self.fingers.push(LogicalFinger {
                    logical_id,
                    last_tracked_id: sample.tracking_id,
                    state: FingerState::Probation,
                    position: sample.position,
                    last_emitted: sample.position,
                    active_count: 0,
                    last_action: sample.last_action,
                    sampled: sample.last_action,
                    updated_this_frame: true,
                    mark_to_delete: false,
                });
            }
        }
    }
}

/// Emits a Move only for displacements from the last emitted position
/// within `[MOVE_MIN, MOVE_MAX]`; anything else leaves it untouched.
fn probably_move(finger: &mut LogicalFinger) -> Option<TouchEvent> {
    let squared = finger.last_emitted.squared_distance(finger.position);
    if squared >= MOVE_MIN * MOVE_MIN && squared <= MOVE_MAX * MOVE_MAX {
        finger.last_emitted = finger.position;
        Some(finger.event(TouchEventType::Move))
    } else {
        None
    }
}

#[cfg(test)]
pub mod test {
    use super::TouchEventType::*;
    use super::*;

    pub fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    pub fn sample(tracking_id: i32, x: i32, y: i32, time: Instant) -> RawSample {
        RawSample::touching(tracking_id, Position { x, y }, time)
    }

    fn kinds(events: &[TouchEvent]) -> Vec<(u32, TouchEventType, Position)> {
        events
            .iter()
            .map(|event| (event.id, event.kind, event.position))
            .collect()
    }

    /// Feeds the same contact every 10 ms until it is confirmed. Returns
    /// the time of the Begin.
    pub fn activate(tracker: &mut FingerTracker, tracking_id: i32, x: i32, y: i32, start: Instant) -> Instant {
        for i in 0..5 {
            let t = start + ms(i * 10);
            assert_eq!(
                tracker.process(Some(&[sample(tracking_id, x, y, t)]), t),
                vec![]
            );
        }
        let t = start + ms(50);
        let events = tracker.process(Some(&[sample(tracking_id, x, y, t)]), t);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, Begin);
        t
    }

    mod probation {
        use super::*;

        #[test]
        fn emits_begin_after_more_than_four_confirmations() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let begin = activate(&mut tracker, 7, 100, 200, start);
            assert_eq!(tracker.states(), vec![(0, FingerState::Active)]);
            assert_eq!(begin, start + ms(50));
        }

        #[test]
        fn begin_carries_the_latest_position() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let mut events = vec![];
            for i in 0..6 {
                let t = start + ms(i * 10);
                events.extend(tracker.process(Some(&[sample(1, 100 + i as i32, 200, t)]), t));
            }
            assert_eq!(kinds(&events), vec![(0, Begin, Position { x: 105, y: 200 })]);
        }

        #[test]
        fn discards_contacts_that_stop_reporting() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            for i in 0..3 {
                let t = start + ms(i * 10);
                tracker.process(Some(&[sample(1, 100, 100, t)]), t);
            }
            assert_eq!(tracker.len(), 1);
            assert_eq!(tracker.process(None, start + ms(20 + 51)), vec![]);
            assert!(tracker.is_empty());
        }

        #[test]
        fn survives_exactly_one_probation_window_of_silence() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            for i in 0..5 {
                let t = start + ms(i * 10);
                tracker.process(Some(&[sample(1, 100, 100, t)]), t);
            }
            let last = start + ms(40);
            assert_eq!(tracker.process(None, last + PROBATION_WINDOW), vec![]);
            assert_eq!(tracker.states(), vec![(0, FingerState::Probation)]);
            assert_eq!(tracker.process(None, last + PROBATION_WINDOW + ms(1)), vec![]);
            assert!(tracker.is_empty());
        }

        #[test]
        fn sparse_samples_never_become_active() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let mut events = vec![];
            for i in 0..10 {
                let t = start + ms(i * 60);
                events.extend(tracker.process(Some(&[sample(1, 100, 100, t)]), t));
                events.extend(tracker.process(None, t + ms(55)));
            }
            assert_eq!(events, vec![]);
        }

        #[test]
        fn probation_fingers_never_emit_end() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            tracker.process(Some(&[sample(1, 100, 100, start)]), start);
            let mut events = vec![];
            for i in 1..20 {
                events.extend(tracker.process(None, start + ms(i * 10)));
            }
            assert_eq!(events, vec![]);
            assert!(tracker.is_empty());
        }
    }

    mod moves {
        use super::*;

        #[test]
        fn emits_moves_within_the_displacement_window() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let t = activate(&mut tracker, 1, 100, 100, start) + ms(10);
            let events = tracker.process(Some(&[sample(1, 110, 100, t)]), t);
            assert_eq!(kinds(&events), vec![(0, Move, Position { x: 110, y: 100 })]);
        }

        #[test]
        fn events_carry_the_acquisition_time_of_their_sample() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let acquired = activate(&mut tracker, 1, 100, 100, start) + ms(10);
            let events = tracker.process(Some(&[sample(1, 110, 100, acquired)]), acquired + ms(4));
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].time, acquired);
        }

        #[test]
        fn drops_jitter_below_two_units() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let t = activate(&mut tracker, 1, 100, 100, start) + ms(10);
            assert_eq!(tracker.process(Some(&[sample(1, 101, 101, t)]), t), vec![]);
        }

        #[test]
        fn accumulates_jitter_from_the_last_emitted_position() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let t1 = activate(&mut tracker, 1, 100, 100, start) + ms(10);
            assert_eq!(tracker.process(Some(&[sample(1, 101, 100, t1)]), t1), vec![]);
            let t2 = t1 + ms(10);
            let events = tracker.process(Some(&[sample(1, 102, 100, t2)]), t2);
            assert_eq!(kinds(&events), vec![(0, Move, Position { x: 102, y: 100 })]);
        }

        #[test]
        fn accepts_the_exact_window_bounds() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let t1 = activate(&mut tracker, 1, 100, 100, start) + ms(10);
            assert_eq!(tracker.process(Some(&[sample(1, 102, 100, t1)]), t1).len(), 1);
            let t2 = t1 + ms(10);
            assert_eq!(tracker.process(Some(&[sample(1, 132, 100, t2)]), t2).len(), 1);
        }

        #[test]
        fn drops_teleports_without_advancing() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let t1 = activate(&mut tracker, 1, 100, 100, start) + ms(10);
            assert_eq!(tracker.process(Some(&[sample(1, 131, 100, t1)]), t1), vec![]);
            let t2 = t1 + ms(10);
            let events = tracker.process(Some(&[sample(1, 105, 100, t2)]), t2);
            assert_eq!(kinds(&events), vec![(0, Move, Position { x: 105, y: 100 })]);
        }
    }

    mod release {
        use super::*;

        #[test]
        fn ends_after_being_lost_for_the_timeout() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let begin = activate(&mut tracker, 1, 100, 100, start);
            assert_eq!(tracker.process(None, begin + ms(49)), vec![]);
            assert_eq!(tracker.process(None, begin + ms(50)), vec![]);
            assert_eq!(tracker.states(), vec![(0, FingerState::Lost)]);
            assert_eq!(tracker.process(None, begin + ms(99)), vec![]);
            let events = tracker.process(None, begin + ms(100));
            assert_eq!(kinds(&events), vec![(0, End, Position { x: 100, y: 100 })]);
            assert!(tracker.is_empty());
        }

        #[test]
        fn inactive_samples_count_as_missing() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let begin = activate(&mut tracker, 1, 100, 100, start);
            let mut released = sample(1, 100, 100, begin + ms(10));
            released.active = false;
            tracker.process(Some(&[released]), begin + ms(10));
            tracker.process(None, begin + ms(60));
            let events = tracker.process(None, begin + ms(110));
            assert_eq!(kinds(&events), vec![(0, End, Position { x: 100, y: 100 })]);
        }
    }

    mod rebinding {
        use super::*;

        fn lose(tracker: &mut FingerTracker, begin: Instant) -> Instant {
            let lost_at = begin + ms(50);
            tracker.process(None, lost_at);
            assert_eq!(tracker.states(), vec![(0, FingerState::Lost)]);
            lost_at
        }

        #[test]
        fn rebinds_a_nearby_contact_with_a_new_tracking_id() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let begin = activate(&mut tracker, 1, 100, 100, start);
            let lost_at = lose(&mut tracker, begin);
            let t1 = lost_at + ms(20);
            assert_eq!(tracker.process(Some(&[sample(2, 120, 90, t1)]), t1), vec![]);
            assert_eq!(tracker.states(), vec![(0, FingerState::Active)]);
            let t2 = t1 + ms(10);
            let events = tracker.process(Some(&[sample(2, 125, 90, t2)]), t2);
            assert_eq!(kinds(&events), vec![(0, Move, Position { x: 125, y: 90 })]);
        }

        #[test]
        fn recovers_the_same_tracking_id_silently() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let begin = activate(&mut tracker, 1, 100, 100, start);
            let lost_at = lose(&mut tracker, begin);
            let t = lost_at + ms(10);
            assert_eq!(tracker.process(Some(&[sample(1, 100, 100, t)]), t), vec![]);
            assert_eq!(tracker.states(), vec![(0, FingerState::Active)]);
        }

        #[test]
        fn far_contacts_start_a_new_finger() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let begin = activate(&mut tracker, 1, 100, 100, start);
            let lost_at = lose(&mut tracker, begin);
            let t = lost_at + ms(10);
            tracker.process(Some(&[sample(2, 131, 100, t)]), t);
            assert_eq!(
                tracker.states(),
                vec![(0, FingerState::Lost), (1, FingerState::Probation)]
            );
        }

        #[test]
        fn only_one_contact_can_take_over_a_lost_finger() {
            let start = Instant::now();
            let mut tracker = FingerTracker::new();
            let begin = activate(&mut tracker, 1, 100, 100, start);
            let lost_at = lose(&mut tracker, begin);
            let t = lost_at + ms(10);
            tracker.process(Some(&[sample(2, 105, 100, t), sample(3, 95, 100, t)]), t);
            assert_eq!(
                tracker.states(),
                vec![(0, FingerState::Active), (1, FingerState::Probation)]
            );
        }
    }

    #[test]
    fn events_follow_finger_insertion_order() {
        let start = Instant::now();
        let mut tracker = FingerTracker::new();
        let mut events = vec![];
        for i in 0..6 {
            let t = start + ms(i * 10);
            events.extend(tracker.process(
                Some(&[sample(5, 500, 500, t), sample(4, 100, 100, t)]),
                t,
            ));
        }
        assert_eq!(
            kinds(&events),
            vec![
                (0, Begin, Position { x: 500, y: 500 }),
                (1, Begin, Position { x: 100, y: 100 }),
            ]
        );
    }
}
