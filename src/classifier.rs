use crate::tracker::{TouchEvent, TouchEventType};
use crate::utils::Position;
use std::collections::VecDeque;
use std::f32::consts::PI;
use tracing::trace;

/// Number of consecutive turns summed per verdict.
pub const TURN_WINDOW: usize = 10;
pub const CIRCULAR_TURN_SUM: f32 = PI * 0.95;
pub const REQUIRED_PREDICTIONS: u32 = 10;
const MOVE_RUN: usize = 5;
const SAMPLING: usize = 5;
const MIN_SEGMENT: f32 = 1e-3;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Motion {
    Undetected,
    Linear,
    Circular,
}

/// Sums the unsigned turning angles between consecutive segments of the
/// last `TURN_WINDOW + 2` points. Shorter paths have no turn.
pub fn turn_angle_sum(points: &[Position]) -> f32 {
    let size = points.len();
    if size < TURN_WINDOW + 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in (size - TURN_WINDOW)..size {
        let dx1 = (points[i - 1].x - points[i - 2].x) as f32;
        let dy1 = (points[i - 1].y - points[i - 2].y) as f32;
        let dx2 = (points[i].x - points[i - 1].x) as f32;
        let dy2 = (points[i].y - points[i - 1].y) as f32;
        let len1 = (dx1 * dx1 + dy1 * dy1).sqrt();
        let len2 = (dx2 * dx2 + dy2 * dy2).sqrt();
        if len1 < MIN_SEGMENT || len2 < MIN_SEGMENT {
            continue;
        }
        let dot = ((dx1 * dx2 + dy1 * dy2) / (len1 * len2)).clamp(-1.0, 1.0);
        total += dot.acos().abs();
    }
    total
}

pub fn classify(points: &[Position]) -> Motion {
    if turn_angle_sum(points) >= CIRCULAR_TURN_SUM {
        Motion::Circular
    } else {
        Motion::Linear
    }
}

/// Polar angle of `point` around `center`, in `[-π, π]`.
pub fn polar_angle(point: Position, center: Position) -> f32 {
    ((point.y - center.y) as f32).atan2((point.x - center.x) as f32)
}

pub fn normalize_angle(mut angle: f32) -> f32 {
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    while angle > PI {
        angle -= 2.0 * PI;
    }
    angle
}

/// Accumulates verdicts while a double tap is held and moved. Commits to
/// the most recent verdict once enough verdicts were taken.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    predictions: u32,
    verdict: Motion,
}

impl Default for Classifier {
    fn default() -> Classifier {
        Classifier::new()
    }
}

impl Classifier {
    pub fn new() -> Classifier {
        Classifier {
            predictions: 0,
            verdict: Motion::Undetected,
        }
    }

    pub fn reset(&mut self) {
        *self = Classifier::new();
    }

    pub fn predictions(&self) -> u32 {
        self.predictions
    }

    /// `history` must not yet contain the event being processed.
    pub fn observe(&mut self, history: &VecDeque<TouchEvent>) -> Option<Motion> {
        let size = history.len();
        if size < MOVE_RUN {
            return None;
        }
        if history
            .iter()
            .skip(size - MOVE_RUN)
            .any(|event| event.kind != TouchEventType::Move)
        {
            return None;
        }
        if size % SAMPLING == 0 {
            let points: Vec<Position> = history
                .iter()
                .skip(size.saturating_sub(TURN_WINDOW + 2))
                .map(|event| event.position)
                .collect();
            self.verdict = classify(&points);
            self.predictions += 1;
            trace!(verdict = ?self.verdict, predictions = self.predictions, "double tap motion");
        }
        if self.predictions >= REQUIRED_PREDICTIONS && self.verdict != Motion::Undetected {
            Some(self.verdict)
        } else {
            None
        }
    }
}
