use crate::utils::Position;

custom_derive! {
    #[derive(Debug, PartialEq, Eq, Clone, Copy, IterVariants(GestureKindVariants), EnumFromStr)]
    pub enum GestureKind {
        TouchDown,
        TouchUp,
        Tap,
        Hold,
        DoubleTap,
        Swipe,
        Drag,
        DoubleTapSwipe,
        DoubleTapCircular,
        Zoom,
        TwoFingerTap,
        TwoFingerSwipe,
        ThreeFingerTap,
        ThreeFingerSwipe
    }
}

impl GestureKind {
    /// Multi-finger kinds are part of the vocabulary but never recognized.
    pub fn is_recognized(self) -> bool {
        !matches!(
            self,
            GestureKind::Zoom
                | GestureKind::TwoFingerTap
                | GestureKind::TwoFingerSwipe
                | GestureKind::ThreeFingerTap
                | GestureKind::ThreeFingerSwipe
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Phase {
    Start,
    Move,
    End,
}

/// A recognized gesture. Coordinates are in the caller's window space,
/// except the polar fields of `DoubleTapCircularMove`, which stay in
/// device units.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Gesture {
    TouchDown { x: i32, y: i32 },
    TouchUp { x: i32, y: i32 },
    Tap { x: i32, y: i32 },
    Hold { x: i32, y: i32 },
    DoubleTap { x: i32, y: i32 },
    SwipeStart { x: i32, y: i32 },
    SwipeMove { x: i32, y: i32, dx: i32, dy: i32 },
    SwipeEnd { x: i32, y: i32 },
    DragStart { x: i32, y: i32 },
    DragMove { x: i32, y: i32, dx: i32, dy: i32 },
    DragEnd { x: i32, y: i32 },
    DoubleTapSwipeStart { x: i32, y: i32 },
    DoubleTapSwipeMove { x: i32, y: i32, dx: i32, dy: i32 },
    DoubleTapSwipeEnd { x: i32, y: i32 },
    DoubleTapCircularStart { x: i32, y: i32 },
    DoubleTapCircularMove {
        x: i32,
        y: i32,
        angle: f32,
        delta_angle: f32,
        radius: f32,
        speed: f32,
    },
    DoubleTapCircularEnd { x: i32, y: i32 },
}

impl Gesture {
    pub fn kind(&self) -> GestureKind {
        use self::Gesture::*;
        match self {
            TouchDown { .. } => GestureKind::TouchDown,
            TouchUp { .. } => GestureKind::TouchUp,
            Tap { .. } => GestureKind::Tap,
            Hold { .. } => GestureKind::Hold,
            DoubleTap { .. } => GestureKind::DoubleTap,
            SwipeStart { .. } | SwipeMove { .. } | SwipeEnd { .. } => GestureKind::Swipe,
            DragStart { .. } | DragMove { .. } | DragEnd { .. } => GestureKind::Drag,
            DoubleTapSwipeStart { .. } | DoubleTapSwipeMove { .. } | DoubleTapSwipeEnd { .. } => {
                GestureKind::DoubleTapSwipe
            }
            DoubleTapCircularStart { .. }
            | DoubleTapCircularMove { .. }
            | DoubleTapCircularEnd { .. } => GestureKind::DoubleTapCircular,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        use self::Gesture::*;
        match self {
            SwipeStart { .. }
            | DragStart { .. }
            | DoubleTapSwipeStart { .. }
            | DoubleTapCircularStart { .. } => Some(Phase::Start),
            SwipeMove { .. }
            | DragMove { .. }
            | DoubleTapSwipeMove { .. }
            | DoubleTapCircularMove { .. } => Some(Phase::Move),
            SwipeEnd { .. } | DragEnd { .. } | DoubleTapSwipeEnd { .. } | DoubleTapCircularEnd { .. } => {
                Some(Phase::End)
            }
            TouchDown { .. } | TouchUp { .. } | Tap { .. } | Hold { .. } | DoubleTap { .. } => None,
        }
    }

    pub fn position(&self) -> Position {
        use self::Gesture::*;
        match *self {
            TouchDown { x, y }
            | TouchUp { x, y }
            | Tap { x, y }
            | Hold { x, y }
            | DoubleTap { x, y }
            | SwipeStart { x, y }
            | SwipeMove { x, y, .. }
            | SwipeEnd { x, y }
            | DragStart { x, y }
            | DragMove { x, y, .. }
            | DragEnd { x, y }
            | DoubleTapSwipeStart { x, y }
            | DoubleTapSwipeMove { x, y, .. }
            | DoubleTapSwipeEnd { x, y }
            | DoubleTapCircularStart { x, y }
            | DoubleTapCircularMove { x, y, .. }
            | DoubleTapCircularEnd { x, y } => Position { x, y },
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Resolution {
    pub x: i32,
    pub y: i32,
}

/// Maps device coordinates into the window coordinate space.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Scaler {
    native: Resolution,
    expected: Resolution,
}

impl Scaler {
    pub fn new(native: Resolution) -> Scaler {
        Scaler {
            native,
            expected: native,
        }
    }

    pub fn set_expected(&mut self, expected: Resolution) {
        self.expected = expected;
    }

    pub fn x(&self, x: i32) -> i32 {
        lerp(x, self.native.x, self.expected.x)
    }

    pub fn y(&self, y: i32) -> i32 {
        lerp(y, self.native.y, self.expected.y)
    }

    pub fn position(&self, position: Position) -> Position {
        Position {
            x: self.x(position.x),
            y: self.y(position.y),
        }
    }
}

fn lerp(value: i32, native: i32, expected: i32) -> i32 {
    if native == 0 {
        value
    } else {
        (value as i64 * expected as i64 / native as i64) as i32
    }
}
