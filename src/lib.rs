#[macro_use]
extern crate custom_derive;
#[macro_use]
extern crate enum_derive;

pub mod classifier;
pub mod error;
pub mod evdev;
pub mod gestures;
pub mod one_finger;
pub mod recognizer;
pub mod tracker;
pub mod utils;

pub use crate::error::{AddMessage, Error};
pub use crate::evdev::{Capabilities, EvdevSource};
pub use crate::gestures::{Gesture, GestureKind, Phase, Resolution};
pub use crate::one_finger::GestureSink;
pub use crate::recognizer::{GestureRecognizer, RecognizerConfig, TouchSource};
pub use crate::tracker::{RawSample, TouchEvent, TouchEventType};
