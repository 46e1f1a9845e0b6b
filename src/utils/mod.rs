pub mod timer;
pub mod wake;

pub const MAX_SLOTS: usize = 10;

pub type Slots<T> = [T; MAX_SLOTS];

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Position {
        Position { x, y }
    }

    pub fn distance(self, other: Position) -> f32 {
        let dx = (other.x - self.x) as f32;
        let dy = (other.y - self.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn squared_distance(self, other: Position) -> i64 {
        let dx = (other.x - self.x) as i64;
        let dy = (other.y - self.y) as i64;
        dx * dx + dy * dy
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    pub fn wait_for<T, F>(mut f: F) -> Result<T, String>
    where
        F: FnMut() -> Result<T, String>,
    {
        let mut milli_seconds_left = 2000;
        let mut result = f();
        while milli_seconds_left > 0 && result.is_err() {
            sleep(Duration::from_millis(10));
            result = f();
            milli_seconds_left -= 10;
        }
        result
    }

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Position::new(0, 0).distance(Position::new(3, 4)), 5.0);
    }

    #[test]
    fn squared_distance_does_not_overflow_for_large_coordinates() {
        assert_eq!(
            Position::new(0, 0).squared_distance(Position::new(100_000, 0)),
            10_000_000_000
        );
    }
}
