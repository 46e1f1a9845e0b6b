use std::time::{Duration, Instant};

/// A countdown that is polled rather than firing callbacks. An inactive
/// timer never reports itself as expired.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    started: Option<(Instant, Duration)>,
}

impl Timer {
    pub fn new() -> Timer {
        Timer { started: None }
    }

    pub fn start(&mut self, timeout: Duration, now: Instant) {
        self.started = Some((now, timeout));
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn active(&self) -> bool {
        self.started.is_some()
    }

    pub fn expired(&self, now: Instant) -> bool {
        match self.started {
            None => false,
            Some((start, timeout)) => now.saturating_duration_since(start) >= timeout,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn is_inactive_initially() {
        let timer = Timer::new();
        assert!(!timer.active());
        assert!(!timer.expired(Instant::now()));
    }

    #[test]
    fn does_not_expire_before_the_timeout() {
        let now = Instant::now();
        let mut timer = Timer::new();
        timer.start(ms(300), now);
        assert!(timer.active());
        assert!(!timer.expired(now + ms(299)));
    }

    #[test]
    fn expires_exactly_at_the_timeout() {
        let now = Instant::now();
        let mut timer = Timer::new();
        timer.start(ms(300), now);
        assert!(timer.expired(now + ms(300)));
        assert!(timer.expired(now + ms(1000)));
    }

    #[test]
    fn stopping_disarms_the_timer() {
        let now = Instant::now();
        let mut timer = Timer::new();
        timer.start(ms(10), now);
        timer.stop();
        assert!(!timer.active());
        assert!(!timer.expired(now + ms(20)));
    }

    #[test]
    fn restarting_uses_the_new_start_time() {
        let now = Instant::now();
        let mut timer = Timer::new();
        timer.start(ms(100), now);
        timer.start(ms(100), now + ms(50));
        assert!(!timer.expired(now + ms(120)));
        assert!(timer.expired(now + ms(150)));
    }
}
