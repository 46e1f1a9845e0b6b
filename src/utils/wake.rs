use crate::error::Error;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};
use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Wakeup {
    Woken,
    Ready,
    TimedOut,
}

/// An eventfd that can interrupt a wait on another descriptor, even when
/// that wait has no timeout.
#[derive(Debug)]
pub struct Waker {
    event_fd: EventFd,
}

impl Waker {
    pub fn new() -> Result<Waker, Error> {
        let event_fd =
            EventFd::from_value_and_flags(0, EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC)
                .map_err(Error::Wake)?;
        Ok(Waker { event_fd })
    }

    pub fn wake(&self) -> Result<(), Error> {
        match self.event_fd.write(1) {
            Ok(_) | Err(Errno::EAGAIN) => Ok(()),
            Err(error) => Err(Error::Wake(error)),
        }
    }

    /// Blocks until the waker is signalled, `source` becomes readable or
    /// `timeout` elapses. `None` waits indefinitely.
    pub fn wait(
        &self,
        source: Option<BorrowedFd<'_>>,
        timeout: Option<Duration>,
    ) -> Result<Wakeup, Error> {
        let mut fds = vec![PollFd::new(self.event_fd.as_fd(), PollFlags::POLLIN)];
        if let Some(fd) = source {
            fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }
        let timeout = match timeout {
            None => PollTimeout::NONE,
            Some(duration) => PollTimeout::from(duration.as_millis().min(u16::MAX as u128) as u16),
        };
        match poll(&mut fds, timeout) {
            Err(Errno::EINTR) | Ok(0) => Ok(Wakeup::TimedOut),
            Err(error) => Err(Error::Wake(error)),
            Ok(_) => {
                let woken = fds[0]
                    .revents()
                    .map_or(false, |revents| revents.contains(PollFlags::POLLIN));
                if woken {
                    if let Err(error) = self.event_fd.read() {
                        trace!(%error, "draining the wake counter");
                    }
                    Ok(Wakeup::Woken)
                } else {
                    Ok(Wakeup::Ready)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nix::unistd::{pipe, write};
    use std::sync::Arc;
    use std::thread::{sleep, spawn};
    use std::time::Instant;

    #[test]
    fn times_out_without_activity() -> Result<(), Error> {
        let waker = Waker::new()?;
        let started = Instant::now();
        assert_eq!(
            waker.wait(None, Some(Duration::from_millis(20)))?,
            Wakeup::TimedOut
        );
        assert!(started.elapsed() >= Duration::from_millis(15));
        Ok(())
    }

    #[test]
    fn reports_a_prior_wake() -> Result<(), Error> {
        let waker = Waker::new()?;
        waker.wake()?;
        assert_eq!(waker.wait(None, None)?, Wakeup::Woken);
        Ok(())
    }

    #[test]
    fn consumes_the_wake_signal() -> Result<(), Error> {
        let waker = Waker::new()?;
        waker.wake()?;
        waker.wait(None, None)?;
        assert_eq!(
            waker.wait(None, Some(Duration::from_millis(5)))?,
            Wakeup::TimedOut
        );
        Ok(())
    }

    #[test]
    fn interrupts_an_indefinite_wait_from_another_thread() -> Result<(), Error> {
        let waker = Arc::new(Waker::new()?);
        let clone = waker.clone();
        let handle = spawn(move || {
            sleep(Duration::from_millis(30));
            clone.wake()
        });
        assert_eq!(waker.wait(None, None)?, Wakeup::Woken);
        handle.join().expect("waking thread panicked")?;
        Ok(())
    }

    #[test]
    fn reports_a_readable_source() -> Result<(), Error> {
        let waker = Waker::new()?;
        let (read_end, write_end) = pipe().map_err(Error::Wake)?;
        write(&write_end, b"x").map_err(Error::Wake)?;
        assert_eq!(
            waker.wait(Some(read_end.as_fd()), Some(Duration::from_millis(100)))?,
            Wakeup::Ready
        );
        Ok(())
    }
}
