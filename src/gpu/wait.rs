//! Blocking waits used by the present loop
//!
//! Flip completion and terminal activity are separate concerns: the display
//! side only cares about the DRM descriptor becoming readable, the input side
//! only about stdin. [`wait_for_flip`] composes the two by polling both
//! descriptors at once and reporting which one woke it.

use log::debug;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::io;
use std::os::fd::BorrowedFd;

/// Which descriptor ended a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Display,
    Input,
}

/// Result of waiting for a queued page flip
#[derive(Debug)]
pub enum FlipWait {
    /// The flip-completion event for our CRTC arrived
    Completed,
    /// Terminal activity interrupted the wait; the flip is still in flight
    Interrupted,
    /// The wait itself failed; the flip may still be in flight
    Failed(io::Error),
}

fn readable(fd: &PollFd<'_>) -> bool {
    fd.revents()
        .map(|events| events.intersects(PollFlags::POLLIN | PollFlags::POLLERR | PollFlags::POLLHUP))
        .unwrap_or(false)
}

/// Input only counts when there is data; a hung-up or invalid descriptor
/// would otherwise report ready on every poll.
fn input_readable(fd: &PollFd<'_>) -> bool {
    fd.revents()
        .map(|events| events.contains(PollFlags::POLLIN))
        .unwrap_or(false)
}

fn hung_up(fd: &PollFd<'_>) -> bool {
    fd.revents()
        .map(|events| {
            !events.contains(PollFlags::POLLIN)
                && events.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL)
        })
        .unwrap_or(false)
}

/// Block with no timeout until `display` or `input` becomes readable.
///
/// Input wins when both are ready. An input descriptor that hangs up is
/// dropped for the rest of the wait. `EINTR` restarts the wait.
pub fn wait_any(display: BorrowedFd<'_>, mut input: Option<BorrowedFd<'_>>) -> io::Result<Wake> {
    loop {
        let mut fds = Vec::with_capacity(2);
        fds.push(PollFd::new(display, PollFlags::POLLIN));
        if let Some(input) = input {
            fds.push(PollFd::new(input, PollFlags::POLLIN));
        }

        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(io::Error::from(e)),
        }

        if let Some(fd) = fds.get(1) {
            if input_readable(fd) {
                return Ok(Wake::Input);
            }
            if hung_up(fd) {
                debug!("Input descriptor hung up, waiting on the display only");
                input = None;
            }
        }
        if readable(&fds[0]) {
            return Ok(Wake::Display);
        }
    }
}

/// Whether `fd` has data available right now (zero-timeout poll)
pub fn input_pending(fd: BorrowedFd<'_>) -> bool {
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::ZERO) {
        Ok(ready) => ready > 0 && input_readable(&fds[0]),
        Err(_) => false,
    }
}

/// Wait until `drain` reports the flip completed.
///
/// `drain` reads the pending DRM events and returns true once one of them
/// completes the flip we queued. With `input` set, readiness on it ends the
/// wait early with [`FlipWait::Interrupted`].
pub fn wait_for_flip<F>(display: BorrowedFd<'_>, input: Option<BorrowedFd<'_>>, mut drain: F) -> FlipWait
where
    F: FnMut() -> io::Result<bool>,
{
    loop {
        match wait_any(display, input) {
            Ok(Wake::Input) => return FlipWait::Interrupted,
            Ok(Wake::Display) => match drain() {
                Ok(true) => return FlipWait::Completed,
                Ok(false) => continue,
                Err(e) => return FlipWait::Failed(e),
            },
            Err(e) => return FlipWait::Failed(e),
        }
    }
}
