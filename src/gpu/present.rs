//! Present protocol: swap → lock → mode-set (first frame) / page-flip → wait → release
//!
//! [`Presenter`] owns the bookkeeping (scanout and shown flags, the buffer on
//! screen, the buffer whose flip is still in flight) and drives any
//! [`ScanoutTarget`]. The real target is the GBM/EGL window surface; tests
//! drive a recording fake.
//!
//! Ordering guarantees:
//! - every present starts with a swap
//! - the first scanout present performs exactly one synchronous mode-set
//!   and never a page flip; every later present only page-flips
//! - a buffer is released back to the surface only after the buffer that
//!   replaces it on screen is confirmed flipped

use log::{debug, warn};
use std::io;

use super::wait::FlipWait;
use crate::error::PresentError;

/// Hardware operations the present protocol needs
pub trait ScanoutTarget {
    /// A locked front buffer
    type Buffer;
    /// A scannable framebuffer object
    type Framebuffer: Copy;

    fn swap(&mut self) -> Result<(), PresentError>;

    /// Lock the buffer produced by the last swap
    fn lock_front(&mut self) -> Option<Self::Buffer>;

    /// Resolve (and cache) the framebuffer object for `buffer`
    fn framebuffer(&mut self, buffer: &Self::Buffer) -> Option<Self::Framebuffer>;

    fn set_crtc(&mut self, fb: Self::Framebuffer) -> io::Result<()>;

    fn page_flip(&mut self, fb: Self::Framebuffer) -> io::Result<()>;

    /// Block until the queued flip completes, or until terminal activity if
    /// `interruptible`
    fn wait_for_flip(&mut self, interruptible: bool) -> FlipWait;

    /// Hand a locked buffer back to the surface
    fn release(&mut self, buffer: Self::Buffer);
}

/// Why a present left the previous frame on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The surface had no buffer to lock
    NoFrontBuffer,
    /// The locked buffer could not be turned into a framebuffer
    NoFramebuffer,
    /// The kernel refused the page flip
    FlipRefused,
    /// Terminal activity interrupted the flip wait; the flip is still pending
    Interrupted,
    /// Waiting for the flip event failed; the flip is still pending
    WaitFailed,
}

/// What a successful `present()` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The context has no surface; nothing happened
    NoSurface,
    /// Off-screen surface: swapped only
    Swapped,
    /// First scanout frame: the CRTC now shows our buffer
    ModeSet,
    /// A page flip completed
    Flipped,
    /// The frame was dropped; try again next frame
    Skipped(SkipReason),
}

impl PresentOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PresentOutcome::Skipped(_))
    }
}

/// Present state machine for one surface
pub struct Presenter<T: ScanoutTarget> {
    // Buffers go back to the surface before the surface itself is dropped
    last: Option<T::Buffer>,
    pending: Option<T::Buffer>,
    target: T,
    scanout: bool,
    shown: bool,
    interruptible: bool,
}

impl<T: ScanoutTarget> Presenter<T> {
    pub fn new(target: T, scanout: bool) -> Self {
        Self {
            last: None,
            pending: None,
            target,
            scanout,
            shown: false,
            interruptible: true,
        }
    }

    /// Whether terminal activity may cut a flip wait short
    pub fn set_interruptible(&mut self, interruptible: bool) {
        self.interruptible = interruptible;
    }

    pub fn is_scanout(&self) -> bool {
        self.scanout
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn has_pending_flip(&self) -> bool {
        self.pending.is_some()
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn present(&mut self) -> Result<PresentOutcome, PresentError> {
        self.target.swap()?;

        if !self.scanout {
            return Ok(PresentOutcome::Swapped);
        }

        if !self.settle_pending() {
            return Ok(PresentOutcome::Skipped(SkipReason::WaitFailed));
        }

        let buffer = match self.target.lock_front() {
            Some(buffer) => buffer,
            None => return Ok(PresentOutcome::Skipped(SkipReason::NoFrontBuffer)),
        };

        let fb = match self.target.framebuffer(&buffer) {
            Some(fb) => fb,
            None => {
                warn!("Could not get a framebuffer for the locked buffer");
                self.target.release(buffer);
                return Ok(PresentOutcome::Skipped(SkipReason::NoFramebuffer));
            }
        };

        if !self.shown {
            // The display is undefined if this fails: the caller must stop
            self.target.set_crtc(fb).map_err(PresentError::ModeSet)?;
            self.last = Some(buffer);
            self.target.swap()?;
            self.shown = true;
            debug!("Initial mode-set done, scanning out");
            return Ok(PresentOutcome::ModeSet);
        }

        if let Err(e) = self.target.page_flip(fb) {
            warn!("Page flip refused: {}", e);
            self.target.release(buffer);
            return Ok(PresentOutcome::Skipped(SkipReason::FlipRefused));
        }

        match self.target.wait_for_flip(self.interruptible) {
            FlipWait::Completed => {
                self.promote(buffer);
                Ok(PresentOutcome::Flipped)
            }
            FlipWait::Interrupted => {
                self.pending = Some(buffer);
                Ok(PresentOutcome::Skipped(SkipReason::Interrupted))
            }
            FlipWait::Failed(e) => {
                warn!("Waiting for page flip failed: {}", e);
                self.pending = Some(buffer);
                Ok(PresentOutcome::Skipped(SkipReason::WaitFailed))
            }
        }
    }

    /// Wait (uninterruptibly) for a flip left in flight by an earlier present.
    /// Returns false if the wait failed and the flip is still pending.
    fn settle_pending(&mut self) -> bool {
        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return true,
        };

        match self.target.wait_for_flip(false) {
            FlipWait::Completed | FlipWait::Interrupted => {
                self.promote(pending);
                true
            }
            FlipWait::Failed(e) => {
                warn!("Waiting for pending page flip failed: {}", e);
                self.pending = Some(pending);
                false
            }
        }
    }

    fn promote(&mut self, buffer: T::Buffer) {
        if let Some(previous) = self.last.replace(buffer) {
            self.target.release(previous);
        }
    }

    /// Settle any in-flight flip and hand every locked buffer back
    pub fn finish(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let FlipWait::Failed(e) = self.target.wait_for_flip(false) {
                warn!("Pending page flip never completed: {}", e);
            }
            self.promote(pending);
        }
        if let Some(last) = self.last.take() {
            self.target.release(last);
        }
    }

    /// Release all buffers and return the target
    pub fn into_target(mut self) -> T {
        self.finish();
        let Presenter { target, .. } = self;
        target
    }
}
