//! Controlling-terminal handling
//!
//! While a window is open the terminal runs without echo, in canonical mode,
//! ignoring carriage returns. The text fallback briefly drops canonical mode
//! to read single bytes without blocking.

use log::debug;
use nix::sys::termios::{self, FlushArg, InputFlags, LocalFlags, SetArg, Termios};
use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsFd, OwnedFd};

use crate::error::InputError;
use crate::gpu::wait::input_pending;

const BACKSPACE: u8 = 8;
const ESCAPE: u8 = 27;
const DELETE: u8 = 127;

/// Longest escape sequence tail swallowed after ESC
const ESCAPE_TAIL: usize = 16;

/// Terminal operations the input subsystem needs
pub trait Console: Send {
    /// Read one byte if one is available right now
    fn read_byte(&mut self) -> Option<u8>;

    /// Throw away up to 16 pending bytes; true if there were any
    fn discard_pending(&mut self) -> bool;

    /// Switch canonical (line) mode on or off; no-op unless configured
    fn set_canonical(&mut self, canonical: bool) -> Result<(), InputError>;

    /// Save the current attributes and apply the window configuration
    fn enter_raw_mode(&mut self) -> Result<(), InputError>;

    /// Restore the attributes saved by `enter_raw_mode`
    fn restore(&mut self) -> Result<(), InputError>;
}

/// Read typed text, skipping what the key-code path already reports.
///
/// Backspace and Delete are dropped, and an ESC immediately followed by more
/// bytes is treated as an ANSI escape sequence and swallowed whole.
pub fn read_text(console: &mut dyn Console) -> Option<u32> {
    if let Err(e) = console.set_canonical(false) {
        debug!("Could not leave canonical mode: {}", e);
    }

    let text = match console.read_byte() {
        None | Some(BACKSPACE) | Some(DELETE) => None,
        Some(ESCAPE) => {
            if console.discard_pending() {
                None
            } else {
                Some(u32::from(ESCAPE))
            }
        }
        Some(byte) => Some(u32::from(byte)),
    };

    if let Err(e) = console.set_canonical(true) {
        debug!("Could not re-enter canonical mode: {}", e);
    }
    text
}

/// A terminal device, normally standard input
pub struct Terminal {
    file: File,
    saved: Option<Termios>,
    active: Option<Termios>,
}

impl Terminal {
    /// Use standard input (through a duplicated descriptor)
    pub fn stdin() -> io::Result<Self> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::from_fd(fd))
    }

    pub fn from_fd(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
            saved: None,
            active: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.saved.is_some()
    }
}

impl Console for Terminal {
    fn read_byte(&mut self) -> Option<u8> {
        if !input_pending(self.file.as_fd()) {
            return None;
        }

        let mut byte = [0u8; 1];
        match self.file.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn discard_pending(&mut self) -> bool {
        if !input_pending(self.file.as_fd()) {
            return false;
        }

        let mut tail = [0u8; ESCAPE_TAIL];
        let _ = self.file.read(&mut tail);
        true
    }

    fn set_canonical(&mut self, canonical: bool) -> Result<(), InputError> {
        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return Ok(()),
        };

        active.local_flags.set(LocalFlags::ICANON, canonical);
        termios::tcsetattr(self.file.as_fd(), SetArg::TCSANOW, active)?;
        Ok(())
    }

    fn enter_raw_mode(&mut self) -> Result<(), InputError> {
        let current = termios::tcgetattr(self.file.as_fd())?;

        let mut active = current.clone();
        active.local_flags.remove(LocalFlags::ECHO);
        active.local_flags.insert(LocalFlags::ICANON);
        active.input_flags.insert(InputFlags::IGNCR);
        termios::tcsetattr(self.file.as_fd(), SetArg::TCSANOW, &active)?;
        termios::tcflush(self.file.as_fd(), FlushArg::TCIFLUSH)?;

        self.saved = Some(current);
        self.active = Some(active);
        Ok(())
    }

    fn restore(&mut self) -> Result<(), InputError> {
        let saved = self.saved.take().ok_or(InputError::TerminalNotSaved)?;
        self.active = None;

        termios::tcsetattr(self.file.as_fd(), SetArg::TCSANOW, &saved)?;
        termios::tcflush(self.file.as_fd(), FlushArg::TCIFLUSH)?;
        Ok(())
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::pty::{openpty, Winsize};
    use std::collections::VecDeque;

    /// Scripted console: bytes to hand out plus a canonical-mode log
    #[derive(Default)]
    struct Script {
        bytes: VecDeque<u8>,
        canonical: Vec<bool>,
    }

    impl Script {
        fn typed(bytes: &[u8]) -> Self {
            Self {
                bytes: bytes.iter().copied().collect(),
                canonical: Vec::new(),
            }
        }
    }

    impl Console for Script {
        fn read_byte(&mut self) -> Option<u8> {
            self.bytes.pop_front()
        }

        fn discard_pending(&mut self) -> bool {
            if self.bytes.is_empty() {
                return false;
            }
            let keep = self.bytes.len().saturating_sub(ESCAPE_TAIL);
            self.bytes.drain(..self.bytes.len() - keep);
            true
        }

        fn set_canonical(&mut self, canonical: bool) -> Result<(), InputError> {
            self.canonical.push(canonical);
            Ok(())
        }

        fn enter_raw_mode(&mut self) -> Result<(), InputError> {
            Ok(())
        }

        fn restore(&mut self) -> Result<(), InputError> {
            Ok(())
        }
    }

    #[test]
    fn test_plain_characters() {
        let mut console = Script::typed(b"hi");
        assert_eq!(read_text(&mut console), Some('h' as u32));
        assert_eq!(read_text(&mut console), Some('i' as u32));
        assert_eq!(read_text(&mut console), None);
    }

    #[test]
    fn test_canonical_mode_is_dropped_only_while_reading() {
        let mut console = Script::typed(b"x");
        read_text(&mut console);
        assert_eq!(console.canonical, vec![false, true]);
    }

    #[test]
    fn test_backspace_and_delete_are_suppressed() {
        let mut console = Script::typed(&[BACKSPACE, DELETE]);
        assert_eq!(read_text(&mut console), None);
        assert_eq!(read_text(&mut console), None);
    }

    #[test]
    fn test_escape_sequence_is_swallowed() {
        // Up arrow
        let mut console = Script::typed(b"\x1b[A");
        assert_eq!(read_text(&mut console), None);
        assert!(console.bytes.is_empty());
    }

    #[test]
    fn test_lone_escape_is_text() {
        let mut console = Script::typed(&[ESCAPE]);
        assert_eq!(read_text(&mut console), Some(27));
    }

    #[test]
    fn test_pty_round_trip_restores_flags() {
        let pty = match openpty(None::<&Winsize>, None::<&Termios>) {
            Ok(pty) => pty,
            // No pty support in this sandbox
            Err(_) => return,
        };
        let before = termios::tcgetattr(pty.slave.as_fd()).unwrap();

        let mut terminal = Terminal::from_fd(pty.slave.try_clone().unwrap());
        terminal.enter_raw_mode().unwrap();

        let raw = termios::tcgetattr(pty.slave.as_fd()).unwrap();
        assert!(!raw.local_flags.contains(LocalFlags::ECHO));
        assert!(raw.local_flags.contains(LocalFlags::ICANON));
        assert!(raw.input_flags.contains(InputFlags::IGNCR));

        terminal.restore().unwrap();
        let after = termios::tcgetattr(pty.slave.as_fd()).unwrap();
        assert_eq!(
            after.local_flags & (LocalFlags::ECHO | LocalFlags::ICANON),
            before.local_flags & (LocalFlags::ECHO | LocalFlags::ICANON)
        );
        assert_eq!(after.input_flags, before.input_flags);
    }

    #[test]
    fn test_restore_without_save_fails() {
        let pty = match openpty(None::<&Winsize>, None::<&Termios>) {
            Ok(pty) => pty,
            Err(_) => return,
        };
        let mut terminal = Terminal::from_fd(pty.slave);
        assert!(matches!(terminal.restore(), Err(InputError::TerminalNotSaved)));
    }

    #[test]
    fn test_pending_bytes_are_read() {
        let pty = match openpty(None::<&Winsize>, None::<&Termios>) {
            Ok(pty) => pty,
            Err(_) => return,
        };
        let mut terminal = Terminal::from_fd(pty.slave);
        assert_eq!(terminal.read_byte(), None);
        assert!(!terminal.discard_pending());
    }
}
