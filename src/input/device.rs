//! Kernel input devices
//!
//! [`enumerate`] probes `event0 .. event{max_devices-1}` once, keeps the
//! devices [`Capabilities::classify`] recognises and wraps each in an
//! [`EvdevSource`]. The decoder only sees the [`EventSource`] trait.

use log::{debug, error, info};
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use super::caps::{Capabilities, DeviceClass};
use super::decoder::RawEvent;
use crate::config::InputConfig;
use crate::error::InputError;

/// A non-blocking stream of raw input records
pub trait EventSource: Send {
    fn name(&self) -> &str;

    fn class(&self) -> DeviceClass;

    /// Append every record currently available to `out`.
    ///
    /// Returns `Err` with [`io::ErrorKind::WouldBlock`] when nothing was
    /// pending; records read before any error are still appended.
    fn fetch(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()>;
}

/// An open `/dev/input/eventN` node
pub struct EvdevSource {
    device: evdev::Device,
    path: PathBuf,
    name: String,
    class: DeviceClass,
}

impl EvdevSource {
    /// Open `path` non-blocking; `Ok(None)` if it is not a keyboard, mouse or touch device
    pub fn open(path: &Path) -> Result<Option<Self>, InputError> {
        let opened = |source: io::Error| InputError::Open {
            path: path.to_path_buf(),
            source,
        };
        let device = evdev::Device::open(path).map_err(opened)?;
        set_nonblocking(device.as_raw_fd()).map_err(opened)?;
        let class = Capabilities::of(&device).classify();
        let name = device.name().unwrap_or("unnamed device").to_string();

        if !class.is_input() {
            debug!("Skipping {} ({})", path.display(), name);
            return Ok(None);
        }

        Ok(Some(Self {
            device,
            path: path.to_path_buf(),
            name,
            class,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for EvdevSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> DeviceClass {
        self.class
    }

    fn fetch(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()> {
        let events = self.device.fetch_events()?;
        out.extend(events.map(RawEvent::from));
        Ok(())
    }
}

impl std::fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevSource")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("class", &self.class)
            .finish()
    }
}

/// Add `O_NONBLOCK` to the status flags of `fd`.
///
/// `evdev::Device::open` leaves the node blocking, and a read on a quiet
/// device would stall the whole input pass.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

/// Device node paths probed for `config`
pub fn candidate_paths(config: &InputConfig) -> impl Iterator<Item = PathBuf> + '_ {
    (0..config.max_devices).map(move |index| config.device_dir.join(format!("event{}", index)))
}

/// Open every keyboard, mouse and touch device under `config.device_dir`
pub fn enumerate(config: &InputConfig) -> Vec<Box<dyn EventSource>> {
    let mut sources: Vec<Box<dyn EventSource>> = Vec::new();

    for path in candidate_paths(config) {
        match EvdevSource::open(&path) {
            Ok(Some(source)) => {
                info!(
                    "⌨️ {} ({}) as {}",
                    source.name(),
                    path.display(),
                    source.class()
                );
                sources.push(Box::new(source));
            }
            Ok(None) => {}
            Err(InputError::Open { source, .. }) if source.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!("{}", e),
        }
    }

    if sources.is_empty() {
        debug!("No input devices found under {}", config.device_dir.display());
    }

    sources
}
