//! DRM device node handling

use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use drm::control::{connector, Device as ControlDevice};

use crate::error::DisplayError;

/// An open DRM card node
#[derive(Debug)]
pub struct Card {
    file: File,
    path: PathBuf,
}

impl AsFd for Card {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl drm::Device for Card {}
impl ControlDevice for Card {}

impl Card {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DisplayError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| DisplayError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the node exposes mode-setting resources and a connected output
    fn drives_a_display(&self) -> bool {
        let resources = match self.resource_handles() {
            Ok(resources) => resources,
            Err(_) => return false,
        };

        resources.connectors().iter().any(|&handle| {
            self.get_connector(handle, false)
                .map(|info| info.state() == connector::State::Connected)
                .unwrap_or(false)
        })
    }

    /// Open the configured node, or the first `/dev/dri/cardN` that drives a display
    pub fn discover(explicit: Option<&Path>, scan_limit: u32) -> Result<Self, DisplayError> {
        if let Some(path) = explicit {
            return Self::open(path);
        }

        for index in 0..scan_limit {
            let path = PathBuf::from(format!("/dev/dri/card{}", index));
            if !path.exists() {
                continue;
            }

            match Self::open(&path) {
                Ok(card) if card.drives_a_display() => {
                    debug!("🖥️ Auto-detected DRM device {}", path.display());
                    return Ok(card);
                }
                Ok(_) => debug!("{} has no connected output, skipping", path.display()),
                Err(e) => warn!("{}", e),
            }
        }

        Err(DisplayError::NoDevice {
            probed: scan_limit as usize,
        })
    }
}
