//! Kernel display resource layer
//!
//! Opens the DRM card node, picks the connector, CRTC and mode to drive, and
//! remembers what the CRTC was showing before we touched it. The
//! [`DisplayHandle`] is shared by every render context and window through
//! [`crate::shared::Shared`]; dropping the last reference restores the saved
//! CRTC configuration and closes the node.
//!
//! # Selection rules
//!
//! - device: `display.device` (or `KMSVIEW_DRM_DEVICE`), else the first
//!   `/dev/dri/cardN` with a connected output
//! - connector: the first connected connector
//! - mode: the requested name/refresh, else the preferred mode, else the first
//! - CRTC: the one behind the connector's current encoder, else the first
//!   CRTC any of its encoders can drive

use log::{error, info, warn};
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::Path;

use drm::control::{
    connector, crtc, framebuffer, Device as ControlDevice, Event, Mode, PageFlipFlags,
    ResourceHandles,
};

use crate::config::DisplayConfig;
use crate::error::DisplayError;

pub mod card;
pub mod mode;

pub use card::Card;
pub use mode::{select_mode, DisplayMode, ModeDescriptor, ModeRequest, VideoMode};

/// The process-wide display: DRM node, GBM device and the chosen pipeline
pub struct DisplayHandle {
    gbm: gbm::Device<Card>,
    connector: connector::Handle,
    crtc: crtc::Handle,
    mode: Mode,
    modes: Vec<ModeDescriptor>,
    saved_crtc: Option<crtc::Info>,
}

impl DisplayHandle {
    /// Open and configure the display described by `config`
    pub fn open(config: &DisplayConfig) -> Result<Self, DisplayError> {
        let card = Card::discover(config.device.as_deref(), config.card_scan_limit)?;
        let resources = card.resource_handles().map_err(DisplayError::Resources)?;

        let connector = resources
            .connectors()
            .iter()
            .filter_map(|&handle| card.get_connector(handle, true).ok())
            .find(|info| info.state() == connector::State::Connected && !info.modes().is_empty())
            .ok_or(DisplayError::NoConnector)?;

        let modes: Vec<ModeDescriptor> = connector.modes().iter().map(ModeDescriptor::from).collect();
        let request = config.mode.as_ref().map(|name| ModeRequest {
            name: name.clone(),
            refresh: config.refresh,
        });
        let index = match select_mode(&modes, request.as_ref()) {
            Some(index) => index,
            None => {
                return Err(match request {
                    Some(request) => DisplayError::ModeNotFound {
                        name: request.name,
                        refresh: request.refresh,
                    },
                    None => DisplayError::NoMode,
                })
            }
        };
        let mode = connector.modes()[index];

        let crtc = Self::find_crtc(&card, &resources, &connector).ok_or(DisplayError::NoCrtc)?;
        let saved_crtc = card.get_crtc(crtc).ok();

        info!(
            "🖥️ {} → {:?}-{} on CRTC {:?}: {} @ {}Hz",
            card.path().display(),
            connector.interface(),
            connector.interface_id(),
            crtc,
            modes[index].name,
            modes[index].refresh
        );

        let gbm = gbm::Device::new(card).map_err(DisplayError::Gbm)?;

        Ok(Self {
            gbm,
            connector: connector.handle(),
            crtc,
            mode,
            modes,
            saved_crtc,
        })
    }

    fn find_crtc(
        card: &Card,
        resources: &ResourceHandles,
        connector: &connector::Info,
    ) -> Option<crtc::Handle> {
        let current = connector
            .current_encoder()
            .and_then(|encoder| card.get_encoder(encoder).ok())
            .and_then(|encoder| encoder.crtc());
        if current.is_some() {
            return current;
        }

        connector
            .encoders()
            .iter()
            .filter_map(|&encoder| card.get_encoder(encoder).ok())
            .find_map(|encoder| {
                resources
                    .filter_crtcs(encoder.possible_crtcs())
                    .first()
                    .copied()
            })
    }

    pub fn card(&self) -> &Card {
        &self.gbm
    }

    pub fn gbm(&self) -> &gbm::Device<Card> {
        &self.gbm
    }

    pub fn path(&self) -> &Path {
        self.card().path()
    }

    pub fn raw_fd(&self) -> RawFd {
        self.card().as_fd().as_raw_fd()
    }

    pub fn connector(&self) -> connector::Handle {
        self.connector
    }

    pub fn crtc(&self) -> crtc::Handle {
        self.crtc
    }

    /// The resolved mode
    pub fn mode(&self) -> DisplayMode {
        let (width, height) = self.mode.size();
        DisplayMode {
            width: width.into(),
            height: height.into(),
            refresh: self.mode.vrefresh(),
        }
    }

    /// Every mode the connector offers
    pub fn modes(&self) -> &[ModeDescriptor] {
        &self.modes
    }

    /// Synchronous mode-set scanning out `fb` on our CRTC
    pub fn set_crtc(&self, fb: framebuffer::Handle) -> io::Result<()> {
        self.card()
            .set_crtc(self.crtc, Some(fb), (0, 0), &[self.connector], Some(self.mode))
    }

    /// Queue a flip to `fb` at the next vblank, with a completion event
    pub fn page_flip(&self, fb: framebuffer::Handle) -> io::Result<()> {
        self.card()
            .page_flip(self.crtc, fb, PageFlipFlags::EVENT, None)
    }

    /// Read pending DRM events; true if one of them completes a flip on our CRTC
    pub fn drain_flip_events(&self) -> io::Result<bool> {
        let mut flipped = false;
        for event in self.card().receive_events()? {
            if let Event::PageFlip(flip) = event {
                if flip.crtc == self.crtc {
                    flipped = true;
                }
            }
        }
        Ok(flipped)
    }

    fn restore_crtc(&self) {
        let result = match &self.saved_crtc {
            Some(saved) if saved.mode().is_some() => self.card().set_crtc(
                self.crtc,
                saved.framebuffer(),
                saved.position(),
                &[self.connector],
                saved.mode(),
            ),
            // The CRTC was off before we lit it up
            _ => self.card().set_crtc(self.crtc, None, (0, 0), &[], None),
        };

        match result {
            Ok(()) => info!("🔌 Restored original CRTC configuration"),
            Err(e) => error!("Failed to restore CRTC configuration: {}", e),
        }
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        if self.saved_crtc.is_none() {
            warn!("No saved CRTC state; turning the CRTC off");
        }
        self.restore_crtc();
    }
}

impl std::fmt::Debug for DisplayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayHandle")
            .field("path", &self.path())
            .field("connector", &self.connector)
            .field("crtc", &self.crtc)
            .field("mode", &self.mode())
            .finish()
    }
}
