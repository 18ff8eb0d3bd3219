//! GPU surface and present engine
//!
//! [`GpuDevice`] is the process-wide EGL display bound to the GBM device of the
//! shared [`DisplayHandle`]. Every [`RenderContext`] holds an `Arc` to it, so
//! the EGL display is terminated, and then the CRTC restored, when the last
//! context goes away.

use std::sync::Arc;

use crate::config::ContextConfig;
use crate::display::DisplayHandle;
use crate::error::GpuError;

pub mod context;
pub mod egl;
pub mod present;
pub mod wait;

pub use context::{RenderContext, WindowSurface};
pub use egl::{ClientApi, EglDisplay};
pub use present::{PresentOutcome, Presenter, ScanoutTarget, SkipReason};
pub use wait::FlipWait;

/// Requested (and, after creation, actual) context attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSettings {
    pub depth_bits: u32,
    pub stencil_bits: u32,
    pub antialiasing_level: u32,
    pub major_version: u32,
    pub minor_version: u32,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            depth_bits: 0,
            stencil_bits: 0,
            antialiasing_level: 0,
            major_version: 1,
            minor_version: 1,
        }
    }
}

impl From<&ContextConfig> for ContextSettings {
    fn from(config: &ContextConfig) -> Self {
        Self {
            depth_bits: config.depth_bits,
            stencil_bits: config.stencil_bits,
            antialiasing_level: config.antialiasing_level,
            ..Self::default()
        }
    }
}

/// The EGL display plus the display resources it renders to
pub struct GpuDevice {
    // Declared first: EGL is terminated before the CRTC is restored
    egl: EglDisplay,
    display: Arc<DisplayHandle>,
}

impl GpuDevice {
    pub fn new(display: Arc<DisplayHandle>, api: ClientApi) -> Result<Self, GpuError> {
        let egl = EglDisplay::initialize(display.gbm(), api)?;
        Ok(Self { egl, display })
    }

    pub fn egl(&self) -> &EglDisplay {
        &self.egl
    }

    pub fn display(&self) -> &Arc<DisplayHandle> {
        &self.display
    }
}

impl std::fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDevice")
            .field("egl", &self.egl)
            .field("display", &self.display)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = ContextConfig {
            depth_bits: 24,
            stencil_bits: 8,
            antialiasing_level: 2,
            ..ContextConfig::default()
        };
        let settings = ContextSettings::from(&config);

        assert_eq!(settings.depth_bits, 24);
        assert_eq!(settings.stencil_bits, 8);
        assert_eq!(settings.antialiasing_level, 2);
        assert_eq!((settings.major_version, settings.minor_version), (1, 1));
    }
}
