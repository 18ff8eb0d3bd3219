//! Error types for the display, GPU and input layers
//!
//! Every failure is reported through one of these enums. Callers decide what
//! to do with them, but the classification follows a fixed rule:
//! - fatal errors (`is_fatal() == true`) leave the display in an undefined
//!   state and presenting must stop
//! - everything else is degraded: the object could not be created or used,
//!   the error is logged, and the caller carries on without it
//!
//! Frame-level hiccups (a refused page flip, an interrupted flip wait) are not
//! errors at all; see [`crate::gpu::PresentOutcome`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the kernel display resource layer
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to open DRM device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no usable DRM device found (probed {probed} card nodes)")]
    NoDevice { probed: usize },

    #[error("failed to query DRM resources: {0}")]
    Resources(#[source] io::Error),

    #[error("no connected connector found")]
    NoConnector,

    #[error("requested mode {name:?} (refresh {refresh}) is not offered by the connector")]
    ModeNotFound { name: String, refresh: u32 },

    #[error("connector offers no modes")]
    NoMode,

    #[error("no CRTC can drive the selected connector")]
    NoCrtc,

    #[error("failed to create GBM device: {0}")]
    Gbm(#[source] io::Error),
}

/// Failures of the GPU surface layer (EGL binding, contexts, surfaces)
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to load libEGL: {0}")]
    Load(String),

    #[error("required EGL extension missing: {0}")]
    MissingPlatformExtension(&'static str),

    #[error("EGL call {call} failed: {source}")]
    Egl {
        call: &'static str,
        #[source]
        source: khronos_egl::Error,
    },

    #[error("EGL returned no display for the GBM device")]
    NoDisplay,

    #[error("no EGL config matches {bits_per_pixel} bpp / depth {depth} / stencil {stencil} / {samples}x AA")]
    NoConfig {
        bits_per_pixel: u32,
        depth: u32,
        stencil: u32,
        samples: u32,
    },

    #[error("failed to create GBM surface {width}x{height}: {source}")]
    Surface {
        width: u32,
        height: u32,
        #[source]
        source: io::Error,
    },

    #[error("context has no surface")]
    NoSurface,

    #[error(transparent)]
    Display(#[from] DisplayError),
}

impl GpuError {
    pub(crate) fn egl(call: &'static str) -> impl FnOnce(khronos_egl::Error) -> GpuError {
        move |source| GpuError::Egl { call, source }
    }

    /// Whether the process cannot keep using the GPU after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, GpuError::MissingPlatformExtension(_))
    }
}

/// Failures of the present protocol
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("buffer swap failed: {0}")]
    Swap(String),

    /// The first mode-set after a completed swap was refused.
    #[error("failed to set mode on CRTC: {0}")]
    ModeSet(#[source] io::Error),
}

impl PresentError {
    /// A refused initial mode-set leaves the CRTC in an undefined state
    pub fn is_fatal(&self) -> bool {
        matches!(self, PresentError::ModeSet(_))
    }
}

/// Failures of the raw input subsystem
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to open input device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("terminal configuration failed: {0}")]
    Terminal(#[from] nix::Error),

    #[error("terminal configuration was never saved")]
    TerminalNotSaved,
}
