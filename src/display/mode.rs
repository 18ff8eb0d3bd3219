//! Display mode types and mode resolution

use drm::control::{Mode, ModeTypeFlags};

/// Geometry and refresh rate of the active display mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    /// Vertical refresh in Hz
    pub refresh: u32,
}

impl DisplayMode {
    pub fn is_zero(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// A toolkit-facing video mode (size plus color depth)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoMode {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
}

impl VideoMode {
    pub fn new(width: u32, height: u32, bits_per_pixel: u32) -> Self {
        Self {
            width,
            height,
            bits_per_pixel,
        }
    }
}

/// Connector mode reduced to what mode resolution looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDescriptor {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    pub preferred: bool,
}

impl From<&Mode> for ModeDescriptor {
    fn from(mode: &Mode) -> Self {
        let (width, height) = mode.size();
        Self {
            name: mode.name().to_string_lossy().into_owned(),
            width: width.into(),
            height: height.into(),
            refresh: mode.vrefresh(),
            preferred: mode.mode_type().contains(ModeTypeFlags::PREFERRED),
        }
    }
}

impl From<&ModeDescriptor> for DisplayMode {
    fn from(mode: &ModeDescriptor) -> Self {
        Self {
            width: mode.width,
            height: mode.height,
            refresh: mode.refresh,
        }
    }
}

/// Explicit mode request (name plus optional refresh rate, 0 = any)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeRequest {
    pub name: String,
    pub refresh: u32,
}

/// Pick the index of the mode to drive.
///
/// With a request, the first mode whose name matches (and whose refresh
/// matches, unless the requested refresh is 0) wins; an unmatched request
/// yields `None`. Without one, the connector's preferred mode is used, else
/// its first mode.
pub fn select_mode(modes: &[ModeDescriptor], request: Option<&ModeRequest>) -> Option<usize> {
    match request {
        Some(request) => modes.iter().position(|mode| {
            mode.name == request.name && (request.refresh == 0 || mode.refresh == request.refresh)
        }),
        None => modes
            .iter()
            .position(|mode| mode.preferred)
            .or(if modes.is_empty() { None } else { Some(0) }),
    }
}
