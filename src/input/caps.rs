//! Device classification from evdev capability bits
//!
//! A device is kept when it looks like a keyboard, a mouse or a touch
//! surface. Joysticks and everything else are left alone.

use evdev::{AbsoluteAxisType, Key as ScanCode, RelativeAxisType};

/// `BTN_MOUSE`, the first mouse button code (same value as `BTN_LEFT`)
const BTN_MOUSE: ScanCode = ScanCode::BTN_LEFT;

/// Capability bits relevant to classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Key and button codes the device reports
    pub keys: Vec<u16>,
    /// Reports both ABS_X and ABS_Y
    pub absolute_xy: bool,
    /// Reports both REL_X and REL_Y
    pub relative_xy: bool,
}

/// What a device was recognised as; a device may be several at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceClass {
    pub keyboard: bool,
    pub mouse: bool,
    pub touch: bool,
}

impl DeviceClass {
    pub fn is_input(&self) -> bool {
        self.keyboard || self.mouse || self.touch
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&str> = [
            (self.keyboard, "keyboard"),
            (self.mouse, "mouse"),
            (self.touch, "touch"),
        ]
        .iter()
        .filter(|(is, _)| *is)
        .map(|(_, name)| *name)
        .collect();

        if kinds.is_empty() {
            write!(f, "other")
        } else {
            write!(f, "{}", kinds.join("+"))
        }
    }
}

impl Capabilities {
    /// Read the capability bits of an open device
    pub fn of(device: &evdev::Device) -> Self {
        let keys = device
            .supported_keys()
            .map(|keys| keys.iter().map(|key| key.code()).collect())
            .unwrap_or_default();

        let absolute_xy = device
            .supported_absolute_axes()
            .map(|axes| axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y))
            .unwrap_or(false);

        let relative_xy = device
            .supported_relative_axes()
            .map(|axes| axes.contains(RelativeAxisType::REL_X) && axes.contains(RelativeAxisType::REL_Y))
            .unwrap_or(false);

        Self {
            keys,
            absolute_xy,
            relative_xy,
        }
    }

    fn has_key(&self, key: ScanCode) -> bool {
        self.keys.contains(&key.code())
    }

    /// Any of the first 32 key codes (Esc, the number row, Q..D), ignoring KEY_RESERVED
    pub fn is_keyboard(&self) -> bool {
        self.keys.iter().any(|&code| (1..32).contains(&code))
    }

    pub fn is_mouse(&self) -> bool {
        (self.absolute_xy || self.relative_xy) && self.has_key(BTN_MOUSE)
    }

    pub fn is_touch(&self) -> bool {
        self.absolute_xy
            && (self.has_key(ScanCode::BTN_TOOL_FINGER) || self.has_key(ScanCode::BTN_TOUCH))
    }

    pub fn classify(&self) -> DeviceClass {
        DeviceClass {
            keyboard: self.is_keyboard(),
            mouse: self.is_mouse(),
            touch: self.is_touch(),
        }
    }
}
