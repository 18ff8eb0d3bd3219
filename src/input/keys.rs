//! Logical keys and mouse buttons, and the scan-code tables feeding them

use evdev::Key as ScanCode;

/// Toolkit-level keyboard key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Unknown,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    Escape,
    LControl,
    LShift,
    LAlt,
    LSystem,
    RControl,
    RShift,
    RAlt,
    RSystem,
    Menu,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Period,
    Quote,
    Slash,
    Backslash,
    Tilde,
    Equal,
    Hyphen,
    Space,
    Enter,
    Backspace,
    Tab,
    PageUp,
    PageDown,
    End,
    Home,
    Insert,
    Delete,
    Add,
    Subtract,
    Multiply,
    Divide,
    Left,
    Right,
    Up,
    Down,
    Numpad0,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad5,
    Numpad6,
    Numpad7,
    Numpad8,
    Numpad9,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    Pause,
}

impl Key {
    /// Text synthesized for keys the terminal path does not report
    pub fn control_text(self) -> Option<u32> {
        match self {
            Key::Backspace => Some(8),
            Key::Delete => Some(127),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    XButton1,
    XButton2,
}

/// Map a kernel button code; `None` for anything that is not a mouse button
pub fn to_mouse_button(code: u16) -> Option<MouseButton> {
    match ScanCode::new(code) {
        ScanCode::BTN_LEFT => Some(MouseButton::Left),
        ScanCode::BTN_RIGHT => Some(MouseButton::Right),
        ScanCode::BTN_MIDDLE => Some(MouseButton::Middle),
        ScanCode::BTN_SIDE => Some(MouseButton::XButton1),
        ScanCode::BTN_EXTRA => Some(MouseButton::XButton2),
        _ => None,
    }
}

/// Map a kernel key code; unmapped codes give [`Key::Unknown`]
pub fn to_key(code: u16) -> Key {
    match ScanCode::new(code) {
        ScanCode::KEY_ESC => Key::Escape,
        ScanCode::KEY_1 => Key::Num1,
        ScanCode::KEY_2 => Key::Num2,
        ScanCode::KEY_3 => Key::Num3,
        ScanCode::KEY_4 => Key::Num4,
        ScanCode::KEY_5 => Key::Num5,
        ScanCode::KEY_6 => Key::Num6,
        ScanCode::KEY_7 => Key::Num7,
        ScanCode::KEY_8 => Key::Num8,
        ScanCode::KEY_9 => Key::Num9,
        ScanCode::KEY_0 => Key::Num0,
        ScanCode::KEY_MINUS => Key::Hyphen,
        ScanCode::KEY_EQUAL => Key::Equal,
        ScanCode::KEY_BACKSPACE => Key::Backspace,
        ScanCode::KEY_TAB => Key::Tab,
        ScanCode::KEY_Q => Key::Q,
        ScanCode::KEY_W => Key::W,
        ScanCode::KEY_E => Key::E,
        ScanCode::KEY_R => Key::R,
        ScanCode::KEY_T => Key::T,
        ScanCode::KEY_Y => Key::Y,
        ScanCode::KEY_U => Key::U,
        ScanCode::KEY_I => Key::I,
        ScanCode::KEY_O => Key::O,
        ScanCode::KEY_P => Key::P,
        ScanCode::KEY_LEFTBRACE => Key::LBracket,
        ScanCode::KEY_RIGHTBRACE => Key::RBracket,
        ScanCode::KEY_KPENTER | ScanCode::KEY_ENTER => Key::Enter,
        ScanCode::KEY_LEFTCTRL => Key::LControl,
        ScanCode::KEY_A => Key::A,
        ScanCode::KEY_S => Key::S,
        ScanCode::KEY_D => Key::D,
        ScanCode::KEY_F => Key::F,
        ScanCode::KEY_G => Key::G,
        ScanCode::KEY_H => Key::H,
        ScanCode::KEY_J => Key::J,
        ScanCode::KEY_K => Key::K,
        ScanCode::KEY_L => Key::L,
        ScanCode::KEY_SEMICOLON => Key::Semicolon,
        ScanCode::KEY_APOSTROPHE => Key::Quote,
        ScanCode::KEY_GRAVE => Key::Tilde,
        ScanCode::KEY_LEFTSHIFT => Key::LShift,
        ScanCode::KEY_BACKSLASH => Key::Backslash,
        ScanCode::KEY_Z => Key::Z,
        ScanCode::KEY_X => Key::X,
        ScanCode::KEY_C => Key::C,
        ScanCode::KEY_V => Key::V,
        ScanCode::KEY_B => Key::B,
        ScanCode::KEY_N => Key::N,
        ScanCode::KEY_M => Key::M,
        ScanCode::KEY_COMMA => Key::Comma,
        ScanCode::KEY_DOT => Key::Period,
        ScanCode::KEY_SLASH => Key::Slash,
        ScanCode::KEY_RIGHTSHIFT => Key::RShift,
        ScanCode::KEY_KPASTERISK => Key::Multiply,
        ScanCode::KEY_LEFTALT => Key::LAlt,
        ScanCode::KEY_SPACE => Key::Space,
        ScanCode::KEY_F1 => Key::F1,
        ScanCode::KEY_F2 => Key::F2,
        ScanCode::KEY_F3 => Key::F3,
        ScanCode::KEY_F4 => Key::F4,
        ScanCode::KEY_F5 => Key::F5,
        ScanCode::KEY_F6 => Key::F6,
        ScanCode::KEY_F7 => Key::F7,
        ScanCode::KEY_F8 => Key::F8,
        ScanCode::KEY_F9 => Key::F9,
        ScanCode::KEY_F10 => Key::F10,
        ScanCode::KEY_F11 => Key::F11,
        ScanCode::KEY_F12 => Key::F12,
        ScanCode::KEY_F13 => Key::F13,
        ScanCode::KEY_F14 => Key::F14,
        ScanCode::KEY_F15 => Key::F15,
        ScanCode::KEY_KP7 => Key::Numpad7,
        ScanCode::KEY_KP8 => Key::Numpad8,
        ScanCode::KEY_KP9 => Key::Numpad9,
        ScanCode::KEY_KPMINUS => Key::Subtract,
        ScanCode::KEY_KP4 => Key::Numpad4,
        ScanCode::KEY_KP5 => Key::Numpad5,
        ScanCode::KEY_KP6 => Key::Numpad6,
        ScanCode::KEY_KPPLUS => Key::Add,
        ScanCode::KEY_KP1 => Key::Numpad1,
        ScanCode::KEY_KP2 => Key::Numpad2,
        ScanCode::KEY_KP3 => Key::Numpad3,
        ScanCode::KEY_KP0 => Key::Numpad0,
        ScanCode::KEY_KPDOT => Key::Delete,
        ScanCode::KEY_RIGHTCTRL => Key::RControl,
        ScanCode::KEY_KPSLASH => Key::Divide,
        ScanCode::KEY_RIGHTALT => Key::RAlt,
        ScanCode::KEY_HOME => Key::Home,
        ScanCode::KEY_UP => Key::Up,
        ScanCode::KEY_PAGEUP => Key::PageUp,
        ScanCode::KEY_LEFT => Key::Left,
        ScanCode::KEY_RIGHT => Key::Right,
        ScanCode::KEY_END => Key::End,
        ScanCode::KEY_DOWN => Key::Down,
        ScanCode::KEY_PAGEDOWN => Key::PageDown,
        ScanCode::KEY_INSERT => Key::Insert,
        ScanCode::KEY_DELETE => Key::Delete,
        ScanCode::KEY_PAUSE => Key::Pause,
        ScanCode::KEY_LEFTMETA => Key::LSystem,
        ScanCode::KEY_RIGHTMETA => Key::RSystem,
        ScanCode::KEY_COMPOSE => Key::Menu,
        // KEY_RESERVED, SYSRQ and the lock keys included
        _ => Key::Unknown,
    }
}
