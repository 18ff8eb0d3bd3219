//! Raw `struct input_event` records → normalized [`Event`]s
//!
//! The decoder owns all mutable input state: pressed keys and buttons, the
//! pointer position, the touch slots and the deferred Backspace/Delete text.

use evdev::{AbsoluteAxisType, EventType, InputEvent, RelativeAxisType, Synchronization};
use log::trace;
use std::collections::HashSet;

use super::event::{Event, EventQueue, KeyEvent, Position, Wheel};
use super::keys::{to_key, to_mouse_button, Key, MouseButton};
use super::touch::TouchSlots;

/// Kernel key value for an auto-repeat
const KEY_REPEAT: i32 = 2;

/// One kernel input record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(event_type: EventType, code: u16, value: i32) -> Self {
        Self {
            event_type: event_type.0,
            code,
            value,
        }
    }

    pub fn key(code: evdev::Key, value: i32) -> Self {
        Self::new(EventType::KEY, code.code(), value)
    }

    pub fn relative(axis: RelativeAxisType, value: i32) -> Self {
        Self::new(EventType::RELATIVE, axis.0, value)
    }

    pub fn absolute(axis: AbsoluteAxisType, value: i32) -> Self {
        Self::new(EventType::ABSOLUTE, axis.0, value)
    }

    pub fn sync_report() -> Self {
        Self::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0)
    }
}

impl From<InputEvent> for RawEvent {
    fn from(event: InputEvent) -> Self {
        Self {
            event_type: event.event_type().0,
            code: event.code(),
            value: event.value(),
        }
    }
}

/// Decoder state shared by every device
#[derive(Debug, Default)]
pub struct Decoder {
    keys: HashSet<Key>,
    buttons: HashSet<MouseButton>,
    pointer: Position,
    touch: TouchSlots,
    /// Index of the device that last produced multi-touch data
    touch_device: Option<usize>,
    deferred_text: Option<u32>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit text deferred by the previous record or pass; true if there was any
    pub fn flush_deferred(&mut self, queue: &mut EventQueue) -> bool {
        match self.deferred_text.take() {
            Some(unicode) => {
                queue.push(Event::TextEntered { unicode });
                true
            }
            None => false,
        }
    }

    /// Decode one record read from device `device`; true if it queued an event
    pub fn feed(&mut self, device: usize, raw: &RawEvent, queue: &mut EventQueue) -> bool {
        // Deferred text lands between the key press and whatever follows it
        let flushed = self.flush_deferred(queue);
        let decoded = match EventType(raw.event_type) {
            EventType::KEY => self.key(raw.code, raw.value, queue),
            EventType::RELATIVE => self.relative(raw.code, raw.value, queue),
            EventType::ABSOLUTE => {
                self.absolute(device, raw.code, raw.value);
                false
            }
            EventType::SYNCHRONIZATION
                if raw.code == Synchronization::SYN_REPORT.0 && self.touch_device == Some(device) =>
            {
                self.touch.sync(queue) > 0
            }
            _ => false,
        };
        flushed || decoded
    }

    fn key(&mut self, code: u16, value: i32, queue: &mut EventQueue) -> bool {
        if let Some(button) = to_mouse_button(code) {
            let pressed = value != 0;
            let Position { x, y } = self.pointer;
            if pressed {
                self.buttons.insert(button);
                queue.push(Event::MouseButtonPressed { button, x, y });
            } else {
                self.buttons.remove(&button);
                queue.push(Event::MouseButtonReleased { button, x, y });
            }
            return true;
        }

        let key = to_key(code);
        let control_text = key.control_text();

        if value == KEY_REPEAT {
            // Only Backspace/Delete repeat; other keys' repeats come through the terminal
            return match control_text {
                Some(unicode) => {
                    queue.push(Event::TextEntered { unicode });
                    true
                }
                None => false,
            };
        }

        if key == Key::Unknown {
            trace!("Unmapped key code {}", code);
            return false;
        }

        // Modifiers as they were before this key changed state
        let event = KeyEvent {
            code: key,
            alt: self.alt(),
            control: self.control(),
            shift: self.shift(),
            system: self.system(),
        };

        let pressed = value != 0;
        if pressed {
            self.keys.insert(key);
            queue.push(Event::KeyPressed(event));
            if control_text.is_some() {
                self.deferred_text = control_text;
            }
        } else {
            self.keys.remove(&key);
            queue.push(Event::KeyReleased(event));
        }
        true
    }

    fn relative(&mut self, code: u16, value: i32, queue: &mut EventQueue) -> bool {
        let Position { x, y } = self.pointer;
        match RelativeAxisType(code) {
            RelativeAxisType::REL_X => {
                self.pointer.x = x.saturating_add(value);
            }
            RelativeAxisType::REL_Y => {
                self.pointer.y = y.saturating_add(value);
            }
            RelativeAxisType::REL_WHEEL => {
                queue.push(Event::MouseWheelMoved {
                    wheel: Wheel::Vertical,
                    delta: value,
                    x,
                    y,
                });
                return true;
            }
            RelativeAxisType::REL_HWHEEL => {
                queue.push(Event::MouseWheelMoved {
                    wheel: Wheel::Horizontal,
                    delta: value,
                    x,
                    y,
                });
                return true;
            }
            _ => return false,
        }

        queue.push(Event::MouseMoved {
            x: self.pointer.x,
            y: self.pointer.y,
        });
        true
    }

    fn absolute(&mut self, device: usize, code: u16, value: i32) {
        match AbsoluteAxisType(code) {
            AbsoluteAxisType::ABS_MT_SLOT => self.touch.select(value),
            AbsoluteAxisType::ABS_MT_TRACKING_ID => self.touch.set_tracking_id(value),
            AbsoluteAxisType::ABS_MT_POSITION_X => self.touch.set_x(value),
            AbsoluteAxisType::ABS_MT_POSITION_Y => self.touch.set_y(value),
            _ => return,
        }
        self.touch_device = Some(device);
    }

    fn alt(&self) -> bool {
        self.keys.contains(&Key::LAlt) || self.keys.contains(&Key::RAlt)
    }

    fn control(&self) -> bool {
        self.keys.contains(&Key::LControl) || self.keys.contains(&Key::RControl)
    }

    fn shift(&self) -> bool {
        self.keys.contains(&Key::LShift) || self.keys.contains(&Key::RShift)
    }

    fn system(&self) -> bool {
        self.keys.contains(&Key::LSystem) || self.keys.contains(&Key::RSystem)
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_button_pressed(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn pointer(&self) -> Position {
        self.pointer
    }

    pub fn set_pointer(&mut self, position: Position) {
        self.pointer = position;
    }

    pub fn touch(&self) -> &TouchSlots {
        &self.touch
    }
}
