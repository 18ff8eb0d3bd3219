//! Window facade
//!
//! There is no compositor underneath: a window is the whole display. Geometry
//! is whatever was requested at creation, position is always the origin, and
//! the decorative setters are accepted and ignored. What a window does do is
//! put the terminal into its quiet mode for its lifetime and forward decoded
//! input to the toolkit.

use log::{debug, warn};
use std::collections::VecDeque;
use std::os::fd::RawFd;
use std::sync::Arc;

use crate::display::{DisplayHandle, VideoMode};
use crate::input::{Event, InputSystem};

/// Native handle of a window: the DRM device descriptor, when there is one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowHandle {
    pub drm_fd: Option<RawFd>,
}

/// Operations a toolkit expects from a platform window
pub trait WindowImpl {
    fn size(&self) -> (u32, u32);

    fn position(&self) -> (i32, i32) {
        (0, 0)
    }

    fn set_position(&mut self, _x: i32, _y: i32) {}

    fn set_size(&mut self, _width: u32, _height: u32) {}

    fn set_title(&mut self, _title: &str) {}

    fn set_icon(&mut self, _width: u32, _height: u32, _pixels: &[u8]) {}

    fn set_visible(&mut self, _visible: bool) {}

    fn set_mouse_cursor_visible(&mut self, _visible: bool) {}

    fn set_mouse_cursor_grabbed(&mut self, _grabbed: bool) {}

    fn set_key_repeat_enabled(&mut self, _enabled: bool) {}

    fn set_virtual_keyboard_visible(&mut self, _visible: bool) {}

    fn request_focus(&mut self) {}

    fn has_focus(&self) -> bool {
        true
    }

    /// Move every pending input event into the window's own queue
    fn process_events(&mut self);

    fn pop_event(&mut self) -> Option<Event>;

    fn system_handle(&self) -> WindowHandle;
}

/// A full-screen window on a KMS display
pub struct DrmWindow {
    size: (u32, u32),
    title: String,
    events: VecDeque<Event>,
    terminal_configured: bool,
    input: Arc<InputSystem>,
    display: Option<Arc<DisplayHandle>>,
}

impl DrmWindow {
    /// Create a window of `mode`'s size; the terminal switches to window mode
    pub fn new(
        input: Arc<InputSystem>,
        display: Option<Arc<DisplayHandle>>,
        mode: VideoMode,
        title: &str,
    ) -> Self {
        let terminal_configured = Self::configure_terminal(&input);
        debug!("🪟 Window {}x{} \"{}\"", mode.width, mode.height, title);

        Self {
            size: (mode.width, mode.height),
            title: title.to_string(),
            events: VecDeque::new(),
            terminal_configured,
            input,
            display,
        }
    }

    /// Wrap an existing native handle; the window has no size of its own
    pub fn from_handle(input: Arc<InputSystem>, display: Option<Arc<DisplayHandle>>) -> Self {
        Self::new(input, display, VideoMode::default(), "")
    }

    fn configure_terminal(input: &InputSystem) -> bool {
        match input.set_terminal_config() {
            Ok(()) => true,
            Err(e) => {
                warn!("Terminal left unchanged: {}", e);
                false
            }
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn input(&self) -> &Arc<InputSystem> {
        &self.input
    }

    pub fn display(&self) -> Option<&Arc<DisplayHandle>> {
        self.display.as_ref()
    }

    /// Events collected by `process_events` and not yet popped
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}

impl WindowImpl for DrmWindow {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn process_events(&mut self) {
        while let Some(event) = self.input.check_event() {
            self.events.push_back(event);
        }
    }

    fn pop_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn system_handle(&self) -> WindowHandle {
        WindowHandle {
            drm_fd: self.display.as_ref().map(|display| display.raw_fd()),
        }
    }
}

impl Drop for DrmWindow {
    fn drop(&mut self) {
        if !self.terminal_configured {
            return;
        }

        if let Err(e) = self.input.restore_terminal_config() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

impl std::fmt::Debug for DrmWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrmWindow")
            .field("size", &self.size)
            .field("title", &self.title)
            .field("pending_events", &self.events.len())
            .field("has_display", &self.display.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;
    use crate::error::InputError;
    use crate::input::{Console, DeviceClass, EventSource, RawEvent};
    use evdev::Key as ScanCode;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneShot(Option<Vec<RawEvent>>);

    impl EventSource for OneShot {
        fn name(&self) -> &str {
            "one-shot"
        }

        fn class(&self) -> DeviceClass {
            DeviceClass {
                keyboard: true,
                ..DeviceClass::default()
            }
        }

        fn fetch(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()> {
            match self.0.take() {
                Some(batch) => {
                    out.extend(batch);
                    Ok(())
                }
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    /// Counts terminal configuration calls
    #[derive(Clone, Default)]
    struct Modes {
        entered: Arc<AtomicUsize>,
        restored: Arc<AtomicUsize>,
    }

    impl Console for Modes {
        fn read_byte(&mut self) -> Option<u8> {
            None
        }
        fn discard_pending(&mut self) -> bool {
            false
        }
        fn set_canonical(&mut self, _: bool) -> Result<(), InputError> {
            Ok(())
        }
        fn enter_raw_mode(&mut self) -> Result<(), InputError> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn restore(&mut self) -> Result<(), InputError> {
            self.restored.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn input_with(batch: Vec<RawEvent>, modes: &Modes) -> Arc<InputSystem> {
        Arc::new(InputSystem::with_sources(
            InputConfig::default(),
            vec![Box::new(OneShot(Some(batch)))],
            Some(Box::new(modes.clone())),
        ))
    }

    #[test]
    fn test_geometry_is_fixed() {
        let modes = Modes::default();
        let mut window = DrmWindow::new(
            input_with(Vec::new(), &modes),
            None,
            VideoMode::new(800, 600, 32),
            "demo",
        );

        window.set_position(40, 40);
        window.set_size(10, 10);
        window.set_title("ignored");

        assert_eq!(window.position(), (0, 0));
        assert_eq!(window.size(), (800, 600));
        assert_eq!(window.title(), "demo");
        assert!(window.has_focus());
        assert_eq!(window.system_handle(), WindowHandle { drm_fd: None });
    }

    #[test]
    fn test_terminal_mode_follows_window_lifetime() {
        let modes = Modes::default();
        let window = DrmWindow::from_handle(input_with(Vec::new(), &modes), None);
        assert_eq!(window.size(), (0, 0));
        assert_eq!(modes.entered.load(Ordering::SeqCst), 1);
        assert_eq!(modes.restored.load(Ordering::SeqCst), 0);

        drop(window);
        assert_eq!(modes.restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_process_events_forwards_in_order() {
        let modes = Modes::default();
        let input = input_with(
            vec![
                RawEvent::key(ScanCode::KEY_Q, 1),
                RawEvent::key(ScanCode::KEY_Q, 0),
            ],
            &modes,
        );
        let mut window = DrmWindow::new(input, None, VideoMode::new(640, 480, 32), "events");

        window.process_events();
        assert_eq!(window.pending_events(), 2);
        assert!(matches!(window.pop_event(), Some(Event::KeyPressed(_))));
        assert!(matches!(window.pop_event(), Some(Event::KeyReleased(_))));
        assert_eq!(window.pop_event(), None);
    }
}
