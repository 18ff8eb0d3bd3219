//! Raw input subsystem
//!
//! Reads keyboards, mice and touch devices straight from evdev, keeps the
//! pressed-key/button, pointer and touch state, and buffers normalized events
//! for the window. Text typed on the controlling terminal is picked up as a
//! fallback when no device reported anything.
//!
//! All state sits behind one mutex: every public method may be called from
//! any thread, and calls are serialized against each other. Devices are
//! enumerated on first use and kept open until the system is dropped.

use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use std::io;

use crate::config::InputConfig;
use crate::error::InputError;

pub mod caps;
pub mod decoder;
pub mod device;
pub mod event;
pub mod keys;
pub mod terminal;
pub mod touch;

pub use caps::{Capabilities, DeviceClass};
pub use decoder::{Decoder, RawEvent};
pub use device::{EvdevSource, EventSource};
pub use event::{Event, EventQueue, KeyEvent, Position, TouchEvent, Wheel, QUEUE_CAPACITY};
pub use keys::{to_key, to_mouse_button, Key, MouseButton};
pub use terminal::{Console, Terminal};

struct InputState {
    sources: Option<Vec<Box<dyn EventSource>>>,
    console: Option<Box<dyn Console>>,
    console_opened: bool,
    decoder: Decoder,
    queue: EventQueue,
    scratch: Vec<RawEvent>,
}

impl InputState {
    fn ensure_init(&mut self, config: &InputConfig) {
        if self.sources.is_none() {
            let sources = device::enumerate(config);
            debug!("Input initialized with {} device(s)", sources.len());
            self.sources = Some(sources);
        }

        if !self.console_opened {
            self.console_opened = true;
            match Terminal::stdin() {
                Ok(terminal) => self.console = Some(Box::new(terminal)),
                Err(e) => debug!("No terminal on stdin: {}", e),
            }
        }
    }

    /// One decode pass over every device, then the terminal if nothing came in
    fn pass(&mut self, terminal_text: bool) -> bool {
        let mut produced = self.decoder.flush_deferred(&mut self.queue);

        if let Some(sources) = self.sources.as_mut() {
            for (index, source) in sources.iter_mut().enumerate() {
                self.scratch.clear();
                if let Err(e) = source.fetch(&mut self.scratch) {
                    if e.kind() != io::ErrorKind::WouldBlock {
                        warn!("Error reading {}: {}", source.name(), e);
                    }
                }

                for raw in &self.scratch {
                    produced |= self.decoder.feed(index, raw, &mut self.queue);
                }
            }
        }

        if !produced && terminal_text {
            if let Some(console) = self.console.as_mut() {
                if let Some(unicode) = terminal::read_text(console.as_mut()) {
                    self.queue.push(Event::TextEntered { unicode });
                    produced = true;
                }
            }
        }

        produced
    }
}

/// The process-wide input state
pub struct InputSystem {
    config: InputConfig,
    state: Mutex<InputState>,
}

impl InputSystem {
    /// Devices and terminal are opened lazily, on the first call that needs them
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            state: Mutex::new(InputState {
                sources: None,
                console: None,
                console_opened: false,
                decoder: Decoder::new(),
                queue: EventQueue::new(),
                scratch: Vec::new(),
            }),
        }
    }

    /// Use the given sources and console instead of probing the system
    pub fn with_sources(
        config: InputConfig,
        sources: Vec<Box<dyn EventSource>>,
        console: Option<Box<dyn Console>>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(InputState {
                sources: Some(sources),
                console,
                console_opened: true,
                decoder: Decoder::new(),
                queue: EventQueue::new(),
                scratch: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InputState> {
        let mut state = self.state.lock();
        state.ensure_init(&self.config);
        state
    }

    /// Run one decode pass; false when neither a device nor the terminal had input
    pub fn poll(&self) -> bool {
        self.lock().pass(self.config.terminal_text)
    }

    /// Next event: queued ones first, otherwise whatever one decode pass yields
    pub fn check_event(&self) -> Option<Event> {
        let mut state = self.lock();
        if let Some(event) = state.queue.pop() {
            return Some(event);
        }

        state.pass(self.config.terminal_text);
        state.queue.pop()
    }

    /// Number of events waiting in the queue
    pub fn pending_events(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        if key == Key::Unknown {
            return false;
        }

        let mut state = self.lock();
        state.pass(self.config.terminal_text);
        state.decoder.is_key_pressed(key)
    }

    pub fn is_mouse_button_pressed(&self, button: MouseButton) -> bool {
        let mut state = self.lock();
        state.pass(self.config.terminal_text);
        state.decoder.is_mouse_button_pressed(button)
    }

    /// Accumulated pointer position; not clamped to the display
    pub fn mouse_position(&self) -> Position {
        self.state.lock().decoder.pointer()
    }

    pub fn set_mouse_position(&self, position: Position) {
        self.state.lock().decoder.set_pointer(position);
    }

    pub fn is_touch_down(&self, finger: u32) -> bool {
        self.state.lock().decoder.touch().is_down(finger)
    }

    pub fn touch_position(&self, finger: u32) -> Option<Position> {
        self.state.lock().decoder.touch().position(finger)
    }

    /// Save the terminal attributes and switch to the window configuration
    pub fn set_terminal_config(&self) -> Result<(), InputError> {
        let mut state = self.lock();
        match state.console.as_mut() {
            Some(console) => console.enter_raw_mode(),
            None => Ok(()),
        }
    }

    /// Restore the attributes saved by [`InputSystem::set_terminal_config`]
    pub fn restore_terminal_config(&self) -> Result<(), InputError> {
        let mut state = self.lock();
        match state.console.as_mut() {
            Some(console) => console.restore(),
            None => Ok(()),
        }
    }

    /// Name and class of every open device
    pub fn devices(&self) -> Vec<(String, DeviceClass)> {
        self.lock()
            .sources
            .as_ref()
            .map(|sources| {
                sources
                    .iter()
                    .map(|source| (source.name().to_string(), source.class()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }
}

impl std::fmt::Debug for InputSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputSystem")
            .field("config", &self.config)
            .field("pending_events", &self.pending_events())
            .finish()
    }
}
