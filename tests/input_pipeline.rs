//! Integration tests for the input pipeline
//!
//! Scripted devices and a scripted terminal feed a real `InputSystem`; the
//! tests check the events and state a window would observe.

use evdev::{AbsoluteAxisType, Key as ScanCode, RelativeAxisType};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use kmsview::config::InputConfig;
use kmsview::error::InputError;
use kmsview::input::{
    Console, DeviceClass, Event, EventSource, KeyEvent, Position, RawEvent, TouchEvent, Wheel,
    QUEUE_CAPACITY,
};
use kmsview::{InputSystem, Key, MouseButton};

/// A device whose future reports can be scripted from the test
#[derive(Clone)]
struct Script {
    name: &'static str,
    class: DeviceClass,
    pending: Arc<Mutex<VecDeque<Vec<RawEvent>>>>,
}

impl Script {
    fn new(name: &'static str, class: DeviceClass) -> Self {
        Self {
            name,
            class,
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn report(&self, batch: Vec<RawEvent>) {
        self.pending.lock().unwrap().push_back(batch);
    }
}

impl EventSource for Script {
    fn name(&self) -> &str {
        self.name
    }

    fn class(&self) -> DeviceClass {
        self.class
    }

    fn fetch(&mut self, out: &mut Vec<RawEvent>) -> io::Result<()> {
        match self.pending.lock().unwrap().pop_front() {
            Some(batch) => {
                out.extend(batch);
                Ok(())
            }
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}

/// A device that fails every read
struct Broken;

impl EventSource for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn class(&self) -> DeviceClass {
        DeviceClass {
            mouse: true,
            ..DeviceClass::default()
        }
    }

    fn fetch(&mut self, _out: &mut Vec<RawEvent>) -> io::Result<()> {
        Err(io::Error::from_raw_os_error(libc::ENODEV))
    }
}

/// Terminal with typed bytes shared with the test
#[derive(Clone, Default)]
struct Keyboard {
    typed: Arc<Mutex<VecDeque<u8>>>,
}

impl Keyboard {
    fn type_bytes(&self, bytes: &[u8]) {
        self.typed.lock().unwrap().extend(bytes.iter().copied());
    }
}

impl Console for Keyboard {
    fn read_byte(&mut self) -> Option<u8> {
        self.typed.lock().unwrap().pop_front()
    }

    fn discard_pending(&mut self) -> bool {
        let mut typed = self.typed.lock().unwrap();
        let any = !typed.is_empty();
        let n = typed.len().min(16);
        typed.drain(..n);
        any
    }

    fn set_canonical(&mut self, _canonical: bool) -> Result<(), InputError> {
        Ok(())
    }

    fn enter_raw_mode(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn restore(&mut self) -> Result<(), InputError> {
        Ok(())
    }
}

fn keyboard_class() -> DeviceClass {
    DeviceClass {
        keyboard: true,
        ..DeviceClass::default()
    }
}

fn touch_class() -> DeviceClass {
    DeviceClass {
        touch: true,
        ..DeviceClass::default()
    }
}

fn drain(input: &InputSystem) -> Vec<Event> {
    std::iter::from_fn(|| input.check_event()).collect()
}

#[test]
fn test_modifiers_reflect_state_before_the_key() {
    let keyboard = Script::new("keyboard", keyboard_class());
    let input = InputSystem::with_sources(
        InputConfig::default(),
        vec![Box::new(keyboard.clone())],
        None,
    );

    keyboard.report(vec![
        RawEvent::key(ScanCode::KEY_LEFTSHIFT, 1),
        RawEvent::key(ScanCode::KEY_A, 1),
        RawEvent::key(ScanCode::KEY_LEFTSHIFT, 0),
    ]);

    let events = drain(&input);
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0],
        Event::KeyPressed(KeyEvent {
            code: Key::LShift,
            shift: false,
            ..
        })
    ));
    assert!(matches!(
        events[1],
        Event::KeyPressed(KeyEvent {
            code: Key::A,
            shift: true,
            ..
        })
    ));
    assert!(matches!(
        events[2],
        Event::KeyReleased(KeyEvent {
            code: Key::LShift,
            shift: true,
            ..
        })
    ));
    assert!(input.is_key_pressed(Key::A));
    assert!(!input.is_key_pressed(Key::LShift));
}

#[test]
fn test_pointer_buttons_and_wheels() {
    let mouse = Script::new(
        "mouse",
        DeviceClass {
            mouse: true,
            ..DeviceClass::default()
        },
    );
    let input = InputSystem::with_sources(InputConfig::default(), vec![Box::new(mouse.clone())], None);

    mouse.report(vec![
        RawEvent::relative(RelativeAxisType::REL_X, 30),
        RawEvent::relative(RelativeAxisType::REL_Y, -10),
        RawEvent::key(ScanCode::BTN_RIGHT, 1),
        RawEvent::relative(RelativeAxisType::REL_WHEEL, -1),
        RawEvent::relative(RelativeAxisType::REL_HWHEEL, 2),
        RawEvent::sync_report(),
    ]);

    assert_eq!(
        drain(&input),
        vec![
            Event::MouseMoved { x: 30, y: 0 },
            Event::MouseMoved { x: 30, y: -10 },
            Event::MouseButtonPressed {
                button: MouseButton::Right,
                x: 30,
                y: -10
            },
            Event::MouseWheelMoved {
                wheel: Wheel::Vertical,
                delta: -1,
                x: 30,
                y: -10
            },
            Event::MouseWheelMoved {
                wheel: Wheel::Horizontal,
                delta: 2,
                x: 30,
                y: -10
            },
        ]
    );
    assert!(input.is_mouse_button_pressed(MouseButton::Right));
    assert!(!input.is_mouse_button_pressed(MouseButton::Left));
    // Not clamped to any display
    assert_eq!(input.mouse_position(), Position::new(30, -10));
}

#[test]
fn test_touch_sync_only_from_the_touch_device() {
    let touch = Script::new("touchscreen", touch_class());
    let keyboard = Script::new("keyboard", keyboard_class());
    let input = InputSystem::with_sources(
        InputConfig::default(),
        vec![Box::new(touch.clone()), Box::new(keyboard.clone())],
        None,
    );

    touch.report(vec![
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_SLOT, 0),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_TRACKING_ID, 5),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_POSITION_X, 100),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_POSITION_Y, 200),
    ]);
    // The keyboard's sync report must not flush the touch frame
    keyboard.report(vec![RawEvent::sync_report()]);
    assert!(drain(&input).is_empty());

    touch.report(vec![RawEvent::sync_report()]);
    assert_eq!(
        drain(&input),
        vec![Event::TouchBegan(TouchEvent {
            finger: 5,
            x: 100,
            y: 200
        })]
    );
    assert!(input.is_touch_down(5));
}

#[test]
fn test_two_contacts_one_lifted() {
    let touch = Script::new("touchscreen", touch_class());
    let input = InputSystem::with_sources(InputConfig::default(), vec![Box::new(touch.clone())], None);

    touch.report(vec![
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_SLOT, 0),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_TRACKING_ID, 5),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_POSITION_X, 10),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_SLOT, 1),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_TRACKING_ID, 7),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_POSITION_X, 50),
        RawEvent::sync_report(),
    ]);
    assert_eq!(drain(&input).len(), 2);

    touch.report(vec![
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_SLOT, 0),
        RawEvent::absolute(AbsoluteAxisType::ABS_MT_TRACKING_ID, -1),
        RawEvent::sync_report(),
    ]);
    assert_eq!(
        drain(&input),
        vec![Event::TouchEnded(TouchEvent {
            finger: 5,
            x: 10,
            y: 0
        })]
    );
    assert!(!input.is_touch_down(5));
    assert_eq!(input.touch_position(7), Some(Position::new(50, 0)));
}

#[test]
fn test_queue_keeps_the_newest_events() {
    let keyboard = Script::new("keyboard", keyboard_class());
    let input = InputSystem::with_sources(
        InputConfig::default(),
        vec![Box::new(keyboard.clone())],
        None,
    );

    // One more press/release pair than the queue holds
    let pairs = QUEUE_CAPACITY / 2 + 1;
    let keys = [ScanCode::KEY_1, ScanCode::KEY_2];
    keyboard.report(
        (0..pairs)
            .flat_map(|i| {
                let key = keys[i % 2];
                [RawEvent::key(key, 1), RawEvent::key(key, 0)]
            })
            .collect(),
    );

    assert!(input.poll());
    assert_eq!(input.pending_events(), QUEUE_CAPACITY);

    let events = drain(&input);
    assert_eq!(events.len(), QUEUE_CAPACITY);
    // The first pair (key 1) was dropped; the queue now starts at key 2
    assert!(matches!(
        events[0],
        Event::KeyPressed(KeyEvent { code: Key::Num2, .. })
    ));
}

#[test]
fn test_backspace_text_comes_from_key_codes_only() {
    let keyboard = Script::new("keyboard", keyboard_class());
    let terminal = Keyboard::default();
    let input = InputSystem::with_sources(
        InputConfig::default(),
        vec![Box::new(keyboard.clone())],
        Some(Box::new(terminal.clone())),
    );

    // The terminal sees the same keystroke as byte 127; it must be dropped
    keyboard.report(vec![RawEvent::key(ScanCode::KEY_BACKSPACE, 1)]);
    terminal.type_bytes(&[127]);

    let events = drain(&input);
    let text: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, Event::TextEntered { .. }))
        .collect();
    assert_eq!(text, vec![&Event::TextEntered { unicode: 8 }]);
}

#[test]
fn test_terminal_text_and_escape_sequences() {
    let terminal = Keyboard::default();
    let input = InputSystem::with_sources(
        InputConfig::default(),
        Vec::new(),
        Some(Box::new(terminal.clone())),
    );

    terminal.type_bytes(b"ok\x1b[B");
    assert_eq!(
        drain(&input),
        vec![
            Event::TextEntered { unicode: 'o' as u32 },
            Event::TextEntered { unicode: 'k' as u32 },
        ]
    );

    terminal.type_bytes(&[27]);
    assert_eq!(drain(&input), vec![Event::TextEntered { unicode: 27 }]);
}

#[test]
fn test_read_errors_do_not_stop_other_devices() {
    let keyboard = Script::new("keyboard", keyboard_class());
    let input = InputSystem::with_sources(
        InputConfig::default(),
        vec![Box::new(Broken), Box::new(keyboard.clone())],
        None,
    );

    keyboard.report(vec![RawEvent::key(ScanCode::KEY_ENTER, 1)]);
    assert!(matches!(
        input.check_event(),
        Some(Event::KeyPressed(KeyEvent {
            code: Key::Enter,
            ..
        }))
    ));
    assert_eq!(input.devices().len(), 2);
}

#[test]
fn test_concurrent_pollers_lose_nothing() {
    let keyboard = Script::new("keyboard", keyboard_class());
    let input = Arc::new(InputSystem::with_sources(
        InputConfig::default(),
        vec![Box::new(keyboard.clone())],
        None,
    ));

    for _ in 0..8 {
        keyboard.report(vec![
            RawEvent::key(ScanCode::KEY_X, 1),
            RawEvent::key(ScanCode::KEY_X, 0),
        ]);
    }

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let input = input.clone();
            std::thread::spawn(move || std::iter::from_fn(|| input.check_event()).count())
        })
        .collect();
    let total: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    assert_eq!(total, 16);
}
