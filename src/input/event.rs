//! Normalized input events and the bounded queue that buffers them

use std::collections::VecDeque;

use super::keys::{Key, MouseButton};

/// Maximum number of undelivered events; the oldest is dropped beyond this
pub const QUEUE_CAPACITY: usize = 64;

/// Integer position in display pixels (pointer) or device units (touch)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: Key,
    pub alt: bool,
    pub control: bool,
    pub shift: bool,
    pub system: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub finger: u32,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    Vertical,
    Horizontal,
}

/// An input event delivered to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    KeyPressed(KeyEvent),
    KeyReleased(KeyEvent),
    MouseButtonPressed {
        button: MouseButton,
        x: i32,
        y: i32,
    },
    MouseButtonReleased {
        button: MouseButton,
        x: i32,
        y: i32,
    },
    MouseMoved {
        x: i32,
        y: i32,
    },
    MouseWheelMoved {
        wheel: Wheel,
        delta: i32,
        x: i32,
        y: i32,
    },
    TextEntered {
        unicode: u32,
    },
    TouchBegan(TouchEvent),
    TouchMoved(TouchEvent),
    TouchEnded(TouchEvent),
}

/// Bounded FIFO of undelivered events
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: VecDeque<Event>,
    dropped: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(QUEUE_CAPACITY),
            dropped: 0,
        }
    }

    /// Append `event`, discarding the oldest entry when full
    pub fn push(&mut self, event: Event) {
        if self.events.len() >= QUEUE_CAPACITY {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events discarded because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(unicode: u32) -> Event {
        Event::TextEntered { unicode }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = EventQueue::new();
        queue.push(text(1));
        queue.push(text(2));

        assert_eq!(queue.pop(), Some(text(1)));
        assert_eq!(queue.pop(), Some(text(2)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_sixty_fifth_event_drops_oldest() {
        let mut queue = EventQueue::new();
        for i in 0..65 {
            queue.push(text(i));
        }

        assert_eq!(queue.len(), QUEUE_CAPACITY);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop(), Some(text(1)));
    }

    proptest! {
        #[test]
        fn test_queue_keeps_newest_in_order(count in 0u32..300) {
            let mut queue = EventQueue::new();
            for i in 0..count {
                queue.push(text(i));
                prop_assert!(queue.len() <= QUEUE_CAPACITY);
            }

            let kept = (count as usize).min(QUEUE_CAPACITY) as u32;
            let expected: Vec<_> = (count - kept..count).map(text).collect();
            let actual: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
