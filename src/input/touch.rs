//! Multi-touch slot tracking (type B protocol)
//!
//! The kernel addresses contacts by slot index. Each slot remembers the
//! tracking id it had at the last sync report, so a sync can tell a new
//! contact (`-1 → id`), a lifted one (`id → -1`), a replaced one (`a → b`)
//! and a moving one (`id → id`, position changed).

use super::event::{Event, EventQueue, Position, TouchEvent};

/// Tracking id of a slot with no contact
pub const NO_CONTACT: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TouchSlot {
    old_id: i32,
    id: i32,
    position: Position,
    moved: bool,
}

impl Default for TouchSlot {
    fn default() -> Self {
        Self {
            old_id: NO_CONTACT,
            id: NO_CONTACT,
            position: Position::default(),
            moved: false,
        }
    }
}

/// Slot arena indexed by kernel slot number; grows on first use, never shrinks
#[derive(Debug, Clone, Default)]
pub struct TouchSlots {
    slots: Vec<TouchSlot>,
    current: usize,
}

impl TouchSlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, index: usize) -> &mut TouchSlot {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, TouchSlot::default());
        }
        &mut self.slots[index]
    }

    /// ABS_MT_SLOT; negative values are ignored
    pub fn select(&mut self, slot: i32) {
        if let Ok(slot) = usize::try_from(slot) {
            self.current = slot;
        }
    }

    /// ABS_MT_TRACKING_ID
    pub fn set_tracking_id(&mut self, id: i32) {
        let current = self.current;
        self.slot(current).id = id;
    }

    /// ABS_MT_POSITION_X
    pub fn set_x(&mut self, x: i32) {
        let current = self.current;
        let slot = self.slot(current);
        if slot.position.x != x {
            slot.position.x = x;
            slot.moved = true;
        }
    }

    /// ABS_MT_POSITION_Y
    pub fn set_y(&mut self, y: i32) {
        let current = self.current;
        let slot = self.slot(current);
        if slot.position.y != y {
            slot.position.y = y;
            slot.moved = true;
        }
    }

    /// Diff every slot against the previous sync and queue the resulting
    /// events. Returns how many were queued.
    pub fn sync(&mut self, queue: &mut EventQueue) -> usize {
        let mut produced = 0;
        let mut emit = |event| {
            queue.push(event);
            produced += 1;
        };

        for slot in &mut self.slots {
            let touch = |finger: i32| TouchEvent {
                finger: finger as u32,
                x: slot.position.x,
                y: slot.position.y,
            };

            if slot.old_id == slot.id {
                if slot.id != NO_CONTACT && slot.moved {
                    emit(Event::TouchMoved(touch(slot.id)));
                }
            } else {
                if slot.old_id != NO_CONTACT {
                    emit(Event::TouchEnded(touch(slot.old_id)));
                }
                if slot.id != NO_CONTACT {
                    emit(Event::TouchBegan(touch(slot.id)));
                }
                slot.old_id = slot.id;
            }
            slot.moved = false;
        }

        produced
    }

    /// Whether `finger` is currently in contact
    pub fn is_down(&self, finger: u32) -> bool {
        self.find(finger).is_some()
    }

    /// Last reported position of `finger`
    pub fn position(&self, finger: u32) -> Option<Position> {
        self.find(finger).map(|slot| slot.position)
    }

    fn find(&self, finger: u32) -> Option<&TouchSlot> {
        let finger = i32::try_from(finger).ok()?;
        self.slots.iter().find(|slot| slot.id == finger)
    }

    /// Number of slots allocated so far
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn contact(slots: &mut TouchSlots, slot: i32, id: i32, x: i32, y: i32) {
        slots.select(slot);
        slots.set_tracking_id(id);
        slots.set_x(x);
        slots.set_y(y);
    }

    fn drain(queue: &mut EventQueue) -> Vec<Event> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn test_contact_begins_then_moves() {
        let mut slots = TouchSlots::new();
        let mut queue = EventQueue::new();

        contact(&mut slots, 0, 5, 100, 200);
        slots.sync(&mut queue);
        assert_eq!(
            drain(&mut queue),
            vec![Event::TouchBegan(TouchEvent { finger: 5, x: 100, y: 200 })]
        );

        slots.set_x(110);
        slots.sync(&mut queue);
        assert_eq!(
            drain(&mut queue),
            vec![Event::TouchMoved(TouchEvent { finger: 5, x: 110, y: 200 })]
        );
        assert_eq!(slots.position(5), Some(Position::new(110, 200)));
    }

    #[test]
    fn test_closing_one_of_two_contacts() {
        let mut slots = TouchSlots::new();
        let mut queue = EventQueue::new();

        contact(&mut slots, 0, 5, 10, 10);
        contact(&mut slots, 1, 7, 50, 50);
        slots.sync(&mut queue);
        drain(&mut queue);

        slots.select(0);
        slots.set_tracking_id(NO_CONTACT);
        slots.sync(&mut queue);

        assert_eq!(
            drain(&mut queue),
            vec![Event::TouchEnded(TouchEvent { finger: 5, x: 10, y: 10 })]
        );
        assert!(!slots.is_down(5));
        assert!(slots.is_down(7));
    }

    #[test]
    fn test_replaced_contact_ends_then_begins() {
        let mut slots = TouchSlots::new();
        let mut queue = EventQueue::new();

        contact(&mut slots, 0, 3, 0, 0);
        slots.sync(&mut queue);
        drain(&mut queue);

        slots.set_tracking_id(4);
        slots.sync(&mut queue);
        let events = drain(&mut queue);
        assert!(matches!(events[0], Event::TouchEnded(TouchEvent { finger: 3, .. })));
        assert!(matches!(events[1], Event::TouchBegan(TouchEvent { finger: 4, .. })));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_idle_slots_are_silent() {
        let mut slots = TouchSlots::new();
        let mut queue = EventQueue::new();

        slots.select(3);
        slots.set_x(1);
        assert_eq!(slots.sync(&mut queue), 0);
        assert_eq!(slots.capacity(), 4);
    }

    #[test]
    fn test_negative_slot_is_ignored() {
        let mut slots = TouchSlots::new();
        slots.select(2);
        slots.select(-1);
        slots.set_tracking_id(9);
        assert!(slots.is_down(9));
        assert_eq!(slots.capacity(), 3);
    }

    proptest! {
        /// Reporting the same contact twice before a sync yields one begin, and
        /// a following sync with nothing new yields nothing.
        #[test]
        fn test_repeated_input_is_idempotent(
            slot in 0i32..10,
            id in 0i32..1000,
            x in -5000i32..5000,
            y in -5000i32..5000,
        ) {
            let mut slots = TouchSlots::new();
            let mut queue = EventQueue::new();

            contact(&mut slots, slot, id, x, y);
            contact(&mut slots, slot, id, x, y);
            prop_assert_eq!(slots.sync(&mut queue), 1);
            prop_assert!(
                matches!(queue.pop(), Some(Event::TouchBegan(TouchEvent { finger, .. })) if finger == id as u32),
                "expected a single TouchBegan"
            );

            contact(&mut slots, slot, id, x, y);
            prop_assert_eq!(slots.sync(&mut queue), 0);
        }
    }
}
