//! Lazily created, reference-counted process resources
//!
//! The DRM device, the GBM device and the EGL display are process-wide: at
//! most one of each may be live, it is created on first use, and it is torn
//! down when the last consumer lets go of it. [`Shared`] keeps a weak slot to
//! the live instance; consumers hold the strong `Arc`s, and the resource's
//! own `Drop` performs the teardown exactly once.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

pub struct Shared<T> {
    slot: Mutex<Weak<T>>,
}

impl<T> Shared<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Weak::new()),
        }
    }

    /// Return the live instance, creating it with `init` if there is none.
    ///
    /// A failing `init` leaves the slot empty; the next call retries.
    pub fn acquire_with<E, F>(&self, init: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut slot = self.slot.lock();
        if let Some(live) = slot.upgrade() {
            return Ok(live);
        }

        let fresh = Arc::new(init()?);
        *slot = Arc::downgrade(&fresh);
        Ok(fresh)
    }

    /// The live instance, if any consumer currently holds one
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.lock().upgrade()
    }

    /// Number of outstanding consumers
    pub fn consumers(&self) -> usize {
        self.slot.lock().strong_count()
    }

    pub fn is_live(&self) -> bool {
        self.consumers() > 0
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("consumers", &self.consumers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how many times it was created and torn down
    struct Probe {
        released: Arc<AtomicUsize>,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_factory(
        created: &Arc<AtomicUsize>,
        released: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> Result<Probe, ()> {
        let created = created.clone();
        let released = released.clone();
        move || {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Probe { released })
        }
    }

    #[test]
    fn test_acquire_is_idempotent_while_live() {
        let shared = Shared::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));

        let a = shared.acquire_with(counting_factory(&created, &released)).unwrap();
        let b = shared.acquire_with(counting_factory(&created, &released)).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(shared.consumers(), 2);
    }

    #[test]
    fn test_release_runs_once_after_last_consumer() {
        let shared = Shared::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));

        let a = shared.acquire_with(counting_factory(&created, &released)).unwrap();
        let b = shared.acquire_with(counting_factory(&created, &released)).unwrap();

        drop(a);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert!(shared.is_live());

        drop(b);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!shared.is_live());
        assert!(shared.get().is_none());
    }

    #[test]
    fn test_failed_init_leaves_slot_empty() {
        let shared: Shared<Probe> = Shared::new();
        let result: Result<_, &str> = shared.acquire_with(|| Err("no device"));

        assert!(result.is_err());
        assert!(!shared.is_live());
    }

    #[test]
    fn test_reacquire_after_release_creates_fresh_instance() {
        let shared = Shared::new();
        let created = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));

        drop(shared.acquire_with(counting_factory(&created, &released)).unwrap());
        drop(shared.acquire_with(counting_factory(&created, &released)).unwrap());

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    proptest! {
        /// Arbitrary acquire/release interleavings: the resource lives exactly
        /// as long as some consumer holds it and is torn down once per lifetime.
        #[test]
        fn test_refcount_never_underflows(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let shared = Shared::new();
            let created = Arc::new(AtomicUsize::new(0));
            let released = Arc::new(AtomicUsize::new(0));
            let mut held = Vec::new();

            for acquire in ops {
                if acquire || held.is_empty() {
                    held.push(shared.acquire_with(counting_factory(&created, &released)).unwrap());
                } else {
                    held.pop();
                }
                prop_assert_eq!(shared.consumers(), held.len());
                let alive = created.load(Ordering::SeqCst) - released.load(Ordering::SeqCst);
                prop_assert_eq!(alive, usize::from(!held.is_empty()));
            }

            held.clear();
            prop_assert_eq!(created.load(Ordering::SeqCst), released.load(Ordering::SeqCst));
        }
    }
}
