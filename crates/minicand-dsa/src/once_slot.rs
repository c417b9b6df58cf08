use core::fmt;
use core::sync::atomic::Ordering;
use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};

/// A lock-free, publish-once cache cell.
///
/// Starts empty. The first successful [`publish`](Self::publish) installs a
/// heap-allocated value with a single compare-and-swap; every later publisher
/// loses the race, drops its own candidate on the spot and receives the
/// winner instead. A published value is never replaced through `&self`.
///
/// ## Memory Ordering
/// Publication is `AcqRel` and every read is `Acquire`, so a reader that
/// observes the pointer also observes the fully constructed value behind it.
/// Slots filled in sequence (A then B) therefore give "B visible implies A
/// visible" to any reader that checks B first.
///
/// ## Reclamation
/// Values are only freed through `&mut self` ([`clear`](Self::clear)) or on
/// drop, so no reader can hold a reference across a release. No epoch
/// pinning is needed on the read path.
pub struct OnceSlot<T> {
    inner: Atomic<T>,
}

impl<T> OnceSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Atomic::null(),
        }
    }

    /// Creates a slot that already holds `value`.
    pub fn with_value(value: T) -> Self {
        Self {
            inner: Atomic::new(value),
        }
    }

    /// Returns the published value, if any.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // # Safety: the pointee is only released through `&mut self`, which
        // cannot coexist with the `&self` borrow the result is tied to.
        unsafe {
            let guard = epoch::unprotected();
            self.inner.load(Ordering::Acquire, guard).as_ref()
        }
    }

    #[inline]
    pub fn is_published(&self) -> bool {
        self.get().is_some()
    }

    /// Publishes `candidate` unless a value is already present.
    ///
    /// Returns whichever value ended up in the slot.
    pub fn publish(&self, candidate: T) -> &T {
        // # Safety: see `get`. A successful exchange hands ownership of the
        // allocation to the slot; a failed one returns it to us.
        unsafe {
            let guard = epoch::unprotected();
            match self.inner.compare_exchange(
                Shared::null(),
                Owned::new(candidate),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(published) => published.deref(),
                Err(lost) => {
                    tracing::trace!("OnceSlot: publish race lost, discarding candidate");
                    drop(lost.new);
                    lost.current.deref()
                }
            }
        }
    }

    /// Returns the published value, computing and publishing it on first access.
    ///
    /// Concurrent first accesses may each run `init`; exactly one result is kept.
    #[inline]
    pub fn get_or_publish_with<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.get() {
            Some(value) => value,
            None => self.publish(init()),
        }
    }

    /// Fallible variant of [`get_or_publish_with`](Self::get_or_publish_with).
    /// An error leaves the slot empty.
    pub fn get_or_try_publish_with<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        match self.get() {
            Some(value) => Ok(value),
            None => Ok(self.publish(init()?)),
        }
    }

    /// Empties the slot, handing back the previously published value.
    pub fn clear(&mut self) -> Option<T> {
        // # Safety: `&mut self` proves no outstanding borrows of the pointee.
        unsafe {
            let guard = epoch::unprotected();
            let old = self.inner.swap(Shared::null(), Ordering::AcqRel, guard);
            if old.is_null() {
                None
            } else {
                Some(*old.into_owned().into_box())
            }
        }
    }

    /// Mutable access to the published value.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // # Safety: exclusive borrow of the slot.
        unsafe {
            let guard = epoch::unprotected();
            self.inner
                .load(Ordering::Relaxed, guard)
                .as_raw()
                .cast_mut()
                .as_mut()
        }
    }

    /// Consumes the slot, returning the published value.
    pub fn into_inner(mut self) -> Option<T> {
        self.clear()
    }
}

impl<T> Default for OnceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for OnceSlot<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: Clone> Clone for OnceSlot<T> {
    fn clone(&self) -> Self {
        match self.get() {
            Some(value) => Self::with_value(value.clone()),
            None => Self::new(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OnceSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("OnceSlot").field(value).finish(),
            None => f.write_str("OnceSlot(<empty>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::vec::Vec;

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_first_publish_wins() {
        let slot = OnceSlot::new();
        assert!(slot.get().is_none());
        assert_eq!(*slot.publish(7u32), 7);
        assert_eq!(*slot.publish(9u32), 7);
        assert_eq!(slot.get(), Some(&7));
    }

    #[test]
    fn test_losing_candidates_are_dropped_immediately() {
        let drops = Arc::new(AtomicUsize::new(0));
        let slot = OnceSlot::new();
        slot.publish(DropCounter(drops.clone()));
        slot.publish(DropCounter(drops.clone()));
        slot.publish(DropCounter(drops.clone()));
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        drop(slot);
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_clear_releases_and_reopens() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut slot = OnceSlot::new();
        slot.publish(DropCounter(drops.clone()));
        drop(slot.clear());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!slot.is_published());
        assert!(slot.clear().is_none());
    }

    #[test]
    fn test_failed_init_leaves_slot_empty() {
        let slot: OnceSlot<u8> = OnceSlot::new();
        let res: Result<&u8, &str> = slot.get_or_try_publish_with(|| Err("no table"));
        assert!(res.is_err());
        assert!(!slot.is_published());
        assert_eq!(slot.get_or_try_publish_with::<_, &str>(|| Ok(3)), Ok(&3));
    }

    #[test]
    fn test_concurrent_first_access_shares_identity() {
        let slot = OnceSlot::new();
        let barrier = Barrier::new(8);
        let addrs: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let slot = &slot;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        slot.get_or_publish_with(|| [i as u64; 16]) as *const _ as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
        let winner = slot.get().unwrap();
        assert_eq!(winner as *const _ as usize, addrs[0]);
    }

    #[test]
    fn test_clone_is_deep() {
        let slot = OnceSlot::new();
        slot.publish(5i32);
        let copy = slot.clone();
        assert_eq!(copy.get(), Some(&5));
        assert_ne!(copy.get().unwrap() as *const i32, slot.get().unwrap() as *const i32);
        assert!(OnceSlot::<i32>::new().clone().get().is_none());
    }
}
