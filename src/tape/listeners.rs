//! Listener registration for tape updates.
//!
//! Listeners are invoked in registration order. The slot list is cloned
//! before dispatch so callbacks run without any tape lock held and may call
//! back into the tape (e.g. `snapshot()`).

use super::TapeUpdate;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Identifies one registered listener on a tape.
pub type ListenerId = u64;

type Callback = dyn Fn(&TapeUpdate) + Send + Sync;

struct Slot {
    id: ListenerId,
    active: AtomicBool,
    callback: Box<Callback>,
}

type Slots = Mutex<Vec<Arc<Slot>>>;

#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    slots: Arc<Slots>,
}

impl ListenerSet {
    pub(crate) fn add(&self, callback: Box<Callback>) -> ListenerHandle {
        let slot = Arc::new(Slot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            callback,
        });
        self.slots.lock().push(Arc::clone(&slot));
        ListenerHandle {
            slot,
            slots: Arc::downgrade(&self.slots),
            detached: false,
        }
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut slots = self.slots.lock();
        match slots.iter().position(|s| s.id == id) {
            Some(pos) => {
                slots.remove(pos).active.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&self) {
        let drained: Vec<_> = self.slots.lock().drain(..).collect();
        for slot in &drained {
            slot.active.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub(crate) fn emit(&self, update: &TapeUpdate) {
        let slots: Vec<_> = self.slots.lock().clone();
        for slot in slots {
            if slot.active.load(Ordering::SeqCst) {
                (slot.callback)(update);
            }
        }
    }
}

/// Disposal handle returned by `TradeTape::subscribe`.
///
/// Dropping the handle disposes the listener. `dispose` may be called any
/// number of times; only the first call has an effect.
#[must_use = "dropping the handle unsubscribes the listener"]
pub struct ListenerHandle {
    slot: Arc<Slot>,
    slots: Weak<Slots>,
    detached: bool,
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.slot.id
    }

    pub fn is_active(&self) -> bool {
        self.slot.active.load(Ordering::SeqCst)
    }

    pub fn dispose(&self) {
        if !self.slot.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(slots) = self.slots.upgrade() {
            slots.lock().retain(|s| s.id != self.slot.id);
        }
    }

    /// Keep the listener registered until it is removed by id or the tape is
    /// destroyed.
    pub fn detach(mut self) -> ListenerId {
        self.detached = true;
        self.slot.id
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if !self.detached {
            self.dispose();
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.slot.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::MarketId;
    use crate::tape::StreamStatus;
    use std::sync::atomic::AtomicUsize;

    fn update() -> TapeUpdate {
        TapeUpdate {
            market: MarketId::from("A"),
            status: StreamStatus::Live,
            len: 0,
            revision: 1,
        }
    }

    fn counter(set: &ListenerSet) -> (ListenerHandle, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let handle = set.add(Box::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        (handle, hits)
    }

    #[test]
    fn test_emit_in_registration_order() {
        let set = ListenerSet::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for n in 0..3 {
            let order = Arc::clone(&order);
            handles.push(set.add(Box::new(move |_| order.lock().push(n))));
        }
        set.emit(&update());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let set = ListenerSet::default();
        let (handle, hits) = counter(&set);
        let (_other, _) = counter(&set);

        handle.dispose();
        handle.dispose();
        assert!(!handle.is_active());
        assert_eq!(set.len(), 1);

        set.emit(&update());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_disposes_and_detach_keeps() {
        let set = ListenerSet::default();
        {
            let (_handle, _) = counter(&set);
            assert_eq!(set.len(), 1);
        }
        assert_eq!(set.len(), 0);

        let (handle, hits) = counter(&set);
        let id = handle.detach();
        set.emit(&update());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(set.remove(id));
        assert!(!set.remove(id));
    }

    #[test]
    fn test_clear_deactivates_outstanding_handles() {
        let set = ListenerSet::default();
        let (handle, _) = counter(&set);
        set.clear();
        assert!(!handle.is_active());
        assert_eq!(set.len(), 0);
    }
}
