//! World occupancy accounting and the admission queue.
//!
//! A connection that authenticates while the world is full waits here with a
//! continuation: when a slot frees up the head waiter gets a
//! [`SessionEvent::QueueAdmitted`] on its own event channel and resumes
//! authentication from there. Sends to a dead connection simply fail and are
//! dropped, so a stale admission can never touch freed state.

use crate::session::SessionEvent;
use log::debug;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

struct Waiter {
    connection_id: u64,
    events: UnboundedSender<SessionEvent>,
}

struct Inner {
    /// Maximum admitted connections; 0 means unlimited.
    capacity: usize,
    occupancy: usize,
    waiting: VecDeque<Waiter>,
    /// Connections that hold a transferred slot but have not yet handled
    /// their admission event. If one dies first, `dequeue` returns the slot.
    pending_admissions: HashSet<u64>,
}

/// Shared admission service. The mutex is sync so teardown paths (including
/// drops) can report without an executor.
pub struct RealmQueue {
    inner: Mutex<Inner>,
}

impl RealmQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                capacity,
                occupancy: 0,
                waiting: VecDeque::new(),
                pending_admissions: HashSet::new(),
            }),
        }
    }

    /// Claims a world slot if one is free. The caller owns the slot on
    /// success and must hand it back through [`RealmQueue::decrement`].
    pub fn try_admit(&self) -> bool {
        let mut inner = self.inner.lock().expect("queue lock");
        if inner.capacity == 0 || inner.occupancy < inner.capacity {
            inner.occupancy += 1;
            true
        } else {
            false
        }
    }

    /// Adds a connection to the back of the queue, returning its 1-based
    /// position.
    pub fn enqueue(&self, connection_id: u64, events: UnboundedSender<SessionEvent>) -> usize {
        let mut inner = self.inner.lock().expect("queue lock");
        inner.waiting.push_back(Waiter {
            connection_id,
            events,
        });
        inner.waiting.len()
    }

    /// Removes a connection that went away between enqueueing and handling
    /// its admission. A slot already transferred to it is released again.
    pub fn dequeue(&self, connection_id: u64) {
        let mut inner = self.inner.lock().expect("queue lock");
        inner.waiting.retain(|w| w.connection_id != connection_id);
        if inner.pending_admissions.remove(&connection_id) {
            Self::release_slot(&mut inner);
        }
        Self::notify_positions(&inner);
    }

    /// Marks a delivered admission as consumed; the connection now owns the
    /// slot and hands it back through [`RealmQueue::decrement`].
    pub fn confirm_admission(&self, connection_id: u64) {
        self.inner
            .lock()
            .expect("queue lock")
            .pending_admissions
            .remove(&connection_id);
    }

    /// Releases an occupied slot and admits the head waiter, if any.
    pub fn decrement(&self) {
        let mut inner = self.inner.lock().expect("queue lock");
        Self::release_slot(&mut inner);
        Self::notify_positions(&inner);
    }

    fn release_slot(inner: &mut Inner) {
        inner.occupancy = inner.occupancy.saturating_sub(1);

        while let Some(waiter) = inner.waiting.pop_front() {
            inner.occupancy += 1;
            if waiter.events.send(SessionEvent::QueueAdmitted).is_ok() {
                inner.pending_admissions.insert(waiter.connection_id);
                debug!("admitted connection {} from queue", waiter.connection_id);
                break;
            }
            // connection died without dequeueing; slot goes to the next waiter
            inner.occupancy -= 1;
        }
    }

    fn notify_positions(inner: &Inner) {
        for (index, waiter) in inner.waiting.iter().enumerate() {
            let _ = waiter
                .events
                .send(SessionEvent::QueuePositionChanged(index as u32 + 1));
        }
    }

    pub fn occupancy(&self) -> usize {
        self.inner.lock().expect("queue lock").occupancy
    }

    pub fn waiting(&self) -> usize {
        self.inner.lock().expect("queue lock").waiting.len()
    }
}
