//!
//! Change notification: listener registry and dispatch.
//!
//! Listeners subscribe with a [`SearchCriteria`] filter. After every
//! committed mutation that produced an observable diff, the filters are
//! evaluated on the mutating thread against the old and new node; each
//! matching listener is then invoked on a fixed pool of dispatch workers,
//! so notification fan-out never blocks the mutator beyond filter
//! evaluation. Listener failures are logged and discarded — they never
//! propagate to the mutating call.
//!
//! Ordering between independent listeners is not guaranteed. Events for
//! the *same* listener are queued in commit order and handed to the pool
//! FIFO (best-effort under concurrent mutation).

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::node::Node;
use crate::search::SearchCriteria;

/// Number of threads serving listener dispatch per controller.
const DISPATCH_WORKERS: usize = 4;

/// The kind of committed mutation that triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A node was added.
    Create,
    /// A node's ordinals or values changed.
    Update,
    /// A node was deleted (a tombstone remains).
    Delete,
    /// A node was renamed or moved, descendants included.
    Rename,
}

/// Listener interface for storage events.
///
/// `old` and `new` are the pre- and post-images of the mutated node;
/// `Create` carries no old node and `Delete` no new one. An `Err` return
/// is logged by the dispatcher and otherwise ignored.
pub trait ChangeListener: Send + Sync {
    /// Called for every committed mutation matching the listener's
    /// criteria.
    fn storage_changed(
        &self,
        event: EventType,
        old: Option<&Node>,
        new: Option<&Node>,
    ) -> crate::Result<()>;
}

impl<F> ChangeListener for F
where
    F: Fn(EventType, Option<&Node>, Option<&Node>) -> crate::Result<()> + Send + Sync,
{
    fn storage_changed(
        &self,
        event: EventType,
        old: Option<&Node>,
        new: Option<&Node>,
    ) -> crate::Result<()> {
        self(event, old, new)
    }
}

/// Registry of (criteria, listener) pairs.
///
/// A listener may be registered under several criteria and several
/// listeners may share one criteria object. Listener identity is `Arc`
/// pointer identity.
#[derive(Default)]
pub struct ChangeRegistry {
    entries: Mutex<Vec<(SearchCriteria, Arc<dyn ChangeListener>)>>,
}

impl ChangeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for all mutations matching `criteria`.
    pub fn register(&self, listener: Arc<dyn ChangeListener>, criteria: SearchCriteria) {
        self.entries.lock().unwrap().push((criteria, listener));
    }

    /// Removes every registration of `listener`, returning the criteria
    /// it was registered under. Unknown listeners yield an empty set.
    pub fn deregister(&self, listener: &Arc<dyn ChangeListener>) -> Vec<SearchCriteria> {
        let mut entries = self.entries.lock().unwrap();
        let mut removed = Vec::new();
        entries.retain(|(criteria, registered)| {
            if Arc::ptr_eq(registered, listener) {
                removed.push(criteria.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Listeners whose criteria match the old or the new side of a
    /// mutation. Criteria that fail to evaluate are skipped.
    pub(crate) fn matching(
        &self,
        old: Option<&Node>,
        new: Option<&Node>,
    ) -> Vec<Arc<dyn ChangeListener>> {
        let entries = self.entries.lock().unwrap();
        let mut hit = Vec::new();
        for (criteria, listener) in entries.iter() {
            let matches = [old, new].into_iter().flatten().any(|side| {
                criteria.evaluate(side).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "skipping unevaluable listener criteria");
                    false
                })
            });
            if matches {
                hit.push(Arc::clone(listener));
            }
        }
        hit
    }
}

struct Job {
    event: EventType,
    old: Option<Node>,
    new: Option<Node>,
    listener: Arc<dyn ChangeListener>,
}

/// Fixed worker pool delivering events off the mutating thread.
pub(crate) struct Dispatcher {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..DISPATCH_WORKERS)
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                std::thread::Builder::new()
                    .name(format!("trellis-dispatch-{i}"))
                    .spawn(move || Self::work(receiver))
                    .expect("failed to spawn dispatch worker")
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    fn work(receiver: Arc<Mutex<Receiver<Job>>>) {
        loop {
            let job = {
                let receiver = receiver.lock().unwrap();
                receiver.recv()
            };
            let Ok(job) = job else {
                // channel closed, pool is shutting down
                return;
            };
            if let Err(e) =
                job.listener
                    .storage_changed(job.event, job.old.as_ref(), job.new.as_ref())
            {
                tracing::warn!(event = ?job.event, error = %e, "change listener failed");
            }
        }
    }

    pub(crate) fn dispatch(
        &self,
        event: EventType,
        old: Option<&Node>,
        new: Option<&Node>,
        listener: Arc<dyn ChangeListener>,
    ) {
        let job = Job {
            event,
            old: old.map(Node::deep_clone),
            new: new.map(Node::deep_clone),
            listener,
        };
        if let Some(sender) = &self.sender
            && sender.send(job).is_err()
        {
            tracing::warn!(event = ?event, "dispatch pool is gone, dropping event");
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // closing the channel drains the queue and stops the workers
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
