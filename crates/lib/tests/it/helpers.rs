use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::sync::Arc;
use std::time::Duration;

use trellis::{ChangeListener, Controller, EventType, InMemoryMapper, Node};

/// Creates a controller over a fresh in-memory mapper.
pub fn test_controller() -> Controller {
    Controller::new("testOwner", Arc::new(InMemoryMapper::new()))
        .expect("controller bootstrap should succeed")
}

/// Creates a controller together with its mapper, for tests that
/// reconstruct a controller over the same store.
pub fn test_controller_with_mapper() -> (Controller, Arc<InMemoryMapper>) {
    let mapper = Arc::new(InMemoryMapper::new());
    let controller = Controller::new("testOwner", mapper.clone())
        .expect("controller bootstrap should succeed");
    (controller, mapper)
}

/// A change event as delivered to a listener.
pub struct RecordedEvent {
    pub event: EventType,
    pub old: Option<Node>,
    pub new: Option<Node>,
}

/// Creates a listener forwarding every delivered event into a channel,
/// bridging the asynchronous dispatch back into the test thread.
pub fn recording_listener() -> (Arc<dyn ChangeListener>, Receiver<RecordedEvent>) {
    let (tx, rx) = channel();
    let listener: Arc<dyn ChangeListener> = Arc::new(
        move |event: EventType, old: Option<&Node>, new: Option<&Node>| -> trellis::Result<()> {
            let _ = tx.send(RecordedEvent {
                event,
                old: old.cloned(),
                new: new.cloned(),
            });
            Ok(())
        },
    );
    (listener, rx)
}

/// Waits for the next delivered event.
pub fn expect_event(rx: &Receiver<RecordedEvent>) -> RecordedEvent {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("expected a change event")
}

/// Asserts that no further event arrives within a grace period.
pub fn expect_no_event(rx: &Receiver<RecordedEvent>) {
    match rx.recv_timeout(Duration::from_millis(300)) {
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        Ok(event) => panic!("unexpected {:?} event", event.event),
    }
}
