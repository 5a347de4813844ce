use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

/// Receives every item a pipeline dispatches.
///
/// Consumers are shared between the registering thread and the dispatch
/// thread, so all hooks take `&self`; keep mutable state behind a lock.
pub trait Consumer<T>: Send + Sync {
    /// Called once on the dispatch thread before the first item.
    fn setup(&self) {}

    /// Called once on the dispatch thread after the last item.
    fn teardown(&self) {}

    /// Called when the pipeline is asked to stop.
    fn stop(&self) {}

    /// Called when the dispatch thread waited a full poll interval for nothing.
    fn on_timeout(&self) {}

    /// Called when a frame with an unknown discriminator was skipped.
    fn on_unknown(&self, _package_type: u8, _length: usize) {}

    /// Handle one item. Returning `false` rejects it; the pipeline logs the
    /// rejection and keeps going.
    fn consume(&self, item: &T) -> bool;
}

/// Ordered fan-out over independently registered consumers.
///
/// Every item is offered to every consumer in registration order. A
/// rejecting consumer does not prevent delivery to the ones after it.
/// Registration may change while the pipeline is running; the consumer set
/// is snapshotted before each dispatch so no lock is held while a consumer
/// runs.
pub struct MultiConsumer<T> {
    consumers: Mutex<Vec<Arc<dyn Consumer<T>>>>,
}

impl<T> MultiConsumer<T> {
    pub fn new() -> Self {
        Self {
            consumers: Mutex::new(Vec::new()),
        }
    }

    /// Create with an initial consumer set.
    pub fn with_consumers(consumers: Vec<Arc<dyn Consumer<T>>>) -> Self {
        Self {
            consumers: Mutex::new(consumers),
        }
    }

    /// Append a consumer. Adding the same consumer twice delivers twice.
    pub fn add_consumer(&self, consumer: Arc<dyn Consumer<T>>) {
        self.lock().push(consumer);
    }

    /// Remove a consumer by identity. Returns whether it was registered.
    pub fn remove_consumer(&self, consumer: &Arc<dyn Consumer<T>>) -> bool {
        let mut consumers = self.lock();
        let before = consumers.len();
        consumers.retain(|registered| !same_consumer(registered, consumer));
        before != consumers.len()
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Consumer<T>>> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Consumer<T>>>> {
        self.consumers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for MultiConsumer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Consumer<T> for MultiConsumer<T> {
    fn setup(&self) {
        for consumer in self.snapshot() {
            consumer.setup();
        }
    }

    fn teardown(&self) {
        for consumer in self.snapshot() {
            consumer.teardown();
        }
    }

    fn stop(&self) {
        for consumer in self.snapshot() {
            consumer.stop();
        }
    }

    fn on_timeout(&self) {
        for consumer in self.snapshot() {
            consumer.on_timeout();
        }
    }

    fn on_unknown(&self, package_type: u8, length: usize) {
        for consumer in self.snapshot() {
            consumer.on_unknown(package_type, length);
        }
    }

    fn consume(&self, item: &T) -> bool {
        let mut accepted = true;
        for (index, consumer) in self.snapshot().iter().enumerate() {
            if !consumer.consume(item) {
                warn!(consumer = index, "consumer rejected package");
                accepted = false;
            }
        }
        if !accepted {
            debug!("package rejected by at least one consumer");
        }
        accepted
    }
}

/// Identity comparison on the data pointer only; vtable pointers of the same
/// type may differ between codegen units.
fn same_consumer<T>(left: &Arc<dyn Consumer<T>>, right: &Arc<dyn Consumer<T>>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(left) as *const (),
        Arc::as_ptr(right) as *const (),
    )
}
