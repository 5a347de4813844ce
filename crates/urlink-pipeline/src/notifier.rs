/// Lifecycle observer for a [`Pipeline`](crate::Pipeline).
///
/// Callbacks run on the pipeline's producer thread and should return quickly.
pub trait Notifier: Send + Sync {
    /// The producer thread is up and the stream is being read.
    fn started(&self, _name: &str) {}

    /// The pipeline was stopped on request.
    fn stopped(&self, _name: &str) {}

    /// Reconnecting failed `attempts` times in a row; the pipeline gave up.
    fn down(&self, _name: &str, _attempts: u32) {}
}

/// Notifier that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {}
