//! User-visible notifications

/// Fire-and-forget sink for toast-style messages.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);

    fn error(&self, message: &str);
}

/// Routes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        tracing::info!(notification = message, "success");
    }

    fn error(&self, message: &str) {
        tracing::error!(notification = message, "error");
    }
}
