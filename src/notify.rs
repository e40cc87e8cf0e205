//! Foreground notification seam.
//!
//! The workout and check-in state machines announce their lifecycle to a
//! platform notification service so the OS keeps the app alive while a
//! session is tracked. Calls are fire-and-forget: implementations must not
//! fail the caller.

use chrono::{DateTime, Utc};

/// Sink for session lifecycle notifications.
pub trait Notifier: Send + Sync {
    /// A tracked session began; show an ongoing notification with a running
    /// timer anchored at `started_at`.
    fn start_tracking(&self, title: &str, text: &str, started_at: DateTime<Utc>);

    /// Update the completion suffix (e.g. " - 5/12 Sets").
    fn set_completion_text(&self, text: &str);

    /// The tracked session ended; dismiss the notification.
    fn stop(&self);
}

/// Notifier that does nothing. Useful in tests and headless contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn start_tracking(&self, _title: &str, _text: &str, _started_at: DateTime<Utc>) {}
    fn set_completion_text(&self, _text: &str) {}
    fn stop(&self) {}
}

/// Notifier that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn start_tracking(&self, title: &str, text: &str, started_at: DateTime<Utc>) {
        tracing::info!(%title, %text, %started_at, "tracking notification started");
    }

    fn set_completion_text(&self, text: &str) {
        tracing::debug!(%text, "tracking notification updated");
    }

    fn stop(&self) {
        tracing::info!("tracking notification stopped");
    }
}
