//! Cross-cutting services handed to the stores at construction: toast-style
//! notifications, navigation and session storage.

use std::{sync::Arc, time::Duration};

use storage::SessionStorage;
use tokio::sync::broadcast;
use tracing::warn;

use crate::{error::ClientError, routing::Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub life: Duration,
}

impl Notification {
    pub fn success(detail: impl Into<String>, life: Duration) -> Self {
        Self {
            severity: Severity::Success,
            summary: "Success".to_string(),
            detail: detail.into(),
            life,
        }
    }

    pub fn error(detail: impl Into<String>, life: Duration) -> Self {
        Self {
            severity: Severity::Error,
            summary: "Error".to_string(),
            detail: detail.into(),
            life,
        }
    }

    pub fn validation(detail: impl Into<String>, life: Duration) -> Self {
        Self {
            severity: Severity::Warn,
            summary: "Validation".to_string(),
            detail: detail.into(),
            life,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
    /// Re-render the current view from scratch.
    fn reload(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Notification(Notification),
    Navigated(Route),
    ReloadRequested,
}

/// Broadcasts notifications and navigation requests to every subscribed
/// view. Events sent while nobody listens are dropped.
pub struct EventBus {
    events: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self { events })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

impl Notifier for EventBus {
    fn notify(&self, notification: Notification) {
        let _ = self.events.send(ClientEvent::Notification(notification));
    }
}

impl Navigator for EventBus {
    fn navigate(&self, route: Route) {
        let _ = self.events.send(ClientEvent::Navigated(route));
    }

    fn reload(&self) {
        let _ = self.events.send(ClientEvent::ReloadRequested);
    }
}

#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn SessionStorage>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
    pub notification_life: Duration,
}

impl Services {
    /// Logs a failed operation and surfaces it as an error notification.
    /// Validation failures get the softer validation toast.
    pub(crate) fn report_failure(&self, operation: &'static str, err: &ClientError) {
        warn!(operation, error = %err, "operation failed");
        let notification = if err.is_validation() {
            Notification::validation(err.to_string(), self.notification_life)
        } else {
            Notification::error(err.to_string(), self.notification_life)
        };
        self.notifier.notify(notification);
    }

    pub(crate) fn notify_success(&self, detail: &str) {
        self.notifier
            .notify(Notification::success(detail, self.notification_life));
    }
}
