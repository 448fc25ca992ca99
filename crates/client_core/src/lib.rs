use std::sync::Arc;

use storage::SessionStorage;
use tokio::sync::broadcast;
use tracing::info;

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod establishment;
pub mod orders;
pub mod routing;
pub mod services;
pub mod session;

pub use api::ApiClient;
pub use auth::{AuthState, AuthStore};
pub use config::{load_settings, Settings};
pub use error::ClientError;
pub use establishment::{EstablishmentState, EstablishmentStore};
pub use orders::OrderStats;
pub use routing::{guard, GuardDecision, Route, RouteGuard};
pub use services::{ClientEvent, EventBus, Navigator, Notification, Notifier, Services, Severity};

/// Application-state container handed to every view.
///
/// The auth store is the only writer of the identity and the establishment
/// store the only writer of establishment and order state; views read
/// through snapshots.
pub struct OrderingApp {
    settings: Settings,
    services: Services,
    events: Option<Arc<EventBus>>,
    guard: RouteGuard,
    pub auth: AuthStore,
    pub establishments: EstablishmentStore,
}

impl OrderingApp {
    /// Wires both stores to an [`EventBus`] that serves as notifier and
    /// navigator.
    pub fn new(settings: Settings, storage: Arc<dyn SessionStorage>) -> Result<Self, ClientError> {
        let events = EventBus::new();
        let services = Services {
            storage,
            notifier: events.clone(),
            navigator: events.clone(),
            notification_life: settings.notification_life(),
        };
        let mut app = Self::new_with_dependencies(settings, services)?;
        app.events = Some(events);
        Ok(app)
    }

    pub fn new_with_dependencies(
        settings: Settings,
        services: Services,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::new(&settings)?;
        info!(api = api.base_url(), "ordering client configured");
        Ok(Self {
            guard: RouteGuard::new(services.storage.clone()),
            auth: AuthStore::new(api.clone(), services.clone()),
            establishments: EstablishmentStore::new(
                api,
                services.clone(),
                settings.order_window_tolerance,
            ),
            settings,
            services,
            events: None,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Event stream of the built-in bus; `None` when custom services were
    /// injected.
    pub fn subscribe_events(&self) -> Option<broadcast::Receiver<ClientEvent>> {
        self.events.as_ref().map(|events| events.subscribe())
    }

    /// Navigates to `path` after running the role guard against the stored
    /// identity, landing wherever the guard sends the visitor.
    pub async fn visit(&self, path: &str) -> Result<GuardDecision, ClientError> {
        let decision = match self.guard.resolve(path).await {
            Ok(decision) => decision,
            Err(err) => {
                self.services.report_failure("visit", &err);
                return Err(err);
            }
        };
        self.services.navigator.navigate(decision.destination());
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
mod mock_backend;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
