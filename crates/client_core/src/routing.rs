use std::{fmt, str::FromStr, sync::Arc};

use shared::domain::{User, UserType};
use storage::SessionStorage;
use tracing::debug;

use crate::{error::ClientError, session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Customer,
    Establishment,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/",
            Self::Customer => "/customer",
            Self::Establishment => "/establishment",
        }
    }

    pub fn for_user_type(user_type: UserType) -> Self {
        match user_type {
            UserType::Customer => Self::Customer,
            UserType::Establishment => Self::Establishment,
        }
    }

    fn required_user_type(self) -> Option<UserType> {
        match self {
            Self::Login => None,
            Self::Customer => Some(UserType::Customer),
            Self::Establishment => Some(UserType::Establishment),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Route {
    type Err = ClientError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = match path.trim_end_matches('/') {
            "" => "/",
            other => other,
        };
        match trimmed {
            "/" => Ok(Self::Login),
            "/customer" => Ok(Self::Customer),
            "/establishment" => Ok(Self::Establishment),
            _ => Err(ClientError::UnknownRoute(path.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow(Route),
    Redirect { from: Route, to: Route },
}

impl GuardDecision {
    pub fn destination(self) -> Route {
        match self {
            Self::Allow(route) => route,
            Self::Redirect { to, .. } => to,
        }
    }
}

/// Role check for a navigation target.
///
/// Role views need a signed-in user whose role matches; a user with the
/// other role is sent to their own view, and anyone without a role goes
/// back to `/`.
pub fn guard(target: Route, user: Option<&User>) -> GuardDecision {
    let Some(required) = target.required_user_type() else {
        return GuardDecision::Allow(target);
    };

    let to = match user.and_then(|user| user.u_type) {
        Some(user_type) if user_type == required => return GuardDecision::Allow(target),
        Some(user_type) => Route::for_user_type(user_type),
        None => Route::Login,
    };
    GuardDecision::Redirect { from: target, to }
}

/// Evaluates [`guard`] against the identity in session storage, the way a
/// freshly loaded page would see it.
#[derive(Clone)]
pub struct RouteGuard {
    storage: Arc<dyn SessionStorage>,
}

impl RouteGuard {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    pub async fn resolve(&self, path: &str) -> Result<GuardDecision, ClientError> {
        let target: Route = path.parse()?;
        let user = session::load_user(self.storage.as_ref()).await?;
        let decision = guard(target, user.as_ref());
        debug!(path, ?decision, "evaluated route guard");
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "tests/routing_tests.rs"]
mod tests;
