use reqwest::multipart::Form;
use shared::{
    domain::{User, UserType},
    protocol::{
        login_route, update_user_by_address_route, update_user_route, GeocodedAddress, LoginForm,
        UpdateUserByAddressRequest, UpdateUserRequest, UserChanges,
    },
};
use tokio::sync::RwLock;
use tracing::info;

use crate::{api::ApiClient, error::ClientError, routing::Route, services::Services, session};

#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub user: Option<User>,
}

/// Owns the signed-in identity. Nothing else writes it, and every change is
/// mirrored to session storage before any navigation happens.
pub struct AuthStore {
    api: ApiClient,
    services: Services,
    state: RwLock<AuthState>,
}

impl AuthStore {
    pub fn new(api: ApiClient, services: Services) -> Self {
        Self {
            api,
            services,
            state: RwLock::new(AuthState::default()),
        }
    }

    pub async fn snapshot(&self) -> AuthState {
        self.state.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    /// Reloads the identity left in session storage by an earlier session.
    pub async fn restore(&self) -> Result<Option<User>, ClientError> {
        let result = session::load_user(self.services.storage.as_ref()).await;
        let user = self.settle("restore", result)?;
        self.state.write().await.user = user.clone();
        Ok(user)
    }

    pub async fn login(
        &self,
        name: &str,
        email: &str,
        lat: f64,
        lon: f64,
    ) -> Result<User, ClientError> {
        let result = self.login_impl(name, email, lat, lon).await;
        self.settle("login", result)
    }

    async fn login_impl(
        &self,
        name: &str,
        email: &str,
        lat: f64,
        lon: f64,
    ) -> Result<User, ClientError> {
        let form = LoginForm {
            name: name.to_string(),
            email: email.to_string(),
            lat,
            lon,
        };
        let multipart = form
            .fields()
            .into_iter()
            .fold(Form::new(), |multipart, (field, value)| {
                multipart.text(field, value)
            });

        let user: User = self.api.post_multipart(login_route(), multipart).await?;
        self.commit_user(&user).await?;
        info!(uid = %user.uid, "logged in");
        Ok(user)
    }

    /// Switches the signed-in user's role and moves to that role's view.
    /// Unknown roles are rejected before any request goes out.
    pub async fn update_user_type(&self, user_type: &str) -> Result<UserType, ClientError> {
        let result = self.update_user_type_impl(user_type).await;
        self.settle("update_user_type", result)
    }

    async fn update_user_type_impl(&self, user_type: &str) -> Result<UserType, ClientError> {
        let user_type: UserType = user_type.parse()?;
        let uid = self.require_user().await?.uid;

        self.api
            .post_json_ack(
                update_user_route(),
                &UpdateUserRequest {
                    changes: UserChanges { u_type: user_type },
                    uid,
                },
            )
            .await?;

        let user = self
            .edited_user(|user| user.u_type = Some(user_type))
            .await?;
        self.commit_user(&user).await?;
        info!(uid = %uid, %user_type, "updated user type");

        self.services
            .navigator
            .navigate(Route::for_user_type(user_type));
        Ok(user_type)
    }

    /// Geocodes `address` on the backend, adopts the resulting location and
    /// reloads the current view so location-bound lists are refetched.
    pub async fn update_user_by_address(&self, address: &str) -> Result<User, ClientError> {
        let result = self.update_user_by_address_impl(address).await;
        self.settle("update_user_by_address", result)
    }

    async fn update_user_by_address_impl(&self, address: &str) -> Result<User, ClientError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ClientError::Validation("address must not be empty".into()));
        }
        let uid = self.require_user().await?.uid;

        let geocoded: GeocodedAddress = self
            .api
            .post_json(
                update_user_by_address_route(),
                &UpdateUserByAddressRequest {
                    address: address.to_string(),
                    uid,
                },
            )
            .await?;

        let user = self
            .edited_user(|user| {
                user.lat = Some(geocoded.lat);
                user.lon = Some(geocoded.lon);
                user.cid = Some(geocoded.cid.clone());
            })
            .await?;
        self.commit_user(&user).await?;
        info!(uid = %uid, cid = %geocoded.cid, "updated user location");

        self.services.navigator.reload();
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = session::clear_user(self.services.storage.as_ref()).await;
        self.settle("logout", result)?;
        self.state.write().await.user = None;
        self.services.navigator.navigate(Route::Login);
        Ok(())
    }

    async fn require_user(&self) -> Result<User, ClientError> {
        self.current_user().await.ok_or(ClientError::NotLoggedIn)
    }

    async fn edited_user(&self, apply: impl FnOnce(&mut User)) -> Result<User, ClientError> {
        let mut user = self.require_user().await?;
        apply(&mut user);
        Ok(user)
    }

    /// Writes session storage, then memory. A failed write leaves both on
    /// the previous identity.
    async fn commit_user(&self, user: &User) -> Result<(), ClientError> {
        session::persist_user(self.services.storage.as_ref(), user).await?;
        self.state.write().await.user = Some(user.clone());
        Ok(())
    }

    fn settle<T>(
        &self,
        operation: &'static str,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        if let Err(err) = &result {
            self.services.report_failure(operation, err);
        }
        result
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
