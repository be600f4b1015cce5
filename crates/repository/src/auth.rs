//! Sign-in and session lifecycle

use reparto_config::{PreferencesStore, RememberedUser};
use reparto_core::{AppError, Resource, Session, SessionStore};
use reparto_network::AuthApi;
use std::sync::Arc;

/// Authenticates against the backend and owns the session lifecycle
///
/// The token only lives in the in-memory [`SessionStore`]. Preferences
/// remember who signed in, never how.
pub struct AuthRepository {
    api: Arc<dyn AuthApi>,
    session: SessionStore,
    preferences: PreferencesStore,
}

impl AuthRepository {
    pub fn new(
        api: Arc<dyn AuthApi>,
        session: SessionStore,
        preferences: PreferencesStore,
    ) -> Self {
        Self {
            api,
            session,
            preferences,
        }
    }

    /// Signs in; on failure nothing is stored
    pub async fn login(&self, email: &str, password: &str) -> Resource<Session> {
        self.try_login(email, password).await.into()
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::validation("email", "Email is required"));
        }
        if password.is_empty() {
            return Err(AppError::validation("password", "Password is required"));
        }

        let session = self.api.login(email, password).await?;
        if session.token.trim().is_empty() {
            return Err(AppError::EmptyBody {
                operation: "login".to_string(),
            });
        }
        self.session.set(session.clone());

        if let Err(e) = self.preferences.remember_user(&RememberedUser::from(&session)) {
            log::warn!("Signed in but could not remember user: {}", e);
        }

        log::info!("Signed in as {} ({})", session.email, session.role);
        Ok(session)
    }

    /// Forgets the session and the remembered user
    pub async fn logout(&self) -> Resource<()> {
        self.session.clear();
        let result = self.preferences.clear().map_err(AppError::from);
        if result.is_ok() {
            log::info!("Signed out");
        }
        result.into()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.current()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Who signed in last, from durable preferences only
    pub fn remembered_user(&self) -> Option<RememberedUser> {
        match self.preferences.remembered_user() {
            Ok(user) => user,
            Err(e) => {
                log::warn!("Could not read preferences: {}", e);
                None
            }
        }
    }
}
