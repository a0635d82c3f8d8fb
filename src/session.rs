use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::api::{self, TokenSource};
use crate::auth::AuthService;
use crate::models::{AuthResponse, User};
use crate::storage::{self, PROFILE_KEY, TOKEN_KEY};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("server returned an empty token")]
    EmptyToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Anonymous,
    Authenticated { user: User, token: String },
}

/// Outcome of checking a restored token against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    Skipped,
    Confirmed,
    Rejected,
    Unreachable,
}

pub struct Session {
    store: Arc<storage::Store>,
    state: RwLock<State>,
}

impl Session {
    /// Restores the session from durable storage. A stored token is trusted as-is;
    /// see [`Session::revalidate`] for the optional server check.
    pub fn init(store: Arc<storage::Store>) -> Result<Self> {
        let token = store
            .get_credential(TOKEN_KEY)
            .context("session: read stored token")?
            .map(|cred| cred.value)
            .filter(|value| !value.trim().is_empty());

        let state = match token {
            Some(token) => {
                let user = store
                    .get_credential(PROFILE_KEY)
                    .context("session: read stored profile")?
                    .and_then(|cred| match serde_json::from_str::<User>(&cred.value) {
                        Ok(user) => Some(user),
                        Err(err) => {
                            warn!(error = %err, "discarding unreadable stored profile");
                            None
                        }
                    })
                    .unwrap_or_default();
                info!(username = %user.username, "restored session from storage");
                State::Authenticated { user, token }
            }
            None => State::Anonymous,
        };

        Ok(Self {
            store,
            state: RwLock::new(state),
        })
    }

    pub fn state(&self) -> State {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.read(), State::Authenticated { .. })
    }

    pub fn current_user(&self) -> Option<User> {
        match &*self.state.read() {
            State::Authenticated { user, .. } => Some(user.clone()),
            State::Anonymous => None,
        }
    }

    /// True when the signed-in user authored the record identified by `author_id`.
    pub fn owns(&self, author_id: &str) -> bool {
        match &*self.state.read() {
            State::Authenticated { user, .. } => !user.id.is_empty() && user.id == author_id,
            State::Anonymous => false,
        }
    }

    pub fn login(&self, response: AuthResponse) -> Result<User> {
        if response.token.trim().is_empty() {
            return Err(SessionError::EmptyToken.into());
        }
        let profile = serde_json::to_string(&response.user).context("session: encode profile")?;
        self.store
            .put_credential(TOKEN_KEY, &response.token)
            .context("session: persist token")?;
        self.store
            .put_credential(PROFILE_KEY, &profile)
            .context("session: persist profile")?;

        info!(username = %response.user.username, "signed in");
        let user = response.user.clone();
        *self.state.write() = State::Authenticated {
            user: response.user,
            token: response.token,
        };
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        *self.state.write() = State::Anonymous;
        self.store
            .delete_credential(TOKEN_KEY)
            .context("session: clear token")?;
        self.store
            .delete_credential(PROFILE_KEY)
            .context("session: clear profile")?;
        info!("signed out");
        Ok(())
    }

    pub fn revalidate(&self, auth: &dyn AuthService) -> Result<Revalidation> {
        let token = match &*self.state.read() {
            State::Authenticated { token, .. } => token.clone(),
            State::Anonymous => return Ok(Revalidation::Skipped),
        };

        match auth.profile() {
            Ok(user) => {
                let profile = serde_json::to_string(&user).context("session: encode profile")?;
                self.store
                    .put_credential(PROFILE_KEY, &profile)
                    .context("session: persist profile")?;
                *self.state.write() = State::Authenticated { user, token };
                Ok(Revalidation::Confirmed)
            }
            Err(err) if api::is_unauthorized(&err) => {
                warn!("stored token rejected by server; signing out");
                self.logout()?;
                Ok(Revalidation::Rejected)
            }
            Err(err) => {
                warn!(error = %err, "could not validate stored token; keeping session");
                Ok(Revalidation::Unreachable)
            }
        }
    }
}

impl TokenSource for Session {
    fn token(&self) -> Option<String> {
        match &*self.state.read() {
            State::Authenticated { token, .. } => Some(token.clone()),
            State::Anonymous => None,
        }
    }
}
