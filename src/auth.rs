use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::api;
use crate::models::{AuthResponse, User};

pub const LOGIN_PATH: &str = "/auth/login";
pub const SIGNUP_PATH: &str = "/auth/signup";
pub const PROFILE_PATH: &str = "/auth/me";

pub trait AuthService: Send + Sync {
    fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse>;
    fn signup(&self, details: &SignupRequest) -> Result<AuthResponse>;
    fn profile(&self) -> Result<User>;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email_or_username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<()> {
        if self.email_or_username.trim().is_empty() || self.password.trim().is_empty() {
            bail!("Please fill in all fields");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
}

impl SignupRequest {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            bail!("Please fill in all fields");
        }
        if !self.email.contains('@') {
            bail!("Please enter a valid email address");
        }
        if self.password != self.confirm_password {
            bail!("Passwords do not match");
        }
        Ok(())
    }
}

pub struct ApiAuthService {
    client: Arc<api::Client>,
}

impl ApiAuthService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl AuthService for ApiAuthService {
    fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse> {
        credentials.validate()?;
        let body = LoginRequest {
            email_or_username: credentials.email_or_username.trim().to_string(),
            password: credentials.password.clone(),
        };
        self.client
            .post(LOGIN_PATH, &body)
            .context("auth: login")
    }

    fn signup(&self, details: &SignupRequest) -> Result<AuthResponse> {
        details.validate()?;
        let body = SignupRequest {
            username: details.username.trim().to_string(),
            email: details.email.trim().to_string(),
            password: details.password.clone(),
            confirm_password: String::new(),
        };
        self.client
            .post(SIGNUP_PATH, &body)
            .context("auth: signup")
    }

    fn profile(&self) -> Result<User> {
        self.client.get(PROFILE_PATH).context("auth: fetch profile")
    }
}

/// Accepts the demo account offline; used by `--demo`.
#[derive(Default)]
pub struct MockAuthService;

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo123";

impl MockAuthService {
    fn demo_user(username: &str) -> User {
        User {
            id: format!("user-{username}"),
            username: username.to_string(),
            avatar: None,
            email: Some(format!("{username}@zutube.local")),
        }
    }
}

impl AuthService for MockAuthService {
    fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse> {
        credentials.validate()?;
        if credentials.email_or_username.trim() != DEMO_USERNAME
            || credentials.password != DEMO_PASSWORD
        {
            return Err(api::ApiError::Status {
                status: 401,
                message: "Invalid credentials".into(),
            }
            .into());
        }
        Ok(AuthResponse {
            token: "demo-token".into(),
            user: Self::demo_user(DEMO_USERNAME),
        })
    }

    fn signup(&self, details: &SignupRequest) -> Result<AuthResponse> {
        details.validate()?;
        let username = details.username.trim();
        Ok(AuthResponse {
            token: format!("demo-token-{username}"),
            user: Self::demo_user(username),
        })
    }

    fn profile(&self) -> Result<User> {
        Ok(Self::demo_user(DEMO_USERNAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_both_fields() {
        let req = LoginRequest {
            email_or_username: "demo".into(),
            password: "   ".into(),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please fill in all fields");
    }

    #[test]
    fn signup_rejects_mismatched_passwords() {
        let req = SignupRequest {
            username: "zu".into(),
            email: "zu@example.com".into(),
            password: "hunter22".into(),
            confirm_password: "hunter23".into(),
        };
        assert_eq!(req.validate().unwrap_err().to_string(), "Passwords do not match");
    }

    #[test]
    fn signup_body_omits_confirmation() {
        let req = SignupRequest {
            username: "zu".into(),
            email: "zu@example.com".into(),
            password: "pw".into(),
            confirm_password: "pw".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("confirm_password").is_none());
        assert_eq!(json["username"], "zu");
    }

    #[test]
    fn mock_login_accepts_demo_account_only() {
        let service = MockAuthService;
        let ok = service
            .login(&LoginRequest {
                email_or_username: DEMO_USERNAME.into(),
                password: DEMO_PASSWORD.into(),
            })
            .unwrap();
        assert_eq!(ok.user.username, "demo");

        let err = service
            .login(&LoginRequest {
                email_or_username: "demo".into(),
                password: "wrong".into(),
            })
            .unwrap_err();
        assert_eq!(api::error_message(&err), "Invalid credentials");
    }
}
