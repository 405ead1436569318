pub mod password;
pub mod token;
pub mod turnstile;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AuthConfig, DEFAULT_ADMIN_PASSWORD};
use crate::error::AppError;
use crate::models::AdminUser;
use crate::now_millis;
use crate::storage::{get_json, keys, put_json, KvStore};

use password::MIN_PASSWORD_LEN;
pub use token::{SessionClaims, TokenSigner};
pub use turnstile::{HumanVerifier, TurnstileVerifier};

/// The authenticated admin, inserted into request extensions by [`require_admin`]
#[derive(Debug, Clone, PartialEq)]
pub struct AdminIdentity {
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub turnstile_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

pub struct AuthService {
    admin: Arc<dyn KvStore>,
    signer: TokenSigner,
    verifier: Option<Arc<dyn HumanVerifier>>,
    seed_username: String,
    seed_password: String,
}

impl AuthService {
    pub fn new(
        admin: Arc<dyn KvStore>,
        signer: TokenSigner,
        verifier: Option<Arc<dyn HumanVerifier>>,
        seed_username: impl Into<String>,
        seed_password: impl Into<String>,
    ) -> Self {
        Self {
            admin,
            signer,
            verifier,
            seed_username: seed_username.into(),
            seed_password: seed_password.into(),
        }
    }

    pub fn from_config(admin: Arc<dyn KvStore>, config: &AuthConfig) -> Result<Self> {
        let signer = TokenSigner::new(
            &config.jwt_secret,
            Duration::from_secs(config.session_expiry_hours.saturating_mul(3600)),
        );

        let verifier: Option<Arc<dyn HumanVerifier>> = match &config.turnstile {
            Some(turnstile) => {
                info!("Turnstile verification enabled for login");
                Some(Arc::new(TurnstileVerifier::from_config(turnstile)?))
            }
            None => None,
        };

        Ok(Self::new(
            admin,
            signer,
            verifier,
            config.admin_username.clone(),
            config.admin_password.clone(),
        ))
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Seed the first admin account once, guarded by a persisted sentinel.
    ///
    /// Concurrent first runs may both seed; the seed is the same either way.
    /// Returns whether anything was written.
    pub async fn bootstrap(&self) -> Result<bool> {
        if self.admin.get(keys::ADMIN_INITIALIZED).await?.is_some() {
            return Ok(false);
        }

        let user_key = keys::admin_user(&self.seed_username);
        if self.admin.get(&user_key).await?.is_none() {
            let user = AdminUser {
                username: self.seed_username.clone(),
                password_hash: hash_blocking(self.seed_password.clone()).await?,
                created_at: now_millis(),
                updated_at: None,
            };
            put_json(self.admin.as_ref(), &user_key, &user, None).await?;

            if self.seed_password == DEFAULT_ADMIN_PASSWORD {
                warn!(
                    "Seeded admin '{}' with the default password; change it immediately",
                    self.seed_username
                );
            } else {
                info!("Seeded admin '{}'", self.seed_username);
            }
        }

        self.admin.put(keys::ADMIN_INITIALIZED, "true", None).await?;
        Ok(true)
    }

    pub async fn login(
        &self,
        request: LoginRequest,
        remote_ip: Option<&str>,
    ) -> Result<LoginResponse, AppError> {
        let username = non_empty(request.username).ok_or(AppError::MissingField("username"))?;
        let password = non_empty(request.password).ok_or(AppError::MissingField("password"))?;

        if let Some(verifier) = &self.verifier {
            let token = request.turnstile_token.unwrap_or_default();
            if !verifier.verify(&token, remote_ip).await {
                return Err(AppError::CaptchaFailed);
            }
        }

        if !self.check_password(&username, password).await? {
            info!("Failed login for '{}'", username);
            return Err(AppError::InvalidCredentials);
        }

        let token = self.signer.issue(&username)?;
        info!("Admin '{}' logged in", username);
        Ok(LoginResponse { token, username })
    }

    pub fn verify(&self, token: &str) -> Option<AdminIdentity> {
        self.signer
            .verify(token)
            .map(|claims| AdminIdentity {
                username: claims.username,
            })
    }

    pub async fn change_password(
        &self,
        username: &str,
        request: ChangePasswordRequest,
    ) -> Result<(), AppError> {
        let old_password =
            non_empty(request.old_password).ok_or(AppError::MissingField("oldPassword"))?;
        let new_password =
            non_empty(request.new_password).ok_or(AppError::MissingField("newPassword"))?;

        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        if !self.check_password(username, old_password).await? {
            return Err(AppError::WrongOldPassword);
        }

        self.reset_password(username, &new_password).await
    }

    /// Overwrite (or create) an admin's password without checking the old one
    pub async fn reset_password(&self, username: &str, new_password: &str) -> Result<(), AppError> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::PasswordTooShort(MIN_PASSWORD_LEN));
        }

        let key = keys::admin_user(username);
        let now = now_millis();
        let password_hash = hash_blocking(new_password.to_string()).await?;
        let user = match get_json::<AdminUser>(self.admin.as_ref(), &key).await? {
            Some(existing) => AdminUser {
                password_hash,
                updated_at: Some(now),
                ..existing
            },
            None => AdminUser {
                username: username.to_string(),
                password_hash,
                created_at: now,
                updated_at: None,
            },
        };
        put_json(self.admin.as_ref(), &key, &user, None).await?;

        info!("Password updated for admin '{}'", username);
        Ok(())
    }

    async fn check_password(&self, username: &str, password: String) -> Result<bool> {
        let Some(user) = get_json::<AdminUser>(self.admin.as_ref(), &keys::admin_user(username)).await?
        else {
            return Ok(false);
        };

        tokio::task::spawn_blocking(move || password::verify_password(&password, &user.password_hash))
            .await
            .context("password verification task failed")
    }
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .context("password hashing task failed")?
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Bearer-token guard for the admin API
pub async fn require_admin(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| auth.verify(token.trim()));

    match identity {
        Some(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        None => AppError::Unauthorized.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;

    struct FixedVerifier(bool);

    #[async_trait]
    impl HumanVerifier for FixedVerifier {
        async fn verify(&self, _token: &str, _remote_ip: Option<&str>) -> bool {
            self.0
        }
    }

    fn service(verifier: Option<Arc<dyn HumanVerifier>>) -> AuthService {
        AuthService::new(
            Arc::new(MemoryStore::new()),
            TokenSigner::new("test-secret", Duration::from_secs(3600)),
            verifier,
            "admin",
            "changeme123",
        )
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: Some(username.into()),
            password: Some(password.into()),
            turnstile_token: None,
        }
    }

    #[tokio::test]
    async fn bootstrap_runs_once() {
        let auth = service(None);
        assert!(auth.bootstrap().await.unwrap());
        assert!(!auth.bootstrap().await.unwrap());
    }

    #[tokio::test]
    async fn bootstrap_does_not_clobber_existing_user() {
        let auth = service(None);
        auth.reset_password("admin", "already-rotated").await.unwrap();
        auth.bootstrap().await.unwrap();

        assert!(auth.login(login_request("admin", "already-rotated"), None).await.is_ok());
    }

    #[tokio::test]
    async fn login_issues_verifiable_token() {
        let auth = service(None);
        auth.bootstrap().await.unwrap();

        let response = auth.login(login_request("admin", "changeme123"), None).await.unwrap();
        assert_eq!(response.username, "admin");
        assert_eq!(
            auth.verify(&response.token),
            Some(AdminIdentity {
                username: "admin".into()
            })
        );
    }

    #[tokio::test]
    async fn login_failures() {
        let auth = service(None);
        auth.bootstrap().await.unwrap();

        let err = auth.login(login_request("admin", "wrong"), None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        let err = auth.login(login_request("ghost", "changeme123"), None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        let err = auth.login(login_request("admin", ""), None).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField("password")));
    }

    #[tokio::test]
    async fn captcha_is_checked_before_credentials() {
        let auth = service(Some(Arc::new(FixedVerifier(false))));
        auth.bootstrap().await.unwrap();
        let err = auth.login(login_request("admin", "wrong"), None).await.unwrap_err();
        assert!(matches!(err, AppError::CaptchaFailed));

        let auth = service(Some(Arc::new(FixedVerifier(true))));
        auth.bootstrap().await.unwrap();
        assert!(auth.login(login_request("admin", "changeme123"), None).await.is_ok());
    }

    #[tokio::test]
    async fn change_password_rules() {
        let auth = service(None);
        auth.bootstrap().await.unwrap();
        let change = |old: &str, new: &str| ChangePasswordRequest {
            old_password: Some(old.into()),
            new_password: Some(new.into()),
        };

        let err = auth.change_password("admin", change("changeme123", "short")).await.unwrap_err();
        assert!(matches!(err, AppError::PasswordTooShort(6)));
        let err = auth.change_password("admin", change("wrong", "long-enough")).await.unwrap_err();
        assert!(matches!(err, AppError::WrongOldPassword));
        let err = auth
            .change_password("admin", ChangePasswordRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingField(_)));

        auth.change_password("admin", change("changeme123", "long-enough"))
            .await
            .unwrap();
        assert!(auth.login(login_request("admin", "changeme123"), None).await.is_err());
        assert!(auth.login(login_request("admin", "long-enough"), None).await.is_ok());
    }
}
