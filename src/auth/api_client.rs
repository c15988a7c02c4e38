//! HTTP-backed authentication context.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::decode_session;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::session::{AuthContext, Session};

/// Response from the token refresh endpoint
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

#[derive(Debug)]
struct Credentials {
    token: String,
    session: Session,
}

/// Auth context that holds a bearer token and renews it against the auth API.
pub struct HttpAuthClient {
    client: reqwest::Client,
    refresh_url: String,
    logout_url: String,
    credentials: ArcSwapOption<Credentials>,
}

impl HttpAuthClient {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!("sessionguard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let base = config.api_url.trim_end_matches('/');
        Ok(Self {
            client,
            refresh_url: format!("{}{}", base, config.refresh_path),
            logout_url: format!("{}{}", base, config.logout_path),
            credentials: ArcSwapOption::empty(),
        })
    }

    /// Replace the current token, returning the session it carries.
    pub fn set_token(&self, token: impl Into<String>) -> Result<Session, AuthError> {
        let token = token.into();
        let session = decode_session(&token)?;
        self.credentials.store(Some(Arc::new(Credentials {
            token,
            session: session.clone(),
        })));
        Ok(session)
    }

    pub fn token(&self) -> Option<String> {
        self.credentials.load_full().map(|c| c.token.clone())
    }

    pub fn refresh_url(&self) -> &str {
        &self.refresh_url
    }
}

#[async_trait]
impl AuthContext for HttpAuthClient {
    fn current_session(&self) -> Option<Session> {
        self.credentials.load_full().map(|c| c.session.clone())
    }

    async fn logout(&self) {
        let Some(credentials) = self.credentials.swap(None) else {
            return;
        };
        info!("Logging out");

        let result = self
            .client
            .post(&self.logout_url)
            .bearer_auth(&credentials.token)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Server-side session revoked");
            }
            Ok(response) => {
                warn!(status = %response.status(), "Logout request was rejected");
            }
            Err(e) => {
                warn!(error = %e, "Logout request failed");
            }
        }
    }

    async fn refresh_token(&self) -> Result<Session, AuthError> {
        let token = self.token().ok_or(AuthError::MissingToken)?;

        let response = self
            .client
            .post(&self.refresh_url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, body });
        }

        let refreshed: RefreshResponse = response.json().await?;
        let session = self.set_token(refreshed.token)?;
        debug!(exp = session.exp, "Token refreshed");
        Ok(session)
    }
}
