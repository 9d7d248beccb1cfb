//! Delivery client: authenticated window delivery to the readings backend.
//!
//! A bounded state machine instead of retry-forever: `NoToken → login →
//! Authenticated → post → {Delivered | AuthRejected | TransportFailure}`.
//! A 401 invalidates the cached session and earns exactly one re-login and
//! re-post for the same window; a second 401 is fatal for the run. Callers
//! decide control flow from the returned outcome.

use crate::payload::WindowPayload;
use crate::types::{AuthSession, DeliveryOutcome};
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Client construction errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Seam between the pipeline and the backend, so tests can script outcomes.
#[async_trait]
pub trait DeliverySink: Send {
    /// Deliver one window payload, classifying the result.
    async fn deliver(&mut self, payload: &WindowPayload) -> DeliveryOutcome;
}

enum LoginResult {
    Session,
    Rejected,
    Transport,
}

enum PostResult {
    Accepted,
    Unauthorized,
    Failed,
}

/// HTTP client for the readings backend.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
    login_timeout: Duration,
    session: Option<AuthSession>,
}

/// Extract a `token=` value from one `Set-Cookie` header.
fn token_from_cookie(header_value: &str) -> Option<String> {
    header_value
        .split(';')
        .find_map(|part| part.trim().strip_prefix("token="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

impl BackendClient {
    /// Build a client for the given backend.
    ///
    /// `base_url` is the service root (e.g. `https://backend.example.com`);
    /// the login and readings paths are fixed by the backend API.
    pub fn new(
        base_url: &str,
        email: &str,
        password: &str,
        login_timeout_secs: u64,
        post_timeout_secs: u64,
    ) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(post_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            password: password.to_string(),
            login_timeout: Duration::from_secs(login_timeout_secs),
            session: None,
        })
    }

    fn login_url(&self) -> String {
        format!("{}/api/auth/login", self.base_url)
    }

    fn readings_url(&self) -> String {
        format!("{}/api/readings", self.base_url)
    }

    /// Authenticate and cache the resulting session.
    async fn login(&mut self) -> LoginResult {
        self.session = None;

        let resp = self
            .http
            .post(self.login_url())
            .timeout(self.login_timeout)
            .json(&json!({ "email": self.email, "password": self.password }))
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Login request failed");
                return LoginResult::Transport;
            }
        };

        if !resp.status().is_success() {
            error!(status = %resp.status(), "Authentication rejected");
            return LoginResult::Rejected;
        }

        // Token travels in a Set-Cookie header; read before consuming the body.
        let mut token: Option<String> = None;
        for value in resp.headers().get_all(header::SET_COOKIE) {
            if let Ok(s) = value.to_str() {
                if let Some(t) = token_from_cookie(s) {
                    token = Some(t);
                    break;
                }
            }
        }

        // Less common: token field in the response body.
        if token.is_none() {
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                token = body
                    .get("token")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string);
            }
        }

        let session = match token {
            Some(t) => {
                info!("Authenticated, token extracted");
                AuthSession::Token(t)
            }
            None => {
                warn!("Login accepted but no token in headers or body, proceeding with implicit session");
                AuthSession::Implicit
            }
        };
        self.session = Some(session);
        LoginResult::Session
    }

    /// Post one payload with the cached session.
    async fn post_window(&self, payload: &WindowPayload) -> PostResult {
        let mut req = self.http.post(self.readings_url()).json(payload);
        if let Some(AuthSession::Token(token)) = &self.session {
            req = req.header(header::COOKIE, format!("token={token}"));
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(status = %resp.status(), "Window payload accepted");
                PostResult::Accepted
            }
            Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                warn!("Backend returned 401, cached session invalid");
                PostResult::Unauthorized
            }
            Ok(resp) => {
                error!(status = %resp.status(), "Backend rejected window payload");
                PostResult::Failed
            }
            Err(e) => {
                error!(error = %e, "Error sending window payload");
                PostResult::Failed
            }
        }
    }
}

#[async_trait]
impl DeliverySink for BackendClient {
    async fn deliver(&mut self, payload: &WindowPayload) -> DeliveryOutcome {
        if self.session.is_none() {
            match self.login().await {
                LoginResult::Session => {}
                LoginResult::Rejected => return DeliveryOutcome::AuthRejected,
                LoginResult::Transport => return DeliveryOutcome::TransportFailure,
            }
        }

        match self.post_window(payload).await {
            PostResult::Accepted => DeliveryOutcome::Delivered,
            PostResult::Failed => DeliveryOutcome::TransportFailure,
            PostResult::Unauthorized => {
                // One re-login, one re-post, same window.
                self.session = None;
                match self.login().await {
                    LoginResult::Session => {}
                    LoginResult::Rejected => return DeliveryOutcome::AuthRejected,
                    LoginResult::Transport => return DeliveryOutcome::TransportFailure,
                }
                match self.post_window(payload).await {
                    PostResult::Accepted => DeliveryOutcome::Delivered,
                    PostResult::Unauthorized => {
                        self.session = None;
                        DeliveryOutcome::AuthRejected
                    }
                    PostResult::Failed => DeliveryOutcome::TransportFailure,
                }
            }
        }
    }
}
