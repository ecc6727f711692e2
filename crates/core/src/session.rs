//! Credential login and session cookie extraction
//!
//! The login exchange is a single JSON POST. The session is carried solely by
//! the `Set-Cookie` headers of a `200 OK` response; every other outcome
//! degrades to an empty [`CookieMap`].

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, ACCEPT, SET_COOKIE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::{ClientConfig, Credentials, LOGIN_APPLICATION_FROM};
use crate::error::{CoreError, Result};

/// Header identifying the calling application
pub const APPLICATION_FROM_HEADER: &str = "X-Id-Application-From";

/// Session cookies, keyed by cookie name
///
/// Ordered by name so replayed headers are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieMap(BTreeMap<String, String>);

impl CookieMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cookie, replacing any previous value with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Collect every well-formed `Set-Cookie` header
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_set_cookie_values(
            headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )
    }

    /// Collect cookies from raw `Set-Cookie` values
    ///
    /// Later values win when a name repeats.
    pub fn from_set_cookie_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut cookies = Self::new();
        for value in values {
            match parse_set_cookie(value) {
                Some((name, value)) => cookies.insert(name, value),
                None => debug!("Dropping malformed Set-Cookie value"),
            }
        }
        cookies
    }

    /// Render as a `Cookie` request header value (`a=1; b=2`)
    ///
    /// Returns `None` for an empty map.
    pub fn to_cookie_header(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Parse one `Set-Cookie` value into `(name, value)`
///
/// Attributes after the first `;` are discarded. The remaining pair must
/// contain exactly one `=` and a non-empty name, otherwise it is dropped.
pub fn parse_set_cookie(header_value: &str) -> Option<(String, String)> {
    let pair = header_value.split(';').next()?.trim();
    let mut parts = pair.split('=');
    let name = parts.next()?;
    let value = parts.next()?;
    if parts.next().is_some() || name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.to_string()))
}

/// Login request body
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    are_consents_accepted: bool,
    are_legal_conditions_accepted: bool,
    email: &'a str,
    password: &'a str,
}

impl<'a> LoginRequest<'a> {
    fn new(credentials: &'a Credentials) -> Self {
        Self {
            are_consents_accepted: false,
            are_legal_conditions_accepted: true,
            email: &credentials.email,
            password: &credentials.password,
        }
    }
}

/// Performs the login exchange
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    client: Client,
    login_url: String,
}

impl SessionAuthenticator {
    pub fn new(client: Client, login_url: impl Into<String>) -> Self {
        Self {
            client,
            login_url: login_url.into(),
        }
    }

    /// Create from config with a dedicated HTTP client
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(
            config.build_client()?,
            config.endpoints.login_url.clone(),
        ))
    }

    /// Log in and return the session cookies
    ///
    /// Network failures and rejected logins are logged and yield an empty
    /// map; later requests simply go out unauthenticated.
    pub async fn authenticate(&self, credentials: &Credentials) -> CookieMap {
        match self.try_authenticate(credentials).await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("Login failed, continuing without session: {}", e);
                CookieMap::new()
            }
        }
    }

    /// Log in, reporting why it failed
    ///
    /// # Errors
    /// - `Http` on connection or transport failure
    /// - `LoginRejected` for any status other than 200
    pub async fn try_authenticate(&self, credentials: &Credentials) -> Result<CookieMap> {
        if credentials.is_empty() {
            warn!("No credentials compiled in, login will most likely be rejected");
        }

        let response = self
            .client
            .post(&self.login_url)
            .header(ACCEPT, "*/*")
            .header(APPLICATION_FROM_HEADER, LOGIN_APPLICATION_FROM)
            .json(&LoginRequest::new(credentials))
            .send()
            .await?;

        let status = response.status();
        info!("Login response status: {}", status);

        if status != StatusCode::OK {
            return Err(CoreError::LoginRejected {
                status: status.as_u16(),
            });
        }

        let cookies = CookieMap::from_headers(response.headers());

        // Body is diagnostic only
        match response.text().await {
            Ok(body) => trace!(len = body.len(), "Login response body: {}", body),
            Err(e) => warn!("Failed to read login response body: {}", e),
        }

        debug!("Login returned {} session cookies", cookies.len());
        Ok(cookies)
    }
}
