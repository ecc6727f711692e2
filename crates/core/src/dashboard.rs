//! Authenticated dashboard fetch and `qr_code` token extraction

use std::collections::VecDeque;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::config::{ClientConfig, CookieDelivery, DASHBOARD_APPLICATION_FROM};
use crate::error::{CoreError, Result};
use crate::session::CookieMap;

/// JSON field holding the scannable token
pub const QR_CODE_FIELD: &str = "qr_code";

/// Text fallback for bodies that are not valid JSON; honours `\"` escapes
static QR_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""qr_code"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid qr_code pattern")
});

/// Opaque token taken from the dashboard response
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DashboardToken(String);

impl DashboardToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DashboardToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the `qr_code` string from a dashboard body
///
/// Valid JSON is searched structurally: the shallowest `qr_code` string wins,
/// ties broken by document order. Anything else falls back to a text scan
/// that takes the first match.
pub fn extract_qr_code(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(document) => find_string_field(&document, QR_CODE_FIELD),
        Err(e) => {
            debug!("Dashboard body is not valid JSON ({}), scanning text", e);
            scan_qr_code(body)
        }
    }
}

/// Breadth-first lookup of a string-valued field
fn find_string_field(root: &Value, key: &str) -> Option<String> {
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        match node {
            Value::Object(map) => {
                if let Some(Value::String(s)) = map.get(key) {
                    return Some(s.clone());
                }
                queue.extend(map.values());
            }
            Value::Array(items) => queue.extend(items.iter()),
            _ => {}
        }
    }
    None
}

fn scan_qr_code(body: &str) -> Option<String> {
    let raw = QR_CODE_PATTERN.captures(body)?.get(1)?.as_str();
    // Decode JSON escapes; keep the raw text if they are malformed
    Some(serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string()))
}

/// Performs the cookie-authenticated dashboard request
#[derive(Debug, Clone)]
pub struct DashboardFetcher {
    client: Client,
    dashboard_url: String,
    cookie_delivery: CookieDelivery,
}

impl DashboardFetcher {
    pub fn new(client: Client, dashboard_url: impl Into<String>) -> Self {
        Self {
            client,
            dashboard_url: dashboard_url.into(),
            cookie_delivery: CookieDelivery::default(),
        }
    }

    /// Create from config with a dedicated HTTP client
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(config.build_client()?, config.endpoints.dashboard_url.clone())
            .with_cookie_delivery(config.cookie_delivery))
    }

    pub fn with_cookie_delivery(mut self, delivery: CookieDelivery) -> Self {
        self.cookie_delivery = delivery;
        self
    }

    /// Headers for the dashboard request
    ///
    /// Static application headers first, then the session cookies in the
    /// configured form.
    pub fn request_headers(&self, cookies: &CookieMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-id-application-from"),
            HeaderValue::from_static(DASHBOARD_APPLICATION_FROM),
        );
        headers.insert(
            HeaderName::from_static("order_source"),
            HeaderValue::from_static("app"),
        );
        headers.insert(
            HeaderName::from_static("x-marketing-cookies-accepted"),
            HeaderValue::from_static("1"),
        );

        if self.cookie_delivery.sends_per_name_headers() {
            for (name, value) in cookies.iter() {
                match (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => warn!("Cookie {:?} cannot be sent as a header, skipping", name),
                }
            }
        }

        if self.cookie_delivery.sends_cookie_header() {
            if let Some(cookie_header) = cookies.to_cookie_header() {
                match HeaderValue::from_str(&cookie_header) {
                    Ok(value) => {
                        headers.insert(COOKIE, value);
                    }
                    Err(e) => warn!("Session cookies do not form a valid Cookie header: {}", e),
                }
            }
        }

        headers
    }

    /// Fetch the dashboard and extract the token
    ///
    /// Transport failures, non-200 responses and missing tokens all yield
    /// `None`; the cause is only logged.
    pub async fn fetch_token(&self, cookies: &CookieMap) -> Option<DashboardToken> {
        match self.try_fetch_token(cookies).await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Dashboard token unavailable: {}", e);
                None
            }
        }
    }

    /// Fetch the dashboard, reporting why no token came back
    ///
    /// # Errors
    /// - `Http` on connection or transport failure
    /// - `DashboardRejected` for any status other than 200
    /// - `TokenMissing` when the body carries no `qr_code` string
    pub async fn try_fetch_token(&self, cookies: &CookieMap) -> Result<DashboardToken> {
        if cookies.is_empty() {
            debug!("Fetching dashboard without session cookies");
        }

        let response = self
            .client
            .get(&self.dashboard_url)
            .headers(self.request_headers(cookies))
            .send()
            .await?;

        let status = response.status();
        info!("Dashboard response status: {}", status);

        if status != StatusCode::OK {
            return Err(CoreError::DashboardRejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        trace!(len = body.len(), "Dashboard response body: {}", body);

        let token = extract_qr_code(&body).ok_or(CoreError::TokenMissing)?;
        info!("Dashboard token found ({} chars)", token.chars().count());
        Ok(DashboardToken::new(token))
    }
}
