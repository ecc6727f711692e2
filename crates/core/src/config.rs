//! Build-time credentials, service endpoints and HTTP client options

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Login endpoint of the e-service backend
pub const LOGIN_URL: &str = "https://www.dia.es/api/v1/eservice-back/login";

/// Reduced main dashboard of the current customer
pub const DASHBOARD_URL: &str =
    "https://www.dia.es/api/v1/eservice-back/customer/current/main-dashboard/reduced";

/// Application identifier sent with the login request
pub const LOGIN_APPLICATION_FROM: &str = "app";

/// Application identifier sent with the dashboard request
pub const DASHBOARD_APPLICATION_FROM: &str = "8";

/// Account credentials compiled into the binary
///
/// Set `ELDIA_EMAIL` and `ELDIA_PASSWORD` in the build environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Credentials baked in at compile time (empty when not provided)
    pub fn builtin() -> Self {
        Self::new(
            option_env!("ELDIA_EMAIL").unwrap_or_default(),
            option_env!("ELDIA_PASSWORD").unwrap_or_default(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_empty() && self.password.is_empty()
    }
}

// Never print the password
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote endpoints used by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login_url: String,
    pub dashboard_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login_url: LOGIN_URL.to_string(),
            dashboard_url: DASHBOARD_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Endpoints rooted at `base`, keeping the production paths
    ///
    /// Used to point the pipeline at a local stub server.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            login_url: format!("{}/api/v1/eservice-back/login", base),
            dashboard_url: format!(
                "{}/api/v1/eservice-back/customer/current/main-dashboard/reduced",
                base
            ),
        }
    }
}

/// How session cookies are replayed on the dashboard request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookieDelivery {
    /// A single `Cookie: a=1; b=2` header
    CookieHeader,
    /// One header per cookie, cookie name used as header name
    PerNameHeaders,
    /// Both of the above
    #[default]
    Both,
}

impl CookieDelivery {
    pub fn sends_cookie_header(self) -> bool {
        matches!(self, CookieDelivery::CookieHeader | CookieDelivery::Both)
    }

    pub fn sends_per_name_headers(self) -> bool {
        matches!(self, CookieDelivery::PerNameHeaders | CookieDelivery::Both)
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Service endpoints
    pub endpoints: Endpoints,

    /// Cookie replay strategy for the dashboard request
    pub cookie_delivery: CookieDelivery,

    /// Request timeout (`None` = client default, i.e. no timeout)
    pub timeout: Option<Duration>,

    /// Optional `User-Agent` override
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Set custom endpoints
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Set cookie replay strategy
    pub fn with_cookie_delivery(mut self, delivery: CookieDelivery) -> Self {
        self.cookie_delivery = delivery;
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set `User-Agent`
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the shared HTTP client
    ///
    /// Cookie storage is left to [`crate::session::CookieMap`], so the
    /// client itself keeps no cookie jar.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua.as_str());
        }
        Ok(builder.build()?)
    }
}
