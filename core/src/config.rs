//! Client configuration.

use std::env::{self, VarError};

use crate::error::ApiError;

const DEFAULT_USER_AGENT: &str = concat!("freshdesk-core/", env!("CARGO_PKG_VERSION"));

/// Settings shared by every call made through one `FreshdeskClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prefix for `FreshdeskClient::endpoint`, e.g. `https://acme.freshdesk.com/api/v2`.
    pub base_url: Option<String>,
    /// Abort a call after this many milliseconds. `None` keeps the transport default.
    pub timeout_ms: Option<u64>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Configuration for `https://<domain>.freshdesk.com/api/v2`.
    pub fn for_domain(domain: &str) -> Self {
        Self::default().with_base_url(format!("https://{domain}.freshdesk.com/api/v2"))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Create configuration from environment variables
    ///
    /// Reads:
    /// - `FRESHDESK_BASE_URL`: explicit API root, wins over the domain
    /// - `FRESHDESK_DOMAIN`: account subdomain, used when no base URL is set
    /// - `FRESHDESK_TIMEOUT_MS`: per-call timeout in milliseconds
    pub fn from_env() -> Result<Self, ApiError> {
        let mut config = match (read_var("FRESHDESK_BASE_URL")?, read_var("FRESHDESK_DOMAIN")?) {
            (Some(base_url), _) => Self::default().with_base_url(base_url),
            (None, Some(domain)) => Self::for_domain(&domain),
            (None, None) => Self::default(),
        };
        if let Some(raw) = read_var("FRESHDESK_TIMEOUT_MS")? {
            let timeout_ms = raw.trim().parse().map_err(|_| {
                ApiError::Configuration(format!("FRESHDESK_TIMEOUT_MS is not a number: {raw}"))
            })?;
            config.timeout_ms = Some(timeout_ms);
        }
        Ok(config)
    }
}

/// Unset and blank variables both read as `None`.
fn read_var(name: &str) -> Result<Option<String>, ApiError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ApiError::Configuration(format!(
            "{name} is not valid unicode"
        ))),
    }
}
