//! Client configuration.
//!
//! # Design
//! `NetworkConfig` is built once at startup and handed to the `Client`, which
//! keeps it behind an `Arc` and never mutates it. Changing the base URL means
//! building a new client; there is no process-wide mutable setting.

use std::time::Duration;

/// `User-Agent` used when the host supplies no identity.
pub const DEFAULT_USER_AGENT: &str = "courier/1.0.0";

/// Timeout handed to the transport with every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const BASE_URL_VAR: &str = "COURIER_BASE_URL";
const TIMEOUT_VAR: &str = "COURIER_TIMEOUT_SECS";

/// Identity of the host application, used to build the `User-Agent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub executable: String,
    pub version: String,
    pub build: String,
    pub platform: String,
    pub os_name: String,
    pub os_version: String,
}

impl AppIdentity {
    /// `{executable}/{version} ({platform}; {os} {os_version}; build:{build};)`
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} ({}; {} {}; build:{};)",
            self.executable, self.version, self.platform, self.os_name, self.os_version, self.build
        )
    }
}

/// Settings shared by every request a `Client` makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl NetworkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Read `COURIER_BASE_URL` and `COURIER_TIMEOUT_SECS`, keeping defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::new(std::env::var(BASE_URL_VAR).unwrap_or_default());
        if let Some(secs) = std::env::var(TIMEOUT_VAR).ok().and_then(|v| v.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Derive the `User-Agent` from `identity`, or fall back to
    /// [`DEFAULT_USER_AGENT`].
    pub fn with_identity(mut self, identity: Option<&AppIdentity>) -> Self {
        self.user_agent = match identity {
            Some(identity) => identity.user_agent(),
            None => DEFAULT_USER_AGENT.to_string(),
        };
        self
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
