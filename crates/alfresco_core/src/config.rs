//! Session configuration.
//!
//! # Responsibility
//! - Carry credentials, endpoint and transport options for session creation.
//! - Read the same settings from the process environment.
//!
//! # Invariants
//! - `url` never ends with `/`.
//! - The password is never printed by `Debug`.

use std::fmt::{Debug, Formatter};
use std::time::Duration;

pub const ENV_USER: &str = "ALFRESCO_USER";
pub const ENV_PASSWORD: &str = "ALFRESCO_PASSWORD";
pub const ENV_URL: &str = "ALFRESCO_URL";
pub const ENV_TIMEOUT_MS: &str = "ALFRESCO_TIMEOUT_MS";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// CMIS wire transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingType {
    /// CMIS 1.1 browser binding (JSON).
    #[default]
    Browser,
    AtomPub,
    WebServices,
}

impl BindingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::AtomPub => "atompub",
            Self::WebServices => "webservices",
        }
    }
}

/// Connection settings for one repository endpoint.
#[derive(Clone)]
pub struct SessionConfig {
    pub user: String,
    pub password: String,
    pub url: String,
    pub binding: BindingType,
    pub timeout_ms: u64,
}

impl SessionConfig {
    pub fn new(user: &str, password: &str, url: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            url: normalize_url(url),
            binding: BindingType::Browser,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Reads `ALFRESCO_USER`, `ALFRESCO_PASSWORD`, `ALFRESCO_URL` and the
    /// optional `ALFRESCO_TIMEOUT_MS`.
    ///
    /// Returns `None` when the url or user is unset or blank.
    pub fn from_env() -> Option<Self> {
        let url = read_non_empty_env(ENV_URL)?;
        let user = read_non_empty_env(ENV_USER)?;
        let password = std::env::var(ENV_PASSWORD).unwrap_or_default();
        let timeout_ms = std::env::var(ENV_TIMEOUT_MS)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Some(Self {
            timeout_ms,
            ..Self::new(&user, &password, &url)
        })
    }

    pub fn with_binding(mut self, binding: BindingType) -> Self {
        self.binding = binding;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Debug for SessionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("user", &self.user)
            .field("url", &self.url)
            .field("binding", &self.binding)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

fn read_non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
