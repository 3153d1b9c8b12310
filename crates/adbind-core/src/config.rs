//! Directory client configuration
//!
//! Example config:
//! ```toml
//! host = "dc01.corp.example.com"
//! domain = "corp.example.com"
//! username = "svc-portal"
//! password = "s3cret"
//! base_dn = "DC=corp,DC=example,DC=com"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::{Error, Result, DEFAULT_TIMEOUT_SECONDS};

/// Connection settings for a directory client.
///
/// Validated once when a client is built and never mutated afterwards.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientConfig {
    /// Directory server host, optionally with `:port`
    pub host: String,

    /// Domain appended to account names when binding (`user@domain`)
    pub domain: String,

    /// Service account name
    #[serde(default)]
    pub username: String,

    /// Service account password
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Default search base
    /// Example: "DC=corp,DC=example,DC=com"
    pub base_dn: String,

    /// Bind without credentials
    #[serde(default)]
    pub anonymous: bool,

    /// Upgrade the connection with STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Timeout in seconds for connecting and for each bind or search
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Attributes matched against a login name, in order, to find the
    /// account names it may refer to
    #[serde(default = "default_match_attributes")]
    pub match_attributes: Vec<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

pub fn default_match_attributes() -> Vec<String> {
    [
        "cn",
        "mail",
        "userPrincipalName",
        "displayname",
        "name",
        "sAMAccountName",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ClientConfig {
    /// Config for a service account bind
    pub fn new(
        host: impl Into<String>,
        domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        base_dn: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            domain: domain.into(),
            username: username.into(),
            password: password.into(),
            base_dn: base_dn.into(),
            anonymous: false,
            start_tls: false,
            skip_tls_verify: false,
            timeout_seconds: default_timeout(),
            match_attributes: default_match_attributes(),
        }
    }

    /// Config for an anonymous bind
    pub fn anonymous(
        host: impl Into<String>,
        domain: impl Into<String>,
        base_dn: impl Into<String>,
    ) -> Self {
        Self {
            anonymous: true,
            ..Self::new(host, domain, "", "", base_dn)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_env() -> Result<Self> {
        let required = |key: &str| {
            std::env::var(key).map_err(|_| Error::Config(format!("{} is not set", key)))
        };
        let flag = |key: &str| {
            std::env::var(key)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
        };

        let anonymous = flag("ADBIND_ANONYMOUS");
        let mut config = Self::new(
            required("ADBIND_HOST")?,
            required("ADBIND_DOMAIN")?,
            std::env::var("ADBIND_USERNAME").unwrap_or_default(),
            std::env::var("ADBIND_PASSWORD").unwrap_or_default(),
            required("ADBIND_BASE_DN")?,
        );
        config.anonymous = anonymous;
        config.start_tls = flag("ADBIND_START_TLS");

        if let Ok(timeout) = std::env::var("ADBIND_TIMEOUT_SECONDS") {
            config.timeout_seconds = timeout
                .parse()
                .map_err(|_| Error::Config(format!("Invalid ADBIND_TIMEOUT_SECONDS: {}", timeout)))?;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Validation("host is required".to_string()));
        }

        if self.host.contains("://") {
            return Err(Error::Validation(
                "host must not include a URL scheme".to_string(),
            ));
        }

        if self.domain.trim().is_empty() {
            return Err(Error::Validation("domain is required".to_string()));
        }

        if self.base_dn.trim().is_empty() {
            return Err(Error::Validation("base_dn is required".to_string()));
        }

        if !self.anonymous {
            if self.username.trim().is_empty() {
                return Err(Error::Validation(
                    "username is required unless anonymous".to_string(),
                ));
            }
            if self.password.is_empty() {
                return Err(Error::Validation(
                    "password is required unless anonymous".to_string(),
                ));
            }
        }

        if self.match_attributes.iter().any(|a| a.trim().is_empty()) {
            return Err(Error::Validation(
                "match_attributes must not contain empty names".to_string(),
            ));
        }

        Ok(())
    }

    /// Server URL
    pub fn url(&self) -> String {
        format!("ldap://{}", self.host)
    }

    /// Identity used for a simple bind as `account`
    pub fn bind_identity(&self, account: &str) -> String {
        format!("{}@{}", account, self.domain)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_dn", &self.base_dn)
            .field("anonymous", &self.anonymous)
            .field("start_tls", &self.start_tls)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("match_attributes", &self.match_attributes)
            .finish()
    }
}
