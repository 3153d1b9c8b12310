//! Directory transport
//!
//! The client talks to the server through [`DirectoryConnector`] and
//! [`DirectorySession`]. [`Ldap3Connector`] is the real implementation;
//! tests substitute an in-memory directory.

use adbind_core::ClientConfig;
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::RawEntry;

/// LDAP result code for a rejected password
pub const RC_INVALID_CREDENTIALS: u32 = 49;

/// Network or protocol fault reported by the transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

pub type TransportResult<T> = Result<T, TransportError>;

/// Result of a simple bind that reached the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindStatus {
    Bound,
    /// The server answered with a non-zero result code
    Rejected { code: u32, message: String },
}

/// Connection parameters handed to a connector
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub url: String,
    pub timeout: Duration,
    pub start_tls: bool,
    pub skip_tls_verify: bool,
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            url: config.url(),
            timeout: Duration::from_secs(config.timeout_seconds),
            start_tls: config.start_tls,
            skip_tls_verify: config.skip_tls_verify,
        }
    }
}

/// Opens sessions to a directory server
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn open(&self, settings: &SessionSettings) -> TransportResult<Box<dyn DirectorySession>>;
}

/// An open connection to a directory server
#[async_trait]
pub trait DirectorySession: Send {
    /// Bind as `identity`. Empty identity and password bind anonymously.
    async fn simple_bind(&mut self, identity: &str, password: &str) -> TransportResult<BindStatus>;

    /// Subtree search under `base_dn`
    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> TransportResult<Vec<RawEntry>>;

    async fn unbind(&mut self) -> TransportResult<()>;
}

// ============================================================================
// ldap3 transport
// ============================================================================

/// Connector backed by the `ldap3` crate.
///
/// `ldap3` always speaks protocol version 3 and never chases referrals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ldap3Connector;

struct Ldap3Session {
    ldap: Ldap,
    /// Applied to every bind and search
    timeout: Duration,
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn open(&self, settings: &SessionSettings) -> TransportResult<Box<dyn DirectorySession>> {
        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(settings.timeout)
            .set_starttls(settings.start_tls)
            .set_no_tls_verify(settings.skip_tls_verify);

        debug!("Connecting to LDAP server: {}", settings.url);

        let (conn, ldap) = LdapConnAsync::with_settings(conn_settings, &settings.url)
            .await
            .map_err(|e| TransportError(format!("Failed to connect to LDAP server: {}", e)))?;

        ldap3::drive!(conn);

        Ok(Box::new(Ldap3Session {
            ldap,
            timeout: settings.timeout,
        }))
    }
}

#[async_trait]
impl DirectorySession for Ldap3Session {
    async fn simple_bind(&mut self, identity: &str, password: &str) -> TransportResult<BindStatus> {
        let result = self
            .ldap
            .with_timeout(self.timeout)
            .simple_bind(identity, password)
            .await
            .map_err(|e| TransportError(format!("Bind failed: {}", e)))?;

        if result.rc == 0 {
            Ok(BindStatus::Bound)
        } else {
            Ok(BindStatus::Rejected {
                code: result.rc,
                message: result.text,
            })
        }
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> TransportResult<Vec<RawEntry>> {
        let (rs, _res) = self
            .ldap
            .with_timeout(self.timeout)
            .search(base_dn, Scope::Subtree, filter, attributes.to_vec())
            .await
            .map_err(|e| TransportError(format!("Search failed: {}", e)))?
            .success()
            .map_err(|e| TransportError(format!("Search error: {}", e)))?;

        Ok(rs
            .into_iter()
            .filter(|entry| !entry.is_ref())
            .map(|entry| RawEntry::from(SearchEntry::construct(entry)))
            .collect())
    }

    async fn unbind(&mut self) -> TransportResult<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| TransportError(format!("Unbind failed: {}", e)))
    }
}
