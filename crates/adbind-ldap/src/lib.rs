//! Active Directory client for Adbind
//!
//! Features:
//! - Service account or anonymous bind
//! - Password authentication with login name resolution
//!   (account name, mail, CN, display name, ...)
//! - Attribute search with decoded `objectGUID`

mod client;
mod transport;
mod types;

#[cfg(test)]
mod testing;

pub use adbind_core::{decode_guid, ClientConfig, Error, Result};
pub use client::DirectoryClient;
pub use transport::{
    BindStatus, DirectoryConnector, DirectorySession, Ldap3Connector, SessionSettings,
    TransportError, TransportResult,
};
pub use types::{AuthResult, DirectoryEntry, RawEntry};
