//! Adbind Core Library
//!
//! Error type, client configuration and identifier formatting shared by the
//! Adbind directory client.

pub mod config;
pub mod error;
pub mod guid;

pub use config::ClientConfig;
pub use error::{Error, Result};
pub use guid::decode_guid;

/// Adbind version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Attribute holding the Active Directory object identifier
pub const OBJECT_GUID_ATTR: &str = "objectguid";

/// Canonical short logon name attribute
pub const ACCOUNT_NAME_ATTR: &str = "sAMAccountName";

/// Default connect timeout (seconds)
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
