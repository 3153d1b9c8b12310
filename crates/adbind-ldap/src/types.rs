//! Directory entry and authentication result types

use adbind_core::{decode_guid, OBJECT_GUID_ATTR};
use ldap3::SearchEntry;
use serde::Serialize;
use std::collections::HashMap;

// ============================================================================
// Raw entries
// ============================================================================

/// Entry as returned by the transport, before attribute selection.
///
/// Attribute names keep the server's casing. Values that are not valid
/// UTF-8 (such as `objectGUID`) land in `bin_attrs`.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl RawEntry {
    /// First textual value of an attribute, matched case-insensitively
    pub fn first_value(&self, name: &str) -> Option<String> {
        if let Some(values) = lookup(&self.attrs, name) {
            return values.first().cloned();
        }

        lookup(&self.bin_attrs, name)
            .and_then(|values| values.first())
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// First value of an attribute as raw bytes
    pub fn first_bytes(&self, name: &str) -> Option<Vec<u8>> {
        if let Some(values) = lookup(&self.bin_attrs, name) {
            return values.first().cloned();
        }

        lookup(&self.attrs, name)
            .and_then(|values| values.first())
            .map(|v| v.as_bytes().to_vec())
    }
}

impl From<SearchEntry> for RawEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }
}

fn lookup<'a, V>(map: &'a HashMap<String, V>, name: &str) -> Option<&'a V> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

// ============================================================================
// Directory entry
// ============================================================================

/// Search result: one string per requested attribute, plus the decoded
/// `objectguid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    /// Distinguished name
    pub dn: String,

    /// Requested attribute name -> first value, or "" when absent
    pub attributes: HashMap<String, String>,
}

impl DirectoryEntry {
    /// Select `requested` from a raw entry.
    ///
    /// Returns `None` when the entry has no usable `objectGUID`.
    pub fn from_raw(raw: &RawEntry, requested: &[String]) -> Option<Self> {
        let mut attributes = HashMap::with_capacity(requested.len() + 1);

        for name in requested {
            if name.eq_ignore_ascii_case(OBJECT_GUID_ATTR) {
                continue;
            }
            attributes.insert(name.clone(), raw.first_value(name).unwrap_or_default());
        }

        let guid = raw
            .first_bytes(OBJECT_GUID_ATTR)
            .map(|bytes| decode_guid(&bytes))
            .unwrap_or_default();
        if guid.is_empty() {
            return None;
        }
        attributes.insert(OBJECT_GUID_ATTR.to_string(), guid);

        Some(Self {
            dn: raw.dn.clone(),
            attributes,
        })
    }

    /// Value of a requested attribute ("" when the entry had none)
    pub fn get(&self, name: &str) -> Option<&str> {
        lookup(&self.attributes, name).map(|s| s.as_str())
    }

    pub fn object_guid(&self) -> &str {
        self.get(OBJECT_GUID_ATTR).unwrap_or_default()
    }
}

// ============================================================================
// Authentication Result
// ============================================================================

/// Outcome of a password check.
///
/// A wrong password is not an error: failures of the directory or of the
/// caller's input are reported through `Error` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuthResult {
    /// Bound successfully as this account name
    Authenticated { account_name: String },
    /// No candidate account accepted the password
    InvalidCredentials,
}

impl AuthResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthResult::Authenticated { .. })
    }

    pub fn account_name(&self) -> Option<&str> {
        match self {
            AuthResult::Authenticated { account_name } => Some(account_name),
            AuthResult::InvalidCredentials => None,
        }
    }
}
