//! In-memory directory for tests
//!
//! Records every transport call in order and evaluates conjunctions of
//! equality terms, e.g. `(&(objectClass=user)(mail=jane@example.com))`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::transport::{
    BindStatus, DirectoryConnector, DirectorySession, SessionSettings, TransportError,
    TransportResult, RC_INVALID_CREDENTIALS,
};
use crate::types::RawEntry;

pub const DOMAIN: &str = "example.com";
pub const BASE_DN: &str = "DC=example,DC=com";
pub const SERVICE_ACCOUNT: &str = "svc";
pub const SERVICE_PASSWORD: &str = "svc-password";

pub const JANE_GUID: [u8; 16] = [
    0x9c, 0x8e, 0x5a, 0x3f, 0x2b, 0x1d, 0x4e, 0x46, 0xa1, 0x7f, 0x00, 0xc0, 0x4f, 0xd9, 0x30, 0xc9,
];
pub const JANE_GUID_STR: &str = "3f5a8e9c-1d2b-464e-a17f-00c04fd930c9";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    Bind(String),
    Search {
        base_dn: String,
        filter: String,
        attributes: Vec<String>,
    },
    Unbind,
}

#[derive(Debug, Clone)]
pub struct FakeUser {
    pub dn: String,
    pub account_name: String,
    pub password: String,
    pub guid: Vec<u8>,
    pub attributes: Vec<(String, String)>,
}

impl FakeUser {
    /// `cn=Jane Doe`, `mail=jane@example.com`, `sAMAccountName=jdoe`
    pub fn jane() -> Self {
        Self {
            dn: format!("CN=Jane Doe,OU=Users,{}", BASE_DN),
            account_name: "jdoe".to_string(),
            password: "correct-password".to_string(),
            guid: JANE_GUID.to_vec(),
            attributes: vec![
                ("cn".into(), "Jane Doe".into()),
                ("displayName".into(), "Jane Doe".into()),
                ("name".into(), "Jane Doe".into()),
                ("mail".into(), "jane@example.com".into()),
                ("userPrincipalName".into(), "jdoe@example.com".into()),
            ],
        }
    }

    fn values(&self, name: &str) -> Vec<String> {
        if name.eq_ignore_ascii_case("sAMAccountName") {
            return vec![self.account_name.clone()];
        }
        if name.eq_ignore_ascii_case("objectClass") {
            return vec!["top".into(), "person".into(), "user".into()];
        }
        self.attributes
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn matches(&self, filter: &str) -> bool {
        filter
            .split(|c| c == '(' || c == ')')
            .filter_map(|term| term.split_once('='))
            .all(|(name, expected)| {
                self.values(name)
                    .iter()
                    .any(|value| value.eq_ignore_ascii_case(expected))
            })
    }

    fn to_raw(&self, attributes: &[String]) -> RawEntry {
        let mut raw = RawEntry {
            dn: self.dn.clone(),
            ..Default::default()
        };

        for name in attributes {
            if name.eq_ignore_ascii_case("objectguid") {
                if !self.guid.is_empty() {
                    raw.bin_attrs
                        .insert("objectGUID".to_string(), vec![self.guid.clone()]);
                }
                continue;
            }

            let values = self.values(name);
            if !values.is_empty() {
                // The server answers with its own attribute casing
                let server_name = self
                    .attributes
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(key, _)| key.clone())
                    .unwrap_or_else(|| "sAMAccountName".to_string());
                raw.attrs.insert(server_name, values);
            }
        }

        raw
    }
}

#[derive(Default)]
struct State {
    users: Vec<FakeUser>,
    calls: Vec<Call>,
    bound_as: Option<String>,
    allow_anonymous: bool,
    fail_open: bool,
    fail_search: bool,
    fault_on_bind: Option<String>,
}

/// Connector and directory in one; clones share state
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<State>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user: FakeUser) -> Self {
        self.state.lock().users.push(user);
        self
    }

    pub fn allow_anonymous(self) -> Self {
        self.state.lock().allow_anonymous = true;
        self
    }

    pub fn fail_open(self) -> Self {
        self.state.lock().fail_open = true;
        self
    }

    pub fn set_fail_search(&self, fail: bool) {
        self.state.lock().fail_search = fail;
    }

    /// Break the connection when `identity` tries to bind
    pub fn fault_on_bind(self, identity: &str) -> Self {
        self.state.lock().fault_on_bind = Some(identity.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn binds(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Bind(identity) => Some(identity),
                _ => None,
            })
            .collect()
    }

    pub fn filters(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Search { filter, .. } => Some(filter),
                _ => None,
            })
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Open(_)))
            .count()
    }

    /// Identity of the current bind, "" when anonymous
    pub fn bound_as(&self) -> Option<String> {
        self.state.lock().bound_as.clone()
    }
}

fn service_identity() -> String {
    format!("{}@{}", SERVICE_ACCOUNT, DOMAIN)
}

#[async_trait]
impl DirectoryConnector for FakeDirectory {
    async fn open(&self, settings: &SessionSettings) -> TransportResult<Box<dyn DirectorySession>> {
        let mut state = self.state.lock();
        state.calls.push(Call::Open(settings.url.clone()));

        if state.fail_open {
            return Err(TransportError("connection refused".to_string()));
        }

        state.bound_as = None;
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn simple_bind(&mut self, identity: &str, password: &str) -> TransportResult<BindStatus> {
        let mut state = self.state.lock();
        state.calls.push(Call::Bind(identity.to_string()));

        if state.fault_on_bind.as_deref() == Some(identity) {
            state.bound_as = None;
            return Err(TransportError("connection reset by peer".to_string()));
        }

        let accepted = if identity.is_empty() && password.is_empty() {
            state.allow_anonymous
        } else if identity == service_identity() {
            password == SERVICE_PASSWORD
        } else {
            state.users.iter().any(|user| {
                format!("{}@{}", user.account_name, DOMAIN).eq_ignore_ascii_case(identity)
                    && user.password == password
            })
        };

        if accepted {
            state.bound_as = Some(identity.to_string());
            Ok(BindStatus::Bound)
        } else {
            state.bound_as = None;
            Ok(BindStatus::Rejected {
                code: RC_INVALID_CREDENTIALS,
                message: "80090308: LdapErr: DSID-0C09044E, AcceptSecurityContext error"
                    .to_string(),
            })
        }
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        attributes: &[String],
    ) -> TransportResult<Vec<RawEntry>> {
        let mut state = self.state.lock();
        state.calls.push(Call::Search {
            base_dn: base_dn.to_string(),
            filter: filter.to_string(),
            attributes: attributes.to_vec(),
        });

        if state.fail_search {
            return Err(TransportError("Search error: rc=1 operationsError".to_string()));
        }
        if state.bound_as.is_none() {
            return Err(TransportError(
                "Search error: rc=1 a successful bind must be completed".to_string(),
            ));
        }

        let base = base_dn.to_ascii_lowercase();
        Ok(state
            .users
            .iter()
            .filter(|user| user.dn.to_ascii_lowercase().ends_with(&base))
            .filter(|user| user.matches(filter))
            .map(|user| user.to_raw(attributes))
            .collect())
    }

    async fn unbind(&mut self) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::Unbind);
        state.bound_as = None;
        Ok(())
    }
}
