//! Directory client implementation
//!
//! Owns at most one session to the directory server, bound as the service
//! account (or anonymously). The session is opened lazily by the first
//! operation that needs it and released by [`DirectoryClient::close`].

use adbind_core::{ClientConfig, Error, Result, ACCOUNT_NAME_ATTR, OBJECT_GUID_ATTR};
use tracing::{debug, info, warn};

use crate::transport::{
    BindStatus, DirectoryConnector, DirectorySession, Ldap3Connector, SessionSettings,
    RC_INVALID_CREDENTIALS,
};
use crate::types::{AuthResult, DirectoryEntry};

enum ConnectionState {
    Disconnected,
    Connected(Box<dyn DirectorySession>),
}

/// Client for an Active Directory server.
///
/// Operations take `&mut self`: a client and its session belong to a single
/// caller. `authenticate` temporarily rebinds the session as the user being
/// checked, so concurrent callers need one client each.
pub struct DirectoryClient<C = Ldap3Connector> {
    config: ClientConfig,
    connector: C,
    state: ConnectionState,
}

impl DirectoryClient<Ldap3Connector> {
    /// Create a client using the `ldap3` transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, Ldap3Connector)
    }
}

impl<C: DirectoryConnector> DirectoryClient<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            connector,
            state: ConnectionState::Disconnected,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// Open a session and bind it as the service account.
    ///
    /// An existing session is unbound first.
    pub async fn connect(&mut self) -> Result<()> {
        if let ConnectionState::Connected(mut previous) =
            std::mem::replace(&mut self.state, ConnectionState::Disconnected)
        {
            debug!("Replacing existing directory session");
            if let Err(e) = previous.unbind().await {
                warn!("Failed to unbind previous session: {}", e);
            }
        }

        let settings = SessionSettings::from(&self.config);
        let mut session = self
            .connector
            .open(&settings)
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", settings.url, e)))?;

        bind_service(&self.config, session.as_mut()).await?;

        info!("Connected to directory server {}", settings.url);
        self.state = ConnectionState::Connected(session);
        Ok(())
    }

    /// Check `password` for the account `username` refers to.
    ///
    /// `username` may be an account name or any value of the configured
    /// match attributes (mail, CN, display name, ...). Returns the account
    /// name that accepted the password. The session is bound as the
    /// service account again before returning.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
        base_dn: Option<&str>,
    ) -> Result<AuthResult> {
        if username.trim().is_empty() {
            return Err(Error::Validation("username not specified".to_string()));
        }

        if password.is_empty() {
            // An empty password would make an unauthenticated bind succeed
            warn!("Rejecting empty password for {}", username);
            return Ok(AuthResult::InvalidCredentials);
        }

        let candidates = self.resolve_account_names(username, base_dn).await?;
        debug!(
            "Trying {} candidate account(s) for {}: {:?}",
            candidates.len(),
            username,
            candidates
        );

        let attempts: Vec<(String, String)> = candidates
            .into_iter()
            .map(|candidate| {
                let identity = self.config.bind_identity(&candidate);
                (candidate, identity)
            })
            .collect();

        let session = self.session().await?;
        let mut authenticated = None;
        let mut fault = None;

        for (candidate, identity) in attempts {
            match session.simple_bind(&identity, password).await {
                Ok(BindStatus::Bound) => {
                    authenticated = Some(candidate);
                    break;
                }
                Ok(BindStatus::Rejected { code, .. }) if code == RC_INVALID_CREDENTIALS => {
                    debug!("Invalid credentials for {}", identity);
                }
                Ok(BindStatus::Rejected { code, message }) => {
                    debug!("Bind as {} rejected (rc={}): {}", identity, code, message);
                }
                Err(e) => {
                    fault = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = fault {
            warn!("Directory session failed during authentication: {}", e);
            self.state = ConnectionState::Disconnected;
            return Err(Error::Connection(format!("Bind attempt failed: {}", e)));
        }

        self.restore_service_bind().await?;

        match authenticated {
            Some(account_name) => {
                info!("Authenticated {} as {}", username, account_name);
                Ok(AuthResult::Authenticated { account_name })
            }
            None => {
                info!("Invalid credentials for {}", username);
                Ok(AuthResult::InvalidCredentials)
            }
        }
    }

    /// Subtree search returning the first value of each requested attribute.
    ///
    /// `objectguid` is always requested and decoded; entries without one
    /// are skipped. An empty result means nothing matched.
    pub async fn search(
        &mut self,
        filter: &str,
        attributes: &[&str],
        base_dn: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>> {
        if filter.trim().is_empty() {
            return Err(Error::Validation("search filter is empty".to_string()));
        }

        let base_dn = base_dn.unwrap_or(&self.config.base_dn).to_string();
        if base_dn.trim().is_empty() {
            return Err(Error::Validation("search base DN is empty".to_string()));
        }

        let requested = with_object_guid(attributes);

        debug!("Searching {} with filter: {}", base_dn, filter);

        let session = self.session().await?;
        let raw = session
            .search(&base_dn, filter, &requested)
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let found = raw.len();
        let entries: Vec<DirectoryEntry> = raw
            .iter()
            .filter_map(|entry| DirectoryEntry::from_raw(entry, &requested))
            .collect();

        if entries.len() < found {
            debug!(
                "Skipped {} entries without a readable objectGUID",
                found - entries.len()
            );
        }
        debug!("Search returned {} entries", entries.len());

        Ok(entries)
    }

    /// CN of the user whose `sAMAccountName` is `account_name`
    pub async fn get_user_cn_by_account_name(
        &mut self,
        account_name: &str,
        base_dn: Option<&str>,
    ) -> Result<String> {
        if account_name.trim().is_empty() {
            return Err(Error::Validation("account name not specified".to_string()));
        }

        let filter = user_filter(ACCOUNT_NAME_ATTR, account_name);
        let entries = self.search(&filter, &["cn"], base_dn).await?;

        entries
            .into_iter()
            .next()
            .and_then(|entry| entry.get("cn").map(str::to_string))
            .filter(|cn| !cn.is_empty())
            .ok_or_else(|| Error::NotFound(format!("user {}", account_name)))
    }

    /// Unbind and drop the session
    pub async fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, ConnectionState::Disconnected) {
            ConnectionState::Connected(mut session) => {
                session
                    .unbind()
                    .await
                    .map_err(|e| Error::Connection(format!("Failed to close connection: {}", e)))?;
                info!("Directory connection closed");
                Ok(())
            }
            ConnectionState::Disconnected => Err(Error::State(
                "can not close unestablished directory connection".to_string(),
            )),
        }
    }

    // =========================================================================
    // Private methods
    // =========================================================================

    /// Account names `username` may refer to, the literal input first.
    async fn resolve_account_names(
        &mut self,
        username: &str,
        base_dn: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut candidates = vec![username.to_string()];
        let fields = self.config.match_attributes.clone();

        for field in &fields {
            let filter = user_filter(field, username);
            for entry in self.search(&filter, &[ACCOUNT_NAME_ATTR], base_dn).await? {
                let Some(account_name) = entry.get(ACCOUNT_NAME_ATTR) else {
                    continue;
                };
                if account_name.is_empty()
                    || candidates
                        .iter()
                        .any(|c| c.to_lowercase() == account_name.to_lowercase())
                {
                    continue;
                }
                candidates.push(account_name.to_string());
            }
        }

        Ok(candidates)
    }

    /// Live session, connecting first if needed
    async fn session(&mut self) -> Result<&mut Box<dyn DirectorySession>> {
        if !self.is_connected() {
            self.connect().await?;
        }

        match &mut self.state {
            ConnectionState::Connected(session) => Ok(session),
            ConnectionState::Disconnected => Err(Error::State(
                "directory connection is not established".to_string(),
            )),
        }
    }

    async fn restore_service_bind(&mut self) -> Result<()> {
        if !self.is_connected() {
            return self.connect().await;
        }

        if let ConnectionState::Connected(session) = &mut self.state {
            if let Err(e) = bind_service(&self.config, session.as_mut()).await {
                self.state = ConnectionState::Disconnected;
                return Err(e);
            }
        }
        Ok(())
    }
}

async fn bind_service(config: &ClientConfig, session: &mut dyn DirectorySession) -> Result<()> {
    let (identity, password) = if config.anonymous {
        (String::new(), "")
    } else {
        (config.bind_identity(&config.username), config.password.as_str())
    };

    match session.simple_bind(&identity, password).await {
        Ok(BindStatus::Bound) => {
            debug!("Bound as {}", if config.anonymous { "anonymous" } else { identity.as_str() });
            Ok(())
        }
        Ok(BindStatus::Rejected { code, message }) => Err(Error::Bind(format!(
            "Service account bind rejected (rc={}): {}",
            code, message
        ))),
        Err(e) => Err(Error::Connection(format!("Service account bind failed: {}", e))),
    }
}

/// `(&(objectClass=user)(field=value))` with `value` escaped
fn user_filter(field: &str, value: &str) -> String {
    format!(
        "(&(objectClass=user)({}={}))",
        field,
        ldap3::ldap_escape(value)
    )
}

fn with_object_guid(attributes: &[&str]) -> Vec<String> {
    let mut requested: Vec<String> = Vec::with_capacity(attributes.len() + 1);
    for attr in attributes {
        if !requested.iter().any(|r| r.eq_ignore_ascii_case(attr)) {
            requested.push(attr.to_string());
        }
    }
    if !requested
        .iter()
        .any(|r| r.eq_ignore_ascii_case(OBJECT_GUID_ATTR))
    {
        requested.push(OBJECT_GUID_ATTR.to_string());
    }
    requested
}
