//! Startup configuration for the Negotiate acceptor.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error;
use crate::Result;

/// Environment variable naming the acceptor host.
pub const HOSTNAME_ENV: &str = "GSSAPI_HOSTNAME";
/// Environment variable naming the keytab file.
pub const KEYTAB_ENV: &str = "KRB5_KTNAME";
/// Environment variable overriding the service name.
pub const SERVICE_ENV: &str = "GSSAPI_SERVICE";

const DEFAULT_SERVICE: &str = "HTTP";

/// Configuration for Negotiate authentication.
///
/// Read once when the application starts and used to load the acceptor
/// credentials. Nothing here changes afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiateConfig {
    hostname: Option<String>,
    keytab: Option<PathBuf>,
    service: String,
}

impl Default for NegotiateConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            keytab: None,
            service: DEFAULT_SERVICE.to_owned(),
        }
    }
}

impl NegotiateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `GSSAPI_HOSTNAME`, `KRB5_KTNAME` and
    /// `GSSAPI_SERVICE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(hostname) = lookup(HOSTNAME_ENV).filter(|v| !v.is_empty()) {
            config = config.hostname(hostname);
        }
        // MIT krb5 accepts a "FILE:" residual prefix
        if let Some(keytab) = lookup(KEYTAB_ENV).filter(|v| !v.is_empty()) {
            let path = keytab.strip_prefix("FILE:").unwrap_or(&keytab);
            config = config.keytab(path);
        }
        if let Some(service) = lookup(SERVICE_ENV) {
            config = config.service(service);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn keytab(mut self, keytab: impl AsRef<Path>) -> Self {
        self.keytab = Some(keytab.as_ref().to_path_buf());
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn keytab_path(&self) -> Option<&Path> {
        self.keytab.as_deref()
    }

    pub fn acceptor_host(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Host-based service name, `HTTP@host.example.com`, when a hostname is
    /// configured.
    pub fn service_principal(&self) -> Option<String> {
        self.hostname
            .as_ref()
            .map(|host| format!("{}@{}", self.service, host))
    }

    /// Reject configurations the acceptor cannot use.
    pub fn validate(&self) -> Result<()> {
        if self.service.is_empty() || self.service.contains('@') {
            return Err(error::config(format!(
                "invalid service name {:?}",
                self.service
            )));
        }
        if let Some(host) = &self.hostname {
            if host.contains('@') || host.contains('/') || host.trim() != host {
                return Err(error::config(format!("invalid hostname {host:?}")));
            }
        }
        Ok(())
    }
}
