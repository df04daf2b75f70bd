// src/auth/gssapi.rs

//! Kerberos acceptor backed by the system GSSAPI library.

use std::fmt;
use std::path::Path;

use libgssapi::{
    context::{SecurityContext as _, ServerCtx},
    credential::{Cred, CredUsage},
    name::Name,
    oid::{OidSet, GSS_MECH_KRB5, GSS_MECH_SPNEGO, GSS_NT_HOSTBASED_SERVICE},
};

use super::{Acceptor, SecurityContext};
use crate::config::{NegotiateConfig, KEYTAB_ENV};
use crate::error;
use crate::Result;

/// Acceptor credentials loaded from a keytab.
///
/// With a hostname configured, contexts are accepted for the
/// `<service>@<hostname>` host-based service only; otherwise any key in the
/// keytab is eligible.
///
/// Only the canonicalized service name is kept. Every
/// [`accept`](Acceptor::accept) acquires a fresh `Cred` handle for it,
/// because a `ServerCtx` takes its credential by value. The keytab location
/// is fixed in [`load`](KeytabAcceptor::load) and never changes afterwards.
pub struct KeytabAcceptor {
    service: Option<Name>,
}

impl KeytabAcceptor {
    /// Load the acceptor credentials described by `config`.
    ///
    /// Fails when the keytab is missing or holds no usable key, which is
    /// fatal at startup.
    ///
    /// When `config` names a keytab, its path is exported as `KRB5_KTNAME`
    /// for the Kerberos library. Modifying the environment races with any
    /// other thread reading it, so call `load` from `main` before the async
    /// runtime or any other thread is started. Leave the keytab unset in
    /// `config` to keep a `KRB5_KTNAME` provided by the deployment as is.
    pub fn load(config: &NegotiateConfig) -> Result<Self> {
        if let Some(keytab) = config.keytab_path() {
            point_at_keytab(keytab)?;
        }

        let service = match config.service_principal() {
            Some(principal) => {
                let name = Name::new(principal.as_bytes(), Some(&GSS_NT_HOSTBASED_SERVICE))
                    .and_then(|name| name.canonicalize(Some(&GSS_MECH_KRB5)))
                    .map_err(|e| error::credentials(e).with_subject(principal.as_str()))?;
                Some(name)
            }
            None => None,
        };

        let acceptor = Self { service };
        // surface a broken keytab now instead of on the first request
        acceptor.acquire().map_err(error::credentials)?;
        let target = config
            .service_principal()
            .unwrap_or_else(|| "any keytab principal".to_owned());
        log::info!("loaded Negotiate acceptor credentials for {target}");
        Ok(acceptor)
    }

    fn acquire(&self) -> std::result::Result<Cred, libgssapi::error::Error> {
        let mut mechs = OidSet::new()?;
        mechs.add(&GSS_MECH_SPNEGO)?;
        mechs.add(&GSS_MECH_KRB5)?;
        Cred::acquire(self.service.as_ref(), None, CredUsage::Accept, Some(&mechs))
    }
}

impl fmt::Debug for KeytabAcceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeytabAcceptor")
            .field("service", &self.service.as_ref().map(ToString::to_string))
            .finish()
    }
}

fn point_at_keytab(keytab: &Path) -> Result<()> {
    if !keytab.is_file() {
        return Err(error::credentials(format!(
            "keytab {} does not exist",
            keytab.display()
        )));
    }
    if std::env::var_os(KEYTAB_ENV).as_deref() == Some(keytab.as_os_str()) {
        return Ok(());
    }
    // read by the Kerberos library when credentials are acquired; callers
    // load before spawning threads, see `KeytabAcceptor::load`
    std::env::set_var(KEYTAB_ENV, keytab);
    Ok(())
}

impl Acceptor for KeytabAcceptor {
    fn accept(&self) -> Result<Box<dyn SecurityContext>> {
        let cred = self.acquire().map_err(error::credentials)?;
        Ok(Box::new(GssContext {
            inner: ServerCtx::new(cred.into()),
        }))
    }
}

struct GssContext {
    inner: ServerCtx,
}

impl SecurityContext for GssContext {
    fn step(&mut self, token: &[u8]) -> Result<Option<Vec<u8>>> {
        let out = self.inner.step(token).map_err(error::token_invalid)?;
        Ok(out.map(|buf| buf.to_vec()))
    }

    fn is_complete(&self) -> bool {
        self.inner.is_complete()
    }

    fn initiator_name(&mut self) -> Result<String> {
        let name = self.inner.source_name().map_err(error::token_invalid)?;
        Ok(name.to_string())
    }
}
