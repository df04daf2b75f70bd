use std::error::Error as StdError;
use std::fmt;

/// A `Result` alias where the `Err` case is `krb_negotiate::Error`.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// The Errors that may occur while negotiating, resolving identities or
/// administering principal mappings.
///
/// Note: Errors may include the full principal name or email that the
/// operation was about.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    subject: Option<String>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
                subject: None,
            }),
        }
    }

    /// Error for an [`Acceptor`](crate::auth::Acceptor) or security context
    /// that rejects a client token.
    pub fn invalid_token<E>(source: E) -> Error
    where
        E: Into<BoxError>,
    {
        token_invalid(source)
    }

    /// Error for a [`SessionBinder`](crate::SessionBinder) refusing to log an
    /// account in.
    pub fn login_refused<E>(source: E) -> Error
    where
        E: Into<BoxError>,
    {
        session_establish_failed(source)
    }

    /// Returns the principal or email this error is about, if known.
    pub fn subject(&self) -> Option<&str> {
        self.inner.subject.as_deref()
    }

    pub(crate) fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.inner.subject = Some(subject.into());
        self
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// Returns true if the client token was malformed or rejected by the mechanism.
    pub fn is_token_invalid(&self) -> bool {
        matches!(self.inner.kind, Kind::TokenInvalid)
    }

    /// Returns true if the principal authenticated but has no local mapping.
    pub fn is_identity_not_mapped(&self) -> bool {
        matches!(self.inner.kind, Kind::IdentityNotMapped)
    }

    /// Returns true if the mapped account could not be logged in.
    pub fn is_session_establish_failed(&self) -> bool {
        matches!(self.inner.kind, Kind::SessionEstablishFailed)
    }

    /// Returns true if a mapping for the `(method, principal)` pair already exists.
    pub fn is_duplicate_mapping(&self) -> bool {
        matches!(self.inner.kind, Kind::DuplicateMapping)
    }

    /// Returns true if no local account matched the given email.
    pub fn is_account_not_found(&self) -> bool {
        matches!(self.inner.kind, Kind::AccountNotFound)
    }

    /// Returns true if the account is already linked under the same method.
    pub fn is_already_linked(&self) -> bool {
        matches!(self.inner.kind, Kind::AlreadyLinked)
    }

    /// Returns true if the mapping store failed.
    pub fn is_store(&self) -> bool {
        matches!(self.inner.kind, Kind::Store)
    }

    /// Returns true if the acceptor credentials could not be loaded.
    pub fn is_credentials(&self) -> bool {
        matches!(self.inner.kind, Kind::Credentials)
    }

    /// Returns true if the configuration was invalid.
    pub fn is_config(&self) -> bool {
        matches!(self.inner.kind, Kind::Config)
    }

    /// Negotiation and identity resolution failures are recovered into a
    /// controlled 401; everything else is unexpected.
    pub(crate) fn is_recoverable(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::TokenInvalid | Kind::IdentityNotMapped | Kind::SessionEstablishFailed
        )
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("krb_negotiate::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref subject) = self.inner.subject {
            builder.field("subject", subject);
        }
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner.kind {
            Kind::TokenInvalid => f.write_str("negotiate token invalid")?,
            Kind::IdentityNotMapped => f.write_str("no local identity mapped to principal")?,
            Kind::SessionEstablishFailed => f.write_str("failed to establish session")?,
            Kind::DuplicateMapping => f.write_str("mapping already exists")?,
            Kind::AccountNotFound => f.write_str("account not found")?,
            Kind::AlreadyLinked => f.write_str("account already linked")?,
            Kind::Store => f.write_str("mapping store error")?,
            Kind::Credentials => f.write_str("acceptor credentials error")?,
            Kind::Config => f.write_str("configuration error")?,
        }

        if let Some(subject) = &self.inner.subject {
            write!(f, " for {subject}")?;
        }

        if let Some(e) = &self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    TokenInvalid,
    IdentityNotMapped,
    SessionEstablishFailed,
    DuplicateMapping,
    AccountNotFound,
    AlreadyLinked,
    Store,
    Credentials,
    Config,
}

// constructors

pub(crate) fn token_invalid<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::TokenInvalid, Some(e))
}

pub(crate) fn identity_not_mapped(principal: &str) -> Error {
    Error::new(Kind::IdentityNotMapped, None::<Error>).with_subject(principal)
}

pub(crate) fn session_establish_failed<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::SessionEstablishFailed, Some(e))
}

pub(crate) fn duplicate_mapping(principal: &str) -> Error {
    Error::new(Kind::DuplicateMapping, None::<Error>).with_subject(principal)
}

pub(crate) fn account_not_found(email: &str) -> Error {
    Error::new(Kind::AccountNotFound, None::<Error>).with_subject(email)
}

pub(crate) fn already_linked(email: &str) -> Error {
    Error::new(Kind::AlreadyLinked, None::<Error>).with_subject(email)
}

pub(crate) fn store<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Store, Some(e))
}

pub(crate) fn credentials<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Credentials, Some(e))
}

pub(crate) fn config<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Config, Some(e))
}
