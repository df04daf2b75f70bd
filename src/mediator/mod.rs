//! Request authentication mediator.
//!
//! Two phases wrap every request:
//!
//! 1. [`Mediator::authenticate`] runs before the request is handled. It
//!    steps the negotiation engine with the client's token, resolves the
//!    principal through the mapping store and logs the mapped account in.
//! 2. [`Mediator::finish`] runs on the response. It relays the continuation
//!    token, or turns an unauthenticated 401/403 into a Negotiate challenge.
//!
//! The continuation token produced by the first phase is returned to the
//! caller and handed back to the second; the mediator never stores it.

mod layer;

pub use layer::{NegotiateLayer, NegotiateService};

use std::fmt;
use std::sync::Arc;

use http::{header, Extensions, HeaderMap, HeaderValue, Response, StatusCode};

use crate::auth::{self, NegotiationEngine};
use crate::error;
use crate::mapping::{method_for, MappingStore};
use crate::session::{AuthenticatedUser, ExtensionSessions, SessionBinder};
use crate::{Error, Result};

/// Result of the pre-request phase.
#[derive(Debug)]
pub enum PreAuth {
    /// No usable credentials were offered; continue unauthenticated.
    NoCredentials,
    /// The principal maps to a local account, which is now logged in.
    Authenticated {
        user: AuthenticatedUser,
        out_token: Vec<u8>,
    },
    /// A valid principal could not be turned into a session.
    Rejected(Error),
}

impl PreAuth {
    /// How the request should proceed.
    pub fn decision(&self) -> AuthDecision {
        match self {
            PreAuth::Rejected(_) => AuthDecision::ChallengeRequired,
            PreAuth::NoCredentials | PreAuth::Authenticated { .. } => AuthDecision::Allowed,
        }
    }
}

/// Authentication verdict, mapped to a status code by [`AuthDecision::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    ChallengeRequired,
    Forbidden,
}

impl AuthDecision {
    pub const fn status(self) -> StatusCode {
        match self {
            AuthDecision::Allowed => StatusCode::OK,
            AuthDecision::ChallengeRequired => StatusCode::UNAUTHORIZED,
            AuthDecision::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            AuthDecision::Allowed => "Authenticated successfully.",
            AuthDecision::ChallengeRequired => {
                "Authentication is required to access this resource."
            }
            AuthDecision::Forbidden => "You do not have permission to access this resource.",
        }
    }

    /// JSON `{status, message}` response carrying `WWW-Authenticate: Negotiate`.
    pub fn response<B>(self) -> Response<B>
    where
        B: From<String>,
    {
        let mut response = json_response(self.status(), self.message());
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, auth::challenge());
        response
    }
}

/// Response for failures the mediator does not recover from.
pub(crate) fn internal_error_response<B>() -> Response<B>
where
    B: From<String>,
{
    json_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
}

fn json_response<B>(status: StatusCode, message: &str) -> Response<B>
where
    B: From<String>,
{
    let body = serde_json::json!({
        "status": status.as_u16(),
        "message": message,
    });
    let mut response = Response::new(B::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Drives the negotiation engine, mapping store and session binder for one
/// request at a time. Shared between all requests; holds no request state.
#[derive(Clone)]
pub struct Mediator {
    engine: NegotiationEngine,
    store: Arc<dyn MappingStore>,
    sessions: Arc<dyn SessionBinder>,
}

impl Mediator {
    pub fn new<S>(engine: NegotiationEngine, store: S) -> Self
    where
        S: MappingStore + 'static,
    {
        Self {
            engine,
            store: Arc::new(store),
            sessions: Arc::new(ExtensionSessions),
        }
    }

    /// Use the host application's session mechanism.
    pub fn with_sessions<B>(mut self, sessions: B) -> Self
    where
        B: SessionBinder + 'static,
    {
        self.sessions = Arc::new(sessions);
        self
    }

    /// Pre-request phase.
    ///
    /// Negotiation and identity failures never escape: they become
    /// [`PreAuth::NoCredentials`] or [`PreAuth::Rejected`]. Only mapping
    /// store failures are returned as errors.
    pub fn authenticate(
        &self,
        headers: &HeaderMap,
        extensions: &mut Extensions,
    ) -> Result<PreAuth> {
        let in_token = match auth::parse_authorization(headers) {
            None => return Ok(PreAuth::NoCredentials),
            Some(Ok(token)) => token,
            Some(Err(err)) => {
                log::debug!("ignoring Negotiate header: {err}");
                return Ok(PreAuth::NoCredentials);
            }
        };

        let result = match self.engine.step(&in_token) {
            Ok(result) => result,
            Err(err) => {
                log::debug!("Negotiate step failed: {err}");
                return Ok(PreAuth::NoCredentials);
            }
        };

        let Some((principal, out_token)) = result.authenticated() else {
            log::debug!(
                "Negotiate step yielded no identity (complete: {})",
                result.complete
            );
            return Ok(PreAuth::NoCredentials);
        };

        match self.resolve(principal, extensions) {
            Ok(user) => {
                log::debug!("{principal} authenticated as account {}", user.account_id);
                Ok(PreAuth::Authenticated {
                    user,
                    out_token: out_token.to_vec(),
                })
            }
            Err(err) if err.is_recoverable() => {
                log::debug!("rejecting {principal}: {err}");
                Ok(PreAuth::Rejected(err))
            }
            Err(err) => Err(err),
        }
    }

    fn resolve(&self, principal: &str, extensions: &mut Extensions) -> Result<AuthenticatedUser> {
        let method = method_for(principal);
        let mapping = self
            .store
            .find(&method, principal)?
            .ok_or_else(|| error::identity_not_mapped(principal))?;
        let account = self
            .store
            .account(mapping.account_id)?
            .ok_or_else(|| error::identity_not_mapped(principal))?;

        self.sessions
            .login(&account, principal, extensions)
            .map_err(|err| {
                if err.is_session_establish_failed() {
                    err
                } else {
                    error::session_establish_failed(err)
                }
            })?;

        Ok(extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .unwrap_or(AuthenticatedUser {
                account_id: account.id,
                email: account.email,
                principal: Some(principal.to_owned()),
            }))
    }

    /// Whether `extensions` belong to a logged-in caller.
    pub fn is_authenticated(&self, extensions: &Extensions) -> bool {
        self.sessions.is_authenticated(extensions)
    }

    /// Post-request phase.
    pub fn finish<B>(
        &self,
        out_token: Option<&[u8]>,
        caller_authenticated: bool,
        response: &mut Response<B>,
    ) {
        if let Some(token) = out_token.filter(|t| !t.is_empty()) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, auth::continuation(token));
            return;
        }

        let status = response.status();
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return;
        }
        if caller_authenticated {
            return;
        }

        *response.status_mut() = StatusCode::UNAUTHORIZED;
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, auth::challenge());
    }
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
