// src/auth/mod.rs

//! GSSAPI negotiation engine for HTTP Negotiate (Kerberos/SPNEGO) acceptors.
//!
//! The engine owns no per-request state. Every call to
//! [`NegotiationEngine::step`] opens a fresh accept-mode security context
//! from the process-wide [`Acceptor`], feeds it exactly one client token and
//! drops it again.

#[cfg(all(unix, feature = "gssapi"))]
pub mod gssapi;

mod negotiate;

pub use negotiate::{challenge, continuation, decode_token, encode_token, parse_authorization};

use std::fmt;
use std::sync::Arc;

use crate::error;
use crate::Result;

/// Server-side, long-lived credentials able to accept security contexts.
///
/// Implementations are loaded once at startup and shared read-only between
/// all concurrently handled requests.
pub trait Acceptor: Send + Sync {
    /// Create a fresh accept-mode security context.
    fn accept(&self) -> Result<Box<dyn SecurityContext>>;
}

/// In-progress or completed handshake state for one negotiation attempt.
pub trait SecurityContext {
    /// Feed a client token to the context and advance the mechanism by one
    /// step, returning the token to relay back to the client, if any.
    fn step(&mut self, token: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Whether the handshake finished.
    fn is_complete(&self) -> bool;

    /// The authenticated initiator, e.g. `user@REALM`.
    ///
    /// Only meaningful once [`is_complete`](SecurityContext::is_complete)
    /// returns true.
    fn initiator_name(&mut self) -> Result<String>;
}

impl<A: Acceptor + ?Sized> Acceptor for Arc<A> {
    fn accept(&self) -> Result<Box<dyn SecurityContext>> {
        (**self).accept()
    }
}

/// Outcome of a single negotiation step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NegotiationResult {
    /// Initiator principal, present only for a complete context.
    pub principal: Option<String>,
    /// Continuation token to send back in `WWW-Authenticate`.
    pub out_token: Option<Vec<u8>>,
    /// Whether the security context completed.
    pub complete: bool,
}

impl NegotiationResult {
    /// Principal and continuation token, when the step produced both.
    pub fn authenticated(&self) -> Option<(&str, &[u8])> {
        match (&self.principal, &self.out_token) {
            (Some(principal), Some(token)) if !token.is_empty() => {
                Some((principal.as_str(), token.as_slice()))
            }
            _ => None,
        }
    }
}

/// Steps one security context per inbound token.
#[derive(Clone)]
pub struct NegotiationEngine {
    acceptor: Arc<dyn Acceptor>,
}

impl NegotiationEngine {
    pub fn new<A>(acceptor: A) -> Self
    where
        A: Acceptor + 'static,
    {
        Self {
            acceptor: Arc::new(acceptor),
        }
    }

    pub fn from_shared(acceptor: Arc<dyn Acceptor>) -> Self {
        Self { acceptor }
    }

    /// Accept `in_token` in a new security context.
    ///
    /// Every failure, including context creation, is reported as a
    /// token-invalid error so callers can degrade to "no credentials".
    pub fn step(&self, in_token: &[u8]) -> Result<NegotiationResult> {
        let mut ctx = self.acceptor.accept().map_err(as_token_invalid)?;

        let out_token = ctx.step(in_token).map_err(as_token_invalid)?;
        let complete = ctx.is_complete();

        let principal = if complete {
            Some(ctx.initiator_name().map_err(as_token_invalid)?)
        } else {
            None
        };

        Ok(NegotiationResult {
            principal,
            out_token,
            complete,
        })
    }
}

impl fmt::Debug for NegotiationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationEngine").finish_non_exhaustive()
    }
}

fn as_token_invalid(err: crate::Error) -> crate::Error {
    if err.is_token_invalid() {
        err
    } else {
        error::token_invalid(err)
    }
}
