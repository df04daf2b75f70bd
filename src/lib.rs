#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # krb-negotiate
//!
//! Kerberos/SPNEGO ("Negotiate", RFC 4559) authentication for
//! [`tower`]-based HTTP services.
//!
//! A client sends `Authorization: Negotiate <token>`. The
//! [`NegotiateLayer`] accepts the token with the server's acceptor
//! credentials, resolves the Kerberos principal to a local account through
//! a [`MappingStore`], and logs that account in for the request. On the way
//! out it relays the mutual-authentication token, or turns an
//! unauthenticated 401/403 into a `WWW-Authenticate: Negotiate` challenge.
//!
//! ```ignore
//! use krb_negotiate::{Mediator, MemoryStore, NegotiateLayer, NegotiationEngine};
//!
//! let config = krb_negotiate::config::NegotiateConfig::from_env()?;
//! let acceptor = krb_negotiate::auth::gssapi::KeytabAcceptor::load(&config)?;
//! let store = MemoryStore::open("krb-mappings.json")?;
//!
//! let mediator = Mediator::new(NegotiationEngine::new(acceptor), store);
//! let svc = NegotiateLayer::new(mediator)
//!     .into_builder()
//!     .service(app);
//! ```
//!
//! Principals are mapped with the `krb-mapping` tool (feature `cli`):
//!
//! ```text
//! krb-mapping mapping add user@example.com user@EXAMPLE.COM
//! ```
//!
//! ## Optional Features
//!
//! - **cli** *(enabled by default)*: the `krb-mapping` administration tool.
//! - **gssapi**: acceptor credentials from the system GSSAPI library and a
//!   keytab (Unix only).

mod error;

pub mod auth;
#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod cli;
pub mod config;
pub mod mapping;
pub mod mediator;
pub mod session;

pub use self::auth::{NegotiationEngine, NegotiationResult};
pub use self::config::NegotiateConfig;
pub use self::error::{Error, Kind, Result};
pub use self::mapping::{MappingStore, MemoryStore};
pub use self::mediator::{AuthDecision, Mediator, NegotiateLayer, NegotiateService, PreAuth};
pub use self::session::{AuthenticatedUser, SessionBinder};
