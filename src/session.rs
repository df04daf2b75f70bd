//! Binding authenticated accounts to requests.

use http::Extensions;

use crate::error;
use crate::mapping::{Account, AccountId};
use crate::Result;

/// Identity of a caller that logged in, stored in request extensions.
///
/// Handlers read it with `req.extensions().get::<AuthenticatedUser>()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub account_id: AccountId,
    pub email: String,
    /// The Kerberos principal, when the login came from Negotiate.
    pub principal: Option<String>,
}

/// Session mechanism of the host application.
///
/// The mediator only asks it to log an account in for the current request,
/// and whether a request or response already belongs to a logged-in caller.
pub trait SessionBinder: Send + Sync {
    /// Log `account` in for the request owning `extensions`.
    fn login(&self, account: &Account, principal: &str, extensions: &mut Extensions)
        -> Result<()>;

    /// Whether `extensions` belong to an authenticated caller.
    fn is_authenticated(&self, extensions: &Extensions) -> bool;
}

/// Session binding kept entirely in request extensions.
///
/// Refuses inactive accounts. Any [`AuthenticatedUser`] found in the
/// extensions, whoever put it there, counts as authenticated.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExtensionSessions;

impl SessionBinder for ExtensionSessions {
    fn login(
        &self,
        account: &Account,
        principal: &str,
        extensions: &mut Extensions,
    ) -> Result<()> {
        if !account.active {
            return Err(error::session_establish_failed("account is inactive")
                .with_subject(&account.email));
        }
        extensions.insert(AuthenticatedUser {
            account_id: account.id,
            email: account.email.clone(),
            principal: Some(principal.to_owned()),
        });
        Ok(())
    }

    fn is_authenticated(&self, extensions: &Extensions) -> bool {
        extensions.get::<AuthenticatedUser>().is_some()
    }
}
