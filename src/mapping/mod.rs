//! Email to Kerberos principal mappings.
//!
//! A mapping ties an external identity (`user@REALM`) to a local account
//! under an authentication method derived from the realm, `krb-REALM`.

pub mod admin;
mod memory;

pub use memory::MemoryStore;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

const METHOD_PREFIX: &str = "krb-";

/// Identifier of a local account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A local account principals can be mapped to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    /// Inactive accounts cannot log in.
    #[serde(default = "active_default")]
    pub active: bool,
}

fn active_default() -> bool {
    true
}

/// Association of a Kerberos principal with a local account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalMapping {
    pub external_id: String,
    pub method: String,
    pub account_id: AccountId,
}

impl PrincipalMapping {
    /// Mapping for `principal`, with the method derived from its realm.
    pub fn new(principal: &str, account_id: AccountId) -> Self {
        Self {
            external_id: principal.to_owned(),
            method: method_for(principal),
            account_id,
        }
    }
}

/// The realm of `principal`: everything after the last `@`.
///
/// A principal without `@` is its own realm.
pub fn realm_of(principal: &str) -> &str {
    match principal.rfind('@') {
        Some(at) => &principal[at + 1..],
        None => principal,
    }
}

/// Authentication method tag for `principal`, `krb-<REALM>`.
pub fn method_for(principal: &str) -> String {
    format!("{METHOD_PREFIX}{}", realm_of(principal))
}

/// Storage of accounts and principal mappings.
///
/// Implementations enforce uniqueness of `(method, external_id)` and of
/// `(account_id, method)` inside [`create`](MappingStore::create).
pub trait MappingStore: Send + Sync {
    /// Look up an account by exact email.
    fn account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Look up an account by id.
    fn account(&self, id: AccountId) -> Result<Option<Account>>;

    /// Look up the mapping for `(method, external_id)`.
    fn find(&self, method: &str, external_id: &str) -> Result<Option<PrincipalMapping>>;

    /// Insert `mapping`.
    ///
    /// Fails with a duplicate-mapping error when `(method, external_id)` is
    /// taken and with an already-linked error when the account already has a
    /// mapping under `method`.
    fn create(&self, mapping: PrincipalMapping) -> Result<()>;

    /// Delete the mapping for `(method, external_id)`, returning whether one
    /// existed.
    fn delete_by_external_id(&self, method: &str, external_id: &str) -> Result<bool>;

    /// All `(email, external_id)` pairs, optionally for one email only.
    fn list(&self, email: Option<&str>) -> Result<Vec<(String, String)>>;
}

impl<T: MappingStore + ?Sized> MappingStore for std::sync::Arc<T> {
    fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        (**self).account_by_email(email)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        (**self).account(id)
    }

    fn find(&self, method: &str, external_id: &str) -> Result<Option<PrincipalMapping>> {
        (**self).find(method, external_id)
    }

    fn create(&self, mapping: PrincipalMapping) -> Result<()> {
        (**self).create(mapping)
    }

    fn delete_by_external_id(&self, method: &str, external_id: &str) -> Result<bool> {
        (**self).delete_by_external_id(method, external_id)
    }

    fn list(&self, email: Option<&str>) -> Result<Vec<(String, String)>> {
        (**self).list(email)
    }
}
