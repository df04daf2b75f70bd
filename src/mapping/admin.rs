//! Administrative operations over a [`MappingStore`].

use super::{method_for, MappingStore, PrincipalMapping};
use crate::error;
use crate::Result;

/// Map `principal` to the account registered under `email`.
///
/// Errors:
/// - account not found, when no account has `email`;
/// - duplicate mapping, when `principal` is already mapped in its realm;
/// - already linked, when the account already has a principal in that realm.
pub fn add_mapping<S>(store: &S, email: &str, principal: &str) -> Result<PrincipalMapping>
where
    S: MappingStore + ?Sized,
{
    let account = store
        .account_by_email(email)?
        .ok_or_else(|| error::account_not_found(email))?;

    let method = method_for(principal);
    if store.find(&method, principal)?.is_some() {
        return Err(error::duplicate_mapping(principal));
    }

    let mapping = PrincipalMapping::new(principal, account.id);
    store.create(mapping.clone())?;
    log::info!("mapped {principal} to account {}", account.id);
    Ok(mapping)
}

/// Remove the mapping of `principal`.
///
/// Removing a mapping that does not exist succeeds. Only an unknown `email`
/// is an error.
pub fn remove_mapping<S>(store: &S, email: &str, principal: &str) -> Result<()>
where
    S: MappingStore + ?Sized,
{
    store
        .account_by_email(email)?
        .ok_or_else(|| error::account_not_found(email))?;

    let removed = store.delete_by_external_id(&method_for(principal), principal)?;
    if removed {
        log::info!("removed mapping of {principal}");
    } else {
        log::debug!("no mapping of {principal} to remove");
    }
    Ok(())
}

/// `(email, principal)` pairs, optionally restricted to one exact email.
pub fn list_mappings<S>(store: &S, email: Option<&str>) -> Result<Vec<(String, String)>>
where
    S: MappingStore + ?Sized,
{
    store.list(email)
}
