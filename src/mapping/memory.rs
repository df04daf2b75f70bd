use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::{Account, AccountId, MappingStore, PrincipalMapping};
use crate::error;
use crate::Result;

/// In-process mapping store, optionally persisted to a JSON file.
///
/// Every mutation runs under one write lock. It is applied to a copy of the
/// state, the copy is written to the backing file, and only then does it
/// replace the state readers see. A failed write leaves the store unchanged.
///
/// A file-backed store reloads the file whenever it changed on disk since
/// the last load, so a running server sees mappings edited by `krb-mapping`
/// on the same file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    loaded: RwLock<Loaded>,
    path: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Loaded {
    state: State,
    stamp: Option<Stamp>,
}

/// What the backing file looked like when it was last loaded or written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Stamp {
    modified: SystemTime,
    len: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    mappings: Vec<PrincipalMapping>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the store persisted at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stamp = stamp(&path)?;
        let state = load(&path)?;
        log::debug!("opened mapping store {}", path.display());
        Ok(Self {
            loaded: RwLock::new(Loaded { state, stamp }),
            path: Some(path),
        })
    }

    /// Register a local account, returning it with its new id.
    ///
    /// Emails are unique; adding an existing email returns the existing
    /// account unchanged.
    pub fn add_account(&self, email: &str, active: bool) -> Result<Account> {
        let mut loaded = self.write()?;
        if let Some(existing) = loaded.state.accounts.iter().find(|a| a.email == email) {
            return Ok(existing.clone());
        }
        let next_id = loaded.state.accounts.iter().map(|a| a.id.0).max().unwrap_or(0) + 1;
        let account = Account {
            id: AccountId(next_id),
            email: email.to_owned(),
            active,
        };
        let mut next = loaded.state.clone();
        next.accounts.push(account.clone());
        self.commit(&mut loaded, next)?;
        Ok(account)
    }

    /// Number of stored mappings.
    pub fn mapping_count(&self) -> Result<usize> {
        Ok(self.read()?.state.mappings.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Loaded>> {
        self.refresh()?;
        self.loaded
            .read()
            .map_err(|_| error::store("mapping store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Loaded>> {
        let mut loaded = self.lock_write()?;
        if let Some(path) = &self.path {
            let current = stamp(path)?;
            if loaded.stamp != current {
                reload(path, &mut loaded, current)?;
            }
        }
        Ok(loaded)
    }

    fn lock_write(&self) -> Result<RwLockWriteGuard<'_, Loaded>> {
        self.loaded
            .write()
            .map_err(|_| error::store("mapping store lock poisoned"))
    }

    /// Reload the backing file if it changed since it was last seen.
    fn refresh(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let current = stamp(path)?;
        {
            let loaded = self
                .loaded
                .read()
                .map_err(|_| error::store("mapping store lock poisoned"))?;
            if loaded.stamp == current {
                return Ok(());
            }
        }
        let mut loaded = self.lock_write()?;
        // another caller may have reloaded while the lock was released
        if loaded.stamp != current {
            reload(path, &mut loaded, current)?;
        }
        Ok(())
    }

    /// Persist `next`, then make it the visible state.
    fn commit(&self, loaded: &mut Loaded, next: State) -> Result<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(&next).map_err(error::store)?;
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, json).map_err(error::store)?;
            fs::rename(&tmp, path).map_err(error::store)?;
            loaded.stamp = stamp(path)?;
        }
        loaded.state = next;
        Ok(())
    }
}

fn stamp(path: &Path) -> Result<Option<Stamp>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(Stamp {
            modified: meta.modified().map_err(error::store)?,
            len: meta.len(),
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(error::store(e)),
    }
}

fn load(path: &Path) -> Result<State> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(error::store),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(State::default()),
        Err(e) => Err(error::store(e)),
    }
}

fn reload(path: &Path, loaded: &mut Loaded, current: Option<Stamp>) -> Result<()> {
    loaded.state = load(path)?;
    loaded.stamp = current;
    log::debug!("reloaded mapping store {}", path.display());
    Ok(())
}

impl MappingStore for MemoryStore {
    fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let loaded = self.read()?;
        Ok(loaded.state.accounts.iter().find(|a| a.email == email).cloned())
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let loaded = self.read()?;
        Ok(loaded.state.accounts.iter().find(|a| a.id == id).cloned())
    }

    fn find(&self, method: &str, external_id: &str) -> Result<Option<PrincipalMapping>> {
        let loaded = self.read()?;
        Ok(loaded
            .state
            .mappings
            .iter()
            .find(|m| m.method == method && m.external_id == external_id)
            .cloned())
    }

    fn create(&self, mapping: PrincipalMapping) -> Result<()> {
        let mut loaded = self.write()?;
        let state = &loaded.state;

        if state
            .mappings
            .iter()
            .any(|m| m.method == mapping.method && m.external_id == mapping.external_id)
        {
            return Err(error::duplicate_mapping(&mapping.external_id));
        }

        let email = state
            .accounts
            .iter()
            .find(|a| a.id == mapping.account_id)
            .map(|a| a.email.clone())
            .ok_or_else(|| error::account_not_found(&mapping.account_id.to_string()))?;

        if state
            .mappings
            .iter()
            .any(|m| m.account_id == mapping.account_id && m.method == mapping.method)
        {
            return Err(error::already_linked(&email));
        }

        let mut next = state.clone();
        next.mappings.push(mapping);
        self.commit(&mut loaded, next)
    }

    fn delete_by_external_id(&self, method: &str, external_id: &str) -> Result<bool> {
        let mut loaded = self.write()?;
        let mut next = loaded.state.clone();
        next.mappings
            .retain(|m| !(m.method == method && m.external_id == external_id));
        if next.mappings.len() == loaded.state.mappings.len() {
            return Ok(false);
        }
        self.commit(&mut loaded, next)?;
        Ok(true)
    }

    fn list(&self, email: Option<&str>) -> Result<Vec<(String, String)>> {
        let loaded = self.read()?;
        let state = &loaded.state;
        let pairs = state
            .mappings
            .iter()
            .filter_map(|m| {
                let account = state.accounts.iter().find(|a| a.id == m.account_id)?;
                Some((account.email.clone(), m.external_id.clone()))
            })
            .filter(|(account_email, _)| email.map_or(true, |e| e == account_email))
            .collect();
        Ok(pairs)
    }
}
