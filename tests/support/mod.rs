#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use krb_negotiate::auth::{Acceptor, SecurityContext};
use krb_negotiate::mapping::admin;
use krb_negotiate::{Mediator, MemoryStore, NegotiationEngine, Result};

/// Acceptor driven by plain-text tokens.
///
/// `ok:<principal>` completes the context as `<principal>` and answers
/// `mutual`; `continue` answers `more` without completing; anything else
/// leaves the context incomplete with nothing to send back.
#[derive(Clone, Default)]
pub struct Scripted {
    contexts: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn contexts(&self) -> usize {
        self.contexts.load(Ordering::SeqCst)
    }
}

impl Acceptor for Scripted {
    fn accept(&self) -> Result<Box<dyn SecurityContext>> {
        self.contexts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedCtx { principal: None }))
    }
}

struct ScriptedCtx {
    principal: Option<String>,
}

impl SecurityContext for ScriptedCtx {
    fn step(&mut self, token: &[u8]) -> Result<Option<Vec<u8>>> {
        let text = String::from_utf8_lossy(token);
        if let Some(principal) = text.strip_prefix("ok:") {
            self.principal = Some(principal.to_owned());
            Ok(Some(b"mutual".to_vec()))
        } else if text == "continue" {
            Ok(Some(b"more".to_vec()))
        } else {
            Ok(None)
        }
    }

    fn is_complete(&self) -> bool {
        self.principal.is_some()
    }

    fn initiator_name(&mut self) -> Result<String> {
        Ok(self.principal.clone().unwrap_or_default())
    }
}

/// Store with an active `alice` and an inactive `bob`, both mapped in
/// `EXAMPLE.COM`, and an unmapped `carol`.
pub fn store() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_account("alice@example.com", true).unwrap();
    store.add_account("bob@example.com", false).unwrap();
    store.add_account("carol@example.com", true).unwrap();
    admin::add_mapping(&store, "alice@example.com", "alice@EXAMPLE.COM").unwrap();
    admin::add_mapping(&store, "bob@example.com", "bob@EXAMPLE.COM").unwrap();
    store
}

pub fn mediator() -> (Mediator, Scripted) {
    let acceptor = Scripted::default();
    let engine = NegotiationEngine::new(acceptor.clone());
    (Mediator::new(engine, store()), acceptor)
}

/// `Authorization` header value carrying `token`.
pub fn negotiate(token: &str) -> String {
    format!("Negotiate {}", krb_negotiate::auth::encode_token(token.as_bytes()))
}
