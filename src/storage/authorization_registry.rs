// src/storage/authorization_registry.rs
//! Authorization Registry: issuer identity → authorized flag.
//!
//! The root administrator is authorized unconditionally and independently of
//! its own registry entry.

use crate::errors::StorageError;
use crate::storage::database::Database;
use std::collections::HashMap;
use std::sync::Arc;

pub struct AuthorizationRegistry {
    db: Arc<Database>,
    admin: String,
    entries: HashMap<String, bool>,
}

impl AuthorizationRegistry {
    /// Rebuilds the registry from the database. `admin` must already be canonical.
    pub fn load(db: Arc<Database>, admin: String) -> Result<Self, StorageError> {
        let entries = db.load_authorizations()?.into_iter().collect();
        Ok(Self { db, admin, entries })
    }

    pub fn admin(&self) -> &str {
        &self.admin
    }

    pub fn is_admin(&self, identity: &str) -> bool {
        identity == self.admin
    }

    pub fn is_authorized(&self, identity: &str) -> bool {
        self.is_admin(identity) || self.entries.get(identity).copied().unwrap_or(false)
    }

    /// Persists and applies an entry. Setting the current value again is a no-op write.
    pub fn set(&mut self, issuer: &str, enabled: bool) -> Result<(), StorageError> {
        self.db.set_authorization(issuer, enabled)?;
        self.entries.insert(issuer.to_string(), enabled);
        Ok(())
    }
}
