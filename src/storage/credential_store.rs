// src/storage/credential_store.rs
//! Credential Store.
//!
//! Keyed collection of credential records with a holder index, backed by the
//! SQLite [`Database`]. Reads are served from memory; writes go to the
//! database first and only touch memory once the commit succeeded, so a
//! failed write leaves both copies unchanged.

use crate::errors::StorageError;
use crate::models::credential::{Credential, TokenId};
use crate::storage::database::Database;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Durable credential records indexed by token id and holder.
///
/// Holder keys are canonical addresses; callers canonicalize before lookup.
pub struct CredentialStore {
    db: Arc<Database>,
    records: BTreeMap<TokenId, Credential>,
    by_holder: HashMap<String, Vec<TokenId>>,
    next_token_id: TokenId,
}

impl CredentialStore {
    /// Rebuilds the store from the database.
    pub fn load(db: Arc<Database>) -> Result<Self, StorageError> {
        let mut records = BTreeMap::new();
        let mut by_holder: HashMap<String, Vec<TokenId>> = HashMap::new();
        for credential in db.load_credentials()? {
            by_holder
                .entry(credential.holder_address.clone())
                .or_default()
                .push(credential.token_id);
            records.insert(credential.token_id, credential);
        }
        let stored_next = db.next_token_id()?;
        let derived_next = records.keys().next_back().map_or(1, |last| last + 1);
        if stored_next != derived_next {
            return Err(StorageError::Corrupt(format!(
                "token counter is {} but the last stored credential implies {}",
                stored_next, derived_next
            )));
        }
        Ok(Self {
            db,
            records,
            by_holder,
            next_token_id: stored_next,
        })
    }

    /// The id the next successful insert must carry.
    pub fn next_token_id(&self) -> TokenId {
        self.next_token_id
    }

    /// Persists a credential carrying [`next_token_id`](Self::next_token_id),
    /// then indexes it.
    pub fn insert(&mut self, credential: Credential) -> Result<(), StorageError> {
        if credential.token_id != self.next_token_id {
            return Err(StorageError::Corrupt(format!(
                "expected token id {}, got {}",
                self.next_token_id, credential.token_id
            )));
        }
        self.db.insert_credential(&credential)?;
        self.next_token_id += 1;
        self.by_holder
            .entry(credential.holder_address.clone())
            .or_default()
            .push(credential.token_id);
        self.records.insert(credential.token_id, credential);
        Ok(())
    }

    pub fn get(&self, token_id: TokenId) -> Option<&Credential> {
        self.records.get(&token_id)
    }

    /// Token ids issued to `holder`, in issuance order.
    pub fn token_ids_for_holder(&self, holder: &str) -> Vec<TokenId> {
        self.by_holder.get(holder).cloned().unwrap_or_default()
    }

    /// Token ids whose document hash matches, ignoring case.
    pub fn token_ids_for_document(&self, document_hash: &str) -> Vec<TokenId> {
        let needle = document_hash.trim();
        self.records
            .values()
            .filter(|c| c.document_hash.eq_ignore_ascii_case(needle))
            .map(|c| c.token_id)
            .collect()
    }

    /// Marks a credential revoked. Returns `false` if it was already revoked.
    ///
    /// The caller has checked that the record exists.
    pub fn mark_revoked(&mut self, token_id: TokenId, reason: &str) -> Result<bool, StorageError> {
        let Some(record) = self.records.get_mut(&token_id) else {
            return Err(StorageError::Corrupt(format!("credential {} missing from store", token_id)));
        };
        if record.is_revoked {
            return Ok(false);
        }
        if !self.db.mark_revoked(token_id, reason)? {
            return Err(StorageError::Corrupt(format!(
                "credential {} is revoked on disk but not in memory",
                token_id
            )));
        }
        record.is_revoked = true;
        record.revocation_reason = Some(reason.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLDER: &str = "0x1234567890123456789012345678901234567890";
    const OTHER: &str = "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd";

    fn credential(token_id: TokenId, holder: &str) -> Credential {
        Credential {
            token_id,
            holder_address: holder.into(),
            student_name: "John Doe".into(),
            degree_type: "Bachelor".into(),
            field_of_study: String::new(),
            university: "MIT".into(),
            graduation_date: 0,
            document_hash: format!("QmHash{}", token_id),
            issued_at: 0,
            is_revoked: false,
            revocation_reason: None,
        }
    }

    fn empty_store() -> CredentialStore {
        CredentialStore::load(Arc::new(Database::in_memory().unwrap())).unwrap()
    }

    #[test]
    fn test_holder_index_keeps_issuance_order() {
        let mut store = empty_store();
        store.insert(credential(1, HOLDER)).unwrap();
        store.insert(credential(2, OTHER)).unwrap();
        store.insert(credential(3, HOLDER)).unwrap();
        assert_eq!(store.token_ids_for_holder(HOLDER), vec![1, 3]);
        assert_eq!(store.token_ids_for_holder(OTHER), vec![2]);
        assert!(store.token_ids_for_holder("0xnobody").is_empty());
    }

    #[test]
    fn test_out_of_sequence_insert_rejected() {
        let mut store = empty_store();
        assert!(store.insert(credential(2, HOLDER)).is_err());
        assert_eq!(store.next_token_id(), 1);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_revocation_is_one_way() {
        let mut store = empty_store();
        store.insert(credential(1, HOLDER)).unwrap();
        assert!(store.mark_revoked(1, "error").unwrap());
        assert!(!store.mark_revoked(1, "again").unwrap());
        let record = store.get(1).unwrap();
        assert!(record.is_revoked);
        assert_eq!(record.revocation_reason.as_deref(), Some("error"));
    }

    #[test]
    fn test_document_lookup_ignores_case() {
        let mut store = empty_store();
        store.insert(credential(1, HOLDER)).unwrap();
        assert_eq!(store.token_ids_for_document("qmhash1"), vec![1]);
        assert!(store.token_ids_for_document("QmHash9").is_empty());
    }

    #[test]
    fn test_reload_rebuilds_indexes() {
        let db = Arc::new(Database::in_memory().unwrap());
        {
            let mut store = CredentialStore::load(db.clone()).unwrap();
            store.insert(credential(1, HOLDER)).unwrap();
            store.insert(credential(2, HOLDER)).unwrap();
            store.mark_revoked(2, "error").unwrap();
        }
        let store = CredentialStore::load(db).unwrap();
        assert_eq!(store.next_token_id(), 3);
        assert_eq!(store.token_ids_for_holder(HOLDER), vec![1, 2]);
        assert!(store.get(2).unwrap().is_revoked);
    }
}
