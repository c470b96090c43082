// src/storage/database.rs
//! SQLite persistence for credentials and issuer authorizations.
//!
//! The database is the durable copy of record. The in-memory store and
//! registry are rebuilt from it at startup, and every mutation is committed
//! here before the in-memory state changes.

use crate::errors::StorageError;
use crate::models::credential::{Credential, TokenId};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credentials (
    token_id INTEGER PRIMARY KEY NOT NULL,
    holder_address TEXT NOT NULL,
    student_name TEXT NOT NULL,
    degree_type TEXT NOT NULL,
    field_of_study TEXT NOT NULL DEFAULT '',
    university TEXT NOT NULL,
    graduation_date INTEGER NOT NULL,
    document_hash TEXT NOT NULL,
    issued_at INTEGER NOT NULL,
    is_revoked INTEGER NOT NULL DEFAULT 0,
    revocation_reason TEXT
);
CREATE INDEX IF NOT EXISTS credentials_by_holder ON credentials (holder_address, token_id);
CREATE TABLE IF NOT EXISTS authorizations (
    issuer TEXT PRIMARY KEY NOT NULL,
    enabled INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY NOT NULL,
    value INTEGER NOT NULL
);
INSERT OR IGNORE INTO counters (name, value) VALUES ('next_token_id', 1);
";

/// Thread-safe handle to the SQLite database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens or creates the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Creates an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Poisoned(e.to_string()))
    }

    /// Inserts a freshly issued credential and advances the token counter past it,
    /// both in one transaction.
    pub fn insert_credential(&self, credential: &Credential) -> Result<(), StorageError> {
        let token_id = to_sql_id(credential.token_id)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO credentials (token_id, holder_address, student_name, degree_type,
                field_of_study, university, graduation_date, document_hash, issued_at,
                is_revoked, revocation_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                token_id,
                credential.holder_address,
                credential.student_name,
                credential.degree_type,
                credential.field_of_study,
                credential.university,
                credential.graduation_date,
                credential.document_hash,
                credential.issued_at,
                credential.is_revoked,
                credential.revocation_reason,
            ],
        )?;
        tx.execute(
            "UPDATE counters SET value = ?1 WHERE name = 'next_token_id'",
            params![token_id + 1],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Flags a credential as revoked. Only unrevoked rows are touched.
    pub fn mark_revoked(&self, token_id: TokenId, reason: &str) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE credentials SET is_revoked = 1, revocation_reason = ?2
             WHERE token_id = ?1 AND is_revoked = 0",
            params![to_sql_id(token_id)?, reason],
        )?;
        Ok(rows > 0)
    }

    pub fn set_authorization(&self, issuer: &str, enabled: bool) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO authorizations (issuer, enabled) VALUES (?1, ?2)
             ON CONFLICT(issuer) DO UPDATE SET enabled = excluded.enabled",
            params![issuer, enabled],
        )?;
        Ok(())
    }

    /// All credentials in token-id order.
    pub fn load_credentials(&self) -> Result<Vec<Credential>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT token_id, holder_address, student_name, degree_type, field_of_study,
                    university, graduation_date, document_hash, issued_at, is_revoked,
                    revocation_reason
             FROM credentials ORDER BY token_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let raw_id: i64 = row.get(0)?;
            let credential = Credential {
                token_id: 0,
                holder_address: row.get(1)?,
                student_name: row.get(2)?,
                degree_type: row.get(3)?,
                field_of_study: row.get(4)?,
                university: row.get(5)?,
                graduation_date: row.get(6)?,
                document_hash: row.get(7)?,
                issued_at: row.get(8)?,
                is_revoked: row.get(9)?,
                revocation_reason: row.get(10)?,
            };
            Ok((raw_id, credential))
        })?;
        rows.map(|row| -> Result<Credential, StorageError> {
            let (raw_id, mut credential) = row?;
            credential.token_id = from_sql_id(raw_id)?;
            Ok(credential)
        })
        .collect()
    }

    pub fn load_authorizations(&self) -> Result<Vec<(String, bool)>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT issuer, enabled FROM authorizations")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn next_token_id(&self) -> Result<TokenId, StorageError> {
        let conn = self.lock()?;
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM counters WHERE name = 'next_token_id'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            Some(v) if v >= 1 => from_sql_id(v),
            Some(v) => Err(StorageError::Corrupt(format!("next_token_id is {}", v))),
            None => Ok(1),
        }
    }
}

fn to_sql_id(token_id: TokenId) -> Result<i64, StorageError> {
    i64::try_from(token_id)
        .map_err(|_| StorageError::Corrupt(format!("token id {} exceeds storage range", token_id)))
}

fn from_sql_id(raw: i64) -> Result<TokenId, StorageError> {
    TokenId::try_from(raw).map_err(|_| StorageError::Corrupt(format!("stored token id {} is negative", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(token_id: TokenId) -> Credential {
        Credential {
            token_id,
            holder_address: "0x1234567890123456789012345678901234567890".into(),
            student_name: "John Doe".into(),
            degree_type: "Bachelor".into(),
            field_of_study: "Computer Science".into(),
            university: "MIT".into(),
            graduation_date: 1_650_000_000,
            document_hash: "QmTestHash123".into(),
            issued_at: 1_700_000_000,
            is_revoked: false,
            revocation_reason: None,
        }
    }

    #[test]
    fn test_fresh_database_starts_at_token_one() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.next_token_id().unwrap(), 1);
        assert!(db.load_credentials().unwrap().is_empty());
    }

    #[test]
    fn test_insert_advances_counter() {
        let db = Database::in_memory().unwrap();
        db.insert_credential(&credential(1)).unwrap();
        db.insert_credential(&credential(2)).unwrap();
        assert_eq!(db.next_token_id().unwrap(), 3);
        let loaded = db.load_credentials().unwrap();
        assert_eq!(loaded, vec![credential(1), credential(2)]);
    }

    #[test]
    fn test_duplicate_token_id_rejected_without_moving_counter() {
        let db = Database::in_memory().unwrap();
        db.insert_credential(&credential(1)).unwrap();
        assert!(db.insert_credential(&credential(1)).is_err());
        assert_eq!(db.next_token_id().unwrap(), 2);
    }

    #[test]
    fn test_mark_revoked_only_once() {
        let db = Database::in_memory().unwrap();
        db.insert_credential(&credential(1)).unwrap();
        assert!(db.mark_revoked(1, "Academic misconduct").unwrap());
        assert!(!db.mark_revoked(1, "Another reason").unwrap());
        let loaded = db.load_credentials().unwrap();
        assert!(loaded[0].is_revoked);
        assert_eq!(loaded[0].revocation_reason.as_deref(), Some("Academic misconduct"));
    }

    #[test]
    fn test_authorization_upsert() {
        let db = Database::in_memory().unwrap();
        db.set_authorization("0xuni", true).unwrap();
        db.set_authorization("0xuni", false).unwrap();
        assert_eq!(db.load_authorizations().unwrap(), vec![("0xuni".to_string(), false)]);
    }

    #[test]
    fn test_state_survives_reopen() {
        let path = std::env::temp_dir().join(format!(
            "credential-db-reopen-{}-{}.sqlite",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        {
            let db = Database::open(&path).unwrap();
            db.insert_credential(&credential(1)).unwrap();
            db.mark_revoked(1, "error").unwrap();
            db.set_authorization("0xuni", true).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.next_token_id().unwrap(), 2);
        assert!(db.load_credentials().unwrap()[0].is_revoked);
        assert_eq!(db.load_authorizations().unwrap().len(), 1);
        drop(db);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_negative_stored_id_is_corrupt() {
        let db = Database::in_memory().unwrap();
        db.lock()
            .unwrap()
            .execute(
                "INSERT INTO credentials (token_id, holder_address, student_name, degree_type,
                    university, graduation_date, document_hash, issued_at)
                 VALUES (-5, '0xabc', 'John Doe', 'Bachelor', 'MIT', 0, '', 0)",
                [],
            )
            .unwrap();
        assert!(matches!(db.load_credentials(), Err(StorageError::Corrupt(_))));
    }
}
