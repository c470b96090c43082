// src/services/audit.rs
//! Audit trail of authority events.
//!
//! Issuance, revocation, authorization changes, ledger binding and every
//! ledger fallback are recorded here and mirrored to the log. The trail is a
//! bounded ring: once full, the oldest event is dropped.

use crate::models::credential::TokenId;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Why a read was served from the local store instead of the ledger.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    Unavailable,
    NotFound,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AuditEvent {
    #[serde(rename_all = "camelCase")]
    CredentialIssued { token_id: TokenId, holder: String, issuer: String },
    #[serde(rename_all = "camelCase")]
    CredentialRevoked { token_id: TokenId, reason: String },
    #[serde(rename_all = "camelCase")]
    AuthorizationChanged { issuer: String, enabled: bool },
    #[serde(rename_all = "camelCase")]
    LedgerBound { address: String, rpc_url: String },
    #[serde(rename_all = "camelCase")]
    LedgerFallback { operation: String, cause: FallbackCause },
}

#[derive(Serialize, Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: i64,
    #[serde(flatten)]
    pub event: AuditEvent,
}

pub struct AuditTrail {
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, event: AuditEvent) {
        let entry = AuditEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event,
        };
        // A poisoned trail only loses audit history; keep serving.
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Events oldest first.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.iter().cloned().collect()
    }

    pub fn fallback_count(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|e| matches!(e.event, AuditEvent::LedgerFallback { .. }))
            .count()
    }
}
