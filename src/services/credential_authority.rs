// src/services/credential_authority.rs
//! Credential Authority
//!
//! Owns the Credential Store and the Authorization Registry and funnels every
//! mutation through its own methods:
//! - Issuer authorization (administrator only)
//! - Credential issuance with sequential token ids
//! - Revocation (one way, never reinstated)
//!
//! Reads (`get_credential`, `is_valid`, `credentials_for_holder`) go through
//! the [`FallbackResolver`] and return the same shapes whether the ledger or
//! the local store answered.
//!
//! Writes take the state lock for their whole critical section: the token id
//! is allocated, persisted and indexed under one write guard, so concurrent
//! issuances never share an id and a failed attempt never consumes one.

use crate::config::NotFoundPolicy;
use crate::errors::{AuthorityError, AuthorityResult};
use crate::models::credential::{Credential, CredentialStatus, IssueCredential, TokenId};
use crate::models::ledger::{LedgerBinding, LedgerStatus};
use crate::services::audit::{AuditEvent, AuditTrail};
use crate::services::fallback_resolver::{FallbackResolver, Resolution};
use crate::storage::authorization_registry::AuthorizationRegistry;
use crate::storage::credential_store::CredentialStore;
use crate::storage::database::Database;
use crate::utils::address::{canonical_holder, canonical_identity};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

/// Mutable state guarded by the authority's lock.
struct AuthorityState {
    store: CredentialStore,
    registry: AuthorizationRegistry,
}

pub struct CredentialAuthority {
    state: RwLock<AuthorityState>,
    resolver: FallbackResolver,
    audit: Arc<AuditTrail>,
    document_gateway: String,
}

impl CredentialAuthority {
    /// Builds the authority from persisted state.
    ///
    /// # Arguments
    /// * `db` - Durable copy of credentials and authorizations
    /// * `admin` - Root administrator identity
    /// * `resolver` - Ledger routing for reads
    /// * `audit` - Event trail shared with the resolver
    /// * `document_gateway` - Prefix of token URIs
    pub fn open(
        db: Arc<Database>,
        admin: &str,
        resolver: FallbackResolver,
        audit: Arc<AuditTrail>,
        document_gateway: &str,
    ) -> AuthorityResult<Self> {
        let store = CredentialStore::load(db.clone())?;
        let registry = AuthorizationRegistry::load(db, canonical_identity(admin))?;
        log::info!(
            "credential authority ready: {} credentials, next token id {}, administrator {}",
            store.len(),
            store.next_token_id(),
            registry.admin()
        );
        Ok(Self {
            state: RwLock::new(AuthorityState { store, registry }),
            resolver,
            audit,
            document_gateway: document_gateway.to_string(),
        })
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    // =====================
    // Authorization
    // =====================

    /// Enables or disables an issuer. Only the administrator may call this.
    pub fn authorize(&self, caller: &str, issuer: &str, enabled: bool) -> AuthorityResult<()> {
        let caller = canonical_identity(caller);
        let issuer = canonical_identity(issuer);
        let mut state = self.state.write()?;
        if !state.registry.is_admin(&caller) {
            log::debug!("authorize rejected: {} is not the administrator", caller);
            return Err(AuthorityError::Unauthorized);
        }
        state.registry.set(&issuer, enabled)?;
        drop(state);

        log::info!("issuer {} authorization set to {}", issuer, enabled);
        self.audit.record(AuditEvent::AuthorizationChanged { issuer, enabled });
        Ok(())
    }

    pub fn is_authorized(&self, issuer: &str) -> AuthorityResult<bool> {
        Ok(self.state.read()?.registry.is_authorized(&canonical_identity(issuer)))
    }

    // =====================
    // Issuance
    // =====================

    /// Issues a credential on behalf of `issuer`.
    ///
    /// Checks run in order and the first failure wins: issuer authorization,
    /// holder address, student name, degree type, university.
    pub fn issue(&self, request: IssueCredential, issuer: &str) -> AuthorityResult<Credential> {
        let issuer = canonical_identity(issuer);
        let mut state = self.state.write()?;

        if !state.registry.is_authorized(&issuer) {
            log::debug!("issue rejected: {} is not authorized", issuer);
            return Err(AuthorityError::NotAuthorizedIssuer(issuer));
        }
        let holder_address =
            canonical_holder(&request.holder_address).ok_or(AuthorityError::InvalidHolderAddress)?;
        if request.student_name.trim().is_empty() {
            return Err(AuthorityError::EmptyStudentName);
        }
        if request.degree_type.trim().is_empty() {
            return Err(AuthorityError::EmptyDegreeType);
        }
        if request.university.trim().is_empty() {
            return Err(AuthorityError::EmptyUniversity);
        }

        let now = chrono::Utc::now().timestamp();
        let credential = Credential {
            token_id: state.store.next_token_id(),
            holder_address,
            student_name: request.student_name,
            degree_type: request.degree_type,
            field_of_study: request.field_of_study.unwrap_or_default(),
            university: request.university,
            graduation_date: request.graduation_date.unwrap_or(now),
            document_hash: request.document_hash,
            issued_at: now,
            is_revoked: false,
            revocation_reason: None,
        };
        state.store.insert(credential.clone())?;
        drop(state);

        log::info!(
            "credential {} issued to {} by {}",
            credential.token_id,
            credential.holder_address,
            issuer
        );
        self.audit.record(AuditEvent::CredentialIssued {
            token_id: credential.token_id,
            holder: credential.holder_address.clone(),
            issuer,
        });
        Ok(credential)
    }

    // =====================
    // Revocation
    // =====================

    /// Revokes a credential. A revoked credential stays revoked.
    pub fn revoke(&self, token_id: TokenId, reason: &str, issuer: &str) -> AuthorityResult<Credential> {
        let issuer = canonical_identity(issuer);
        let mut state = self.state.write()?;

        if !state.registry.is_authorized(&issuer) {
            log::debug!("revoke rejected: {} is not authorized", issuer);
            return Err(AuthorityError::NotAuthorizedIssuer(issuer));
        }
        match state.store.get(token_id) {
            None => return Err(AuthorityError::CredentialNotFound(token_id)),
            Some(record) if record.is_revoked => return Err(AuthorityError::AlreadyRevoked(token_id)),
            Some(_) => {}
        }
        if !state.store.mark_revoked(token_id, reason)? {
            return Err(AuthorityError::AlreadyRevoked(token_id));
        }
        let revoked = state
            .store
            .get(token_id)
            .cloned()
            .ok_or(AuthorityError::CredentialNotFound(token_id))?;
        drop(state);

        log::info!("credential {} revoked by {}: {}", token_id, issuer, reason);
        self.audit.record(AuditEvent::CredentialRevoked {
            token_id,
            reason: reason.to_string(),
        });
        Ok(revoked)
    }

    // =====================
    // Verification
    // =====================

    /// Full record for `token_id`, from the ledger when bound and reachable.
    pub async fn get_credential(&self, token_id: TokenId) -> AuthorityResult<Credential> {
        let resolution = self
            .resolver
            .resolve("getCredential", move |ledger| async move { ledger.get_credential(token_id).await })
            .await?;
        match resolution {
            Resolution::Ledger(credential) => Ok(credential),
            Resolution::LedgerMiss => Err(AuthorityError::CredentialNotFound(token_id)),
            Resolution::Local => self.local_credential(token_id),
        }
    }

    /// Record plus derived validity, as shown to verifiers. Validity is taken
    /// from the record itself, so both always come from the same source.
    pub async fn credential_status(&self, token_id: TokenId) -> AuthorityResult<CredentialStatus> {
        Ok(CredentialStatus::from(self.get_credential(token_id).await?))
    }

    /// `true` iff the credential exists and is unrevoked. Unknown ids are simply invalid.
    ///
    /// The contract answers `false` for ids it never minted instead of
    /// reverting. Under [`NotFoundPolicy::Fallback`] a ledger `false` is
    /// therefore settled by the full record lookup, which serves local-only
    /// credentials.
    pub async fn is_valid(&self, token_id: TokenId) -> bool {
        let resolution = self
            .resolver
            .resolve("isValid", move |ledger| async move { ledger.is_valid(token_id).await })
            .await;
        match resolution {
            Ok(Resolution::Ledger(true)) => true,
            Ok(Resolution::Ledger(false)) if self.resolver.not_found_policy() == NotFoundPolicy::Fallback => self
                .get_credential(token_id)
                .await
                .map(|c| c.is_valid())
                .unwrap_or(false),
            Ok(Resolution::Ledger(false)) | Ok(Resolution::LedgerMiss) => false,
            Ok(Resolution::Local) => self
                .local_credential(token_id)
                .map(|c| c.is_valid())
                .unwrap_or(false),
            Err(e) => {
                log::error!("isValid({}) could not be answered: {}", token_id, e);
                false
            }
        }
    }

    /// Token ids issued to `holder`, in issuance order, regardless of revocation.
    ///
    /// Under [`NotFoundPolicy::Fallback`] the ledger's list is merged with the
    /// local one, since the contract lists nothing for locally issued ids.
    ///
    /// # Errors
    /// [`AuthorityError::InvalidHolderAddress`] if `holder` is malformed.
    pub async fn credentials_for_holder(&self, holder: &str) -> AuthorityResult<Vec<TokenId>> {
        let holder = canonical_holder(holder).ok_or(AuthorityError::InvalidHolderAddress)?;
        let ledger_holder = holder.clone();
        let resolution = self
            .resolver
            .resolve("getCredentialsForHolder", move |ledger| async move {
                ledger.credentials_for_holder(&ledger_holder).await
            })
            .await?;
        match resolution {
            Resolution::Ledger(ids) if self.resolver.not_found_policy() == NotFoundPolicy::Fallback => {
                let mut merged: BTreeSet<TokenId> = ids.into_iter().collect();
                merged.extend(self.state.read()?.store.token_ids_for_holder(&holder));
                Ok(merged.into_iter().collect())
            }
            Resolution::Ledger(ids) => Ok(ids),
            Resolution::LedgerMiss => Ok(Vec::new()),
            Resolution::Local => Ok(self.state.read()?.store.token_ids_for_holder(&holder)),
        }
    }

    /// Every credential of `holder` with its validity, in issuance order.
    pub async fn holder_statuses(&self, holder: &str) -> AuthorityResult<Vec<CredentialStatus>> {
        let ids = self.credentials_for_holder(holder).await?;
        let lookups = ids.into_iter().map(|id| self.credential_status(id));
        futures::future::join_all(lookups)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(status) => Some(Ok(status)),
                // Listed by the ledger but unreadable under an authoritative policy.
                Err(AuthorityError::CredentialNotFound(id)) => {
                    log::warn!("credential {} listed for holder but not retrievable", id);
                    None
                }
                Err(e) => Some(Err(e)),
            })
            .collect()
    }

    /// Local credentials whose document hash matches `document_hash`.
    pub fn credentials_for_document(&self, document_hash: &str) -> AuthorityResult<Vec<CredentialStatus>> {
        let state = self.state.read()?;
        Ok(state
            .store
            .token_ids_for_document(document_hash)
            .into_iter()
            .filter_map(|id| state.store.get(id).cloned())
            .map(CredentialStatus::from)
            .collect())
    }

    /// Metadata URI of a credential: the document gateway joined with its hash.
    pub async fn token_uri(&self, token_id: TokenId) -> AuthorityResult<String> {
        let credential = self.get_credential(token_id).await?;
        Ok(format!("{}{}", self.document_gateway, credential.document_hash))
    }

    fn local_credential(&self, token_id: TokenId) -> AuthorityResult<Credential> {
        self.state
            .read()?
            .store
            .get(token_id)
            .cloned()
            .ok_or(AuthorityError::CredentialNotFound(token_id))
    }

    pub fn local_count(&self) -> AuthorityResult<usize> {
        Ok(self.state.read()?.store.len())
    }

    // =====================
    // Ledger binding
    // =====================

    pub fn bind_ledger(&self, binding: LedgerBinding) -> AuthorityResult<()> {
        self.resolver.bind(binding)
    }

    pub fn ledger_status(&self) -> LedgerStatus {
        self.resolver.status()
    }
}
