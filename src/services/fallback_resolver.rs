// src/services/fallback_resolver.rs
//! Fallback Resolver.
//!
//! Decides per read whether the ledger or the local store answers. The
//! resolver has exactly two states:
//!
//! - `Unconfigured`: no ledger is bound; every read goes to the local store.
//! - `Configured`: reads try the ledger first. An unavailable ledger always
//!   falls back to the local store; a definitive "not found" falls back only
//!   under [`NotFoundPolicy::Fallback`].
//!
//! Writes never pass through here: the ledger is read-only for this service.
//! Every fallback is logged and recorded in the [`AuditTrail`].

use crate::blockchain::ledger_adapter::{LedgerAdapter, LedgerError};
use crate::config::NotFoundPolicy;
use crate::errors::{AuthorityError, AuthorityResult};
use crate::models::ledger::{LedgerBinding, LedgerStatus};
use crate::services::audit::{AuditEvent, AuditTrail, FallbackCause};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

enum LedgerState {
    Unconfigured,
    Configured {
        binding: LedgerBinding,
        adapter: Arc<LedgerAdapter>,
    },
}

/// Where a read ended up being answered.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The ledger answered.
    Ledger(T),
    /// The ledger definitively has no record and its answer is final.
    LedgerMiss,
    /// The local store must answer.
    Local,
}

pub struct FallbackResolver {
    state: RwLock<LedgerState>,
    timeout: Duration,
    not_found_policy: NotFoundPolicy,
    audit: Arc<AuditTrail>,
}

impl FallbackResolver {
    pub fn new(timeout: Duration, not_found_policy: NotFoundPolicy, audit: Arc<AuditTrail>) -> Self {
        Self {
            state: RwLock::new(LedgerState::Unconfigured),
            timeout,
            not_found_policy,
            audit,
        }
    }

    /// Binds (or rebinds) the ledger. Rebinding replaces the previous binding.
    ///
    /// Only the binding's shape is validated; reachability is discovered on
    /// the first read.
    pub fn bind(&self, binding: LedgerBinding) -> AuthorityResult<()> {
        let adapter = Arc::new(LedgerAdapter::new(&binding, self.timeout)?);
        let mut state = self.state.write()?;
        log::info!("ledger bound to {} via {}", binding.address, binding.rpc_url);
        self.audit.record(AuditEvent::LedgerBound {
            address: binding.address.clone(),
            rpc_url: binding.rpc_url.clone(),
        });
        *state = LedgerState::Configured { binding, adapter };
        Ok(())
    }

    pub fn not_found_policy(&self) -> NotFoundPolicy {
        self.not_found_policy
    }

    pub fn status(&self) -> LedgerStatus {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*state {
            LedgerState::Unconfigured => LedgerStatus {
                configured: false,
                address: None,
                rpc_url: None,
            },
            LedgerState::Configured { binding, .. } => LedgerStatus {
                configured: true,
                address: Some(binding.address.clone()),
                rpc_url: Some(binding.rpc_url.clone()),
            },
        }
    }

    fn adapter(&self) -> Result<Option<Arc<LedgerAdapter>>, AuthorityError> {
        Ok(match &*self.state.read()? {
            LedgerState::Unconfigured => None,
            LedgerState::Configured { adapter, .. } => Some(adapter.clone()),
        })
    }

    /// Runs `ledger_read` against the bound ledger and decides who answers.
    ///
    /// # Arguments
    /// * `operation` - Name recorded in the log and audit trail on fallback
    /// * `ledger_read` - The read to attempt when a ledger is bound
    pub async fn resolve<T, F, Fut>(&self, operation: &str, ledger_read: F) -> AuthorityResult<Resolution<T>>
    where
        F: FnOnce(Arc<LedgerAdapter>) -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        // The lock is released before awaiting the ledger.
        let Some(adapter) = self.adapter()? else {
            return Ok(Resolution::Local);
        };

        match ledger_read(adapter).await {
            Ok(value) => Ok(Resolution::Ledger(value)),
            Err(LedgerError::Unavailable(detail)) => {
                log::warn!("{}: ledger unavailable, serving local record ({})", operation, detail);
                self.record_fallback(operation, FallbackCause::Unavailable);
                Ok(Resolution::Local)
            }
            Err(LedgerError::NotFound(detail)) => match self.not_found_policy {
                NotFoundPolicy::Fallback => {
                    log::info!("{}: not on ledger, serving local record ({})", operation, detail);
                    self.record_fallback(operation, FallbackCause::NotFound);
                    Ok(Resolution::Local)
                }
                NotFoundPolicy::Authoritative => {
                    log::debug!("{}: not on ledger ({})", operation, detail);
                    Ok(Resolution::LedgerMiss)
                }
            },
        }
    }

    fn record_fallback(&self, operation: &str, cause: FallbackCause) {
        self.audit.record(AuditEvent::LedgerFallback {
            operation: operation.to_string(),
            cause,
        });
    }
}
