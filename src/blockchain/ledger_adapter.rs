// src/blockchain/ledger_adapter.rs
//! Ledger Adapter for the authoritative AcademicCredential contract.
//!
//! Proxies the read-only views of the contract over an EVM JSON-RPC endpoint.
//! Issuance and revocation transactions are signed and submitted by an
//! external actor, so no write path exists here.
//!
//! Every call is bounded by a timeout, and every failure is classified into
//! a [`LedgerError`] before it leaves this module: raw provider errors never
//! reach the caller.

use crate::errors::AuthorityError;
use crate::models::credential::{Credential, TokenId};
use crate::models::ledger::LedgerBinding;
use crate::utils::address::{format_address, parse_address};
use ethers::providers::{Http, Provider};
use ethers_contract::{BaseContract, Contract, ContractError};
use ethers_core::{
    abi::{Abi, Detokenize, Tokenize},
    types::{Address, U256},
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Bundled interface of the AcademicCredential contract.
pub const ACADEMIC_CREDENTIAL_ABI: &[u8] = include_bytes!("../abi/AcademicCredential.json");

/// Outcome classes of a failed ledger read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger could not answer: transport failure, timeout, or an
    /// interface mismatch.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger answered and has no such record (the contract reverted).
    #[error("ledger has no such record: {0}")]
    NotFound(String),
}

/// Raw `Credential` struct as returned by `getCredential(uint256)`.
type LedgerCredential = (String, String, String, String, U256, String, bool, U256);

/// Read-only client for one deployed AcademicCredential contract.
pub struct LedgerAdapter {
    /// Contract bound to an HTTP JSON-RPC provider
    contract: Contract<Provider<Http>>,
    /// Upper bound on every individual call
    timeout: Duration,
}

impl LedgerAdapter {
    /// Creates an adapter for the contract described by `binding`.
    ///
    /// Nothing is sent to the endpoint here; reachability shows up on the
    /// first read.
    ///
    /// # Errors
    /// Returns [`AuthorityError::InvalidLedgerBinding`] if:
    /// - The contract address is malformed
    /// - The RPC URL cannot be parsed
    /// - The supplied ABI is not a valid contract interface
    pub fn new(binding: &LedgerBinding, timeout: Duration) -> Result<Self, AuthorityError> {
        let address: Address = parse_address(&binding.address).ok_or_else(|| {
            AuthorityError::InvalidLedgerBinding(format!("malformed contract address {:?}", binding.address))
        })?;

        let abi = match &binding.abi {
            Some(value) => serde_json::from_value::<Abi>(value.clone())
                .map_err(|e| AuthorityError::InvalidLedgerBinding(format!("invalid contract ABI: {}", e)))?,
            None => Abi::load(ACADEMIC_CREDENTIAL_ABI)
                .map_err(|e| AuthorityError::InvalidLedgerBinding(format!("bundled ABI unreadable: {}", e)))?,
        };

        let provider = Provider::<Http>::try_from(binding.rpc_url.as_str())
            .map_err(|e| AuthorityError::InvalidLedgerBinding(format!("invalid RPC URL: {}", e)))?;

        let contract = Contract::new(address, BaseContract::from(abi), Arc::new(provider));
        Ok(Self { contract, timeout })
    }

    /// Fetches a credential and its holder from the contract.
    ///
    /// The contract does not keep revocation reasons in storage, so
    /// `revocation_reason` is always `None` for ledger records.
    pub async fn get_credential(&self, token_id: TokenId) -> Result<Credential, LedgerError> {
        let id = U256::from(token_id);
        let (record, owner) = futures::try_join!(
            self.call::<_, LedgerCredential>("getCredential", (id,)),
            self.call::<_, Address>("ownerOf", (id,)),
        )?;
        let (student_name, degree_type, field_of_study, university, graduation_date, ipfs_hash, is_revoked, issued_at) =
            record;

        Ok(Credential {
            token_id,
            holder_address: format_address(&owner),
            student_name,
            degree_type,
            field_of_study,
            university,
            graduation_date: to_timestamp("graduationDate", graduation_date)?,
            document_hash: ipfs_hash,
            issued_at: to_timestamp("issuedAt", issued_at)?,
            is_revoked,
            revocation_reason: None,
        })
    }

    /// Asks the contract whether a credential exists and is unrevoked.
    pub async fn is_valid(&self, token_id: TokenId) -> Result<bool, LedgerError> {
        self.call("isCredentialValid", (U256::from(token_id),)).await
    }

    /// Token ids the contract has recorded for `holder`, in issuance order.
    pub async fn credentials_for_holder(&self, holder: &str) -> Result<Vec<TokenId>, LedgerError> {
        let address = parse_address(holder)
            .ok_or_else(|| LedgerError::Unavailable(format!("cannot encode holder {:?}", holder)))?;
        let ids: Vec<U256> = self.call("getStudentCredentials", (address,)).await?;
        ids.into_iter()
            .map(|id| {
                if id > U256::from(u64::MAX) {
                    Err(LedgerError::Unavailable(format!("token id {} out of range", id)))
                } else {
                    Ok(id.low_u64())
                }
            })
            .collect()
    }

    /// Calls a view function with the configured timeout.
    ///
    /// # Arguments
    /// * `method` - Contract function name
    /// * `params` - Function arguments
    async fn call<T, D>(&self, method: &str, params: T) -> Result<D, LedgerError>
    where
        T: Tokenize,
        D: Detokenize,
    {
        let call = self
            .contract
            .method::<T, D>(method, params)
            .map_err(|e| LedgerError::Unavailable(format!("{}: {}", method, e)))?;

        match tokio::time::timeout(self.timeout, call.call()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(method, e)),
            Err(_) => Err(LedgerError::Unavailable(format!(
                "{}: no answer within {} ms",
                method,
                self.timeout.as_millis()
            ))),
        }
    }
}

/// A revert means the contract ran and refused; anything else means the
/// ledger could not be consulted.
fn classify(method: &str, err: ContractError<Provider<Http>>) -> LedgerError {
    let detail = err.to_string();
    if err.is_revert() || detail.to_ascii_lowercase().contains("revert") {
        LedgerError::NotFound(format!("{}: {}", method, detail))
    } else {
        LedgerError::Unavailable(format!("{}: {}", method, detail))
    }
}

fn to_timestamp(field: &str, value: U256) -> Result<i64, LedgerError> {
    if value > U256::from(i64::MAX as u64) {
        return Err(LedgerError::Unavailable(format!("{} {} out of range", field, value)));
    }
    Ok(value.low_u64() as i64)
}
