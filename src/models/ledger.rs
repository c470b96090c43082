// src/models/ledger.rs
//! Ledger binding descriptors.

use serde::{Deserialize, Serialize};

/// Where the authoritative ledger lives and how to talk to it.
///
/// `abi` is the contract interface as JSON; `None` selects the bundled
/// AcademicCredential interface.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBinding {
    pub address: String,
    pub rpc_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,
}

/// Snapshot of the resolver state, used by the contract-info and health endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerStatus {
    pub configured: bool,
    pub address: Option<String>,
    pub rpc_url: Option<String>,
}
