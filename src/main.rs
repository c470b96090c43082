// src/main.rs

//! # Academic Credential Authority - Main Entry Point
//!
//! Issues, verifies and revokes academic credentials identified by sequential
//! token ids. Writes always land in the local SQLite store; reads prefer the
//! authoritative ledger contract once one is bound and fall back to the local
//! store whenever the ledger cannot answer.
//!
//! ## Architecture Overview
//! 1. **Storage Layer**: SQLite-backed Credential Store and Authorization Registry
//! 2. **Blockchain Layer**: `LedgerAdapter` for the AcademicCredential contract
//! 3. **Services Layer**: Credential Authority, Fallback Resolver, audit trail and API endpoints
//!
//! ## Configuration
//! See [`config::Settings`]. The only required value is the administrator
//! identity, e.g. `CREDENTIAL_AUTHORITY__AUTHORITY__ADMIN=0x...` in `.env`.

use crate::config::Settings;
use crate::models::ledger::LedgerBinding;
use crate::services::api_server::ApiServer;
use crate::services::audit::AuditTrail;
use crate::services::credential_authority::CredentialAuthority;
use crate::services::fallback_resolver::FallbackResolver;
use crate::storage::database::Database;
use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod blockchain;    // Ledger contract reads
mod config;        // Layered settings
mod errors;        // Error taxonomy
mod models;        // Data structures
mod services;      // Business logic and API
mod storage;       // Durable local state
mod utils;         // Helper functions

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env` and settings, start the logger
/// 2. Open the database and rebuild local state
/// 3. Bind the ledger if both RPC URL and contract address are configured
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("failed to load configuration")?;

    let db = Arc::new(
        Database::open(&settings.database.path)
            .with_context(|| format!("failed to open database at {}", settings.database.path))?,
    );
    let audit = Arc::new(AuditTrail::new(settings.audit.capacity));
    let resolver = FallbackResolver::new(
        settings.ledger_timeout(),
        settings.ledger.not_found_policy,
        audit.clone(),
    );
    let authority = CredentialAuthority::open(
        db,
        &settings.authority.admin,
        resolver,
        audit,
        &settings.authority.document_gateway,
    )
    .context("failed to load credential state")?;

    match (&settings.ledger.rpc_url, &settings.ledger.contract_address) {
        (Some(rpc_url), Some(address)) => {
            authority
                .bind_ledger(LedgerBinding {
                    address: address.clone(),
                    rpc_url: rpc_url.clone(),
                    abi: None,
                })
                .context("invalid ledger configuration")?;
        }
        _ => log::warn!("no ledger contract configured; serving credentials from the local store"),
    }

    let api_server = ApiServer::new(Arc::new(authority), settings.ledger.rpc_url.clone());

    let addr = settings.bind_addr().context("invalid server address")?;
    log::info!("Available endpoints:");
    log::info!("- POST /api/issue-credential");
    log::info!("- GET  /api/credential/:token_id");
    log::info!("- GET  /api/holder/:address");
    log::info!("- POST /api/revoke-credential");
    log::info!("- POST /api/authorize");
    log::info!("- POST /api/update-contract");

    api_server.run(addr).await.context("API server failed")
}
