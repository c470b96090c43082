// src/services/api_server.rs
//! API Server for the credential authority
//!
//! This module provides the REST interface over the [`CredentialAuthority`]:
//! - Credential issuance, revocation and verification
//! - Holder and document-hash lookups
//! - Issuer authorization (administrator only)
//! - Ledger binding and status
//! - Health and audit endpoints
//!
//! Every failure is rendered as `{"success": false, "error": <kind>, "message": ...}`
//! with a status code derived from the error kind.

use crate::errors::AuthorityError;
use crate::models::credential::{IssueCredential, TokenId};
use crate::models::ledger::LedgerBinding;
use crate::services::credential_authority::CredentialAuthority;
use crate::utils::address::canonical_identity;
use crate::utils::crypto::fingerprint_base64;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Json, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

// API request structures

/// Request payload for issuing a credential
///
/// Either `document_hash` or base64 `document` content identifies the
/// underlying document; a supplied hash wins.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct IssueCredentialRequest {
    holder_address: String,
    student_name: String,
    degree_type: String,
    field_of_study: Option<String>,
    university: String,
    graduation_date: Option<i64>,
    document_hash: Option<String>,
    document: Option<String>,
    issuer: String,
}

/// Request payload for revoking a credential
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeCredentialRequest {
    token_id: TokenId,
    #[serde(default)]
    reason: String,
    issuer: String,
}

/// Request payload for changing an issuer's authorization
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeRequest {
    issuer: String,
    enabled: bool,
    caller: String,
}

/// Request payload for binding the ledger contract
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateContractRequest {
    address: String,
    #[serde(default)]
    rpc_url: Option<String>,
    #[serde(default)]
    abi: Option<serde_json::Value>,
}

/// JSON body extractor whose rejections render as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct ApiJson<T>(T);

/// Path extractor whose rejections render as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
struct ApiPath<T>(T);

/// Failure of an API call.
#[derive(Debug)]
enum ApiError {
    Authority(AuthorityError),
    InvalidRequest(String),
    InvalidDocument(String),
    Internal(String),
}

impl From<AuthorityError> for ApiError {
    fn from(e: AuthorityError) -> Self {
        ApiError::Authority(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

fn status_for(err: &AuthorityError) -> StatusCode {
    match err {
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        AuthorityError::NotAuthorizedIssuer(_) | AuthorityError::Unauthorized => StatusCode::FORBIDDEN,
        AuthorityError::CredentialNotFound(_) => StatusCode::NOT_FOUND,
        AuthorityError::AlreadyRevoked(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Authority(e) => {
                if let AuthorityError::Storage(inner) = &e {
                    log::error!("storage failure: {}", inner);
                }
                (status_for(&e), e.kind(), e.public_message())
            }
            ApiError::InvalidRequest(detail) => (StatusCode::BAD_REQUEST, "InvalidRequest", detail),
            ApiError::InvalidDocument(detail) => (
                StatusCode::BAD_REQUEST,
                "InvalidDocument",
                format!("document is not valid base64: {}", detail),
            ),
            ApiError::Internal(detail) => {
                log::error!("internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal",
                    "the request could not be completed".to_string(),
                )
            }
        };
        (status, Json(json!({ "success": false, "error": kind, "message": message }))).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

fn parse_token_id(raw: &str) -> Result<TokenId, AuthorityError> {
    match raw.trim().parse::<TokenId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AuthorityError::InvalidTokenId(raw.to_string())),
    }
}

/// API server state
pub struct ApiServer {
    /// The credential authority every handler delegates to
    authority: Arc<CredentialAuthority>,

    /// RPC endpoint used when a bind request names only a contract address
    default_rpc_url: Option<String>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `authority` - Credential authority backing all endpoints
    /// * `default_rpc_url` - Ledger endpoint for `/api/update-contract` requests without `rpcUrl`
    pub fn new(authority: Arc<CredentialAuthority>, default_rpc_url: Option<String>) -> Self {
        ApiServer {
            authority,
            default_rpc_url,
        }
    }

    /// Builds the router with all API routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/issue-credential", post(Self::issue_credential_handler))
            .route("/api/credential/:token_id", get(Self::credential_handler))
            .route("/api/verify-credential/:token_id", get(Self::credential_handler))
            .route("/api/valid/:token_id", get(Self::valid_handler))
            .route("/api/holder/:address", get(Self::holder_credentials_handler))
            .route("/api/student-credentials/:address", get(Self::holder_credentials_handler))
            .route("/api/revoke-credential", post(Self::revoke_credential_handler))
            .route("/api/authorize", post(Self::authorize_handler))
            .route("/api/authorized/:issuer", get(Self::authorized_handler))
            .route("/api/update-contract", post(Self::update_contract_handler))
            .route("/api/contract-info", get(Self::contract_info_handler))
            .route("/api/token-uri/:token_id", get(Self::token_uri_handler))
            .route("/api/verify-document/:hash", get(Self::verify_document_handler))
            .route("/api/health", get(Self::health_handler))
            .route("/api/audit-log", get(Self::audit_log_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("API server listening on http://{}", addr);
        axum::serve(listener, self.router()).await
    }

    /// Runs a write against the authority off the async executor.
    async fn blocking<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialAuthority) -> Result<T, AuthorityError> + Send + 'static,
    {
        let authority = self.authority.clone();
        tokio::task::spawn_blocking(move || op(&authority))
            .await
            .map_err(|e| ApiError::Internal(format!("write task failed: {}", e)))?
            .map_err(ApiError::from)
    }

    // =====================
    // Credential Handlers
    // =====================

    /// Issues a new credential
    ///
    /// # Endpoint
    /// POST /api/issue-credential
    ///
    /// A supplied `documentHash` is stored as given; otherwise base64 `document`
    /// content is fingerprinted. With neither, the credential is issued with an
    /// empty document hash, since the document is not a required field.
    ///
    /// # Responses
    /// - 200 OK: Returns the created credential and its token id
    /// - 400 Bad Request: Invalid holder address, empty required field, malformed body, or undecodable document
    /// - 403 Forbidden: Issuer is not authorized
    async fn issue_credential_handler(
        State(state): State<Arc<ApiServer>>,
        ApiJson(payload): ApiJson<IssueCredentialRequest>,
    ) -> ApiResult {
        let document_hash = match (payload.document_hash, payload.document) {
            (Some(hash), _) if !hash.trim().is_empty() => hash.trim().to_string(),
            (_, Some(document)) => {
                fingerprint_base64(&document).map_err(|e| ApiError::InvalidDocument(e.to_string()))?
            }
            _ => String::new(),
        };
        let request = IssueCredential {
            holder_address: payload.holder_address,
            student_name: payload.student_name,
            degree_type: payload.degree_type,
            field_of_study: payload.field_of_study,
            university: payload.university,
            graduation_date: payload.graduation_date,
            document_hash,
        };
        let issuer = payload.issuer;

        let credential = state
            .blocking(move |authority| authority.issue(request, &issuer))
            .await?;
        Ok(Json(json!({
            "success": true,
            "message": "Credential issued successfully!",
            "tokenId": credential.token_id,
            "credential": credential,
        }))
        .into_response())
    }

    /// Returns a credential with its derived validity
    ///
    /// # Endpoint
    /// GET /api/credential/:token_id (alias: /api/verify-credential/:token_id)
    ///
    /// # Responses
    /// - 200 OK: Credential record plus `isValid`
    /// - 400 Bad Request: Token id is not a positive integer
    /// - 404 Not Found: No such credential
    async fn credential_handler(
        State(state): State<Arc<ApiServer>>,
        ApiPath(token_id): ApiPath<String>,
    ) -> ApiResult {
        let token_id = parse_token_id(&token_id)?;
        let credential = state.authority.credential_status(token_id).await?;
        Ok(Json(json!({ "success": true, "credential": credential })).into_response())
    }

    /// GET /api/valid/:token_id
    async fn valid_handler(State(state): State<Arc<ApiServer>>, ApiPath(token_id): ApiPath<String>) -> ApiResult {
        let token_id = parse_token_id(&token_id)?;
        let is_valid = state.authority.is_valid(token_id).await;
        Ok(Json(json!({ "tokenId": token_id, "isValid": is_valid })).into_response())
    }

    /// Lists a holder's credentials in issuance order
    ///
    /// # Endpoint
    /// GET /api/holder/:address (alias: /api/student-credentials/:address)
    async fn holder_credentials_handler(
        State(state): State<Arc<ApiServer>>,
        ApiPath(address): ApiPath<String>,
    ) -> ApiResult {
        let credentials = state.authority.holder_statuses(&address).await?;
        Ok(Json(json!({ "success": true, "credentials": credentials })).into_response())
    }

    /// Revokes a credential
    ///
    /// # Endpoint
    /// POST /api/revoke-credential
    ///
    /// # Responses
    /// - 200 OK: Revoked credential
    /// - 403 Forbidden: Issuer is not authorized
    /// - 404 Not Found: No such credential
    /// - 409 Conflict: Already revoked
    async fn revoke_credential_handler(
        State(state): State<Arc<ApiServer>>,
        ApiJson(payload): ApiJson<RevokeCredentialRequest>,
    ) -> ApiResult {
        let RevokeCredentialRequest { token_id, reason, issuer } = payload;
        let credential = state
            .blocking(move |authority| authority.revoke(token_id, &reason, &issuer))
            .await?;
        Ok(Json(json!({
            "success": true,
            "message": "Credential revoked",
            "credential": credential,
        }))
        .into_response())
    }

    // =====================
    // Authorization Handlers
    // =====================

    /// POST /api/authorize
    async fn authorize_handler(
        State(state): State<Arc<ApiServer>>,
        ApiJson(payload): ApiJson<AuthorizeRequest>,
    ) -> ApiResult {
        let AuthorizeRequest { issuer, enabled, caller } = payload;
        let issuer_key = canonical_identity(&issuer);
        let is_authorized = state
            .blocking(move |authority| {
                authority.authorize(&caller, &issuer, enabled)?;
                authority.is_authorized(&issuer)
            })
            .await?;
        Ok(Json(json!({ "success": true, "issuer": issuer_key, "isAuthorized": is_authorized })).into_response())
    }

    /// GET /api/authorized/:issuer
    async fn authorized_handler(State(state): State<Arc<ApiServer>>, ApiPath(issuer): ApiPath<String>) -> ApiResult {
        let is_authorized = state.authority.is_authorized(&issuer)?;
        Ok(Json(json!({ "issuer": issuer, "isAuthorized": is_authorized })).into_response())
    }

    // =====================
    // Ledger Handlers
    // =====================

    /// Binds the authoritative ledger contract
    ///
    /// # Endpoint
    /// POST /api/update-contract
    ///
    /// # Responses
    /// - 200 OK: Binding stored; reachability is checked on the next read
    /// - 400 Bad Request: Malformed address, RPC URL or ABI
    async fn update_contract_handler(
        State(state): State<Arc<ApiServer>>,
        ApiJson(payload): ApiJson<UpdateContractRequest>,
    ) -> ApiResult {
        let rpc_url = payload
            .rpc_url
            .or_else(|| state.default_rpc_url.clone())
            .ok_or_else(|| AuthorityError::InvalidLedgerBinding("no RPC URL supplied or configured".into()))?;
        state.authority.bind_ledger(LedgerBinding {
            address: payload.address,
            rpc_url,
            abi: payload.abi,
        })?;
        Ok(Json(json!({ "success": true, "message": "Contract updated successfully" })).into_response())
    }

    /// GET /api/contract-info
    async fn contract_info_handler(State(state): State<Arc<ApiServer>>) -> ApiResult {
        let status = state.authority.ledger_status();
        let body = if status.configured {
            json!({
                "address": status.address,
                "network": status.rpc_url,
                "status": "deployed",
            })
        } else {
            json!({
                "address": null,
                "network": "Mock Mode",
                "status": "not_deployed",
                "message": "No ledger contract bound; credentials are served from the local store.",
            })
        };
        Ok(Json(body).into_response())
    }

    // =====================
    // Lookup Handlers
    // =====================

    /// GET /api/token-uri/:token_id
    async fn token_uri_handler(State(state): State<Arc<ApiServer>>, ApiPath(token_id): ApiPath<String>) -> ApiResult {
        let token_id = parse_token_id(&token_id)?;
        let uri = state.authority.token_uri(token_id).await?;
        Ok(Json(json!({ "tokenId": token_id, "uri": uri })).into_response())
    }

    /// Finds credentials issued for a document fingerprint
    ///
    /// # Endpoint
    /// GET /api/verify-document/:hash
    async fn verify_document_handler(
        State(state): State<Arc<ApiServer>>,
        ApiPath(hash): ApiPath<String>,
    ) -> ApiResult {
        let credentials = state.authority.credentials_for_document(&hash)?;
        Ok(Json(json!({
            "success": true,
            "documentHash": hash,
            "credentials": credentials,
        }))
        .into_response())
    }

    // =====================
    // System Handlers
    // =====================

    /// GET /api/health
    async fn health_handler(State(state): State<Arc<ApiServer>>) -> ApiResult {
        let status = state.authority.ledger_status();
        let credentials = state.authority.local_count()?;
        let (contract, mode) = if status.configured {
            ("deployed", "blockchain")
        } else {
            ("not_deployed", "mock")
        };
        Ok(Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "contract": contract,
            "mode": mode,
            "credentials": credentials,
        }))
        .into_response())
    }

    /// GET /api/audit-log
    async fn audit_log_handler(State(state): State<Arc<ApiServer>>) -> ApiResult {
        let logs = state.authority.audit().snapshot();
        Ok(Json(json!({ "logs": logs })).into_response())
    }
}

impl Clone for ApiServer {
    /// Creates a clone of the ApiServer sharing the same authority
    fn clone(&self) -> Self {
        ApiServer {
            authority: self.authority.clone(),
            default_rpc_url: self.default_rpc_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotFoundPolicy;
    use crate::services::audit::AuditTrail;
    use crate::services::fallback_resolver::FallbackResolver;
    use crate::storage::database::Database;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const ADMIN: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
    const UNIVERSITY: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
    const HOLDER: &str = "0x90f79bf6eb2c4f870365e785982e1f101e93b906";

    fn app() -> Router {
        let audit = Arc::new(AuditTrail::new(64));
        let resolver = FallbackResolver::new(Duration::from_millis(2000), NotFoundPolicy::Fallback, audit.clone());
        let db = Arc::new(Database::in_memory().unwrap());
        let authority = CredentialAuthority::open(db, ADMIN, resolver, audit, "https://ipfs.io/ipfs/").unwrap();
        ApiServer::new(Arc::new(authority), Some("http://127.0.0.1:9".into())).router()
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn issue_body(issuer: &str) -> Value {
        json!({
            "holderAddress": HOLDER.to_uppercase().replacen("0X", "0x", 1),
            "studentName": "Jane Doe",
            "degreeType": "Bachelor",
            "university": "State U",
            "documentHash": "QmTestHash123",
            "issuer": issuer,
        })
    }

    #[tokio::test]
    async fn test_issue_verify_revoke_flow() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/authorize",
            Some(json!({ "issuer": UNIVERSITY, "enabled": true, "caller": ADMIN })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isAuthorized"], true);

        let (status, body) = send(&app, "POST", "/api/issue-credential", Some(issue_body(UNIVERSITY))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tokenId"], 1);
        assert_eq!(body["credential"]["holderAddress"], HOLDER);
        assert_eq!(body["credential"]["fieldOfStudy"], "");

        let (status, body) = send(&app, "GET", "/api/credential/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credential"]["studentName"], "Jane Doe");
        assert_eq!(body["credential"]["isValid"], true);

        let (status, body) = send(
            &app,
            "POST",
            "/api/revoke-credential",
            Some(json!({ "tokenId": 1, "reason": "error", "issuer": UNIVERSITY })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credential"]["revocationReason"], "error");

        let (_, body) = send(&app, "GET", "/api/verify-credential/1", None).await;
        assert_eq!(body["credential"]["isValid"], false);
        assert_eq!(body["credential"]["isRevoked"], true);

        let (status, body) = send(
            &app,
            "POST",
            "/api/revoke-credential",
            Some(json!({ "tokenId": 1, "reason": "again", "issuer": UNIVERSITY })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "AlreadyRevoked");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_error_kinds_and_statuses() {
        let app = app();

        let (status, body) = send(&app, "POST", "/api/issue-credential", Some(issue_body(UNIVERSITY))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "NotAuthorizedIssuer");

        let mut missing_name = issue_body(ADMIN);
        missing_name.as_object_mut().unwrap().remove("studentName");
        let (status, body) = send(&app, "POST", "/api/issue-credential", Some(missing_name)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "EmptyStudentName");

        let (status, body) = send(&app, "GET", "/api/credential/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "CredentialNotFound");

        let (status, body) = send(&app, "GET", "/api/credential/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidTokenId");

        let (status, body) = send(&app, "GET", "/api/holder/0x1234", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidHolderAddress");

        let (status, body) = send(
            &app,
            "POST",
            "/api/authorize",
            Some(json!({ "issuer": UNIVERSITY, "enabled": true, "caller": UNIVERSITY })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_unknown_token_is_simply_invalid() {
        let app = app();
        let (status, body) = send(&app, "GET", "/api/valid/7", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isValid"], false);
    }

    #[tokio::test]
    async fn test_holder_listing_and_document_lookup() {
        let app = app();
        send(&app, "POST", "/api/issue-credential", Some(issue_body(ADMIN))).await;
        let mut second = issue_body(ADMIN);
        second["degreeType"] = json!("Master");
        second["documentHash"] = json!("QmTestHash456");
        send(&app, "POST", "/api/issue-credential", Some(second)).await;

        let (status, body) = send(&app, "GET", &format!("/api/student-credentials/{}", HOLDER), None).await;
        assert_eq!(status, StatusCode::OK);
        let credentials = body["credentials"].as_array().unwrap();
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[0]["tokenId"], 1);
        assert_eq!(credentials[1]["degreeType"], "Master");

        let (_, body) = send(&app, "GET", "/api/holder/0x1111111111111111111111111111111111111111", None).await;
        assert!(body["credentials"].as_array().unwrap().is_empty());

        let (_, body) = send(&app, "GET", "/api/verify-document/qmtesthash456", None).await;
        let matches = body["credentials"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["tokenId"], 2);

        let (_, body) = send(&app, "GET", "/api/token-uri/1", None).await;
        assert_eq!(body["uri"], "https://ipfs.io/ipfs/QmTestHash123");
    }

    #[tokio::test]
    async fn test_document_content_is_fingerprinted() {
        let app = app();
        let mut body = issue_body(ADMIN);
        body.as_object_mut().unwrap().remove("documentHash");
        body["document"] = json!(base64::encode(b"transcript"));
        let (status, response) = send(&app, "POST", "/api/issue-credential", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response["credential"]["documentHash"],
            crate::utils::crypto::document_fingerprint(b"transcript")
        );

        let mut bad = issue_body(ADMIN);
        bad.as_object_mut().unwrap().remove("documentHash");
        bad["document"] = json!("%%%");
        let (status, response) = send(&app, "POST", "/api/issue-credential", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "InvalidDocument");
    }

    #[tokio::test]
    async fn test_bind_ledger_and_fallback() {
        let app = app();
        send(&app, "POST", "/api/issue-credential", Some(issue_body(ADMIN))).await;

        let (_, info) = send(&app, "GET", "/api/contract-info", None).await;
        assert_eq!(info["status"], "not_deployed");

        let (status, body) = send(
            &app,
            "POST",
            "/api/update-contract",
            Some(json!({ "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, info) = send(&app, "GET", "/api/contract-info", None).await;
        assert_eq!(info["status"], "deployed");
        assert_eq!(info["network"], "http://127.0.0.1:9");

        let (status, body) = send(&app, "GET", "/api/credential/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["credential"]["studentName"], "Jane Doe");

        let (_, health) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(health["mode"], "blockchain");
        assert_eq!(health["credentials"], 1);

        let (_, audit) = send(&app, "GET", "/api/audit-log", None).await;
        let events: Vec<_> = audit["logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["event"].as_str().unwrap().to_string())
            .collect();
        assert!(events.contains(&"ledgerBound".to_string()));
        assert!(events.contains(&"ledgerFallback".to_string()));

        let (status, body) = send(&app, "POST", "/api/update-contract", Some(json!({ "address": "0x12" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidLedgerBinding");
    }

    #[tokio::test]
    async fn test_malformed_requests_get_structured_errors() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/revoke-credential",
            Some(json!({ "tokenId": 1, "reason": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "InvalidRequest");
        assert!(body["message"].as_str().unwrap().contains("issuer"));

        let (status, body) = send(
            &app,
            "POST",
            "/api/authorize",
            Some(json!({ "issuer": UNIVERSITY, "enabled": "yes", "caller": ADMIN })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidRequest");

        let request = Request::builder()
            .method("POST")
            .uri("/api/issue-credential")
            .body(Body::from("not json"))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "InvalidRequest");

        let (status, body) = send(&app, "GET", "/api/credential/%FF", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_issue_without_document_keeps_empty_hash() {
        let app = app();
        let mut body = issue_body(ADMIN);
        body.as_object_mut().unwrap().remove("documentHash");
        let (status, response) = send(&app, "POST", "/api/issue-credential", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["credential"]["documentHash"], "");

        let (_, body) = send(&app, "GET", "/api/token-uri/1", None).await;
        assert_eq!(body["uri"], "https://ipfs.io/ipfs/");
    }
}
