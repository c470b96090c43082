// src/models/credential.rs
//! Academic credential data model.
//!
//! A credential is identified by a sequential token id and bound to a holder
//! address, an issuing university, and the fingerprint of the underlying
//! document. Records are immutable after issuance except for the revocation
//! flag, which only ever moves from `false` to `true`.

use serde::{Deserialize, Serialize};

/// Sequential credential identifier. The first issued credential is `1`.
pub type TokenId = u64;

/// An issued academic credential.
///
/// # Fields
/// - `token_id`: Assigned by the authority at issuance, never by the caller
/// - `holder_address`: Canonical (lowercase) chain address of the student
/// - `graduation_date` / `issued_at`: Epoch seconds
/// - `document_hash`: Fingerprint computed outside the authority
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token_id: TokenId,
    pub holder_address: String,
    pub student_name: String,
    pub degree_type: String,
    #[serde(default)]
    pub field_of_study: String,
    pub university: String,
    pub graduation_date: i64,
    pub document_hash: String,
    pub issued_at: i64,
    pub is_revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_reason: Option<String>,
}

impl Credential {
    /// A credential is valid while it has not been revoked.
    pub fn is_valid(&self) -> bool {
        !self.is_revoked
    }
}

/// Caller-supplied fields of an issuance request.
///
/// Optional fields are filled in by the authority: `field_of_study` defaults
/// to an empty string and `graduation_date` to the issuance time.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredential {
    pub holder_address: String,
    pub student_name: String,
    pub degree_type: String,
    #[serde(default)]
    pub field_of_study: Option<String>,
    pub university: String,
    #[serde(default)]
    pub graduation_date: Option<i64>,
    #[serde(default)]
    pub document_hash: String,
}

/// A credential together with its derived validity, as returned to verifiers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    #[serde(flatten)]
    pub credential: Credential,
    pub is_valid: bool,
}

impl From<Credential> for CredentialStatus {
    fn from(credential: Credential) -> Self {
        let is_valid = credential.is_valid();
        CredentialStatus { credential, is_valid }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        Credential {
            token_id: 1,
            holder_address: "0x1234567890123456789012345678901234567890".into(),
            student_name: "Jane Doe".into(),
            degree_type: "Bachelor".into(),
            field_of_study: String::new(),
            university: "State U".into(),
            graduation_date: 1_700_000_000,
            document_hash: "QmTestHash123".into(),
            issued_at: 1_700_000_100,
            is_revoked: false,
            revocation_reason: None,
        }
    }

    #[test]
    fn test_status_json_is_flat_camel_case() {
        let json = serde_json::to_value(CredentialStatus::from(sample())).unwrap();
        assert_eq!(json["tokenId"], 1);
        assert_eq!(json["studentName"], "Jane Doe");
        assert_eq!(json["isRevoked"], false);
        assert_eq!(json["isValid"], true);
        assert!(json.get("revocationReason").is_none());
    }

    #[test]
    fn test_revoked_credential_is_not_valid() {
        let mut credential = sample();
        credential.is_revoked = true;
        credential.revocation_reason = Some("error".into());
        let status = CredentialStatus::from(credential);
        assert!(!status.is_valid);
    }

    #[test]
    fn test_issue_request_optional_fields() {
        let request: IssueCredential = serde_json::from_str(
            r#"{"holderAddress":"0xabc","studentName":"A","degreeType":"B","university":"C"}"#,
        )
        .unwrap();
        assert!(request.field_of_study.is_none());
        assert!(request.graduation_date.is_none());
        assert_eq!(request.document_hash, "");
    }
}
