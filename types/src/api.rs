//! Wire types for the two HTTP endpoints.
//!
//! Login failures carry a machine-readable [`ErrorCode`] beside the human
//! message so clients branch on the code, never on message text.

use crate::record::DepositRecord;
use serde::{Deserialize, Serialize};

/// Multi-line prompt shown to users the verifier does not know about.
pub const NOT_REGISTERED_MESSAGE: &str = "\u{274c} Sorry, You are Not Registered!\n\
Please click the REGISTER button first and complete your registration using Register Here Button.\n\
After successful registration, come back and enter your Player ID.";

/// Prompt for users who registered but have not made a qualifying deposit.
/// The minimum is substituted by [`needs_deposit_message`].
pub const NEEDS_DEPOSIT_FORMAT: &str = "\u{2705} You have successfully completed registration!\n\
To unlock predictions, make a first deposit of at least ${min} and log in again.";

pub fn needs_deposit_message(minimum_usd: f64) -> String {
    NEEDS_DEPOSIT_FORMAT.replace("{min}", &format!("{minimum_usd:.2}"))
}

/// Machine-readable failure classification for `/verify-login`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No record exists for the identifier.
    NotRegistered,
    /// Record exists but no qualifying first deposit yet.
    NeedsDeposit,
    /// Request was malformed (missing identifier, unknown status).
    BadRequest,
    /// The record store is unreachable or not configured.
    StoreUnavailable,
}

/// Classification returned by the login verifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
    NotRegistered,
    RegisteredNoDeposit,
    Verified { redeposit_count: u64 },
}

/// Body of a successful `GET /verify-login`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyLoginResponse {
    pub success: bool,
    pub redeposit_count: u64,
}

/// Body of a failed `GET /verify-login` (and other error responses).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
        }
    }
}

/// Body of `GET /postback`. The request succeeds whether or not the event
/// crossed a threshold; `applied` says whether the record changed and
/// `record` echoes the post-event state for the postback testing tool.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackResponse {
    pub success: bool,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<DepositRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PostbackResponse {
    pub fn applied(record: DepositRecord) -> Self {
        Self {
            success: true,
            applied: true,
            record: Some(record),
            note: None,
        }
    }

    pub fn ignored(record: Option<DepositRecord>, note: impl Into<String>) -> Self {
        Self {
            success: true,
            applied: false,
            record,
            note: Some(note.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_serialize_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::NotRegistered).unwrap(),
            "\"NOT_REGISTERED\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::NeedsDeposit).unwrap(),
            "\"NEEDS_DEPOSIT\""
        );
    }

    #[test]
    fn needs_deposit_message_restates_minimum() {
        let message = needs_deposit_message(5.0);
        assert!(message.contains("$5.00"));
        assert!(message.contains("successfully completed registration"));
    }

    #[test]
    fn verify_response_round_trips() {
        let body = VerifyLoginResponse {
            success: true,
            redeposit_count: 3,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"redepositCount\":3"));
        let back: VerifyLoginResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.redeposit_count, 3);
    }
}
