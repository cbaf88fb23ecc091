use crate::certificate::Certificate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParseError,
    ValidationError,
    TimeoutError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "PARSE_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one response a verification engine gives per request.
///
/// Three shapes are valid: verified (certificate, no error), infeasible
/// (`success = false`, certificate, no error) and failed (error code, no
/// certificate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
}

impl VerificationResult {
    pub fn verified(message: impl Into<String>, certificate: Certificate) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
            details: None,
            certificate: Some(certificate),
        }
    }

    /// The certificate was computed but its inequality does not hold.
    pub fn infeasible(message: impl Into<String>, certificate: Certificate) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: None,
            details: None,
            certificate: Some(certificate),
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: Some(code),
            details: Some(details.into()),
            certificate: None,
        }
    }

    /// False for responses mixing the success and error shapes.
    pub fn is_well_formed(&self) -> bool {
        match self.error_code {
            Some(_) => !self.success && self.certificate.is_none(),
            None => self.details.is_none(),
        }
    }

    pub fn is_infeasible(&self) -> bool {
        !self.success && self.error_code.is_none() && self.certificate.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::ExactRational;
    use serde_json::json;

    fn certificate() -> Certificate {
        Certificate {
            a: ExactRational::from_integer(6),
            r: ExactRational::zero(),
            rhs_bound: ExactRational::from_integer(11),
            lipschitz: ExactRational::one(),
        }
    }

    #[test]
    fn failure_serializes_every_protocol_field() {
        let result = VerificationResult::failure(ErrorCode::ParseError, "Invalid JSON", "EOF");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": false,
                "message": "Invalid JSON",
                "error_code": "PARSE_ERROR",
                "details": "EOF",
            })
        );
        assert!(result.is_well_formed());
    }

    #[test]
    fn verified_result_has_null_error_fields() {
        let value = serde_json::to_value(VerificationResult::verified("ok", certificate())).unwrap();
        assert_eq!(value["error_code"], json!(null));
        assert_eq!(value["details"], json!(null));
        assert_eq!(value["certificate"]["L"], json!({"num": 11, "den": 1}));
    }

    #[test]
    fn minimal_engine_response_parses() {
        let result: VerificationResult =
            serde_json::from_str(r#"{"success": true, "message": "Verified"}"#).unwrap();
        assert!(result.success);
        assert!(result.is_well_formed());
        assert!(!result.is_infeasible());
    }

    #[test]
    fn unknown_error_code_is_rejected() {
        let parsed = serde_json::from_str::<VerificationResult>(
            r#"{"success": false, "message": "x", "error_code": "OOPS"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn mixed_shapes_are_not_well_formed() {
        let mut result = VerificationResult::verified("ok", certificate());
        result.error_code = Some(ErrorCode::InternalError);
        assert!(!result.is_well_formed());

        let mut result = VerificationResult::failure(ErrorCode::TimeoutError, "slow", "10s");
        result.success = true;
        assert!(!result.is_well_formed());

        assert!(VerificationResult::infeasible("no", certificate()).is_infeasible());
    }
}
