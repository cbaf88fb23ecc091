//! Engine side of the wire protocol: one request in, one result out.
//!
//! Checks run in a fixed order and stop at the first failure: JSON syntax,
//! request schema, exact rationals, then domain validation. Only a fully
//! decoded and validated request reaches the certificate computer.

use crate::certificate::{CertificateComputer, DecayCertificateInput, MarginPolicy, ValidationError};
use crate::protocol::{ErrorCode, VerificationResult};
use crate::rational::ExactRational;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct WireInitialCondition {
    t0: Value,
    x0: Value,
}

#[derive(Debug, Deserialize)]
struct WireInterval {
    tmin: Value,
    tmax: Value,
}

/// Fields this engine reads. Anything else in the request is ignored.
#[derive(Debug, Deserialize)]
struct WireRequest {
    system_type: String,
    initial_condition: WireInitialCondition,
    interval: WireInterval,
    parameters: BTreeMap<String, Value>,
}

fn decode_field(field: &str, value: &Value) -> Result<ExactRational, VerificationResult> {
    ExactRational::decode(value).map_err(|e| {
        VerificationResult::failure(
            ErrorCode::ParseError,
            "Invalid rational",
            format!("Invalid rational for `{field}`: {e}"),
        )
    })
}

fn validation_failure(err: ValidationError) -> VerificationResult {
    VerificationResult::failure(ErrorCode::ValidationError, "Validation failed", err.to_string())
}

fn scalar_initial_value(x0: &Value) -> Result<ExactRational, VerificationResult> {
    match x0 {
        Value::Array(values) if values.len() == 1 => decode_field("x0", &values[0]),
        Value::Array(values) => {
            for value in values {
                decode_field("x0", value)?;
            }
            Err(validation_failure(ValidationError {
                expected: "a one-dimensional initial value".to_string(),
                got: format!("{} values", values.len()),
            }))
        }
        other => decode_field("x0", other),
    }
}

fn decode_request(request: &WireRequest) -> Result<DecayCertificateInput, VerificationResult> {
    let t0 = decode_field("t0", &request.initial_condition.t0)?;
    let tmin = decode_field("tmin", &request.interval.tmin)?;
    let tmax = decode_field("tmax", &request.interval.tmax)?;
    let mut parameters = BTreeMap::new();
    for (name, value) in &request.parameters {
        parameters.insert(name.as_str(), decode_field(name, value)?);
    }
    let x0 = scalar_initial_value(&request.initial_condition.x0)?;

    if request.system_type != "decay" {
        return Err(validation_failure(ValidationError {
            expected: "system_type decay".to_string(),
            got: request.system_type.clone(),
        }));
    }
    let lambda = parameters.remove("lambda").ok_or_else(|| {
        let names: Vec<&str> = parameters.keys().copied().collect();
        validation_failure(ValidationError {
            expected: "parameter lambda".to_string(),
            got: format!("parameters [{}]", names.join(", ")),
        })
    })?;

    Ok(DecayCertificateInput {
        lambda,
        x0,
        t0,
        tmin,
        tmax,
    })
}

/// Answers one raw request. Never fails: every problem becomes a structured result.
pub fn handle(input: &[u8], policy: MarginPolicy) -> VerificationResult {
    let value: Value = match serde_json::from_slice(input) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "request is not JSON");
            return VerificationResult::failure(ErrorCode::ParseError, "Invalid JSON", e.to_string());
        }
    };
    let request: WireRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "request does not match schema");
            return VerificationResult::failure(
                ErrorCode::ParseError,
                "Invalid request",
                format!("Invalid schema: {e}"),
            );
        }
    };
    let input = match decode_request(&request) {
        Ok(input) => input,
        Err(result) => return result,
    };

    let computer = CertificateComputer::new(policy);
    match computer.certify(&input) {
        Err(err) => validation_failure(err),
        Ok(report) => {
            info!(
                feasible = report.feasible,
                lhs = %report.lhs,
                rhs = %report.rhs,
                ?policy,
                "certificate computed"
            );
            let summary = format!("L * h = {} <= a - r = {}", report.lhs, report.rhs);
            if report.feasible {
                VerificationResult::verified(
                    format!("Certificate verified: {summary}"),
                    report.certificate,
                )
            } else {
                VerificationResult::infeasible(
                    format!("Certificate infeasible: {summary} does not hold"),
                    report.certificate,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rat(num: i64, den: i64) -> Value {
        json!({ "num": num, "den": den })
    }

    fn request(t0: Value, tmin: Value, tmax: Value) -> Vec<u8> {
        json!({
            "system_type": "decay",
            "initial_condition": { "t0": t0, "x0": rat(5, 1) },
            "interval": { "tmin": tmin, "tmax": tmax },
            "parameters": { "lambda": rat(1, 1) },
        })
        .to_string()
        .into_bytes()
    }

    fn assert_failure(result: &VerificationResult, code: ErrorCode, needle: &str) {
        assert!(!result.success);
        assert_eq!(result.error_code, Some(code));
        assert!(result.certificate.is_none());
        let details = result.details.as_deref().unwrap_or_default();
        assert!(details.contains(needle), "expected '{needle}' in '{details}'");
    }

    #[test]
    fn reference_request_is_verified() {
        let result = handle(&request(rat(0, 1), rat(-1, 10), rat(1, 10)), MarginPolicy::Zero);
        assert!(result.success, "{result:?}");
        assert!(result.error_code.is_none());
        let certificate = result.certificate.expect("certificate");
        assert_eq!(certificate.a, ExactRational::from_integer(6));
        assert_eq!(certificate.rhs_bound, ExactRational::from_integer(11));
    }

    #[test]
    fn wide_interval_is_infeasible_not_an_error() {
        let result = handle(&request(rat(0, 1), rat(-1, 1), rat(1, 1)), MarginPolicy::IntervalHalfWidth);
        assert!(result.is_infeasible(), "{result:?}");
        assert!(result.is_well_formed());
        assert!(result.message.contains("infeasible"));
    }

    #[test]
    fn non_json_is_a_parse_error() {
        let result = handle(b"this is not json", MarginPolicy::Zero);
        assert_failure(&result, ErrorCode::ParseError, "expected");
    }

    #[test]
    fn missing_parameters_names_the_field() {
        let body = json!({
            "system_type": "decay",
            "initial_condition": { "t0": rat(0, 1), "x0": rat(5, 1) },
            "interval": { "tmin": rat(-1, 10), "tmax": rat(1, 10) },
        });
        let result = handle(body.to_string().as_bytes(), MarginPolicy::Zero);
        assert_failure(&result, ErrorCode::ParseError, "Invalid schema: missing field `parameters`");
    }

    #[test]
    fn float_rational_is_a_parse_error() {
        let result = handle(
            &request(json!({"num": 0.5, "den": 1}), rat(-1, 10), rat(1, 10)),
            MarginPolicy::Zero,
        );
        assert_failure(&result, ErrorCode::ParseError, "`t0`");
    }

    #[test]
    fn zero_denominator_is_a_parse_error() {
        let result = handle(&request(rat(0, 1), rat(-1, 0), rat(1, 10)), MarginPolicy::Zero);
        assert_failure(&result, ErrorCode::ParseError, "`tmin`");
    }

    #[test]
    fn t0_outside_interval_is_a_validation_error() {
        let result = handle(&request(rat(1, 5), rat(-1, 10), rat(1, 10)), MarginPolicy::Zero);
        assert_failure(
            &result,
            ErrorCode::ValidationError,
            "Expected t0 in [-1/10, 1/10], got t0 = 1/5",
        );
    }

    #[test]
    fn unsupported_system_is_a_validation_error() {
        let body = json!({
            "system_type": "lorenz",
            "initial_condition": { "t0": rat(0, 1), "x0": [rat(1, 1), rat(1, 1), rat(1, 1)] },
            "interval": { "tmin": rat(0, 1), "tmax": rat(1, 1) },
            "parameters": { "sigma": rat(10, 1) },
        });
        let result = handle(body.to_string().as_bytes(), MarginPolicy::Zero);
        assert_failure(&result, ErrorCode::ValidationError, "Expected");
    }

    #[test]
    fn missing_lambda_is_a_validation_error() {
        let body = json!({
            "system_type": "decay",
            "initial_condition": { "t0": rat(0, 1), "x0": rat(5, 1) },
            "interval": { "tmin": rat(-1, 10), "tmax": rat(1, 10) },
            "parameters": { "mu": rat(1, 1) },
        });
        let result = handle(body.to_string().as_bytes(), MarginPolicy::Zero);
        assert_failure(
            &result,
            ErrorCode::ValidationError,
            "Expected parameter lambda, got parameters [mu]",
        );
    }

    #[test]
    fn one_element_array_is_accepted_as_scalar() {
        let body = json!({
            "system_type": "decay",
            "state_variables": ["x"],
            "equations": { "x": "-lambda * x" },
            "proof_type": "picard_lindelof",
            "initial_condition": { "t0": rat(0, 1), "x0": [rat(5, 1)] },
            "interval": { "tmin": rat(-1, 10), "tmax": rat(1, 10) },
            "parameters": { "lambda": rat(1, 1) },
        });
        let result = handle(body.to_string().as_bytes(), MarginPolicy::Zero);
        assert!(result.success, "{result:?}");
    }
}
