//! Canonical wire encoding of systems and verification requests.
//!
//! Output is compact JSON with object keys in sorted order, so equal inputs
//! always produce byte-identical payloads.

use crate::error::SpecError;
use crate::rational::ExactRational;
use crate::spec::{OdeSystemSpec, VerificationRequest};
use crate::symbolic::Symbolic;
use crate::traits::{ExactParameters, ParameterKind, SymbolicProvider};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Declared parameter `{0}` has no value.")]
    MissingParameter(&'static str),
    #[error("Parameter `{name}` must be {kind}, got {value}.")]
    InvalidParameter {
        name: &'static str,
        kind: ParameterKind,
        value: String,
    },
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Reads exactly the parameters a system declares, checking each against its kind.
pub fn extract_parameters(
    system: &impl ExactParameters,
) -> Result<BTreeMap<String, ExactRational>, CodecError> {
    let mut parameters = BTreeMap::new();
    for decl in system.parameter_manifest() {
        let value = system
            .parameter(decl.name)
            .ok_or(CodecError::MissingParameter(decl.name))?;
        if !decl.kind.admits(&value) {
            return Err(CodecError::InvalidParameter {
                name: decl.name,
                kind: decl.kind,
                value: value.to_string(),
            });
        }
        parameters.insert(decl.name.to_string(), value);
    }
    Ok(parameters)
}

/// Snapshot of a live system as an exact spec.
pub fn spec_from_system<S>(symbolic: &mut Symbolic<S>) -> Result<OdeSystemSpec, CodecError>
where
    S: SymbolicProvider + ExactParameters,
{
    let parameters = extract_parameters(symbolic.system())?;
    let equations = symbolic.equation_strings();
    let system = symbolic.system();
    let names = system
        .state_variables()
        .iter()
        .map(|name| name.to_string())
        .collect();
    Ok(OdeSystemSpec::new(
        system.system_type(),
        names,
        parameters,
        equations,
    )?)
}

fn encode_parameters(parameters: &BTreeMap<String, ExactRational>) -> Value {
    Value::Object(
        parameters
            .iter()
            .map(|(name, value)| (name.clone(), value.encode()))
            .collect(),
    )
}

pub fn system_metadata(spec: &OdeSystemSpec) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("system_type".into(), json!(spec.system_type()));
    metadata.insert("state_dimension".into(), json!(spec.state_dimension()));
    metadata.insert("state_variables".into(), json!(spec.state_variable_names()));
    metadata.insert("parameters".into(), encode_parameters(spec.parameters()));
    metadata.insert("equations".into(), json!(spec.symbolic_equations()));
    metadata
}

pub fn to_wire(spec: &OdeSystemSpec) -> String {
    Value::Object(system_metadata(spec)).to_string()
}

/// Full request object: system metadata plus initial condition, interval
/// and proof type. `x0` is a bare rational for scalar systems, an array otherwise.
pub fn request_payload(request: &VerificationRequest) -> Value {
    let mut payload = system_metadata(request.system());

    let x0 = match request.initial_condition() {
        [single] => single.encode(),
        many => Value::Array(many.iter().map(ExactRational::encode).collect()),
    };
    payload.insert(
        "initial_condition".into(),
        json!({ "t0": request.t0().encode(), "x0": x0 }),
    );

    let interval = request.time_interval();
    payload.insert(
        "interval".into(),
        json!({ "tmin": interval.tmin().encode(), "tmax": interval.tmax().encode() }),
    );
    payload.insert("proof_type".into(), json!(request.proof_type()));

    Value::Object(payload)
}

pub fn request_to_wire(request: &VerificationRequest) -> String {
    request_payload(request).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ProofType, TimeInterval};
    use crate::systems::{DampedPendulum, Decay, Lorenz};
    use crate::traits::ParameterDecl;

    fn q(num: i64, den: i64) -> ExactRational {
        ExactRational::new(num, den).expect("non-zero denominator")
    }

    fn decay_request(x0: ExactRational) -> VerificationRequest {
        let spec = spec_from_system(&mut Symbolic::new(Decay::default())).unwrap();
        VerificationRequest::new(
            spec,
            q(0, 1),
            vec![x0],
            TimeInterval::new(q(-1, 10), q(1, 10)).unwrap(),
            ProofType::PicardLindelof,
        )
        .unwrap()
    }

    #[test]
    fn decay_spec_wire_form_is_canonical() {
        let spec = spec_from_system(&mut Symbolic::new(Decay::default())).unwrap();
        assert_eq!(
            to_wire(&spec),
            concat!(
                r#"{"equations":{"x":"-lambda * x"},"parameters":{"lambda":{"den":1,"num":1}},"#,
                r#""state_dimension":1,"state_variables":["x"],"system_type":"decay"}"#
            )
        );
    }

    #[test]
    fn wire_form_is_deterministic() {
        let first = spec_from_system(&mut Symbolic::new(Lorenz::default())).unwrap();
        let second = spec_from_system(&mut Symbolic::new(Lorenz::default())).unwrap();
        assert_eq!(to_wire(&first), to_wire(&second));
        assert!(to_wire(&first).contains(r#""beta":{"den":3,"num":8}"#));
    }

    #[test]
    fn wire_form_reparses_to_the_same_spec() {
        let spec = spec_from_system(&mut Symbolic::new(DampedPendulum::default())).unwrap();
        let back: OdeSystemSpec = serde_json::from_str(&to_wire(&spec)).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn request_carries_scalar_initial_value() {
        let payload = request_payload(&decay_request(q(5, 1)));
        assert_eq!(payload["initial_condition"]["x0"], json!({"num": 5, "den": 1}));
        assert_eq!(payload["initial_condition"]["t0"], json!({"num": 0, "den": 1}));
        assert_eq!(payload["interval"]["tmin"], json!({"num": -1, "den": 10}));
        assert_eq!(payload["proof_type"], json!("picard_lindelof"));
        assert_eq!(payload["parameters"]["lambda"], json!({"num": 1, "den": 1}));
    }

    #[test]
    fn request_keeps_huge_values_exact() {
        let big: ExactRational = "123456789012345678901234567890/7".parse().unwrap();
        let wire = request_to_wire(&decay_request(big));
        assert!(wire.contains(r#""x0":{"den":7,"num":123456789012345678901234567890}"#));
    }

    #[test]
    fn multi_dimensional_initial_condition_is_an_array() {
        let spec = spec_from_system(&mut Symbolic::new(Lorenz::default())).unwrap();
        let request = VerificationRequest::new(
            spec,
            q(0, 1),
            vec![q(1, 1), q(1, 1), q(1, 1)],
            TimeInterval::new(q(0, 1), q(1, 1)).unwrap(),
            ProofType::PicardLindelof,
        )
        .unwrap();
        let payload = request_payload(&request);
        assert_eq!(payload["initial_condition"]["x0"].as_array().map(Vec::len), Some(3));
    }

    struct Leaky;

    impl ExactParameters for Leaky {
        fn parameter_manifest(&self) -> &'static [ParameterDecl] {
            const MANIFEST: &[ParameterDecl] = &[
                ParameterDecl::new("rate", ParameterKind::Positive),
                ParameterDecl::new("offset", ParameterKind::Real),
            ];
            MANIFEST
        }

        fn parameter(&self, name: &str) -> Option<ExactRational> {
            match name {
                "rate" => Some(ExactRational::from_integer(-2)),
                _ => None,
            }
        }
    }

    #[test]
    fn extraction_enforces_declared_kinds() {
        let err = extract_parameters(&Leaky).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidParameter {
                name: "rate",
                kind: ParameterKind::Positive,
                value: "-2".to_string(),
            }
        );
        assert_eq!(err.to_string(), "Parameter `rate` must be positive, got -2.");
    }

    #[test]
    fn extraction_reports_missing_values() {
        struct Partial;
        impl ExactParameters for Partial {
            fn parameter_manifest(&self) -> &'static [ParameterDecl] {
                const MANIFEST: &[ParameterDecl] = &[ParameterDecl::new("offset", ParameterKind::Real)];
                MANIFEST
            }
            fn parameter(&self, _name: &str) -> Option<ExactRational> {
                None
            }
        }
        assert_eq!(
            extract_parameters(&Partial).unwrap_err(),
            CodecError::MissingParameter("offset")
        );
    }

    #[test]
    fn extraction_rejects_non_positive_decay_rate() {
        let decay = Decay::new(ExactRational::zero());
        assert!(matches!(
            extract_parameters(&decay),
            Err(CodecError::InvalidParameter { name: "lambda", .. })
        ));
    }
}
