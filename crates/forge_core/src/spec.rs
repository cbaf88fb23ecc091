use crate::error::SpecError;
use crate::rational::ExactRational;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Exact, serializable description of an ODE system.
///
/// Immutable once built; every equation key names a state variable and the
/// variable names are distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOdeSystemSpec", into = "RawOdeSystemSpec")]
pub struct OdeSystemSpec {
    system_type: String,
    state_variable_names: Vec<String>,
    parameters: BTreeMap<String, ExactRational>,
    symbolic_equations: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct RawOdeSystemSpec {
    system_type: String,
    state_dimension: usize,
    state_variables: Vec<String>,
    parameters: BTreeMap<String, ExactRational>,
    equations: BTreeMap<String, String>,
}

impl TryFrom<RawOdeSystemSpec> for OdeSystemSpec {
    type Error = SpecError;

    fn try_from(raw: RawOdeSystemSpec) -> Result<Self, Self::Error> {
        if raw.state_variables.len() != raw.state_dimension {
            return Err(SpecError::NameCountMismatch {
                expected: raw.state_dimension,
                actual: raw.state_variables.len(),
            });
        }
        OdeSystemSpec::new(
            raw.system_type,
            raw.state_variables,
            raw.parameters,
            raw.equations,
        )
    }
}

impl From<OdeSystemSpec> for RawOdeSystemSpec {
    fn from(spec: OdeSystemSpec) -> Self {
        Self {
            system_type: spec.system_type,
            state_dimension: spec.state_variable_names.len(),
            state_variables: spec.state_variable_names,
            parameters: spec.parameters,
            equations: spec.symbolic_equations,
        }
    }
}

impl OdeSystemSpec {
    pub fn new(
        system_type: impl Into<String>,
        state_variable_names: Vec<String>,
        parameters: BTreeMap<String, ExactRational>,
        symbolic_equations: BTreeMap<String, String>,
    ) -> Result<Self, SpecError> {
        let mut seen = HashSet::with_capacity(state_variable_names.len());
        for name in &state_variable_names {
            if !seen.insert(name.as_str()) {
                return Err(SpecError::DuplicateVariable(name.clone()));
            }
        }
        if let Some(stray) = symbolic_equations.keys().find(|k| !seen.contains(k.as_str())) {
            return Err(SpecError::UnknownEquationVariable(stray.clone()));
        }
        Ok(Self {
            system_type: system_type.into(),
            state_variable_names,
            parameters,
            symbolic_equations,
        })
    }

    pub fn system_type(&self) -> &str {
        &self.system_type
    }

    pub fn state_dimension(&self) -> usize {
        self.state_variable_names.len()
    }

    pub fn state_variable_names(&self) -> &[String] {
        &self.state_variable_names
    }

    pub fn parameters(&self) -> &BTreeMap<String, ExactRational> {
        &self.parameters
    }

    pub fn symbolic_equations(&self) -> &BTreeMap<String, String> {
        &self.symbolic_equations
    }
}

/// Closed time interval `[tmin, tmax]` with `tmin < tmax`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeInterval {
    tmin: ExactRational,
    tmax: ExactRational,
}

impl TimeInterval {
    pub fn new(tmin: ExactRational, tmax: ExactRational) -> Result<Self, SpecError> {
        if tmin >= tmax {
            return Err(SpecError::EmptyInterval {
                tmin: tmin.to_string(),
                tmax: tmax.to_string(),
            });
        }
        Ok(Self { tmin, tmax })
    }

    pub fn tmin(&self) -> &ExactRational {
        &self.tmin
    }

    pub fn tmax(&self) -> &ExactRational {
        &self.tmax
    }

    pub fn contains(&self, t: &ExactRational) -> bool {
        &self.tmin <= t && t <= &self.tmax
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    #[default]
    PicardLindelof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    pub timeout_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

/// One verification job: a system, an initial condition at `t0`, and the
/// interval to certify.
///
/// `t0` is not checked against the interval here; that is a domain question
/// the verification engine answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    system: OdeSystemSpec,
    t0: ExactRational,
    initial_condition: Vec<ExactRational>,
    time_interval: TimeInterval,
    proof_type: ProofType,
    config: RequestConfig,
}

impl VerificationRequest {
    pub fn new(
        system: OdeSystemSpec,
        t0: ExactRational,
        initial_condition: Vec<ExactRational>,
        time_interval: TimeInterval,
        proof_type: ProofType,
    ) -> Result<Self, SpecError> {
        if initial_condition.len() != system.state_dimension() {
            return Err(SpecError::InitialConditionMismatch {
                expected: system.state_dimension(),
                actual: initial_condition.len(),
            });
        }
        Ok(Self {
            system,
            t0,
            initial_condition,
            time_interval,
            proof_type,
            config: RequestConfig::default(),
        })
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    pub fn system(&self) -> &OdeSystemSpec {
        &self.system
    }

    pub fn t0(&self) -> &ExactRational {
        &self.t0
    }

    pub fn initial_condition(&self) -> &[ExactRational] {
        &self.initial_condition
    }

    pub fn time_interval(&self) -> &TimeInterval {
        &self.time_interval
    }

    pub fn proof_type(&self) -> ProofType {
        self.proof_type
    }

    pub fn config(&self) -> RequestConfig {
        self.config
    }
}
