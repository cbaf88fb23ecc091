use crate::solve::SolverAttempt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("Initial state dimension mismatch. Expected {expected}, got {actual}.")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid time span ({start}, {end}): start must be finite and before end.")]
    InvalidTimeSpan { start: f64, end: f64 },
    #[error("Invalid solver settings: {0}")]
    InvalidSettings(String),
    #[error("{}", convergence_message(.attempts))]
    Convergence { attempts: Vec<SolverAttempt> },
}

impl SolverError {
    /// Attempt history, empty unless integration was actually tried.
    pub fn attempts(&self) -> &[SolverAttempt] {
        match self {
            SolverError::Convergence { attempts } => attempts,
            _ => &[],
        }
    }
}

fn convergence_message(attempts: &[SolverAttempt]) -> String {
    let methods: Vec<String> = attempts.iter().map(|a| a.method.to_string()).collect();
    let causes: Vec<&str> = attempts
        .iter()
        .filter_map(|a| a.cause.as_deref())
        .collect();
    let subject = match methods.as_slice() {
        [] => "Solver".to_string(),
        [single] => single.clone(),
        many => format!("Both {}", many.join(" and ")),
    };
    if causes.is_empty() {
        format!("{subject} failed.")
    } else {
        format!("{subject} failed: {}", causes.join("; "))
    }
}

/// Construction errors for `OdeSystemSpec` and `VerificationRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("Expected {expected} state variable names, got {actual}.")]
    NameCountMismatch { expected: usize, actual: usize },
    #[error("Duplicate state variable `{0}`.")]
    DuplicateVariable(String),
    #[error("Equation given for `{0}`, which is not a state variable.")]
    UnknownEquationVariable(String),
    #[error("Expected tmin < tmax, got [{tmin}, {tmax}].")]
    EmptyInterval { tmin: String, tmax: String },
    #[error("Expected {expected} initial values, got {actual}.")]
    InitialConditionMismatch { expected: usize, actual: usize },
}
