use crate::config::SolverSettings;
use crate::error::SolverError;
use crate::solvers::{integrate_fixed, rk45, sdirk2, IntegrationFailure, Trajectory, RK4};
use crate::traits::OdeSystem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Integration algorithms `solve` can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "RK4")]
    Rk4,
    #[serde(rename = "RK45")]
    Rk45,
    #[serde(rename = "SDIRK2")]
    Sdirk2,
}

impl Method {
    /// Implicit, L-stable; the only method fallback ever switches to.
    pub const ROBUST_DEFAULT: Method = Method::Sdirk2;

    pub fn name(self) -> &'static str {
        match self {
            Method::Rk4 => "RK4",
            Method::Rk45 => "RK45",
            Method::Sdirk2 => "SDIRK2",
        }
    }

    fn run(
        self,
        system: &impl OdeSystem,
        (t0, t1): (f64, f64),
        y0: &[f64],
        settings: &SolverSettings,
    ) -> Result<Trajectory, IntegrationFailure> {
        match self {
            Method::Rk4 => {
                let mut stepper = RK4::new(y0.len());
                integrate_fixed(&mut stepper, system, t0, t1, y0, settings.fixed_steps)
            }
            Method::Rk45 => rk45(system, t0, t1, y0, settings),
            Method::Sdirk2 => sdirk2(system, t0, t1, y0, settings),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RK4" => Ok(Method::Rk4),
            "RK45" => Ok(Method::Rk45),
            "SDIRK2" => Ok(Method::Sdirk2),
            _ => Err(format!("Unknown integration method '{s}'. Expected RK4, RK45 or SDIRK2.")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// Diagnostic record of one integration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverAttempt {
    pub method: Method,
    pub outcome: AttemptOutcome,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub t: Vec<f64>,
    pub y: Vec<Vec<f64>>,
    /// Method that produced the samples.
    pub method: Method,
    pub attempts: Vec<SolverAttempt>,
}

impl Solution {
    pub fn fell_back(&self) -> bool {
        self.attempts.len() > 1
    }
}

/// Integrates with default settings. See [`solve_with`].
pub fn solve(
    system: &impl OdeSystem,
    time_span: (f64, f64),
    initial_state: &[f64],
    method: Method,
    auto_fallback: bool,
) -> Result<Solution, SolverError> {
    solve_with(
        system,
        time_span,
        initial_state,
        method,
        auto_fallback,
        &SolverSettings::default(),
    )
}

/// Integrates over `time_span`, retrying once with [`Method::ROBUST_DEFAULT`]
/// when `auto_fallback` is set and the requested method is not already it.
pub fn solve_with(
    system: &impl OdeSystem,
    time_span: (f64, f64),
    initial_state: &[f64],
    method: Method,
    auto_fallback: bool,
    settings: &SolverSettings,
) -> Result<Solution, SolverError> {
    let (start, end) = time_span;
    if !start.is_finite() || !end.is_finite() || start >= end {
        return Err(SolverError::InvalidTimeSpan { start, end });
    }
    let dim = system.dimension();
    if initial_state.len() != dim {
        return Err(SolverError::DimensionMismatch {
            expected: dim,
            actual: initial_state.len(),
        });
    }
    settings
        .validate()
        .map_err(|e| SolverError::InvalidSettings(e.to_string()))?;

    info!(%method, dim, start, end, "integrating");

    let mut attempts = Vec::with_capacity(2);
    let mut current = method;
    loop {
        match current.run(system, time_span, initial_state, settings) {
            Ok(trajectory) => {
                attempts.push(SolverAttempt {
                    method: current,
                    outcome: AttemptOutcome::Success,
                    cause: None,
                });
                info!(
                    method = %current,
                    samples = trajectory.t.len(),
                    "integration succeeded"
                );
                return Ok(Solution {
                    t: trajectory.t,
                    y: trajectory.y,
                    method: current,
                    attempts,
                });
            }
            Err(failure) => {
                attempts.push(SolverAttempt {
                    method: current,
                    outcome: AttemptOutcome::Failure,
                    cause: Some(failure.to_string()),
                });
                if auto_fallback && current != Method::ROBUST_DEFAULT && attempts.len() == 1 {
                    warn!(
                        failed = %current,
                        fallback = %Method::ROBUST_DEFAULT,
                        cause = %failure,
                        "integration failed, retrying with robust default"
                    );
                    current = Method::ROBUST_DEFAULT;
                    continue;
                }
                return Err(SolverError::Convergence { attempts });
            }
        }
    }
}
