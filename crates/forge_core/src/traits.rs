use serde::{Deserialize, Serialize};
use std::fmt;

use crate::equation_engine::Expr;
use crate::rational::ExactRational;

/// Represents an ODE system `dx/dt = f(t, x)`.
pub trait OdeSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// state: current state
    /// out: buffer to write dx/dt into (same length as `state`)
    fn derivative(&self, t: f64, state: &[f64], out: &mut [f64]);
}

impl<S: OdeSystem + ?Sized> OdeSystem for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn derivative(&self, t: f64, state: &[f64], out: &mut [f64]) {
        (**self).derivative(t, state, out)
    }
}

/// A trait for solvers that can step a system forward by a fixed amount.
pub trait Steppable {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl OdeSystem, t: &mut f64, state: &mut [f64], dt: f64);
}

/// Constraint a declared parameter must satisfy before it may be serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Real,
    NonNegative,
    Positive,
}

impl ParameterKind {
    pub fn admits(self, value: &ExactRational) -> bool {
        match self {
            ParameterKind::Real => true,
            ParameterKind::NonNegative => !value.is_negative(),
            ParameterKind::Positive => value.is_positive(),
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::Real => write!(f, "a rational"),
            ParameterKind::NonNegative => write!(f, "non-negative"),
            ParameterKind::Positive => write!(f, "positive"),
        }
    }
}

/// One entry of a parameter manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDecl {
    pub name: &'static str,
    pub kind: ParameterKind,
}

impl ParameterDecl {
    pub const fn new(name: &'static str, kind: ParameterKind) -> Self {
        Self { name, kind }
    }
}

/// Systems whose parameters can be handed to the verifier.
///
/// Only the names listed in the manifest are ever read; nothing else about the
/// system is inspected.
pub trait ExactParameters {
    fn parameter_manifest(&self) -> &'static [ParameterDecl];

    /// Exact value of a declared parameter.
    fn parameter(&self, name: &str) -> Option<ExactRational>;
}

/// Systems that can describe their right-hand side symbolically.
pub trait SymbolicProvider {
    /// Identifier the verification engine dispatches on (e.g. `"decay"`).
    fn system_type(&self) -> &'static str;

    /// State variable names in state-vector order.
    fn state_variables(&self) -> &'static [&'static str];

    /// One `(variable, dx/dt)` pair per state variable. Parameters appear by
    /// name, never by value.
    fn build_symbolic_equations(&self) -> Vec<(String, Expr)>;
}
