use crate::equation_engine::Expr;
use crate::rational::ExactRational;
use crate::traits::{ExactParameters, OdeSystem, ParameterDecl, SymbolicProvider};

/// `dy/dt = y^2`; from `y(0) = 1` the solution `1 / (1 - t)` blows up at `t = 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlowUp;

impl OdeSystem for BlowUp {
    fn dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: f64, state: &[f64], out: &mut [f64]) {
        out[0] = state[0] * state[0];
    }
}

impl ExactParameters for BlowUp {
    fn parameter_manifest(&self) -> &'static [ParameterDecl] {
        &[]
    }

    fn parameter(&self, _name: &str) -> Option<ExactRational> {
        None
    }
}

impl SymbolicProvider for BlowUp {
    fn system_type(&self) -> &'static str {
        "blow_up"
    }

    fn state_variables(&self) -> &'static [&'static str] {
        &["y"]
    }

    fn build_symbolic_equations(&self) -> Vec<(String, Expr)> {
        vec![("y".to_string(), Expr::var("y").pow(Expr::num(2.0)))]
    }
}
