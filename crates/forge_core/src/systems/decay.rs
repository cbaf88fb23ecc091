use crate::equation_engine::Expr;
use crate::rational::ExactRational;
use crate::traits::{
    ExactParameters, OdeSystem, ParameterDecl, ParameterKind, SymbolicProvider,
};

const MANIFEST: &[ParameterDecl] = &[ParameterDecl::new("lambda", ParameterKind::Positive)];

/// Exponential decay `dx/dt = -lambda * x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decay {
    lambda: ExactRational,
    rate: f64,
}

impl Decay {
    pub fn new(lambda: ExactRational) -> Self {
        let rate = lambda.to_f64();
        Self { lambda, rate }
    }

    pub fn lambda(&self) -> &ExactRational {
        &self.lambda
    }
}

impl Default for Decay {
    fn default() -> Self {
        Self::new(ExactRational::one())
    }
}

impl OdeSystem for Decay {
    fn dimension(&self) -> usize {
        1
    }

    fn derivative(&self, _t: f64, state: &[f64], out: &mut [f64]) {
        out[0] = -self.rate * state[0];
    }
}

impl ExactParameters for Decay {
    fn parameter_manifest(&self) -> &'static [ParameterDecl] {
        MANIFEST
    }

    fn parameter(&self, name: &str) -> Option<ExactRational> {
        match name {
            "lambda" => Some(self.lambda.clone()),
            _ => None,
        }
    }
}

impl SymbolicProvider for Decay {
    fn system_type(&self) -> &'static str {
        "decay"
    }

    fn state_variables(&self) -> &'static [&'static str] {
        &["x"]
    }

    fn build_symbolic_equations(&self) -> Vec<(String, Expr)> {
        vec![("x".to_string(), -Expr::var("lambda") * Expr::var("x"))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_uses_rate() {
        let decay = Decay::new(ExactRational::new(1, 2).unwrap());
        let mut out = [0.0];
        decay.derivative(0.0, &[4.0], &mut out);
        assert_eq!(out, [-2.0]);
    }

    #[test]
    fn symbolic_equation_is_canonical() {
        let equations = Decay::default().build_symbolic_equations();
        assert_eq!(equations.len(), 1);
        assert_eq!(equations[0].0, "x");
        assert_eq!(equations[0].1.to_string(), "-lambda * x");
    }

    #[test]
    fn manifest_exposes_only_lambda() {
        let decay = Decay::default();
        assert_eq!(decay.parameter_manifest().len(), 1);
        assert_eq!(decay.parameter("lambda"), Some(ExactRational::one()));
        assert_eq!(decay.parameter("rate"), None);
    }
}
