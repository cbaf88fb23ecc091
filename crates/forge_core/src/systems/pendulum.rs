use crate::equation_engine::Expr;
use crate::rational::ExactRational;
use crate::traits::{
    ExactParameters, OdeSystem, ParameterDecl, ParameterKind, SymbolicProvider,
};

const MANIFEST: &[ParameterDecl] = &[
    ParameterDecl::new("length", ParameterKind::Positive),
    ParameterDecl::new("damping", ParameterKind::NonNegative),
    ParameterDecl::new("mass", ParameterKind::Positive),
    ParameterDecl::new("gravity", ParameterKind::NonNegative),
];

/// Damped pendulum in first-order form over `(theta, omega)`:
/// `theta' = omega`, `omega' = -(b/m) omega - (g/L) sin(theta)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DampedPendulum {
    length: ExactRational,
    damping: ExactRational,
    mass: ExactRational,
    gravity: ExactRational,
    // b/m and g/L
    friction: f64,
    restoring: f64,
}

impl DampedPendulum {
    pub fn new(
        length: ExactRational,
        damping: ExactRational,
        mass: ExactRational,
        gravity: ExactRational,
    ) -> Self {
        let friction = damping.to_f64() / mass.to_f64();
        let restoring = gravity.to_f64() / length.to_f64();
        Self {
            length,
            damping,
            mass,
            gravity,
            friction,
            restoring,
        }
    }
}

impl Default for DampedPendulum {
    fn default() -> Self {
        Self::new(
            ExactRational::from_integer(1),
            ExactRational::ratio(1, 5),
            ExactRational::from_integer(1),
            ExactRational::ratio(981, 100),
        )
    }
}

impl OdeSystem for DampedPendulum {
    fn dimension(&self) -> usize {
        2
    }

    fn derivative(&self, _t: f64, state: &[f64], out: &mut [f64]) {
        let (theta, omega) = (state[0], state[1]);
        out[0] = omega;
        out[1] = -self.friction * omega - self.restoring * theta.sin();
    }
}

impl ExactParameters for DampedPendulum {
    fn parameter_manifest(&self) -> &'static [ParameterDecl] {
        MANIFEST
    }

    fn parameter(&self, name: &str) -> Option<ExactRational> {
        match name {
            "length" => Some(self.length.clone()),
            "damping" => Some(self.damping.clone()),
            "mass" => Some(self.mass.clone()),
            "gravity" => Some(self.gravity.clone()),
            _ => None,
        }
    }
}

impl SymbolicProvider for DampedPendulum {
    fn system_type(&self) -> &'static str {
        "pendulum"
    }

    fn state_variables(&self) -> &'static [&'static str] {
        &["theta", "omega"]
    }

    fn build_symbolic_equations(&self) -> Vec<(String, Expr)> {
        let omega = Expr::var("omega");
        let friction = -(Expr::var("damping") / Expr::var("mass")) * omega.clone();
        let restoring =
            Expr::var("gravity") / Expr::var("length") * Expr::call("sin", Expr::var("theta"));
        vec![
            ("theta".to_string(), omega),
            ("omega".to_string(), friction - restoring),
        ]
    }
}
