use crate::equation_engine::Expr;
use crate::rational::ExactRational;
use crate::traits::{
    ExactParameters, OdeSystem, ParameterDecl, ParameterKind, SymbolicProvider,
};

const MANIFEST: &[ParameterDecl] = &[
    ParameterDecl::new("sigma", ParameterKind::Real),
    ParameterDecl::new("rho", ParameterKind::Real),
    ParameterDecl::new("beta", ParameterKind::Real),
];

/// The Lorenz system.
#[derive(Debug, Clone, PartialEq)]
pub struct Lorenz {
    sigma: ExactRational,
    rho: ExactRational,
    beta: ExactRational,
    values: [f64; 3],
}

impl Lorenz {
    pub fn new(sigma: ExactRational, rho: ExactRational, beta: ExactRational) -> Self {
        let values = [sigma.to_f64(), rho.to_f64(), beta.to_f64()];
        Self {
            sigma,
            rho,
            beta,
            values,
        }
    }
}

impl Default for Lorenz {
    /// The classic chaotic regime `sigma = 10, rho = 28, beta = 8/3`.
    fn default() -> Self {
        Self::new(
            ExactRational::from_integer(10),
            ExactRational::from_integer(28),
            ExactRational::ratio(8, 3),
        )
    }
}

impl OdeSystem for Lorenz {
    fn dimension(&self) -> usize {
        3
    }

    fn derivative(&self, _t: f64, state: &[f64], out: &mut [f64]) {
        let [sigma, rho, beta] = self.values;
        let (x, y, z) = (state[0], state[1], state[2]);
        out[0] = sigma * (y - x);
        out[1] = x * (rho - z) - y;
        out[2] = x * y - beta * z;
    }
}

impl ExactParameters for Lorenz {
    fn parameter_manifest(&self) -> &'static [ParameterDecl] {
        MANIFEST
    }

    fn parameter(&self, name: &str) -> Option<ExactRational> {
        match name {
            "sigma" => Some(self.sigma.clone()),
            "rho" => Some(self.rho.clone()),
            "beta" => Some(self.beta.clone()),
            _ => None,
        }
    }
}

impl SymbolicProvider for Lorenz {
    fn system_type(&self) -> &'static str {
        "lorenz"
    }

    fn state_variables(&self) -> &'static [&'static str] {
        &["x", "y", "z"]
    }

    fn build_symbolic_equations(&self) -> Vec<(String, Expr)> {
        let (x, y, z) = (Expr::var("x"), Expr::var("y"), Expr::var("z"));
        vec![
            (
                "x".to_string(),
                Expr::var("sigma") * (y.clone() - x.clone()),
            ),
            (
                "y".to_string(),
                x.clone() * (Expr::var("rho") - z.clone()) - y.clone(),
            ),
            ("z".to_string(), x * y - Expr::var("beta") * z),
        ]
    }
}
