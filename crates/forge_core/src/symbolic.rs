use crate::equation_engine::Expr;
use crate::traits::{OdeSystem, SymbolicProvider};
use std::collections::BTreeMap;

/// Owns a system and memoizes its symbolic equations.
///
/// The equations are built on first request and reused afterwards; the
/// wrapped system is only reachable by shared reference so the cache cannot
/// go stale.
#[derive(Debug, Clone)]
pub struct Symbolic<S> {
    system: S,
    cache: Option<BTreeMap<String, Expr>>,
}

impl<S: SymbolicProvider> Symbolic<S> {
    pub fn new(system: S) -> Self {
        Self {
            system,
            cache: None,
        }
    }

    pub fn symbolic_equations(&mut self) -> &BTreeMap<String, Expr> {
        let system = &self.system;
        self.cache
            .get_or_insert_with(|| system.build_symbolic_equations().into_iter().collect())
    }

    /// Equations in canonical infix form, keyed by state variable.
    pub fn equation_strings(&mut self) -> BTreeMap<String, String> {
        self.symbolic_equations()
            .iter()
            .map(|(name, expr)| (name.clone(), expr.to_string()))
            .collect()
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn into_inner(self) -> S {
        self.system
    }
}

impl<S: OdeSystem> OdeSystem for Symbolic<S> {
    fn dimension(&self) -> usize {
        self.system.dimension()
    }

    fn derivative(&self, t: f64, state: &[f64], out: &mut [f64]) {
        self.system.derivative(t, state, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::{Decay, Lorenz};
    use std::cell::Cell;

    struct Counting<'a> {
        builds: &'a Cell<usize>,
    }

    impl SymbolicProvider for Counting<'_> {
        fn system_type(&self) -> &'static str {
            "counting"
        }

        fn state_variables(&self) -> &'static [&'static str] {
            &["x"]
        }

        fn build_symbolic_equations(&self) -> Vec<(String, Expr)> {
            self.builds.set(self.builds.get() + 1);
            vec![("x".to_string(), Expr::var("x"))]
        }
    }

    #[test]
    fn equations_are_built_once() {
        let builds = Cell::new(0);
        let mut symbolic = Symbolic::new(Counting { builds: &builds });
        assert!(!symbolic.is_cached());
        symbolic.symbolic_equations();
        symbolic.symbolic_equations();
        symbolic.equation_strings();
        assert!(symbolic.is_cached());
        assert_eq!(builds.get(), 1);
    }

    #[test]
    fn equation_strings_are_keyed_by_variable() {
        let mut symbolic = Symbolic::new(Lorenz::default());
        let strings = symbolic.equation_strings();
        assert_eq!(strings.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(strings["x"], "sigma * (y - x)");
        assert_eq!(strings["y"], "x * (rho - z) - y");
        assert_eq!(strings["z"], "x * y - beta * z");
    }

    #[test]
    fn delegates_integration_to_wrapped_system() {
        let symbolic = Symbolic::new(Decay::default());
        let mut out = [0.0];
        symbolic.derivative(0.0, &[2.0], &mut out);
        assert_eq!(symbolic.dimension(), 1);
        assert_eq!(out, [-2.0]);
    }
}
