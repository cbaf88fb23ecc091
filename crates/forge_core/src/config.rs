use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Step-control knobs shared by the integrators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub rtol: f64,
    pub atol: f64,
    /// First trial step; `0.0` picks one from the span.
    pub initial_step: f64,
    pub h_min: f64,
    /// Accepted plus rejected steps an adaptive attempt may take.
    pub max_steps: usize,
    /// Number of equal steps taken by fixed-step methods.
    pub fixed_steps: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            initial_step: 0.0,
            h_min: 1e-12,
            max_steps: 100_000,
            fixed_steps: 1_000,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            bail!("rtol must be finite and positive.");
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            bail!("atol must be finite and positive.");
        }
        if !self.initial_step.is_finite() || self.initial_step < 0.0 {
            bail!("initial_step must be finite and non-negative.");
        }
        if !self.h_min.is_finite() || self.h_min <= 0.0 {
            bail!("h_min must be finite and positive.");
        }
        if self.max_steps == 0 {
            bail!("max_steps must be greater than zero.");
        }
        if self.fixed_steps == 0 {
            bail!("fixed_steps must be greater than zero.");
        }
        Ok(())
    }

    pub(crate) fn first_step(&self, span: f64) -> f64 {
        if self.initial_step > 0.0 {
            self.initial_step.min(span)
        } else {
            (span * 1e-3).max(self.h_min).min(span)
        }
    }
}

/// How to launch the verification engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub executable: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Log every request, response and exit status at debug level.
    #[serde(default)]
    pub log_io: bool,
    /// Shown when the executable is missing.
    #[serde(default)]
    pub build_hint: Option<String>,
}

impl ClientConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            log_io: false,
            build_hint: None,
        }
    }

    /// Engine built inside a Lake project: `<dir>/.lake/build/bin/verify_decay`,
    /// run from the project root.
    pub fn lake_project(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(".lake").join("build").join("bin").join("verify_decay"))
            .with_working_dir(dir)
            .with_build_hint(format!(
                "Build it with `lake build verify_decay` in {}",
                dir.display()
            ))
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_log_io(mut self, enabled: bool) -> Self {
        self.log_io = enabled;
        self
    }

    pub fn with_build_hint(mut self, hint: impl Into<String>) -> Self {
        self.build_hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        assert!(
            err.to_string().contains(needle),
            "expected error containing '{needle}', got '{err}'"
        );
    }

    #[test]
    fn default_settings_are_valid() {
        assert!(SolverSettings::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut settings = SolverSettings::default();
        settings.rtol = 0.0;
        assert_err_contains(settings.validate(), "rtol");

        let mut settings = SolverSettings::default();
        settings.h_min = f64::NAN;
        assert_err_contains(settings.validate(), "h_min");

        let mut settings = SolverSettings::default();
        settings.max_steps = 0;
        assert_err_contains(settings.validate(), "max_steps");
    }

    #[test]
    fn first_step_scales_with_span() {
        let settings = SolverSettings::default();
        assert_eq!(settings.first_step(2.0), 2e-3);

        let settings = SolverSettings {
            initial_step: 5.0,
            ..SolverSettings::default()
        };
        assert_eq!(settings.first_step(1.0), 1.0);
    }

    #[test]
    fn lake_project_points_at_built_engine() {
        let config = ClientConfig::lake_project("/opt/proofs");
        assert_eq!(
            config.executable,
            PathBuf::from("/opt/proofs/.lake/build/bin/verify_decay")
        );
        assert_eq!(config.working_dir, Some(PathBuf::from("/opt/proofs")));
        assert!(config
            .build_hint
            .as_deref()
            .unwrap_or_default()
            .contains("lake build verify_decay"));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: SolverSettings =
            serde_json::from_str(r#"{"max_steps": 10}"#).expect("settings should parse");
        assert_eq!(settings.max_steps, 10);
        assert_eq!(settings.rtol, 1e-6);
    }
}
