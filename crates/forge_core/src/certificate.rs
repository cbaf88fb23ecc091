//! Picard-Lindelof style existence certificate for `dx/dt = -lambda * x`.
//!
//! With `a = |x0| + 1`, `L = lambda (2|x0| + 1)` bounding `|f|` on the ball
//! of radius `a` around `x0`, and `K = lambda` its Lipschitz constant, the
//! certificate closes on `[tmin, tmax]` when
//! `L * max(t0 - tmin, tmax - t0) <= a - r`.
//!
//! The margin `r` has two established readings and neither is canonical, so
//! callers pick one through [`MarginPolicy`]. The inequality is the contract
//! this module checks; it is not a machine-checked proof for every input.

use crate::rational::ExactRational;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the safety margin `r` is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarginPolicy {
    /// `r = 0`: the initial condition is fixed.
    Zero,
    /// `r = max(t0 - tmin, tmax - t0)`.
    IntervalHalfWidth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecayCertificateInput {
    pub lambda: ExactRational,
    pub x0: ExactRational,
    pub t0: ExactRational,
    pub tmin: ExactRational,
    pub tmax: ExactRational,
}

/// An out-of-domain input, reported before any constant is computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Expected {expected}, got {got}")]
pub struct ValidationError {
    pub expected: String,
    pub got: String,
}

impl ValidationError {
    fn new(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub a: ExactRational,
    pub r: ExactRational,
    #[serde(rename = "L")]
    pub rhs_bound: ExactRational,
    #[serde(rename = "K")]
    pub lipschitz: ExactRational,
}

/// Constants plus both sides of the feasibility inequality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateReport {
    pub certificate: Certificate,
    pub half_width: ExactRational,
    /// `L * half_width`
    pub lhs: ExactRational,
    /// `a - r`
    pub rhs: ExactRational,
    pub feasible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateComputer {
    policy: MarginPolicy,
}

impl CertificateComputer {
    pub fn new(policy: MarginPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MarginPolicy {
        self.policy
    }

    pub fn certify(&self, input: &DecayCertificateInput) -> Result<CertificateReport, ValidationError> {
        validate(input)?;

        let DecayCertificateInput {
            lambda,
            x0,
            t0,
            tmin,
            tmax,
        } = input;

        let one = ExactRational::one();
        let two = ExactRational::from_integer(2);
        let abs_x0 = x0.abs();

        let half_width = (t0 - tmin).max(tmax - t0);
        let a = &abs_x0 + &one;
        let r = match self.policy {
            MarginPolicy::Zero => ExactRational::zero(),
            MarginPolicy::IntervalHalfWidth => half_width.clone(),
        };
        let rhs_bound = lambda * &(&(&two * &abs_x0) + &one);
        let lipschitz = lambda.clone();

        let lhs = &rhs_bound * &half_width;
        let rhs = &a - &r;
        let feasible = lhs <= rhs;

        Ok(CertificateReport {
            certificate: Certificate {
                a,
                r,
                rhs_bound,
                lipschitz,
            },
            half_width,
            lhs,
            rhs,
            feasible,
        })
    }
}

fn validate(input: &DecayCertificateInput) -> Result<(), ValidationError> {
    let DecayCertificateInput {
        lambda,
        t0,
        tmin,
        tmax,
        ..
    } = input;
    // Messages show values in lowest terms whatever form they arrived in.
    let (lambda_r, t0_r, tmin_r, tmax_r) =
        (lambda.reduced(), t0.reduced(), tmin.reduced(), tmax.reduced());
    if tmin >= tmax {
        return Err(ValidationError::new(
            "tmin < tmax",
            format!("tmin = {tmin_r}, tmax = {tmax_r}"),
        ));
    }
    if t0 < tmin || t0 > tmax {
        return Err(ValidationError::new(
            format!("t0 in [{tmin_r}, {tmax_r}]"),
            format!("t0 = {t0_r}"),
        ));
    }
    if !lambda.is_positive() {
        return Err(ValidationError::new(
            "lambda > 0",
            format!("lambda = {lambda_r}"),
        ));
    }
    Ok(())
}
