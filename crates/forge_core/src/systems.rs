//! Reference ODE systems with exact parameters.
//!
//! Each system keeps its parameters as [`ExactRational`]s for the verifier
//! and an `f64` copy for the integrators.
//!
//! [`ExactRational`]: crate::rational::ExactRational

mod blow_up;
mod decay;
mod lorenz;
mod pendulum;

pub use blow_up::BlowUp;
pub use decay::Decay;
pub use lorenz::Lorenz;
pub use pendulum::DampedPendulum;
