//! The `forge_core` crate describes ODE systems exactly and hands them to
//! external verification engines, while still being able to integrate them
//! numerically.
//!
//! Key components:
//! - **Rational**: `ExactRational`, the arbitrary-precision number every wire value uses.
//! - **Systems**: reference ODEs exposing exact parameters and symbolic equations.
//! - **Codec**: canonical JSON for system specs and verification requests.
//! - **Solve**: RK4, RK45 and SDIRK2 integration with one automatic fallback.
//! - **Certificate / Engine**: the decay existence certificate and the engine side of the protocol.
//! - **Client**: subprocess bridge to an external verification engine.
pub mod certificate;
pub mod client;
pub mod codec;
pub mod config;
pub mod engine;
pub mod equation_engine;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod rational;
pub mod solve;
pub mod solvers;
pub mod spec;
pub mod symbolic;
pub mod systems;
pub mod traits;
