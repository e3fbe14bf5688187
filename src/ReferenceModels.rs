//! # Reference Models
//!
//! ## Purpose
//! Small self-contained implementations of the chemistry and transport service contracts, so
//! the flame core can be run and tested without a detailed mechanism.
//!
//! ## Main Structures
//! - [`one_step_reactor::OneStepReactor`]: global one-step reaction `F + s O -> (1 + s) P` with an
//!   Arrhenius rate, constant species heat capacities and an analytic per-point Jacobian
//! - [`constant_lewis_transport::ConstantLewisTransport`]: power-law conductivity and viscosity,
//!   Fickian diffusion with fixed species Lewis numbers
pub mod constant_lewis_transport;
pub mod one_step_reactor;
