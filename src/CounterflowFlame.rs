//! # Counterflow Flame Module
//!
//! ## Purpose
//! Steady one-dimensional counterflow flame (diffusion, premixed twin and premixed single)
//! on a grid distributed over the ranks of a [`crate::Parallel::communicator::Communicator`].
//! The module computes the discretized residual of the species, mass flux, energy, momentum and
//! pressure-curvature equations and provides two preconditioners for a Newton–Krylov solver.
//! Chemistry and transport are external services behind [`flame_services`].
//!
//! ## Main Structures
//! - [`flame_config::FlameConfig`]: serde configuration, integer selectors and defaults
//! - [`flame_session::FlameSession`]: the per-rank context every callback works on
//! - [`residual`]: steady residual assembly (convection, diffusion, chemistry, boundaries)
//! - [`boundary_conditions`]: ghost-point policy for each flame type and separation
//! - [`convective_scheme`]: first/second order upwind and centered stencils on nonuniform grids
//! - [`diagnostics::FlameDiagnostics`]: flame speed, strain rate, peak temperature, thickness
//! - [`bbd_preconditioner::BbdPreconditioner`]: colored finite-difference banded Jacobian,
//!   factored with a distributed sparse direct solver
//! - [`af_preconditioner::AfPreconditioner`]: point chemistry blocks times per-variable
//!   tridiagonal transport operators
//! - [`solver_callbacks::FlameSystem`]: integer-status callbacks for the nonlinear solver
//!
//! ## State layout
//! Per grid point `[Y_0 .. Y_{ns-1}, G, theta, U, (P)]`: species mass fractions, axial mass
//! flux, temperature scaled by the reference temperature, scaled radial momentum and, for finite
//! separation only, the pressure curvature. Points are stored contiguously in rank order.
pub mod af_preconditioner;
pub mod bbd_preconditioner;
pub mod boundary_conditions;
pub mod convective_scheme;
pub mod diagnostics;
pub mod flame_config;
pub mod flame_errors;
pub mod flame_grid;
pub mod flame_services;
pub mod flame_session;
pub mod residual;
pub mod solver_callbacks;

#[cfg(test)]
mod flame_test_utils;
#[cfg(test)]
mod preconditioner_tests;
#[cfg(test)]
mod residual_tests;
