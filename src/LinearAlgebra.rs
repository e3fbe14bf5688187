//! # Linear Algebra Module
//!
//! Direct solvers behind the two preconditioners.
//!
//! - [`sparse_direct`]: compressed sparsity patterns, the sparse direct solver contract
//!   (`factor_new_pattern` / `factor_same_pattern` / `solve`), a dense LU implementation of
//!   that contract built on `nalgebra`, and a distributed wrapper that gathers the rows owned
//!   by every rank to rank 0.
//! - [`banded_lu`]: banded LU with partial pivoting in LAPACK band storage, used for the
//!   per-variable tridiagonal transport operators.
pub mod banded_lu;
pub mod sparse_direct;
