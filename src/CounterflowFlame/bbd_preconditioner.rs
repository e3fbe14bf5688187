//! # Banded block-diagonal preconditioner
//!
//! ## Purpose
//! Approximates the Jacobian of the distributed residual by colored finite differences: every
//! column only influences the rows of the grid points within the convective stencil reach, so
//! columns `width` apart can be perturbed together and recovered from one residual evaluation.
//! The retained entries are projected onto an explicit block sparsity pattern and factored with
//! the distributed sparse direct solver.
//!
//! ## Main Structures
//! - `BlockCoupling`: which state variables of a neighbouring point a row depends on
//! - `BbdPreconditioner`: coloring parameters, the local CSR pattern, the band buffer and the
//!   solver handle
//!
//! ## Far columns
//! A premixed twin flame with infinite separation takes the oxidizer relative volume from the
//! last grid point, and the strain term of every momentum row reads it. The species and
//! temperature columns of the last point therefore reach every momentum row. They are kept out
//! of the coloring and differenced one at a time; every rank reads the response of its own rows.
//!
//! ## Band storage
//! The band buffer is an `ExtendedField` with one slot per (point, column state): column
//! `c = p * num_states + s` keeps the rows `i` with `|i - c| <= half_band` at
//! `s * band_width + (i - c + half_band)` of point `p`, so its halo exchange hands every rank the
//! columns of its neighbours' boundary points.
use crate::CounterflowFlame::flame_config::FlameType;
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_session::FlameSession;
use crate::CounterflowFlame::solver_callbacks::Preconditioner;
use crate::LinearAlgebra::sparse_direct::{
    CompressedPattern, DenseLuSolver, Orientation, RootGatheredSolver, SparseDirectSolver,
};
use crate::Parallel::domain_decomposition::DomainDecomposition;
use crate::Parallel::halo_exchange::{ExtendedField, exchange_halo};
use log::{error, info, warn};

/// Off-diagonal block coupling of the counterflow equations.
/// Point layout: `[Y_0..Y_{ns-1}, G, theta, U, P]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCoupling {
    pub num_species: usize,
    pub num_states: usize,
}

impl BlockCoupling {
    /// Does row variable `row` of point `q` depend on variable `col` of point `p`, `distance = |p - q|`?
    pub fn couples(&self, row: usize, col: usize, distance: usize) -> bool {
        let ns = self.num_species;
        let (mflux, temp, mom) = (ns, ns + 1, ns + 2);
        let thermo = col < ns || col == temp;
        match distance {
            0 => true,
            1 => {
                if row < ns || row == temp {
                    thermo
                } else if row == mflux {
                    thermo || col == mflux || col == mom
                } else if row == mom {
                    thermo || col == mom
                } else {
                    col == row
                }
            }
            2 => row == col && (row < ns || row == temp || row == mom),
            _ => false,
        }
    }
}

/// Local CSR rows (owned points) with global column indices.
/// `far_columns` are global columns every momentum row depends on besides its stencil.
pub fn coupling_pattern(
    coupling: BlockCoupling,
    decomposition: &DomainDecomposition,
    reach: usize,
    far_columns: &[usize],
) -> CompressedPattern {
    let nst = coupling.num_states;
    let mom = coupling.num_species + 2;
    let total_points = decomposition.num_total_points;
    let first = decomposition.first_global_point();
    let nrows = decomposition.num_local_points * nst;
    let mut outer_ptr = Vec::with_capacity(nrows + 1);
    let mut inner_idx = Vec::new();
    outer_ptr.push(0);
    for row in 0..nrows {
        let q = first + row / nst;
        let row_var = row % nst;
        let p_lo = q.saturating_sub(reach);
        let p_hi = (q + reach).min(total_points - 1);
        for p in p_lo..=p_hi {
            for col_var in 0..nst {
                if coupling.couples(row_var, col_var, p.abs_diff(q)) {
                    inner_idx.push(p * nst + col_var);
                }
            }
        }
        if row_var == mom {
            let row_start = outer_ptr[outer_ptr.len() - 1];
            for &c in far_columns {
                if !inner_idx[row_start..].contains(&c) {
                    inner_idx.push(c);
                }
            }
        }
        outer_ptr.push(inner_idx.len());
    }
    CompressedPattern {
        nrows,
        ncols: total_points * nst,
        outer_ptr,
        inner_idx,
        orientation: Orientation::RowMajor,
    }
}

pub struct BbdPreconditioner {
    num_states: usize,
    reach: usize,
    half_band: usize,
    band_width: usize,
    /// coloring width `2 * mkeep + 1`
    color_width: usize,
    alpha: f64,
    beta: f64,
    /// global columns differenced outside the coloring
    far_columns: Vec<usize>,
    /// `d row / d far_columns[m]` at `row * far_columns.len() + m`
    far_jacobian: Vec<f64>,
    pattern: CompressedPattern,
    jac_bnd: ExtendedField,
    values: Vec<f64>,
    solver: RootGatheredSolver,
}

impl BbdPreconditioner {
    pub fn new(session: &FlameSession) -> Self {
        Self::with_solver(session, Box::new(DenseLuSolver::new()))
    }

    /// Same as `new` with another serial solver behind the root-gathered factorization
    pub fn with_solver(session: &FlameSession, solver: Box<dyn SparseDirectSolver>) -> Self {
        let nst = session.num_states;
        let ns = session.num_species;
        let reach = session.scheme.reach();
        let half_band = (reach + 1) * nst - 1;
        let band_width = 2 * half_band + 1;
        let independent = (2 * reach + 1) * nst;
        let mkeep = session.config.num_off_diagonals.unwrap_or(independent / 2);
        let color_width = 2 * mkeep + 1;
        if color_width < independent && session.decomposition.is_first_rank() {
            warn!(
                "BBD: {} off-diagonals give a coloring width of {}, columns closer than {} interfere",
                mkeep, color_width, independent
            );
        }
        let coupling = BlockCoupling {
            num_species: session.num_species,
            num_states: nst,
        };
        let far_columns: Vec<usize> =
            if session.flame_type == FlameType::PremixedTwin && !session.config.finite_separation {
                let last = (session.grid.num_points() - 1) * nst;
                (0..ns).chain([ns + 1]).map(|s| last + s).collect()
            } else {
                Vec::new()
            };
        let pattern = coupling_pattern(coupling, &session.decomposition, reach, &far_columns);
        let dd = &session.decomposition;
        let jac_bnd = ExtendedField::new(dd.num_local_points, dd.nover, nst * band_width);
        if dd.is_first_rank() {
            info!(
                "BBD preconditioner: reach {}, coloring width {}, {} local nonzeros processed!",
                reach,
                color_width,
                pattern.nnz()
            );
        }
        Self {
            num_states: nst,
            reach,
            half_band,
            band_width,
            color_width,
            alpha: session.config.perturbation_relative,
            beta: session.config.perturbation_absolute,
            far_jacobian: vec![0.0; session.local_length() * far_columns.len()],
            far_columns,
            values: vec![0.0; pattern.nnz()],
            pattern,
            jac_bnd,
            solver: RootGatheredSolver::new(solver),
        }
    }

    pub fn pattern(&self) -> &CompressedPattern {
        &self.pattern
    }

    /// Projected Jacobian values of the owned rows, in pattern order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn difference_and_factor(
        &mut self,
        session: &mut FlameSession,
        state: &[f64],
    ) -> Result<(), FlameError> {
        let nst = self.num_states;
        let first_point = session.decomposition.first_global_point();
        let first_state = session.first_global_state();
        let local_states = session.local_length();
        let total_states = session.grid.num_points() * nst;

        let mut residual = vec![0.0; local_states];
        session.residual(state, &mut residual)?;
        let base_residual = residual.clone();
        let baseline = session.work.rhs_ext.clone();
        let mut perturbed = state.to_vec();
        self.jac_bnd.fill(0.0);
        let far_columns = &self.far_columns;
        // perturbation alpha * |y| + beta, positive whatever the sign of y
        let step = |y: f64| y + self.alpha * y.abs() + self.beta;

        for group in 0..self.color_width {
            let owned = (group..total_states)
                .step_by(self.color_width)
                .filter(|c| (first_state..first_state + local_states).contains(c))
                .filter(|c| !far_columns.contains(c));
            for c in owned.clone() {
                let local = c - first_state;
                perturbed[local] = step(state[local]);
            }
            // every rank evaluates, owned columns or not
            session.residual(&perturbed, &mut residual)?;
            for c in owned {
                let local = c - first_state;
                let delta = perturbed[local] - state[local];
                let (p, s) = (c / nst, c % nst);
                let p_local = p as isize - first_point as isize;
                let rows_lo = p.saturating_sub(self.reach) * nst;
                let rows_hi = ((p + self.reach + 1) * nst).min(total_states);
                for i in rows_lo..rows_hi {
                    let q_local = (i / nst) as isize - first_point as isize;
                    let derivative = (session.work.rhs_ext.at(q_local, i % nst)
                        - baseline.at(q_local, i % nst))
                        / delta;
                    self.jac_bnd
                        .set(p_local, s * self.band_width + (i + self.half_band - c), derivative);
                }
                perturbed[local] = state[local];
            }
        }
        exchange_halo(session.comm(), &mut self.jac_bnd)?;

        let num_far = far_columns.len();
        for (m, &c) in far_columns.iter().enumerate() {
            let owner = session.decomposition.owner_of_point(c / nst);
            let owned = (first_state..first_state + local_states).contains(&c);
            let mut delta = [0.0];
            if owned {
                let local = c - first_state;
                perturbed[local] = step(state[local]);
                delta[0] = perturbed[local] - state[local];
            }
            session.residual(&perturbed, &mut residual)?;
            session.comm().broadcast(&mut delta, owner)?;
            for i in 0..local_states {
                self.far_jacobian[i * num_far + m] = (residual[i] - base_residual[i]) / delta[0];
            }
            if owned {
                perturbed[c - first_state] = state[c - first_state];
            }
        }

        for (pos, row, col) in self.pattern.entries() {
            if let Some(m) = far_columns.iter().position(|&f| f == col) {
                self.values[pos] = self.far_jacobian[row * num_far + m];
                continue;
            }
            let i = first_state + row;
            let p_local = (col / nst) as isize - first_point as isize;
            let slot = (col % nst) * self.band_width + (i + self.half_band - col);
            self.values[pos] = self.jac_bnd.at(p_local, slot);
        }

        let factored = if self.solver.is_first_factor() {
            self.solver
                .factor_new_pattern(session.comm(), &self.pattern, &self.values)
        } else {
            self.solver.factor_same_pattern(session.comm(), &self.values)
        };
        let factored = factored.map_err(|e| match e {
            FlameError::Factorization { status, .. } if status > 0 => {
                let point = (status as usize - 1) / nst;
                let z = session.grid.position(point);
                if session.decomposition.is_first_rank() {
                    error!(
                        "BBD factorization failed at grid point {} (z = {:.6e} m), status {}",
                        point, z, status
                    );
                }
                FlameError::Factorization {
                    point: Some(point),
                    z: Some(z),
                    status,
                }
            }
            other => other,
        });
        // leave the work buffers of the unperturbed state behind
        session.residual(state, &mut residual)?;
        factored
    }
}

impl Preconditioner for BbdPreconditioner {
    fn setup(&mut self, session: &mut FlameSession, state: &[f64]) -> Result<(), FlameError> {
        session.check_length("state", state.len())?;
        let exchange = session.exchange_residual_halo;
        session.exchange_residual_halo = true;
        let result = self.difference_and_factor(session, state);
        session.exchange_residual_halo = exchange;
        result
    }

    fn solve(&mut self, session: &FlameSession, rhs: &mut [f64]) -> Result<(), FlameError> {
        session.check_length("right-hand side", rhs.len())?;
        self.solver.solve(session.comm(), rhs)
    }

    fn invalidate_pattern(&mut self) {
        self.solver.reset();
    }
}
