//! # Approximate factorization preconditioner
//!
//! ## Purpose
//! Splits the Jacobian into a point-local chemistry part `C` and a transport part `T` that only
//! couples equal variables of neighbouring points:
//! `P = (C - cI) (I + (T + cI) D^-1)`, `D = diag(C - cI)`, so the transport columns are scaled
//! by the chemistry diagonal of their own point.
//! The chemistry blocks are factored point by point. The transport factor is tridiagonal per
//! state variable; its variables are spread over the ranks, each owner gathers the full grid of
//! its variables and factors them with a banded LU.
//!
//! ## Main Structures
//! - `AfPreconditioner`: per-point chemistry solvers and values, transport bands and the banded
//!   factors owned by this rank
//!
//! ## Band layout
//! `band[(k * num_local_points + j) * 3 + s]` holds, for variable `k` and column `j`, the entries
//! `A(j-1, j)` (s = 0), `A(j, j)` (s = 1) and `A(j+1, j)` (s = 2).
use crate::CounterflowFlame::flame_errors::{FlameError, agree_on_failure};
use crate::CounterflowFlame::flame_session::FlameSession;
use crate::CounterflowFlame::solver_callbacks::Preconditioner;
use crate::LinearAlgebra::banded_lu::{BandedLu, BandedMatrix};
use crate::LinearAlgebra::sparse_direct::{
    CompressedPattern, DenseLuSolver, SolverStatus, SparseDirectSolver,
};
use log::{debug, error, info};

pub struct AfPreconditioner {
    num_species: usize,
    num_states: usize,
    num_local_points: usize,
    shift: f64,
    chemistry_pattern: CompressedPattern,
    diagonal: Vec<usize>,
    chemistry_solvers: Vec<Box<dyn SparseDirectSolver>>,
    /// values of the last chemistry factorization, point-major
    chemistry_values: Vec<f64>,
    setups: usize,
    force_refresh: bool,
    states_per_rank: usize,
    band: Vec<f64>,
    /// banded factors of the variables owned by this rank, indexed by variable
    transport_factors: Vec<Option<BandedLu>>,
}

fn factorization_error(session: &FlameSession, point: usize, status: SolverStatus) -> FlameError {
    FlameError::Factorization {
        point: Some(point),
        z: Some(session.grid.position(point)),
        status: status.0,
    }
}

impl AfPreconditioner {
    pub fn new(session: &FlameSession) -> Result<Self, FlameError> {
        let nst = session.num_states;
        let nlocal = session.num_local_points();
        let chemistry_pattern = session.reactor.jacobian_pattern().clone();
        if chemistry_pattern.nrows != nst || chemistry_pattern.ncols != nst {
            return Err(FlameError::Dimension(format!(
                "chemistry Jacobian is {}x{}, points carry {} states",
                chemistry_pattern.nrows, chemistry_pattern.ncols, nst
            )));
        }
        let diagonal = chemistry_pattern.diagonal_positions().ok_or_else(|| {
            FlameError::Configuration("chemistry Jacobian pattern lacks a diagonal entry".into())
        })?;
        let size = session.comm().size();
        let states_per_rank = nst.div_ceil(size);
        let chemistry_solvers = (0..nlocal)
            .map(|_| Box::new(DenseLuSolver::new()) as Box<dyn SparseDirectSolver>)
            .collect();
        if session.decomposition.is_first_rank() {
            info!(
                "AF preconditioner: shift {:e}, {} variables per rank, chemistry blocks with {} nonzeros processed!",
                session.config.af_shift,
                states_per_rank,
                chemistry_pattern.nnz()
            );
        }
        Ok(Self {
            num_species: session.num_species,
            num_states: nst,
            num_local_points: nlocal,
            shift: session.config.af_shift,
            chemistry_values: vec![0.0; nlocal * chemistry_pattern.nnz()],
            chemistry_pattern,
            diagonal,
            chemistry_solvers,
            setups: 0,
            force_refresh: true,
            states_per_rank,
            band: vec![0.0; nst * nlocal * 3],
            transport_factors: (0..nst).map(|_| None).collect(),
        })
    }

    /// `I + (T + cI) D^-1` of the owned columns after the last setup, in band layout
    pub fn transport_band(&self) -> &[f64] {
        &self.band
    }

    /// rank owning the banded factor of state variable `k`
    pub fn owner_of_variable(&self, k: usize) -> usize {
        k / self.states_per_rank
    }

    fn factor_chemistry(&mut self, session: &FlameSession, state: &[f64]) -> Result<(), FlameError> {
        let config = &session.config;
        let refresh = self.force_refresh
            || !config.store_jacobian
            || self.setups % config.chemistry_refresh_interval == 0;
        self.setups += 1;
        if !refresh {
            debug!("AF: reusing the stored chemistry factorizations");
            return Ok(());
        }
        let ns = self.num_species;
        let nst = self.num_states;
        let nnz = self.chemistry_pattern.nnz();
        let last_point = session.grid.num_points() - 1;
        for j in 0..self.num_local_points {
            let jglobal = session.decomposition.global_index(j);
            let fix_temperature = jglobal == last_point || session.fixed_temperature.is_some();
            let values = &mut self.chemistry_values[j * nnz..(j + 1) * nnz];
            session.reactor.jacobian_steady(
                &state[j * nst..(j + 1) * nst],
                &session.work.rhs_conv[j * nst..(j + 1) * nst],
                fix_temperature,
                config.ref_momentum,
                &session.step_limiter,
                values,
            );
            if let Some(pseudo) = &session.pseudo_unsteady {
                for k in (0..ns).chain([ns + 1, ns + 2]) {
                    values[self.diagonal[k]] -= 1.0 / pseudo.dt;
                }
            }
            for &d in &self.diagonal {
                values[d] -= self.shift;
            }
            let solver = &mut self.chemistry_solvers[j];
            let factored = if solver.is_first_factor() {
                solver.factor_new_pattern(&self.chemistry_pattern, values)
            } else {
                solver.factor_same_pattern(values)
            };
            if let Err(status) = factored {
                let err = factorization_error(session, jglobal, status);
                error!("AF chemistry block: {}", err);
                self.force_refresh = true;
                return Err(err);
            }
        }
        self.force_refresh = false;
        Ok(())
    }

    fn assemble_transport(&mut self, session: &FlameSession, state: &[f64]) {
        let ns = self.num_species;
        let nst = self.num_states;
        let nlocal = self.num_local_points;
        let (mflux, temp, mom, pstrain) = (ns, ns + 1, ns + 2, ns + 3);
        let total = session.grid.num_points();
        let finite = session.config.finite_separation;
        let u_ref = session.config.ref_momentum;
        let stagnation = session.policy.stagnation_index;
        let y = &session.work.y_ext;
        let rv = &session.work.rel_vol_ext;
        let ts = &session.transport_sample;
        let g = &session.local_grid;
        let band = &mut self.band;
        band.fill(0.0);

        for j in 0..nlocal {
            let jj = j as isize;
            let jglobal = session.decomposition.global_index(j);
            let (has_left, has_right) = (jglobal > 0, jglobal + 1 < total);
            let g_j = state[j * nst + mflux];
            let u_j = state[j * nst + mom];
            let col = session.scheme.column(g, jj, g_j > 0.0);
            let (v, v_p, v_m) = (rv.at(jj, 0), rv.at(jj + 1, 0), rv.at(jj - 1, 0));
            let (g_p, g_m) = (y.at(jj + 1, mflux), y.at(jj - 1, mflux));
            let (inv_dz, inv_dz_p) = (g.inv_dz(jj), g.inv_dz(jj + 1));
            let (inv_dzm, inv_dzm_p, inv_dzm_m) = (g.inv_dzm(jj), g.inv_dzm(jj + 1), g.inv_dzm(jj - 1));
            // lambda / cp at the interfaces j -/+ 1/2
            let cond_m = ts.thermal_conductivity[j] * inv_dz / ts.mixture_specific_heat_mid[j];
            let cond_p =
                ts.thermal_conductivity[j + 1] * inv_dz_p / ts.mixture_specific_heat_mid[j + 1];
            let mut put = |k: usize, s: usize, value: f64| band[(k * nlocal + j) * 3 + s] = value;

            for k in 0..ns {
                let le_m = ts.species_lewis_numbers[j * ns + k];
                let le_p = ts.species_lewis_numbers[(j + 1) * ns + k];
                put(k, 1, (-cond_p / le_p - cond_m / le_m) * v * inv_dzm - col.c * g_j * v);
                if has_left {
                    put(k, 0, cond_m / le_m * v_m * inv_dzm_m - col.bm * g_m * v_m);
                }
                if has_right {
                    put(k, 2, cond_p / le_p * v_p * inv_dzm_p - col.dp * g_p * v_p);
                }
            }

            if session.fixed_temperature.is_some() {
                put(temp, 1, 1.0);
            } else {
                put(temp, 1, (-cond_p - cond_m) * v * inv_dzm - col.c * g_j * v);
                if has_left {
                    put(temp, 0, cond_m * v_m * inv_dzm_m - col.bm * g_m * v_m);
                }
                if has_right {
                    put(temp, 2, cond_p * v_p * inv_dzm_p - col.dp * g_p * v_p);
                }
            }

            if finite || jglobal > stagnation {
                put(mflux, 1, -inv_dz);
                if has_right {
                    put(mflux, 2, inv_dz_p);
                }
            } else if jglobal == stagnation {
                put(mflux, 1, 1.0);
                put(mflux, 2, inv_dz_p);
                put(mflux, 0, -inv_dz);
            } else {
                put(mflux, 1, inv_dz_p);
                if has_left {
                    put(mflux, 0, -inv_dz);
                }
            }

            let (mu_m, mu_p) = (
                ts.mixture_viscosity[j] * inv_dz,
                ts.mixture_viscosity[j + 1] * inv_dz_p,
            );
            let sink = 2.0 * u_j * u_ref;
            let diagonal = if !finite && jglobal == 0 {
                -mu_p * v * inv_dzm - (col.c + col.d) * g_j * v - sink
            } else if !finite && jglobal == total - 1 {
                -mu_m * v * inv_dzm - (col.b + col.c) * g_j * v - sink
            } else {
                (-mu_p - mu_m) * v * inv_dzm - col.c * g_j * v - sink
            };
            put(mom, 1, diagonal);
            if has_left {
                put(mom, 0, mu_m * v_m * inv_dzm_m - col.bm * g_m * v_m);
            }
            if has_right {
                put(mom, 2, mu_p * v_p * inv_dzm_p - col.dp * g_p * v_p);
            }

            if finite {
                put(pstrain, 1, -1.0);
                if has_left {
                    put(pstrain, 0, 1.0);
                }
            }
        }
    }

    /// `(T + cI)` with every column scaled by the factored chemistry diagonal, plus `I`
    fn normalize_transport(&mut self) {
        let nst = self.num_states;
        let nlocal = self.num_local_points;
        let nnz = self.chemistry_pattern.nnz();
        for k in 0..nst {
            for j in 0..nlocal {
                let inv_chem = 1.0 / self.chemistry_values[j * nnz + self.diagonal[k]];
                let column = &mut self.band[(k * nlocal + j) * 3..(k * nlocal + j + 1) * 3];
                column[1] += self.shift;
                for entry in column.iter_mut() {
                    *entry *= inv_chem;
                }
                column[1] += 1.0;
            }
        }
    }

    fn factor_transport(&mut self, session: &FlameSession) -> Result<(), FlameError> {
        let nlocal = self.num_local_points;
        let total = session.grid.num_points();
        let comm = session.comm();
        let mut status = Ok(());
        for k in 0..self.num_states {
            let owner = self.owner_of_variable(k);
            let full = comm.gather(&self.band[k * nlocal * 3..(k + 1) * nlocal * 3], owner)?;
            self.transport_factors[k] = None;
            let Some(full) = full else { continue };
            let mut matrix = BandedMatrix::new(total, 1, 1);
            for p in 0..total {
                if p > 0 {
                    matrix.set(p - 1, p, full[p * 3]);
                }
                matrix.set(p, p, full[p * 3 + 1]);
                matrix.set(p + 1, p, full[p * 3 + 2]);
            }
            match matrix.factor() {
                Ok(lu) => self.transport_factors[k] = Some(lu),
                Err(e) => {
                    let point = (e.0.max(1) - 1) as usize;
                    let err = factorization_error(session, point, e);
                    error!("AF transport band of variable {}: {}", k, err);
                    if status.is_ok() {
                        status = Err(err);
                    }
                }
            }
        }
        agree_on_failure(comm, status)
    }
}

impl Preconditioner for AfPreconditioner {
    fn setup(&mut self, session: &mut FlameSession, state: &[f64]) -> Result<(), FlameError> {
        session.check_length("state", state.len())?;
        let mut residual = vec![0.0; state.len()];
        session.residual(state, &mut residual)?;
        let chemistry = self.factor_chemistry(session, state);
        agree_on_failure(session.comm(), chemistry)?;
        self.assemble_transport(session, state);
        self.normalize_transport();
        self.factor_transport(session)
    }

    fn solve(&mut self, session: &FlameSession, rhs: &mut [f64]) -> Result<(), FlameError> {
        session.check_length("right-hand side", rhs.len())?;
        let nst = self.num_states;
        let nlocal = self.num_local_points;
        let comm = session.comm();

        let mut chemistry = Ok(());
        for (j, solver) in self.chemistry_solvers.iter().enumerate() {
            if let Err(status) = solver.solve(&mut rhs[j * nst..(j + 1) * nst]) {
                let point = session.decomposition.global_index(j);
                error!("AF chemistry solve failed at grid point {}, status {}", point, status);
                chemistry = Err(factorization_error(session, point, status));
                break;
            }
        }
        agree_on_failure(comm, chemistry)?;

        let mut by_variable = vec![0.0; nst * nlocal];
        for j in 0..nlocal {
            for k in 0..nst {
                by_variable[k * nlocal + j] = rhs[j * nst + k];
            }
        }
        let mut gathered = Vec::with_capacity(nst);
        let mut banded = Ok(());
        for k in 0..nst {
            let owner = self.owner_of_variable(k);
            let mut full = comm.gather(&by_variable[k * nlocal..(k + 1) * nlocal], owner)?;
            if let (Some(values), Some(factor)) = (full.as_mut(), &self.transport_factors[k]) {
                if let Err(status) = factor.solve(values) {
                    error!("AF banded solve of variable {} failed, status {}", k, status);
                    if banded.is_ok() {
                        banded = Err(FlameError::from(status));
                    }
                }
            }
            gathered.push(full);
        }
        agree_on_failure(comm, banded)?;
        for (k, full) in gathered.iter().enumerate() {
            comm.scatter(
                full.as_deref(),
                &mut by_variable[k * nlocal..(k + 1) * nlocal],
                self.owner_of_variable(k),
            )?;
        }
        for j in 0..nlocal {
            for k in 0..nst {
                rhs[j * nst + k] = by_variable[k * nlocal + j];
            }
        }
        Ok(())
    }

    fn invalidate_pattern(&mut self) {
        for solver in &mut self.chemistry_solvers {
            solver.reset();
        }
        self.force_refresh = true;
    }
}
