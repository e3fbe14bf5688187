use crate::CounterflowFlame::af_preconditioner::AfPreconditioner;
use crate::CounterflowFlame::bbd_preconditioner::BbdPreconditioner;
use crate::CounterflowFlame::flame_config::{FlameConfig, PreconditionerKind};
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_session::FlameSession;
use crate::CounterflowFlame::flame_test_utils::{
    diffusion_config, flame_profile, flat_point, flat_premixed_config, local_part,
    reference_session, repeat_point, run_on_ranks,
};
use crate::CounterflowFlame::solver_callbacks::{
    FlameSystem, INTERFACE_VERSION, NonlinearCallbacks, Preconditioner,
};
use crate::LinearAlgebra::sparse_direct::{
    CompressedPattern, DenseLuSolver, SolverStatus, SparseDirectSolver,
};
use crate::Parallel::communicator::{Communicator, SerialComm};
use crate::ReferenceModels::constant_lewis_transport::ConstantLewisTransport;
use crate::CounterflowFlame::flame_services::ReactorService;
use crate::ReferenceModels::one_step_reactor::OneStepReactor;
use approx::assert_relative_eq;

fn bbd_config(num_points: usize, finite_separation: bool) -> FlameConfig {
    FlameConfig {
        preconditioner: PreconditionerKind::Bbd,
        ..diffusion_config(num_points, finite_separation, 1)
    }
}

fn inert_session(comm: Box<dyn Communicator>, config: FlameConfig) -> FlameSession {
    let reactor = OneStepReactor::methane_like(config.ref_temperature, config.finite_separation)
        .with_rate(0.0, 1.5e4);
    FlameSession::new(
        config,
        comm,
        Box::new(reactor),
        Box::new(ConstantLewisTransport::methane_like()),
    )
    .unwrap()
}

fn pattern_times(pattern: &CompressedPattern, values: &[f64], x: &[f64]) -> Vec<f64> {
    let mut y = vec![0.0; pattern.nrows];
    for (pos, row, col) in pattern.entries() {
        y[row] += values[pos] * x[col];
    }
    y
}

fn test_vector(n: usize) -> Vec<f64> {
    (0..n).map(|i| 1.0 + 0.1 * (i as f64).sin()).collect()
}

/// `flame_type` 1 and 2 get the premixed inlet of `flat_premixed_config`
fn flame_case(num_points: usize, flame_type: i32, finite_separation: bool, scheme: i32) -> FlameConfig {
    FlameConfig {
        flame_type,
        inlet_full_comp: flat_premixed_config(num_points).inlet_full_comp,
        ..diffusion_config(num_points, finite_separation, scheme)
    }
}

/// Compares the BBD values with one-column finite differences of the serial residual
fn check_bbd_against_dense_differences(config: FlameConfig) {
    let config = FlameConfig {
        preconditioner: PreconditionerKind::Bbd,
        ..config
    };
    let case = format!(
        "flame {}, finite {}, scheme {}",
        config.flame_type, config.finite_separation, config.convective_scheme_type
    );
    let global = flame_profile(&config);
    let n = global.len();
    let mut session = reference_session(Box::new(SerialComm::new()), config.clone());
    let mut bbd = BbdPreconditioner::new(&session);
    bbd.setup(&mut session, &global).unwrap();

    let mut base = vec![0.0; n];
    session.residual(&global, &mut base).unwrap();
    let mut checked = 0;
    for c in 0..n {
        let mut y = global.clone();
        y[c] += config.perturbation_relative * y[c].abs() + config.perturbation_absolute;
        let delta = y[c] - global[c];
        let mut r = vec![0.0; n];
        session.residual(&y, &mut r).unwrap();
        for i in 0..n {
            let fd = (r[i] - base[i]) / delta;
            if fd != 0.0 {
                let pos = bbd.pattern().position(i, c).unwrap_or_else(|| {
                    panic!("{}: entry ({}, {}) = {:e} is not in the pattern", case, i, c, fd)
                });
                assert_relative_eq!(bbd.values()[pos], fd, max_relative = 1e-9);
                checked += 1;
            }
        }
    }
    assert!(checked > 3 * n, "{}", case);
}

#[test]
fn bbd_pattern_holds_every_nonzero_of_the_dense_jacobian() {
    for flame_type in [0, 1, 2] {
        for finite in [true, false] {
            for scheme in [0, 1, 2] {
                check_bbd_against_dense_differences(flame_case(5, flame_type, finite, scheme));
            }
        }
    }
}

#[test]
fn premixed_twin_momentum_rows_see_the_last_point_thermo_state() {
    let config = FlameConfig {
        preconditioner: PreconditionerKind::Bbd,
        ..flame_case(10, 1, false, 1)
    };
    let global = flame_profile(&config);
    let rhs = test_vector(global.len());
    let nst = 6;
    let results = |size: usize| {
        run_on_ranks(size, |comm| {
            let mut session = reference_session(comm, config.clone());
            let state = local_part(&global, &session);
            let mut bbd = BbdPreconditioner::new(&session);
            bbd.setup(&mut session, &state).unwrap();
            let far: Vec<f64> = (0..session.num_local_points())
                .flat_map(|j| {
                    let row = j * nst + 5;
                    [0, 1, 2, 4].map(|s| {
                        let pos = bbd.pattern().position(row, 9 * nst + s).unwrap();
                        bbd.values()[pos]
                    })
                })
                .collect();
            let mut x = local_part(&rhs, &session);
            bbd.solve(&session, &mut x).unwrap();
            (far, x)
        })
    };
    let serial = results(1).remove(0);
    // the first momentum row is far outside the stencil of the last point
    assert!(serial.0[..4].iter().any(|d| *d != 0.0));
    for size in [2, 5] {
        let parallel = results(size);
        let far: Vec<f64> = parallel.iter().flat_map(|r| r.0.clone()).collect();
        let x: Vec<f64> = parallel.iter().flat_map(|r| r.1.clone()).collect();
        for (a, b) in far.iter().zip(&serial.0) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-10);
        }
        for (a, b) in x.iter().zip(&serial.1) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-10);
        }
    }
}

/// Dense LU that first wipes one global column
struct ZeroColumn {
    column: usize,
    inner: DenseLuSolver,
}

impl ZeroColumn {
    fn wiped(&self, pattern: &CompressedPattern, values: &[f64]) -> Vec<f64> {
        let mut values = values.to_vec();
        for (pos, _, col) in pattern.entries() {
            if col == self.column {
                values[pos] = 0.0;
            }
        }
        values
    }
}

impl SparseDirectSolver for ZeroColumn {
    fn is_first_factor(&self) -> bool {
        self.inner.is_first_factor()
    }

    fn factor_new_pattern(
        &mut self,
        pattern: &CompressedPattern,
        values: &[f64],
    ) -> Result<(), SolverStatus> {
        let values = self.wiped(pattern, values);
        self.inner.factor_new_pattern(pattern, &values)
    }

    fn factor_same_pattern(&mut self, _values: &[f64]) -> Result<(), SolverStatus> {
        Err(SolverStatus::NOT_FACTORED)
    }

    fn solve(&self, rhs: &mut [f64]) -> Result<(), SolverStatus> {
        self.inner.solve(rhs)
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

#[test]
fn bbd_singular_column_is_reported_at_its_grid_point() {
    let config = bbd_config(10, true);
    let global = flame_profile(&config);
    let errors = run_on_ranks(2, |comm| {
        let mut session = reference_session(comm, config.clone());
        let state = local_part(&global, &session);
        let solver = ZeroColumn {
            column: 6 * 7 + 4,
            inner: DenseLuSolver::new(),
        };
        let mut bbd = BbdPreconditioner::with_solver(&session, Box::new(solver));
        let err = bbd.setup(&mut session, &state).unwrap_err();
        (err, session.grid.position(6))
    });
    for (err, z6) in errors {
        match err {
            FlameError::Factorization { point, z, status } => {
                assert_eq!(point, Some(6));
                assert_eq!(z, Some(z6));
                assert_eq!(status, 6 * 7 + 4 + 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}

#[test]
fn bbd_solve_inverts_the_assembled_matrix() {
    let config = bbd_config(5, false);
    let global = flame_profile(&config);
    let mut session = reference_session(Box::new(SerialComm::new()), config);
    let mut bbd = BbdPreconditioner::new(&session);
    bbd.setup(&mut session, &global).unwrap();
    let v = test_vector(global.len());
    let b = pattern_times(bbd.pattern(), bbd.values(), &v);
    let mut x = b.clone();
    bbd.solve(&session, &mut x).unwrap();
    let r = pattern_times(bbd.pattern(), bbd.values(), &x);
    let scale = b.iter().fold(0.0f64, |m, bi| m.max(bi.abs()));
    for (ri, bi) in r.iter().zip(&b) {
        assert!((ri - bi).abs() <= 1e-9 * scale);
    }
}

#[test]
fn bbd_is_independent_of_the_rank_count() {
    let config = bbd_config(10, true);
    let global = flame_profile(&config);
    let rhs = test_vector(global.len());
    let run = |size: usize| {
        let results = run_on_ranks(size, |comm| {
            let mut session = reference_session(comm, config.clone());
            let state = local_part(&global, &session);
            let mut bbd = BbdPreconditioner::new(&session);
            bbd.setup(&mut session, &state).unwrap();
            let mut x = local_part(&rhs, &session);
            bbd.solve(&session, &mut x).unwrap();
            (bbd.values().to_vec(), x)
        });
        let values: Vec<f64> = results.iter().flat_map(|r| r.0.clone()).collect();
        let solution: Vec<f64> = results.iter().flat_map(|r| r.1.clone()).collect();
        (values, solution)
    };
    let (serial_values, serial_solution) = run(1);
    for size in [2, 5] {
        let (values, solution) = run(size);
        assert_eq!(values.len(), serial_values.len());
        for (a, b) in values.iter().zip(&serial_values) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-10);
        }
        for (a, b) in solution.iter().zip(&serial_solution) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-10);
        }
    }
}

#[test]
fn bbd_setup_leaves_the_session_as_it_found_it() {
    // the session was built for AF, so it does not exchange the residual halo on its own
    let config = diffusion_config(10, true, 1);
    let global = flame_profile(&config);
    let mut session = reference_session(Box::new(SerialComm::new()), config);
    let mut before = vec![0.0; global.len()];
    session.residual(&global, &mut before).unwrap();
    let conv = session.work.rhs_conv.clone();
    let mut bbd = BbdPreconditioner::new(&session);
    bbd.setup(&mut session, &global).unwrap();
    assert!(!session.exchange_residual_halo);
    assert_eq!(session.work.rhs_conv, conv);
}

#[test]
fn af_solve_of_a_steady_residual_is_zero() {
    let config = flat_premixed_config(10);
    let global = repeat_point(&flat_point(true), 10);
    for size in [1, 2] {
        let solutions = run_on_ranks(size, |comm| {
            let mut session = inert_session(comm, config.clone());
            let state = local_part(&global, &session);
            let mut residual = vec![0.0; state.len()];
            session.residual(&state, &mut residual).unwrap();
            let mut af = AfPreconditioner::new(&session).unwrap();
            af.setup(&mut session, &state).unwrap();
            af.solve(&session, &mut residual).unwrap();
            residual
        });
        for x in solutions.concat() {
            assert!(x.abs() <= 1e-12);
        }
    }
}

#[test]
fn af_is_independent_of_the_rank_count() {
    for config in [
        diffusion_config(10, true, 1),
        flame_case(10, 2, true, 1),
        flame_case(10, 2, false, 2),
        flame_case(10, 1, false, 0),
    ] {
        let global = flame_profile(&config);
        let rhs = test_vector(global.len());
        let run = |size: usize| {
            run_on_ranks(size, |comm| {
                let mut session = reference_session(comm, config.clone());
                let state = local_part(&global, &session);
                let mut af = AfPreconditioner::new(&session).unwrap();
                af.setup(&mut session, &state).unwrap();
                let mut x = local_part(&rhs, &session);
                af.solve(&session, &mut x).unwrap();
                x
            })
            .concat()
        };
        let serial = run(1);
        assert!(serial.iter().all(|x| x.is_finite()));
        for size in [2, 5] {
            for (a, b) in run(size).iter().zip(&serial) {
                assert_relative_eq!(*a, *b, epsilon = 1e-12, max_relative = 1e-10);
            }
        }
    }
}

/// dense row-major `C - cI` of every owned point, straight from the reactor
fn shifted_chemistry_blocks(session: &FlameSession, state: &[f64]) -> Vec<f64> {
    let nst = session.num_states;
    let pattern = session.reactor.jacobian_pattern();
    let last = session.grid.num_points() - 1;
    let mut blocks = Vec::with_capacity(session.num_local_points() * nst * nst);
    for j in 0..session.num_local_points() {
        let mut values = vec![0.0; pattern.nnz()];
        session.reactor.jacobian_steady(
            &state[j * nst..(j + 1) * nst],
            &session.work.rhs_conv[j * nst..(j + 1) * nst],
            session.decomposition.global_index(j) == last,
            session.config.ref_momentum,
            &session.step_limiter,
            &mut values,
        );
        let mut dense = vec![0.0; nst * nst];
        for (pos, row, col) in pattern.entries() {
            dense[row * nst + col] += values[pos];
        }
        for k in 0..nst {
            dense[k * nst + k] -= session.config.af_shift;
        }
        blocks.extend(dense);
    }
    blocks
}

#[test]
fn af_solve_inverts_chemistry_times_normalized_transport() {
    let config = diffusion_config(10, true, 1);
    let global = flame_profile(&config);
    let n_points = 10;
    let nst = 7;
    let rhs = test_vector(global.len());
    let scale = rhs.iter().fold(0.0f64, |m, r| m.max(r.abs()));
    for size in [1, 2, 5] {
        let results = run_on_ranks(size, |comm| {
            let mut session = reference_session(comm, config.clone());
            let state = local_part(&global, &session);
            let mut af = AfPreconditioner::new(&session).unwrap();
            af.setup(&mut session, &state).unwrap();
            let blocks = shifted_chemistry_blocks(&session, &state);
            let band = af.transport_band().to_vec();
            let mut x = local_part(&rhs, &session);
            af.solve(&session, &mut x).unwrap();
            (blocks, band, x)
        });
        let nlocal = n_points / size;
        let x: Vec<f64> = results.iter().flat_map(|r| r.2.clone()).collect();
        let blocks: Vec<f64> = results.iter().flat_map(|r| r.0.clone()).collect();
        assert!(x.iter().any(|v| v.abs() > 0.0));

        // y = (I + (T + cI) D^-1) x, column by column
        let mut y = vec![0.0; x.len()];
        for (rank, (_, band, _)) in results.iter().enumerate() {
            for k in 0..nst {
                for j in 0..nlocal {
                    let p = rank * nlocal + j;
                    let column = &band[(k * nlocal + j) * 3..(k * nlocal + j + 1) * 3];
                    let xv = x[p * nst + k];
                    if p > 0 {
                        y[(p - 1) * nst + k] += column[0] * xv;
                    }
                    y[p * nst + k] += column[1] * xv;
                    if p + 1 < n_points {
                        y[(p + 1) * nst + k] += column[2] * xv;
                    }
                }
            }
        }
        // (C - cI) y point by point
        for p in 0..n_points {
            let block = &blocks[p * nst * nst..(p + 1) * nst * nst];
            for a in 0..nst {
                let z: f64 = (0..nst).map(|b| block[a * nst + b] * y[p * nst + b]).sum();
                assert!(
                    (z - rhs[p * nst + a]).abs() <= 1e-8 * scale,
                    "{} ranks, point {}, variable {}: {} vs {}",
                    size,
                    p,
                    a,
                    z,
                    rhs[p * nst + a]
                );
            }
        }
    }
}

#[test]
fn af_continuity_band_is_the_residual_derivative() {
    let config = diffusion_config(10, true, 1);
    let global = flame_profile(&config);
    let nst = 7;
    let mflux = 3;
    let mut session = reference_session(Box::new(SerialComm::new()), config.clone());
    let mut af = AfPreconditioner::new(&session).unwrap();
    af.setup(&mut session, &global).unwrap();
    let band = af.transport_band().to_vec();

    let mut base = vec![0.0; global.len()];
    session.residual(&global, &mut base).unwrap();
    for j in 0..10 {
        let mut y = global.clone();
        y[j * nst + mflux] += 1.0e-3;
        let mut r = vec![0.0; global.len()];
        session.residual(&y, &mut r).unwrap();
        for (s, p) in [(0, j as isize - 1), (1, j as isize), (2, j as isize + 1)] {
            if !(0..10).contains(&p) {
                continue;
            }
            let row = p as usize * nst + mflux;
            let derivative = (r[row] - base[row]) / 1.0e-3;
            // the continuity rows carry no chemistry, so D = -c there
            let transport = -config.af_shift * band[(mflux * 10 + j) * 3 + s];
            assert_relative_eq!(transport, derivative, epsilon = 1e-6, max_relative = 1e-6);
        }
    }
}

#[test]
fn af_spreads_the_variables_over_the_ranks() {
    let config = diffusion_config(10, true, 1);
    let owners = run_on_ranks(5, |comm| {
        let session = reference_session(comm, config.clone());
        let af = AfPreconditioner::new(&session).unwrap();
        (0..7).map(|k| af.owner_of_variable(k)).collect::<Vec<_>>()
    });
    assert_eq!(owners[0], vec![0, 0, 1, 1, 2, 2, 3]);
}

#[test]
fn af_reuses_stored_chemistry_between_refreshes() {
    let config = FlameConfig {
        store_jacobian: true,
        chemistry_refresh_interval: 2,
        ..diffusion_config(10, true, 1)
    };
    let first = flame_profile(&config);
    let second: Vec<f64> = first
        .chunks(7)
        .flat_map(|p| {
            let mut p = p.to_vec();
            p[4] += 0.1;
            p
        })
        .collect();
    let rhs = test_vector(first.len());
    let mut session = reference_session(Box::new(SerialComm::new()), config.clone());

    let mut fresh = AfPreconditioner::new(&session).unwrap();
    fresh.setup(&mut session, &second).unwrap();
    let mut expected = rhs.clone();
    fresh.solve(&session, &mut expected).unwrap();

    let mut cached = AfPreconditioner::new(&session).unwrap();
    cached.setup(&mut session, &first).unwrap();
    cached.setup(&mut session, &second).unwrap();
    let mut stale = rhs.clone();
    cached.solve(&session, &mut stale).unwrap();
    assert!(stale.iter().zip(&expected).any(|(a, b)| (a - b).abs() > 1e-8 * b.abs()));

    cached.setup(&mut session, &second).unwrap();
    let mut refreshed = rhs.clone();
    cached.solve(&session, &mut refreshed).unwrap();
    for (a, b) in refreshed.iter().zip(&expected) {
        assert_relative_eq!(*a, *b, epsilon = 1e-14, max_relative = 1e-12);
    }
}

#[test]
fn singular_chemistry_block_is_a_factorization_error() {
    let config = FlameConfig {
        af_shift: 0.0,
        ..flat_premixed_config(10)
    };
    let global = repeat_point(&flat_point(true), 10);
    let errors = run_on_ranks(2, |comm| {
        let mut session = inert_session(comm, config.clone());
        let state = local_part(&global, &session);
        let mut af = AfPreconditioner::new(&session).unwrap();
        af.setup(&mut session, &state).unwrap_err()
    });
    for (rank, err) in errors.iter().enumerate() {
        match err {
            FlameError::Factorization { point, z, .. } => {
                assert_eq!(*point, Some(rank * 5));
                assert!(z.is_some());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.status_code(), 2);
    }
}

#[test]
fn callbacks_report_integer_statuses() {
    for kind in [PreconditionerKind::Bbd, PreconditionerKind::ApproximateFactorization] {
        let config = FlameConfig {
            preconditioner: kind,
            ..diffusion_config(10, true, 1)
        };
        let global = flame_profile(&config);
        let session = reference_session(Box::new(SerialComm::new()), config);
        let mut system = FlameSystem::new(session).unwrap();
        assert_eq!(system.interface_version(), INTERFACE_VERSION);

        let mut residual = vec![0.0; global.len()];
        assert_eq!(system.residual(&global, &mut residual), 0);
        assert_eq!(system.preconditioner_setup(&global), 0);
        assert_eq!(system.preconditioner_solve(&mut residual), 0);
        assert!(residual.iter().all(|r| r.is_finite()));

        let mut short = vec![0.0; 7];
        assert_eq!(system.preconditioner_solve(&mut short), -3);

        let mut broken = global.clone();
        broken[3 * 7 + 4] = -2.0;
        assert_eq!(system.residual(&broken, &mut residual), 1);

        system.preconditioner.invalidate_pattern();
        assert_eq!(system.preconditioner_setup(&global), 0);
    }
}
