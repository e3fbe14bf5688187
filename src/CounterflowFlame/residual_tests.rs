use crate::CounterflowFlame::diagnostics::FlameDiagnostics;
use crate::CounterflowFlame::flame_config::FlameConfig;
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_services::ReactorService;
use crate::CounterflowFlame::flame_session::relative_volume;
use crate::CounterflowFlame::flame_test_utils::{
    diffusion_config, flame_profile, flat_point, flat_premixed_config, local_part,
    reference_session, repeat_point, run_on_ranks,
};
use crate::Parallel::communicator::SerialComm;
use crate::ReferenceModels::one_step_reactor::OneStepReactor;
use approx::assert_relative_eq;

fn distributed_residual(config: &FlameConfig, global: &[f64], size: usize) -> Vec<f64> {
    run_on_ranks(size, |comm| {
        let mut session = reference_session(comm, config.clone());
        let state = local_part(global, &session);
        let mut residual = vec![0.0; state.len()];
        session.residual(&state, &mut residual).unwrap();
        residual
    })
    .concat()
}

fn distributed_diagnostics(config: &FlameConfig, global: &[f64], size: usize) -> Vec<FlameDiagnostics> {
    run_on_ranks(size, |comm| {
        let mut session = reference_session(comm, config.clone());
        let state = local_part(global, &session);
        let mut residual = vec![0.0; state.len()];
        session.residual(&state, &mut residual).unwrap();
        session.diagnostics.clone()
    })
}

#[test]
fn residual_does_not_depend_on_the_rank_count() {
    for (finite, scheme) in [(true, 0), (true, 1), (true, 2), (false, 1), (false, 2)] {
        let config = diffusion_config(10, finite, scheme);
        let global = flame_profile(&config);
        let serial = distributed_residual(&config, &global, 1);
        assert!(serial.iter().all(|r| r.is_finite()));
        for size in [2, 5] {
            let parallel = distributed_residual(&config, &global, size);
            assert_eq!(parallel.len(), serial.len());
            for (p, s) in parallel.iter().zip(&serial) {
                assert_relative_eq!(*p, *s, epsilon = 1e-12, max_relative = 1e-12);
            }
        }
    }
}

#[test]
fn flat_profile_residual_is_the_chemistry_source() {
    let config = flat_premixed_config(10);
    let point = flat_point(true);
    let global = repeat_point(&point, 10);
    let reactor = OneStepReactor::methane_like(1000.0, true);
    let mut source = vec![0.0; point.len()];
    reactor.time_derivative_steady(&point, &[config.step_limiter], &mut source);
    assert!(source[0] < 0.0);

    let parallel = distributed_residual(&config, &global, 2);
    for j in 0..10 {
        let row = &parallel[j * 7..(j + 1) * 7];
        for k in [0, 1, 2, 4] {
            assert_relative_eq!(row[k], source[k], max_relative = 1e-12);
        }
        assert_eq!(row[3], 0.0);
        assert_eq!(row[5], 0.0);
    }
    let serial = distributed_residual(&config, &global, 1);
    for (p, s) in parallel.iter().zip(&serial) {
        assert_relative_eq!(*p, *s, epsilon = 1e-10);
    }
}

#[test]
fn diffusion_flame_low_end_ghosts_hold_the_fuel_stream() {
    let config = diffusion_config(10, true, 1);
    let global = flame_profile(&config);
    let mut session = reference_session(Box::new(SerialComm::new()), config);
    let mut residual = vec![0.0; global.len()];
    session.residual(&global, &mut residual).unwrap();
    let fuel_theta = 300.0 / 1000.0;
    for j in [-2isize, -1] {
        let ghost = session.work.y_ext.point(j);
        assert_eq!(&ghost[..3], &[1.0, 0.0, 0.0]);
        assert_eq!(ghost[3], 0.1);
        assert_relative_eq!(ghost[4], fuel_theta);
        assert_eq!(ghost[5], 0.0);
        assert_eq!(ghost[6], global[6]);
        assert_relative_eq!(
            session.work.rel_vol_ext.at(j, 0),
            session.streams.fuel_relative_volume
        );
    }
    assert_eq!(session.boundary.p_left, global[6]);
    // oxidizer side ghosts
    let ghost = session.work.y_ext.point(10);
    assert_eq!(&ghost[..3], &[0.0, 0.233, 0.767]);
    assert_eq!(ghost[3], -0.1);
    assert_eq!(ghost[5], 0.0);
}

#[test]
fn infinite_separation_updates_the_boundary_mass_fluxes_on_every_rank() {
    let config = diffusion_config(10, false, 2);
    let global = flame_profile(&config);
    let fluxes = run_on_ranks(2, |comm| {
        let mut session = reference_session(comm, config.clone());
        let state = local_part(&global, &session);
        let mut residual = vec![0.0; state.len()];
        session.residual(&state, &mut residual).unwrap();
        (session.boundary.mass_flux_fuel, session.boundary.mass_flux_oxidizer)
    });
    assert_eq!(fluxes[0], fluxes[1]);
    let grid = config.build_grid().unwrap();
    let v_fuel = 8.314462618 * 300.0 / 101325.0 / 0.016;
    let expected = global[3] + 2.0 * global[5] * 1000.0 / v_fuel * grid.dz()[0];
    assert_relative_eq!(fluxes[0].0, expected, max_relative = 1e-12);
    assert!(fluxes[0].1 < global[9 * 6 + 3]);
}

#[test]
fn diagnostics_agree_across_ranks() {
    let config = diffusion_config(10, true, 1);
    let global = flame_profile(&config);
    let serial = distributed_diagnostics(&config, &global, 1).remove(0);
    assert!(serial.max_temperature > 1300.0);
    assert!(matches!(serial.max_temperature_point, 4 | 5));
    assert!(serial.flame_thickness > 0.0);
    assert!(serial.max_thermal_diffusivity > 0.0);
    assert!(serial.strain_rate > 0.0);
    for size in [2, 5] {
        for d in distributed_diagnostics(&config, &global, size) {
            assert_relative_eq!(d.flame_speed, serial.flame_speed, epsilon = 1e-12, max_relative = 1e-12);
            assert_relative_eq!(d.strain_rate, serial.strain_rate, max_relative = 1e-12);
            assert_eq!(d.max_temperature, serial.max_temperature);
            assert_eq!(d.max_temperature_point, serial.max_temperature_point);
            assert_relative_eq!(d.flame_thickness, serial.flame_thickness, max_relative = 1e-12);
            assert_relative_eq!(
                d.max_thermal_diffusivity,
                serial.max_thermal_diffusivity,
                max_relative = 1e-12
            );
        }
    }
}

#[test]
fn strain_rate_is_the_first_local_maximum_of_the_velocity_gradient() {
    let config = diffusion_config(10, true, 1);
    let global = flame_profile(&config);
    let d = distributed_diagnostics(&config, &global, 2).remove(1);

    // serial scan over |d(G v)/dz| with the oxidizer ghost at the end
    let session = reference_session(Box::new(SerialComm::new()), config.clone());
    let rt_over_p = session.rt_over_p();
    let inv_mw = [1.0 / 0.016, 1.0 / 0.032, 1.0 / 0.028];
    let grid = config.build_grid().unwrap();
    let gv: Vec<f64> = (0..10)
        .map(|j| {
            let p = &global[j * 7..(j + 1) * 7];
            p[3] * relative_volume(rt_over_p, p[4], &p[..3], &inv_mw)
        })
        .chain(std::iter::once(-0.1 * session.streams.oxidizer_relative_volume))
        .collect();
    let s: Vec<f64> = (0..10).map(|j| ((gv[j + 1] - gv[j]) / grid.dz()[j + 1]).abs()).collect();
    let first = (0..10).find(|&j| j == 9 || s[j + 1] <= s[j]).unwrap();
    assert_relative_eq!(d.strain_rate, s[first], max_relative = 1e-12);
}

#[test]
fn infinite_separation_reports_the_imposed_strain_rate() {
    let config = diffusion_config(10, false, 1);
    let global = flame_profile(&config);
    let d = distributed_diagnostics(&config, &global, 2).remove(0);
    assert_eq!(d.strain_rate, 100.0);
}

#[test]
fn transport_failure_is_shared_by_all_ranks() {
    let config = diffusion_config(10, true, 1);
    let mut global = flame_profile(&config);
    global[7 * 7 + 4] = -5.0;
    let errors = run_on_ranks(2, |comm| {
        let mut session = reference_session(comm, config.clone());
        let state = local_part(&global, &session);
        let mut residual = vec![0.0; state.len()];
        session.residual(&state, &mut residual).unwrap_err()
    });
    assert!(matches!(errors[0], FlameError::RemoteFailure { rank: 1 }));
    assert!(matches!(
        errors[1],
        FlameError::Transport {
            interface: Some(7),
            ..
        }
    ));
    assert_eq!(errors[1].status_code(), 1);
}

#[test]
fn fixed_temperature_and_pseudo_unsteady_terms() {
    let config = diffusion_config(10, true, 1);
    let global = flame_profile(&config);
    let mut session = reference_session(Box::new(SerialComm::new()), config);
    let mut steady = vec![0.0; global.len()];
    session.residual(&global, &mut steady).unwrap();

    let profile: Vec<f64> = (0..10).map(|j| global[j * 7 + 4] - 0.01).collect();
    session.set_fixed_temperature(Some(profile)).unwrap();
    let mut fixed = vec![0.0; global.len()];
    session.residual(&global, &mut fixed).unwrap();
    for j in 0..10 {
        assert_relative_eq!(fixed[j * 7 + 4], 0.01, max_relative = 1e-12);
        assert_eq!(fixed[j * 7], steady[j * 7]);
    }
    session.set_fixed_temperature(None).unwrap();

    let y_old: Vec<f64> = global.iter().map(|y| y - 1.0e-3).collect();
    session.set_pseudo_unsteady(0.5, y_old).unwrap();
    let mut unsteady = vec![0.0; global.len()];
    session.residual(&global, &mut unsteady).unwrap();
    for j in 0..10 {
        for k in [0, 1, 2, 4, 5] {
            assert_relative_eq!(
                unsteady[j * 7 + k],
                steady[j * 7 + k] - 2.0e-3,
                epsilon = 1e-9,
                max_relative = 1e-9
            );
        }
        assert_eq!(unsteady[j * 7 + 3], steady[j * 7 + 3]);
        assert_eq!(unsteady[j * 7 + 6], steady[j * 7 + 6]);
    }
}

#[test]
fn wrong_state_length_is_a_dimension_error() {
    let mut session = reference_session(
        Box::new(SerialComm::new()),
        diffusion_config(10, true, 1),
    );
    let mut residual = vec![0.0; 70];
    let err = session.residual(&[0.0; 7], &mut residual).unwrap_err();
    assert!(matches!(err, FlameError::Dimension(_)));
    assert_eq!(err.status_code(), -3);
}
