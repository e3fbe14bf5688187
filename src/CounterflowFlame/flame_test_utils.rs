//! Shared fixtures of the flame tests: configurations, sessions on the reference services,
//! smooth global profiles and a runner that executes a closure on every rank of a world.
use crate::CounterflowFlame::flame_config::FlameConfig;
use crate::CounterflowFlame::flame_session::FlameSession;
use crate::Parallel::communicator::{Communicator, SerialComm};
use crate::Parallel::thread_comm::ThreadComm;
use crate::ReferenceModels::constant_lewis_transport::ConstantLewisTransport;
use crate::ReferenceModels::one_step_reactor::OneStepReactor;
use std::collections::HashMap;
use std::thread;

pub const NUM_SPECIES: usize = 3;

fn composition(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// methane-like diffusion flame over 1 cm
pub fn diffusion_config(num_points: usize, finite_separation: bool, scheme: i32) -> FlameConfig {
    FlameConfig {
        num_points,
        length: 0.01,
        flame_type: 0,
        convective_scheme_type: scheme,
        finite_separation,
        inlet_fuel_comp: composition(&[("FUEL", 1.0)]),
        inlet_oxidizer_comp: composition(&[("OX", 0.233), ("PROD", 0.767)]),
        fuel_species: vec!["FUEL".to_string()],
        mass_flux_fuel: 0.1,
        mass_flux_oxidizer: -0.1,
        ..FlameConfig::default()
    }
}

/// premixed twin flame whose inlet matches `flat_point`
pub fn flat_premixed_config(num_points: usize) -> FlameConfig {
    FlameConfig {
        num_points,
        length: 0.01,
        flame_type: 1,
        convective_scheme_type: 1,
        inlet_full_comp: composition(&[("FUEL", 0.05), ("OX", 0.2), ("PROD", 0.75)]),
        inlet_oxidizer_comp: composition(&[("OX", 0.233), ("PROD", 0.767)]),
        fuel_species: vec!["FUEL".to_string()],
        fuel_temperature: 1600.0,
        ..FlameConfig::default()
    }
}

/// `[Y_F, Y_O, Y_P, G, theta, U, (P)]` of the flat premixed state
pub fn flat_point(finite_separation: bool) -> Vec<f64> {
    let mut point = vec![0.05, 0.2, 0.75, 0.0, 1.6, 0.0];
    if finite_separation {
        point.push(0.0);
    }
    point
}

pub fn reference_session(comm: Box<dyn Communicator>, config: FlameConfig) -> FlameSession {
    let reactor = OneStepReactor::methane_like(config.ref_temperature, config.finite_separation);
    FlameSession::new(
        config,
        comm,
        Box::new(reactor),
        Box::new(ConstantLewisTransport::methane_like()),
    )
    .unwrap()
}

/// Smooth diffusion flame profile on the configured grid: fuel decays towards the oxidizer
/// side, a temperature bump at mid-domain, a mass flux changing sign near the middle.
pub fn flame_profile(config: &FlameConfig) -> Vec<f64> {
    let grid = config.build_grid().unwrap();
    let nst = NUM_SPECIES + if config.finite_separation { 4 } else { 3 };
    let mut state = Vec::with_capacity(grid.num_points() * nst);
    for &z in grid.positions() {
        let x = z / config.length;
        let f = 0.5 * (1.0 - ((x - 0.45) / 0.12).tanh());
        let y_fuel = 0.8 * f + 0.05;
        let y_ox = 0.2 * (1.0 - f) + 0.02;
        state.extend_from_slice(&[y_fuel, y_ox, 1.0 - y_fuel - y_ox]);
        state.push(0.3 * (0.47 - x));
        state.push(0.3 + 1.5 * (-((x - 0.5) / 0.15).powi(2)).exp());
        state.push(0.05 + 0.1 * x * (1.0 - x));
        if config.finite_separation {
            state.push(-2.0 + 0.1 * x);
        }
    }
    state
}

pub fn repeat_point(point: &[f64], num_points: usize) -> Vec<f64> {
    point.repeat(num_points)
}

/// the locally owned slice of a global vector
pub fn local_part(global: &[f64], session: &FlameSession) -> Vec<f64> {
    let first = session.first_global_state();
    global[first..first + session.local_length()].to_vec()
}

/// Runs `f` on every rank of a world of `size` ranks and returns the per-rank results in rank order
pub fn run_on_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(Box<dyn Communicator>) -> R + Sync,
{
    if size == 1 {
        return vec![f(Box::new(SerialComm::new()))];
    }
    let world = ThreadComm::world(size);
    thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(Box::new(comm)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}
