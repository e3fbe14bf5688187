use KiFlame::CounterflowFlame::diagnostics::FlameDiagnostics;
use KiFlame::CounterflowFlame::flame_config::{FlameConfig, PreconditionerKind};
use KiFlame::CounterflowFlame::flame_errors::FlameError;
use KiFlame::CounterflowFlame::flame_session::FlameSession;
use KiFlame::CounterflowFlame::solver_callbacks::FlameSystem;
use KiFlame::Parallel::communicator::{Communicator, ReduceOp};
use KiFlame::Parallel::thread_comm::ThreadComm;
use KiFlame::ReferenceModels::constant_lewis_transport::ConstantLewisTransport;
use KiFlame::ReferenceModels::one_step_reactor::OneStepReactor;
use KiFlame::Utils::logger::init_logger;
use log::{LevelFilter, error, info};
use std::collections::HashMap;
use std::thread;

const DEMO_RANKS: usize = 2;

fn demo_config() -> FlameConfig {
    FlameConfig {
        num_points: 40,
        length: 0.01,
        convective_scheme_type: 1,
        inlet_fuel_comp: HashMap::from([("FUEL".to_string(), 1.0)]),
        inlet_oxidizer_comp: HashMap::from([
            ("OX".to_string(), 0.233),
            ("PROD".to_string(), 0.767),
        ]),
        fuel_species: vec!["FUEL".to_string()],
        mass_flux_fuel: 0.1,
        mass_flux_oxidizer: -0.1,
        preconditioner: PreconditionerKind::ApproximateFactorization,
        ..FlameConfig::default()
    }
}

/// tanh mixing layer with a Gaussian temperature bump, locally owned points only
fn initial_guess(session: &FlameSession) -> Vec<f64> {
    let config = &session.config;
    let mut state = Vec::with_capacity(session.local_length());
    for j in 0..session.num_local_points() {
        let x = session.grid.position(session.decomposition.global_index(j)) / config.length;
        let f = 0.5 * (1.0 - ((x - 0.5) / 0.1).tanh());
        let y_fuel = 0.95 * f;
        let y_ox = 0.233 * (1.0 - f);
        state.extend_from_slice(&[y_fuel, y_ox, 1.0 - y_fuel - y_ox]);
        state.push(0.2 * (0.5 - x));
        state.push(0.3 + 1.6 * (-((x - 0.5) / 0.12).powi(2)).exp());
        state.push(0.02 + 0.1 * x * (1.0 - x));
        if config.finite_separation {
            state.push(-1.0);
        }
    }
    state
}

fn max_abs(comm: &dyn Communicator, values: &[f64]) -> Result<f64, FlameError> {
    let local = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    Ok(comm.all_reduce(local, ReduceOp::Max)?)
}

fn run_rank(comm: ThreadComm, config: &FlameConfig) -> Result<FlameDiagnostics, FlameError> {
    let reactor = OneStepReactor::methane_like(config.ref_temperature, config.finite_separation);
    let session = FlameSession::new(
        config.clone(),
        Box::new(comm),
        Box::new(reactor),
        Box::new(ConstantLewisTransport::methane_like()),
    )?;
    let mut system = FlameSystem::new(session)?;
    let state = initial_guess(&system.session);
    let mut residual = vec![0.0; state.len()];
    system.session.residual(&state, &mut residual)?;
    let residual_norm = max_abs(system.session.comm(), &residual)?;
    system.setup(&state)?;
    let mut step = residual;
    system.solve(&mut step)?;
    let step_norm = max_abs(system.session.comm(), &step)?;
    if system.session.decomposition.is_first_rank() {
        info!(
            "initial guess: max |F| = {:e}, max |P^-1 F| = {:e} processed!",
            residual_norm, step_norm
        );
    }
    Ok(system.session.diagnostics.clone())
}

pub fn main() {
    if let Err(e) = init_logger(LevelFilter::Info) {
        eprintln!("logger: {}", e);
    }
    let config = match std::env::args().nth(1) {
        Some(path) => FlameConfig::from_file(path),
        None => Ok(demo_config()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.status_code());
        }
    };
    let world = ThreadComm::world(DEMO_RANKS);
    let results: Vec<Result<FlameDiagnostics, FlameError>> = thread::scope(|s| {
        let handles: Vec<_> = world
            .into_iter()
            .map(|comm| {
                let config = &config;
                s.spawn(move || run_rank(comm, config))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(FlameError::Configuration("rank panicked".into())))
            })
            .collect()
    });
    match results.into_iter().next() {
        Some(Ok(diagnostics)) => diagnostics.pretty_print(),
        Some(Err(e)) => {
            error!("{}", e);
            std::process::exit(e.status_code());
        }
        None => {}
    }
}
