//! # Flame session
//!
//! ## Purpose
//! [`FlameSession`] owns everything one rank needs to evaluate the steady counterflow residual:
//! configuration, grids, the rank's communicator, the chemistry and transport services, the
//! ghosted work buffers and the boundary scalars. The residual and both preconditioners take the
//! session by reference; nothing is global.
//!
//! ## Main Structures
//! - `FlameSession`: the per-rank context
//! - `FlameWorkspace`: extended state, relative volume and residual buffers plus the split
//!   convective / diffusive / chemical parts of the last residual
//! - `TransportSample`: interface transport properties of the last residual evaluation
//!
//! ## Lifecycle
//! 1. `FlameSession::new` validates the configuration, decomposes the grid and resolves the
//!    stream compositions against the reactor species list
//! 2. the nonlinear solver calls `residual` with the locally owned part of the state
//! 3. preconditioner setups read the transport sample and the convective terms the last
//!    residual evaluation left behind
use crate::CounterflowFlame::boundary_conditions::{
    BoundaryConditionPolicy, BoundaryState, InletStreams,
};
use crate::CounterflowFlame::convective_scheme::ConvectiveScheme;
use crate::CounterflowFlame::diagnostics::FlameDiagnostics;
use crate::CounterflowFlame::flame_config::{FlameConfig, FlameType, Geometry, PreconditionerKind};
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_grid::{GlobalGrid, LocalGrid};
use crate::CounterflowFlame::flame_services::{ReactorService, TransportService};
use crate::Parallel::communicator::Communicator;
use crate::Parallel::domain_decomposition::DomainDecomposition;
use crate::Parallel::halo_exchange::ExtendedField;
use log::{info, warn};
use std::collections::HashMap;

/// Ghosted buffers of one rank
#[derive(Debug, Clone)]
pub struct FlameWorkspace {
    pub y_ext: ExtendedField,
    pub rel_vol_ext: ExtendedField,
    /// residual with ghosts, exchanged when neighbours need to difference it
    pub rhs_ext: ExtendedField,
    /// per-point convective terms `-v_j D(phi)` (before multiplication by `G_j`)
    pub rhs_conv: Vec<f64>,
    pub rhs_diff: Vec<f64>,
    pub rhs_chem: Vec<f64>,
}

impl FlameWorkspace {
    fn new(dd: &DomainDecomposition, num_states: usize) -> Self {
        let nlocal = dd.num_local_points;
        Self {
            y_ext: ExtendedField::new(nlocal, dd.nover, num_states),
            rel_vol_ext: ExtendedField::new(nlocal, dd.nover, 1),
            rhs_ext: ExtendedField::new(nlocal, dd.nover, num_states),
            rhs_conv: vec![0.0; nlocal * num_states],
            rhs_diff: vec![0.0; nlocal * num_states],
            rhs_chem: vec![0.0; nlocal * num_states],
        }
    }
}

/// Transport data at the `num_local_points + 1` interfaces `j - 1/2` of one rank, plus the
/// per-point heat capacities. Rebuilt by every residual evaluation.
#[derive(Debug, Clone)]
pub struct TransportSample {
    pub thermal_conductivity: Vec<f64>,
    pub mixture_viscosity: Vec<f64>,
    pub mixture_specific_heat_mid: Vec<f64>,
    pub molecular_mass_mid: Vec<f64>,
    /// interface-major, `num_species` per interface
    pub species_mass_flux: Vec<f64>,
    pub species_lewis_numbers: Vec<f64>,
    /// per point
    pub mixture_specific_heat: Vec<f64>,
    /// point-major, `num_species` per point
    pub species_specific_heats: Vec<f64>,
}

impl TransportSample {
    fn new(num_local_points: usize, num_species: usize) -> Self {
        let ni = num_local_points + 1;
        Self {
            thermal_conductivity: vec![0.0; ni],
            mixture_viscosity: vec![0.0; ni],
            mixture_specific_heat_mid: vec![0.0; ni],
            molecular_mass_mid: vec![0.0; ni],
            species_mass_flux: vec![0.0; ni * num_species],
            species_lewis_numbers: vec![0.0; ni * num_species],
            mixture_specific_heat: vec![0.0; num_local_points],
            species_specific_heats: vec![0.0; num_local_points * num_species],
        }
    }
}

/// Pseudo-unsteady continuation data
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoUnsteady {
    pub dt: f64,
    pub y_old: Vec<f64>,
}

pub struct FlameSession {
    pub config: FlameConfig,
    pub flame_type: FlameType,
    pub geometry: Geometry,
    pub scheme: ConvectiveScheme,
    pub grid: GlobalGrid,
    pub decomposition: DomainDecomposition,
    pub local_grid: LocalGrid,
    pub comm: Box<dyn Communicator>,
    pub reactor: Box<dyn ReactorService>,
    pub transport: Box<dyn TransportService>,
    pub num_species: usize,
    pub num_states: usize,
    pub streams: InletStreams,
    pub boundary: BoundaryState,
    pub policy: BoundaryConditionPolicy,
    pub work: FlameWorkspace,
    pub transport_sample: TransportSample,
    pub diagnostics: FlameDiagnostics,
    /// local fixed temperature profile (normalized), replaces the energy equation
    pub fixed_temperature: Option<Vec<f64>>,
    pub pseudo_unsteady: Option<PseudoUnsteady>,
    /// also write the residual into `work.rhs_ext` and exchange its halo
    pub exchange_residual_halo: bool,
    /// strain rate imposed in the infinite separation momentum equation, 1/s
    pub strain_rate: f64,
    pub(crate) step_limiter: Vec<f64>,
    pub(crate) inv_molecular_mass: Vec<f64>,
    pub(crate) fuel_species: Vec<usize>,
}

/// `v = (R T_ref / p) theta sum(Y_k / W_k)`, m^3/kg
pub fn relative_volume(rt_over_p: f64, theta: f64, mass_fractions: &[f64], inv_mw: &[f64]) -> f64 {
    let mix: f64 = mass_fractions.iter().zip(inv_mw).map(|(y, w)| y * w).sum();
    rt_over_p * theta * mix
}

fn resolve_composition(
    names: &[String],
    composition: &HashMap<String, f64>,
    label: &str,
) -> Result<Vec<f64>, FlameError> {
    let mut values = vec![0.0; names.len()];
    for (species, fraction) in composition {
        let k = names.iter().position(|n| n == species).ok_or_else(|| {
            FlameError::Configuration(format!("{}: unknown species '{}'", label, species))
        })?;
        values[k] = *fraction;
    }
    let total: f64 = values.iter().sum();
    if !composition.is_empty() && (total - 1.0).abs() > 1e-6 {
        warn!("{}: mass fractions sum to {:.8}", label, total);
    }
    Ok(values)
}

impl FlameSession {
    pub fn new(
        config: FlameConfig,
        comm: Box<dyn Communicator>,
        reactor: Box<dyn ReactorService>,
        transport: Box<dyn TransportService>,
    ) -> Result<Self, FlameError> {
        config.validate()?;
        let flame_type = config.flame()?;
        let geometry = config.geometry()?;
        let scheme = config.scheme()?;
        let num_species = reactor.num_species();
        let num_states = reactor.num_states();
        let expected = num_species + if config.finite_separation { 4 } else { 3 };
        if num_states != expected {
            return Err(FlameError::Configuration(format!(
                "reactor reports {} states per point, the separation mode needs {}",
                num_states, expected
            )));
        }
        if reactor.molecular_weights().len() != num_species {
            return Err(FlameError::Dimension(
                "molecular weights do not match the species count".into(),
            ));
        }
        let grid = config.build_grid()?;
        if scheme.reach() > config.halo_width {
            return Err(FlameError::Configuration(format!(
                "halo width {} is narrower than the convective stencil",
                config.halo_width
            )));
        }
        let decomposition = DomainDecomposition::new(
            grid.num_points(),
            comm.size(),
            comm.rank(),
            config.halo_width,
        )?;
        let local_grid = LocalGrid::new(&grid, &decomposition);
        info!("grid and local partition processed!");

        let names = reactor.species_names().to_vec();
        let inv_molecular_mass: Vec<f64> =
            reactor.molecular_weights().iter().map(|w| 1.0 / w).collect();
        let rt_over_p = reactor.gas_constant() * config.ref_temperature / config.pressure;
        let fuel_theta = config.fuel_temperature / config.ref_temperature;
        let oxidizer_theta = config.oxidizer_temperature / config.ref_temperature;
        let fuel = resolve_composition(&names, &config.inlet_fuel_comp, "inlet_fuel_comp")?;
        let inlet = resolve_composition(&names, &config.inlet_full_comp, "inlet_full_comp")?;
        let oxidizer =
            resolve_composition(&names, &config.inlet_oxidizer_comp, "inlet_oxidizer_comp")?;
        let streams = InletStreams {
            fuel_relative_volume: relative_volume(rt_over_p, fuel_theta, &fuel, &inv_molecular_mass),
            inlet_relative_volume: relative_volume(
                rt_over_p,
                fuel_theta,
                &inlet,
                &inv_molecular_mass,
            ),
            oxidizer_relative_volume: relative_volume(
                rt_over_p,
                oxidizer_theta,
                &oxidizer,
                &inv_molecular_mass,
            ),
            fuel_mass_fractions: fuel,
            inlet_mass_fractions: inlet,
            oxidizer_mass_fractions: oxidizer,
            fuel_temperature: fuel_theta,
            oxidizer_temperature: oxidizer_theta,
        };
        let fuel_species = config
            .fuel_species
            .iter()
            .map(|s| {
                names.iter().position(|n| n == s).ok_or_else(|| {
                    FlameError::Configuration(format!("fuel species '{}' is not in the mechanism", s))
                })
            })
            .collect::<Result<Vec<usize>, FlameError>>()?;
        info!("inlet streams processed!");

        let (z_left, z_right) = grid.bounds();
        let stagnation_position = config
            .stagnation_position
            .unwrap_or(0.5 * (z_left + z_right));
        let policy = BoundaryConditionPolicy {
            flame_type,
            finite_separation: config.finite_separation,
            num_species,
            stagnation_index: grid.closest_index(stagnation_position),
        };
        let boundary = BoundaryState::new(&streams, config.mass_flux_fuel, config.mass_flux_oxidizer);
        let work = FlameWorkspace::new(&decomposition, num_states);
        let transport_sample = TransportSample::new(decomposition.num_local_points, num_species);
        let step_limiter = vec![config.step_limiter; reactor.num_reactions()];
        let exchange_residual_halo = config.preconditioner == PreconditionerKind::Bbd;
        let strain_rate = config.strain_rate;
        if decomposition.is_first_rank() {
            info!(
                "flame session: {:?}, {:?}, {:?}, {} species, {} states per point, finite separation {}",
                flame_type, geometry, scheme, num_species, num_states, config.finite_separation
            );
        }
        Ok(Self {
            config,
            flame_type,
            geometry,
            scheme,
            grid,
            decomposition,
            local_grid,
            comm,
            reactor,
            transport,
            num_species,
            num_states,
            streams,
            boundary,
            policy,
            work,
            transport_sample,
            diagnostics: FlameDiagnostics::default(),
            fixed_temperature: None,
            pseudo_unsteady: None,
            exchange_residual_halo,
            strain_rate,
            step_limiter,
            inv_molecular_mass,
            fuel_species,
        })
    }

    pub fn num_local_points(&self) -> usize {
        self.decomposition.num_local_points
    }

    /// length of the locally owned state vector
    pub fn local_length(&self) -> usize {
        self.decomposition.num_local_points * self.num_states
    }

    /// global index of the first locally owned state
    pub fn first_global_state(&self) -> usize {
        self.decomposition.first_global_point() * self.num_states
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// `R T_ref / p`
    pub fn rt_over_p(&self) -> f64 {
        self.reactor.gas_constant() * self.config.ref_temperature / self.config.pressure
    }

    /// Replaces the energy equation by `theta_j - profile_j` (normalized temperatures of the
    /// local points); `None` restores it.
    pub fn set_fixed_temperature(&mut self, profile: Option<Vec<f64>>) -> Result<(), FlameError> {
        if let Some(p) = &profile {
            if p.len() != self.num_local_points() {
                return Err(FlameError::Dimension(format!(
                    "fixed temperature profile has {} points, {} are owned",
                    p.len(),
                    self.num_local_points()
                )));
            }
        }
        self.fixed_temperature = profile;
        Ok(())
    }

    pub fn set_pseudo_unsteady(&mut self, dt: f64, y_old: Vec<f64>) -> Result<(), FlameError> {
        if !(dt > 0.0) {
            return Err(FlameError::Configuration(format!(
                "pseudo-unsteady time step must be positive, got {}",
                dt
            )));
        }
        if y_old.len() != self.local_length() {
            return Err(FlameError::Dimension(format!(
                "previous state has {} entries, {} expected",
                y_old.len(),
                self.local_length()
            )));
        }
        self.pseudo_unsteady = Some(PseudoUnsteady { dt, y_old });
        Ok(())
    }

    /// pseudo-unsteady continuation with the configured initial time step
    pub fn start_pseudo_unsteady(&mut self, y_old: Vec<f64>) -> Result<(), FlameError> {
        self.set_pseudo_unsteady(self.config.pseudo_unsteady_dt, y_old)
    }

    pub fn clear_pseudo_unsteady(&mut self) {
        self.pseudo_unsteady = None;
    }

    pub(crate) fn check_length(&self, what: &str, len: usize) -> Result<(), FlameError> {
        if len != self.local_length() {
            return Err(FlameError::Dimension(format!(
                "{} has {} entries, {} expected",
                what,
                len,
                self.local_length()
            )));
        }
        Ok(())
    }
}
