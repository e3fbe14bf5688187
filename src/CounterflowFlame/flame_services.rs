//! Contracts of the chemistry and transport services used by the flame core.
//!
//! Both services are black boxes: the residual and the preconditioners only rely on the
//! calls below. Reference implementations live in `ReferenceModels`.
use crate::LinearAlgebra::sparse_direct::CompressedPattern;

/// Kinetics evaluator for one grid point.
///
/// A point state is laid out as `[Y_0 .. Y_{ns-1}, G, T, U, (P)]`, temperature normalized by the
/// reference temperature the reactor was built with.
pub trait ReactorService {
    fn num_species(&self) -> usize;
    /// `num_species + 3`, or `+ 4` with finite separation
    fn num_states(&self) -> usize;
    fn num_reactions(&self) -> usize;
    /// J/(mol K)
    fn gas_constant(&self) -> f64;
    /// kg/mol
    fn molecular_weights(&self) -> &[f64];
    fn species_names(&self) -> &[String];

    /// Steady source terms of one point: species rows in 1/s, the temperature row normalized
    /// by the reference temperature, zeros elsewhere. `step_limiter` holds one value per reaction.
    fn time_derivative_steady(&self, state: &[f64], step_limiter: &[f64], source: &mut [f64]);

    /// Compressed-column pattern of the per-point Jacobian
    fn jacobian_pattern(&self) -> &CompressedPattern;

    fn jacobian_size(&self) -> usize {
        self.jacobian_pattern().nnz()
    }

    /// Analytic Jacobian of one point, values ordered as `jacobian_pattern()`.
    /// `convective` is the per-point convective term of the last residual evaluation
    /// (the mass-flux column); `fix_temperature` replaces the temperature row by an identity row.
    fn jacobian_steady(
        &self,
        state: &[f64],
        convective: &[f64],
        fix_temperature: bool,
        momentum_ref: f64,
        step_limiter: &[f64],
        values: &mut [f64],
    );

    /// Mixture cp in J/(kg K) at `temperature` in K; fills the species cp.
    fn mixture_specific_heat_cp(
        &self,
        temperature: f64,
        mass_fractions: &[f64],
        species_cp: &mut [f64],
    ) -> f64;
}

/// Interface state handed to the transport service
#[derive(Debug, Clone, PartialEq)]
pub struct TransportInput {
    pub mass_fraction: Vec<f64>,
    /// 1/m
    pub grad_mass_fraction: Vec<f64>,
    /// K
    pub temperature: f64,
    /// K/m
    pub grad_temperature: f64,
    /// Pa
    pub pressure: f64,
}

impl TransportInput {
    pub fn new(num_species: usize, pressure: f64) -> Self {
        Self {
            mass_fraction: vec![0.0; num_species],
            grad_mass_fraction: vec![0.0; num_species],
            temperature: 0.0,
            grad_temperature: 0.0,
            pressure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    InvalidTemperature,
    InvalidPressure,
    InvalidComposition,
    Other(i32),
}

pub trait TransportService {
    /// W/(m K)
    fn mixture_conductivity(&self, input: &TransportInput) -> Result<f64, TransportStatus>;

    /// Pa s
    fn mixture_viscosity(&self, input: &TransportInput) -> Result<f64, TransportStatus>;

    /// Diffusive mass flux of every species (kg/(m^2 s)) with the mixture-averaged correction,
    /// plus the species Lewis numbers.
    fn species_mass_flux(
        &self,
        input: &TransportInput,
        mass_flux: &mut [f64],
        lewis: &mut [f64],
    ) -> Result<(), TransportStatus>;

    /// Uncorrected flux using the supplied mixture conductivity, cp and molecular mass
    fn species_mass_flux_frozen_thermo(
        &self,
        input: &TransportInput,
        conductivity: f64,
        specific_heat: f64,
        molecular_mass: f64,
        mass_flux: &mut [f64],
        lewis: &mut [f64],
    ) -> Result<(), TransportStatus>;
}
