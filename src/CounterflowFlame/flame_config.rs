//! # Flame configuration
//!
//! ## Purpose
//! Run parameters of a steady counterflow flame, read from a JSON document. Every field has a
//! default, so a file only needs to list what differs from it. Selectors follow the usual input
//! conventions of the flame codes (integers for scheme, geometry and flame type) and are resolved
//! to typed enums by [`FlameConfig::validate`].
//!
//! ## Example
//! ```json
//! {
//!   "pressure": 101325.0,
//!   "num_points": 64,
//!   "length": 0.02,
//!   "flame_type": 0,
//!   "convective_scheme_type": 1,
//!   "inlet_fuel_comp": {"FUEL": 1.0},
//!   "inlet_oxidizer_comp": {"OX": 0.233, "PROD": 0.767},
//!   "preconditioner": "approximate_factorization"
//! }
//! ```
use crate::CounterflowFlame::convective_scheme::ConvectiveScheme;
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_grid::GlobalGrid;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlameType {
    /// fuel against oxidizer
    Diffusion,
    /// premixed reactants against their mirror image; zero-gradient at the high end
    PremixedTwin,
    /// premixed reactants against hot products
    PremixedSingle,
}

impl FlameType {
    pub fn from_selector(selector: i32) -> Result<Self, FlameError> {
        match selector {
            0 => Ok(FlameType::Diffusion),
            1 => Ok(FlameType::PremixedTwin),
            2 => Ok(FlameType::PremixedSingle),
            other => Err(FlameError::Configuration(format!(
                "unknown flame type {} (0 = diffusion, 1 = premixed twin, 2 = premixed single)",
                other
            ))),
        }
    }

    pub fn is_premixed(&self) -> bool {
        !matches!(self, FlameType::Diffusion)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    Planar,
    Axisymmetric,
}

impl Geometry {
    pub fn from_selector(selector: i32) -> Result<Self, FlameError> {
        match selector {
            0 => Ok(Geometry::Planar),
            1 => Ok(Geometry::Axisymmetric),
            other => Err(FlameError::Configuration(format!(
                "unknown simulation type {} (0 = planar, 1 = axisymmetric)",
                other
            ))),
        }
    }

    /// 1 + sigma
    pub fn factor(&self) -> f64 {
        match self {
            Geometry::Planar => 1.0,
            Geometry::Axisymmetric => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionerKind {
    Bbd,
    ApproximateFactorization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlameConfig {
    /// Pa
    pub pressure: f64,
    pub num_points: usize,
    /// domain is [0, length], m
    pub length: f64,
    /// explicit interior positions; uniform spacing when absent
    pub grid: Option<Vec<f64>>,
    /// 0 = diffusion, 1 = premixed twin, 2 = premixed single
    pub flame_type: i32,
    /// 0 = planar, 1 = axisymmetric
    pub simulation_type: i32,
    /// 0 = first order upwind, 1 = second order upwind, 2 = centered
    pub convective_scheme_type: i32,
    pub finite_separation: bool,
    pub inlet_fuel_comp: HashMap<String, f64>,
    pub inlet_oxidizer_comp: HashMap<String, f64>,
    /// premixed inlet mixture
    pub inlet_full_comp: HashMap<String, f64>,
    /// species counted as fuel by the flame speed diagnostic
    pub fuel_species: Vec<String>,
    /// K
    pub fuel_temperature: f64,
    /// K
    pub oxidizer_temperature: f64,
    pub ref_temperature: f64,
    pub ref_momentum: f64,
    /// kg/(m^2 s), infinite separation
    pub mass_flux_fuel: f64,
    pub mass_flux_oxidizer: f64,
    /// 1/s, imposed in the infinite separation momentum equation
    pub strain_rate: f64,
    /// m; mid-domain when absent
    pub stagnation_position: Option<f64>,
    pub diffusion_correction: bool,
    pub step_limiter: f64,
    pub pseudo_unsteady_dt: f64,
    pub preconditioner: PreconditionerKind,
    pub halo_width: usize,
    /// BBD retained half bandwidth; smallest interference-free value when absent
    pub num_off_diagonals: Option<usize>,
    pub perturbation_relative: f64,
    pub perturbation_absolute: f64,
    /// AF diagonal shift
    pub af_shift: f64,
    pub store_jacobian: bool,
    pub chemistry_refresh_interval: usize,
}

impl Default for FlameConfig {
    fn default() -> Self {
        Self {
            pressure: 101325.0,
            num_points: 32,
            length: 0.02,
            grid: None,
            flame_type: 0,
            simulation_type: 1,
            convective_scheme_type: 2,
            finite_separation: true,
            inlet_fuel_comp: HashMap::new(),
            inlet_oxidizer_comp: HashMap::new(),
            inlet_full_comp: HashMap::new(),
            fuel_species: Vec::new(),
            fuel_temperature: 300.0,
            oxidizer_temperature: 300.0,
            ref_temperature: 1000.0,
            ref_momentum: 1000.0,
            mass_flux_fuel: 0.0,
            mass_flux_oxidizer: 0.0,
            strain_rate: 100.0,
            stagnation_position: None,
            diffusion_correction: false,
            step_limiter: 1.0e300,
            pseudo_unsteady_dt: 1.0e-3,
            preconditioner: PreconditionerKind::ApproximateFactorization,
            halo_width: 2,
            num_off_diagonals: None,
            perturbation_relative: 1.0e-6,
            perturbation_absolute: 1.0e-14,
            af_shift: 1.0e5,
            store_jacobian: false,
            chemistry_refresh_interval: 1,
        }
    }
}

impl FlameConfig {
    pub fn from_json_str(content: &str) -> Result<Self, FlameError> {
        let config: FlameConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FlameError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String, FlameError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn flame(&self) -> Result<FlameType, FlameError> {
        FlameType::from_selector(self.flame_type)
    }

    pub fn geometry(&self) -> Result<Geometry, FlameError> {
        Geometry::from_selector(self.simulation_type)
    }

    pub fn scheme(&self) -> Result<ConvectiveScheme, FlameError> {
        ConvectiveScheme::from_selector(self.convective_scheme_type)
    }

    pub fn validate(&self) -> Result<(), FlameError> {
        let flame = self.flame()?;
        self.geometry()?;
        self.scheme()?;
        let positive = [
            ("pressure", self.pressure),
            ("length", self.length),
            ("fuel_temperature", self.fuel_temperature),
            ("oxidizer_temperature", self.oxidizer_temperature),
            ("ref_temperature", self.ref_temperature),
            ("ref_momentum", self.ref_momentum),
            ("step_limiter", self.step_limiter),
            ("pseudo_unsteady_dt", self.pseudo_unsteady_dt),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(FlameError::Configuration(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if self.num_points == 0 {
            return Err(FlameError::Configuration("num_points must be positive".into()));
        }
        if self.chemistry_refresh_interval == 0 {
            return Err(FlameError::Configuration(
                "chemistry_refresh_interval must be at least 1".into(),
            ));
        }
        if self.perturbation_relative <= 0.0 && self.perturbation_absolute <= 0.0 {
            return Err(FlameError::Configuration(
                "finite-difference perturbation would vanish".into(),
            ));
        }
        if let Some(grid) = &self.grid {
            if grid.len() != self.num_points {
                return Err(FlameError::Configuration(format!(
                    "grid lists {} positions for {} points",
                    grid.len(),
                    self.num_points
                )));
            }
        }
        if flame.is_premixed() {
            if self.inlet_full_comp.is_empty() {
                return Err(FlameError::Configuration(
                    "premixed flames need inlet_full_comp".into(),
                ));
            }
        } else if self.inlet_fuel_comp.is_empty() {
            return Err(FlameError::Configuration(
                "diffusion flames need inlet_fuel_comp".into(),
            ));
        }
        if self.inlet_oxidizer_comp.is_empty() {
            return Err(FlameError::Configuration("inlet_oxidizer_comp is empty".into()));
        }
        if self.fuel_species.is_empty() {
            warn!("no fuel species listed: the flame speed diagnostic will be zero");
        }
        Ok(())
    }

    pub fn build_grid(&self) -> Result<GlobalGrid, FlameError> {
        match &self.grid {
            Some(z) => GlobalGrid::new(z.clone(), 0.0, self.length),
            None => Ok(GlobalGrid::uniform(self.num_points, 0.0, self.length)),
        }
    }
}
