//! Ghost-point values at the two ends of the domain.
//!
//! The policy only depends on the flame type and the separation mode. The low end is filled
//! on the first rank, the high end on the last rank; the session then broadcasts the scalars
//! that other ranks need.
use crate::CounterflowFlame::flame_config::FlameType;
use crate::Parallel::halo_exchange::ExtendedField;

/// Compositions, relative volumes (m^3/kg) and normalized temperatures of the feed streams
#[derive(Debug, Clone, PartialEq)]
pub struct InletStreams {
    pub fuel_mass_fractions: Vec<f64>,
    pub fuel_relative_volume: f64,
    pub inlet_mass_fractions: Vec<f64>,
    pub inlet_relative_volume: f64,
    pub oxidizer_mass_fractions: Vec<f64>,
    pub oxidizer_relative_volume: f64,
    /// fuel-side temperature over the reference temperature
    pub fuel_temperature: f64,
    pub oxidizer_temperature: f64,
}

/// Boundary scalars that change during a solve and are shared by all ranks
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryState {
    pub mass_flux_fuel: f64,
    pub mass_flux_oxidizer: f64,
    pub p_left: f64,
    pub p_right: f64,
    pub g_right: f64,
    pub oxidizer_mass_fractions: Vec<f64>,
    pub oxidizer_relative_volume: f64,
    pub oxidizer_temperature: f64,
}

impl BoundaryState {
    pub fn new(streams: &InletStreams, mass_flux_fuel: f64, mass_flux_oxidizer: f64) -> Self {
        Self {
            mass_flux_fuel,
            mass_flux_oxidizer,
            p_left: 0.0,
            p_right: 0.0,
            g_right: 0.0,
            oxidizer_mass_fractions: streams.oxidizer_mass_fractions.clone(),
            oxidizer_relative_volume: streams.oxidizer_relative_volume,
            oxidizer_temperature: streams.oxidizer_temperature,
        }
    }

    /// values owned by the last rank, in broadcast order
    pub fn pack_high_end(&self) -> Vec<f64> {
        let mut buffer = vec![
            self.p_right,
            self.g_right,
            self.oxidizer_temperature,
            self.oxidizer_relative_volume,
        ];
        buffer.extend_from_slice(&self.oxidizer_mass_fractions);
        buffer
    }

    pub fn unpack_high_end(&mut self, buffer: &[f64]) {
        self.p_right = buffer[0];
        self.g_right = buffer[1];
        self.oxidizer_temperature = buffer[2];
        self.oxidizer_relative_volume = buffer[3];
        self.oxidizer_mass_fractions.copy_from_slice(&buffer[4..]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryConditionPolicy {
    pub flame_type: FlameType,
    pub finite_separation: bool,
    pub num_species: usize,
    /// global index of the stagnation point (infinite separation continuity)
    pub stagnation_index: usize,
}

impl BoundaryConditionPolicy {
    /// composition entering at the low end
    pub fn low_end_mass_fractions<'a>(&self, streams: &'a InletStreams) -> &'a [f64] {
        if self.flame_type.is_premixed() {
            &streams.inlet_mass_fractions
        } else {
            &streams.fuel_mass_fractions
        }
    }

    pub fn low_end_relative_volume(&self, streams: &InletStreams) -> f64 {
        if self.flame_type.is_premixed() {
            streams.inlet_relative_volume
        } else {
            streams.fuel_relative_volume
        }
    }

    /// Fills the left ghosts of the first rank
    pub fn fill_low_end(
        &self,
        streams: &InletStreams,
        boundary: &mut BoundaryState,
        state: &mut ExtendedField,
        relative_volume: &mut ExtendedField,
    ) {
        let ns = self.num_species;
        let (mflux, temp, mom, pstrain) = (ns, ns + 1, ns + 2, ns + 3);
        let composition = self.low_end_mass_fractions(streams);
        let v = self.low_end_relative_volume(streams);
        if self.finite_separation {
            boundary.p_left = state.at(0, pstrain);
        }
        let first_momentum = state.at(0, mom);
        for j in -(state.nover() as isize)..0 {
            let point = state.point_mut(j);
            point[..ns].copy_from_slice(composition);
            point[mflux] = boundary.mass_flux_fuel;
            point[temp] = streams.fuel_temperature;
            if self.finite_separation {
                point[mom] = 0.0;
                point[pstrain] = boundary.p_left;
            } else {
                point[mom] = first_momentum;
            }
            relative_volume.set(j, 0, v);
        }
    }

    /// Fills the right ghosts of the last rank
    pub fn fill_high_end(
        &self,
        boundary: &mut BoundaryState,
        state: &mut ExtendedField,
        relative_volume: &mut ExtendedField,
    ) {
        let ns = self.num_species;
        let (mflux, temp, mom, pstrain) = (ns, ns + 1, ns + 2, ns + 3);
        let last = state.num_local_points() as isize - 1;
        if self.flame_type == FlameType::PremixedTwin {
            boundary
                .oxidizer_mass_fractions
                .copy_from_slice(&state.point(last)[..ns]);
            boundary.oxidizer_relative_volume = relative_volume.at(last, 0);
            boundary.oxidizer_temperature = state.at(last, temp);
        }
        if self.finite_separation {
            boundary.p_right = state.at(last, pstrain);
            if self.flame_type == FlameType::PremixedTwin {
                boundary.g_right = state.at(last, mom);
            }
        }
        let last_momentum = state.at(last, mom);
        let first_ghost = last + 1;
        for j in first_ghost..first_ghost + state.nover() as isize {
            let point = state.point_mut(j);
            point[..ns].copy_from_slice(&boundary.oxidizer_mass_fractions);
            point[mflux] = boundary.mass_flux_oxidizer;
            point[temp] = boundary.oxidizer_temperature;
            if self.finite_separation {
                point[mom] = if self.flame_type == FlameType::PremixedTwin {
                    boundary.g_right
                } else {
                    0.0
                };
                point[pstrain] = boundary.p_right;
            } else {
                point[mom] = last_momentum;
            }
            relative_volume.set(j, 0, boundary.oxidizer_relative_volume);
        }
    }
}
