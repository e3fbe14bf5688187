use crate::CounterflowFlame::flame_services::{TransportInput, TransportService, TransportStatus};

/// Conductivity and viscosity follow `(T / 300 K)^0.7`; species diffuse with
/// `j_k = -lambda / (cp Le_k) dY_k/dz`.
#[derive(Debug, Clone)]
pub struct ConstantLewisTransport {
    conductivity_300: f64,
    viscosity_300: f64,
    exponent: f64,
    lewis_numbers: Vec<f64>,
    species_cp: Vec<f64>,
}

impl ConstantLewisTransport {
    pub fn new(lewis_numbers: Vec<f64>, species_cp: Vec<f64>) -> Self {
        Self {
            conductivity_300: 0.026,
            viscosity_300: 1.85e-5,
            exponent: 0.7,
            lewis_numbers,
            species_cp,
        }
    }

    /// matches the heat capacities of `OneStepReactor::methane_like`
    pub fn methane_like() -> Self {
        Self::new(vec![0.97, 1.11, 1.0], vec![2200.0, 1000.0, 1200.0])
    }

    fn check(&self, input: &TransportInput) -> Result<(), TransportStatus> {
        if !(input.temperature > 0.0) || !input.temperature.is_finite() {
            return Err(TransportStatus::InvalidTemperature);
        }
        if !(input.pressure > 0.0) {
            return Err(TransportStatus::InvalidPressure);
        }
        if input.mass_fraction.len() != self.lewis_numbers.len() {
            return Err(TransportStatus::InvalidComposition);
        }
        Ok(())
    }

    fn power_law(&self, reference: f64, temperature: f64) -> f64 {
        reference * (temperature / 300.0).powf(self.exponent)
    }

    fn fickian_flux(
        &self,
        input: &TransportInput,
        conductivity: f64,
        specific_heat: f64,
        mass_flux: &mut [f64],
        lewis: &mut [f64],
    ) -> Result<(), TransportStatus> {
        if !(specific_heat > 0.0) {
            return Err(TransportStatus::InvalidComposition);
        }
        for k in 0..self.lewis_numbers.len() {
            let le = self.lewis_numbers[k];
            mass_flux[k] = -conductivity / (specific_heat * le) * input.grad_mass_fraction[k];
            lewis[k] = le;
        }
        Ok(())
    }
}

impl TransportService for ConstantLewisTransport {
    fn mixture_conductivity(&self, input: &TransportInput) -> Result<f64, TransportStatus> {
        self.check(input)?;
        Ok(self.power_law(self.conductivity_300, input.temperature))
    }

    fn mixture_viscosity(&self, input: &TransportInput) -> Result<f64, TransportStatus> {
        self.check(input)?;
        Ok(self.power_law(self.viscosity_300, input.temperature))
    }

    fn species_mass_flux(
        &self,
        input: &TransportInput,
        mass_flux: &mut [f64],
        lewis: &mut [f64],
    ) -> Result<(), TransportStatus> {
        self.check(input)?;
        let conductivity = self.power_law(self.conductivity_300, input.temperature);
        let cp: f64 = input
            .mass_fraction
            .iter()
            .zip(&self.species_cp)
            .map(|(y, cp)| y * cp)
            .sum();
        self.fickian_flux(input, conductivity, cp, mass_flux, lewis)?;
        // correction velocity: the fluxes must sum to zero
        let total_flux: f64 = mass_flux.iter().sum();
        let total_y: f64 = input.mass_fraction.iter().sum();
        if total_y > 0.0 {
            for (j, y) in mass_flux.iter_mut().zip(&input.mass_fraction) {
                *j -= y / total_y * total_flux;
            }
        }
        Ok(())
    }

    fn species_mass_flux_frozen_thermo(
        &self,
        input: &TransportInput,
        conductivity: f64,
        specific_heat: f64,
        _molecular_mass: f64,
        mass_flux: &mut [f64],
        lewis: &mut [f64],
    ) -> Result<(), TransportStatus> {
        self.check(input)?;
        self.fickian_flux(input, conductivity, specific_heat, mass_flux, lewis)
    }
}
