use crate::CounterflowFlame::flame_services::ReactorService;
use crate::LinearAlgebra::sparse_direct::{CompressedPattern, Orientation};

pub const GAS_CONSTANT: f64 = 8.314462618;

/// One global step `F + s O -> (1 + s) P`, rate `k(T) Y_F Y_O` in 1/s with
/// `k(T) = A exp(-Ta / T)`. Stoichiometric coefficients are mass based.
/// The step limiter `L` caps the rate constant as `k L / (k + L)`.
#[derive(Debug, Clone)]
pub struct OneStepReactor {
    species_names: Vec<String>,
    molecular_weights: Vec<f64>,
    species_cp: Vec<f64>,
    stoichiometry: Vec<f64>,
    fuel: usize,
    oxidizer: usize,
    pre_exponential: f64,
    activation_temperature: f64,
    /// J per kg of fuel
    heat_release: f64,
    ref_temperature: f64,
    num_states: usize,
    pattern: CompressedPattern,
}

impl OneStepReactor {
    /// Three species `FUEL`, `OX`, `PROD` loosely modelled on methane burning in oxygen
    pub fn methane_like(ref_temperature: f64, finite_separation: bool) -> Self {
        Self::new(
            vec!["FUEL".to_string(), "OX".to_string(), "PROD".to_string()],
            vec![0.016, 0.032, 0.028],
            vec![2200.0, 1000.0, 1200.0],
            4.0,
            ref_temperature,
            finite_separation,
        )
    }

    /// The first species is the fuel, the second the oxidizer, the others inert except
    /// the last one, which is the product.
    pub fn new(
        species_names: Vec<String>,
        molecular_weights: Vec<f64>,
        species_cp: Vec<f64>,
        oxidizer_to_fuel: f64,
        ref_temperature: f64,
        finite_separation: bool,
    ) -> Self {
        let ns = species_names.len();
        let mut stoichiometry = vec![0.0; ns];
        stoichiometry[0] = -1.0;
        stoichiometry[1] = -oxidizer_to_fuel;
        stoichiometry[ns - 1] = 1.0 + oxidizer_to_fuel;
        let num_states = ns + if finite_separation { 4 } else { 3 };
        Self {
            species_names,
            molecular_weights,
            species_cp,
            stoichiometry,
            fuel: 0,
            oxidizer: 1,
            pre_exponential: 2.0e9,
            activation_temperature: 1.5e4,
            heat_release: 5.0e7,
            ref_temperature,
            num_states,
            pattern: CompressedPattern::dense(num_states, Orientation::ColumnMajor),
        }
    }

    pub fn with_rate(mut self, pre_exponential: f64, activation_temperature: f64) -> Self {
        self.pre_exponential = pre_exponential;
        self.activation_temperature = activation_temperature;
        self
    }

    pub fn with_heat_release(mut self, heat_release: f64) -> Self {
        self.heat_release = heat_release;
        self
    }

    /// limited rate constant and its derivative with respect to the normalized temperature
    fn rate_constant(&self, theta: f64, limiter: f64) -> (f64, f64) {
        let t = theta * self.ref_temperature;
        if !(t > 0.0) || self.pre_exponential == 0.0 {
            return (0.0, 0.0);
        }
        let k = self.pre_exponential * (-self.activation_temperature / t).exp();
        let dk = k * self.activation_temperature / (t * theta);
        let ratio = limiter / (k + limiter);
        (k * ratio, dk * ratio * ratio)
    }

    fn mixture_cp(&self, y: &[f64]) -> f64 {
        y.iter().zip(&self.species_cp).map(|(y, cp)| y * cp).sum()
    }
}

impl ReactorService for OneStepReactor {
    fn num_species(&self) -> usize {
        self.species_names.len()
    }

    fn num_states(&self) -> usize {
        self.num_states
    }

    fn num_reactions(&self) -> usize {
        1
    }

    fn gas_constant(&self) -> f64 {
        GAS_CONSTANT
    }

    fn molecular_weights(&self) -> &[f64] {
        &self.molecular_weights
    }

    fn species_names(&self) -> &[String] {
        &self.species_names
    }

    fn time_derivative_steady(&self, state: &[f64], step_limiter: &[f64], source: &mut [f64]) {
        let ns = self.num_species();
        source.fill(0.0);
        let (k, _) = self.rate_constant(state[ns + 1], step_limiter[0]);
        let rate = k * state[self.fuel] * state[self.oxidizer];
        for (s, nu) in source[..ns].iter_mut().zip(&self.stoichiometry) {
            *s = nu * rate;
        }
        let cp = self.mixture_cp(&state[..ns]);
        if cp > 0.0 {
            source[ns + 1] = self.heat_release * rate / (cp * self.ref_temperature);
        }
    }

    fn jacobian_pattern(&self) -> &CompressedPattern {
        &self.pattern
    }

    fn jacobian_steady(
        &self,
        state: &[f64],
        convective: &[f64],
        fix_temperature: bool,
        _momentum_ref: f64,
        step_limiter: &[f64],
        values: &mut [f64],
    ) {
        let ns = self.num_species();
        let n = self.num_states;
        let (mflux, temp, mom) = (ns, ns + 1, ns + 2);
        values.fill(0.0);
        // dense column-major: (row, col) at col * n + row
        let mut put = |row: usize, col: usize, v: f64| values[col * n + row] += v;

        let (k, dk) = self.rate_constant(state[temp], step_limiter[0]);
        let (yf, yo) = (state[self.fuel], state[self.oxidizer]);
        let rate = k * yf * yo;
        let mut d_rate = vec![0.0; n];
        d_rate[self.fuel] = k * yo;
        d_rate[self.oxidizer] += k * yf;
        d_rate[temp] = dk * yf * yo;

        for (row, nu) in self.stoichiometry.iter().enumerate() {
            for col in (0..ns).chain(std::iter::once(temp)) {
                put(row, col, nu * d_rate[col]);
            }
        }

        if fix_temperature {
            put(temp, temp, 1.0);
        } else {
            let cp = self.mixture_cp(&state[..ns]);
            if cp > 0.0 {
                let q = self.heat_release / self.ref_temperature;
                for col in 0..ns {
                    put(
                        temp,
                        col,
                        q * (d_rate[col] / cp - rate * self.species_cp[col] / (cp * cp)),
                    );
                }
                put(temp, temp, q * d_rate[temp] / cp);
            }
            put(temp, mflux, convective[temp]);
        }

        for row in 0..ns {
            put(row, mflux, convective[row]);
        }
        put(mom, mflux, convective[mom]);
    }

    fn mixture_specific_heat_cp(
        &self,
        _temperature: f64,
        mass_fractions: &[f64],
        species_cp: &mut [f64],
    ) -> f64 {
        species_cp.copy_from_slice(&self.species_cp);
        self.mixture_cp(mass_fractions)
    }
}
