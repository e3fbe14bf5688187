use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_session::FlameSession;
use crate::Parallel::communicator::ReduceOp;
use prettytable::{Table, row};

/// Global flame measures, identical on every rank after a residual evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlameDiagnostics {
    /// m/s
    pub flame_speed: f64,
    /// 1/s; the imposed value with infinite separation
    pub strain_rate: f64,
    /// K
    pub max_temperature: f64,
    /// global grid index of the temperature peak
    pub max_temperature_point: usize,
    /// m
    pub flame_thickness: f64,
    /// m^2/s
    pub max_thermal_diffusivity: f64,
}

impl FlameDiagnostics {
    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(row!["Quantity", "Value", "Units"]);
        table.add_row(row!["flame speed", format!("{:.6e}", self.flame_speed), "m/s"]);
        table.add_row(row!["strain rate", format!("{:.6e}", self.strain_rate), "1/s"]);
        table.add_row(row![
            "max temperature",
            format!("{:.3} (point {})", self.max_temperature, self.max_temperature_point),
            "K"
        ]);
        table.add_row(row!["flame thickness", format!("{:.6e}", self.flame_thickness), "m"]);
        table.add_row(row![
            "max thermal diffusivity",
            format!("{:.6e}", self.max_thermal_diffusivity),
            "m^2/s"
        ]);
        table.printstd();
    }
}

impl FlameSession {
    pub(crate) fn update_diagnostics(&mut self) -> Result<(), FlameError> {
        let ns = self.num_species;
        let nst = self.num_states;
        let (mflux, temp) = (ns, ns + 1);
        let tref = self.config.ref_temperature;
        let nlocal = self.num_local_points();
        let total = self.grid.num_points();
        let y = &self.work.y_ext;
        let rv = &self.work.rel_vol_ext;
        let chem = &self.work.rhs_chem;
        let g = &self.local_grid;
        let ts = &self.transport_sample;
        let comm = self.comm.as_ref();

        let mut local_speed = 0.0;
        let mut local_max = (f64::NEG_INFINITY, 0usize);
        let mut local_grad: f64 = 0.0;
        let mut local_alpha: f64 = 0.0;
        for j in 0..nlocal {
            let jj = j as isize;
            let v = rv.at(jj, 0);
            for &k in &self.fuel_species {
                local_speed -= chem[j * nst + k] * g.dzm(jj) / v;
            }
            let theta = y.at(jj, temp);
            if theta > local_max.0 {
                local_max = (theta, self.decomposition.global_index(j));
            }
            local_grad = local_grad.max(((y.at(jj + 1, temp) - theta) * g.inv_dz(jj + 1)).abs());
            let alpha = 0.5
                * (ts.thermal_conductivity[j] + ts.thermal_conductivity[j + 1])
                * v
                / ts.mixture_specific_heat[j];
            local_alpha = local_alpha.max(alpha);
        }

        let inlet_fuel = if self.flame_type.is_premixed() {
            self.fuel_species
                .iter()
                .map(|&k| self.streams.inlet_mass_fractions[k])
                .sum::<f64>()
                / self.streams.inlet_relative_volume
        } else {
            1.0 / self.streams.fuel_relative_volume
        };
        let speed = comm.all_reduce(local_speed, ReduceOp::Sum)?;
        let (theta_max, point) = comm.all_reduce_loc(local_max.0, local_max.1, ReduceOp::Max)?;
        let grad = comm.all_reduce(local_grad, ReduceOp::Max)? * tref;
        let alpha = comm.all_reduce(local_alpha, ReduceOp::Max)?;

        let strain_rate = if self.config.finite_separation {
            // first local maximum of |d(G v)/dz| scanned from the fuel end
            let proxy = |jj: isize| {
                ((y.at(jj + 1, mflux) * rv.at(jj + 1, 0) - y.at(jj, mflux) * rv.at(jj, 0))
                    * g.inv_dz(jj + 1))
                .abs()
            };
            let candidate = (0..nlocal).find(|&j| {
                let jj = j as isize;
                self.decomposition.global_index(j) == total - 1 || proxy(jj + 1) <= proxy(jj)
            });
            let local_first = candidate
                .map(|j| self.decomposition.global_index(j) as f64)
                .unwrap_or(f64::INFINITY);
            let first = comm.all_reduce(local_first, ReduceOp::Min)? as usize;
            let owner = self.decomposition.owner_of_point(first);
            let mut value = [0.0];
            if owner == self.decomposition.rank {
                let j = first - self.decomposition.first_global_point();
                value[0] = proxy(j as isize);
            }
            comm.broadcast(&mut value, owner)?;
            value[0]
        } else {
            self.strain_rate
        };

        let max_temperature = theta_max * tref;
        self.diagnostics = FlameDiagnostics {
            flame_speed: if inlet_fuel > 0.0 { speed / inlet_fuel } else { 0.0 },
            strain_rate,
            max_temperature,
            max_temperature_point: point,
            flame_thickness: if grad > 0.0 {
                (max_temperature - self.config.fuel_temperature) / grad
            } else {
                0.0
            },
            max_thermal_diffusivity: alpha,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_table_prints_without_a_flame() {
        let diagnostics = FlameDiagnostics::default();
        assert_eq!(diagnostics.max_temperature_point, 0);
        diagnostics.pretty_print();
    }
}
