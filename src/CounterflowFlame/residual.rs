//! Steady residual of the counterflow equations.
//!
//! Evaluation order on every rank:
//! 1. relative volume, halo exchange of the state and the relative volume
//! 2. boundary mass fluxes (infinite separation, computed on the end ranks and broadcast)
//! 3. ghost points from the boundary policy
//! 4. chemistry source of every point
//! 5. transport properties at every interface
//! 6. convective / diffusive assembly, fixed temperature and pseudo-unsteady terms
//! 7. optional residual halo, global diagnostics
use crate::CounterflowFlame::flame_errors::{FlameError, agree_on_failure};
use crate::CounterflowFlame::flame_services::{TransportInput, TransportStatus};
use crate::CounterflowFlame::flame_session::{FlameSession, FlameWorkspace, relative_volume};
use crate::Parallel::halo_exchange::exchange_halo;
use log::debug;

impl FlameSession {
    /// Evaluates the residual of the locally owned points. `state` and `residual` hold
    /// `num_local_points * num_states` values in point-major order.
    pub fn residual(&mut self, state: &[f64], residual: &mut [f64]) -> Result<(), FlameError> {
        self.check_length("state", state.len())?;
        self.check_length("residual", residual.len())?;
        self.exchange_state(state)?;
        self.update_boundary_mass_fluxes(state)?;
        self.apply_boundary_conditions()?;
        self.chemistry_source(state);
        let transport = self.refresh_transport_sample();
        agree_on_failure(self.comm.as_ref(), transport)?;
        self.assemble(state, residual);
        if self.exchange_residual_halo {
            self.work.rhs_ext.copy_interior_from(residual);
            exchange_halo(self.comm.as_ref(), &mut self.work.rhs_ext)?;
        }
        self.update_diagnostics()?;
        Ok(())
    }

    fn exchange_state(&mut self, state: &[f64]) -> Result<(), FlameError> {
        let ns = self.num_species;
        let nst = self.num_states;
        let rt_over_p = self.rt_over_p();
        for j in 0..self.num_local_points() {
            let point = &state[j * nst..(j + 1) * nst];
            let v = relative_volume(rt_over_p, point[ns + 1], &point[..ns], &self.inv_molecular_mass);
            self.work.rel_vol_ext.set(j as isize, 0, v);
        }
        self.work.y_ext.copy_interior_from(state);
        exchange_halo(self.comm.as_ref(), &mut self.work.y_ext)?;
        exchange_halo(self.comm.as_ref(), &mut self.work.rel_vol_ext)?;
        Ok(())
    }

    /// `G_fuel = G_0 + (1+s) U_0 U_ref / v_fuel dz_0`, `G_ox = G_{n-1} - (1+s) U_{n-1} U_ref / v_{n-1} dz_n`
    fn update_boundary_mass_fluxes(&mut self, state: &[f64]) -> Result<(), FlameError> {
        if self.config.finite_separation {
            return Ok(());
        }
        let ns = self.num_species;
        let nst = self.num_states;
        let (mflux, mom) = (ns, ns + 2);
        let sigma1 = self.geometry.factor();
        let u_ref = self.config.ref_momentum;
        let dz = self.grid.dz();

        let mut fuel = [self.boundary.mass_flux_fuel];
        if self.decomposition.is_first_rank() {
            let v_ghost = self.policy.low_end_relative_volume(&self.streams);
            fuel[0] = state[mflux] + sigma1 * state[mom] * u_ref / v_ghost * dz[0];
        }
        self.comm.broadcast(&mut fuel, 0)?;
        self.boundary.mass_flux_fuel = fuel[0];

        let mut oxidizer = [self.boundary.mass_flux_oxidizer];
        if self.decomposition.is_last_rank() {
            let last = (self.num_local_points() - 1) * nst;
            let v_last = self.work.rel_vol_ext.at(self.num_local_points() as isize - 1, 0);
            oxidizer[0] = state[last + mflux]
                - sigma1 * state[last + mom] * u_ref / v_last * dz[self.grid.num_points()];
        }
        self.comm.broadcast(&mut oxidizer, self.comm.size() - 1)?;
        self.boundary.mass_flux_oxidizer = oxidizer[0];
        Ok(())
    }

    fn apply_boundary_conditions(&mut self) -> Result<(), FlameError> {
        let FlameWorkspace {
            y_ext, rel_vol_ext, ..
        } = &mut self.work;
        if self.decomposition.is_first_rank() {
            self.policy
                .fill_low_end(&self.streams, &mut self.boundary, y_ext, rel_vol_ext);
        }
        let mut low = [self.boundary.p_left];
        self.comm.broadcast(&mut low, 0)?;
        self.boundary.p_left = low[0];

        if self.decomposition.is_last_rank() {
            self.policy
                .fill_high_end(&mut self.boundary, y_ext, rel_vol_ext);
        }
        let mut high = self.boundary.pack_high_end();
        self.comm.broadcast(&mut high, self.comm.size() - 1)?;
        self.boundary.unpack_high_end(&high);
        Ok(())
    }

    fn chemistry_source(&mut self, state: &[f64]) {
        let nst = self.num_states;
        for j in 0..self.num_local_points() {
            let range = j * nst..(j + 1) * nst;
            self.reactor.time_derivative_steady(
                &state[range.clone()],
                &self.step_limiter,
                &mut self.work.rhs_chem[range],
            );
        }
    }

    /// Interface `j - 1/2` for `j = 0..=num_local_points`
    fn refresh_transport_sample(&mut self) -> Result<(), FlameError> {
        let ns = self.num_species;
        let temp = ns + 1;
        let tref = self.config.ref_temperature;
        let nlocal = self.num_local_points();
        let first = self.decomposition.first_global_point();
        let y = &self.work.y_ext;
        let grid = &self.local_grid;
        let ts = &mut self.transport_sample;
        let mut input = TransportInput::new(ns, self.config.pressure);
        let mut scratch_cp = vec![0.0; ns];

        for j in 0..=nlocal {
            let jj = j as isize;
            let inv_dz = grid.inv_dz(jj);
            for k in 0..ns {
                input.mass_fraction[k] = 0.5 * (y.at(jj, k) + y.at(jj - 1, k));
                input.grad_mass_fraction[k] = inv_dz * (y.at(jj, k) - y.at(jj - 1, k));
            }
            input.temperature = 0.5 * tref * (y.at(jj, temp) + y.at(jj - 1, temp));
            input.grad_temperature = inv_dz * tref * (y.at(jj, temp) - y.at(jj - 1, temp));

            let cp_mid = self.reactor.mixture_specific_heat_cp(
                input.temperature,
                &input.mass_fraction,
                &mut scratch_cp,
            );
            ts.mixture_specific_heat_mid[j] = cp_mid;
            if j < nlocal {
                ts.mixture_specific_heat[j] = self.reactor.mixture_specific_heat_cp(
                    tref * y.at(jj, temp),
                    &y.point(jj)[..ns],
                    &mut ts.species_specific_heats[j * ns..(j + 1) * ns],
                );
            }
            let mix: f64 = input
                .mass_fraction
                .iter()
                .zip(&self.inv_molecular_mass)
                .map(|(y, w)| y * w)
                .sum();
            ts.molecular_mass_mid[j] = 1.0 / mix;

            let at_interface = |status: TransportStatus| {
                debug!("transport failure at interface {}: {:?}", first + j, status);
                FlameError::Transport {
                    interface: Some(first + j),
                    status,
                }
            };
            let conductivity = self
                .transport
                .mixture_conductivity(&input)
                .map_err(at_interface)?;
            ts.thermal_conductivity[j] = conductivity;
            ts.mixture_viscosity[j] = self
                .transport
                .mixture_viscosity(&input)
                .map_err(at_interface)?;
            let flux = &mut ts.species_mass_flux[j * ns..(j + 1) * ns];
            let lewis = &mut ts.species_lewis_numbers[j * ns..(j + 1) * ns];
            if self.config.diffusion_correction {
                self.transport
                    .species_mass_flux(&input, flux, lewis)
                    .map_err(at_interface)?;
            } else {
                self.transport
                    .species_mass_flux_frozen_thermo(
                        &input,
                        conductivity,
                        cp_mid,
                        ts.molecular_mass_mid[j],
                        flux,
                        lewis,
                    )
                    .map_err(at_interface)?;
            }
        }
        Ok(())
    }

    fn assemble(&mut self, state: &[f64], residual: &mut [f64]) {
        let ns = self.num_species;
        let nst = self.num_states;
        let (mflux, temp, mom, pstrain) = (ns, ns + 1, ns + 2, ns + 3);
        let nlocal = self.num_local_points();
        let total = self.grid.num_points();
        let finite = self.config.finite_separation;
        let u_ref = self.config.ref_momentum;
        let sigma1 = self.geometry.factor();
        let stagnation = self.policy.stagnation_index;
        let strain_term =
            self.strain_rate * self.strain_rate / (sigma1 * sigma1) / self.boundary.oxidizer_relative_volume
                / u_ref;
        let FlameWorkspace {
            y_ext: y,
            rel_vol_ext: rv,
            rhs_conv: conv,
            rhs_diff: diff,
            rhs_chem: chem,
            ..
        } = &mut self.work;
        let g = &self.local_grid;
        let ts = &self.transport_sample;
        conv.fill(0.0);
        diff.fill(0.0);

        for j in 0..nlocal {
            let jj = j as isize;
            let jglobal = self.decomposition.global_index(j);
            let row = j * nst;
            let (v, v_p, v_m) = (rv.at(jj, 0), rv.at(jj + 1, 0), rv.at(jj - 1, 0));
            let forward = y.at(jj, mflux) * v > 0.0;
            let st = self.scheme.stencil(g, jj, forward);
            let (inv_dzm, inv_dz, inv_dz_p) = (g.inv_dzm(jj), g.inv_dz(jj), g.inv_dz(jj + 1));
            let flux_m = &ts.species_mass_flux[j * ns..(j + 1) * ns];
            let flux_p = &ts.species_mass_flux[(j + 1) * ns..(j + 2) * ns];

            for k in 0..ns {
                conv[row + k] -= v * st.apply(y, jj, k);
                diff[row + k] -= v * inv_dzm * (flux_p[k] - flux_m[k]);
            }

            let cp = ts.mixture_specific_heat[j];
            let cp_flux_sum: f64 = (0..ns)
                .map(|k| ts.species_specific_heats[j * ns + k] * 0.5 * (flux_m[k] + flux_p[k]))
                .sum();
            let dtheta = st.apply(y, jj, temp);
            conv[row + temp] -= v * dtheta;
            diff[row + temp] -= v * cp_flux_sum / cp * dtheta;
            diff[row + temp] += v * inv_dzm / cp
                * (ts.thermal_conductivity[j + 1] * inv_dz_p * (y.at(jj + 1, temp) - y.at(jj, temp))
                    - ts.thermal_conductivity[j] * inv_dz * (y.at(jj, temp) - y.at(jj - 1, temp)));

            let (g_j, g_p, g_m) = (y.at(jj, mflux), y.at(jj + 1, mflux), y.at(jj - 1, mflux));
            let (u_j, u_p, u_m) = (y.at(jj, mom), y.at(jj + 1, mom), y.at(jj - 1, mom));
            diff[row + mflux] = if finite {
                -(g_j - g_m) * inv_dz - (u_j / v + u_m / v_m) * u_ref
            } else if jglobal < stagnation {
                -(g_p - g_j) * inv_dz_p - sigma1 * u_j / v * u_ref
            } else if jglobal == stagnation {
                g_j
            } else {
                -(g_j - g_m) * inv_dz - sigma1 * u_m / v_m * u_ref
            };

            conv[row + mom] -= v * st.apply(y, jj, mom);
            diff[row + mom] = if finite {
                -y.at(jj, pstrain) * v
            } else {
                strain_term * v
            };
            diff[row + mom] -= u_j * u_j * u_ref;
            diff[row + mom] += inv_dzm
                * v
                * (ts.mixture_viscosity[j + 1] * inv_dz_p * (u_p - u_j)
                    - ts.mixture_viscosity[j] * inv_dz * (u_j - u_m));

            if finite {
                diff[row + pstrain] = if jglobal == total - 1 {
                    -(g_p - g_j) * inv_dz_p - (u_p / v_p + u_j / v) * u_ref
                } else {
                    y.at(jj + 1, pstrain) - y.at(jj, pstrain)
                };
            }
        }

        for j in 0..nlocal {
            let row = j * nst;
            let g_j = state[row + mflux];
            for k in 0..ns {
                residual[row + k] = conv[row + k] * g_j + diff[row + k] + chem[row + k];
            }
            residual[row + mflux] = diff[row + mflux];
            residual[row + temp] = match &self.fixed_temperature {
                Some(profile) => state[row + temp] - profile[j],
                None => conv[row + temp] * g_j + diff[row + temp] + chem[row + temp],
            };
            residual[row + mom] = conv[row + mom] * g_j + diff[row + mom];
            if finite {
                residual[row + pstrain] = diff[row + pstrain];
            }
        }

        if let Some(pseudo) = &self.pseudo_unsteady {
            for j in 0..nlocal {
                let row = j * nst;
                for k in (0..ns).chain([temp, mom]) {
                    residual[row + k] -= (state[row + k] - pseudo.y_old[row + k]) / pseudo.dt;
                }
            }
        }
    }
}
