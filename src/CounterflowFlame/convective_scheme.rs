//! Convective discretizations.
//!
//! A [`Stencil`] holds the coefficients `(a, b, c, d, e)` of points `(j+2, j+1, j, j-1, j-2)` in
//! the derivative `D(phi)_j`. Upwind schemes pick their branch from the sign of `G_j v_j`.
//! [`ColumnCoefficients`] are the convective entries of one column of the tridiagonal transport
//! operator used by the approximate factorization.
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_grid::LocalGrid;
use crate::Parallel::halo_exchange::ExtendedField;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvectiveScheme {
    FirstOrderUpwind,
    SecondOrderUpwind,
    Centered,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stencil {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
}

impl Stencil {
    /// derivative of variable `k` of `field` at local point `j`
    #[inline]
    pub fn apply(&self, field: &ExtendedField, j: isize, k: usize) -> f64 {
        self.a * field.at(j + 2, k)
            + self.b * field.at(j + 1, k)
            + self.c * field.at(j, k)
            + self.d * field.at(j - 1, k)
            + self.e * field.at(j - 2, k)
    }

    pub fn sum(&self) -> f64 {
        self.a + self.b + self.c + self.d + self.e
    }
}

/// Convective coefficients of column `j`: `bm` is the coefficient of point `j` in row `j-1`,
/// `c` in row `j`, `dp` in row `j+1`; `b` and `d` are the row-`j` coefficients of `j+1` and `j-1`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColumnCoefficients {
    pub bm: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub dp: f64,
}

impl ConvectiveScheme {
    pub fn from_selector(selector: i32) -> Result<Self, FlameError> {
        match selector {
            0 => Ok(ConvectiveScheme::FirstOrderUpwind),
            1 => Ok(ConvectiveScheme::SecondOrderUpwind),
            2 => Ok(ConvectiveScheme::Centered),
            other => Err(FlameError::Configuration(format!(
                "unknown convective scheme type {} (0 = first order upwind, 1 = second order upwind, 2 = centered)",
                other
            ))),
        }
    }

    /// how many points on each side the stencil touches
    pub fn reach(&self) -> usize {
        match self {
            ConvectiveScheme::SecondOrderUpwind => 2,
            _ => 1,
        }
    }

    pub fn stencil(&self, grid: &LocalGrid, j: isize, forward: bool) -> Stencil {
        let mut s = Stencil::default();
        match (self, forward) {
            (ConvectiveScheme::FirstOrderUpwind, true) => {
                s.c = grid.inv_dz(j);
                s.d = -grid.inv_dz(j);
            }
            (ConvectiveScheme::FirstOrderUpwind, false) => {
                s.b = grid.inv_dz(j + 1);
                s.c = -grid.inv_dz(j + 1);
            }
            (ConvectiveScheme::SecondOrderUpwind, true) => {
                let (h0, h1) = (grid.dz(j), grid.dz(j - 1));
                s.c = 1.0 / h0 + 1.0 / (h0 + h1);
                s.d = -(h0 + h1) / (h0 * h1);
                s.e = h0 / h1 / (h0 + h1);
            }
            (ConvectiveScheme::SecondOrderUpwind, false) => {
                let (h1, h2) = (grid.dz(j + 1), grid.dz(j + 2));
                s.a = -h1 / h2 / (h1 + h2);
                s.b = 1.0 / h1 + 1.0 / h2;
                s.c = -1.0 / h1 - 1.0 / (h1 + h2);
            }
            (ConvectiveScheme::Centered, _) => {
                let (h0, h1) = (grid.dz(j), grid.dz(j + 1));
                s.b = h0 / h1 / (h0 + h1);
                s.c = (h1 - h0) / (h1 * h0);
                s.d = -h1 / h0 / (h0 + h1);
            }
        }
        s
    }

    pub fn column(&self, grid: &LocalGrid, j: isize, forward: bool) -> ColumnCoefficients {
        let mut col = ColumnCoefficients::default();
        match (self, forward) {
            (ConvectiveScheme::FirstOrderUpwind, true) => {
                col.c = grid.inv_dz(j);
                col.d = -grid.inv_dz(j);
                col.dp = -grid.inv_dz(j + 1);
            }
            (ConvectiveScheme::FirstOrderUpwind, false) => {
                col.bm = grid.inv_dz(j);
                col.b = grid.inv_dz(j + 1);
                col.c = -grid.inv_dz(j + 1);
            }
            (ConvectiveScheme::SecondOrderUpwind, true) => {
                let (hm, h0, hp) = (grid.dz(j - 1), grid.dz(j), grid.dz(j + 1));
                col.c = 1.0 / h0 + 1.0 / (h0 + hm);
                col.d = -(h0 + hm) / (h0 * hm);
                col.dp = -(hp + h0) / (hp * h0);
            }
            (ConvectiveScheme::SecondOrderUpwind, false) => {
                col.bm = grid.inv_dz(j) + grid.inv_dz(j + 1);
                col.b = grid.inv_dz(j + 1) + grid.inv_dz(j + 2);
                col.c = -grid.inv_dz(j + 1) - 1.0 / (grid.dz(j + 1) + grid.dz(j + 2));
            }
            (ConvectiveScheme::Centered, _) => {
                let (hm, h0, hp, hpp) = (grid.dz(j - 1), grid.dz(j), grid.dz(j + 1), grid.dz(j + 2));
                col.bm = hm / h0 / (hm + h0);
                col.b = h0 / hp / (h0 + hp);
                col.c = (hp - h0) / (hp * h0);
                col.d = -hp / h0 / (h0 + hp);
                col.dp = -hpp / hp / (hp + hpp);
            }
        }
        col
    }
}
