use crate::CounterflowFlame::flame_errors::FlameError;
use crate::Parallel::domain_decomposition::DomainDecomposition;

/// Interior points of the axial domain `[z_left, z_right]` and their spacings.
///
/// `dz[0] = z_0 - z_left`, `dz[j] = z_j - z_{j-1}`, `dz[n] = z_right - z_{n-1}`;
/// `dzm[j] = (dz[j] + dz[j+1]) / 2` is the width of the cell around point `j`.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalGrid {
    z: Vec<f64>,
    z_left: f64,
    z_right: f64,
    dz: Vec<f64>,
    dzm: Vec<f64>,
}

impl GlobalGrid {
    pub fn new(z: Vec<f64>, z_left: f64, z_right: f64) -> Result<Self, FlameError> {
        if z.is_empty() {
            return Err(FlameError::Configuration("grid has no points".into()));
        }
        let n = z.len();
        let mut dz = Vec::with_capacity(n + 1);
        dz.push(z[0] - z_left);
        for j in 1..n {
            dz.push(z[j] - z[j - 1]);
        }
        dz.push(z_right - z[n - 1]);
        if let Some(j) = dz.iter().position(|&h| !(h > 0.0)) {
            return Err(FlameError::Configuration(format!(
                "grid spacing {} is not positive ({:e})",
                j, dz[j]
            )));
        }
        let dzm = (0..n).map(|j| 0.5 * (dz[j] + dz[j + 1])).collect();
        Ok(Self {
            z,
            z_left,
            z_right,
            dz,
            dzm,
        })
    }

    /// `n` points with spacing `(z_right - z_left) / (n + 1)`
    pub fn uniform(n: usize, z_left: f64, z_right: f64) -> Self {
        let h = (z_right - z_left) / (n as f64 + 1.0);
        let z: Vec<f64> = (0..n).map(|j| z_left + (j as f64 + 1.0) * h).collect();
        let dz = vec![h; n + 1];
        let dzm = vec![h; n];
        Self {
            z,
            z_left,
            z_right,
            dz,
            dzm,
        }
    }

    pub fn num_points(&self) -> usize {
        self.z.len()
    }

    pub fn position(&self, j: usize) -> f64 {
        self.z[j]
    }

    pub fn positions(&self) -> &[f64] {
        &self.z
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.z_left, self.z_right)
    }

    pub fn dz(&self) -> &[f64] {
        &self.dz
    }

    pub fn dzm(&self) -> &[f64] {
        &self.dzm
    }

    /// index of the point closest to `z` (first one on ties)
    pub fn closest_index(&self, z: f64) -> usize {
        let mut best = 0;
        for j in 1..self.z.len() {
            if (self.z[j] - z).abs() < (self.z[best] - z).abs() {
                best = j;
            }
        }
        best
    }
}

/// Spacings of one rank's points plus `nover` ghosts on each side, addressed by local index
/// (`-nover..num_local_points + nover`). `dz(j)` is the spacing between `j - 1` and `j`.
/// Outside the domain the boundary spacing is repeated.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalGrid {
    nover: usize,
    dz: Vec<f64>,
    dzm: Vec<f64>,
    inv_dz: Vec<f64>,
    inv_dzm: Vec<f64>,
}

impl LocalGrid {
    pub fn new(grid: &GlobalGrid, dd: &DomainDecomposition) -> Self {
        let n = grid.num_points() as isize;
        let next = dd.num_extended_points();
        let first = dd.first_global_point() as isize - dd.nover as isize;
        let mut dz = Vec::with_capacity(next);
        let mut dzm = Vec::with_capacity(next);
        for e in 0..next as isize {
            let jg = first + e;
            dz.push(grid.dz[jg.clamp(0, n) as usize]);
            dzm.push(if jg < 0 {
                grid.dz[0]
            } else if jg >= n {
                grid.dz[n as usize]
            } else {
                grid.dzm[jg as usize]
            });
        }
        let inv_dz = dz.iter().map(|h| 1.0 / h).collect();
        let inv_dzm = dzm.iter().map(|h| 1.0 / h).collect();
        Self {
            nover: dd.nover,
            dz,
            dzm,
            inv_dz,
            inv_dzm,
        }
    }

    #[inline]
    fn ext(&self, j: isize) -> usize {
        (j + self.nover as isize) as usize
    }

    #[inline]
    pub fn dz(&self, j: isize) -> f64 {
        self.dz[self.ext(j)]
    }

    #[inline]
    pub fn dzm(&self, j: isize) -> f64 {
        self.dzm[self.ext(j)]
    }

    #[inline]
    pub fn inv_dz(&self, j: isize) -> f64 {
        self.inv_dz[self.ext(j)]
    }

    #[inline]
    pub fn inv_dzm(&self, j: isize) -> f64 {
        self.inv_dzm[self.ext(j)]
    }
}
