//! Banded LU factorization with partial pivoting.
//!
//! Storage follows LAPACK's `gbtrf` convention: an `n x n` matrix with `kl` sub- and `ku`
//! super-diagonals is kept column by column in `ldab = 2*kl + ku + 1` rows, entry `A(i, j)`
//! at band row `kl + ku + i - j`. The top `kl` rows receive the fill-in created by row
//! interchanges.
use crate::LinearAlgebra::sparse_direct::SolverStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct BandedMatrix {
    n: usize,
    kl: usize,
    ku: usize,
    ldab: usize,
    data: Vec<f64>,
}

impl BandedMatrix {
    pub fn new(n: usize, kl: usize, ku: usize) -> Self {
        let ldab = 2 * kl + ku + 1;
        Self {
            n,
            kl,
            ku,
            ldab,
            data: vec![0.0; ldab * n],
        }
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn in_band(&self, row: usize, col: usize) -> bool {
        row < self.n && col < self.n && row + self.ku >= col && col + self.kl >= row
    }

    #[inline]
    fn idx(&self, band_row: usize, col: usize) -> usize {
        col * self.ldab + band_row
    }

    #[inline]
    fn band_row(&self, row: usize, col: usize) -> usize {
        self.kl + self.ku + row - col
    }

    /// Writes `A(row, col)`; entries outside the matrix or the band are ignored
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        if self.in_band(row, col) {
            let i = self.idx(self.band_row(row, col), col);
            self.data[i] = value;
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        if self.in_band(row, col) {
            self.data[self.idx(self.band_row(row, col), col)]
        } else {
            0.0
        }
    }

    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; self.n];
        for col in 0..self.n {
            let first = col.saturating_sub(self.ku);
            let last = (col + self.kl).min(self.n - 1);
            for row in first..=last {
                y[row] += self.get(row, col) * x[col];
            }
        }
        y
    }

    /// Factors in place (gbtf2 ordering). A zero pivot in column `j` gives `SolverStatus(j + 1)`.
    pub fn factor(mut self) -> Result<BandedLu, SolverStatus> {
        let n = self.n;
        let kv = self.kl + self.ku;
        let ld = self.ldab;
        let mut pivots = vec![0usize; n];
        let mut ju = 0usize;
        for j in 0..n {
            let km = self.kl.min(n - 1 - j);
            let mut jp = 0;
            let mut best = self.data[j * ld + kv].abs();
            for i in 1..=km {
                let candidate = self.data[j * ld + kv + i].abs();
                if candidate > best {
                    best = candidate;
                    jp = i;
                }
            }
            pivots[j] = j + jp;
            if self.data[j * ld + kv + jp] == 0.0 {
                return Err(SolverStatus(j as i32 + 1));
            }
            ju = ju.max((j + self.ku + jp).min(n - 1));
            if jp != 0 {
                for c in j..=ju {
                    let a = c * ld + kv + j - c;
                    let b = c * ld + kv + j + jp - c;
                    self.data.swap(a, b);
                }
            }
            if km > 0 {
                let pivot = self.data[j * ld + kv];
                for i in 1..=km {
                    self.data[j * ld + kv + i] /= pivot;
                }
                for c in j + 1..=ju {
                    let ujc = self.data[c * ld + kv + j - c];
                    if ujc == 0.0 {
                        continue;
                    }
                    for i in 1..=km {
                        let lij = self.data[j * ld + kv + i];
                        self.data[c * ld + kv + j + i - c] -= lij * ujc;
                    }
                }
            }
        }
        Ok(BandedLu {
            factors: self,
            pivots,
        })
    }
}

/// Factors and pivots of a [`BandedMatrix`]
#[derive(Debug, Clone)]
pub struct BandedLu {
    factors: BandedMatrix,
    pivots: Vec<usize>,
}

impl BandedLu {
    pub fn pivots(&self) -> &[usize] {
        &self.pivots
    }

    pub fn dim(&self) -> usize {
        self.factors.n
    }

    /// Solves `A x = rhs` in place (gbtrs, no transpose)
    pub fn solve(&self, rhs: &mut [f64]) -> Result<(), SolverStatus> {
        let m = &self.factors;
        let n = m.n;
        if rhs.len() != n {
            return Err(SolverStatus::DIMENSION_MISMATCH);
        }
        let kv = m.kl + m.ku;
        let ld = m.ldab;
        if m.kl > 0 {
            for j in 0..n.saturating_sub(1) {
                let lm = m.kl.min(n - 1 - j);
                let l = self.pivots[j];
                if l != j {
                    rhs.swap(l, j);
                }
                let bj = rhs[j];
                for i in 1..=lm {
                    rhs[j + i] -= m.data[j * ld + kv + i] * bj;
                }
            }
        }
        for j in (0..n).rev() {
            let diag = m.data[j * ld + kv];
            if diag == 0.0 {
                return Err(SolverStatus(j as i32 + 1));
            }
            rhs[j] /= diag;
            let bj = rhs[j];
            for i in 1..=kv.min(j) {
                rhs[j - i] -= m.data[j * ld + kv - i] * bj;
            }
        }
        Ok(())
    }
}
