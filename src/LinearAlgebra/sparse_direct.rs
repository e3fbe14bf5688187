//! Sparse direct solver contract and its reference implementations.
//!
//! A [`CompressedPattern`] is a compressed-row (CSR) or compressed-column (CSC) index
//! structure; numerical values are passed separately in the same order as `inner_idx`.
//! Solvers are told whether the pattern is new or unchanged since the previous
//! factorization, so that a symbolic analysis can be reused.
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::Parallel::communicator::Communicator;
use log::{debug, info};
use nalgebra::{DMatrix, DVector, Dyn, linalg::LU};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// outer index = row (CSR)
    RowMajor,
    /// outer index = column (CSC)
    ColumnMajor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressedPattern {
    pub nrows: usize,
    pub ncols: usize,
    pub outer_ptr: Vec<usize>,
    pub inner_idx: Vec<usize>,
    pub orientation: Orientation,
}

impl CompressedPattern {
    /// Pattern from a dense row-major flag matrix
    pub fn from_flags(
        nrows: usize,
        ncols: usize,
        flags: &[bool],
        orientation: Orientation,
    ) -> Self {
        let (nouter, ninner) = match orientation {
            Orientation::RowMajor => (nrows, ncols),
            Orientation::ColumnMajor => (ncols, nrows),
        };
        let mut outer_ptr = Vec::with_capacity(nouter + 1);
        let mut inner_idx = Vec::new();
        outer_ptr.push(0);
        for o in 0..nouter {
            for i in 0..ninner {
                let (row, col) = match orientation {
                    Orientation::RowMajor => (o, i),
                    Orientation::ColumnMajor => (i, o),
                };
                if flags[row * ncols + col] {
                    inner_idx.push(i);
                }
            }
            outer_ptr.push(inner_idx.len());
        }
        Self {
            nrows,
            ncols,
            outer_ptr,
            inner_idx,
            orientation,
        }
    }

    pub fn dense(n: usize, orientation: Orientation) -> Self {
        Self::from_flags(n, n, &vec![true; n * n], orientation)
    }

    pub fn nnz(&self) -> usize {
        self.inner_idx.len()
    }

    /// (position, row, column) of every stored entry
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let orientation = self.orientation;
        (0..self.outer_ptr.len().saturating_sub(1)).flat_map(move |o| {
            (self.outer_ptr[o]..self.outer_ptr[o + 1]).map(move |pos| {
                let i = self.inner_idx[pos];
                match orientation {
                    Orientation::RowMajor => (pos, o, i),
                    Orientation::ColumnMajor => (pos, i, o),
                }
            })
        })
    }

    pub fn position(&self, row: usize, col: usize) -> Option<usize> {
        let (o, i) = match self.orientation {
            Orientation::RowMajor => (row, col),
            Orientation::ColumnMajor => (col, row),
        };
        if o + 1 >= self.outer_ptr.len() {
            return None;
        }
        (self.outer_ptr[o]..self.outer_ptr[o + 1]).find(|&pos| self.inner_idx[pos] == i)
    }

    /// Positions of the diagonal entries, `None` if one is not stored
    pub fn diagonal_positions(&self) -> Option<Vec<usize>> {
        (0..self.nrows.min(self.ncols))
            .map(|k| self.position(k, k))
            .collect()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.position(row, col).is_some()
    }
}

/// Nonzero status reported by a direct solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverStatus(pub i32);

impl SolverStatus {
    pub const NOT_FACTORED: SolverStatus = SolverStatus(-1);
    pub const DIMENSION_MISMATCH: SolverStatus = SolverStatus(-2);
    pub const SINGULAR: SolverStatus = SolverStatus(1);
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SolverStatus::NOT_FACTORED => write!(f, "no factorization available (status -1)"),
            SolverStatus::DIMENSION_MISMATCH => write!(f, "dimension mismatch (status -2)"),
            SolverStatus(code) if code > 0 => write!(f, "singular pivot {} (status {})", code, code),
            SolverStatus(code) => write!(f, "status {}", code),
        }
    }
}

pub trait SparseDirectSolver {
    /// true until the first successful factorization
    fn is_first_factor(&self) -> bool;

    fn factor_new_pattern(
        &mut self,
        pattern: &CompressedPattern,
        values: &[f64],
    ) -> Result<(), SolverStatus>;

    /// Refactors with the pattern of the last `factor_new_pattern` call
    fn factor_same_pattern(&mut self, values: &[f64]) -> Result<(), SolverStatus>;

    /// Solves in place with the last factorization
    fn solve(&self, rhs: &mut [f64]) -> Result<(), SolverStatus>;

    /// Forgets the pattern; the next factorization must be a new-pattern one
    fn reset(&mut self);
}

/// Sparse contract on top of nalgebra's dense LU with partial pivoting.
/// Adequate for the small per-point chemistry blocks and for moderate global systems.
#[derive(Debug, Clone, Default)]
pub struct DenseLuSolver {
    pattern: Option<CompressedPattern>,
    lu: Option<LU<f64, Dyn, Dyn>>,
}

impl DenseLuSolver {
    pub fn new() -> Self {
        Self {
            pattern: None,
            lu: None,
        }
    }

    fn factor(&mut self, values: &[f64]) -> Result<(), SolverStatus> {
        let pattern = self.pattern.as_ref().ok_or(SolverStatus::NOT_FACTORED)?;
        if values.len() != pattern.nnz() || pattern.nrows != pattern.ncols {
            return Err(SolverStatus::DIMENSION_MISMATCH);
        }
        let n = pattern.nrows;
        let mut matrix = DMatrix::<f64>::zeros(n, n);
        for (pos, row, col) in pattern.entries() {
            matrix[(row, col)] += values[pos];
        }
        let lu = matrix.lu();
        if !lu.is_invertible() {
            self.lu = None;
            let u = lu.u();
            let pivot = (0..n).find(|&k| u[(k, k)] == 0.0).unwrap_or(0);
            return Err(SolverStatus(pivot as i32 + 1));
        }
        self.lu = Some(lu);
        Ok(())
    }
}

impl SparseDirectSolver for DenseLuSolver {
    fn is_first_factor(&self) -> bool {
        self.pattern.is_none() || self.lu.is_none()
    }

    fn factor_new_pattern(
        &mut self,
        pattern: &CompressedPattern,
        values: &[f64],
    ) -> Result<(), SolverStatus> {
        self.pattern = Some(pattern.clone());
        self.factor(values)
    }

    fn factor_same_pattern(&mut self, values: &[f64]) -> Result<(), SolverStatus> {
        self.factor(values)
    }

    fn solve(&self, rhs: &mut [f64]) -> Result<(), SolverStatus> {
        let (Some(lu), Some(pattern)) = (self.lu.as_ref(), self.pattern.as_ref()) else {
            return Err(SolverStatus::NOT_FACTORED);
        };
        if rhs.len() != pattern.nrows {
            return Err(SolverStatus::DIMENSION_MISMATCH);
        }
        let mut b = DVector::from_column_slice(rhs);
        if !lu.solve_mut(&mut b) {
            return Err(SolverStatus::SINGULAR);
        }
        rhs.copy_from_slice(b.as_slice());
        Ok(())
    }

    fn reset(&mut self) {
        self.pattern = None;
        self.lu = None;
    }
}

/// Distributed sparse direct solve: every rank owns a contiguous block of rows (CSR with global
/// column indices); rows, values and right-hand sides are gathered to rank 0, which factors and
/// solves with the wrapped serial solver, and the solution is scattered back.
/// The status of every root-side operation is broadcast so all ranks fail together.
pub struct RootGatheredSolver {
    inner: Box<dyn SparseDirectSolver>,
    local_rows: usize,
    first: bool,
}

const ROOT: usize = 0;

impl RootGatheredSolver {
    pub fn new(inner: Box<dyn SparseDirectSolver>) -> Self {
        Self {
            inner,
            local_rows: 0,
            first: true,
        }
    }

    pub fn is_first_factor(&self) -> bool {
        self.first
    }

    pub fn reset(&mut self) {
        self.first = true;
        self.inner.reset();
    }

    fn agree(comm: &dyn Communicator, status: Result<(), SolverStatus>) -> Result<(), FlameError> {
        let mut code = [match status {
            Ok(()) => 0.0,
            Err(SolverStatus(code)) => code as f64,
        }];
        comm.broadcast(&mut code, ROOT)?;
        match code[0] as i32 {
            0 => Ok(()),
            code => Err(FlameError::Factorization {
                point: None,
                z: None,
                status: code,
            }),
        }
    }

    /// `local` holds the owned rows (RowMajor, global column indices)
    pub fn factor_new_pattern(
        &mut self,
        comm: &dyn Communicator,
        local: &CompressedPattern,
        values: &[f64],
    ) -> Result<(), FlameError> {
        if local.orientation != Orientation::RowMajor || values.len() != local.nnz() {
            return Err(FlameError::Dimension(
                "distributed factorization expects CSR rows with matching values".to_string(),
            ));
        }
        self.local_rows = local.nrows;
        let row_lengths: Vec<f64> = local
            .outer_ptr
            .windows(2)
            .map(|w| (w[1] - w[0]) as f64)
            .collect();
        let columns: Vec<f64> = local.inner_idx.iter().map(|&c| c as f64).collect();
        let all_lengths = comm.gather(&row_lengths, ROOT)?;
        let all_columns = comm.gather(&columns, ROOT)?;
        let all_values = comm.gather(values, ROOT)?;
        let status = match (all_lengths, all_columns, all_values) {
            (Some(lengths), Some(columns), Some(values)) => {
                let n = lengths.len();
                let mut outer_ptr = Vec::with_capacity(n + 1);
                outer_ptr.push(0);
                for len in &lengths {
                    let last = outer_ptr[outer_ptr.len() - 1];
                    outer_ptr.push(last + *len as usize);
                }
                let global = CompressedPattern {
                    nrows: n,
                    ncols: local.ncols,
                    outer_ptr,
                    inner_idx: columns.iter().map(|&c| c as usize).collect(),
                    orientation: Orientation::RowMajor,
                };
                info!(
                    "sparse direct solver: new pattern with {} rows and {} nonzeros",
                    global.nrows,
                    global.nnz()
                );
                self.inner.factor_new_pattern(&global, &values)
            }
            _ => Ok(()),
        };
        Self::agree(comm, status)?;
        self.first = false;
        Ok(())
    }

    pub fn factor_same_pattern(
        &mut self,
        comm: &dyn Communicator,
        values: &[f64],
    ) -> Result<(), FlameError> {
        let all_values = comm.gather(values, ROOT)?;
        let status = match all_values {
            Some(values) => {
                debug!("sparse direct solver: refactoring with the stored pattern");
                self.inner.factor_same_pattern(&values)
            }
            None => Ok(()),
        };
        Self::agree(comm, status)
    }

    pub fn solve(&self, comm: &dyn Communicator, rhs: &mut [f64]) -> Result<(), FlameError> {
        if rhs.len() != self.local_rows {
            return Err(FlameError::Dimension(format!(
                "right-hand side has {} entries, {} rows are owned",
                rhs.len(),
                self.local_rows
            )));
        }
        let mut gathered = comm.gather(rhs, ROOT)?;
        let status = match gathered.as_mut() {
            Some(global) => self.inner.solve(global),
            None => Ok(()),
        };
        Self::agree(comm, status)?;
        comm.scatter(gathered.as_deref(), rhs, ROOT)?;
        Ok(())
    }
}
