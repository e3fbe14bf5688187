//! Ghost-point storage and the ring halo exchange.
//!
//! An [`ExtendedField`] stores `width` values per point for the `num_local_points`
//! owned points plus `nover` ghost points on each side, in one flat point-major buffer.
//! Points are addressed by their local index: `-nover..0` are the left ghosts and
//! `num_local_points..num_local_points + nover` the right ghosts.
use crate::Parallel::communicator::{CommError, Communicator};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedField {
    data: Vec<f64>,
    width: usize,
    nover: usize,
    num_local_points: usize,
}

impl ExtendedField {
    pub fn new(num_local_points: usize, nover: usize, width: usize) -> Self {
        Self {
            data: vec![0.0; (num_local_points + 2 * nover) * width],
            width,
            nover,
            num_local_points,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn nover(&self) -> usize {
        self.nover
    }

    pub fn num_local_points(&self) -> usize {
        self.num_local_points
    }

    /// flat offset of the first value of local point `j`
    #[inline]
    pub fn offset(&self, j: isize) -> usize {
        let ext = j + self.nover as isize;
        debug_assert!(ext >= 0 && (ext as usize) < self.num_local_points + 2 * self.nover);
        ext as usize * self.width
    }

    #[inline]
    pub fn at(&self, j: isize, k: usize) -> f64 {
        self.data[self.offset(j) + k]
    }

    #[inline]
    pub fn set(&mut self, j: isize, k: usize, value: f64) {
        let idx = self.offset(j) + k;
        self.data[idx] = value;
    }

    pub fn point(&self, j: isize) -> &[f64] {
        let start = self.offset(j);
        &self.data[start..start + self.width]
    }

    pub fn point_mut(&mut self, j: isize) -> &mut [f64] {
        let start = self.offset(j);
        &mut self.data[start..start + self.width]
    }

    pub fn interior(&self) -> &[f64] {
        let start = self.nover * self.width;
        &self.data[start..start + self.num_local_points * self.width]
    }

    pub fn copy_interior_from(&mut self, values: &[f64]) {
        let start = self.nover * self.width;
        self.data[start..start + self.num_local_points * self.width].copy_from_slice(values);
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }
}

/// Fills the ghost points of `field` from the ring neighbours.
///
/// Step one sends the first `nover` owned points to the left neighbour while receiving the
/// right ghosts from the right neighbour; step two sends the last `nover` owned points to the
/// right while receiving the left ghosts. The ring wraps, so the end ranks receive values from
/// the opposite end; boundary conditions overwrite those ghosts afterwards.
pub fn exchange_halo(comm: &dyn Communicator, field: &mut ExtendedField) -> Result<(), CommError> {
    let w = field.width;
    let nover = field.nover;
    let nlocal = field.num_local_points;
    let block = nover * w;
    let left = comm.left_neighbor();
    let right = comm.right_neighbor();

    let send_left = field.data[nover * w..nover * w + block].to_vec();
    let right_ghosts = (nlocal + nover) * w;
    comm.sendrecv(
        &send_left,
        left,
        &mut field.data[right_ghosts..right_ghosts + block],
        right,
    )?;

    let send_right = field.data[nlocal * w..nlocal * w + block].to_vec();
    comm.sendrecv(&send_right, right, &mut field.data[0..block], left)?;
    Ok(())
}
