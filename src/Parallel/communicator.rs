use std::fmt;
use thiserror::Error;

/// Reduction operator of the all-reduce family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

impl ReduceOp {
    pub fn fold(&self, acc: f64, value: f64) -> f64 {
        match self {
            ReduceOp::Sum => acc + value,
            ReduceOp::Max => acc.max(value),
            ReduceOp::Min => acc.min(value),
        }
    }

    /// (value, location) folding; ties keep the smaller location
    pub fn fold_located(&self, acc: (f64, usize), item: (f64, usize)) -> (f64, usize) {
        let better = match self {
            ReduceOp::Sum => return (acc.0 + item.0, acc.1.min(item.1)),
            ReduceOp::Max => item.0 > acc.0,
            ReduceOp::Min => item.0 < acc.0,
        };
        if better || (item.0 == acc.0 && item.1 < acc.1) {
            item
        } else {
            acc
        }
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceOp::Sum => write!(f, "sum"),
            ReduceOp::Max => write!(f, "max"),
            ReduceOp::Min => write!(f, "min"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommError {
    #[error("rank {peer} is no longer reachable")]
    Disconnected { peer: usize },
    #[error("message length mismatch: expected {expected} values, got {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("rank {rank} is outside a world of {size} ranks")]
    InvalidRank { rank: usize, size: usize },
    #[error("root rank {root} did not provide a send buffer")]
    MissingBuffer { root: usize },
}

/// Blocking message-passing substrate. Every rank of the world must reach the same
/// collective call in the same order.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sends `send` to `dest` and receives exactly `recv.len()` values from `source`.
    fn sendrecv(
        &self,
        send: &[f64],
        dest: usize,
        recv: &mut [f64],
        source: usize,
    ) -> Result<(), CommError>;

    /// Overwrites `buffer` on every rank with the content it has on `root`.
    fn broadcast(&self, buffer: &mut [f64], root: usize) -> Result<(), CommError>;

    fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64, CommError>;

    /// Reduction that also returns the location attached to the winning value
    /// (MAXLOC/MINLOC semantics; ties pick the smallest location).
    fn all_reduce_loc(
        &self,
        value: f64,
        location: usize,
        op: ReduceOp,
    ) -> Result<(f64, usize), CommError>;

    /// Concatenates the send buffers of all ranks, in rank order, on `root`.
    /// Buffers may have different lengths. Returns `None` on every other rank.
    fn gather(&self, send: &[f64], root: usize) -> Result<Option<Vec<f64>>, CommError>;

    /// Splits the root buffer into `size` chunks of `recv.len()` values, chunk `r` going to rank `r`.
    fn scatter(&self, send: Option<&[f64]>, recv: &mut [f64], root: usize)
    -> Result<(), CommError>;

    fn left_neighbor(&self) -> usize {
        (self.rank() + self.size() - 1) % self.size()
    }

    fn right_neighbor(&self) -> usize {
        (self.rank() + 1) % self.size()
    }

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Communicator of a world with a single rank
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl SerialComm {
    pub fn new() -> Self {
        SerialComm
    }

    fn check_rank(rank: usize) -> Result<(), CommError> {
        if rank != 0 {
            return Err(CommError::InvalidRank { rank, size: 1 });
        }
        Ok(())
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sendrecv(
        &self,
        send: &[f64],
        dest: usize,
        recv: &mut [f64],
        source: usize,
    ) -> Result<(), CommError> {
        Self::check_rank(dest)?;
        Self::check_rank(source)?;
        if send.len() != recv.len() {
            return Err(CommError::SizeMismatch {
                expected: recv.len(),
                found: send.len(),
            });
        }
        recv.copy_from_slice(send);
        Ok(())
    }

    fn broadcast(&self, _buffer: &mut [f64], root: usize) -> Result<(), CommError> {
        Self::check_rank(root)
    }

    fn all_reduce(&self, value: f64, _op: ReduceOp) -> Result<f64, CommError> {
        Ok(value)
    }

    fn all_reduce_loc(
        &self,
        value: f64,
        location: usize,
        _op: ReduceOp,
    ) -> Result<(f64, usize), CommError> {
        Ok((value, location))
    }

    fn gather(&self, send: &[f64], root: usize) -> Result<Option<Vec<f64>>, CommError> {
        Self::check_rank(root)?;
        Ok(Some(send.to_vec()))
    }

    fn scatter(
        &self,
        send: Option<&[f64]>,
        recv: &mut [f64],
        root: usize,
    ) -> Result<(), CommError> {
        Self::check_rank(root)?;
        let send = send.ok_or(CommError::MissingBuffer { root })?;
        if send.len() != recv.len() {
            return Err(CommError::SizeMismatch {
                expected: recv.len(),
                found: send.len(),
            });
        }
        recv.copy_from_slice(send);
        Ok(())
    }
}
