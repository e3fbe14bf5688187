use crate::CounterflowFlame::flame_services::TransportStatus;
use crate::LinearAlgebra::sparse_direct::SolverStatus;
use crate::Parallel::communicator::{CommError, Communicator, ReduceOp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlameError {
    #[error("transport evaluation failed at interface {interface:?}: {status:?}")]
    Transport {
        interface: Option<usize>,
        status: TransportStatus,
    },
    #[error("factorization failed at point {point:?} (z = {z:?} m), solver status {status}")]
    Factorization {
        point: Option<usize>,
        z: Option<f64>,
        status: i32,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("communication error: {0}")]
    Communication(#[from] CommError),
    #[error("dimension mismatch: {0}")]
    Dimension(String),
    #[error("rank {rank} reported a failure")]
    RemoteFailure { rank: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl FlameError {
    /// Integer status handed to the nonlinear solver: positive codes are recoverable
    /// (the solver may retry with a different iterate), negative codes are fatal.
    pub fn status_code(&self) -> i32 {
        match self {
            FlameError::Transport { .. } => 1,
            FlameError::Factorization { .. } => 2,
            FlameError::RemoteFailure { .. } => 3,
            FlameError::Configuration(_) => -1,
            FlameError::Communication(_) => -2,
            FlameError::Dimension(_) => -3,
            FlameError::Io(_) => -4,
            FlameError::Serde(_) => -5,
        }
    }
}

impl From<TransportStatus> for FlameError {
    fn from(status: TransportStatus) -> Self {
        FlameError::Transport {
            interface: None,
            status,
        }
    }
}

impl From<SolverStatus> for FlameError {
    fn from(status: SolverStatus) -> Self {
        FlameError::Factorization {
            point: None,
            z: None,
            status: status.0,
        }
    }
}

/// Turns a local failure into a global one before the next collective.
/// Every rank calls this with the outcome of its own fallible step; if any rank failed,
/// all ranks return an error (the failing ranks their own, the others `RemoteFailure`).
pub(crate) fn agree_on_failure(
    comm: &dyn Communicator,
    local: Result<(), FlameError>,
) -> Result<(), FlameError> {
    let flag = if local.is_err() { 1.0 } else { 0.0 };
    let (failed, rank) = comm.all_reduce_loc(flag, comm.rank(), ReduceOp::Max)?;
    match local {
        Err(e) => Err(e),
        Ok(()) if failed > 0.0 => Err(FlameError::RemoteFailure { rank }),
        Ok(()) => Ok(()),
    }
}
