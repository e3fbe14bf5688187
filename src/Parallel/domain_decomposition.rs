use crate::CounterflowFlame::flame_errors::FlameError;
use log::info;

/// Equal contiguous slices of the global grid on a ring of ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDecomposition {
    pub rank: usize,
    pub size: usize,
    pub num_total_points: usize,
    pub num_local_points: usize,
    /// halo width (ghost points on each side)
    pub nover: usize,
}

impl DomainDecomposition {
    pub fn new(
        num_total_points: usize,
        size: usize,
        rank: usize,
        nover: usize,
    ) -> Result<Self, FlameError> {
        if size == 0 || rank >= size {
            return Err(FlameError::Configuration(format!(
                "rank {} is not part of a world of {} ranks",
                rank, size
            )));
        }
        if num_total_points == 0 || num_total_points % size != 0 {
            return Err(FlameError::Configuration(format!(
                "{} grid points cannot be split into {} equal slices",
                num_total_points, size
            )));
        }
        if nover < 2 {
            return Err(FlameError::Configuration(format!(
                "halo width must be at least 2, got {}",
                nover
            )));
        }
        let num_local_points = num_total_points / size;
        if num_local_points < nover {
            return Err(FlameError::Configuration(format!(
                "{} local points per rank is less than the halo width {}",
                num_local_points, nover
            )));
        }
        if rank == 0 {
            info!(
                "domain decomposition: {} points, {} ranks x {} points, halo width {}",
                num_total_points, size, num_local_points, nover
            );
        }
        Ok(Self {
            rank,
            size,
            num_total_points,
            num_local_points,
            nover,
        })
    }

    pub fn first_global_point(&self) -> usize {
        self.rank * self.num_local_points
    }

    pub fn global_index(&self, j_local: usize) -> usize {
        self.first_global_point() + j_local
    }

    pub fn owner_of_point(&self, j_global: usize) -> usize {
        (j_global / self.num_local_points).min(self.size - 1)
    }

    pub fn is_first_rank(&self) -> bool {
        self.rank == 0
    }

    pub fn is_last_rank(&self) -> bool {
        self.rank == self.size - 1
    }

    pub fn left_neighbor(&self) -> usize {
        (self.rank + self.size - 1) % self.size
    }

    pub fn right_neighbor(&self) -> usize {
        (self.rank + 1) % self.size
    }

    /// number of points in the extended (ghosted) local buffers
    pub fn num_extended_points(&self) -> usize {
        self.num_local_points + 2 * self.nover
    }
}
