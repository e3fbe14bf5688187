//! In-process communicator world.
//!
//! `ThreadComm::world(n)` returns one handle per rank; each handle is moved to its own
//! thread. Every ordered pair of ranks (including a rank and itself) has a dedicated
//! unbounded channel, so a send never blocks and messages between two ranks are received
//! in the order they were posted.
use crate::Parallel::communicator::{CommError, Communicator, ReduceOp};
use crossbeam_channel::{Receiver, Sender, unbounded};

pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// senders[dest]
    senders: Vec<Sender<Vec<f64>>>,
    /// receivers[source]
    receivers: Vec<Receiver<Vec<f64>>>,
}

impl ThreadComm {
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mut senders: Vec<Vec<Sender<Vec<f64>>>> = vec![Vec::with_capacity(size); size];
        let mut receivers: Vec<Vec<Receiver<Vec<f64>>>> = vec![Vec::with_capacity(size); size];
        for dest in 0..size {
            for source in 0..size {
                let (tx, rx) = unbounded();
                senders[source].push(tx);
                receivers[dest].push(rx);
            }
        }
        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                size,
                senders,
                receivers,
            })
            .collect()
    }

    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank >= self.size {
            return Err(CommError::InvalidRank {
                rank,
                size: self.size,
            });
        }
        Ok(())
    }

    fn post(&self, dest: usize, data: Vec<f64>) -> Result<(), CommError> {
        self.check_rank(dest)?;
        self.senders[dest]
            .send(data)
            .map_err(|_| CommError::Disconnected { peer: dest })
    }

    fn take(&self, source: usize) -> Result<Vec<f64>, CommError> {
        self.check_rank(source)?;
        self.receivers[source]
            .recv()
            .map_err(|_| CommError::Disconnected { peer: source })
    }

    fn take_into(&self, source: usize, recv: &mut [f64]) -> Result<(), CommError> {
        let data = self.take(source)?;
        if data.len() != recv.len() {
            return Err(CommError::SizeMismatch {
                expected: recv.len(),
                found: data.len(),
            });
        }
        recv.copy_from_slice(&data);
        Ok(())
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn sendrecv(
        &self,
        send: &[f64],
        dest: usize,
        recv: &mut [f64],
        source: usize,
    ) -> Result<(), CommError> {
        self.post(dest, send.to_vec())?;
        self.take_into(source, recv)
    }

    fn broadcast(&self, buffer: &mut [f64], root: usize) -> Result<(), CommError> {
        self.check_rank(root)?;
        if self.rank == root {
            for dest in (0..self.size).filter(|&d| d != root) {
                self.post(dest, buffer.to_vec())?;
            }
            Ok(())
        } else {
            self.take_into(root, buffer)
        }
    }

    fn all_reduce(&self, value: f64, op: ReduceOp) -> Result<f64, CommError> {
        for dest in 0..self.size {
            self.post(dest, vec![value])?;
        }
        let mut acc: Option<f64> = None;
        for source in 0..self.size {
            let mut item = [0.0];
            self.take_into(source, &mut item)?;
            acc = Some(match acc {
                Some(a) => op.fold(a, item[0]),
                None => item[0],
            });
        }
        Ok(acc.unwrap_or(value))
    }

    fn all_reduce_loc(
        &self,
        value: f64,
        location: usize,
        op: ReduceOp,
    ) -> Result<(f64, usize), CommError> {
        for dest in 0..self.size {
            self.post(dest, vec![value, location as f64])?;
        }
        let mut acc: Option<(f64, usize)> = None;
        for source in 0..self.size {
            let mut item = [0.0; 2];
            self.take_into(source, &mut item)?;
            let item = (item[0], item[1] as usize);
            acc = Some(match acc {
                Some(a) => op.fold_located(a, item),
                None => item,
            });
        }
        Ok(acc.unwrap_or((value, location)))
    }

    fn gather(&self, send: &[f64], root: usize) -> Result<Option<Vec<f64>>, CommError> {
        self.post(root, send.to_vec())?;
        if self.rank != root {
            return Ok(None);
        }
        let mut gathered = Vec::new();
        for source in 0..self.size {
            gathered.extend(self.take(source)?);
        }
        Ok(Some(gathered))
    }

    fn scatter(
        &self,
        send: Option<&[f64]>,
        recv: &mut [f64],
        root: usize,
    ) -> Result<(), CommError> {
        self.check_rank(root)?;
        if self.rank == root {
            let send = send.ok_or(CommError::MissingBuffer { root })?;
            let chunk = recv.len();
            if send.len() != chunk * self.size {
                return Err(CommError::SizeMismatch {
                    expected: chunk * self.size,
                    found: send.len(),
                });
            }
            for dest in 0..self.size {
                self.post(dest, send[dest * chunk..(dest + 1) * chunk].to_vec())?;
            }
        }
        self.take_into(root, recv)
    }
}
