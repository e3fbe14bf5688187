//! # Parallel Module
//!
//! Message-passing layer of the counterflow flame core.
//!
//! ## Purpose
//! The flame grid is split into equal contiguous slices, one per rank, arranged on a 1-D ring.
//! All numerical work on a rank is single-threaded; ranks only talk through the blocking
//! point-to-point and collective operations of the [`communicator::Communicator`] trait.
//!
//! ## Main Structures
//! - [`communicator::Communicator`]: sendrecv, broadcast, all-reduce (with location), gather, scatter
//! - [`communicator::SerialComm`]: the one-rank communicator
//! - [`thread_comm::ThreadComm`]: an in-process world of ranks connected by channels, used to run
//!   multi-rank problems inside one process (threads play the role of ranks)
//! - [`domain_decomposition::DomainDecomposition`]: equal slices, halo width, ring neighbours
//! - [`halo_exchange::exchange_halo`]: the two-step ring exchange of ghost points
//!
//! ## Key Features
//! - every collective is deterministic: reductions are folded in rank order, so results are
//!   bitwise identical on all ranks
//! - every rank must reach the same call; there are no timeouts
pub mod communicator;
pub mod domain_decomposition;
pub mod halo_exchange;
pub mod thread_comm;
