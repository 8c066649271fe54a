//! # kestrel-consensus: the `ConsensusLayer` component
//!
//! Single-leader Raft: election, log replication, majority commitment,
//! membership changes and snapshotting (spec §4.2). The log, term/vote
//! metadata and FSM snapshots are persisted to `NodeConfig::data_dir` (see
//! [`storage::FileLogStore`]) so a restarted node resumes rather than
//! replaying from nothing. The wire transport is left to the embedder —
//! see [`replica::Transport`] — so this crate stays testable without a
//! real network.

pub mod clock;
pub mod instrumentation;
pub mod message;
pub mod reconfiguration;
pub mod replica;
pub mod storage;

#[cfg(test)]
mod tests;

pub use reconfiguration::{Membership, MembershipError};
pub use replica::{AppliedResult, ConsensusError, NodeConfig, Replica, Transport, TransportError};
