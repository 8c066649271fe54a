//! Wire types for the Raft RPCs: `RequestVote` and `AppendEntries`, plus
//! the `LogEntry` they carry.
//!
//! A node identity is a plain string (spec §4.2, `node_id`). Terms and log
//! indices are newtypes so a stale comparison (`term < log_index`) is a
//! compile error rather than a silent bug.

use serde::{Deserialize, Serialize};

use kestrel_types::Command;

pub type NodeId = String;

/// Election term. Strictly increasing across the cluster's lifetime;
/// every node updates to the highest term it has seen (spec §4.2,
/// election).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Term(pub u64);

impl Term {
    pub const ZERO: Term = Term(0);

    pub fn next(self) -> Term {
        Term(self.0 + 1)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based position in the replicated log. `LogIndex(0)` denotes "no
/// entries yet" — the same sentinel Raft's `prevLogIndex = 0` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct LogIndex(pub u64);

impl LogIndex {
    pub const ZERO: LogIndex = LogIndex(0);

    pub fn next(self) -> LogIndex {
        LogIndex(self.0 + 1)
    }
}

impl std::fmt::Display for LogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in the replicated log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: Term,
    pub index: LogIndex,
    pub command: Command,
}

/// `RequestVote` RPC (candidate → peer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVote {
    pub term: Term,
    pub candidate_id: NodeId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: Term,
    pub vote_granted: bool,
    pub voter_id: NodeId,
}

/// `AppendEntries` RPC (leader → follower). An empty `entries` vec is a
/// heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntries {
    pub term: Term,
    pub leader_id: NodeId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub leader_commit: LogIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: Term,
    pub success: bool,
    /// The highest index the responder now has matching the leader's log,
    /// used to advance `match_index` without a round of probing (spec
    /// §4.2, "Commit path").
    pub match_index: LogIndex,
    pub responder_id: NodeId,
}

/// `InstallSnapshot` RPC (leader → follower). Sent instead of
/// `AppendEntries` when the follower's `next_index` refers to an entry the
/// leader has already compacted away (spec §4.2, "Snapshotting"; spec §8,
/// S6 — bringing a fresh or far-behind node up to date from a snapshot
/// rather than the full log).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSnapshot {
    pub term: Term,
    pub leader_id: NodeId,
    pub last_included_index: LogIndex,
    pub last_included_term: Term,
    /// The FSM snapshot, already serialized (`Snapshot::to_json_bytes`) so
    /// the transport never needs to know about `kestrel-kernel` types.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSnapshotResponse {
    pub term: Term,
    pub responder_id: NodeId,
}

/// The RPCs a replica can receive. A `Transport` delivers these between
/// nodes; how it delivers them (real sockets, in-memory channels) is left
/// to the implementation (spec §6, HTTP transport is explicitly out of
/// scope for this crate — only the Raft RPC shapes are).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaftMessage {
    RequestVote(RequestVote),
    RequestVoteResponse(RequestVoteResponse),
    AppendEntries(AppendEntries),
    AppendEntriesResponse(AppendEntriesResponse),
    InstallSnapshot(InstallSnapshot),
    InstallSnapshotResponse(InstallSnapshotResponse),
}
