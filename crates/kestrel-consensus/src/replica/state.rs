//! Per-replica Raft state: persistent (survives restarts), volatile
//! (rebuilt from persistent + RPCs), and leader-only volatile (rebuilt on
//! each election).

use std::collections::BTreeMap;

use crate::message::{LogEntry, LogIndex, NodeId, Term};

/// The role a replica currently believes it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Follower => "follower",
            Role::Candidate => "candidate",
            Role::Leader => "leader",
        };
        write!(f, "{s}")
    }
}

/// State that must survive a restart: current term, the vote cast this
/// term (if any), and the log itself. Persisted to disk by
/// [`crate::storage::FileLogStore`] after every mutation (spec §4.2,
/// "durable log/stable storage").
#[derive(Debug, Default)]
pub struct PersistentState {
    pub current_term: Term,
    pub voted_for: Option<NodeId>,
    pub log: Vec<LogEntry>,
    /// Highest index discarded from `log` by compaction; entries at or
    /// below this are only recoverable from the most recent snapshot
    /// (spec §4.2, "Snapshotting").
    pub compacted_through: LogIndex,
    /// The index/term the most recently taken snapshot covers — what a
    /// lagging or newly joined node is sent via `InstallSnapshot` to skip
    /// straight past it.
    pub last_snapshot_index: LogIndex,
    pub last_snapshot_term: Term,
}

impl PersistentState {
    pub fn last_log_index(&self) -> LogIndex {
        self.log.last().map_or(self.last_snapshot_index, |e| e.index)
    }

    pub fn last_log_term(&self) -> Term {
        self.log.last().map_or(self.last_snapshot_term, |e| e.term)
    }

    /// `index` is 1-based; `LogIndex::ZERO` means "before the log". Returns
    /// `None` both for the zero sentinel and for any index compacted away
    /// by a snapshot — callers must check [`Self::compacted_through`]
    /// before relying on this for a log-matching decision.
    pub fn entry_at(&self, index: LogIndex) -> Option<&LogEntry> {
        if index == LogIndex::ZERO || index.0 <= self.compacted_through.0 {
            return None;
        }
        let offset = (index.0 - self.compacted_through.0 - 1) as usize;
        self.log.get(offset)
    }

    pub fn term_at(&self, index: LogIndex) -> Term {
        if index == LogIndex::ZERO {
            return Term::ZERO;
        }
        self.entry_at(index).map_or(Term::ZERO, |e| e.term)
    }

    /// True iff the candidate's log is at least as up to date as ours,
    /// by the comparison in the Raft paper: higher last term wins; on a
    /// tie, longer log wins.
    pub fn is_candidate_log_up_to_date(&self, candidate_last_index: LogIndex, candidate_last_term: Term) -> bool {
        let our_last_term = self.last_log_term();
        if candidate_last_term != our_last_term {
            candidate_last_term > our_last_term
        } else {
            candidate_last_index >= self.last_log_index()
        }
    }

    /// Truncates any entries from `from` onward and appends `new_entries`.
    /// Used when a follower's log diverges from the leader's.
    pub fn truncate_and_append(&mut self, from: LogIndex, new_entries: Vec<LogEntry>) {
        let keep = if from.0 <= self.compacted_through.0 { 0 } else { (from.0 - self.compacted_through.0 - 1) as usize };
        self.log.truncate(keep);
        self.log.extend(new_entries);
    }

    /// True once `prev_log_index` refers to an entry this replica can no
    /// longer produce — the leader must send an `InstallSnapshot` instead
    /// of an ordinary `AppendEntries` for this peer.
    pub fn is_compacted_away(&self, index: LogIndex) -> bool {
        index != LogIndex::ZERO && index.0 <= self.compacted_through.0
    }

    /// Discards log entries covered by a new snapshot up to (and
    /// including) `up_to`, retaining only the most recent `trailing_logs`
    /// of them so a mildly lagging follower can still be caught up with
    /// ordinary `AppendEntries` rather than a full snapshot install (spec
    /// §4.2, "Snapshotting"). `up_to` must not exceed the committed
    /// prefix of the log.
    pub fn compact(&mut self, up_to: LogIndex, trailing_logs: usize) {
        if up_to.0 <= self.compacted_through.0 || up_to.0 > self.last_log_index().0 {
            return;
        }
        let up_to_term = self.term_at(up_to);
        let new_compacted_through =
            LogIndex(up_to.0.saturating_sub(trailing_logs as u64).max(self.compacted_through.0).min(up_to.0));
        if new_compacted_through.0 > self.compacted_through.0 {
            let drop_count = (new_compacted_through.0 - self.compacted_through.0) as usize;
            self.log.drain(0..drop_count.min(self.log.len()));
        }
        self.compacted_through = new_compacted_through;
        self.last_snapshot_index = up_to;
        self.last_snapshot_term = up_to_term;
    }

    /// Replaces this replica's state wholesale with an installed snapshot
    /// boundary: the log is discarded entirely and everything is now only
    /// recoverable via the snapshot itself (spec §8, S6 — "start a fresh
    /// node, restore from snapshot").
    pub fn install_snapshot(&mut self, last_included_index: LogIndex, last_included_term: Term) {
        self.log.clear();
        self.compacted_through = last_included_index;
        self.last_snapshot_index = last_included_index;
        self.last_snapshot_term = last_included_term;
    }
}

/// Volatile state every replica tracks, reset on restart (it is rebuilt
/// from the persistent log and subsequent RPCs rather than stored).
#[derive(Debug, Default)]
pub struct VolatileState {
    pub commit_index: LogIndex,
    pub last_applied: LogIndex,
    pub role: RoleState,
}

#[derive(Debug)]
pub enum RoleState {
    Follower,
    Candidate { votes_received: std::collections::HashSet<NodeId> },
    Leader(LeaderState),
}

impl Default for RoleState {
    fn default() -> Self {
        RoleState::Follower
    }
}

impl RoleState {
    pub fn role(&self) -> Role {
        match self {
            RoleState::Follower => Role::Follower,
            RoleState::Candidate { .. } => Role::Candidate,
            RoleState::Leader(_) => Role::Leader,
        }
    }
}

/// Leader-only volatile state: per-peer replication progress. Reset every
/// time a node becomes leader (spec §4.2, "Log replication").
#[derive(Debug, Default)]
pub struct LeaderState {
    /// Next log index to send to each peer. Initialized to leader's
    /// `last_log_index + 1`.
    pub next_index: BTreeMap<NodeId, LogIndex>,
    /// Highest log index known to be replicated on each peer.
    pub match_index: BTreeMap<NodeId, LogIndex>,
}

impl LeaderState {
    pub fn for_peers(peers: &[NodeId], leader_last_log_index: LogIndex) -> Self {
        let mut next_index = BTreeMap::new();
        let mut match_index = BTreeMap::new();
        for peer in peers {
            next_index.insert(peer.clone(), leader_last_log_index.next());
            match_index.insert(peer.clone(), LogIndex::ZERO);
        }
        Self { next_index, match_index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::{Command, ConfigKey, ProjectId, UserId};

    fn entry(index: u64, term: u64) -> LogEntry {
        LogEntry {
            term: Term(term),
            index: LogIndex(index),
            command: Command::Delete {
                project_id: ProjectId::new(1),
                key: ConfigKey::new("k"),
                actor_id: UserId::new(1),
            },
        }
    }

    #[test]
    fn empty_log_reports_zero_sentinels() {
        let state = PersistentState::default();
        assert_eq!(state.last_log_index(), LogIndex::ZERO);
        assert_eq!(state.last_log_term(), Term::ZERO);
    }

    #[test]
    fn candidate_log_up_to_date_prefers_higher_term() {
        let mut state = PersistentState::default();
        state.log.push(entry(1, 1));
        assert!(state.is_candidate_log_up_to_date(LogIndex(0), Term(2)));
        assert!(!state.is_candidate_log_up_to_date(LogIndex(5), Term(0)));
    }

    #[test]
    fn candidate_log_up_to_date_on_term_tie_compares_length() {
        let mut state = PersistentState::default();
        state.log.push(entry(1, 1));
        state.log.push(entry(2, 1));
        assert!(state.is_candidate_log_up_to_date(LogIndex(2), Term(1)));
        assert!(!state.is_candidate_log_up_to_date(LogIndex(1), Term(1)));
    }

    #[test]
    fn truncate_and_append_drops_diverging_suffix() {
        let mut state = PersistentState::default();
        state.log.push(entry(1, 1));
        state.log.push(entry(2, 1));
        state.log.push(entry(3, 1));
        state.truncate_and_append(LogIndex(2), vec![entry(2, 2)]);
        assert_eq!(state.log.len(), 2);
        assert_eq!(state.log[1].term, Term(2));
    }
}
