//! Steady-state replication: building `AppendEntries` for a peer,
//! applying one on the follower side, and advancing `commit_index` once a
//! majority has matched.

use std::collections::BTreeMap;

use crate::message::{AppendEntries, AppendEntriesResponse, LogEntry, LogIndex, NodeId, Term};
use crate::replica::state::{LeaderState, PersistentState};

/// Builds the `AppendEntries` the leader should send to `peer`, based on
/// that peer's `next_index`. Empty `entries` is a heartbeat.
pub fn build_append_entries(
    persistent: &PersistentState,
    leader_id: &NodeId,
    leader: &LeaderState,
    peer: &NodeId,
    commit_index: LogIndex,
) -> AppendEntries {
    let next_index = *leader.next_index.get(peer).unwrap_or(&LogIndex::ZERO.next());
    let prev_log_index = LogIndex(next_index.0.saturating_sub(1));
    let prev_log_term = persistent.term_at(prev_log_index);
    let entries: Vec<LogEntry> = persistent
        .log
        .iter()
        .filter(|e| e.index.0 >= next_index.0)
        .cloned()
        .collect();

    AppendEntries {
        term: persistent.current_term,
        leader_id: leader_id.clone(),
        prev_log_index,
        prev_log_term,
        entries,
        leader_commit: commit_index,
    }
}

/// Follower-side handling of an incoming `AppendEntries`. Returns the
/// response and, on success, the (possibly unchanged) new `commit_index`.
pub fn handle_append_entries(
    persistent: &mut PersistentState,
    self_id: &NodeId,
    request: &AppendEntries,
    local_commit_index: LogIndex,
) -> (AppendEntriesResponse, LogIndex) {
    if request.term < persistent.current_term {
        return (
            AppendEntriesResponse {
                term: persistent.current_term,
                success: false,
                match_index: LogIndex::ZERO,
                responder_id: self_id.clone(),
            },
            local_commit_index,
        );
    }

    if request.term > persistent.current_term {
        persistent.current_term = request.term;
        persistent.voted_for = None;
    }

    let log_matches_at_prev = request.prev_log_index == LogIndex::ZERO
        || persistent.term_at(request.prev_log_index) == request.prev_log_term;

    if !log_matches_at_prev {
        return (
            AppendEntriesResponse {
                term: persistent.current_term,
                success: false,
                match_index: LogIndex::ZERO,
                responder_id: self_id.clone(),
            },
            local_commit_index,
        );
    }

    persistent.truncate_and_append(request.prev_log_index.next(), request.entries.clone());
    let new_match_index = persistent.last_log_index();

    let new_commit_index = if request.leader_commit > local_commit_index {
        LogIndex(request.leader_commit.0.min(new_match_index.0))
    } else {
        local_commit_index
    };

    (
        AppendEntriesResponse {
            term: persistent.current_term,
            success: true,
            match_index: new_match_index,
            responder_id: self_id.clone(),
        },
        new_commit_index,
    )
}

/// Leader-side handling of a peer's response: advances `next_index`/
/// `match_index` on success, backs off `next_index` by one on log
/// mismatch so the next probe tries an earlier entry.
pub fn record_append_response(leader: &mut LeaderState, peer: &NodeId, response: &AppendEntriesResponse) {
    if response.success {
        leader.match_index.insert(peer.clone(), response.match_index);
        leader.next_index.insert(peer.clone(), response.match_index.next());
    } else {
        let current = *leader.next_index.get(peer).unwrap_or(&LogIndex(1));
        let backed_off = LogIndex(current.0.saturating_sub(1).max(1));
        leader.next_index.insert(peer.clone(), backed_off);
    }
}

/// Computes the highest index replicated on a strict majority of the
/// cluster (leader counts itself as having every entry up to its own
/// last log index). Only entries from the leader's current term may be
/// committed this way (spec §4.2, Raft's commit-by-current-term rule);
/// older-term entries commit only as a side effect of a later entry
/// committing.
pub fn advance_commit_index(
    persistent: &PersistentState,
    match_index: &BTreeMap<NodeId, LogIndex>,
    self_last_log_index: LogIndex,
    cluster_size: usize,
    current_commit_index: LogIndex,
) -> LogIndex {
    let mut indices: Vec<LogIndex> = match_index.values().copied().collect();
    indices.push(self_last_log_index);
    indices.sort_by(|a, b| b.cmp(a));

    let majority_count = cluster_size / 2 + 1;
    let Some(&candidate) = indices.get(majority_count - 1) else {
        return current_commit_index;
    };

    if candidate <= current_commit_index {
        return current_commit_index;
    }

    if persistent.term_at(candidate) != persistent.current_term {
        return current_commit_index;
    }

    candidate
}
