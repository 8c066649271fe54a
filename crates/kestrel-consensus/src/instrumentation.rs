//! Tracing hooks for role transitions and propose latency. Kept as thin
//! wrappers so the replica's control flow stays readable — call sites
//! read as "became leader", not a cluster of `tracing::info!` calls
//! inline.

use std::time::Duration;

use crate::message::{NodeId, Term};
use crate::replica::state::Role;

pub fn log_role_transition(self_id: &NodeId, from: Role, to: Role, term: Term) {
    tracing::info!(node = %self_id, %from, %to, %term, "role transition");
}

pub fn log_election_started(self_id: &NodeId, term: Term) {
    tracing::info!(node = %self_id, %term, "starting election");
}

pub fn log_election_won(self_id: &NodeId, term: Term, vote_count: usize, cluster_size: usize) {
    tracing::info!(node = %self_id, %term, vote_count, cluster_size, "won election");
}

pub fn log_propose(self_id: &NodeId, outcome: &str, elapsed: Duration) {
    tracing::info!(node = %self_id, outcome, elapsed_ms = elapsed.as_millis() as u64, "propose completed");
}

pub fn log_membership_change(self_id: &NodeId, change: &str, node_id: &NodeId) {
    tracing::info!(node = %self_id, change, target = %node_id, "membership change");
}

pub fn log_persist_failed(self_id: &NodeId, what: &str, error: &crate::storage::StorageError) {
    tracing::warn!(node = %self_id, what, %error, "failed to persist durable state to disk");
}

pub fn log_snapshot_taken(self_id: &NodeId, last_included_index: crate::message::LogIndex, compacted_through: crate::message::LogIndex) {
    tracing::info!(node = %self_id, %last_included_index, %compacted_through, "took fsm snapshot and compacted log");
}

pub fn log_snapshot_installed(self_id: &NodeId, last_included_index: crate::message::LogIndex) {
    tracing::info!(node = %self_id, %last_included_index, "installed snapshot from leader");
}
