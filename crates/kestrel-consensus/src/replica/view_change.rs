//! Leader election: starting a candidacy, deciding votes, and tallying
//! them into a majority.

use std::collections::HashSet;

use crate::message::{NodeId, RequestVote, RequestVoteResponse, Term};
use crate::replica::state::{PersistentState, RoleState};

/// Begins a new election: bumps the term, votes for self, and returns the
/// `RequestVote` to broadcast to every peer.
pub fn start_election(persistent: &mut PersistentState, self_id: &NodeId) -> RequestVote {
    persistent.current_term = persistent.current_term.next();
    persistent.voted_for = Some(self_id.clone());
    RequestVote {
        term: persistent.current_term,
        candidate_id: self_id.clone(),
        last_log_index: persistent.last_log_index(),
        last_log_term: persistent.last_log_term(),
    }
}

/// Decides whether to grant a vote. A node votes for at most one
/// candidate per term and only if that candidate's log is at least as
/// up to date as its own (spec §4.2, safety via the election restriction).
pub fn decide_vote(
    persistent: &mut PersistentState,
    self_id: &NodeId,
    request: &RequestVote,
) -> RequestVoteResponse {
    if request.term < persistent.current_term {
        return RequestVoteResponse {
            term: persistent.current_term,
            vote_granted: false,
            voter_id: self_id.clone(),
        };
    }

    if request.term > persistent.current_term {
        persistent.current_term = request.term;
        persistent.voted_for = None;
    }

    let already_voted_elsewhere = persistent
        .voted_for
        .as_ref()
        .is_some_and(|voted| voted != &request.candidate_id);

    let log_ok = persistent.is_candidate_log_up_to_date(request.last_log_index, request.last_log_term);

    let grant = !already_voted_elsewhere && log_ok;
    if grant {
        persistent.voted_for = Some(request.candidate_id.clone());
    }

    RequestVoteResponse {
        term: persistent.current_term,
        vote_granted: grant,
        voter_id: self_id.clone(),
    }
}

/// Records one vote response for an in-progress candidacy. Stale
/// responses (for a term the candidate has since moved past) are
/// ignored by the caller before this is invoked.
pub fn record_vote(votes_received: &mut HashSet<NodeId>, response: &RequestVoteResponse) {
    if response.vote_granted {
        votes_received.insert(response.voter_id.clone());
    }
}

/// A candidacy wins once it holds votes from a strict majority of the
/// cluster, counting its own vote.
pub fn has_majority(votes_received: &HashSet<NodeId>, self_id: &NodeId, cluster_size: usize) -> bool {
    let mut count = votes_received.len();
    if !votes_received.contains(self_id) {
        count += 1;
    }
    count * 2 > cluster_size
}

pub fn new_candidacy() -> RoleState {
    RoleState::Candidate { votes_received: HashSet::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(n: u64) -> NodeId {
        format!("node-{n}")
    }

    #[test]
    fn starting_election_increments_term_and_votes_for_self() {
        let mut state = PersistentState::default();
        let req = start_election(&mut state, &node(1));
        assert_eq!(req.term, Term(1));
        assert_eq!(state.voted_for, Some(node(1)));
    }

    #[test]
    fn vote_denied_for_stale_term() {
        use crate::message::LogIndex;
        let mut state = PersistentState::default();
        state.current_term = Term(5);
        let req = RequestVote { term: Term(2), candidate_id: node(2), last_log_index: LogIndex::ZERO, last_log_term: Term::ZERO };
        let resp = decide_vote(&mut state, &node(1), &req);
        assert!(!resp.vote_granted);
        assert_eq!(resp.term, Term(5));
    }

    #[test]
    fn vote_granted_at_most_once_per_term() {
        use crate::message::LogIndex;
        let mut state = PersistentState::default();
        let req1 = RequestVote { term: Term(1), candidate_id: node(2), last_log_index: LogIndex::ZERO, last_log_term: Term::ZERO };
        let req2 = RequestVote { term: Term(1), candidate_id: node(3), last_log_index: LogIndex::ZERO, last_log_term: Term::ZERO };
        let r1 = decide_vote(&mut state, &node(1), &req1);
        let r2 = decide_vote(&mut state, &node(1), &req2);
        assert!(r1.vote_granted);
        assert!(!r2.vote_granted);
    }

    #[test]
    fn majority_requires_strictly_more_than_half() {
        let mut votes = HashSet::new();
        votes.insert(node(2));
        assert!(!has_majority(&votes, &node(1), 5));
        votes.insert(node(3));
        assert!(has_majority(&votes, &node(1), 5));
    }
}
