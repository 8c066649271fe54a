//! Cluster membership changes: `Join` and `Leave` (spec §4.2,
//! "Membership changes"). Implemented as simple single-step
//! reconfiguration — the whole membership list changes atomically under
//! the leader, rather than Raft's joint-consensus two-phase scheme. This
//! is adequate for config-store clusters, which are small and reconfigure
//! rarely; joint consensus would be the next step if membership churn
//! under load ever becomes a requirement.

use crate::message::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MembershipError {
    #[error("node {0} is already a cluster member")]
    AlreadyMember(NodeId),
    #[error("node {0} is not a cluster member")]
    NotMember(NodeId),
    #[error("cannot remove node {0}: only {1} member(s) remain, quorum would be lost")]
    WouldLoseQuorum(NodeId, usize),
}

/// The cluster's current voting membership. Only the leader mutates this,
/// and only by proposing the change through the log like any other
/// command so every replica learns of it in the same order (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct Membership {
    members: Vec<NodeId>,
}

impl Membership {
    pub fn bootstrap(self_id: NodeId) -> Self {
        Self { members: vec![self_id] }
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.members.iter().any(|m| m == node_id)
    }

    pub fn join(&mut self, node_id: NodeId) -> Result<(), MembershipError> {
        if self.contains(&node_id) {
            return Err(MembershipError::AlreadyMember(node_id));
        }
        self.members.push(node_id);
        Ok(())
    }

    /// Refuses to shrink the cluster below a single remaining member,
    /// which would otherwise strand that member as a permanent
    /// single-node "majority" unable to absorb further churn safely.
    pub fn leave(&mut self, node_id: &NodeId) -> Result<(), MembershipError> {
        if !self.contains(node_id) {
            return Err(MembershipError::NotMember(node_id.clone()));
        }
        if self.members.len() <= 1 {
            return Err(MembershipError::WouldLoseQuorum(node_id.clone(), self.members.len()));
        }
        self.members.retain(|m| m != node_id);
        Ok(())
    }

    pub fn quorum_size(&self) -> usize {
        self.members.len() / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_single_member_cluster() {
        let m = Membership::bootstrap("n1".to_string());
        assert_eq!(m.members(), &["n1".to_string()]);
        assert_eq!(m.quorum_size(), 1);
    }

    #[test]
    fn join_rejects_duplicate_member() {
        let mut m = Membership::bootstrap("n1".to_string());
        m.join("n2".to_string()).unwrap();
        let err = m.join("n2".to_string()).unwrap_err();
        assert!(matches!(err, MembershipError::AlreadyMember(_)));
    }

    #[test]
    fn leave_refuses_to_strand_last_member() {
        let mut m = Membership::bootstrap("n1".to_string());
        let err = m.leave(&"n1".to_string()).unwrap_err();
        assert!(matches!(err, MembershipError::WouldLoseQuorum(_, _)));
    }

    #[test]
    fn quorum_size_tracks_majority_of_current_members() {
        let mut m = Membership::bootstrap("n1".to_string());
        m.join("n2".to_string()).unwrap();
        m.join("n3".to_string()).unwrap();
        assert_eq!(m.quorum_size(), 2);
    }
}
