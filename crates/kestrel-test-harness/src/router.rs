//! An in-memory [`Transport`] that routes Raft RPCs between replicas
//! living in the same process, plus a helper that bootstraps a small
//! cluster over it.
//!
//! Generalizes the private `Router`/`RouterTransport` pair
//! `kestrel-consensus::tests` built for its own single-crate elections
//! and commit tests into a reusable, crate-public type other crates and
//! integration tests can build multi-node scenarios on without
//! duplicating the routing table.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use kestrel_consensus::message::{
    AppendEntries, AppendEntriesResponse, InstallSnapshot, InstallSnapshotResponse, NodeId, RequestVote,
    RequestVoteResponse,
};
use kestrel_consensus::{NodeConfig, Replica, Transport, TransportError};
use kestrel_kernel::ReplicatedFsm;

/// Disambiguates `data_dir`s across repeated `build_cluster` calls within
/// (and across) test processes sharing the same node ids, now that a
/// replica's log is actually persisted under that directory — a stable
/// path keyed only by node id would let one test's on-disk state leak
/// into the next.
static CLUSTER_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// The shared routing table: every replica a [`RoutedTransport`] can
/// reach by node id.
#[derive(Default)]
pub struct ClusterRouter {
    replicas: RwLock<HashMap<NodeId, Arc<Replica<RoutedTransport>>>>,
    /// Node ids currently cut off from every other node, in both
    /// directions — simulates a network partition isolating one replica
    /// (spec §8, S5 — leader failover).
    isolated: RwLock<HashSet<NodeId>>,
}

impl ClusterRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn register(&self, node_id: NodeId, replica: Arc<Replica<RoutedTransport>>) {
        self.replicas.write().await.insert(node_id, replica);
    }

    async fn lookup(&self, peer: &NodeId) -> Result<Arc<Replica<RoutedTransport>>, TransportError> {
        self.replicas
            .read()
            .await
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError(format!("unknown peer {peer}")))
    }

    /// Cuts `node_id` off from every other node, in both directions.
    pub async fn isolate(&self, node_id: &NodeId) {
        self.isolated.write().await.insert(node_id.clone());
    }

    /// Reconnects a previously [`Self::isolate`]d node.
    pub async fn heal(&self, node_id: &NodeId) {
        self.isolated.write().await.remove(node_id);
    }

    async fn reachable(&self, a: &NodeId, b: &NodeId) -> bool {
        let isolated = self.isolated.read().await;
        !isolated.contains(a) && !isolated.contains(b)
    }
}

/// One node's [`Transport`] handle onto a [`ClusterRouter`]: RPCs to a
/// peer id resolve to a direct, in-memory call against that peer's
/// `Replica`, skipping any real network stack (spec §6, HTTP/wire
/// transport is explicitly out of scope for the consensus core itself).
pub struct RoutedTransport {
    self_id: NodeId,
    router: Arc<ClusterRouter>,
}

#[async_trait::async_trait]
impl Transport for RoutedTransport {
    async fn send_request_vote(
        &self,
        peer: &NodeId,
        request: RequestVote,
    ) -> Result<RequestVoteResponse, TransportError> {
        if !self.router.reachable(&self.self_id, peer).await {
            return Err(TransportError(format!("{peer} is unreachable")));
        }
        Ok(self.router.lookup(peer).await?.handle_request_vote(request).await)
    }

    async fn send_append_entries(
        &self,
        peer: &NodeId,
        request: AppendEntries,
    ) -> Result<AppendEntriesResponse, TransportError> {
        if !self.router.reachable(&self.self_id, peer).await {
            return Err(TransportError(format!("{peer} is unreachable")));
        }
        Ok(self.router.lookup(peer).await?.handle_append_entries(request).await)
    }

    async fn send_install_snapshot(
        &self,
        peer: &NodeId,
        request: InstallSnapshot,
    ) -> Result<InstallSnapshotResponse, TransportError> {
        if !self.router.reachable(&self.self_id, peer).await {
            return Err(TransportError(format!("{peer} is unreachable")));
        }
        Ok(self.router.lookup(peer).await?.handle_install_snapshot(request).await)
    }
}

impl ClusterRouter {
    /// Starts `node_ids.len()` replicas wired to this router, bootstraps
    /// the first as the initial cluster member (spec §4.2, "Cluster
    /// bootstrap rule" — exactly one node starts with `bootstrap=true`),
    /// elects it leader, then has it `Join` every other node so they
    /// receive the leader's state via `InstallSnapshot`/`AppendEntries`
    /// rather than being added to membership with no leader to catch
    /// them up. Returns the live handles in the same order as `node_ids`.
    pub async fn build_cluster(self: &Arc<Self>, node_ids: &[&str]) -> Vec<Arc<Replica<RoutedTransport>>> {
        let instance = CLUSTER_INSTANCE.fetch_add(1, Ordering::Relaxed);
        let mut replicas = Vec::with_capacity(node_ids.len());

        for (i, id) in node_ids.iter().enumerate() {
            let transport = Arc::new(RoutedTransport { self_id: id.to_string(), router: Arc::clone(self) });
            let data_dir = std::env::temp_dir()
                .join(format!("kestrel-test-harness-{}-{instance}-{id}", std::process::id()));
            let mut config = NodeConfig::new(*id, "127.0.0.1:0", data_dir);
            if i == 0 {
                config = config.bootstrapping();
            }
            let replica = Arc::new(
                Replica::start(config, transport, ReplicatedFsm::new(), Vec::new())
                    .expect("NodeConfig is well-formed: bootstrap only set on the first node with an empty log"),
            );
            replicas.push(replica);
        }

        for replica in &replicas {
            self.register(replica.node_id().clone(), Arc::clone(replica)).await;
        }

        if replicas.len() > 1 {
            replicas[0].run_election().await;
        }

        for replica in &replicas[1..] {
            replicas[0]
                .join(replica.node_id().clone())
                .await
                .expect("leader join of a fresh, non-duplicate node id cannot fail");
        }

        replicas
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn three_node_cluster_elects_the_bootstrap_node() {
        let router = ClusterRouter::new();
        let replicas = router.build_cluster(&["n1", "n2", "n3"]).await;
        assert!(replicas[0].run_election().await);
        assert!(replicas[0].is_leader().await);
        assert!(!replicas[1].is_leader().await);
    }

    #[tokio::test]
    async fn two_node_cluster_membership_includes_both_nodes() {
        let router = ClusterRouter::new();
        let replicas = router.build_cluster(&["n1", "n2"]).await;
        let members = replicas[0].membership().await;
        assert_eq!(members.len(), 2);
    }
}
