//! Multi-replica integration tests using an in-memory router as the
//! `Transport`. Each test builds a small cluster in one process and
//! drives elections/proposals directly rather than through real timers,
//! so outcomes are deterministic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use kestrel_kernel::ReplicatedFsm;
use kestrel_types::{Command, ConfigKey, ProjectId, SchemaId, UserId};

use crate::message::{
    AppendEntries, AppendEntriesResponse, InstallSnapshot, InstallSnapshotResponse, NodeId, RequestVote,
    RequestVoteResponse,
};
use crate::replica::{NodeConfig, Replica, Transport, TransportError};

struct Router {
    replicas: RwLock<HashMap<NodeId, Arc<Replica<RouterTransport>>>>,
    /// Node ids currently cut off from every other node, in both
    /// directions — simulates a network partition isolating one replica
    /// (spec §8, S5).
    isolated: RwLock<HashSet<NodeId>>,
}

impl Router {
    async fn isolate(&self, node_id: &NodeId) {
        self.isolated.write().await.insert(node_id.clone());
    }

    async fn heal(&self, node_id: &NodeId) {
        self.isolated.write().await.remove(node_id);
    }

    async fn reachable(&self, a: &NodeId, b: &NodeId) -> bool {
        let isolated = self.isolated.read().await;
        !isolated.contains(a) && !isolated.contains(b)
    }
}

struct RouterTransport {
    self_id: NodeId,
    router: Arc<Router>,
}

#[async_trait::async_trait]
impl Transport for RouterTransport {
    async fn send_request_vote(
        &self,
        peer: &NodeId,
        request: RequestVote,
    ) -> Result<RequestVoteResponse, TransportError> {
        if !self.router.reachable(&self.self_id, peer).await {
            return Err(TransportError(format!("{peer} is unreachable")));
        }
        let target = self
            .router
            .replicas
            .read()
            .await
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError(format!("unknown peer {peer}")))?;
        Ok(target.handle_request_vote(request).await)
    }

    async fn send_append_entries(
        &self,
        peer: &NodeId,
        request: AppendEntries,
    ) -> Result<AppendEntriesResponse, TransportError> {
        if !self.router.reachable(&self.self_id, peer).await {
            return Err(TransportError(format!("{peer} is unreachable")));
        }
        let target = self
            .router
            .replicas
            .read()
            .await
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError(format!("unknown peer {peer}")))?;
        Ok(target.handle_append_entries(request).await)
    }

    async fn send_install_snapshot(
        &self,
        peer: &NodeId,
        request: InstallSnapshot,
    ) -> Result<InstallSnapshotResponse, TransportError> {
        if !self.router.reachable(&self.self_id, peer).await {
            return Err(TransportError(format!("{peer} is unreachable")));
        }
        let target = self
            .router
            .replicas
            .read()
            .await
            .get(peer)
            .cloned()
            .ok_or_else(|| TransportError(format!("unknown peer {peer}")))?;
        Ok(target.handle_install_snapshot(request).await)
    }
}

static BUILD_CLUSTER_INSTANCE: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

async fn build_cluster(node_ids: &[&str]) -> (Arc<Router>, Vec<Arc<Replica<RouterTransport>>>) {
    let instance = BUILD_CLUSTER_INSTANCE.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let router = Arc::new(Router { replicas: RwLock::new(HashMap::new()), isolated: RwLock::new(HashSet::new()) });
    let mut replicas = Vec::new();

    for (i, id) in node_ids.iter().enumerate() {
        let transport = Arc::new(RouterTransport { self_id: id.to_string(), router: Arc::clone(&router) });
        let data_dir =
            std::env::temp_dir().join(format!("kestrel-consensus-tests-{}-{instance}-{id}", std::process::id()));
        let mut config = NodeConfig::new(id.to_string(), "127.0.0.1:0", data_dir);
        if i == 0 {
            config = config.bootstrapping();
        }
        let replica = Arc::new(Replica::start(config, transport, ReplicatedFsm::new(), vec![]).unwrap());
        replicas.push(replica);
    }

    {
        let mut map = router.replicas.write().await;
        for replica in &replicas {
            map.insert(replica.node_id().clone(), Arc::clone(replica));
        }
    }

    if replicas.len() > 1 {
        replicas[0].run_election().await;
    }

    for replica in &replicas[1..] {
        replicas[0].join(replica.node_id().clone()).await.unwrap();
    }

    (router, replicas)
}

fn create_command(project: u64, key: &str) -> Command {
    Command::Create {
        project_id: ProjectId::new(project),
        key: ConfigKey::new(key),
        schema_id: SchemaId::new(1),
        content: serde_json::json!({"ok": true}),
        actor_id: UserId::new(1),
    }
}

#[tokio::test]
async fn election_elects_a_leader_by_majority_vote() {
    let (_router, replicas) = build_cluster(&["n1", "n2", "n3"]).await;
    assert!(replicas[0].run_election().await);
    assert!(replicas[0].is_leader().await);
    assert_eq!(replicas[0].leader().await, Some("n1".to_string()));
}

#[tokio::test]
async fn leader_replicates_and_commits_to_a_majority() {
    let (_router, replicas) = build_cluster(&["n1", "n2", "n3"]).await;
    assert!(replicas[0].run_election().await);

    let result = replicas[0].propose(create_command(1, "a"), Duration::from_secs(5)).await.unwrap();
    let (outcome, _effects) = result.unwrap();
    match outcome {
        kestrel_kernel::ConfigDocumentOutcome::Live(doc) => assert_eq!(doc.version.as_u64(), 1),
        kestrel_kernel::ConfigDocumentOutcome::Deleted => panic!("expected a live document"),
    }
}

#[tokio::test]
async fn follower_rejects_propose_with_not_leader() {
    let (_router, replicas) = build_cluster(&["n1", "n2", "n3"]).await;
    assert!(replicas[0].run_election().await);

    let err = replicas[1].propose(create_command(1, "a"), Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, crate::replica::ConsensusError::NotLeader { .. }));
}

#[tokio::test]
async fn bootstrap_on_nonempty_log_is_rejected() {
    let transport = Arc::new(RouterTransport {
        self_id: "n1".to_string(),
        router: Arc::new(Router { replicas: RwLock::new(HashMap::new()), isolated: RwLock::new(HashSet::new()) }),
    });
    let config = NodeConfig::new("n1", "127.0.0.1:0", std::env::temp_dir()).bootstrapping();
    let bogus_entry = crate::message::LogEntry {
        term: crate::message::Term(1),
        index: crate::message::LogIndex(1),
        command: create_command(1, "a"),
    };
    let err = Replica::start(config, transport, ReplicatedFsm::new(), vec![bogus_entry]).unwrap_err();
    assert!(matches!(err, crate::replica::ConsensusError::BootstrapOnNonEmptyLog));
}

#[tokio::test]
async fn second_command_commits_on_top_of_the_first() {
    let (_router, replicas) = build_cluster(&["n1", "n2"]).await;
    assert!(replicas[0].run_election().await);

    replicas[0].propose(create_command(1, "a"), Duration::from_secs(5)).await.unwrap().unwrap();
    let (outcome, _) = replicas[0]
        .propose(
            Command::Update {
                project_id: ProjectId::new(1),
                key: ConfigKey::new("a"),
                expected_version: kestrel_types::Version::FIRST,
                content: serde_json::json!({"ok": false}),
                actor_id: UserId::new(1),
            },
            Duration::from_secs(5),
        )
        .await
        .unwrap()
        .unwrap();

    match outcome {
        kestrel_kernel::ConfigDocumentOutcome::Live(doc) => assert_eq!(doc.version.as_u64(), 2),
        kestrel_kernel::ConfigDocumentOutcome::Deleted => panic!("expected a live document"),
    }
}

/// Isolates the leader, elects a replacement on the remaining majority,
/// heals the partition, and checks that a heartbeat from the new leader
/// makes the old one step down (spec §8, S5 — leader failover).
#[tokio::test]
async fn leader_failover_demotes_old_leader_once_partition_heals() {
    let (router, replicas) = build_cluster(&["n1", "n2", "n3"]).await;
    assert!(replicas[0].run_election().await);
    assert!(replicas[0].is_leader().await);

    router.isolate(replicas[0].node_id()).await;

    assert!(replicas[1].run_election().await);
    assert!(replicas[1].is_leader().await);

    router.heal(replicas[0].node_id()).await;

    replicas[1].propose(create_command(1, "a"), Duration::from_secs(5)).await.unwrap().unwrap();

    assert!(!replicas[0].is_leader().await);
    let err = replicas[0].propose(create_command(2, "b"), Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, crate::replica::ConsensusError::NotLeader { .. }));
}

static SNAPSHOT_TEST_INSTANCE: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

fn snapshot_test_data_dir(label: &str) -> std::path::PathBuf {
    let instance = SNAPSHOT_TEST_INSTANCE.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    std::env::temp_dir().join(format!("kestrel-consensus-snapshot-tests-{}-{instance}-{label}", std::process::id()))
}

/// A fresh node joining after the leader has taken a snapshot and
/// compacted its log catches up entirely via `InstallSnapshot`, with no
/// log tail left to replay (spec §4.2, "Snapshotting"; spec §8, S6 —
/// "start a fresh node, restore from snapshot").
#[tokio::test]
async fn fresh_node_catches_up_via_install_snapshot() {
    let router = Arc::new(Router { replicas: RwLock::new(HashMap::new()), isolated: RwLock::new(HashSet::new()) });

    let leader_transport = Arc::new(RouterTransport { self_id: "n1".to_string(), router: Arc::clone(&router) });
    let leader_config = NodeConfig {
        snapshot_threshold: 1,
        trailing_logs: 0,
        ..NodeConfig::new("n1", "127.0.0.1:0", snapshot_test_data_dir("n1"))
    }
    .bootstrapping();
    let leader = Arc::new(Replica::start(leader_config, leader_transport, ReplicatedFsm::new(), vec![]).unwrap());
    router.replicas.write().await.insert(leader.node_id().clone(), Arc::clone(&leader));

    assert!(leader.run_election().await);
    leader.propose(create_command(1, "a"), Duration::from_secs(5)).await.unwrap().unwrap();
    leader.propose(create_command(2, "b"), Duration::from_secs(5)).await.unwrap().unwrap();

    assert!(leader.maybe_snapshot().await.unwrap());

    let follower_transport = Arc::new(RouterTransport { self_id: "n2".to_string(), router: Arc::clone(&router) });
    let follower_config = NodeConfig::new("n2", "127.0.0.1:0", snapshot_test_data_dir("n2"));
    let follower = Arc::new(Replica::start(follower_config, follower_transport, ReplicatedFsm::new(), vec![]).unwrap());
    router.replicas.write().await.insert(follower.node_id().clone(), Arc::clone(&follower));

    leader.join(follower.node_id().clone()).await.unwrap();

    assert!(follower.get(ProjectId::new(1), &ConfigKey::new("a")).is_some());
    assert!(follower.get(ProjectId::new(2), &ConfigKey::new("b")).is_some());
    assert_eq!(leader.membership().await.len(), 2);
}
