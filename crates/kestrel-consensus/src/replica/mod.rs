//! The public `ConsensusLayer` surface: a single-leader Raft replica.
//!
//! `Replica` owns the Raft state machine (election, replication, commit)
//! and drives a [`kestrel_kernel::ReplicatedFsm`] from the committed log.
//! Network I/O is abstracted behind [`Transport`] so this crate never
//! opens a socket itself (spec §6, transport/HTTP is out of scope for the
//! core); `kestrel-test-harness` supplies an in-memory `Transport` for
//! multi-node tests and simulations.

pub mod state;

mod normal;
mod view_change;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

use kestrel_kernel::{ConfigDocumentOutcome, Effect, KernelError, ReplicatedFsm};
use kestrel_types::{Command, ConfigDocument, ConfigKey, ProjectId};

use crate::clock::jittered_election_timeout;
use crate::instrumentation;
use crate::message::{AppendEntries, InstallSnapshot, InstallSnapshotResponse, LogEntry, LogIndex, NodeId, RequestVote};
use crate::reconfiguration::{Membership, MembershipError};
use crate::storage::FileLogStore;
use state::{LeaderState, PersistentState, Role, RoleState, VolatileState};

/// Configuration a replica is started with (spec §4.2, `Start(config)`).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub bind_addr: String,
    pub data_dir: PathBuf,
    /// Set on exactly one node when initializing a brand new cluster.
    /// Every other node joins via [`Replica::propose_join`] against the
    /// elected leader.
    pub bootstrap: bool,
    pub heartbeat_timeout: Duration,
    pub election_timeout: Duration,
    pub snapshot_interval: Duration,
    pub snapshot_threshold: usize,
    pub trailing_logs: usize,
}

impl NodeConfig {
    pub fn new(node_id: impl Into<NodeId>, bind_addr: impl Into<String>, data_dir: PathBuf) -> Self {
        Self {
            node_id: node_id.into(),
            bind_addr: bind_addr.into(),
            data_dir,
            bootstrap: false,
            heartbeat_timeout: Duration::from_secs(1),
            election_timeout: Duration::from_secs(1),
            snapshot_interval: Duration::from_secs(120),
            snapshot_threshold: 8192,
            trailing_logs: 10240,
        }
    }

    pub fn bootstrapping(mut self) -> Self {
        self.bootstrap = true;
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Outbound RPC surface a `Replica` needs. Implementations decide how
/// bytes actually move between nodes; the Raft logic here never assumes
/// a particular transport.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send_request_vote(
        &self,
        peer: &NodeId,
        request: RequestVote,
    ) -> Result<crate::message::RequestVoteResponse, TransportError>;

    async fn send_append_entries(
        &self,
        peer: &NodeId,
        request: AppendEntries,
    ) -> Result<crate::message::AppendEntriesResponse, TransportError>;

    async fn send_install_snapshot(
        &self,
        peer: &NodeId,
        request: InstallSnapshot,
    ) -> Result<InstallSnapshotResponse, TransportError>;
}

/// Failure modes `Propose` and friends can surface (spec §4.2, contract).
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("not leader")]
    NotLeader { leader_id: Option<NodeId> },
    #[error("propose timed out before reaching commit")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bootstrap requested on a node with existing persisted log state")]
    BootstrapOnNonEmptyLog,
    #[error(transparent)]
    Membership(#[from] MembershipError),
    #[error("durable storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

impl From<TransportError> for ConsensusError {
    fn from(value: TransportError) -> Self {
        ConsensusError::Transport(value.0)
    }
}

/// The deterministic result of a committed command — what the FSM
/// decided, which every replica that applies the same log prefix will
/// agree on (spec §4.1, determinism law).
pub type AppliedResult = Result<(ConfigDocumentOutcome, Vec<Effect>), KernelError>;

/// A single Raft node. Generic over `Transport` so tests can plug in an
/// in-memory router without this crate depending on any networking
/// crate.
pub struct Replica<T: Transport> {
    self_id: NodeId,
    config: NodeConfig,
    transport: Arc<T>,
    fsm: ReplicatedFsm,
    persistent: Mutex<PersistentState>,
    volatile: Mutex<VolatileState>,
    membership: Mutex<Membership>,
    leader_hint: Mutex<Option<NodeId>>,
    leader_notify: Notify,
    log_store: FileLogStore,
}

impl<T: Transport + 'static> Replica<T> {
    /// Starts a node, restoring persisted log/term/vote state and the most
    /// recent FSM snapshot from `config.data_dir` if this node has run
    /// before (spec §4.2, Durability). Bootstrap must only be used the
    /// first time a cluster is initialized (spec §4.2, "Cluster bootstrap
    /// rule"); a node that already has persisted log entries — either
    /// passed in via `initial_log` or recovered from disk — can never be
    /// bootstrapped.
    pub fn start(
        config: NodeConfig,
        transport: Arc<T>,
        fsm: ReplicatedFsm,
        initial_log: Vec<LogEntry>,
    ) -> Result<Self, ConsensusError> {
        let log_store = FileLogStore::new(&config.data_dir);
        let restored = log_store.load_log()?;

        let persisted_log_nonempty = restored.as_ref().is_some_or(|s| !s.log.is_empty());
        if config.bootstrap && (!initial_log.is_empty() || persisted_log_nonempty) {
            return Err(ConsensusError::BootstrapOnNonEmptyLog);
        }

        let membership = if config.bootstrap {
            Membership::bootstrap(config.node_id.clone())
        } else {
            Membership::default()
        };

        let mut persistent = restored.unwrap_or_default();
        if persistent.log.is_empty() && persistent.last_snapshot_index == LogIndex::ZERO {
            persistent.log = initial_log;
        }

        if let Some(snapshot) = log_store.load_snapshot()? {
            fsm.restore(snapshot);
        }

        Ok(Self {
            self_id: config.node_id.clone(),
            config,
            transport,
            fsm,
            persistent: Mutex::new(persistent),
            volatile: Mutex::new(VolatileState::default()),
            membership: Mutex::new(membership),
            leader_hint: Mutex::new(None),
            leader_notify: Notify::new(),
            log_store,
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.self_id
    }

    /// Direct `ReplicatedFSM` read, served from this replica's own state
    /// without going through consensus (spec §4.1, `Get`: "Read-only;
    /// never blocks on consensus"). On a follower this may lag the
    /// leader by up to one heartbeat interval (spec §5, staleness bound).
    pub fn get(&self, project_id: ProjectId, key: &ConfigKey) -> Option<ConfigDocument> {
        self.fsm.get(project_id, key)
    }

    /// Direct `ReplicatedFSM` read of every live document in a project
    /// (spec §4.1, `ListByProject`).
    pub fn list_by_project(&self, project_id: ProjectId) -> Vec<ConfigDocument> {
        self.fsm.list_by_project(project_id)
    }

    pub async fn is_leader(&self) -> bool {
        matches!(self.volatile.lock().await.role.role(), Role::Leader)
    }

    pub async fn leader(&self) -> Option<NodeId> {
        self.leader_hint.lock().await.clone()
    }

    /// Blocks until a leader is known or `timeout_after` elapses.
    pub async fn wait_for_leader(&self, timeout_after: Duration) -> Option<NodeId> {
        if let Some(leader) = self.leader().await {
            return Some(leader);
        }
        let notified = self.leader_notify.notified();
        let _ = timeout(timeout_after, notified).await;
        self.leader().await
    }

    /// Proposes a command for replication. Only the leader accepts
    /// proposals; followers fail immediately with `NotLeader` (spec
    /// §4.2, "Only callable on leader").
    #[tracing::instrument(skip(self, command), fields(node = %self.self_id))]
    pub async fn propose(&self, command: Command, timeout_after: Duration) -> Result<AppliedResult, ConsensusError> {
        if !self.is_leader().await {
            return Err(ConsensusError::NotLeader { leader_id: self.leader().await });
        }

        let start = std::time::Instant::now();
        let result = timeout(timeout_after, self.replicate_and_apply(command)).await;

        let outcome = match result {
            Ok(Ok(applied)) => Ok(applied),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ConsensusError::Timeout),
        };

        let label = match &outcome {
            Ok(_) => "committed",
            Err(ConsensusError::Timeout) => "timeout",
            Err(ConsensusError::NotLeader { .. }) => "not_leader",
            Err(_) => "error",
        };
        instrumentation::log_propose(&self.self_id, label, start.elapsed());
        outcome
    }

    async fn replicate_and_apply(&self, command: Command) -> Result<AppliedResult, ConsensusError> {
        let entry = {
            let mut persistent = self.persistent.lock().await;
            let index = persistent.last_log_index().next();
            let entry = LogEntry { term: persistent.current_term, index, command: command.clone() };
            persistent.log.push(entry.clone());
            self.log_store.persist_log(&persistent)?;
            entry
        };

        let peers: Vec<NodeId> = {
            let membership = self.membership.lock().await;
            membership.members().iter().filter(|m| **m != self.self_id).cloned().collect()
        };
        let cluster_size = peers.len() + 1;

        // `next_index` starts at `entry.index` (not `entry.index + 1`) so
        // this round's `AppendEntries` actually carries the entry just
        // appended, rather than skipping straight past it.
        let mut leader_state = LeaderState::for_peers(&peers, LogIndex(entry.index.0 - 1));
        leader_state.match_index.insert(self.self_id.clone(), entry.index);

        let commit_index = self.volatile_commit_index().await;
        let mut handles = Vec::with_capacity(peers.len());
        {
            let persistent = self.persistent.lock().await;
            for peer in &peers {
                let append =
                    normal::build_append_entries(&persistent, &self.self_id, &leader_state, peer, commit_index);
                let transport = Arc::clone(&self.transport);
                let peer = peer.clone();
                handles.push(tokio::spawn(async move {
                    (peer.clone(), transport.send_append_entries(&peer, append).await)
                }));
            }
        }

        for handle in handles {
            if let Ok((peer, Ok(response))) = handle.await {
                normal::record_append_response(&mut leader_state, &peer, &response);
            }
        }

        let persistent = self.persistent.lock().await;
        let mut volatile = self.volatile.lock().await;
        let new_commit = normal::advance_commit_index(
            &persistent,
            &leader_state.match_index,
            entry.index,
            cluster_size,
            volatile.commit_index,
        );
        volatile.commit_index = new_commit;
        drop(persistent);
        drop(volatile);

        if new_commit < entry.index {
            return Err(ConsensusError::Timeout);
        }

        Ok(self.fsm.apply(command))
    }

    async fn volatile_commit_index(&self) -> LogIndex {
        self.volatile.lock().await.commit_index
    }

    /// Follower-side handling of an incoming `AppendEntries` RPC.
    pub async fn handle_append_entries(
        &self,
        request: AppendEntries,
    ) -> crate::message::AppendEntriesResponse {
        let mut persistent = self.persistent.lock().await;
        let mut volatile = self.volatile.lock().await;

        if request.term >= persistent.current_term {
            *self.leader_hint.lock().await = Some(request.leader_id.clone());
            self.leader_notify.notify_waiters();
            if !matches!(volatile.role, RoleState::Follower) {
                let from = volatile.role.role();
                volatile.role = RoleState::Follower;
                instrumentation::log_role_transition(&self.self_id, from, Role::Follower, request.term);
            }
        }

        let (response, new_commit) =
            normal::handle_append_entries(&mut persistent, &self.self_id, &request, volatile.commit_index);
        volatile.commit_index = new_commit;
        if let Err(err) = self.log_store.persist_log(&persistent) {
            instrumentation::log_persist_failed(&self.self_id, "append_entries", &err);
        }
        response
    }

    /// Follower/candidate-side handling of an incoming `RequestVote` RPC.
    pub async fn handle_request_vote(
        &self,
        request: RequestVote,
    ) -> crate::message::RequestVoteResponse {
        let mut persistent = self.persistent.lock().await;
        let response = view_change::decide_vote(&mut persistent, &self.self_id, &request);
        if let Err(err) = self.log_store.persist_log(&persistent) {
            instrumentation::log_persist_failed(&self.self_id, "request_vote", &err);
        }
        response
    }

    /// Follower-side handling of an incoming `InstallSnapshot` RPC: adopts
    /// the leader's snapshot wholesale, discarding any log entries it
    /// covers (spec §4.2, "Snapshotting"; spec §8, S6).
    pub async fn handle_install_snapshot(&self, request: InstallSnapshot) -> InstallSnapshotResponse {
        let mut persistent = self.persistent.lock().await;

        if request.term < persistent.current_term {
            return InstallSnapshotResponse { term: persistent.current_term, responder_id: self.self_id.clone() };
        }
        if request.term > persistent.current_term {
            persistent.current_term = request.term;
            persistent.voted_for = None;
        }

        *self.leader_hint.lock().await = Some(request.leader_id.clone());
        self.leader_notify.notify_waiters();

        if let Err(err) = self.log_store.persist_snapshot_bytes(&request.data) {
            instrumentation::log_persist_failed(&self.self_id, "install_snapshot", &err);
            return InstallSnapshotResponse { term: persistent.current_term, responder_id: self.self_id.clone() };
        }
        match kestrel_kernel::Snapshot::from_json_bytes(&request.data) {
            Ok(snapshot) => self.fsm.restore(snapshot),
            Err(err) => {
                let err = crate::storage::StorageError::from(err);
                instrumentation::log_persist_failed(&self.self_id, "install_snapshot_decode", &err);
            }
        }

        persistent.install_snapshot(request.last_included_index, request.last_included_term);
        if let Err(err) = self.log_store.persist_log(&persistent) {
            instrumentation::log_persist_failed(&self.self_id, "install_snapshot", &err);
        }

        let mut volatile = self.volatile.lock().await;
        if request.last_included_index > volatile.commit_index {
            volatile.commit_index = request.last_included_index;
        }
        if request.last_included_index > volatile.last_applied {
            volatile.last_applied = request.last_included_index;
        }

        instrumentation::log_snapshot_installed(&self.self_id, request.last_included_index);
        InstallSnapshotResponse { term: persistent.current_term, responder_id: self.self_id.clone() }
    }

    /// Takes an FSM snapshot and compacts the log once the uncompacted
    /// prefix grows past `config.snapshot_threshold` (spec §4.2,
    /// "Snapshotting": periodic/threshold-triggered). Intended to be
    /// invoked by a caller-driven timer loop on `config.snapshot_interval`,
    /// the same way [`Self::next_election_timeout`] is — kept callable
    /// directly so tests can force a snapshot deterministically.
    pub async fn maybe_snapshot(&self) -> Result<bool, ConsensusError> {
        let commit_index = self.volatile.lock().await.commit_index;
        let mut persistent = self.persistent.lock().await;

        let uncompacted = commit_index.0.saturating_sub(persistent.compacted_through.0);
        if (uncompacted as usize) < self.config.snapshot_threshold {
            return Ok(false);
        }

        let snapshot = self.fsm.snapshot();
        self.log_store.persist_snapshot(&snapshot)?;
        persistent.compact(commit_index, self.config.trailing_logs);
        self.log_store.persist_log(&persistent)?;

        instrumentation::log_snapshot_taken(&self.self_id, commit_index, persistent.compacted_through);
        Ok(true)
    }

    /// Runs one election: becomes a candidate, solicits votes from every
    /// peer, and becomes leader on a majority. Intended to be invoked by
    /// a caller-driven timer loop on election timeout; kept callable
    /// directly so tests can force an election deterministically instead
    /// of racing real timers.
    pub async fn run_election(&self) -> bool {
        let peers: Vec<NodeId> = {
            let membership = self.membership.lock().await;
            membership.members().iter().filter(|m| **m != self.self_id).cloned().collect()
        };
        let cluster_size = peers.len() + 1;

        let request = {
            let mut persistent = self.persistent.lock().await;
            let mut volatile = self.volatile.lock().await;
            volatile.role = view_change::new_candidacy();
            let req = view_change::start_election(&mut persistent, &self.self_id);
            if let Err(err) = self.log_store.persist_log(&persistent) {
                instrumentation::log_persist_failed(&self.self_id, "start_election", &err);
            }
            instrumentation::log_election_started(&self.self_id, req.term);
            req
        };

        let mut handles = Vec::with_capacity(peers.len());
        for peer in &peers {
            let transport = Arc::clone(&self.transport);
            let peer = peer.clone();
            let request = request.clone();
            handles.push(tokio::spawn(async move { transport.send_request_vote(&peer, request).await }));
        }

        let mut votes_received = HashSet::new();
        for handle in handles {
            if let Ok(Ok(response)) = handle.await {
                if response.term == request.term {
                    view_change::record_vote(&mut votes_received, &response);
                }
            }
        }

        let won = view_change::has_majority(&votes_received, &self.self_id, cluster_size);
        if won {
            let mut volatile = self.volatile.lock().await;
            let persistent = self.persistent.lock().await;
            volatile.role = RoleState::Leader(LeaderState::for_peers(&peers, persistent.last_log_index()));
            drop(persistent);
            instrumentation::log_election_won(&self.self_id, request.term, votes_received.len() + 1, cluster_size);
            *self.leader_hint.lock().await = Some(self.self_id.clone());
            self.leader_notify.notify_waiters();
        }
        won
    }

    /// How long a follower should wait without hearing from a leader
    /// before calling [`Replica::run_election`] (spec §4.2,
    /// `election_timeout`, randomized per node).
    pub fn next_election_timeout(&self) -> Duration {
        jittered_election_timeout(self.config.election_timeout)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.config.heartbeat_timeout
    }

    /// Adds a node to the cluster. Leader-only (spec §4.2, `Join`). Brings
    /// the new node up to date from the leader's most recent snapshot (if
    /// any) plus any log entries since, rather than leaving it to catch up
    /// one heartbeat at a time (spec §8, S6).
    pub async fn join(&self, node_id: NodeId) -> Result<(), ConsensusError> {
        if !self.is_leader().await {
            return Err(ConsensusError::NotLeader { leader_id: self.leader().await });
        }
        self.membership.lock().await.join(node_id.clone())?;
        instrumentation::log_membership_change(&self.self_id, "join", &node_id);
        self.bring_up_to_date(&node_id).await?;
        Ok(())
    }

    /// Sends a newly joined (or far-behind) peer the leader's most recent
    /// snapshot, then the log tail since that snapshot, so it doesn't need
    /// to replay the cluster's entire history (spec §4.2, "Snapshotting";
    /// spec §8, S6 — "start a fresh node, restore from snapshot").
    async fn bring_up_to_date(&self, peer: &NodeId) -> Result<(), ConsensusError> {
        let persistent = self.persistent.lock().await;

        if persistent.last_snapshot_index != LogIndex::ZERO {
            let snapshot = self.log_store.load_snapshot()?;
            let Some(snapshot) = snapshot else {
                return Ok(());
            };
            let data = snapshot.to_json_bytes().map_err(crate::storage::StorageError::from)?;
            let request = InstallSnapshot {
                term: persistent.current_term,
                leader_id: self.self_id.clone(),
                last_included_index: persistent.last_snapshot_index,
                last_included_term: persistent.last_snapshot_term,
                data,
            };
            self.transport.send_install_snapshot(peer, request).await?;
        }

        let commit_index = self.volatile.lock().await.commit_index;
        let tail = LeaderState::for_peers(std::slice::from_ref(peer), persistent.last_snapshot_index);
        let append = normal::build_append_entries(&persistent, &self.self_id, &tail, peer, commit_index);
        drop(persistent);
        if !append.entries.is_empty() {
            self.transport.send_append_entries(peer, append).await?;
        }
        Ok(())
    }

    /// Removes a node from the cluster. Leader-only (spec §4.2, `Leave`).
    pub async fn leave(&self, node_id: &NodeId) -> Result<(), ConsensusError> {
        if !self.is_leader().await {
            return Err(ConsensusError::NotLeader { leader_id: self.leader().await });
        }
        self.membership.lock().await.leave(node_id)?;
        instrumentation::log_membership_change(&self.self_id, "leave", node_id);
        Ok(())
    }

    pub async fn membership(&self) -> Vec<NodeId> {
        self.membership.lock().await.members().to_vec()
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.config.data_dir
    }
}
