//! Start command — runs a single Kestrel node in this process.
//!
//! There is no wire transport crate in this workspace (HTTP/gRPC framing
//! is out of scope for the consistency core), so `start` can only run a
//! standalone, single-node cluster: it bootstraps a `Replica` with a
//! transport that has no peers to talk to, wires up the in-memory
//! catalog collaborators, and blocks until interrupted. It exists to let
//! an operator exercise the node end to end, not to run production
//! traffic.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::info;

use kestrel::{
    ChannelEventSink, CoordinationLayer, InMemoryProjectDirectory, InMemoryRevisionLog,
    InMemoryRoleRegistry, InMemorySchemaRegistry, InMemoryUserDirectory, ReplicatedFsm, Replica,
};
use kestrel_config::{NodeConfig as NodeFileConfig, Paths};
use kestrel_consensus::message::{
    AppendEntries, AppendEntriesResponse, InstallSnapshot, InstallSnapshotResponse, RequestVote, RequestVoteResponse,
};
use kestrel_consensus::{NodeConfig as ConsensusNodeConfig, Transport, TransportError};

/// A transport with no reachable peers. Correct for a lone node; any RPC
/// simply reports that the addressee cannot be reached.
struct SolitaryTransport;

#[async_trait]
impl Transport for SolitaryTransport {
    async fn send_request_vote(&self, peer: &str, _request: RequestVote) -> Result<RequestVoteResponse, TransportError> {
        Err(TransportError(format!("no route to peer '{peer}': running without a configured transport")))
    }

    async fn send_append_entries(
        &self,
        peer: &str,
        _request: AppendEntries,
    ) -> Result<AppendEntriesResponse, TransportError> {
        Err(TransportError(format!("no route to peer '{peer}': running without a configured transport")))
    }

    async fn send_install_snapshot(
        &self,
        peer: &str,
        _request: InstallSnapshot,
    ) -> Result<InstallSnapshotResponse, TransportError> {
        Err(TransportError(format!("no route to peer '{peer}': running without a configured transport")))
    }
}

pub async fn run(path: &str, bootstrap: bool) -> Result<()> {
    let project_dir = Path::new(path);
    if !Paths::is_initialized(project_dir) {
        bail!("{} is not initialized. Run 'kestrel init {path}' first.", project_dir.display());
    }

    let mut config = NodeFileConfig::load_from_dir(project_dir).context("failed to load configuration")?;
    config.resolve_paths(project_dir);

    if !config.consensus.join_addresses.is_empty() {
        bail!(
            "multi-node clusters require a wire transport, which this build does not carry; \
             clear consensus.join_addresses in kestrel.toml to run standalone"
        );
    }

    info!(node_id = %config.node.node_id, bind_addr = %config.node.bind_addr, "starting node");
    println!("Kestrel node '{}' starting", config.node.node_id);
    println!("  data dir: {}", config.node.data_dir.display());
    println!("  bind:     {}", config.node.bind_addr);

    let consensus_config = ConsensusNodeConfig {
        node_id: config.node.node_id.clone(),
        bind_addr: config.node.bind_addr.clone(),
        data_dir: config.node.data_dir.clone(),
        bootstrap,
        heartbeat_timeout: config.consensus.heartbeat_timeout(),
        election_timeout: config.consensus.election_timeout(),
        snapshot_interval: config.consensus.snapshot_interval(),
        snapshot_threshold: config.consensus.snapshot_threshold,
        trailing_logs: config.consensus.trailing_logs,
    };

    let fsm = ReplicatedFsm::new();
    let replica = Arc::new(
        Replica::start(consensus_config, Arc::new(SolitaryTransport), fsm, Vec::new())
            .context("failed to start replica")?,
    );

    if bootstrap {
        let won = replica.run_election().await;
        if !won {
            bail!("failed to become leader while bootstrapping a new cluster");
        }
        info!("elected leader of a new single-node cluster");
    } else {
        println!("waiting for a leader (this node was not started with --bootstrap)...");
        replica.wait_for_leader(Duration::from_secs(30)).await;
    }

    let (events, _receiver) = ChannelEventSink::new(1024);
    let _coordination = CoordinationLayer::new(
        Arc::clone(&replica),
        Arc::new(InMemoryRevisionLog::new()),
        Arc::new(InMemorySchemaRegistry::new()),
        Arc::new(InMemoryProjectDirectory::new()),
        Arc::new(InMemoryRoleRegistry::new()),
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(events),
        Duration::from_secs(5),
    );

    println!();
    println!("node is ready. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;

    println!("shutting down");
    Ok(())
}
