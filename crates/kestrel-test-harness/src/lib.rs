//! # kestrel-test-harness
//!
//! An in-process builder for a fully wired Kestrel core, plus an
//! in-memory multi-node [`Transport`](kestrel_consensus::Transport) that
//! routes Raft RPCs between [`Replica`](kestrel_consensus::Replica)s in
//! one process. `kestrel-consensus`'s own doc comment promises this
//! crate supplies that transport (see `kestrel_consensus::replica`); this
//! is that promise kept, generalized from the private router
//! `kestrel-consensus::tests` built for its own single-crate tests and
//! the single-node harness `kestrel::coordination::tests` built for
//! `CoordinationLayer`.
//!
//! Two entry points:
//! - [`ClusterRouter`]: spins up an N-node Raft cluster in one process,
//!   bootstraps it, and returns live [`Replica`] handles — for consensus-
//!   level tests (elections, partitions, failover).
//! - [`TestKestrel`]: a single-node cluster plus every `CoordinationLayer`
//!   collaborator (schemas, projects, roles, users), assembled behind a
//!   fluent builder — for coordination-level tests (the write/read paths
//!   of spec §4.5) that don't care about multi-node behavior.

pub mod builder;
pub mod router;

pub use builder::TestKestrel;
pub use router::{ClusterRouter, RoutedTransport};
