//! # kestrel-kernel: the `ReplicatedFSM` component
//!
//! The pure, deterministic core of the configuration consistency store.
//! Given a committed [`Command`], [`apply_committed`] produces new state
//! and a list of effects — no IO, no clocks, no randomness (spec §4.1).
//!
//! [`ReplicatedFsm`] is the runtime wrapper every consensus replica holds:
//! a reader/writer lock around [`State`] exposing `apply`/`get`/
//! `list_by_project`/`snapshot`/`restore`.
//!
//! ## Architecture
//!
//! - [`state`]: the live `(project_id, key) -> ConfigDocument` map
//! - [`effects`]: what `apply_committed` reports happened
//! - [`kernel`]: the pure `apply_committed` function and its error taxonomy
//! - [`runtime`]: the lock-guarded, instrumented runtime wrapper
//! - [`state_hash`]: a diagnostic content hash for cross-replica comparison

pub mod effects;
pub mod kernel;
pub mod runtime;
pub mod state;
pub mod state_hash;


pub use effects::Effect;
pub use kernel::{apply_committed, apply_committed_batch, KernelError};
pub use runtime::{ConfigDocumentOutcome, ReplicatedFsm, Snapshot, SNAPSHOT_FORMAT_VERSION};
pub use state::State;
pub use state_hash::hash_state;
