//! # kestrel-rbac: project-scoped role authorization
//!
//! Spec §3/§4.5: a three-level role (`viewer < editor < admin`) bound per
//! `(user_id, project_id)`. This crate owns the ordering and the
//! enforcement check; it does not own role storage — that lives in
//! whatever catalog collaborator implements [`RoleRegistry`] (spec §9,
//! "Relational store as collaborator").

pub mod enforcement;
pub mod roles;

pub use enforcement::{require, Operation, RbacError, RoleRegistry};
pub use roles::{RoleAssignment, RoleLevel};
