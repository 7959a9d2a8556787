//! Core library for cluster group management.
//!
//! # Key Components
//!
//! - [`diff`]: the reconciliation engine, observed + desired membership →
//!   attach/detach batches
//! - [`LifecycleController`]: create/read/update/delete against a
//!   [`GroupService`](group_service::GroupService)
//! - [`GroupHandle`]: one managed group's record and lifecycle state

mod controller;
mod error;
mod group_handle;
mod reconcile;
mod state_machine;
mod types;

pub use controller::LifecycleController;
pub use error::{CoreError, Operation};
pub use group_handle::GroupHandle;
pub use reconcile::{after_attach, diff, MembershipDiff};
pub use state_machine::{GroupState, GroupStateMachine, Lifecycle};
pub use types::{dedup_refs, ClusterGroup, ClusterRef, MemberSet};
