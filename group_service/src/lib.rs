//! Remote cluster-group service interface.
//!
//! Everything the lifecycle controller needs from the outside world lives here:
//! the [`GroupService`] RPC surface, the [`SessionProvider`] that supplies an
//! account context, and an in-process [`InMemoryGroupService`] implementation.

mod error;
mod memory;
mod service;

pub use error::{GroupServiceError, SessionError};
pub use memory::InMemoryGroupService;
pub use service::{
    AccountContext, AddGroupDetails, ClusterSummary, GroupDetails, GroupService,
    RemoveGroupDetails, SessionProvider, StaticSession,
};
