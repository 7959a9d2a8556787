//! Per-group state container.
//!
//! A [`GroupHandle`] pairs the record the host persists ([`ClusterGroup`])
//! with the lifecycle state machine for that record. The controller mutates
//! both; the host reads the record back after every operation and stores it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       GroupHandle                       │
//! ├─────────────────────────────────────────────────────────┤
//! │  record.name     │  identity key, immutable             │
//! │  record.uuid     │  assigned by the remote service      │
//! │  record.created  │  assigned by the remote service      │
//! │  record.members  │  last known / declared membership    │
//! │  machine         │  Absent, Present, Failed, ...        │
//! └─────────────────────────────────────────────────────────┘
//! ```

use crate::core::state_machine::{GroupState, GroupStateMachine};
use crate::core::types::{ClusterGroup, ClusterRef};

#[derive(Clone, Debug)]
pub struct GroupHandle {
    pub(crate) record: ClusterGroup,
    pub(crate) machine: GroupStateMachine,
}

impl GroupHandle {
    /// A group that has been declared but not created yet.
    pub fn declare(name: &str, members: Vec<ClusterRef>) -> Self {
        Self {
            record: ClusterGroup::new(name, members),
            machine: GroupStateMachine::new(),
        }
    }

    /// Rebuild a handle from a record the host persisted earlier.
    pub fn from_record(record: ClusterGroup) -> Self {
        let machine = GroupStateMachine::for_record(record.is_allocated());
        Self { record, machine }
    }

    pub fn record(&self) -> &ClusterGroup {
        &self.record
    }

    pub fn into_record(self) -> ClusterGroup {
        self.record
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn uuid(&self) -> Option<&str> {
        self.record.uuid.as_deref()
    }

    pub fn members(&self) -> &[ClusterRef] {
        &self.record.members
    }

    pub fn state(&self) -> GroupState {
        self.machine.current_state()
    }
}
