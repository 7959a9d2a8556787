//! Lifecycle state machine for a managed cluster group.
//!
//! # States
//!
//! - **Absent**: no remote group is known for this record
//! - **Creating**: allocation (and initial attach) in flight
//! - **Present**: remote group exists and the record mirrors it
//! - **Reconciling**: attach/detach batches in flight
//! - **Deleting**: removal in flight
//! - **Failed**: the last remote call failed; the same operation may be retried
//!
//! # State Transitions
//!
//! ```text
//! Absent  -- begin(Create) --> Creating -- succeed() --> Present
//! Present -- begin(Update) --> Reconciling -- succeed() --> Present
//! Absent | Present | Failed -- begin(Delete) --> Deleting -- succeed() --> Absent
//! Creating | Reconciling | Deleting -- fail() --> Failed
//! Absent | Present | Failed -- refreshed() / vanished() --> Present / Absent
//! ```

use log::info;
use std::fmt::Display;

use crate::core::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Absent,
    Creating,
    Present,
    Reconciling,
    Deleting,
    Failed,
}

impl Display for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            GroupState::Absent => "Absent",
            GroupState::Creating => "Creating",
            GroupState::Present => "Present",
            GroupState::Reconciling => "Reconciling",
            GroupState::Deleting => "Deleting",
            GroupState::Failed => "Failed",
        };
        write!(f, "{state}")
    }
}

/// Lifecycle operation run against a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Create,
    Read,
    Update,
    Delete,
}

impl Lifecycle {
    /// State the machine sits in while `self` runs. Reads have none.
    fn in_flight_state(self) -> Option<GroupState> {
        match self {
            Lifecycle::Create => Some(GroupState::Creating),
            Lifecycle::Read => None,
            Lifecycle::Update => Some(GroupState::Reconciling),
            Lifecycle::Delete => Some(GroupState::Deleting),
        }
    }
}

impl Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Lifecycle::Create => "create",
            Lifecycle::Read => "read",
            Lifecycle::Update => "update",
            Lifecycle::Delete => "delete",
        };
        write!(f, "{op}")
    }
}

#[derive(Debug, Clone)]
pub struct GroupStateMachine {
    state: GroupState,
}

impl GroupStateMachine {
    pub fn new() -> Self {
        Self {
            state: GroupState::Absent,
        }
    }

    /// Machine for a record the host already persisted.
    pub fn for_record(allocated: bool) -> Self {
        Self {
            state: if allocated {
                GroupState::Present
            } else {
                GroupState::Absent
            },
        }
    }

    pub fn current_state(&self) -> GroupState {
        self.state
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.state,
            GroupState::Creating | GroupState::Reconciling | GroupState::Deleting
        )
    }

    /// Enter the in-flight state for `op`.
    ///
    /// ## Preconditions:
    /// - Create: Absent, or Failed before anything was allocated
    /// - Read: nothing in flight
    /// - Update: Present or Failed, with a remote group allocated
    /// - Delete: nothing in flight; the group is removed by name, so a
    ///   record without a uuid can still be deleted
    pub fn begin(&mut self, op: Lifecycle, allocated: bool) -> Result<(), CoreError> {
        self.can_begin(op, allocated)?;
        if let Some(next) = op.in_flight_state() {
            self.transition(next);
        }
        Ok(())
    }

    /// Check the preconditions of [`begin`](Self::begin) without moving.
    pub fn can_begin(&self, op: Lifecycle, allocated: bool) -> Result<(), CoreError> {
        let legal = match op {
            Lifecycle::Create => {
                !allocated && matches!(self.state, GroupState::Absent | GroupState::Failed)
            }
            Lifecycle::Update => {
                allocated && matches!(self.state, GroupState::Present | GroupState::Failed)
            }
            Lifecycle::Read | Lifecycle::Delete => !self.is_in_flight(),
        };
        if !legal {
            let to = op.in_flight_state().unwrap_or(GroupState::Present);
            return Err(self.invalid(to));
        }
        Ok(())
    }

    /// Finish the in-flight operation successfully.
    pub fn succeed(&mut self) -> Result<(), CoreError> {
        let next = match self.state {
            GroupState::Creating | GroupState::Reconciling => GroupState::Present,
            GroupState::Deleting => GroupState::Absent,
            _ => return Err(self.invalid(GroupState::Present)),
        };
        self.transition(next);
        Ok(())
    }

    /// Abandon the in-flight operation after a remote failure.
    pub fn fail(&mut self) -> Result<(), CoreError> {
        if !self.is_in_flight() {
            return Err(self.invalid(GroupState::Failed));
        }
        self.transition(GroupState::Failed);
        Ok(())
    }

    /// A read found the group.
    pub fn refreshed(&mut self) -> Result<(), CoreError> {
        if self.is_in_flight() {
            return Err(self.invalid(GroupState::Present));
        }
        self.transition(GroupState::Present);
        Ok(())
    }

    /// A read reported the group as gone.
    pub fn vanished(&mut self) -> Result<(), CoreError> {
        if self.is_in_flight() {
            return Err(self.invalid(GroupState::Absent));
        }
        self.transition(GroupState::Absent);
        Ok(())
    }

    fn transition(&mut self, next: GroupState) {
        if self.state != next {
            info!("[transition] {} -> {}", self.state, next);
        }
        self.state = next;
    }

    fn invalid(&self, to: GroupState) -> CoreError {
        CoreError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}

impl Default for GroupStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut machine = GroupStateMachine::new();
        assert_eq!(machine.current_state(), GroupState::Absent);

        machine.begin(Lifecycle::Create, false).unwrap();
        assert_eq!(machine.current_state(), GroupState::Creating);
        machine.succeed().unwrap();
        assert_eq!(machine.current_state(), GroupState::Present);

        machine.begin(Lifecycle::Update, true).unwrap();
        assert_eq!(machine.current_state(), GroupState::Reconciling);
        machine.succeed().unwrap();
        assert_eq!(machine.current_state(), GroupState::Present);

        machine.begin(Lifecycle::Delete, true).unwrap();
        assert_eq!(machine.current_state(), GroupState::Deleting);
        machine.succeed().unwrap();
        assert_eq!(machine.current_state(), GroupState::Absent);
    }

    #[test]
    fn test_failed_operations_can_be_retried() {
        let mut machine = GroupStateMachine::new();
        machine.begin(Lifecycle::Create, false).unwrap();
        machine.fail().unwrap();
        assert_eq!(machine.current_state(), GroupState::Failed);

        // Nothing allocated yet: create again.
        machine.begin(Lifecycle::Create, false).unwrap();
        machine.fail().unwrap();

        // Allocated but attach failed: converge with update, not create.
        assert!(machine.begin(Lifecycle::Create, true).is_err());
        machine.begin(Lifecycle::Update, true).unwrap();
        machine.succeed().unwrap();
        assert_eq!(machine.current_state(), GroupState::Present);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut machine = GroupStateMachine::new();

        let result = machine.begin(Lifecycle::Update, false);
        assert!(matches!(
            result,
            Err(CoreError::InvalidStateTransition { .. })
        ));
        assert!(machine.succeed().is_err());
        assert!(machine.fail().is_err());

        let mut machine = GroupStateMachine::for_record(true);
        assert_eq!(machine.current_state(), GroupState::Present);
        assert!(machine.begin(Lifecycle::Create, true).is_err());

        machine.begin(Lifecycle::Update, true).unwrap();
        assert!(machine.begin(Lifecycle::Delete, true).is_err());
        assert!(machine.can_begin(Lifecycle::Read, true).is_err());
        assert!(machine.refreshed().is_err());
    }

    #[test]
    fn test_delete_needs_only_a_settled_machine() {
        // Create abandoned after the remote side allocated: no uuid known.
        let mut machine = GroupStateMachine::new();
        machine.begin(Lifecycle::Create, false).unwrap();
        machine.fail().unwrap();
        machine.begin(Lifecycle::Delete, false).unwrap();
        assert_eq!(machine.current_state(), GroupState::Deleting);
        machine.succeed().unwrap();

        let mut machine = GroupStateMachine::for_record(false);
        machine.begin(Lifecycle::Delete, false).unwrap();
        assert!(machine.begin(Lifecycle::Delete, false).is_err());
    }

    #[test]
    fn test_lifecycle_labels() {
        assert_eq!(Lifecycle::Read.to_string(), "read");
        assert_eq!(Lifecycle::Delete.to_string(), "delete");
    }

    #[test]
    fn test_reads_settle_state() {
        let mut machine = GroupStateMachine::for_record(false);
        machine.refreshed().unwrap();
        assert_eq!(machine.current_state(), GroupState::Present);
        machine.vanished().unwrap();
        assert_eq!(machine.current_state(), GroupState::Absent);
    }
}
