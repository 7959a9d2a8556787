//! Host-side driver: turn a declaration plus the persisted record into one
//! lifecycle operation and run it.
//!
//! ```text
//! persisted record ──read()──► refreshed record ─┐
//!                                                ├── plan_action() ──► Create / Update / Replace / Delete / Noop
//! declaration ───────────────────────────────────┘
//! ```
//!
//! The record slot passed to [`apply`] is kept current on every path,
//! including failures, so the caller can persist it unconditionally.

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use group_service::{GroupService, SessionProvider};

use crate::core::{ClusterGroup, ClusterRef, CoreError, GroupHandle, LifecycleController, MemberSet};

/// What a client declares: a name and the clusters it should hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupDeclaration {
    pub name: String,
    #[serde(default)]
    pub members: Vec<ClusterRef>,
}

impl GroupDeclaration {
    pub fn validate(&self) -> Result<MemberSet, CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Configuration(
                "cluster group name is empty".to_string(),
            ));
        }
        MemberSet::from_refs(&self.members)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Noop,
    Create,
    Update,
    /// Name changed: delete the old group, create the new one.
    Replace,
    Delete,
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self {
            Action::Noop => "no changes",
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
        };
        write!(f, "{action}")
    }
}

/// Decide which lifecycle operation brings `current` in line with `declared`.
pub fn plan_action(
    current: Option<&ClusterGroup>,
    declared: Option<&GroupDeclaration>,
) -> Result<Action, CoreError> {
    let current = current.filter(|c| c.is_allocated());
    let action = match (current, declared) {
        (None, None) => Action::Noop,
        (None, Some(declared)) => {
            declared.validate()?;
            Action::Create
        }
        (Some(_), None) => Action::Delete,
        (Some(current), Some(declared)) => {
            let desired = declared.validate()?;
            if current.name != declared.name {
                Action::Replace
            } else if MemberSet::from_refs(&current.members)?.same_identities(&desired) {
                Action::Noop
            } else {
                Action::Update
            }
        }
    };
    Ok(action)
}

/// Refresh `state`, plan against `declared`, run the planned operation.
pub async fn apply<S, P>(
    controller: &LifecycleController<S, P>,
    state: &mut Option<ClusterGroup>,
    declared: Option<&GroupDeclaration>,
) -> Result<Action, CoreError>
where
    S: GroupService,
    P: SessionProvider,
{
    if let Some(declared) = declared {
        declared.validate()?;
    }

    // Records are refreshed by name: one whose uuid was never learned may
    // still name a group the service allocated.
    let mut handle = None;
    if let Some(record) = state.take().filter(|r| !r.name.trim().is_empty()) {
        let mut refreshed = GroupHandle::from_record(record);
        match controller.read(&mut refreshed).await {
            Ok(()) => handle = Some(refreshed),
            Err(err) if err.is_not_found() => {
                info!("clustergroup {} no longer exists, dropping record", refreshed.name());
            }
            Err(err) => {
                *state = Some(refreshed.into_record());
                return Err(err);
            }
        }
    }

    let action = match plan_action(handle.as_ref().map(GroupHandle::record), declared) {
        Ok(action) => action,
        Err(err) => {
            *state = handle.map(GroupHandle::into_record);
            return Err(err);
        }
    };
    info!("plan: {action}");
    let result = execute(controller, &mut handle, action, declared).await;
    *state = handle.map(GroupHandle::into_record);
    result.map(|()| action)
}

async fn execute<S, P>(
    controller: &LifecycleController<S, P>,
    handle: &mut Option<GroupHandle>,
    action: Action,
    declared: Option<&GroupDeclaration>,
) -> Result<(), CoreError>
where
    S: GroupService,
    P: SessionProvider,
{
    match (action, declared) {
        (Action::Create, Some(declared)) => create(controller, handle, declared).await,
        (Action::Update, Some(declared)) => match handle.as_mut() {
            Some(current) => controller
                .update(current, &declared.members)
                .await
                .map(|_| ()),
            None => Ok(()),
        },
        (Action::Replace, Some(declared)) => {
            destroy(controller, handle).await?;
            create(controller, handle, declared).await
        }
        (Action::Delete, _) => destroy(controller, handle).await,
        _ => Ok(()),
    }
}

async fn create<S, P>(
    controller: &LifecycleController<S, P>,
    handle: &mut Option<GroupHandle>,
    declared: &GroupDeclaration,
) -> Result<(), CoreError>
where
    S: GroupService,
    P: SessionProvider,
{
    let mut created = GroupHandle::declare(&declared.name, declared.members.clone());
    let result = controller.create(&mut created).await;
    *handle = Some(created);
    result
}

/// Delete the group behind `handle`; a group that is already gone counts.
pub async fn destroy<S, P>(
    controller: &LifecycleController<S, P>,
    handle: &mut Option<GroupHandle>,
) -> Result<(), CoreError>
where
    S: GroupService,
    P: SessionProvider,
{
    let Some(current) = handle.as_mut() else {
        return Ok(());
    };
    match controller.delete(current).await {
        Ok(_) => {
            *handle = None;
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            *handle = None;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(name: &str, ids: &[&str]) -> GroupDeclaration {
        GroupDeclaration {
            name: name.to_string(),
            members: ids.iter().map(|id| ClusterRef::new(id)).collect(),
        }
    }

    fn record(name: &str, ids: &[&str]) -> ClusterGroup {
        ClusterGroup {
            name: name.to_string(),
            uuid: Some("u1".to_string()),
            created: Some("2021-06-01T00:00:00Z".to_string()),
            members: ids.iter().map(|id| ClusterRef::new(id)).collect(),
        }
    }

    #[test]
    fn test_plan_create_and_delete() {
        let d = declared("g1", &["c1"]);
        assert_eq!(plan_action(None, Some(&d)).unwrap(), Action::Create);
        assert_eq!(
            plan_action(Some(&record("g1", &["c1"])), None).unwrap(),
            Action::Delete
        );
        assert_eq!(plan_action(None, None).unwrap(), Action::Noop);
    }

    #[test]
    fn test_plan_unallocated_record_is_created() {
        let unallocated = ClusterGroup::new("g1", vec![ClusterRef::new("c1")]);
        let d = declared("g1", &["c1"]);
        assert_eq!(
            plan_action(Some(&unallocated), Some(&d)).unwrap(),
            Action::Create
        );
    }

    #[test]
    fn test_plan_membership_drift() {
        let current = record("g1", &["c1", "c2"]);
        assert_eq!(
            plan_action(Some(&current), Some(&declared("g1", &["c2", "c1"]))).unwrap(),
            Action::Noop
        );
        assert_eq!(
            plan_action(Some(&current), Some(&declared("g1", &["c2", "c3"]))).unwrap(),
            Action::Update
        );
    }

    #[test]
    fn test_plan_rename_forces_replace() {
        let current = record("g1", &["c1"]);
        assert_eq!(
            plan_action(Some(&current), Some(&declared("g2", &["c1"]))).unwrap(),
            Action::Replace
        );
    }

    #[test]
    fn test_plan_rejects_bad_declaration() {
        let result = plan_action(None, Some(&declared("", &["c1"])));
        assert!(matches!(result, Err(CoreError::Configuration(_))));
        let result = plan_action(None, Some(&declared("g1", &["c1", ""])));
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }

    #[test]
    fn test_declaration_rejects_remote_fields() {
        let json = r#"{"name":"g1","uuid":"u1","members":[]}"#;
        assert!(serde_json::from_str::<GroupDeclaration>(json).is_err());
        let json = r#"{"name":"g1","members":[{"cluster_id":"c1","name":"prod"}]}"#;
        let d: GroupDeclaration = serde_json::from_str(json).unwrap();
        assert_eq!(d.members, vec![ClusterRef::named("c1", "prod")]);
    }
}
