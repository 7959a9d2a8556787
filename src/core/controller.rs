//! Lifecycle controller for cluster groups.
//!
//! The controller is handed its collaborators at construction time: a
//! [`GroupService`] for the remote calls and a [`SessionProvider`] for the
//! account they run under. It never retries; a failed operation leaves the
//! handle in a state from which the same operation (or a Read/Update) can be
//! run again.
//!
//! # Typical Flow
//!
//! ```text
//! create(handle)        allocate(name) → attach(uuid, members) → fetch(name)
//! read(handle)          fetch(name) → overwrite uuid/created/members
//! update(handle, new)   diff(old, new) → attach(uuid, +) → detach(uuid, -)
//! delete(handle)        remove(name) → clear uuid/created/members
//! ```

use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;

use group_service::{AccountContext, GroupDetails, GroupService, SessionProvider};

use crate::config::Timeouts;
use crate::core::error::{CoreError, Operation};
use crate::core::group_handle::GroupHandle;
use crate::core::reconcile::{after_attach, diff, MembershipDiff};
use crate::core::state_machine::Lifecycle;
use crate::core::types::{dedup_refs, ClusterGroup, ClusterRef, MemberSet};

pub struct LifecycleController<S, P> {
    service: S,
    session: P,
    timeouts: Timeouts,
}

impl<S, P> LifecycleController<S, P>
where
    S: GroupService,
    P: SessionProvider,
{
    pub fn new(service: S, session: P, timeouts: Timeouts) -> Self {
        Self {
            service,
            session,
            timeouts,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Allocate the group and attach its declared members.
    ///
    /// The record's `uuid`/`created` are filled in as soon as allocation
    /// succeeds, so a failed attach still leaves an identity behind for a
    /// later Read/Update to converge. Finishes by reading the group back.
    ///
    /// # Errors
    /// - [`CoreError::Configuration`] for an empty name or blank `cluster_id`,
    ///   before any remote call
    /// - [`CoreError::InvalidStateTransition`] if the group is already allocated
    pub async fn create(&self, handle: &mut GroupHandle) -> Result<(), CoreError> {
        let name = required("name", &handle.record.name)?;
        let desired = MemberSet::from_refs(&handle.record.members)?;
        handle
            .machine
            .begin(Lifecycle::Create, handle.record.is_allocated())?;

        let outcome = bounded(
            Lifecycle::Create,
            &name,
            self.timeouts.create,
            self.create_remote(&name, &desired, &mut handle.record),
        )
        .await;
        settle(handle, outcome)
    }

    async fn create_remote(
        &self,
        name: &str,
        desired: &MemberSet,
        record: &mut ClusterGroup,
    ) -> Result<(), CoreError> {
        let account = self.session.resolve_session()?;
        debug!(
            "create clustergroup with name: {name}, account: {}",
            account.account_id
        );
        let added = self
            .service
            .add_group(&account, name)
            .await
            .map_err(|e| CoreError::remote(Operation::Allocate, name, e))?;

        let declared = dedup_refs(&record.members);
        record.uuid = Some(added.uuid.clone());
        record.created = Some(added.created);
        record.members.clear();

        let plan = diff(&MemberSet::new(), desired);
        if !plan.to_attach.is_empty() {
            self.attach(&account, name, &added.uuid, &plan).await?;
        }
        record.members = declared;

        // The group was allocated above, so a miss here is a service fault.
        let details = self
            .service
            .group_by_name(&account, name)
            .await
            .map_err(|e| CoreError::remote_failure(Operation::Fetch, name, e))?;
        record.apply_details(details);
        Ok(())
    }

    /// Refresh the record from the remote service.
    ///
    /// On success `uuid`, `created` and `members` are overwritten. When the
    /// service no longer knows the group, the remote fields are cleared, the
    /// handle goes back to `Absent` and [`CoreError::NotFound`] is returned.
    pub async fn read(&self, handle: &mut GroupHandle) -> Result<(), CoreError> {
        let name = required("name", &handle.record.name)?;
        handle.machine.can_begin(Lifecycle::Read, handle.record.is_allocated())?;

        let outcome = bounded(Lifecycle::Read, &name, self.timeouts.read, async {
            let account = self.session.resolve_session()?;
            debug!(
                "get clustergroup with name: {name}, account: {}",
                account.account_id
            );
            self.fetch(&account, &name).await
        })
        .await;

        match outcome {
            Ok(details) => {
                handle.record.apply_details(details);
                handle.machine.refreshed()
            }
            Err(err) if err.is_not_found() => {
                warn!("clustergroup {name} is gone from the remote service");
                handle.record.clear_remote();
                handle.machine.vanished()?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Converge remote membership from the record's members to `desired`.
    ///
    /// Returns the diff that was applied; an empty diff means no remote call
    /// was made. Attach always goes out before detach. If the attach batch
    /// lands and the detach batch fails, the record's members become
    /// `old ∪ attached`, so running the same update again only detaches.
    pub async fn update(
        &self,
        handle: &mut GroupHandle,
        desired: &[ClusterRef],
    ) -> Result<MembershipDiff, CoreError> {
        let name = required("name", &handle.record.name)?;
        let uuid = required("uuid", handle.record.uuid.as_deref().unwrap_or_default())?;
        let old = MemberSet::from_refs(&handle.record.members)?;
        let new = MemberSet::from_refs(desired)?;
        handle.machine.can_begin(Lifecycle::Update, true)?;

        if old.same_identities(&new) {
            debug!("update clustergroup {name}: no change in clusters");
            handle.record.members = dedup_refs(desired);
            handle.machine.refreshed()?;
            return Ok(MembershipDiff::default());
        }

        let plan = diff(&old, &new);
        handle.machine.begin(Lifecycle::Update, true)?;
        let outcome = bounded(
            Lifecycle::Update,
            &name,
            self.timeouts.update,
            self.update_remote(&name, &uuid, &old, &plan, &mut handle.record),
        )
        .await;
        settle(handle, outcome)?;

        handle.record.members = dedup_refs(desired);
        Ok(plan)
    }

    async fn update_remote(
        &self,
        name: &str,
        uuid: &str,
        old: &MemberSet,
        plan: &MembershipDiff,
        record: &mut ClusterGroup,
    ) -> Result<(), CoreError> {
        let account = self.session.resolve_session()?;
        if !plan.to_attach.is_empty() {
            self.attach(&account, name, uuid, plan).await?;
            record.members = after_attach(old, plan);
        }
        if !plan.to_detach.is_empty() {
            self.detach(&account, name, uuid, plan).await?;
        }
        Ok(())
    }

    /// Remove the group by name. Membership is released by the service.
    ///
    /// Only the name is needed: a record whose uuid was never learned (say a
    /// create that timed out after the service allocated) is still removed.
    /// Returns the uuid of the removed group. A group the service no longer
    /// knows is reported as [`CoreError::NotFound`] and the record is
    /// cleared all the same.
    pub async fn delete(&self, handle: &mut GroupHandle) -> Result<String, CoreError> {
        let name = required("name", &handle.record.name)?;
        handle
            .machine
            .begin(Lifecycle::Delete, handle.record.is_allocated())?;

        let outcome = bounded(Lifecycle::Delete, &name, self.timeouts.delete, async {
            let account = self.session.resolve_session()?;
            debug!(
                "remove clustergroup with name: {name}, account: {}",
                account.account_id
            );
            self.service
                .remove_group_by_name(&account, &name)
                .await
                .map_err(|e| CoreError::remote(Operation::Remove, &name, e))
        })
        .await;

        match outcome {
            Ok(removed) => {
                info!(
                    "Removed clustergroup with name: {name}, uuid: {}",
                    removed.uuid
                );
                handle.record.clear_remote();
                handle.machine.succeed()?;
                Ok(removed.uuid)
            }
            Err(err) if err.is_not_found() => {
                warn!("clustergroup {name} was already removed");
                handle.record.clear_remote();
                handle.machine.succeed()?;
                Err(err)
            }
            Err(err) => {
                handle.machine.fail()?;
                Err(err)
            }
        }
    }

    /// Adopt an existing remote group by name.
    pub async fn import(&self, name: &str) -> Result<GroupHandle, CoreError> {
        let mut handle = GroupHandle::declare(name, Vec::new());
        self.read(&mut handle).await?;
        Ok(handle)
    }

    async fn fetch(&self, account: &AccountContext, name: &str) -> Result<GroupDetails, CoreError> {
        self.service
            .group_by_name(account, name)
            .await
            .map_err(|e| CoreError::remote(Operation::Fetch, name, e))
    }

    async fn attach(
        &self,
        account: &AccountContext,
        name: &str,
        uuid: &str,
        plan: &MembershipDiff,
    ) -> Result<(), CoreError> {
        let ids = plan.attach_ids();
        debug!("attach clusters {ids:?} to clustergroup {name} ({uuid})");
        self.service
            .group_clusters(account, uuid, &ids)
            .await
            .map_err(|e| {
                warn!("attaching clusters to clustergroup {name} failed with: {e}");
                CoreError::remote(Operation::Attach, name, e)
            })
    }

    async fn detach(
        &self,
        account: &AccountContext,
        name: &str,
        uuid: &str,
        plan: &MembershipDiff,
    ) -> Result<(), CoreError> {
        let ids = plan.detach_ids();
        debug!("detach clusters {ids:?} from clustergroup {name} ({uuid})");
        self.service
            .ungroup_clusters(account, uuid, &ids)
            .await
            .map_err(|e| {
                warn!("detaching clusters from clustergroup {name} failed with: {e}");
                CoreError::remote(Operation::Detach, name, e)
            })
    }
}

fn required(field: &str, value: &str) -> Result<String, CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Configuration(format!(
            "cluster group {field} is empty"
        )));
    }
    Ok(value.to_string())
}

/// Run `fut`, giving up after `after`.
async fn bounded<T, F>(
    operation: Lifecycle,
    name: &str,
    after: Duration,
    fut: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{operation} of clustergroup {name} abandoned after {after:?}");
            Err(CoreError::Timeout {
                operation,
                name: name.to_string(),
                after,
            })
        }
    }
}

fn settle(handle: &mut GroupHandle, outcome: Result<(), CoreError>) -> Result<(), CoreError> {
    match outcome {
        Ok(()) => handle.machine.succeed(),
        Err(err) => {
            handle.machine.fail()?;
            Err(err)
        }
    }
}
