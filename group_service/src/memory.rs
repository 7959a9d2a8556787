use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{
    AccountContext, AddGroupDetails, ClusterSummary, GroupDetails, GroupService,
    GroupServiceError, RemoveGroupDetails,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredGroup {
    uuid: String,
    created: String,
    clusters: Vec<ClusterSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FleetState {
    /// account id -> group name -> group
    groups: HashMap<String, HashMap<String, StoredGroup>>,
    /// Registered clusters (id -> name). `None` accepts any cluster id.
    inventory: Option<HashMap<String, String>>,
}

/// In-process group service.
/// Holds every account's groups behind a mutex and can be snapshotted to JSON,
/// which is how the CLI keeps a local fleet between runs.
#[derive(Debug, Default)]
pub struct InMemoryGroupService {
    state: Mutex<FleetState>,
}

impl InMemoryGroupService {
    pub fn new() -> Self {
        InMemoryGroupService::default()
    }

    /// Only the given `(id, name)` clusters may be attached.
    pub fn with_clusters<I, S>(clusters: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let inventory = clusters
            .into_iter()
            .map(|(id, name)| (id.into(), name.into()))
            .collect();
        Self {
            state: Mutex::new(FleetState {
                groups: HashMap::new(),
                inventory: Some(inventory),
            }),
        }
    }

    pub fn snapshot(&self) -> Result<String, GroupServiceError> {
        let state = self.lock()?;
        Ok(serde_json::to_string_pretty(&*state)?)
    }

    pub fn from_snapshot(json: &str) -> Result<Self, GroupServiceError> {
        let state: FleetState = serde_json::from_str(json)?;
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Number of groups held for `account`.
    pub fn group_count(&self, account: &AccountContext) -> usize {
        self.lock()
            .map(|s| s.groups.get(&account.account_id).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FleetState>, GroupServiceError> {
        self.state
            .lock()
            .map_err(|e| GroupServiceError::Other(anyhow::anyhow!("fleet state poisoned: {e}")))
    }
}

fn group_by_uuid<'a>(
    state: &'a mut FleetState,
    account: &AccountContext,
    uuid: &str,
) -> Result<&'a mut StoredGroup, GroupServiceError> {
    state
        .groups
        .get_mut(&account.account_id)
        .and_then(|groups| groups.values_mut().find(|g| g.uuid == uuid))
        .ok_or_else(|| GroupServiceError::NotFound(format!("group with uuid {uuid}")))
}

impl GroupService for InMemoryGroupService {
    async fn add_group(
        &self,
        account: &AccountContext,
        name: &str,
    ) -> Result<AddGroupDetails, GroupServiceError> {
        let mut state = self.lock()?;
        let groups = state.groups.entry(account.account_id.clone()).or_default();
        if groups.contains_key(name) {
            return Err(GroupServiceError::Conflict(format!(
                "group {name} already exists"
            )));
        }
        let group = StoredGroup {
            uuid: uuid::Uuid::new_v4().to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            clusters: Vec::new(),
        };
        debug!("allocated group {name} with uuid {}", group.uuid);
        let details = AddGroupDetails {
            uuid: group.uuid.clone(),
            created: group.created.clone(),
        };
        groups.insert(name.to_string(), group);
        Ok(details)
    }

    async fn group_by_name(
        &self,
        account: &AccountContext,
        name: &str,
    ) -> Result<GroupDetails, GroupServiceError> {
        let state = self.lock()?;
        let group = state
            .groups
            .get(&account.account_id)
            .and_then(|groups| groups.get(name))
            .ok_or_else(|| GroupServiceError::NotFound(format!("group {name}")))?;
        Ok(GroupDetails {
            uuid: group.uuid.clone(),
            name: name.to_string(),
            created: group.created.clone(),
            clusters: group.clusters.clone(),
        })
    }

    async fn group_clusters(
        &self,
        account: &AccountContext,
        uuid: &str,
        cluster_ids: &[String],
    ) -> Result<(), GroupServiceError> {
        let mut state = self.lock()?;
        let mut resolved = Vec::with_capacity(cluster_ids.len());
        for id in cluster_ids {
            let name = match &state.inventory {
                Some(inventory) => inventory
                    .get(id)
                    .cloned()
                    .ok_or_else(|| GroupServiceError::NotFound(format!("cluster {id}")))?,
                None => id.clone(),
            };
            resolved.push(ClusterSummary {
                id: id.clone(),
                name,
            });
        }

        let group = group_by_uuid(&mut state, account, uuid)?;
        for cluster in resolved {
            if !group.clusters.iter().any(|c| c.id == cluster.id) {
                group.clusters.push(cluster);
            }
        }
        Ok(())
    }

    async fn ungroup_clusters(
        &self,
        account: &AccountContext,
        uuid: &str,
        cluster_ids: &[String],
    ) -> Result<(), GroupServiceError> {
        let mut state = self.lock()?;
        let group = group_by_uuid(&mut state, account, uuid)?;
        group.clusters.retain(|c| !cluster_ids.contains(&c.id));
        Ok(())
    }

    async fn remove_group_by_name(
        &self,
        account: &AccountContext,
        name: &str,
    ) -> Result<RemoveGroupDetails, GroupServiceError> {
        let mut state = self.lock()?;
        let group = state
            .groups
            .get_mut(&account.account_id)
            .and_then(|groups| groups.remove(name))
            .ok_or_else(|| GroupServiceError::NotFound(format!("group {name}")))?;
        Ok(RemoveGroupDetails { uuid: group.uuid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_group_twice_conflicts() {
        let service = InMemoryGroupService::new();
        let account = AccountContext::new("acc");

        service.add_group(&account, "g1").await.unwrap();
        let err = service.add_group(&account, "g1").await.unwrap_err();
        assert!(matches!(err, GroupServiceError::Conflict(_)));
        assert_eq!(service.group_count(&account), 1);
    }

    #[tokio::test]
    async fn test_groups_are_scoped_per_account() {
        let service = InMemoryGroupService::new();
        service
            .add_group(&AccountContext::new("a"), "g1")
            .await
            .unwrap();

        let err = service
            .group_by_name(&AccountContext::new("b"), "g1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_attach_and_detach() {
        let service = InMemoryGroupService::new();
        let account = AccountContext::new("acc");
        let added = service.add_group(&account, "g1").await.unwrap();

        service
            .group_clusters(&account, &added.uuid, &ids(&["c1", "c2", "c1"]))
            .await
            .unwrap();
        service
            .ungroup_clusters(&account, &added.uuid, &ids(&["c1", "missing"]))
            .await
            .unwrap();

        let group = service.group_by_name(&account, "g1").await.unwrap();
        assert_eq!(group.uuid, added.uuid);
        assert_eq!(group.created, added.created);
        assert_eq!(
            group.clusters,
            vec![ClusterSummary {
                id: "c2".to_string(),
                name: "c2".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_attach_unknown_cluster_with_inventory() {
        let service = InMemoryGroupService::with_clusters([("c1", "prod-east")]);
        let account = AccountContext::new("acc");
        let added = service.add_group(&account, "g1").await.unwrap();

        let err = service
            .group_clusters(&account, &added.uuid, &ids(&["c1", "c9"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // Nothing from the rejected batch is applied.
        let group = service.group_by_name(&account, "g1").await.unwrap();
        assert!(group.clusters.is_empty());

        service
            .group_clusters(&account, &added.uuid, &ids(&["c1"]))
            .await
            .unwrap();
        let group = service.group_by_name(&account, "g1").await.unwrap();
        assert_eq!(group.clusters[0].name, "prod-east");
    }

    #[tokio::test]
    async fn test_remove_group_releases_membership() {
        let service = InMemoryGroupService::new();
        let account = AccountContext::new("acc");
        let added = service.add_group(&account, "g1").await.unwrap();
        service
            .group_clusters(&account, &added.uuid, &ids(&["c1"]))
            .await
            .unwrap();

        let removed = service.remove_group_by_name(&account, "g1").await.unwrap();
        assert_eq!(removed.uuid, added.uuid);

        let err = service
            .group_clusters(&account, &added.uuid, &ids(&["c1"]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        let err = service
            .remove_group_by_name(&account, "g1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_snapshot_restores_fleet() {
        let service = InMemoryGroupService::new();
        let account = AccountContext::new("acc");
        let added = service.add_group(&account, "g1").await.unwrap();
        service
            .group_clusters(&account, &added.uuid, &ids(&["c1"]))
            .await
            .unwrap();

        let restored = InMemoryGroupService::from_snapshot(&service.snapshot().unwrap()).unwrap();
        let group = restored.group_by_name(&account, "g1").await.unwrap();
        assert_eq!(group.uuid, added.uuid);
        assert_eq!(group.clusters.len(), 1);
    }
}
