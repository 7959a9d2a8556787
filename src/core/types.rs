//! Core types for cluster group management.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use group_service::{ClusterSummary, GroupDetails};

use crate::core::error::CoreError;

/// Reference to a cluster inside a group. Identity is `cluster_id` alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRef {
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ClusterRef {
    pub fn new(cluster_id: &str) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            name: None,
        }
    }

    pub fn named(cluster_id: &str, name: &str) -> Self {
        Self {
            cluster_id: cluster_id.to_string(),
            name: Some(name.to_string()),
        }
    }
}

impl From<ClusterSummary> for ClusterRef {
    fn from(summary: ClusterSummary) -> Self {
        Self {
            cluster_id: summary.id,
            name: (!summary.name.is_empty()).then_some(summary.name),
        }
    }
}

impl Display for ClusterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({name})", self.cluster_id),
            None => write!(f, "{}", self.cluster_id),
        }
    }
}

/// Membership keyed by `cluster_id`.
///
/// Built once at the boundary: blank ids are rejected, duplicate ids collapse
/// to the first occurrence. Iteration order is by `cluster_id`, so anything
/// derived from a `MemberSet` is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemberSet {
    members: BTreeMap<String, ClusterRef>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_refs<'a, I>(refs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = &'a ClusterRef>,
    {
        let mut members = BTreeMap::new();
        for cluster in refs {
            if cluster.cluster_id.trim().is_empty() {
                return Err(CoreError::Configuration(format!(
                    "cluster reference with empty cluster_id: {cluster:?}"
                )));
            }
            members
                .entry(cluster.cluster_id.clone())
                .or_insert_with(|| cluster.clone());
        }
        Ok(Self { members })
    }

    pub fn insert(&mut self, cluster: ClusterRef) {
        self.members
            .entry(cluster.cluster_id.clone())
            .or_insert(cluster);
    }

    pub fn contains(&self, cluster_id: &str) -> bool {
        self.members.contains_key(cluster_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClusterRef> {
        self.members.values()
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        self.members.keys().cloned().collect()
    }

    /// Same `cluster_id`s, regardless of names.
    pub fn same_identities(&self, other: &MemberSet) -> bool {
        self.members.len() == other.members.len()
            && self.members.keys().all(|id| other.members.contains_key(id))
    }

    pub fn into_refs(self) -> Vec<ClusterRef> {
        self.members.into_values().collect()
    }
}

impl FromIterator<ClusterRef> for MemberSet {
    fn from_iter<T: IntoIterator<Item = ClusterRef>>(iter: T) -> Self {
        let mut set = MemberSet::new();
        for cluster in iter {
            set.insert(cluster);
        }
        set
    }
}

/// Drop repeated `cluster_id`s, keeping the first occurrence and the order.
pub fn dedup_refs(refs: &[ClusterRef]) -> Vec<ClusterRef> {
    let mut seen = MemberSet::new();
    let mut out = Vec::with_capacity(refs.len());
    for cluster in refs {
        if !seen.contains(&cluster.cluster_id) {
            seen.insert(cluster.clone());
            out.push(cluster.clone());
        }
    }
    out
}

/// The managed entity as the host persists it.
///
/// `uuid` and `created` are assigned by the remote service and never supplied
/// by the caller. `members` keeps the order it was declared or read in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default)]
    pub members: Vec<ClusterRef>,
}

impl ClusterGroup {
    pub fn new(name: &str, members: Vec<ClusterRef>) -> Self {
        Self {
            name: name.to_string(),
            uuid: None,
            created: None,
            members,
        }
    }

    /// Whether the remote service has allocated this group.
    pub fn is_allocated(&self) -> bool {
        self.uuid.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Overwrite every remote-owned field from a fresh lookup.
    pub fn apply_details(&mut self, details: GroupDetails) {
        self.name = details.name;
        self.uuid = Some(details.uuid);
        self.created = Some(details.created);
        self.members = details.clusters.into_iter().map(ClusterRef::from).collect();
    }

    /// Forget the remote identity; the declaration (`name`) stays.
    pub fn clear_remote(&mut self) {
        self.uuid = None;
        self.created = None;
        self.members.clear();
    }
}
