//! Remote group service + session provider interfaces.

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::{GroupServiceError, SessionError};

/// Account context every remote call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountContext {
    pub account_id: String,
}

impl AccountContext {
    pub fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
        }
    }
}

/// A cluster as the service reports it inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: String,
    pub name: String,
}

/// Full view of a group, as returned by a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDetails {
    pub uuid: String,
    pub name: String,
    pub created: String,
    pub clusters: Vec<ClusterSummary>,
}

/// Result of allocating a new group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddGroupDetails {
    pub uuid: String,
    pub created: String,
}

/// Result of removing a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveGroupDetails {
    pub uuid: String,
}

pub trait GroupService: Send + Sync + 'static {
    /// Allocate a new, empty group under `name`.
    fn add_group(
        &self,
        account: &AccountContext,
        name: &str,
    ) -> impl Future<Output = Result<AddGroupDetails, GroupServiceError>> + Send;

    /// Look a group up by name. A missing group is `GroupServiceError::NotFound`.
    fn group_by_name(
        &self,
        account: &AccountContext,
        name: &str,
    ) -> impl Future<Output = Result<GroupDetails, GroupServiceError>> + Send;

    /// Attach clusters to the group addressed by `uuid`.
    fn group_clusters(
        &self,
        account: &AccountContext,
        uuid: &str,
        cluster_ids: &[String],
    ) -> impl Future<Output = Result<(), GroupServiceError>> + Send;

    /// Detach clusters from the group addressed by `uuid`.
    fn ungroup_clusters(
        &self,
        account: &AccountContext,
        uuid: &str,
        cluster_ids: &[String],
    ) -> impl Future<Output = Result<(), GroupServiceError>> + Send;

    /// Remove a group by name. Membership goes with it.
    fn remove_group_by_name(
        &self,
        account: &AccountContext,
        name: &str,
    ) -> impl Future<Output = Result<RemoveGroupDetails, GroupServiceError>> + Send;
}

pub trait SessionProvider: Send + Sync + 'static {
    /// Resolve the account every subsequent remote call runs under.
    fn resolve_session(&self) -> Result<AccountContext, SessionError>;
}

/// Session provider that always hands out the same account.
#[derive(Debug, Clone)]
pub struct StaticSession {
    account_id: String,
}

impl StaticSession {
    pub fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
        }
    }
}

impl SessionProvider for StaticSession {
    fn resolve_session(&self) -> Result<AccountContext, SessionError> {
        if self.account_id.trim().is_empty() {
            return Err(SessionError::MissingAccount);
        }
        Ok(AccountContext::new(&self.account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_session() {
        let account = StaticSession::new("acc-1").resolve_session().unwrap();
        assert_eq!(account, AccountContext::new("acc-1"));

        let err = StaticSession::new(" ").resolve_session().unwrap_err();
        assert!(matches!(err, SessionError::MissingAccount));
    }
}
