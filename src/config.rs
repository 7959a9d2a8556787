use anyhow::Context;
use std::time::Duration;

use group_service::StaticSession;

/// Ceiling applied to each lifecycle operation when nothing else is configured.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const ACCOUNT_ENV: &str = "CLUSTERGROUP_ACCOUNT";
pub const CREATE_TIMEOUT_ENV: &str = "CLUSTERGROUP_CREATE_TIMEOUT";
pub const READ_TIMEOUT_ENV: &str = "CLUSTERGROUP_READ_TIMEOUT";
pub const UPDATE_TIMEOUT_ENV: &str = "CLUSTERGROUP_UPDATE_TIMEOUT";
pub const DELETE_TIMEOUT_ENV: &str = "CLUSTERGROUP_DELETE_TIMEOUT";

/// Per-operation wait ceilings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub fn uniform(after: Duration) -> Self {
        Self {
            create: after,
            read: after,
            update: after,
            delete: after,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(DEFAULT_OPERATION_TIMEOUT)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Account every remote call runs under
    pub account: String,
    pub timeouts: Timeouts,
}

impl Config {
    /// - requires CLUSTERGROUP_ACCOUNT
    /// - CLUSTERGROUP_{CREATE,READ,UPDATE,DELETE}_TIMEOUT in seconds, optional
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account = lookup(ACCOUNT_ENV)
            .filter(|a| !a.trim().is_empty())
            .context(format!("{ACCOUNT_ENV} is not set"))?;

        let timeout = |key: &str| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => {
                    let secs = raw
                        .trim()
                        .parse::<u64>()
                        .context(format!("Failed to parse {key}: {raw}"))?;
                    anyhow::ensure!(secs > 0, "{key} must be greater than zero");
                    Ok(Duration::from_secs(secs))
                }
                None => Ok(DEFAULT_OPERATION_TIMEOUT),
            }
        };

        Ok(Config {
            account,
            timeouts: Timeouts {
                create: timeout(CREATE_TIMEOUT_ENV)?,
                read: timeout(READ_TIMEOUT_ENV)?,
                update: timeout(UPDATE_TIMEOUT_ENV)?,
                delete: timeout(DELETE_TIMEOUT_ENV)?,
            },
        })
    }

    pub fn session(&self) -> StaticSession {
        StaticSession::new(&self.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[(ACCOUNT_ENV, "acc-1")])).unwrap();
        assert_eq!(config.account, "acc-1");
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.timeouts.read, Duration::from_secs(300));
    }

    #[test]
    fn test_timeout_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ACCOUNT_ENV, "acc-1"),
            (CREATE_TIMEOUT_ENV, "60"),
            (DELETE_TIMEOUT_ENV, " 900 "),
        ]))
        .unwrap();
        assert_eq!(config.timeouts.create, Duration::from_secs(60));
        assert_eq!(config.timeouts.update, DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(config.timeouts.delete, Duration::from_secs(900));
    }

    #[test]
    fn test_missing_account() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[(ACCOUNT_ENV, "  ")])).is_err());
    }

    #[test]
    fn test_bad_timeout() {
        let result = Config::from_lookup(lookup(&[
            (ACCOUNT_ENV, "acc-1"),
            (READ_TIMEOUT_ENV, "five minutes"),
        ]));
        assert!(result.is_err());
        let result = Config::from_lookup(lookup(&[(ACCOUNT_ENV, "acc-1"), (READ_TIMEOUT_ENV, "0")]));
        assert!(result.is_err());
    }
}
