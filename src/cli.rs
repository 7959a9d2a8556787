use clap::{Parser, Subcommand};
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

use group_service::InMemoryGroupService;

use crate::config::Config;
use crate::core::{diff, ClusterGroup, ClusterRef, GroupHandle, LifecycleController, MemberSet};
use crate::plan::{apply, destroy, GroupDeclaration};
use crate::CliError;

#[derive(Parser, Debug)]
#[command(version, about = "Converge a cluster group's membership", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Commands {
    /// Print the attach/detach batches between two membership files
    Plan {
        #[arg(long)]
        observed: PathBuf,
        #[arg(long)]
        desired: PathBuf,
    },
    /// Converge the group described by a declaration file
    Apply {
        #[arg(short, long)]
        declaration: PathBuf,
        /// Persisted record of the group
        #[arg(short, long)]
        state: PathBuf,
        /// Local fleet snapshot standing in for the remote service
        #[arg(short, long)]
        fleet: PathBuf,
    },
    /// Remove the group recorded in the state file
    Destroy {
        #[arg(short, long)]
        state: PathBuf,
        #[arg(short, long)]
        fleet: PathBuf,
    },
    /// Adopt an existing group by name into the state file
    Import {
        name: String,
        #[arg(short, long)]
        state: PathBuf,
        #[arg(short, long)]
        fleet: PathBuf,
    },
}

impl Commands {
    pub fn needs_session(&self) -> bool {
        !matches!(self, Commands::Plan { .. })
    }
}

pub async fn run(command: Commands, config: Option<Config>) -> Result<(), CliError> {
    let (config, state_path, fleet_path) = match (&command, config) {
        (Commands::Plan { observed, desired }, _) => return print_plan(observed, desired),
        (
            Commands::Apply { state, fleet, .. }
            | Commands::Destroy { state, fleet }
            | Commands::Import { state, fleet, .. },
            Some(config),
        ) => (config, state.clone(), fleet.clone()),
        (_, None) => {
            return Err(CliError::CoreError(crate::core::CoreError::Configuration(
                "no account configured".to_string(),
            )))
        }
    };

    let service = load_fleet(&fleet_path)?;
    let controller = LifecycleController::new(service, config.session(), config.timeouts);
    let mut state: Option<ClusterGroup> = read_optional(&state_path)?;

    let result = match command {
        Commands::Apply { declaration, .. } => {
            let declared: GroupDeclaration = read_json(&declaration)?;
            apply(&controller, &mut state, Some(&declared))
                .await
                .map(|action| println!("Applied: {action}"))
        }
        Commands::Destroy { .. } => {
            let mut handle = state.take().map(GroupHandle::from_record);
            let result = destroy(&controller, &mut handle).await;
            state = handle.map(GroupHandle::into_record);
            result.map(|()| println!("Destroyed"))
        }
        Commands::Import { name, .. } => controller.import(&name).await.map(|handle| {
            println!("Imported {} ({})", handle.name(), handle.uuid().unwrap_or_default());
            state = Some(handle.into_record());
        }),
        Commands::Plan { .. } => Ok(()),
    };

    // Persist whatever we learned, even on failure.
    write_optional(&state_path, state.as_ref())?;
    save_fleet(&fleet_path, controller.service())?;
    result.map_err(CliError::from)
}

fn print_plan(observed: &Path, desired: &Path) -> Result<(), CliError> {
    let observed: Vec<ClusterRef> = read_json(observed)?;
    let desired: Vec<ClusterRef> = read_json(desired)?;
    let plan = diff(
        &MemberSet::from_refs(&observed)?,
        &MemberSet::from_refs(&desired)?,
    );
    if plan.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    for cluster in plan.to_attach.iter() {
        println!("+ {cluster}");
    }
    for cluster in plan.to_detach.iter() {
        println!("- {cluster}");
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CliError> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path)
}

fn write_optional<T: Serialize>(path: &Path, value: Option<&T>) -> Result<(), CliError> {
    std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    Ok(())
}

fn load_fleet(path: &Path) -> Result<InMemoryGroupService, CliError> {
    if !path.exists() {
        info!("No fleet snapshot at {}, starting empty", path.display());
        return Ok(InMemoryGroupService::new());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(InMemoryGroupService::from_snapshot(&raw)?)
}

fn save_fleet(path: &Path, service: &InMemoryGroupService) -> Result<(), CliError> {
    std::fs::write(path, service.snapshot()?)?;
    Ok(())
}
