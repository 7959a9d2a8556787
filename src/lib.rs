use group_service::GroupServiceError;

pub mod cli;
pub mod config;
pub mod core;
pub mod plan;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Problem from std::io library: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    CoreError(#[from] crate::core::CoreError),
    #[error(transparent)]
    GroupServiceError(#[from] GroupServiceError),
}
