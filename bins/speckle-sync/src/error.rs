use sync_api::SyncError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Sync(#[from] SyncError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
