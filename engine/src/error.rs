use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("another orchestrator is already running in this process")]
    AlreadyRunning,
    #[error("failed to read config at {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to watch lock files: {0}")]
    Watch(#[from] notify::Error),
}
