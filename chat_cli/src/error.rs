use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid configuration file: {0}")]
    InvalidConfig(#[from] serde_yml::Error),
    #[error("No user name given. Use `--name` or set `name` in the configuration file.")]
    MissingName,
    #[error("The user name cannot be blank.")]
    BlankName,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Could not read operator input. {0}")]
    InputError(#[from] std::io::Error),
}
