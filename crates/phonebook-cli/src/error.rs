use std::io;

use phonebook_core::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] phonebook_core::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Contact ID cannot be empty")]
    EmptyContactId,
    #[error("Nothing to change: pass --name, --phone, --avatar, or --clear-photo")]
    EmptyEdit,
    #[error("Avatar path has no file name: {0}")]
    InvalidAvatarPath(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
