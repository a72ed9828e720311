use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model is already initialized")]
    AlreadyInitialized,

    #[error("Model is not initialized")]
    NotInitialized,

    #[error("No host at index {0}")]
    UnknownHost(usize),

    #[error("Index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Host {0} is no longer in the store")]
    HostGone(String),
}
