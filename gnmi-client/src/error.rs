use thiserror::Error;

/// Error type for gNMI client operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("RPC error: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("Invalid credential value: {0}")]
    Metadata(#[from] tonic::metadata::errors::InvalidMetadataValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using this crate's Error.
pub type Result<T> = std::result::Result<T, Error>;
