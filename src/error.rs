//! Error types for the pool sniper

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pool sniper
#[derive(Error, Debug, Clone)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout: {0}")]
    RpcTimeout(String),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    #[error("Not found on chain: {0}")]
    NotFound(String),

    // Subscription errors
    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),

    // Raydium / SPL decoding errors
    #[error("Not a pool creation transaction: {0}")]
    Parse(String),

    #[error("Account decode failed: {0}")]
    Decode(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // Trading errors
    #[error("Buy failed: {0}")]
    Buy(String),

    #[error("Sell failed: {0}")]
    Sell(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_) | Error::RpcTimeout(_) | Error::RpcConnection(_) | Error::NotFound(_)
        )
    }

    /// Check if this error means the input was not what we expected
    /// (a non-pool transaction or a malformed account), as opposed to a
    /// failure talking to the chain.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Error::Parse(_) | Error::Decode(_) | Error::InvalidAddress(_)
        )
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        use solana_client::client_error::ClientErrorKind;
        use std::io::ErrorKind;

        match e.kind() {
            ClientErrorKind::Reqwest(r) if r.is_timeout() => Error::RpcTimeout(e.to_string()),
            ClientErrorKind::Reqwest(r) if r.is_connect() => Error::RpcConnection(e.to_string()),
            ClientErrorKind::Io(io) if io.kind() == ErrorKind::TimedOut => {
                Error::RpcTimeout(e.to_string())
            }
            ClientErrorKind::Io(io)
                if matches!(
                    io.kind(),
                    ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::NotConnected
                ) =>
            {
                Error::RpcConnection(e.to_string())
            }
            _ => Error::Rpc(e.to_string()),
        }
    }
}

impl From<solana_client::nonblocking::pubsub_client::PubsubClientError> for Error {
    fn from(e: solana_client::nonblocking::pubsub_client::PubsubClientError) -> Self {
        Error::Subscription(e.to_string())
    }
}

impl From<solana_sdk::pubkey::ParsePubkeyError> for Error {
    fn from(e: solana_sdk::pubkey::ParsePubkeyError) -> Self {
        Error::InvalidAddress(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
