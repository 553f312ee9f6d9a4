//! Error types shared across the monitor.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, validating or persisting configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of a single DNS or HTTP probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{0}")]
    Dns(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response; the code is still reported in the snapshot.
    #[error("Status code was not 200.")]
    Status { code: u16, content_size: usize },

    #[error("Content match failed: expected text not found.")]
    ContentMismatch,
}

/// Errors from the node's JSON-RPC interface.
///
/// Protocol errors carry the node's structured code and message and are
/// treated the same as transport failures by the scheduler.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("rpc transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error code: {code}, message: {message}")]
    Protocol { code: i64, message: String },

    #[error("rpc response for {0} had neither result nor error")]
    EmptyResult(String),
}

/// Errors from the messaging platform client.
#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("session start request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session start rejected: {0}")]
    Rejected(String),

    #[error("channel or group {0} not found in session metadata")]
    UnknownChannel(String),

    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("websocket write stalled for {0:?}")]
    SendTimeout(std::time::Duration),
}
