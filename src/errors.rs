//! Error types for the binlog player.
//!
//! Mirrors the error taxonomy from the design: configuration, connection,
//! protocol, SQL, and transient-driver failures all flow through one enum so
//! call sites can propagate with `?` and the top level can log a single
//! cause string alongside the last durable recovery position.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    /// Missing or malformed configuration input.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Cannot reach the primary/lookup DB or the remote change-stream server.
    #[error("connection error: {message}")]
    Connect { message: String },

    /// An event or sequence of events violates the wire protocol: error
    /// field set, unknown sql_type, DML outside a transaction, nested BEGIN,
    /// out-of-range keyspace id, non-integer index id.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// SQL execution failed in a way that is not one of the two recognized
    /// idempotent DDL error codes.
    #[error("sql error executing `{query}`: {message}")]
    Sql { message: String, query: String },

    /// A driver-level error in the connection-lost class. The client already
    /// closed the connection; this variant still propagates as fatal.
    #[error("transient driver error: {message}")]
    TransientDriver { message: String },

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("json error")]
    Json(#[from] serde_json::Error),

    #[error("rpc transport error")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc status error")]
    Status(#[from] tonic::Status),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;

impl PlayerError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn connect<S: Into<String>>(message: S) -> Self {
        Self::Connect { message: message.into() }
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol { message: message.into() }
    }

    pub fn sql<S: Into<String>, Q: Into<String>>(message: S, query: Q) -> Self {
        Self::Sql { message: message.into(), query: query.into() }
    }

    pub fn transient_driver<S: Into<String>>(message: S) -> Self {
        Self::TransientDriver { message: message.into() }
    }

    /// Every variant here is fatal by construction: there is no retryable
    /// variant the core recovers from on its own, so callers always stop the
    /// stream and report the last durable recovery position.
    pub fn is_fatal(&self) -> bool {
        true
    }
}
