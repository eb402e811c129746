use reqwest::StatusCode;
use thiserror::Error;

use crate::modules::transport::ConnectionId;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("live connection is not open")]
    NotOpen,
    #[error("connection {0} is no longer current")]
    Stale(ConnectionId),
    #[error("connection task is gone")]
    ChannelClosed,
    #[error("connect failed: {0}")]
    Connect(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request failed: status={status}")]
    BadStatus { status: StatusCode },
    #[error("unexpected response body: {0:?}")]
    UnexpectedBody(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid host {host:?}: {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("sync actor unavailable")]
pub struct ActorUnavailable;
