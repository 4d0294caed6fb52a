use std::{fmt, io};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;

use crate::event::MindmapEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum MindmapError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to perform this operation")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Record source error: {0}")]
    Source(String),
}

impl MindmapError {
    /// True for errors raised by a [`crate::query::RecordSource`] call itself (transport or
    /// backend failures), as opposed to lookups, permissions, or malformed data.
    pub fn is_source_error(&self) -> bool {
        matches!(self, MindmapError::Source(_) | MindmapError::Io(_))
    }
}

impl From<toml::de::Error> for MindmapError {
    fn from(src: toml::de::Error) -> MindmapError {
        MindmapError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for MindmapError {
    fn from(src: toml::ser::Error) -> MindmapError {
        MindmapError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for MindmapError {
    fn from(src: JsonError) -> MindmapError {
        MindmapError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for MindmapError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => MindmapError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => MindmapError::PermissionDenied,
            _ => MindmapError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for MindmapError {
    fn from(x: fmt::Error) -> Self {
        MindmapError::Custom(format!("{x}"))
    }
}

impl From<RegexError> for MindmapError {
    fn from(x: RegexError) -> Self {
        MindmapError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<TokioSendError<MindmapEvent>> for MindmapError {
    fn from(x: TokioSendError<MindmapEvent>) -> Self {
        MindmapError::Io(format!(
            "Channel update send Error, could not transmit state update event {:?}",
            x.0
        ))
    }
}
