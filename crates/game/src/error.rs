//! Error types for loading maps, items and persisted state.

use std::path::PathBuf;

use cragmoor_physics::BuildError;
use thiserror::Error;

/// Failure to fetch a raw asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to create an item from its descriptor.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("malformed item descriptor {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("item descriptor {id} is invalid: {reason}")]
    Invalid { id: String, reason: String },

    #[error("item {0} could not be shown on the map")]
    ShowRejected(String),
}

/// Failure to load or switch maps.
#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("malformed map {map}: {source}")]
    Parse {
        map: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid map {map}: {reason}")]
    Invalid { map: String, reason: String },

    #[error("bad geometry in map {map}, layer {layer}: {source}")]
    Geometry {
        map: String,
        layer: String,
        #[source]
        source: BuildError,
    },

    #[error("map {0} has no player spawn object")]
    MissingSpawn(String),

    #[error("a map transition is already in progress")]
    TransitionInProgress,

    #[error("no map is active")]
    NoActiveMap,

    #[error("map loader for {map} stopped without a result: {reason}")]
    WorkerLost { map: String, reason: String },

    #[error("failed to start map loader: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A trigger command that the console rejected.
#[derive(Debug, Error)]
#[error("command `{command}` failed: {message}")]
pub struct CommandError {
    pub command: String,
    pub message: String,
}

/// Failure to encode or decode the interactable state store.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}
