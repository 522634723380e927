//! Error types for the audio graph and its collaborators
use std::path::PathBuf;
use thiserror::Error;

use crate::audio::NodeId;

/// Errors surfaced by the audio source graph
///
/// Teardown never produces one of these: disconnects and track stops are
/// best-effort and only logged. What reaches the caller is an acquisition
/// failure the user can retry with a fresh action.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Microphone could not be opened (no device, refused, or failed to start)
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// The playback collaborator refused to start
    #[error("playback failed to start: {0}")]
    PlaybackStartFailure(String),

    /// The media file could not be decoded
    #[error("could not decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// The output engine could not be created
    #[error("audio engine unavailable: {0}")]
    Engine(String),

    /// Captured audio must never reach the engine output
    #[error("microphone source may not be routed to the engine output")]
    FeedbackRoute,

    /// Connection attempted with a node that is not in the graph
    #[error("unknown graph node {0}")]
    UnknownNode(NodeId),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
