//! Audio side: the source graph, its analyser and the device backend.
//!
//! The graph manager keeps exactly one live path (file or microphone) through
//! a freshly created analyser; the renderer only ever sees the
//! [`FrequencySnapshot`] it produces.

mod analyser;
mod backend;
mod cpal_backend;
mod engine;
mod graph;
mod manager;
mod media;

#[cfg(test)]
pub(crate) mod mock;

pub use analyser::FrequencySnapshot;
pub use backend::AudioBackend;
pub use cpal_backend::{list_devices, CpalBackend};
pub use graph::NodeId;
pub use manager::{GraphManager, GraphState};
pub use media::PlaybackEvent;
