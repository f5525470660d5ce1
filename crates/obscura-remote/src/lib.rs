//! Client for the remote processing service.
//!
//! The service executes the same render spec the local engine would:
//! submit the source with the combined filter graph, poll to a terminal
//! state at a fixed interval, download the artifact.

pub mod client;
pub mod error;
pub mod types;

pub use client::{RemoteClient, RemoteConfig};
pub use error::{RemoteError, RemoteResult};
pub use types::{HealthResponse, JobStatusResponse, RemoteJobState, RenderSpec, SubmitResponse};
