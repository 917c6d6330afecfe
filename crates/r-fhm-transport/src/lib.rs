//! ---
//! fhm_section: "02-messaging-ipc-data-model"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Broadcast payload model and transport backends."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod transport;
pub mod types;

/// Shared result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors surfaced by transport backends. Broadcast failures never stop
/// the producer; callers log the error and move on to the next sample.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The backend cannot accept payloads right now.
    #[error("transport unavailable: {0}")]
    Unavailable(&'static str),
    /// Wrapper for IO errors from socket backed backends.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub use transport::{build_transport, InMemoryTransport, NoopTransport, Transport};
pub use types::{Published, ReducedSample};
