//! Façade-level errors (§7).

use thiserror::Error;

/// Errors the [`crate::Application`] handle can return.
#[derive(Error, Debug)]
pub enum ApplicationError {
    /// The local-IPC connection to the routing manager could not be
    /// established or was lost.
    #[error("transport error: {0}")]
    Transport(#[from] someip_transport::TransportError),

    /// `send`/`notify` was called after [`crate::Application::stop`].
    #[error("application is stopped")]
    NotReachable,

    /// The reactor task ended unexpectedly (e.g. panicked) before the
    /// façade's request could be answered.
    #[error("application reactor is no longer running")]
    ReactorGone,
}
