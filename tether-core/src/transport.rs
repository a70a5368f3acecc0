//! # Transport
//!
//! The seam between the engine and the network. An [`HttpClient`] executes one assembled
//! request either synchronously ([`HttpClient::call`]) or in the background
//! ([`HttpClient::enqueue`]), reporting back through a callback.
//!
//! [`UreqClient`] is the default implementation.
mod ureq_client;

pub use ureq_client::{UreqClient, UreqClientBuilder};

use crate::{
    BoxError,
    body::RequestBody,
    content::{RequestInfo, ResponseContent},
};
use std::sync::Arc;

/// Receives the outcome of an enqueued request exactly once.
pub type TransportCallback =
    Box<dyn FnOnce(Result<ResponseContent, TransportError>) + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid request: '{0}'")]
    InvalidRequest(#[from] http::Error),
    #[error("I/O error: '{0}'")]
    Io(#[from] std::io::Error),
    #[error("The request timed out")]
    Timeout,
    #[error("The request was aborted before completing")]
    Aborted,
    #[error("Transport failure: '{0}'")]
    Other(#[source] BoxError),
}

/// Executes assembled requests.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends the request and blocks until the whole response has been read.
    fn call(
        &self,
        request: &RequestInfo,
        body: &RequestBody,
    ) -> Result<ResponseContent, TransportError>;

    /// Sends the request in the background and hands the outcome to `callback`.
    ///
    /// The default runs [`HttpClient::call`] on tokio's blocking pool when a runtime is
    /// current, and on a dedicated thread otherwise.
    fn enqueue(
        self: Arc<Self>,
        request: RequestInfo,
        body: RequestBody,
        callback: TransportCallback,
    ) {
        spawn_blocking(move || callback(self.call(&request, &body)));
    }
}

/// Runs a blocking task off the caller's thread.
pub(crate) fn spawn_blocking<F>(task: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(task);
        }
        Err(_) => {
            std::thread::spawn(task);
        }
    }
}
