//! The transport capability the upload flow is built around.
//!
//! Performing the HTTP exchange is left to the embedding application; it
//! plugs in by implementing [`Sender`].

use crate::request::UploadRequest;
use async_trait::async_trait;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Performs an upload request and returns the decoded response body.
///
/// Timeouts, retries and TLS belong to the implementation.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Send the request and return the response body as text.
    async fn send(&self, request: &UploadRequest) -> Result<String, SendError>;
}

#[async_trait]
impl<S: Sender + ?Sized> Sender for Arc<S> {
    async fn send(&self, request: &UploadRequest) -> Result<String, SendError> {
        (**self).send(request).await
    }
}

/// Transport failure reported by a [`Sender`], passed through unchanged.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct SendError(BoxError);

impl SendError {
    /// Wrap any transport error.
    pub fn new(error: impl Into<BoxError>) -> Self {
        Self(error.into())
    }

    /// Build an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }

    /// The wrapped transport error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}
