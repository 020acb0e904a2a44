//! Upload orchestration.

use crate::config::UploadConfig;
use crate::request::{build_request, UploadRequest};
use crate::response::{query_response, ExtractedUrls, ResponseError, TemplateError};
use crate::sender::{SendError, Sender};
use bytes::Bytes;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Stages an upload moves through.
///
/// `Built -> Sent -> Parsed -> Done`; a failure ends the upload at the stage
/// that could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Built,
    Sent,
    Parsed,
    Done,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Built => "built",
            Self::Sent => "sent",
            Self::Parsed => "parsed",
            Self::Done => "done",
        })
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// URLs extracted from the response
    pub urls: ExtractedUrls,
    /// Response body as returned by the sender
    pub raw_body: String,
}

/// Runs uploads through an injected [`Sender`].
///
/// Holds no per-upload state, so one uploader can serve concurrent uploads.
pub struct Uploader<S> {
    sender: S,
}

impl<S: Sender> Uploader<S> {
    /// Create an uploader around a transport.
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    /// The underlying transport.
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Build the request for `payload`, send it once and extract the URLs.
    ///
    /// No retries happen here; the first error ends the upload.
    pub async fn upload(
        &self,
        config: &UploadConfig,
        payload: Bytes,
    ) -> Result<UploadOutcome, UploadError> {
        let start_time = Instant::now();

        let result = self.run(config, payload).await;

        match &result {
            Ok(outcome) => info!(
                config = %config.name,
                stage = %UploadStage::Done,
                image_url = %outcome.urls.image_url,
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Upload finished"
            ),
            Err(e) => warn!(
                config = %config.name,
                stage = %e.stage(),
                error = %e,
                "Upload failed"
            ),
        }

        result
    }

    async fn run(&self, config: &UploadConfig, payload: Bytes) -> Result<UploadOutcome, UploadError> {
        let payload_size = payload.len();
        let request = Self::build(config, payload)?;
        debug!(
            config = %config.name,
            stage = %UploadStage::Built,
            method = %request.method,
            url = %request.url,
            headers = request.headers.len(),
            form_fields = request.form.len(),
            payload_size,
            "Request built"
        );

        let raw_body = self.sender.send(&request).await.map_err(UploadError::Send)?;
        debug!(
            config = %config.name,
            stage = %UploadStage::Sent,
            body_size = raw_body.len(),
            "Response received"
        );

        let urls = parse_response(config, &raw_body)?;
        debug!(
            config = %config.name,
            stage = %UploadStage::Parsed,
            "Response parsed"
        );

        Ok(UploadOutcome { urls, raw_body })
    }

    fn build(config: &UploadConfig, payload: Bytes) -> Result<UploadRequest, UploadError> {
        build_request(config, payload).map_err(UploadError::Build)
    }
}

/// Extract the URLs from a response body that was already received.
pub fn parse_response(config: &UploadConfig, body: &str) -> Result<ExtractedUrls, UploadError> {
    query_response(config, body).map_err(UploadError::Parse)
}

/// Errors that end an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to build request: {0}")]
    Build(#[source] TemplateError),

    #[error("failed to send request: {0}")]
    Send(#[source] SendError),

    #[error("failed to parse response: {0}")]
    Parse(#[source] ResponseError),
}

impl UploadError {
    /// The stage the upload failed to reach.
    pub fn stage(&self) -> UploadStage {
        match self {
            Self::Build(_) => UploadStage::Built,
            Self::Send(_) => UploadStage::Sent,
            Self::Parse(_) => UploadStage::Parsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns a canned body and remembers the requests it was given.
    struct CannedSender {
        body: Result<String, String>,
        requests: Mutex<Vec<UploadRequest>>,
    }

    impl CannedSender {
        fn ok(body: &str) -> Self {
            Self {
                body: Ok(body.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                body: Err(message.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sender for CannedSender {
        async fn send(&self, request: &UploadRequest) -> Result<String, SendError> {
            self.requests.lock().unwrap().push(request.clone());
            self.body.clone().map_err(SendError::msg)
        }
    }

    fn config() -> UploadConfig {
        let mut config = UploadConfig {
            name: "example".to_string(),
            request_url: "http://localhost:80/".to_string(),
            image_url_querystr: "https://example.com/$json:id$".to_string(),
            ..Default::default()
        };
        config
            .request_formdata
            .insert("file".to_string(), "$input$".to_string());
        config
    }

    #[tokio::test]
    async fn test_upload_success() {
        let uploader = Uploader::new(CannedSender::ok(r#"{"id":1}"#));

        let outcome = uploader
            .upload(&config(), Bytes::from_static(b"png"))
            .await
            .unwrap();

        assert_eq!(outcome.urls.image_url, "https://example.com/1");
        assert_eq!(outcome.urls.thumbnail_url, "");
        assert_eq!(outcome.urls.delete_url, "");
        assert_eq!(outcome.raw_body, r#"{"id":1}"#);

        let requests = uploader.sender().requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].form["file"].as_bytes(),
            Some(&Bytes::from_static(b"png"))
        );
    }

    #[tokio::test]
    async fn test_build_failure_skips_send() {
        let uploader = Uploader::new(CannedSender::ok("{}"));
        let mut config = config();
        config
            .request_headers
            .insert("X-Image".to_string(), "$input$".to_string());

        let err = uploader.upload(&config, Bytes::new()).await.unwrap_err();
        assert_eq!(err.stage(), UploadStage::Built);
        assert_eq!(uploader.sender().calls(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_is_passed_through() {
        let uploader = Uploader::new(CannedSender::failing("connection reset"));

        let err = uploader.upload(&config(), Bytes::new()).await.unwrap_err();
        assert_eq!(err.stage(), UploadStage::Sent);
        match err {
            UploadError::Send(e) => assert_eq!(e.to_string(), "connection reset"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(uploader.sender().calls(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure() {
        let uploader = Uploader::new(CannedSender::ok(r#"{"id":1"#));

        let err = uploader.upload(&config(), Bytes::new()).await.unwrap_err();
        assert_eq!(err.stage(), UploadStage::Parsed);
        assert_eq!(uploader.sender().calls(), 1);
    }

    #[test]
    fn test_parse_response_without_sending() {
        let urls = parse_response(&config(), r#"{"id": 5}"#).unwrap();
        assert_eq!(urls.image_url, "https://example.com/5");
    }
}
