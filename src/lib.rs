//! Declarative image upload templates.
//!
//! An [`UploadConfig`] describes how to upload an image to a third-party
//! hosting endpoint and how to read the result URLs back out of its response:
//!
//! - `$key$` value substitution in query string, header and form templates
//! - the reserved `$input$` form value, bound to the raw image bytes
//! - `$json:path$`, `$xml:path$` and `$regex:pattern$` response queries, with
//!   literal text around the token spliced into the result
//! - 1-based path indices such as `data.urls[1]`
//!
//! The HTTP exchange itself is delegated to a [`Sender`].
//!
//! ## Configuration Example
//!
//! ```yaml
//! name: "sm.ms"
//! request_url: "https://sm.ms/api/upload"
//! request_method: post
//! values:
//!   token: "abc123"
//! request_headers:
//!   Authorization: "Basic $token$"
//! request_formdata:
//!   smfile: "$input$"
//! image_url_querystr: "$json:data.url$"
//! delete_url_querystr: "$json:data.delete$"
//! ```

pub mod config;
pub mod path;
pub mod query;
pub mod request;
pub mod response;
pub mod sender;
pub mod substitute;
pub mod upload;

pub use config::{ConfigError, RequestMethod, ScalarValue, UploadConfig, PAYLOAD_KEY};
pub use request::{build_request, FormValue, UploadRequest};
pub use response::{resolve, ExtractedUrls, ResponseError, TemplateError};
pub use sender::{SendError, Sender};
pub use upload::{parse_response, UploadError, UploadOutcome, UploadStage, Uploader};
