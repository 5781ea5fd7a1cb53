//! Generation API Wire Protocol
//!
//! Types for the remote generation service. Every response is a JSON
//! envelope `{code, msg, data}` where `code == 200` means success; job
//! state is reported as one of four strings, mapped strictly onto
//! [`RemoteJobState`] (anything else is a protocol error handled by the
//! caller).

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Resolutions the service accepts
pub const ALLOWED_RESOLUTIONS: &[&str] = &["1K", "2K", "4K"];

/// Aspect ratios the service accepts
pub const ALLOWED_ASPECT_RATIOS: &[&str] =
    &["1:1", "2:3", "3:2", "3:4", "4:3", "9:16", "16:9"];

/// Output formats the service accepts
pub const ALLOWED_OUTPUT_FORMATS: &[&str] = &["png", "jpeg"];

/// Job states reported by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteJobState {
    /// Queued, not started
    Waiting,
    /// Generation in progress
    Processing,
    /// Finished with results
    Success,
    /// Finished without results
    Fail,
}

impl RemoteJobState {
    /// Strictly parse a wire state string.
    ///
    /// Returns `None` for anything outside the four-state contract; the
    /// poll loop treats that as terminal rather than guessing.
    pub fn parse(state: &str) -> Option<Self> {
        match state {
            "waiting" => Some(Self::Waiting),
            "processing" => Some(Self::Processing),
            "success" => Some(Self::Success),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Generation options sent alongside the prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Output resolution, one of [`ALLOWED_RESOLUTIONS`]
    pub resolution: String,

    /// Aspect ratio, one of [`ALLOWED_ASPECT_RATIOS`]
    pub aspect_ratio: String,

    /// Output format, one of [`ALLOWED_OUTPUT_FORMATS`]
    pub output_format: String,

    /// Reference image URLs passed through to the service
    #[serde(default)]
    pub reference_images: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            resolution: "4K".to_string(),
            aspect_ratio: "3:4".to_string(),
            output_format: "png".to_string(),
            reference_images: Vec::new(),
        }
    }
}

impl GenerationOptions {
    /// Replace unsupported values with the defaults, logging each
    /// substitution. The service rejects unknown values outright, so
    /// falling back keeps a mistyped option from failing the whole job.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if !ALLOWED_RESOLUTIONS.contains(&self.resolution.as_str()) {
            warn!(
                "Unsupported resolution '{}', using '{}'",
                self.resolution, defaults.resolution
            );
            self.resolution = defaults.resolution;
        }
        if !ALLOWED_ASPECT_RATIOS.contains(&self.aspect_ratio.as_str()) {
            warn!(
                "Unsupported aspect ratio '{}', using '{}'",
                self.aspect_ratio, defaults.aspect_ratio
            );
            self.aspect_ratio = defaults.aspect_ratio;
        }
        if !ALLOWED_OUTPUT_FORMATS.contains(&self.output_format.as_str()) {
            warn!(
                "Unsupported output format '{}', using '{}'",
                self.output_format, defaults.output_format
            );
            self.output_format = defaults.output_format;
        }
        self
    }
}

/// A generation request as submitted by the caller.
///
/// The lifecycle machinery treats this as opaque; only the HTTP client
/// looks inside to build the wire body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Prompt text
    pub prompt: String,

    /// Generation options
    #[serde(default)]
    pub options: GenerationOptions,
}

impl JobRequest {
    /// Request with default options
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: GenerationOptions::default(),
        }
    }
}

/// Status of a remote job as reported by one query.
///
/// `state` is kept as the raw wire string; interpretation (including the
/// unrecognized-state error) happens in the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    /// Raw state string from the service
    pub state: String,

    /// Result URLs, present once the job succeeded
    pub result_urls: Vec<String>,

    /// Failure message, present once the job failed
    pub failure_message: Option<String>,
}

// ---- wire format ----

/// Response envelope wrapping every API payload
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Service status code; 200 is success
    pub code: i64,

    /// Human-readable message accompanying non-200 codes
    #[serde(default)]
    pub msg: String,

    /// Payload, present on success
    pub data: Option<T>,
}

/// `data` payload of a submit response
#[derive(Debug, Deserialize)]
pub struct SubmitData {
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// `data` payload of a status response
#[derive(Debug, Deserialize)]
pub struct StatusData {
    pub state: String,

    /// JSON-encoded result blob, present on success
    #[serde(rename = "resultJson", default)]
    pub result_json: Option<String>,

    /// Failure description, present on failure
    #[serde(rename = "failMsg", default)]
    pub fail_msg: Option<String>,
}

/// Decoded contents of `result_json`
#[derive(Debug, Deserialize)]
pub struct ResultPayload {
    #[serde(rename = "resultUrls", default)]
    pub result_urls: Vec<String>,
}

/// Body of a submit request
#[derive(Debug, Serialize)]
pub struct SubmitBody {
    pub model: String,
    pub input: SubmitInput,
    #[serde(rename = "callBackUrl")]
    pub callback_url: Option<String>,
}

/// `input` section of a submit request
#[derive(Debug, Serialize)]
pub struct SubmitInput {
    pub prompt: String,
    pub image_input: Vec<String>,
    pub aspect_ratio: String,
    pub resolution: String,
    pub output_format: String,
}

impl SubmitBody {
    /// Build the wire body for a request, normalizing its options
    pub fn from_request(model: &str, request: &JobRequest) -> Self {
        let options = request.options.clone().normalized();
        Self {
            model: model.to_string(),
            input: SubmitInput {
                prompt: request.prompt.clone(),
                image_input: options.reference_images,
                aspect_ratio: options.aspect_ratio,
                resolution: options.resolution,
                output_format: options.output_format,
            },
            callback_url: None,
        }
    }
}

impl StatusData {
    /// Interpret the wire payload into a [`JobStatus`].
    ///
    /// `result_json` is decoded leniently here; the poll loop enforces
    /// that a successful job actually carries URLs.
    pub fn into_status(self) -> JobStatus {
        let result_urls = self
            .result_json
            .as_deref()
            .and_then(|raw| serde_json::from_str::<ResultPayload>(raw).ok())
            .map(|payload| payload.result_urls)
            .unwrap_or_default();
        JobStatus {
            state: self.state,
            result_urls,
            failure_message: self.fail_msg,
        }
    }
}
