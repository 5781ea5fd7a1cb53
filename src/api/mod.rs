//! Remote Generation API
//!
//! Wire protocol types and the HTTP client for the generation service.
//! The rest of the crate talks to the service exclusively through the
//! [`GenerationApi`] trait.

pub mod client;
pub mod protocol;

pub use client::{GenerationApi, HttpGenerationClient, QueryError, SubmitError};
pub use protocol::{GenerationOptions, JobRequest, JobStatus, RemoteJobState};
