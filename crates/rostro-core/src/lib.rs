//! rostro-core — Identity registry client and the capture-to-decision workflow.
//!
//! Talks to a remote face-comparison service over HTTP and drives a single
//! comparison attempt from submission to a routed terminal outcome.

pub mod controller;
pub mod error;
pub mod http;
pub mod registry;
pub mod routing;
pub mod types;

pub use controller::{AttemptStatus, Phase, Rejected, Settled, SubmissionController, SubmitError};
pub use error::{BuildError, FailureClass, Operation, RegistryError};
pub use http::HttpRegistry;
pub use registry::{Registry, RegistryConfig, RegistryResult};
pub use routing::Route;
pub use types::{
    ComparisonOutcome, ImageHandle, OperationAck, PersonRecord, PersonUpdate, Similarity, Verdict,
};
pub use reqwest::Url;
