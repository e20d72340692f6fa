//! Request validation and job scheduling.
//!
//! ```text
//! ResizeQueryParams ──validate──► ResizeRequest ──submit──► WorkerPool ──► ImagePipeline
//!        │                                                                     │
//!        └── ValidationError (no work scheduled)          ResizedImage ◄── stat + ETag
//! ```

mod request;
mod service;

pub use request::{GatewaySettings, ResizeQueryParams, DEFAULT_FORMAT};
pub use service::{weak_etag, ResizeGateway, ResizedImage};
