//! Graphcast - publishing to Graph-API-style social platforms
//!
//! Turns already-hosted image URLs and a caption into a live or scheduled
//! Instagram or Threads post, riding out the platforms' asynchronous media
//! processing, rate limits and transient failures.

pub mod auth;
pub mod config;
pub mod container;
pub mod credentials;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod platforms;
pub mod publisher;
pub mod scheduling;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::CredentialSet;
pub use error::{Diagnostic, GraphcastError, Result};
pub use publisher::Publisher;
pub use types::{Platform, PublishOutcome, PublishRequest, PublishResult};
