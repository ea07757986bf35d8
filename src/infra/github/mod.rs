//! GitHub-backed content backends.
//!
//! Two clients cover the same repository: [`api::GitHubApiClient`] talks to
//! the REST API with a token (full read/write, rate limited), and
//! [`raw::RawContentClient`] reads the raw-content CDN anonymously (no rate
//! limit exposure, read-only, manifest-driven discovery).

pub mod api;
pub mod manifest;
pub mod raw;

use std::time::Duration;

use reqwest::Client;

use crate::application::source::SourceError;

pub use api::{GitHubApiClient, GitHubApiOptions};
pub use manifest::ManifestManager;
pub use raw::{RawContentClient, RawContentOptions};

pub(crate) fn user_agent() -> &'static str {
    concat!("foglio/", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .build()
        .map_err(SourceError::http)
}
