//! HTTP client and submission adapter

pub mod client;
pub mod submitter;

pub use client::{HttpClient, HttpClientBuilder};
pub use submitter::HttpSubmitter;
