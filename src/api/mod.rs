// Stats API module.
// HTTP client for the backend statistics endpoint.

pub mod client;

pub use client::ApiClient;
