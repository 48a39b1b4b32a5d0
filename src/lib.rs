// anidex: client-side core for an anime/manga browser.
// Route table plus a TTL-cached stats store over a REST endpoint.

pub mod api;
pub mod error;
pub mod routes;
pub mod store;

pub use error::{AnidexError, Result};
