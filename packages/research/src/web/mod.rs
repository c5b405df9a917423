//! Web research environment: search, fetch, and text extraction.

pub mod blocklist;
pub mod environment;
pub mod extract;
pub mod validate;

pub use environment::{GatherOutcome, WebEnvironment};
pub use validate::{UrlValidator, ValidatedFetcher};
