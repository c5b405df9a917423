//! Capability trait abstractions.
//!
//! These traits define the interfaces that applications implement
//! to provide search, fetching, LLM completion, time, and storage.

pub mod clock;
pub mod fetch;
pub mod llm;
pub mod repository;
pub mod search;
