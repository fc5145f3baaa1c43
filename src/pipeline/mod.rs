//! Post-fetch processing of mail.

pub mod relevance;

pub use relevance::{FilterResult, RelevanceFilter};
