//! Feed Relay: Gmail and GroupMe behind one small JSON API.

pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
