//! Shared pieces of the assistant binaries: configuration and transcript
//! rendering.

pub mod config;
pub mod transcript;
