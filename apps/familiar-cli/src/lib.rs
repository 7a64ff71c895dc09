//! Shared plumbing for the `familiar` and `familiar-indexer` binaries.

pub mod args;
pub mod commands;
pub mod exit;
pub mod logging;
