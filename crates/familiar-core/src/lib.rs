//! familiar-core
//!
//! Shared vocabulary for the indexing and query pipelines: domain types, the
//! error taxonomy, configuration, token estimation, corpus reading and the
//! chunker. Every other crate in the workspace depends on this one.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod chunker;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod tokens;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
