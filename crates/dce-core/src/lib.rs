//! # dce-core
//!
//! Core types and utilities shared by the DCE SDK crates.
//!
//! This crate provides the error taxonomy, configuration structures, the shared
//! authenticated HTTP session and the caching primitives that the DCE API and
//! container-engine clients are built on.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP failure classification
//! - [`config`] - Configuration structures for DCE and engine clients
//! - [`client`] - Default timeouts, user agents and well-known versions
//! - [`http`] - Authenticated HTTP session shared by every client
//! - [`version`] - Semantic version parsing and version gates
//! - [`cache`] - Time-bounded memoization for discovery results
//! - [`types`] - Swarm node types shared by the DCE and engine APIs

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use error::{ApiError, ApiErrorKind, Error, Result};
