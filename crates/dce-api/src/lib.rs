//! DCE controller API session.
//!
//! This crate provides [`DceApiClient`], an authenticated session against a DCE
//! controller that resolves the API path prefix and the controller version when
//! it is constructed, together with typed models for the payloads it returns.

#![deny(missing_docs)]

pub mod client;
pub mod models;

pub use client::{normalize_base_url, ApiPrefix, DceApiClient, DceApiClientBuilder};
pub use models::{ClusterInfo, IpMap, IpMapEntry, VersionInfo};

/// Convenient result alias that reuses the shared DCE error type.
pub type Result<T> = dce_core::Result<T>;
