//! Container-engine clients for DCE cluster nodes.
//!
//! This crate provides [`DockerApiClient`], a raw client for the
//! Docker-compatible engine API (direct or through the DCE node proxy),
//! [`DockerClient`], a wrapper returning typed models, and [`EngineRegistry`],
//! which shares one client per distinct set of connection parameters.

#![deny(missing_docs)]

pub mod client;
pub mod docker;
pub mod models;
pub mod registry;

pub use client::{
    engine_base_url, is_local_socket, DockerApiClient, DockerApiClientBuilder, EngineApi,
    TlsOptions, DEFAULT_DOCKER_HOST,
};
pub use docker::DockerClient;
pub use models::{Service, ServiceSpec, SystemInfo};
pub use registry::{EngineClientParams, EngineRegistry};

/// Convenient result alias that reuses the shared DCE error type.
pub type Result<T> = dce_core::Result<T>;
