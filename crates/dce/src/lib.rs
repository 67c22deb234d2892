//! # dce
//!
//! Client SDK for DaoCloud Enterprise (DCE) clusters.
//!
//! This crate ties the controller session from `dce-api` and the engine clients
//! from `dce-docker` together: [`DceClient`] adds engine accessors to a
//! controller session, and [`DiscoveryContext`] locates the controller and the
//! per-node engines of a cluster starting from any engine, memoizing what it
//! finds.
//!
//! ```no_run
//! use dce::{Credentials, DiscoveryConfig, DiscoveryContext};
//!
//! # async fn run() -> dce::Result<()> {
//! let context = DiscoveryContext::new(DiscoveryConfig::new())?;
//! let credentials = Credentials::new().with_basic_auth("admin", "changeme");
//!
//! let client = context.local_client(&credentials, None).await?;
//! println!("{client} runs DCE {}", client.dce_version());
//!
//! for engine in context.node_engine_clients(&credentials, None).await? {
//!     println!("{}", engine.info().await?.name);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod context;
pub mod discovery;

pub use client::DceClient;
pub use context::DiscoveryContext;
pub use discovery::{detect_cluster_ports, ClusterPorts, DCE_BASE_SERVICE};

pub use dce_api::{ApiPrefix, ClusterInfo, DceApiClient, DceApiClientBuilder, IpMap, IpMapEntry};
pub use dce_core::config::{Credentials, DceClientConfig, DiscoveryConfig};
pub use dce_core::version::Versioned;
pub use dce_core::{ApiError, ApiErrorKind, Error, Result};
pub use dce_docker::{
    DockerApiClient, DockerClient, EngineApi, EngineClientParams, EngineRegistry, Service,
    SystemInfo,
};
