//! # magikfaas
//!
//! **Single-host function provisioning core**
//!
//! This crate turns a function deployment descriptor into a running,
//! network-attached container. It owns the ordering and validation rules of
//! that transaction; the container runtime and the network plugin are
//! collaborators reached through the [`ContainerRuntime`] and
//! [`NetworkAttacher`] traits.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           magikfaas                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                 Deployer::plan (validation)                 │    │
//! │  │  service name │ secrets │ image reference │ label merge     │    │
//! │  │  env composition │ mount list                               │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! │                              │                                      │
//! │  ┌───────────────────────────┼───────────────────────────────┐      │
//! │  │              Deployer::provision (side effects)           │      │
//! │  │  prepare image → create container → TaskLifecycle         │      │
//! │  │  Acquisitions: reverse-order release on failure           │      │
//! │  └───────────────────────────┼───────────────────────────────┘      │
//! ├──────────────────────────────┼──────────────────────────────────────┤
//! │                       Collaborators                                 │
//! │  ┌──────────────────────┐        ┌──────────────────────┐           │
//! │  │  ContainerRuntime    │        │   NetworkAttacher    │           │
//! │  │  images, containers, │        │   CniNetwork (CNI    │           │
//! │  │  tasks, exit waits   │        │   plugin chain)      │           │
//! │  └──────────────────────┘        └──────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Task Lifecycle
//!
//! ```text
//!   create_task ──► attach network ──► register_wait ──► start_task
//!   (pid known)     (/proc/<pid>/ns/net)  (before start!)
//! ```
//!
//! The exit subscription is registered before the process is started, so
//! an exit can never be missed however quickly the function terminates.
//!
//! # Guarantees
//!
//! - **Validate first**: a missing secret, bad image reference or label
//!   collision is reported before any collaborator is called.
//! - **No partial labels**: a container is only ever created with the
//!   fully merged label set.
//! - **Rollback**: once provisioning has started, a failure releases every
//!   resource acquired so far (network, task, container) in reverse order.
//!
//! # Example
//!
//! ```rust,ignore
//! use magikfaas::{CniNetwork, Deployer, DeployerConfig, DeploymentRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> magikfaas::Result<()> {
//!     let runtime = Arc::new(my_containerd_adapter());
//!     let network = Arc::new(CniNetwork::load_default()?);
//!     let deployer = Deployer::new(runtime, network, DeployerConfig::from_env());
//!
//!     let request = DeploymentRequest::new("echo", "ghcr.io/openfaas/alpine");
//!     let deployment = deployer.deploy(&request).await?;
//!     println!("{} is at {}", deployment.service, deployment.address);
//!     Ok(())
//! }
//! ```

pub mod cni;
pub mod config;
pub mod constants;
pub mod container;
pub mod deploy;
pub mod env;
pub mod error;
pub mod http;
pub mod image;
pub mod labels;
pub mod mounts;
pub mod network;
pub mod reference;
pub mod request;
pub mod rollback;
pub mod runtime;
pub mod spec;
pub mod task;

// Re-exports
pub use cni::{CniConfList, CniNetwork};
pub use config::DeployerConfig;
pub use constants::*;
pub use deploy::{Deployer, Deployment, DeploymentPlan};
pub use env::prepare_env;
pub use error::{Error, Result};
pub use labels::build_labels;
pub use mounts::{append_secret_mounts, build_mounts, validate_secrets};
pub use network::{InterfaceAddress, NetworkAttacher, NetworkAttachment};
pub use reference::normalize_image_reference;
pub use request::DeploymentRequest;
pub use runtime::{
    BinaryIo, ContainerHandle, ContainerRequest, ContainerRuntime, ExitNotifier, ExitStatus,
    ExitWatch, ImageConfig, ImageHandle, TaskHandle,
};
pub use spec::{OciMount, OciSpec};
pub use task::{LaunchedTask, TaskLifecycle, TaskPhase};
