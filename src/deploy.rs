//! # Deployment Pipeline
//!
//! One call to [`Deployer::deploy`] is one provisioning transaction:
//!
//! ```text
//! ┌──────────────────────────── PHASE 1: PLAN (no side effects) ───────────────────────────┐
//! │ service name → secrets exist → image reference → labels merge → env → mounts           │
//! └────────────────────────────────────────────┬───────────────────────────────────────────┘
//!                                              │ DeploymentPlan
//! ┌──────────────────────────── PHASE 2: PROVISION (collaborators) ────────────────────────┐
//! │ prepare image → create container → create task → attach → register wait → start       │
//! └────────────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every validation failure surfaces from phase 1, before the runtime or
//! the network plugin has been called. In phase 2 each acquired resource is
//! recorded in an [`Acquisitions`] list; if any stage fails, everything
//! already acquired is released in reverse order and the stage's error is
//! returned. No stage is retried.
//!
//! # Concurrency
//!
//! Stages run strictly in sequence. Concurrent deployments share nothing
//! but the immutable [`DeployerConfig`]; two deployments of the same service
//! race on `create_container`, which the runtime rejects for the loser.

use crate::config::DeployerConfig;
use crate::constants::validate_service_name;
use crate::container::create_container;
use crate::env::prepare_env;
use crate::error::{Error, Result};
use crate::image::prepare_image;
use crate::labels::build_labels;
use crate::mounts::{append_secret_mounts, build_mounts, validate_secrets};
use crate::network::NetworkAttacher;
use crate::reference::normalize_image_reference;
use crate::request::DeploymentRequest;
use crate::rollback::{Acquired, Acquisitions};
use crate::runtime::{BinaryIo, ContainerHandle, ContainerRuntime, ExitWatch, TaskHandle};
use crate::spec::OciMount;
use crate::task::TaskLifecycle;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Validated inputs for one deployment.
///
/// Built entirely from the request and configuration; constructing one has
/// no side effects beyond reading the secrets directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    /// Service name, used as container ID.
    pub service: String,
    /// Normalized image reference.
    pub image: String,
    /// Merged label set.
    pub labels: HashMap<String, String>,
    /// Container environment.
    pub env: Vec<String>,
    /// Function mounts (network config, then secrets).
    pub mounts: Vec<OciMount>,
}

/// A successfully started function.
#[derive(Debug)]
pub struct Deployment {
    /// Service name.
    pub service: String,
    /// Normalized image reference.
    pub image: String,
    /// Created container.
    pub container: ContainerHandle,
    /// Started task.
    pub task: TaskHandle,
    /// Address the function is reachable at.
    pub address: IpAddr,
    /// Exit subscription, registered before the task was started.
    pub exit: ExitWatch,
    /// Time the start call returned.
    pub started_at: DateTime<Utc>,
}

/// Provisions functions against a runtime and a network collaborator.
#[derive(Clone)]
pub struct Deployer {
    runtime: Arc<dyn ContainerRuntime>,
    network: Arc<dyn NetworkAttacher>,
    config: Arc<DeployerConfig>,
}

impl Deployer {
    /// Creates a deployer.
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        network: Arc<dyn NetworkAttacher>,
        config: DeployerConfig,
    ) -> Self {
        Self {
            runtime,
            network,
            config: Arc::new(config),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DeployerConfig {
        &self.config
    }

    /// Validates `request` and computes everything provisioning needs.
    ///
    /// # Errors
    ///
    /// Only validation errors: [`Error::InvalidServiceName`],
    /// [`Error::InvalidSecretName`], [`Error::MissingSecret`],
    /// [`Error::InvalidReference`], [`Error::NamingCollision`].
    pub fn plan(&self, request: &DeploymentRequest) -> Result<DeploymentPlan> {
        validate_service_name(&request.service).map_err(|reason| Error::InvalidServiceName {
            name: request.service.clone(),
            reason: reason.to_string(),
        })?;

        validate_secrets(&self.config.secret_mount_path, &request.secrets)?;

        let image = normalize_image_reference(&request.image)?;

        let labels = build_labels(request.labels.as_ref(), request.annotations.as_ref())?;

        let env = prepare_env(request.env_process(), &request.env_vars);

        let mut mounts = build_mounts(&self.config.working_dir);
        append_secret_mounts(&mut mounts, &self.config.secret_mount_path, &request.secrets);

        Ok(DeploymentPlan {
            service: request.service.clone(),
            image,
            labels,
            env,
            mounts,
        })
    }

    /// Deploys `request`.
    ///
    /// Returns once the function's process has been started. On failure,
    /// resources created by this call have been released.
    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<Deployment> {
        let plan = self.plan(request)?;
        let service = plan.service.clone();

        info!(
            service = %service,
            image = %plan.image,
            secrets = request.secrets.len(),
            labels = plan.labels.len(),
            "Deploying function"
        );

        let mut acquired = Acquisitions::new(self.runtime.as_ref(), self.network.as_ref());
        match self.provision(plan, &mut acquired).await {
            Ok(deployment) => {
                acquired.commit();
                info!(
                    service = %deployment.service,
                    pid = deployment.task.pid,
                    address = %deployment.address,
                    "Function started"
                );
                Ok(deployment)
            }
            Err(e) => {
                if !acquired.is_empty() {
                    warn!(
                        service = %service,
                        error = %e,
                        resources = acquired.acquired().len(),
                        "Deployment failed, releasing acquired resources"
                    );
                }
                acquired.release().await;
                Err(e)
            }
        }
    }

    async fn provision(
        &self,
        plan: DeploymentPlan,
        acquired: &mut Acquisitions<'_>,
    ) -> Result<Deployment> {
        let runtime = self.runtime.as_ref();

        let image = prepare_image(
            runtime,
            &plan.image,
            &self.config.snapshotter,
            self.config.always_pull,
        )
        .await?;

        let container = create_container(
            runtime,
            &plan.service,
            &image,
            &self.config.snapshotter,
            plan.mounts,
            &plan.env,
            plan.labels,
        )
        .await?;
        acquired.push(Acquired::Container(container.clone()));

        let io = BinaryIo::new(&self.config.log_helper);
        let mut lifecycle = TaskLifecycle::new(runtime, self.network.as_ref());
        let launched = lifecycle.launch(&container, &io, acquired).await?;

        Ok(Deployment {
            service: plan.service,
            image: plan.image,
            container,
            task: launched.task,
            address: launched.address,
            exit: launched.exit,
            started_at: Utc::now(),
        })
    }
}
