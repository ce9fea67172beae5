//! Container runtime collaborator interface.
//!
//! The provisioning pipeline never talks to a concrete runtime. It drives a
//! [`ContainerRuntime`] through the following sequence:
//!
//! ```text
//! prepare_image → create_container → create_task → register_wait → start_task
//! ```
//!
//! and, when a later stage fails, releases what it acquired with
//! `delete_task` / `delete_container`.
//!
//! # Ownership
//!
//! Containers, tasks and snapshots are owned by the runtime once created.
//! The handles defined here are plain references by ID; dropping one does
//! not release anything.
//!
//! # Exit Notification
//!
//! [`ContainerRuntime::register_wait`] returns an [`ExitWatch`] that resolves
//! when the task's process exits. It is registered before `start_task` is
//! issued, so even a process that exits inside the start call is observed.

use crate::error::{Error, Result};
use crate::spec::OciSpec;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::oneshot;

// =============================================================================
// Images
// =============================================================================

/// Default process configuration carried by an image.
///
/// Ref: https://github.com/opencontainers/image-spec/blob/main/config.md
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageConfig {
    /// Entrypoint.
    #[serde(default)]
    pub entrypoint: Vec<String>,
    /// Default arguments.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Default environment (`KEY=VALUE`).
    #[serde(default)]
    pub env: Vec<String>,
    /// Default working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Default user (`uid`, `uid:gid` or a user name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Handle to an image resolved by the runtime.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    /// Fully qualified reference the image was resolved from.
    pub name: String,
    /// Manifest digest.
    pub digest: String,
    /// Unpacked size in bytes, if known.
    pub size: Option<u64>,
    /// Default process configuration.
    pub config: ImageConfig,
}

// =============================================================================
// Containers
// =============================================================================

/// Everything the runtime needs to create a container.
#[derive(Debug, Clone)]
pub struct ContainerRequest {
    /// Container ID (the service name).
    pub id: String,
    /// Image the container's snapshot is created from.
    pub image: ImageHandle,
    /// Snapshotter (storage driver); empty selects the runtime default.
    pub snapshotter: String,
    /// Key of the fresh writable snapshot to create.
    pub snapshot_key: String,
    /// OCI execution spec.
    pub spec: OciSpec,
    /// Container labels.
    pub labels: HashMap<String, String>,
}

/// Reference to a runtime-owned container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Container ID.
    pub id: String,
    /// Snapshot key backing the container's rootfs.
    pub snapshot_key: String,
}

// =============================================================================
// Tasks
// =============================================================================

/// Standard I/O routed through an external logging binary.
///
/// The runtime spawns `path` with the task's stdout/stderr and `args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryIo {
    /// Path of the logging binary.
    pub path: PathBuf,
    /// Extra arguments for the logging binary.
    pub args: HashMap<String, String>,
}

impl BinaryIo {
    /// Creates binary I/O routed through `path` with no extra arguments.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: HashMap::new(),
        }
    }
}

/// Reference to a runtime-owned task.
///
/// The PID is assigned when the task is created, before its process is
/// started, and is the key used for network attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    /// Task ID.
    pub id: String,
    /// ID of the container the task belongs to.
    pub container_id: String,
    /// PID of the task's init process.
    pub pid: u32,
}

/// Exit status of a task's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code.
    pub code: u32,
    /// Time the process exited.
    pub exited_at: DateTime<Utc>,
}

impl ExitStatus {
    /// Creates an exit status stamped with the current time.
    pub fn new(code: u32) -> Self {
        Self {
            code,
            exited_at: Utc::now(),
        }
    }

    /// Returns true if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Sending half of an exit subscription, held by the runtime.
#[derive(Debug)]
pub struct ExitNotifier {
    sender: oneshot::Sender<ExitStatus>,
}

impl ExitNotifier {
    /// Delivers the exit status. Returns false if the watch was dropped.
    pub fn notify(self, status: ExitStatus) -> bool {
        self.sender.send(status).is_ok()
    }
}

/// Receiving half of an exit subscription.
///
/// The status is buffered, so a watch resolves even if the process exited
/// before anyone awaited it.
#[derive(Debug)]
pub struct ExitWatch {
    task_id: String,
    receiver: oneshot::Receiver<ExitStatus>,
}

impl ExitWatch {
    /// Creates a connected notifier/watch pair for `task_id`.
    pub fn channel(task_id: impl Into<String>) -> (ExitNotifier, ExitWatch) {
        let (sender, receiver) = oneshot::channel();
        (
            ExitNotifier { sender },
            ExitWatch {
                task_id: task_id.into(),
                receiver,
            },
        )
    }

    /// Returns the ID of the watched task.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Returns the exit status if the process has already exited.
    pub fn try_status(&mut self) -> Option<ExitStatus> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the process to exit.
    ///
    /// # Errors
    ///
    /// [`Error::Internal`] if the runtime dropped the notifier without
    /// reporting an exit.
    pub async fn wait(self) -> Result<ExitStatus> {
        let task_id = self.task_id;
        self.receiver.await.map_err(|_| {
            Error::Internal(format!("exit notifier for task '{}' dropped", task_id))
        })
    }
}

// =============================================================================
// Container Runtime Trait
// =============================================================================

/// Container runtime collaborator.
///
/// Implementations wrap a concrete runtime daemon (containerd, CRI-O, a
/// youki-based shim). All operations are scoped to the runtime's function
/// namespace.
///
/// # Atomicity
///
/// `create_container` must reject a duplicate ID atomically. The pipeline
/// performs no locking of its own and relies on this for concurrent
/// deployments of the same service.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Returns the runtime name.
    fn name(&self) -> &str;

    /// Resolves `reference`, pulling it if it is not present locally or if
    /// `force_pull` is set, and unpacks it for `snapshotter`.
    async fn prepare_image(
        &self,
        reference: &str,
        snapshotter: &str,
        force_pull: bool,
    ) -> Result<ImageHandle>;

    /// Creates a container with a fresh writable snapshot.
    async fn create_container(&self, request: ContainerRequest) -> Result<ContainerHandle>;

    /// Creates the container's task with stdio routed through `io`.
    ///
    /// The process exists but has not started executing when this returns.
    async fn create_task(&self, container: &ContainerHandle, io: &BinaryIo) -> Result<TaskHandle>;

    /// Subscribes to the task's exit.
    async fn register_wait(&self, task: &TaskHandle) -> Result<ExitWatch>;

    /// Starts the task's process.
    async fn start_task(&self, task: &TaskHandle) -> Result<()>;

    /// Kills and deletes a task.
    async fn delete_task(&self, task: &TaskHandle) -> Result<()>;

    /// Deletes a container together with its snapshot.
    async fn delete_container(&self, container: &ContainerHandle) -> Result<()>;
}
