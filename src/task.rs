//! Task lifecycle coordination.
//!
//! ```text
//!   ┌─────────┐  attach   ┌─────────────────┐  wait   ┌────────────────┐  start  ┌─────────┐
//!   │ Created │ ────────► │ NetworkAttached │ ──────► │ WaitRegistered │ ──────► │ Started │
//!   └────┬────┘           └────────┬────────┘         └───────┬────────┘         └─────────┘
//!        │                         │                          │
//!        └─────────────────────────┴──────────────────────────┴──────────► Failed
//! ```
//!
//! # Wait Before Start
//!
//! The exit subscription is registered strictly before the start call. A
//! process that runs to completion inside `start_task` still has its exit
//! delivered to the [`ExitWatch`], because the runtime already holds the
//! notifier when the process exits.
//!
//! # Network Before Start
//!
//! The task's PID exists as soon as the task is created, so its network
//! namespace can be attached before any user code runs. The function never
//! observes a namespace without its interface.

use crate::error::{Error, Result};
use crate::network::NetworkAttacher;
use crate::rollback::{Acquired, Acquisitions};
use crate::runtime::{BinaryIo, ContainerHandle, ContainerRuntime, ExitWatch, TaskHandle};
use std::net::IpAddr;
use tracing::{debug, info};

/// Lifecycle phase of a task being launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    /// Nothing created yet.
    Pending,
    /// Task object exists; process not started.
    Created,
    /// Network namespace attached.
    NetworkAttached,
    /// Exit subscription registered.
    WaitRegistered,
    /// Process started.
    Started,
    /// A stage failed.
    Failed,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Created => write!(f, "created"),
            Self::NetworkAttached => write!(f, "network-attached"),
            Self::WaitRegistered => write!(f, "wait-registered"),
            Self::Started => write!(f, "started"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A started task.
#[derive(Debug)]
pub struct LaunchedTask {
    /// Task handle.
    pub task: TaskHandle,
    /// Address assigned by the network collaborator.
    pub address: IpAddr,
    /// Exit subscription registered before start.
    pub exit: ExitWatch,
}

/// Drives one task from creation to start.
pub struct TaskLifecycle<'a> {
    runtime: &'a dyn ContainerRuntime,
    network: &'a dyn NetworkAttacher,
    phase: TaskPhase,
}

impl<'a> TaskLifecycle<'a> {
    /// Creates a coordinator using `runtime` and `network`.
    pub fn new(runtime: &'a dyn ContainerRuntime, network: &'a dyn NetworkAttacher) -> Self {
        Self {
            runtime,
            network,
            phase: TaskPhase::Pending,
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    fn advance(&mut self, service: &str, phase: TaskPhase) {
        debug!(service = %service, from = %self.phase, to = %phase, "Task phase");
        self.phase = phase;
    }

    /// Creates, attaches, subscribes to and starts `container`'s task.
    ///
    /// Each acquired resource is recorded in `acquired` as soon as it
    /// exists; the network attachment as soon as it is requested. Returns
    /// once the start call succeeded; process exit is
    /// observed through [`LaunchedTask::exit`].
    ///
    /// # Errors
    ///
    /// - [`Error::TaskCreation`] if the task could not be created
    /// - [`Error::NetworkAttach`] if attachment or address lookup failed
    /// - [`Error::TaskWait`] if the exit subscription could not be registered
    /// - [`Error::TaskStart`] if the start call failed
    pub async fn launch(
        &mut self,
        container: &ContainerHandle,
        io: &BinaryIo,
        acquired: &mut Acquisitions<'_>,
    ) -> Result<LaunchedTask> {
        let result = self.run(container, io, acquired).await;
        if result.is_err() {
            self.advance(&container.id, TaskPhase::Failed);
        }
        result
    }

    async fn run(
        &mut self,
        container: &ContainerHandle,
        io: &BinaryIo,
        acquired: &mut Acquisitions<'_>,
    ) -> Result<LaunchedTask> {
        let service = container.id.as_str();

        let task = self
            .runtime
            .create_task(container, io)
            .await
            .map_err(|e| Error::TaskCreation {
                service: service.to_string(),
                reason: e.to_string(),
            })?;
        acquired.push(Acquired::Task(task.clone()));
        self.advance(service, TaskPhase::Created);

        info!(
            service = %service,
            task = %task.id,
            pid = task.pid,
            log_helper = %io.path.display(),
            "Created task"
        );

        // Recorded before the call: a chain that fails part-way has still
        // applied its earlier plugins, and detach is idempotent.
        acquired.push(Acquired::Network(task.clone()));
        let attachment = self
            .network
            .attach(&task)
            .await
            .map_err(|e| network_error(service, e))?;

        let address = self
            .network
            .resolve_address(&attachment, &task)
            .await
            .map_err(|e| network_error(service, e))?;
        self.advance(service, TaskPhase::NetworkAttached);

        info!(service = %service, address = %address, "Attached network");

        let exit = self
            .runtime
            .register_wait(&task)
            .await
            .map_err(|e| Error::TaskWait {
                service: service.to_string(),
                reason: e.to_string(),
            })?;
        self.advance(service, TaskPhase::WaitRegistered);

        self.runtime
            .start_task(&task)
            .await
            .map_err(|e| Error::TaskStart {
                service: service.to_string(),
                reason: e.to_string(),
            })?;
        self.advance(service, TaskPhase::Started);

        Ok(LaunchedTask {
            task,
            address,
            exit,
        })
    }
}

/// Wraps a collaborator error as [`Error::NetworkAttach`] unless it already
/// is one.
fn network_error(service: &str, e: Error) -> Error {
    match e {
        e @ Error::NetworkAttach { .. } => e,
        other => Error::NetworkAttach {
            service: service.to_string(),
            reason: other.to_string(),
        },
    }
}
