//! Scoped acquisition list for compensating rollback.
//!
//! Every resource the pipeline acquires from a collaborator is recorded
//! here the moment the acquiring call succeeds. The network attachment is
//! recorded before its call is issued, since a failed plugin chain may
//! still have applied part of its configuration. If a later stage fails, the
//! pipeline calls [`Acquisitions::release`], which undoes the recorded
//! acquisitions in reverse order:
//!
//! ```text
//! acquire:  container ──► task ──► network
//! release:  network   ──► task ──► container
//! ```
//!
//! Release failures are logged and skipped so that one stuck resource does
//! not prevent the others from being released, and never replace the error
//! that triggered the rollback.

use crate::runtime::{ContainerHandle, ContainerRuntime, TaskHandle};
use crate::network::NetworkAttacher;
use tracing::{debug, warn};

/// A resource acquired during provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// Container and its snapshot.
    Container(ContainerHandle),
    /// Task bound to a container.
    Task(TaskHandle),
    /// Network attachment of a task.
    Network(TaskHandle),
}

impl Acquired {
    fn kind(&self) -> &'static str {
        match self {
            Self::Container(_) => "container",
            Self::Task(_) => "task",
            Self::Network(_) => "network",
        }
    }
}

/// Ordered record of the resources acquired by one deployment.
pub struct Acquisitions<'a> {
    runtime: &'a dyn ContainerRuntime,
    network: &'a dyn NetworkAttacher,
    acquired: Vec<Acquired>,
}

impl<'a> Acquisitions<'a> {
    /// Creates an empty list releasing through `runtime` and `network`.
    pub fn new(runtime: &'a dyn ContainerRuntime, network: &'a dyn NetworkAttacher) -> Self {
        Self {
            runtime,
            network,
            acquired: Vec::new(),
        }
    }

    /// Records an acquired resource.
    pub fn push(&mut self, resource: Acquired) {
        debug!(kind = resource.kind(), "Acquired resource");
        self.acquired.push(resource);
    }

    /// Returns the recorded resources in acquisition order.
    pub fn acquired(&self) -> &[Acquired] {
        &self.acquired
    }

    /// Returns true if nothing has been acquired.
    pub fn is_empty(&self) -> bool {
        self.acquired.is_empty()
    }

    /// Keeps every acquired resource; called once provisioning succeeded.
    pub fn commit(mut self) {
        self.acquired.clear();
    }

    /// Releases every acquired resource, most recent first.
    pub async fn release(mut self) {
        while let Some(resource) = self.acquired.pop() {
            let result = match &resource {
                Acquired::Network(task) => self.network.detach(task).await,
                Acquired::Task(task) => self.runtime.delete_task(task).await,
                Acquired::Container(container) => self.runtime.delete_container(container).await,
            };

            match result {
                Ok(()) => debug!(kind = resource.kind(), "Released resource"),
                Err(e) => warn!(
                    kind = resource.kind(),
                    resource = ?resource,
                    error = %e,
                    "Failed to release resource"
                ),
            }
        }
    }
}

impl Drop for Acquisitions<'_> {
    fn drop(&mut self) {
        if !self.acquired.is_empty() {
            warn!(
                count = self.acquired.len(),
                "Acquisition list dropped without commit or release; resources left behind"
            );
        }
    }
}
