//! Network attachment collaborator interface.
//!
//! Each function task gets its own network namespace (created by the
//! runtime from the `network` entry in its spec). A [`NetworkAttacher`]
//! plumbs that namespace into the host network, keyed by the task's PID,
//! after the task is created and before its process starts.

use crate::error::Result;
use crate::runtime::TaskHandle;
use async_trait::async_trait;
use std::net::IpAddr;
use std::path::PathBuf;

/// An address assigned to one interface of an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    /// Interface name inside the namespace.
    pub interface: String,
    /// Assigned address.
    pub address: IpAddr,
    /// Prefix length of the assigned subnet.
    pub prefix_len: u8,
}

/// Result of attaching a task to the function network.
///
/// Owned by the network collaborator; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// ID of the attached container.
    pub container_id: String,
    /// Network namespace path the attachment was made in.
    pub netns: PathBuf,
    /// Addresses assigned by the plugin chain.
    pub addresses: Vec<InterfaceAddress>,
}

impl NetworkAttachment {
    /// Returns the first address assigned to `interface`.
    pub fn address_of(&self, interface: &str) -> Option<IpAddr> {
        self.addresses
            .iter()
            .find(|a| a.interface == interface)
            .map(|a| a.address)
    }
}

/// Returns the network namespace path of a process.
pub fn netns_path(pid: u32) -> PathBuf {
    PathBuf::from(format!("/proc/{}/ns/net", pid))
}

/// Network namespace attachment collaborator.
#[async_trait]
pub trait NetworkAttacher: Send + Sync {
    /// Attaches `task`'s network namespace to the function network.
    async fn attach(&self, task: &TaskHandle) -> Result<NetworkAttachment>;

    /// Returns the address `task` is reachable at.
    async fn resolve_address(
        &self,
        attachment: &NetworkAttachment,
        task: &TaskHandle,
    ) -> Result<IpAddr>;

    /// Releases the attachment made for `task`.
    ///
    /// Also called after a failed [`attach`](Self::attach), so it must
    /// tolerate a partial or missing attachment.
    async fn detach(&self, task: &TaskHandle) -> Result<()>;
}
