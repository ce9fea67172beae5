//! # CNI Plugin Attacher
//!
//! A [`NetworkAttacher`] that drives a CNI plugin chain directly, the way a
//! CNI-aware runtime does: each plugin binary is executed with the `CNI_*`
//! environment and its network configuration on stdin.
//!
//! ## Protocol
//!
//! ```text
//! ADD:  plugins[0] → plugins[1] → ... → plugins[n-1]   (prevResult chained)
//! DEL:  plugins[n-1] → ... → plugins[0]
//! ```
//!
//! | Variable         | Value                          |
//! |------------------|--------------------------------|
//! | `CNI_COMMAND`    | `ADD` / `DEL`                  |
//! | `CNI_CONTAINERID`| container ID                   |
//! | `CNI_NETNS`      | `/proc/<pid>/ns/net`           |
//! | `CNI_IFNAME`     | `eth1`                         |
//! | `CNI_PATH`       | plugin binary directory        |
//!
//! The result of the last plugin in an ADD chain is the attachment result.
//! A plugin that exits non-zero reports a CNI error object on stdout.
//!
//! ## Security
//!
//! Plugin `type` values are joined onto the plugin directory, so they are
//! rejected if they contain a path separator.

use crate::constants::{CNI_IFNAME, DEFAULT_CNI_BIN_DIR, DEFAULT_CNI_CONF_PATH};
use crate::error::{Error, Result};
use crate::network::{netns_path, InterfaceAddress, NetworkAttacher, NetworkAttachment};
use crate::runtime::TaskHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// A CNI network configuration list (`*.conflist`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CniConfList {
    /// CNI spec version the plugins are invoked with.
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    /// Network name.
    pub name: String,
    /// Plugin configurations, in ADD order.
    pub plugins: Vec<Value>,
}

impl CniConfList {
    /// Parses a configuration list from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Deserialize)]
struct CniResult {
    #[serde(default)]
    interfaces: Vec<CniInterface>,
    #[serde(default)]
    ips: Vec<CniIp>,
}

#[derive(Debug, Deserialize)]
struct CniInterface {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CniIp {
    address: String,
    #[serde(default)]
    interface: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CniError {
    code: u32,
    msg: String,
    #[serde(default)]
    details: Option<String>,
}

impl std::fmt::Display for CniError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.details {
            Some(details) => write!(f, "CNI error {}: {} ({})", self.code, self.msg, details),
            None => write!(f, "CNI error {}: {}", self.code, self.msg),
        }
    }
}

/// Splits a CIDR address such as `10.62.0.5/16`.
fn parse_cidr(cidr: &str) -> Option<(IpAddr, u8)> {
    let (addr, prefix) = cidr.split_once('/')?;
    Some((addr.parse().ok()?, prefix.parse().ok()?))
}

// =============================================================================
// CniNetwork
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CniCommand {
    Add,
    Del,
}

impl CniCommand {
    fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Del => "DEL",
        }
    }
}

/// Network attacher executing a CNI plugin chain.
#[derive(Debug, Clone)]
pub struct CniNetwork {
    /// Directory holding plugin binaries.
    bin_dir: PathBuf,
    /// Network configuration list.
    conf: CniConfList,
    /// Interface created inside the namespace.
    ifname: String,
}

impl CniNetwork {
    /// Creates an attacher for `conf` using plugins from `bin_dir`.
    pub fn new(bin_dir: impl Into<PathBuf>, conf: CniConfList) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            conf,
            ifname: CNI_IFNAME.to_string(),
        }
    }

    /// Loads the configuration list at `conf_path`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidNetworkConfig`] if the file cannot be read or parsed,
    /// or if it names no plugins.
    pub fn load(bin_dir: impl Into<PathBuf>, conf_path: &Path) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidNetworkConfig {
            path: conf_path.to_path_buf(),
            reason,
        };

        let json = std::fs::read_to_string(conf_path).map_err(|e| invalid(e.to_string()))?;
        let conf: CniConfList = serde_json::from_str(&json).map_err(|e| invalid(e.to_string()))?;
        if conf.plugins.is_empty() {
            return Err(invalid("no plugins configured".to_string()));
        }

        info!(network = %conf.name, path = %conf_path.display(), "Loaded CNI configuration");
        Ok(Self::new(bin_dir, conf))
    }

    /// Loads the default configuration list from the default plugin directory.
    pub fn load_default() -> Result<Self> {
        Self::load(DEFAULT_CNI_BIN_DIR, Path::new(DEFAULT_CNI_CONF_PATH))
    }

    /// Sets the interface name created inside the namespace.
    pub fn with_ifname(mut self, ifname: impl Into<String>) -> Self {
        self.ifname = ifname.into();
        self
    }

    /// Returns the network name.
    pub fn network_name(&self) -> &str {
        &self.conf.name
    }

    /// Builds the stdin document for one plugin invocation.
    fn plugin_input(&self, plugin: &Value, prev_result: Option<&Value>) -> Result<Value> {
        let mut input = plugin.clone();
        let object = input.as_object_mut().ok_or_else(|| {
            Error::Serialization("CNI plugin configuration must be an object".to_string())
        })?;
        object.insert("name".to_string(), Value::String(self.conf.name.clone()));
        object.insert(
            "cniVersion".to_string(),
            Value::String(self.conf.cni_version.clone()),
        );
        if let Some(prev) = prev_result {
            object.insert("prevResult".to_string(), prev.clone());
        }
        Ok(input)
    }

    /// Resolves the binary for a plugin configuration.
    fn plugin_binary(&self, plugin: &Value) -> std::result::Result<PathBuf, String> {
        let plugin_type = plugin
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "plugin configuration has no type".to_string())?;

        if plugin_type.is_empty() || plugin_type.contains('/') || plugin_type.contains("..") {
            return Err(format!("invalid plugin type '{}'", plugin_type));
        }
        Ok(self.bin_dir.join(plugin_type))
    }

    /// Runs one plugin and returns its parsed stdout (if any).
    async fn invoke(
        &self,
        command: CniCommand,
        plugin: &Value,
        task: &TaskHandle,
        prev_result: Option<&Value>,
    ) -> std::result::Result<Option<Value>, String> {
        let binary = self.plugin_binary(plugin)?;
        let input = self
            .plugin_input(plugin, prev_result)
            .map_err(|e| e.to_string())?;
        let stdin_bytes = serde_json::to_vec(&input).map_err(|e| e.to_string())?;

        debug!(
            command = command.as_str(),
            plugin = %binary.display(),
            container = %task.container_id,
            pid = task.pid,
            "Invoking CNI plugin"
        );

        let mut child = Command::new(&binary)
            .env("CNI_COMMAND", command.as_str())
            .env("CNI_CONTAINERID", &task.container_id)
            .env("CNI_NETNS", netns_path(task.pid))
            .env("CNI_IFNAME", &self.ifname)
            .env("CNI_PATH", &self.bin_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {}", binary.display(), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&stdin_bytes)
                .await
                .map_err(|e| format!("failed to write plugin config: {}", e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("failed to wait for {}: {}", binary.display(), e))?;

        if !output.status.success() {
            if let Ok(err) = serde_json::from_slice::<CniError>(&output.stdout) {
                return Err(err.to_string());
            }
            return Err(format!(
                "{} exited with {}: {}",
                binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&output.stdout)
            .map(Some)
            .map_err(|e| format!("invalid result from {}: {}", binary.display(), e))
    }

    /// Converts a raw CNI result into interface addresses.
    fn addresses(&self, result: &Value) -> std::result::Result<Vec<InterfaceAddress>, String> {
        let result: CniResult =
            serde_json::from_value(result.clone()).map_err(|e| format!("invalid CNI result: {}", e))?;

        result
            .ips
            .iter()
            .map(|ip| {
                let (address, prefix_len) = parse_cidr(&ip.address)
                    .ok_or_else(|| format!("invalid address '{}' in CNI result", ip.address))?;
                let interface = ip
                    .interface
                    .and_then(|idx| result.interfaces.get(idx))
                    .map(|iface| iface.name.clone())
                    .unwrap_or_else(|| self.ifname.clone());
                Ok(InterfaceAddress {
                    interface,
                    address,
                    prefix_len,
                })
            })
            .collect()
    }
}

#[async_trait]
impl NetworkAttacher for CniNetwork {
    async fn attach(&self, task: &TaskHandle) -> Result<NetworkAttachment> {
        let attach_err = |reason: String| Error::NetworkAttach {
            service: task.container_id.clone(),
            reason,
        };

        let mut prev_result: Option<Value> = None;
        for plugin in &self.conf.plugins {
            if let Some(result) = self
                .invoke(CniCommand::Add, plugin, task, prev_result.as_ref())
                .await
                .map_err(attach_err)?
            {
                prev_result = Some(result);
            }
        }

        let result = prev_result
            .ok_or_else(|| attach_err("plugin chain returned no result".to_string()))?;
        let addresses = self.addresses(&result).map_err(attach_err)?;

        Ok(NetworkAttachment {
            container_id: task.container_id.clone(),
            netns: netns_path(task.pid),
            addresses,
        })
    }

    async fn resolve_address(
        &self,
        attachment: &NetworkAttachment,
        task: &TaskHandle,
    ) -> Result<IpAddr> {
        attachment
            .address_of(&self.ifname)
            .or_else(|| attachment.addresses.first().map(|a| a.address))
            .ok_or_else(|| Error::NetworkAttach {
                service: task.container_id.clone(),
                reason: format!("no address assigned in {}", attachment.netns.display()),
            })
    }

    async fn detach(&self, task: &TaskHandle) -> Result<()> {
        let mut first_error = None;

        for plugin in self.conf.plugins.iter().rev() {
            if let Err(reason) = self.invoke(CniCommand::Del, plugin, task, None).await {
                warn!(
                    container = %task.container_id,
                    error = %reason,
                    "CNI DEL failed"
                );
                first_error.get_or_insert(reason);
            }
        }

        match first_error {
            Some(reason) => Err(Error::NetworkAttach {
                service: task.container_id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}
