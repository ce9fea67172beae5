//! OCI execution spec for function containers.
//!
//! A function's spec starts from the image's default process configuration
//! and is then overridden with the function's environment, mounts and the
//! extra capability set. The resulting document is handed to the runtime
//! collaborator, which serializes it to `config.json`.

use crate::constants::{
    BIND_MOUNT_TYPE, DEFAULT_CAPABILITIES, DEFAULT_PATH_ENV, FUNCTION_CAPABILITIES,
    OCI_RUNTIME_SPEC_VERSION,
};
use crate::error::{Error, Result};
use crate::runtime::ImageConfig;
use serde::{Deserialize, Serialize};

// =============================================================================
// Spec Builder
// =============================================================================

/// Builds the spec for a function container.
///
/// - `args` is the image's entrypoint followed by its default command.
/// - `env` is the image's environment with `env` entries replacing those of
///   the same key; `PATH` is added if neither sets it.
/// - `mounts` follow the default `/proc`, `/dev`, `/sys` mounts.
/// - Capabilities are the default set plus [`FUNCTION_CAPABILITIES`].
///
/// # Errors
///
/// [`Error::SpecGenerationFailed`] if the image has neither entrypoint nor
/// command, or if its user cannot be expressed.
pub fn build_function_spec(
    hostname: &str,
    image: &ImageConfig,
    mounts: Vec<OciMount>,
    env: &[String],
) -> Result<OciSpec> {
    let args: Vec<String> = image
        .entrypoint
        .iter()
        .chain(image.cmd.iter())
        .cloned()
        .collect();
    if args.is_empty() {
        return Err(Error::SpecGenerationFailed(
            "image has no entrypoint or command".to_string(),
        ));
    }

    let user = parse_user(image.user.as_deref().unwrap_or(""))?;

    let mut all_mounts = default_mounts();
    all_mounts.extend(mounts);

    Ok(OciSpec {
        oci_version: OCI_RUNTIME_SPEC_VERSION.to_string(),
        root: OciRoot {
            path: "rootfs".to_string(),
            readonly: false,
        },
        process: OciProcess {
            terminal: false,
            user,
            args,
            env: merge_env(&image.env, env),
            cwd: image
                .working_dir
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "/".to_string()),
            capabilities: Some(function_capabilities()),
            no_new_privileges: true,
        },
        hostname: hostname.to_string(),
        mounts: all_mounts,
        linux: Some(OciLinux {
            namespaces: vec![
                OciNamespace { ns_type: "pid".to_string(), path: None },
                OciNamespace { ns_type: "network".to_string(), path: None },
                OciNamespace { ns_type: "ipc".to_string(), path: None },
                OciNamespace { ns_type: "uts".to_string(), path: None },
                OciNamespace { ns_type: "mount".to_string(), path: None },
            ],
        }),
    })
}

/// Overlays `overrides` onto `base` by key, keeping `base` order for
/// replaced keys and appending new ones.
fn merge_env(base: &[String], overrides: &[String]) -> Vec<String> {
    fn key(entry: &str) -> &str {
        entry.split_once('=').map_or(entry, |(k, _)| k)
    }

    let mut env: Vec<String> = base.to_vec();
    for entry in overrides {
        match env.iter_mut().find(|e| key(e) == key(entry)) {
            Some(existing) => *existing = entry.clone(),
            None => env.push(entry.clone()),
        }
    }

    if !env.iter().any(|e| key(e) == "PATH") {
        env.insert(0, DEFAULT_PATH_ENV.to_string());
    }
    env
}

/// Parses an image `User` field.
///
/// Numeric `uid` / `uid:gid` map directly; names are passed through for the
/// runtime to resolve against the image's `/etc/passwd`.
fn parse_user(user: &str) -> Result<OciUser> {
    if user.is_empty() {
        return Ok(OciUser::default());
    }

    let (uid_part, gid_part) = match user.split_once(':') {
        Some((u, g)) => (u, Some(g)),
        None => (user, None),
    };

    match (uid_part.parse::<u32>(), gid_part.map(str::parse::<u32>)) {
        (Ok(uid), None) => Ok(OciUser { uid, gid: 0, username: None }),
        (Ok(uid), Some(Ok(gid))) => Ok(OciUser { uid, gid, username: None }),
        _ if !uid_part.is_empty() => Ok(OciUser {
            uid: 0,
            gid: 0,
            username: Some(user.to_string()),
        }),
        _ => Err(Error::SpecGenerationFailed(format!(
            "unsupported image user '{}'",
            user
        ))),
    }
}

fn function_capabilities() -> OciCapabilities {
    let caps: Vec<String> = DEFAULT_CAPABILITIES
        .iter()
        .chain(FUNCTION_CAPABILITIES.iter())
        .map(|c| c.to_string())
        .collect();

    OciCapabilities {
        bounding: caps.clone(),
        effective: caps.clone(),
        permitted: caps,
    }
}

/// Returns default OCI mounts.
fn default_mounts() -> Vec<OciMount> {
    vec![
        OciMount {
            destination: "/proc".to_string(),
            mount_type: "proc".to_string(),
            source: "proc".to_string(),
            options: vec!["nosuid".to_string(), "noexec".to_string(), "nodev".to_string()],
        },
        OciMount {
            destination: "/dev".to_string(),
            mount_type: "tmpfs".to_string(),
            source: "tmpfs".to_string(),
            options: vec!["nosuid".to_string(), "strictatime".to_string(), "mode=755".to_string()],
        },
        OciMount {
            destination: "/dev/pts".to_string(),
            mount_type: "devpts".to_string(),
            source: "devpts".to_string(),
            options: vec!["nosuid".to_string(), "noexec".to_string(), "newinstance".to_string()],
        },
        OciMount {
            destination: "/dev/shm".to_string(),
            mount_type: "tmpfs".to_string(),
            source: "shm".to_string(),
            options: vec!["nosuid".to_string(), "noexec".to_string(), "nodev".to_string()],
        },
        OciMount {
            destination: "/sys".to_string(),
            mount_type: "sysfs".to_string(),
            source: "sysfs".to_string(),
            options: vec!["nosuid".to_string(), "noexec".to_string(), "nodev".to_string(), "ro".to_string()],
        },
    ]
}

// =============================================================================
// OCI Runtime Spec Types
// =============================================================================

/// OCI Runtime Spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciSpec {
    pub oci_version: String,
    pub root: OciRoot,
    pub process: OciProcess,
    pub hostname: String,
    pub mounts: Vec<OciMount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linux: Option<OciLinux>,
}

impl OciSpec {
    /// Returns the mounts whose source is a host path.
    pub fn bind_mounts(&self) -> impl Iterator<Item = &OciMount> {
        self.mounts.iter().filter(|m| m.mount_type == BIND_MOUNT_TYPE)
    }
}

/// OCI root filesystem config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciRoot {
    pub path: String,
    pub readonly: bool,
}

/// OCI process config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciProcess {
    pub terminal: bool,
    pub user: OciUser,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<OciCapabilities>,
    #[serde(default)]
    pub no_new_privileges: bool,
}

/// OCI user config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciUser {
    pub uid: u32,
    pub gid: u32,
    /// Unresolved user name from the image config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// OCI process capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciCapabilities {
    #[serde(default)]
    pub bounding: Vec<String>,
    #[serde(default)]
    pub effective: Vec<String>,
    #[serde(default)]
    pub permitted: Vec<String>,
}

/// OCI mount config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciMount {
    pub destination: String,
    #[serde(rename = "type")]
    pub mount_type: String,
    pub source: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// OCI Linux-specific config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciLinux {
    pub namespaces: Vec<OciNamespace>,
}

/// OCI namespace config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciNamespace {
    #[serde(rename = "type")]
    pub ns_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}
