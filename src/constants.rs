//! # Provisioning Constants
//!
//! Fixed names, paths and limits shared by every stage of the deployment
//! pipeline. These constants are the **single source of truth** for the
//! filesystem layout that function containers rely on.
//!
//! ## Container Layout
//!
//! Every function container sees:
//!
//! | Path                              | Source                          |
//! |-----------------------------------|---------------------------------|
//! | `/etc/resolv.conf`                | `<working_dir>/resolv.conf`     |
//! | `/etc/hosts`                      | `<working_dir>/hosts`           |
//! | `/var/openfaas/secrets/<name>`    | `<secret_mount_path>/<name>`    |
//!
//! All three are read-only bind mounts.
//!
//! ## Cross-References
//!
//! - [`crate::labels`]: Uses the annotation prefix
//! - [`crate::mounts`]: Uses the mount destinations and options
//! - [`crate::env`]: Uses the reserved `fprocess` key
//! - [`crate::spec`]: Uses the capability set and OCI version
//! - [`crate::config`]: Uses the environment variable names and defaults

// =============================================================================
// Label Merging
// =============================================================================

/// Namespace prepended to every annotation key when it is folded into the
/// container label set.
///
/// Explicit labels are stored verbatim; annotations always carry this prefix,
/// so an explicit label can only collide with an annotation if the caller
/// deliberately wrote a key starting with it.
pub const ANNOTATION_LABEL_PREFIX: &str = "com.openfaas.annotations.";

// =============================================================================
// Environment
// =============================================================================

/// Reserved environment key naming the process the function watchdog forks.
///
/// Supplied either through the request's `envProcess` field or as an
/// explicit `envVars` entry. The explicit entry wins.
pub const FPROCESS_ENV_KEY: &str = "fprocess";

/// `PATH` applied when neither the image nor the request supplies one.
pub const DEFAULT_PATH_ENV: &str =
    "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

// =============================================================================
// Mounts
// =============================================================================

/// Directory inside the container where secrets are mounted.
pub const SECRETS_MOUNT_DIR: &str = "/var/openfaas/secrets";

/// Resolver configuration destination inside the container.
pub const RESOLV_CONF_DESTINATION: &str = "/etc/resolv.conf";

/// Hosts file destination inside the container.
pub const HOSTS_DESTINATION: &str = "/etc/hosts";

/// File name of the resolver configuration within the working directory.
pub const RESOLV_CONF_FILE: &str = "resolv.conf";

/// File name of the hosts file within the working directory.
pub const HOSTS_FILE: &str = "hosts";

/// Mount type used for every host-path mount.
pub const BIND_MOUNT_TYPE: &str = "bind";

/// Options applied to every host-path mount: recursive, read-only bind.
pub const READ_ONLY_BIND_OPTIONS: &[&str] = &["rbind", "ro"];

// =============================================================================
// Container & Task
// =============================================================================

/// Suffix of the writable snapshot created for each function container.
///
/// The snapshot key is `<service><suffix>`, so re-deploying the same
/// service name always targets the same snapshot.
pub const SNAPSHOT_SUFFIX: &str = "-snapshot";

/// Extra capability granted to every function on top of the runtime default
/// set. Required for ICMP and raw-socket health probes from within functions.
pub const FUNCTION_CAPABILITIES: &[&str] = &["CAP_NET_RAW"];

/// Default capability set of an OCI container before function extras.
pub const DEFAULT_CAPABILITIES: &[&str] = &[
    "CAP_CHOWN",
    "CAP_DAC_OVERRIDE",
    "CAP_FSETID",
    "CAP_FOWNER",
    "CAP_MKNOD",
    "CAP_SETGID",
    "CAP_SETUID",
    "CAP_SETFCAP",
    "CAP_SETPCAP",
    "CAP_NET_BIND_SERVICE",
    "CAP_SYS_CHROOT",
    "CAP_KILL",
    "CAP_AUDIT_WRITE",
];

/// Binary that receives the task's stdout/stderr and forwards them to the
/// host log pipeline.
pub const DEFAULT_LOG_HELPER: &str = "/usr/local/bin/faasd";

/// OCI Runtime Spec version for generated specs.
///
/// See: <https://github.com/opencontainers/runtime-spec/releases>
pub const OCI_RUNTIME_SPEC_VERSION: &str = "1.0.2";

// =============================================================================
// Image References
// =============================================================================

/// Tag appended to references that carry neither a tag nor a digest.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Maximum OCI image reference length in bytes.
///
/// **Security**: Prevents overly long references from reaching the
/// reference parser and the runtime collaborator.
pub const MAX_IMAGE_REF_LEN: usize = 512;

// =============================================================================
// Service Names
// =============================================================================

/// Valid characters for service names.
///
/// The service name doubles as container ID and snapshot key, so it must be
/// safe to embed in filesystem paths.
pub const SERVICE_NAME_VALID_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_.";

/// Maximum service name length.
pub const MAX_SERVICE_NAME_LEN: usize = 128;

/// Validates a service name for use as a container ID.
///
/// # Returns
///
/// `Ok(())` if valid, `Err(reason)` with a description of the failure.
#[inline]
#[must_use = "validation result must be checked to ensure the service name is safe"]
pub fn validate_service_name(name: &str) -> std::result::Result<(), &'static str> {
    if name.is_empty() {
        return Err("service name cannot be empty");
    }
    if name.len() > MAX_SERVICE_NAME_LEN {
        return Err("service name exceeds maximum length");
    }
    if name.starts_with('.') {
        return Err("service name cannot start with '.'");
    }
    if !name.chars().all(|c| SERVICE_NAME_VALID_CHARS.contains(c)) {
        return Err("service name contains invalid characters");
    }
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================
//
// Environment variables read once at startup by `DeployerConfig::from_env`.
// Nothing in the pipeline reads the process environment after that.
// =============================================================================

/// Environment variable selecting the snapshotter (storage driver).
pub const SNAPSHOTTER_ENV: &str = "snapshotter";

/// Environment variable overriding the secrets root directory.
pub const SECRET_MOUNT_PATH_ENV: &str = "secret_mount_path";

/// Environment variable forcing a registry pull on every deploy.
pub const ALWAYS_PULL_ENV: &str = "always_pull";

/// Default secrets root directory on the host.
pub const DEFAULT_SECRET_MOUNT_PATH: &str = "/var/lib/faasd-provider/secrets";

// =============================================================================
// Networking
// =============================================================================

/// Interface name created inside the function's network namespace.
pub const CNI_IFNAME: &str = "eth1";

/// Default directory holding CNI plugin binaries.
pub const DEFAULT_CNI_BIN_DIR: &str = "/opt/cni/bin";

/// Default CNI network configuration list.
pub const DEFAULT_CNI_CONF_PATH: &str = "/etc/cni/net.d/10-openfaas.conflist";
