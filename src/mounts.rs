//! Secret validation and bind-mount assembly.
//!
//! Mount building never fails: it assumes [`validate_secrets`] already ran
//! and succeeded. The pipeline guarantees that ordering, so a deployment
//! that names a missing secret is rejected before anything is created.

use crate::constants::{
    BIND_MOUNT_TYPE, HOSTS_DESTINATION, HOSTS_FILE, READ_ONLY_BIND_OPTIONS,
    RESOLV_CONF_DESTINATION, RESOLV_CONF_FILE, SECRETS_MOUNT_DIR,
};
use crate::error::{Error, Result};
use crate::spec::OciMount;
use std::path::Path;
use tracing::debug;

/// Checks that every secret exists under `mount_path`.
///
/// Secrets are checked in order and the first failure is returned; later
/// secrets are not inspected.
///
/// # Errors
///
/// - [`Error::InvalidSecretName`] if a name could escape the secrets
///   directory (empty, `.`, `..`, or containing `/`)
/// - [`Error::MissingSecret`] if `mount_path/<name>` does not exist
pub fn validate_secrets(mount_path: &Path, secrets: &[String]) -> Result<()> {
    for secret in secrets {
        validate_secret_name(secret)?;

        let path = mount_path.join(secret);
        if std::fs::metadata(&path).is_err() {
            debug!(secret = %secret, path = %path.display(), "Secret not found");
            return Err(Error::MissingSecret(secret.clone()));
        }
    }
    Ok(())
}

/// Rejects names that would not map to a single file in the secrets
/// directory.
fn validate_secret_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name is a relative path component"
    } else if name.contains('/') || name.contains('\\') {
        "name contains a path separator"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };

    Err(Error::InvalidSecretName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Returns the fixed network-config mounts sourced from `working_dir`:
/// resolver configuration first, hosts file second.
pub fn build_mounts(working_dir: &Path) -> Vec<OciMount> {
    vec![
        read_only_bind(
            RESOLV_CONF_DESTINATION.to_string(),
            &working_dir.join(RESOLV_CONF_FILE),
        ),
        read_only_bind(HOSTS_DESTINATION.to_string(), &working_dir.join(HOSTS_FILE)),
    ]
}

/// Appends one read-only bind per secret, destination
/// `/var/openfaas/secrets/<name>`, in the order given.
pub fn append_secret_mounts(mounts: &mut Vec<OciMount>, mount_path: &Path, secrets: &[String]) {
    mounts.extend(secrets.iter().map(|secret| {
        read_only_bind(
            format!("{}/{}", SECRETS_MOUNT_DIR, secret),
            &mount_path.join(secret),
        )
    }));
}

fn read_only_bind(destination: String, source: &Path) -> OciMount {
    OciMount {
        destination,
        mount_type: BIND_MOUNT_TYPE.to_string(),
        source: source.to_string_lossy().to_string(),
        options: READ_ONLY_BIND_OPTIONS.iter().map(|o| o.to_string()).collect(),
    }
}
