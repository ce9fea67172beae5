//! Container provisioning.

use crate::constants::SNAPSHOT_SUFFIX;
use crate::error::{Error, Result};
use crate::runtime::{ContainerHandle, ContainerRequest, ContainerRuntime, ImageHandle};
use crate::spec::{build_function_spec, OciMount};
use std::collections::HashMap;
use tracing::info;

/// Returns the snapshot key used for `service`'s writable layer.
pub fn snapshot_key(service: &str) -> String {
    format!("{}{}", service, SNAPSHOT_SUFFIX)
}

/// Builds the function's OCI spec and asks `runtime` to create its
/// container on a fresh snapshot.
///
/// `labels` is the merged label set. It is taken by value and has no
/// "failed" state, so a container can only be created once merging has
/// succeeded.
///
/// # Errors
///
/// [`Error::ContainerCreation`] naming `name`, whether the spec could not be
/// generated or the runtime refused the container (including a duplicate
/// name).
pub async fn create_container(
    runtime: &dyn ContainerRuntime,
    name: &str,
    image: &ImageHandle,
    snapshotter: &str,
    mounts: Vec<OciMount>,
    env: &[String],
    labels: HashMap<String, String>,
) -> Result<ContainerHandle> {
    let creation_err = |reason: String| Error::ContainerCreation {
        service: name.to_string(),
        reason,
    };

    let spec = build_function_spec(name, &image.config, mounts, env)
        .map_err(|e| creation_err(e.to_string()))?;

    let request = ContainerRequest {
        id: name.to_string(),
        image: image.clone(),
        snapshotter: snapshotter.to_string(),
        snapshot_key: snapshot_key(name),
        spec,
        labels,
    };

    let container = runtime
        .create_container(request)
        .await
        .map_err(|e| creation_err(e.to_string()))?;

    info!(
        service = %name,
        image = %image.name,
        snapshot = %container.snapshot_key,
        "Created container"
    );

    Ok(container)
}
