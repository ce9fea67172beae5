//! Image provisioning.
//!
//! Resolution, pull and unpack are the runtime collaborator's job; this
//! stage only selects the snapshotter, wraps failures with the reference
//! that failed, and reports what was resolved.

use crate::error::{Error, Result};
use crate::runtime::{ContainerRuntime, ImageHandle};
use tracing::info;

/// Resolves `reference` through `runtime`.
///
/// `reference` must already be normalized (see
/// [`normalize_image_reference`](crate::reference::normalize_image_reference)).
/// With `force_pull` the runtime re-fetches the image even if it is cached.
///
/// # Errors
///
/// [`Error::ImageProvisioning`] carrying the reference and the runtime's
/// error. The pull is not retried.
pub async fn prepare_image(
    runtime: &dyn ContainerRuntime,
    reference: &str,
    snapshotter: &str,
    force_pull: bool,
) -> Result<ImageHandle> {
    let image = runtime
        .prepare_image(reference, snapshotter, force_pull)
        .await
        .map_err(|e| Error::ImageProvisioning {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;

    info!(
        image = %image.name,
        digest = %image.digest,
        size = image.size.unwrap_or(0),
        snapshotter = %snapshotter,
        force_pull,
        "Prepared image"
    );

    Ok(image)
}
