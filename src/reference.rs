//! Image reference normalization.
//!
//! Every reference handed to the runtime collaborator is fully qualified:
//! registry, repository and either a tag or a digest.
//!
//! | Input                          | Normalized                                  |
//! |--------------------------------|---------------------------------------------|
//! | `alpine`                       | `docker.io/library/alpine:latest`           |
//! | `functions/nodeinfo:0.1`       | `docker.io/functions/nodeinfo:0.1`          |
//! | `ghcr.io/acme/fn`              | `ghcr.io/acme/fn:latest`                    |
//! | `alpine@sha256:...`            | `docker.io/library/alpine@sha256:...`       |

use crate::constants::{DEFAULT_IMAGE_TAG, MAX_IMAGE_REF_LEN};
use crate::error::{Error, Result};
use oci_distribution::Reference;

/// Parses `image_ref` and returns its fully qualified form, appending the
/// default tag when the reference names neither a tag nor a digest.
///
/// # Errors
///
/// [`Error::InvalidReference`] if the reference is empty, too long, or does
/// not follow the distribution reference grammar.
pub fn normalize_image_reference(image_ref: &str) -> Result<String> {
    if image_ref.is_empty() {
        return Err(Error::InvalidReference {
            reference: image_ref.to_string(),
            reason: "reference is empty".to_string(),
        });
    }

    if image_ref.len() > MAX_IMAGE_REF_LEN {
        return Err(Error::InvalidReference {
            reference: image_ref.to_string(),
            reason: format!("exceeds {} bytes", MAX_IMAGE_REF_LEN),
        });
    }

    let reference: Reference = image_ref.parse().map_err(|e| Error::InvalidReference {
        reference: image_ref.to_string(),
        reason: format!("{}", e),
    })?;

    let mut normalized = format!("{}/{}", reference.registry(), reference.repository());
    match (reference.tag(), reference.digest()) {
        (Some(tag), _) => {
            normalized.push(':');
            normalized.push_str(tag);
        }
        (None, None) => {
            normalized.push(':');
            normalized.push_str(DEFAULT_IMAGE_TAG);
        }
        (None, Some(_)) => {}
    }
    if let Some(digest) = reference.digest() {
        normalized.push('@');
        normalized.push_str(digest);
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tag_appended() {
        let normalized = normalize_image_reference("ghcr.io/openfaas/figlet").unwrap();
        assert_eq!(normalized, "ghcr.io/openfaas/figlet:latest");
    }

    #[test]
    fn test_explicit_tag_kept() {
        let normalized = normalize_image_reference("ghcr.io/openfaas/figlet:0.13.0").unwrap();
        assert_eq!(normalized, "ghcr.io/openfaas/figlet:0.13.0");
    }

    #[test]
    fn test_invalid_reference() {
        let err = normalize_image_reference("nginx :latest").unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));

        let err = normalize_image_reference("").unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }));
    }
}
