//! Label and annotation merging.
//!
//! Containers carry a single flat label map. Explicit labels are copied
//! verbatim; annotations are namespaced with [`ANNOTATION_LABEL_PREFIX`]
//! before insertion. A namespaced annotation that lands on a key already
//! present is rejected outright: the caller gets an error and no map, never
//! a half-merged one.

use crate::constants::ANNOTATION_LABEL_PREFIX;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Merges `labels` and `annotations` into one label set.
///
/// On success the result holds exactly `labels.len() + annotations.len()`
/// entries. Annotations are visited in key order so the reported collision
/// is stable across runs.
///
/// # Errors
///
/// [`Error::NamingCollision`] naming the annotation key whose prefixed form
/// already exists.
pub fn build_labels(
    labels: Option<&HashMap<String, String>>,
    annotations: Option<&HashMap<String, String>>,
) -> Result<HashMap<String, String>> {
    let mut merged = labels.cloned().unwrap_or_default();

    let Some(annotations) = annotations else {
        return Ok(merged);
    };

    let mut keys: Vec<&String> = annotations.keys().collect();
    keys.sort();

    for key in keys {
        let prefixed = annotation_label_key(key);
        if merged.contains_key(&prefixed) {
            return Err(Error::NamingCollision { key: key.clone() });
        }
        merged.insert(prefixed, annotations[key].clone());
    }

    Ok(merged)
}

/// Returns the label key an annotation is stored under.
pub fn annotation_label_key(annotation: &str) -> String {
    format!("{}{}", ANNOTATION_LABEL_PREFIX, annotation)
}
