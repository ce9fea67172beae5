//! Deployment descriptor decoded from the HTTP body.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A function deployment request.
///
/// Field names follow the provider API's JSON schema (`envProcess`,
/// `envVars`, ...). Fields not used by provisioning are ignored on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    /// Service name; becomes the container ID.
    pub service: String,
    /// Image reference, tag optional.
    pub image: String,
    /// Legacy override for the `fprocess` environment entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_process: Option<String>,
    /// Environment variables.
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    /// Secret names, in mount order.
    #[serde(default)]
    pub secrets: Vec<String>,
    /// Container labels, stored verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    /// Annotations, stored as namespaced labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<HashMap<String, String>>,
}

impl DeploymentRequest {
    /// Creates a request for `service` running `image`.
    pub fn new(service: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    /// Decodes a request from a raw body.
    ///
    /// An empty body and malformed JSON are both [`Error::BadRequest`]; the
    /// latter carries the parser's message.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.is_empty() {
            return Err(Error::BadRequest("expected a body".to_string()));
        }
        serde_json::from_slice(body).map_err(|e| Error::BadRequest(e.to_string()))
    }

    /// Returns the `envProcess` override, or `""` if none was given.
    pub fn env_process(&self) -> &str {
        self.env_process.as_deref().unwrap_or("")
    }
}
