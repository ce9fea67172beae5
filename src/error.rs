//! Error types for the provisioning pipeline.

use std::path::PathBuf;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while provisioning a function.
///
/// Variants fall into three groups:
///
/// - **Request errors**: the body could not be decoded; no stage ran.
/// - **Validation errors**: raised before any collaborator call, so a
///   failed validation never leaves a container, task or snapshot behind.
/// - **Provisioning errors**: wrap a collaborator failure with the
///   resource it concerned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Request body absent or not a valid deployment descriptor.
    #[error("{0}")]
    BadRequest(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Failed to parse or normalize an image reference.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// Service name unusable as a container ID.
    #[error("invalid service name '{name}': {reason}")]
    InvalidServiceName { name: String, reason: String },

    /// Declared secret not present under the secrets root.
    #[error("unable to find secret: {0}")]
    MissingSecret(String),

    /// Secret name that would escape the secrets directory.
    #[error("invalid secret name '{name}': {reason}")]
    InvalidSecretName { name: String, reason: String },

    /// Annotation key clashes with an explicit label once prefixed.
    #[error("key {key} can not be used as a label as it clashes with annotations")]
    NamingCollision { key: String },

    // =========================================================================
    // Provisioning Errors
    // =========================================================================
    /// Image resolution or pull failed.
    #[error("unable to pull image {reference}: {reason}")]
    ImageProvisioning { reference: String, reason: String },

    /// OCI spec could not be generated from the image configuration.
    #[error("failed to generate OCI spec: {0}")]
    SpecGenerationFailed(String),

    /// Container creation failed.
    #[error("unable to create container: {service}, error: {reason}")]
    ContainerCreation { service: String, reason: String },

    /// Task creation failed.
    #[error("unable to create task: {service}, error: {reason}")]
    TaskCreation { service: String, reason: String },

    /// Network attachment or address resolution failed.
    #[error("unable to attach network for {service}: {reason}")]
    NetworkAttach { service: String, reason: String },

    /// Exit-wait registration failed.
    #[error("unable to wait for task to start: {service}: {reason}")]
    TaskWait { service: String, reason: String },

    /// Task start failed.
    #[error("unable to start task: {service}: {reason}")]
    TaskStart { service: String, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Network configuration could not be loaded.
    #[error("invalid network configuration at {path}: {reason}")]
    InvalidNetworkConfig { path: PathBuf, reason: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true for errors raised before any collaborator call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidReference { .. }
                | Self::InvalidServiceName { .. }
                | Self::MissingSecret(_)
                | Self::InvalidSecretName { .. }
                | Self::NamingCollision { .. }
        )
    }

    /// Returns true for errors wrapping a runtime or network failure.
    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Self::ImageProvisioning { .. }
                | Self::ContainerCreation { .. }
                | Self::TaskCreation { .. }
                | Self::NetworkAttach { .. }
                | Self::TaskWait { .. }
                | Self::TaskStart { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
