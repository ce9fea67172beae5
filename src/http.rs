//! HTTP adapter for the deploy endpoint.
//!
//! | Outcome                    | Status | Body                 |
//! |----------------------------|--------|----------------------|
//! | empty body                 | 400    | `expected a body`    |
//! | malformed JSON             | 400    | parser error         |
//! | validation / provisioning  | 400    | error message        |
//! | started                    | 200    | empty                |
//!
//! Each deployment runs on a spawned task that outlives the request, and
//! hands its exit subscription to a background task that logs the
//! function's exit.

use crate::deploy::Deployer;
use crate::error::{Error, Result};
use crate::request::DeploymentRequest;
use crate::runtime::ExitWatch;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{debug, info, warn};

/// Path the deploy handler is mounted at.
pub const DEPLOY_PATH: &str = "/system/functions";

/// Creates the router serving the deploy endpoint.
pub fn router(deployer: Deployer) -> Router {
    Router::new()
        .route(DEPLOY_PATH, post(deploy_handler))
        .with_state(deployer)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Deploys the function described by the request body.
///
/// POST /system/functions
///
/// The deployment runs on its own task, so a client that disconnects
/// mid-request does not cancel the pipeline between stages: it still
/// completes or rolls back.
pub async fn deploy_handler(State(deployer): State<Deployer>, body: Bytes) -> Result<StatusCode> {
    debug!(request = %String::from_utf8_lossy(&body), "[Deploy] request");

    let request = DeploymentRequest::from_body(&body).map_err(|e| {
        warn!(error = %e, "[Deploy] error parsing input");
        e
    })?;

    let service = request.service.clone();
    let handle = tokio::spawn(async move {
        let deployment = deployer.deploy(&request).await?;
        tokio::spawn(log_exit(deployment.service, deployment.exit));
        Ok::<_, Error>(())
    });

    handle
        .await
        .map_err(|e| Error::Internal(format!("deploy task for {} failed: {}", service, e)))?
        .map_err(|e| {
            warn!(service = %service, error = %e, "[Deploy] error deploying");
            e
        })?;

    Ok(StatusCode::OK)
}

async fn log_exit(service: String, exit: ExitWatch) {
    match exit.wait().await {
        Ok(status) => info!(
            service = %service,
            code = status.code,
            exited_at = %status.exited_at,
            "Function exited"
        ),
        Err(e) => warn!(service = %service, error = %e, "Lost function exit status"),
    }
}
