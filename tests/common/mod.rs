//! Recording test doubles for the collaborator traits.
//!
//! Both doubles append to one shared call log so tests can assert on the
//! relative order of runtime and network calls.

#![allow(dead_code)]

use async_trait::async_trait;
use magikfaas::{
    BinaryIo, ContainerHandle, ContainerRequest, ContainerRuntime, Error, ExitNotifier,
    ExitStatus, ExitWatch, ImageConfig, ImageHandle, InterfaceAddress, NetworkAttacher,
    NetworkAttachment, Result, TaskHandle,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered log of collaborator calls.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub const TASK_PID: u32 = 4242;
pub const FUNCTION_IP: &str = "10.62.0.5";

fn injected(op: &str) -> Error {
    Error::Internal(format!("injected {} failure", op))
}

/// Returns the operation names in the log, without arguments.
pub fn operations(log: &CallLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|c| c.split(':').next().unwrap_or_default().to_string())
        .collect()
}

// =============================================================================
// Runtime Double
// =============================================================================

pub struct RecordingRuntime {
    pub log: CallLog,
    /// Operation that fails when called.
    pub fail_on: Option<&'static str>,
    /// Exit code delivered synchronously inside `start_task`.
    pub exit_on_start: Option<u32>,
    /// Time `create_task` takes before returning.
    pub create_task_delay: Option<Duration>,
    /// Image configuration returned by `prepare_image`.
    pub image_config: ImageConfig,
    pub containers: Mutex<Vec<ContainerRequest>>,
    pub force_pulls: Mutex<Vec<bool>>,
    notifier: Mutex<Option<ExitNotifier>>,
    /// Set if the process exited while no wait was registered.
    pub exit_lost: Mutex<bool>,
}

impl RecordingRuntime {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            fail_on: None,
            exit_on_start: None,
            create_task_delay: None,
            image_config: ImageConfig {
                entrypoint: vec!["fwatchdog".to_string()],
                env: vec!["PATH=/usr/local/bin:/usr/bin:/bin".to_string()],
                working_dir: Some("/home/app".to_string()),
                ..Default::default()
            },
            containers: Mutex::new(Vec::new()),
            force_pulls: Mutex::new(Vec::new()),
            notifier: Mutex::new(None),
            exit_lost: Mutex::new(false),
        }
    }

    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn exiting_on_start(mut self, code: u32) -> Self {
        self.exit_on_start = Some(code);
        self
    }

    pub fn slow_create_task(mut self, delay: Duration) -> Self {
        self.create_task_delay = Some(delay);
        self
    }

    fn record(&self, op: &'static str, arg: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("{}:{}", op, arg));
        if self.fail_on == Some(op) {
            return Err(injected(op));
        }
        Ok(())
    }

    pub fn container_requests(&self) -> Vec<ContainerRequest> {
        self.containers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    fn name(&self) -> &str {
        "recording"
    }

    async fn prepare_image(
        &self,
        reference: &str,
        _snapshotter: &str,
        force_pull: bool,
    ) -> Result<ImageHandle> {
        self.record("prepare_image", reference)?;
        self.force_pulls.lock().unwrap().push(force_pull);
        Ok(ImageHandle {
            name: reference.to_string(),
            digest: "sha256:0123456789abcdef".to_string(),
            size: Some(3_400_000),
            config: self.image_config.clone(),
        })
    }

    async fn create_container(&self, request: ContainerRequest) -> Result<ContainerHandle> {
        self.record("create_container", &request.id)?;
        let handle = ContainerHandle {
            id: request.id.clone(),
            snapshot_key: request.snapshot_key.clone(),
        };
        self.containers.lock().unwrap().push(request);
        Ok(handle)
    }

    async fn create_task(&self, container: &ContainerHandle, io: &BinaryIo) -> Result<TaskHandle> {
        self.record("create_task", &io.path.to_string_lossy())?;
        if let Some(delay) = self.create_task_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(TaskHandle {
            id: container.id.clone(),
            container_id: container.id.clone(),
            pid: TASK_PID,
        })
    }

    async fn register_wait(&self, task: &TaskHandle) -> Result<ExitWatch> {
        self.record("register_wait", &task.id)?;
        let (notifier, watch) = ExitWatch::channel(task.id.clone());
        *self.notifier.lock().unwrap() = Some(notifier);
        Ok(watch)
    }

    async fn start_task(&self, task: &TaskHandle) -> Result<()> {
        self.record("start_task", &task.id)?;
        if let Some(code) = self.exit_on_start {
            match self.notifier.lock().unwrap().take() {
                Some(notifier) => {
                    notifier.notify(ExitStatus::new(code));
                }
                None => *self.exit_lost.lock().unwrap() = true,
            }
        }
        Ok(())
    }

    async fn delete_task(&self, task: &TaskHandle) -> Result<()> {
        self.record("delete_task", &task.id)
    }

    async fn delete_container(&self, container: &ContainerHandle) -> Result<()> {
        self.record("delete_container", &container.id)
    }
}

// =============================================================================
// Network Double
// =============================================================================

pub struct RecordingNetwork {
    pub log: CallLog,
    pub fail_on: Option<&'static str>,
}

impl RecordingNetwork {
    pub fn new(log: CallLog) -> Self {
        Self { log, fail_on: None }
    }

    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    fn record(&self, op: &'static str, arg: &str) -> Result<()> {
        self.log.lock().unwrap().push(format!("{}:{}", op, arg));
        if self.fail_on == Some(op) {
            return Err(injected(op));
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkAttacher for RecordingNetwork {
    async fn attach(&self, task: &TaskHandle) -> Result<NetworkAttachment> {
        self.record("attach", &task.pid.to_string())?;
        Ok(NetworkAttachment {
            container_id: task.container_id.clone(),
            netns: PathBuf::from(format!("/proc/{}/ns/net", task.pid)),
            addresses: vec![InterfaceAddress {
                interface: "eth1".to_string(),
                address: FUNCTION_IP.parse().unwrap(),
                prefix_len: 16,
            }],
        })
    }

    async fn resolve_address(
        &self,
        attachment: &NetworkAttachment,
        task: &TaskHandle,
    ) -> Result<IpAddr> {
        self.record("resolve_address", &task.container_id)?;
        attachment
            .address_of("eth1")
            .ok_or_else(|| Error::Internal("no address".to_string()))
    }

    async fn detach(&self, task: &TaskHandle) -> Result<()> {
        self.record("detach", &task.container_id)
    }
}
