//! Tests for the CNI plugin attacher.

mod common;

use common::{operations, CallLog, RecordingRuntime};
use magikfaas::{
    CniConfList, CniNetwork, Deployer, DeployerConfig, DeploymentRequest, Error, NetworkAttacher,
    TaskHandle,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const CONFLIST: &str = r#"{
    "cniVersion": "0.4.0",
    "name": "openfaas-cni-bridge",
    "plugins": [
        {"type": "bridge", "bridge": "openfaas0", "isGateway": true},
        {"type": "firewall"}
    ]
}"#;

fn task() -> TaskHandle {
    TaskHandle {
        id: "echo".to_string(),
        container_id: "echo".to_string(),
        pid: 4242,
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

#[test]
fn test_conflist_parse() {
    let conf = CniConfList::from_json(CONFLIST).unwrap();
    assert_eq!(conf.name, "openfaas-cni-bridge");
    assert_eq!(conf.cni_version, "0.4.0");
    assert_eq!(conf.plugins.len(), 2);
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("10-openfaas.conflist");
    fs::write(&path, CONFLIST).unwrap();

    let network = CniNetwork::load(dir.path(), &path).unwrap();
    assert_eq!(network.network_name(), "openfaas-cni-bridge");
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.conflist");

    let err = CniNetwork::load(dir.path(), &path).unwrap_err();
    assert!(matches!(err, Error::InvalidNetworkConfig { path: ref p, .. } if *p == path));
}

#[test]
fn test_load_rejects_empty_plugin_list() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.conflist");
    fs::write(&path, r#"{"cniVersion":"0.4.0","name":"n","plugins":[]}"#).unwrap();

    let err = CniNetwork::load(dir.path(), &path).unwrap_err();
    assert!(err.to_string().contains("no plugins"));
}

#[test]
fn test_load_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.conflist");
    fs::write(&path, "{not json").unwrap();

    assert!(matches!(
        CniNetwork::load(dir.path(), &path),
        Err(Error::InvalidNetworkConfig { .. })
    ));
}

// =============================================================================
// Plugin Execution
// =============================================================================

// Plugin scripts are written and executed from one test so no other test
// thread forks while a script is still open for writing (ETXTBSY).
#[cfg(unix)]
#[tokio::test]
async fn test_plugin_execution() {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn install(path: &Path, script: &str) {
        fs::write(path, script).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    // Missing binary
    let empty = TempDir::new().unwrap();
    let network = CniNetwork::new(empty.path(), CniConfList::from_json(CONFLIST).unwrap());
    let err = network.attach(&task()).await.unwrap_err();
    assert!(matches!(err, Error::NetworkAttach { .. }));
    assert!(err.to_string().contains("failed to spawn"));

    // ADD chain then DEL in reverse; the result names eth1, so the
    // address lookup for eth0 falls back to the first address
    let dir = TempDir::new().unwrap();
    let calls = dir.path().join("calls.log");
    let script = format!(
        r#"#!/bin/sh
cat > /dev/null
echo "$CNI_COMMAND $CNI_CONTAINERID $CNI_NETNS $CNI_IFNAME $(basename $0)" >> {calls}
if [ "$CNI_COMMAND" = "ADD" ]; then
  echo '{{"cniVersion":"0.4.0","interfaces":[{{"name":"eth1"}}],"ips":[{{"version":"4","interface":0,"address":"10.62.0.9/16"}}]}}'
fi
"#,
        calls = calls.display()
    );
    install(&dir.path().join("bridge"), &script);
    install(&dir.path().join("firewall"), &script);

    let network =
        CniNetwork::new(dir.path(), CniConfList::from_json(CONFLIST).unwrap()).with_ifname("eth0");

    let attachment = network.attach(&task()).await.unwrap();
    assert_eq!(attachment.container_id, "echo");
    assert_eq!(attachment.netns.to_string_lossy(), "/proc/4242/ns/net");

    let address = network.resolve_address(&attachment, &task()).await.unwrap();
    assert_eq!(address.to_string(), "10.62.0.9");

    network.detach(&task()).await.unwrap();

    let log = fs::read_to_string(&calls).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(
        lines,
        vec![
            "ADD echo /proc/4242/ns/net eth0 bridge",
            "ADD echo /proc/4242/ns/net eth0 firewall",
            "DEL echo /proc/4242/ns/net eth0 firewall",
            "DEL echo /proc/4242/ns/net eth0 bridge",
        ]
    );

    // Plugin error object
    let failing = TempDir::new().unwrap();
    install(
        &failing.path().join("bridge"),
        "#!/bin/sh\ncat > /dev/null\necho '{\"code\":11,\"msg\":\"no IP addresses available\"}'\nexit 1\n",
    );
    let conf = CniConfList::from_json(
        r#"{"cniVersion":"0.4.0","name":"n","plugins":[{"type":"bridge"}]}"#,
    )
    .unwrap();
    let network = CniNetwork::new(failing.path(), conf);

    let err = network.attach(&task()).await.unwrap_err();
    assert!(matches!(err, Error::NetworkAttach { ref service, .. } if service == "echo"));
    assert!(err.to_string().contains("no IP addresses available"));

    // Second plugin fails: the deploy rolls back the plugins already added
    let partial = TempDir::new().unwrap();
    let calls = partial.path().join("calls.log");
    install(
        &partial.path().join("bridge"),
        &format!(
            r#"#!/bin/sh
cat > /dev/null
echo "$CNI_COMMAND bridge" >> {calls}
if [ "$CNI_COMMAND" = "ADD" ]; then
  echo '{{"cniVersion":"0.4.0","ips":[{{"version":"4","address":"10.62.0.9/16"}}]}}'
fi
"#,
            calls = calls.display()
        ),
    );
    install(
        &partial.path().join("firewall"),
        &format!(
            r#"#!/bin/sh
cat > /dev/null
echo "$CNI_COMMAND firewall" >> {calls}
if [ "$CNI_COMMAND" = "ADD" ]; then
  echo '{{"code":7,"msg":"firewall failed"}}'
  exit 1
fi
"#,
            calls = calls.display()
        ),
    );

    let log = CallLog::default();
    let work = TempDir::new().unwrap();
    let deployer = Deployer::new(
        Arc::new(RecordingRuntime::new(log.clone())),
        Arc::new(CniNetwork::new(
            partial.path(),
            CniConfList::from_json(CONFLIST).unwrap(),
        )),
        DeployerConfig::default().with_working_dir(work.path()),
    );

    let err = deployer
        .deploy(&DeploymentRequest::new("echo", "alpine"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NetworkAttach { .. }));
    assert!(err.to_string().contains("firewall failed"));

    let plugin_calls = fs::read_to_string(&calls).unwrap();
    assert_eq!(
        plugin_calls.lines().collect::<Vec<_>>(),
        vec!["ADD bridge", "ADD firewall", "DEL firewall", "DEL bridge"]
    );
    let ops = operations(&log);
    assert_eq!(&ops[ops.len() - 2..], &["delete_task", "delete_container"]);
}
