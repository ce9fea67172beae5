//! Tests for secret validation and bind-mount assembly.

use magikfaas::{append_secret_mounts, build_mounts, validate_secrets, Error};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn secrets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Secret Validation
// =============================================================================

#[test]
fn test_existing_secrets_pass() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("api-key"), "k").unwrap();
    fs::write(dir.path().join("db-password"), "p").unwrap();

    assert!(validate_secrets(dir.path(), &secrets(&["api-key", "db-password"])).is_ok());
}

#[test]
fn test_directory_secret_passes() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("tls")).unwrap();

    assert!(validate_secrets(dir.path(), &secrets(&["tls"])).is_ok());
}

#[test]
fn test_first_missing_secret_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("api-key"), "k").unwrap();

    let err = validate_secrets(dir.path(), &secrets(&["api-key", "first", "second"])).unwrap_err();

    assert!(matches!(err, Error::MissingSecret(ref name) if name == "first"));
    assert_eq!(err.to_string(), "unable to find secret: first");
}

#[test]
fn test_missing_root_reports_secret() {
    let err = validate_secrets(Path::new("/nonexistent/secrets"), &secrets(&["api-key"]))
        .unwrap_err();
    assert!(matches!(err, Error::MissingSecret(_)));
}

#[test]
fn test_traversal_names_rejected() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("inner")).unwrap();
    fs::write(dir.path().join("outside"), "x").unwrap();
    let root = dir.path().join("inner");

    for name in ["../outside", "..", ".", "", "a/b"] {
        let err = validate_secrets(&root, &secrets(&[name])).unwrap_err();
        assert!(
            matches!(err, Error::InvalidSecretName { .. }),
            "expected {:?} to be rejected, got {:?}",
            name,
            err
        );
    }
}

// =============================================================================
// Mount Assembly
// =============================================================================

#[test]
fn test_network_mounts_order() {
    let mounts = build_mounts(Path::new("/var/lib/faasd"));

    assert_eq!(mounts.len(), 2);
    assert_eq!(mounts[0].destination, "/etc/resolv.conf");
    assert_eq!(mounts[0].source, "/var/lib/faasd/resolv.conf");
    assert_eq!(mounts[1].destination, "/etc/hosts");
    assert_eq!(mounts[1].source, "/var/lib/faasd/hosts");
}

#[test]
fn test_two_secrets_give_four_mounts() {
    let mut mounts = build_mounts(Path::new("/var/lib/faasd"));
    append_secret_mounts(
        &mut mounts,
        Path::new("/var/lib/faasd-provider/secrets"),
        &secrets(&["s1", "s2"]),
    );

    let destinations: Vec<&str> = mounts.iter().map(|m| m.destination.as_str()).collect();
    assert_eq!(
        destinations,
        vec![
            "/etc/resolv.conf",
            "/etc/hosts",
            "/var/openfaas/secrets/s1",
            "/var/openfaas/secrets/s2",
        ]
    );
    assert_eq!(mounts[2].source, "/var/lib/faasd-provider/secrets/s1");
    assert_eq!(mounts[3].source, "/var/lib/faasd-provider/secrets/s2");
}

#[test]
fn test_all_mounts_read_only_binds() {
    let mut mounts = build_mounts(Path::new("/work"));
    append_secret_mounts(&mut mounts, Path::new("/secrets"), &secrets(&["s1"]));

    for mount in &mounts {
        assert_eq!(mount.mount_type, "bind");
        assert_eq!(mount.options, vec!["rbind".to_string(), "ro".to_string()]);
    }
}

#[test]
fn test_duplicate_secrets_mounted_twice() {
    let mut mounts = Vec::new();
    append_secret_mounts(&mut mounts, Path::new("/secrets"), &secrets(&["s1", "s1"]));
    assert_eq!(mounts.len(), 2);
}
