//! End-to-end tests of the `cutover` binary against stub tools.

use assert_cmd::Command;
use predicates::prelude::*;

fn cutover() -> Command {
    let mut cmd = Command::cargo_bin("cutover").expect("binary built");
    cmd.env_remove("RUST_LOG").env_remove("CUTOVER_CONFIG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    cutover()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dns"))
        .stdout(predicate::str::contains("uptime"))
        .stdout(predicate::str::contains("mongo-connections"))
        .stdout(predicate::str::contains("mongo-size"))
        .stdout(predicate::str::contains("mongo-primary"))
        .stdout(predicate::str::contains("scale"));
}

#[test]
fn test_dns_requires_expectation() {
    cutover()
        .args(["dns", "shop.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--a-record"));
}

#[test]
fn test_missing_tool_names_option() {
    let empty = tempfile::tempdir().expect("tempdir");
    cutover()
        .env("PATH", empty.path())
        .args(["dns", "shop.example.com", "--a-record", "10.1.2.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Error: 'dig' not found! Add 'dig' to your PATH or specify the file using --dig option",
        ));
}

#[test]
fn test_invalid_settings_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("cutover.json");
    std::fs::write(&config, "{ nope").expect("write");

    cutover()
        .arg("--config")
        .arg(&config)
        .arg("tools")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    const DIG: &str = r#"case "$2" in
  shop.example.com)
    echo ';; ANSWER SECTION:'
    echo 'shop.example.com.  300 IN CNAME lb.new.example.net.'
    echo 'lb.new.example.net. 60 IN A 10.1.2.3'
    echo ''
    echo ';; Query time: 4 msec' ;;
  *)
    echo ';; Got answer:' ;;
esac"#;

    #[test]
    fn test_dns_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dig = script(dir.path(), "dig", DIG);

        cutover()
            .arg("--dig")
            .arg(&dig)
            .args(["dns", "shop.example.com", "old.example.com", "--cname", "lb.new.example.net"])
            .assert()
            .success()
            .stdout(predicate::str::contains("lb.new.example.net."))
            .stdout(predicate::str::contains("No answer from NS"))
            .stdout(predicate::str::contains("Propagated: 1/2 (resolver 8.8.8.8)"));
    }

    #[test]
    fn test_dns_json_uses_resolver_flag() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dig = script(dir.path(), "dig", DIG);

        let output = cutover()
            .arg("--dig")
            .arg(&dig)
            .args(["--format", "json", "dns", "shop.example.com", "--a-record", "10.9.9.9", "--dns", "1.1.1.1"])
            .output()
            .expect("run");
        assert!(output.status.success());

        let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
        assert_eq!(report["resolver"], "1.1.1.1");
        assert_eq!(report["hosts"][0]["status"], "mismatch");
        assert_eq!(report["hosts"][0]["records"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_uptime_with_static_ip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let curl = script(
            dir.path(),
            "curl",
            r"echo '* Connected to shop.example.com (10.1.2.3) port 443 (#0)' >&2
echo '*  SSL certificate verify ok.' >&2
echo '< HTTP/1.1 200 OK' >&2
echo 'healthy'",
        );

        cutover()
            .arg("--curl")
            .arg(&curl)
            .args(["uptime", "https://shop.example.com/health", "--static-ip", "10.1.2.3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("10.1.2.3"))
            .stdout(predicate::str::contains("SSL certificate verify ok."))
            .stdout(predicate::str::contains("Up: 1/1"));
    }

    #[test]
    fn test_uptime_unsupported_curl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let curl = script(dir.path(), "curl", "exit 4");

        cutover()
            .arg("--curl")
            .arg(&curl)
            .args(["uptime", "https://shop.example.com/"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--dns-servers"));
    }

    #[test]
    fn test_secret_masked_and_shown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let kubectl = script(
            dir.path(),
            "kubectl",
            r#"echo '{"kind":"Secret","data":{"MONGODB_USER":"b3JkZXJz","MONGODB_PASSWORD":"aHVudGVyMg=="}}'"#,
        );

        cutover()
            .arg("--kubectl")
            .arg(&kubectl)
            .args(["secret", "orders-db", "-n", "shop"])
            .assert()
            .success()
            .stdout(predicate::str::contains("MONGODB_USER"))
            .stdout(predicate::str::contains("hunter2").not());

        cutover()
            .arg("--kubectl")
            .arg(&kubectl)
            .args(["secret", "orders-db", "-n", "shop", "--show-values"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hunter2"));
    }

    #[test]
    fn test_timeout_flag_bounds_tools() {
        let dir = tempfile::tempdir().expect("tempdir");
        let kubectl = script(dir.path(), "kubectl", "sleep 30");

        cutover()
            .arg("--kubectl")
            .arg(&kubectl)
            .args(["--timeout", "1", "secret", "orders-db", "-n", "shop"])
            .timeout(std::time::Duration::from_secs(20))
            .assert()
            .failure()
            .stderr(predicate::str::contains("did not complete within 1000 ms"));
    }
}
