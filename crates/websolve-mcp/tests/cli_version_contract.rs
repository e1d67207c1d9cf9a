#[test]
fn websolve_version_contract() {
    let bin = assert_cmd::cargo::cargo_bin!("websolve");
    let out = std::process::Command::new(bin)
        .args(["version"])
        .env_remove("WEBSOLVE_ENV_FILE")
        .output()
        .expect("run websolve version");

    assert!(out.status.success(), "websolve version failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse version json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("version"));
    assert_eq!(v["name"].as_str(), Some("websolve"));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
}

#[test]
fn websolve_version_text() {
    assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("websolve"))
        .args(["version", "--output", "text"])
        .assert()
        .success()
        .stdout(predicates::str::starts_with("websolve "));
}
