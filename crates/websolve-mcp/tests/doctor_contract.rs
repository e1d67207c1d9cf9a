fn doctor(extra_env: &[(&str, &str)]) -> (bool, serde_json::Value) {
    let bin = assert_cmd::cargo::cargo_bin!("websolve");
    let mut cmd = std::process::Command::new(bin);
    cmd.args(["doctor", "--check-stdio=false", "--timeout-ms", "1"])
        .env_remove("WEBSOLVE_ENV_FILE")
        .env_remove("SEARXNG_URL")
        .env_remove("WEBSOLVE_SEARXNG_ENDPOINTS")
        .env_remove("WEBSOLVE_PATTERNS_FILE")
        .env_remove("AUTH_USERNAME")
        .env_remove("AUTH_PASSWORD");
    for (k, v) in extra_env {
        cmd.env(k, v);
    }
    let out = cmd.output().expect("run websolve doctor");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");
    (out.status.success(), v)
}

#[test]
fn websolve_doctor_contract_json_and_bool_flags() {
    let (success, v) = doctor(&[]);
    assert!(success, "websolve doctor failed: {v}");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("doctor"));
    assert_eq!(v["name"].as_str(), Some("websolve"));
    assert_eq!(v["ok"].as_bool(), Some(true));
    assert!(!v["version"].as_str().unwrap_or("").is_empty());
    assert!(v.get("elapsed_ms").is_some());

    assert_eq!(v["configured"]["searxng"].as_bool(), Some(false));
    assert!(v["configured"]["basic_auth"].is_boolean());
    assert!(v["configured"]["proxy"].is_boolean());
    assert!(v["finder"]["results_per_query"].is_u64());
    assert!(!v["warnings"].as_array().expect("warnings").is_empty());

    let checks = v["checks"].as_array().expect("checks array");
    let handshake = checks
        .iter()
        .find(|c| c["name"].as_str() == Some("mcp_stdio_handshake"))
        .expect("mcp_stdio_handshake check");
    assert_eq!(handshake["skipped"].as_bool(), Some(true));
    assert_eq!(handshake["ok"].as_bool(), Some(true));
    assert!(handshake.get("elapsed_ms").is_some());
    assert!(handshake.get("error").is_some());
}

#[test]
fn doctor_reports_secrets_as_booleans_only() {
    let (_, v) = doctor(&[
        ("SEARXNG_URL", "http://search.internal:8080"),
        ("AUTH_USERNAME", "alice"),
        ("AUTH_PASSWORD", "hunter2-secret"),
    ]);
    let s = v.to_string();
    assert!(!s.contains("hunter2-secret"));
    assert_eq!(v["configured"]["searxng"].as_bool(), Some(true));
    assert_eq!(v["configured"]["searxng_endpoints"].as_u64(), Some(1));
    assert_eq!(v["configured"]["basic_auth"].as_bool(), Some(true));
}

#[test]
fn doctor_fails_on_bad_endpoint_and_bad_patterns_file() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = dir.path().join("patterns.json");
    std::fs::write(&patterns, "{ not json").unwrap();

    let (success, v) = doctor(&[
        ("SEARXNG_URL", "search.internal:8080"),
        ("WEBSOLVE_PATTERNS_FILE", patterns.to_str().unwrap()),
    ]);
    assert!(!success);
    assert_eq!(v["ok"].as_bool(), Some(false));
    let checks = v["checks"].as_array().expect("checks array");
    for name in ["config_valid", "patterns_compile"] {
        let c = checks
            .iter()
            .find(|c| c["name"].as_str() == Some(name))
            .unwrap_or_else(|| panic!("missing check {name}"));
        assert_eq!(c["ok"].as_bool(), Some(false), "{name}");
    }
}
