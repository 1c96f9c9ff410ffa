//! CLI and basic command tests

mod common;

use common::{create_test_change, create_test_exception, fire, ngt, setup_test_project};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    ngt()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Naming Governance Toolkit"));
}

#[test]
fn test_unknown_command_fails() {
    ngt()
        .arg("unknown-command")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_completions_bash() {
    ngt()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ngt"));
}

// ============================================================================
// Init Command Tests
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    assert!(tmp.path().join(".ngt/config.yaml").exists());
    assert!(tmp.path().join("patterns/k8s-deployment-prod.yaml").exists());
    assert!(tmp.path().join("requests/changes").is_dir());
    assert!(tmp.path().join("requests/exceptions").is_dir());
}

#[test]
fn test_init_twice_requires_force() {
    let tmp = setup_test_project();

    ngt().current_dir(tmp.path()).arg("init").assert().code(3);
    ngt()
        .current_dir(tmp.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

// ============================================================================
// Validate Command Tests
// ============================================================================

#[test]
fn test_validate_leading_hyphen_is_critical() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args([
            "validate",
            "-r",
            "k8s-deployment",
            "-e",
            "prod",
            "-f",
            "json",
            "--",
            "-prod-payment-deploy-1.0.0",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"valid\": false"))
        .stdout(predicate::str::contains("\"code\": \"INVALID_PATTERN\""))
        .stdout(predicate::str::contains("\"severity\": \"critical\""));
}

#[test]
fn test_validate_valid_name() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args([
            "validate",
            "prod-platform-payment-deploy-1.0.0",
            "-r",
            "k8s-deployment",
            "-e",
            "prod",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("k8s-deployment-prod"));
}

#[test]
fn test_validate_suggests_prefix() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args([
            "validate",
            "platform-payment-deploy-1",
            "-r",
            "k8s-deployment",
            "-e",
            "prod",
            "-f",
            "json",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("MISSING_ENVIRONMENT_PREFIX"))
        .stdout(predicate::str::contains("prod-platform-payment-deploy-1"));
}

#[test]
fn test_validate_unknown_resource_type_is_warning() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["validate", "prod-thing", "-r", "mainframe", "-e", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NO_POLICY_DEFINED"));

    ngt()
        .current_dir(tmp.path())
        .args(["validate", "prod-thing", "-r", "mainframe", "-e", "prod", "--strict"])
        .assert()
        .code(1);
}

#[test]
fn test_validate_unknown_team() {
    let tmp = setup_test_project();
    fs::write(
        tmp.path().join(".ngt/teams.yaml"),
        "teams:\n  - name: platform\n    approvers: [alice]\n",
    )
    .unwrap();

    ngt()
        .current_dir(tmp.path())
        .args([
            "validate",
            "prod-growth-payment-deploy-1",
            "-r",
            "k8s-deployment",
            "-e",
            "prod",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("UNKNOWN_TEAM"));
}

#[test]
fn test_validate_writes_audit_log() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["validate", "dev-platform-api-deploy-2", "-r", "k8s-deployment", "-e", "dev"])
        .assert()
        .success();

    let log = fs::read_to_string(tmp.path().join(".ngt/audit.jsonl")).unwrap();
    assert!(log.contains("\"action\":\"name.validate\""));
    assert!(log.contains("\"actor\":\"tester\""));
    assert!(log.contains("dev-platform-api-deploy-2"));
}

// ============================================================================
// Generate Command Tests
// ============================================================================

#[test]
fn test_generate_production_deployment() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args([
            "generate",
            "-r",
            "k8s-deployment",
            "-e",
            "prod",
            "-t",
            "platform",
            "-s",
            "payment",
            "--version",
            "v1.0.0",
            "-f",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "\"generated_name\": \"prod-platform-payment-deploy-1.0.0\"",
        ))
        .stdout(predicate::str::contains("\"pattern\": \"k8s-deployment-prod\""));
}

#[test]
fn test_generate_multiple() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args([
            "generate", "-r", "k8s-service", "-e", "dev", "-t", "platform", "-s", "api", "-n", "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("dev-platform-api-svc-1"))
        .stdout(predicate::str::contains("dev-platform-api-svc-3"));
}

#[test]
fn test_generate_missing_team_is_usage_error() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["generate", "-r", "k8s-service", "-e", "dev", "-s", "api"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("team"));
}

#[test]
fn test_generate_suffix_refused_by_database_pattern() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args([
            "generate", "-r", "database", "-e", "prod", "-t", "billing", "-s", "ledger", "--timestamp",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("suffixes"));
}

#[test]
fn test_generate_without_pattern_is_usage_error() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["generate", "-r", "mainframe", "-e", "prod", "-t", "a", "-s", "b"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("mainframe"));

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "show", "mainframe", "prod"])
        .assert()
        .code(2);
}

// ============================================================================
// Patterns Command Tests
// ============================================================================

#[test]
fn test_patterns_list() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "list", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("k8s-deployment-prod"))
        .stdout(predicate::str::contains("s3-bucket-any"));
}

#[test]
fn test_patterns_show() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "show", "k8s-deployment", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("k8s-deployment-any"))
        .stdout(predicate::str::contains("staging-"));
}

#[test]
fn test_patterns_check_project() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All pattern documents are valid"));
}

#[test]
fn test_patterns_check_reports_duplicates() {
    let tmp = setup_test_project();
    fs::write(
        tmp.path().join("patterns/another-db.yaml"),
        "id: another-db\nresource_type: database\nenvironment: prod\ntemplate: \"{environment}-{service}\"\n",
    )
    .unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "check"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Duplicate naming pattern"));

    // Every command that loads the registry refuses to run on it
    ngt()
        .current_dir(tmp.path())
        .args(["validate", "prod-a-b-db-1", "-r", "database", "-e", "prod"])
        .assert()
        .code(3);
}

#[test]
fn test_patterns_dir_from_config() {
    let tmp = setup_test_project();
    let config_path = tmp.path().join(".ngt/config.yaml");
    let config = fs::read_to_string(&config_path).unwrap();
    fs::write(
        &config_path,
        config.replace("patterns_dir: patterns", "patterns_dir: policy/naming"),
    )
    .unwrap();
    fs::create_dir_all(tmp.path().join("policy/naming")).unwrap();
    fs::write(
        tmp.path().join("policy/naming/queue-any.yaml"),
        "id: queue-any\nresource_type: queue\nenvironment: \"*\"\ntemplate: \"{environment}-{team}-{service}-q\"\n",
    )
    .unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "list", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue-any"))
        .stdout(predicate::str::contains("k8s-deployment-prod").not());

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue-any.yaml"));
}

#[test]
fn test_patterns_check_malformed_template() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.yaml");
    fs::write(
        &path,
        "id: broken\nresource_type: queue\nenvironment: dev\ntemplate: \"{environment}-{colour}\"\n",
    )
    .unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["patterns", "check"])
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("broken.yaml"));
}

// ============================================================================
// Claim Command Tests
// ============================================================================

#[test]
fn test_claim_and_conflict() {
    let tmp = setup_test_project();
    let name = "prod-platform-payment-deploy-1.0.0";
    let claim = |owner: &str| {
        ngt()
            .current_dir(tmp.path())
            .args(["claim", name, "-r", "k8s-deployment", "-e", "prod", "--owner", owner])
            .assert()
    };

    claim("alice")
        .success()
        .stdout(predicate::str::contains("Claimed"));
    claim("alice")
        .success()
        .stdout(predicate::str::contains("already owned"));
    claim("bob")
        .code(1)
        .stdout(predicate::str::contains("already claimed by alice"));

    ngt()
        .current_dir(tmp.path())
        .args(["validate", name, "-r", "k8s-deployment", "-e", "prod", "--owner", "bob"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("DUPLICATE_NAME"));
    ngt()
        .current_dir(tmp.path())
        .args(["validate", name, "-r", "k8s-deployment", "-e", "prod", "--owner", "alice"])
        .assert()
        .success();
}

#[test]
fn test_claim_invalid_name() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["claim", "Prod_Payment", "-r", "k8s-deployment", "-e", "prod"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("not a valid name"));
}

#[test]
fn test_claim_without_pattern() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["claim", "prod-legacy-thing", "-r", "mainframe", "-e", "prod"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no naming pattern"));

    let audit = fs::read_to_string(tmp.path().join(".ngt/audit.jsonl")).unwrap_or_default();
    assert!(!audit.contains("name.claim"));
}

#[test]
fn test_claim_outside_project() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["claim", "dev-a-b-svc", "-r", "k8s-service", "-e", "dev"])
        .assert()
        .code(3);
}

// ============================================================================
// Request Command Tests
// ============================================================================

#[test]
fn test_change_new_and_list() {
    let tmp = setup_test_project();
    let id = create_test_change(&tmp, "Rename payment deployments", &["--risk", "low"]);
    assert!(id.starts_with("CHG-"));
    assert!(id.ends_with("-001"));
    assert!(tmp
        .path()
        .join(format!("requests/changes/{}.yaml", id))
        .exists());

    ngt()
        .current_dir(tmp.path())
        .args(["change", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("draft"));
}

#[test]
fn test_change_requires_title() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["change", "new"])
        .assert()
        .code(2);
}

#[test]
fn test_change_outside_project() {
    let tmp = TempDir::new().unwrap();

    ngt()
        .current_dir(tmp.path())
        .args(["change", "new", "--title", "x"])
        .assert()
        .code(3);
}

#[test]
fn test_exception_temporary_requires_duration() {
    let tmp = setup_test_project();

    ngt()
        .current_dir(tmp.path())
        .args(["exception", "new", "--title", "Legacy bucket"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("require a duration"));
}

#[test]
fn test_exception_links_existing_change() {
    let tmp = setup_test_project();
    let change = create_test_change(&tmp, "Bucket migration", &[]);

    let exc = create_test_exception(
        &tmp,
        "Legacy bucket during migration",
        &["--type", "standard", "--link", &change, "--waive", "MISSING_ENVIRONMENT_PREFIX"],
    );

    ngt()
        .current_dir(tmp.path())
        .args(["exception", "show", &exc])
        .assert()
        .success()
        .stdout(predicate::str::contains(&change))
        .stdout(predicate::str::contains("MISSING_ENVIRONMENT_PREFIX"));

    ngt()
        .current_dir(tmp.path())
        .args(["exception", "new", "--title", "x", "--type", "permanent", "--link", "CHG-2020-999"])
        .assert()
        .code(2);
}

#[test]
fn test_fire_unknown_event_is_usage_error() {
    let tmp = setup_test_project();
    let id = create_test_change(&tmp, "Rename", &[]);

    fire(&tmp, "change", &id, "teleport")
        .code(2)
        .stderr(predicate::str::contains("not one of"));
}

#[test]
fn test_fire_missing_request() {
    let tmp = setup_test_project();

    fire(&tmp, "change", "CHG-2026-042", "submit").code(2);
    fire(&tmp, "change", "not-an-id", "submit").code(2);
}

#[test]
fn test_change_new_json_output() {
    let tmp = setup_test_project();

    let output = ngt()
        .current_dir(tmp.path())
        .args(["change", "new", "--title", "Rename", "--risk", "high", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = doc["id"].as_str().unwrap();
    assert!(id.starts_with("CHG-") && id.ends_with("-001"));
    assert_eq!(doc["state"], "draft");
    assert_eq!(doc["title"], "Rename");
    assert!(tmp.path().join(format!("requests/changes/{}.yaml", id)).exists());
}

#[test]
fn test_exception_new_yaml_output() {
    let tmp = setup_test_project();

    let output = ngt()
        .current_dir(tmp.path())
        .args(["exception", "new", "--title", "Keep name", "--type", "permanent", "-f", "yaml"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: serde_json::Value = serde_yml::from_str(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert!(doc["id"].as_str().unwrap().starts_with("EXC-"));
    assert_eq!(doc["state"], "requested");
}

#[test]
fn test_concurrent_fire_commits_once() {
    let tmp = setup_test_project();
    let id = create_test_change(&tmp, "Rename", &[]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dir = tmp.path().to_path_buf();
            let id = id.clone();
            std::thread::spawn(move || {
                ngt()
                    .current_dir(dir)
                    .args(["change", "fire", &id, "submit", "--expect", "draft"])
                    .output()
                    .unwrap()
            })
        })
        .collect();
    let outputs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let committed = outputs.iter().filter(|o| o.status.success()).count();
    assert_eq!(committed, 1);
    for refused in outputs.iter().filter(|o| !o.status.success()) {
        assert_eq!(refused.status.code(), Some(1));
    }

    let output = ngt()
        .current_dir(tmp.path())
        .args(["change", "show", &id, "-f", "json"])
        .output()
        .unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["state"], "submitted");
    assert_eq!(doc["history"].as_array().unwrap().len(), 1);
}

#[test]
fn test_concurrent_creates_get_distinct_ids() {
    let tmp = setup_test_project();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let dir = tmp.path().to_path_buf();
            std::thread::spawn(move || {
                ngt()
                    .current_dir(dir)
                    .args(["change", "new", "--title", &format!("Rename {}", i), "-f", "json"])
                    .output()
                    .unwrap()
            })
        })
        .collect();

    let mut ids: Vec<String> = handles
        .into_iter()
        .map(|h| {
            let output = h.join().unwrap();
            assert!(output.status.success(), "{:?}", output);
            let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
            doc["id"].as_str().unwrap().to_string()
        })
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6);

    let stored = fs::read_dir(tmp.path().join("requests/changes"))
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|x| x == "yaml")
        })
        .count();
    assert_eq!(stored, 6);
}
