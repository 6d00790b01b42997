//! CLI integration tests for the shape-guard binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("shape-guard"))
}

// Helper to create a temp file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const ACCOUNT_SCHEMA: &str = r#"{
    "type": "object",
    "properties": {
        "role": { "type": "string", "constraints": [{ "oneOf": ["admin", "user"] }] },
        "age": { "type": "number", "constraints": [{ "min": 18 }, { "integer": true }] },
        "born": { "type": "date", "transform": ["stringToDate"], "optional": true },
        "email": {
            "type": "string",
            "optional": true,
            "$when": [{ "field": "role", "is": { "eq": "admin" }, "then": "required" }]
        }
    }
}"#;

mod validate_command {
    use super::*;

    #[test]
    fn validate_valid_payload() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(&dir, "payload.json", r#"{"role": "user", "age": 30}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn validate_conditional_requirement() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(&dir, "payload.json", r#"{"role": "admin", "age": 30}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("email: Missing required property"));
    }

    #[test]
    fn validate_reports_every_constraint() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(&dir, "payload.json", r#"{"role": "root", "age": 12.5}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("role: Must be one of: admin, user"))
            .stderr(predicate::str::contains("age: Must be greater than or equal to 18"))
            .stderr(predicate::str::contains("age: Must be an integer"));
    }

    #[test]
    fn validate_json_output_valid_includes_data() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(
            &dir,
            "payload.json",
            r#"{"role": "user", "age": 30, "born": "1990-05-01"}"#,
        );

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""valid":true"#))
            .stdout(predicate::str::contains("1990-05-01T00:00:00.000Z"));
    }

    #[test]
    fn validate_json_output_invalid() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(&dir, "payload.json", r#"{"role": "user", "age": "old"}"#);

        let output = cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .code(1)
            .get_output()
            .stdout
            .clone();

        let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(result["valid"], false);
        assert_eq!(result["errors"][0]["path"], "age");
        assert_eq!(result["errors"][0]["expected"], "Number");
        assert_eq!(result["errors"][0]["received"], "String");
        assert!(result.get("data").is_none());
    }

    #[test]
    fn validate_transform_failure() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(
            &dir,
            "payload.json",
            r#"{"role": "user", "age": 30, "born": "someday"}"#,
        );

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                r#"born: Cannot convert "someday" to Date"#,
            ));
    }
}

mod unknown_properties {
    use super::*;

    #[test]
    fn strip_unknown_removes_extras() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(
            &dir,
            "payload.json",
            r#"{"role": "user", "age": 30, "nickname": "x"}"#,
        );

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
                "--strip-unknown",
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("nickname").not());
    }

    #[test]
    fn error_unknown_rejects_extras() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);
        let payload = write_temp_file(
            &dir,
            "payload.json",
            r#"{"role": "user", "age": 30, "nickname": "x"}"#,
        );

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
                "--error-unknown",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "nickname: Unexpected property found: nickname",
            ));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn schema_not_found() {
        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(&dir, "payload.json", "{}");

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                "/nonexistent/schema.json",
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("file not found"));
    }

    #[test]
    fn payload_not_found() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", ACCOUNT_SCHEMA);

        cmd()
            .args([
                "validate",
                "/nonexistent/payload.json",
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(3);
    }

    #[test]
    fn invalid_json_schema() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", "{ not json }");
        let payload = write_temp_file(&dir, "payload.json", "{}");

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }

    #[test]
    fn invalid_document_names_pointer() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{"type": "object", "properties": {"n": {"type": "number", "transform": ["toUpper"]}}}"#,
        );
        let payload = write_temp_file(&dir, "payload.json", "{}");

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("/properties/n/transform/0"));
    }

    #[test]
    fn json_output_error_is_json() {
        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(&dir, "payload.json", "{}");

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                "/nonexistent/schema.json",
                "--json",
            ])
            .assert()
            .code(3)
            .stdout(predicate::str::contains(r#""valid":false"#));
    }
}

mod lint_command {
    use super::*;

    #[test]
    fn lint_clean_directory() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "account.json", ACCOUNT_SCHEMA);

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 files checked, all passed"));
    }

    #[test]
    fn lint_reports_errors() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "broken.json", "{ nope }");

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E001"));
    }

    #[test]
    fn lint_strict_fails_on_warnings() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "id.json", r#"{"type": "objectId"}"#);

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .success();

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--strict"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("W001"));
    }

    #[test]
    fn lint_json_format() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "account.json", ACCOUNT_SCHEMA);

        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""files_checked": 1"#));
    }

    #[test]
    fn lint_missing_path() {
        cmd()
            .args(["lint", "/nonexistent/dir"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("path not found"));
    }
}

mod required_args {
    use super::*;

    #[test]
    fn missing_schema_flag() {
        cmd()
            .args(["validate", "payload.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--schema"));
    }

    #[test]
    fn missing_payload_for_validate() {
        cmd()
            .args(["validate", "--schema", "schema.json"])
            .assert()
            .failure();
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("validate"))
            .stdout(predicate::str::contains("lint"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shape-guard"));
    }
}

/// Remote schema loading, served by a local mock server
mod remote {
    use super::*;

    #[test]
    fn validate_with_remote_schema() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/account.json")
            .with_header("content-type", "application/json")
            .with_body(ACCOUNT_SCHEMA)
            .create();

        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(&dir, "payload.json", r#"{"role": "user", "age": 30}"#);

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                &format!("{}/account.json", server.url()),
            ])
            .assert()
            .success();
    }

    #[test]
    fn remote_404_is_io_error() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/missing.json").with_status(404).create();

        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(&dir, "payload.json", "{}");

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                &format!("{}/missing.json", server.url()),
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("failed to fetch"));
    }
}
