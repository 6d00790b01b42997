//! Schema linting - static analysis of schema document files.
//!
//! Checks schema files for:
//! - JSON syntax errors (E001)
//! - Documents the loader rejects (E002)
//! - References to type names outside the default type set (W001)
//! - Discriminants that can never resolve (W002)

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value as Json;

use crate::error::LoadError;
use crate::loader::{load_json, parse_document, pointer};
use crate::plugin::ANY_TYPE;
use crate::types::is_builtin_type;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON Pointer to the issue (e.g., "/properties/id/type")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    fn from_files(path: &Path, results: Vec<FileResult>, strict: bool) -> Self {
        let failed = results.iter().filter(|r| r.fails(strict)).count();
        Self {
            path: path.to_path_buf(),
            files_checked: results.len(),
            passed: results.len() - failed,
            failed,
            errors: results.iter().map(|r| r.count(Severity::Error)).sum(),
            warnings: results.iter().map(|r| r.count(Severity::Warning)).sum(),
            results,
        }
    }
}

impl FileResult {
    fn from_diagnostics(file: PathBuf, diagnostics: Vec<Diagnostic>) -> Self {
        let status = if diagnostics.iter().any(|d| d.severity == Severity::Error) {
            FileStatus::Error
        } else if diagnostics.is_empty() {
            FileStatus::Ok
        } else {
            FileStatus::Warning
        };
        Self {
            file,
            status,
            diagnostics,
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Warnings only fail a file in strict mode.
    fn fails(&self, strict: bool) -> bool {
        match self.status {
            FileStatus::Ok => false,
            FileStatus::Warning => strict,
            FileStatus::Error => true,
        }
    }
}

/// Lint a schema document, or every `.json` document under a directory.
///
/// In `strict` mode a file with warnings counts as failed.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let results = schema_documents(path)
        .iter()
        .map(|file| lint_file(file, path))
        .collect();
    LintResult::from_files(path, results, strict)
}

/// Lint a single schema document.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();

    let doc = match load_json(file) {
        Ok(doc) => doc,
        Err(e) => {
            let syntax = Diagnostic {
                severity: Severity::Error,
                code: "E001".to_string(),
                file: file.to_path_buf(),
                path: "/".to_string(),
                message: format!("syntax error: {}", e),
            };
            return FileResult::from_diagnostics(display, vec![syntax]);
        }
    };

    if let Err(LoadError::InvalidDocument { path, message }) = parse_document(&doc) {
        let invalid = Diagnostic {
            severity: Severity::Error,
            code: "E002".to_string(),
            file: file.to_path_buf(),
            path,
            message,
        };
        return FileResult::from_diagnostics(display, vec![invalid]);
    }

    let mut diagnostics = Vec::new();
    check_node(&doc, file, "", &mut diagnostics);
    FileResult::from_diagnostics(display, diagnostics)
}

fn warn(file: &Path, code: &str, path: String, message: String, diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.push(Diagnostic {
        severity: Severity::Warning,
        code: code.to_string(),
        file: file.to_path_buf(),
        path,
        message,
    });
}

fn check_type_name(name: &str, file: &Path, path: String, diagnostics: &mut Vec<Diagnostic>) {
    if !is_builtin_type(name) && name != ANY_TYPE {
        warn(
            file,
            "W001",
            path,
            format!("type \"{}\" must be provided by a plugin", name),
            diagnostics,
        );
    }
}

/// Walk a document that already parsed successfully.
fn check_node(node: &Json, file: &Path, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(name) = node.get("type").and_then(Json::as_str) {
        check_type_name(name, file, format!("{}/type", path), diagnostics);
    }

    if let Some(Json::Object(props)) = node.get("properties") {
        for (key, sub) in props {
            check_node(sub, file, &pointer(&format!("{}/properties", path), key), diagnostics);
        }
    }

    if let Some(items) = node.get("items") {
        check_node(items, file, &format!("{}/items", path), diagnostics);
    }

    if let Some(discriminant) = node.get("discriminant") {
        let disc_path = format!("{}/discriminant", path);
        let mapping = discriminant.get("mapping").and_then(Json::as_object);
        let default = discriminant.get("default");

        if mapping.map_or(true, |m| m.is_empty()) && default.is_none() {
            warn(
                file,
                "W002",
                disc_path.clone(),
                "discriminant has no variants and no default; every value is rejected".to_string(),
                diagnostics,
            );
        }
        for (key, variant) in mapping.into_iter().flatten() {
            check_node(variant, file, &pointer(&format!("{}/mapping", disc_path), key), diagnostics);
        }
        if let Some(default) = default {
            check_node(default, file, &format!("{}/default", disc_path), diagnostics);
        }
    }

    if let Some(Json::Array(rules)) = node.get("$when") {
        for (index, rule) in rules.iter().enumerate() {
            for branch in ["then", "else"] {
                let Some(action) = rule.get(branch) else {
                    continue;
                };
                let action_path = format!("{}/$when/{}/{}", path, index, branch);
                if let Some(name) = action.get("type").and_then(Json::as_str) {
                    check_type_name(name, file, format!("{}/type", action_path), diagnostics);
                }
                if let Some(schema) = action.get("schema") {
                    check_node(schema, file, &format!("{}/schema", action_path), diagnostics);
                }
            }
        }
    }
}

fn is_schema_document(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

/// Schema documents at `root`, sorted. Unreadable directories are skipped.
fn schema_documents(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return if is_schema_document(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|entry| entry.path()) {
            if path.is_dir() {
                pending.push(path);
            } else if is_schema_document(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn lint_str(content: &str) -> FileResult {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        lint_file(file.path(), file.path().parent().unwrap())
    }

    #[test]
    fn lint_valid_schema() {
        let result = lint_str(
            r#"{
                "type": "object",
                "properties": {
                    "id": { "type": "string" },
                    "meta": { "type": "any", "optional": true }
                }
            }"#,
        );
        assert_eq!(result.status, FileStatus::Ok);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn lint_invalid_json_syntax() {
        let result = lint_str("{ not valid json }");
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "E001");
    }

    #[test]
    fn lint_invalid_document() {
        let result = lint_str(r#"{"type": "object", "properties": {"n": {"type": "number", "constraints": [{"between": 1}]}}}"#);
        assert_eq!(result.status, FileStatus::Error);
        assert_eq!(result.diagnostics[0].code, "E002");
        assert_eq!(result.diagnostics[0].path, "/properties/n/constraints/0/between");
    }

    #[test]
    fn lint_plugin_type_warning() {
        let result = lint_str(
            r#"{"type": "object", "properties": {"id": {"type": "objectId"}},
                "$when": [{"field": "id", "is": {"exists": true}, "then": {"type": "slug"}}]}"#,
        );
        assert_eq!(result.status, FileStatus::Warning);
        let paths: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.code == "W001")
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(paths, vec!["/properties/id/type", "/$when/0/then/type"]);
    }

    #[test]
    fn lint_dead_discriminant() {
        let result = lint_str(r#"{"type": "object", "discriminant": {"property": "kind"}}"#);
        assert_eq!(result.status, FileStatus::Warning);
        assert_eq!(result.diagnostics[0].code, "W002");
        assert_eq!(result.diagnostics[0].path, "/discriminant");
    }

    #[test]
    fn lint_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("valid.json"), r#"{"type": "object"}"#).unwrap();
        std::fs::write(dir.path().join("invalid.json"), "{ not json }").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let result = lint(dir.path(), false);
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert!(!result.is_ok());
    }

    #[test]
    fn lint_nested_directories_sorted() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("b/deeper")).unwrap();
        std::fs::write(dir.path().join("b/deeper/z.json"), r#"{"type": "string"}"#).unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"type": "slug"}"#).unwrap();

        let result = lint(dir.path(), false);
        let files: Vec<_> = result.results.iter().map(|r| r.file.clone()).collect();
        assert_eq!(files, vec![PathBuf::from("a.json"), PathBuf::from("b/deeper/z.json")]);
        assert_eq!(result.warnings, 1);
        assert!(result.is_ok());
    }

    #[test]
    fn lint_strict_mode() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.json");
        std::fs::write(&file_path, r#"{"type": "objectId"}"#).unwrap();

        let result = lint(&file_path, false);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 0);

        let result = lint(&file_path, true);
        assert_eq!(result.passed, 0);
        assert_eq!(result.failed, 1);
    }
}
