//! Integrity checks over a loaded pack and its index.

use std::fmt;

use tracing::debug;
use walkdir::WalkDir;

use crate::core::index::Index;
use crate::core::meta::{validate_client_platforms, validate_side, MetaRecord, META_EXTENSION};
use crate::core::pack::Pack;

const CONTENT_FOLDERS: [&str; 5] = ["mods", "resourcepacks", "shaderpacks", "datapacks", "plugins"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "ERROR: {}", self.message),
            Severity::Warning => write!(f, "WARNING: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub files_checked: usize,
    pub meta_files: usize,
    pub valid_meta_files: usize,
}

impl ValidationReport {
    fn error(&mut self, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Error,
            message: message.into(),
        });
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn errors(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warnings(&self) -> usize {
        self.issues.len() - self.errors()
    }

    pub fn has_errors(&self) -> bool {
        self.errors() > 0
    }
}

/// Run every check. Problems are reported, never fixed.
pub fn validate_pack(pack: &Pack, index: &Index) -> ValidationReport {
    let mut report = ValidationReport {
        files_checked: index.len(),
        ..Default::default()
    };

    check_pack(pack, &mut report);
    check_entries(index, &mut report);
    check_records(index, &mut report);
    check_untracked(pack, index, &mut report);
    check_index_hash(pack, index, &mut report);

    debug!(
        "Validation finished: {} errors, {} warnings",
        report.errors(),
        report.warnings()
    );
    report
}

fn check_pack(pack: &Pack, report: &mut ValidationReport) {
    if pack.name.trim().is_empty() {
        report.error("Pack name is empty");
    }
    if pack.versions.is_empty() {
        report.warning("No game or loader versions specified");
    }
    match pack.minecraft_version() {
        None => report.warning("Minecraft version is not set"),
        Some(version) if version.trim().is_empty() => report.warning("Minecraft version is empty"),
        Some(_) => {}
    }
}

fn check_entries(index: &Index, report: &mut ValidationReport) {
    if index.is_empty() {
        report.warning("Index contains no files");
        return;
    }

    for (rel, entry) in index.entries() {
        if !index.resolve_path(rel).exists() {
            if !entry.preserve {
                report.error(format!("File referenced in index but missing: {rel}"));
            }
            continue;
        }

        match index.verify_entry(rel) {
            Ok(true) => {}
            Ok(false) => report.error(format!(
                "Hash mismatch for {rel}; run refresh to update the index"
            )),
            Err(err) => report.error(format!("Cannot hash {rel}: {err}")),
        }

        if entry.meta_file != rel.ends_with(META_EXTENSION) {
            let marked = if entry.meta_file { "metadata" } else { "a plain file" };
            report.error(format!(
                "{rel} is marked as {marked} but its extension says otherwise"
            ));
        }
    }
}

fn check_records(index: &Index, report: &mut ValidationReport) {
    for (rel, record) in index.meta_records() {
        report.meta_files += 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                report.error(format!("Invalid metadata file {rel}: {err}"));
                continue;
            }
        };

        let problems = record_problems(&record);
        if problems.is_empty() {
            report.valid_meta_files += 1;
        }
        for problem in problems {
            report.error(format!("Metadata file {rel} {problem}"));
        }
    }
}

fn record_problems(record: &MetaRecord) -> Vec<String> {
    let mut problems = Vec::new();
    if record.name.trim().is_empty() {
        problems.push("has an empty name".to_string());
    }
    if record.file_name.trim().is_empty() {
        problems.push("has an empty filename".to_string());
    }
    if record.download.url.trim().is_empty() && record.download.mode() == "url" {
        problems.push("has an empty download URL".to_string());
    }
    if record.download.hash_format.is_empty() || record.download.hash.is_empty() {
        problems.push("has missing hash information".to_string());
    }
    if !record.side.is_empty() {
        if let Err(err) = validate_side(&record.side) {
            problems.push(format!("has an invalid side '{}': {err}", record.side));
        }
    }
    if let Err(err) = validate_client_platforms(&record.download.disabled_client_platforms) {
        problems.push(format!("has invalid disabled client platforms: {err}"));
    }
    problems
}

fn check_untracked(pack: &Pack, index: &Index, report: &mut ValidationReport) {
    let mut folders: Vec<&str> = CONTENT_FOLDERS.to_vec();
    if !folders.contains(&pack.datapack_folder()) {
        folders.push(pack.datapack_folder());
    }

    for folder in folders {
        let dir = index.resolve_path(folder);
        if !dir.is_dir() {
            continue;
        }
        for item in WalkDir::new(&dir).sort_by_file_name() {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    report.warning(format!("Error scanning {folder}: {err}"));
                    continue;
                }
            };
            if !item.file_type().is_file() {
                continue;
            }
            let Ok(rel) = index.relative_path(item.path()) else {
                continue;
            };
            if rel.ends_with(META_EXTENSION) && index.get(&rel).is_none() {
                report.warning(format!("Untracked metadata file: {rel}"));
            }
        }
    }
}

fn check_index_hash(pack: &Pack, index: &Index, report: &mut ValidationReport) {
    if pack.index.hash.is_empty() {
        report.warning("No index hash recorded in the pack file");
        return;
    }
    match index
        .hashes()
        .hash_file(pack.index.hash_format, &pack.index_path())
    {
        Ok(actual) if actual.eq_ignore_ascii_case(&pack.index.hash) => {}
        Ok(actual) => report.error(format!(
            "Index hash mismatch: pack file records {} but the index hashes to {}; run refresh",
            pack.index.hash, actual
        )),
        Err(err) => report.error(format!("Cannot hash the index: {err}")),
    }
}
