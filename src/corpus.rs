//! Corpus directory scanner.
//!
//! Walks the corpus root recursively, keeps files whose extension is in
//! `[corpus] extensions` (case-insensitive) and drops anything matched by
//! the exclude globs. The built-in excludes always skip `.git`, `target`
//! and `node_modules`. Results are sorted by document id.
//!
//! Entries the walk cannot read (a dangling symlink, a directory without
//! read permission) are logged and reported in [`CorpusScan::skipped`];
//! they never abort the scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::{Error, Result};
use crate::extract::extension_of;
use crate::models::SkippedFile;

/// A file discovered under the corpus root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    pub path: PathBuf,
    /// Path relative to the root with `/` separators; the document identity.
    pub document_id: String,
    pub last_modified: DateTime<Utc>,
}

/// Files found by [`scan_corpus`] plus the entries it had to pass over.
#[derive(Debug, Default)]
pub struct CorpusScan {
    pub files: Vec<CorpusFile>,
    pub skipped: Vec<SkippedFile>,
}

/// Walk `root` for corpus files.
///
/// # Errors
///
/// [`Error::Io`] when `root` is not a directory, [`Error::Configuration`]
/// for an invalid exclude glob.
pub fn scan_corpus(root: &Path, config: &CorpusConfig) -> Result<CorpusScan> {
    if !root.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("corpus root does not exist: {}", root.display()),
        )));
    }

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let extensions: HashSet<String> = config
        .extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect();

    let mut scan = CorpusScan::default();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root);
                let document_id = relative_id(root, path);
                if exclude_set.is_match(&document_id) {
                    continue;
                }
                warn!(path = %path.display(), error = %err, "skipping unreadable corpus entry");
                scan.skipped.push(SkippedFile {
                    path: document_id,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let document_id = relative_id(root, path);

        if exclude_set.is_match(&document_id) {
            continue;
        }
        if !extensions.contains(&extension_of(path)) {
            continue;
        }

        let last_modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);

        scan.files.push(CorpusFile {
            path: path.to_path_buf(),
            document_id,
            last_modified,
        });
    }

    scan.files.sort_by(|a, b| a.document_id.cmp(&b.document_id));
    scan.skipped.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(scan)
}

/// Path relative to `root` with `/` separators.
fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            Error::Configuration(format!("invalid corpus exclude glob '{}': {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Configuration(format!("invalid corpus exclude globs: {}", e)))
}
