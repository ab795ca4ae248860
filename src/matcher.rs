//! Expand include/exclude glob patterns into the list of paths to upload.
//!
//! Patterns support `*`, `?`, character classes, brace alternation
//! (`*.{js,css}`) and recursive `**`. A single `*` never crosses a `/`.
//! Exclusions compare resolved path strings exactly: `./dist/a.js` and
//! `dist/a.js` are different paths as far as the filter is concerned.

use globset::{GlobBuilder, GlobMatcher};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::s3::error::{Result, S3UploadError};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Include pattern plus the exclusions applied to its matches
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    include: String,
    excludes: Vec<String>,
}

impl Matcher {
    pub fn new(include: impl Into<String>, excludes: Vec<String>) -> Self {
        Self {
            include: include.into(),
            excludes,
        }
    }

    /// Resolve to an ordered, deduplicated path list
    pub fn resolve(&self) -> Result<Vec<String>> {
        resolve(&self.include, &self.excludes)
    }
}

/// Expand `include`, then drop every path produced by any exclude pattern.
///
/// Order follows the include expansion. An empty result is not an error.
pub fn resolve(include: &str, excludes: &[String]) -> Result<Vec<String>> {
    let matches = expand(include)?;

    let mut excluded = HashSet::new();
    for pattern in excludes {
        excluded.extend(expand(pattern)?);
    }

    let mut seen = HashSet::new();
    let included: Vec<String> = matches
        .into_iter()
        .filter(|m| !excluded.contains(m))
        .filter(|m| seen.insert(m.clone()))
        .collect();

    debug!(
        "Pattern '{}' resolved to {} path(s), {} excluded",
        include,
        included.len(),
        excluded.len()
    );

    Ok(included)
}

/// Expand a single pattern against the filesystem, in walk order
pub fn expand(pattern: &str) -> Result<Vec<String>> {
    let matcher = compile(pattern)?;

    let Some(meta_at) = pattern.find(GLOB_META) else {
        // Plain path, matches itself if it exists
        return Ok(if Path::new(pattern).exists() {
            vec![pattern.to_string()]
        } else {
            Vec::new()
        });
    };

    let root = match pattern[..meta_at].rfind('/') {
        Some(0) => "/",
        Some(i) => &pattern[..i],
        None => "",
    };
    let walk_root = if root.is_empty() { "." } else { root };
    if !Path::new(walk_root).is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(walk_root).min_depth(1).sort_by_file_name();
    if let Some(depth) = fixed_depth(pattern[root.len()..].trim_start_matches('/')) {
        walker = walker.max_depth(depth);
    }

    let mut matches = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| S3UploadError::Traversal {
            pattern: pattern.to_string(),
            path: source
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| walk_root.to_string()),
            source,
        })?;

        let path = entry.path().to_string_lossy();
        let candidate = if root.is_empty() {
            path.strip_prefix("./").unwrap_or(&*path)
        } else {
            &*path
        };

        if matcher.is_match(candidate) {
            matches.push(candidate.to_string());
        }
    }

    Ok(matches)
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| S3UploadError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Walk depth needed for a pattern tail without `**` or alternation
fn fixed_depth(rest: &str) -> Option<usize> {
    if rest.contains("**") || rest.contains('{') {
        return None;
    }
    Some(rest.split('/').filter(|s| !s.is_empty()).count().max(1))
}
