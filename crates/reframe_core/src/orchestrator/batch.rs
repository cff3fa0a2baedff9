//! Batch jobs built from file patterns.
//!
//! Every source matched by `source_pattern` is paired with every target
//! matched by `target_pattern`, sources outermost. Without any matching
//! source each target gets a step of its own. Step `n` writes to
//! `output_pattern` with `{index}` replaced by `n`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use serde_json::json;

use crate::jobs::{JobError, JobResult, StepArgs};

const INDEX_PLACEHOLDER: &str = "{index}";

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub source_pattern: Option<String>,
    pub target_pattern: String,
    pub output_pattern: String,
    /// Options copied into every step before paths are filled in.
    pub args: StepArgs,
}

impl BatchRequest {
    pub fn new(target_pattern: impl Into<String>, output_pattern: impl Into<String>) -> Self {
        Self {
            source_pattern: None,
            target_pattern: target_pattern.into(),
            output_pattern: output_pattern.into(),
            args: StepArgs::new(),
        }
    }

    pub fn with_source_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.source_pattern = Some(pattern.into());
        self
    }

    pub fn with_args(mut self, args: StepArgs) -> Self {
        self.args = args;
        self
    }

    /// Step snapshots in run order. Empty when no target matches.
    pub fn expand(&self) -> JobResult<Vec<StepArgs>> {
        let sources = match &self.source_pattern {
            Some(pattern) => resolve_file_pattern(pattern)?,
            None => Vec::new(),
        };
        let targets = resolve_file_pattern(&self.target_pattern)?;

        let pairs: Vec<(Option<&PathBuf>, &PathBuf)> = if sources.is_empty() {
            targets.iter().map(|target| (None, target)).collect()
        } else {
            sources
                .iter()
                .flat_map(|source| targets.iter().map(move |target| (Some(source), target)))
                .collect()
        };

        let steps = pairs
            .into_iter()
            .enumerate()
            .map(|(index, (source, target))| {
                let mut args = self.args.clone();
                if let Some(source) = source {
                    args.insert("source_paths", json!([source.to_string_lossy()]));
                }
                args.insert("target_path", target.to_string_lossy().to_string());
                args.insert("output_path", self.output_path(index));
                args
            })
            .collect();
        Ok(steps)
    }

    fn output_path(&self, index: usize) -> String {
        self.output_pattern
            .replace(INDEX_PLACEHOLDER, &index.to_string())
    }
}

/// Sorted files matching a glob pattern such as `/media/*.mp4`.
///
/// `*` and `?` stay within one path component; `**` crosses directories.
pub fn resolve_file_pattern(pattern: &str) -> JobResult<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| JobError::invalid_pattern(pattern, e))?
        .compile_matcher();

    let (base, depth) = split_pattern(pattern);
    let mut paths = Vec::new();
    collect_matches(&base, depth, &matcher, &mut paths);
    paths.sort();
    Ok(paths)
}

/// Literal leading directory of `pattern` and how many components below
/// it can match (`None` when `**` allows any depth).
fn split_pattern(pattern: &str) -> (PathBuf, Option<usize>) {
    let components: Vec<Component<'_>> = Path::new(pattern).components().collect();
    let literal = components
        .iter()
        .take_while(|c| !c.as_os_str().to_string_lossy().contains(['*', '?', '[', '{']))
        .count();

    let base: PathBuf = components[..literal].iter().collect();
    let depth = (!pattern.contains("**")).then(|| components.len() - literal);
    (base, depth)
}

fn collect_matches(
    dir: &Path,
    depth: Option<usize>,
    matcher: &GlobMatcher,
    paths: &mut Vec<PathBuf>,
) {
    if depth == Some(0) {
        if dir.is_file() && matcher.is_match(dir) {
            paths.push(dir.to_path_buf());
        }
        return;
    }

    let read_from = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let entries = match fs::read_dir(read_from) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Skipping {}: {}", read_from.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = dir.join(entry.file_name());
        if path.is_dir() {
            collect_matches(&path, depth.map(|d| d - 1), matcher, paths);
        } else if path.is_file() && matcher.is_match(&path) {
            paths.push(path);
        }
    }
}
