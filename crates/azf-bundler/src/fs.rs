//! File system access used by the orchestrator and plugins.
//!
//! Everything that touches the disk goes through [`FileSystem`], so tests can
//! swap in a recording or in-memory implementation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::try_join_all;
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::bundler::OutputFile;
use crate::error::{Error, Result};

/// Options for [`FileSystem::glob`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobOptions {
    /// Directory patterns are relative to.
    pub cwd: PathBuf,
    /// Return absolute paths instead of `cwd`-relative ones.
    pub absolute: bool,
    /// Patterns excluding matches (and whole directories).
    pub ignore: Vec<String>,
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn is_dir(&self, path: &Path) -> bool;

    /// Files under `options.cwd` matching `pattern`, sorted.
    async fn glob(&self, pattern: &str, options: &GlobOptions) -> Result<Vec<PathBuf>>;

    /// Remove a directory tree. A missing directory is not an error.
    async fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Write a file, creating parent directories as needed.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// The real file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

#[async_trait]
impl FileSystem for NativeFs {
    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn glob(&self, pattern: &str, options: &GlobOptions) -> Result<Vec<PathBuf>> {
        let pattern = compile(pattern)?;
        let ignore = IgnoreSet::new(&options.ignore)?;
        let cwd = options.cwd.clone();
        let absolute = options.absolute;

        let walk = tokio::task::spawn_blocking(move || walk_matches(&cwd, &pattern, &ignore, absolute));
        walk.await
            .map_err(|err| Error::fs(&options.cwd, std::io::Error::other(err)))?
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::fs(path, err)),
        }
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| Error::fs(parent, err))?;
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(|err| Error::fs(path, err))
    }
}

/// Write every output file concurrently. The first failure is returned.
pub async fn write_output_files(fs: &dyn FileSystem, files: &[OutputFile]) -> Result<()> {
    try_join_all(
        files
            .iter()
            .map(|file| fs.write_file(&file.path, file.text.as_bytes())),
    )
    .await?;
    Ok(())
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|err| Error::Glob {
        pattern: pattern.to_string(),
        message: err.msg.to_string(),
    })
}

/// Compiled ignore patterns.
///
/// A pattern ending in `/**` also matches the directory it names, so the
/// walk can skip that directory instead of visiting every file below it.
struct IgnoreSet {
    patterns: Vec<Pattern>,
}

impl IgnoreSet {
    fn new(patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            compiled.push(compile(pattern)?);
            if let Some(dir) = pattern.strip_suffix("/**") {
                compiled.push(compile(dir)?);
            }
        }
        Ok(Self { patterns: compiled })
    }

    fn is_ignored(&self, rel: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(rel, MATCH_OPTIONS))
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().starts_with(b".")
}

fn walk_matches(
    cwd: &Path,
    pattern: &Pattern,
    ignore: &IgnoreSet,
    absolute: bool,
) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();

    // Hidden entries only match a pattern segment that starts with a dot.
    let skip_hidden = !pattern.as_str().split('/').any(|seg| seg.starts_with('.'));

    let walker = WalkDir::new(cwd).follow_links(true).into_iter().filter_entry(|entry| {
        match entry.path().strip_prefix(cwd) {
            Ok(rel) if rel.as_os_str().is_empty() => true,
            Ok(_) if skip_hidden && is_hidden(entry.file_name()) => false,
            Ok(rel) => !ignore.is_ignored(rel),
            Err(_) => false,
        }
    });

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(cwd).to_path_buf();
            Error::fs(path, std::io::Error::other(err))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(cwd) else {
            continue;
        };
        if pattern.matches_path_with(rel, MATCH_OPTIONS) {
            matches.push(if absolute {
                std::path::absolute(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf())
            } else {
                rel.to_path_buf()
            });
        }
    }

    matches.sort();
    Ok(matches)
}
