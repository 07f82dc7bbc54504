use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use discovery_parser::{FileRole, SourceLanguage};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// A file the scanner matched to a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Root-relative path with `/` separators
    pub relative: String,
    pub role: FileRole,
}

/// Files found by one scan, plus what was skipped along the way
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub files: Vec<ScannedFile>,
    pub warnings: Vec<String>,
}

/// Scanner for finding declaration files in a project
pub struct FileScanner {
    root: PathBuf,
    eval: GlobSet,
    agent: GlobSet,
    route: GlobSet,
    ignored_dirs: Vec<String>,
    max_file_size_bytes: u64,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>, config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            eval: build_globset(&config.eval_globs)?,
            agent: build_globset(&config.agent_globs)?,
            route: build_globset(&config.route_globs)?,
            ignored_dirs: config
                .ignored_dirs
                .iter()
                .map(|dir| dir.trim_matches('/').to_string())
                .filter(|dir| !dir.is_empty())
                .collect(),
            max_file_size_bytes: config.max_file_size_bytes,
        })
    }

    /// Role of a root-relative path; eval globs win over agent globs, agent over route.
    pub fn classify(&self, relative: &str) -> Option<FileRole> {
        if self.eval.is_match(relative) {
            Some(FileRole::Eval)
        } else if self.agent.is_match(relative) {
            Some(FileRole::Agent)
        } else if self.route.is_match(relative) {
            Some(FileRole::Route)
        } else {
            None
        }
    }

    /// Scan directory for declaration files (.gitignore aware), sorted by relative path
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();

        let root = self.root.clone();
        let ignored_dirs = self.ignored_dirs.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false);
        builder.filter_entry(move |entry| {
            !FileScanner::is_ignored_scope(entry.path(), &root, &ignored_dirs)
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    let Some(relative) = self.relative_path(path) else {
                        continue;
                    };
                    let Some(role) = self.classify(&relative) else {
                        continue;
                    };
                    if SourceLanguage::from_path(path) == SourceLanguage::Unknown {
                        log::debug!("Skipping {relative}: not a script file");
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.max_file_size_bytes {
                            let message = format!(
                                "Skipping large file {relative} ({} bytes > {})",
                                meta.len(),
                                self.max_file_size_bytes
                            );
                            log::warn!("{message}");
                            report.warnings.push(message);
                            continue;
                        }
                    }

                    report.files.push(ScannedFile {
                        path: path.to_path_buf(),
                        relative,
                        role,
                    });
                }
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    report.warnings.push(format!("Failed to read entry: {e}"));
                }
            }
        }

        report.files.sort_by(|a, b| a.relative.cmp(&b.relative));
        log::info!("Found {} declaration files", report.files.len());
        report
    }

    fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => parts.push(name.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(parts.join("/"))
    }

    fn is_ignored_scope(path: &Path, root: &Path, ignored_dirs: &[String]) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        let mut prefix = String::new();
        for component in relative.components() {
            if let Component::Normal(name) = component {
                let name = name.to_string_lossy();
                let lowered = name.to_lowercase();
                if IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered) {
                    return true;
                }
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(&name);
                if ignored_dirs.iter().any(|dir| dir == &prefix) {
                    return true;
                }
            }
        }
        false
    }
}

fn build_globset(globs: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        let glob = Glob::new(glob)
            .map_err(|err| DiscoveryError::invalid_config(format!("invalid glob '{glob}': {err}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| DiscoveryError::invalid_config(format!("invalid glob set: {err}")))
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".yarn",
    ".npm",
    // caches / builds
    ".cache",
    "node_modules",
    ".next",
    ".turbo",
    ".parcel-cache",
    ".output",
    ".wrangler",
    ".vercel",
    ".svelte-kit",
    "build",
    "dist",
    "coverage",
    "target",
    // vendor
    "vendor",
    "third_party",
    "third-party",
];
