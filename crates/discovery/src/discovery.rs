use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::identity::IdentityGenerator;
use crate::link::{link, DiscoveredFile};
use crate::scanner::{FileScanner, ScannedFile};
use crate::stats::DiscoveryStats;
use discovery_parser::{DeclarationExtractor, FileRole};
use discovery_protocol::{
    AgentMetadata, DiscoveryManifest, NamespaceContext, RouteMetadata, SourceFile,
    METADATA_SCHEMA_VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Everything one discovery pass produced, sorted and validated
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub namespace: NamespaceContext,
    /// Sorted by canonical name
    pub agents: Vec<AgentMetadata>,
    /// Sorted by path, then kind
    pub routes: Vec<RouteMetadata>,
    pub stats: DiscoveryStats,
}

impl DiscoveryResult {
    pub fn manifest(&self) -> DiscoveryManifest {
        DiscoveryManifest {
            schema_version: METADATA_SCHEMA_VERSION,
            namespace: self.namespace.clone(),
            agents: self.agents.clone(),
            routes: self.routes.clone(),
        }
    }

    pub fn agent(&self, name: &str) -> Option<&AgentMetadata> {
        self.agents.iter().find(|agent| agent.name == name)
    }
}

/// Outcome of reading and extracting one file
enum FileOutcome {
    Discovered(DiscoveredFile),
    Skipped(String),
}

/// Discovers agents, evals and routes below a project root
pub struct AgentDiscovery {
    root: PathBuf,
    config: DiscoveryConfig,
    extractor: Arc<DeclarationExtractor>,
}

impl AgentDiscovery {
    pub fn new(root: impl AsRef<Path>, config: DiscoveryConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DiscoveryError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        config.validate().map_err(DiscoveryError::InvalidConfig)?;
        let extractor = Arc::new(DeclarationExtractor::new(config.extractor.clone()));
        Ok(Self {
            root,
            config,
            extractor,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Scan the root, extract every file, then validate across files.
    ///
    /// Extraction runs in bounded parallel batches; validation starts only
    /// after every batch has finished.
    pub async fn discover(&self) -> Result<DiscoveryResult> {
        let start = Instant::now();
        let scanner = FileScanner::new(&self.root, &self.config)?;
        let report = scanner.scan();

        let mut stats = DiscoveryStats::new();
        for warning in report.warnings {
            stats.add_warning(warning);
        }

        let outcomes = self.process_files_parallel(&report.files).await?;
        self.finish(outcomes, stats, start)
    }

    /// Same pass over in-memory sources; nothing is read from disk.
    pub fn discover_sources(&self, sources: Vec<(SourceFile, FileRole)>) -> Result<DiscoveryResult> {
        let start = Instant::now();
        let outcomes = sources
            .into_iter()
            .map(|(source, role)| analyze(&self.extractor, &source, role))
            .collect();
        self.finish(outcomes, DiscoveryStats::new(), start)
    }

    /// Process files in parallel with concurrency limit
    async fn process_files_parallel(&self, files: &[ScannedFile]) -> Result<Vec<FileOutcome>> {
        let mut aggregated = Vec::with_capacity(files.len());

        for batch in files.chunks(self.config.max_concurrency) {
            let mut tasks = Vec::with_capacity(batch.len());
            for file in batch {
                let file = file.clone();
                let extractor = Arc::clone(&self.extractor);
                tasks.push(tokio::task::spawn_blocking(move || {
                    read_and_analyze(&extractor, &file)
                }));
            }

            for task in tasks {
                let outcome = task
                    .await
                    .map_err(|e| DiscoveryError::TaskFailed(format!("Task panicked: {e}")))?;
                aggregated.push(outcome);
            }
        }

        Ok(aggregated)
    }

    fn finish(
        &self,
        outcomes: Vec<FileOutcome>,
        mut stats: DiscoveryStats,
        start: Instant,
    ) -> Result<DiscoveryResult> {
        let mut files = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                FileOutcome::Discovered(file) => files.push(file),
                FileOutcome::Skipped(warning) => stats.add_warning(warning),
            }
        }
        files.sort_by(|a, b| a.extracted.path.cmp(&b.extracted.path));

        for file in &files {
            stats.add_file(file.extracted.role.as_str(), file.extracted.has_syntax_errors);
            for diagnostic in &file.extracted.diagnostics {
                stats.add_warning(diagnostic.clone());
            }
        }

        let identities = IdentityGenerator::new(self.config.namespace());
        let linked = link(&files, &self.config, &identities)?;

        stats.agents = linked.agents.len();
        stats.evals = linked.agents.iter().map(|agent| agent.evals.len()).sum();
        stats.routes = linked.routes.len();
        stats.time_ms = start.elapsed().as_millis() as u64;

        log::info!(
            "Discovered {} agents, {} evals, {} routes in {} files ({} ms)",
            stats.agents,
            stats.evals,
            stats.routes,
            stats.files,
            stats.time_ms
        );

        Ok(DiscoveryResult {
            namespace: identities.namespace().clone(),
            agents: linked.agents,
            routes: linked.routes,
            stats,
        })
    }
}

fn read_and_analyze(extractor: &DeclarationExtractor, file: &ScannedFile) -> FileOutcome {
    let bytes = match std::fs::read(&file.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            let warning = format!("{}: {e}", file.relative);
            log::warn!("Failed to read {warning}");
            return FileOutcome::Skipped(warning);
        }
    };
    let Ok(text) = String::from_utf8(bytes) else {
        let warning = format!("{}: not valid UTF-8, skipped", file.relative);
        log::warn!("{warning}");
        return FileOutcome::Skipped(warning);
    };
    analyze(extractor, &SourceFile::new(file.relative.clone(), text), file.role)
}

/// Version and extract one file. Pure function of its content.
fn analyze(extractor: &DeclarationExtractor, source: &SourceFile, role: FileRole) -> FileOutcome {
    let version = IdentityGenerator::version(&source.canonical_text());
    let extracted = match extractor.extract(source, role) {
        Ok(extracted) => extracted,
        Err(e) => {
            let warning = format!("{}: {e}", source.path);
            log::warn!("{warning}");
            return FileOutcome::Skipped(warning);
        }
    };

    // A broken eval file contributes nothing rather than a partial eval set
    if role == FileRole::Eval && extracted.has_syntax_errors {
        let warning = format!("{}: eval file has syntax errors, skipped", source.path);
        log::warn!("{warning}");
        return FileOutcome::Skipped(warning);
    }

    FileOutcome::Discovered(DiscoveredFile { extracted, version })
}
