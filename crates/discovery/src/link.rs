//! Cross-file validation, run once every file has been extracted.
//!
//! Binds evals to agents, parents to subagents and routes to agents, and
//! enforces project-wide uniqueness. Any violation fails the whole pass.

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::identity::IdentityGenerator;
use discovery_parser::{AgentRef, Declaration, DeclarationKind, ExtractedFile, SourceLanguage};
use discovery_protocol::{
    canonical_name, extract_path_params, join_route_path, route_type_name, AgentMetadata,
    CollisionDetector, EvalMetadata, ImportKind, Origin, RouteKind, RouteMetadata,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One successfully extracted file and its content version
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub extracted: ExtractedFile,
    pub version: String,
}

#[derive(Debug, Default)]
pub(crate) struct Linked {
    pub agents: Vec<AgentMetadata>,
    pub routes: Vec<RouteMetadata>,
}

struct AgentEntry {
    meta: AgentMetadata,
    parent: Option<AgentRef>,
}

/// Lookup tables over the discovered agents
struct AgentIndex {
    by_name: HashMap<String, usize>,
    by_canonical: HashMap<String, usize>,
    by_identity: HashMap<String, usize>,
    by_file: HashMap<String, usize>,
    known_files: BTreeSet<String>,
}

impl AgentIndex {
    fn new(agents: &[AgentEntry], files: &[DiscoveredFile]) -> Self {
        let mut index = Self {
            by_name: HashMap::new(),
            by_canonical: HashMap::new(),
            by_identity: HashMap::new(),
            by_file: HashMap::new(),
            known_files: files.iter().map(|f| f.extracted.path.clone()).collect(),
        };
        for (idx, entry) in agents.iter().enumerate() {
            index.by_name.insert(entry.meta.name.clone(), idx);
            index
                .by_canonical
                .insert(entry.meta.canonical_name.clone(), idx);
            index
                .by_identity
                .insert(entry.meta.identity.identity_id.clone(), idx);
            index.by_file.insert(entry.meta.filename.clone(), idx);
        }
        index
    }

    fn resolve(&self, reference: &AgentRef, from_file: &str) -> Option<usize> {
        match reference {
            AgentRef::Name(name) => self
                .by_name
                .get(name)
                .or_else(|| self.by_identity.get(name))
                .or_else(|| self.by_canonical.get(&canonical_name(name)))
                .copied(),
            AgentRef::Module(specifier) => {
                let path = resolve_module(from_file, specifier, &self.known_files)?;
                self.by_file.get(&path).copied()
            }
        }
    }

    /// The only agent declared in `file`'s directory
    fn in_same_dir(&self, agents: &[AgentEntry], file: &str) -> Option<usize> {
        let dir = parent_dir(file);
        let mut found = agents
            .iter()
            .enumerate()
            .filter(|(_, entry)| parent_dir(&entry.meta.filename) == dir)
            .map(|(idx, _)| idx);
        let first = found.next()?;
        found.next().is_none().then_some(first)
    }

    /// First agent file among the relative default imports of a file
    fn imported(&self, file: &ExtractedFile) -> Option<usize> {
        file.imports
            .iter()
            .filter(|import| import.kind == ImportKind::Default && import.is_relative())
            .find_map(|import| self.resolve(&AgentRef::Module(import.source.clone()), &file.path))
    }
}

pub(crate) fn link(
    files: &[DiscoveredFile],
    config: &DiscoveryConfig,
    identities: &IdentityGenerator,
) -> Result<Linked> {
    let mut agents = collect_agents(files, identities)?;
    let index = AgentIndex::new(&agents, files);

    attach_evals(files, identities, &index, &mut agents)?;
    link_parents(&index, &mut agents)?;
    let routes = collect_routes(files, config, identities, &index, &agents)?;

    let mut agents: Vec<AgentMetadata> = agents.into_iter().map(|entry| entry.meta).collect();
    agents.sort_by(|a, b| a.canonical_name.cmp(&b.canonical_name));
    Ok(Linked { agents, routes })
}

fn require_fields(declaration: &Declaration, label: &str) -> Result<()> {
    if declaration.file.is_empty() {
        return Err(DiscoveryError::missing_field(
            "filename",
            format!("{label} '{}'", declaration.name),
            "<unknown>",
        ));
    }
    if declaration.name.trim().is_empty() {
        return Err(DiscoveryError::missing_field(
            "name",
            format!("{label} at line {}", declaration.line),
            &declaration.file,
        ));
    }
    Ok(())
}

fn collect_agents(
    files: &[DiscoveredFile],
    identities: &IdentityGenerator,
) -> Result<Vec<AgentEntry>> {
    let mut detector = CollisionDetector::new();
    let mut agents = Vec::new();

    for file in files {
        for declaration in file.extracted.of_kind(DeclarationKind::Agent) {
            require_fields(declaration, "agent")?;
            let canonical_name =
                detector.register(Origin::new(&declaration.name, &declaration.file))?;
            let identity = identities.agent(&declaration.name, &declaration.file, &file.version);

            agents.push(AgentEntry {
                meta: AgentMetadata {
                    filename: declaration.file.clone(),
                    name: declaration.name.clone(),
                    canonical_name,
                    identity,
                    description: declaration.description.clone(),
                    input_schema: declaration.schema.input.clone(),
                    output_schema: declaration.schema.output.clone(),
                    streaming: declaration.schema.stream,
                    parent: None,
                    subagents: Vec::new(),
                    evals: Vec::new(),
                },
                parent: declaration.parent.clone(),
            });
        }
    }
    Ok(agents)
}

fn attach_evals(
    files: &[DiscoveredFile],
    identities: &IdentityGenerator,
    index: &AgentIndex,
    agents: &mut [AgentEntry],
) -> Result<()> {
    let mut detectors: HashMap<usize, CollisionDetector> = HashMap::new();

    for file in files {
        for declaration in file.extracted.of_kind(DeclarationKind::Eval) {
            require_fields(declaration, "eval")?;
            let owner = match &declaration.owner {
                Some(reference) => index.resolve(reference, &declaration.file),
                None => index
                    .in_same_dir(agents, &declaration.file)
                    .or_else(|| index.imported(&file.extracted)),
            };
            let Some(owner) = owner else {
                return Err(DiscoveryError::missing_field(
                    "agent",
                    format!("eval '{}'", declaration.name),
                    &declaration.file,
                ));
            };

            detectors
                .entry(owner)
                .or_default()
                .register(Origin::new(&declaration.name, &declaration.file))?;

            let agent = &mut agents[owner].meta;
            let identity =
                identities.eval(&agent.name, &declaration.name, &declaration.file, &file.version);
            agent.evals.push(EvalMetadata {
                filename: declaration.file.clone(),
                name: declaration.name.clone(),
                identity,
                description: declaration.description.clone(),
                agent: agent.name.clone(),
            });
        }
    }

    for entry in agents.iter_mut() {
        entry.meta.evals.sort_by(|a, b| a.name.cmp(&b.name));
    }
    Ok(())
}

fn link_parents(index: &AgentIndex, agents: &mut [AgentEntry]) -> Result<()> {
    let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut children: Vec<(usize, usize)> = Vec::new();

    for (idx, entry) in agents.iter().enumerate() {
        let Some(reference) = &entry.parent else {
            continue;
        };
        match index.resolve(reference, &entry.meta.filename) {
            Some(parent) if parent != idx => children.push((parent, idx)),
            _ => {
                let label = match reference {
                    AgentRef::Name(name) => name.clone(),
                    AgentRef::Module(specifier) => specifier.clone(),
                };
                missing
                    .entry(label)
                    .or_default()
                    .push(entry.meta.filename.clone());
            }
        }
    }

    if !missing.is_empty() {
        for (parent, files) in &missing {
            log::error!("parent agent '{parent}' not found, referenced from {}", files.join(", "));
        }
        if let Some((parent, files)) = missing.into_iter().next() {
            return Err(DiscoveryError::MissingParent { parent, files });
        }
    }

    for (parent, child) in children {
        let child_name = agents[child].meta.name.clone();
        agents[child].meta.parent = Some(agents[parent].meta.name.clone());
        agents[parent].meta.subagents.push(child_name);
    }
    for entry in agents.iter_mut() {
        entry.meta.subagents.sort();
    }
    Ok(())
}

fn collect_routes(
    files: &[DiscoveredFile],
    config: &DiscoveryConfig,
    identities: &IdentityGenerator,
    index: &AgentIndex,
    agents: &[AgentEntry],
) -> Result<Vec<RouteMetadata>> {
    let mut seen: HashMap<(RouteKind, String), String> = HashMap::new();
    let mut type_names = CollisionDetector::new();
    let mut routes = Vec::new();

    for file in files {
        for declaration in file.extracted.of_kind(DeclarationKind::Route) {
            require_fields(declaration, "route")?;
            let Some(details) = &declaration.route else {
                continue;
            };
            let kind = details.kind;
            let path = route_path(config, &declaration.file, &declaration.name);
            let key = kind.registry_key(&path);

            if let Some(first) = seen.get(&(kind, path.clone())) {
                return Err(DiscoveryError::DuplicateRoute {
                    key,
                    first: first.clone(),
                    second: declaration.file.clone(),
                });
            }
            seen.insert((kind, path.clone()), declaration.file.clone());
            type_names.register_key(
                route_type_name(kind, &path),
                Origin::new(&key, &declaration.file),
            )?;

            let agent = details.agent.as_ref().and_then(|reference| {
                let found = index.resolve(reference, &declaration.file);
                if found.is_none() {
                    log::debug!("{key}: validator receiver {reference:?} is not a discovered agent");
                }
                found.map(|idx| &agents[idx].meta)
            });

            routes.push(RouteMetadata {
                filename: declaration.file.clone(),
                id: identities.route_id(kind, &path),
                path_params: extract_path_params(&path),
                streaming: kind.is_streaming()
                    || declaration.schema.stream
                    || agent.is_some_and(|agent| agent.streaming),
                path,
                kind,
                version: file.version.clone(),
                validated: details.validated,
                input_schema: declaration.schema.input.clone(),
                output_schema: declaration.schema.output.clone(),
                agent: agent.map(|agent| agent.name.clone()),
                imports: file.extracted.imports.clone(),
                locals: file.extracted.locals.clone(),
            });
        }
    }

    routes.sort_by(|a, b| a.path.cmp(&b.path).then(a.kind.cmp(&b.kind)));
    Ok(routes)
}

/// Full dispatch path of a route literal declared in `file`.
///
/// Mount prefix, then the file's location below the route root (file stem
/// dropped for `index` and `route`), then the literal.
pub fn route_path(config: &DiscoveryConfig, file: &str, literal: &str) -> String {
    let root = config.route_root.trim_matches('/');
    let relative = if root.is_empty() {
        file
    } else {
        file.strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(file)
    };
    let (dir, name) = relative.rsplit_once('/').unwrap_or(("", relative));
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    let stem = if matches!(stem, "index" | "route") { "" } else { stem };
    join_route_path(&[config.route_mount_prefix.as_str(), dir, stem, literal])
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Map a relative import specifier onto a discovered file, probing extensions.
///
/// Only paths already in `known` can be returned; the imported module itself
/// is never read.
pub fn resolve_module(from_file: &str, specifier: &str, known: &BTreeSet<String>) -> Option<String> {
    let mut segments: Vec<&str> = parent_dir(from_file)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    let base = segments.join("/");

    if known.contains(&base) {
        return Some(base);
    }
    // `import x from './agent.js'` names the compiled output of `agent.ts`
    let stem = [".js", ".mjs", ".cjs", ".jsx"]
        .iter()
        .find_map(|ext| base.strip_suffix(ext))
        .unwrap_or(&base);

    let mut candidates = Vec::new();
    for ext in SourceLanguage::EXTENSIONS {
        candidates.push(format!("{stem}.{ext}"));
    }
    for file in ["index", "agent"] {
        for ext in SourceLanguage::EXTENSIONS {
            candidates.push(format!("{base}/{file}.{ext}"));
        }
    }
    candidates.into_iter().find(|candidate| known.contains(candidate))
}
