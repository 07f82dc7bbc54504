//! Renders the route registry (`routes.ts`).
//!
//! Schema text is copied verbatim from the declaring file, so any imported
//! names it mentions are carried over with their specifiers rebased onto the
//! output directory. File-local declarations it mentions are re-declared in
//! a scope of their own around the schema.

use crate::agents::{agent_specifier, AgentNames};
use crate::error::{RegistryError, Result};
use crate::module_path::rebase_specifier;
use crate::route_tree::{RouteLeaf, RouteTree, NO_SCHEMA};
use crate::ts;
use discovery_protocol::{
    parse_path_params, AgentMetadata, ImportBinding, ImportKind, LocalDeclaration, RouteKind,
    RouteMetadata, SchemaExpression,
};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

/// String literals are matched first so their contents are never read as names.
const SCHEMA_TOKEN_PATTERN: &str =
    r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|`(?:[^`\\]|\\.)*`|(\.\s*)?([A-Za-z_$][A-Za-z0-9_$]*)"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRoutes {
    pub text: String,
    pub warnings: Vec<String>,
}

/// Schema text as it will appear in the generated file.
#[derive(Debug)]
struct PlacedSchema {
    text: String,
    /// Declarations from the route's file the text depends on, in source order
    hoisted: Vec<String>,
    /// Imported names the text or the hoisted declarations mention
    imports: BTreeSet<String>,
}

/// A route ready to render: schemas that survived placement, plus its agent.
struct PreparedRoute<'a> {
    route: RouteMetadata,
    input: Option<PlacedSchema>,
    output: Option<PlacedSchema>,
    agent: Option<(&'a AgentMetadata, AgentNames)>,
    leaf: RouteLeaf,
}

/// Imports carried into the generated file, keyed by local name.
#[derive(Default)]
struct CarriedImports {
    by_local: BTreeMap<String, (ImportBinding, String)>,
}

impl CarriedImports {
    fn add(&mut self, binding: ImportBinding, file: &str) -> Result<()> {
        if let Some((existing, first)) = self.by_local.get(&binding.local) {
            if existing.kind != binding.kind || existing.source != binding.source {
                return Err(RegistryError::ImportConflict {
                    local: binding.local,
                    first: format!("'{}' ({first})", existing.source),
                    second: format!("'{}' ({file})", binding.source),
                });
            }
            return Ok(());
        }
        self.by_local
            .insert(binding.local.clone(), (binding, file.to_string()));
        Ok(())
    }

    fn render(&self, out: &mut String) {
        for (binding, _) in self.by_local.values() {
            let keyword = if binding.type_only { "import type" } else { "import" };
            let source = ts::string_literal(&binding.source);
            let local = &binding.local;
            let _ = match &binding.kind {
                ImportKind::Default => writeln!(out, "{keyword} {local} from {source};"),
                ImportKind::Namespace => writeln!(out, "{keyword} * as {local} from {source};"),
                ImportKind::Named(name) if name == local => {
                    writeln!(out, "{keyword} {{ {local} }} from {source};")
                }
                ImportKind::Named(name) => {
                    writeln!(out, "{keyword} {{ {name} as {local} }} from {source};")
                }
            };
        }
    }
}

/// Names referenced by schema text, in order of appearance. Member names,
/// string contents and object literal keys are not references.
fn referenced_names<'t>(pattern: &Regex, text: &'t str) -> Vec<&'t str> {
    pattern
        .captures_iter(text)
        .filter(|caps| caps.get(1).is_none())
        .filter_map(|caps| caps.get(2))
        .filter(|found| !is_property_key(text, found.start(), found.end()))
        .map(|found| found.as_str())
        .collect()
}

/// `{ key: ...` or `, key: ...`
fn is_property_key(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end();
    (before.ends_with('{') || before.ends_with(',')) && text[end..].trim_start().starts_with(':')
}

/// Work out what the generated file needs for a schema to mean what it
/// meant in its own file. `None`, with a warning, when some name it depends
/// on cannot be carried over.
fn place_schema(
    pattern: &Regex,
    schema: Option<&SchemaExpression>,
    route: &RouteMetadata,
    label: &str,
    warnings: &mut Vec<String>,
) -> Option<PlacedSchema> {
    let schema = schema?;
    let text = schema.resolved.trim();
    let imported = |name: &str| route.imports.iter().any(|binding| binding.local == name);
    let local = |name: &str| route.locals.iter().find(|local| local.name == name);

    let mut stuck = (ts::is_identifier(text) && !imported(text) && local(text).is_none())
        .then_some(text);
    let mut hoisted: BTreeSet<&str> = BTreeSet::new();
    let mut imports = BTreeSet::new();
    let mut pending = referenced_names(pattern, text);
    while stuck.is_none() {
        let Some(name) = pending.pop() else {
            break;
        };
        if imported(name) {
            imports.insert(name.to_string());
            continue;
        }
        match local(name) {
            Some(LocalDeclaration {
                statement: Some(statement),
                ..
            }) => {
                if hoisted.insert(name) {
                    pending.extend(referenced_names(pattern, statement));
                }
            }
            Some(_) => stuck = Some(name),
            // Globals and names bound inside the expression itself
            None => {}
        }
    }

    if let Some(name) = stuck {
        let warning = format!(
            "{}: {label} schema of {} depends on '{name}', which is not resolvable here, using {NO_SCHEMA}",
            route.filename,
            route.registry_key()
        );
        log::warn!("{warning}");
        warnings.push(warning);
        return None;
    }

    Some(PlacedSchema {
        text: text.to_string(),
        hoisted: route
            .locals
            .iter()
            .filter(|local| hoisted.contains(local.name.as_str()))
            .filter_map(|local| local.statement.clone())
            .collect(),
        imports,
    })
}

fn params_type(path: &str) -> String {
    let params = parse_path_params(path);
    if params.is_empty() {
        return "Record<string, never>".to_string();
    }
    let fields: Vec<String> = params
        .iter()
        .map(|param| {
            let ty = if param.repeated { "string[]" } else { "string" };
            let optional = if param.optional { "?" } else { "" };
            format!("{}{optional}: {ty}", ts::property_key(&param.name))
        })
        .collect();
    format!("{{ {} }}", fields.join("; "))
}

/// Render `routes.ts` for routes already sorted by path, then kind.
pub fn render_routes(
    routes: &[RouteMetadata],
    agents: &[AgentMetadata],
    runtime_module: &str,
    output_dir: &str,
) -> Result<RenderedRoutes> {
    let pattern = Regex::new(SCHEMA_TOKEN_PATTERN)?;
    let agents_by_name: HashMap<&str, &AgentMetadata> = agents
        .iter()
        .map(|agent| (agent.name.as_str(), agent))
        .collect();

    let mut warnings = Vec::new();
    let mut carried = CarriedImports::default();
    let mut agent_imports: BTreeMap<String, String> = BTreeMap::new();
    let mut prepared = Vec::with_capacity(routes.len());

    for route in routes {
        let mut route = route.clone();
        let input = place_schema(&pattern, route.input_schema.as_ref(), &route, "input", &mut warnings);
        let output =
            place_schema(&pattern, route.output_schema.as_ref(), &route, "output", &mut warnings);
        if input.is_none() {
            route.input_schema = None;
        }
        if output.is_none() {
            route.output_schema = None;
        }

        for placed in [&input, &output].into_iter().flatten() {
            for name in &placed.imports {
                if let Some(binding) = route.imports.iter().find(|binding| &binding.local == name) {
                    let mut binding = binding.clone();
                    binding.source = rebase_specifier(&route.filename, &binding.source, output_dir);
                    carried.add(binding, &route.filename)?;
                }
            }
        }

        let agent = route
            .agent
            .as_deref()
            .and_then(|name| agents_by_name.get(name).copied())
            .map(|agent| (agent, AgentNames::of(agent)));
        if let Some((agent, names)) = &agent {
            agent_imports.insert(names.import.clone(), agent_specifier(agent, output_dir));
        }

        let leaf = RouteLeaf::from_route(&route, agent.as_ref().map(|(agent, _)| *agent));
        prepared.push(PreparedRoute {
            route,
            input,
            output,
            agent,
            leaf,
        });
    }

    for (local, specifier) in &agent_imports {
        if let Some((binding, file)) = carried.by_local.get(local) {
            return Err(RegistryError::ImportConflict {
                local: local.clone(),
                first: format!("'{}' ({file})", binding.source),
                second: format!("agent module '{specifier}'"),
            });
        }
    }

    let tree = RouteTree::build(prepared.iter().map(|p| p.leaf.clone()))?;

    let mut out = String::from(ts::GENERATED_HEADER);
    let _ = writeln!(
        &mut out,
        "\nimport type {{ InferInput, InferOutput, InferSchema }} from {};",
        ts::string_literal(runtime_module)
    );
    if !carried.by_local.is_empty() || !agent_imports.is_empty() {
        out.push('\n');
    }
    carried.render(&mut out);
    for (local, specifier) in &agent_imports {
        let _ = writeln!(&mut out, "import type {local} from {};", ts::string_literal(specifier));
    }

    out.push_str("\n/** Stands in for the input or output of a route that has no schema. */\n");
    let _ = writeln!(&mut out, "export type {NO_SCHEMA} = {{ readonly __noSchema: true }};");

    for route in &prepared {
        render_route_types(&mut out, route);
    }

    for (name, kinds) in [
        ("RouteRegistry", &RouteKind::ALL[..5]),
        ("WebSocketRouteRegistry", &[RouteKind::WebSocket][..]),
        ("EventStreamRouteRegistry", &[RouteKind::EventStream][..]),
        ("StreamRouteRegistry", &[RouteKind::Stream][..]),
    ] {
        let _ = writeln!(&mut out, "\nexport interface {name} {{");
        for route in prepared.iter().filter(|p| kinds.contains(&p.leaf.kind)) {
            let leaf = &route.leaf;
            let _ = writeln!(
                &mut out,
                "  {}: {{ input: {}; output: {}; stream: {}; params: {} }};",
                ts::string_literal(&route.route.registry_key()),
                leaf.input_type(),
                leaf.output_type(),
                leaf.stream,
                leaf.params_type()
            );
        }
        out.push_str("}\n");
    }

    let runtime_tree = serde_json::to_string_pretty(&tree.runtime_mirror())?;
    let _ = writeln!(
        &mut out,
        "\nexport type RouteTree = {};\n\nexport const routeTree = {runtime_tree} as const;",
        tree.type_mirror().render(0)
    );

    Ok(RenderedRoutes {
        text: out,
        warnings,
    })
}

fn render_route_types(out: &mut String, prepared: &PreparedRoute<'_>) {
    let route = &prepared.route;
    let leaf = &prepared.leaf;
    let base = &leaf.type_name;

    let _ = writeln!(
        out,
        "\n// {} ({})",
        route.kind.registry_key(&route.path),
        route.filename
    );
    for (suffix, placed, alias, infer) in [
        ("Input", &prepared.input, &leaf.input, "InferInput"),
        ("Output", &prepared.output, &leaf.output, "InferOutput"),
    ] {
        match (placed, &prepared.agent) {
            (Some(placed), _) => {
                render_schema_const(out, &format!("{base}{suffix}Schema"), placed);
                let _ = writeln!(
                    out,
                    "export type {base}{suffix} = InferSchema<typeof {base}{suffix}Schema>;"
                );
            }
            // The leaf only names an alias when the agent has a schema for this side
            (None, Some((_, names))) if alias.is_some() => {
                let _ = writeln!(
                    out,
                    "export type {base}{suffix} = {infer}<typeof {}>;",
                    names.import
                );
            }
            _ => {}
        }
    }
    let _ = writeln!(out, "export type {} = {};", leaf.params_type(), params_type(&route.path));
}

fn render_schema_const(out: &mut String, name: &str, schema: &PlacedSchema) {
    if schema.hoisted.is_empty() {
        let _ = writeln!(out, "export const {name} = {};", schema.text);
        return;
    }
    let _ = writeln!(out, "export const {name} = (() => {{");
    for statement in &schema.hoisted {
        let _ = writeln!(out, "{}", indented(statement));
    }
    let _ = writeln!(out, "{}", indented(&format!("return {};", schema.text)));
    out.push_str("})();\n");
}

fn indented(text: &str) -> String {
    text.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("  {line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_protocol::Identity;
    use pretty_assertions::assert_eq;

    fn route(kind: RouteKind, path: &str) -> RouteMetadata {
        RouteMetadata {
            filename: "src/api/users.ts".into(),
            id: format!("routeid_{path}"),
            path: path.into(),
            kind,
            version: "0".repeat(64),
            validated: false,
            input_schema: None,
            output_schema: None,
            agent: None,
            path_params: discovery_protocol::extract_path_params(path),
            streaming: kind.is_streaming(),
            imports: vec![],
            locals: vec![],
        }
    }

    fn local(name: &str, statement: Option<&str>) -> LocalDeclaration {
        LocalDeclaration::new(name, statement.map(str::to_string))
    }

    fn agent(name: &str, input: Option<&str>, output: Option<&str>) -> AgentMetadata {
        AgentMetadata {
            filename: format!("src/agent/{name}/agent.ts"),
            name: name.into(),
            canonical_name: name.into(),
            identity: Identity {
                version: "0".repeat(64),
                identity_id: format!("agentid_{name}"),
                content_scoped_id: format!("agent_{name}"),
            },
            description: None,
            input_schema: input.map(SchemaExpression::inline),
            output_schema: output.map(SchemaExpression::inline),
            streaming: true,
            parent: None,
            subagents: vec![],
            evals: vec![],
        }
    }

    fn import(local: &str, kind: ImportKind, source: &str) -> ImportBinding {
        ImportBinding {
            local: local.into(),
            kind,
            source: source.into(),
            type_only: false,
        }
    }

    fn render(routes: &[RouteMetadata], agents: &[AgentMetadata]) -> RenderedRoutes {
        render_routes(routes, agents, "@agents/runtime", "src/generated").unwrap()
    }

    #[test]
    fn validated_route_without_schema_uses_marker() {
        let mut jobs = route(RouteKind::Post, "/api/jobs");
        jobs.validated = true;

        let out = render(&[jobs], &[]).text;

        assert!(out.contains("export type NoSchema = { readonly __noSchema: true };"));
        assert!(out.contains(
            "'POST /api/jobs': { input: NoSchema; output: NoSchema; stream: false; params: PostApiJobsParams };"
        ));
        assert!(!out.contains("PostApiJobsInput"));
        assert!(!out.contains("PostApiJobsOutput"));
        assert!(out.contains("input: NoSchema;"));
    }

    #[test]
    fn unresolvable_bare_schema_falls_back_to_marker() {
        let mut jobs = route(RouteKind::Post, "/api/jobs");
        jobs.validated = true;
        jobs.input_schema = Some(SchemaExpression::inline("JobSchema"));

        let rendered = render(&[jobs], &[]);

        assert_eq!(rendered.warnings.len(), 1);
        assert!(rendered.warnings[0].contains("'JobSchema'"));
        assert!(!rendered.text.contains("JobSchema"));
        assert!(!rendered.text.contains("PostApiJobsInput"));
    }

    #[test]
    fn resolved_schema_emits_types_and_carries_imports() {
        let mut create = route(RouteKind::Post, "/api/users/:id");
        create.validated = true;
        create.input_schema = Some(SchemaExpression {
            raw: "CreateUser".into(),
            resolved: "z.object({ name: z.string(), role: Role })".into(),
        });
        create.imports = vec![
            import("z", ImportKind::Named("z".into()), "zod"),
            import("Role", ImportKind::Default, "../schemas/role"),
            import("unused", ImportKind::Namespace, "./unused"),
        ];

        let out = render(&[create], &[]).text;

        assert!(out.contains("import Role from '../schemas/role';\nimport { z } from 'zod';\n"));
        assert!(!out.contains("unused"));
        assert!(out.contains(
            "export const PostApiUsersIdInputSchema = z.object({ name: z.string(), role: Role });"
        ));
        assert!(out.contains(
            "export type PostApiUsersIdInput = InferSchema<typeof PostApiUsersIdInputSchema>;"
        ));
        assert!(!out.contains("PostApiUsersIdOutput ="));
        assert!(out.contains("export type PostApiUsersIdParams = { id: string };"));
        assert!(out.contains("input: PostApiUsersIdInput; output: NoSchema;"));
    }

    #[test]
    fn member_access_strings_and_keys_are_not_names() {
        let pattern = Regex::new(SCHEMA_TOKEN_PATTERN).unwrap();
        assert_eq!(
            referenced_names(
                &pattern,
                "z.object({ id: z . string(), tag: 'Role', role, kind: flag ? A : B })"
            ),
            vec!["z", "z", "role", "flag", "A", "B"]
        );
    }

    #[test]
    fn nested_file_locals_are_declared_around_the_schema() {
        let mut create = route(RouteKind::Post, "/api/users");
        create.validated = true;
        create.input_schema = Some(SchemaExpression {
            raw: "User".into(),
            resolved: "s.object({ name: s.string(), address: Address })".into(),
        });
        create.imports = vec![
            import("s", ImportKind::Named("s".into()), "@schema/core"),
            import("Country", ImportKind::Default, "../schemas/country"),
        ];
        create.locals = vec![
            local("Street", Some("const Street = s.string();")),
            local("unrelated", None),
            local(
                "Address",
                Some("const Address = s.object({\n  street: Street,\n  country: Country,\n});"),
            ),
            local(
                "User",
                Some("const User = s.object({ name: s.string(), address: Address });"),
            ),
        ];

        let rendered = render(&[create], &[]);

        assert!(rendered.warnings.is_empty());
        let out = rendered.text;
        assert!(out.contains(
            "import Country from '../schemas/country';\nimport { s } from '@schema/core';\n"
        ));
        assert!(out.contains(
            "export const PostApiUsersInputSchema = (() => {
  const Street = s.string();
  const Address = s.object({
    street: Street,
    country: Country,
  });
  return s.object({ name: s.string(), address: Address });
})();
export type PostApiUsersInput = InferSchema<typeof PostApiUsersInputSchema>;"
        ));
        assert!(!out.contains("const User ="));
        assert!(!out.contains("unrelated"));
    }

    #[test]
    fn schema_on_an_unliftable_local_falls_back_to_marker() {
        let mut create = route(RouteKind::Post, "/api/users");
        create.input_schema = Some(SchemaExpression::inline("s.object({ address: Address })"));
        create.output_schema = Some(SchemaExpression::inline("s.object({ ok: s.boolean() })"));
        create.imports = vec![import("s", ImportKind::Named("s".into()), "@schema/core")];
        create.locals = vec![
            local("Address", Some("const Address = s.object({ city: City });")),
            local("City", None),
        ];

        let rendered = render(&[create], &[]);

        assert_eq!(rendered.warnings.len(), 1);
        assert!(rendered.warnings[0].contains("input schema"));
        assert!(rendered.warnings[0].contains("'City'"));
        assert!(!rendered.text.contains("PostApiUsersInputSchema"));
        assert!(rendered
            .text
            .contains("export const PostApiUsersOutputSchema = s.object({ ok: s.boolean() });"));
        assert!(rendered.text.contains("input: NoSchema; output: PostApiUsersOutput;"));
    }

    #[test]
    fn conflicting_imports_are_errors() {
        let mut a = route(RouteKind::Post, "/api/a");
        a.input_schema = Some(SchemaExpression::inline("Shape"));
        a.imports = vec![import("Shape", ImportKind::Default, "../schemas/a")];
        let mut b = route(RouteKind::Post, "/api/b");
        b.filename = "src/api/b.ts".into();
        b.input_schema = Some(SchemaExpression::inline("Shape"));
        b.imports = vec![import("Shape", ImportKind::Default, "../schemas/b")];

        let err = render_routes(&[a, b], &[], "@agents/runtime", "src/generated").unwrap_err();
        assert!(matches!(err, RegistryError::ImportConflict { ref local, .. } if local == "Shape"));
    }

    #[test]
    fn agent_bound_route_takes_agent_types() {
        let writer = agent("writer", Some("s.string()"), Some("s.object({ text: s.string() })"));
        let mut draft = route(RouteKind::Stream, "/api/draft");
        draft.validated = true;
        draft.agent = Some("writer".into());

        let out = render(&[draft], &[writer]).text;

        assert!(out.contains("import type WriterAgent from '../agent/writer/agent';"));
        assert!(out.contains("export type StreamApiDraftInput = InferInput<typeof WriterAgent>;"));
        assert!(out.contains("export type StreamApiDraftOutput = InferOutput<typeof WriterAgent>;"));
        assert!(out.contains(
            "export interface StreamRouteRegistry {\n  '/api/draft': { input: StreamApiDraftInput; output: StreamApiDraftOutput; stream: true;"
        ));
    }

    #[test]
    fn agent_without_schemas_leaves_route_untyped() {
        let plain = agent("plain", None, Some("s.string()"));
        let mut run = route(RouteKind::Post, "/api/run");
        run.validated = true;
        run.agent = Some("plain".into());

        let out = render(&[run], &[plain]).text;

        assert!(!out.contains("PostApiRunInput"));
        assert!(out.contains("export type PostApiRunOutput = InferOutput<typeof PlainAgent>;"));
        assert!(out.contains(
            "'POST /api/run': { input: NoSchema; output: PostApiRunOutput; stream: false;"
        ));
        assert!(out.contains("input: NoSchema;\n"));
    }

    #[test]
    fn route_schema_wins_over_agent_schema() {
        let writer = agent("writer", Some("s.string()"), None);
        let mut draft = route(RouteKind::Post, "/api/draft");
        draft.agent = Some("writer".into());
        draft.input_schema = Some(SchemaExpression::inline("s.number()"));

        let out = render(&[draft], &[writer]).text;

        assert!(out.contains("export const PostApiDraftInputSchema = s.number();"));
        assert!(!out.contains("InferInput<typeof WriterAgent>"));
        assert!(!out.contains("PostApiDraftOutput"));
    }

    #[test]
    fn wildcard_twin_of_a_route_renders_both() {
        let out = render(
            &[
                route(RouteKind::Get, "/api/files"),
                route(RouteKind::Get, "/api/files/*"),
            ],
            &[],
        )
        .text;

        assert!(out.contains("'GET /api/files': { input: NoSchema; output: NoSchema; stream: false; params: GetApiFilesParams };"));
        assert!(out.contains("'GET /api/files/*': { input: NoSchema; output: NoSchema; stream: false; params: GetApiFilesWildcardParams };"));
        assert!(out.contains("export type GetApiFilesWildcardParams = Record<string, never>;"));
        assert!(out.contains("\"$get@/api/files/*\": {"));
        assert!(out.contains("'$get@/api/files/*': {"));
    }

    #[test]
    fn registries_split_by_kind_and_tree_is_emitted() {
        let out = render(
            &[
                route(RouteKind::EventStream, "/api/events"),
                route(RouteKind::Get, "/api/users"),
                route(RouteKind::WebSocket, "/api/users"),
            ],
            &[],
        )
        .text;

        assert!(out.contains("export interface RouteRegistry {\n  'GET /api/users':"));
        assert!(out.contains("export interface WebSocketRouteRegistry {\n  '/api/users':"));
        assert!(out.contains("export interface EventStreamRouteRegistry {\n  '/api/events':"));
        assert!(out.contains("export interface StreamRouteRegistry {\n}"));
        assert!(out.contains("export type RouteTree = {\n  api: {"));
        assert!(out.contains("export const routeTree = {\n  \"api\": {"));
        assert!(out.contains("\"$websocket\": {"));
    }

    #[test]
    fn params_types_reflect_modifiers() {
        assert_eq!(params_type("/users"), "Record<string, never>");
        assert_eq!(
            params_type("/files/:dir?/*rest"),
            "{ dir?: string; rest: string[] }"
        );
    }
}
