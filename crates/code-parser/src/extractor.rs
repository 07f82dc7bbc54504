use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::language::SourceLanguage;
use crate::routes::extract_routes;
use crate::scope::{Resolution, ScopeResolver};
use crate::syntax::{
    boolean_literal, call_arguments, callee_name, named_children, object_property, pretty_text,
    string_literal, unwrap_expression, SyntaxTree,
};
use crate::types::{AgentRef, Declaration, DeclarationKind, ExtractedFile, FileRole, SchemaRefs};
use discovery_protocol::{ImportKind, SourceFile};
use std::collections::HashSet;
use tree_sitter::Node;

/// Finds factory-call declarations in one file
pub struct DeclarationExtractor {
    config: ExtractorConfig,
}

/// Per-file state shared by the agent, eval and route passes
pub(crate) struct FileContext<'a, 'r> {
    pub source: &'a str,
    pub file: &'r str,
    pub resolver: &'r ScopeResolver<'a>,
    pub statements: &'r [Node<'a>],
    pub config: &'r ExtractorConfig,
    pub diagnostics: Vec<String>,
}

impl DeclarationExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the declarations `role` allows from a file.
    ///
    /// Never fails on malformed source: broken regions are skipped and the
    /// rest of the file is still examined. Errors only come from the grammar
    /// setup itself (e.g. an unsupported extension).
    pub fn extract(&self, file: &SourceFile, role: FileRole) -> Result<ExtractedFile> {
        let language = SourceLanguage::from_path(&file.path);
        let text = file.canonical_text();
        let tree = SyntaxTree::parse(&text, language)?;
        let statements = tree.statements();
        let resolver = ScopeResolver::new(tree.source(), &statements);

        let mut ctx = FileContext {
            source: tree.source(),
            file: &file.path,
            resolver: &resolver,
            statements: &statements,
            config: &self.config,
            diagnostics: Vec::new(),
        };

        let declarations = match role {
            FileRole::Agent => {
                let mut found = extract_agents(&mut ctx);
                found.extend(extract_evals(&mut ctx));
                found
            }
            FileRole::Eval => extract_evals(&mut ctx),
            FileRole::Route => extract_routes(&mut ctx),
        };

        log::debug!(
            "{}: {} declaration(s) as {}",
            file.path,
            declarations.len(),
            role.as_str()
        );

        Ok(ExtractedFile {
            path: file.path.clone(),
            role,
            language,
            declarations,
            imports: resolver.imports().to_vec(),
            locals: resolver.locals().to_vec(),
            has_syntax_errors: tree.has_errors(),
            diagnostics: ctx.diagnostics,
        })
    }
}

impl Default for DeclarationExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

/// Exported values of a module, as expression nodes
struct Exports<'a> {
    default: Option<Node<'a>>,
    named: Vec<Node<'a>>,
}

fn collect_exports<'a>(ctx: &FileContext<'a, '_>) -> Exports<'a> {
    let mut exports = Exports {
        default: None,
        named: Vec::new(),
    };

    for statement in ctx.statements {
        if statement.kind() != "export_statement" {
            continue;
        }
        // `export { x } from './y'` re-exports something we never see
        if statement.child_by_field_name("source").is_some() {
            continue;
        }
        if let Some(value) = statement.child_by_field_name("value") {
            exports.default = Some(value);
            continue;
        }
        if let Some(declaration) = statement.child_by_field_name("declaration") {
            if matches!(declaration.kind(), "lexical_declaration" | "variable_declaration") {
                for declarator in named_children(declaration) {
                    if let Some(value) = declarator.child_by_field_name("value") {
                        exports.named.push(value);
                    }
                }
            }
            continue;
        }
        for clause in named_children(*statement) {
            if clause.kind() != "export_clause" {
                continue;
            }
            for specifier in named_children(clause) {
                let Some(name) = specifier.child_by_field_name("name") else {
                    continue;
                };
                let is_default = specifier
                    .child_by_field_name("alias")
                    .is_some_and(|alias| pretty_text(ctx.source, alias) == "default");
                if is_default {
                    exports.default = Some(name);
                } else {
                    exports.named.push(name);
                }
            }
        }
    }
    exports
}

/// Follow identifiers to the factory call they were initialised with.
fn exported_call<'a>(ctx: &FileContext<'a, '_>, value: Node<'a>, factory: &str) -> Option<Node<'a>> {
    let node = match ctx.resolver.resolve_node(value) {
        Resolution::Node(node) => node,
        Resolution::Text(_) => return None,
    };
    (node.kind() == "call_expression" && callee_name(ctx.source, node) == Some(factory))
        .then_some(node)
}

/// Name literal and object-literal config of `factory(name, config)`.
///
/// A config that is not an object literal drops the declaration without a
/// diagnostic; only a debug log entry remains.
fn factory_parts<'a>(
    ctx: &mut FileContext<'a, '_>,
    call: Node<'a>,
    kind: &str,
) -> Option<(String, Node<'a>)> {
    let args = call_arguments(call);
    let line = call.start_position().row + 1;

    let Some(name) = args.first().and_then(|arg| string_literal(ctx.source, *arg)) else {
        let message = format!("{}:{line}: {kind} name is not a string literal", ctx.file);
        log::debug!("{message}");
        ctx.diagnostics.push(message);
        return None;
    };

    let config = args.get(1).map(|arg| unwrap_expression(*arg));
    match config {
        Some(config) if config.kind() == "object" => Some((name, config)),
        _ => {
            log::debug!(
                "{}:{line}: {kind} '{name}' skipped, config is not an object literal",
                ctx.file
            );
            None
        }
    }
}

fn new_declaration<'a>(
    ctx: &FileContext<'a, '_>,
    kind: DeclarationKind,
    name: String,
    call: Node<'a>,
    config: Node<'a>,
) -> Declaration {
    let mut declaration = Declaration::new(kind, name, ctx.file, call.start_position().row + 1);
    declaration.config = pretty_text(ctx.source, config);
    declaration.description = description(ctx, config);
    declaration.schema = schema_refs(ctx, config);
    declaration
}

fn extract_agents(ctx: &mut FileContext<'_, '_>) -> Vec<Declaration> {
    let exports = collect_exports(ctx);
    let factory = ctx.config.agent_factory.clone();
    let Some(call) = exports
        .default
        .and_then(|value| exported_call(ctx, value, &factory))
    else {
        return Vec::new();
    };
    let Some((name, config)) = factory_parts(ctx, call, "agent") else {
        return Vec::new();
    };

    let mut declaration = new_declaration(ctx, DeclarationKind::Agent, name, call, config);
    declaration.parent = object_property(ctx.source, config, "parent")
        .and_then(|parent| agent_reference(ctx, parent));
    vec![declaration]
}

fn extract_evals(ctx: &mut FileContext<'_, '_>) -> Vec<Declaration> {
    let exports = collect_exports(ctx);
    let factory = ctx.config.eval_factory.clone();

    let mut seen = HashSet::new();
    let mut declarations = Vec::new();
    for value in exports.default.into_iter().chain(exports.named) {
        let Some(call) = exported_call(ctx, value, &factory) else {
            continue;
        };
        // `const e = createEval(...); export default e; export { e }`
        if !seen.insert(call.id()) {
            continue;
        }
        let Some((name, config)) = factory_parts(ctx, call, "eval") else {
            continue;
        };
        let mut declaration = new_declaration(ctx, DeclarationKind::Eval, name, call, config);
        declaration.owner = eval_owner(ctx, call);
        declarations.push(declaration);
    }
    declarations.sort_by_key(|d| d.line);
    declarations
}

/// `agent.createEval(...)`: the agent the eval hangs off, if it can be named
fn eval_owner<'a>(ctx: &FileContext<'a, '_>, call: Node<'a>) -> Option<AgentRef> {
    let callee = unwrap_expression(call.child_by_field_name("function")?);
    if callee.kind() != "member_expression" {
        return None;
    }
    let receiver = unwrap_expression(callee.child_by_field_name("object")?);
    agent_reference(ctx, receiver)
}

/// Interpret an expression naming an agent.
///
/// Accepts a name literal, a relative default import of an agent module, or a
/// local binding initialised with an agent factory call.
pub(crate) fn agent_reference<'a>(ctx: &FileContext<'a, '_>, node: Node<'a>) -> Option<AgentRef> {
    let node = unwrap_expression(node);
    if let Some(name) = string_literal(ctx.source, node) {
        return Some(AgentRef::Name(name));
    }
    if !matches!(node.kind(), "identifier" | "shorthand_property_identifier") {
        return None;
    }

    let local = pretty_text(ctx.source, node);
    if let Some(import) = ctx.resolver.import_for(&local) {
        return (import.kind == ImportKind::Default && import.is_relative())
            .then(|| AgentRef::Module(import.source.clone()));
    }

    let value = ctx.resolver.initializer(&local)?;
    if let Resolution::Node(resolved) = ctx.resolver.resolve_node(value) {
        if let Some(name) = string_literal(ctx.source, resolved) {
            return Some(AgentRef::Name(name));
        }
        if resolved.kind() == "call_expression"
            && callee_name(ctx.source, resolved) == Some(ctx.config.agent_factory.as_str())
        {
            return call_arguments(resolved)
                .first()
                .and_then(|arg| string_literal(ctx.source, *arg))
                .map(AgentRef::Name);
        }
    }
    None
}

fn description<'a>(ctx: &FileContext<'a, '_>, config: Node<'a>) -> Option<String> {
    if let Some(value) = object_property(ctx.source, config, "description") {
        if let Some(text) = ctx.resolver.resolve_string(value) {
            return Some(text);
        }
    }
    let metadata = object_property(ctx.source, config, "metadata")?;
    let metadata = ctx.resolver.resolve_object(metadata)?;
    let value = object_property(ctx.source, metadata, "description")?;
    ctx.resolver.resolve_string(value)
}

/// `schema: { input, output, stream }`, where `schema` may name a local object.
pub(crate) fn schema_refs<'a>(ctx: &FileContext<'a, '_>, config: Node<'a>) -> SchemaRefs {
    let Some(schema) = object_property(ctx.source, config, "schema") else {
        return SchemaRefs::default();
    };
    let Some(schema) = ctx.resolver.resolve_object(schema) else {
        log::debug!("{}: schema is not an object literal", ctx.file);
        return SchemaRefs::default();
    };
    schema_object(ctx, schema)
}

/// Read `input`/`output`/`stream` off an object literal.
pub(crate) fn schema_object<'a>(ctx: &FileContext<'a, '_>, object: Node<'a>) -> SchemaRefs {
    let input = object_property(ctx.source, object, "input").map(|n| ctx.resolver.resolve(n));
    let output = object_property(ctx.source, object, "output").map(|n| ctx.resolver.resolve(n));
    let stream = object_property(ctx.source, object, "stream")
        .and_then(|node| match ctx.resolver.resolve_node(node) {
            Resolution::Node(value) => boolean_literal(value),
            Resolution::Text(_) => None,
        })
        .unwrap_or(false);
    SchemaRefs {
        input,
        output,
        stream,
    }
}
