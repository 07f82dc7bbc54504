//! Same-file symbol resolution for schema references.
//!
//! A linear scan of module-level declarations builds a name table; lookups
//! never leave the file. Imported names, computed member access and anything
//! the table cannot answer come back as their literal source text.

use crate::syntax::{named_children, node_text, object_property, pretty_text, unwrap_expression};
use discovery_protocol::{ImportBinding, ImportKind, LocalDeclaration, SchemaExpression};
use std::collections::HashMap;
use tree_sitter::Node;

/// Upper bound on identifier-to-identifier alias hops followed during one resolution.
pub const MAX_ALIAS_HOPS: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Binding<'a> {
    /// `const x = <value>`
    Value(Node<'a>),
    /// Declared without initializer, or a function/class
    Opaque,
    Imported,
}

/// Outcome of resolving an expression.
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    /// Resolution reached a syntax node
    Node(Node<'a>),
    /// Resolution stopped at text that must be emitted verbatim
    Text(String),
}

pub struct ScopeResolver<'a> {
    source: &'a str,
    bindings: HashMap<&'a str, Binding<'a>>,
    imports: Vec<ImportBinding>,
    locals: Vec<LocalDeclaration>,
}

impl<'a> ScopeResolver<'a> {
    /// Index the module-level declarations among `statements`.
    pub fn new(source: &'a str, statements: &[Node<'a>]) -> Self {
        let mut resolver = Self {
            source,
            bindings: HashMap::new(),
            imports: Vec::new(),
            locals: Vec::new(),
        };
        for statement in statements {
            resolver.index_statement(*statement);
        }
        resolver
    }

    fn index_statement(&mut self, statement: Node<'a>) {
        match statement.kind() {
            "import_statement" => self.index_import(statement),
            "lexical_declaration" | "variable_declaration" => self.index_declaration(statement),
            "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration" => {
                if let Some(name) = statement.child_by_field_name("name") {
                    let name = node_text(self.source, name);
                    self.bind(name, Binding::Opaque);
                    self.push_local(name, Some(pretty_text(self.source, statement)));
                }
            }
            "export_statement" => {
                if let Some(declaration) = statement.child_by_field_name("declaration") {
                    self.index_statement(declaration);
                }
            }
            _ => {}
        }
    }

    fn index_declaration(&mut self, declaration: Node<'a>) {
        for declarator in named_children(declaration) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            // Destructuring patterns bind nothing we can follow
            if name.kind() != "identifier" {
                let mut names = Vec::new();
                pattern_names(name, &mut names);
                for bound in names {
                    let bound = node_text(self.source, bound);
                    self.bind(bound, Binding::Opaque);
                    self.push_local(bound, None);
                }
                continue;
            }
            let name = node_text(self.source, name);
            let value = declarator.child_by_field_name("value");
            self.bind(name, value.map_or(Binding::Opaque, Binding::Value));
            let statement =
                value.map(|value| format!("const {name} = {};", pretty_text(self.source, value)));
            self.push_local(name, statement);
        }
    }

    fn push_local(&mut self, name: &str, statement: Option<String>) {
        if self.locals.iter().all(|local| local.name != name) {
            self.locals.push(LocalDeclaration::new(name, statement));
        }
    }

    fn index_import(&mut self, statement: Node<'a>) {
        let Some(source_node) = statement.child_by_field_name("source") else {
            return;
        };
        let specifier = crate::syntax::string_literal(self.source, source_node).unwrap_or_default();
        let statement_type_only = has_type_keyword(statement);

        for child in named_children(statement) {
            if child.kind() != "import_clause" {
                continue;
            }
            for part in named_children(child) {
                match part.kind() {
                    "identifier" => {
                        self.push_import(part, ImportKind::Default, &specifier, statement_type_only);
                    }
                    "namespace_import" => {
                        if let Some(local) = named_children(part)
                            .into_iter()
                            .find(|n| n.kind() == "identifier")
                        {
                            self.push_import(
                                local,
                                ImportKind::Namespace,
                                &specifier,
                                statement_type_only,
                            );
                        }
                    }
                    "named_imports" => {
                        for specifier_node in named_children(part) {
                            if specifier_node.kind() != "import_specifier" {
                                continue;
                            }
                            let Some(name) = specifier_node.child_by_field_name("name") else {
                                continue;
                            };
                            let local = specifier_node.child_by_field_name("alias").unwrap_or(name);
                            let imported = node_text(self.source, name).to_string();
                            let type_only = statement_type_only || has_type_keyword(specifier_node);
                            self.push_import(local, ImportKind::Named(imported), &specifier, type_only);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn push_import(&mut self, local: Node<'a>, kind: ImportKind, source: &str, type_only: bool) {
        let name = node_text(self.source, local);
        self.bind(name, Binding::Imported);
        self.imports.push(ImportBinding {
            local: name.to_string(),
            kind,
            source: source.to_string(),
            type_only,
        });
    }

    fn bind(&mut self, name: &'a str, binding: Binding<'a>) {
        // First declaration wins; redeclarations are a runtime error anyway
        self.bindings.entry(name).or_insert(binding);
    }

    /// Import bindings of the file, in source order
    pub fn imports(&self) -> &[ImportBinding] {
        &self.imports
    }

    /// Module-level declarations other than imports, in source order
    pub fn locals(&self) -> &[LocalDeclaration] {
        &self.locals
    }

    pub fn import_for(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|import| import.local == local)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Initializer of a module-level `const`/`let`/`var`
    pub fn initializer(&self, name: &str) -> Option<Node<'a>> {
        match self.bindings.get(name) {
            Some(Binding::Value(value)) => Some(*value),
            _ => None,
        }
    }

    /// Resolve a schema reference into raw and resolved source text.
    pub fn resolve(&self, node: Node<'a>) -> SchemaExpression {
        let raw = pretty_text(self.source, node);
        let resolved = match self.resolve_node(node) {
            Resolution::Node(resolved) => pretty_text(self.source, resolved),
            Resolution::Text(text) => text,
        };
        SchemaExpression { raw, resolved }
    }

    /// Resolve an expression as far as same-file declarations allow.
    pub fn resolve_node(&self, node: Node<'a>) -> Resolution<'a> {
        let mut hops_left = MAX_ALIAS_HOPS;
        self.resolve_within(node, &mut hops_left)
    }

    /// Resolve to an object literal, if the expression denotes one.
    pub fn resolve_object(&self, node: Node<'a>) -> Option<Node<'a>> {
        match self.resolve_node(node) {
            Resolution::Node(resolved) if resolved.kind() == "object" => Some(resolved),
            _ => None,
        }
    }

    /// Resolve to a string literal value, if the expression denotes one.
    pub fn resolve_string(&self, node: Node<'a>) -> Option<String> {
        match self.resolve_node(node) {
            Resolution::Node(resolved) => crate::syntax::string_literal(self.source, resolved),
            Resolution::Text(_) => None,
        }
    }

    fn resolve_within(&self, node: Node<'a>, hops_left: &mut usize) -> Resolution<'a> {
        let node = unwrap_expression(node);
        match node.kind() {
            "identifier" | "shorthand_property_identifier" => {
                self.follow_alias(node_text(self.source, node), hops_left)
            }
            "member_expression" => self.resolve_member(node, hops_left),
            "subscript_expression" => Resolution::Text(pretty_text(self.source, node)),
            _ => Resolution::Node(node),
        }
    }

    fn follow_alias(&self, name: &'a str, hops_left: &mut usize) -> Resolution<'a> {
        let mut current = name;
        while *hops_left > 0 {
            *hops_left -= 1;
            let Some(Binding::Value(value)) = self.bindings.get(current) else {
                // Imported, opaque or unknown: stop at the identifier itself
                return Resolution::Text(current.to_string());
            };
            let value = unwrap_expression(*value);
            match value.kind() {
                "identifier" => current = node_text(self.source, value),
                "member_expression" => return self.resolve_member(value, hops_left),
                "subscript_expression" => {
                    return Resolution::Text(pretty_text(self.source, value));
                }
                _ => return Resolution::Node(value),
            }
        }
        log::debug!("alias chain from '{name}' exceeded {MAX_ALIAS_HOPS} hops at '{current}'");
        Resolution::Text(current.to_string())
    }

    /// `obj.a.b`: resolve `obj` to an object literal and descend property by property.
    ///
    /// The value found at the end of the path is returned as-is, even when it is itself
    /// an identifier; intermediate values are followed only to reach the next object.
    fn resolve_member(&self, node: Node<'a>, hops_left: &mut usize) -> Resolution<'a> {
        let original = || Resolution::Text(pretty_text(self.source, node));

        let mut path = Vec::new();
        let mut current = node;
        loop {
            match current.kind() {
                "member_expression" => {
                    let Some(property) = current.child_by_field_name("property") else {
                        return original();
                    };
                    path.push(node_text(self.source, property));
                    let Some(object) = current.child_by_field_name("object") else {
                        return original();
                    };
                    current = unwrap_expression(object);
                }
                "identifier" => break,
                _ => return original(),
            }
        }
        path.reverse();

        let mut target = match self.resolve_within(current, hops_left) {
            Resolution::Node(resolved) if resolved.kind() == "object" => resolved,
            _ => return original(),
        };

        for (idx, key) in path.iter().enumerate() {
            let Some(value) = object_property(self.source, target, key) else {
                return original();
            };
            if idx + 1 == path.len() {
                return Resolution::Node(unwrap_expression(value));
            }
            target = match self.resolve_within(value, hops_left) {
                Resolution::Node(resolved) if resolved.kind() == "object" => resolved,
                _ => return original(),
            };
        }
        original()
    }
}

/// Identifiers bound by a destructuring pattern.
fn pattern_names<'a>(pattern: Node<'a>, out: &mut Vec<Node<'a>>) {
    match pattern.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => out.push(pattern),
        "pair_pattern" => {
            if let Some(value) = pattern.child_by_field_name("value") {
                pattern_names(value, out);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = pattern.child_by_field_name("left") {
                pattern_names(left, out);
            }
        }
        _ => {
            for child in named_children(pattern) {
                pattern_names(child, out);
            }
        }
    }
}

fn has_type_keyword(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .take_while(|child| child.kind() != "import_clause" && child.kind() != "identifier")
        .any(|child| child.kind() == "type");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::SourceLanguage;
    use crate::syntax::SyntaxTree;
    use pretty_assertions::assert_eq;

    /// Resolve the initializer of `const target = ...` in `source`.
    fn resolve_target(source: &str) -> SchemaExpression {
        let tree = SyntaxTree::parse(source, SourceLanguage::TypeScript).unwrap();
        let statements = tree.statements();
        let resolver = ScopeResolver::new(tree.source(), &statements);
        let value = resolver.initializer("target").expect("target declared");
        resolver.resolve(value)
    }

    #[test]
    fn inline_expression_is_unchanged() {
        let resolved = resolve_target("const target = s.object({ a: s.string() });");
        assert_eq!(resolved.raw, "s.object({ a: s.string() })");
        assert_eq!(resolved.resolved, resolved.raw);
        assert!(!resolved.was_substituted());
    }

    #[test]
    fn direct_identifier_is_substituted() {
        let resolved = resolve_target(
            "const inputSchema = s.object({ name: s.string() });\nconst target = inputSchema;",
        );
        assert_eq!(resolved.raw, "inputSchema");
        assert_eq!(resolved.resolved, "s.object({ name: s.string() })");
    }

    #[test]
    fn five_hop_alias_chain_resolves_fully() {
        let source = "\
const target = a1;
const a1 = a2;
const a2 = a3;
const a3 = a4;
const a4 = a5;
const a5 = s.number();
";
        assert_eq!(resolve_target(source).resolved, "s.number()");
    }

    #[test]
    fn overlong_alias_chain_stops_at_last_identifier() {
        let mut source = String::from("const target = a1;\n");
        for idx in 1..12 {
            source.push_str(&format!("const a{idx} = a{};\n", idx + 1));
        }
        source.push_str("const a12 = s.number();\n");

        // Lookups of a1 through a8 use up all eight hops
        assert_eq!(resolve_target(&source).resolved, "a9");
    }

    #[test]
    fn self_referencing_alias_terminates() {
        let resolved = resolve_target("let loop = loop;\nconst target = loop;");
        assert_eq!(resolved.resolved, "loop");
    }

    #[test]
    fn member_access_descends_requested_path_only() {
        let source = "\
const schemas = {
    user: {
        input: userInput,
        output: s.object({ id: s.string() }),
    },
};
const userInput = s.object({ name: s.string() });
const target = schemas.user.output;
const other = schemas.user.input;
";
        assert_eq!(
            resolve_target(source).resolved,
            "s.object({ id: s.string() })"
        );

        let tree = SyntaxTree::parse(source, SourceLanguage::TypeScript).unwrap();
        let statements = tree.statements();
        let resolver = ScopeResolver::new(tree.source(), &statements);
        let other = resolver.resolve(resolver.initializer("other").unwrap());
        // Nested identifiers are left as written
        assert_eq!(other.resolved, "userInput");
    }

    #[test]
    fn computed_member_access_is_left_verbatim() {
        let resolved =
            resolve_target("const schemas = { a: s.string() };\nconst target = schemas['a'];");
        assert_eq!(resolved.resolved, "schemas['a']");
    }

    #[test]
    fn imported_identifier_is_left_verbatim() {
        let resolved =
            resolve_target("import { sharedSchema } from './shared';\nconst target = sharedSchema;");
        assert_eq!(resolved.resolved, "sharedSchema");
    }

    #[test]
    fn spread_does_not_hide_explicit_properties() {
        let source = "\
const base = { input: s.string() };
const config = { ...base, output: s.boolean() };
const target = config.output;
";
        assert_eq!(resolve_target(source).resolved, "s.boolean()");

        let missing = "\
const base = { input: s.string() };
const config = { ...base, output: s.boolean() };
const target = config.input;
";
        assert_eq!(resolve_target(missing).resolved, "config.input");
    }

    #[test]
    fn collects_local_declarations_in_source_order() {
        let source = "\
import { s } from '@schema/core';
const Address = s.object({
    city: s.string(),
});
let pending;
const { region, zone: area = 'eu', ...rest } = settings;
function build() { return s.string(); }
export const Tag = s.string();
var Address = s.number();
";
        let tree = SyntaxTree::parse(source, SourceLanguage::TypeScript).unwrap();
        let statements = tree.statements();
        let resolver = ScopeResolver::new(tree.source(), &statements);
        let locals: Vec<(&str, Option<&str>)> = resolver
            .locals()
            .iter()
            .map(|local| (local.name.as_str(), local.statement.as_deref()))
            .collect();

        assert_eq!(
            locals,
            vec![
                (
                    "Address",
                    Some("const Address = s.object({\n    city: s.string(),\n});")
                ),
                ("pending", None),
                ("region", None),
                ("area", None),
                ("rest", None),
                ("build", Some("function build() { return s.string(); }")),
                ("Tag", Some("const Tag = s.string();")),
            ]
        );
    }

    #[test]
    fn collects_import_bindings() {
        let source = "\
import agent from '../agent/hello/agent';
import { s, type Infer as I } from '@schema/core';
import type { Shape } from './types';
import * as z from 'zod';
import './side-effect';
";
        let tree = SyntaxTree::parse(source, SourceLanguage::TypeScript).unwrap();
        let statements = tree.statements();
        let resolver = ScopeResolver::new(tree.source(), &statements);
        let imports = resolver.imports();

        assert_eq!(imports.len(), 5);
        assert_eq!(imports[0].local, "agent");
        assert_eq!(imports[0].kind, ImportKind::Default);
        assert!(imports[0].is_relative());
        assert_eq!(imports[1].kind, ImportKind::Named("s".into()));
        assert!(!imports[1].type_only);
        assert_eq!(imports[2].local, "I");
        assert_eq!(imports[2].kind, ImportKind::Named("Infer".into()));
        assert!(imports[2].type_only);
        assert!(imports[3].type_only);
        assert_eq!(imports[4].local, "z");
        assert_eq!(imports[4].kind, ImportKind::Namespace);
    }
}
