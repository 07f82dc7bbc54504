use crate::error::{ParserError, Result};
use crate::language::SourceLanguage;
use tree_sitter::{Node, Parser, Tree};

/// Node kinds that can stand as a statement at module level.
const STATEMENT_KINDS: &[&str] = &[
    "import_statement",
    "export_statement",
    "lexical_declaration",
    "variable_declaration",
    "expression_statement",
    "function_declaration",
    "generator_function_declaration",
    "class_declaration",
    "abstract_class_declaration",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
];

/// Wrappers that do not change the value of the expression they contain.
const TRANSPARENT_KINDS: &[&str] = &[
    "parenthesized_expression",
    "as_expression",
    "satisfies_expression",
    "non_null_expression",
];

/// Best-effort syntax tree of one source file.
///
/// Tree-sitter recovers locally from syntax errors, so a tree is produced for
/// any input; broken regions show up as `ERROR` nodes.
pub struct SyntaxTree {
    source: String,
    tree: Tree,
    language: SourceLanguage,
}

impl SyntaxTree {
    /// Parse source text with the grammar for `language`
    pub fn parse(source: &str, language: SourceLanguage) -> Result<Self> {
        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ParserError::tree_sitter(format!("Failed to set language: {e}")))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ParserError::tree_sitter("Parser produced no tree"))?;

        Ok(Self {
            source: source.to_string(),
            tree,
            language,
        })
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// Whether any part of the file failed to parse
    pub fn has_errors(&self) -> bool {
        self.root().has_error()
    }

    /// Module-level statements in source order.
    ///
    /// Statements swallowed by an `ERROR` node are recovered by descending into it,
    /// so one broken construct does not hide the well-formed code after it.
    pub fn statements(&self) -> Vec<Node<'_>> {
        let mut statements = Vec::new();
        collect_statements(self.root(), &mut statements);
        statements
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node_text(&self.source, node)
    }
}

fn collect_statements<'a>(node: Node<'a>, out: &mut Vec<Node<'a>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.is_error() {
            collect_statements(child, out);
        } else if STATEMENT_KINDS.contains(&child.kind()) {
            out.push(child);
        }
    }
}

/// Source text covered by a node
pub fn node_text<'a>(source: &'a str, node: Node<'_>) -> &'a str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Node text re-indented as if the node started at column zero, trailing whitespace trimmed.
pub fn pretty_text(source: &str, node: Node<'_>) -> String {
    let text = node_text(source, node);
    let line_start = source[..node.start_byte()]
        .rfind('\n')
        .map_or(0, |idx| idx + 1);
    let indent = source[line_start..]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .count();

    let mut lines = text.lines();
    let mut out = String::with_capacity(text.len());
    if let Some(first) = lines.next() {
        out.push_str(first.trim_end());
    }
    for line in lines {
        out.push('\n');
        let strip = line
            .chars()
            .take(indent)
            .take_while(|c| *c == ' ' || *c == '\t')
            .count();
        out.push_str(line[strip..].trim_end());
    }
    out
}

/// Strip parentheses, `as`/`satisfies` casts and non-null assertions.
pub fn unwrap_expression(node: Node<'_>) -> Node<'_> {
    let mut current = node;
    while TRANSPARENT_KINDS.contains(&current.kind()) {
        match first_named_child(current) {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

fn first_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let child = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    child
}

/// Named children without comments
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn hex_char(digits: &str) -> Option<char> {
    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}

/// Decode the escape sequences of a string literal body.
/// Unknown or malformed escapes keep the escaped character.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\');
            break;
        };
        match escaped {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            // Line continuation
            '\n' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            'x' => {
                let digits: String = chars.by_ref().take(2).collect();
                out.push(hex_char(&digits).unwrap_or('x'));
            }
            'u' => {
                let digits: String = if chars.next_if_eq(&'{').is_some() {
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                out.push(hex_char(&digits).unwrap_or('u'));
            }
            other => out.push(other),
        }
    }
    out
}

/// Value of a string literal, or a template literal without substitutions
pub fn string_literal(source: &str, node: Node<'_>) -> Option<String> {
    let node = unwrap_expression(node);
    match node.kind() {
        "string" => {
            let text = node_text(source, node);
            (text.len() >= 2).then(|| unescape(&text[1..text.len() - 1]))
        }
        "template_string" => {
            let mut cursor = node.walk();
            let has_substitution = node
                .named_children(&mut cursor)
                .any(|child| child.kind() == "template_substitution");
            let text = node_text(source, node);
            (!has_substitution && text.len() >= 2).then(|| unescape(&text[1..text.len() - 1]))
        }
        _ => None,
    }
}

/// `true`/`false` literal value
pub fn boolean_literal(node: Node<'_>) -> Option<bool> {
    match unwrap_expression(node).kind() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn property_key(source: &str, key: Node<'_>) -> Option<String> {
    match key.kind() {
        "property_identifier" | "identifier" | "number" => Some(node_text(source, key).to_string()),
        "string" => string_literal(source, key),
        // `{ [expr]: value }` has no static key
        _ => None,
    }
}

/// Look up a property of an object literal by static key.
///
/// Returns the value node (or the shorthand identifier / method node itself).
/// Spread elements are skipped, not expanded; a later property wins over an earlier one.
pub fn object_property<'a>(source: &str, object: Node<'a>, key: &str) -> Option<Node<'a>> {
    let mut found = None;
    for child in named_children(object) {
        match child.kind() {
            "pair" => {
                let matches = child
                    .child_by_field_name("key")
                    .and_then(|k| property_key(source, k))
                    .is_some_and(|k| k == key);
                if matches {
                    found = child.child_by_field_name("value");
                }
            }
            "shorthand_property_identifier" => {
                if node_text(source, child) == key {
                    found = Some(child);
                }
            }
            "method_definition" => {
                let matches = child
                    .child_by_field_name("name")
                    .and_then(|k| property_key(source, k))
                    .is_some_and(|k| k == key);
                if matches {
                    found = Some(child);
                }
            }
            _ => {}
        }
    }
    found
}

/// Argument nodes of a call expression, comments skipped
pub fn call_arguments(call: Node<'_>) -> Vec<Node<'_>> {
    call.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// Name a callee ends in: `foo(...)` → `foo`, `a.b.foo(...)` → `foo`
pub fn callee_name<'a>(source: &'a str, call: Node<'_>) -> Option<&'a str> {
    let callee = unwrap_expression(call.child_by_field_name("function")?);
    match callee.kind() {
        "identifier" => Some(node_text(source, callee)),
        "member_expression" => callee
            .child_by_field_name("property")
            .map(|property| node_text(source, property)),
        _ => None,
    }
}
