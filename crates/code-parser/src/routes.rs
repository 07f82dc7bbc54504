//! Route declarations: `router.<method>(path, ...handlers)` on a router bound
//! with the router factory, including chained registrations.

use crate::extractor::{agent_reference, schema_object, FileContext};
use crate::scope::Resolution;
use crate::syntax::{
    call_arguments, callee_name, named_children, node_text, pretty_text, string_literal,
    unwrap_expression,
};
use crate::types::{AgentRef, Declaration, DeclarationKind, RouteDetails, SchemaRefs};
use discovery_protocol::RouteKind;
use std::collections::HashSet;
use tree_sitter::Node;

pub(crate) fn extract_routes(ctx: &mut FileContext<'_, '_>) -> Vec<Declaration> {
    let routers = router_bindings(ctx);
    let statements = ctx.statements;
    let mut declarations = Vec::new();

    for statement in statements {
        let expression = match statement.kind() {
            "expression_statement" => named_children(*statement).into_iter().next(),
            "export_statement" => statement.child_by_field_name("value"),
            _ => None,
        };
        let Some(expression) = expression else {
            continue;
        };
        for (method, call) in route_chain(ctx, &routers, expression) {
            if let Some(declaration) = route_declaration(ctx, method, call) {
                declarations.push(declaration);
            }
        }
    }
    declarations
}

/// Local names bound to `createRouter(...)`
fn router_bindings<'a>(ctx: &FileContext<'a, '_>) -> HashSet<&'a str> {
    let mut routers = HashSet::new();
    for statement in ctx.statements {
        let declaration = match statement.kind() {
            "lexical_declaration" | "variable_declaration" => *statement,
            "export_statement" => match statement.child_by_field_name("declaration") {
                Some(declaration) => declaration,
                None => continue,
            },
            _ => continue,
        };
        for declarator in named_children(declaration) {
            let (Some(name), Some(value)) = (
                declarator.child_by_field_name("name"),
                declarator.child_by_field_name("value"),
            ) else {
                continue;
            };
            if is_router_factory(ctx, value) {
                routers.insert(node_text(ctx.source, name));
            }
        }
    }
    routers
}

fn is_router_factory(ctx: &FileContext<'_, '_>, node: Node<'_>) -> bool {
    let node = unwrap_expression(node);
    node.kind() == "call_expression"
        && callee_name(ctx.source, node) == Some(ctx.config.router_factory.as_str())
}

/// Unroll `router.get(...).post(...)` into `[("get", call), ("post", call)]`.
///
/// Returns nothing unless the chain bottoms out at a known router binding or a
/// direct `createRouter()` call.
fn route_chain<'a>(
    ctx: &FileContext<'a, '_>,
    routers: &HashSet<&'a str>,
    expression: Node<'a>,
) -> Vec<(&'a str, Node<'a>)> {
    let mut chain = Vec::new();
    let mut current = unwrap_expression(expression);
    loop {
        if current.kind() != "call_expression" {
            break;
        }
        let Some(callee) = current.child_by_field_name("function") else {
            break;
        };
        let callee = unwrap_expression(callee);
        if callee.kind() != "member_expression" {
            break;
        }
        let (Some(object), Some(property)) = (
            callee.child_by_field_name("object"),
            callee.child_by_field_name("property"),
        ) else {
            break;
        };
        chain.push((node_text(ctx.source, property), current));
        current = unwrap_expression(object);
    }

    let rooted = match current.kind() {
        "identifier" => routers.contains(node_text(ctx.source, current)),
        _ => is_router_factory(ctx, current),
    };
    if !rooted {
        return Vec::new();
    }
    chain.reverse();
    chain
}

fn route_declaration<'a>(
    ctx: &mut FileContext<'a, '_>,
    method: &str,
    call: Node<'a>,
) -> Option<Declaration> {
    // `router.use(...)`, `router.route(...)` and friends declare nothing
    let kind = RouteKind::from_method(method)?;
    let args = call_arguments(call);
    let line = call.start_position().row + 1;

    let Some(path) = args.first().and_then(|arg| string_literal(ctx.source, *arg)) else {
        let message = format!("{}:{line}: {method} route path is not a string literal", ctx.file);
        log::debug!("{message}");
        ctx.diagnostics.push(message);
        return None;
    };

    let mut declaration = Declaration::new(DeclarationKind::Route, path, ctx.file, line);
    let mut details = RouteDetails {
        kind,
        validated: false,
        agent: None,
    };

    for arg in args.iter().skip(1) {
        let Some(validator) = validator_call(ctx, *arg) else {
            continue;
        };
        details.validated = true;
        declaration.config = pretty_text(ctx.source, validator);
        declaration.schema = validator_schema(ctx, validator);
        details.agent = validator_agent(ctx, validator);
        break;
    }

    declaration.route = Some(details);
    Some(declaration)
}

/// The `validator(...)` call an argument denotes, directly or through a local const.
fn validator_call<'a>(ctx: &FileContext<'a, '_>, arg: Node<'a>) -> Option<Node<'a>> {
    let node = match ctx.resolver.resolve_node(arg) {
        Resolution::Node(node) => node,
        Resolution::Text(_) => return None,
    };
    (node.kind() == "call_expression"
        && callee_name(ctx.source, node) == Some(ctx.config.validator.as_str()))
    .then_some(node)
}

fn validator_schema<'a>(ctx: &FileContext<'a, '_>, validator: Node<'a>) -> SchemaRefs {
    let Some(options) = call_arguments(validator).into_iter().next() else {
        return SchemaRefs::default();
    };
    match ctx.resolver.resolve_object(options) {
        Some(object) => schema_object(ctx, object),
        None => SchemaRefs::default(),
    }
}

/// `agent.validator(...)` binds the route to the agent the receiver names.
fn validator_agent<'a>(ctx: &FileContext<'a, '_>, validator: Node<'a>) -> Option<AgentRef> {
    let callee = unwrap_expression(validator.child_by_field_name("function")?);
    if callee.kind() != "member_expression" {
        return None;
    }
    let receiver = callee.child_by_field_name("object")?;
    agent_reference(ctx, receiver)
}

#[cfg(test)]
mod tests {
    use crate::extractor::DeclarationExtractor;
    use crate::types::{AgentRef, Declaration, FileRole};
    use discovery_protocol::{RouteKind, SourceFile};
    use pretty_assertions::assert_eq;

    fn routes(source: &str) -> Vec<Declaration> {
        DeclarationExtractor::default()
            .extract(&SourceFile::new("src/api/users.ts", source), FileRole::Route)
            .unwrap()
            .declarations
    }

    fn summary(found: &[Declaration]) -> Vec<(RouteKind, String, bool)> {
        found
            .iter()
            .map(|d| {
                let route = d.route.as_ref().unwrap();
                (route.kind, d.name.clone(), route.validated)
            })
            .collect()
    }

    #[test]
    fn plain_and_chained_routes() {
        let found = routes(
            r#"
import { createRouter } from '@agents/runtime';

const router = createRouter();

router.get('/', (c) => c.json([]));
router.post('/', handler).put('/:id', handler).delete('/:id', handler);
router.use(logger());

export default router;
"#,
        );
        assert_eq!(
            summary(&found),
            vec![
                (RouteKind::Get, "/".to_string(), false),
                (RouteKind::Post, "/".to_string(), false),
                (RouteKind::Put, "/:id".to_string(), false),
                (RouteKind::Delete, "/:id".to_string(), false),
            ]
        );
        assert_eq!(found[0].line, 6);
    }

    #[test]
    fn transport_kinds() {
        let found = routes(
            "const r = createRouter();\nr.websocket('/chat', ws);\nr.sse('/events', sse);\nr.stream('/feed', s);\n",
        );
        let kinds: Vec<_> = found.iter().map(|d| d.route.as_ref().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![RouteKind::WebSocket, RouteKind::EventStream, RouteKind::Stream]
        );
    }

    #[test]
    fn calls_on_other_objects_are_ignored() {
        let found = routes("const app = new App();\napp.get('/x', h);\nrouter.get('/y', h);\n");
        assert!(found.is_empty());
    }

    #[test]
    fn validator_with_schemas() {
        let found = routes(
            r#"
const router = createRouter();
const createUser = s.object({ name: s.string() });

router.post('/', validator({ input: createUser, output: s.object({ id: s.string() }) }), handler);
"#,
        );
        let route = &found[0];
        assert!(route.route.as_ref().unwrap().validated);
        let input = route.schema.input.as_ref().unwrap();
        assert_eq!(input.raw, "createUser");
        assert_eq!(input.resolved, "s.object({ name: s.string() })");
        assert!(route.config.starts_with("validator({"));
    }

    #[test]
    fn validator_without_schema() {
        let found = routes("const router = createRouter();\nrouter.post('/raw', validator(), h);\n");
        let route = &found[0];
        assert!(route.route.as_ref().unwrap().validated);
        assert!(route.schema.is_empty());
    }

    #[test]
    fn agent_validator_binds_route() {
        let found = routes(
            r#"
import hello from '../agent/hello/agent';
const router = createRouter();
router.post('/hello', hello.validator(), async (c) => c.json(await hello.run(c.req.valid('json'))));
"#,
        );
        let route = found[0].route.as_ref().unwrap();
        assert!(route.validated);
        assert_eq!(
            route.agent,
            Some(AgentRef::Module("../agent/hello/agent".into()))
        );
    }

    #[test]
    fn non_literal_path_is_reported() {
        let file = DeclarationExtractor::default()
            .extract(
                &SourceFile::new(
                    "src/api/dyn.ts",
                    "const router = createRouter();\nrouter.get(PATH, h);\n",
                ),
                FileRole::Route,
            )
            .unwrap();
        assert!(file.declarations.is_empty());
        assert_eq!(file.diagnostics.len(), 1);
    }
}
