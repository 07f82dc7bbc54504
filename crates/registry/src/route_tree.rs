//! Nested, path-segmented route tree with a type-level and a runtime mirror.
//!
//! Paths are split on `/`, each segment is sanitised into an identifier key,
//! and every route becomes a `$<kind>` leaf on the node its path ends at.
//! Verbs sharing a path share a node.
//!
//! Distinct paths can sanitise onto the same node (`/files` and `/files/*`).
//! The first route of a kind there takes `$<kind>`; later ones of that kind
//! are keyed `$<kind>@<path>` so dispatch stays unambiguous.

use crate::error::{RegistryError, Result};
use crate::ts;
use discovery_protocol::{
    route_type_name, tree_segments, AgentMetadata, RouteKind, RouteMetadata,
};
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Marker type emitted wherever a route has no schema to type against.
pub const NO_SCHEMA: &str = "NoSchema";

/// Where a leaf hangs on its node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LeafSlot {
    pub kind: RouteKind,
    /// Set for a route sharing its node and kind with an earlier path
    pub twin_path: Option<String>,
}

impl LeafSlot {
    pub fn new(kind: RouteKind) -> Self {
        Self {
            kind,
            twin_path: None,
        }
    }

    fn twin(kind: RouteKind, path: &str) -> Self {
        Self {
            kind,
            twin_path: Some(path.to_string()),
        }
    }

    /// Property key in both mirrors.
    pub fn key(&self) -> String {
        match &self.twin_path {
            None => self.kind.leaf_key(),
            Some(path) => format!("{}@{path}", self.kind.leaf_key()),
        }
    }
}

/// One route at its terminal tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLeaf {
    pub kind: RouteKind,
    pub path: String,
    pub filename: String,
    pub type_name: String,
    /// Generated input alias, `None` when the route has nothing to type it with
    pub input: Option<String>,
    pub output: Option<String>,
    pub stream: bool,
    pub params: Vec<String>,
}

impl RouteLeaf {
    /// Leaf for a route. A side without a route-level schema borrows the
    /// bound agent's schema for that side, if the agent declares one.
    pub fn from_route(route: &RouteMetadata, agent: Option<&AgentMetadata>) -> Self {
        let base = route_type_name(route.kind, &route.path);
        let input = (route.input_schema.is_some()
            || agent.is_some_and(|agent| agent.input_schema.is_some()))
        .then(|| format!("{base}Input"));
        let output = (route.output_schema.is_some()
            || agent.is_some_and(|agent| agent.output_schema.is_some()))
        .then(|| format!("{base}Output"));
        Self {
            kind: route.kind,
            path: route.path.clone(),
            filename: route.filename.clone(),
            type_name: base,
            input,
            output,
            stream: route.streaming,
            params: route.path_params.clone(),
        }
    }

    pub fn params_type(&self) -> String {
        format!("{}Params", self.type_name)
    }

    /// Input type as referenced from generated code.
    pub fn input_type(&self) -> &str {
        self.input.as_deref().unwrap_or(NO_SCHEMA)
    }

    pub fn output_type(&self) -> &str {
        self.output.as_deref().unwrap_or(NO_SCHEMA)
    }

    fn origin(&self) -> String {
        format!("{} ({})", self.path, self.filename)
    }

    fn to_type(&self) -> TsType {
        let method = match self.kind.http_method() {
            Some(verb) => TsType::StringLiteral(verb.to_string()),
            None => TsType::Null,
        };
        TsType::Object(BTreeMap::from([
            ("kind".to_string(), TsType::StringLiteral(self.kind.as_str().to_string())),
            ("method".to_string(), method),
            ("path".to_string(), TsType::StringLiteral(self.path.clone())),
            ("input".to_string(), TsType::Reference(self.input_type().to_string())),
            ("output".to_string(), TsType::Reference(self.output_type().to_string())),
            ("stream".to_string(), TsType::BooleanLiteral(self.stream)),
            ("params".to_string(), TsType::Reference(self.params_type())),
        ]))
    }

    fn to_value(&self) -> Value {
        serde_json::json!({
            "kind": self.kind.as_str(),
            "method": self.kind.http_method(),
            "path": self.path,
            "input": self.input,
            "output": self.output,
            "stream": self.stream,
            "params": self.params,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    pub children: BTreeMap<String, TreeNode>,
    pub leaves: BTreeMap<LeafSlot, RouteLeaf>,
}

impl TreeNode {
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
            + self
                .children
                .values()
                .map(TreeNode::leaf_count)
                .sum::<usize>()
    }

    fn to_type(&self) -> TsType {
        let mut fields = BTreeMap::new();
        for (segment, child) in &self.children {
            fields.insert(segment.clone(), child.to_type());
        }
        for (slot, leaf) in &self.leaves {
            fields.insert(slot.key(), leaf.to_type());
        }
        TsType::Object(fields)
    }

    fn to_value(&self) -> Value {
        let mut fields = Map::new();
        for (segment, child) in &self.children {
            fields.insert(segment.clone(), child.to_value());
        }
        for (slot, leaf) in &self.leaves {
            fields.insert(slot.key(), leaf.to_value());
        }
        Value::Object(fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTree {
    root: TreeNode,
}

impl RouteTree {
    /// Insert every leaf, in order. Only the same kind on the same original
    /// path is a conflict; sanitised twins get path-keyed slots.
    pub fn build(leaves: impl IntoIterator<Item = RouteLeaf>) -> Result<Self> {
        let mut root = TreeNode::default();
        for leaf in leaves {
            let segments = tree_segments(&leaf.path);
            let mut node = &mut root;
            for segment in &segments {
                node = node.children.entry(segment.clone()).or_default();
            }
            let slot = match node.leaves.get(&LeafSlot::new(leaf.kind)) {
                None => LeafSlot::new(leaf.kind),
                Some(first) if first.path == leaf.path => LeafSlot::new(leaf.kind),
                Some(first) => {
                    log::debug!(
                        "{} sanitises onto the node of {}, keying it by path",
                        leaf.origin(),
                        first.origin()
                    );
                    LeafSlot::twin(leaf.kind, &leaf.path)
                }
            };
            match node.leaves.entry(slot) {
                Entry::Occupied(existing) => {
                    return Err(RegistryError::TreeConflict {
                        node: format!("/{}", segments.join("/")),
                        leaf: existing.key().key(),
                        first: existing.get().origin(),
                        second: leaf.origin(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(leaf);
                }
            }
        }
        log::debug!("Built route tree with {} leaves", root.leaf_count());
        Ok(Self { root })
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Type-level mirror, for static dispatch.
    pub fn type_mirror(&self) -> TsType {
        self.root.to_type()
    }

    /// Runtime mirror, for introspection.
    pub fn runtime_mirror(&self) -> Value {
        self.root.to_value()
    }
}

/// The subset of TypeScript type syntax the tree mirror needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TsType {
    Object(BTreeMap<String, TsType>),
    Reference(String),
    StringLiteral(String),
    BooleanLiteral(bool),
    Null,
}

impl TsType {
    /// Render at the given nesting depth (two spaces per level).
    pub fn render(&self, depth: usize) -> String {
        match self {
            TsType::Object(fields) if fields.is_empty() => "{}".to_string(),
            TsType::Object(fields) => {
                let pad = "  ".repeat(depth);
                let mut out = String::from("{\n");
                for (key, value) in fields {
                    out.push_str(&format!(
                        "{pad}  {}: {};\n",
                        ts::property_key(key),
                        value.render(depth + 1)
                    ));
                }
                out.push_str(&pad);
                out.push('}');
                out
            }
            TsType::Reference(name) => name.clone(),
            TsType::StringLiteral(value) => ts::string_literal(value),
            TsType::BooleanLiteral(value) => value.to_string(),
            TsType::Null => "null".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn leaf(kind: RouteKind, path: &str) -> RouteLeaf {
        RouteLeaf {
            kind,
            path: path.to_string(),
            filename: "src/api/test.ts".to_string(),
            type_name: route_type_name(kind, path),
            input: None,
            output: None,
            stream: kind.is_streaming(),
            params: discovery_protocol::extract_path_params(path),
        }
    }

    fn type_paths(ty: &TsType, prefix: &str, out: &mut BTreeSet<String>) {
        if let TsType::Object(fields) = ty {
            for (key, value) in fields {
                let path = format!("{prefix}/{key}");
                out.insert(path.clone());
                type_paths(value, &path, out);
            }
        }
    }

    fn value_paths(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
        if let Value::Object(fields) = value {
            for (key, value) in fields {
                let path = format!("{prefix}/{key}");
                out.insert(path.clone());
                value_paths(value, &path, out);
            }
        }
    }

    #[test]
    fn verbs_on_one_path_share_a_node() {
        let tree = RouteTree::build([
            leaf(RouteKind::Get, "/resources"),
            leaf(RouteKind::Post, "/resources"),
            leaf(RouteKind::Put, "/resources"),
            leaf(RouteKind::Delete, "/resources"),
        ])
        .unwrap();

        let root = tree.root();
        assert_eq!(root.children.len(), 1);
        assert!(root.leaves.is_empty());
        let resources = &root.children["resources"];
        assert_eq!(
            resources.leaves.keys().map(|slot| slot.kind).collect::<Vec<_>>(),
            vec![RouteKind::Get, RouteKind::Post, RouteKind::Put, RouteKind::Delete]
        );
        assert_eq!(root.leaf_count(), 4);
    }

    #[test]
    fn sanitizes_segments_and_drops_wildcards() {
        let tree = RouteTree::build([
            leaf(RouteKind::Get, "/api/user-profiles/:userId"),
            leaf(RouteKind::Get, "/api/files/*"),
        ])
        .unwrap();

        let api = &tree.root().children["api"];
        assert!(api.children["userProfiles"].children["userId"]
            .leaves
            .contains_key(&LeafSlot::new(RouteKind::Get)));
        assert!(api.children["files"]
            .leaves
            .contains_key(&LeafSlot::new(RouteKind::Get)));
    }

    #[test]
    fn sanitized_twins_of_one_kind_are_keyed_by_path() {
        let tree = RouteTree::build([
            leaf(RouteKind::Get, "/api/files"),
            leaf(RouteKind::Get, "/api/files/*"),
            leaf(RouteKind::Get, "/api/user-id"),
            leaf(RouteKind::Get, "/api/userId"),
        ])
        .unwrap();

        let api = &tree.root().children["api"];
        let files: Vec<String> = api.children["files"].leaves.keys().map(LeafSlot::key).collect();
        assert_eq!(files, vec!["$get", "$get@/api/files/*"]);
        assert_eq!(api.children["files"].leaves.values().nth(1).unwrap().path, "/api/files/*");
        let users: Vec<String> = api.children["userId"].leaves.keys().map(LeafSlot::key).collect();
        assert_eq!(users, vec!["$get", "$get@/api/userId"]);

        let runtime = tree.runtime_mirror();
        assert_eq!(runtime["api"]["files"]["$get@/api/files/*"]["path"], "/api/files/*");
        assert!(tree
            .type_mirror()
            .render(0)
            .contains("'$get@/api/files/*': {"));
    }

    #[test]
    fn same_route_twice_conflicts() {
        let err = RouteTree::build([
            leaf(RouteKind::Get, "/api/files"),
            leaf(RouteKind::Get, "/api/files/*"),
            leaf(RouteKind::Get, "/api/files/*"),
        ])
        .unwrap_err();

        match err {
            RegistryError::TreeConflict {
                node,
                leaf,
                first,
                second,
            } => {
                assert_eq!(node, "/api/files");
                assert_eq!(leaf, "$get@/api/files/*");
                assert!(first.starts_with("/api/files/*"));
                assert!(second.starts_with("/api/files/*"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn different_kinds_on_sanitized_twins_coexist() {
        let tree = RouteTree::build([
            leaf(RouteKind::Get, "/api/files"),
            leaf(RouteKind::WebSocket, "/api/files/*"),
        ])
        .unwrap();
        let files = &tree.root().children["api"].children["files"];
        assert_eq!(
            files.leaves.keys().map(LeafSlot::key).collect::<Vec<_>>(),
            vec!["$get", "$websocket"]
        );
    }

    #[test]
    fn mirrors_have_identical_structure() {
        let mut typed = leaf(RouteKind::Post, "/api/users/:id");
        typed.input = Some("PostApiUsersIdInput".to_string());
        let tree = RouteTree::build([
            leaf(RouteKind::Get, "/"),
            leaf(RouteKind::Get, "/api/users"),
            typed,
            leaf(RouteKind::EventStream, "/api/events"),
            leaf(RouteKind::WebSocket, "/api/chat/:room?"),
            leaf(RouteKind::WebSocket, "/api/chat/:room+"),
        ])
        .unwrap();

        let mut from_type = BTreeSet::new();
        type_paths(&tree.type_mirror(), "", &mut from_type);
        let mut from_value = BTreeSet::new();
        value_paths(&tree.runtime_mirror(), "", &mut from_value);

        assert!(from_type.contains("/api/users/id/$post/input"));
        assert!(from_type.contains("/$get/kind"));
        assert!(from_type.contains("/api/chat/room/$websocket@/api/chat/:room+/path"));
        assert_eq!(from_type, from_value);
    }

    #[test]
    fn leaf_mirrors_carry_no_schema_marker() {
        let tree = RouteTree::build([leaf(RouteKind::Post, "/api/jobs")]).unwrap();

        let rendered = tree.type_mirror().render(0);
        assert!(rendered.contains("input: NoSchema;"));
        assert!(rendered.contains("params: PostApiJobsParams;"));
        assert!(rendered.contains("method: 'POST';"));

        let runtime = tree.runtime_mirror();
        let job = &runtime["api"]["jobs"]["$post"];
        assert_eq!(job["input"], Value::Null);
        assert_eq!(job["method"], "POST");
        assert_eq!(job["params"], serde_json::json!([]));
    }

    fn agent(input: Option<&str>, output: Option<&str>) -> AgentMetadata {
        AgentMetadata {
            filename: "src/agent/chat/agent.ts".into(),
            name: "chat".into(),
            canonical_name: "chat".into(),
            identity: discovery_protocol::Identity {
                version: "v".into(),
                identity_id: "agentid_chat".into(),
                content_scoped_id: "agent_chat".into(),
            },
            description: None,
            input_schema: input.map(discovery_protocol::SchemaExpression::inline),
            output_schema: output.map(discovery_protocol::SchemaExpression::inline),
            streaming: false,
            parent: None,
            subagents: vec![],
            evals: vec![],
        }
    }

    #[test]
    fn leaf_types_follow_schemas_and_agents() {
        let route = RouteMetadata {
            filename: "src/api/chat.ts".into(),
            id: "routeid_x".into(),
            path: "/api/chat/:room".into(),
            kind: RouteKind::Post,
            version: "v".into(),
            validated: true,
            input_schema: Some(discovery_protocol::SchemaExpression::inline("Message")),
            output_schema: None,
            agent: None,
            path_params: vec!["room".into()],
            streaming: false,
            imports: vec![],
            locals: vec![],
        };

        let plain = RouteLeaf::from_route(&route, None);
        assert_eq!(plain.type_name, "PostApiChatRoom");
        assert_eq!(plain.input_type(), "PostApiChatRoomInput");
        assert_eq!(plain.output_type(), NO_SCHEMA);

        let typed_agent = agent(None, Some("s.string()"));
        let bound = RouteLeaf::from_route(&route, Some(&typed_agent));
        assert_eq!(bound.output_type(), "PostApiChatRoomOutput");

        let untyped_agent = agent(None, None);
        let bound = RouteLeaf::from_route(&route, Some(&untyped_agent));
        assert_eq!(bound.input_type(), "PostApiChatRoomInput");
        assert_eq!(bound.output_type(), NO_SCHEMA);
    }
}
