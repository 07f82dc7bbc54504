//! Route path helpers: parameter extraction, segment sanitising, joining.
//!
//! Supported markers: `:name`, `:name?` (optional), `:name+` / `:name*` /
//! `name*` (repeating), `*name` (catch-all) and a bare `*` wildcard, which
//! names nothing. A `{regex}` constraint after a parameter name is ignored.

use crate::naming::{fold_identifier, type_name};
use crate::RouteKind;

/// One named parameter of a route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParam {
    pub name: String,
    pub optional: bool,
    pub repeated: bool,
}

fn strip_constraint(segment: &str) -> &str {
    match segment.find('{') {
        Some(idx) => &segment[..idx],
        None => segment,
    }
}

fn parse_segment(segment: &str) -> Option<PathParam> {
    let segment = strip_constraint(segment);
    if let Some(rest) = segment.strip_prefix(':') {
        let (name, optional, repeated) = if let Some(name) = rest.strip_suffix('?') {
            (name, true, false)
        } else if let Some(name) = rest.strip_suffix('+') {
            (name, false, true)
        } else if let Some(name) = rest.strip_suffix('*') {
            (name, true, true)
        } else {
            (rest, false, false)
        };
        return (!name.is_empty()).then(|| PathParam {
            name: name.to_string(),
            optional,
            repeated,
        });
    }
    if let Some(name) = segment.strip_prefix('*') {
        return (!name.is_empty()).then(|| PathParam {
            name: name.to_string(),
            optional: false,
            repeated: true,
        });
    }
    if let Some(name) = segment.strip_suffix('*') {
        return (!name.is_empty()).then(|| PathParam {
            name: name.to_string(),
            optional: true,
            repeated: true,
        });
    }
    None
}

/// Parameters of a path, in order of appearance.
#[must_use]
pub fn parse_path_params(path: &str) -> Vec<PathParam> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .filter_map(parse_segment)
        .collect()
}

/// Parameter names of a path, in order of appearance.
#[must_use]
pub fn extract_path_params(path: &str) -> Vec<String> {
    parse_path_params(path)
        .into_iter()
        .map(|param| param.name)
        .collect()
}

/// Tree key for one path segment, with parameter sigils stripped and case folded.
#[must_use]
pub fn sanitize_segment(segment: &str) -> Option<String> {
    let stripped = strip_constraint(segment)
        .trim_start_matches([':', '*'])
        .trim_end_matches(['?', '+', '*']);
    fold_identifier(stripped)
}

/// Sanitised tree keys of a path. Segments that sanitise to nothing are dropped.
#[must_use]
pub fn tree_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .filter_map(sanitize_segment)
        .collect()
}

/// Words standing for one segment in a generated type name. Markers are
/// spelled out, so `/files` and `/files/*` name different types.
fn segment_words(segment: &str) -> String {
    let segment = strip_constraint(segment);
    if segment == "*" {
        return "wildcard".to_string();
    }
    if let Some(rest) = segment.strip_prefix(':') {
        return if let Some(name) = rest.strip_suffix('?') {
            format!("{name} optional")
        } else if let Some(name) = rest.strip_suffix('+') {
            format!("{name} repeated")
        } else if let Some(name) = rest.strip_suffix('*') {
            format!("{name} optional repeated")
        } else {
            rest.to_string()
        };
    }
    if let Some(name) = segment.strip_prefix('*') {
        return format!("{name} catch all");
    }
    if let Some(name) = segment.strip_suffix('*') {
        return format!("{name} glob");
    }
    segment.to_string()
}

/// Base of the generated type names of a route, e.g. `GetApiUsersId`.
#[must_use]
pub fn route_type_name(kind: RouteKind, path: &str) -> String {
    let mut words = vec![kind.as_str().to_string()];
    words.extend(
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(segment_words),
    );
    type_name(&words.join(" "))
}

/// Join path pieces with single slashes; no trailing slash except for the root.
#[must_use]
pub fn join_route_path<S: AsRef<str>>(parts: &[S]) -> String {
    let segments: Vec<&str> = parts
        .iter()
        .flat_map(|part| part.as_ref().split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}
