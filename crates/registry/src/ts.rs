//! Small helpers for rendering TypeScript source text.

/// Header written at the top of every generated TypeScript file.
pub const GENERATED_HEADER: &str =
    "// This file is generated by agent-discovery. Do not edit by hand.\n";

/// Single-quoted TypeScript string literal.
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Object property key: bare when it is an identifier, quoted otherwise.
pub fn property_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        string_literal(key)
    }
}

/// Contents of a JSDoc block; `*/` is broken up so it cannot end the comment.
pub fn doc_comment(text: &str, indent: &str) -> String {
    let text = text.replace("*/", "*\\/");
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    if lines.len() <= 1 {
        let line = lines.first().copied().unwrap_or_default();
        return format!("{indent}/** {line} */\n");
    }
    let mut out = format!("{indent}/**\n");
    for line in lines {
        if line.is_empty() {
            out.push_str(&format!("{indent} *\n"));
        } else {
            out.push_str(&format!("{indent} * {line}\n"));
        }
    }
    out.push_str(&format!("{indent} */\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quotes_strings() {
        assert_eq!(string_literal("it's"), r"'it\'s'");
        assert_eq!(string_literal("GET /api"), "'GET /api'");
    }

    #[test]
    fn quotes_only_non_identifier_keys() {
        assert_eq!(property_key("$get"), "$get");
        assert_eq!(property_key("_2024"), "_2024");
        assert_eq!(property_key("GET /api/users"), "'GET /api/users'");
    }

    #[test]
    fn renders_doc_comments() {
        assert_eq!(doc_comment("Says hello", ""), "/** Says hello */\n");
        assert_eq!(
            doc_comment("Line one\n\nLine */ two", "  "),
            "  /**\n   * Line one\n   *\n   * Line *\\/ two\n   */\n"
        );
    }
}
