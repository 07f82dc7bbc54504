//! Module specifiers for generated files.
//!
//! All paths here are root-relative with `/` separators.

const SOURCE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".js", ".jsx", ".mjs", ".cjs"];

/// Directory part of a root-relative file path (`""` for top-level files).
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Join a relative specifier onto a directory, folding `.` and `..`.
/// `..` never climbs above the root.
pub fn resolve_relative(dir: &str, specifier: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|part| !part.is_empty()).collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Specifier that reaches `target` from a module in `from_dir`.
pub fn relative_specifier(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|part| !part.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|part| !part.is_empty()).collect();
    let shared = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<&str> = vec![".."; from.len() - shared];
    segments.extend(&to[shared..]);
    let joined = segments.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

/// Drop a known source extension so the specifier resolves either way.
pub fn strip_source_extension(path: &str) -> &str {
    SOURCE_EXTENSIONS
        .iter()
        .find_map(|ext| path.strip_suffix(ext))
        .unwrap_or(path)
}

/// Rebase a specifier written in `from_file` so it works from `output_dir`.
/// Package specifiers pass through unchanged.
pub fn rebase_specifier(from_file: &str, specifier: &str, output_dir: &str) -> String {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return specifier.to_string();
    }
    let target = resolve_relative(parent_dir(from_file), specifier);
    relative_specifier(output_dir, &target)
}
