use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"));
static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("static regex"));

/// Map an arbitrary document name onto `[A-Za-z0-9._-]`.
///
/// Unsafe characters become `_`, runs of `_` collapse to one and leading or
/// trailing `_` are stripped. May return an empty string.
pub fn sanitize(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Sanitized identifier for a document path: its file stem, sanitized.
pub fn document_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    sanitize(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multibyte_chars_become_single_underscore() {
        assert_eq!(sanitize("résumé"), "r_sum");
        assert_eq!(sanitize("报告-2024"), "-2024");
    }

    #[test]
    fn stem_drops_extension_only() {
        assert_eq!(document_id(Path::new("a/b/archive.tar.pdf")), "archive.tar");
    }
}
