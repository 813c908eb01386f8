use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATOR_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("separator pattern should be valid"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("disallowed-char pattern should be valid"));

/// Columns whose normalized name starts with this are index artifacts.
pub const INDEX_ARTIFACT_PREFIX: &str = "unnamed";

/// Rewrite a raw header into snake_case:
///  1. trim surrounding whitespace
///  2. collapse each run of whitespace/hyphens into `_`
///  3. drop everything except ASCII letters, digits and `_`
///  4. lowercase
///
/// Empty results and collisions between columns are left as they fall out.
pub fn normalize_column_name(raw: &str) -> String {
    let separated = SEPARATOR_RUN.replace_all(raw.trim(), "_");
    DISALLOWED.replace_all(&separated, "").to_lowercase()
}

pub fn is_index_artifact(normalized: &str) -> bool {
    normalized.starts_with(INDEX_ARTIFACT_PREFIX)
}

/// Name for a header cell. Blank cells get the `Unnamed: <i>` label that
/// tabular exporters give an index column, so they fall under the artifact filter.
pub fn header_name(raw: &str, index: usize) -> String {
    if raw.trim().is_empty() {
        normalize_column_name(&format!("Unnamed: {}", index))
    } else {
        normalize_column_name(raw)
    }
}
