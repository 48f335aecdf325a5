//! Slug normalization shared by node ids, workflow ids, and handoff packet
//! types.

/// Lowercase alphanumeric slug with underscores as the only separator.
///
/// Mirrors the original runtime's `_slugify_runtime`: non-alphanumeric
/// characters become `_`, repeated underscores collapse, and leading/
/// trailing underscores are stripped. An empty result falls back to the
/// caller-supplied default.
#[must_use]
pub fn slugify(value: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else {
            out.push('_');
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    let mut prev_underscore = false;
    for ch in out.chars() {
        if ch == '_' {
            if !prev_underscore {
                collapsed.push(ch);
            }
            prev_underscore = true;
        } else {
            collapsed.push(ch);
            prev_underscore = false;
        }
    }

    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A validated slug string (used for node/workflow ids).
///
/// Construction always succeeds — invalid characters are normalized via
/// [`slugify`] rather than rejected, matching the permissive original
/// runtime. Length is clamped to `max_len`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slug(String);

impl Slug {
    /// Build a slug from raw user input, clamped to `max_len` characters.
    #[must_use]
    pub fn new(raw: &str, max_len: usize) -> Self {
        let s = slugify(raw, "node");
        let clamped: String = s.chars().take(max_len).collect();
        Self(clamped)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World", "x"), "hello_world");
    }

    #[test]
    fn slugify_collapses_repeats() {
        assert_eq!(slugify("a---b", "x"), "a_b");
    }

    #[test]
    fn slugify_strips_edges() {
        assert_eq!(slugify("  leading and trailing  ", "x"), "leading_and_trailing");
    }

    #[test]
    fn slugify_empty_falls_back() {
        assert_eq!(slugify("!!!", "handoff_packet"), "handoff_packet");
        assert_eq!(slugify("", "handoff_packet"), "handoff_packet");
    }

    #[test]
    fn slugify_is_idempotent() {
        let once = slugify("Some Edge Label!", "x");
        let twice = slugify(&once, "x");
        assert_eq!(once, twice);
    }

    #[test]
    fn slug_clamps_length() {
        let long = "a".repeat(200);
        let slug = Slug::new(&long, 80);
        assert_eq!(slug.as_str().len(), 80);
    }
}
