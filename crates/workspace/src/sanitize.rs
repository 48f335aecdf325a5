//! Name sanitization for run ids, uploaded file names, and deliverable
//! names (`spec.md` §4.3).

const MAX_NAME_LEN: usize = 120;

/// Keep `[A-Za-z0-9._-]`, collapse everything else to `_`, strip leading
/// and trailing `.`/`_`, clamp to 120 characters, and fall back to
/// `fallback` when the result is empty.
#[must_use]
pub fn sanitize_name(raw: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || ch == '-' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let clamped: String = trimmed.chars().take(MAX_NAME_LEN).collect();

    if clamped.is_empty() {
        fallback.to_string()
    } else {
        clamped
    }
}

/// Append `_2`, `_3`, ... before the extension to resolve a name collision.
///
/// `attempt` starts at 1 (no suffix); callers increment until the candidate
/// path is free.
#[must_use]
pub fn dedupe_suffix(name: &str, attempt: usize) -> String {
    if attempt <= 1 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{attempt}.{ext}"),
        _ => format!("{name}_{attempt}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_allowed_characters() {
        assert_eq!(sanitize_name("report_v2.final-draft.md", "x"), "report_v2.final-draft.md");
    }

    #[test]
    fn collapses_disallowed_characters() {
        assert_eq!(sanitize_name("my report (final)!.txt", "x"), "my_report__final__.txt");
    }

    #[test]
    fn strips_leading_and_trailing_dots_and_underscores() {
        assert_eq!(sanitize_name("..hidden__", "x"), "hidden");
    }

    #[test]
    fn falls_back_when_empty() {
        assert_eq!(sanitize_name("...", "fallback"), "fallback");
        assert_eq!(sanitize_name("", "fallback"), "fallback");
    }

    #[test]
    fn clamps_to_120_chars() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_name(&long, "x").len(), 120);
    }

    #[test]
    fn dedupe_suffix_inserts_before_extension() {
        assert_eq!(dedupe_suffix("file.txt", 1), "file.txt");
        assert_eq!(dedupe_suffix("file.txt", 2), "file_2.txt");
        assert_eq!(dedupe_suffix("file", 3), "file_3");
    }
}
