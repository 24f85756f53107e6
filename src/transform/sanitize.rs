//! Workspace and sheet name sanitization.

/// Characters the target platform rejects in workspace/sheet names.
const FORBIDDEN: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Maximum sanitized name length, ellipsis included.
const MAX_LEN: usize = 100;

/// Replace forbidden characters with `-`, collapse runs of `-`, trim
/// surrounding whitespace and dashes, and truncate to 100 characters with a
/// trailing `...` when truncation occurred.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = false;
    for ch in name.chars() {
        let ch = if FORBIDDEN.contains(&ch) { '-' } else { ch };
        if ch == '-' {
            if !last_dash {
                out.push('-');
            }
            last_dash = true;
        } else {
            out.push(ch);
            last_dash = false;
        }
    }
    let trimmed = out.trim_matches(|c: char| c.is_whitespace() || c == '-');

    let count = trimmed.chars().count();
    if count <= MAX_LEN {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(MAX_LEN - 3).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_chars_replaced() {
        assert_eq!(
            sanitize_name("Q1/Q2 Planning & Execution"),
            "Q1-Q2 Planning & Execution"
        );
        assert_eq!(sanitize_name(r#"a\b:c*d?e"f<g>h|i"#), "a-b-c-d-e-f-g-h-i");
    }

    #[test]
    fn test_runs_collapse() {
        assert_eq!(sanitize_name("a//b"), "a-b");
        assert_eq!(sanitize_name("a/-\\b"), "a-b");
        assert_eq!(sanitize_name("a---b"), "a-b");
    }

    #[test]
    fn test_trim_space_and_dashes() {
        assert_eq!(sanitize_name("  /Alpha/  "), "Alpha");
        assert_eq!(sanitize_name("-Alpha-"), "Alpha");
    }

    #[test]
    fn test_truncation_appends_ellipsis() {
        let long = "x".repeat(150);
        let out = sanitize_name(&long);
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_exactly_100_untouched() {
        let name = "y".repeat(100);
        assert_eq!(sanitize_name(&name), name);
    }

    #[test]
    fn test_plain_name_untouched() {
        assert_eq!(sanitize_name("Website Redesign"), "Website Redesign");
    }
}
