//! Auto-number prefix generation from a project name.

/// Prefix used when the name yields no letters at all.
const FALLBACK: &str = "PRJ";

/// Extract 3–4 uppercase letters from a project name for auto-number ID
/// columns: the first letter of each word, topped up with further letters of
/// the first word when the name has fewer than three words.
pub fn project_prefix(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let initials: Vec<char> = words
        .iter()
        .filter_map(|w| w.chars().find(|c| c.is_ascii_alphabetic()))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if initials.len() >= 3 {
        return initials.into_iter().take(4).collect();
    }

    let mut prefix: String = initials.iter().collect();
    if let Some(first) = words.first() {
        // Top up from the first word, skipping its initial.
        for c in first.chars().filter(|c| c.is_ascii_alphabetic()).skip(1) {
            if prefix.chars().count() >= 4 {
                break;
            }
            prefix.push(c.to_ascii_uppercase());
        }
    }

    if prefix.is_empty() {
        FALLBACK.to_string()
    } else {
        prefix
    }
}
