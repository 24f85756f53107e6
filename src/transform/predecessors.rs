//! Predecessor relation parsing and target formatting.
//!
//! The source serializes relations like `"3FS+2d,7SS"` (task reference,
//! link type, optional lag). The target wants a comma-separated string of
//! `<row-number><type>[lag]` against this sheet's freshly created rows.
//! Unknown references degrade to warnings, never failures.

use std::collections::HashMap;

/// The four dependency link types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FinishToStart => "FS",
            Self::StartToStart => "SS",
            Self::FinishToFinish => "FF",
            Self::StartToFinish => "SF",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "FS" => Some(Self::FinishToStart),
            "SS" => Some(Self::StartToStart),
            "FF" => Some(Self::FinishToFinish),
            "SF" => Some(Self::StartToFinish),
            _ => None,
        }
    }
}

/// One parsed predecessor relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredecessorRelation {
    /// Task reference as serialized by the source: a task index or a guid.
    pub pred_ref: String,
    pub link: LinkType,
    /// Normalized lag like `+2d` or `-1d`, when present.
    pub lag: Option<String>,
}

/// Parse the serialized relation list. Entries that cannot be parsed at all
/// are dropped with a warning.
pub fn parse_relations(raw: &str) -> Vec<PredecessorRelation> {
    raw.split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .filter_map(|entry| match parse_entry(entry) {
            Some(rel) => Some(rel),
            None => {
                tracing::warn!(entry, "dropping unparseable predecessor entry");
                None
            }
        })
        .collect()
}

fn parse_entry(entry: &str) -> Option<PredecessorRelation> {
    let upper = entry.to_uppercase();

    // Candidate link-type positions, rightmost first. Guid references can
    // contain hex runs that look like FF, so a candidate only wins when what
    // follows it is empty or a valid lag.
    let mut candidates: Vec<(usize, LinkType)> = ["FS", "SS", "FF", "SF"]
        .iter()
        .flat_map(|t| {
            upper
                .match_indices(t)
                .map(|(i, _)| (i, LinkType::from_token(t).unwrap()))
                .collect::<Vec<_>>()
        })
        .collect();
    candidates.sort_by_key(|(i, _)| std::cmp::Reverse(*i));

    for (i, link) in &candidates {
        let pred_ref = entry[..*i].trim();
        let rest = &entry[i + 2..];
        if pred_ref.is_empty() {
            continue;
        }
        let lag = parse_lag(rest);
        if rest.trim().is_empty() || lag.is_some() {
            return Some(PredecessorRelation {
                pred_ref: pred_ref.to_string(),
                link: *link,
                lag,
            });
        }
    }

    if candidates.is_empty() {
        // Bare reference: finish-to-start, no lag.
        return Some(PredecessorRelation {
            pred_ref: entry.to_string(),
            link: LinkType::FinishToStart,
            lag: None,
        });
    }
    None
}

/// Normalize a lag tail like `+2 days` or `-4h` to `+2d` / `-4h`.
fn parse_lag(rest: &str) -> Option<String> {
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    let mut chars = rest.chars();
    let sign = match chars.next()? {
        '+' => '+',
        '-' => '-',
        _ => return None,
    };
    let digits: String = chars.clone().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let unit = rest[1 + digits.len()..]
        .trim()
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or('d');
    Some(format!("{sign}{digits}{unit}"))
}

/// Render relations against the task-ref → row-number map built during row
/// load. Unknown references are skipped with a warning; `None` when nothing
/// resolved.
pub fn format_predecessors(
    relations: &[PredecessorRelation],
    row_number_of: &HashMap<String, i64>,
) -> Option<String> {
    let parts: Vec<String> = relations
        .iter()
        .filter_map(|rel| match row_number_of.get(&rel.pred_ref) {
            Some(row) => {
                let lag = rel.lag.as_deref().unwrap_or("");
                Some(format!("{row}{}{lag}", rel.link.as_str()))
            }
            None => {
                tracing::warn!(pred_ref = %rel.pred_ref, "predecessor references an unknown task");
                None
            }
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}
