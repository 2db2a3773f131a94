// 🧹 Eligibility & Canonicalization
// Name normalization, non-player exclusion, confirmed-roster derivation

// ============================================================================
// IGNORE RULES
// ============================================================================

/// Exact names (lowercased) that are never players: summons, consumable
/// deployables and log noise that shows up in combat rankings.
const IGNORED_NAMES: &[&str] = &[
    "battle chicken",
    "arcanite dragonling",
    "unknown",
    "environment",
];

/// Wildcard patterns (`*` matches any run of characters) for whole families
/// of non-players.
const IGNORED_PATTERNS: &[&str] = &[
    "* totem*",
    "* trap",
    "*dummy*",
    "*mechanical*",
    "*guardian of blizzard*",
    "*spirit of *",
];

/// Check if a pattern with `*` wildcards matches the given text.
/// Without wildcards this is a case-insensitive substring check.
fn pattern_matches(pattern: &str, text: &str) -> bool {
    let pattern_lower = pattern.to_lowercase();
    let text_lower = text.to_lowercase();

    if pattern_lower.contains('*') {
        let parts: Vec<&str> = pattern_lower.split('*').collect();

        if parts.is_empty() {
            return false;
        }

        if !parts[0].is_empty() && !text_lower.starts_with(parts[0]) {
            return false;
        }

        if !parts[parts.len() - 1].is_empty() && !text_lower.ends_with(parts[parts.len() - 1]) {
            return false;
        }

        // Middle parts must appear in order
        let mut current_pos = parts[0].len();
        for part in &parts[1..parts.len() - 1] {
            if part.is_empty() {
                continue;
            }
            if let Some(pos) = text_lower[current_pos..].find(part) {
                current_pos += pos + part.len();
            } else {
                return false;
            }
        }

        true
    } else {
        text_lower.contains(&pattern_lower)
    }
}

/// True when the name belongs to a non-player and must be excluded from
/// every panel and roster.
pub fn should_ignore(name: &str) -> bool {
    let key = name_key(name);

    if key.is_empty() {
        return true;
    }

    if IGNORED_NAMES.contains(&key.as_str()) {
        return true;
    }

    IGNORED_PATTERNS.iter().any(|p| pattern_matches(p, &key))
}

// ============================================================================
// CANONICAL KEYS
// ============================================================================

/// Canonical map key for a character name
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Strip one trailing `(...)` group marker: "Foo (Group 2)" → "Foo".
/// Grouped panels (totem assignments) list the same player once per group;
/// folding makes those contributions accumulate under one key.
pub fn fold_group_suffix(name: &str) -> String {
    let trimmed = name.trim_end();

    if trimmed.ends_with(')') {
        if let Some(open) = trimmed.rfind('(') {
            return trimmed[..open].trim_end().to_string();
        }
    }

    trimmed.to_string()
}

// ============================================================================
// CONFIRMED ROSTER
// ============================================================================

/// Canonical names present in the raid-log participation dataset, minus
/// ignored names. Membership here is what "confirmed" means everywhere.
pub fn confirmed_set<'a, I>(participant_names: I) -> std::collections::BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    participant_names
        .into_iter()
        .filter(|name| !should_ignore(name))
        .map(name_key)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
