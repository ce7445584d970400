//! Page-id normalization.
//!
//! Page ids are path-like tokens (`"people/directory"`). Several screens
//! were renamed over the product's life; stored grants and incoming
//! requests may still use the old spellings, so every comparison runs on
//! the canonical id produced here. The pre-alias token is kept around as a
//! fallback by the evaluator to tolerate data written before a rename.

/// Legacy page id -> canonical page id. Lookup happens after trimming and
/// query/fragment stripping, so entries here are bare tokens.
const PAGE_ALIASES: &[(&str, &str)] = &[
    ("people/people-directory", "people/directory"),
    ("schedule/rooms", "scheduling/rooms"),
    ("schedule/overview", "scheduling/overview"),
    ("email-lists", "people/email-lists"),
    ("admin/access", "admin/access-control"),
    ("help/tutorials", "tutorials"),
];

/// Trim, strip one leading `/`, and truncate at the first `?` or `#`.
/// This is the pre-alias form; empty input stays empty and is treated as
/// "no page" (always deny) downstream.
pub fn strip_page_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let cut = trimmed
        .find(['?', '#'])
        .map(|idx| &trimmed[..idx])
        .unwrap_or(trimmed);
    cut.trim().to_string()
}

/// Canonical page id: stripped form mapped through the alias table.
pub fn normalize_page_id(raw: &str) -> String {
    let stripped = strip_page_id(raw);
    for (legacy, canonical) in PAGE_ALIASES {
        if stripped == *legacy {
            return (*canonical).to_string();
        }
    }
    stripped
}
