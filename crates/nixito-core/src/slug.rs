//! Organization slug derivation
//!
//! Slugs are lowercase ASCII alphanumerics separated by single hyphens,
//! with no leading or trailing hyphen.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9-]").unwrap());
static HYPHEN_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-+").unwrap());

/// Derive a URL-safe slug from a human-entered name.
pub fn slugify(input: &str) -> String {
    let lower = input.to_lowercase();
    let replaced = NON_SLUG_CHARS.replace_all(&lower, "-");
    let collapsed = HYPHEN_RUNS.replace_all(&replaced, "-");
    collapsed.trim_matches('-').to_string()
}

/// Check whether a value already satisfies the slug invariant.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && slugify(slug) == slug
}
