//! Shorthand ("do what I mean") expansion.

use crate::names::{normalize_name, NameOptions};

/// Expansion rules in precedence order; `%s` is replaced by the shorthand.
pub const DWIM_RULES: [&str; 6] = [
    "%s",
    "refs/%s",
    "refs/tags/%s",
    "refs/heads/%s",
    "refs/remotes/%s",
    "refs/remotes/%s/HEAD",
];

/// Full names `short` may stand for, in precedence order.
///
/// Expansions that are not valid reference names under `opts` are dropped,
/// so `main` never yields the one-level candidate `main` unless lowercase
/// one-level names are allowed.
pub fn expand(short: &str, opts: NameOptions) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(DWIM_RULES.len());
    if short.is_empty() {
        return candidates;
    }
    for rule in DWIM_RULES {
        let name = rule.replace("%s", short);
        if let Ok(name) = normalize_name(&name, opts) {
            if !candidates.contains(&name) {
                candidates.push(name);
            }
        }
    }
    candidates
}
