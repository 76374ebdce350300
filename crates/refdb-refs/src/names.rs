//! Reference name validation and normalization.
//!
//! Rules, applied after collapsing leading and repeated `/`:
//! - Must be non-empty and must not end with `/` or `.`
//! - Must not contain ASCII control characters, space, `~`, `^`, `:`, `\`,
//!   `?`, `[`, or `*` (one whole-component `*` is allowed in pattern mode)
//! - Must not contain `..` or `@{`, and must not be exactly `@`
//! - Components must not start with `.` or end with `.lock`
//! - One-level names (`HEAD`, `ORIG_HEAD`) must be uppercase letters and `_`,
//!   beginning and ending with a letter, unless one-level names are allowed
//! - Multi-level names must live under `refs/`, except in shorthand mode

use crate::error::{RefError, Result};
use crate::types::REFS_PREFIX;

/// Characters that are forbidden anywhere in a reference name.
const FORBIDDEN_CHARS: &[char] = &[' ', '~', '^', ':', '\\', '?', '['];

/// Relaxations of the default naming rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NameOptions {
    /// Accept any valid one-level name, not just `ALL_CAPS` ones.
    pub allow_one_level: bool,
    /// Accept exactly one `*` standing for a whole path component.
    pub refspec_pattern: bool,
    /// Accept shorthand names such as `main` or `origin/main`.
    pub refspec_shorthand: bool,
}

impl NameOptions {
    pub const fn new() -> Self {
        Self {
            allow_one_level: false,
            refspec_pattern: false,
            refspec_shorthand: false,
        }
    }

    pub const fn allow_one_level(mut self, allow: bool) -> Self {
        self.allow_one_level = allow;
        self
    }

    pub const fn refspec_pattern(mut self, allow: bool) -> Self {
        self.refspec_pattern = allow;
        self
    }

    pub const fn refspec_shorthand(mut self, allow: bool) -> Self {
        self.refspec_shorthand = allow;
        self
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Collapse leading and repeated slashes.
fn collapse_slashes(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_slash = true;
    for ch in name.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out
}

/// `HEAD`, `ORIG_HEAD`, `FETCH_HEAD`: uppercase and `_`, letters at both ends.
fn is_all_caps_and_underscore(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_uppercase()
                && last.is_ascii_uppercase()
                && bytes.iter().all(|b| b.is_ascii_uppercase() || *b == b'_')
        }
        _ => false,
    }
}

/// Validate `name` and return its normalized form.
///
/// # Examples
///
/// ```
/// use refdb_refs::names::{normalize_name, NameOptions};
///
/// let opts = NameOptions::new();
/// assert_eq!(normalize_name("refs//heads/main", opts).unwrap(), "refs/heads/main");
/// assert!(normalize_name("HEAD", opts).is_ok());
/// assert!(normalize_name("head", opts).is_err());
/// assert!(normalize_name("refs/heads/a..b", opts).is_err());
/// ```
pub fn normalize_name(name: &str, opts: NameOptions) -> Result<String> {
    let normalized = collapse_slashes(name);

    if normalized.is_empty() {
        return Err(invalid(name, "name must not be empty"));
    }
    if normalized.ends_with('/') {
        return Err(invalid(name, "must not end with '/'"));
    }
    if normalized.ends_with('.') {
        return Err(invalid(name, "must not end with '.'"));
    }
    if normalized == "@" {
        return Err(invalid(name, "'@' is not a valid name"));
    }

    for ch in normalized.chars() {
        if ch.is_ascii_control() {
            return Err(invalid(name, format!("contains control character {ch:?}")));
        }
        if FORBIDDEN_CHARS.contains(&ch) {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }

    if normalized.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }
    if normalized.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }

    let mut stars = 0;
    let components: Vec<&str> = normalized.split('/').collect();
    for component in &components {
        if component.starts_with('.') {
            return Err(invalid(name, format!("component must not start with '.': {component:?}")));
        }
        if component.ends_with(".lock") {
            return Err(invalid(name, format!("component must not end with '.lock': {component:?}")));
        }
        if component.contains('*') {
            if !opts.refspec_pattern {
                return Err(invalid(name, "contains forbidden character: '*'"));
            }
            if *component != "*" {
                return Err(invalid(name, "'*' must replace a whole component"));
            }
            stars += 1;
        }
    }
    if stars > 1 {
        return Err(invalid(name, "at most one '*' is allowed"));
    }

    if components.len() == 1 {
        if !(opts.allow_one_level || opts.refspec_shorthand || is_all_caps_and_underscore(&normalized)) {
            return Err(invalid(
                name,
                "one-level names must be uppercase letters and '_', starting and ending with a letter",
            ));
        }
    } else if !opts.refspec_shorthand && !normalized.starts_with(REFS_PREFIX) {
        return Err(invalid(name, "multi-level names must live under 'refs/'"));
    }

    Ok(normalized)
}

/// Returns `true` if `name` is already a valid, normalized reference name.
pub fn is_valid_name(name: &str) -> bool {
    matches!(normalize_name(name, NameOptions::new()), Ok(n) if n == name)
}
