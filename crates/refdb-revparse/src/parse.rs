//! Revision expression parser.
//!
//! An expression is a base followed by suffix operators:
//! ```text
//! expr   := base op*
//! base   := "" | "@" | "@{-" N "}" | <name>
//! op     := "^" N? | "~" N? | "^{" type? "}" | "@{" N "}" | "@{u}" | "@{upstream}"
//! ```
//! The whole expression is parsed before anything is looked up, so malformed
//! input fails without touching storage.

use refdb_types::ObjectKind;

use crate::error::{Result, RevParseError};

/// What an expression starts from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Base {
    /// Nothing before `@{...}`: the branch `HEAD` points at.
    CurrentBranch,
    /// A reference shorthand, full id, id prefix, or describe output.
    Name(String),
    /// `@{-n}`: the nth branch checked out before the current one.
    PreviousCheckout(usize),
}

/// Target of a `^{...}` operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PeelTarget {
    /// `^{}`: follow tags to the first non-tag object.
    Any,
    /// `^{object}`: the object must exist.
    Object,
    Kind(ObjectKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Parent(usize),
    Ancestor(usize),
    Peel(PeelTarget),
    Reflog(usize),
    Upstream,
}

impl Op {
    /// Whether the operator works on a reference rather than an object.
    fn is_ref_level(&self) -> bool {
        matches!(self, Self::Reflog(_) | Self::Upstream)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Expr {
    pub base: Base,
    pub ops: Vec<Op>,
}

/// A parsed single expression or range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Spec {
    Single(Expr),
    /// `a..b` (`symmetric == false`) or `a...b`.
    Range { from: Expr, to: Expr, symmetric: bool },
}

fn invalid(spec: &str, reason: impl Into<String>) -> RevParseError {
    RevParseError::InvalidSpec {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

/// Parse a full revision string, range syntax included.
pub(crate) fn parse(spec: &str) -> Result<Spec> {
    let Some(pos) = spec.find("..") else {
        return Ok(Spec::Single(parse_expr(spec)?));
    };
    let symmetric = spec[pos + 2..].starts_with('.');
    let left = &spec[..pos];
    let right = &spec[pos + if symmetric { 3 } else { 2 }..];

    if right.contains("..") || right.starts_with('.') {
        return Err(invalid(spec, "more than one range operator"));
    }
    if left.is_empty() && right.is_empty() {
        return Err(invalid(spec, "range needs at least one side"));
    }
    let side = |s: &str| if s.is_empty() { parse_expr("HEAD") } else { parse_expr(s) };
    Ok(Spec::Range {
        from: side(left)?,
        to: side(right)?,
        symmetric,
    })
}

/// Parse one expression without range operators.
pub(crate) fn parse_expr(spec: &str) -> Result<Expr> {
    if spec.is_empty() {
        return Err(invalid(spec, "empty revision"));
    }
    if spec.contains("..") {
        return Err(invalid(spec, "range syntax is not allowed here"));
    }

    let (base, mut rest) = parse_base(spec)?;
    let mut ops = Vec::new();
    while !rest.is_empty() {
        let (op, tail) = parse_op(spec, rest)?;
        if op.is_ref_level() && !ops.iter().all(Op::is_ref_level) {
            return Err(invalid(spec, "@{...} must follow a reference"));
        }
        ops.push(op);
        rest = tail;
    }

    if base == Base::CurrentBranch && ops.is_empty() {
        return Err(invalid(spec, "empty revision"));
    }
    Ok(Expr { base, ops })
}

fn parse_base(spec: &str) -> Result<(Base, &str)> {
    if let Some(after) = spec.strip_prefix("@{-") {
        let close = after.find('}').ok_or_else(|| invalid(spec, "unterminated @{-n}"))?;
        let n = parse_number(spec, &after[..close])?;
        if n == 0 {
            return Err(invalid(spec, "@{-0} is not a previous checkout"));
        }
        return Ok((Base::PreviousCheckout(n), &after[close + 1..]));
    }

    let end = spec
        .char_indices()
        .find(|&(i, c)| c == '^' || c == '~' || (c == '@' && spec[i + 1..].starts_with('{')))
        .map_or(spec.len(), |(i, _)| i);
    let (name, rest) = spec.split_at(end);

    let base = match name {
        "" => Base::CurrentBranch,
        "@" => Base::Name("HEAD".to_string()),
        _ if name.contains(':') => return Err(invalid(spec, "path lookups are not supported")),
        _ => Base::Name(name.to_string()),
    };
    Ok((base, rest))
}

fn parse_op<'s>(spec: &str, rest: &'s str) -> Result<(Op, &'s str)> {
    if let Some(after) = rest.strip_prefix("^{") {
        let close = after.find('}').ok_or_else(|| invalid(spec, "unterminated ^{...}"))?;
        let target = match &after[..close] {
            "" => PeelTarget::Any,
            "object" => PeelTarget::Object,
            name if name.starts_with('/') => {
                return Err(invalid(spec, "message search is not supported"))
            }
            name => PeelTarget::Kind(
                name.parse::<ObjectKind>()
                    .map_err(|_| invalid(spec, format!("unknown object type {name:?}")))?,
            ),
        };
        return Ok((Op::Peel(target), &after[close + 1..]));
    }

    if let Some(after) = rest.strip_prefix("@{") {
        let close = after.find('}').ok_or_else(|| invalid(spec, "unterminated @{...}"))?;
        let op = match &after[..close] {
            "u" | "upstream" => Op::Upstream,
            body if body.starts_with('-') => {
                return Err(invalid(spec, "@{-n} must start the revision"))
            }
            body if body.chars().all(|c| c.is_ascii_digit()) => Op::Reflog(parse_number(spec, body)?),
            body => return Err(invalid(spec, format!("unsupported @{{{body}}}"))),
        };
        return Ok((op, &after[close + 1..]));
    }

    let mut chars = rest.chars();
    let make: fn(usize) -> Op = match chars.next() {
        Some('^') => Op::Parent,
        Some('~') => Op::Ancestor,
        _ => return Err(invalid(spec, format!("unexpected {rest:?}"))),
    };
    let after = chars.as_str();
    let digits = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
    let n = if digits == 0 { 1 } else { parse_number(spec, &after[..digits])? };
    Ok((make(n), &after[digits..]))
}

fn parse_number(spec: &str, digits: &str) -> Result<usize> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(spec, format!("expected a number, found {digits:?}")));
    }
    digits
        .parse()
        .map_err(|_| invalid(spec, format!("number out of range: {digits}")))
}
