// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic identity parsing and matching.
//!
//! An identity names a logical service or lock domain as
//! `project[:stack[:context]]`. Each segment is 1-64 characters from
//! `[A-Za-z0-9._-]`. Patterns additionally allow `*`, either as a whole
//! segment (match-any) or embedded inside a segment (glob).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum byte length of a single identity segment.
pub const SEGMENT_MAX_LEN: usize = 64;

/// Errors from identity or pattern parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity must have 1-3 colon-separated segments, got {0}")]
    SegmentCount(usize),

    #[error("empty segment at position {0}")]
    EmptySegment(usize),

    #[error("segment exceeds {SEGMENT_MAX_LEN} bytes: {0:?}")]
    SegmentTooLong(String),

    #[error("invalid character {1:?} in segment {0:?}")]
    InvalidChar(String, char),

    #[error("wildcard not allowed in an identity: {0:?}")]
    WildcardForbidden(String),
}

fn valid_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn check_segment(seg: &str, pos: usize, allow_wildcard: bool) -> Result<(), IdentityError> {
    if seg.is_empty() {
        return Err(IdentityError::EmptySegment(pos));
    }
    if seg.len() > SEGMENT_MAX_LEN {
        return Err(IdentityError::SegmentTooLong(seg.to_string()));
    }
    for c in seg.chars() {
        if c == '*' {
            if !allow_wildcard {
                return Err(IdentityError::WildcardForbidden(seg.to_string()));
            }
        } else if !valid_segment_char(c) {
            return Err(IdentityError::InvalidChar(seg.to_string(), c));
        }
    }
    Ok(())
}

/// A fully-resolved identity: no wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    project: String,
    stack: Option<String>,
    context: Option<String>,
}

impl Identity {
    /// Parse and validate a composite identity string.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let segments: Vec<&str> = s.split(':').collect();
        if segments.is_empty() || segments.len() > 3 {
            return Err(IdentityError::SegmentCount(segments.len()));
        }
        for (pos, seg) in segments.iter().enumerate() {
            check_segment(seg, pos, false)?;
        }
        Ok(Self {
            project: segments[0].to_string(),
            stack: segments.get(1).map(|s| s.to_string()),
            context: segments.get(2).map(|s| s.to_string()),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// The prefix tuple, recorded alongside the composite string so
    /// storage can index prefix queries.
    pub fn as_tuple(&self) -> (&str, Option<&str>, Option<&str>) {
        (&self.project, self.stack.as_deref(), self.context.as_deref())
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.project)?;
        if let Some(stack) = &self.stack {
            write!(f, ":{}", stack)?;
        }
        if let Some(context) = &self.context {
            write!(f, ":{}", context)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> String {
        id.to_string()
    }
}

/// An identity pattern for queries and releases. Segments may be `*`
/// (match-any) or contain embedded `*` globs; a missing trailing segment
/// is equivalent to `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<String>,
}

impl Pattern {
    /// Parse and validate a pattern string.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let segments: Vec<&str> = s.split(':').collect();
        if segments.is_empty() || segments.len() > 3 {
            return Err(IdentityError::SegmentCount(segments.len()));
        }
        for (pos, seg) in segments.iter().enumerate() {
            check_segment(seg, pos, true)?;
        }
        Ok(Self { segments: segments.into_iter().map(|s| s.to_string()).collect() })
    }

    /// True when no segment contains a wildcard: the pattern names exactly
    /// one identity.
    pub fn is_exact(&self) -> bool {
        self.segments.len() == 3 && !self.segments.iter().any(|s| s.contains('*'))
    }

    /// True when the composite string contains a wildcard anywhere.
    pub fn has_wildcard(&self) -> bool {
        self.segments.len() < 3 || self.segments.iter().any(|s| s.contains('*'))
    }

    /// Match an identity against this pattern, segment-wise.
    pub fn matches(&self, id: &Identity) -> bool {
        let (project, stack, context) = id.as_tuple();
        let values = [Some(project), stack, context];
        for (pos, value) in values.iter().enumerate() {
            let pat = self.segments.get(pos).map(|s| s.as_str());
            if !segment_matches(pat, *value) {
                return false;
            }
        }
        true
    }

    /// Per-segment SQL `LIKE` expressions for an indexable prefix query.
    ///
    /// `None` means match-any (no condition). `*` translates to `%`;
    /// literal `%`, `_` and `\` are escaped (callers add `ESCAPE '\'`).
    pub fn segment_likes(&self) -> [Option<String>; 3] {
        let mut likes: [Option<String>; 3] = [None, None, None];
        for (pos, seg) in self.segments.iter().enumerate() {
            if seg != "*" {
                likes[pos] = Some(segment_to_like(seg));
            }
        }
        likes
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join(":"))
    }
}

/// Match one pattern segment against one identity segment.
///
/// A missing pattern segment or a bare `*` matches anything, including an
/// absent identity segment. An embedded glob requires the segment to exist.
fn segment_matches(pat: Option<&str>, value: Option<&str>) -> bool {
    match (pat, value) {
        (None, _) | (Some("*"), _) => true,
        (Some(p), Some(v)) => glob_segment(p, v),
        (Some(_), None) => false,
    }
}

/// Glob match within a single segment; `*` matches any run of characters.
fn glob_segment(pat: &str, value: &str) -> bool {
    let pat: Vec<char> = pat.chars().collect();
    let value: Vec<char> = value.chars().collect();
    // Iterative wildcard match with backtracking over the last `*`.
    let (mut p, mut v) = (0usize, 0usize);
    let (mut star, mut mark) = (usize::MAX, 0usize);
    while v < value.len() {
        if p < pat.len() && (pat[p] == value[v]) {
            p += 1;
            v += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = p;
            mark = v;
            p += 1;
        } else if star != usize::MAX {
            p = star + 1;
            mark += 1;
            v = mark;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}

fn segment_to_like(seg: &str) -> String {
    let mut out = String::with_capacity(seg.len());
    for c in seg.chars() {
        match c {
            '*' => out.push('%'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
