//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile route patterns once at startup
//! - Match request paths segment by segment
//! - Capture named segments into parameters
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - No regex: literal segments, `{name}` captures with an optional literal
//!   suffix (`{repo}.git`), and one trailing `{*name}` capture
//! - Captured values are taken verbatim from the request path

use thiserror::Error;

use crate::params::{ParamSet, ATTRS_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must start with '/'")]
    NoLeadingSlash(String),

    #[error("pattern `{pattern}`: malformed segment `{segment}`")]
    Segment { pattern: String, segment: String },

    #[error("pattern `{0}`: `{{*..}}` capture must be the last segment")]
    RestNotLast(String),

    #[error("pattern `{pattern}`: capture `{name}` used twice")]
    DuplicateCapture { pattern: String, name: String },

    #[error("pattern `{0}`: `attrs` is reserved and cannot be captured")]
    ReservedCapture(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture { name: String, suffix: String },
    Rest(String),
}

/// A compiled route path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| PatternError::NoLeadingSlash(raw.to_string()))?;

        let parts: Vec<&str> = if rest.is_empty() { Vec::new() } else { rest.split('/').collect() };
        let mut segments = Vec::with_capacity(parts.len());
        let mut captured: Vec<&str> = Vec::new();

        for (i, part) in parts.iter().enumerate() {
            let malformed = || PatternError::Segment {
                pattern: raw.to_string(),
                segment: part.to_string(),
            };

            let (segment, name) = if let Some(inner) = part.strip_prefix("{*") {
                let name = inner.strip_suffix('}').ok_or_else(malformed)?;
                if i + 1 != parts.len() {
                    return Err(PatternError::RestNotLast(raw.to_string()));
                }
                (Segment::Rest(name.to_string()), Some(name))
            } else if let Some(inner) = part.strip_prefix('{') {
                let (name, suffix) = inner.split_once('}').ok_or_else(malformed)?;
                if suffix.contains(['{', '}']) {
                    return Err(malformed());
                }
                (
                    Segment::Capture {
                        name: name.to_string(),
                        suffix: suffix.to_string(),
                    },
                    Some(name),
                )
            } else {
                if part.is_empty() || part.contains(['{', '}']) {
                    return Err(malformed());
                }
                (Segment::Literal(part.to_string()), None)
            };

            if let Some(name) = name {
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(malformed());
                }
                if name == ATTRS_KEY {
                    return Err(PatternError::ReservedCapture(raw.to_string()));
                }
                if captured.contains(&name) {
                    return Err(PatternError::DuplicateCapture {
                        pattern: raw.to_string(),
                        name: name.to_string(),
                    });
                }
                captured.push(name);
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path`, returning the captured segments on success.
    pub fn matches(&self, path: &str) -> Option<ParamSet> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() { Vec::new() } else { rest.split('/').collect() };
        let mut captures = ParamSet::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Capture { name, suffix } => {
                    let part = parts.get(i)?;
                    let value = part.strip_suffix(suffix.as_str())?;
                    if value.is_empty() {
                        return None;
                    }
                    captures.insert(name.clone(), value);
                }
                Segment::Rest(name) => {
                    let tail = parts.get(i..).filter(|t| !t.is_empty())?.join("/");
                    if tail.is_empty() {
                        return None;
                    }
                    captures.insert(name.clone(), tail);
                    return Some(captures);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(captures)
    }
}
