//! Path patterns with `{name}` placeholders.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// One non-empty segment.
    Param(String),
    /// The rest of the path. Unnamed for a trailing `/`.
    Rest(Option<String>),
}

impl Segment {
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 2,
            Segment::Param(_) => 1,
            Segment::Rest(_) => 0,
        }
    }
}

/// A compiled route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path
            .strip_prefix('/')
            .ok_or_else(|| GatewayError::InvalidConfig(format!("route path {path:?} must start with '/'")))?;

        let raw: Vec<&str> = trimmed.split('/').collect();
        let last = raw.len() - 1;
        let mut segments = Vec::with_capacity(raw.len());

        for (i, part) in raw.iter().enumerate() {
            let segment = match placeholder(part) {
                Some(name) if name.ends_with("...") || name.ends_with('+') => {
                    if i != last {
                        return Err(GatewayError::InvalidConfig(format!(
                            "remainder placeholder {part} must end route path {path:?}"
                        )));
                    }
                    let name = name.trim_end_matches("...").trim_end_matches('+');
                    Segment::Rest(Some(name.to_string()))
                }
                Some(name) => {
                    if name.is_empty() {
                        return Err(GatewayError::InvalidConfig(format!(
                            "empty placeholder in route path {path:?}"
                        )));
                    }
                    Segment::Param(name.to_string())
                }
                None if part.is_empty() && i == last => Segment::Rest(None),
                None => Segment::Literal(decode(part)),
            };
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Placeholder names in declaration order, suffixes stripped.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) | Segment::Rest(Some(name)) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Match a raw request path, returning the decoded captures.
    pub fn captures(&self, request_path: &str) -> Option<BTreeMap<String, String>> {
        let request: Vec<String> = request_path
            .strip_prefix('/')?
            .split('/')
            .map(decode)
            .collect();

        let mut captures = BTreeMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(literal) => {
                    if request.get(i)? != literal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = request.get(i)?;
                    if value.is_empty() {
                        return None;
                    }
                    captures.insert(name.clone(), value.clone());
                }
                Segment::Rest(name) => {
                    if i >= request.len() {
                        return None;
                    }
                    if let Some(name) = name {
                        captures.insert(name.clone(), request[i..].join("/"));
                    }
                    return Some(captures);
                }
            }
        }

        (request.len() == self.segments.len()).then_some(captures)
    }

    /// Orders patterns so that the more specific one compares greater.
    pub fn specificity(&self, other: &PathPattern) -> Ordering {
        let ours = self.segments.iter().map(Segment::rank);
        let theirs = other.segments.iter().map(Segment::rank);
        ours.cmp(theirs)
    }
}

fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

fn decode(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
