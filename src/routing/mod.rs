//! Route table for the gateway.
//!
//! Routes come from the deployment descriptor and never change while the
//! server runs, so the table is shared behind an `Arc` without locking.

mod pattern;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::Result;

pub use pattern::PathPattern;

/// Method that matches every request method.
pub const ANY_METHOD: &str = "ANY";

/// An HTTP endpoint exposed by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    /// Upper-cased method.
    pub method: String,
    /// Declared path, placeholders included.
    pub path: String,
}

impl Route {
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_uppercase(),
            path: path.into(),
        }
    }

    /// Check if this route serves the given request method.
    pub fn allows(&self, method: &str) -> bool {
        self.method == ANY_METHOD
            || self.method == method
            || (self.method == "GET" && method == "HEAD")
    }
}

#[derive(Debug)]
struct Entry {
    route: Route,
    pattern: PathPattern,
}

/// Result of a route lookup.
#[derive(Debug)]
pub enum Lookup<'a> {
    Matched {
        route: &'a Route,
        params: BTreeMap<String, String>,
    },
    /// The path exists under other methods.
    MethodNotAllowed(Vec<String>),
    NotFound,
}

/// Immutable set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<Entry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from routes; a later duplicate replaces an earlier one.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Result<Self> {
        let mut table = Self::new();
        for route in routes {
            table.insert(route)?;
        }
        Ok(table)
    }

    /// Add a route, replacing any route with the same method and path.
    pub fn insert(&mut self, route: Route) -> Result<()> {
        let pattern = PathPattern::parse(&route.path)?;
        match self.entries.iter_mut().find(|e| e.route == route) {
            Some(existing) => existing.pattern = pattern,
            None => self.entries.push(Entry { route, pattern }),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.entries.iter().map(|e| &e.route)
    }

    /// Find the most specific route for a request.
    pub fn lookup(&self, method: &str, path: &str) -> Lookup<'_> {
        let mut best: Option<(&Entry, BTreeMap<String, String>)> = None;
        let mut allowed: Vec<String> = Vec::new();

        for entry in &self.entries {
            let Some(params) = entry.pattern.captures(path) else {
                continue;
            };
            if !entry.route.allows(method) {
                allowed.push(entry.route.method.clone());
                if entry.route.method == "GET" {
                    allowed.push("HEAD".to_string());
                }
                continue;
            }
            let better = match &best {
                Some((current, _)) => match entry.pattern.specificity(&current.pattern) {
                    Ordering::Greater => true,
                    Ordering::Equal => current.route.method == ANY_METHOD,
                    Ordering::Less => false,
                },
                None => true,
            };
            if better {
                best = Some((entry, params));
            }
        }

        match best {
            Some((entry, params)) => Lookup::Matched {
                route: &entry.route,
                params,
            },
            None if !allowed.is_empty() => {
                allowed.sort();
                allowed.dedup();
                Lookup::MethodNotAllowed(allowed)
            }
            None => Lookup::NotFound,
        }
    }
}
