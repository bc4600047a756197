//! Routing tree.
//!
//! A [`Node`] maps path segments to children and owns the reserved slots of the declarative
//! format:
//!
//! | key  | slot                                                          |
//! |------|---------------------------------------------------------------|
//! | `/`  | path ended here                                               |
//! | `.`  | fallback, entered without consuming a segment                 |
//! | `*`  | wildcard, consumes any one segment                            |
//! | `^`  | middleware appended whenever the node is visited              |
//! | `!`  | error handlers merged with the ones set by ancestors          |
//! | `!!` | error handlers replacing the ones set by ancestors            |
//!
//! Trees are built once and then only read, usually behind an `Arc` shared by every worker.
use std::{collections::HashMap, fmt, sync::Arc};

use tracing::warn;

use crate::{
    handler::Endpoint,
    special::{ErrorHandlers, OverridePolicy},
};

/// Value of a tree slot: either a nested tree or a terminal endpoint.
#[derive(Clone, Debug)]
pub enum Route {
    Tree(Node),
    Endpoint(Endpoint),
}

impl From<Node> for Route {
    fn from(node: Node) -> Self {
        Route::Tree(node)
    }
}

impl From<Endpoint> for Route {
    fn from(endpoint: Endpoint) -> Self {
        Route::Endpoint(endpoint)
    }
}

#[derive(Clone, Default)]
pub struct Node {
    children: HashMap<String, Route>,
    end: Option<Box<Route>>,
    fallback: Option<Box<Route>>,
    wildcard: Option<Box<Route>>,
    middleware: Vec<Endpoint>,
    merge_errors: Option<Arc<ErrorHandlers>>,
    replace_errors: Option<Arc<ErrorHandlers>>,
}

/// Where a single walk step leads.
#[derive(Debug)]
pub enum Step<'n> {
    /// Segment consumed, continue into the route.
    Descend(&'n Route),
    /// Continue into the fallback route; the segment must be given back.
    Fallback(&'n Route),
    Miss,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child under `segment`. The keys `/`, `.` and `*` fill the matching reserved slot
    /// and `^` appends an endpoint as middleware.
    ///
    /// Keys no path segment can ever match (`!`, `!!`, `..`, `~`, or `^` with a subtree) are
    /// dropped with a warning; error overrides go through [`Node::errors`] and
    /// [`Node::replace_errors`].
    pub fn route(mut self, segment: impl Into<String>, child: impl Into<Route>) -> Self {
        let segment = segment.into();
        let child = child.into();
        match segment.as_str() {
            "/" => self.end = Some(Box::new(child)),
            "." => self.fallback = Some(Box::new(child)),
            "*" => self.wildcard = Some(Box::new(child)),
            "^" => match child {
                Route::Endpoint(endpoint) => self.middleware.push(endpoint),
                Route::Tree(_) => warn!("`^` takes an endpoint, subtree ignored"),
            },
            "!" | "!!" | ".." | "~" => {
                warn!("key {segment:?} never matches a segment, ignored");
            }
            _ => {
                self.children.insert(segment, child);
            }
        }
        self
    }

    pub fn end(mut self, child: impl Into<Route>) -> Self {
        self.end = Some(Box::new(child.into()));
        self
    }

    pub fn fallback(mut self, child: impl Into<Route>) -> Self {
        self.fallback = Some(Box::new(child.into()));
        self
    }

    pub fn wildcard(mut self, child: impl Into<Route>) -> Self {
        self.wildcard = Some(Box::new(child.into()));
        self
    }

    /// Append middleware; repeated calls keep declaration order.
    pub fn middleware(mut self, endpoint: Endpoint) -> Self {
        self.middleware.push(endpoint);
        self
    }

    pub fn errors(mut self, handlers: ErrorHandlers) -> Self {
        self.merge_errors = Some(Arc::new(handlers));
        self
    }

    pub fn replace_errors(mut self, handlers: ErrorHandlers) -> Self {
        self.replace_errors = Some(Arc::new(handlers));
        self
    }

    pub fn child(&self, segment: &str) -> Option<&Route> {
        self.children.get(segment)
    }

    pub fn middlewares(&self) -> &[Endpoint] {
        &self.middleware
    }

    /// The override map applied when this node is visited. `!!` wins over `!`.
    pub fn overrides(&self) -> Option<(OverridePolicy, &Arc<ErrorHandlers>)> {
        if let Some(handlers) = &self.replace_errors {
            return Some((OverridePolicy::Replace, handlers));
        }
        self.merge_errors
            .as_ref()
            .map(|handlers| (OverridePolicy::Merge, handlers))
    }

    /// Resolve one walk step. `part` is the segment under the cursor, `None` at path end.
    ///
    /// Precedence: exact segment, then `*`, then `.`. At path end: `/`, then `.`.
    pub fn step(&self, part: Option<&str>) -> Step<'_> {
        let fallback = || match &self.fallback {
            Some(route) => Step::Fallback(route),
            None => Step::Miss,
        };
        match part {
            None => match &self.end {
                Some(route) => Step::Descend(route),
                None => fallback(),
            },
            Some(part) => {
                if let Some(route) = self.children.get(part) {
                    Step::Descend(route)
                } else if let Some(route) = &self.wildcard {
                    Step::Descend(route)
                } else {
                    fallback()
                }
            }
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Node");
        d.field("children", &self.children);
        if let Some(end) = &self.end {
            d.field("/", end);
        }
        if let Some(fallback) = &self.fallback {
            d.field(".", fallback);
        }
        if let Some(wildcard) = &self.wildcard {
            d.field("*", wildcard);
        }
        if !self.middleware.is_empty() {
            d.field("^", &self.middleware.len());
        }
        if let Some(errors) = &self.merge_errors {
            d.field("!", errors);
        }
        if let Some(errors) = &self.replace_errors {
            d.field("!!", errors);
        }
        d.finish()
    }
}
