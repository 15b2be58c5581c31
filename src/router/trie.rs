//! Path-segment trie
//!
//! Each node owns its static children and at most one parametric child, so
//! the whole tree is a plain owned structure: built once at startup, then
//! only read.

use super::Handler;
use crate::http::{Error, Method, Result};
use std::collections::HashMap;
use std::fmt;

/// Label of the node every path starts from
pub const ROOT_SEGMENT: &str = "/";

/// Split a lowercased path into trie segments
///
/// The leading segment (empty for any path starting with `/`) is replaced by
/// [`ROOT_SEGMENT`], so `/` is `["/", ""]` and `/users/42` is
/// `["/", "users", "42"]`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    std::iter::once(ROOT_SEGMENT).chain(path.split('/').skip(1))
}

/// Parameter name of a `{name}` segment
pub fn param_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// A node in the routing trie
#[derive(Default)]
pub struct RouterNode {
    segment: String,
    param_name: Option<String>,
    children: HashMap<String, RouterNode>,
    param_child: Option<Box<RouterNode>>,
    handlers: HashMap<Method, Handler>,
}

impl RouterNode {
    /// Create the unlabeled node the trie hangs from
    pub fn root() -> Self {
        Self::default()
    }

    fn fixed(segment: &str) -> Self {
        RouterNode {
            segment: segment.to_string(),
            ..Self::default()
        }
    }

    fn parametric(name: &str) -> Self {
        RouterNode {
            param_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Bind `handler` for `method` at `path`, creating nodes as needed
    ///
    /// `path` must already be lowercased. An existing binding for the same
    /// method is replaced.
    pub fn insert(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        let mut node = self;

        for segment in segments(path) {
            node = match param_name(segment) {
                Some(name) => {
                    let child = node
                        .param_child
                        .get_or_insert_with(|| Box::new(RouterNode::parametric(name)));

                    let existing = child.param_name.as_deref().unwrap_or_default();
                    if existing != name {
                        return Err(Error::RoutingConflict {
                            path: path.to_string(),
                            existing: existing.to_string(),
                            requested: name.to_string(),
                        });
                    }
                    child.as_mut()
                }
                None => node
                    .children
                    .entry(segment.to_string())
                    .or_insert_with(|| RouterNode::fixed(segment)),
            };
        }

        node.handlers.insert(method, handler);
        Ok(())
    }

    /// Find the handler for `method` at `path`
    ///
    /// Static children win over the parametric child. A segment that itself
    /// looks like `{name}` never binds to a parameter. Returns the handler and
    /// the parameter bindings collected on the way.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(&Handler, HashMap<String, String>)> {
        let mut params = HashMap::new();
        let mut node = self;

        for segment in segments(path) {
            if let Some(child) = node.children.get(segment) {
                node = child;
                continue;
            }

            match (&node.param_child, param_name(segment)) {
                (Some(child), None) => {
                    if let Some(name) = &child.param_name {
                        params.insert(name.clone(), segment.to_string());
                    }
                    node = &**child;
                }
                _ => return None,
            }
        }

        node.handlers.get(method).map(|handler| (handler, params))
    }

    /// Every bound `(method, pattern)` pair below this node, sorted by pattern
    pub fn routes(&self) -> Vec<(Method, String)> {
        let mut routes = Vec::new();
        self.collect_routes(&mut Vec::new(), &mut routes);
        routes.sort_by(|a, b| (&a.1, a.0.as_str()).cmp(&(&b.1, b.0.as_str())));
        routes
    }

    fn collect_routes(&self, trail: &mut Vec<String>, out: &mut Vec<(Method, String)>) {
        // trail[0] is the root marker itself
        let pattern = format!("/{}", trail.get(1..).unwrap_or_default().join("/"));
        for method in self.handlers.keys() {
            out.push((method.clone(), pattern.clone()));
        }

        for child in self.children.values().chain(self.param_child.as_deref()) {
            trail.push(child.label());
            child.collect_routes(trail, out);
            trail.pop();
        }
    }

    fn label(&self) -> String {
        match &self.param_name {
            Some(name) => format!("{{{name}}}"),
            None => self.segment.clone(),
        }
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let label = self.label();
        let label = if depth == 0 && label.is_empty() {
            "(root)"
        } else {
            label.as_str()
        };
        write!(f, "{:indent$}{}", "", label, indent = depth * 2)?;

        if !self.handlers.is_empty() {
            let mut methods: Vec<&str> = self.handlers.keys().map(Method::as_str).collect();
            methods.sort_unstable();
            write!(f, " [{}]", methods.join(", "))?;
        }
        writeln!(f)?;

        let mut keys: Vec<&String> = self.children.keys().collect();
        keys.sort();
        for key in keys {
            self.children[key].fmt_tree(f, depth + 1)?;
        }
        if let Some(child) = &self.param_child {
            child.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for RouterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}

impl fmt::Debug for RouterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterNode")
            .field("segment", &self.segment)
            .field("param_name", &self.param_name)
            .field("children", &self.children)
            .field("param_child", &self.param_child)
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
