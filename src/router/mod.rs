//! Request routing
//!
//! Routes are registered per method against path patterns whose segments
//! are literals or `{name}` placeholders. Paths are matched
//! case-insensitively, and parameter values are bound lowercased.
//!
//! # Examples
//!
//! ```
//! use rawhttp::http::{Headers, Method, StatusCode};
//! use rawhttp::router::Router;
//!
//! let mut router = Router::new();
//! router
//!     .add_handler(Method::Get, "/users/{id}", |w, req| {
//!         let body = format!("user {}", req.path_param("id").unwrap_or_default());
//!         let mut headers = Headers::new();
//!         headers.add("Content-Length", body.len().to_string());
//!         w.write_status_line(StatusCode::OK)?;
//!         w.write_headers(&headers)?;
//!         w.write_body(body.as_bytes())?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let (_, params) = router.resolve(&Method::Get, "/users/42").unwrap();
//! assert_eq!(params["id"], "42");
//! ```

pub mod middleware;
pub mod trie;

pub use middleware::{cors, CorsOptions, Middleware};
pub use trie::RouterNode;

use crate::http::{HandlerError, Headers, Method, Request, ResponseWriter, Result, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a handler; errors are turned into a response by the server
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Shared request handler
pub type Handler =
    Arc<dyn Fn(&mut ResponseWriter<'_>, &mut Request) -> HandlerResult + Send + Sync>;

/// Wrap a closure as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut ResponseWriter<'_>, &mut Request) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}

const NOT_FOUND_BODY: &str = "<html>
  <head>
    <title>404 Not Found</title>
  </head>
  <body>
    <h1>404 Not Found</h1>
  </body>
</html>";

/// Response sent when no route matches
pub fn not_found(w: &mut ResponseWriter<'_>) -> HandlerResult {
    let mut headers = Headers::new();
    headers.add("Content-Type", "text/html");
    headers.add("Content-Length", NOT_FOUND_BODY.len().to_string());

    w.write_status_line(StatusCode::NOT_FOUND)?;
    w.write_headers(&headers)?;
    w.write_body(NOT_FOUND_BODY.as_bytes())?;
    Ok(())
}

/// Routing trie plus the global middleware wrapped around it
#[derive(Default)]
pub struct Router {
    root: RouterNode,
    middleware: Vec<Middleware>,
}

impl Router {
    pub fn new() -> Self {
        Router {
            root: RouterNode::root(),
            middleware: Vec::new(),
        }
    }

    /// Register `handler` for `method` requests matching `path`
    ///
    /// Fails with [`Error::RoutingConflict`] when a `{name}` segment names a
    /// different parameter than one already registered at that position.
    ///
    /// [`Error::RoutingConflict`]: crate::http::Error::RoutingConflict
    pub fn add_handler<F>(&mut self, method: Method, path: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&mut ResponseWriter<'_>, &mut Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.add_shared_handler(method, path, Arc::new(handler))
    }

    /// Register an already shared handler
    ///
    /// `Method::Extension` spellings of a well-known method are stored as
    /// that method, so they match what the request parser produces.
    pub fn add_shared_handler(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
    ) -> Result<&mut Self> {
        let method = Method::from(method.as_str());
        self.root.insert(method, &path.to_lowercase(), handler)?;
        Ok(self)
    }

    /// Append a global middleware; the first one added runs outermost
    pub fn use_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Install a middleware outside all others registered so far
    pub fn prepend_middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middleware.insert(0, middleware);
        self
    }

    /// Resolve `method` and `path` to a handler and its parameter bindings
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&Handler, HashMap<String, String>)> {
        let method = Method::from(method.as_str());
        self.root.lookup(&method, &path.to_lowercase())
    }

    /// Registered `(method, pattern)` pairs
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.root.routes()
    }

    /// Compose the middleware chain around trie resolution
    ///
    /// Middleware is applied in reverse registration order, so the first
    /// registered wraps everything else.
    pub fn into_handler(self) -> Handler {
        let Router { root, middleware } = self;
        let root = Arc::new(root);

        let dispatch = handler(move |w, req| {
            let path = req.path().to_lowercase();
            match root.lookup(req.method(), &path) {
                Some((matched, params)) => {
                    req.set_path_params(params);
                    matched(w, req)
                }
                None => {
                    debug!(method = %req.method(), path = %path, "no route matched");
                    not_found(w)
                }
            }
        });

        middleware
            .iter()
            .rev()
            .fold(dispatch, |inner, wrap| wrap(inner))
    }
}

impl fmt::Display for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("root", &self.root)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}
