//! Handler middleware
//!
//! A [`Middleware`] takes the next handler in the chain and returns a new
//! handler wrapping it. It may stage response headers, short-circuit the
//! request, or delegate.

use super::{handler, Handler};
use crate::http::{Headers, Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::trace;

/// Wraps a handler into another handler
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Cross-origin resource sharing policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CorsOptions {
    /// Origins echoed back when they match the request's `Origin` exactly
    pub allowed_origins: Vec<String>,
    /// Answer every origin with `*`; `allowed_origins` is then ignored
    pub allow_all_origins: bool,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    /// Never sent alongside a wildcard origin
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds, 0 leaves the header out
    pub max_age: u64,
}

impl CorsOptions {
    /// Value for `Access-Control-Allow-Origin` given the request's `Origin`
    pub fn allow_origin(&self, origin: &str) -> Option<String> {
        if self.allow_all_origins {
            return Some("*".to_string());
        }

        self.allowed_origins
            .iter()
            .find(|allowed| !origin.is_empty() && *allowed == origin)
            .cloned()
    }

    fn stage_origin(&self, staged: &mut Headers, allow_origin: &str) {
        staged.add("Access-Control-Allow-Origin", allow_origin);
        if self.allow_credentials && allow_origin != "*" {
            staged.add("Access-Control-Allow-Credentials", "true");
        }
    }

    fn stage_preflight(&self, staged: &mut Headers) {
        if !self.allowed_methods.is_empty() {
            staged.add("Access-Control-Allow-Methods", self.allowed_methods.join(", "));
        }
        if !self.allowed_headers.is_empty() {
            staged.add("Access-Control-Allow-Headers", self.allowed_headers.join(", "));
        }
        if self.max_age > 0 {
            staged.add("Access-Control-Max-Age", self.max_age.to_string());
        }
    }
}

/// CORS middleware
///
/// `OPTIONS` requests are answered here with `204 No Content` and never reach
/// the inner handler. The `Access-Control-*` headers are only attached when
/// the origin is allowed. Other requests get the allow-origin header staged
/// and are passed on.
pub fn cors(options: CorsOptions) -> Middleware {
    let options = Arc::new(options);

    Arc::new(move |next: Handler| {
        let options = Arc::clone(&options);

        handler(move |w, req| {
            let origin = req.headers().get("origin");
            let allow_origin = options.allow_origin(origin);

            if *req.method() == Method::Options {
                if let Some(allow_origin) = &allow_origin {
                    options.stage_origin(w.headers_mut(), allow_origin);
                    options.stage_preflight(w.headers_mut());
                } else {
                    trace!(origin, "preflight from disallowed origin");
                }

                w.write_status_line(StatusCode::NO_CONTENT)?;
                w.write_headers(&Headers::new())?;
                return Ok(());
            }

            if let Some(allow_origin) = &allow_origin {
                options.stage_origin(w.headers_mut(), allow_origin);
            }

            next(w, req)
        })
    })
}
