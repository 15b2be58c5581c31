//! rawhttp - an HTTP/1.1 server built directly on TCP
//!
//! This crate parses requests from raw socket bytes, routes them through a
//! segment trie with `{name}` parameters and a middleware chain, and frames
//! responses (plain, chunked, with trailers) back onto the connection.
//!
//! ```no_run
//! use rawhttp::config::ServerConfig;
//! use rawhttp::http::{Headers, Method, StatusCode};
//! use rawhttp::router::Router;
//! use rawhttp::server::Server;
//!
//! let mut router = Router::new();
//! router
//!     .add_handler(Method::Get, "/", |w, _req| {
//!         let mut headers = Headers::new();
//!         headers.add("Content-Length", "2");
//!         w.write_status_line(StatusCode::OK)?;
//!         w.write_headers(&headers)?;
//!         w.write_body(b"ok")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let server = Server::serve(&ServerConfig::default(), router).unwrap();
//! println!("listening on {}", server.local_addr());
//! ```

pub mod config;
pub mod http;
pub mod logging;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use router::Router;
pub use server::Server;
