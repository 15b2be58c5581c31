//! Demo server
//!
//! Run with: cargo run --example serve -- --port 42069
//! Stop it by pressing Enter.

use clap::Parser;
use rawhttp::http::{HandlerError, Headers, Method, Request, ResponseWriter, StatusCode};
use rawhttp::router::HandlerResult;
use rawhttp::{logging, Router, Server, ServerConfig};
use std::io::BufRead;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "serve")]
#[command(about = "Serve a few demo routes over raw HTTP/1.1", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

fn html(w: &mut ResponseWriter<'_>, status: StatusCode, body: &str) -> HandlerResult {
    let mut headers = Headers::new();
    headers.add("Content-Type", "text/html");
    headers.add("Content-Length", body.len().to_string());
    w.write_status_line(status)?;
    w.write_headers(&headers)?;
    w.write_body(body.as_bytes())?;
    Ok(())
}

fn your_problem(w: &mut ResponseWriter<'_>, _req: &mut Request) -> HandlerResult {
    html(
        w,
        StatusCode::BAD_REQUEST,
        "<html>
  <head>
    <title>400 Bad Request</title>
  </head>
  <body>
    <h1>Bad Request</h1>
    <p>Your request honestly kinda sucked.</p>
  </body>
</html>",
    )
}

fn my_problem(w: &mut ResponseWriter<'_>, _req: &mut Request) -> HandlerResult {
    html(
        w,
        StatusCode::INTERNAL_SERVER_ERROR,
        "<html>
  <head>
    <title>500 Internal Server Error</title>
  </head>
  <body>
    <h1>Internal Server Error</h1>
    <p>Okay, you know what? This one is on me.</p>
  </body>
</html>",
    )
}

/// Streams `n` lines as chunks, then reports the total size as a trailer
fn stream(w: &mut ResponseWriter<'_>, req: &mut Request) -> HandlerResult {
    let n: usize = req
        .path_param("n")
        .unwrap_or_default()
        .parse()
        .map_err(|_| HandlerError::bad_request("line count must be a number"))?;

    let mut headers = Headers::new();
    headers.add("Content-Type", "text/plain");
    headers.add("Transfer-Encoding", "chunked");
    headers.add("Trailer", "X-Content-Length");
    w.write_status_line(StatusCode::OK)?;
    w.write_headers(&headers)?;

    let mut total = 0;
    for i in 0..n {
        let line = format!("{{\"line\": {i}}}\n");
        total += line.len();
        w.write_chunked_body(line.as_bytes())?;
    }
    w.write_chunked_body_done()?;

    let mut trailers = Headers::new();
    trailers.add("X-Content-Length", total.to_string());
    w.write_trailers(&trailers)?;
    Ok(())
}

fn echo(w: &mut ResponseWriter<'_>, req: &mut Request) -> HandlerResult {
    let content_type = req.headers().get_opt("content-type").unwrap_or("text/plain");
    let mut headers = Headers::new();
    headers.add("Content-Type", content_type);
    headers.add("Content-Length", req.body().len().to_string());
    w.write_status_line(StatusCode::OK)?;
    w.write_headers(&headers)?;
    w.write_body(req.body())?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    logging::init(&config.log_filter);

    let mut router = Router::new();
    router
        .add_handler(Method::Get, "/yourproblem", your_problem)?
        .add_handler(Method::Get, "/myproblem", my_problem)?
        .add_handler(Method::Get, "/stream/{n}", stream)?
        .add_handler(Method::Post, "/echo", echo)?;

    tracing::info!("routes:\n{router}");

    let server = Server::serve(&config, router)?;
    tracing::info!(addr = %server.local_addr(), "press Enter to stop");

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    server.close()?;
    Ok(())
}
