//! Integration tests for the HTTP server
//!
//! These tests run a real server on a loopback port and talk to it with raw
//! TCP clients.

use rawhttp::http::chunked::decode_chunked_body;
use rawhttp::http::{HandlerError, Headers, Method, ResponseWriter, StatusCode};
use rawhttp::router::{cors, CorsOptions, HandlerResult, Router};
use rawhttp::{Server, ServerConfig};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

fn config() -> ServerConfig {
    ServerConfig {
        port: 0,
        accept_poll_interval_ms: 10,
        ..ServerConfig::default()
    }
}

fn text(w: &mut ResponseWriter<'_>, status: StatusCode, body: &str) -> HandlerResult {
    let mut headers = Headers::new();
    headers.add("Content-Type", "text/plain");
    headers.add("Content-Length", body.len().to_string());
    w.write_status_line(status)?;
    w.write_headers(&headers)?;
    w.write_body(body.as_bytes())?;
    Ok(())
}

fn app() -> Router {
    let mut router = Router::new();

    router
        .add_handler(Method::Get, "/users/{id}", |w, req| {
            let body = format!(
                "user={} verbose={}",
                req.path_param("id").unwrap_or_default(),
                req.query_params().get("verbose").map(String::as_str).unwrap_or("no")
            );
            text(w, StatusCode::OK, &body)
        })
        .unwrap()
        .add_handler(Method::Post, "/echo", |w, req| {
            let body = String::from_utf8_lossy(req.body()).into_owned();
            text(w, StatusCode::OK, &body)
        })
        .unwrap()
        .add_handler(Method::Get, "/broken", |_w, _req| {
            Err(HandlerError::bad_request("no such thing"))
        })
        .unwrap()
        .add_handler(Method::Get, "/stream/{n}", |w, req| {
            let n: usize = req
                .path_param("n")
                .unwrap_or_default()
                .parse()
                .map_err(|_| HandlerError::bad_request("n must be a number"))?;

            let mut headers = Headers::new();
            headers.add("Transfer-Encoding", "chunked");
            headers.add("Trailer", "X-Content-Length");
            w.write_status_line(StatusCode::OK)?;
            w.write_headers(&headers)?;

            let mut total = 0;
            for i in 0..n {
                let line = format!("line {i}\n");
                total += line.len();
                w.write_chunked_body(line.as_bytes())?;
            }
            w.write_chunked_body_done()?;

            let mut trailers = Headers::new();
            trailers.add("X-Content-Length", total.to_string());
            w.write_trailers(&trailers)?;
            Ok(())
        })
        .unwrap();

    router
}

fn send(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(raw).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8(response).unwrap()
}

fn split_response(response: &str) -> (&str, &str) {
    response.split_once("\r\n\r\n").unwrap()
}

#[test]
fn test_route_with_params_and_query() {
    let server = Server::serve(&config(), app()).unwrap();

    let response = send(
        server.local_addr(),
        b"GET /Users/Alice?verbose=yes HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );

    let (head, body) = split_response(&response);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("content-type: text/plain"));
    assert_eq!(body, "user=alice verbose=yes");

    server.close().unwrap();
}

#[test]
fn test_fragmented_post_body() {
    let config = ServerConfig {
        read_buffer_size: 8,
        ..config()
    };
    let server = Server::serve(&config, app()).unwrap();
    let addr = server.local_addr();

    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .write_all(b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 26\r\n\r\n")
            .unwrap();

        for piece in [&b"abcdefghi"[..], b"jklmnopqr", b"stuvwxyz"] {
            thread::sleep(Duration::from_millis(20));
            stream.write_all(piece).unwrap();
        }

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    });

    let response = client.join().unwrap();
    let (head, body) = split_response(&response);
    assert!(head.contains("content-length: 26"));
    assert_eq!(body, "abcdefghijklmnopqrstuvwxyz");
}

#[test]
fn test_unknown_route_gets_404() {
    let server = Server::serve(&config(), app()).unwrap();

    let response = send(server.local_addr(), b"GET /nowhere HTTP/1.1\r\n\r\n");

    let (head, body) = split_response(&response);
    assert!(head.starts_with("HTTP/1.1 404\r\n"));
    assert!(head.contains("content-type: text/html"));
    assert!(body.contains("404 Not Found"));
}

#[test]
fn test_handler_error_response() {
    let server = Server::serve(&config(), app()).unwrap();

    let response = send(server.local_addr(), b"GET /broken HTTP/1.1\r\n\r\n");

    assert_eq!(
        response,
        "HTTP/1.1 400 Bad Request\r\n\
         content-length: 13\r\n\
         connection: close\r\n\
         content-type: text/plain\r\n\
         \r\n\
         no such thing"
    );
}

#[test]
fn test_chunked_response_with_trailers() {
    let server = Server::serve(&config(), app()).unwrap();

    let response = send(server.local_addr(), b"GET /stream/3 HTTP/1.1\r\n\r\n");

    let (head, body) = split_response(&response);
    assert!(head.contains("transfer-encoding: chunked"));
    assert!(head.contains("trailer: X-Content-Length"));

    let (chunks, trailers) = decode_chunked_body(body.as_bytes()).unwrap();
    assert_eq!(
        chunks,
        vec![b"line 0\n".to_vec(), b"line 1\n".to_vec(), b"line 2\n".to_vec()]
    );
    assert_eq!(trailers.get("x-content-length"), "21");
}

#[test]
fn test_cors_preflight_short_circuits() {
    let mut router = app();
    router.use_middleware(cors(CorsOptions {
        allowed_origins: vec!["http://localhost:3000".to_string()],
        allowed_methods: vec!["GET".to_string(), "POST".to_string()],
        max_age: 86400,
        ..CorsOptions::default()
    }));
    let server = Server::serve(&config(), router).unwrap();

    // No OPTIONS route exists, yet the preflight is answered
    let response = send(
        server.local_addr(),
        b"OPTIONS /echo HTTP/1.1\r\nOrigin: http://localhost:3000\r\n\r\n",
    );

    assert_eq!(
        response,
        "HTTP/1.1 204 No Content\r\n\
         access-control-allow-origin: http://localhost:3000\r\n\
         access-control-allow-methods: GET, POST\r\n\
         access-control-max-age: 86400\r\n\
         \r\n"
    );
}

#[test]
fn test_malformed_request_gets_no_response() {
    let server = Server::serve(&config(), app()).unwrap();

    let mut stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.write_all(b"GARBAGE\r\n\r\n").unwrap();

    let mut response = Vec::new();
    // The server just closes; a reset is as good as an orderly close here
    if stream.read_to_end(&mut response).is_ok() {
        assert!(response.is_empty());
    }
}

#[test]
fn test_truncated_body_gets_no_response() {
    let server = Server::serve(&config(), app()).unwrap();

    let mut stream = TcpStream::connect(server.local_addr()).unwrap();
    stream
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort")
        .unwrap();
    stream.shutdown(std::net::Shutdown::Write).unwrap();

    let mut response = Vec::new();
    if stream.read_to_end(&mut response).is_ok() {
        assert!(response.is_empty());
    }
}

#[test]
fn test_concurrent_connections() {
    let server = Server::serve(&config(), app()).unwrap();
    let addr = server.local_addr();

    let clients: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let raw = format!("GET /users/{i} HTTP/1.1\r\n\r\n");
                let response = send(addr, raw.as_bytes());
                let (_, body) = split_response(&response);
                assert_eq!(body, format!("user={i} verbose=no"));
            })
        })
        .collect();

    for client in clients {
        client.join().unwrap();
    }
}

#[test]
fn test_close_stops_accepting() {
    let server = Server::serve(&config(), app()).unwrap();
    let addr = server.local_addr();

    server.close().unwrap();
    server.close().unwrap();

    assert!(TcpStream::connect(addr).is_err());
}
