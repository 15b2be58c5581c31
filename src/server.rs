//! Connection server
//!
//! [`Server::serve`] binds a listening socket and hands every accepted
//! connection to its own thread. A connection carries exactly one request:
//! it is parsed, dispatched through the router's handler chain, answered and
//! closed.

use crate::config::ServerConfig;
use crate::http::{request_from_reader, Error, Result, ResponseWriter};
use crate::router::{cors, Handler, Router};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::{self, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const LISTEN_BACKLOG: i32 = 128;

/// A running HTTP server
///
/// Dropping the server closes it.
pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    listener: Mutex<Option<TcpListener>>,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Bind to the configured address and start accepting connections
    ///
    /// Returns once the socket is listening; requests are served on
    /// background threads. A `cors` section in `config` installs the CORS
    /// middleware outside everything registered on `router`.
    pub fn serve(config: &ServerConfig, mut router: Router) -> Result<Server> {
        config
            .validate()
            .map_err(|err| Error::InvalidConfig(err.to_string()))?;

        if let Some(options) = &config.cors {
            router.prepend_middleware(cors(options.clone()));
        }

        let listener = bind(&config.addr())?;
        let local_addr = listener.local_addr()?;
        let closed = Arc::new(AtomicBool::new(false));

        let acceptor = Acceptor {
            listener: listener.try_clone()?,
            handler: router.into_handler(),
            closed: Arc::clone(&closed),
            poll_interval: config.accept_poll_interval(),
            read_size: config.read_buffer_size,
        };
        let accept_thread = thread::Builder::new()
            .name("rawhttp-accept".to_string())
            .spawn(move || acceptor.run())?;

        info!(addr = %local_addr, "server listening");

        Ok(Server {
            local_addr,
            closed,
            listener: Mutex::new(Some(listener)),
            accept_thread: Mutex::new(Some(accept_thread)),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting connections
    ///
    /// Only the first call does any work. Connections already accepted run
    /// to completion on their own threads.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(listener) = lock(&self.listener).take() {
            if let Err(err) = SockRef::from(&listener).shutdown(Shutdown::Both) {
                debug!(error = %err, "shutting down listener");
            }
        }

        if let Some(handle) = lock(&self.accept_thread).take() {
            handle
                .join()
                .map_err(|_| Error::Io(io::Error::other("accept loop panicked")))?;
        }

        info!(addr = %self.local_addr, "server closed");
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "closing server");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Create a listening socket with `SO_REUSEADDR` set
fn bind(addr: &str) -> Result<TcpListener> {
    let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{addr} did not resolve to any address"),
        ))
    })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

/// Wait until `listener` has a pending connection or `timeout` passes
fn wait_readable(listener: &TcpListener, timeout: Duration) -> io::Result<bool> {
    use libc::{poll, pollfd, POLLIN};

    let mut pfd = pollfd {
        fd: listener.as_raw_fd(),
        events: POLLIN,
        revents: 0,
    };
    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    Ok(result > 0)
}

/// State owned by the accept loop thread
struct Acceptor {
    listener: TcpListener,
    handler: Handler,
    closed: Arc<AtomicBool>,
    poll_interval: Duration,
    read_size: usize,
}

impl Acceptor {
    fn run(self) {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                break;
            }

            match wait_readable(&self.listener, self.poll_interval) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    if self.closed.load(Ordering::SeqCst) {
                        break;
                    }
                    warn!(error = %err, "polling listener");
                    continue;
                }
            }

            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_connection(stream, peer),
                Err(_) if self.closed.load(Ordering::SeqCst) => {
                    debug!("listener closed, stopping accept loop");
                    break;
                }
                Err(err) => warn!(error = %err, "accept failed"),
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        debug!(%peer, "accepted connection");

        let handler = Arc::clone(&self.handler);
        let read_size = self.read_size;
        let spawned = thread::Builder::new()
            .name(format!("rawhttp-conn-{peer}"))
            .spawn(move || handle_connection(stream, peer, &handler, read_size));

        if let Err(err) = spawned {
            warn!(%peer, error = %err, "failed to spawn connection thread");
        }
    }
}

/// Serve the single request carried by `stream`, then close it
fn handle_connection(stream: TcpStream, peer: SocketAddr, handler: &Handler, read_size: usize) {
    let mut req = match request_from_reader(&stream, read_size) {
        Ok(req) => req,
        Err(err) => {
            warn!(%peer, error = %err, "failed to parse request");
            return;
        }
    };

    debug!(%peer, method = %req.method(), target = %req.target(), "dispatching request");

    let mut out = BufWriter::new(&stream);
    let mut writer = ResponseWriter::new(&mut out);

    if let Err(err) = handler(&mut writer, &mut req) {
        warn!(
            %peer,
            status = err.status.code(),
            error = %err,
            "handler failed"
        );
        if writer.is_started() {
            debug!(%peer, "response already started, not writing error response");
        } else if let Err(write_err) = writer.respond_with_handler_error(&err) {
            warn!(%peer, error = %write_err, "writing error response");
        }
    }

    if let Err(err) = writer.finish() {
        warn!(%peer, error = %err, "writing response");
    }
}
