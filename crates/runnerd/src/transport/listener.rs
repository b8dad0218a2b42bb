//! TCP listener for the daemon's client-facing socket.
//!
//! Grounded on `weaverd::transport::listener::SocketListener`
//! (`crates/weaverd/src/transport/listener.rs`), trimmed to the TCP-only
//! endpoint `SPEC_FULL.md` §6 calls for and binding through [`socket2`] so
//! `SO_REUSEADDR` is set explicitly rather than left to whatever the
//! platform's `std::net::TcpListener::bind` default happens to be.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tracing::{info, warn};

use super::handler::ConnectionHandler;
use super::{ListenerError, TRANSPORT_TARGET};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const LISTEN_BACKLOG: i32 = 128;
const MAX_HANDLER_THREADS: usize = 128;

/// Bound TCP listener for the daemon's control port.
pub(crate) struct SocketListener {
    local_addr: SocketAddr,
    listener: TcpListener,
}

impl SocketListener {
    /// Binds to `0.0.0.0:port`, setting `SO_REUSEADDR` before listening.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] if the address fails to resolve or the bind
    /// call itself fails.
    pub(crate) fn bind(port: u16) -> Result<Self, ListenerError> {
        let listener = bind_tcp(port)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::BindTcp {
                addr: SocketAddr::from(([0, 0, 0, 0], port)),
                source,
            })?;
        Ok(Self { local_addr, listener })
    }

    /// The address actually bound, useful when `port` is `0` so the caller
    /// can discover the OS-assigned ephemeral port.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the background accept loop, spawning one handler thread per
    /// accepted connection (capped at [`MAX_HANDLER_THREADS`]).
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::BindTcp {
                addr: self.local_addr,
                source,
            })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let listener = self.listener;
        let addr = self.local_addr;
        let handle = thread::spawn(move || run_accept_loop(&listener, addr, &shutdown_flag, &handler));
        Ok(ListenerHandle {
            shutdown,
            handle: Some(handle),
        })
    }
}

/// Handle to the background accept-loop thread.
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Signals the accept loop to stop after its current iteration.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Blocks until the accept-loop thread has exited.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] if the accept loop panicked.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| ListenerError::ThreadPanic)
        } else {
            Ok(())
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(target: TRANSPORT_TARGET, "listener thread panicked during drop");
        }
    }
}

struct HandlerLimiter {
    active: Arc<AtomicUsize>,
    max: usize,
}

impl HandlerLimiter {
    fn new(max: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    fn try_acquire(&self) -> Option<HandlerPermit> {
        let mut current = self.active.load(Ordering::SeqCst);
        loop {
            if current >= self.max {
                return None;
            }
            match self
                .active
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Some(HandlerPermit::new(Arc::clone(&self.active))),
                Err(next) => current = next,
            }
        }
    }
}

struct HandlerPermit {
    active: Arc<AtomicUsize>,
}

impl HandlerPermit {
    fn new(active: Arc<AtomicUsize>) -> Self {
        Self { active }
    }
}

impl Drop for HandlerPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    listener: &TcpListener,
    addr: SocketAddr,
    shutdown: &Arc<AtomicBool>,
    handler: &Arc<dyn ConnectionHandler>,
) {
    info!(target: TRANSPORT_TARGET, %addr, "socket listener active");
    let mut last_error = None::<io::ErrorKind>;
    let limiter = HandlerLimiter::new(MAX_HANDLER_THREADS);
    while !shutdown.load(Ordering::SeqCst) {
        if let Some(delay) = handle_accept_cycle(listener, handler, &limiter, &mut last_error) {
            thread::sleep(delay);
        }
    }
}

fn handle_accept_cycle(
    listener: &TcpListener,
    handler: &Arc<dyn ConnectionHandler>,
    limiter: &HandlerLimiter,
    last_error: &mut Option<io::ErrorKind>,
) -> Option<Duration> {
    match listener.accept() {
        Ok((stream, _)) => {
            *last_error = None;
            if let Err(error) = stream.set_nonblocking(false) {
                warn!(target: TRANSPORT_TARGET, %error, "failed to clear nonblocking flag, dropping connection");
                return None;
            }
            if let Some(permit) = limiter.try_acquire() {
                let handler = Arc::clone(handler);
                thread::spawn(move || {
                    let _permit = permit;
                    handler.handle(stream);
                });
            } else {
                warn!(target: TRANSPORT_TARGET, max_threads = limiter.max, "listener at capacity, dropping connection");
            }
            None
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Some(ACCEPT_BACKOFF),
        Err(error) => {
            let kind = error.kind();
            if *last_error != Some(kind) {
                warn!(target: TRANSPORT_TARGET, %error, "socket accept error");
            }
            *last_error = Some(kind);
            Some(ERROR_BACKOFF)
        }
    }
}

fn bind_tcp(port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = ("0.0.0.0", port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: "0.0.0.0".to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: "0.0.0.0".to_owned(),
        port,
    })?;

    let socket = Socket::new(Domain::IPV4, Type::STREAM, None).map_err(|source| ListenerError::BindTcp { addr, source })?;
    socket
        .set_reuse_address(true)
        .map_err(|source| ListenerError::BindTcp { addr, source })?;
    socket
        .bind(&addr.into())
        .map_err(|source| ListenerError::BindTcp { addr, source })?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|source| ListenerError::BindTcp { addr, source })?;
    Ok(TcpListener::from(socket))
}
