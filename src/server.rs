use std::{
    io::{self, Write},
    net::{SocketAddr, TcpListener, ToSocketAddrs},
    os::{fd::AsRawFd, unix::net::UnixStream},
    sync::Arc,
};

use epoll::{ControlOptions::*, Event, Events};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    SigId,
};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{error, info};

use crate::{completion::Completer, config::Config, error::ServerError, handler};

/// Pending connections the kernel will queue while we are busy with one.
pub const LISTEN_BACKLOG: i32 = 5;

// epoll data tags.
const LISTENER: u64 = 0;
const SHUTDOWN: u64 = 1;

/// Wakes a running [`Server`] and makes `run` return.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<UnixStream>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        match (&*self.0).write(&[1]) {
            Ok(_) => {}
            // A full pipe means a wakeup is already pending.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => error!("failed to signal shutdown: {e}"),
        }
    }
}

/// A listening socket that serves one connection at a time.
///
/// The accept loop waits on an epoll instance watching two things: the
/// listening socket and the read end of a self-pipe. SIGINT and SIGTERM (once
/// installed) and [`ShutdownHandle::trigger`] write to the pipe, which is how
/// the loop learns it should stop.
pub struct Server {
    listener: TcpListener,
    epoll: i32,
    shutdown_rx: UnixStream,
    shutdown_tx: Arc<UnixStream>,
    signals: Vec<SigId>,
}

impl Server {
    /// Binds the listening socket with `SO_REUSEADDR` and a backlog of
    /// [`LISTEN_BACKLOG`].
    pub fn bind(config: &Config) -> Result<Self, ServerError> {
        let bind_addr = config.bind_addr();
        let addr = bind_addr
            .to_socket_addrs()
            .map_err(|source| ServerError::Resolve {
                addr: bind_addr.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ServerError::NoAddress(bind_addr.clone()))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        let listener: TcpListener = socket.into();

        let (shutdown_rx, shutdown_tx) = UnixStream::pair()?;
        shutdown_rx.set_nonblocking(true)?;
        shutdown_tx.set_nonblocking(true)?;

        let epoll = epoll::create(true)?;
        let server = Server {
            listener,
            epoll,
            shutdown_rx,
            shutdown_tx: Arc::new(shutdown_tx),
            signals: Vec::new(),
        };

        epoll::ctl(
            server.epoll,
            EPOLL_CTL_ADD,
            server.listener.as_raw_fd(),
            Event::new(Events::EPOLLIN, LISTENER),
        )?;
        epoll::ctl(
            server.epoll,
            EPOLL_CTL_ADD,
            server.shutdown_rx.as_raw_fd(),
            Event::new(Events::EPOLLIN, SHUTDOWN),
        )?;

        info!("Server started on {bind_addr}");
        Ok(server)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Routes SIGINT and SIGTERM into the shutdown pipe.
    pub fn install_signal_handlers(&mut self) -> Result<(), ServerError> {
        for signal in [SIGINT, SIGTERM] {
            let pipe = self.shutdown_tx.try_clone()?;
            let id = signal_hook::low_level::pipe::register(signal, pipe)?;
            self.signals.push(id);
        }
        Ok(())
    }

    /// Accepts and handles connections until shutdown is requested.
    ///
    /// Each connection is handled to completion, including closing it, before
    /// the next one is accepted. A slow completion stalls everything queued
    /// behind it.
    pub fn run<C: Completer + ?Sized>(&self, completer: &C) -> Result<(), ServerError> {
        // We only ever registered two file descriptors, so there are at most
        // two events per wakeup.
        let mut events = [Event::new(Events::empty(), 0); 2];

        loop {
            // Block until the listener has a connection queued or something
            // wrote to the shutdown pipe. With no timeout this is the only
            // place the server sits idle.
            let num_events = match epoll::wait(self.epoll, -1, &mut events) {
                Ok(n) => n,
                // A signal landed mid-wait; the pipe will be readable on the
                // next round.
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            // Each event carries the tag we registered it with, which tells
            // us whether it came from the listener or the pipe. Shutdown wins
            // over connections that are still queued.
            let shutdown = events[..num_events].iter().any(|event| {
                // `Event` is packed, so copy the field out before comparing.
                let data = event.data;
                data == SHUTDOWN
            });
            if shutdown {
                return Ok(());
            }

            // The listener is readable, so this accept will not block. The
            // connection is handled and dropped, which closes it, before we
            // go back to waiting.
            match self.listener.accept() {
                Ok((connection, peer)) => {
                    handler::handle_connection(connection, peer.ip(), completer);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted | io::ErrorKind::Interrupted
                    ) =>
                {
                    error!("failed to accept connection: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        for id in self.signals.drain(..) {
            signal_hook::low_level::unregister(id);
        }

        if let Err(e) = epoll::close(self.epoll) {
            error!("failed to close epoll instance: {e}");
        }
    }
}
