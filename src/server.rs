//! HTTP server and graceful shutdown.
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Tells every open connection to finish the request it is serving and
//!    close. Idle keep-alive connections close at once.
//! 3. Waits for those connection tasks, then returns from [`Server::serve`].
//!
//! A client that disconnects mid-request only affects its own connection
//! task: hyper drops that request's future (the
//! [`RequestLog`](crate::middleware::RequestLog) stage records the
//! cancellation) and the failed write is logged, never propagated.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::router::Router;

enum Source {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    source: Source,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. The address is validated at that point.
    ///
    /// ```rust,no_run
    /// use sello::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { source: Source::Addr(addr.into()) }
    }

    /// Serves on an already-bound listener, e.g. one bound to port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { source: Source::Listener(listener) }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve) but stops when `shutdown` resolves.
    pub async fn serve_with_shutdown<S>(self, router: Router, shutdown: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = match self.source {
            Source::Listener(listener) => listener,
            Source::Addr(addr) => {
                let parsed: SocketAddr = addr
                    .parse()
                    .map_err(|source| Error::Addr { addr: addr.clone(), source })?;
                TcpListener::bind(parsed).await?
            }
        };

        let router = Arc::new(router);
        info!(addr = %listener.local_addr()?, "sello listening");

        // Tracks every spawned connection task so shutdown can wait for them.
        let mut tasks = tokio::task::JoinSet::new();
        let (stop_tx, stop_rx) = watch::channel(());
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);
                    let mut stop = stop_rx.clone();

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { Ok::<_, std::convert::Infallible>(router.handle(req).await) }
                        });

                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = stop.changed() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };

                        if let Err(e) = result {
                            if is_disconnect(&*e) {
                                debug!(%peer, "client went away: {e}");
                            } else {
                                error!(%peer, "connection error: {e}");
                            }
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Receivers see the change even if their task has not polled yet.
        let _ = stop_tx.send(());
        while tasks.join_next().await.is_some() {}

        info!("sello stopped");
        Ok(())
    }
}

/// True for errors caused by the peer closing the connection early.
fn is_disconnect(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut next = Some(err);
    while let Some(e) = next {
        if let Some(hyper_err) = e.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() {
                return true;
            }
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            use std::io::ErrorKind::*;
            if matches!(io.kind(), BrokenPipe | ConnectionReset | ConnectionAborted | UnexpectedEof) {
                return true;
            }
        }
        next = e.source();
    }
    false
}

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. If a handler cannot be installed
/// that arm never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
