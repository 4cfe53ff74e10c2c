//! Starting and stopping a server.
//!
//! [`Server::start`] binds every socket up front, then either launches a
//! worker thread (threaded mode) or parks a [`ServeTask`] on the returned
//! [`RunningServer`] for the caller to run (embedded mode).
//!
//! Every resource on a [`RunningServer`] sits in a `Mutex<Option<_>>` and
//! is taken at most once, so the trigger, the worker and the parked task
//! each have exactly one owner at a time. Sockets travel inside the task,
//! so teardown never closes a socket a running task still uses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::{HostingMode, ServerConfig};
use crate::dns::{Handler, Refuser};
use crate::error::{Result, SetupError};
use crate::network::ListeningSockets;
use crate::server::{ServeTask, ServerStats, ShutdownTrigger, StatsSnapshot, shutdown};

const WORKER_NAME: &str = "nanoserver";

/// Start a server that refuses every query.
pub fn start(config: ServerConfig) -> Result<RunningServer<Refuser>> {
    Server::new(config).start()
}

/// A configured server that has not acquired any resources yet.
#[derive(Debug, Clone)]
pub struct Server<H = Refuser> {
    config: ServerConfig,
    handler: H,
}

impl Server<Refuser> {
    pub const fn new(config: ServerConfig) -> Self {
        Self {
            config,
            handler: Refuser,
        }
    }
}

impl<H: Handler> Server<H> {
    pub const fn with_handler(config: ServerConfig, handler: H) -> Self {
        Self { config, handler }
    }

    /// Replace the response handler.
    pub fn handler<N: Handler>(self, handler: N) -> Server<N> {
        Server {
            config: self.config,
            handler,
        }
    }

    /// Bind the enabled sockets and start serving.
    ///
    /// # Errors
    /// Fails if the configuration is invalid, an address cannot be resolved
    /// or bound, or the worker cannot be launched. Nothing stays bound when
    /// this returns an error.
    pub fn start(self) -> Result<RunningServer<H>> {
        self.config.validate()?;

        let sockets = ListeningSockets::bind(&self.config)?;
        let udp_addr = sockets.udp_addr();
        let tcp_addr = sockets.tcp_addr();

        let stats = Arc::new(ServerStats::default());
        let (trigger, signal) = shutdown::channel();
        let task = ServeTask::new(sockets, Arc::new(self.handler), Arc::clone(&stats), signal);

        let mode = self.config.hosting_mode;
        let (worker, task) = match mode {
            HostingMode::Threaded => (Some(spawn_worker(task)?), None),
            HostingMode::Embedded => (None, Some(task)),
        };

        info!(?mode, ?udp_addr, ?tcp_addr, "DNS server started");

        Ok(RunningServer {
            mode,
            udp_addr,
            tcp_addr,
            stats,
            trigger: Mutex::new(Some(trigger)),
            worker: Mutex::new(worker),
            task: Mutex::new(task),
        })
    }
}

/// Run `task` on a dedicated thread with its own current-thread runtime.
fn spawn_worker<H: Handler>(task: ServeTask<H>) -> Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SetupError::Runtime)?;

    let handle = thread::Builder::new()
        .name(WORKER_NAME.to_string())
        .spawn(move || {
            if let Err(err) = runtime.block_on(task.run()) {
                error!("DNS server worker failed: {err}");
            }
        })
        .map_err(SetupError::Worker)?;

    Ok(handle)
}

/// Handle to a started server. Dropping it stops the server.
pub struct RunningServer<H> {
    mode: HostingMode,
    udp_addr: Option<SocketAddr>,
    tcp_addr: Option<SocketAddr>,
    stats: Arc<ServerStats>,
    trigger: Mutex<Option<ShutdownTrigger>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    task: Mutex<Option<ServeTask<H>>>,
}

impl<H> RunningServer<H> {
    /// Bound UDP address, if UDP is enabled.
    pub const fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp_addr
    }

    /// Bound TCP address, if TCP is enabled.
    pub const fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp_addr
    }

    pub const fn hosting_mode(&self) -> HostingMode {
        self.mode
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Hand the serving task to the caller.
    ///
    /// Only embedded servers park a task, and it can be taken once. The
    /// caller must await [`ServeTask::run`] inside its own runtime.
    pub fn take_task(&self) -> Option<ServeTask<H>> {
        self.task.lock().take()
    }

    /// Whether [`RunningServer::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.trigger.lock().is_none()
    }

    /// Request shutdown and release what this handle still owns.
    ///
    /// In threaded mode this blocks until the worker has fully unwound. In
    /// embedded mode it only signals; the caller's `run` future completes
    /// once every serving task has stopped. Calling it again does nothing.
    pub fn stop(&self) {
        let trigger = self.trigger.lock().take();
        if let Some(trigger) = trigger {
            info!("Stopping DNS server");
            trigger.trigger();
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("DNS server worker panicked");
            }
            debug!("DNS server worker joined");
        }

        // A task nobody ran still owns its sockets; dropping it closes them.
        let task = self.task.lock().take();
        if task.is_some() {
            debug!("Releasing sockets of a task that never ran");
        }
    }
}

impl<H> Drop for RunningServer<H> {
    fn drop(&mut self) {
        self.stop();
    }
}
